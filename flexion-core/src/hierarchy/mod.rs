//! Muscle and motion hierarchy indexes

pub mod motion;
pub mod muscle;

pub use motion::*;
pub use muscle::*;
