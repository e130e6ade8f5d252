//! Muscle hierarchy index
//!
//! Indexes flat muscle records into a single-parent forest using each
//! record's primary parent (`parent_ids[0]`). Every upward walk carries a
//! visited set so cyclic data terminates.

use crate::model::{MuscleId, MuscleRecord};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;

/// How an upward walk from a muscle ended
#[derive(Debug, Clone, PartialEq, Eq)]
enum Walk {
    /// Reached a muscle with no (known) parent. Path is root-first.
    Rooted(Vec<MuscleId>),
    /// A previously seen id recurred. Holds the last unvisited node.
    Cycle { last: MuscleId },
    /// Starting id is not in the catalog
    Unknown,
}

/// Parent/child index over the muscle catalog
#[derive(Debug, Clone, Default)]
pub struct MuscleHierarchy {
    records: HashMap<MuscleId, MuscleRecord>,
    /// child → effective parent (only parents present in the catalog)
    parent: HashMap<MuscleId, MuscleId>,
    /// parent → children, sorted by label then id
    children: HashMap<MuscleId, Vec<MuscleId>>,
}

impl MuscleHierarchy {
    /// Build the index from the full muscle record set
    ///
    /// Later duplicates of an id replace earlier ones. A primary parent that
    /// names an unknown muscle is treated as absent, making the muscle a root.
    pub fn new(records: impl IntoIterator<Item = MuscleRecord>) -> Self {
        let mut by_id: HashMap<MuscleId, MuscleRecord> = HashMap::new();
        for record in records {
            if by_id.contains_key(&record.id) {
                warn!(muscle_id = %record.id, "Duplicate muscle id, later record wins");
            }
            by_id.insert(record.id.clone(), record);
        }

        let mut parent = HashMap::new();
        let mut children: HashMap<MuscleId, Vec<MuscleId>> = HashMap::new();
        for record in by_id.values() {
            let Some(parent_id) = record.primary_parent() else {
                continue;
            };
            if !by_id.contains_key(parent_id) {
                warn!(
                    muscle_id = %record.id,
                    parent_id = %parent_id,
                    "Dangling parent reference, treating muscle as a root"
                );
                continue;
            }
            parent.insert(record.id.clone(), parent_id.to_string());
            children
                .entry(parent_id.to_string())
                .or_default()
                .push(record.id.clone());
        }

        for kids in children.values_mut() {
            kids.sort_by(|a, b| label_order(&by_id, a, b));
        }

        Self {
            records: by_id,
            parent,
            children,
        }
    }

    /// Look up a muscle record
    pub fn get(&self, id: &str) -> Option<&MuscleRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over all records (unordered)
    pub fn records(&self) -> impl Iterator<Item = &MuscleRecord> {
        self.records.values()
    }

    /// Effective parent (known primary parent only)
    pub fn primary_parent(&self, id: &str) -> Option<&str> {
        self.parent.get(id).map(String::as_str)
    }

    /// Display label, falling back to the id for unknown muscles
    pub fn label_of<'a>(&'a self, id: &'a str) -> &'a str {
        self.records.get(id).map(|r| r.label.as_str()).unwrap_or(id)
    }

    /// Muscles with no effective parent, sorted by label
    pub fn roots(&self) -> Vec<MuscleId> {
        let mut roots: Vec<MuscleId> = self
            .records
            .keys()
            .filter(|id| !self.parent.contains_key(*id))
            .cloned()
            .collect();
        roots.sort_by(|a, b| label_order(&self.records, a, b));
        roots
    }

    /// Direct children, sorted by label for deterministic ordering
    pub fn children_of(&self, id: &str) -> &[MuscleId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Walk primary-parent links up to the root
    ///
    /// On a cycle the walk stops at the last node seen before the repeat, so
    /// `A → B → A` yields `B` for `A`. An unknown id is its own root.
    pub fn root_of(&self, id: &str) -> MuscleId {
        match self.walk(id) {
            Walk::Rooted(path) => path.into_iter().next().unwrap_or_else(|| id.to_string()),
            Walk::Cycle { last } => last,
            Walk::Unknown => id.to_string(),
        }
    }

    /// Path from the root down to `id`, inclusive
    ///
    /// Empty when the walk does not end at a true root (cycle or unknown id).
    pub fn path_to_root(&self, id: &str) -> Vec<MuscleId> {
        match self.walk(id) {
            Walk::Rooted(path) => path,
            Walk::Cycle { .. } | Walk::Unknown => Vec::new(),
        }
    }

    /// Depth of `id` below `root_id` (0 for the root itself)
    ///
    /// Returns 0 when `id` does not reduce to `root_id`.
    pub fn depth_under_root(&self, id: &str, root_id: &str) -> usize {
        let path = self.path_to_root(id);
        match path.first() {
            Some(root) if root == root_id => path.len() - 1,
            _ => 0,
        }
    }

    /// True when the upward walk from `id` runs into a cycle
    pub fn is_in_cycle(&self, id: &str) -> bool {
        matches!(self.walk(id), Walk::Cycle { .. })
    }

    /// All muscles whose upward walk runs into a cycle, sorted by id
    pub fn cyclic_ids(&self) -> Vec<MuscleId> {
        let mut ids: Vec<MuscleId> = self
            .records
            .keys()
            .filter(|id| self.is_in_cycle(id))
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Muscles whose primary parent is not in the catalog, sorted by id
    pub fn dangling_ids(&self) -> Vec<MuscleId> {
        let mut ids: Vec<MuscleId> = self
            .records
            .values()
            .filter(|r| {
                r.primary_parent()
                    .map(|p| !self.records.contains_key(p))
                    .unwrap_or(false)
            })
            .map(|r| r.id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn walk(&self, id: &str) -> Walk {
        if !self.records.contains_key(id) {
            return Walk::Unknown;
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut path: Vec<MuscleId> = Vec::new();
        let mut current = id;
        loop {
            visited.insert(current);
            path.push(current.to_string());
            match self.parent.get(current) {
                None => break,
                Some(next) if visited.contains(next.as_str()) => {
                    return Walk::Cycle {
                        last: current.to_string(),
                    };
                }
                Some(next) => current = next.as_str(),
            }
        }

        path.reverse();
        Walk::Rooted(path)
    }
}

fn label_order(
    records: &HashMap<MuscleId, MuscleRecord>,
    a: &MuscleId,
    b: &MuscleId,
) -> std::cmp::Ordering {
    let label = |id: &MuscleId| records.get(id).map(|r| r.label.as_str()).unwrap_or("");
    label(a).cmp(label(b)).then_with(|| a.cmp(b))
}

/// Group ids by the root they reduce to (debug/reporting helper)
pub fn group_by_root<'a>(
    hierarchy: &MuscleHierarchy,
    ids: impl IntoIterator<Item = &'a str>,
) -> BTreeMap<MuscleId, Vec<MuscleId>> {
    let mut groups: BTreeMap<MuscleId, Vec<MuscleId>> = BTreeMap::new();
    for id in ids {
        groups
            .entry(hierarchy.root_of(id))
            .or_default()
            .push(id.to_string());
    }
    groups
}
