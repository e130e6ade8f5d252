//! Hierarchy-shaped score tree
//!
//! A sparse tree holding explicit per-muscle scores in the shape of the muscle
//! hierarchy. Nodes are shared through `Arc`, so cloning a tree is cheap and an
//! edit copies only the path it touches (`Arc::make_mut`).
//!
//! # Explicit scores vs placeholders
//!
//! Every ancestor of a scored muscle is materialised so totals are
//! well-defined. An ancestor that was not itself in the source map holds
//! `None` (a placeholder worth 0) and is not emitted by [`ScoreTree::flatten`],
//! which keeps `flatten(build_from_flat(m)) == m`.
//!
//! # Totals
//!
//! [`ScoreTree::totals`] is a derived view: an internal node's total is its own
//! score plus the unrounded totals of its children, rounded once after the
//! summation. Leaf totals are the leaf's own score.

use crate::hierarchy::MuscleHierarchy;
use crate::model::{finite_or_zero, FlatScores, MuscleId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Default number of decimal places for totals
pub const DEFAULT_TOTAL_PRECISION: u32 = 2;

/// Largest precision that still rounds; an f64 carries about 15 decimal digits
pub const MAX_TOTAL_PRECISION: u32 = 15;

/// One node of a [`ScoreTree`]
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreNode {
    id: MuscleId,
    score: Option<f64>,
    children: BTreeMap<MuscleId, Arc<ScoreNode>>,
}

impl ScoreNode {
    fn new(id: &str, score: Option<f64>) -> Self {
        Self {
            id: id.to_string(),
            score,
            children: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Explicit score, `None` for a materialised ancestor
    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn children(&self) -> impl Iterator<Item = &ScoreNode> {
        self.children.values().map(Arc::as_ref)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn find(&self, id: &str) -> Option<&ScoreNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.values().find_map(|c| c.find(id))
    }

    fn count(&self) -> usize {
        1 + self.children.values().map(|c| c.count()).sum::<usize>()
    }

    fn flatten_into(&self, out: &mut FlatScores) {
        if let Some(score) = self.score {
            out.insert(self.id.clone(), score);
        }
        for child in self.children.values() {
            child.flatten_into(out);
        }
    }

    /// Unrounded total and the display node for this subtree
    fn total(&self, precision: u32) -> (f64, TotalNode) {
        let own = finite_or_zero(self.score.unwrap_or(0.0));
        let mut raw = own;
        let mut children = BTreeMap::new();
        for child in self.children.values() {
            let (child_raw, node) = child.total(precision);
            raw += child_raw;
            children.insert(child.id.clone(), node);
        }

        let total = if children.is_empty() {
            own
        } else {
            round_to(raw, precision)
        };

        (
            raw,
            TotalNode {
                id: self.id.clone(),
                explicit: self.score,
                total,
                children,
            },
        )
    }
}

/// Persistent score tree keyed by root muscle id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreTree {
    roots: BTreeMap<MuscleId, Arc<ScoreNode>>,
}

impl ScoreTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from a flat muscle→score map
    ///
    /// Ancestors not present in `flat` become placeholders. Ids unknown to the
    /// hierarchy are dropped. The result does not depend on iteration order.
    pub fn build_from_flat(flat: &FlatScores, hierarchy: &MuscleHierarchy) -> Self {
        let mut tree = Self::new();
        for (id, score) in flat {
            let Some(path) = placement(id, hierarchy) else {
                continue;
            };
            if let Some(leaf) = tree.node_at(&path, |ancestor| flat.get(ancestor).copied()) {
                leaf.score = Some(*score);
            }
        }
        tree
    }

    /// Flat map of every explicit score in the tree
    pub fn flatten(&self) -> FlatScores {
        let mut out = FlatScores::new();
        for root in self.roots.values() {
            root.flatten_into(&mut out);
        }
        out
    }

    /// Set a muscle's explicit score, materialising its ancestors
    ///
    /// Returns false (tree unchanged) when the id is unknown to the hierarchy.
    pub fn set(&mut self, id: &str, score: f64, hierarchy: &MuscleHierarchy) -> bool {
        let Some(path) = placement(id, hierarchy) else {
            return false;
        };
        let Some(node) = self.node_at(&path, |_| None) else {
            return false;
        };
        node.score = Some(score);
        true
    }

    /// Add `delta` to a muscle's explicit score (missing or placeholder counts as 0)
    ///
    /// Non-finite operands count as 0. Returns false when the id is unknown.
    pub fn add_to(&mut self, id: &str, delta: f64, hierarchy: &MuscleHierarchy) -> bool {
        let Some(path) = placement(id, hierarchy) else {
            return false;
        };
        let Some(node) = self.node_at(&path, |_| None) else {
            return false;
        };
        let current = finite_or_zero(node.score.unwrap_or(0.0));
        node.score = Some(current + finite_or_zero(delta));
        true
    }

    /// Node for a muscle anywhere in the tree
    pub fn node(&self, id: &str) -> Option<&ScoreNode> {
        self.roots.values().find_map(|r| r.find(id))
    }

    /// Explicit score of a muscle (`None` if absent or a placeholder)
    pub fn score_of(&self, id: &str) -> Option<f64> {
        self.node(id).and_then(ScoreNode::score)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn roots(&self) -> impl Iterator<Item = &ScoreNode> {
        self.roots.values().map(Arc::as_ref)
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of materialised nodes, placeholders included
    pub fn node_count(&self) -> usize {
        self.roots.values().map(|r| r.count()).sum()
    }

    /// Bottom-up totals, rounded to `precision` decimal places
    pub fn totals(&self, precision: u32) -> ScoreTotals {
        let roots = self
            .roots
            .values()
            .map(|r| (r.id.clone(), r.total(precision).1))
            .collect();
        ScoreTotals { roots }
    }

    /// Walk (creating as needed) to the node at `path`, copying shared nodes
    ///
    /// Newly created ancestors take their score from `default_score`.
    fn node_at<F>(&mut self, path: &[MuscleId], default_score: F) -> Option<&mut ScoreNode>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let (first, rest) = path.split_first()?;
        let last = path.len() - 1;

        let root = self.roots.entry(first.clone()).or_insert_with(|| {
            let score = if last == 0 { None } else { default_score(first) };
            Arc::new(ScoreNode::new(first, score))
        });
        let mut node = Arc::make_mut(root);

        for (i, id) in rest.iter().enumerate() {
            let is_leaf = i + 1 == last;
            let child = node.children.entry(id.clone()).or_insert_with(|| {
                let score = if is_leaf { None } else { default_score(id) };
                Arc::new(ScoreNode::new(id, score))
            });
            node = Arc::make_mut(child);
        }
        Some(node)
    }
}

/// Where a muscle sits in the tree, root first
///
/// Cyclic muscles are treated as effective roots. Unknown ids have no place.
fn placement(id: &str, hierarchy: &MuscleHierarchy) -> Option<Vec<MuscleId>> {
    if !hierarchy.contains(id) {
        debug!(muscle_id = %id, "Dropping unknown muscle id");
        return None;
    }
    let path = hierarchy.path_to_root(id);
    if path.is_empty() {
        debug!(muscle_id = %id, "Cyclic ancestry, placing muscle as its own root");
        return Some(vec![id.to_string()]);
    }
    Some(path)
}

/// Round half away from zero to `precision` decimal places
///
/// Precision saturates at [`MAX_TOTAL_PRECISION`]. A value too large to scale
/// is returned as is.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision.min(MAX_TOTAL_PRECISION) as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

/// Aggregated view of one tree node
#[derive(Debug, Clone, PartialEq)]
pub struct TotalNode {
    pub id: MuscleId,
    pub explicit: Option<f64>,
    pub total: f64,
    pub children: BTreeMap<MuscleId, TotalNode>,
}

impl TotalNode {
    fn find(&self, id: &str) -> Option<&TotalNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.values().find_map(|c| c.find(id))
    }

    fn collect_flat(&self, out: &mut FlatScores) {
        out.insert(self.id.clone(), self.total);
        for child in self.children.values() {
            child.collect_flat(out);
        }
    }

    fn collect_rows(&self, depth: usize, hierarchy: &MuscleHierarchy, out: &mut Vec<TotalRow>) {
        out.push(TotalRow {
            id: self.id.clone(),
            label: hierarchy.label_of(&self.id).to_string(),
            depth,
            explicit: self.explicit,
            total: self.total,
        });
        for child in sorted_by_label(self.children.values(), hierarchy) {
            child.collect_rows(depth + 1, hierarchy, out);
        }
    }
}

/// Display/export row produced by [`ScoreTotals::rows`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalRow {
    pub id: MuscleId,
    pub label: String,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explicit: Option<f64>,
    pub total: f64,
}

/// Totals for every node of a [`ScoreTree`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreTotals {
    roots: BTreeMap<MuscleId, TotalNode>,
}

impl ScoreTotals {
    pub fn total_of(&self, id: &str) -> Option<f64> {
        self.roots.values().find_map(|r| r.find(id)).map(|n| n.total)
    }

    pub fn roots(&self) -> impl Iterator<Item = &TotalNode> {
        self.roots.values()
    }

    /// Flat id→total map for export
    pub fn to_flat(&self) -> FlatScores {
        let mut out = FlatScores::new();
        for root in self.roots.values() {
            root.collect_flat(&mut out);
        }
        out
    }

    /// Depth-first rows, siblings ordered by label
    pub fn rows(&self, hierarchy: &MuscleHierarchy) -> Vec<TotalRow> {
        let mut out = Vec::new();
        for root in sorted_by_label(self.roots.values(), hierarchy) {
            root.collect_rows(0, hierarchy, &mut out);
        }
        out
    }
}

fn sorted_by_label<'a>(
    nodes: impl Iterator<Item = &'a TotalNode>,
    hierarchy: &MuscleHierarchy,
) -> Vec<&'a TotalNode> {
    let mut nodes: Vec<&TotalNode> = nodes.collect();
    nodes.sort_by(|a, b| {
        hierarchy
            .label_of(&a.id)
            .cmp(hierarchy.label_of(&b.id))
            .then_with(|| a.id.cmp(&b.id))
    });
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MuscleRecord;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    /// r ── a ── b ── c, plus r ── d and a second root s
    fn hierarchy() -> MuscleHierarchy {
        MuscleHierarchy::new(vec![
            MuscleRecord::new("r", "R", None),
            MuscleRecord::new("a", "A", Some("r")),
            MuscleRecord::new("b", "B", Some("a")),
            MuscleRecord::new("c", "C", Some("b")),
            MuscleRecord::new("d", "D", Some("r")),
            MuscleRecord::new("s", "S", None),
        ])
    }

    fn flat(entries: &[(&str, f64)]) -> FlatScores {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_round_trip() {
        let h = hierarchy();
        for m in [
            flat(&[]),
            flat(&[("c", 2.0)]),
            flat(&[("r", 1.0), ("c", 2.5), ("d", -1.0), ("s", 0.0)]),
            flat(&[("a", 3.0), ("b", 0.0)]),
        ] {
            assert_eq!(ScoreTree::build_from_flat(&m, &h).flatten(), m);
        }
    }

    #[test]
    fn test_depth_four_chain_keeps_ancestors() {
        let h = hierarchy();
        let m = flat(&[("c", 2.0)]);
        let tree = ScoreTree::build_from_flat(&m, &h);

        for id in ["r", "a", "b", "c"] {
            assert!(tree.contains(id), "{} should be materialised", id);
        }
        assert_eq!(tree.score_of("b"), None);
        assert_eq!(tree.score_of("c"), Some(2.0));
        assert!(!tree.contains("d"));
        assert_eq!(tree.node_count(), 4);
        assert_eq!(tree.flatten(), m);
    }

    #[test]
    fn test_totals_propagate_up_chain() {
        let h = hierarchy();
        let tree = ScoreTree::build_from_flat(
            &flat(&[("r", 0.0), ("a", 0.0), ("b", 0.0), ("c", 2.0)]),
            &h,
        );
        let totals = tree.totals(DEFAULT_TOTAL_PRECISION);
        for id in ["r", "a", "b", "c"] {
            assert_eq!(totals.total_of(id), Some(2.0), "total of {}", id);
        }
    }

    #[test]
    fn test_totals_sum_own_and_children() {
        let h = hierarchy();
        let tree =
            ScoreTree::build_from_flat(&flat(&[("r", 1.0), ("a", 0.5), ("c", 2.0), ("d", 3.0)]), &h);
        let totals = tree.totals(2);
        assert_eq!(totals.total_of("c"), Some(2.0));
        assert_eq!(totals.total_of("b"), Some(2.0));
        assert_eq!(totals.total_of("a"), Some(2.5));
        assert_eq!(totals.total_of("d"), Some(3.0));
        assert_eq!(totals.total_of("r"), Some(6.5));
    }

    #[test]
    fn test_totals_round_once_after_summation() {
        let h = hierarchy();
        // Rounding each term first would give 0.0 everywhere
        let tree = ScoreTree::build_from_flat(
            &flat(&[("a", 0.004), ("b", 0.004), ("c", 0.004)]),
            &h,
        );
        let totals = tree.totals(2);
        assert_eq!(totals.total_of("r"), Some(0.01));
        assert_eq!(totals.total_of("b"), Some(0.01));
        // Leaf keeps its own explicit score
        assert_eq!(totals.total_of("c"), Some(0.004));
    }

    #[test]
    fn test_totals_do_not_touch_explicit_tree() {
        let h = hierarchy();
        let m = flat(&[("b", 1.0), ("c", 2.0)]);
        let tree = ScoreTree::build_from_flat(&m, &h);
        let _ = tree.totals(2);
        assert_eq!(tree.flatten(), m);
    }

    #[test]
    fn test_non_finite_counts_as_zero_in_totals() {
        let h = hierarchy();
        let tree = ScoreTree::build_from_flat(&flat(&[("b", f64::NAN), ("c", 2.0)]), &h);
        let totals = tree.totals(2);
        assert_eq!(totals.total_of("b"), Some(2.0));
        assert_eq!(totals.total_of("r"), Some(2.0));
    }

    #[test]
    fn test_unknown_ids_dropped() {
        let h = hierarchy();
        let tree = ScoreTree::build_from_flat(&flat(&[("ghost", 4.0), ("c", 1.0)]), &h);
        assert!(!tree.contains("ghost"));
        assert_eq!(tree.flatten(), flat(&[("c", 1.0)]));

        let mut tree = tree;
        assert!(!tree.add_to("ghost", 1.0, &h));
        assert!(!tree.set("ghost", 1.0, &h));
    }

    #[test]
    fn test_build_is_order_independent() {
        let h = hierarchy();
        let entries = vec![
            ("c", 2.0),
            ("a", 1.0),
            ("r", 0.5),
            ("d", -1.0),
            ("s", 7.0),
            ("b", 0.0),
        ];
        let expected = ScoreTree::build_from_flat(&flat(&entries), &h);

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let mut shuffled = entries.clone();
            shuffled.shuffle(&mut rng);
            let mut tree = ScoreTree::new();
            for (id, score) in &shuffled {
                tree.set(id, *score, &h);
            }
            assert_eq!(tree.flatten(), expected.flatten());
            assert_eq!(tree.totals(2), expected.totals(2));
        }
    }

    #[test]
    fn test_add_to_existing_and_placeholder() {
        let h = hierarchy();
        let mut tree = ScoreTree::build_from_flat(&flat(&[("c", 2.0)]), &h);
        assert!(tree.add_to("c", 1.5, &h));
        assert!(tree.add_to("a", -1.0, &h));
        assert!(tree.add_to("d", 4.0, &h));
        assert_eq!(tree.flatten(), flat(&[("a", -1.0), ("c", 3.5), ("d", 4.0)]));

        tree.add_to("d", f64::INFINITY, &h);
        assert_eq!(tree.score_of("d"), Some(4.0));
    }

    #[test]
    fn test_edit_of_clone_leaves_original_untouched() {
        let h = hierarchy();
        let base = ScoreTree::build_from_flat(&flat(&[("c", 2.0), ("s", 1.0)]), &h);
        let mut edited = base.clone();
        assert!(edited.add_to("c", 1.0, &h));

        assert_eq!(base.score_of("c"), Some(2.0));
        assert_eq!(edited.score_of("c"), Some(3.0));
        // Untouched root is shared, not copied
        assert!(Arc::ptr_eq(&base.roots["s"], &edited.roots["s"]));
        assert!(!Arc::ptr_eq(&base.roots["r"], &edited.roots["r"]));
    }

    #[test]
    fn test_cyclic_muscle_is_own_root() {
        let h = MuscleHierarchy::new(vec![
            MuscleRecord::new("x", "X", Some("y")),
            MuscleRecord::new("y", "Y", Some("x")),
        ]);
        let m = flat(&[("x", 1.0), ("y", 2.0)]);
        let tree = ScoreTree::build_from_flat(&m, &h);
        assert_eq!(tree.roots().count(), 2);
        assert_eq!(tree.flatten(), m);
    }

    #[test]
    fn test_rows_depth_first_by_label() {
        let h = MuscleHierarchy::new(vec![
            MuscleRecord::new("legs", "Legs", None),
            MuscleRecord::new("quads", "Quadriceps", Some("legs")),
            MuscleRecord::new("glutes", "Glutes", Some("legs")),
            MuscleRecord::new("arms", "Arms", None),
        ]);
        let tree = ScoreTree::build_from_flat(
            &flat(&[("quads", 3.0), ("glutes", 2.0), ("arms", 1.0)]),
            &h,
        );
        let rows = tree.totals(2).rows(&h);
        let order: Vec<(&str, usize)> = rows.iter().map(|r| (r.id.as_str(), r.depth)).collect();
        assert_eq!(
            order,
            vec![("arms", 0), ("legs", 0), ("glutes", 1), ("quads", 1)]
        );
        assert_eq!(rows[1].total, 5.0);
        assert_eq!(rows[1].explicit, None);
        assert_eq!(rows[1].label, "Legs");
    }

    #[test]
    fn test_totals_to_flat() {
        let h = hierarchy();
        let tree = ScoreTree::build_from_flat(&flat(&[("c", 2.0), ("d", 1.0)]), &h);
        let totals = tree.totals(2).to_flat();
        assert_eq!(
            totals,
            flat(&[("a", 2.0), ("b", 2.0), ("c", 2.0), ("d", 1.0), ("r", 3.0)])
        );
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.1 + 0.2, 2), 0.3);
        assert_eq!(round_to(2.345, 0), 2.0);
        assert_eq!(round_to(-1.005, 1), -1.0);
    }

    #[test]
    fn test_round_to_saturates() {
        assert_eq!(round_to(2.0, 400), 2.0);
        assert_eq!(round_to(0.25, u32::MAX), 0.25);
        assert_eq!(round_to(1e300, 15), 1e300);

        let h = hierarchy();
        let tree = ScoreTree::build_from_flat(&flat(&[("c", 2.0)]), &h);
        let totals = tree.totals(400);
        assert_eq!(totals.total_of("r"), Some(2.0));
        assert_eq!(totals.total_of("a"), Some(2.0));
    }
}
