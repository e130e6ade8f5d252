//! Text and JSON rendering of engine results

use crate::OutputFormat;
use anyhow::Result;
use flexion_core::hierarchy::group_by_root;
use flexion_core::{
    AxisSelection, Catalog, Composition, DeltaRuleStore, EngineConfig, FlatScores,
    InheritanceResolver, MotionId, MuscleId, Resolution, ResolutionSource, TotalRow,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

const LABEL_WIDTH: usize = 40;

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn describe_source(source: &ResolutionSource) -> String {
    match source {
        ResolutionSource::Explicit { motion } => format!("custom deltas on '{}'", motion),
        ResolutionSource::PrimaryFallback { motion } => {
            format!("reached primary '{}' without custom deltas", motion)
        }
        ResolutionSource::NoOverride { motion } => format!("no entry on '{}'", motion),
        ResolutionSource::CycleDetected { motion } => {
            format!("cyclic parentage at '{}'", motion)
        }
    }
}

fn write_deltas(out: &mut String, deltas: &FlatScores) {
    if deltas.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for (muscle_id, delta) in deltas {
        let _ = writeln!(out, "  {:<30} {:+}", muscle_id, delta);
    }
}

#[derive(Serialize)]
struct AxisReport<'a> {
    selection: String,
    resolution: Option<&'a Resolution>,
    applied: &'a FlatScores,
}

#[derive(Serialize)]
struct CompositionReport<'a> {
    motion_id: &'a str,
    catalog_version: &'a str,
    axes: Vec<AxisReport<'a>>,
    totals: Vec<TotalRow>,
    scores: FlatScores,
}

pub fn render_composition(
    catalog: &Catalog,
    composition: &Composition,
    flat: bool,
    config: &EngineConfig,
    format: OutputFormat,
) -> Result<String> {
    let scores = composition.flat();

    if format == OutputFormat::Json {
        if flat {
            return to_json(&scores);
        }
        let report = CompositionReport {
            motion_id: &composition.motion_id,
            catalog_version: catalog.version(),
            axes: composition
                .axes
                .iter()
                .map(|a| AxisReport {
                    selection: a.selection.to_string(),
                    resolution: a.resolution.as_ref(),
                    applied: &a.applied,
                })
                .collect(),
            totals: composition.totals.rows(catalog.muscles()),
            scores,
        };
        return to_json(&report);
    }

    let mut out = String::new();
    if flat {
        for (muscle_id, score) in &scores {
            let _ = writeln!(out, "{}\t{}", muscle_id, score);
        }
        return Ok(out);
    }

    let label = catalog
        .motions()
        .get(&composition.motion_id)
        .map(|m| m.label.as_str())
        .unwrap_or("");
    let _ = writeln!(out, "{} [{}]", label, composition.motion_id);

    if !composition.axes.is_empty() {
        let _ = writeln!(out, "\nAxes:");
        for axis in &composition.axes {
            match &axis.resolution {
                Some(r) => {
                    let _ = writeln!(
                        out,
                        "  {}: {} ({}), {} deltas applied",
                        axis.selection,
                        r.provenance.join(" -> "),
                        describe_source(&r.source),
                        axis.applied.len()
                    );
                }
                None => {
                    let _ = writeln!(out, "  {}: unknown axis row, ignored", axis.selection);
                }
            }
        }
    }

    let _ = writeln!(out, "\nTotals:");
    let precision = config.total_precision as usize;
    for row in composition.totals.rows(catalog.muscles()) {
        let name = format!("{:indent$}{} [{}]", "", row.label, row.id, indent = row.depth * 2);
        let _ = write!(
            out,
            "  {:<width$} {:>10.prec$}",
            name,
            row.total,
            width = LABEL_WIDTH,
            prec = precision
        );
        if let Some(explicit) = row.explicit {
            if !row_is_leaf(&row, composition) {
                let _ = write!(out, "  (own {})", explicit);
            }
        }
        let _ = writeln!(out);
    }
    Ok(out)
}

fn row_is_leaf(row: &TotalRow, composition: &Composition) -> bool {
    composition
        .tree
        .node(&row.id)
        .map(|n| n.is_leaf())
        .unwrap_or(true)
}

#[derive(Serialize)]
struct ResolutionReport<'a> {
    motion_id: &'a str,
    selection: String,
    #[serde(flatten)]
    resolution: &'a Resolution,
}

pub fn render_resolution(
    motion_id: &str,
    selection: &AxisSelection,
    resolution: &Resolution,
    format: OutputFormat,
) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(&ResolutionReport {
            motion_id,
            selection: selection.to_string(),
            resolution,
        });
    }

    let mut out = String::new();
    let _ = writeln!(out, "{} on {}", selection, motion_id);
    let _ = writeln!(out, "Provenance: {}", resolution.provenance.join(" -> "));
    let _ = writeln!(out, "Source: {}", describe_source(&resolution.source));
    let _ = writeln!(out, "Deltas:");
    write_deltas(&mut out, &resolution.deltas);
    Ok(out)
}

/// Where one muscle sits in the hierarchy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathReport {
    pub muscle_id: MuscleId,
    pub label: String,
    pub root: MuscleId,
    /// Root first; empty when the ancestry is cyclic
    pub path: Vec<MuscleId>,
    pub depth: usize,
    pub in_cycle: bool,
    pub children: Vec<MuscleId>,
}

impl PathReport {
    /// `None` for a muscle the catalog does not know
    pub fn new(catalog: &Catalog, muscle_id: &str) -> Option<Self> {
        let muscles = catalog.muscles();
        let record = muscles.get(muscle_id)?;
        let root = muscles.root_of(muscle_id);
        Some(Self {
            muscle_id: record.id.clone(),
            label: record.label.clone(),
            depth: muscles.depth_under_root(muscle_id, &root),
            path: muscles.path_to_root(muscle_id),
            in_cycle: muscles.is_in_cycle(muscle_id),
            children: muscles.children_of(muscle_id).to_vec(),
            root,
        })
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        if format == OutputFormat::Json {
            return to_json(self);
        }
        let mut out = String::new();
        let _ = writeln!(out, "{} [{}]", self.label, self.muscle_id);
        if self.in_cycle {
            let _ = writeln!(out, "Path: cyclic ancestry, effective root '{}'", self.root);
        } else {
            let _ = writeln!(out, "Path: {}", self.path.join(" > "));
        }
        let _ = writeln!(out, "Depth: {}", self.depth);
        if !self.children.is_empty() {
            let _ = writeln!(out, "Children: {}", self.children.join(", "));
        }
        Ok(out)
    }
}

/// Catalog health summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckReport {
    pub version: String,
    pub muscles: usize,
    pub motions: usize,
    pub axes: usize,
    pub rows: usize,
    pub rejected_entries: usize,
    /// Variations of each motion that has any, sorted by label
    pub variations: BTreeMap<MotionId, Vec<MotionId>>,
    /// Cyclic muscles grouped by the effective root they reduce to
    pub muscle_cycles: BTreeMap<MuscleId, Vec<MuscleId>>,
    pub dangling_muscle_parents: Vec<MuscleId>,
    pub cyclic_motions: Vec<MotionId>,
    pub dangling_motion_parents: Vec<MotionId>,
}

impl CheckReport {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let muscles = catalog.muscles();
        let cyclic = muscles.cyclic_ids();

        // An empty store walks every motion all the way up its ancestry
        let empty = DeltaRuleStore::new();
        let resolver = InheritanceResolver::new(catalog.motions());
        let mut cyclic_motions: Vec<MotionId> = catalog
            .motions()
            .records()
            .filter(|m| {
                matches!(
                    resolver.resolve(&empty, &m.id).source,
                    ResolutionSource::CycleDetected { .. }
                )
            })
            .map(|m| m.id.clone())
            .collect();
        cyclic_motions.sort();

        let variations = catalog
            .motions()
            .records()
            .filter_map(|m| {
                let list = catalog.motions().variations_of(&m.id);
                (!list.is_empty()).then(|| (m.id.clone(), list.to_vec()))
            })
            .collect();

        Self {
            version: catalog.version().to_string(),
            muscles: muscles.len(),
            motions: catalog.motions().len(),
            axes: catalog.axes().count(),
            rows: catalog.axes().map(|a| a.len()).sum(),
            rejected_entries: catalog.rejected_entries(),
            variations,
            muscle_cycles: group_by_root(muscles, cyclic.iter().map(String::as_str)),
            dangling_muscle_parents: muscles.dangling_ids(),
            cyclic_motions,
            dangling_motion_parents: catalog.motions().dangling_ids(),
        }
    }

    /// No anomalies and nothing rejected at load
    pub fn is_clean(&self) -> bool {
        self.rejected_entries == 0
            && self.muscle_cycles.is_empty()
            && self.dangling_muscle_parents.is_empty()
            && self.cyclic_motions.is_empty()
            && self.dangling_motion_parents.is_empty()
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        if format == OutputFormat::Json {
            return to_json(self);
        }
        let mut out = String::new();
        let _ = writeln!(out, "Catalog {}", self.version);
        let _ = writeln!(
            out,
            "{} muscles, {} motions, {} axes ({} rows)",
            self.muscles, self.motions, self.axes, self.rows
        );
        if self.rejected_entries > 0 {
            let _ = writeln!(out, "Rejected at load: {}", self.rejected_entries);
        }
        for (motion_id, ids) in &self.variations {
            let _ = writeln!(out, "Variations of {}: {}", motion_id, ids.join(", "));
        }
        for (root, ids) in &self.muscle_cycles {
            let _ = writeln!(out, "Muscle cycle (effective root {}): {}", root, ids.join(", "));
        }
        if !self.dangling_muscle_parents.is_empty() {
            let _ = writeln!(
                out,
                "Muscles with missing parent: {}",
                self.dangling_muscle_parents.join(", ")
            );
        }
        if !self.cyclic_motions.is_empty() {
            let _ = writeln!(out, "Cyclic motions: {}", self.cyclic_motions.join(", "));
        }
        if !self.dangling_motion_parents.is_empty() {
            let _ = writeln!(
                out,
                "Motions with missing parent: {}",
                self.dangling_motion_parents.join(", ")
            );
        }
        if self.is_clean() {
            let _ = writeln!(out, "OK");
        }
        Ok(out)
    }
}
