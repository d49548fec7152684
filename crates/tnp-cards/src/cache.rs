//! Flat histogram table and the per-process cache builder.
//!
//! Instead of `file -> bin -> category -> tag` nested maps, every extracted
//! histogram lives in one [`HistogramTable`] keyed by [`LeafKey`]. A
//! per-process cache is simply the table produced for one
//! `(process, variant)` pair.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::{Path, PathBuf};

use tnp_core::{Error, Result};
use tnp_ntuple::{
    Binning, Cut, EventSource, ExtractRequest, FlowPolicy, Histogram, Weight, extract_histogram,
};

use crate::config::{AnalysisConfig, KinematicBin};
use crate::keys::{LeafKey, Tag, Variant};

/// Extracted histograms keyed by their composite identity.
#[derive(Debug, Clone, Default)]
pub struct HistogramTable {
    leaves: BTreeMap<LeafKey, Histogram>,
}

impl HistogramTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `hist` under `key`. A key can only be filled once per run.
    pub fn insert(&mut self, key: LeafKey, hist: Histogram) -> Result<()> {
        match self.leaves.entry(key) {
            Entry::Occupied(e) => Err(Error::Validation(format!(
                "histogram '{}' produced twice",
                e.key().name()
            ))),
            Entry::Vacant(e) => {
                e.insert(hist);
                Ok(())
            }
        }
    }

    /// Move every leaf of `other` into `self`.
    pub fn merge(&mut self, other: HistogramTable) -> Result<()> {
        for (key, hist) in other.leaves {
            self.insert(key, hist)?;
        }
        Ok(())
    }

    /// Leaf stored under `key`.
    pub fn get(&self, key: &LeafKey) -> Option<&Histogram> {
        self.leaves.get(key)
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// `true` when nothing was extracted.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// All leaves in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&LeafKey, &Histogram)> {
        self.leaves.iter()
    }

    /// Leaves belonging to kinematic bin `bin`.
    pub fn in_bin<'a>(&'a self, bin: &'a str) -> impl Iterator<Item = (&'a LeafKey, &'a Histogram)> {
        self.leaves.iter().filter(move |(k, _)| k.bin == bin)
    }

    /// Every file's leaf for one `(process, variant, bin, category, tag)` cell,
    /// in file order.
    pub fn file_leaves(
        &self,
        process: &str,
        variant: &Variant,
        bin: &str,
        category: Option<&str>,
        tag: Tag,
    ) -> Vec<&Histogram> {
        self.leaves
            .iter()
            .filter(|(k, _)| {
                k.process == process
                    && k.variant == *variant
                    && k.bin == bin
                    && k.category.as_deref() == category
                    && k.tag == tag
            })
            .map(|(_, h)| h)
            .collect()
    }

    /// `true` if any leaf of `process` exists for `category`.
    pub fn has_category(&self, process: &str, category: &str) -> bool {
        self.leaves
            .keys()
            .any(|k| k.process == process && k.category.as_deref() == Some(category))
    }
}

/// Run-wide extraction settings derived once from the configuration.
#[derive(Debug, Clone)]
pub struct ExtractionPlan {
    /// Tree identifier in every input file.
    pub tree: String,
    /// Filled observable.
    pub variable: String,
    /// Observable axis.
    pub binning: Binning,
    /// Under/overflow handling.
    pub flow_policy: FlowPolicy,
    /// Selection shared by every extraction.
    pub base_cut: Cut,
    /// Variable the kinematic bins cut on.
    pub kinematic_variable: String,
    /// Kinematic bins in configuration order.
    pub bins: Vec<KinematicBin>,
    /// Category name to category selection, in datacard order.
    pub categories: Vec<(String, Cut)>,
    /// Pass-side tagger selection.
    pub pass_cut: Cut,
    /// Fail-side tagger selection.
    pub fail_cut: Cut,
}

impl ExtractionPlan {
    /// Derive the plan from a validated configuration.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self {
            tree: config.treename.clone(),
            variable: config.distribution.mass_variable.clone(),
            binning: config.mass_binning()?,
            flow_policy: config.flow_policy(),
            base_cut: Cut::expr(config.basecut.clone()),
            kinematic_variable: config.distribution.pt_variable.clone(),
            bins: config.kinematic_bins(),
            categories: config
                .categories
                .iter()
                .map(|(name, cat)| (name.to_string(), Cut::expr(cat.cut.clone())))
                .collect(),
            pass_cut: config.tagger_cut(true),
            fail_cut: config.tagger_cut(false),
        })
    }

    /// Tagger selection for `tag`.
    pub fn tag_cut(&self, tag: Tag) -> &Cut {
        match tag {
            Tag::Pass => &self.pass_cut,
            Tag::Fail => &self.fail_cut,
        }
    }

    /// `base && category && kinematic window && tagger`; the category part
    /// is omitted for data.
    pub fn selection(&self, category: Option<&Cut>, bin: &KinematicBin, tag: Tag) -> Cut {
        Cut::all([
            self.base_cut.clone(),
            category.cloned().unwrap_or(Cut::True),
            bin.cut(&self.kinematic_variable),
            self.tag_cut(tag).clone(),
        ])
    }

    fn extract(
        &self,
        source: &dyn EventSource,
        path: &Path,
        selection: &Cut,
        weight: &Weight,
        name: String,
    ) -> Result<Histogram> {
        extract_histogram(
            source,
            &ExtractRequest {
                path,
                tree: &self.tree,
                variable: &self.variable,
                selection,
                weight,
                name,
                binning: self.binning,
                flow_policy: self.flow_policy,
            },
        )
    }
}

/// One `(process, variant)` cache request.
#[derive(Debug, Clone)]
pub struct CacheRequest<'a> {
    /// Process name.
    pub process: &'a str,
    /// Input files of this variant.
    pub files: &'a [PathBuf],
    /// Per-event weight of this variant.
    pub weight: &'a Weight,
    /// Variant label, used for naming and keying.
    pub variant: &'a Variant,
    /// Categories the process is a member of.
    pub member_of: &'a [String],
}

/// Build the cache of one simulated process for one variant.
///
/// For every file, kinematic bin and member category, two extractions are
/// issued (pass and fail). Categories the process does not belong to are
/// skipped entirely; no extraction call is made for them.
pub fn fill_process_cache(
    source: &dyn EventSource,
    plan: &ExtractionPlan,
    request: &CacheRequest<'_>,
) -> Result<HistogramTable> {
    let mut table = HistogramTable::new();
    for (file_index, path) in request.files.iter().enumerate() {
        tracing::debug!(
            process = request.process,
            variant = %request.variant,
            path = %path.display(),
            "filling process cache"
        );
        for bin in &plan.bins {
            for (category, category_cut) in &plan.categories {
                if !request.member_of.iter().any(|c| c == category) {
                    continue;
                }
                for tag in Tag::ALL {
                    let key = LeafKey::simulated(
                        request.process,
                        request.variant,
                        file_index,
                        &bin.name,
                        category,
                        tag,
                    );
                    let selection = plan.selection(Some(category_cut), bin, tag);
                    let hist = plan.extract(source, path, &selection, request.weight, key.name())?;
                    table.insert(key, hist)?;
                }
            }
        }
    }
    Ok(table)
}

/// Build the per-file data leaves: unit weight, no category selection.
pub fn fill_data_cache(
    source: &dyn EventSource,
    plan: &ExtractionPlan,
    process: &str,
    files: &[PathBuf],
) -> Result<HistogramTable> {
    let weight = Weight::unit();
    let mut table = HistogramTable::new();
    for (file_index, path) in files.iter().enumerate() {
        tracing::debug!(path = %path.display(), "filling data cache");
        for bin in &plan.bins {
            for tag in Tag::ALL {
                let key = LeafKey::data(process, file_index, &bin.name, tag);
                let selection = plan.selection(None, bin, tag);
                let hist = plan.extract(source, path, &selection, &weight, key.name())?;
                table.insert(key, hist)?;
            }
        }
    }
    Ok(table)
}
