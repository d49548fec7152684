//! # tnp-cards
//!
//! Histogram aggregation and datacard emission for tag-and-probe template
//! fits.
//!
//! Given an [`AnalysisConfig`], the pipeline extracts one leaf histogram per
//! `(process, variant, file, kinematic bin, category, tag)`, sums the
//! leaves into per-category templates and per-bin observed data, and writes
//! for every kinematic bin a histogram container, a datacard that refers to
//! it, and optionally a prefit comparison artifact. A shell script that
//! converts every card into a fit workspace is written last.
//!
//! ```no_run
//! use std::path::Path;
//! use tnp_cards::{AnalysisConfig, RunOptions, run_build};
//! use tnp_ntuple::ParquetSource;
//!
//! let config = AnalysisConfig::from_path(Path::new("analysis.yaml")).unwrap();
//! let summary = run_build(&config, &RunOptions::default(), &ParquetSource::new()).unwrap();
//! for bin in &summary.bins {
//!     println!("{}: norm = {:.6}", bin.bin, bin.norm);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Category and data sums over leaf histograms.
pub mod aggregate;
/// Leaf histogram table and the per-process cache.
pub mod cache;
/// Summing histograms with identical binning.
pub mod combine;
/// YAML analysis configuration.
pub mod config;
/// Per-kinematic-bin histogram container.
pub mod container;
/// Datacard text.
pub mod datacard;
/// Composite keys and canonical histogram names.
pub mod keys;
/// Per-process variant expansion and table building.
pub mod orchestrator;
/// End-to-end build.
pub mod pipeline;
/// Prefit comparison artifact.
pub mod prefit;
/// Workspace conversion script.
pub mod script;
/// Parquet histogram files.
pub mod store;

#[cfg(test)]
mod testutil;

pub use aggregate::{CategoryTotals, DataTotals, aggregate_categories, aggregate_data};
pub use cache::{CacheRequest, ExtractionPlan, HistogramTable, fill_data_cache, fill_process_cache};
pub use combine::combine_histograms;
pub use config::{AnalysisConfig, DATA_PROCESS, KinematicBin, OrderedMap, UncertaintyConfig, UncertaintyMode};
pub use container::{AnalysisHistograms, SANITIZE_FLOOR};
pub use datacard::{DatacardYields, NORM_PARAM, render_datacard, write_datacard};
pub use keys::{Direction, LeafKey, Tag, Variant};
pub use orchestrator::{ExtractedTables, build_tables};
pub use pipeline::{BinOutputs, BuildSummary, RunOptions, run_build};
pub use prefit::{PrefitArtifact, prefit_artifact, write_prefit_artifact};
pub use script::{SCRIPT_NAME, render_workspace_script, write_workspace_script};
pub use store::{read_histograms, write_histograms};
