//! # tnp-ntuple
//!
//! Event-tree access for the datacard builder: a small expression engine,
//! typed cuts and weights, the [`EventSource`] collaborator trait with a
//! Parquet implementation, and [`extract_histogram`], which projects a
//! weighted selection of one tree into an owned [`Histogram`].
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use tnp_ntuple::{Binning, Cut, ExtractRequest, FlowPolicy, ParquetSource, Weight, extract_histogram};
//!
//! let cut = Cut::all([Cut::expr("nJet >= 1"), Cut::Range { var: "pt".into(), lo: 200.0, hi: 300.0 }]);
//! let weight = Weight::constant(41.5).times("genWeight");
//! let h = extract_histogram(&ParquetSource::new(), &ExtractRequest {
//!     path: Path::new("ttbar.parquet"),
//!     tree: "Events",
//!     variable: "jet_mass",
//!     selection: &cut,
//!     weight: &weight,
//!     name: "ttbar_pass".into(),
//!     binning: Binning::new(20, 0.0, 200.0).unwrap(),
//!     flow_policy: FlowPolicy::Drop,
//! }).unwrap();
//! println!("{} events", h.integral());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cut;
pub mod expr;
pub mod extract;
pub mod filler;
pub mod histogram;
pub mod parquet;
pub mod source;

pub use cut::{CmpOp, Cut, Weight, WeightFactor};
pub use expr::CompiledExpr;
pub use extract::{ExtractRequest, extract_histogram};
pub use filler::{FlowPolicy, HistogramSpec, fill_histogram, fill_histograms};
pub use histogram::{BinLocation, Binning, Histogram};
pub use parquet::{META_KEY_TREE_NAME, ParquetSource, write_tree_parquet};
pub use source::{Columns, EventBatch, EventSource, MemorySource};
