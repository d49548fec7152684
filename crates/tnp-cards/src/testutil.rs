//! Fixtures shared by the unit tests of this crate.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use tnp_core::Result;
use tnp_ntuple::{EventBatch, EventSource, MemorySource};

use crate::config::AnalysisConfig;

/// One kinematic bin `[0, 100)`, one category `sig` holding `mc`,
/// 10 mass bins over `[0, 200)`, tagger threshold 0.5.
pub(crate) const MINIMAL: &str = r##"
year: 2018
lumiunit: fb
lumi: 1.0
categories:
  sig:
    cut: "isSig == 1"
    processes: [mc]
    color: "#ff0000"
    propername: Signal
treename: Events
basecut: "nJet >= 1"
genweight: genWeight
distribution:
  mass_variable: mass
  mass_range: [0, 200]
  mass_bins: 10
  pt_variable: pt
  pt_ranges:
    - [0, 100]
tagger:
  name: demo
  varname: score
  cut: 0.5
uncertainties:
  lumi:
    mode: lnN
    size: 1.025
processes:
  mc:
    nominal_files: [mc.parquet]
  data:
    nominal_files: [data.parquet]
"##;

pub(crate) fn minimal_config() -> AnalysisConfig {
    AnalysisConfig::from_yaml_str(MINIMAL).unwrap()
}

/// Columns of a tree that is flat in `mass` over `[0, 200)`: every one of
/// the ten bins gets `n_pass` tagged and `n_fail` untagged events inside
/// `pt in [0, 100)`, plus one event per bin outside the kinematic window.
pub(crate) fn flat_tree(n_pass: usize, n_fail: usize, weight: f64) -> Vec<(String, Vec<f64>)> {
    let mut mass = Vec::new();
    let mut pt = Vec::new();
    let mut score = Vec::new();
    for bin in 0..10 {
        let centre = 10.0 + 20.0 * bin as f64;
        for i in 0..(n_pass + n_fail + 1) {
            mass.push(centre);
            if i < n_pass {
                pt.push(50.0);
                score.push(0.9);
            } else if i < n_pass + n_fail {
                pt.push(50.0);
                score.push(0.1);
            } else {
                pt.push(150.0);
                score.push(0.9);
            }
        }
    }
    let n = mass.len();
    vec![
        ("mass".to_string(), mass),
        ("pt".to_string(), pt),
        ("score".to_string(), score),
        ("genWeight".to_string(), vec![weight; n]),
        ("isSig".to_string(), vec![1.0; n]),
        ("nJet".to_string(), vec![2.0; n]),
    ]
}

/// [`MemorySource`] wrapper that records every read.
#[derive(Debug, Default)]
pub(crate) struct CountingSource {
    pub(crate) inner: MemorySource,
    reads: RefCell<Vec<(PathBuf, Vec<String>)>>,
}

impl CountingSource {
    /// `mc.parquet` yields 10 pass / 2 fail per bin, `data.parquet`
    /// 12 pass / 3 fail per bin.
    pub(crate) fn minimal() -> Self {
        let mut inner = MemorySource::new();
        inner.insert_tree("mc.parquet", "Events", flat_tree(10, 2, 1.0)).unwrap();
        inner.insert_tree("data.parquet", "Events", flat_tree(12, 3, 1.0)).unwrap();
        Self { inner, reads: RefCell::default() }
    }

    pub(crate) fn calls(&self) -> usize {
        self.reads.borrow().len()
    }

    pub(crate) fn calls_for(&self, path: &str) -> usize {
        self.reads.borrow().iter().filter(|(p, _)| p == Path::new(path)).count()
    }

    pub(crate) fn requested_branches(&self) -> Vec<Vec<String>> {
        self.reads.borrow().iter().map(|(_, b)| b.clone()).collect()
    }
}

impl EventSource for CountingSource {
    fn read_branches(&self, path: &Path, tree: &str, branches: &[String]) -> Result<EventBatch> {
        self.reads.borrow_mut().push((path.to_path_buf(), branches.to_vec()));
        self.inner.read_branches(path, tree, branches)
    }
}
