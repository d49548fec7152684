//! Analysis configuration (YAML) parsing and semantic validation.
//!
//! A single document drives one build: categories and their member
//! processes, systematic uncertainties, the mass-like observable and its
//! binning, the kinematic bins, and the pass/fail tagger threshold.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_yaml_ng::Number;
use tnp_core::{Error, Result};
use tnp_ntuple::{Binning, CmpOp, Cut, FlowPolicy};

use crate::keys::Direction;

/// Name of the observed-data process.
pub const DATA_PROCESS: &str = "data";

/// String-keyed map that keeps document order.
///
/// Category order fixes datacard column order and process indices, so the
/// YAML mapping order must survive deserialization.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<V> OrderedMap<V> {
    /// Value for `key`.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Keys in document order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append or replace an entry.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }
}

impl<V> FromIterator<(String, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut entries: Vec<(String, V)> = Vec::new();
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    if entries.iter().any(|(k, _)| *k == key) {
                        return Err(de::Error::custom(format!("duplicate key '{key}'")));
                    }
                    entries.push((key, value));
                }
                Ok(OrderedMap { entries })
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// A YAML scalar that may be written as a number or as text
/// (`year: 2018`, `size: 1.025`, `size: "1.05/0.95"`).
///
/// Numbers keep their YAML form: `1.0` renders as `1.0`, `1` as `1`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Numeric value.
    Number(Number),
    /// Free text.
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(v) => write!(f, "{v}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// One fit template: a selection plus the processes summed into it.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryConfig {
    /// Selection expression for this category.
    pub cut: String,
    /// Member processes, in summation order.
    pub processes: Vec<String>,
    /// Plot colour.
    #[serde(default)]
    pub color: Option<String>,
    /// Display label.
    #[serde(default)]
    pub propername: Option<String>,
}

/// `distribution:` block.
#[derive(Debug, Clone, Deserialize)]
pub struct DistributionConfig {
    /// Filled (mass-like) observable.
    pub mass_variable: String,
    /// `[min, max]` of the observable axis.
    pub mass_range: [f64; 2],
    /// Number of bins of the observable axis.
    pub mass_bins: usize,
    /// Variable defining the kinematic bins.
    pub pt_variable: String,
    /// Kinematic bins, `[lo, hi]` or `[lo, hi, name]`.
    pub pt_ranges: Vec<PtRange>,
    /// Fold under/overflow into the edge bins.
    #[serde(default)]
    pub fold_flows: bool,
}

/// Raw `pt_ranges` entry. Bounds keep their YAML form so that unnamed
/// bins are called `0to100` or `200.0to300.0` as written.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PtRange {
    /// `[lo, hi, name]`
    Named(Number, Number, String),
    /// `[lo, hi]`
    Bounds(Number, Number),
}

fn edge(n: &Number) -> f64 {
    n.as_f64().unwrap_or(f64::NAN)
}

/// `tagger:` block.
#[derive(Debug, Clone, Deserialize)]
pub struct TaggerConfig {
    /// Tagger label.
    pub name: String,
    /// Discriminant variable.
    pub varname: String,
    /// Pass threshold (`varname >= cut` passes).
    pub cut: f64,
    /// Display label.
    #[serde(default)]
    pub propername: Option<String>,
}

/// How an uncertainty is realised.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum UncertaintyMode {
    /// Shape from reweighting the nominal events (`up`/`down` factor expressions).
    Factor,
    /// Shape from dedicated alternate input files.
    File,
    /// Any other datacard modifier type (`lnN`, `gmN`, ...); rate-only.
    Other(String),
}

impl From<String> for UncertaintyMode {
    fn from(s: String) -> Self {
        match s.as_str() {
            "factor" => UncertaintyMode::Factor,
            "file" => UncertaintyMode::File,
            _ => UncertaintyMode::Other(s),
        }
    }
}

impl UncertaintyMode {
    /// `true` for modes that produce per-bin up/down templates.
    pub fn is_shape(&self) -> bool {
        matches!(self, UncertaintyMode::Factor | UncertaintyMode::File)
    }

    /// Modifier type written in the datacard row.
    pub fn datacard_type(&self) -> &str {
        match self {
            UncertaintyMode::Factor | UncertaintyMode::File => "shape",
            UncertaintyMode::Other(s) => s,
        }
    }
}

/// One systematic uncertainty.
#[derive(Debug, Clone, Deserialize)]
pub struct UncertaintyConfig {
    /// Realisation mode.
    pub mode: UncertaintyMode,
    /// Up-variation weight factor (`factor` mode).
    #[serde(default)]
    pub up: Option<Scalar>,
    /// Down-variation weight factor (`factor` mode).
    #[serde(default)]
    pub down: Option<Scalar>,
    /// Datacard magnitude; defaults to 1.
    #[serde(default)]
    pub size: Option<Scalar>,
    /// Restrict the uncertainty to one category.
    #[serde(default)]
    pub category: Option<String>,
}

impl UncertaintyConfig {
    /// Datacard magnitude column value.
    pub fn size_label(&self) -> String {
        self.size.as_ref().map_or_else(|| "1".to_string(), Scalar::to_string)
    }

    /// Weight factor expression of one direction (`factor` mode).
    pub fn factor(&self, direction: Direction) -> Option<String> {
        match direction {
            Direction::Up => self.up.as_ref(),
            Direction::Down => self.down.as_ref(),
        }
        .map(Scalar::to_string)
    }
}

/// Up/down alternate inputs of a `file`-mode uncertainty.
#[derive(Debug, Clone, Deserialize)]
pub struct UncertaintyFiles {
    /// Inputs of the up variation.
    pub up: Vec<PathBuf>,
    /// Inputs of the down variation.
    pub down: Vec<PathBuf>,
}

/// One process (simulated sample or observed data).
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessConfig {
    /// Nominal inputs.
    pub nominal_files: Vec<PathBuf>,
    /// Extra per-process weight factor.
    #[serde(default)]
    pub additional_weights: Option<String>,
    /// Alternate inputs per `file`-mode uncertainty.
    #[serde(default)]
    pub unc_files: BTreeMap<String, UncertaintyFiles>,
}

/// Top-level analysis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Data-taking period label.
    pub year: Scalar,
    /// Unit of `lumi`.
    pub lumiunit: String,
    /// Integrated luminosity multiplied into every simulated weight.
    pub lumi: f64,
    /// Output subdirectory (defaults to the working directory).
    #[serde(default)]
    pub analysisname: Option<String>,
    /// Fit categories in datacard order.
    pub categories: OrderedMap<CategoryConfig>,
    /// Tree identifier inside every input file.
    pub treename: String,
    /// Selection applied to every extraction.
    pub basecut: String,
    /// Generator weight expression.
    pub genweight: String,
    /// Observable and kinematic binning.
    pub distribution: DistributionConfig,
    /// Pass/fail discriminant.
    pub tagger: TaggerConfig,
    /// Systematic uncertainties in datacard order.
    #[serde(default)]
    pub uncertainties: OrderedMap<UncertaintyConfig>,
    /// Processes, including `data`.
    pub processes: OrderedMap<ProcessConfig>,
    /// Axis label for plot artifacts.
    #[serde(default)]
    pub xlabel: Option<String>,
    /// Write `prefit_<bin>.json` next to every datacard.
    #[serde(default)]
    pub prefit_artifacts: bool,
}

/// A named window of the kinematic variable: `lo <= pt < hi`.
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicBin {
    /// Bin name used in every output name.
    pub name: String,
    /// Inclusive lower edge.
    pub lo: f64,
    /// Exclusive upper edge.
    pub hi: f64,
}

impl KinematicBin {
    /// Selection for this window on `var`.
    pub fn cut(&self, var: &str) -> Cut {
        Cut::Range { var: var.to_string(), lo: self.lo, hi: self.hi }
    }
}

impl AnalysisConfig {
    /// Read and validate a YAML configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let cfg = Self::from_yaml_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Ok(cfg)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let cfg: AnalysisConfig =
            serde_yaml_ng::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Output directory for this analysis relative to `base`.
    pub fn output_dir(&self, base: &Path) -> PathBuf {
        match self.analysisname.as_deref() {
            Some(name) if !name.is_empty() && name != "." => base.join(name),
            _ => base.to_path_buf(),
        }
    }

    /// Observable axis.
    pub fn mass_binning(&self) -> Result<Binning> {
        let [lo, hi] = self.distribution.mass_range;
        Binning::new(self.distribution.mass_bins, lo, hi)
            .map_err(|e| Error::Config(format!("distribution: {e}")))
    }

    /// Under/overflow policy for extraction.
    pub fn flow_policy(&self) -> FlowPolicy {
        if self.distribution.fold_flows { FlowPolicy::Fold } else { FlowPolicy::Drop }
    }

    /// Kinematic bins in configuration order.
    pub fn kinematic_bins(&self) -> Vec<KinematicBin> {
        self.distribution
            .pt_ranges
            .iter()
            .map(|r| match r {
                PtRange::Named(lo, hi, name) => {
                    KinematicBin { name: name.clone(), lo: edge(lo), hi: edge(hi) }
                }
                PtRange::Bounds(lo, hi) => {
                    KinematicBin { name: format!("{lo}to{hi}"), lo: edge(lo), hi: edge(hi) }
                }
            })
            .collect()
    }

    /// Tagger selection for one side of the threshold.
    pub fn tagger_cut(&self, pass: bool) -> Cut {
        Cut::Threshold {
            var: self.tagger.varname.clone(),
            op: if pass { CmpOp::Ge } else { CmpOp::Lt },
            value: self.tagger.cut,
        }
    }

    /// Category names in datacard order.
    pub fn category_names(&self) -> Vec<String> {
        self.categories.keys().map(str::to_string).collect()
    }

    /// Uncertainties that produce shape templates, in declaration order.
    pub fn shape_uncertainties(&self) -> impl Iterator<Item = (&str, &UncertaintyConfig)> {
        self.uncertainties.iter().filter(|(_, u)| u.mode.is_shape())
    }

    /// Simulated processes (everything except `data`), in declaration order.
    pub fn simulated_processes(&self) -> impl Iterator<Item = (&str, &ProcessConfig)> {
        self.processes.iter().filter(|(name, _)| *name != DATA_PROCESS)
    }

    /// The `data` process.
    pub fn data_process(&self) -> Result<&ProcessConfig> {
        self.processes
            .get(DATA_PROCESS)
            .ok_or_else(|| Error::Config(format!("processes: missing '{DATA_PROCESS}' entry")))
    }

    /// `true` if `process` contributes to `category`.
    pub fn is_member(&self, category: &str, process: &str) -> bool {
        self.categories.get(category).is_some_and(|c| c.processes.iter().any(|p| p == process))
    }

    /// Semantic checks that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(Error::Config("categories: at least one category is required".into()));
        }
        self.mass_binning()?;
        self.data_process()?;

        if self.distribution.pt_ranges.is_empty() {
            return Err(Error::Config("distribution.pt_ranges: must not be empty".into()));
        }
        let mut seen = Vec::new();
        for bin in self.kinematic_bins() {
            if bin.lo.partial_cmp(&bin.hi) != Some(std::cmp::Ordering::Less) {
                return Err(Error::Config(format!(
                    "distribution.pt_ranges: '{}' has lo >= hi ({} >= {})",
                    bin.name, bin.lo, bin.hi
                )));
            }
            if seen.contains(&bin.name) {
                return Err(Error::Config(format!(
                    "distribution.pt_ranges: duplicate bin name '{}'",
                    bin.name
                )));
            }
            seen.push(bin.name);
        }

        for (cat, cfg) in self.categories.iter() {
            if cfg.processes.is_empty() {
                return Err(Error::Config(format!("categories.{cat}: no member processes")));
            }
            for p in &cfg.processes {
                if p == DATA_PROCESS {
                    return Err(Error::Config(format!(
                        "categories.{cat}: '{DATA_PROCESS}' cannot be a category member"
                    )));
                }
                if !self.processes.contains_key(p) {
                    return Err(Error::Config(format!(
                        "categories.{cat}: unknown process '{p}'"
                    )));
                }
            }
        }

        for (name, unc) in self.uncertainties.iter() {
            if let Some(cat) = &unc.category
                && !self.categories.contains_key(cat)
            {
                return Err(Error::Config(format!(
                    "uncertainties.{name}: unknown category '{cat}'"
                )));
            }
            match unc.mode {
                UncertaintyMode::Factor if unc.up.is_none() || unc.down.is_none() => {
                    return Err(Error::Config(format!(
                        "uncertainties.{name}: factor mode needs both 'up' and 'down'"
                    )));
                }
                UncertaintyMode::File => {
                    for (pname, process) in self.simulated_processes() {
                        if !process.unc_files.contains_key(name) {
                            return Err(Error::Config(format!(
                                "processes.{pname}.unc_files: missing entry for '{name}'"
                            )));
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MINIMAL;

    #[test]
    fn parses_minimal_config() {
        let cfg = AnalysisConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(cfg.year.to_string(), "2018");
        assert_eq!(cfg.category_names(), vec!["sig"]);
        let sig = cfg.categories.get("sig").unwrap();
        assert_eq!(sig.color.as_deref(), Some("#ff0000"));
        assert_eq!(sig.propername.as_deref(), Some("Signal"));
        let bins = cfg.kinematic_bins();
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].name, "0to100");
        assert_eq!(cfg.mass_binning().unwrap(), Binning::new(10, 0.0, 200.0).unwrap());
        assert_eq!(cfg.flow_policy(), FlowPolicy::Drop);
        assert_eq!(cfg.uncertainties.get("lumi").unwrap().size_label(), "1.025");
        assert_eq!(cfg.shape_uncertainties().count(), 0);
        assert_eq!(cfg.simulated_processes().count(), 1);
        assert!(cfg.is_member("sig", "mc"));
        assert!(!cfg.is_member("sig", "data"));
        assert_eq!(cfg.output_dir(Path::new("/out")), PathBuf::from("/out"));
    }

    #[test]
    fn keeps_category_order_and_named_bins() {
        let yaml = MINIMAL
            .replace(
                "categories:\n  sig:",
                "categories:\n  zz_bkg:\n    cut: \"1\"\n    processes: [mc]\n  sig:",
            )
            .replace("    - [0, 100]", "    - [0, 100]\n    - [100, 250.5, high]");
        let cfg = AnalysisConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(cfg.category_names(), vec!["zz_bkg", "sig"]);
        let names: Vec<String> = cfg.kinematic_bins().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["0to100", "high"]);
    }

    #[test]
    fn unnamed_bins_keep_written_bounds() {
        let yaml = MINIMAL.replace("    - [0, 100]", "    - [0, 100]\n    - [200.0, 300.0]\n    - [300, 450.5]");
        let cfg = AnalysisConfig::from_yaml_str(&yaml).unwrap();
        let bins = cfg.kinematic_bins();
        let names: Vec<&str> = bins.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["0to100", "200.0to300.0", "300to450.5"]);
        assert_eq!(bins[1].lo, 200.0);
        assert_eq!(bins[2].hi, 450.5);
    }

    #[test]
    fn numeric_sizes_render_as_written() {
        let yaml = MINIMAL.replace(
            "    size: 1.025\n",
            "    size: 1.025\n  flat:\n    mode: lnN\n    size: 1.0\n  whole:\n    mode: lnN\n    size: 2\n",
        );
        let cfg = AnalysisConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(cfg.uncertainties.get("flat").unwrap().size_label(), "1.0");
        assert_eq!(cfg.uncertainties.get("whole").unwrap().size_label(), "2");

        let yaml = MINIMAL.replace(
            "    mode: lnN\n    size: 1.025",
            "    mode: factor\n    up: 1.0\n    down: 0.5",
        );
        let cfg = AnalysisConfig::from_yaml_str(&yaml).unwrap();
        let lumi = cfg.uncertainties.get("lumi").unwrap();
        assert_eq!(lumi.factor(Direction::Up).as_deref(), Some("1.0"));
    }

    #[test]
    fn modes_and_tagger_cuts() {
        assert_eq!(UncertaintyMode::from("factor".to_string()), UncertaintyMode::Factor);
        assert_eq!(UncertaintyMode::from("file".to_string()), UncertaintyMode::File);
        let lnn = UncertaintyMode::from("lnN".to_string());
        assert!(!lnn.is_shape());
        assert_eq!(lnn.datacard_type(), "lnN");
        assert_eq!(UncertaintyMode::File.datacard_type(), "shape");

        let cfg = AnalysisConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(cfg.tagger_cut(true).to_string(), "score>=0.5");
        assert_eq!(cfg.tagger_cut(false).to_string(), "score<0.5");
    }

    #[test]
    fn rejects_unknown_member_process() {
        let yaml = MINIMAL.replace("processes: [mc]", "processes: [mc, ttbar]");
        let err = AnalysisConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("unknown process 'ttbar'"), "{err}");
    }

    #[test]
    fn rejects_unknown_uncertainty_category() {
        let yaml = MINIMAL.replace("    size: 1.025", "    size: 1.025\n    category: bkg");
        let err = AnalysisConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("unknown category 'bkg'"), "{err}");
    }

    #[test]
    fn rejects_file_mode_without_inputs() {
        let yaml = MINIMAL.replace("    mode: lnN\n    size: 1.025", "    mode: file");
        let err = AnalysisConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("processes.mc.unc_files"), "{err}");
    }

    #[test]
    fn rejects_factor_mode_without_expressions() {
        let yaml = MINIMAL.replace("    mode: lnN\n    size: 1.025", "    mode: factor\n    up: \"2.0\"");
        assert!(AnalysisConfig::from_yaml_str(&yaml).is_err());

        let yaml = MINIMAL.replace(
            "    mode: lnN\n    size: 1.025",
            "    mode: factor\n    up: \"2.0\"\n    down: 0.5",
        );
        let cfg = AnalysisConfig::from_yaml_str(&yaml).unwrap();
        let lumi = cfg.uncertainties.get("lumi").unwrap();
        assert_eq!(lumi.factor(Direction::Up).as_deref(), Some("2.0"));
        assert_eq!(lumi.factor(Direction::Down).as_deref(), Some("0.5"));
        assert_eq!(cfg.shape_uncertainties().count(), 1);
    }

    #[test]
    fn rejects_missing_data_and_bad_binning() {
        let yaml = MINIMAL.replace("  data:\n    nominal_files: [data.parquet]\n", "");
        assert!(AnalysisConfig::from_yaml_str(&yaml).is_err());

        let yaml = MINIMAL.replace("mass_bins: 10", "mass_bins: 0");
        assert!(AnalysisConfig::from_yaml_str(&yaml).is_err());

        let yaml = MINIMAL.replace("    - [0, 100]", "    - [100, 100]");
        assert!(AnalysisConfig::from_yaml_str(&yaml).is_err());

        let yaml = MINIMAL.replace("    - [0, 100]", "    - [0, 100]\n    - [0, 100]");
        let err = AnalysisConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate bin name"), "{err}");
    }

    #[test]
    fn rejects_missing_required_key() {
        let yaml = MINIMAL.replace("treename: Events\n", "");
        let err = AnalysisConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("treename"), "{err}");
    }

    #[test]
    fn ordered_map_rejects_duplicate_keys() {
        let parsed: std::result::Result<OrderedMap<u32>, _> = serde_yaml_ng::from_str("a: 1\na: 2\n");
        assert!(parsed.is_err());
        let map: OrderedMap<u32> = serde_yaml_ng::from_str("b: 1\na: 2\n").unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn analysis_name_selects_subdirectory() {
        let yaml = format!("analysisname: run2\n{MINIMAL}");
        let cfg = AnalysisConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(cfg.output_dir(Path::new("/out")), PathBuf::from("/out/run2"));
    }
}
