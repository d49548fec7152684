//! Category aggregation: fold per-process, per-file leaves into one total
//! per category, variant, kinematic bin and tag. Process identity is gone
//! after this step.

use std::collections::BTreeMap;

use tnp_core::{Error, Result};
use tnp_ntuple::Histogram;

use crate::cache::{ExtractionPlan, HistogramTable};
use crate::combine::combine_histograms;
use crate::config::{AnalysisConfig, DATA_PROCESS};
use crate::keys::{Direction, Tag, Variant, category_histogram_name, data_histogram_name};

/// Key of a category total.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TotalKey {
    /// Category name.
    pub category: String,
    /// Nominal or shifted.
    pub variant: Variant,
    /// Kinematic bin name.
    pub bin: String,
    /// Pass/fail channel.
    pub tag: Tag,
}

/// Per-category totals of one run.
#[derive(Debug, Clone, Default)]
pub struct CategoryTotals {
    totals: BTreeMap<TotalKey, Histogram>,
}

impl CategoryTotals {
    /// Total for one cell.
    pub fn get(&self, category: &str, variant: &Variant, bin: &str, tag: Tag) -> Result<&Histogram> {
        let key = TotalKey {
            category: category.to_string(),
            variant: variant.clone(),
            bin: bin.to_string(),
            tag,
        };
        self.totals.get(&key).ok_or_else(|| {
            Error::Lookup(format!(
                "no total for category '{category}', variant '{variant}', bin '{bin}', {tag}"
            ))
        })
    }

    /// Number of totals.
    pub fn len(&self) -> usize {
        self.totals.len()
    }

    /// `true` when empty.
    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// All totals in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&TotalKey, &Histogram)> {
        self.totals.iter()
    }
}

/// Observed-data totals per kinematic bin and tag.
#[derive(Debug, Clone, Default)]
pub struct DataTotals {
    totals: BTreeMap<(String, Tag), Histogram>,
}

impl DataTotals {
    /// Total for one bin and tag.
    pub fn get(&self, bin: &str, tag: Tag) -> Result<&Histogram> {
        self.totals
            .get(&(bin.to_string(), tag))
            .ok_or_else(|| Error::Lookup(format!("no data total for bin '{bin}', {tag}")))
    }
}

/// Variants aggregated for every category: nominal first, then each shape
/// uncertainty up and down in declaration order.
pub fn category_variants(config: &AnalysisConfig) -> Vec<Variant> {
    std::iter::once(Variant::Nominal)
        .chain(config.shape_uncertainties().flat_map(|(unc, _)| {
            Direction::ALL.into_iter().map(move |d| Variant::shifted(unc, d))
        }))
        .collect()
}

/// Sum every member process's leaves, across all files, into one total
/// per `(category, variant, bin, tag)`.
///
/// A cell with no contributing leaf at all is an error naming the cell.
pub fn aggregate_categories(
    config: &AnalysisConfig,
    plan: &ExtractionPlan,
    leaves: &HistogramTable,
) -> Result<CategoryTotals> {
    let variants = category_variants(config);
    let mut out = CategoryTotals::default();

    for (category, cfg) in config.categories.iter() {
        for variant in &variants {
            for bin in &plan.bins {
                for tag in Tag::ALL {
                    let inputs: Vec<&Histogram> = cfg
                        .processes
                        .iter()
                        .flat_map(|p| leaves.file_leaves(p, variant, &bin.name, Some(category), tag))
                        .collect();
                    let name = category_histogram_name(category, &bin.name, tag, variant);
                    if inputs.is_empty() {
                        return Err(Error::Histogram(format!(
                            "category '{category}' has no contributing histograms for '{name}'"
                        )));
                    }
                    let total = combine_histograms(&name, &inputs)?;
                    tracing::debug!(name = %total.name, inputs = inputs.len(), integral = total.integral(), "category total");
                    out.totals.insert(
                        TotalKey {
                            category: category.to_string(),
                            variant: variant.clone(),
                            bin: bin.name.clone(),
                            tag,
                        },
                        total,
                    );
                }
            }
        }
    }
    Ok(out)
}

/// Sum the per-file data leaves into `data_<bin>_<tag>`.
pub fn aggregate_data(plan: &ExtractionPlan, leaves: &HistogramTable) -> Result<DataTotals> {
    let mut out = DataTotals::default();
    for bin in &plan.bins {
        for tag in Tag::ALL {
            let inputs = leaves.file_leaves(DATA_PROCESS, &Variant::Nominal, &bin.name, None, tag);
            let total = combine_histograms(&data_histogram_name(&bin.name, tag), &inputs)?;
            if total.integral() == 0.0 {
                tracing::warn!(name = %total.name, "data histogram is empty");
            }
            out.totals.insert((bin.name.clone(), tag), total);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::build_tables;
    use crate::testutil::{CountingSource, MINIMAL, flat_tree};
    use approx::assert_relative_eq;

    fn two_process_config() -> AnalysisConfig {
        let yaml = MINIMAL
            .replace("processes: [mc]", "processes: [mc, tt]")
            .replace(
                "    nominal_files: [mc.parquet]",
                "    nominal_files: [mc.parquet, mc_ext.parquet]\n  tt:\n    nominal_files: [tt.parquet]",
            );
        AnalysisConfig::from_yaml_str(&yaml).unwrap()
    }

    fn two_process_source() -> CountingSource {
        let mut source = CountingSource::minimal();
        source.inner.insert_tree("mc_ext.parquet", "Events", flat_tree(3, 1, 1.0)).unwrap();
        source.inner.insert_tree("tt.parquet", "Events", flat_tree(4, 4, 0.25)).unwrap();
        source
    }

    #[test]
    fn category_total_sums_every_member_file() {
        let cfg = two_process_config();
        let plan = ExtractionPlan::from_config(&cfg).unwrap();
        let source = two_process_source();
        let tables = build_tables(&source, &cfg, &plan).unwrap();
        let totals = aggregate_categories(&cfg, &plan, &tables.simulated).unwrap();
        assert_eq!(totals.len(), 2);

        let pass = totals.get("sig", &Variant::Nominal, "0to100", Tag::Pass).unwrap();
        assert_eq!(pass.name, "sig_0to100_pass_nominal");
        let expected: Vec<&Histogram> = ["mc", "tt"]
            .into_iter()
            .flat_map(|p| tables.simulated.file_leaves(p, &Variant::Nominal, "0to100", Some("sig"), Tag::Pass))
            .collect();
        assert_eq!(expected.len(), 3);
        for bin in 0..10 {
            let sum: f64 = expected.iter().map(|h| h.content[bin]).sum();
            assert_relative_eq!(pass.content[bin], sum);
            assert_relative_eq!(pass.content[bin], 10.0 + 3.0 + 1.0);
        }
        let fail = totals.get("sig", &Variant::Nominal, "0to100", Tag::Fail).unwrap();
        assert_relative_eq!(fail.content[0], 2.0 + 1.0 + 1.0);
        assert_relative_eq!(fail.sumw2[0], 2.0 + 1.0 + 4.0 * 0.0625);
    }

    #[test]
    fn data_total_sums_files() {
        let yaml = MINIMAL.replace("[data.parquet]", "[data.parquet, data_b.parquet]");
        let cfg = AnalysisConfig::from_yaml_str(&yaml).unwrap();
        let plan = ExtractionPlan::from_config(&cfg).unwrap();
        let mut source = CountingSource::minimal();
        source.inner.insert_tree("data_b.parquet", "Events", flat_tree(1, 1, 1.0)).unwrap();
        let tables = build_tables(&source, &cfg, &plan).unwrap();
        let data = aggregate_data(&plan, &tables.data).unwrap();
        let pass = data.get("0to100", Tag::Pass).unwrap();
        assert_eq!(pass.name, "data_0to100_pass");
        assert_relative_eq!(pass.integral(), 130.0);
        assert!(data.get("other", Tag::Pass).is_err());
    }

    #[test]
    fn category_without_contributors_is_an_error() {
        let yaml = MINIMAL.replace("    nominal_files: [mc.parquet]", "    nominal_files: []");
        let cfg = AnalysisConfig::from_yaml_str(&yaml).unwrap();
        let plan = ExtractionPlan::from_config(&cfg).unwrap();
        let tables = build_tables(&CountingSource::minimal(), &cfg, &plan).unwrap();
        let err = aggregate_categories(&cfg, &plan, &tables.simulated).unwrap_err();
        assert!(matches!(err, Error::Histogram(_)));
        assert!(err.to_string().contains("sig_0to100_pass_nominal"), "{err}");
    }

    #[test]
    fn variants_follow_declaration_order() {
        let yaml = MINIMAL.replace(
            "uncertainties:\n",
            "uncertainties:\n  b:\n    mode: factor\n    up: \"1.1\"\n    down: \"0.9\"\n  a:\n    mode: factor\n    up: \"1.2\"\n    down: \"0.8\"\n",
        );
        let cfg = AnalysisConfig::from_yaml_str(&yaml).unwrap();
        let names: Vec<String> = category_variants(&cfg).iter().map(Variant::to_string).collect();
        assert_eq!(names, vec!["nominal", "b_up", "b_down", "a_up", "a_down"]);
    }
}
