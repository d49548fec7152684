//! End-to-end build: configuration in, containers, datacards and the
//! workspace script out.

use std::path::{Path, PathBuf};

use tnp_core::Result;
use tnp_ntuple::EventSource;

use crate::aggregate::{CategoryTotals, DataTotals, aggregate_categories, aggregate_data};
use crate::cache::{ExtractionPlan, HistogramTable};
use crate::config::{AnalysisConfig, KinematicBin};
use crate::container::AnalysisHistograms;
use crate::datacard::write_datacard;
use crate::keys::{Direction, Tag, Variant};
use crate::orchestrator::build_tables;
use crate::prefit::{prefit_artifact, write_prefit_artifact};
use crate::script::{SCRIPT_NAME, write_workspace_script};
use crate::store::write_histograms;

/// Options that are not part of the analysis configuration.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Base directory; `analysisname` is resolved against it.
    pub out_dir: PathBuf,
    /// Also write every leaf histogram to `diagnosis_<bin>.parquet`.
    pub diagnosis: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { out_dir: PathBuf::from("."), diagnosis: false }
    }
}

/// Files written for one kinematic bin.
#[derive(Debug, Clone)]
pub struct BinOutputs {
    /// Kinematic bin name.
    pub bin: String,
    /// `<bin>.parquet`
    pub container: PathBuf,
    /// `<bin>.txt`
    pub datacard: PathBuf,
    /// `prefit_<bin>.json`, when requested.
    pub prefit: Option<PathBuf>,
    /// `diagnosis_<bin>.parquet`, when requested.
    pub diagnosis: Option<PathBuf>,
    /// Normalisation written into the datacard.
    pub norm: f64,
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    /// Directory everything was written to.
    pub output_dir: PathBuf,
    /// Per-bin outputs in configuration order.
    pub bins: Vec<BinOutputs>,
    /// `combine_script.sh`
    pub script: PathBuf,
    /// Number of leaf histograms extracted (simulated and data).
    pub leaves: usize,
}

/// Container file name of kinematic bin `bin`.
pub fn container_file_name(bin: &str) -> String {
    format!("{bin}.parquet")
}

/// Fill the container of one kinematic bin from the aggregated totals.
pub fn assemble_container(
    config: &AnalysisConfig,
    plan: &ExtractionPlan,
    bin: &KinematicBin,
    totals: &CategoryTotals,
    data: &DataTotals,
) -> Result<AnalysisHistograms> {
    let mut container = AnalysisHistograms::new(&bin.name, config.category_names(), plan.binning);
    for tag in Tag::ALL {
        container.set_data(tag, data.get(&bin.name, tag)?.clone())?;
    }
    for category in config.category_names() {
        for tag in Tag::ALL {
            let nominal = totals.get(&category, &Variant::Nominal, &bin.name, tag)?;
            container.set_nominal(&category, tag, nominal.clone())?;
        }
        for (unc, _) in config.shape_uncertainties() {
            container.declare_uncertainty(&category, unc)?;
            for direction in Direction::ALL {
                let variant = Variant::shifted(unc, direction);
                for tag in Tag::ALL {
                    let shifted = totals.get(&category, &variant, &bin.name, tag)?;
                    container.set_uncertainty(&category, unc, direction, tag, shifted)?;
                }
            }
        }
    }
    Ok(container)
}

fn write_diagnosis(dir: &Path, bin: &str, simulated: &HistogramTable, data: &HistogramTable) -> Result<PathBuf> {
    let path = dir.join(format!("diagnosis_{bin}.parquet"));
    let leaves: Vec<_> = simulated.in_bin(bin).chain(data.in_bin(bin)).map(|(_, h)| h).collect();
    write_histograms(&path, &leaves)?;
    tracing::info!(path = %path.display(), histograms = leaves.len(), "wrote diagnosis file");
    Ok(path)
}

/// Run the whole build against `source`.
///
/// Bins are written one after the other; if a later bin fails, files of
/// earlier bins stay on disk.
pub fn run_build(
    config: &AnalysisConfig,
    options: &RunOptions,
    source: &dyn EventSource,
) -> Result<BuildSummary> {
    config.validate()?;
    let output_dir = config.output_dir(&options.out_dir);
    std::fs::create_dir_all(&output_dir)?;

    let plan = ExtractionPlan::from_config(config)?;
    let tables = build_tables(source, config, &plan)?;

    let mut diagnosis = Vec::with_capacity(plan.bins.len());
    for bin in &plan.bins {
        diagnosis.push(if options.diagnosis {
            Some(write_diagnosis(&output_dir, &bin.name, &tables.simulated, &tables.data)?)
        } else {
            None
        });
    }

    let data = aggregate_data(&plan, &tables.data)?;
    let totals = aggregate_categories(config, &plan, &tables.simulated)?;

    let mut bins = Vec::with_capacity(plan.bins.len());
    for (bin, diagnosis) in plan.bins.iter().zip(diagnosis) {
        tracing::info!(bin = %bin.name, lo = bin.lo, hi = bin.hi, "building kinematic bin");
        let mut container = assemble_container(config, &plan, bin, &totals, &data)?;

        let shapes_file = container_file_name(&bin.name);
        let container_path = output_dir.join(&shapes_file);
        container.serialize(&container_path)?;

        let datacard_path = output_dir.join(format!("{}.txt", bin.name));
        let norm = write_datacard(&datacard_path, &container, &config.uncertainties, &shapes_file)?;

        let prefit = if config.prefit_artifacts {
            let path = output_dir.join(format!("prefit_{}.json", bin.name));
            write_prefit_artifact(&path, &prefit_artifact(&container, config)?)?;
            Some(path)
        } else {
            None
        };

        bins.push(BinOutputs {
            bin: bin.name.clone(),
            container: container_path,
            datacard: datacard_path,
            prefit,
            diagnosis,
            norm,
        });
    }

    let bin_names: Vec<String> = plan.bins.iter().map(|b| b.name.clone()).collect();
    write_workspace_script(&output_dir, &bin_names, &config.category_names())?;

    Ok(BuildSummary {
        script: output_dir.join(SCRIPT_NAME),
        output_dir,
        bins,
        leaves: tables.simulated.len() + tables.data.len(),
    })
}
