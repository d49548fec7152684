//! Cross-product orchestration: every process × variant × file × kinematic
//! bin × member category, plus the per-file data leaves.

use std::path::PathBuf;

use tnp_core::{Error, Result};
use tnp_ntuple::{EventSource, Weight};

use crate::cache::{CacheRequest, ExtractionPlan, HistogramTable, fill_data_cache, fill_process_cache};
use crate::config::{AnalysisConfig, DATA_PROCESS, ProcessConfig, UncertaintyMode};
use crate::keys::{Direction, Variant};

/// Everything extracted in one run.
#[derive(Debug, Clone, Default)]
pub struct ExtractedTables {
    /// Simulated leaves, all processes and variants.
    pub simulated: HistogramTable,
    /// Per-file observed-data leaves.
    pub data: HistogramTable,
}

/// Inputs and weight of one `(process, variant)` cache.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantInputs {
    /// Variant label.
    pub variant: Variant,
    /// Files to read.
    pub files: Vec<PathBuf>,
    /// Per-event weight.
    pub weight: Weight,
}

/// `lumi * genweight [* additional_weights]`.
pub fn nominal_weight(config: &AnalysisConfig, process: &ProcessConfig) -> Weight {
    let weight = Weight::constant(config.lumi).times(config.genweight.clone());
    match &process.additional_weights {
        Some(extra) => weight.times(extra.clone()),
        None => weight,
    }
}

/// Nominal plus one entry per direction of every shape uncertainty.
///
/// `factor` variants reuse the nominal files with the weight multiplied by
/// the shift expression; `file` variants read the alternate files with the
/// nominal weight. Rate-only modes produce no variant.
pub fn process_variants(
    config: &AnalysisConfig,
    name: &str,
    process: &ProcessConfig,
) -> Result<Vec<VariantInputs>> {
    let nominal = nominal_weight(config, process);
    let mut out = vec![VariantInputs {
        variant: Variant::Nominal,
        files: process.nominal_files.clone(),
        weight: nominal.clone(),
    }];

    for (unc, cfg) in config.shape_uncertainties() {
        for direction in Direction::ALL {
            let variant = Variant::shifted(unc, direction);
            let inputs = match cfg.mode {
                UncertaintyMode::Factor => {
                    let factor = cfg.factor(direction).ok_or_else(|| {
                        Error::Config(format!(
                            "uncertainties.{unc}: missing '{}' factor",
                            direction.as_str()
                        ))
                    })?;
                    VariantInputs {
                        variant,
                        files: process.nominal_files.clone(),
                        weight: nominal.clone().times(factor),
                    }
                }
                UncertaintyMode::File => {
                    let alt = process.unc_files.get(unc).ok_or_else(|| {
                        Error::Config(format!("processes.{name}.unc_files: missing entry for '{unc}'"))
                    })?;
                    let files = match direction {
                        Direction::Up => alt.up.clone(),
                        Direction::Down => alt.down.clone(),
                    };
                    VariantInputs { variant, files, weight: nominal.clone() }
                }
                UncertaintyMode::Other(_) => continue,
            };
            out.push(inputs);
        }
    }
    Ok(out)
}

/// Run every extraction the configuration asks for.
pub fn build_tables(
    source: &dyn EventSource,
    config: &AnalysisConfig,
    plan: &ExtractionPlan,
) -> Result<ExtractedTables> {
    let mut tables = ExtractedTables::default();

    for (name, process) in config.simulated_processes() {
        let member_of: Vec<String> = config
            .categories
            .keys()
            .filter(|cat| config.is_member(cat, name))
            .map(str::to_string)
            .collect();
        if member_of.is_empty() {
            tracing::warn!(process = name, "process belongs to no category; skipped");
            continue;
        }

        for inputs in process_variants(config, name, process)? {
            tracing::info!(process = name, variant = %inputs.variant, weight = %inputs.weight, "extracting");
            let cache = fill_process_cache(
                source,
                plan,
                &CacheRequest {
                    process: name,
                    files: &inputs.files,
                    weight: &inputs.weight,
                    variant: &inputs.variant,
                    member_of: &member_of,
                },
            )?;
            tables.simulated.merge(cache)?;
        }
    }

    let data = config.data_process()?;
    tracing::info!(files = data.nominal_files.len(), "extracting data");
    tables.data = fill_data_cache(source, plan, DATA_PROCESS, &data.nominal_files)?;

    tracing::debug!(
        simulated = tables.simulated.len(),
        data = tables.data.len(),
        "extraction finished"
    );
    Ok(tables)
}
