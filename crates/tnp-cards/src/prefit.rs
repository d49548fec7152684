//! Prefit comparison artifact (numbers only, no rendering).
//!
//! One JSON document per kinematic bin with, for each channel, the stacked
//! nominal category templates, their total, the observed data with
//! Garwood 68% Poisson intervals, and the data/MC ratio.

use std::path::Path;

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use tnp_core::{Error, Result};

use crate::config::AnalysisConfig;
use crate::container::AnalysisHistograms;
use crate::keys::Tag;

/// Version tag of [`PrefitArtifact`].
pub const PREFIT_SCHEMA_VERSION: &str = "tnp_prefit_v1";

/// Central 68.27% interval.
const ALPHA: f64 = 0.31731;

/// Prefit yields of one kinematic bin, pass and fail channels.
#[derive(Debug, Clone, Serialize)]
pub struct PrefitArtifact {
    /// [`PREFIT_SCHEMA_VERSION`].
    pub schema_version: String,
    /// Run metadata.
    pub meta: PrefitMeta,
    /// `pass` then `fail`.
    pub channels: Vec<PrefitChannel>,
}

/// Labels for the comparison plot.
#[derive(Debug, Clone, Serialize)]
pub struct PrefitMeta {
    /// Producing tool.
    pub tool: String,
    /// Producing tool version.
    pub tool_version: String,
    /// Kinematic bin name.
    pub kinematic_bin: String,
    /// Data-taking year as configured.
    pub year: String,
    /// Integrated luminosity.
    pub lumi: f64,
    /// Luminosity unit (`fb`, `pb`).
    pub lumi_unit: String,
    /// Tagger display name.
    pub tagger: String,
    /// Observable axis label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xlabel: Option<String>,
}

/// One stacked category template.
#[derive(Debug, Clone, Serialize)]
pub struct PrefitSample {
    /// Category name.
    pub name: String,
    /// Display label (`propername`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Plot colour.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Per-bin yield.
    pub y: Vec<f64>,
    /// Per-bin statistical error.
    pub yerr: Vec<f64>,
}

/// One tag channel (`pass` or `fail`).
#[derive(Debug, Clone, Serialize)]
pub struct PrefitChannel {
    /// `pass` or `fail`.
    pub channel_name: String,
    /// `n_bins + 1` observable edges.
    pub bin_edges: Vec<f64>,
    /// Stack order is category order.
    pub samples: Vec<PrefitSample>,
    /// Summed MC yield.
    pub total_y: Vec<f64>,
    /// Summed MC error, in quadrature.
    pub total_yerr: Vec<f64>,
    /// Observed counts.
    pub data_y: Vec<f64>,
    /// Lower data error.
    pub data_yerr_lo: Vec<f64>,
    /// Upper data error.
    pub data_yerr_hi: Vec<f64>,
    /// `garwood_poisson_68` when every count is an integer, `sqrt_y_fallback` otherwise.
    pub data_error_model: String,
    /// `NaN` where the total MC yield is zero.
    pub ratio_y: Vec<f64>,
    /// Lower ratio error from the data interval.
    pub ratio_yerr_lo: Vec<f64>,
    /// Upper ratio error from the data interval.
    pub ratio_yerr_hi: Vec<f64>,
}

fn as_count(x: f64) -> Option<u64> {
    if !(x.is_finite() && x >= 0.0) {
        return None;
    }
    let r = x.round();
    if (x - r).abs() <= 1e-9 { Some(r as u64) } else { None }
}

fn chi2_quantile(dof: f64, p: f64) -> Result<f64> {
    let dist = ChiSquared::new(dof)
        .map_err(|e| Error::Validation(format!("chi-square with {dof} dof: {e}")))?;
    Ok(dist.inverse_cdf(p))
}

/// Garwood 68% interval half-widths `(down, up)` for an observed count `n`.
pub fn garwood_interval(n: u64) -> Result<(f64, f64)> {
    let nf = n as f64;
    let lo = if n == 0 { 0.0 } else { nf - 0.5 * chi2_quantile(2.0 * nf, ALPHA / 2.0)? };
    let hi = 0.5 * chi2_quantile(2.0 * (nf + 1.0), 1.0 - ALPHA / 2.0)? - nf;
    Ok((lo, hi))
}

/// Per-bin data errors. Non-integer contents fall back to `sqrt(y)`.
fn data_errors(y: &[f64]) -> Result<(Vec<f64>, Vec<f64>, String)> {
    let mut lo = Vec::with_capacity(y.len());
    let mut hi = Vec::with_capacity(y.len());
    let mut all_poisson = true;
    for &v in y {
        if let Some(n) = as_count(v) {
            let (dl, dh) = garwood_interval(n)?;
            lo.push(dl);
            hi.push(dh);
        } else {
            all_poisson = false;
            let e = if v.is_finite() && v > 0.0 { v.sqrt() } else { f64::NAN };
            lo.push(e);
            hi.push(e);
        }
    }
    let model = if all_poisson { "garwood_poisson_68" } else { "sqrt_y_fallback" };
    Ok((lo, hi, model.to_string()))
}

fn ratio(num: &[f64], den: &[f64]) -> Vec<f64> {
    num.iter()
        .zip(den)
        .map(|(n, d)| if d.is_finite() && *d != 0.0 { n / d } else { f64::NAN })
        .collect()
}

fn channel(container: &AnalysisHistograms, config: &AnalysisConfig, tag: Tag) -> Result<PrefitChannel> {
    let n_bins = container.binning().n_bins;
    let mut samples = Vec::with_capacity(container.categories().len());
    let mut total_y = vec![0.0; n_bins];
    let mut total_w2 = vec![0.0; n_bins];

    for category in container.categories() {
        let h = container.nominal(category, tag)?;
        for i in 0..n_bins {
            total_y[i] += h.content[i];
            total_w2[i] += h.sumw2[i];
        }
        let display = config.categories.get(category);
        samples.push(PrefitSample {
            name: category.clone(),
            label: display.and_then(|c| c.propername.clone()),
            color: display.and_then(|c| c.color.clone()),
            y: h.content.clone(),
            yerr: h.errors(),
        });
    }

    let data = container.data(tag)?;
    let (data_yerr_lo, data_yerr_hi, data_error_model) = data_errors(&data.content)?;

    Ok(PrefitChannel {
        channel_name: tag.to_string(),
        bin_edges: container.binning().edges(),
        samples,
        ratio_y: ratio(&data.content, &total_y),
        ratio_yerr_lo: ratio(&data_yerr_lo, &total_y),
        ratio_yerr_hi: ratio(&data_yerr_hi, &total_y),
        total_yerr: total_w2.iter().map(|w| w.sqrt()).collect(),
        total_y,
        data_y: data.content.clone(),
        data_yerr_lo,
        data_yerr_hi,
        data_error_model,
    })
}

/// Build the artifact of one filled container.
pub fn prefit_artifact(container: &AnalysisHistograms, config: &AnalysisConfig) -> Result<PrefitArtifact> {
    let channels = Tag::ALL.into_iter().map(|tag| channel(container, config, tag)).collect::<Result<_>>()?;
    Ok(PrefitArtifact {
        schema_version: PREFIT_SCHEMA_VERSION.to_string(),
        meta: PrefitMeta {
            tool: "tnp-hists".to_string(),
            tool_version: tnp_core::VERSION.to_string(),
            kinematic_bin: container.bin().to_string(),
            year: config.year.to_string(),
            lumi: config.lumi,
            lumi_unit: config.lumiunit.clone(),
            tagger: config.tagger.propername.clone().unwrap_or_else(|| config.tagger.name.clone()),
            xlabel: config.xlabel.clone(),
        },
        channels,
    })
}

/// Write the artifact as pretty JSON.
pub fn write_prefit_artifact(path: &Path, artifact: &PrefitArtifact) -> Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), artifact)?;
    tracing::info!(path = %path.display(), "wrote prefit artifact");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::minimal_config;
    use approx::assert_relative_eq;
    use tnp_ntuple::{Binning, Histogram};

    fn hist(content: Vec<f64>) -> Histogram {
        let b = Binning::new(content.len(), 0.0, 200.0).unwrap();
        let sumw2 = content.clone();
        Histogram::from_bins("h", b, content, sumw2).unwrap()
    }

    #[test]
    fn garwood_matches_reference_values() {
        let (lo, hi) = garwood_interval(0).unwrap();
        assert_eq!(lo, 0.0);
        assert_relative_eq!(hi, 1.841, epsilon = 1e-2);
        let (lo, hi) = garwood_interval(10).unwrap();
        assert_relative_eq!(lo, 3.109, epsilon = 1e-2);
        assert_relative_eq!(hi, 4.266, epsilon = 1e-2);
    }

    #[test]
    fn non_integer_data_falls_back_to_sqrt() {
        let (lo, hi, model) = data_errors(&[4.0, 2.5]).unwrap();
        assert_eq!(model, "sqrt_y_fallback");
        assert_relative_eq!(lo[1], 2.5_f64.sqrt());
        assert_relative_eq!(hi[1], 2.5_f64.sqrt());
    }

    #[test]
    fn artifact_stacks_categories_and_ratios() {
        let cfg = minimal_config();
        let mut c = AnalysisHistograms::new("0to100", vec!["sig".into()], Binning::new(2, 0.0, 200.0).unwrap());
        c.set_nominal("sig", Tag::Pass, hist(vec![10.0, 0.0])).unwrap();
        c.set_nominal("sig", Tag::Fail, hist(vec![2.0, 2.0])).unwrap();
        c.set_data(Tag::Pass, hist(vec![12.0, 1.0])).unwrap();
        c.set_data(Tag::Fail, hist(vec![3.0, 3.0])).unwrap();

        let art = prefit_artifact(&c, &cfg).unwrap();
        assert_eq!(art.schema_version, PREFIT_SCHEMA_VERSION);
        assert_eq!(art.meta.year, "2018");
        assert_eq!(art.channels.len(), 2);
        let pass = &art.channels[0];
        assert_eq!(pass.channel_name, "pass");
        assert_eq!(pass.bin_edges, vec![0.0, 100.0, 200.0]);
        assert_eq!(pass.samples[0].label.as_deref(), Some("Signal"));
        assert_eq!(pass.samples[0].color.as_deref(), Some("#ff0000"));
        assert_relative_eq!(pass.ratio_y[0], 1.2);
        assert!(pass.ratio_y[1].is_nan());
        assert_eq!(pass.data_error_model, "garwood_poisson_68");

        let json = serde_json::to_value(&art).unwrap();
        assert_eq!(json["channels"][1]["channel_name"], "fail");
    }
}
