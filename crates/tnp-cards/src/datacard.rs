//! Datacard emitter.
//!
//! One text card per kinematic bin with two channels (`pass`, `fail`) and
//! one process per category. Shapes are bound to the container file
//! through the `<process>_<bin>_<tag>_<nominal|$SYSTEMATIC>` convention.

use std::path::Path;

use tnp_core::{Error, Result};

use crate::config::{OrderedMap, UncertaintyConfig};
use crate::container::AnalysisHistograms;
use crate::keys::Tag;

/// Name of the frozen rate parameter that matches MC to data.
pub const NORM_PARAM: &str = "norm_match_mc_data";

const SEPARATOR: &str = "----------";

/// Numbers that go into one card.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatacardYields {
    /// Data integral in the pass channel.
    pub data_pass: f64,
    /// Data integral in the fail channel.
    pub data_fail: f64,
    /// Nominal MC integral summed over categories, pass channel.
    pub mc_pass: f64,
    /// Nominal MC integral summed over categories, fail channel.
    pub mc_fail: f64,
}

impl DatacardYields {
    /// Collect the integrals from a filled container.
    pub fn from_container(container: &AnalysisHistograms) -> Result<Self> {
        let mut mc = [0.0; 2];
        for category in container.categories() {
            for (slot, tag) in mc.iter_mut().zip(Tag::ALL) {
                *slot += container.nominal(category, tag)?.integral();
            }
        }
        Ok(Self {
            data_pass: container.data(Tag::Pass)?.integral(),
            data_fail: container.data(Tag::Fail)?.integral(),
            mc_pass: mc[0],
            mc_fail: mc[1],
        })
    }

    /// `(data pass + data fail) / (MC pass + MC fail)`.
    pub fn normalisation(&self) -> Result<f64> {
        let mc = self.mc_pass + self.mc_fail;
        let norm = (self.data_pass + self.data_fail) / mc;
        if !norm.is_finite() {
            return Err(Error::Validation(format!(
                "cannot normalise MC to data: total nominal MC yield is {mc}"
            )));
        }
        Ok(norm)
    }
}

/// Render the datacard of `container`.
///
/// `shapes_file` is the container file name as the fit tool will see it,
/// relative to the card.
pub fn render_datacard(
    container: &AnalysisHistograms,
    uncertainties: &OrderedMap<UncertaintyConfig>,
    shapes_file: &str,
) -> Result<String> {
    let yields = DatacardYields::from_container(container)?;
    let norm = yields.normalisation()?;
    let bin = container.bin();
    let categories = container.categories();
    let n = categories.len();

    let mut lines: Vec<String> = vec![
        "imax 2 (two channels, pass and fail)".into(),
        format!("jmax {} ({n} categories minus 1)", n.saturating_sub(1)),
        "kmax * (automatic number of nuisance parameters)".into(),
        SEPARATOR.into(),
    ];

    for tag in Tag::ALL {
        lines.push(format!("shapes data_obs {tag} {shapes_file} data_{bin}_{tag}"));
        lines.push(format!(
            "shapes * {tag} {shapes_file} $PROCESS_{bin}_{tag}_nominal $PROCESS_{bin}_{tag}_$SYSTEMATIC"
        ));
    }
    lines.push(SEPARATOR.into());

    lines.push("bin\tpass\tfail".into());
    lines.push(format!("observation\t{:.0}\t{:.0}", yields.data_pass, yields.data_fail));
    lines.push(SEPARATOR.into());

    lines.push("# automatic counting of MC events".into());
    lines.push(format!("bin\t{}{}", "pass\t".repeat(n), "fail\t".repeat(n)));
    let names = [categories.join("\t"), categories.join("\t")].join("\t");
    lines.push(format!("process\t{names}"));
    let indices: Vec<String> = (0..n).chain(0..n).map(|i| i.to_string()).collect();
    lines.push(format!("process\t{}", indices.join("\t")));
    lines.push(format!("rate\t{}", "-1\t".repeat(2 * n)));
    lines.push(SEPARATOR.into());

    for (name, unc) in uncertainties.iter() {
        lines.push(format!("{name}\t{}\t{}", unc.mode.datacard_type(), size_columns(unc, categories)));
    }

    lines.push("# normalisation factor to match MC and data".into());
    lines.push("# freezes automatically".into());
    lines.push(format!("{NORM_PARAM} rateParam * * {norm:.6}"));
    lines.push(format!("nuisance edit freeze {NORM_PARAM}"));
    lines.push(String::new());
    lines.push("# activating autoMCStats".into());
    lines.push("* autoMCStats 0".into());

    let mut card = lines.join("\n");
    card.push('\n');
    Ok(card)
}

/// Magnitude columns of one uncertainty row, pass block then fail block.
fn size_columns(unc: &UncertaintyConfig, categories: &[String]) -> String {
    let size = unc.size_label();
    match &unc.category {
        Some(only) => {
            let block: String = categories
                .iter()
                .map(|c| if c == only { format!("{size}\t") } else { "-\t".to_string() })
                .collect();
            block.repeat(2)
        }
        None => vec![size; 2 * categories.len()].join("\t"),
    }
}

/// Render and write the card of `container` to `path`. Returns the
/// normalisation value written into it.
pub fn write_datacard(
    path: &Path,
    container: &AnalysisHistograms,
    uncertainties: &OrderedMap<UncertaintyConfig>,
    shapes_file: &str,
) -> Result<f64> {
    let card = render_datacard(container, uncertainties, shapes_file)?;
    std::fs::write(path, card)?;
    let norm = DatacardYields::from_container(container)?.normalisation()?;
    tracing::info!(path = %path.display(), norm, "wrote datacard");
    Ok(norm)
}
