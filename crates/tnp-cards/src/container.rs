//! Per-kinematic-bin analysis container.
//!
//! Holds, for one kinematic bin, the nominal pass/fail templates of every
//! category, the up/down × pass/fail templates of every declared
//! uncertainty, and the observed-data pass/fail pair. Stored histograms are
//! renamed to their canonical output names on insertion.

use std::collections::BTreeMap;
use std::path::Path;

use tnp_core::{Error, Result};
use tnp_ntuple::{Binning, Histogram};

use crate::keys::{Direction, Tag, Variant, category_histogram_name, data_histogram_name};
use crate::store::write_histograms;

/// Content and error given to every simulated bin with content `<= 0`.
pub const SANITIZE_FLOOR: f64 = 0.01;

/// Raise every bin with content `<= 0` to [`SANITIZE_FLOOR`] with the same
/// error. Returns the number of bins changed.
pub fn floor_nonpositive_bins(hist: &mut Histogram) -> usize {
    let mut changed = 0;
    for i in 0..hist.n_bins() {
        if hist.content[i] <= 0.0 {
            hist.set_bin(i, SANITIZE_FLOOR, SANITIZE_FLOOR);
            changed += 1;
        }
    }
    changed
}

#[derive(Debug, Clone, Default)]
struct CategorySlots {
    nominal: BTreeMap<Tag, Histogram>,
    /// Declared uncertainties in declaration order.
    declared: Vec<String>,
    shifted: BTreeMap<(String, Direction, Tag), Histogram>,
}

/// Every histogram written for one kinematic bin.
#[derive(Debug, Clone)]
pub struct AnalysisHistograms {
    bin: String,
    binning: Binning,
    categories: Vec<String>,
    slots: BTreeMap<String, CategorySlots>,
    data: BTreeMap<Tag, Histogram>,
}

impl AnalysisHistograms {
    /// Empty container for kinematic bin `bin`.
    pub fn new(bin: impl Into<String>, categories: Vec<String>, binning: Binning) -> Self {
        let slots = categories.iter().map(|c| (c.clone(), CategorySlots::default())).collect();
        Self { bin: bin.into(), binning, categories, slots, data: BTreeMap::new() }
    }

    /// Kinematic bin name.
    pub fn bin(&self) -> &str {
        &self.bin
    }

    /// Observable axis shared by every stored histogram.
    pub fn binning(&self) -> Binning {
        self.binning
    }

    /// Categories in datacard order.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Uncertainties declared for `category`, in declaration order.
    pub fn declared_uncertainties(&self, category: &str) -> Result<&[String]> {
        Ok(&self.category(category)?.declared)
    }

    fn category(&self, category: &str) -> Result<&CategorySlots> {
        self.slots.get(category).ok_or_else(|| self.unknown_category(category))
    }

    fn category_mut(&mut self, category: &str) -> Result<&mut CategorySlots> {
        let err = self.unknown_category(category);
        self.slots.get_mut(category).ok_or(err)
    }

    fn unknown_category(&self, category: &str) -> Error {
        Error::Lookup(format!(
            "category '{category}' is not defined for bin '{}'; defined categories are {:?}",
            self.bin, self.categories
        ))
    }

    fn check_binning(&self, hist: &Histogram) -> Result<()> {
        if hist.binning != self.binning {
            return Err(Error::Histogram(format!(
                "'{}' has binning {:?}, container for '{}' expects {:?}",
                hist.name, hist.binning, self.bin, self.binning
            )));
        }
        Ok(())
    }

    /// Store the nominal template of `category` for `tag`.
    pub fn set_nominal(&mut self, category: &str, tag: Tag, hist: Histogram) -> Result<()> {
        self.check_binning(&hist)?;
        let name = category_histogram_name(category, &self.bin, tag, &Variant::Nominal);
        self.category_mut(category)?.nominal.insert(tag, hist.renamed(name));
        Ok(())
    }

    /// Declare `uncertainty` for `category`; its four slots start unset.
    ///
    /// Declaring again keeps the declaration position and clears any
    /// templates already stored for it.
    pub fn declare_uncertainty(&mut self, category: &str, uncertainty: &str) -> Result<()> {
        let slots = self.category_mut(category)?;
        if !slots.declared.iter().any(|u| u == uncertainty) {
            slots.declared.push(uncertainty.to_string());
        }
        slots.shifted.retain(|(unc, _, _), _| unc != uncertainty);
        Ok(())
    }

    /// Store a copy of a shifted template. The uncertainty must be declared.
    pub fn set_uncertainty(
        &mut self,
        category: &str,
        uncertainty: &str,
        direction: Direction,
        tag: Tag,
        hist: &Histogram,
    ) -> Result<()> {
        self.check_binning(hist)?;
        let bin = self.bin.clone();
        let slots = self.category_mut(category)?;
        if !slots.declared.iter().any(|u| u == uncertainty) {
            return Err(Error::Lookup(format!(
                "uncertainty '{uncertainty}' is not declared for category '{category}' in bin '{bin}'"
            )));
        }
        let name = category_histogram_name(category, &bin, tag, &Variant::shifted(uncertainty, direction));
        slots.shifted.insert((uncertainty.to_string(), direction, tag), hist.renamed(name));
        Ok(())
    }

    /// Store the observed-data histogram for `tag`.
    pub fn set_data(&mut self, tag: Tag, hist: Histogram) -> Result<()> {
        self.check_binning(&hist)?;
        let name = data_histogram_name(&self.bin, tag);
        self.data.insert(tag, hist.renamed(name));
        Ok(())
    }

    /// Nominal template of `category` for `tag`.
    pub fn nominal(&self, category: &str, tag: Tag) -> Result<&Histogram> {
        self.category(category)?.nominal.get(&tag).ok_or_else(|| {
            Error::Lookup(format!(
                "missing '{}'",
                category_histogram_name(category, &self.bin, tag, &Variant::Nominal)
            ))
        })
    }

    /// Shifted template of `category`.
    pub fn uncertainty(
        &self,
        category: &str,
        uncertainty: &str,
        direction: Direction,
        tag: Tag,
    ) -> Result<&Histogram> {
        let slots = self.category(category)?;
        slots.shifted.get(&(uncertainty.to_string(), direction, tag)).ok_or_else(|| {
            let variant = Variant::shifted(uncertainty, direction);
            Error::Lookup(format!(
                "missing '{}'",
                category_histogram_name(category, &self.bin, tag, &variant)
            ))
        })
    }

    /// Observed data for `tag`.
    pub fn data(&self, tag: Tag) -> Result<&Histogram> {
        self.data
            .get(&tag)
            .ok_or_else(|| Error::Lookup(format!("missing '{}'", data_histogram_name(&self.bin, tag))))
    }

    /// Floor every non-positive simulated bin; data is never touched.
    /// Returns the number of bins changed.
    pub fn sanitize(&mut self) -> usize {
        let mut changed = 0;
        for slots in self.slots.values_mut() {
            for hist in slots.nominal.values_mut().chain(slots.shifted.values_mut()) {
                let n = floor_nonpositive_bins(hist);
                if n > 0 {
                    tracing::debug!(name = %hist.name, bins = n, "floored non-positive bins");
                }
                changed += n;
            }
        }
        changed
    }

    /// Every required histogram in write order: per category nominal
    /// pass/fail, then each declared uncertainty up pass/fail and down
    /// pass/fail; data pass/fail last.
    ///
    /// The first unset slot is reported as [`Error::Lookup`].
    pub fn histograms(&self) -> Result<Vec<&Histogram>> {
        let mut out = Vec::new();
        for category in &self.categories {
            for tag in Tag::ALL {
                out.push(self.nominal(category, tag)?);
            }
            for unc in self.declared_uncertainties(category)? {
                for direction in Direction::ALL {
                    for tag in Tag::ALL {
                        out.push(self.uncertainty(category, unc, direction, tag)?);
                    }
                }
            }
        }
        for tag in Tag::ALL {
            out.push(self.data(tag)?);
        }
        Ok(out)
    }

    /// Sum of the nominal integrals over every category and both tags.
    pub fn nominal_total(&self) -> Result<f64> {
        let mut total = 0.0;
        for category in &self.categories {
            for tag in Tag::ALL {
                total += self.nominal(category, tag)?.integral();
            }
        }
        Ok(total)
    }

    /// Sanitize, then write every histogram to `path`.
    ///
    /// Missing slots surface here, naming the slot.
    pub fn serialize(&mut self, path: &Path) -> Result<()> {
        let floored = self.sanitize();
        let hists = self.histograms()?;
        write_histograms(path, &hists)?;
        tracing::info!(
            path = %path.display(),
            histograms = hists.len(),
            floored_bins = floored,
            "wrote histogram container"
        );
        Ok(())
    }
}
