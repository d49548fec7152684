//! Fixed-binning 1D histogram owned by value.

use tnp_core::{Error, Result};

/// Uniform binning over `[x_min, x_max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Binning {
    /// Number of in-range bins.
    pub n_bins: usize,
    /// Lower edge of the first bin.
    pub x_min: f64,
    /// Upper edge of the last bin.
    pub x_max: f64,
}

/// Where a value falls relative to a [`Binning`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinLocation {
    /// Below `x_min`.
    Underflow,
    /// In-range bin index (0-based).
    Bin(usize),
    /// At or above `x_max` (or NaN).
    Overflow,
}

impl Binning {
    /// Validated constructor.
    pub fn new(n_bins: usize, x_min: f64, x_max: f64) -> Result<Self> {
        if n_bins == 0 {
            return Err(Error::Histogram("binning needs at least one bin".into()));
        }
        if !(x_min.is_finite() && x_max.is_finite()) || x_min >= x_max {
            return Err(Error::Histogram(format!(
                "invalid binning range [{x_min}, {x_max})"
            )));
        }
        Ok(Self { n_bins, x_min, x_max })
    }

    /// Bin width.
    pub fn width(&self) -> f64 {
        (self.x_max - self.x_min) / self.n_bins as f64
    }

    /// Bin edges, `n_bins + 1` values.
    pub fn edges(&self) -> Vec<f64> {
        let w = self.width();
        (0..=self.n_bins)
            .map(|i| if i == self.n_bins { self.x_max } else { self.x_min + w * i as f64 })
            .collect()
    }

    /// Locate `x`.
    pub fn locate(&self, x: f64) -> BinLocation {
        if x < self.x_min {
            return BinLocation::Underflow;
        }
        if x.is_nan() || x >= self.x_max {
            return BinLocation::Overflow;
        }
        let idx = (self.n_bins as f64 * (x - self.x_min) / (self.x_max - self.x_min)) as usize;
        BinLocation::Bin(idx.min(self.n_bins - 1))
    }
}

/// A 1D histogram with per-bin sum of weights and sum of squared weights.
///
/// Under/overflow are tracked separately and never enter [`Histogram::integral`].
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// Histogram name (its key in the output container).
    pub name: String,
    /// Axis definition.
    pub binning: Binning,
    /// Sum of weights per in-range bin.
    pub content: Vec<f64>,
    /// Sum of squared weights per in-range bin.
    pub sumw2: Vec<f64>,
    /// Sum of weights below the axis.
    pub underflow: f64,
    /// Sum of weights above the axis.
    pub overflow: f64,
    /// Number of fills.
    pub entries: u64,
}

impl Histogram {
    /// Empty histogram.
    pub fn new(name: impl Into<String>, binning: Binning) -> Self {
        Self {
            name: name.into(),
            binning,
            content: vec![0.0; binning.n_bins],
            sumw2: vec![0.0; binning.n_bins],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
        }
    }

    /// Histogram from explicit per-bin values.
    pub fn from_bins(
        name: impl Into<String>,
        binning: Binning,
        content: Vec<f64>,
        sumw2: Vec<f64>,
    ) -> Result<Self> {
        let name = name.into();
        if content.len() != binning.n_bins || sumw2.len() != binning.n_bins {
            return Err(Error::Histogram(format!(
                "'{name}': expected {} bins, got content={} sumw2={}",
                binning.n_bins,
                content.len(),
                sumw2.len()
            )));
        }
        Ok(Self { name, binning, content, sumw2, underflow: 0.0, overflow: 0.0, entries: 0 })
    }

    /// Number of in-range bins.
    pub fn n_bins(&self) -> usize {
        self.binning.n_bins
    }

    /// Statistical error of bin `i` (`sqrt(sumw2)`).
    pub fn error(&self, i: usize) -> f64 {
        self.sumw2[i].sqrt()
    }

    /// Statistical errors of all in-range bins.
    pub fn errors(&self) -> Vec<f64> {
        self.sumw2.iter().map(|s| s.sqrt()).collect()
    }

    /// Overwrite bin `i` with `content ± error`.
    pub fn set_bin(&mut self, i: usize, content: f64, error: f64) {
        self.content[i] = content;
        self.sumw2[i] = error * error;
    }

    /// Sum of in-range bin contents.
    pub fn integral(&self) -> f64 {
        self.content.iter().sum()
    }

    /// Record one weighted value.
    pub fn fill(&mut self, x: f64, w: f64) {
        match self.binning.locate(x) {
            BinLocation::Underflow => self.underflow += w,
            BinLocation::Overflow => self.overflow += w,
            BinLocation::Bin(b) => {
                self.content[b] += w;
                self.sumw2[b] += w * w;
            }
        }
        self.entries += 1;
    }

    /// `true` when both histograms share the same axis.
    pub fn same_binning(&self, other: &Histogram) -> bool {
        self.binning == other.binning
    }

    /// Copy under a new name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self { name: name.into(), ..self.clone() }
    }
}
