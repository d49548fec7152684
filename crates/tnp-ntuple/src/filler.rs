//! Single-pass histogram filling from column data with selections and weights.

use std::collections::HashMap;

use tnp_core::{Error, Result};

use crate::expr::CompiledExpr;
use crate::histogram::{BinLocation, Binning, Histogram};
use crate::source::EventBatch;

/// Under/overflow handling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowPolicy {
    /// Keep out-of-range entries in `underflow`/`overflow` only.
    #[default]
    Drop,
    /// Fold underflow into the first bin and overflow into the last bin.
    Fold,
}

/// Specification for filling one histogram.
#[derive(Debug, Clone)]
pub struct HistogramSpec {
    /// Histogram name.
    pub name: String,
    /// Expression for the filled variable.
    pub variable: CompiledExpr,
    /// Optional weight expression (unit weight when absent).
    pub weight: Option<CompiledExpr>,
    /// Optional selection; entries pass when it evaluates `> 0`.
    pub selection: Option<CompiledExpr>,
    /// Axis.
    pub binning: Binning,
    /// Under/overflow policy.
    pub flow_policy: FlowPolicy,
}

impl HistogramSpec {
    /// Union of the branches read by variable, weight and selection.
    pub fn required_branches(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let exprs = std::iter::once(&self.variable)
            .chain(self.weight.as_ref())
            .chain(self.selection.as_ref());
        for expr in exprs {
            for b in &expr.required_branches {
                if !out.contains(b) {
                    out.push(b.clone());
                }
            }
        }
        out
    }
}

/// Fill several histograms in one pass over `batch`.
pub fn fill_histograms(specs: &[HistogramSpec], batch: &EventBatch) -> Result<Vec<Histogram>> {
    specs.iter().map(|spec| fill_histogram(spec, batch)).collect()
}

/// Fill one histogram from `batch`.
///
/// Entries whose selection is `<= 0` or whose weight is exactly zero are
/// skipped, matching `TTree::Project` with a `(cut)*(weight)` selection.
pub fn fill_histogram(spec: &HistogramSpec, batch: &EventBatch) -> Result<Histogram> {
    let n = batch.n_entries;
    let values = eval_expr(&spec.variable, &batch.columns, n)?;
    let weights = spec.weight.as_ref().map(|w| eval_expr(w, &batch.columns, n)).transpose()?;
    let selected = spec.selection.as_ref().map(|s| eval_expr(s, &batch.columns, n)).transpose()?;

    let mut hist = Histogram::new(spec.name.clone(), spec.binning);
    let last = spec.binning.n_bins - 1;

    for entry in 0..n {
        if let Some(sel) = &selected
            && sel[entry] <= 0.0
        {
            continue;
        }
        let w = weights.as_ref().map_or(1.0, |w| w[entry]);
        if w == 0.0 {
            continue;
        }

        let x = values[entry];
        match (spec.binning.locate(x), spec.flow_policy) {
            (BinLocation::Underflow, FlowPolicy::Fold) => {
                hist.underflow += w;
                hist.content[0] += w;
                hist.sumw2[0] += w * w;
                hist.entries += 1;
            }
            (BinLocation::Overflow, FlowPolicy::Fold) => {
                hist.overflow += w;
                hist.content[last] += w;
                hist.sumw2[last] += w * w;
                hist.entries += 1;
            }
            _ => hist.fill(x, w),
        }
    }

    Ok(hist)
}

fn eval_expr(
    expr: &CompiledExpr,
    columns: &HashMap<String, Vec<f64>>,
    n_entries: usize,
) -> Result<Vec<f64>> {
    let cols: Vec<&[f64]> = expr
        .required_branches
        .iter()
        .map(|name| {
            columns.get(name).map(Vec::as_slice).ok_or_else(|| {
                Error::Expression(format!("missing column '{name}' for '{}'", expr.source()))
            })
        })
        .collect::<Result<_>>()?;
    expr.eval_columns(&cols, n_entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(cols: &[(&str, Vec<f64>)]) -> EventBatch {
        let n_entries = cols.first().map_or(0, |(_, v)| v.len());
        EventBatch {
            n_entries,
            columns: cols.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        }
    }

    fn spec(weight: Option<&str>, selection: Option<&str>, flow: FlowPolicy) -> HistogramSpec {
        HistogramSpec {
            name: "h".into(),
            variable: CompiledExpr::compile("x").unwrap(),
            weight: weight.map(|w| CompiledExpr::compile(w).unwrap()),
            selection: selection.map(|s| CompiledExpr::compile(s).unwrap()),
            binning: Binning::new(3, 0.0, 3.0).unwrap(),
            flow_policy: flow,
        }
    }

    #[test]
    fn fill_simple() {
        let b = batch(&[("x", vec![0.5, 1.5, 2.5, 0.5, -1.0, 3.5])]);
        let h = fill_histogram(&spec(None, None, FlowPolicy::Drop), &b).unwrap();
        assert_eq!(h.content, vec![2.0, 1.0, 1.0]);
        assert_eq!(h.underflow, 1.0);
        assert_eq!(h.overflow, 1.0);
        assert_eq!(h.entries, 6);
    }

    #[test]
    fn fill_with_weight_and_selection() {
        let b = batch(&[("x", vec![0.5, 1.5, 0.5, 2.5]), ("w", vec![2.0, 3.0, 1.0, 4.0])]);
        let h = fill_histogram(&spec(Some("w"), Some("x > 1"), FlowPolicy::Drop), &b).unwrap();
        assert_eq!(h.content, vec![0.0, 3.0, 4.0]);
        assert_eq!(h.sumw2, vec![0.0, 9.0, 16.0]);
        assert_eq!(h.entries, 2);
    }

    #[test]
    fn fill_flow_fold() {
        let b = batch(&[("x", vec![-1.0, 0.2, 1.2, 3.0])]);
        let h = fill_histogram(&spec(None, None, FlowPolicy::Fold), &b).unwrap();
        assert_eq!(h.content, vec![2.0, 1.0, 1.0]);
        assert_eq!(h.underflow, 1.0);
        assert_eq!(h.overflow, 1.0);
    }

    #[test]
    fn constant_weight_without_weight_columns() {
        let b = batch(&[("x", vec![0.5, 0.5])]);
        let h = fill_histogram(&spec(Some("41.5*2"), None, FlowPolicy::Drop), &b).unwrap();
        assert_eq!(h.content, vec![166.0, 0.0, 0.0]);
    }

    #[test]
    fn missing_column_is_an_error() {
        let b = batch(&[("x", vec![0.5])]);
        let err = fill_histogram(&spec(Some("w"), None, FlowPolicy::Drop), &b).unwrap_err();
        assert!(err.to_string().contains("missing column 'w'"));
    }

    #[test]
    fn required_branches_are_deduplicated() {
        let s = spec(Some("w * x"), Some("x > 0 && y > 0"), FlowPolicy::Drop);
        assert_eq!(s.required_branches(), vec!["x", "w", "y"]);
    }

    #[test]
    fn fill_many() {
        let b = batch(&[("x", vec![0.5, 1.5])]);
        let specs = [spec(None, None, FlowPolicy::Drop), spec(None, Some("x < 1"), FlowPolicy::Drop)];
        let hs = fill_histograms(&specs, &b).unwrap();
        assert_eq!(hs[0].integral(), 2.0);
        assert_eq!(hs[1].integral(), 1.0);
    }
}
