//! Histogram extraction: project `(cut)*(weight)` of one tree into a 1D histogram.

use std::path::Path;

use tnp_core::{Error, Result};

use crate::cut::{Cut, Weight};
use crate::expr::CompiledExpr;
use crate::filler::{FlowPolicy, HistogramSpec, fill_histogram};
use crate::histogram::{Binning, Histogram};
use crate::source::EventSource;

/// One extraction call.
#[derive(Debug, Clone)]
pub struct ExtractRequest<'a> {
    /// Source file.
    pub path: &'a Path,
    /// Tree identifier inside the file.
    pub tree: &'a str,
    /// Filled variable (expression).
    pub variable: &'a str,
    /// Combined selection.
    pub selection: &'a Cut,
    /// Per-event weight.
    pub weight: &'a Weight,
    /// Name given to the produced histogram.
    pub name: String,
    /// Axis.
    pub binning: Binning,
    /// Under/overflow policy.
    pub flow_policy: FlowPolicy,
}

/// Produce an owned histogram for `request`.
///
/// The source file is only touched inside [`EventSource::read_branches`]; the
/// result holds no reference into it.
pub fn extract_histogram(
    source: &dyn EventSource,
    request: &ExtractRequest<'_>,
) -> Result<Histogram> {
    let wrap = |what: &str, e: Error| Error::Expression(format!("{what} for '{}': {e}", request.name));
    let spec = HistogramSpec {
        name: request.name.clone(),
        variable: CompiledExpr::compile(request.variable).map_err(|e| wrap("variable", e))?,
        weight: Some(request.weight.compile().map_err(|e| wrap("weight", e))?),
        selection: Some(request.selection.compile().map_err(|e| wrap("selection", e))?),
        binning: request.binning,
        flow_policy: request.flow_policy,
    };

    tracing::debug!(
        name = %request.name,
        path = %request.path.display(),
        expression = %format!("({})*({})", request.selection, request.weight),
        "extracting histogram"
    );

    let branches = spec.required_branches();
    let batch = source.read_branches(request.path, request.tree, &branches)?;
    let hist = fill_histogram(&spec, &batch)?;

    tracing::debug!(
        name = %hist.name,
        entries = hist.entries,
        integral = hist.integral(),
        "extracted"
    );
    Ok(hist)
}
