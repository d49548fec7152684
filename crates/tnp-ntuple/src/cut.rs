//! Typed selections and weights.
//!
//! Configuration fragments stay opaque ([`Cut::Expr`], [`WeightFactor::Expr`]);
//! everything the builder adds on top of them (kinematic windows, tagger
//! thresholds, conjunctions, weight products) is structured so that the
//! final expression string is produced in exactly one place.

use std::fmt;

use tnp_core::Result;

use crate::expr::CompiledExpr;

/// Comparison used by [`Cut::Threshold`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `var >= value`
    Ge,
    /// `var < value`
    Lt,
}

/// A boolean event selection.
#[derive(Debug, Clone, PartialEq)]
pub enum Cut {
    /// Accept every event.
    True,
    /// Opaque fragment in the expression grammar.
    Expr(String),
    /// Half-open window `lo <= var < hi`.
    Range {
        /// Column or expression the window applies to.
        var: String,
        /// Inclusive lower edge.
        lo: f64,
        /// Exclusive upper edge.
        hi: f64,
    },
    /// Single-sided threshold on `var`.
    Threshold {
        /// Column or expression being compared.
        var: String,
        /// Comparison operator.
        op: CmpOp,
        /// Threshold value.
        value: f64,
    },
    /// Conjunction of all parts.
    And(Vec<Cut>),
}

impl Cut {
    /// Opaque fragment; blank strings select everything.
    pub fn expr(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() { Cut::True } else { Cut::Expr(text) }
    }

    /// Conjunction of `parts`, flattening nested conjunctions and dropping `True`.
    pub fn all(parts: impl IntoIterator<Item = Cut>) -> Self {
        let mut flat = Vec::new();
        for part in parts {
            match part {
                Cut::True => {}
                Cut::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Cut::True,
            1 => flat.pop().unwrap_or(Cut::True),
            _ => Cut::And(flat),
        }
    }

    /// Compile into an evaluable expression.
    pub fn compile(&self) -> Result<CompiledExpr> {
        CompiledExpr::compile(&self.to_string())
    }
}

impl fmt::Display for Cut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cut::True => write!(f, "1"),
            Cut::Expr(text) => write!(f, "{text}"),
            Cut::Range { var, lo, hi } => write!(f, "({var} >= {lo}) && ({var} < {hi})"),
            Cut::Threshold { var, op: CmpOp::Ge, value } => write!(f, "{var}>={value}"),
            Cut::Threshold { var, op: CmpOp::Lt, value } => write!(f, "{var}<{value}"),
            Cut::And(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, "&&")?;
                    }
                    write!(f, "({part})")?;
                }
                Ok(())
            }
        }
    }
}

/// One multiplicative factor of an event weight.
#[derive(Debug, Clone, PartialEq)]
pub enum WeightFactor {
    /// Numeric constant (luminosity, unit weight).
    Const(f64),
    /// Opaque fragment in the expression grammar.
    Expr(String),
}

impl fmt::Display for WeightFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightFactor::Const(v) => write!(f, "{v}"),
            WeightFactor::Expr(text) => write!(f, "{text}"),
        }
    }
}

/// Product of weight factors; the empty product is the unit weight.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Weight {
    factors: Vec<WeightFactor>,
}

impl Weight {
    /// Unit weight, as used for observed data.
    pub fn unit() -> Self {
        Self::default()
    }

    /// Weight consisting of a single constant.
    pub fn constant(value: f64) -> Self {
        Self { factors: vec![WeightFactor::Const(value)] }
    }

    /// Append a factor expression. Blank expressions are ignored.
    pub fn times(mut self, expr: impl Into<String>) -> Self {
        let expr = expr.into();
        if !expr.trim().is_empty() {
            self.factors.push(WeightFactor::Expr(expr));
        }
        self
    }

    /// Factors in multiplication order.
    pub fn factors(&self) -> &[WeightFactor] {
        &self.factors
    }

    /// Compile into an evaluable expression.
    pub fn compile(&self) -> Result<CompiledExpr> {
        CompiledExpr::compile(&self.to_string())
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.factors.as_slice() {
            [] => write!(f, "1."),
            [single] => write!(f, "{single}"),
            many => {
                for (i, factor) in many.iter().enumerate() {
                    if i > 0 {
                        write!(f, "*")?;
                    }
                    write!(f, "({factor})")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conjunction_renders_parenthesised() {
        let cut = Cut::all([
            Cut::expr("nJet >= 1"),
            Cut::expr(""),
            Cut::Range { var: "pt".into(), lo: 200.0, hi: 300.0 },
            Cut::Threshold { var: "score".into(), op: CmpOp::Ge, value: 0.5 },
        ]);
        assert_eq!(
            cut.to_string(),
            "(nJet >= 1)&&((pt >= 200) && (pt < 300))&&(score>=0.5)"
        );
    }

    #[test]
    fn conjunction_flattens_and_collapses() {
        let inner = Cut::all([Cut::expr("a > 1"), Cut::expr("b > 1")]);
        let outer = Cut::all([inner, Cut::expr("c > 1")]);
        assert!(matches!(&outer, Cut::And(parts) if parts.len() == 3));
        assert_eq!(Cut::all([Cut::True, Cut::expr("x")]), Cut::Expr("x".into()));
        assert_eq!(Cut::all(Vec::new()), Cut::True);
    }

    #[test]
    fn fail_threshold_is_strict() {
        let cut = Cut::Threshold { var: "score".into(), op: CmpOp::Lt, value: 0.5 };
        let e = cut.compile().unwrap();
        assert_eq!(e.eval_row(&[0.5]), 0.0);
        assert_eq!(e.eval_row(&[0.4]), 1.0);
    }

    #[test]
    fn weight_products() {
        assert_eq!(Weight::unit().to_string(), "1.");
        let w = Weight::constant(41.5).times("genWeight").times("").times("puWeight");
        assert_eq!(w.factors().len(), 3);
        assert_eq!(w.to_string(), "(41.5)*(genWeight)*(puWeight)");
        let e = w.compile().unwrap();
        assert_eq!(e.eval_row(&[2.0, 0.5]), 41.5);
    }
}
