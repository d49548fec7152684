//! Histogram combiner: bin-wise sum of same-binning histograms.

use tnp_core::{Error, Result};
use tnp_ntuple::Histogram;

/// Sum `inputs` into a new histogram called `name`.
///
/// Contents add linearly and `sumw2` adds, so errors combine in quadrature.
/// An empty input list is an error: it means a category has no contributor
/// for some kinematic bin and must not turn into a silent zero template.
pub fn combine_histograms(name: &str, inputs: &[&Histogram]) -> Result<Histogram> {
    let Some(first) = inputs.first() else {
        return Err(Error::Histogram(format!("cannot build '{name}' from zero histograms")));
    };

    let mut out = Histogram::new(name, first.binning);
    for h in inputs {
        if !h.same_binning(first) {
            return Err(Error::Histogram(format!(
                "cannot build '{name}': '{}' has binning {:?}, expected {:?}",
                h.name, h.binning, first.binning
            )));
        }
        for (acc, v) in out.content.iter_mut().zip(&h.content) {
            *acc += v;
        }
        for (acc, v) in out.sumw2.iter_mut().zip(&h.sumw2) {
            *acc += v;
        }
        out.underflow += h.underflow;
        out.overflow += h.overflow;
        out.entries += h.entries;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use tnp_ntuple::Binning;

    fn hist(name: &str, content: Vec<f64>, sumw2: Vec<f64>) -> Histogram {
        let binning = Binning::new(content.len(), 0.0, 200.0).unwrap();
        Histogram::from_bins(name, binning, content, sumw2).unwrap()
    }

    #[test]
    fn sums_contents_and_errors() {
        let a = hist("a", vec![1.0, 2.0, 3.0], vec![1.0, 4.0, 9.0]);
        let b = hist("b", vec![4.0, -1.0, 0.0], vec![16.0, 1.0, 0.0]);
        let c = combine_histograms("sum", &[&a, &b]).unwrap();
        assert_eq!(c.name, "sum");
        assert_eq!(c.content, vec![5.0, 1.0, 3.0]);
        assert_relative_eq!(c.error(0), 17.0_f64.sqrt());
        assert_relative_eq!(c.error(1), 5.0_f64.sqrt());
        // inputs are untouched
        assert_eq!(a.content, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn single_input_is_a_renamed_copy() {
        let a = hist("a", vec![1.0, 2.0], vec![1.0, 2.0]);
        let c = combine_histograms("only", &[&a]).unwrap();
        assert_eq!(c.content, a.content);
        assert_eq!(c.sumw2, a.sumw2);
    }

    #[test]
    fn empty_input_fails_loudly() {
        let err = combine_histograms("sig_0to100_pass_nominal", &[]).unwrap_err();
        assert!(matches!(err, Error::Histogram(_)));
        assert!(err.to_string().contains("sig_0to100_pass_nominal"));
    }

    #[test]
    fn binning_mismatch_is_rejected() {
        let a = hist("a", vec![1.0, 2.0], vec![1.0, 2.0]);
        let b = hist("b", vec![1.0, 2.0, 3.0], vec![1.0, 2.0, 3.0]);
        assert!(combine_histograms("sum", &[&a, &b]).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]

        #[test]
        fn prop_additive_in_content_and_quadrature_in_error(
            rows in prop::collection::vec(prop::collection::vec(-50.0f64..50.0, 6), 1..5),
        ) {
            let hs: Vec<Histogram> = rows
                .iter()
                .enumerate()
                .map(|(i, r)| hist(&format!("h{i}"), r.clone(), r.iter().map(|v| v * v).collect()))
                .collect();
            let refs: Vec<&Histogram> = hs.iter().collect();
            let c = combine_histograms("sum", &refs).unwrap();
            for bin in 0..6 {
                let sum: f64 = rows.iter().map(|r| r[bin]).sum();
                let quad: f64 = rows.iter().map(|r| r[bin] * r[bin]).sum::<f64>().sqrt();
                prop_assert!((c.content[bin] - sum).abs() < 1e-9);
                prop_assert!((c.error(bin) - quad).abs() < 1e-9);
            }
        }
    }
}
