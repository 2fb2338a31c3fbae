//! Industry-grouped cross-sectional operators.
//!
//! These read the panel's industry classification, a `[T, N]` array of
//! integer industry ids. Group means run over every cell of the row, NaN read
//! as zero.

use super::{Builtin, Kernel, finite_or_zero};
use crate::{error::EvaluationError, panel::Panel, registry::OperatorCategory};
use ndarray::{Array2, Zip};
use std::collections::HashMap;

pub(crate) fn operators() -> Vec<Builtin> {
    use OperatorCategory::Industry;
    vec![
        Builtin::new(
            "csind",
            "Mean of the cell's industry within the row",
            Industry,
            Kernel::Unary(csind),
        ),
        Builtin::new(
            "csindneutral",
            "Cell minus the mean of its industry within the row",
            Industry,
            Kernel::Unary(csindneutral),
        ),
    ]
}

fn industry_means(
    operator: &str,
    a: &Array2<f64>,
    panel: &Panel,
) -> Result<Array2<f64>, EvaluationError> {
    let industry = panel
        .industry()
        .ok_or_else(|| EvaluationError::MissingClassification(operator.to_string()))?;
    if industry.dim() != a.dim() {
        return Err(EvaluationError::ShapeMismatch {
            left: a.dim(),
            right: industry.dim(),
        });
    }

    let mut means = Array2::zeros(a.raw_dim());
    Zip::from(means.rows_mut())
        .and(a.rows())
        .and(industry.rows())
        .for_each(|mut out, values, ids| {
            let mut groups: HashMap<i64, (f64, usize)> = HashMap::new();
            for (&v, &id) in values.iter().zip(ids) {
                let group = groups.entry(id).or_default();
                group.0 += finite_or_zero(v);
                group.1 += 1;
            }
            for (cell, id) in out.iter_mut().zip(ids) {
                *cell = groups.get(id).map_or(0.0, |&(sum, n)| sum / n as f64);
            }
        });
    Ok(means)
}

fn csind(a: Array2<f64>, panel: &Panel) -> Result<Array2<f64>, EvaluationError> {
    industry_means("csind", &a, panel)
}

fn csindneutral(a: Array2<f64>, panel: &Panel) -> Result<Array2<f64>, EvaluationError> {
    let means = industry_means("csindneutral", &a, panel)?;
    Ok(a.mapv_into(finite_or_zero) - means)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn panel() -> Panel {
        Panel::all_eligible((2, 4))
            .with_industry(array![[1, 1, 2, 2], [1, 2, 2, 2]])
            .unwrap()
    }

    #[test]
    fn test_csind_group_means() {
        let a = array![[1.0, 3.0, 10.0, 20.0], [5.0, 1.0, 2.0, 3.0]];
        let out = csind(a, &panel()).unwrap();
        assert_eq!(out, array![[2.0, 2.0, 15.0, 15.0], [5.0, 2.0, 2.0, 2.0]]);
    }

    #[test]
    fn test_csindneutral_removes_group_mean() {
        let a = array![[1.0, 3.0, 10.0, 20.0], [5.0, 1.0, 2.0, 3.0]];
        let out = csindneutral(a, &panel()).unwrap();
        assert_eq!(out, array![[-1.0, 1.0, -5.0, 5.0], [0.0, -1.0, 0.0, 1.0]]);
        for row in out.rows() {
            assert_relative_eq!(row.sum(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_requires_classification() {
        let err = csind(Array2::zeros((2, 4)), &Panel::all_eligible((2, 4))).unwrap_err();
        assert_eq!(err, EvaluationError::MissingClassification("csind".to_string()));
    }
}
