//! Cross-sectional operators.
//!
//! Both operators work row by row over the cells marked eligible in the
//! panel's `top` mask. Non-finite inputs are read as zero.

use super::{Builtin, Kernel, finite_or_zero};
use crate::{error::EvaluationError, panel::Panel, registry::OperatorCategory};
use ndarray::{Array2, ArrayView1};

/// Bound applied to standardised scores.
pub const ZSCORE_CLIP: f64 = 3.0;

pub(crate) fn operators() -> Vec<Builtin> {
    use OperatorCategory::CrossSectional;
    vec![
        Builtin::new(
            "csrank",
            "Rank within the eligible cross-section, scaled to [0, 1]",
            CrossSectional,
            Kernel::Unary(csrank),
        ),
        Builtin::new(
            "zscore",
            "Standardise within the eligible cross-section, clipped to [-3, 3]",
            CrossSectional,
            Kernel::Unary(zscore),
        ),
    ]
}

fn eligible(mask: ArrayView1<'_, bool>) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(j, &keep)| keep.then_some(j))
        .collect()
}

/// Rank of each eligible cell divided by `eligible - 1`.
///
/// Ties keep their column order. A row with a single eligible cell ranks it
/// at zero; rows without eligible cells are left as they are.
fn csrank(mut a: Array2<f64>, panel: &Panel) -> Result<Array2<f64>, EvaluationError> {
    a.mapv_inplace(finite_or_zero);
    for (mut row, mask) in a.rows_mut().into_iter().zip(panel.top().rows()) {
        let mut cells: Vec<(usize, f64)> = eligible(mask).into_iter().map(|j| (j, row[j])).collect();
        if cells.is_empty() {
            continue;
        }
        let scale = cells.len().saturating_sub(1).max(1) as f64;
        cells.sort_by(|x, y| x.1.total_cmp(&y.1));
        for (rank, (j, _)) in cells.into_iter().enumerate() {
            row[j] = rank as f64 / scale;
        }
    }
    Ok(a)
}

/// Subtract the eligible mean and divide by the eligible standard deviation.
///
/// Rows with at most one eligible cell are not standardised. Every cell of the
/// result is clipped to `[-ZSCORE_CLIP, ZSCORE_CLIP]`.
fn zscore(mut a: Array2<f64>, panel: &Panel) -> Result<Array2<f64>, EvaluationError> {
    a.mapv_inplace(finite_or_zero);
    for (mut row, mask) in a.rows_mut().into_iter().zip(panel.top().rows()) {
        let cells = eligible(mask);
        if cells.len() <= 1 {
            continue;
        }
        let n = cells.len() as f64;
        let mean = cells.iter().map(|&j| row[j]).sum::<f64>() / n;
        let std = (cells.iter().map(|&j| (row[j] - mean).powi(2)).sum::<f64>() / n).sqrt();
        for &j in &cells {
            let centred = row[j] - mean;
            row[j] = if std > 0.0 { centred / std } else { centred };
        }
    }
    a.mapv_inplace(|v| v.clamp(-ZSCORE_CLIP, ZSCORE_CLIP));
    Ok(a)
}
