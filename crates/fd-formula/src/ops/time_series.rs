//! Rolling operators over a trailing window of rows.
//!
//! Each instrument column is processed independently. A cell whose trailing
//! window is not full yet is zero, and so is any statistic that turns out
//! non-finite (a NaN in the window, a zero variance denominator).
//!
//! Moments are population moments (ddof = 0).

use super::{Builtin, Kernel, finite_or_zero};
use crate::registry::OperatorCategory;
use ndarray::{Array2, ArrayView1, Axis, Slice, Zip};

/// Multiple of the accumulated rounding error a window deviation must exceed
/// to count as variance.
const ROUNDING_SLACK: f64 = 4.0;

pub(crate) fn operators() -> Vec<Builtin> {
    use OperatorCategory::TimeSeries;
    vec![
        Builtin::new(
            "tsdelay",
            "Value k rows earlier, zero for the first k rows",
            TimeSeries,
            Kernel::Windowed(ts_delay),
        ),
        Builtin::new(
            "tsdelta",
            "Change over k rows, zero for the first k rows",
            TimeSeries,
            Kernel::Windowed(ts_delta),
        ),
        Builtin::new("tsmean", "Trailing mean", TimeSeries, Kernel::Windowed(ts_mean)),
        Builtin::new(
            "tsstd",
            "Trailing standard deviation",
            TimeSeries,
            Kernel::Windowed(ts_std),
        ),
        Builtin::new("tsskew", "Trailing skewness", TimeSeries, Kernel::Windowed(ts_skew)),
        Builtin::new(
            "tskurtosis",
            "Trailing excess kurtosis",
            TimeSeries,
            Kernel::Windowed(ts_kurtosis),
        ),
        Builtin::new(
            "wdirect",
            "Trailing centred values weighted by recency, over the window deviation",
            TimeSeries,
            Kernel::Windowed(wdirect),
        ),
        Builtin::new(
            "tsrank",
            "Rank of the current value within the trailing window, scaled to [0, 1]",
            TimeSeries,
            Kernel::Windowed(ts_rank),
        ),
        Builtin::new(
            "tscorr",
            "Trailing Pearson correlation of two series",
            TimeSeries,
            Kernel::PairWindowed(ts_corr),
        ),
    ]
}

/// Central moments of one window.
#[derive(Debug, Clone, Copy)]
struct Moments {
    len: f64,
    scale: f64,
    mean: f64,
    m2: f64,
    m3: f64,
    m4: f64,
}

impl Moments {
    fn of(window: ArrayView1<'_, f64>) -> Self {
        let n = window.len() as f64;
        let mean = window.sum() / n;
        let scale = window.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));
        let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
        for &x in window {
            let d = x - mean;
            let d2 = d * d;
            m2 += d2;
            m3 += d2 * d;
            m4 += d2 * d2;
        }
        Self {
            len: n,
            scale,
            mean,
            m2: m2 / n,
            m3: m3 / n,
            m4: m4 / n,
        }
    }

    /// A constant window still shows deviations of a few ulps of its largest
    /// magnitude after the mean is subtracted, so the spread has to clear that.
    fn has_variance(&self) -> bool {
        let noise = ROUNDING_SLACK * self.len * self.scale * f64::EPSILON;
        self.m2 > noise * noise
    }

    fn std(&self) -> f64 {
        self.m2.sqrt()
    }
}

/// Fill every row with a full trailing window of `k` rows using `stat`.
fn rolling(a: &Array2<f64>, k: usize, stat: impl Fn(ArrayView1<'_, f64>) -> f64) -> Array2<f64> {
    let rows = a.nrows();
    let mut out = Array2::zeros(a.raw_dim());
    if k == 0 || k > rows {
        return out;
    }
    Zip::from(out.columns_mut())
        .and(a.columns())
        .for_each(|mut dst, src| {
            for end in k..=rows {
                let window = src.slice_axis(Axis(0), Slice::from(end - k..end));
                dst[end - 1] = finite_or_zero(stat(window));
            }
        });
    out
}

/// Same as [`rolling`] over two aligned arrays.
fn rolling_pair(
    a: &Array2<f64>,
    b: &Array2<f64>,
    k: usize,
    stat: impl Fn(ArrayView1<'_, f64>, ArrayView1<'_, f64>) -> f64,
) -> Array2<f64> {
    let rows = a.nrows();
    let mut out = Array2::zeros(a.raw_dim());
    if k == 0 || k > rows {
        return out;
    }
    Zip::from(out.columns_mut())
        .and(a.columns())
        .and(b.columns())
        .for_each(|mut dst, x, y| {
            for end in k..=rows {
                let window = Slice::from(end - k..end);
                let (wx, wy) = (x.slice_axis(Axis(0), window), y.slice_axis(Axis(0), window));
                dst[end - 1] = finite_or_zero(stat(wx, wy));
            }
        });
    out
}

pub(crate) fn ts_delay(a: &Array2<f64>, k: usize) -> Array2<f64> {
    let rows = a.nrows();
    let mut out = Array2::zeros(a.raw_dim());
    if k < rows {
        out.slice_axis_mut(Axis(0), Slice::from(k..))
            .assign(&a.slice_axis(Axis(0), Slice::from(..rows - k)));
    }
    out
}

pub(crate) fn ts_delta(a: &Array2<f64>, k: usize) -> Array2<f64> {
    let rows = a.nrows();
    let mut out = Array2::zeros(a.raw_dim());
    if k < rows {
        let change = &a.slice_axis(Axis(0), Slice::from(k..))
            - &a.slice_axis(Axis(0), Slice::from(..rows - k));
        out.slice_axis_mut(Axis(0), Slice::from(k..)).assign(&change);
    }
    out
}

/// Trailing mean from a running sum.
///
/// Non-finite values are tracked separately so one bad print only blanks the
/// windows that contain it.
pub(crate) fn ts_mean(a: &Array2<f64>, k: usize) -> Array2<f64> {
    let rows = a.nrows();
    let mut out = Array2::zeros(a.raw_dim());
    if k == 0 || k > rows {
        return out;
    }
    let len = k as f64;
    Zip::from(out.columns_mut())
        .and(a.columns())
        .for_each(|mut dst, src| {
            let mut sum = 0.0;
            let mut bad = 0_usize;
            for t in 0..rows {
                let entering = src[t];
                if entering.is_finite() {
                    sum += entering;
                } else {
                    bad += 1;
                }
                if t >= k {
                    let leaving = src[t - k];
                    if leaving.is_finite() {
                        sum -= leaving;
                    } else {
                        bad -= 1;
                    }
                }
                if t + 1 >= k && bad == 0 {
                    dst[t] = sum / len;
                }
            }
        });
    out
}

pub(crate) fn ts_std(a: &Array2<f64>, k: usize) -> Array2<f64> {
    rolling(a, k, |w| {
        let m = Moments::of(w);
        if m.has_variance() { m.std() } else { 0.0 }
    })
}

pub(crate) fn ts_skew(a: &Array2<f64>, k: usize) -> Array2<f64> {
    rolling(a, k, |w| {
        let m = Moments::of(w);
        if m.has_variance() {
            m.m3 / (m.m2 * m.std())
        } else {
            0.0
        }
    })
}

pub(crate) fn ts_kurtosis(a: &Array2<f64>, k: usize) -> Array2<f64> {
    rolling(a, k, |w| {
        let m = Moments::of(w);
        if m.has_variance() {
            m.m4 / (m.m2 * m.m2) - 3.0
        } else {
            0.0
        }
    })
}

/// `sum(i * (x_i - mean)) / std` with weights `1..=k`, oldest row first.
pub(crate) fn wdirect(a: &Array2<f64>, k: usize) -> Array2<f64> {
    rolling(a, k, |w| {
        let m = Moments::of(w);
        if !m.has_variance() {
            return 0.0;
        }
        let weighted: f64 = w
            .iter()
            .enumerate()
            .map(|(i, &x)| (i + 1) as f64 * (x - m.mean))
            .sum();
        weighted / m.std()
    })
}

/// Count of finite window values strictly below the current one, over `k - 1`.
pub(crate) fn ts_rank(a: &Array2<f64>, k: usize) -> Array2<f64> {
    if k <= 1 {
        return Array2::zeros(a.raw_dim());
    }
    let scale = (k - 1) as f64;
    rolling(a, k, |w| {
        let current = finite_or_zero(w[w.len() - 1]);
        let below = w.iter().filter(|&&x| x.is_finite() && x < current).count();
        below as f64 / scale
    })
}

pub(crate) fn ts_corr(a: &Array2<f64>, b: &Array2<f64>, k: usize) -> Array2<f64> {
    rolling_pair(a, b, k, |x, y| {
        let (mx, my) = (Moments::of(x), Moments::of(y));
        if !mx.has_variance() || !my.has_variance() {
            return 0.0;
        }
        let cov = x
            .iter()
            .zip(y)
            .map(|(&xi, &yi)| (xi - mx.mean) * (yi - my.mean))
            .sum::<f64>()
            / mx.len;
        cov / (mx.std() * my.std())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rstest::rstest;

    fn column(values: &[f64]) -> Array2<f64> {
        Array2::from_shape_vec((values.len(), 1), values.to_vec()).unwrap()
    }

    #[test]
    fn test_delay_shifts_down() {
        let a = column(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(ts_delay(&a, 2), column(&[0.0, 0.0, 1.0, 2.0, 3.0]));
        assert_eq!(ts_delay(&a, 0), a);
        assert_eq!(ts_delay(&a, 9), column(&[0.0; 5]));
    }

    #[test]
    fn test_delta() {
        let a = column(&[1.0, 2.0, 4.0, 8.0]);
        assert_eq!(ts_delta(&a, 1), column(&[0.0, 1.0, 2.0, 4.0]));
        assert_eq!(ts_delta(&a, 2), column(&[0.0, 0.0, 3.0, 6.0]));
    }

    #[test]
    fn test_mean_matches_direct() {
        let a = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let out = ts_mean(&a, 3);
        assert_eq!(out.row(0), array![0.0, 0.0]);
        assert_eq!(out.row(1), array![0.0, 0.0]);
        assert_relative_eq!(out[[2, 0]], 2.0);
        assert_relative_eq!(out[[3, 1]], 30.0);
    }

    #[test]
    fn test_mean_blanks_windows_with_nan() {
        let a = column(&[1.0, f64::NAN, 3.0, 5.0, 7.0]);
        let out = ts_mean(&a, 2);
        assert_eq!(out, column(&[0.0, 0.0, 0.0, 4.0, 6.0]));
    }

    #[test]
    fn test_std_population() {
        let a = column(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let out = ts_std(&a, 8);
        assert_relative_eq!(out[[7, 0]], 2.0, epsilon = 1e-12);
    }

    #[rstest]
    #[case::std(ts_std)]
    #[case::skew(ts_skew)]
    #[case::kurtosis(ts_kurtosis)]
    #[case::wdirect(wdirect)]
    fn test_zero_variance_is_zero(#[case] op: fn(&Array2<f64>, usize) -> Array2<f64>) {
        let a = column(&[100.1; 12]);
        let out = op(&a, 5);
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_std_of_large_level() {
        // +-5 around 1e8: variance is small next to the squared level but real
        let values: Vec<f64> = (0..10)
            .map(|i| if i % 2 == 0 { 1e8 + 5.0 } else { 1e8 - 5.0 })
            .collect();
        let out = ts_std(&column(&values), 5);
        assert_relative_eq!(out[[9, 0]], 24.0_f64.sqrt(), epsilon = 1e-6);
        assert!(ts_kurtosis(&column(&values), 5)[[9, 0]] != 0.0);
    }

    #[test]
    fn test_corr_with_constant_is_zero() {
        let flat = column(&[100.1; 6]);
        let moving = column(&[1.0, 3.0, 2.0, 5.0, 4.0, 6.0]);
        assert!(ts_corr(&flat, &moving, 4).iter().all(|&v| v == 0.0));
        assert!(ts_corr(&moving, &flat, 4).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_skew_sign() {
        let right_tail = column(&[0.0, 0.0, 0.0, 0.0, 10.0]);
        assert!(ts_skew(&right_tail, 5)[[4, 0]] > 0.0);
        let left_tail = column(&[0.0, 0.0, 0.0, 0.0, -10.0]);
        assert!(ts_skew(&left_tail, 5)[[4, 0]] < 0.0);
    }

    #[test]
    fn test_kurtosis_two_point() {
        // symmetric two-point distribution has kurtosis 1, excess -2
        let a = column(&[1.0, -1.0, 1.0, -1.0]);
        assert_relative_eq!(ts_kurtosis(&a, 4)[[3, 0]], -2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_wdirect_trend_is_positive() {
        let a = column(&[1.0, 2.0, 3.0]);
        // centred [-1, 0, 1], weights [1, 2, 3], std sqrt(2/3)
        let expected = 2.0 / (2.0_f64 / 3.0).sqrt();
        assert_relative_eq!(wdirect(&a, 3)[[2, 0]], expected, epsilon = 1e-12);
        assert_eq!(wdirect(&a, 3)[[1, 0]], 0.0);
    }

    #[test]
    fn test_rank_within_window() {
        let a = column(&[3.0, 1.0, 2.0, 5.0, 0.0]);
        let out = ts_rank(&a, 3);
        assert_eq!(out, column(&[0.0, 0.0, 0.5, 1.0, 0.0]));
        assert_eq!(ts_rank(&a, 1), column(&[0.0; 5]));
    }

    #[test]
    fn test_corr_perfect() {
        let a = column(&[1.0, 2.0, 3.0, 4.0]);
        let b = column(&[2.0, 4.0, 6.0, 8.0]);
        let c = column(&[8.0, 6.0, 4.0, 2.0]);
        assert_relative_eq!(ts_corr(&a, &b, 3)[[3, 0]], 1.0, epsilon = 1e-12);
        assert_relative_eq!(ts_corr(&a, &c, 4)[[3, 0]], -1.0, epsilon = 1e-12);
        assert_eq!(ts_corr(&a, &b, 3)[[1, 0]], 0.0);
    }

    #[test]
    fn test_window_longer_than_history() {
        let a = column(&[1.0, 2.0]);
        assert_eq!(ts_mean(&a, 5), column(&[0.0, 0.0]));
        assert_eq!(ts_corr(&a, &a, 5), column(&[0.0, 0.0]));
    }
}
