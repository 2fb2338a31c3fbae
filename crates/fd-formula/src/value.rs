//! Runtime operand type of the evaluator.

use crate::error::EvaluationError;
use ndarray::{Array2, Zip};

/// Intermediate result of evaluating a sub-tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Numeric `[T, N]` array
    Array(Array2<f64>),
    /// Boolean `[T, N]` array produced by comparisons
    Mask(Array2<bool>),
    /// Scalar constant, broadcast where an array is required
    Scalar(f64),
}

impl Value {
    /// Shape of an array-valued operand.
    pub fn shape(&self) -> Option<(usize, usize)> {
        match self {
            Self::Array(a) => Some(a.dim()),
            Self::Mask(m) => Some(m.dim()),
            Self::Scalar(_) => None,
        }
    }

    /// Numeric array of the given shape. Scalars broadcast, masks become 1/0.
    pub fn into_array(self, shape: (usize, usize)) -> Array2<f64> {
        match self {
            Self::Array(a) => a,
            Self::Mask(m) => m.mapv(|b| if b { 1.0 } else { 0.0 }),
            Self::Scalar(v) => Array2::from_elem(shape, v),
        }
    }

    /// Boolean array of the given shape. Non-zero numbers count as true.
    pub fn into_mask(self, shape: (usize, usize)) -> Array2<bool> {
        match self {
            Self::Array(a) => a.mapv(|v| v != 0.0),
            Self::Mask(m) => m,
            Self::Scalar(v) => Array2::from_elem(shape, v != 0.0),
        }
    }

    fn into_numeric(self) -> Numeric {
        match self {
            Self::Scalar(v) => Numeric::Scalar(v),
            other => {
                let shape = other.shape().unwrap_or((0, 0));
                Numeric::Array(other.into_array(shape))
            }
        }
    }
}

enum Numeric {
    Array(Array2<f64>),
    Scalar(f64),
}

fn check_shapes(a: &Array2<f64>, b: &Array2<f64>) -> Result<(), EvaluationError> {
    if a.dim() == b.dim() {
        Ok(())
    } else {
        Err(EvaluationError::ShapeMismatch {
            left: a.dim(),
            right: b.dim(),
        })
    }
}

/// Apply `f` elementwise, broadcasting scalar operands.
///
/// The result reuses the left array's buffer when it has one.
pub(crate) fn zip_numeric(
    a: Value,
    b: Value,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Value, EvaluationError> {
    Ok(match (a.into_numeric(), b.into_numeric()) {
        (Numeric::Scalar(x), Numeric::Scalar(y)) => Value::Scalar(f(x, y)),
        (Numeric::Array(a), Numeric::Scalar(y)) => Value::Array(a.mapv_into(|x| f(x, y))),
        (Numeric::Scalar(x), Numeric::Array(b)) => Value::Array(b.mapv_into(|y| f(x, y))),
        (Numeric::Array(mut a), Numeric::Array(b)) => {
            check_shapes(&a, &b)?;
            Zip::from(&mut a).and(&b).for_each(|x, &y| *x = f(*x, y));
            Value::Array(a)
        }
    })
}

/// Compare elementwise, broadcasting scalar operands.
pub(crate) fn compare(
    a: Value,
    b: Value,
    f: impl Fn(f64, f64) -> bool,
) -> Result<Value, EvaluationError> {
    Ok(match (a.into_numeric(), b.into_numeric()) {
        (Numeric::Scalar(x), Numeric::Scalar(y)) => Value::Scalar(if f(x, y) { 1.0 } else { 0.0 }),
        (Numeric::Array(a), Numeric::Scalar(y)) => Value::Mask(a.mapv(|x| f(x, y))),
        (Numeric::Scalar(x), Numeric::Array(b)) => Value::Mask(b.mapv(|y| f(x, y))),
        (Numeric::Array(a), Numeric::Array(b)) => {
            check_shapes(&a, &b)?;
            Value::Mask(Zip::from(&a).and(&b).map_collect(|&x, &y| f(x, y)))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_scalar_broadcast() {
        let a = Value::Array(array![[1.0, 2.0], [3.0, 4.0]]);
        let out = zip_numeric(a, Value::Scalar(10.0), |x, y| x + y).unwrap();
        assert_eq!(out, Value::Array(array![[11.0, 12.0], [13.0, 14.0]]));

        let out = zip_numeric(Value::Scalar(1.0), Value::Scalar(2.0), |x, y| x - y).unwrap();
        assert_eq!(out, Value::Scalar(-1.0));
    }

    #[test]
    fn test_mask_as_number() {
        let mask = Value::Mask(array![[true, false]]);
        let out = zip_numeric(mask, Value::Array(array![[2.0, 2.0]]), |x, y| x * y).unwrap();
        assert_eq!(out, Value::Array(array![[2.0, 0.0]]));
    }

    #[test]
    fn test_compare_shape_mismatch() {
        let a = Value::Array(Array2::zeros((2, 3)));
        let b = Value::Array(Array2::zeros((3, 2)));
        let err = compare(a, b, |x, y| x < y).unwrap_err();
        assert_eq!(
            err,
            EvaluationError::ShapeMismatch {
                left: (2, 3),
                right: (3, 2)
            }
        );
    }

    #[test]
    fn test_into_mask_and_back() {
        let v = Value::Array(array![[0.0, -1.5, f64::NAN]]);
        let mask = v.into_mask((1, 3));
        assert_eq!(mask, array![[false, true, true]]);
        let back = Value::Mask(mask).into_array((1, 3));
        assert_eq!(back, array![[0.0, 1.0, 1.0]]);
        assert_eq!(Value::Scalar(2.0).into_array((1, 2)), array![[2.0, 2.0]]);
    }
}
