//! Comparisons and conditional selection.

use super::{Builtin, Kernel};
use crate::{
    error::EvaluationError,
    registry::OperatorCategory,
    value::{Value, compare},
};
use ndarray::Zip;

pub(crate) fn operators() -> Vec<Builtin> {
    use OperatorCategory::Logical;
    vec![
        Builtin::new("lt", "Elementwise a < b", Logical, Kernel::Binary(lt)),
        Builtin::new("le", "Elementwise a <= b", Logical, Kernel::Binary(le)),
        Builtin::new("gt", "Elementwise a > b", Logical, Kernel::Binary(gt)),
        Builtin::new("ge", "Elementwise a >= b", Logical, Kernel::Binary(ge)),
        Builtin::new(
            "condition",
            "Select the second argument where the first holds, else the third",
            Logical,
            Kernel::Ternary(condition),
        ),
    ]
}

fn lt(a: Value, b: Value) -> Result<Value, EvaluationError> {
    compare(a, b, |x, y| x < y)
}

fn le(a: Value, b: Value) -> Result<Value, EvaluationError> {
    compare(a, b, |x, y| x <= y)
}

fn gt(a: Value, b: Value) -> Result<Value, EvaluationError> {
    compare(a, b, |x, y| x > y)
}

fn ge(a: Value, b: Value) -> Result<Value, EvaluationError> {
    compare(a, b, |x, y| x >= y)
}

/// `if cond { yes } else { no }` per cell.
///
/// `yes` and `no` may be scalars, broadcast over the condition's shape.
fn condition(cond: Value, yes: Value, no: Value) -> Result<Value, EvaluationError> {
    let Some(shape) = cond.shape().or(yes.shape()).or(no.shape()) else {
        let holds = matches!(cond, Value::Scalar(c) if c != 0.0);
        return Ok(if holds { yes } else { no });
    };
    let mask = cond.into_mask(shape);
    let (yes, no) = (yes.into_array(shape), no.into_array(shape));
    for other in [yes.dim(), no.dim()] {
        if other != mask.dim() {
            return Err(EvaluationError::ShapeMismatch {
                left: mask.dim(),
                right: other,
            });
        }
    }
    Ok(Value::Array(
        Zip::from(&mask)
            .and(&yes)
            .and(&no)
            .map_collect(|&m, &y, &n| if m { y } else { n }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    #[test]
    fn test_comparisons() {
        let a = || Value::Array(array![[1.0, 2.0, 3.0]]);
        assert_eq!(lt(a(), Value::Scalar(2.0)).unwrap(), Value::Mask(array![[true, false, false]]));
        assert_eq!(le(a(), Value::Scalar(2.0)).unwrap(), Value::Mask(array![[true, true, false]]));
        assert_eq!(gt(a(), Value::Scalar(2.0)).unwrap(), Value::Mask(array![[false, false, true]]));
        assert_eq!(ge(a(), Value::Scalar(2.0)).unwrap(), Value::Mask(array![[false, true, true]]));
    }

    #[test]
    fn test_condition_arrays() {
        let cond = Value::Mask(array![[true, false], [false, true]]);
        let yes = Value::Array(array![[1.0, 2.0], [3.0, 4.0]]);
        let no = Value::Array(array![[-1.0, -2.0], [-3.0, -4.0]]);
        assert_eq!(
            condition(cond, yes, no).unwrap(),
            Value::Array(array![[1.0, -2.0], [-3.0, 4.0]])
        );
    }

    #[test]
    fn test_condition_scalar_branches() {
        let cond = Value::Mask(array![[true, false, true]]);
        let out = condition(cond, Value::Scalar(1.0), Value::Scalar(-1.0)).unwrap();
        assert_eq!(out, Value::Array(array![[1.0, -1.0, 1.0]]));
    }

    #[test]
    fn test_condition_numeric_cond() {
        let cond = Value::Array(array![[0.0, 2.0]]);
        let out = condition(cond, Value::Scalar(5.0), Value::Array(array![[7.0, 8.0]])).unwrap();
        assert_eq!(out, Value::Array(array![[7.0, 5.0]]));
    }

    #[test]
    fn test_condition_all_scalars() {
        let out = condition(Value::Scalar(0.0), Value::Scalar(1.0), Value::Scalar(2.0)).unwrap();
        assert_eq!(out, Value::Scalar(2.0));
    }

    #[test]
    fn test_condition_shape_mismatch() {
        let cond = Value::Mask(Array2::from_elem((2, 2), true));
        let yes = Value::Array(Array2::zeros((2, 3)));
        let err = condition(cond, yes, Value::Scalar(0.0)).unwrap_err();
        assert!(matches!(err, EvaluationError::ShapeMismatch { .. }));
    }
}
