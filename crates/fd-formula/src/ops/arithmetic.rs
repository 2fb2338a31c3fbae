//! Elementwise arithmetic.
//!
//! `prod` and `div` zero out NaN and infinite results; `add` and `minus` pass
//! them through.

use super::{Builtin, Kernel, finite_or_zero};
use crate::{
    error::EvaluationError,
    panel::Panel,
    registry::OperatorCategory,
    value::{Value, zip_numeric},
};
use ndarray::Array2;

pub(crate) fn operators() -> Vec<Builtin> {
    use OperatorCategory::Arithmetic;
    vec![
        Builtin::new("neg", "Negation", Arithmetic, Kernel::Unary(neg)),
        Builtin::new("add", "Elementwise sum", Arithmetic, Kernel::Binary(add)),
        Builtin::new("minus", "Elementwise difference", Arithmetic, Kernel::Binary(minus)),
        Builtin::new(
            "prod",
            "Elementwise product, non-finite results set to zero",
            Arithmetic,
            Kernel::Binary(prod),
        ),
        Builtin::new(
            "div",
            "Elementwise quotient, non-finite results set to zero",
            Arithmetic,
            Kernel::Binary(div),
        ),
    ]
}

fn neg(a: Array2<f64>, _panel: &Panel) -> Result<Array2<f64>, EvaluationError> {
    Ok(-a)
}

fn add(a: Value, b: Value) -> Result<Value, EvaluationError> {
    zip_numeric(a, b, |x, y| x + y)
}

fn minus(a: Value, b: Value) -> Result<Value, EvaluationError> {
    zip_numeric(a, b, |x, y| x - y)
}

fn prod(a: Value, b: Value) -> Result<Value, EvaluationError> {
    zip_numeric(a, b, |x, y| finite_or_zero(x * y))
}

fn div(a: Value, b: Value) -> Result<Value, EvaluationError> {
    zip_numeric(a, b, |x, y| finite_or_zero(x / y))
}
