//! Builtin operators.
//!
//! Each operator is a named kernel over panel arrays. Kernels never touch
//! caller-owned arrays: they consume operands the evaluator already copied, or
//! read through a reference and allocate a fresh result.

pub mod arithmetic;
pub mod cross_section;
pub mod industry;
pub mod logical;
pub mod time_series;

use crate::{
    error::EvaluationError,
    node::{Arity, Literal},
    panel::Panel,
    registry::{Operator, OperatorCategory},
    value::Value,
};
use ndarray::Array2;

type UnaryFn = fn(Array2<f64>, &Panel) -> Result<Array2<f64>, EvaluationError>;
type WindowedFn = fn(&Array2<f64>, usize) -> Array2<f64>;
type BinaryFn = fn(Value, Value) -> Result<Value, EvaluationError>;
type PairWindowedFn = fn(&Array2<f64>, &Array2<f64>, usize) -> Array2<f64>;
type TernaryFn = fn(Value, Value, Value) -> Result<Value, EvaluationError>;

/// Implementation of a builtin, one variant per arity class.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Kernel {
    Unary(UnaryFn),
    Windowed(WindowedFn),
    Binary(BinaryFn),
    PairWindowed(PairWindowedFn),
    Ternary(TernaryFn),
}

impl Kernel {
    const fn arity(self) -> Arity {
        match self {
            Self::Unary(_) => Arity::Unary,
            Self::Windowed(_) => Arity::UnaryWithParam,
            Self::Binary(_) => Arity::Binary,
            Self::PairWindowed(_) => Arity::BinaryWithParam,
            Self::Ternary(_) => Arity::Ternary,
        }
    }
}

/// A builtin operator: metadata plus kernel.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Builtin {
    name: &'static str,
    description: &'static str,
    category: OperatorCategory,
    kernel: Kernel,
}

impl Builtin {
    pub(crate) const fn new(
        name: &'static str,
        description: &'static str,
        category: OperatorCategory,
        kernel: Kernel,
    ) -> Self {
        Self {
            name,
            description,
            category,
            kernel,
        }
    }

    fn take<const K: usize>(&self, operands: Vec<Value>) -> Result<[Value; K], EvaluationError> {
        <[Value; K]>::try_from(operands).map_err(|given| EvaluationError::OperandCount {
            operator: self.name.to_string(),
            expected: K,
            found: given.len(),
        })
    }
}

impl Operator for Builtin {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn category(&self) -> OperatorCategory {
        self.category
    }

    fn arity(&self) -> Arity {
        self.kernel.arity()
    }

    fn apply(
        &self,
        operands: Vec<Value>,
        param: Option<Literal>,
        panel: &Panel,
    ) -> Result<Value, EvaluationError> {
        let shape = panel.shape();
        let window = param.map_or(0, Literal::as_window);
        match self.kernel {
            Kernel::Unary(f) => {
                let [a] = self.take(operands)?;
                f(a.into_array(shape), panel).map(Value::Array)
            }
            Kernel::Windowed(f) => {
                let [a] = self.take(operands)?;
                Ok(Value::Array(f(&a.into_array(shape), window)))
            }
            Kernel::Binary(f) => {
                let [a, b] = self.take(operands)?;
                f(a, b)
            }
            Kernel::PairWindowed(f) => {
                let [a, b] = self.take(operands)?;
                let (a, b) = (a.into_array(shape), b.into_array(shape));
                if a.dim() != b.dim() {
                    return Err(EvaluationError::ShapeMismatch {
                        left: a.dim(),
                        right: b.dim(),
                    });
                }
                Ok(Value::Array(f(&a, &b, window)))
            }
            Kernel::Ternary(f) => {
                let [a, b, c] = self.take(operands)?;
                f(a, b, c)
            }
        }
    }
}

/// Every builtin operator.
pub(crate) fn builtins() -> Vec<Builtin> {
    let mut all = Vec::new();
    all.extend(arithmetic::operators());
    all.extend(cross_section::operators());
    all.extend(time_series::operators());
    all.extend(logical::operators());
    all.extend(industry::operators());
    all
}

/// Replace NaN and infinities by zero.
pub(crate) const fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}
