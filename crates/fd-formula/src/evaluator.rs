//! Recursive formula evaluation.
//!
//! Evaluation is a pure function of the tree and the panel. Field leaves are
//! copied out of the panel before any operator sees them, so callers never
//! observe a panel array change through the engine.

use crate::{
    error::EvaluationError,
    node::{Leaf, Node},
    panel::Panel,
    registry::OperatorRegistry,
    value::Value,
};
use ndarray::Array2;
use tracing::debug;

/// What an evaluation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `[T, N]` signal array
    Signal,
    /// Canonical formula text
    Text,
}

/// Result of [`Evaluator::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// Signal array
    Signal(Array2<f64>),
    /// Canonical formula text
    Text(String),
}

/// Evaluates trees against panels with operators from a registry.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    registry: &'a OperatorRegistry,
}

impl Default for Evaluator<'static> {
    fn default() -> Self {
        Self::new(OperatorRegistry::standard())
    }
}

impl<'a> Evaluator<'a> {
    /// Create an evaluator resolving operator names in `registry`.
    pub const fn new(registry: &'a OperatorRegistry) -> Self {
        Self { registry }
    }

    /// Registry operator names are resolved in.
    pub const fn registry(&self) -> &'a OperatorRegistry {
        self.registry
    }

    /// Evaluate in the requested mode.
    pub fn run(&self, tree: &Node, panel: &Panel, mode: Mode) -> Result<Output, EvaluationError> {
        match mode {
            Mode::Signal => self.evaluate(tree, panel).map(Output::Signal),
            Mode::Text => Ok(Output::Text(to_text(tree))),
        }
    }

    /// Signal array of the panel's shape.
    ///
    /// Scalar results are broadcast and boolean results become 1.0 / 0.0.
    pub fn evaluate(&self, tree: &Node, panel: &Panel) -> Result<Array2<f64>, EvaluationError> {
        let out = self.value(tree, panel)?.into_array(panel.shape());
        debug!(formula = %tree, shape = ?out.dim(), "evaluated formula");
        Ok(out)
    }

    /// Raw value of a sub-tree.
    pub fn value(&self, tree: &Node, panel: &Panel) -> Result<Value, EvaluationError> {
        match tree {
            Node::Leaf(Leaf::Field(name)) => panel
                .field(name)
                .map(|values| Value::Array(values.clone()))
                .ok_or_else(|| EvaluationError::UnknownField(name.clone())),
            Node::Leaf(Leaf::Literal(literal)) => Ok(Value::Scalar(literal.as_f64())),
            Node::Call(call) => {
                let op = self
                    .registry
                    .get(&call.name)
                    .ok_or_else(|| EvaluationError::UnknownOperator(call.name.clone()))?;
                if op.arity() != call.arity() {
                    return Err(EvaluationError::ArityMismatch {
                        operator: call.name.clone(),
                        expected: op.arity(),
                        found: call.arity(),
                    });
                }
                let operands = call
                    .children
                    .operands()
                    .into_iter()
                    .map(|child| self.value(child, panel))
                    .collect::<Result<Vec<_>, _>>()?;
                op.apply(operands, call.children.param(), panel)
            }
        }
    }
}

/// Evaluate with the builtin operators.
pub fn evaluate(tree: &Node, panel: &Panel) -> Result<Array2<f64>, EvaluationError> {
    Evaluator::default().evaluate(tree, panel)
}

/// Canonical text of a tree; [`crate::parse`] reads it back unchanged.
pub fn to_text(tree: &Node) -> String {
    tree.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn panel() -> Panel {
        Panel::all_eligible((5, 1))
            .with_field("close", array![[1.0], [2.0], [3.0], [4.0], [5.0]])
            .unwrap()
            .with_field("open", array![[1.0], [1.0], [1.0], [1.0], [1.0]])
            .unwrap()
    }

    #[test]
    fn test_tsdelay_column() {
        let out = evaluate(&parse("tsdelay{close,2}").unwrap(), &panel()).unwrap();
        assert_eq!(out, array![[0.0], [0.0], [1.0], [2.0], [3.0]]);
    }

    #[test]
    fn test_field_is_copied() {
        let panel = panel();
        let mut out = evaluate(&Node::field("close"), &panel).unwrap();
        out.fill(-1.0);
        assert_eq!(panel.field("close").unwrap()[[0, 0]], 1.0);
    }

    #[test]
    fn test_scalar_root_is_broadcast() {
        let out = evaluate(&Node::literal(2.5), &panel()).unwrap();
        assert_eq!(out.dim(), (5, 1));
        assert!(out.iter().all(|&v| v == 2.5));
    }

    #[test]
    fn test_mask_root_is_numeric() {
        let out = evaluate(&parse("gt{close,3}").unwrap(), &panel()).unwrap();
        assert_eq!(out, array![[0.0], [0.0], [0.0], [1.0], [1.0]]);
    }

    #[test]
    fn test_div_by_zero_field() {
        let tree = parse("div{close,minus{open,open}}").unwrap();
        let out = evaluate(&tree, &panel()).unwrap();
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_condition_with_literals() {
        let tree = parse("condition{ge{close,3},close,-1}").unwrap();
        let out = evaluate(&tree, &panel()).unwrap();
        assert_eq!(out, array![[-1.0], [-1.0], [3.0], [4.0], [5.0]]);
    }

    #[test]
    fn test_unknown_field() {
        let err = evaluate(&Node::unary("csrank", Node::field("vwap")), &panel()).unwrap_err();
        assert_eq!(err, EvaluationError::UnknownField("vwap".to_string()));
    }

    #[test]
    fn test_hand_built_unknown_operator() {
        let err = evaluate(&Node::unary("nope", Node::field("close")), &panel()).unwrap_err();
        assert_eq!(err, EvaluationError::UnknownOperator("nope".to_string()));
    }

    #[test]
    fn test_hand_built_arity_mismatch() {
        let tree = Node::unary("add", Node::field("close"));
        let err = evaluate(&tree, &panel()).unwrap_err();
        assert!(matches!(err, EvaluationError::ArityMismatch { .. }));
    }

    #[test]
    fn test_text_mode_round_trips() {
        let text = "tscorr{wdirect{close,4},tsdelta{open,1},12}";
        let tree = parse(text).unwrap();
        let out = Evaluator::default().run(&tree, &panel(), Mode::Text).unwrap();
        assert_eq!(out, Output::Text(text.to_string()));
    }

    #[test]
    fn test_signal_mode() {
        let tree = parse("tsmean{close,5}").unwrap();
        let Output::Signal(out) = Evaluator::default().run(&tree, &panel(), Mode::Signal).unwrap()
        else {
            panic!("expected signal");
        };
        assert_relative_eq!(out[[4, 0]], 3.0);
    }
}
