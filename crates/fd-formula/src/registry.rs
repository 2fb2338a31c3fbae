//! Operator registry for lookup and introspection.
//!
//! The registry maps an operator name to its arity class, parameter range and
//! vectorised implementation. It is built once and shared by reference between
//! the parser, the generator and the evaluator.

use crate::{
    error::EvaluationError, node::Arity, node::Literal, panel::Panel, params::ParamRange,
    value::Value,
};
use derive_more::Display;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Operator category for grouping related operators.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperatorCategory {
    /// Elementwise arithmetic
    Arithmetic,
    /// Per-row computations over eligible instruments
    CrossSectional,
    /// Per-column computations over a trailing window
    TimeSeries,
    /// Comparisons and selection
    Logical,
    /// Per-row computations grouped by industry
    Industry,
}

/// An operator that can appear in a formula.
///
/// Implementations must not mutate shared panel state: every call returns a
/// freshly computed value. Operators needing data beyond their positional
/// arguments (the eligibility mask, industry ids) read it from the panel.
pub trait Operator: Send + Sync + std::fmt::Debug {
    /// Unique identifier used in formula text.
    fn name(&self) -> &str;

    /// Human-readable description of what this operator computes.
    fn description(&self) -> &str;

    /// Operator category for grouping.
    fn category(&self) -> OperatorCategory;

    /// Shape of the argument list.
    fn arity(&self) -> Arity;

    /// Range the numeric parameter is drawn from, for parameterised operators.
    fn param_range(&self) -> Option<ParamRange> {
        self.arity()
            .has_param()
            .then(|| ParamRange::for_operator(self.name()))
    }

    /// Compute the operator.
    ///
    /// `operands` are the evaluated sub-expressions in argument order and
    /// `param` is the numeric parameter of the *WithParam classes.
    fn apply(
        &self,
        operands: Vec<Value>,
        param: Option<Literal>,
        panel: &Panel,
    ) -> Result<Value, EvaluationError>;
}

/// Metadata for operator introspection.
#[derive(Debug, Clone)]
pub struct OperatorInfo {
    /// Operator name (unique identifier)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Operator category
    pub category: OperatorCategory,
    /// Arity class
    pub arity: Arity,
    /// Parameter range, for parameterised operators
    pub param_range: Option<ParamRange>,
}

/// Registry for operator lookup.
#[derive(Debug, Default)]
pub struct OperatorRegistry {
    operators: HashMap<String, Arc<dyn Operator>>,
}

impl OperatorRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            operators: HashMap::new(),
        }
    }

    /// Register all builtin operators.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for op in crate::ops::builtins() {
            registry.register(Arc::new(op));
        }
        registry
    }

    /// Shared registry of builtin operators, built on first use.
    pub fn standard() -> &'static Self {
        static STANDARD: OnceLock<OperatorRegistry> = OnceLock::new();
        STANDARD.get_or_init(Self::with_defaults)
    }

    /// Register an operator, replacing any operator of the same name.
    pub fn register(&mut self, operator: Arc<dyn Operator>) {
        self.operators.insert(operator.name().to_string(), operator);
    }

    /// Get an operator by name.
    pub fn get(&self, name: &str) -> Option<&dyn Operator> {
        self.operators.get(name).map(|op| op.as_ref())
    }

    /// Arity class of an operator.
    pub fn arity_of(&self, name: &str) -> Option<Arity> {
        self.get(name).map(|op| op.arity())
    }

    /// Get operators by category.
    pub fn by_category(&self, category: OperatorCategory) -> Vec<&dyn Operator> {
        self.operators
            .values()
            .filter(|op| op.category() == category)
            .map(|op| op.as_ref())
            .collect()
    }

    /// Get all operator metadata.
    pub fn all_info(&self) -> Vec<OperatorInfo> {
        self.operators
            .values()
            .map(|op| OperatorInfo {
                name: op.name().to_string(),
                description: op.description().to_string(),
                category: op.category(),
                arity: op.arity(),
                param_range: op.param_range(),
            })
            .collect()
    }

    /// Get all operator names.
    pub fn names(&self) -> Vec<&str> {
        self.operators.keys().map(|s| s.as_str()).collect()
    }

    /// Number of registered operators.
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rstest::rstest;

    #[test]
    fn test_defaults_not_empty() {
        let registry = OperatorRegistry::with_defaults();
        assert!(!registry.is_empty());
        assert_eq!(registry.len(), registry.all_info().len());
        assert_eq!(registry.len(), OperatorRegistry::standard().len());
    }

    #[rstest]
    #[case("neg", Arity::Unary)]
    #[case("csrank", Arity::Unary)]
    #[case("zscore", Arity::Unary)]
    #[case("csind", Arity::Unary)]
    #[case("csindneutral", Arity::Unary)]
    #[case("tsdelay", Arity::UnaryWithParam)]
    #[case("tsdelta", Arity::UnaryWithParam)]
    #[case("tsmean", Arity::UnaryWithParam)]
    #[case("tsstd", Arity::UnaryWithParam)]
    #[case("tsskew", Arity::UnaryWithParam)]
    #[case("tskurtosis", Arity::UnaryWithParam)]
    #[case("wdirect", Arity::UnaryWithParam)]
    #[case("tsrank", Arity::UnaryWithParam)]
    #[case("add", Arity::Binary)]
    #[case("minus", Arity::Binary)]
    #[case("prod", Arity::Binary)]
    #[case("div", Arity::Binary)]
    #[case("lt", Arity::Binary)]
    #[case("le", Arity::Binary)]
    #[case("gt", Arity::Binary)]
    #[case("ge", Arity::Binary)]
    #[case("tscorr", Arity::BinaryWithParam)]
    #[case("condition", Arity::Ternary)]
    fn test_builtin_arity(#[case] name: &str, #[case] arity: Arity) {
        assert_eq!(OperatorRegistry::standard().arity_of(name), Some(arity));
    }

    #[test]
    fn test_param_range_only_for_parameterised() {
        for info in OperatorRegistry::standard().all_info() {
            assert_eq!(info.param_range.is_some(), info.arity.has_param(), "{}", info.name);
            assert!(!info.description.is_empty());
        }
        let registry = OperatorRegistry::standard();
        assert_eq!(
            registry.get("tsdelay").and_then(|op| op.param_range()),
            Some(ParamRange::Lag)
        );
        assert_eq!(
            registry.get("tsstd").and_then(|op| op.param_range()),
            Some(ParamRange::Window)
        );
    }

    #[test]
    fn test_categories() {
        let registry = OperatorRegistry::standard();
        let cross: Vec<_> = registry
            .by_category(OperatorCategory::CrossSectional)
            .iter()
            .map(|op| op.name().to_string())
            .collect();
        assert!(cross.contains(&"csrank".to_string()));
        assert!(cross.contains(&"zscore".to_string()));
        assert_eq!(registry.by_category(OperatorCategory::Industry).len(), 2);
    }

    #[derive(Debug)]
    struct Double;

    impl Operator for Double {
        fn name(&self) -> &str {
            "double"
        }

        fn description(&self) -> &str {
            "Twice the operand"
        }

        fn category(&self) -> OperatorCategory {
            OperatorCategory::Arithmetic
        }

        fn arity(&self) -> Arity {
            Arity::Unary
        }

        fn apply(
            &self,
            operands: Vec<Value>,
            _param: Option<Literal>,
            panel: &Panel,
        ) -> Result<Value, EvaluationError> {
            let a = operands
                .into_iter()
                .next()
                .map(|v| v.into_array(panel.shape()))
                .unwrap_or_default();
            Ok(Value::Array(a * 2.0))
        }
    }

    #[test]
    fn test_register_custom_operator() {
        let mut registry = OperatorRegistry::with_defaults();
        let before = registry.len();
        registry.register(Arc::new(Double));
        assert_eq!(registry.len(), before + 1);

        let panel = Panel::all_eligible((1, 2));
        let out = registry
            .get("double")
            .unwrap()
            .apply(vec![Value::Array(array![[1.0, 2.0]])], None, &panel)
            .unwrap();
        assert_eq!(out, Value::Array(array![[2.0, 4.0]]));
    }
}
