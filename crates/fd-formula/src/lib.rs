#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/formula/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod evaluator;
pub mod generator;
pub mod library;
pub mod mutator;
pub mod node;
pub mod ops;
pub mod panel;
pub mod params;
pub mod parser;
pub mod registry;
pub mod value;

// Re-export core types
pub use error::{EvaluationError, FormulaError, ParseError, Result};
pub use evaluator::{Evaluator, Mode, Output, evaluate, to_text};
pub use generator::{ClassPool, GeneratorConfig, TreeGenerator, generate};
pub use library::{FormulaLibrary, FormulaOutcome, evaluate_library};
pub use mutator::{MutationConfig, Mutator, mutate};
pub use node::{Arity, Call, Children, Leaf, Literal, Node};
pub use panel::Panel;
pub use params::{ParamRange, param_range_for};
pub use parser::{FormulaParser, parse};
pub use registry::{Operator, OperatorCategory, OperatorInfo, OperatorRegistry};
pub use value::Value;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
