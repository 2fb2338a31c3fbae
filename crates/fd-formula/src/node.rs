//! Formula trees.
//!
//! A formula is a strict tree: every [`Call`] exclusively owns its children.
//! The shape of a call's argument list is encoded in [`Children`], one variant
//! per [`Arity`], so a node can never carry a child its arity does not allow.
//! Parameter slots are typed as [`Literal`] because constants are not
//! expressions.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape of an operator's argument list.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Arity {
    /// One sub-expression
    Unary,
    /// One sub-expression and a numeric parameter
    UnaryWithParam,
    /// Two sub-expressions
    Binary,
    /// Two sub-expressions and a numeric parameter
    BinaryWithParam,
    /// Three sub-expressions
    Ternary,
}

impl Arity {
    /// All arity classes.
    pub const ALL: [Self; 5] = [
        Self::Unary,
        Self::UnaryWithParam,
        Self::Binary,
        Self::BinaryWithParam,
        Self::Ternary,
    ];

    /// Number of comma-separated arguments in the text form.
    pub const fn arg_count(self) -> usize {
        match self {
            Self::Unary => 1,
            Self::UnaryWithParam | Self::Binary => 2,
            Self::BinaryWithParam | Self::Ternary => 3,
        }
    }

    /// Whether the trailing argument is a numeric parameter.
    pub const fn has_param(self) -> bool {
        matches!(self, Self::UnaryWithParam | Self::BinaryWithParam)
    }
}

/// A numeric constant.
///
/// Integers and floats are kept apart so that `5` and `5.0` survive a trip
/// through the text form unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Integer constant, typically a window length
    Int(i64),
    /// Floating point constant
    Float(f64),
}

impl Literal {
    /// Value as a float.
    pub const fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    /// Value as a window length. Floats truncate, negatives clamp to zero.
    pub fn as_window(self) -> usize {
        match self {
            Self::Int(v) => usize::try_from(v).unwrap_or(0),
            Self::Float(v) if v.is_finite() && v > 0.0 => v as usize,
            Self::Float(_) => 0,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            // Debug keeps the decimal point (`2.0`), Display would print `2`
            Self::Float(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// A terminal of the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Leaf {
    /// Name of a panel array, read verbatim
    Field(String),
    /// Numeric constant
    Literal(Literal),
}

/// Children of an operator node, one variant per arity class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Children {
    /// `name{left}`
    Unary {
        /// Operand
        left: Box<Node>,
    },
    /// `name{left,num}`
    UnaryWithParam {
        /// Operand
        left: Box<Node>,
        /// Numeric parameter
        num: Literal,
    },
    /// `name{left,right}`
    Binary {
        /// First operand
        left: Box<Node>,
        /// Second operand
        right: Box<Node>,
    },
    /// `name{left,right,num}`
    BinaryWithParam {
        /// First operand
        left: Box<Node>,
        /// Second operand
        right: Box<Node>,
        /// Numeric parameter
        num: Literal,
    },
    /// `name{left,middle,right}`
    Ternary {
        /// First operand
        left: Box<Node>,
        /// Second operand
        middle: Box<Node>,
        /// Third operand
        right: Box<Node>,
    },
}

impl Children {
    /// Arity class implied by the populated slots.
    pub const fn arity(&self) -> Arity {
        match self {
            Self::Unary { .. } => Arity::Unary,
            Self::UnaryWithParam { .. } => Arity::UnaryWithParam,
            Self::Binary { .. } => Arity::Binary,
            Self::BinaryWithParam { .. } => Arity::BinaryWithParam,
            Self::Ternary { .. } => Arity::Ternary,
        }
    }

    /// Sub-expressions in argument order, parameter excluded.
    pub fn operands(&self) -> Vec<&Node> {
        match self {
            Self::Unary { left } | Self::UnaryWithParam { left, .. } => vec![&**left],
            Self::Binary { left, right } | Self::BinaryWithParam { left, right, .. } => {
                vec![&**left, &**right]
            }
            Self::Ternary {
                left,
                middle,
                right,
            } => vec![&**left, &**middle, &**right],
        }
    }

    /// Numeric parameter, if the arity class has one.
    pub const fn param(&self) -> Option<Literal> {
        match self {
            Self::UnaryWithParam { num, .. } | Self::BinaryWithParam { num, .. } => Some(*num),
            _ => None,
        }
    }
}

/// An operator application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    /// Registry key of the operator
    pub name: String,
    /// Arguments
    pub children: Children,
}

impl Call {
    /// Arity class of this call.
    pub const fn arity(&self) -> Arity {
        self.children.arity()
    }
}

/// A formula tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Field reference or numeric constant
    Leaf(Leaf),
    /// Operator application
    Call(Call),
}

impl Node {
    /// Field reference leaf.
    pub fn field(name: impl Into<String>) -> Self {
        Self::Leaf(Leaf::Field(name.into()))
    }

    /// Numeric literal leaf.
    pub fn literal(value: impl Into<Literal>) -> Self {
        Self::Leaf(Leaf::Literal(value.into()))
    }

    /// `name{left}`
    pub fn unary(name: impl Into<String>, left: Self) -> Self {
        Self::call(name, Children::Unary { left: Box::new(left) })
    }

    /// `name{left,num}`
    pub fn unary_with_param(name: impl Into<String>, left: Self, num: impl Into<Literal>) -> Self {
        Self::call(
            name,
            Children::UnaryWithParam {
                left: Box::new(left),
                num: num.into(),
            },
        )
    }

    /// `name{left,right}`
    pub fn binary(name: impl Into<String>, left: Self, right: Self) -> Self {
        Self::call(
            name,
            Children::Binary {
                left: Box::new(left),
                right: Box::new(right),
            },
        )
    }

    /// `name{left,right,num}`
    pub fn binary_with_param(
        name: impl Into<String>,
        left: Self,
        right: Self,
        num: impl Into<Literal>,
    ) -> Self {
        Self::call(
            name,
            Children::BinaryWithParam {
                left: Box::new(left),
                right: Box::new(right),
                num: num.into(),
            },
        )
    }

    /// `name{left,middle,right}`
    pub fn ternary(name: impl Into<String>, left: Self, middle: Self, right: Self) -> Self {
        Self::call(
            name,
            Children::Ternary {
                left: Box::new(left),
                middle: Box::new(middle),
                right: Box::new(right),
            },
        )
    }

    /// Operator node from a name and pre-built children.
    pub fn call(name: impl Into<String>, children: Children) -> Self {
        Self::Call(Call {
            name: name.into(),
            children,
        })
    }

    /// Number of operator levels on the longest path to a leaf.
    ///
    /// A leaf has height 0; an operator whose operands are all leaves has
    /// height 1, matching the height passed to the generator.
    pub fn height(&self) -> usize {
        match self {
            Self::Leaf(_) => 0,
            Self::Call(call) => {
                1 + call
                    .children
                    .operands()
                    .into_iter()
                    .map(Self::height)
                    .max()
                    .unwrap_or(0)
            }
        }
    }

    /// Total number of nodes, parameter literals included.
    pub fn node_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Call(call) => {
                let params = usize::from(call.children.param().is_some());
                1 + params
                    + call
                        .children
                        .operands()
                        .into_iter()
                        .map(Self::node_count)
                        .sum::<usize>()
            }
        }
    }
}

impl fmt::Display for Node {
    /// Canonical text form, the exact inverse of the parser.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(Leaf::Field(name)) => f.write_str(name),
            Self::Leaf(Leaf::Literal(value)) => write!(f, "{value}"),
            Self::Call(call) => {
                write!(f, "{}{{", call.name)?;
                for (i, operand) in call.children.operands().into_iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{operand}")?;
                }
                if let Some(num) = call.children.param() {
                    write!(f, ",{num}")?;
                }
                f.write_str("}")
            }
        }
    }
}
