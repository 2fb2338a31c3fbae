//! Leaf mutation for evolutionary search.
//!
//! Mutation redraws terminals in place and never touches the operator
//! skeleton, so a mutated tree has the same shape, height and operators as
//! its source.

use crate::{
    generator::DEFAULT_FIELDS,
    node::{Children, Leaf, Literal, Node},
    params::ParamRange,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

/// Configuration for [`Mutator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Independent probability of redrawing each terminal
    pub probability: f64,
    /// Field names replacement field references are drawn from
    pub fields: Vec<String>,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            probability: 0.1,
            fields: DEFAULT_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Redraws the terminals of a tree.
#[derive(Debug, Clone)]
pub struct Mutator {
    probability: f64,
    fields: Vec<String>,
}

impl Default for Mutator {
    fn default() -> Self {
        Self::new(MutationConfig::default())
    }
}

impl Mutator {
    /// Create a mutator. The probability is clamped to `[0, 1]`, NaN reads as 0.
    pub fn new(config: MutationConfig) -> Self {
        let probability = if config.probability.is_nan() {
            0.0
        } else {
            config.probability.clamp(0.0, 1.0)
        };
        Self {
            probability,
            fields: config.fields,
        }
    }

    /// Effective per-terminal probability.
    pub const fn probability(&self) -> f64 {
        self.probability
    }

    /// Mutate `tree` in place.
    ///
    /// Each field reference is, with the configured probability, replaced by a
    /// field drawn uniformly from the vocabulary. Each literal, parameter slots
    /// included, is redrawn from the range its parent operator implies; a
    /// literal with no parent uses the window range.
    ///
    /// A lagged terminal `tsdelay{field,k}` is an ordinary `tsdelay` call here,
    /// so its lag is redrawn from the lag range `1..=10` even when the
    /// generator placed a longer lag there.
    pub fn mutate_leaves<R: Rng + ?Sized>(&self, tree: &mut Node, rng: &mut R) {
        self.visit(tree, None, rng);
    }

    /// Mutated copy of `tree`.
    pub fn mutated<R: Rng + ?Sized>(&self, tree: &Node, rng: &mut R) -> Node {
        let mut copy = tree.clone();
        self.mutate_leaves(&mut copy, rng);
        copy
    }

    fn visit<R: Rng + ?Sized>(&self, node: &mut Node, parent: Option<&str>, rng: &mut R) {
        match node {
            Node::Leaf(Leaf::Field(name)) => {
                if !self.fields.is_empty() && rng.gen_bool(self.probability) {
                    *name = self.fields[rng.gen_range(0..self.fields.len())].clone();
                }
            }
            Node::Leaf(Leaf::Literal(literal)) => self.redraw(literal, parent, rng),
            Node::Call(call) => {
                let name = Some(call.name.as_str());
                match &mut call.children {
                    Children::Unary { left } => self.visit(left, name, rng),
                    Children::UnaryWithParam { left, num } => {
                        self.visit(left, name, rng);
                        self.redraw(num, name, rng);
                    }
                    Children::Binary { left, right } => {
                        self.visit(left, name, rng);
                        self.visit(right, name, rng);
                    }
                    Children::BinaryWithParam { left, right, num } => {
                        self.visit(left, name, rng);
                        self.visit(right, name, rng);
                        self.redraw(num, name, rng);
                    }
                    Children::Ternary {
                        left,
                        middle,
                        right,
                    } => {
                        self.visit(left, name, rng);
                        self.visit(middle, name, rng);
                        self.visit(right, name, rng);
                    }
                }
            }
        }
    }

    fn redraw<R: Rng + ?Sized>(&self, literal: &mut Literal, parent: Option<&str>, rng: &mut R) {
        if rng.gen_bool(self.probability) {
            let range = parent.map_or(ParamRange::Window, ParamRange::for_operator);
            *literal = Literal::Int(range.sample(rng));
        }
    }
}

/// Mutated copy of `tree` over the default field vocabulary, from a seed.
pub fn mutate(tree: &Node, p: f64, seed: u64) -> Node {
    let mutator = Mutator::new(MutationConfig {
        probability: p,
        ..MutationConfig::default()
    });
    mutator.mutated(tree, &mut StdRng::seed_from_u64(seed))
}
