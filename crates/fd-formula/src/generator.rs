//! Random formula generation.
//!
//! Every operator node first draws an arity class from the configured class
//! weights, then an operator uniformly from that class's pool. At height 1 the
//! operands are terminals. Above that, unary classes recurse on their operand
//! and binary classes either recurse symmetrically or, by default, give one
//! randomly chosen side the full remaining depth and the other side a uniform
//! depth in `1..=h-1`.

use crate::{
    FormulaError, Result,
    node::{Arity, Children, Literal, Node},
    params::ParamRange,
    parser::is_field_name,
    registry::OperatorRegistry,
};
use rand::{
    Rng, SeedableRng,
    distributions::{Distribution, WeightedIndex},
    rngs::StdRng,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Raw fields of the default terminal vocabulary.
pub const DEFAULT_FIELDS: [&str; 6] = ["open", "high", "low", "close", "vwap", "tvr_ratio"];

/// Largest accepted [`GeneratorConfig::max_terminal_lag`].
pub const MAX_TERMINAL_LAG: usize = 30;

/// Weighted pool of operators sharing an arity class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassPool {
    /// Relative weight of drawing this class
    pub weight: u32,
    /// Operators drawn uniformly once the class is chosen
    pub operators: Vec<String>,
}

impl ClassPool {
    fn new(weight: u32, operators: &[&str]) -> Self {
        Self {
            weight,
            operators: operators.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Configuration for [`TreeGenerator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Field names terminals are drawn from
    pub fields: Vec<String>,
    /// `Unary` pool
    pub unary: ClassPool,
    /// `UnaryWithParam` pool
    pub unary_with_param: ClassPool,
    /// `Binary` pool
    pub binary: ClassPool,
    /// `BinaryWithParam` pool
    pub binary_with_param: ClassPool,
    /// When non-zero, `tsdelay{field,k}` for `k` in `1..=max_terminal_lag`
    /// joins the terminal vocabulary. A lagged terminal is itself a height-1
    /// node, so it fills a height-1 slot of the tree. At most
    /// [`MAX_TERMINAL_LAG`].
    pub max_terminal_lag: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            fields: DEFAULT_FIELDS.iter().map(|s| s.to_string()).collect(),
            unary: ClassPool::new(1, &["csrank", "zscore"]),
            unary_with_param: ClassPool::new(
                4,
                &[
                    "wdirect",
                    "tsrank",
                    "tskurtosis",
                    "tsskew",
                    "tsmean",
                    "tsstd",
                    "tsdelay",
                    "tsdelta",
                ],
            ),
            binary: ClassPool::new(4, &["add", "prod", "minus", "div"]),
            binary_with_param: ClassPool::new(1, &["tscorr"]),
            max_terminal_lag: 0,
        }
    }
}

impl GeneratorConfig {
    fn pools(&self) -> [(Arity, &ClassPool); 4] {
        [
            (Arity::Unary, &self.unary),
            (Arity::UnaryWithParam, &self.unary_with_param),
            (Arity::Binary, &self.binary),
            (Arity::BinaryWithParam, &self.binary_with_param),
        ]
    }
}

/// Builds random well-formed trees.
#[derive(Debug, Clone)]
pub struct TreeGenerator {
    config: GeneratorConfig,
    classes: [(Arity, Vec<String>); 4],
    class_dist: WeightedIndex<u32>,
}

impl TreeGenerator {
    /// Create a generator, checking every pooled operator against `registry`
    /// and every field name against the formula grammar.
    pub fn new(registry: &OperatorRegistry, config: GeneratorConfig) -> Result<Self> {
        if config.fields.is_empty() {
            return Err(FormulaError::InvalidConfig(
                "field vocabulary is empty".to_string(),
            ));
        }
        if let Some(name) = config.fields.iter().find(|name| !is_field_name(name)) {
            return Err(FormulaError::InvalidConfig(format!(
                "`{name}` does not read back as a field name"
            )));
        }
        if config.max_terminal_lag > MAX_TERMINAL_LAG {
            return Err(FormulaError::InvalidConfig(format!(
                "max_terminal_lag {} exceeds {MAX_TERMINAL_LAG}",
                config.max_terminal_lag
            )));
        }
        if config.max_terminal_lag > 0
            && registry.arity_of("tsdelay") != Some(Arity::UnaryWithParam)
        {
            return Err(FormulaError::InvalidConfig(
                "lagged terminals need a `tsdelay` operator".to_string(),
            ));
        }
        for (arity, pool) in config.pools() {
            if pool.weight > 0 && pool.operators.is_empty() {
                return Err(FormulaError::InvalidConfig(format!(
                    "{arity} pool has weight but no operators"
                )));
            }
            for name in &pool.operators {
                match registry.arity_of(name) {
                    Some(found) if found == arity => {}
                    Some(found) => {
                        return Err(FormulaError::InvalidConfig(format!(
                            "`{name}` is {found}, listed under {arity}"
                        )));
                    }
                    None => {
                        return Err(FormulaError::InvalidConfig(format!(
                            "unknown operator `{name}`"
                        )));
                    }
                }
            }
        }
        let class_dist = WeightedIndex::new(config.pools().map(|(_, pool)| pool.weight))
            .map_err(|e| FormulaError::InvalidConfig(format!("class weights: {e}")))?;
        let classes = config
            .pools()
            .map(|(arity, pool)| (arity, pool.operators.clone()));
        Ok(Self {
            config,
            classes,
            class_dist,
        })
    }

    /// Generator over the builtin operators with the default configuration.
    pub fn standard() -> Result<Self> {
        Self::new(OperatorRegistry::standard(), GeneratorConfig::default())
    }

    /// Current configuration.
    pub const fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Build a tree of the given height. Heights below 1 are treated as 1.
    pub fn generate<R: Rng + ?Sized>(&self, height: usize, symmetric: bool, rng: &mut R) -> Node {
        let tree = self.grow(height.max(1), symmetric, rng);
        debug!(
            height = tree.height(),
            nodes = tree.node_count(),
            symmetric,
            "generated formula"
        );
        tree
    }

    fn grow<R: Rng + ?Sized>(&self, height: usize, symmetric: bool, rng: &mut R) -> Node {
        if height == 1 {
            if let Some(lagged) = self.lagged_terminal(rng) {
                return lagged;
            }
        }
        let (arity, operators) = &self.classes[self.class_dist.sample(rng)];
        let name = operators[rng.gen_range(0..operators.len())].as_str();

        let below = height - 1;
        let children = if height == 1 {
            match arity {
                Arity::Unary => Children::Unary {
                    left: self.terminal(rng),
                },
                Arity::UnaryWithParam => Children::UnaryWithParam {
                    left: self.terminal(rng),
                    num: self.param(name, rng),
                },
                Arity::Binary => Children::Binary {
                    left: self.terminal(rng),
                    right: self.terminal(rng),
                },
                _ => Children::BinaryWithParam {
                    left: self.terminal(rng),
                    right: self.terminal(rng),
                    num: self.param(name, rng),
                },
            }
        } else {
            match arity {
                Arity::Unary => Children::Unary {
                    left: Box::new(self.grow(below, symmetric, rng)),
                },
                Arity::UnaryWithParam => Children::UnaryWithParam {
                    left: Box::new(self.grow(below, symmetric, rng)),
                    num: self.param(name, rng),
                },
                _ => {
                    let (left, right) = self.operand_pair(height, symmetric, rng);
                    if *arity == Arity::Binary {
                        Children::Binary { left, right }
                    } else {
                        Children::BinaryWithParam {
                            left,
                            right,
                            num: self.param(name, rng),
                        }
                    }
                }
            }
        };
        Node::call(name, children)
    }

    /// Operands of a binary node at `height > 1`.
    fn operand_pair<R: Rng + ?Sized>(
        &self,
        height: usize,
        symmetric: bool,
        rng: &mut R,
    ) -> (Box<Node>, Box<Node>) {
        let below = height - 1;
        if symmetric {
            let left = self.grow(below, symmetric, rng);
            let right = self.grow(below, symmetric, rng);
            return (Box::new(left), Box::new(right));
        }
        let deep = self.grow(below, symmetric, rng);
        let shallow_height = rng.gen_range(1..=below);
        let shallow = self.grow(shallow_height, symmetric, rng);
        if rng.gen_bool(0.5) {
            (Box::new(deep), Box::new(shallow))
        } else {
            (Box::new(shallow), Box::new(deep))
        }
    }

    fn param<R: Rng + ?Sized>(&self, operator: &str, rng: &mut R) -> Literal {
        Literal::Int(ParamRange::for_operator(operator).sample(rng))
    }

    fn field<R: Rng + ?Sized>(&self, rng: &mut R) -> Node {
        let fields = &self.config.fields;
        Node::field(fields[rng.gen_range(0..fields.len())].clone())
    }

    fn terminal<R: Rng + ?Sized>(&self, rng: &mut R) -> Box<Node> {
        Box::new(self.field(rng))
    }

    /// `tsdelay{field,k}` in place of a height-1 subtree.
    ///
    /// Lagged terminals take the same share of draws they have in the terminal
    /// vocabulary: `max_terminal_lag` lagged variants per raw field.
    fn lagged_terminal<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Node> {
        let lags = self.config.max_terminal_lag;
        if lags == 0 || !rng.gen_bool(lags as f64 / (lags + 1) as f64) {
            return None;
        }
        let field = self.field(rng);
        let lag = rng.gen_range(1..=lags) as i64;
        Some(Node::unary_with_param("tsdelay", field, lag))
    }
}

/// Generate a tree with the builtin operators from a seed.
pub fn generate(height: usize, symmetric: bool, seed: u64) -> Result<Node> {
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(TreeGenerator::standard()?.generate(height, symmetric, &mut rng))
}
