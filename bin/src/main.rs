//! CLI for the fd-formula expression engine.
//!
//! This binary lists operators, parses, generates and mutates formulas, and
//! evaluates formulas or whole formula libraries against a panel read from CSV.

use clap::{Parser, Subcommand};
use fd_formula::{
    FormulaError, FormulaLibrary, GeneratorConfig, MutationConfig, Mutator, OperatorCategory,
    OperatorRegistry, Panel, Result, TreeGenerator, parse,
};
use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::*;
use rand::{SeedableRng, rngs::StdRng};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Columns of a panel CSV that are not fields.
const RESERVED_COLUMNS: [&str; 4] = ["symbol", "date", "top", "industry"];

#[derive(Parser)]
#[command(name = "fd-formula")]
#[command(about = "Formula expression engine for alpha signal mining", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all available operators
    Operators,
    /// Parse a formula and print its canonical form
    Parse {
        /// Formula text
        formula: String,
        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate random formulas
    Generate {
        /// Tree height
        #[arg(long, default_value_t = 3)]
        height: usize,
        /// Number of formulas
        #[arg(long, default_value_t = 1)]
        count: usize,
        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
        /// Give both operands of binary nodes the same height
        #[arg(long)]
        symmetric: bool,
        /// Generator configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Append the formulas to a library file
        #[arg(long)]
        append: Option<PathBuf>,
    },
    /// Redraw the leaves of a formula
    Mutate {
        /// Formula text
        formula: String,
        /// Per-leaf mutation probability
        #[arg(long, default_value_t = 0.1)]
        prob: f64,
        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
        /// Number of mutants
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Evaluate formulas against a long-format panel CSV
    Eval {
        /// CSV with `symbol`, `date` and one column per field
        #[arg(long)]
        data: PathBuf,
        /// Formula text
        #[arg(long, conflicts_with = "library", required_unless_present = "library")]
        formula: Option<String>,
        /// Formula library file
        #[arg(long)]
        library: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let registry = OperatorRegistry::standard();

    let outcome = match cli.command {
        Commands::Operators => {
            list_operators(registry);
            Ok(())
        }
        Commands::Parse { formula, json } => parse_formula(&formula, json),
        Commands::Generate {
            height,
            count,
            seed,
            symmetric,
            config,
            append,
        } => generate_formulas(registry, height, count, seed, symmetric, config, append),
        Commands::Mutate {
            formula,
            prob,
            seed,
            count,
        } => mutate_formula(&formula, prob, seed, count),
        Commands::Eval {
            data,
            formula,
            library,
        } => evaluate_formulas(&data, formula, library),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// List all operators grouped by category.
fn list_operators(registry: &OperatorRegistry) {
    let mut by_category: BTreeMap<OperatorCategory, Vec<_>> = BTreeMap::new();
    for info in registry.all_info() {
        by_category.entry(info.category).or_default().push(info);
    }

    println!("Available Operators ({} total)\n", registry.len());

    for (category, mut operators) in by_category {
        println!("{category}:");
        operators.sort_by(|a, b| a.name.cmp(&b.name));
        for info in operators {
            let range = info
                .param_range
                .map(|r| {
                    let (lo, hi) = r.bounds();
                    format!(" [{r} {lo}..={hi}]")
                })
                .unwrap_or_default();
            println!("  {} ({}){} - {}", info.name, info.arity, range, info.description);
        }
        println!();
    }
}

fn parse_formula(formula: &str, json: bool) -> Result<()> {
    let tree = parse(formula)?;
    if json {
        let text = serde_json::to_string_pretty(&tree)
            .map_err(|e| FormulaError::InvalidConfig(e.to_string()))?;
        println!("{text}");
    } else {
        println!("{tree}");
        println!("height: {}, nodes: {}", tree.height(), tree.node_count());
    }
    Ok(())
}

fn seeded(seed: Option<u64>) -> StdRng {
    let seed = seed.unwrap_or_else(rand::random);
    info!(seed, "seeding generator");
    StdRng::seed_from_u64(seed)
}

fn progress(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

fn generate_formulas(
    registry: &OperatorRegistry,
    height: usize,
    count: usize,
    seed: Option<u64>,
    symmetric: bool,
    config: Option<PathBuf>,
    append: Option<PathBuf>,
) -> Result<()> {
    let config = match config {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)
            .map_err(|e| FormulaError::InvalidConfig(e.to_string()))?,
        None => GeneratorConfig::default(),
    };
    let generator = TreeGenerator::new(registry, config)?;
    let mut rng = seeded(seed);

    let pb = progress(count);
    let mut trees = Vec::with_capacity(count);
    for _ in 0..count {
        let tree = generator.generate(height, symmetric, &mut rng);
        if let Some(path) = &append {
            FormulaLibrary::append(path, &tree)?;
        }
        trees.push(tree);
        pb.inc(1);
    }
    pb.finish_and_clear();

    for tree in &trees {
        println!("{tree}");
    }
    if let Some(path) = append {
        info!(count, path = %path.display(), "appended formulas");
    }
    Ok(())
}

fn mutate_formula(formula: &str, prob: f64, seed: Option<u64>, count: usize) -> Result<()> {
    let tree = parse(formula)?;
    let mutator = Mutator::new(MutationConfig {
        probability: prob,
        ..MutationConfig::default()
    });
    let mut rng = seeded(seed);
    for _ in 0..count {
        println!("{}", mutator.mutated(&tree, &mut rng));
    }
    Ok(())
}

/// Load a long-format CSV into a panel, using every non-reserved column as a field.
fn load_panel(path: &Path) -> Result<Panel> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    let names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .filter(|name| !RESERVED_COLUMNS.contains(&name.as_str()))
        .collect();
    let fields: Vec<&str> = names.iter().map(String::as_str).collect();
    let panel = Panel::from_frame(&df, &fields)?;
    let (t, n) = panel.shape();
    info!(dates = t, symbols = n, fields = fields.len(), "loaded panel");
    Ok(panel)
}

fn evaluate_formulas(
    data: &Path,
    formula: Option<String>,
    library: Option<PathBuf>,
) -> Result<()> {
    let panel = load_panel(data)?;
    let library = match (formula, library) {
        (Some(formula), _) => FormulaLibrary::new([formula]),
        (None, Some(path)) => FormulaLibrary::load(path)?,
        (None, None) => FormulaLibrary::default(),
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("evaluating {} formulas", library.len()));
    spinner.enable_steady_tick(Duration::from_millis(100));
    let outcomes = library.evaluate(&panel);
    spinner.finish_and_clear();

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(signal) => {
                let (coverage, mean) = summarize(signal.iter().copied());
                println!(
                    "{}  shape={:?} coverage={:.3} mean={:.6}",
                    outcome.formula,
                    signal.dim(),
                    coverage,
                    mean
                );
            }
            Err(e) => {
                failed += 1;
                println!("{}  error: {e}", outcome.formula);
            }
        }
    }
    info!(total = outcomes.len(), failed, "evaluation finished");
    Ok(())
}

/// Fraction of non-zero cells and the mean over all cells.
fn summarize(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (mut count, mut nonzero, mut sum) = (0_usize, 0_usize, 0.0);
    for v in values {
        count += 1;
        sum += v;
        if v != 0.0 {
            nonzero += 1;
        }
    }
    if count == 0 {
        return (0.0, 0.0);
    }
    (nonzero as f64 / count as f64, sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_registry_not_empty() {
        let registry = OperatorRegistry::standard();
        assert!(!registry.is_empty());
        for info in registry.all_info() {
            assert!(!info.name.is_empty());
            assert!(!info.description.is_empty());
        }
    }

    #[test]
    fn test_eval_requires_a_formula_source() {
        assert!(Cli::try_parse_from(["fd-formula", "eval", "--data", "p.csv"]).is_err());
        assert!(
            Cli::try_parse_from([
                "fd-formula",
                "eval",
                "--data",
                "p.csv",
                "--formula",
                "csrank{close}",
                "--library",
                "lib.txt",
            ])
            .is_err()
        );
        assert!(
            Cli::try_parse_from(["fd-formula", "eval", "--data", "p.csv", "--library", "lib.txt"])
                .is_ok()
        );
    }

    #[test]
    fn test_generate_defaults() {
        let cli = Cli::try_parse_from(["fd-formula", "generate", "--seed", "3"]).unwrap();
        let Commands::Generate {
            height,
            count,
            seed,
            symmetric,
            ..
        } = cli.command
        else {
            panic!("expected generate");
        };
        assert_eq!((height, count, seed, symmetric), (3, 1, Some(3), false));
    }

    #[test]
    fn test_summarize() {
        let (coverage, mean) = summarize([0.0, 2.0, -1.0, 3.0].into_iter());
        assert_eq!(coverage, 0.75);
        assert_eq!(mean, 1.0);
        assert_eq!(summarize(std::iter::empty()), (0.0, 0.0));
    }

    #[test]
    fn test_load_panel_from_csv() {
        let path = std::env::temp_dir().join(format!("fd-formula-cli-{}.csv", std::process::id()));
        fs::write(
            &path,
            "symbol,date,close,open\nAAA,2024-01-02,10.0,9.0\nBBB,2024-01-02,20.0,21.0\nAAA,2024-01-03,11.0,10.0\n",
        )
        .unwrap();
        let panel = load_panel(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(panel.shape(), (2, 2));
        assert_eq!(panel.field_names(), ["close", "open"]);
        assert!(!panel.top()[[1, 1]]);
    }
}
