//! Formula libraries.
//!
//! A library is a flat text file with one formula per line in canonical text
//! form. Blank lines and lines starting with `#` are ignored.

use crate::{
    FormulaError, Result, evaluator::Evaluator, node::Node, panel::Panel, parser::FormulaParser,
};
use ndarray::Array2;
use rayon::prelude::*;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::Path,
};
use tracing::{debug, warn};

/// Formulas read from a library file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormulaLibrary {
    formulas: Vec<String>,
}

/// Result of evaluating one library formula.
#[derive(Debug)]
pub struct FormulaOutcome {
    /// Formula text as it appeared in the library
    pub formula: String,
    /// Signal array, or why this formula failed
    pub result: Result<Array2<f64>>,
}

impl FormulaLibrary {
    /// Library over the given formula texts.
    pub fn new<I, S>(formulas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            formulas: formulas.into_iter().map(Into::into).collect(),
        }
    }

    /// Read a library file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let library = Self::new(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        );
        debug!(
            path = %path.as_ref().display(),
            formulas = library.len(),
            "loaded formula library"
        );
        Ok(library)
    }

    /// Append the canonical text of `tree` as a new line, creating the file if
    /// needed.
    pub fn append(path: impl AsRef<Path>, tree: &Node) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        writeln!(file, "{tree}")?;
        Ok(())
    }

    /// Formula texts in file order.
    pub fn formulas(&self) -> &[String] {
        &self.formulas
    }

    /// Number of formulas.
    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    /// Whether the library holds no formulas.
    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    /// Evaluate every formula against `panel` with the builtin operators.
    pub fn evaluate(&self, panel: &Panel) -> Vec<FormulaOutcome> {
        evaluate_library(&Evaluator::default(), panel, &self.formulas)
    }
}

/// Evaluate formulas in parallel against one shared panel.
///
/// Outcomes come back in input order. A formula that fails to parse or
/// evaluate is reported in its own outcome and logged; the others are
/// unaffected.
pub fn evaluate_library<S>(
    evaluator: &Evaluator<'_>,
    panel: &Panel,
    formulas: &[S],
) -> Vec<FormulaOutcome>
where
    S: AsRef<str> + Sync,
{
    let parser = FormulaParser::new(evaluator.registry());
    formulas
        .par_iter()
        .map(|formula| {
            let formula = formula.as_ref();
            let result: Result<Array2<f64>> = parser
                .parse(formula)
                .map_err(FormulaError::from)
                .and_then(|tree| Ok(evaluator.evaluate(&tree, panel)?));
            if let Err(e) = &result {
                warn!(formula, error = %e, "formula skipped");
            }
            FormulaOutcome {
                formula: formula.to_string(),
                result,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("fd-formula-{}-{name}", std::process::id()));
        let _ = fs::remove_file(&path);
        path
    }

    fn panel() -> Panel {
        Panel::all_eligible((3, 2))
            .with_field("close", array![[1.0, 2.0], [2.0, 4.0], [3.0, 1.0]])
            .unwrap()
            .with_field("open", array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]])
            .unwrap()
    }

    #[test]
    fn test_load_skips_blank_and_comments() {
        let path = temp_path("load.txt");
        fs::write(&path, "# mined\ncsrank{close}\n\n  minus{close,open}  \n").unwrap();
        let library = FormulaLibrary::load(&path).unwrap();
        assert_eq!(library.formulas(), ["csrank{close}", "minus{close,open}"]);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_then_load() {
        let path = temp_path("append.txt");
        let first = Node::unary("csrank", Node::field("close"));
        let second = Node::unary_with_param("tsmean", Node::field("open"), 5);
        FormulaLibrary::append(&path, &first).unwrap();
        FormulaLibrary::append(&path, &second).unwrap();
        let library = FormulaLibrary::load(&path).unwrap();
        assert_eq!(library.len(), 2);
        assert_eq!(library.formulas()[1], "tsmean{open,5}");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file() {
        let path = temp_path("missing.txt");
        assert!(matches!(FormulaLibrary::load(&path), Err(FormulaError::Io(_))));
    }

    #[test]
    fn test_failures_are_isolated() {
        let library = FormulaLibrary::new([
            "minus{close,open}",
            "add{close",
            "csrank{volume}",
            "csrank{close}",
        ]);
        let outcomes = library.evaluate(&panel());
        assert_eq!(outcomes.len(), 4);
        assert_eq!(
            outcomes[0].result.as_ref().unwrap(),
            &array![[0.0, 1.0], [1.0, 3.0], [2.0, 0.0]]
        );
        assert!(matches!(outcomes[1].result, Err(FormulaError::Parse(_))));
        assert!(matches!(outcomes[2].result, Err(FormulaError::Evaluation(_))));
        assert_eq!(
            outcomes[3].result.as_ref().unwrap(),
            &array![[0.0, 1.0], [0.0, 1.0], [1.0, 0.0]]
        );
        assert_eq!(outcomes[3].formula, "csrank{close}");
    }
}
