//! Panel data: named `[T, N]` arrays sharing one eligibility mask.
//!
//! A panel is the read-only input of the evaluator. Rows are time steps,
//! columns are instrument slots. The `top` mask marks the cells taking part in
//! cross-sectional computations.

use crate::{FormulaError, Result};
use chrono::NaiveDate;
use ndarray::Array2;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Date format of the `date` column in long-format frames.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Immutable collection of same-shaped arrays.
#[derive(Debug, Clone)]
pub struct Panel {
    fields: BTreeMap<String, Array2<f64>>,
    top: Array2<bool>,
    industry: Option<Array2<i64>>,
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
}

impl Panel {
    /// Create a panel with no fields around an eligibility mask.
    pub fn new(top: Array2<bool>) -> Self {
        Self {
            fields: BTreeMap::new(),
            top,
            industry: None,
            dates: Vec::new(),
            symbols: Vec::new(),
        }
    }

    /// Create a panel whose cells are all eligible.
    pub fn all_eligible(shape: (usize, usize)) -> Self {
        Self::new(Array2::from_elem(shape, true))
    }

    /// Add a field. Fails if its shape differs from the mask's.
    pub fn with_field(mut self, name: impl Into<String>, values: Array2<f64>) -> Result<Self> {
        let name = name.into();
        self.check_shape(&name, values.dim())?;
        self.fields.insert(name, values);
        Ok(self)
    }

    /// Attach a per-cell industry id array.
    pub fn with_industry(mut self, industry: Array2<i64>) -> Result<Self> {
        self.check_shape("industry", industry.dim())?;
        self.industry = Some(industry);
        Ok(self)
    }

    /// Attach the row (date) and column (symbol) labels.
    pub fn with_index(mut self, dates: Vec<NaiveDate>, symbols: Vec<String>) -> Result<Self> {
        let (t, n) = self.shape();
        if dates.len() != t || symbols.len() != n {
            return Err(FormulaError::Panel(format!(
                "index of {}x{} labels does not fit a {t}x{n} panel",
                dates.len(),
                symbols.len()
            )));
        }
        self.dates = dates;
        self.symbols = symbols;
        Ok(self)
    }

    fn check_shape(&self, name: &str, shape: (usize, usize)) -> Result<()> {
        if shape == self.shape() {
            Ok(())
        } else {
            Err(FormulaError::Panel(format!(
                "`{name}` has shape {shape:?}, expected {:?}",
                self.shape()
            )))
        }
    }

    /// `(T, N)`.
    pub fn shape(&self) -> (usize, usize) {
        self.top.dim()
    }

    /// Field array by name.
    pub fn field(&self, name: &str) -> Option<&Array2<f64>> {
        self.fields.get(name)
    }

    /// Field names in sorted order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// Eligibility mask.
    pub const fn top(&self) -> &Array2<bool> {
        &self.top
    }

    /// Industry ids, if attached.
    pub const fn industry(&self) -> Option<&Array2<i64>> {
        self.industry.as_ref()
    }

    /// Row labels. Empty unless an index was attached.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Column labels. Empty unless an index was attached.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Pivot a long-format frame into a panel.
    ///
    /// The frame needs a `symbol` column, a `date` column formatted as
    /// [`DATE_FORMAT`], and one numeric column per requested field. An
    /// optional boolean `top` column overrides eligibility; otherwise a cell is
    /// eligible when a row for it was present. An `industry` column, when
    /// present, becomes the panel's classification. Missing cells are NaN.
    pub fn from_frame(df: &DataFrame, fields: &[&str]) -> Result<Self> {
        let symbols = string_column(df, "symbol")?;
        let raw_dates = string_column(df, "date")?;

        let mut dates = Vec::with_capacity(raw_dates.len());
        for raw in &raw_dates {
            let date = match raw {
                Some(s) => Some(NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| {
                    FormulaError::Panel(format!("invalid date `{s}`: {e}"))
                })?),
                None => None,
            };
            dates.push(date);
        }

        let date_index = index_of(dates.iter().flatten().copied());
        let symbol_index = index_of(symbols.iter().flatten().cloned());
        let shape = (date_index.len(), symbol_index.len());

        // (row in frame) -> (t, n) for rows with both labels
        let cells: Vec<Option<(usize, usize)>> = dates
            .iter()
            .zip(&symbols)
            .map(|(d, s)| match (d, s) {
                (Some(d), Some(s)) => Some((date_index[d], symbol_index[s])),
                _ => None,
            })
            .collect();

        let mut top = Array2::from_elem(shape, false);
        let explicit_top = optional_column(df, "top")
            .map(|c| c.cast(&DataType::Boolean))
            .transpose()?;
        match &explicit_top {
            Some(column) => {
                for (cell, flag) in cells.iter().zip(column.bool()?) {
                    if let (Some(ix), Some(flag)) = (cell, flag) {
                        top[*ix] = flag;
                    }
                }
            }
            None => {
                for ix in cells.iter().flatten() {
                    top[*ix] = true;
                }
            }
        }

        let mut panel = Self::new(top);
        for &name in fields {
            let column = df
                .column(name)
                .map_err(|_| FormulaError::MissingColumn(name.to_string()))?
                .cast(&DataType::Float64)?;
            let mut values = Array2::from_elem(shape, f64::NAN);
            for (cell, value) in cells.iter().zip(column.f64()?) {
                if let (Some(ix), Some(value)) = (cell, value) {
                    values[*ix] = value;
                }
            }
            panel = panel.with_field(name, values)?;
        }

        if let Some(column) = optional_column(df, "industry") {
            let column = column.cast(&DataType::Int64)?;
            let mut industry = Array2::from_elem(shape, -1_i64);
            for (cell, id) in cells.iter().zip(column.i64()?) {
                if let (Some(ix), Some(id)) = (cell, id) {
                    industry[*ix] = id;
                }
            }
            panel = panel.with_industry(industry)?;
        }

        panel.with_index(
            date_index.into_keys().collect(),
            symbol_index.into_keys().collect(),
        )
    }
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| FormulaError::MissingColumn(name.to_string()))?;
    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

fn optional_column<'a>(df: &'a DataFrame, name: &str) -> Option<&'a Column> {
    df.column(name).ok()
}

/// Sorted distinct labels mapped to their position.
fn index_of<K: Ord>(labels: impl Iterator<Item = K>) -> BTreeMap<K, usize> {
    let distinct: BTreeSet<K> = labels.collect();
    distinct.into_iter().enumerate().map(|(i, k)| (k, i)).collect()
}
