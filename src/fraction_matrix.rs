use nalgebra::DMatrix;
use pretty_print_nalgebra::*;

use crate::error::{DesignError, Result};

/// A fraction of a design: each row is a run, each column a factor, and
/// entry `(i, j)` is a level in `1..=levels[j]`.
///
/// Rows need not be unique. The matrix is fixed once created.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct FractionMatrix {
    fraction: DMatrix<usize>,
}

impl FractionMatrix {
    pub fn from_matrix(fraction: DMatrix<usize>) -> Self {
        Self { fraction }
    }

    /// Builds a fraction from row slices. All rows must have the same length.
    pub fn from_rows(rows: &[Vec<usize>]) -> Result<Self> {
        let factors = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != factors) {
            return Err(DesignError::MalformedMatrix {
                line: bad + 1,
                message: format!("expected {factors} columns, found {}", rows[bad].len()),
            });
        }
        Ok(Self {
            fraction: DMatrix::from_fn(rows.len(), factors, |i, j| rows[i][j]),
        })
    }

    pub fn as_matrix(&self) -> &DMatrix<usize> {
        &self.fraction
    }

    pub fn rows(&self) -> usize {
        self.fraction.nrows()
    }

    pub fn factors(&self) -> usize {
        self.fraction.ncols()
    }

    pub fn get(&self, row: usize, factor: usize) -> usize {
        self.fraction[(row, factor)]
    }

    pub fn is_empty(&self) -> bool {
        self.fraction.is_empty()
    }

    pub fn to_f64(&self) -> DMatrix<f64> {
        self.fraction.map(|x| x as f64)
    }

    pub fn pretty(&self) -> String {
        format!("{}", pretty_print!(&self.fraction))
    }

    /// Tab-separated cells, one run per line, each line newline-terminated.
    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        for row in self.fraction.row_iter() {
            let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
            out.push_str(&cells.join("\t"));
            out.push('\n');
        }
        out
    }

    /// Parses tab or whitespace separated text. Cells may be written as
    /// integers or as whole floats (`2.0`); blank lines are skipped.
    pub fn from_tsv(text: &str) -> Result<Self> {
        let mut rows = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row = line
                .split_whitespace()
                .map(|cell| parse_level(cell, line_no + 1))
                .collect::<Result<Vec<usize>>>()?;
            rows.push(row);
        }
        if rows.is_empty() {
            return Err(DesignError::MalformedMatrix {
                line: 0,
                message: "no rows found".to_string(),
            });
        }
        Self::from_rows(&rows)
    }
}

fn parse_level(cell: &str, line: usize) -> Result<usize> {
    if let Ok(value) = cell.parse::<usize>() {
        return Ok(value);
    }
    match cell.parse::<f64>() {
        Ok(value) if value >= 0.0 && value.fract() == 0.0 => Ok(value as usize),
        _ => Err(DesignError::MalformedMatrix {
            line,
            message: format!("`{cell}` is not a level"),
        }),
    }
}
