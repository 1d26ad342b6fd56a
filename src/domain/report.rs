//! Tabular summaries of screen results.

use crate::domain::result::ScreenResult;
use std::collections::HashMap;

/// A plain text table with a 1-based row index, rendered with aligned
/// columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    /// A copy without the named columns.
    pub fn without_columns(&self, drop: &[&str]) -> Table {
        let keep: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !drop.contains(&c.as_str()))
            .map(|(i, _)| i)
            .collect();

        Table {
            columns: keep.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.rows.is_empty() {
            return writeln!(f, "(no rows)");
        }

        let index_width = self.rows.len().to_string().len().max(1);
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.len()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.len());
            }
        }

        write!(f, "{:>width$} ", "", width = index_width)?;
        for (i, column) in self.columns.iter().enumerate() {
            write!(f, " {:<width$}", column, width = widths[i])?;
        }
        writeln!(f)?;

        for (n, row) in self.rows.iter().enumerate() {
            write!(f, "{:>width$} ", n + 1, width = index_width)?;
            for (i, cell) in row.iter().enumerate() {
                write!(f, " {:<width$}", cell, width = widths[i])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Flatten results into the standard summary table, one row per result.
pub fn summarize(results: &[ScreenResult]) -> Table {
    let mut table = Table::new(&[
        "ticker",
        "valid",
        "score",
        "company",
        "sector",
        "screen",
        "price_last",
        "price_current",
        "backtest",
    ]);

    for result in results {
        table.push(vec![
            result.ticker.clone(),
            result.valid().to_string(),
            format!("{:.2}", result.score()),
            result.name.clone(),
            result.sector.clone(),
            result.screen.clone(),
            format!("{:.2}", result.price_last),
            format!("{:.2}", result.price_current),
            if result.backtest_success { "*" } else { "" }.to_string(),
        ]);
    }

    table
}

/// Instruments valid in more than one screen: one representative row per
/// ticker plus the set of contributing screens, in first-seen order.
pub fn group_multiples(results: &[ScreenResult]) -> Table {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for result in results {
        *counts.entry(result.ticker.as_str()).or_default() += 1;
    }

    let mut table = Table::new(&["ticker", "company", "sector", "price_current", "screens"]);
    let mut seen: Vec<&str> = Vec::new();

    for result in results {
        if counts[result.ticker.as_str()] < 2 || seen.contains(&result.ticker.as_str()) {
            continue;
        }
        seen.push(&result.ticker);

        let screens: Vec<&str> = results
            .iter()
            .filter(|r| r.ticker == result.ticker)
            .map(|r| r.screen.as_str())
            .collect();

        table.push(vec![
            result.ticker.clone(),
            result.name.clone(),
            result.sector.clone(),
            format!("{:.2}", result.price_current),
            screens.join(","),
        ]);
    }

    table
}
