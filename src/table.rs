use std::collections::HashMap;

use serde_json::Value;

use crate::error::ProviderError;

/// A single value in a provider table.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Integer view; accepts integral floats and numeric strings since the
    /// provider is not consistent about either.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(n) => Some(*n),
            Cell::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Cell::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn render(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Int(n) => n.to_string(),
            Cell::Float(f) => f.to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Bool(b) => b.to_string(),
        }
    }
}

impl From<&Value> for Cell {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => n.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
            },
            Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

/// Row-major table with named columns. Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Pads or truncates `row` to the column count.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Cell> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }

    /// Sets `name` to `value` on every row, adding the column when missing.
    pub fn stamp(&mut self, name: &str, value: Cell) {
        match self.column_index(name) {
            Some(idx) => {
                for row in &mut self.rows {
                    row[idx] = value.clone();
                }
            }
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(value.clone());
                }
            }
        }
    }

    /// Row-wise union. Columns keep first-seen order; cells a table does not
    /// carry are filled with `Null`.
    pub fn concat<I>(tables: I) -> Table
    where
        I: IntoIterator<Item = Table>,
    {
        let mut out = Table::default();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for table in tables {
            let mapping = table
                .columns
                .iter()
                .map(|name| {
                    *positions.entry(name.clone()).or_insert_with(|| {
                        out.columns.push(name.clone());
                        for row in &mut out.rows {
                            row.push(Cell::Null);
                        }
                        out.columns.len() - 1
                    })
                })
                .collect::<Vec<_>>();

            for row in table.rows {
                let mut merged = vec![Cell::Null; out.columns.len()];
                for (cell, target) in row.into_iter().zip(&mapping) {
                    merged[*target] = cell;
                }
                out.rows.push(merged);
            }
        }
        out
    }

    /// Keeps the `schema` columns that are present, in schema order. Missing
    /// schema columns are skipped, never synthesized.
    pub fn project(&self, schema: &[&str]) -> Table {
        let picks = schema
            .iter()
            .filter_map(|name| self.column_index(name).map(|idx| (*name, idx)))
            .collect::<Vec<_>>();

        Table {
            columns: picks.iter().map(|(name, _)| name.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| picks.iter().map(|(_, idx)| row[*idx].clone()).collect())
                .collect(),
        }
    }
}

/// Parses the first `resultSets` entry of a stats API payload.
/// Blank and `null` bodies produce an empty table.
pub fn parse_result_set_json(raw: &str) -> Result<Table, ProviderError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Table::default());
    }
    let root: Value = serde_json::from_str(trimmed)?;
    let set = match root.get("resultSets") {
        Some(Value::Array(sets)) => match sets.first() {
            Some(set) => set,
            None => return Ok(Table::default()),
        },
        Some(set @ Value::Object(_)) => set,
        Some(Value::Null) | None => match root.get("resultSet") {
            Some(set) => set,
            None => return Err(ProviderError::Malformed("missing resultSets".to_string())),
        },
        Some(_) => {
            return Err(ProviderError::Malformed(
                "resultSets is not an array".to_string(),
            ));
        }
    };
    parse_result_set(set)
}

fn parse_result_set(set: &Value) -> Result<Table, ProviderError> {
    let headers = set
        .get("headers")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ProviderError::Malformed("result set has no headers".to_string()))?;
    let columns = headers
        .iter()
        .map(|h| {
            h.as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| ProviderError::Malformed(format!("non-string header {h}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let rows = set
        .get("rowSet")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ProviderError::Malformed("result set has no rowSet".to_string()))?;

    let mut table = Table::new(columns);
    for row in rows {
        let cells = row
            .as_array()
            .ok_or_else(|| ProviderError::Malformed("rowSet entry is not an array".to_string()))?;
        if cells.len() != table.columns.len() {
            return Err(ProviderError::Malformed(format!(
                "row has {} cells, expected {}",
                cells.len(),
                table.columns.len()
            )));
        }
        table.push_row(cells.iter().map(Cell::from).collect());
    }
    Ok(table)
}
