//! The relational carrier of partial and complete query results.
//!
//! A [`Table`] is an ordered list of column names plus rows of typed
//! [`Cell`]s. Clause evaluation produces one table per pattern clause; the
//! executor folds them together with [`Table::natural_join`] and
//! post-processing reshapes the final table.

use crate::error::{Error, Result};
use crate::semantic::{Aggregator, Direction, OrderKey};
use chrono::{DateTime, Utc};
use chronograph_api::{Literal, Node, Predicate, format_anchor};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// One value inside a row. Cells are totally ordered (variant rank, then
/// value) so sorting and grouping are defined for mixed columns.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Cell {
    Str(String),
    Node(Node),
    Predicate(Predicate),
    Literal(Literal),
    Time(DateTime<Utc>),
}

impl Cell {
    pub fn node(&self) -> Option<&Node> {
        match self {
            Cell::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn literal(&self) -> Option<&Literal> {
        match self {
            Cell::Literal(l) => Some(l),
            _ => None,
        }
    }

    /// The anchor carried by the cell, when it has one.
    pub fn anchor(&self) -> Option<&DateTime<Utc>> {
        match self {
            Cell::Predicate(p) => p.anchor(),
            Cell::Time(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Str(s) => f.write_str(s),
            Cell::Node(n) => n.fmt(f),
            Cell::Predicate(p) => p.fmt(f),
            Cell::Literal(l) => l.fmt(f),
            Cell::Time(t) => f.write_str(&format_anchor(t)),
        }
    }
}

/// One result row. Columns are kept in insertion order; rows are small, so
/// linear lookup is fine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    cols: Vec<(String, Cell)>,
}

impl Row {
    pub fn new(cols: Vec<(String, Cell)>) -> Self {
        Self { cols }
    }

    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.cols.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Sets a column, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: Cell) {
        let name = name.into();
        if let Some((_, v)) = self.cols.iter_mut().find(|(k, _)| *k == name) {
            *v = value;
        } else {
            self.cols.push((name, value));
        }
    }

    /// Sets a column only if it agrees with any existing value under the
    /// same name. Returns false on conflict; the caller drops the row.
    /// This is what makes `?x "p"@[] ?x` match only loops.
    pub fn set_checked(&mut self, name: &str, value: Cell) -> bool {
        match self.get(name) {
            Some(existing) => *existing == value,
            None => {
                self.cols.push((name.to_string(), value));
                true
            }
        }
    }

    pub fn columns(&self) -> &[(String, Cell)] {
        &self.cols
    }

    /// This row extended with the columns of `other` that it lacks.
    pub fn merged(&self, other: &Row) -> Row {
        let mut out = self.clone();
        for (k, v) in &other.cols {
            if out.get(k).is_none() {
                out.cols.push((k.clone(), v.clone()));
            }
        }
        out
    }

    fn key(&self, names: &[String]) -> Vec<Option<Cell>> {
        names.iter().map(|n| self.get(n).cloned()).collect()
    }
}

/// Spec of one aggregated output column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateSpec {
    pub source: String,
    pub output: String,
    pub op: Aggregator,
}

/// An ordered set of named columns over ordered rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    bindings: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(bindings: Vec<String>) -> Self {
        Self {
            bindings,
            rows: Vec::new(),
        }
    }

    pub fn bindings(&self) -> &[String] {
        &self.bindings
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_binding(&self, name: &str) -> bool {
        self.bindings.iter().any(|b| b == name)
    }

    pub fn add_row(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Appends the rows of a table with the same bindings.
    pub(crate) fn append(&mut self, other: Table) {
        debug_assert_eq!(self.bindings, other.bindings);
        self.rows.extend(other.rows);
    }

    /// Column names present in both tables, in this table's order.
    pub fn shared_bindings(&self, other: &Table) -> Vec<String> {
        self.bindings
            .iter()
            .filter(|b| other.has_binding(b))
            .cloned()
            .collect()
    }

    /// Natural join: rows agreeing on every shared column are merged.
    /// Without shared columns this degenerates to the cartesian product.
    pub fn natural_join(&self, other: &Table) -> Table {
        let shared = self.shared_bindings(other);
        let mut bindings = self.bindings.clone();
        for b in &other.bindings {
            if !bindings.contains(b) {
                bindings.push(b.clone());
            }
        }
        let mut out = Table::new(bindings);
        if shared.is_empty() {
            for left in &self.rows {
                for right in &other.rows {
                    out.add_row(left.merged(right));
                }
            }
            return out;
        }
        let mut by_key: HashMap<Vec<Option<Cell>>, Vec<&Row>> = HashMap::new();
        for right in &other.rows {
            by_key.entry(right.key(&shared)).or_default().push(right);
        }
        for left in &self.rows {
            if let Some(matches) = by_key.get(&left.key(&shared)) {
                for right in matches {
                    out.add_row(left.merged(right));
                }
            }
        }
        out
    }

    /// Keeps the rows the predicate accepts.
    pub fn filter(&mut self, mut keep: impl FnMut(&Row) -> Result<bool>) -> Result<()> {
        let mut kept = Vec::with_capacity(self.rows.len());
        for row in self.rows.drain(..) {
            if keep(&row)? {
                kept.push(row);
            }
        }
        self.rows = kept;
        Ok(())
    }

    /// Stable sort by the given keys; rows missing a key column sort before
    /// rows that have it (ascending).
    pub fn sort(&mut self, keys: &[OrderKey]) {
        self.rows.sort_by(|a, b| {
            for key in keys {
                let ord = a.get(&key.binding).cmp(&b.get(&key.binding));
                let ord = match key.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                };
                if ord != std::cmp::Ordering::Equal {
                    return ord;
                }
            }
            std::cmp::Ordering::Equal
        });
    }

    /// Truncates to the first `n` rows.
    pub fn limit(&mut self, n: u64) {
        self.rows.truncate(n as usize);
    }

    /// Removes duplicate rows, keeping first occurrences in order.
    pub fn distinct(&mut self) {
        let names = self.bindings.clone();
        let mut seen = HashSet::new();
        self.rows.retain(|row| seen.insert(row.key(&names)));
    }

    /// Projects to `(source, output)` column pairs: reorders, drops, and
    /// renames in one pass. A missing source column is an execution error.
    pub fn project(&mut self, columns: &[(String, String)]) -> Result<()> {
        for (source, _) in columns {
            if !self.has_binding(source) {
                return Err(Error::Exec(format!("unknown column {source}")));
            }
        }
        let rows = self
            .rows
            .drain(..)
            .map(|row| {
                let cols = columns
                    .iter()
                    .filter_map(|(source, output)| {
                        row.get(source).map(|cell| (output.clone(), cell.clone()))
                    })
                    .collect();
                Row::new(cols)
            })
            .collect();
        self.bindings = columns.iter().map(|(_, output)| output.clone()).collect();
        self.rows = rows;
        Ok(())
    }

    /// Groups rows by `keys` and folds `aggregates` per group. With no keys
    /// the whole table is one implicit group. Non-key, non-aggregated
    /// columns must be constant within each group.
    pub fn group_by(&mut self, keys: &[String], aggregates: &[AggregateSpec]) -> Result<()> {
        let agg_sources: HashSet<&str> = aggregates.iter().map(|a| a.source.as_str()).collect();
        let passthrough: Vec<String> = self
            .bindings
            .iter()
            .filter(|b| !keys.contains(b) && !agg_sources.contains(b.as_str()))
            .cloned()
            .collect();

        // Group rows preserving first-seen group order.
        let mut order: Vec<Vec<Option<Cell>>> = Vec::new();
        let mut groups: HashMap<Vec<Option<Cell>>, Vec<Row>> = HashMap::new();
        for row in self.rows.drain(..) {
            let key = row.key(keys);
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            groups.entry(key).or_default().push(row);
        }

        let mut bindings: Vec<String> = keys.to_vec();
        bindings.extend(aggregates.iter().map(|a| a.output.clone()));
        bindings.extend(passthrough.iter().cloned());

        let mut rows = Vec::with_capacity(order.len());
        for key in order {
            let group = &groups[&key];
            let mut row = Row::default();
            for (name, cell) in keys.iter().zip(key) {
                if let Some(cell) = cell {
                    row.set(name.clone(), cell);
                }
            }
            for agg in aggregates {
                row.set(agg.output.clone(), fold_group(group, agg)?);
            }
            for name in &passthrough {
                let mut values = group.iter().filter_map(|r| r.get(name));
                let first = values.next().cloned();
                if values.any(|v| Some(v) != first.as_ref()) {
                    return Err(Error::Exec(format!(
                        "column {name} is neither grouped nor aggregated and varies within a group"
                    )));
                }
                if let Some(cell) = first {
                    row.set(name.clone(), cell);
                }
            }
            rows.push(row);
        }

        self.bindings = bindings;
        self.rows = rows;
        Ok(())
    }
}

fn fold_group(group: &[Row], agg: &AggregateSpec) -> Result<Cell> {
    let cells = group.iter().filter_map(|r| r.get(&agg.source));
    match agg.op {
        Aggregator::Count => Ok(Cell::Literal(Literal::Int64(cells.count() as i64))),
        Aggregator::CountDistinct => {
            let distinct: HashSet<&Cell> = cells.collect();
            Ok(Cell::Literal(Literal::Int64(distinct.len() as i64)))
        }
        Aggregator::Sum => {
            let mut int_sum: Option<i64> = None;
            let mut float_sum: Option<f64> = None;
            for cell in cells {
                match cell.literal() {
                    Some(Literal::Int64(v)) if float_sum.is_none() => {
                        int_sum = Some(int_sum.unwrap_or(0) + v);
                    }
                    Some(Literal::Float64(v)) if int_sum.is_none() => {
                        float_sum = Some(float_sum.unwrap_or(0.0) + v.into_inner());
                    }
                    _ => {
                        return Err(Error::Exec(format!(
                            "sum({}) requires a uniformly numeric column",
                            agg.source
                        )));
                    }
                }
            }
            match (int_sum, float_sum) {
                (_, Some(total)) => Ok(Cell::Literal(Literal::float(total))),
                (total, None) => Ok(Cell::Literal(Literal::Int64(total.unwrap_or(0)))),
            }
        }
    }
}
