//! Row-level boolean expressions, as used by HAVING.

use crate::error::{Error, Result};
use crate::table::{Cell, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    Eq,
    Lt,
    Gt,
}

/// One side of a comparison: a binding resolved against the row, or a
/// constant cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Binding(String),
    Constant(Cell),
}

/// A boolean expression tree over row bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Comparison {
        op: Comparator,
        left: Operand,
        right: Operand,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn eq(left: Operand, right: Operand) -> Self {
        Expr::Comparison {
            op: Comparator::Eq,
            left,
            right,
        }
    }

    pub fn not(inner: Expr) -> Self {
        Expr::Not(Box::new(inner))
    }

    /// Evaluates the expression against one row. Referencing a binding the
    /// row does not carry is an execution error.
    pub fn eval(&self, row: &Row) -> Result<bool> {
        match self {
            Expr::Comparison { op, left, right } => {
                let l = resolve(left, row)?;
                let r = resolve(right, row)?;
                Ok(match op {
                    Comparator::Eq => l == r,
                    Comparator::Lt => l < r,
                    Comparator::Gt => l > r,
                })
            }
            Expr::Not(inner) => Ok(!inner.eval(row)?),
            Expr::And(a, b) => Ok(a.eval(row)? && b.eval(row)?),
            Expr::Or(a, b) => Ok(a.eval(row)? || b.eval(row)?),
        }
    }

    /// Every binding the expression references, in evaluation order.
    pub fn bindings(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_bindings(&mut out);
        out
    }

    fn collect_bindings<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Comparison { left, right, .. } => {
                for operand in [left, right] {
                    if let Operand::Binding(name) = operand {
                        out.push(name);
                    }
                }
            }
            Expr::Not(inner) => inner.collect_bindings(out),
            Expr::And(a, b) | Expr::Or(a, b) => {
                a.collect_bindings(out);
                b.collect_bindings(out);
            }
        }
    }
}

fn resolve<'a>(operand: &'a Operand, row: &'a Row) -> Result<&'a Cell> {
    match operand {
        Operand::Constant(cell) => Ok(cell),
        Operand::Binding(name) => row
            .get(name)
            .ok_or_else(|| Error::Exec(format!("unbound name {name} in expression"))),
    }
}
