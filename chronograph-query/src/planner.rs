//! Translates a sealed [`Statement`] into an executable [`Plan`].
//!
//! Dispatch is by statement kind. Query-shaped statements get a left-deep
//! join plan over the pattern clauses ordered by descending specificity;
//! everything statically checkable (unknown graphs, unbound projections,
//! malformed temporal bounds) fails here, never during execution.

use crate::error::{Error, Result};
use crate::expression::Expr;
use crate::semantic::{
    ConstructClause, GraphClause, OrderKey, Projection, Statement, StatementKind,
};
use crate::table::AggregateSpec;
use chrono::{DateTime, Utc};
use chronograph_api::{Lookup, Store, Triple};
use std::collections::BTreeSet;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Sink receiving human-readable plan steps. Tracing never affects
/// semantics.
pub type Tracer = Arc<Mutex<dyn Write + Send>>;

pub(crate) fn trace(tracer: &Option<Tracer>, line: impl FnOnce() -> String) {
    if let Some(t) = tracer
        && let Ok(mut w) = t.lock()
    {
        let _ = writeln!(w, "{}", line());
    }
}

/// An executable plan. Produced by [`new_plan`], consumed by
/// `Plan::execute`.
pub enum Plan<S: Store> {
    Create {
        store: Arc<S>,
        graphs: Vec<String>,
        tracer: Option<Tracer>,
    },
    Drop {
        store: Arc<S>,
        graphs: Vec<String>,
        tracer: Option<Tracer>,
    },
    Insert {
        graphs: Vec<S::Graph>,
        data: Vec<Triple>,
        tracer: Option<Tracer>,
    },
    Delete {
        graphs: Vec<S::Graph>,
        data: Vec<Triple>,
        tracer: Option<Tracer>,
    },
    Show {
        store: Arc<S>,
        tracer: Option<Tracer>,
    },
    Query(QueryPlan<S>),
    Construct(ConstructPlan<S>),
}

/// The join plan behind Query, Construct, and Deconstruct statements.
pub struct QueryPlan<S: Store> {
    pub(crate) graphs: Vec<S::Graph>,
    /// Specificity-sorted clauses, each with its effective lookup (clause
    /// bounds intersected with the statement-level window).
    pub(crate) clauses: Vec<(GraphClause, Lookup)>,
    pub(crate) having: Option<Expr>,
    pub(crate) group_keys: Vec<String>,
    pub(crate) aggregates: Vec<AggregateSpec>,
    /// Pre-aggregation projection to the source columns, `(source, source)`.
    pub(crate) source_projection: Vec<(String, String)>,
    /// Final projection to the exposed names, `(current, output)`.
    pub(crate) final_projection: Vec<(String, String)>,
    pub(crate) order_by: Vec<OrderKey>,
    pub(crate) limit: Option<u64>,
    pub(crate) global_lower: Option<DateTime<Utc>>,
    pub(crate) global_upper: Option<DateTime<Utc>>,
    pub(crate) chunk_size: usize,
    pub(crate) tracer: Option<Tracer>,
}

/// A construct/deconstruct plan: the pattern join plus the clauses that
/// materialize triples into the destination graphs.
pub struct ConstructPlan<S: Store> {
    pub(crate) query: QueryPlan<S>,
    pub(crate) destinations: Vec<S::Graph>,
    pub(crate) clauses: Vec<ConstructClause>,
    pub(crate) remove: bool,
}

/// Builds the plan for a sealed statement against a store.
///
/// `chunk_size` bounds how many streamed triples the executor materializes
/// per join step; zero permits full materialization.
pub async fn new_plan<S: Store>(
    ctx: &CancellationToken,
    store: Arc<S>,
    stmt: &Statement,
    chunk_size: usize,
    tracer: Option<Tracer>,
) -> Result<Plan<S>> {
    let kind = stmt
        .kind()
        .ok_or_else(|| Error::Semantic("statement has no type".to_string()))?;
    debug!(?kind, "planning statement");
    match kind {
        StatementKind::Create => {
            let graphs = named_graphs(stmt.graph_names())?;
            trace(&tracer, || format!("[plan] create graphs {graphs:?}"));
            Ok(Plan::Create {
                store,
                graphs,
                tracer,
            })
        }
        StatementKind::Drop => {
            let graphs = named_graphs(stmt.graph_names())?;
            trace(&tracer, || format!("[plan] drop graphs {graphs:?}"));
            Ok(Plan::Drop {
                store,
                graphs,
                tracer,
            })
        }
        StatementKind::Insert | StatementKind::Delete => {
            if stmt.data().is_empty() {
                return Err(Error::Semantic(format!("{kind:?} statement carries no data")));
            }
            let graphs = resolve_graphs(ctx, &*store, stmt.graph_names()).await?;
            trace(&tracer, || {
                format!(
                    "[plan] {} {} triples into {} graphs",
                    if kind == StatementKind::Insert { "insert" } else { "delete" },
                    stmt.data().len(),
                    graphs.len()
                )
            });
            let data = stmt.data().to_vec();
            Ok(if kind == StatementKind::Insert {
                Plan::Insert {
                    graphs,
                    data,
                    tracer,
                }
            } else {
                Plan::Delete {
                    graphs,
                    data,
                    tracer,
                }
            })
        }
        StatementKind::Show => Ok(Plan::Show { store, tracer }),
        StatementKind::Query => {
            let plan = build_query_plan(ctx, &*store, stmt, chunk_size, tracer, true).await?;
            Ok(Plan::Query(plan))
        }
        StatementKind::Construct | StatementKind::Deconstruct => {
            let remove = kind == StatementKind::Deconstruct;
            let query = build_query_plan(ctx, &*store, stmt, chunk_size, tracer, false).await?;
            let destinations = resolve_graphs(ctx, &*store, stmt.output_graph_names()).await?;
            let clauses = validated_construct_clauses(stmt, remove)?;
            Ok(Plan::Construct(ConstructPlan {
                query,
                destinations,
                clauses,
                remove,
            }))
        }
    }
}

fn named_graphs(names: &[String]) -> Result<Vec<String>> {
    if names.is_empty() {
        return Err(Error::Semantic("statement names no graphs".to_string()));
    }
    Ok(dedup(names))
}

fn dedup(names: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    names
        .iter()
        .filter(|n| seen.insert(n.as_str()))
        .cloned()
        .collect()
}

async fn resolve_graphs<S: Store>(
    ctx: &CancellationToken,
    store: &S,
    names: &[String],
) -> Result<Vec<S::Graph>> {
    let mut graphs = Vec::new();
    for name in named_graphs(names)? {
        graphs.push(store.graph(ctx, &name).await?);
    }
    Ok(graphs)
}

/// Intersects an optional window with the statement-level window. An empty
/// intersection is a semantic error.
fn intersect_bounds(
    lower: Option<DateTime<Utc>>,
    upper: Option<DateTime<Utc>>,
    global_lower: Option<&DateTime<Utc>>,
    global_upper: Option<&DateTime<Utc>>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    let lo = match (lower, global_lower) {
        (Some(a), Some(b)) => Some(a.max(*b)),
        (a, b) => a.or(b.copied()),
    };
    let hi = match (upper, global_upper) {
        (Some(a), Some(b)) => Some(a.min(*b)),
        (a, b) => a.or(b.copied()),
    };
    if let (Some(lo), Some(hi)) = (&lo, &hi)
        && lo > hi
    {
        return Err(Error::Semantic(format!(
            "empty temporal window: {lo} > {hi}"
        )));
    }
    Ok((lo, hi))
}

async fn build_query_plan<S: Store>(
    ctx: &CancellationToken,
    store: &S,
    stmt: &Statement,
    chunk_size: usize,
    tracer: Option<Tracer>,
    with_projection: bool,
) -> Result<QueryPlan<S>> {
    if stmt.graph_pattern_clauses().is_empty() {
        return Err(Error::Semantic("statement has no graph pattern".to_string()));
    }
    let graphs = resolve_graphs(ctx, store, stmt.graph_names()).await?;

    let global_lower = stmt.lower_time_bound().copied();
    let global_upper = stmt.upper_time_bound().copied();
    if let (Some(lo), Some(hi)) = (&global_lower, &global_upper)
        && lo > hi
    {
        return Err(Error::Semantic(format!(
            "malformed temporal bounds: {lo} > {hi}"
        )));
    }

    let pattern_bindings: BTreeSet<String> = stmt.bindings_map().into_keys().collect();

    let mut clauses = Vec::new();
    for mut clause in stmt.sorted_graph_pattern_clauses() {
        let (lo, hi) = intersect_bounds(
            clause.p_lower_bound,
            clause.p_upper_bound,
            global_lower.as_ref(),
            global_upper.as_ref(),
        )?;
        let lookup = Lookup {
            max_elements: None,
            lower_anchor: lo,
            upper_anchor: hi,
        };
        // Object-side windows stay clause-local; the statement window only
        // narrows them when the clause asks for one.
        if clause.o_lower_bound.is_some() || clause.o_upper_bound.is_some() {
            let (olo, ohi) = intersect_bounds(
                clause.o_lower_bound,
                clause.o_upper_bound,
                global_lower.as_ref(),
                global_upper.as_ref(),
            )?;
            clause.o_lower_bound = olo;
            clause.o_upper_bound = ohi;
        }
        trace(&tracer, || {
            format!(
                "[plan] clause specificity={} bindings={:?}",
                clause.specificity(),
                clause.bindings()
            )
        });
        clauses.push((clause, lookup));
    }

    let mut having = None;
    if let Some(expr) = stmt.having() {
        for name in expr.bindings() {
            if !pattern_bindings.contains(name) {
                return Err(Error::Semantic(format!(
                    "having references unbound name {name}"
                )));
            }
        }
        having = Some(expr.clone());
    }

    let mut plan = QueryPlan {
        graphs,
        clauses,
        having,
        group_keys: Vec::new(),
        aggregates: Vec::new(),
        source_projection: Vec::new(),
        final_projection: Vec::new(),
        order_by: Vec::new(),
        limit: stmt.limit(),
        global_lower,
        global_upper,
        chunk_size,
        tracer,
    };
    if with_projection {
        plan_projections(stmt, &pattern_bindings, &mut plan)?;
    }
    Ok(plan)
}

/// Validates the SELECT side of a query and precomputes the projection,
/// grouping, and ordering column maps the executor applies.
fn plan_projections<S: Store>(
    stmt: &Statement,
    pattern_bindings: &BTreeSet<String>,
    plan: &mut QueryPlan<S>,
) -> Result<()> {
    let projections = stmt.projections();
    if projections.is_empty() {
        return Err(Error::Semantic("query projects no bindings".to_string()));
    }

    let mut outputs = BTreeSet::new();
    for p in projections {
        let binding = p
            .binding
            .as_deref()
            .ok_or_else(|| Error::Semantic("projection has no source binding".to_string()))?;
        if !pattern_bindings.contains(binding) {
            return Err(Error::Semantic(format!(
                "projection references unbound name {binding}"
            )));
        }
        let output = p.output_name().unwrap_or(binding);
        if !outputs.insert(output.to_string()) {
            return Err(Error::Semantic(format!("duplicate output name {output}")));
        }
    }

    // Alias → source for resolving GROUP BY and ORDER BY keys given in
    // output terms.
    let source_of = |name: &str| -> Option<String> {
        if pattern_bindings.contains(name) {
            return Some(name.to_string());
        }
        projections
            .iter()
            .find(|p| p.alias.as_deref() == Some(name) && p.op.is_none())
            .and_then(|p| p.binding.clone())
    };

    let grouped = !stmt.group_by().is_empty() || projections.iter().any(|p| p.op.is_some());
    if grouped {
        for key in stmt.group_by() {
            let source = source_of(key).ok_or_else(|| {
                Error::Semantic(format!("group by references unknown name {key}"))
            })?;
            let is_source = projections
                .iter()
                .any(|p| p.op.is_none() && p.binding.as_deref() == Some(source.as_str()));
            if !is_source {
                return Err(Error::Semantic(format!(
                    "group by key {key} is not a projected binding"
                )));
            }
            plan.group_keys.push(source);
        }

        let mut sources = Vec::new();
        for p in projections {
            let binding = projection_binding(p)?;
            if !sources.iter().any(|(s, _)| s == binding) {
                sources.push((binding.to_string(), binding.to_string()));
            }
            if let Some(op) = p.op {
                plan.aggregates.push(AggregateSpec {
                    source: binding.to_string(),
                    output: p.output_name().unwrap_or(binding).to_string(),
                    op,
                });
            }
        }
        plan.source_projection = sources;

        if plan.group_keys.is_empty() && plan.aggregates.len() < projections.len() {
            return Err(Error::Semantic(
                "aggregated query projects non-aggregated bindings without group by".to_string(),
            ));
        }
    }

    for key in stmt.order_by() {
        // After grouping, aggregated columns exist under their output
        // names; everything else is addressed by source binding.
        let column = if plan.aggregates.iter().any(|a| a.output == key.binding) {
            key.binding.clone()
        } else {
            let source = source_of(&key.binding).ok_or_else(|| {
                Error::Semantic(format!("order by references unknown name {}", key.binding))
            })?;
            if grouped && !plan.source_projection.iter().any(|(s, _)| *s == source) {
                return Err(Error::Semantic(format!(
                    "order by key {} does not survive grouping",
                    key.binding
                )));
            }
            source
        };
        plan.order_by.push(OrderKey {
            binding: column,
            direction: key.direction,
        });
    }

    for p in projections {
        let binding = projection_binding(p)?;
        let output = p.output_name().unwrap_or(binding).to_string();
        let current = if p.op.is_some() {
            output.clone()
        } else {
            binding.to_string()
        };
        plan.final_projection.push((current, output));
    }
    Ok(())
}

fn projection_binding(p: &Projection) -> Result<&str> {
    p.binding
        .as_deref()
        .ok_or_else(|| Error::Semantic("projection has no source binding".to_string()))
}

fn validated_construct_clauses(stmt: &Statement, remove: bool) -> Result<Vec<ConstructClause>> {
    if stmt.construct_clauses().is_empty() {
        return Err(Error::Semantic(
            "construct statement has no construct clauses".to_string(),
        ));
    }
    let pattern_bindings: BTreeSet<String> = stmt.bindings_map().into_keys().collect();
    for name in stmt.input_bindings() {
        if !pattern_bindings.contains(&name) {
            return Err(Error::Semantic(format!(
                "construct references unbound name {name}"
            )));
        }
    }
    for cc in stmt.construct_clauses() {
        if cc.s.is_none() && cc.s_binding.is_none() {
            return Err(Error::Semantic("construct clause has no subject".to_string()));
        }
        if cc.p.is_none() && cc.p_binding.is_none() {
            return Err(Error::Semantic(
                "construct clause has no predicate".to_string(),
            ));
        }
        if cc.o.is_none() && cc.o_binding.is_none() {
            return Err(Error::Semantic("construct clause has no object".to_string()));
        }
        if remove && !cc.reification_clauses().is_empty() {
            return Err(Error::Semantic(
                "deconstruct cannot reference reification clauses".to_string(),
            ));
        }
        for rc in cc.reification_clauses() {
            if rc.p.is_none() && rc.p_binding.is_none() {
                return Err(Error::Semantic(
                    "reification clause has no predicate".to_string(),
                ));
            }
            if rc.o.is_none() && rc.o_binding.is_none() {
                return Err(Error::Semantic(
                    "reification clause has no object".to_string(),
                ));
            }
        }
    }
    Ok(stmt.construct_clauses().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn intersection_narrows_both_sides() {
        let (lo, hi) = intersect_bounds(
            Some(at(2014)),
            Some(at(2018)),
            Some(&at(2015)),
            Some(&at(2017)),
        )
        .unwrap();
        assert_eq!(lo, Some(at(2015)));
        assert_eq!(hi, Some(at(2017)));
    }

    #[test]
    fn one_sided_windows_combine() {
        let (lo, hi) = intersect_bounds(Some(at(2015)), None, None, Some(&at(2016))).unwrap();
        assert_eq!(lo, Some(at(2015)));
        assert_eq!(hi, Some(at(2016)));
    }

    #[test]
    fn empty_intersection_is_a_semantic_error() {
        let err = intersect_bounds(Some(at(2017)), None, None, Some(&at(2015)));
        assert!(matches!(err, Err(Error::Semantic(_))));
    }

    #[test]
    fn dedup_preserves_order() {
        let names = vec!["?b".to_string(), "?a".to_string(), "?b".to_string()];
        assert_eq!(dedup(&names), vec!["?b", "?a"]);
    }
}
