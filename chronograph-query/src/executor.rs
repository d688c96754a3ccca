//! Drives a [`Plan`] against storage and materializes the result table.
//!
//! Query-shaped plans evaluate clause by clause: each clause opens a
//! bounded stream per source graph, rows are extracted per matching triple,
//! and the accumulated table is natural-joined with every new clause. Post-
//! processing (HAVING, grouping, ordering, limit, projection) reshapes the
//! joined table into the final output.

use crate::error::{Error, Result};
use crate::planner::{ConstructPlan, Plan, QueryPlan, trace};
use crate::semantic::{ConstructClause, GraphClause};
use crate::table::{Cell, Row, Table};
use chronograph_api::{
    Graph, Literal, Lookup, Node, Object, Predicate, StorageResult, Store, Triple,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Channel capacity when the statement does not set a chunk size.
const DEFAULT_CHUNK_SIZE: usize = 256;

impl<S: Store> Plan<S> {
    /// Executes the plan, producing the result table. Mutation plans return
    /// an empty table.
    pub async fn execute(&self, ctx: &CancellationToken) -> Result<Table> {
        if ctx.is_cancelled() {
            return Err(Error::Canceled);
        }
        match self {
            Plan::Create {
                store,
                graphs,
                tracer,
            } => {
                for name in graphs {
                    store.new_graph(ctx, name).await?;
                    trace(tracer, || format!("[exec] created graph {name}"));
                }
                Ok(Table::new(Vec::new()))
            }
            Plan::Drop {
                store,
                graphs,
                tracer,
            } => {
                for name in graphs {
                    store.delete_graph(ctx, name).await?;
                    trace(tracer, || format!("[exec] dropped graph {name}"));
                }
                Ok(Table::new(Vec::new()))
            }
            Plan::Insert {
                graphs,
                data,
                tracer,
            } => {
                for g in graphs {
                    g.add_triples(ctx, data).await?;
                    trace(tracer, || {
                        format!("[exec] inserted {} triples into {}", data.len(), g.id())
                    });
                }
                Ok(Table::new(Vec::new()))
            }
            Plan::Delete {
                graphs,
                data,
                tracer,
            } => {
                for g in graphs {
                    g.remove_triples(ctx, data).await?;
                    trace(tracer, || {
                        format!("[exec] deleted {} triples from {}", data.len(), g.id())
                    });
                }
                Ok(Table::new(Vec::new()))
            }
            Plan::Show { store, tracer } => {
                let names = store.graph_names(ctx).await?;
                trace(tracer, || format!("[exec] show {} graphs", names.len()));
                let mut tbl = Table::new(vec!["?graph".to_string()]);
                for name in names {
                    tbl.add_row(Row::new(vec![("?graph".to_string(), Cell::Str(name))]));
                }
                Ok(tbl)
            }
            Plan::Query(plan) => {
                let tbl = run_pattern(ctx, plan).await?;
                post_process(plan, tbl)
            }
            Plan::Construct(plan) => run_construct(ctx, plan).await,
        }
    }
}

/// Outcome of evaluating one clause against the accumulated table.
enum ClauseResult {
    /// A binding-free clause matched; the accumulated table is unchanged.
    Satisfied,
    /// A clause matched nothing; the whole pattern is empty.
    Annihilated,
    Joined(Table),
}

async fn run_pattern<S: Store>(ctx: &CancellationToken, plan: &QueryPlan<S>) -> Result<Table> {
    let mut acc: Option<Table> = None;
    for (clause, lookup) in &plan.clauses {
        if ctx.is_cancelled() {
            return Err(Error::Canceled);
        }
        match eval_clause(ctx, plan, clause, lookup, acc.as_ref()).await? {
            ClauseResult::Satisfied => {}
            ClauseResult::Annihilated => {
                return Ok(Table::new(pattern_columns(plan)));
            }
            ClauseResult::Joined(tbl) => {
                debug!(rows = tbl.len(), "joined clause");
                trace(&plan.tracer, || {
                    format!("[exec] joined clause, {} rows", tbl.len())
                });
                acc = Some(tbl);
            }
        }
    }
    Ok(acc.unwrap_or_else(|| {
        // Every clause was concrete and satisfied: the pattern holds once,
        // binding nothing.
        let mut unit = Table::new(Vec::new());
        unit.add_row(Row::default());
        unit
    }))
}

/// Union of every clause's binding columns, in clause order.
fn pattern_columns<S: Store>(plan: &QueryPlan<S>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (clause, _) in &plan.clauses {
        for name in clause.bindings() {
            if !out.iter().any(|n| n == name) {
                out.push(name.to_string());
            }
        }
    }
    out
}

fn clause_columns(clause: &GraphClause) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in clause.bindings() {
        if !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}

/// Per-clause access path, selected by which positions are concrete.
#[derive(Debug, Clone)]
enum AccessPath {
    Scan,
    Subject(Node),
    Predicate(Predicate),
    Object(Object),
    SubjectPredicate(Node, Predicate),
    PredicateObject(Predicate, Object),
    /// No subject+object index exists; walk the subject index and filter
    /// the object locally.
    SubjectScan(Node),
}

fn access_path(clause: &GraphClause) -> AccessPath {
    match (&clause.s, &clause.p, &clause.o) {
        (Some(s), Some(p), None) => AccessPath::SubjectPredicate(s.clone(), p.clone()),
        (None, Some(p), Some(o)) => AccessPath::PredicateObject(p.clone(), o.clone()),
        (Some(s), None, Some(_)) => AccessPath::SubjectScan(s.clone()),
        (Some(s), None, None) => AccessPath::Subject(s.clone()),
        (None, Some(p), None) => AccessPath::Predicate(p.clone()),
        (None, None, Some(o)) => AccessPath::Object(o.clone()),
        _ => AccessPath::Scan,
    }
}

async fn run_lookup<G: Graph>(
    g: G,
    ctx: CancellationToken,
    path: AccessPath,
    lookup: Lookup,
    tx: mpsc::Sender<Triple>,
) -> StorageResult<()> {
    match path {
        AccessPath::Scan => g.triples(&ctx, &lookup, tx).await,
        AccessPath::Subject(s) | AccessPath::SubjectScan(s) => {
            g.triples_for_subject(&ctx, &s, &lookup, tx).await
        }
        AccessPath::Predicate(p) => g.triples_for_predicate(&ctx, &p, &lookup, tx).await,
        AccessPath::Object(o) => g.triples_for_object(&ctx, &o, &lookup, tx).await,
        AccessPath::SubjectPredicate(s, p) => {
            g.triples_for_subject_and_predicate(&ctx, &s, &p, &lookup, tx)
                .await
        }
        AccessPath::PredicateObject(p, o) => {
            g.triples_for_predicate_and_object(&ctx, &p, &o, &lookup, tx)
                .await
        }
    }
}

async fn eval_clause<S: Store>(
    ctx: &CancellationToken,
    plan: &QueryPlan<S>,
    clause: &GraphClause,
    lookup: &Lookup,
    acc: Option<&Table>,
) -> Result<ClauseResult> {
    // Three concrete positions: existence probe.
    if let (Some(s), Some(p), Some(o)) = (&clause.s, &clause.p, &clause.o) {
        let probe = Triple::new(s.clone(), p.clone(), o.clone());
        if !lookup.covers(p) {
            return Ok(ClauseResult::Annihilated);
        }
        let mut found = false;
        for g in &plan.graphs {
            if g.exist(ctx, &probe).await? {
                found = true;
                break;
            }
        }
        trace(&plan.tracer, || format!("[exec] probe {probe} -> {found}"));
        if !found {
            return Ok(ClauseResult::Annihilated);
        }
        let cols = clause_columns(clause);
        if cols.is_empty() {
            return Ok(ClauseResult::Satisfied);
        }
        let mut tbl = Table::new(cols);
        match extract_row(clause, lookup, &probe) {
            Some(row) => tbl.add_row(row),
            // The triple exists but cannot satisfy the clause's alias
            // requirements (e.g. an anchor alias on an immutable predicate).
            None => return Ok(ClauseResult::Annihilated),
        }
        let joined = match acc {
            None => tbl,
            Some(a) => a.natural_join(&tbl),
        };
        return Ok(ClauseResult::Joined(joined));
    }

    let path = access_path(clause);
    trace(&plan.tracer, || {
        format!(
            "[exec] clause specificity={} access={path:?}",
            clause.specificity()
        )
    });
    let capacity = if plan.chunk_size > 0 {
        plan.chunk_size
    } else {
        DEFAULT_CHUNK_SIZE
    };
    let (tx, mut rx) = mpsc::channel::<Triple>(capacity);
    let mut producers: Vec<JoinHandle<StorageResult<()>>> = Vec::new();
    for g in &plan.graphs {
        producers.push(tokio::spawn(run_lookup(
            g.clone(),
            ctx.clone(),
            path.clone(),
            lookup.clone(),
            tx.clone(),
        )));
    }
    drop(tx);

    let consumed = consume(ctx, plan, clause, lookup, acc, &mut rx).await;

    // Always settle the producers before returning, so no task outlives the
    // call. Dropping the receiver unblocks any still sending.
    drop(rx);
    let mut producer_err: Option<Error> = None;
    for handle in producers {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                if producer_err.is_none() {
                    producer_err = Some(e.into());
                }
            }
            Err(e) => {
                if producer_err.is_none() {
                    producer_err = Some(Error::Exec(format!("lookup task failed: {e}")));
                }
            }
        }
    }
    let outcome = consumed?;
    if let Some(e) = producer_err {
        return Err(e);
    }
    Ok(outcome)
}

async fn consume<S: Store>(
    ctx: &CancellationToken,
    plan: &QueryPlan<S>,
    clause: &GraphClause,
    lookup: &Lookup,
    acc: Option<&Table>,
    rx: &mut mpsc::Receiver<Triple>,
) -> Result<ClauseResult> {
    let cols = clause_columns(clause);
    let mut matched = false;
    let mut out: Option<Table> = None;
    let mut chunk = Table::new(cols.clone());
    loop {
        let triple = tokio::select! {
            _ = ctx.cancelled() => return Err(Error::Canceled),
            t = rx.recv() => match t {
                Some(t) => t,
                None => break,
            },
        };
        let Some(row) = extract_row(clause, lookup, &triple) else {
            continue;
        };
        matched = true;
        if cols.is_empty() {
            // Existence is all this clause asks for.
            break;
        }
        chunk.add_row(row);
        if plan.chunk_size > 0 && chunk.len() >= plan.chunk_size {
            let full = std::mem::replace(&mut chunk, Table::new(cols.clone()));
            flush(acc, &mut out, full);
        }
    }
    if cols.is_empty() {
        return Ok(if matched {
            ClauseResult::Satisfied
        } else {
            ClauseResult::Annihilated
        });
    }
    flush(acc, &mut out, chunk);
    match out {
        Some(tbl) => Ok(ClauseResult::Joined(tbl)),
        None => Ok(ClauseResult::Annihilated),
    }
}

/// Joins one chunk of clause rows against the accumulated table and folds
/// the result into `out`.
fn flush(acc: Option<&Table>, out: &mut Option<Table>, chunk: Table) {
    if chunk.is_empty() && out.is_some() {
        return;
    }
    let joined = match acc {
        None => chunk,
        Some(a) => a.natural_join(&chunk),
    };
    match out {
        None => *out = Some(joined),
        Some(existing) => existing.append(joined),
    }
}

fn object_cell(o: &Object) -> Cell {
    match o {
        Object::Node(n) => Cell::Node(n.clone()),
        Object::Predicate(p) => Cell::Predicate(p.clone()),
        Object::Literal(l) => Cell::Literal(l.clone()),
    }
}

/// Materializes the row a triple contributes under a clause, or `None` when
/// the triple fails the clause's local constraints: id filters, anchor
/// requirements, object windows, or conflicting values for a binding used
/// in several positions.
fn extract_row(clause: &GraphClause, lookup: &Lookup, t: &Triple) -> Option<Row> {
    let (s, p, o) = (t.subject(), t.predicate(), t.object());
    if clause.s.as_ref().is_some_and(|want| want != s) {
        return None;
    }
    if clause.p.as_ref().is_some_and(|want| want != p) {
        return None;
    }
    if clause.o.as_ref().is_some_and(|want| want != o) {
        return None;
    }
    if clause.p_id.as_deref().is_some_and(|want| want != p.id()) {
        return None;
    }
    if clause
        .o_id
        .as_deref()
        .is_some_and(|want| o.id() != Some(want))
    {
        return None;
    }

    let p_anchor = p.anchor();
    let needs_p_anchor = clause.p_anchor_binding.is_some()
        || clause.p_anchor_alias.is_some()
        || clause.p_lower_bound.is_some()
        || clause.p_upper_bound.is_some();
    if needs_p_anchor && p_anchor.is_none() {
        return None;
    }

    let o_anchor = o.anchor();
    let needs_o_anchor = clause.o_anchor_binding.is_some()
        || clause.o_anchor_alias.is_some()
        || clause.o_lower_bound.is_some()
        || clause.o_upper_bound.is_some();
    if needs_o_anchor && o_anchor.is_none() {
        return None;
    }
    if let (Some(lo), Some(anchor)) = (&clause.o_lower_bound, o_anchor)
        && anchor < lo
    {
        return None;
    }
    if let (Some(hi), Some(anchor)) = (&clause.o_upper_bound, o_anchor)
        && anchor > hi
    {
        return None;
    }
    if clause.o_id_alias.is_some() && o.id().is_none() {
        return None;
    }
    if clause.o_type_alias.is_some() && o.type_name().is_none() {
        return None;
    }

    let mut row = Row::default();
    let mut ok = true;
    let mut put = |name: &Option<String>, cell: Option<Cell>| {
        if let (Some(name), Some(cell)) = (name, cell) {
            ok &= row.set_checked(name, cell);
        }
    };
    put(&clause.s_binding, Some(Cell::Node(s.clone())));
    put(&clause.s_alias, Some(Cell::Node(s.clone())));
    put(&clause.s_type_alias, Some(Cell::Str(s.kind().to_string())));
    put(&clause.s_id_alias, Some(Cell::Str(s.id().to_string())));
    put(&clause.p_binding, Some(Cell::Predicate(p.clone())));
    put(&clause.p_alias, Some(Cell::Predicate(p.clone())));
    put(&clause.p_id_alias, Some(Cell::Str(p.id().to_string())));
    put(&clause.p_anchor_binding, p_anchor.map(|a| Cell::Time(*a)));
    put(&clause.p_anchor_alias, p_anchor.map(|a| Cell::Time(*a)));
    put(&clause.p_lower_bound_alias, lookup.lower_anchor.map(Cell::Time));
    put(&clause.p_upper_bound_alias, lookup.upper_anchor.map(Cell::Time));
    put(&clause.o_binding, Some(object_cell(o)));
    put(&clause.o_alias, Some(object_cell(o)));
    put(&clause.o_id_alias, o.id().map(|id| Cell::Str(id.to_string())));
    put(
        &clause.o_type_alias,
        o.type_name().map(|k| Cell::Str(k.to_string())),
    );
    put(&clause.o_anchor_binding, o_anchor.map(|a| Cell::Time(*a)));
    put(&clause.o_anchor_alias, o_anchor.map(|a| Cell::Time(*a)));
    put(&clause.o_lower_bound_alias, clause.o_lower_bound.map(Cell::Time));
    put(&clause.o_upper_bound_alias, clause.o_upper_bound.map(Cell::Time));
    if !ok {
        return None;
    }
    Some(row)
}

fn post_process<S: Store>(plan: &QueryPlan<S>, mut tbl: Table) -> Result<Table> {
    apply_window(plan, &mut tbl)?;
    if let Some(expr) = &plan.having {
        tbl.filter(|row| expr.eval(row))?;
    }
    if !plan.source_projection.is_empty() {
        tbl.project(&plan.source_projection)?;
        tbl.group_by(&plan.group_keys, &plan.aggregates)?;
    }
    if !plan.order_by.is_empty() {
        tbl.sort(&plan.order_by);
    }
    if let Some(n) = plan.limit {
        tbl.limit(n);
    }
    tbl.project(&plan.final_projection)?;
    Ok(tbl)
}

/// The statement-level temporal window prefilters every anchored cell.
fn apply_window<S: Store>(plan: &QueryPlan<S>, tbl: &mut Table) -> Result<()> {
    if plan.global_lower.is_none() && plan.global_upper.is_none() {
        return Ok(());
    }
    tbl.filter(|row| {
        Ok(row.columns().iter().all(|(_, cell)| match cell.anchor() {
            None => true,
            Some(t) => {
                plan.global_lower.as_ref().is_none_or(|lo| t >= lo)
                    && plan.global_upper.as_ref().is_none_or(|hi| t <= hi)
            }
        }))
    })
}

async fn run_construct<S: Store>(
    ctx: &CancellationToken,
    plan: &ConstructPlan<S>,
) -> Result<Table> {
    let mut tbl = run_pattern(ctx, &plan.query).await?;
    apply_window(&plan.query, &mut tbl)?;
    let mut triples = Vec::new();
    for row in tbl.rows() {
        for cc in &plan.clauses {
            materialize(cc, row, &mut triples)?;
        }
    }
    trace(&plan.query.tracer, || {
        format!(
            "[exec] {} {} triples across {} graphs",
            if plan.remove { "deconstruct" } else { "construct" },
            triples.len(),
            plan.destinations.len()
        )
    });
    for g in &plan.destinations {
        if plan.remove {
            g.remove_triples(ctx, &triples).await?;
        } else {
            g.add_triples(ctx, &triples).await?;
        }
    }
    Ok(Table::new(Vec::new()))
}

/// Emits the triples one construct clause produces for one row: the main
/// triple, plus (for reification sub-clauses) the statement triples about
/// it and one triple per sub-clause off the fresh blank node.
fn materialize(cc: &ConstructClause, row: &Row, out: &mut Vec<Triple>) -> Result<()> {
    let s = match (&cc.s, &cc.s_binding) {
        (Some(s), _) => s.clone(),
        (None, Some(b)) => match row.get(b) {
            Some(Cell::Node(n)) => n.clone(),
            other => {
                return Err(Error::Exec(format!(
                    "construct subject {b} is not a node: {other:?}"
                )));
            }
        },
        (None, None) => return Err(Error::Exec("construct clause has no subject".to_string())),
    };
    let p = resolve_predicate(&cc.p, &cc.p_binding, &cc.p_anchor_binding, row)?;
    let o = resolve_object(&cc.o, &cc.o_binding, &cc.o_anchor_binding, row)?;
    let triple = Triple::new(s, p, o);
    if cc.reification_clauses().is_empty() {
        out.push(triple);
        return Ok(());
    }
    let (statements, blank) = triple.reify();
    out.push(triple);
    out.extend(statements);
    for rc in cc.reification_clauses() {
        let rp = resolve_predicate(&rc.p, &rc.p_binding, &rc.p_anchor_binding, row)?;
        let ro = resolve_object(&rc.o, &rc.o_binding, &rc.o_anchor_binding, row)?;
        out.push(Triple::new(blank.clone(), rp, ro));
    }
    Ok(())
}

fn resolve_predicate(
    p: &Option<Predicate>,
    binding: &Option<String>,
    anchor_binding: &Option<String>,
    row: &Row,
) -> Result<Predicate> {
    let base = match (p, binding) {
        (Some(p), _) => p.clone(),
        (None, Some(b)) => match row.get(b) {
            Some(Cell::Predicate(p)) => p.clone(),
            other => {
                return Err(Error::Exec(format!(
                    "construct predicate {b} is not a predicate: {other:?}"
                )));
            }
        },
        (None, None) => {
            return Err(Error::Exec("construct clause has no predicate".to_string()));
        }
    };
    match anchor_binding {
        None => Ok(base),
        Some(b) => match row.get(b) {
            Some(Cell::Time(t)) => Predicate::new_temporal(base.id(), *t)
                .map_err(|e| Error::Exec(e.to_string())),
            other => Err(Error::Exec(format!(
                "construct anchor {b} is not a time: {other:?}"
            ))),
        },
    }
}

fn resolve_object(
    o: &Option<Object>,
    binding: &Option<String>,
    anchor_binding: &Option<String>,
    row: &Row,
) -> Result<Object> {
    let base = match (o, binding) {
        (Some(o), _) => o.clone(),
        (None, Some(b)) => match row.get(b) {
            Some(Cell::Node(n)) => Object::Node(n.clone()),
            Some(Cell::Predicate(p)) => Object::Predicate(p.clone()),
            Some(Cell::Literal(l)) => Object::Literal(l.clone()),
            Some(Cell::Str(s)) => Object::Literal(Literal::text(s.clone())),
            other => {
                return Err(Error::Exec(format!(
                    "construct object {b} has no object form: {other:?}"
                )));
            }
        },
        (None, None) => return Err(Error::Exec("construct clause has no object".to_string())),
    };
    match anchor_binding {
        None => Ok(base),
        Some(b) => match (&base, row.get(b)) {
            (Object::Predicate(p), Some(Cell::Time(t))) => Ok(Object::Predicate(
                Predicate::new_temporal(p.id(), *t).map_err(|e| Error::Exec(e.to_string()))?,
            )),
            (_, other) => Err(Error::Exec(format!(
                "construct object anchor {b} cannot be applied: {other:?}"
            ))),
        },
    }
}
