//! The semantic IR of a BQL statement.
//!
//! A [`Statement`] is built incrementally by the parse driver: one mutation
//! per grammar production. Scratch clauses (`working_*`) are owned by the
//! statement and promoted into the permanent lists when complete; promoting
//! an empty scratch silently discards it. After parsing, the statement is
//! sealed and read by the planner.

use crate::expression::Expr;
use chrono::{DateTime, Utc};
use chronograph_api::{Node, Object, Predicate, Triple};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The kind of operation a statement performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    Query,
    Insert,
    Delete,
    Create,
    Drop,
    Construct,
    Deconstruct,
    Show,
}

/// Sort direction for an ORDER BY key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

/// One ORDER BY key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderKey {
    pub binding: String,
    pub direction: Direction,
}

/// Aggregation applied to a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregator {
    Count,
    CountDistinct,
    Sum,
}

/// One line of the WHERE pattern: `S P O`, each position either concrete or
/// carrying bindings/aliases for the value and its components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphClause {
    // Subject side.
    pub s: Option<Node>,
    pub s_binding: Option<String>,
    pub s_alias: Option<String>,
    pub s_type_alias: Option<String>,
    pub s_id_alias: Option<String>,

    // Predicate side. `p_id` constrains the predicate id without fixing the
    // anchor; the bounds window the anchor of temporal predicates.
    pub p: Option<Predicate>,
    pub p_id: Option<String>,
    pub p_binding: Option<String>,
    pub p_alias: Option<String>,
    pub p_id_alias: Option<String>,
    pub p_anchor_binding: Option<String>,
    pub p_anchor_alias: Option<String>,
    pub p_lower_bound: Option<DateTime<Utc>>,
    pub p_upper_bound: Option<DateTime<Utc>>,
    pub p_lower_bound_alias: Option<String>,
    pub p_upper_bound_alias: Option<String>,

    // Object side; anchors apply when the object is a temporal predicate.
    pub o: Option<Object>,
    pub o_id: Option<String>,
    pub o_binding: Option<String>,
    pub o_alias: Option<String>,
    pub o_id_alias: Option<String>,
    pub o_type_alias: Option<String>,
    pub o_anchor_binding: Option<String>,
    pub o_anchor_alias: Option<String>,
    pub o_lower_bound: Option<DateTime<Utc>>,
    pub o_upper_bound: Option<DateTime<Utc>>,
    pub o_lower_bound_alias: Option<String>,
    pub o_upper_bound_alias: Option<String>,
}

impl GraphClause {
    /// Number of concrete positions among `{S, P, O}`, 0..=3. The planner's
    /// primary sort key: more concrete clauses are cheaper to resolve.
    pub fn specificity(&self) -> usize {
        [self.s.is_some(), self.p.is_some(), self.o.is_some()]
            .iter()
            .filter(|set| **set)
            .count()
    }

    /// A clause is empty iff no position is concrete and no binding, alias,
    /// constraint, or bound is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Every binding and alias name set on this clause, in field order,
    /// with repetition.
    pub fn bindings(&self) -> Vec<&str> {
        [
            &self.s_binding,
            &self.s_alias,
            &self.s_type_alias,
            &self.s_id_alias,
            &self.p_binding,
            &self.p_alias,
            &self.p_id_alias,
            &self.p_anchor_binding,
            &self.p_anchor_alias,
            &self.p_lower_bound_alias,
            &self.p_upper_bound_alias,
            &self.o_binding,
            &self.o_alias,
            &self.o_id_alias,
            &self.o_type_alias,
            &self.o_anchor_binding,
            &self.o_anchor_alias,
            &self.o_lower_bound_alias,
            &self.o_upper_bound_alias,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect()
    }
}

/// One SELECT item: a source binding, an optional exposed alias, and an
/// optional aggregator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub binding: Option<String>,
    pub alias: Option<String>,
    pub op: Option<Aggregator>,
}

impl Projection {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The exposed output column name: the alias when present, else the
    /// source binding.
    pub fn output_name(&self) -> Option<&str> {
        self.alias.as_deref().or(self.binding.as_deref())
    }
}

/// A reification sub-clause: predicate and object of a statement *about*
/// the triple its parent construct clause emits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReificationClause {
    pub p: Option<Predicate>,
    pub p_binding: Option<String>,
    pub p_anchor_binding: Option<String>,
    pub o: Option<Object>,
    pub o_binding: Option<String>,
    pub o_anchor_binding: Option<String>,
}

impl ReificationClause {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn bindings(&self) -> Vec<&str> {
        [
            &self.p_binding,
            &self.p_anchor_binding,
            &self.o_binding,
            &self.o_anchor_binding,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect()
    }
}

/// One line of a CONSTRUCT/DECONSTRUCT body, with optional statements about
/// the triple it emits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstructClause {
    pub s: Option<Node>,
    pub s_binding: Option<String>,
    pub p: Option<Predicate>,
    pub p_binding: Option<String>,
    pub p_anchor_binding: Option<String>,
    pub o: Option<Object>,
    pub o_binding: Option<String>,
    pub o_anchor_binding: Option<String>,
    reifications: Vec<ReificationClause>,
    working_reification: Option<ReificationClause>,
}

impl ConstructClause {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn reset_working_reification_clause(&mut self) {
        self.working_reification = Some(ReificationClause::default());
    }

    pub fn working_reification_clause(&mut self) -> Option<&mut ReificationClause> {
        self.working_reification.as_mut()
    }

    /// Promotes the scratch reification clause; an empty scratch is
    /// discarded.
    pub fn add_working_reification_clause(&mut self) {
        if let Some(rc) = self.working_reification.take()
            && !rc.is_empty()
        {
            self.reifications.push(rc);
        }
        self.working_reification = Some(ReificationClause::default());
    }

    pub fn reification_clauses(&self) -> &[ReificationClause] {
        &self.reifications
    }

    /// Binding names referenced by this clause: the outer fields first,
    /// then each reification sub-clause in order.
    fn bindings(&self) -> Vec<&str> {
        let mut out: Vec<&str> = [
            &self.s_binding,
            &self.p_binding,
            &self.p_anchor_binding,
            &self.o_binding,
            &self.o_anchor_binding,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect();
        for rc in &self.reifications {
            out.extend(rc.bindings());
        }
        out
    }
}

/// The mutable semantic statement the parse driver populates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    kind: Option<StatementKind>,
    graphs: Vec<String>,
    output_graphs: Vec<String>,
    data: Vec<Triple>,
    pattern: Vec<GraphClause>,
    working_clause: Option<GraphClause>,
    projections: Vec<Projection>,
    working_projection: Option<Projection>,
    construct_clauses: Vec<ConstructClause>,
    working_construct: Option<ConstructClause>,
    limit: Option<u64>,
    lower_bound: Option<DateTime<Utc>>,
    upper_bound: Option<DateTime<Utc>>,
    having: Option<Expr>,
    group_by: Vec<String>,
    order_by: Vec<OrderKey>,
}

impl Statement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_type(&mut self, kind: StatementKind) {
        self.kind = Some(kind);
    }

    pub fn kind(&self) -> Option<StatementKind> {
        self.kind
    }

    pub fn add_graph(&mut self, name: &str) {
        self.graphs.push(name.to_string());
    }

    pub fn graph_names(&self) -> &[String] {
        &self.graphs
    }

    /// Destination graphs for Construct/Deconstruct (`into` in the surface
    /// syntax); `graphs` remains the `from` list.
    pub fn add_output_graph(&mut self, name: &str) {
        self.output_graphs.push(name.to_string());
    }

    pub fn output_graph_names(&self) -> &[String] {
        &self.output_graphs
    }

    pub fn add_data(&mut self, t: Triple) {
        self.data.push(t);
    }

    pub fn data(&self) -> &[Triple] {
        &self.data
    }

    pub fn reset_working_graph_clause(&mut self) {
        self.working_clause = Some(GraphClause::default());
    }

    pub fn working_graph_clause(&mut self) -> Option<&mut GraphClause> {
        self.working_clause.as_mut()
    }

    /// Promotes the scratch clause into the pattern. Promotion is a move;
    /// an empty scratch is discarded, and the scratch resets either way.
    pub fn add_working_graph_clause(&mut self) {
        if let Some(clause) = self.working_clause.take()
            && !clause.is_empty()
        {
            self.pattern.push(clause);
        }
        self.working_clause = Some(GraphClause::default());
    }

    pub fn graph_pattern_clauses(&self) -> &[GraphClause] {
        &self.pattern
    }

    /// The pattern ordered by descending specificity, stable within equal
    /// specificity.
    pub fn sorted_graph_pattern_clauses(&self) -> Vec<GraphClause> {
        let mut sorted = self.pattern.clone();
        sorted.sort_by_key(|c| std::cmp::Reverse(c.specificity()));
        sorted
    }

    pub fn reset_working_projection(&mut self) {
        self.working_projection = Some(Projection::default());
    }

    pub fn working_projection(&mut self) -> Option<&mut Projection> {
        self.working_projection.as_mut()
    }

    pub fn add_working_projection(&mut self) {
        if let Some(p) = self.working_projection.take()
            && !p.is_empty()
        {
            self.projections.push(p);
        }
        self.working_projection = Some(Projection::default());
    }

    pub fn projections(&self) -> &[Projection] {
        &self.projections
    }

    pub fn reset_working_construct_clause(&mut self) {
        self.working_construct = Some(ConstructClause::default());
    }

    pub fn working_construct_clause(&mut self) -> Option<&mut ConstructClause> {
        self.working_construct.as_mut()
    }

    pub fn add_working_construct_clause(&mut self) {
        if let Some(cc) = self.working_construct.take()
            && !cc.is_empty()
        {
            self.construct_clauses.push(cc);
        }
        self.working_construct = Some(ConstructClause::default());
    }

    pub fn construct_clauses(&self) -> &[ConstructClause] {
        &self.construct_clauses
    }

    pub fn set_limit(&mut self, n: u64) {
        self.limit = Some(n);
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// `before t`: keep anchors at or before `t`.
    pub fn set_before(&mut self, t: DateTime<Utc>) {
        self.upper_bound = Some(t);
    }

    /// `after t`: keep anchors at or after `t`.
    pub fn set_after(&mut self, t: DateTime<Utc>) {
        self.lower_bound = Some(t);
    }

    /// `between lo, hi`.
    pub fn set_between(&mut self, lo: DateTime<Utc>, hi: DateTime<Utc>) {
        self.lower_bound = Some(lo);
        self.upper_bound = Some(hi);
    }

    pub fn lower_time_bound(&self) -> Option<&DateTime<Utc>> {
        self.lower_bound.as_ref()
    }

    pub fn upper_time_bound(&self) -> Option<&DateTime<Utc>> {
        self.upper_bound.as_ref()
    }

    pub fn set_having(&mut self, expr: Expr) {
        self.having = Some(expr);
    }

    pub fn having(&self) -> Option<&Expr> {
        self.having.as_ref()
    }

    pub fn add_group_by(&mut self, binding: &str) {
        self.group_by.push(binding.to_string());
    }

    pub fn group_by(&self) -> &[String] {
        &self.group_by
    }

    pub fn add_order_by(&mut self, binding: &str, direction: Direction) {
        self.order_by.push(OrderKey {
            binding: binding.to_string(),
            direction,
        });
    }

    pub fn order_by(&self) -> &[OrderKey] {
        &self.order_by
    }

    /// Binding name → reference count, summed across every binding and
    /// alias field of every finalized pattern clause. Shared names are the
    /// join keys between clauses.
    pub fn bindings_map(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for clause in &self.pattern {
            for name in clause.bindings() {
                *counts.entry(name.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Every binding the statement consumes: projection sources in
    /// projection order, then the bindings of each construct clause (outer
    /// fields before its reifications).
    pub fn input_bindings(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .projections
            .iter()
            .filter_map(|p| p.binding.clone())
            .collect();
        for cc in &self.construct_clauses {
            out.extend(cc.bindings().into_iter().map(str::to_string));
        }
        out
    }

    /// The exposed output column names, in projection order.
    pub fn output_bindings(&self) -> Vec<String> {
        self.projections
            .iter()
            .filter_map(|p| p.output_name().map(str::to_string))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clause_with_all_bindings(name: &str) -> GraphClause {
        let n = || Some(name.to_string());
        GraphClause {
            s_binding: n(),
            s_alias: n(),
            s_type_alias: n(),
            s_id_alias: n(),
            p_binding: n(),
            p_alias: n(),
            p_id_alias: n(),
            p_anchor_binding: n(),
            p_anchor_alias: n(),
            p_lower_bound_alias: n(),
            p_upper_bound_alias: n(),
            o_binding: n(),
            o_alias: n(),
            o_id_alias: n(),
            o_type_alias: n(),
            o_anchor_binding: n(),
            o_anchor_alias: n(),
            o_lower_bound_alias: n(),
            o_upper_bound_alias: n(),
            ..GraphClause::default()
        }
    }

    #[test]
    fn specificity_counts_concrete_positions() {
        let mut c = GraphClause::default();
        assert_eq!(c.specificity(), 0);
        c.s = Some("/u<joe>".parse().unwrap());
        assert_eq!(c.specificity(), 1);
        c.p = Some("\"parent_of\"@[]".parse().unwrap());
        assert_eq!(c.specificity(), 2);
        c.o = Some("/u<mary>".parse().unwrap());
        assert_eq!(c.specificity(), 3);
    }

    #[test]
    fn empty_working_clause_is_dropped() {
        let mut st = Statement::new();
        st.bind_type(StatementKind::Query);
        st.reset_working_graph_clause();
        st.add_working_graph_clause();
        assert_eq!(st.graph_pattern_clauses().len(), 0);
    }

    #[test]
    fn nonempty_working_clause_is_promoted_and_scratch_resets() {
        let mut st = Statement::new();
        st.reset_working_graph_clause();
        st.working_graph_clause().unwrap().s_binding = Some("?s".to_string());
        st.add_working_graph_clause();
        assert_eq!(st.graph_pattern_clauses().len(), 1);
        // The scratch reset to a fresh empty clause.
        assert!(st.working_graph_clause().unwrap().is_empty());
        st.add_working_graph_clause();
        assert_eq!(st.graph_pattern_clauses().len(), 1);
    }

    #[test]
    fn sorted_clauses_are_a_specificity_ordered_permutation() {
        let mut st = Statement::new();
        for (s, o) in [
            (None, Some("/u<mary>".parse().unwrap())),
            (Some("/u<joe>".parse().unwrap()), Some("/u<eve>".parse().unwrap())),
            (None, None),
            (Some("/u<peter>".parse().unwrap()), None),
        ] {
            st.reset_working_graph_clause();
            let c = st.working_graph_clause().unwrap();
            c.s = s;
            c.o = o;
            c.p_binding = Some("?p".to_string());
            st.add_working_graph_clause();
        }
        let sorted = st.sorted_graph_pattern_clauses();
        assert_eq!(sorted.len(), st.graph_pattern_clauses().len());
        let specs: Vec<usize> = sorted.iter().map(GraphClause::specificity).collect();
        assert_eq!(specs, vec![2, 1, 1, 0]);
        // Stable: the two specificity-1 clauses keep insertion order.
        assert_eq!(sorted[1].o, Some("/u<mary>".parse().unwrap()));
        assert_eq!(sorted[2].s, Some("/u<peter>".parse().unwrap()));
    }

    #[test]
    fn bindings_map_counts_every_field_reference() {
        // 19 binding fields per clause, 10 clauses, all aliased to one name.
        let mut st = Statement::new();
        for _ in 0..10 {
            st.reset_working_graph_clause();
            *st.working_graph_clause().unwrap() = clause_with_all_bindings("?b");
            st.add_working_graph_clause();
        }
        assert_eq!(st.bindings_map().get("?b"), Some(&190));

        // Distinct names per clause count separately.
        let mut st = Statement::new();
        for i in 0..10 {
            st.reset_working_graph_clause();
            *st.working_graph_clause().unwrap() = clause_with_all_bindings(&format!("?b{i}"));
            st.add_working_graph_clause();
        }
        let map = st.bindings_map();
        assert_eq!(map.len(), 10);
        assert!(map.values().all(|count| *count == 19));
    }

    #[test]
    fn empty_working_projection_is_dropped() {
        let mut st = Statement::new();
        st.reset_working_projection();
        st.add_working_projection();
        assert_eq!(st.projections().len(), 0);
    }

    #[test]
    fn input_bindings_list_projections_then_constructs() {
        let mut st = Statement::new();
        st.reset_working_projection();
        st.working_projection().unwrap().binding = Some("?a".to_string());
        st.add_working_projection();
        st.reset_working_projection();
        let p = st.working_projection().unwrap();
        p.binding = Some("?b".to_string());
        p.alias = Some("?renamed".to_string());
        st.add_working_projection();

        st.reset_working_construct_clause();
        {
            let cc = st.working_construct_clause().unwrap();
            cc.s_binding = Some("?c".to_string());
            cc.o_binding = Some("?d".to_string());
            cc.reset_working_reification_clause();
            cc.working_reification_clause().unwrap().o_binding = Some("?e".to_string());
            cc.add_working_reification_clause();
        }
        st.add_working_construct_clause();

        assert_eq!(st.input_bindings(), vec!["?a", "?b", "?c", "?d", "?e"]);
        assert_eq!(st.output_bindings(), vec!["?a", "?renamed"]);
    }

    #[test]
    fn empty_working_reification_is_dropped() {
        let mut cc = ConstructClause::default();
        cc.reset_working_reification_clause();
        cc.add_working_reification_clause();
        assert_eq!(cc.reification_clauses().len(), 0);
    }
}
