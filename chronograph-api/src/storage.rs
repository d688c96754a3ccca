use crate::error::StorageResult;
use crate::node::Node;
use crate::predicate::Predicate;
use crate::triple::{Object, Triple};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Options constraining a triple lookup.
///
/// The default lookup is unbounded. Anchor bounds apply to temporal
/// predicates only; triples with immutable predicates always pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lookup {
    pub max_elements: Option<usize>,
    pub lower_anchor: Option<DateTime<Utc>>,
    pub upper_anchor: Option<DateTime<Utc>>,
}

impl Lookup {
    pub fn is_unbounded(&self) -> bool {
        self.max_elements.is_none() && self.lower_anchor.is_none() && self.upper_anchor.is_none()
    }

    /// Whether the predicate's anchor falls inside the lookup window.
    pub fn covers(&self, p: &Predicate) -> bool {
        match p.anchor() {
            None => true,
            Some(t) => {
                self.lower_anchor.is_none_or(|lo| *t >= lo)
                    && self.upper_anchor.is_none_or(|hi| *t <= hi)
            }
        }
    }
}

/// A named, mutable multiset of triples with set semantics.
///
/// Lookup methods stream matches through the provided bounded channel. The
/// producer owns the sender: dropping it signals end-of-stream. On
/// cancellation the producer stops sending and returns
/// [`StorageError::Canceled`](crate::StorageError::Canceled); a closed
/// receiver ends the stream without error.
#[async_trait]
pub trait Graph: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    /// Adds triples; re-adding an existing triple is a no-op.
    async fn add_triples(&self, ctx: &CancellationToken, triples: &[Triple]) -> StorageResult<()>;

    /// Removes triples; removing an absent triple is a no-op.
    async fn remove_triples(&self, ctx: &CancellationToken, triples: &[Triple])
    -> StorageResult<()>;

    async fn exist(&self, ctx: &CancellationToken, t: &Triple) -> StorageResult<bool>;

    /// Streams every triple matching the lookup.
    async fn triples(
        &self,
        ctx: &CancellationToken,
        lookup: &Lookup,
        tx: mpsc::Sender<Triple>,
    ) -> StorageResult<()>;

    async fn triples_for_subject(
        &self,
        ctx: &CancellationToken,
        s: &Node,
        lookup: &Lookup,
        tx: mpsc::Sender<Triple>,
    ) -> StorageResult<()>;

    async fn triples_for_predicate(
        &self,
        ctx: &CancellationToken,
        p: &Predicate,
        lookup: &Lookup,
        tx: mpsc::Sender<Triple>,
    ) -> StorageResult<()>;

    async fn triples_for_object(
        &self,
        ctx: &CancellationToken,
        o: &Object,
        lookup: &Lookup,
        tx: mpsc::Sender<Triple>,
    ) -> StorageResult<()>;

    async fn triples_for_subject_and_predicate(
        &self,
        ctx: &CancellationToken,
        s: &Node,
        p: &Predicate,
        lookup: &Lookup,
        tx: mpsc::Sender<Triple>,
    ) -> StorageResult<()>;

    async fn triples_for_predicate_and_object(
        &self,
        ctx: &CancellationToken,
        p: &Predicate,
        o: &Object,
        lookup: &Lookup,
        tx: mpsc::Sender<Triple>,
    ) -> StorageResult<()>;
}

/// A collection of named graphs. Graph ids start with `?` and identify a
/// graph within one store.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Graph: Graph;

    /// Creates a graph; a duplicate id is an error.
    async fn new_graph(&self, ctx: &CancellationToken, id: &str) -> StorageResult<Self::Graph>;

    /// Returns an existing graph; a missing id is an error.
    async fn graph(&self, ctx: &CancellationToken, id: &str) -> StorageResult<Self::Graph>;

    /// Deletes a graph and its triples; a missing id is an error.
    async fn delete_graph(&self, ctx: &CancellationToken, id: &str) -> StorageResult<()>;

    async fn graph_names(&self, ctx: &CancellationToken) -> StorageResult<Vec<String>>;
}
