use async_trait::async_trait;
use chronograph_api::{
    Graph, Lookup, Node, Object, Predicate, StorageError, StorageResult, Store, Triple,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Triples plus the secondary indexes backing each lookup path, all keyed by
/// canonical text.
#[derive(Debug, Default)]
struct GraphData {
    triples: BTreeSet<Triple>,
    by_s: BTreeMap<String, BTreeSet<Triple>>,
    by_p: BTreeMap<String, BTreeSet<Triple>>,
    by_o: BTreeMap<String, BTreeSet<Triple>>,
    by_sp: BTreeMap<String, BTreeSet<Triple>>,
    by_po: BTreeMap<String, BTreeSet<Triple>>,
}

fn sp_key(s: &Node, p: &Predicate) -> String {
    format!("{s} {p}")
}

fn po_key(p: &Predicate, o: &Object) -> String {
    format!("{p} {o}")
}

impl GraphData {
    fn insert(&mut self, t: &Triple) {
        if !self.triples.insert(t.clone()) {
            return;
        }
        let (s, p, o) = (t.subject(), t.predicate(), t.object());
        self.by_s.entry(s.to_string()).or_default().insert(t.clone());
        self.by_p.entry(p.to_string()).or_default().insert(t.clone());
        self.by_o.entry(o.to_string()).or_default().insert(t.clone());
        self.by_sp.entry(sp_key(s, p)).or_default().insert(t.clone());
        self.by_po.entry(po_key(p, o)).or_default().insert(t.clone());
    }

    fn remove(&mut self, t: &Triple) {
        if !self.triples.remove(t) {
            return;
        }
        let (s, p, o) = (t.subject(), t.predicate(), t.object());
        for (index, key) in [
            (&mut self.by_s, s.to_string()),
            (&mut self.by_p, p.to_string()),
            (&mut self.by_o, o.to_string()),
            (&mut self.by_sp, sp_key(s, p)),
            (&mut self.by_po, po_key(p, o)),
        ] {
            if let Some(set) = index.get_mut(&key) {
                set.remove(t);
                if set.is_empty() {
                    index.remove(&key);
                }
            }
        }
    }
}

/// One named graph inside a [`MemoryStore`]. Cloning the handle shares the
/// underlying data; mutations take the graph's write lock, lookups its read
/// lock.
#[derive(Debug, Clone)]
pub struct MemoryGraph {
    id: String,
    data: Arc<RwLock<GraphData>>,
}

impl MemoryGraph {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            data: Arc::new(RwLock::new(GraphData::default())),
        }
    }

    /// Streams `matches` through `tx`, honoring the lookup window, the
    /// element cap, and cancellation. The read guard is held by the caller
    /// for the duration of the stream.
    async fn send_all<'a>(
        &self,
        ctx: &CancellationToken,
        lookup: &Lookup,
        tx: &mpsc::Sender<Triple>,
        matches: impl Iterator<Item = &'a Triple>,
    ) -> StorageResult<()> {
        let mut sent = 0usize;
        for t in matches {
            if let Some(max) = lookup.max_elements
                && sent >= max
            {
                break;
            }
            if !lookup.covers(t.predicate()) {
                continue;
            }
            tokio::select! {
                _ = ctx.cancelled() => return Err(StorageError::Canceled),
                res = tx.send(t.clone()) => {
                    // A dropped receiver means the consumer finished early.
                    if res.is_err() {
                        return Ok(());
                    }
                }
            }
            sent += 1;
        }
        Ok(())
    }

    async fn stream_index(
        &self,
        ctx: &CancellationToken,
        index: fn(&GraphData) -> &BTreeMap<String, BTreeSet<Triple>>,
        key: String,
        lookup: &Lookup,
        tx: mpsc::Sender<Triple>,
    ) -> StorageResult<()> {
        let data = self.data.read().await;
        match index(&data).get(&key) {
            Some(set) => self.send_all(ctx, lookup, &tx, set.iter()).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Graph for MemoryGraph {
    fn id(&self) -> &str {
        &self.id
    }

    async fn add_triples(&self, ctx: &CancellationToken, triples: &[Triple]) -> StorageResult<()> {
        if ctx.is_cancelled() {
            return Err(StorageError::Canceled);
        }
        let mut data = self.data.write().await;
        for t in triples {
            data.insert(t);
        }
        debug!(graph = %self.id, added = triples.len(), "added triples");
        Ok(())
    }

    async fn remove_triples(
        &self,
        ctx: &CancellationToken,
        triples: &[Triple],
    ) -> StorageResult<()> {
        if ctx.is_cancelled() {
            return Err(StorageError::Canceled);
        }
        let mut data = self.data.write().await;
        for t in triples {
            data.remove(t);
        }
        debug!(graph = %self.id, removed = triples.len(), "removed triples");
        Ok(())
    }

    async fn exist(&self, ctx: &CancellationToken, t: &Triple) -> StorageResult<bool> {
        if ctx.is_cancelled() {
            return Err(StorageError::Canceled);
        }
        Ok(self.data.read().await.triples.contains(t))
    }

    async fn triples(
        &self,
        ctx: &CancellationToken,
        lookup: &Lookup,
        tx: mpsc::Sender<Triple>,
    ) -> StorageResult<()> {
        let data = self.data.read().await;
        self.send_all(ctx, lookup, &tx, data.triples.iter()).await
    }

    async fn triples_for_subject(
        &self,
        ctx: &CancellationToken,
        s: &Node,
        lookup: &Lookup,
        tx: mpsc::Sender<Triple>,
    ) -> StorageResult<()> {
        self.stream_index(ctx, |d| &d.by_s, s.to_string(), lookup, tx)
            .await
    }

    async fn triples_for_predicate(
        &self,
        ctx: &CancellationToken,
        p: &Predicate,
        lookup: &Lookup,
        tx: mpsc::Sender<Triple>,
    ) -> StorageResult<()> {
        self.stream_index(ctx, |d| &d.by_p, p.to_string(), lookup, tx)
            .await
    }

    async fn triples_for_object(
        &self,
        ctx: &CancellationToken,
        o: &Object,
        lookup: &Lookup,
        tx: mpsc::Sender<Triple>,
    ) -> StorageResult<()> {
        self.stream_index(ctx, |d| &d.by_o, o.to_string(), lookup, tx)
            .await
    }

    async fn triples_for_subject_and_predicate(
        &self,
        ctx: &CancellationToken,
        s: &Node,
        p: &Predicate,
        lookup: &Lookup,
        tx: mpsc::Sender<Triple>,
    ) -> StorageResult<()> {
        self.stream_index(ctx, |d| &d.by_sp, sp_key(s, p), lookup, tx)
            .await
    }

    async fn triples_for_predicate_and_object(
        &self,
        ctx: &CancellationToken,
        p: &Predicate,
        o: &Object,
        lookup: &Lookup,
        tx: mpsc::Sender<Triple>,
    ) -> StorageResult<()> {
        self.stream_index(ctx, |d| &d.by_po, po_key(p, o), lookup, tx)
            .await
    }
}

/// Volatile in-memory store mapping graph ids to graphs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    graphs: Arc<RwLock<BTreeMap<String, MemoryGraph>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Graph = MemoryGraph;

    async fn new_graph(&self, ctx: &CancellationToken, id: &str) -> StorageResult<Self::Graph> {
        if ctx.is_cancelled() {
            return Err(StorageError::Canceled);
        }
        if !id.starts_with('?') {
            return Err(StorageError::Internal(format!(
                "graph id {id:?} must start with '?'"
            )));
        }
        let mut graphs = self.graphs.write().await;
        if graphs.contains_key(id) {
            return Err(StorageError::GraphExists(id.to_string()));
        }
        let g = MemoryGraph::new(id);
        graphs.insert(id.to_string(), g.clone());
        debug!(graph = %id, "created graph");
        Ok(g)
    }

    async fn graph(&self, ctx: &CancellationToken, id: &str) -> StorageResult<Self::Graph> {
        if ctx.is_cancelled() {
            return Err(StorageError::Canceled);
        }
        self.graphs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::GraphNotFound(id.to_string()))
    }

    async fn delete_graph(&self, ctx: &CancellationToken, id: &str) -> StorageResult<()> {
        if ctx.is_cancelled() {
            return Err(StorageError::Canceled);
        }
        let mut graphs = self.graphs.write().await;
        if graphs.remove(id).is_none() {
            return Err(StorageError::GraphNotFound(id.to_string()));
        }
        debug!(graph = %id, "deleted graph");
        Ok(())
    }

    async fn graph_names(&self, ctx: &CancellationToken) -> StorageResult<Vec<String>> {
        if ctx.is_cancelled() {
            return Err(StorageError::Canceled);
        }
        Ok(self.graphs.read().await.keys().cloned().collect())
    }
}
