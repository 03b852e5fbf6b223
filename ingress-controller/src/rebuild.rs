use crate::{
    core::{Dag, Status, Vertex, Visitor},
    debug,
    index::{BuildConfig, Builder, SharedCache},
};
use std::{
    collections::BTreeMap,
    io::{self, Write},
    path::PathBuf,
    time::Duration,
};
use tokio::time;
use tracing::{info, warn};

/// Recompiles the cache whenever its contents change.
///
/// Changes are coalesced: the cache is checked once per interval, so a burst of updates results
/// in a single build.
#[derive(Debug)]
pub struct Rebuild {
    cache: SharedCache,
    config: BuildConfig,
    interval: Duration,
    dot_path: Option<PathBuf>,

    /// The cache generation of the last build.
    generation: Option<u64>,
}

/// The number of vertices of each kind, and of edges, in a DAG.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Stats {
    vertices: BTreeMap<&'static str, usize>,
    edges: usize,
}

// === impl Rebuild ===

impl Rebuild {
    pub fn new(cache: SharedCache, config: BuildConfig, interval: Duration) -> Self {
        Self {
            cache,
            config,
            interval,
            dot_path: None,
            generation: None,
        }
    }

    /// Writes each new DAG to `path` in DOT format.
    pub fn with_dot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dot_path = Some(path.into());
        self
    }

    pub async fn run(mut self) {
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Some(dag) = self.rebuild() {
                self.export(&dag);
            }
        }
    }

    /// Builds a new DAG if the cache has changed since the last build.
    pub fn rebuild(&mut self) -> Option<Dag> {
        let (dag, generation) = {
            let cache = self.cache.read();
            let generation = cache.generation();
            if self.generation == Some(generation) {
                return None;
            }
            (Builder::new(&*cache, &self.config).build(), generation)
        };
        self.generation = Some(generation);

        let stats = Stats::of(&dag);
        info!(
            generation,
            vertices = stats.vertices.values().sum::<usize>(),
            edges = stats.edges,
            "Rebuilt DAG"
        );
        for (kind, count) in &stats.vertices {
            tracing::debug!(%kind, count);
        }
        for (obj, status) in dag.statuses() {
            if status.status != Status::Valid {
                tracing::debug!(
                    %obj,
                    status = %status.status,
                    description = %status.description,
                    "Not serving"
                );
            }
        }

        Some(dag)
    }

    fn export(&self, dag: &Dag) {
        let Some(path) = self.dot_path.as_ref() else {
            return;
        };
        let written = std::fs::File::create(path).and_then(|file| {
            let mut out = io::BufWriter::new(file);
            debug::write_dot(dag, &mut out)?;
            out.flush()
        });
        if let Err(error) = written {
            warn!(%error, path = %path.display(), "Failed to write DAG");
        }
    }
}

// === impl Stats ===

impl Stats {
    fn of(dag: &Dag) -> Self {
        let mut stats = Self::default();
        dag.walk(&mut stats);
        stats
    }
}

impl Visitor for Stats {
    fn vertex(&mut self, vertex: &Vertex) {
        *self.vertices.entry(vertex.kind()).or_default() += 1;
    }

    fn edge(&mut self, _: &Vertex, _: &Vertex) {
        self.edges += 1;
    }
}
