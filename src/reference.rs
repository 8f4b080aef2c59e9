//! Cross-file reference graph.
//!
//! A directed edge A -> B records that A's content names or depends on B. The
//! graph is pure bookkeeping over node identities: it performs no I/O, holds
//! no ownership, and never implies anything about either file's lifetime.

use crate::file::File;
use crate::types::NodeId;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

#[derive(Default)]
struct ReferenceGraph {
    outgoing: HashMap<NodeId, Vec<NodeId>>,
    incoming: HashMap<NodeId, Vec<NodeId>>,
}

/// Authoritative API for reference queries and mutation. `File::references`
/// and `File::referenced_by` are convenience reads over this manager.
pub struct ReferenceManager {
    graph: RwLock<ReferenceGraph>,
}

impl ReferenceManager {
    pub(crate) fn new() -> Self {
        ReferenceManager {
            graph: RwLock::new(ReferenceGraph::default()),
        }
    }

    /// Record `from -> to`. Each edge appears at most once per direction.
    pub fn add_reference(&self, from: &File, to: &File) {
        let mut guard = self.graph.write();
        let graph = &mut *guard;

        let outgoing = graph.outgoing.entry(from.id()).or_default();
        if !outgoing.contains(&to.id()) {
            outgoing.push(to.id());
        }
        let incoming = graph.incoming.entry(to.id()).or_default();
        if !incoming.contains(&from.id()) {
            incoming.push(from.id());
        }
        debug!(from = %from.id(), to = %to.id(), "added reference");
    }

    /// Remove every edge touching `file`, in both directions.
    pub fn clear_references(&self, file: &File) {
        let mut guard = self.graph.write();
        let graph = &mut *guard;
        let id = file.id();

        if let Some(outgoing) = graph.outgoing.remove(&id) {
            for to in outgoing {
                if let Some(incoming) = graph.incoming.get_mut(&to) {
                    incoming.retain(|candidate| *candidate != id);
                }
            }
        }
        if let Some(incoming) = graph.incoming.remove(&id) {
            for from in incoming {
                if let Some(outgoing) = graph.outgoing.get_mut(&from) {
                    outgoing.retain(|candidate| *candidate != id);
                }
            }
        }
        debug!(file = %id, "cleared references");
    }

    /// Files that `file` points at, as a snapshot: later graph mutations do
    /// not retroactively change the returned sequence.
    pub fn get_references(&self, file: &File) -> Vec<File> {
        let ids = self
            .graph
            .read()
            .outgoing
            .get(&file.id())
            .cloned()
            .unwrap_or_default();
        ids.into_iter()
            .map(|id| file.structure().file_handle(id))
            .collect()
    }

    /// Files that point at `file`, as a snapshot.
    pub fn get_referenced_by(&self, file: &File) -> Vec<File> {
        let ids = self
            .graph
            .read()
            .incoming
            .get(&file.id())
            .cloned()
            .unwrap_or_default();
        ids.into_iter()
            .map(|id| file.structure().file_handle(id))
            .collect()
    }
}
