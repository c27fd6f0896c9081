//! `InMemoryStreamSource` — the concrete `StreamSource` this reference
//! implementation ships (spec §4.6).
//!
//! Grounded on `dags.core.streams.DataBlockStream`: it enumerates one
//! upstream node's logged OUTPUT blocks in creation order and applies the
//! same filter chain the spec describes. `pipeflow-exec`'s
//! `NodeInterfaceManager` is generic over `StreamSource`, not this type —
//! this is only the implementation that backs `InMemoryLogStore::
//! stream_for_node` and the test suite in `pipeflow-exec`.

use pipeflow_core::block::{BlockId, DataBlock};
use pipeflow_core::collaborator::StreamSource;

use crate::log_store::SharedLogState;

/// A candidate list plus the filters applied so far. Cloning the candidate
/// `Vec<DataBlock>` on every filter call keeps this simple and matches the
/// source's `DataBlockStream`, which rebuilds its query on each `.filter*`
/// call rather than mutating a cursor in place.
pub struct InMemoryStreamSource {
    node_key: String,
    candidates: Vec<DataBlock>,
    state: SharedLogState,
}

impl InMemoryStreamSource {
    pub fn new(node_key: String, candidates: Vec<DataBlock>, state: SharedLogState) -> Self {
        Self {
            node_key,
            candidates,
            state,
        }
    }

    fn is_logged_input(&self, block_id: BlockId, node_key: &str) -> bool {
        let state = self.state.lock().expect("in-memory log store mutex poisoned");
        state.logged_inputs.contains(&(node_key.to_string(), block_id))
    }
}

impl StreamSource for InMemoryStreamSource {
    fn filter_storages(self: Box<Self>, _storages: &[String]) -> Box<dyn StreamSource> {
        // This reference implementation keeps one shared records table per
        // `InMemoryStorage` family (see `storage.rs`); a block logged as a
        // node's output is always reachable from any storage the context
        // knows about, so there is nothing to filter out here. A real
        // storage-engine-backed `LogStore` would narrow `candidates` to
        // only blocks with an SDB on one of `storages`.
        self
    }

    fn filter_unprocessed(self: Box<Self>, node_key: &str, allow_cycle: bool) -> Box<dyn StreamSource> {
        let is_cycle = self.node_key == node_key;
        let state = self.state.clone();
        let candidates = self
            .candidates
            .into_iter()
            .filter(|b| {
                if is_cycle && !allow_cycle {
                    return false;
                }
                let logged = state
                    .lock()
                    .expect("in-memory log store mutex poisoned")
                    .logged_inputs
                    .contains(&(node_key.to_string(), b.id));
                !logged
            })
            .collect();
        Box::new(InMemoryStreamSource {
            node_key: self.node_key,
            candidates,
            state: self.state,
        })
    }

    fn filter_dataset(self: Box<Self>) -> Box<dyn StreamSource> {
        // Every candidate here is already an upstream node's OUTPUT block;
        // a `DataSet` slot just needs the most recent one, so there is
        // nothing additional to filter — `most_recent` does the real work.
        self
    }

    fn next(&self) -> Option<DataBlock> {
        self.candidates
            .iter()
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned()
    }

    fn most_recent(&self) -> Option<DataBlock> {
        self.candidates
            .iter()
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned()
    }

    fn is_unprocessed(&self, block_id: BlockId, node_key: &str) -> bool {
        !self.is_logged_input(block_id, node_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use pipeflow_core::schema::SchemaRef;
    use std::sync::{Arc, Mutex};

    fn block_at(offset_secs: i64) -> DataBlock {
        DataBlock::new(SchemaRef::Any, SchemaRef::Any, Utc::now() + Duration::seconds(offset_secs))
    }

    #[test]
    fn next_picks_oldest_most_recent_picks_newest() {
        let state: SharedLogState = Arc::new(Mutex::new(Default::default()));
        let old = block_at(0);
        let mid = block_at(10);
        let new = block_at(20);
        let stream = InMemoryStreamSource::new(
            "src".to_string(),
            vec![new.clone(), old.clone(), mid.clone()],
            state,
        );
        assert_eq!(stream.next(), Some(old));
        assert_eq!(stream.most_recent(), Some(new));
    }

    #[test]
    fn filter_unprocessed_excludes_logged_blocks() {
        let state: SharedLogState = Arc::new(Mutex::new(Default::default()));
        let b1 = block_at(0);
        let b2 = block_at(10);
        {
            let mut s = state.lock().unwrap();
            s.logged_inputs.insert(("sink".to_string(), b1.id));
        }
        let stream: Box<dyn StreamSource> = Box::new(InMemoryStreamSource::new(
            "src".to_string(),
            vec![b1.clone(), b2.clone()],
            state,
        ));
        let filtered = stream.filter_unprocessed("sink", false);
        assert_eq!(filtered.next(), Some(b2));
    }

    #[test]
    fn self_ref_cycle_only_allowed_when_permitted() {
        let state: SharedLogState = Arc::new(Mutex::new(Default::default()));
        let b1 = block_at(0);
        let disallowed = InMemoryStreamSource::new("acc".to_string(), vec![b1.clone()], state.clone())
            .filter_unprocessed("acc", false);
        assert_eq!(disallowed.next(), None);

        let allowed = InMemoryStreamSource::new("acc".to_string(), vec![b1.clone()], state)
            .filter_unprocessed("acc", true);
        assert_eq!(allowed.next(), Some(b1));
    }
}
