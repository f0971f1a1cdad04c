//! Processing-state registry (component A): the authoritative per-file
//! state machine. A thread-safe `path -> FileRecord` map; every mutation
//! passes through here and is serialised per `path`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use meta_core_domain::entities::{FileRecord, ProcessingState};
use meta_core_domain::value_objects::HashId;
use meta_core_domain::CoreError;
use parking_lot::RwLock;

#[derive(Debug, Default, Clone, Copy)]
pub struct StateCounts {
    pub discovered: usize,
    pub light_processing: usize,
    pub hash_processing: usize,
    pub done: usize,
    pub failed: usize,
}

#[derive(Default)]
pub struct StateRegistry {
    records: RwLock<HashMap<PathBuf, FileRecord>>,
}

impl StateRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Idempotent: transitions to `discovered` if the path is unknown or
    /// currently `failed`; a duplicate sighting of an in-flight or done
    /// file is a silent no-op (redelivery tolerance for component H).
    pub fn add_discovered(&self, path: &Path) {
        let mut records = self.records.write();
        match records.get_mut(path) {
            None => {
                records.insert(path.to_path_buf(), FileRecord::discovered(path.to_path_buf()));
            }
            Some(existing) if existing.state == ProcessingState::Failed => {
                let _ = existing.retry();
            }
            Some(_) => {}
        }
    }

    pub fn begin_light(&self, path: &Path) -> Result<(), CoreError> {
        self.mutate(path, FileRecord::begin_light)
    }

    pub fn complete_light(&self, path: &Path, hash_id: HashId) -> Result<(), CoreError> {
        self.mutate(path, |record| record.complete_light(hash_id.clone()))
    }

    pub fn begin_hash(&self, path: &Path) -> Result<(), CoreError> {
        self.mutate(path, FileRecord::begin_hash)
    }

    pub fn complete_hash(&self, path: &Path) -> Result<(), CoreError> {
        self.mutate(path, FileRecord::complete_hash)
    }

    /// Marks a file failed, preserving `reason`. Never returns a state
    /// conflict: a file can be marked failed from any non-terminal state.
    pub fn mark_failed(&self, path: &Path, reason: impl Into<String>) {
        let mut records = self.records.write();
        if let Some(record) = records.get_mut(path) {
            record.mark_failed(reason);
        }
    }

    pub fn retry(&self, path: &Path) -> Result<(), CoreError> {
        self.mutate(path, FileRecord::retry)
    }

    pub fn get(&self, path: &Path) -> Option<FileRecord> {
        self.records.read().get(path).cloned()
    }

    pub fn remove(&self, path: &Path) -> Option<FileRecord> {
        self.records.write().remove(path)
    }

    pub fn counts(&self) -> StateCounts {
        let records = self.records.read();
        let mut counts = StateCounts::default();
        for record in records.values() {
            match record.state {
                ProcessingState::Discovered => counts.discovered += 1,
                ProcessingState::LightProcessing => counts.light_processing += 1,
                ProcessingState::HashProcessing => counts.hash_processing += 1,
                ProcessingState::Done => counts.done += 1,
                ProcessingState::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn in_flight(&self) -> Vec<FileRecord> {
        self.records
            .read()
            .values()
            .filter(|r| !r.is_terminal())
            .cloned()
            .collect()
    }

    pub fn failed(&self) -> Vec<FileRecord> {
        self.records
            .read()
            .values()
            .filter(|r| r.state == ProcessingState::Failed)
            .cloned()
            .collect()
    }

    /// Full snapshot for the status endpoint.
    pub fn snapshot(&self) -> Vec<FileRecord> {
        self.records.read().values().cloned().collect()
    }

    fn mutate(&self, path: &Path, f: impl FnOnce(&mut FileRecord) -> Result<(), CoreError>) -> Result<(), CoreError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(path)
            .ok_or_else(|| CoreError::invalid_transition(format!("no record for path {path:?}")))?;
        f(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_discovered_is_idempotent() {
        let registry = StateRegistry::new();
        let path = Path::new("/watch/a.mkv");
        registry.add_discovered(path);
        registry.add_discovered(path);
        assert_eq!(registry.counts().discovered, 1);
    }

    #[test]
    fn add_discovered_resets_failed_record() {
        let registry = StateRegistry::new();
        let path = Path::new("/watch/a.mkv");
        registry.add_discovered(path);
        registry.mark_failed(path, "boom");
        assert_eq!(registry.get(path).unwrap().state, ProcessingState::Failed);
        registry.add_discovered(path);
        let record = registry.get(path).unwrap();
        assert_eq!(record.state, ProcessingState::Discovered);
        assert_eq!(record.retry_count, 1);
    }

    #[test]
    fn rejects_out_of_order_transition() {
        let registry = StateRegistry::new();
        let path = Path::new("/watch/a.mkv");
        registry.add_discovered(path);
        assert!(registry.begin_hash(path).is_err());
    }

    #[test]
    fn counts_reflect_current_states() {
        let registry = StateRegistry::new();
        registry.add_discovered(Path::new("/a"));
        registry.add_discovered(Path::new("/b"));
        registry.begin_light(Path::new("/a")).unwrap();
        let counts = registry.counts();
        assert_eq!(counts.discovered, 1);
        assert_eq!(counts.light_processing, 1);
    }

    // The spec's per-file state invariant is the regular expression
    // `discovered (lightProcessing hashProcessing (done|failed) | failed)`:
    // every `Action` below either advances a record one step along that
    // path or is rejected outright, and `state` never reports anything the
    // regex wouldn't accept.
    #[derive(Debug, Clone, Copy)]
    enum Action {
        BeginLight,
        CompleteLight,
        BeginHash,
        CompleteHash,
        Fail,
        Retry,
        Rediscover,
    }

    fn action_strategy() -> impl proptest::strategy::Strategy<Value = Action> {
        proptest::prelude::prop_oneof![
            proptest::strategy::Just(Action::BeginLight),
            proptest::strategy::Just(Action::CompleteLight),
            proptest::strategy::Just(Action::BeginHash),
            proptest::strategy::Just(Action::CompleteHash),
            proptest::strategy::Just(Action::Fail),
            proptest::strategy::Just(Action::Retry),
            proptest::strategy::Just(Action::Rediscover),
        ]
    }

    fn apply(registry: &StateRegistry, path: &Path, action: Action) {
        match action {
            Action::BeginLight => {
                let _ = registry.begin_light(path);
            }
            Action::CompleteLight => {
                let _ = registry.complete_light(path, HashId::from_hex("a".repeat(64)).unwrap());
            }
            Action::BeginHash => {
                let _ = registry.begin_hash(path);
            }
            Action::CompleteHash => {
                let _ = registry.complete_hash(path);
            }
            Action::Fail => registry.mark_failed(path, "injected failure"),
            Action::Retry => {
                let _ = registry.retry(path);
            }
            Action::Rediscover => registry.add_discovered(path),
        }
    }

    fn reachable_from(state: ProcessingState, action: Action, hash_known: bool) -> Option<(ProcessingState, bool)> {
        use ProcessingState::*;
        match (state, action) {
            (Discovered, Action::BeginLight) => Some((LightProcessing, hash_known)),
            (LightProcessing, Action::CompleteLight) => Some((LightProcessing, true)),
            (LightProcessing, Action::BeginHash) if hash_known => Some((HashProcessing, hash_known)),
            (HashProcessing, Action::CompleteHash) => Some((Done, hash_known)),
            (Discovered | LightProcessing | HashProcessing, Action::Fail) => Some((Failed, hash_known)),
            (Failed, Action::Retry) => Some((Discovered, false)),
            (Failed, Action::Rediscover) => Some((Discovered, false)),
            _ => None,
        }
    }

    proptest::proptest! {
        #[test]
        fn transitions_always_match_the_state_regex(actions in proptest::collection::vec(action_strategy(), 0..64)) {
            let registry = StateRegistry::new();
            let path = Path::new("/watch/prop.mkv");
            registry.add_discovered(path);

            let mut expected_state = ProcessingState::Discovered;
            let mut hash_known = false;

            for action in actions {
                apply(&registry, path, action);
                if let Some((next_state, next_hash_known)) = reachable_from(expected_state, action, hash_known) {
                    expected_state = next_state;
                    hash_known = next_hash_known;
                }
                let record = registry.get(path).expect("rediscovery never removes the record");
                prop_assert_eq!(record.state, expected_state);
                // The regex never allows `hashProcessing` without a completed
                // `lightProcessing`, i.e. a known hash.
                if record.state == ProcessingState::HashProcessing || record.state == ProcessingState::Done {
                    prop_assert!(record.hash_id.is_some());
                }
            }
        }
    }
}
