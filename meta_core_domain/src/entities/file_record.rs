//! Per-file state machine.
//!
//! A `FileRecord` is identified by its absolute path until a `hashId` is
//! known, after which the two together identify the same underlying file.
//! State advances monotonically except via `retry`, which resets it to
//! `discovered` and increments `retryCount`. At most one pipeline stage may
//! hold a given path at any moment — callers enforce that by serializing
//! transitions through the processing-state registry (component A), not
//! through this type itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::CoreError;
use crate::value_objects::HashId;

/// `discovered -> lightProcessing -> hashProcessing -> (done | failed)`,
/// with `failed` also reachable directly from `discovered` or
/// `lightProcessing` on stage-level errors.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProcessingState {
    Discovered,
    LightProcessing,
    HashProcessing,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub hash_id: Option<HashId>,
    pub state: ProcessingState,
    pub discovered_at: Option<DateTime<Utc>>,
    pub light_processing_at: Option<DateTime<Utc>>,
    pub hash_processing_at: Option<DateTime<Utc>>,
    pub done_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

impl FileRecord {
    pub fn discovered(path: PathBuf) -> Self {
        Self {
            path,
            hash_id: None,
            state: ProcessingState::Discovered,
            discovered_at: Some(Utc::now()),
            light_processing_at: None,
            hash_processing_at: None,
            done_at: None,
            failed_at: None,
            retry_count: 0,
            last_error: None,
        }
    }

    /// Rejects a transition attempt whose required predecessor state
    /// doesn't match, surfacing it as a soft "state conflict" the caller
    /// should drop rather than propagate as a hard failure.
    fn require_state(&self, expected: ProcessingState, action: &str) -> Result<(), CoreError> {
        if self.state != expected {
            return Err(CoreError::invalid_transition(format!(
                "cannot {action} file at {:?}: expected state {:?}, found {:?}",
                self.path, expected, self.state
            )));
        }
        Ok(())
    }

    pub fn begin_light(&mut self) -> Result<(), CoreError> {
        self.require_state(ProcessingState::Discovered, "begin light processing for")?;
        self.state = ProcessingState::LightProcessing;
        self.light_processing_at = Some(Utc::now());
        Ok(())
    }

    pub fn complete_light(&mut self, hash_id: HashId) -> Result<(), CoreError> {
        if self.state != ProcessingState::LightProcessing {
            return Err(CoreError::invalid_transition(format!(
                "cannot complete light processing for {:?} from state {:?}",
                self.path, self.state
            )));
        }
        self.hash_id = Some(hash_id);
        Ok(())
    }

    pub fn begin_hash(&mut self) -> Result<(), CoreError> {
        self.require_state(ProcessingState::LightProcessing, "begin hash processing for")?;
        if self.hash_id.is_none() {
            return Err(CoreError::invalid_transition(format!(
                "cannot begin hash processing for {:?}: light processing has not completed",
                self.path
            )));
        }
        self.state = ProcessingState::HashProcessing;
        self.hash_processing_at = Some(Utc::now());
        Ok(())
    }

    pub fn complete_hash(&mut self) -> Result<(), CoreError> {
        if self.state != ProcessingState::HashProcessing {
            return Err(CoreError::invalid_transition(format!(
                "cannot complete hash processing for {:?} from state {:?}",
                self.path, self.state
            )));
        }
        self.state = ProcessingState::Done;
        self.done_at = Some(Utc::now());
        Ok(())
    }

    /// Marks the record failed, preserving the reason. Incrementing
    /// `retryCount` happens on the *next* `retry`, not here.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.state = ProcessingState::Failed;
        self.failed_at = Some(Utc::now());
        self.last_error = Some(reason.into());
    }

    /// Resets a failed record to `discovered`, incrementing `retryCount`.
    /// Equivalent to initial admission otherwise.
    pub fn retry(&mut self) -> Result<(), CoreError> {
        if self.state != ProcessingState::Failed {
            return Err(CoreError::invalid_transition(format!(
                "cannot retry {:?} which is not failed (state={:?})",
                self.path, self.state
            )));
        }
        self.state = ProcessingState::Discovered;
        self.discovered_at = Some(Utc::now());
        self.light_processing_at = None;
        self.hash_processing_at = None;
        self.done_at = None;
        self.failed_at = None;
        self.retry_count += 1;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, ProcessingState::Done | ProcessingState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_sequence() {
        let mut rec = FileRecord::discovered(PathBuf::from("/watch/a.mkv"));
        assert_eq!(rec.state, ProcessingState::Discovered);

        rec.begin_light().unwrap();
        assert_eq!(rec.state, ProcessingState::LightProcessing);

        let hash = HashId::from_hex("a".repeat(64)).unwrap();
        rec.complete_light(hash.clone()).unwrap();
        assert_eq!(rec.hash_id, Some(hash));

        rec.begin_hash().unwrap();
        assert_eq!(rec.state, ProcessingState::HashProcessing);

        rec.complete_hash().unwrap();
        assert_eq!(rec.state, ProcessingState::Done);
        assert!(rec.is_terminal());
    }

    #[test]
    fn retry_resets_and_counts() {
        let mut rec = FileRecord::discovered(PathBuf::from("/watch/a.mkv"));
        rec.mark_failed("fast stage: timeout");
        assert_eq!(rec.state, ProcessingState::Failed);

        rec.retry().unwrap();
        assert_eq!(rec.state, ProcessingState::Discovered);
        assert_eq!(rec.retry_count, 1);
        assert_eq!(rec.last_error.as_deref(), Some("fast stage: timeout"));
    }

    #[test]
    fn rejects_begin_hash_before_light_completes() {
        let mut rec = FileRecord::discovered(PathBuf::from("/watch/a.mkv"));
        rec.begin_light().unwrap();
        assert!(rec.begin_hash().is_err());
    }

    #[test]
    fn rejects_out_of_order_advance() {
        let mut rec = FileRecord::discovered(PathBuf::from("/watch/a.mkv"));
        rec.begin_light().unwrap();
        rec.complete_light(HashId::from_hex("b".repeat(64)).unwrap()).unwrap();
        rec.begin_hash().unwrap();
        // Already past light processing - completing it again is a conflict.
        assert!(rec.complete_light(HashId::from_hex("c".repeat(64)).unwrap()).is_err());
    }
}
