//! Deterministic execution trace
//!
//! Append-only, sequence-numbered and hash-chained: every event stores the
//! hash of its predecessor, so any edit to a recorded event is detectable
//! with [`TraceLog::verify_integrity`]. No timestamps; two runs of the same
//! bundle against the same state produce identical traces.

use crate::error::TraceError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

const GENESIS: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Kind of traced event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraceKind {
    /// Bundle accepted for execution
    Bundle,
    /// Gate verdict
    Verdict,
    /// One finding behind a verdict
    Finding,
    /// Steps reordered by an ordering directive
    Reorder,
    /// Step started
    Step,
    /// Descriptive field acted on
    SideEffect,
    /// Mutation applied
    Mutation,
    /// Mutation absorbed (target absent)
    Absorbed,
    /// Execution withheld by the gate
    Blocked,
    /// Execution withheld by dry-run mode
    DryRun,
    /// Execution finished
    Complete,
}

impl TraceKind {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bundle => "BUNDLE",
            Self::Verdict => "VERDICT",
            Self::Finding => "FINDING",
            Self::Reorder => "REORDER",
            Self::Step => "STEP",
            Self::SideEffect => "SIDE_EFFECT",
            Self::Mutation => "MUTATION",
            Self::Absorbed => "ABSORBED",
            Self::Blocked => "BLOCKED",
            Self::DryRun => "DRY_RUN",
            Self::Complete => "COMPLETE",
        }
    }
}

/// One recorded event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// 1-based position
    pub seq: u64,
    /// Event kind
    pub kind: TraceKind,
    /// Human-readable detail
    pub detail: String,
    /// Structured payload (`null` when none)
    pub data: Value,
    /// Hash of the previous event (zeros for the first)
    pub prev_hash: String,
    /// Hash of this event
    pub hash: String,
}

/// Hash-chained event log
#[derive(Debug, Default)]
pub struct TraceLog {
    inner: Mutex<Vec<TraceEvent>>,
}

impl TraceLog {
    /// Create empty log
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and return its sequence number
    pub fn record(&self, kind: TraceKind, detail: impl Into<String>, data: Value) -> u64 {
        let mut guard = self.inner.lock();
        let prev_hash = guard
            .last()
            .map_or_else(|| GENESIS.to_string(), |e| e.hash.clone());

        let mut event = TraceEvent {
            seq: guard.len() as u64 + 1,
            kind,
            detail: detail.into(),
            data,
            prev_hash,
            hash: String::new(),
        };
        event.hash = compute_hash(&event);

        tracing::debug!(
            seq = event.seq,
            kind = kind.as_str(),
            "{}",
            event.detail
        );

        let seq = event.seq;
        guard.push(event);
        seq
    }

    /// Copy of every event
    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.inner.lock().clone()
    }

    /// Number of events
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no events were recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Drop every event
    pub fn reset(&self) {
        self.inner.lock().clear();
    }

    /// Check the hash chain
    pub fn verify_integrity(&self) -> Result<(), TraceError> {
        verify_chain(&self.inner.lock())
    }

    /// `[0001] KIND: detail | data` lines
    #[must_use]
    pub fn format_trace(&self) -> String {
        format_events(&self.inner.lock())
    }
}

/// Check a detached event list
pub fn verify_chain(events: &[TraceEvent]) -> Result<(), TraceError> {
    let mut prev = GENESIS.to_string();
    for (i, e) in events.iter().enumerate() {
        if e.seq != i as u64 + 1 || e.prev_hash != prev || e.hash != compute_hash(e) {
            return Err(TraceError::IntegrityViolation { seq: e.seq });
        }
        prev.clone_from(&e.hash);
    }
    Ok(())
}

/// Render a detached event list
#[must_use]
pub fn format_events(events: &[TraceEvent]) -> String {
    let mut out = String::new();
    for e in events {
        let _ = write!(out, "[{:04}] {}: {}", e.seq, e.kind.as_str(), e.detail);
        if !e.data.is_null() {
            let _ = write!(out, " | {}", e.data);
        }
        out.push('\n');
    }
    out
}

fn compute_hash(event: &TraceEvent) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event.seq.to_le_bytes());
    hasher.update(event.kind.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(event.detail.as_bytes());
    hasher.update([0u8]);
    hasher.update(event.data.to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(event.prev_hash.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> TraceLog {
        let log = TraceLog::new();
        log.record(TraceKind::Bundle, "write /a", Value::Null);
        log.record(TraceKind::Mutation, "upsert filesystem:/a", json!({"effect": "created"}));
        log.record(TraceKind::Complete, "1 step", Value::Null);
        log
    }

    #[test]
    fn chain_verifies() {
        let log = sample();
        assert_eq!(log.len(), 3);
        assert!(log.verify_integrity().is_ok());

        let events = log.events();
        assert_eq!(events[0].prev_hash, GENESIS);
        assert_eq!(events[1].prev_hash, events[0].hash);
    }

    #[test]
    fn tampering_is_detected() {
        let mut events = sample().events();
        events[1].detail = "upsert filesystem:/b".into();
        assert_eq!(
            verify_chain(&events),
            Err(TraceError::IntegrityViolation { seq: 2 })
        );
    }

    #[test]
    fn identical_runs_hash_identically() {
        assert_eq!(sample().events(), sample().events());
    }

    #[test]
    fn format_is_stable() {
        let text = sample().format_trace();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "[0001] BUNDLE: write /a");
        assert_eq!(
            lines[1],
            r#"[0002] MUTATION: upsert filesystem:/a | {"effect":"created"}"#
        );
    }

    #[test]
    fn reset_clears() {
        let log = sample();
        log.reset();
        assert!(log.is_empty());
        log.record(TraceKind::Bundle, "again", Value::Null);
        assert_eq!(log.events()[0].seq, 1);
        assert!(log.verify_integrity().is_ok());
    }
}
