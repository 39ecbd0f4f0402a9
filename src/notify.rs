//! Post-commit notification contract
use crate::advance::{AdvanceKind, AdvanceStatus};
use crate::ledger::TransactionKind;

/// What the engine tells the outside world about, after the corresponding
/// write has committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    AdvanceTransitioned {
        advance_id: String,
        kind: AdvanceKind,
        /// None on the creation of a new request.
        from: Option<AdvanceStatus>,
        to: AdvanceStatus,
    },
    PointsRecorded {
        transaction_id: String,
        company_id: String,
        kind: TransactionKind,
        value: i64,
    },
}

/// Delivery adapter for [`Event`]s (mail, queue, webhook - not this crate's
/// concern). Implementations must bound their own blocking; the engine
/// treats the call as advisory and will not wait out an unbounded delivery.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &Event) -> anyhow::Result<()>;
}

/// A notifier that drops every event. Useful for tests and for callers that
/// wire delivery up elsewhere.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _event: &Event) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Fire-and-forget dispatch. The write this event describes has already
/// committed, so delivery failures are logged and swallowed, never
/// propagated and never rolled back.
pub(crate) fn dispatch(notifier: &dyn Notifier, event: Event) {
    if let Err(err) = notifier.notify(&event) {
        tracing::warn!(?event, error = %err, "notification dispatch failed");
    }
}
