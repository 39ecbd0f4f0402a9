//! Error taxonomy for the lifecycle engine, points ledger and store
use crate::advance::{ActorRole, AdvanceKind, AdvanceStatus};
use crate::ledger::{PointsSummary, TransactionKind};
use crate::types::{Currency, Money};

#[derive(thiserror::Error, Debug)]
pub enum LifecycleError {
    #[error("no {kind:?} transition from {from:?} to {to:?}")]
    InvalidTransition {
        kind: AdvanceKind,
        from: AdvanceStatus,
        to: AdvanceStatus,
    },
    #[error("{role:?} may not transition {from:?} to {to:?}")]
    Unauthorized {
        role: ActorRole,
        from: AdvanceStatus,
        to: AdvanceStatus,
    },
    #[error("requested {requested} exceeds available {available}")]
    InsufficientAvailableAmount { requested: Money, available: Money },
    #[error("advance {advance_id} already reached {status:?}")]
    AlreadyTransitioned {
        advance_id: String,
        status: AdvanceStatus,
    },
    #[error("advance was modified concurrently, retry the operation")]
    PersistenceConflict,
    #[error("expected amounts in {expected}, got {got}")]
    CurrencyMismatch { expected: Currency, got: Currency },
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => LifecycleError::PersistenceConflict,
            other => LifecycleError::Store(other),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("{kind:?} transaction value must be positive, got {value}")]
    NonPositiveValue { kind: TransactionKind, value: i64 },
    #[error("transfer transactions require a receiving employee")]
    MissingReceiver,
    #[error("consuming {requested} points exceeds available {available}")]
    InsufficientPoints { requested: i64, available: u64 },
    #[error("cached summary diverged from ledger replay: cached {cached:?}, replayed {replayed:?}")]
    SummaryDivergence {
        cached: PointsSummary,
        replayed: PointsSummary,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sled::Error),
    #[error("failed to encode record: {0}")]
    Encode(#[from] minicbor::encode::Error<std::convert::Infallible>),
    #[error("failed to decode record: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("record was modified or created concurrently")]
    Conflict,
}
