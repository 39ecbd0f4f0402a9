//! Append-only points ledger types and the materialized company summary
use crate::error::LedgerError;
use crate::types::TimeStamp;
use chrono::Utc;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    /// Points granted to fund the company pool (service rewards etc).
    #[n(0)]
    Reward,
    /// Points redeemed by employees.
    #[n(1)]
    Consumption,
    /// Signed administrative correction.
    #[n(2)]
    Modification,
    /// Points assigned to a specific employee out of the pool.
    #[n(3)]
    Transfer,
}

/// Optional sender/receiver employees on a transaction. Transfers must name
/// a receiver; everything else may leave both empty.
#[derive(Debug, Clone, Default)]
pub struct Parties {
    pub sender_employee_id: Option<String>,
    pub receiver_employee_id: Option<String>,
}

impl Parties {
    pub fn none() -> Self {
        Self::default()
    }
    pub fn to_employee(receiver: &str) -> Self {
        Self {
            sender_employee_id: None,
            receiver_employee_id: Some(receiver.to_owned()),
        }
    }
}

/// One immutable row of the ledger. Rows are only ever appended.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct PointTransaction {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub company_id: String,
    #[n(2)]
    pub kind: TransactionKind,
    #[n(3)]
    pub value: i64,
    #[n(4)]
    pub sender_employee_id: Option<String>,
    #[n(5)]
    pub receiver_employee_id: Option<String>,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
}

/// The cached per-company totals. Maintained in the same transaction as
/// every ledger append; [`PointsSummary::fold`] over the full log must
/// always reproduce it.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct PointsSummary {
    #[n(0)]
    pub company_id: String,
    /// Total points assigned into circulation (rewards and transfers).
    #[n(1)]
    pub assigned: u64,
    /// Total points redeemed.
    #[n(2)]
    pub consumed: u64,
    /// Net signed administrative corrections.
    #[n(3)]
    pub adjustment: i64,
}

impl PointsSummary {
    pub fn empty(company_id: &str) -> Self {
        Self {
            company_id: company_id.to_owned(),
            assigned: 0,
            consumed: 0,
            adjustment: 0,
        }
    }

    /// Points the company can still spend: assigned minus consumed plus the
    /// net correction, clamped at zero. [`PointsSummary::apply`] never lets
    /// the true balance go below zero, the clamp only guards the arithmetic.
    pub fn available(&self) -> u64 {
        let balance = self.assigned as i128 - self.consumed as i128 + self.adjustment as i128;
        balance.clamp(0, u64::MAX as i128) as u64
    }

    /// Validate `txn` against this summary and fold it in.
    ///
    /// On error the summary is left untouched and the transaction must not
    /// be appended to the ledger.
    pub fn apply(&mut self, txn: &PointTransaction) -> Result<(), LedgerError> {
        match txn.kind {
            TransactionKind::Reward | TransactionKind::Transfer => {
                if txn.value <= 0 {
                    return Err(LedgerError::NonPositiveValue {
                        kind: txn.kind,
                        value: txn.value,
                    });
                }
                if txn.kind == TransactionKind::Transfer && txn.receiver_employee_id.is_none() {
                    return Err(LedgerError::MissingReceiver);
                }
                self.assigned = self.assigned.saturating_add(txn.value as u64);
            }
            TransactionKind::Consumption => {
                if txn.value <= 0 {
                    return Err(LedgerError::NonPositiveValue {
                        kind: txn.kind,
                        value: txn.value,
                    });
                }
                if txn.value as u64 > self.available() {
                    return Err(LedgerError::InsufficientPoints {
                        requested: txn.value,
                        available: self.available(),
                    });
                }
                self.consumed = self.consumed.saturating_add(txn.value as u64);
            }
            TransactionKind::Modification => {
                let balance =
                    self.assigned as i128 - self.consumed as i128 + self.adjustment as i128;
                if balance + (txn.value as i128) < 0 {
                    return Err(LedgerError::InsufficientPoints {
                        requested: txn.value,
                        available: self.available(),
                    });
                }
                self.adjustment = self.adjustment.saturating_add(txn.value);
            }
        }
        Ok(())
    }

    /// Rebuild the summary from scratch by replaying the full log. This is
    /// the audit path; it must agree with the incrementally maintained row.
    pub fn fold<'a>(
        company_id: &str,
        txns: impl IntoIterator<Item = &'a PointTransaction>,
    ) -> Result<Self, LedgerError> {
        let mut summary = Self::empty(company_id);
        for txn in txns {
            summary.apply(txn)?;
        }
        Ok(summary)
    }
}
