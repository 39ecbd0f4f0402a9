//! Service layer for the company points ledger
use crate::error::LedgerError;
use crate::ledger::{Parties, PointTransaction, PointsSummary, TransactionKind};
use crate::notify::{self, Event, Notifier};
use crate::store::Store;
use crate::types::TimeStamp;
use crate::utils;
use std::sync::Arc;

/// The points ledger engine.
///
/// The transaction log is authoritative; the cached per-company summary is
/// maintained in the same store transaction as every append and
/// [`PointsService::reconcile`] is the audit path that proves the two agree.
pub struct PointsService {
    store: Store,
    notifier: Arc<dyn Notifier>,
}

impl PointsService {
    pub fn new(store: Store, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Append one transaction to a company's ledger.
    ///
    /// The row is validated against the current summary (positive values
    /// where the kind is unsigned, a receiver on transfers, no consumption
    /// past the available balance) and the summary row is folded forward in
    /// the same write. Nothing is appended when validation fails.
    pub fn record_transaction(
        &self,
        company_id: &str,
        kind: TransactionKind,
        value: i64,
        parties: Parties,
    ) -> Result<PointTransaction, LedgerError> {
        let txn = PointTransaction {
            id: utils::mint_id("ptx"),
            company_id: company_id.to_owned(),
            kind,
            value,
            sender_employee_id: parties.sender_employee_id,
            receiver_employee_id: parties.receiver_employee_id,
            created_at: TimeStamp::new(),
        };

        self.store.append_point_transaction(&txn)?;

        notify::dispatch(
            self.notifier.as_ref(),
            Event::PointsRecorded {
                transaction_id: txn.id.clone(),
                company_id: txn.company_id.clone(),
                kind,
                value,
            },
        );

        Ok(txn)
    }

    /// The cached summary, lazily created at zero balances the first time a
    /// company is asked about.
    pub fn summary(&self, company_id: &str) -> Result<PointsSummary, LedgerError> {
        Ok(self.store.summary_or_create(company_id)?)
    }

    /// The company's transaction log in chronological order.
    pub fn transactions(&self, company_id: &str) -> Result<Vec<PointTransaction>, LedgerError> {
        Ok(self.store.transactions_for_company(company_id)?)
    }

    /// Rebuild the summary by replaying the company's full transaction log.
    pub fn replay_summary(&self, company_id: &str) -> Result<PointsSummary, LedgerError> {
        let txns = self.transactions(company_id)?;
        PointsSummary::fold(company_id, &txns)
    }

    /// Audit path: compare the cached summary against a full replay. Returns
    /// the agreed summary or fails `SummaryDivergence` with both sides.
    pub fn reconcile(&self, company_id: &str) -> Result<PointsSummary, LedgerError> {
        let cached = self.summary(company_id)?;
        let replayed = self.replay_summary(company_id)?;
        if cached != replayed {
            return Err(LedgerError::SummaryDivergence { cached, replayed });
        }
        Ok(replayed)
    }
}
