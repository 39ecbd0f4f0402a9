//! Persistence gateway over sled: CBOR records, compare-and-swap updates
//! and transactional ledger appends
use crate::advance::{AdvanceRequest, Employee};
use crate::error::{LedgerError, StoreError};
use crate::ledger::{PointTransaction, PointsSummary};
use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::sync::Arc;

const ADVANCES_TREE: &str = "advances";
const EMPLOYEES_TREE: &str = "employees";
const POINT_TXNS_TREE: &str = "point_txns";
const COMPANY_POINTS_TREE: &str = "company_points";

/// All durable state behind the engine. One sled db, four trees.
///
/// Aggregate updates go through compare-and-swap on the previously read
/// bytes, so a raced writer surfaces as [`StoreError::Conflict`] instead of
/// a lost update. Ledger appends and the cached summary are written in one
/// serializable sled transaction.
pub struct Store {
    advances: sled::Tree,
    employees: sled::Tree,
    point_txns: sled::Tree,
    company_points: sled::Tree,
}

impl Store {
    pub fn open(db: &Arc<sled::Db>) -> Result<Self, StoreError> {
        Ok(Self {
            advances: db.open_tree(ADVANCES_TREE)?,
            employees: db.open_tree(EMPLOYEES_TREE)?,
            point_txns: db.open_tree(POINT_TXNS_TREE)?,
            company_points: db.open_tree(COMPANY_POINTS_TREE)?,
        })
    }

    pub fn put_employee(&self, employee: &Employee) -> Result<(), StoreError> {
        let bytes = minicbor::to_vec(employee)?;
        self.employees.insert(employee.id.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn get_employee(&self, employee_id: &str) -> Result<Employee, StoreError> {
        let Some(bytes) = self.employees.get(employee_id.as_bytes())? else {
            return Err(StoreError::NotFound(employee_id.to_owned()));
        };
        Ok(minicbor::decode(&bytes)?)
    }

    /// Insert a fresh aggregate, guarded against a raced duplicate create on
    /// the same id.
    pub fn create_advance(&self, advance: &AdvanceRequest) -> Result<(), StoreError> {
        let bytes = minicbor::to_vec(advance)?;
        self.advances
            .compare_and_swap(advance.id.as_bytes(), None as Option<&[u8]>, Some(bytes))?
            .map_err(|_| StoreError::Conflict)
    }

    /// Load an aggregate together with the raw bytes it was read from; the
    /// bytes are the token for the follow-up [`Store::update_advance`].
    pub fn load_advance(
        &self,
        advance_id: &str,
    ) -> Result<(AdvanceRequest, sled::IVec), StoreError> {
        let Some(bytes) = self.advances.get(advance_id.as_bytes())? else {
            return Err(StoreError::NotFound(advance_id.to_owned()));
        };
        let advance = minicbor::decode(&bytes)?;
        Ok((advance, bytes))
    }

    /// Write back a mutated aggregate, conditional on the stored bytes still
    /// being the ones it was loaded from.
    pub fn update_advance(
        &self,
        read_bytes: &sled::IVec,
        advance: &AdvanceRequest,
    ) -> Result<(), StoreError> {
        let bytes = minicbor::to_vec(advance)?;
        self.advances
            .compare_and_swap(advance.id.as_bytes(), Some(read_bytes), Some(bytes))?
            .map_err(|_| StoreError::Conflict)
    }

    /// Every advance belonging to `employee_id`, in key order.
    pub fn advances_for_employee(
        &self,
        employee_id: &str,
    ) -> Result<Vec<AdvanceRequest>, StoreError> {
        let mut out = Vec::new();
        for entry in self.advances.iter() {
            let (_, bytes) = entry?;
            let advance: AdvanceRequest = minicbor::decode(&bytes)?;
            if advance.employee_id == employee_id {
                out.push(advance);
            }
        }
        Ok(out)
    }

    /// Append a ledger row and fold it into the cached company summary in
    /// one transaction. The transaction validates against the summary row
    /// (lazily created at zero) and aborts without writing anything when the
    /// ledger rules reject the row.
    pub fn append_point_transaction(
        &self,
        txn: &PointTransaction,
    ) -> Result<PointsSummary, LedgerError> {
        let key = transaction_key(txn);
        let txn_bytes = minicbor::to_vec(txn).map_err(StoreError::Encode)?;

        let result = (&self.point_txns, &self.company_points).transaction(|(txns, points)| {
            let mut summary = match points.get(txn.company_id.as_bytes())? {
                Some(bytes) => minicbor::decode(&bytes)
                    .map_err(|e| abort(StoreError::Decode(e).into()))?,
                None => PointsSummary::empty(&txn.company_id),
            };
            summary.apply(txn).map_err(abort)?;

            let summary_bytes = minicbor::to_vec(&summary)
                .map_err(|e| abort(StoreError::Encode(e).into()))?;
            txns.insert(key.as_bytes(), txn_bytes.clone())?;
            points.insert(txn.company_id.as_bytes(), summary_bytes)?;

            Ok(summary)
        });

        match result {
            Ok(summary) => Ok(summary),
            Err(TransactionError::Abort(err)) => Err(err),
            Err(TransactionError::Storage(err)) => Err(StoreError::Db(err).into()),
        }
    }

    /// The cached summary row, created at zero balances the first time a
    /// company is seen. The create is an idempotent compare-and-swap from
    /// absent; losing the race to another creator is fine, the winner's row
    /// is re-read.
    pub fn summary_or_create(&self, company_id: &str) -> Result<PointsSummary, StoreError> {
        if let Some(bytes) = self.company_points.get(company_id.as_bytes())? {
            return Ok(minicbor::decode(&bytes)?);
        }

        let empty = PointsSummary::empty(company_id);
        let bytes = minicbor::to_vec(&empty)?;
        match self
            .company_points
            .compare_and_swap(company_id.as_bytes(), None as Option<&[u8]>, Some(bytes))?
        {
            Ok(()) => Ok(empty),
            Err(_) => {
                let bytes = self
                    .company_points
                    .get(company_id.as_bytes())?
                    .ok_or(StoreError::Conflict)?;
                Ok(minicbor::decode(&bytes)?)
            }
        }
    }

    /// The company's full transaction log in chronological order.
    pub fn transactions_for_company(
        &self,
        company_id: &str,
    ) -> Result<Vec<PointTransaction>, StoreError> {
        let prefix = format!("{company_id}/");
        let mut out = Vec::new();
        for entry in self.point_txns.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = entry?;
            out.push(minicbor::decode(&bytes)?);
        }
        Ok(out)
    }
}

fn abort(err: LedgerError) -> ConflictableTransactionError<LedgerError> {
    ConflictableTransactionError::Abort(err)
}

// Zero-padded nanoseconds keep a company's rows in chronological key order
// under scan_prefix; the id suffix breaks timestamp ties.
fn transaction_key(txn: &PointTransaction) -> String {
    let nanos = txn
        .created_at
        .to_datetime_utc()
        .timestamp_nanos_opt()
        .unwrap_or(0);
    format!("{}/{:020}/{}", txn.company_id, nanos, txn.id)
}
