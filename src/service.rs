//! Service layer for the advance lifecycle workflow
use crate::advance::{Actor, AdvanceHistory, AdvanceKind, AdvanceRequest, AdvanceStatus, Employee};
use crate::calculator;
use crate::error::LifecycleError;
use crate::notify::{self, Event, Notifier};
use crate::store::Store;
use crate::types::{Money, PeriodWindow, TimeStamp};
use crate::utils;
use std::sync::{Arc, Mutex};

/// The advance lifecycle engine.
///
/// All writes happen under the service's write lock and land through the
/// store's compare-and-swap, so two raced transitions on the same advance
/// serialize: the loser sees the post-transition state and fails with a
/// typed error instead of corrupting it. Notifications are dispatched only
/// after the write has committed and never affect the outcome.
pub struct AdvanceService {
    store: Store,
    notifier: Arc<dyn Notifier>,
    // serializes the availability check in create_request against other
    // writers; sled transactions cannot scan a tree, so the scan+insert
    // pair is guarded here instead
    write_lock: Mutex<()>,
}

impl AdvanceService {
    pub fn new(store: Store, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            write_lock: Mutex::new(()),
        }
    }

    /// Seed or refresh the employee master data the engine reads (owning
    /// company and periodic limit).
    pub fn register_employee(&self, employee: &Employee) -> Result<(), LifecycleError> {
        self.store.put_employee(employee)?;
        Ok(())
    }

    /// Create a new advance in Requested status.
    ///
    /// This is the degenerate "from none" edge of the workflow: instead of a
    /// table lookup it runs the availability check, and fails
    /// `InsufficientAvailableAmount` when `amount` exceeds what is left of
    /// the employee's limit for the window.
    pub fn create_request(
        &self,
        kind: AdvanceKind,
        employee_id: &str,
        amount: Money,
        window: &PeriodWindow,
    ) -> Result<AdvanceRequest, LifecycleError> {
        let guard = self.write_lock.lock().expect("write lock poisoned");

        let employee = self.store.get_employee(employee_id)?;
        if amount.currency != employee.advance_limit.currency {
            return Err(LifecycleError::CurrencyMismatch {
                expected: employee.advance_limit.currency,
                got: amount.currency,
            });
        }

        let open = self.store.advances_for_employee(employee_id)?;
        let available = calculator::available_amount(employee.advance_limit, &open, window)?;
        if amount.amount > available.amount {
            return Err(LifecycleError::InsufficientAvailableAmount {
                requested: amount,
                available,
            });
        }

        let advance = AdvanceRequest::new(
            utils::mint_id("adv"),
            kind,
            employee.id.clone(),
            employee.company_id.clone(),
            amount,
            TimeStamp::new(),
        );
        self.store.create_advance(&advance)?;
        drop(guard);

        notify::dispatch(
            self.notifier.as_ref(),
            Event::AdvanceTransitioned {
                advance_id: advance.id.clone(),
                kind,
                from: None,
                to: AdvanceStatus::Requested,
            },
        );

        Ok(advance)
    }

    /// Apply `target` to an existing advance on behalf of `actor`.
    ///
    /// The aggregate is loaded fresh under the write lock, validated against
    /// the transition table and written back conditionally on the bytes it
    /// was read from; a conflicting writer surfaces as
    /// `PersistenceConflict`, a duplicate invocation as
    /// `AlreadyTransitioned`.
    pub fn transition(
        &self,
        advance_id: &str,
        target: AdvanceStatus,
        actor: &Actor,
    ) -> Result<AdvanceRequest, LifecycleError> {
        let guard = self.write_lock.lock().expect("write lock poisoned");

        let (mut advance, read_bytes) = self.store.load_advance(advance_id)?;
        let from = advance.status;
        advance.apply_transition(target, actor, TimeStamp::new())?;
        self.store.update_advance(&read_bytes, &advance)?;
        drop(guard);

        notify::dispatch(
            self.notifier.as_ref(),
            Event::AdvanceTransitioned {
                advance_id: advance.id.clone(),
                kind: advance.kind,
                from: Some(from),
                to: target,
            },
        );

        Ok(advance)
    }

    /// Load an advance as currently stored.
    pub fn advance(&self, advance_id: &str) -> Result<AdvanceRequest, LifecycleError> {
        let (advance, _) = self.store.load_advance(advance_id)?;
        Ok(advance)
    }

    /// The ordered audit trail of an advance.
    pub fn history(&self, advance_id: &str) -> Result<Vec<AdvanceHistory>, LifecycleError> {
        Ok(self.advance(advance_id)?.history)
    }

    /// How much the employee may still request inside `window`.
    pub fn available_amount(
        &self,
        employee_id: &str,
        window: &PeriodWindow,
    ) -> Result<Money, LifecycleError> {
        let employee = self.store.get_employee(employee_id)?;
        let open = self.store.advances_for_employee(employee_id)?;
        calculator::available_amount(employee.advance_limit, &open, window)
    }
}
