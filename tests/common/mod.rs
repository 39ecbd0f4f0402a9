//! Shared wiring for the integration suites
#![allow(dead_code)] // each suite uses its own subset of these helpers

use advance_approval::advance::Employee;
use advance_approval::notify::{Event, Notifier};
use advance_approval::points::PointsService;
use advance_approval::service::AdvanceService;
use advance_approval::store::Store;
use advance_approval::types::{Currency, Money, PeriodWindow, TimeStamp};
use advance_approval::utils;
use std::sync::{Arc, Mutex};

/// Notifier that remembers every event it was handed.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<Event>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: &Event) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Notifier that always fails delivery. Transitions must still succeed.
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _event: &Event) -> anyhow::Result<()> {
        anyhow::bail!("notification channel is down")
    }
}

pub fn services(
    db: &Arc<sled::Db>,
    notifier: Arc<dyn Notifier>,
) -> anyhow::Result<(AdvanceService, PointsService)> {
    let advances = AdvanceService::new(Store::open(db)?, notifier.clone());
    let points = PointsService::new(Store::open(db)?, notifier);
    Ok((advances, points))
}

/// Register an employee with the given limit, returning its minted id.
pub fn seed_employee(service: &AdvanceService, limit: u64) -> anyhow::Result<String> {
    let employee = Employee {
        id: utils::new_uuid_to_bech32("emp")?,
        company_id: utils::new_uuid_to_bech32("co")?,
        advance_limit: Money::new(limit, Currency::USD),
    };
    service.register_employee(&employee)?;
    Ok(employee.id)
}

/// A window comfortably containing "now" for tests that create advances at
/// the current time.
pub fn current_window() -> PeriodWindow {
    PeriodWindow::new(
        TimeStamp::new_with(2020, 1, 1, 0, 0, 0),
        TimeStamp::new_with(2040, 1, 1, 0, 0, 0),
    )
}

pub fn usd(amount: u64) -> Money {
    Money::new(amount, Currency::USD)
}
