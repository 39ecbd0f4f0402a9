//! Available-amount calculation against a periodic limit
use crate::advance::{AdvanceRequest, AdvanceStatus};
use crate::error::LifecycleError;
use crate::types::{Money, PeriodWindow};

/// Compute how much of `limit` the employee may still request.
///
/// Advances count against the limit while Requested, Approved or Paid;
/// cancelled and denied advances never count. Only advances created inside
/// the eligibility window are considered. The result is clamped at zero.
pub fn available_amount(
    limit: Money,
    advances: &[AdvanceRequest],
    window: &PeriodWindow,
) -> Result<Money, LifecycleError> {
    let mut consumed: u128 = 0;
    for adv in advances {
        if !counts_against_limit(adv.status) {
            continue;
        }
        if !window.contains(&adv.timestamps.created_at) {
            continue;
        }
        if adv.requested_amount.currency != limit.currency {
            return Err(LifecycleError::CurrencyMismatch {
                expected: limit.currency,
                got: adv.requested_amount.currency,
            });
        }
        consumed += u128::from(adv.requested_amount.amount);
    }

    let remaining = u128::from(limit.amount).saturating_sub(consumed);
    Ok(Money::new(remaining as u64, limit.currency))
}

fn counts_against_limit(status: AdvanceStatus) -> bool {
    match status {
        AdvanceStatus::Requested | AdvanceStatus::Approved | AdvanceStatus::Paid => true,
        AdvanceStatus::Cancelled | AdvanceStatus::Denied => false,
    }
}
