//! Legal status transitions and the actor roles allowed to trigger them
use crate::advance::{ActorRole, AdvanceKind, AdvanceStatus};

const ADMIN_ONLY: &[ActorRole] = &[ActorRole::Admin];
// cancellation is the one edge the owning employee may trigger; an admin may
// also cancel on the employee's behalf
const OWNER_OR_ADMIN: &[ActorRole] = &[ActorRole::Employee, ActorRole::Admin];

/// Look up the edge `(from -> to)` for the given advance kind.
///
/// Returns the roles allowed to trigger the edge, or None when the edge does
/// not exist. Payroll and premium advances share one rule set; the kind stays
/// in the signature so a future divergence has to be made explicit here.
pub fn permitted_roles(
    kind: AdvanceKind,
    from: AdvanceStatus,
    to: AdvanceStatus,
) -> Option<&'static [ActorRole]> {
    use AdvanceStatus::*;

    match kind {
        AdvanceKind::Payroll | AdvanceKind::Premium => match from {
            Requested => match to {
                Approved | Denied => Some(ADMIN_ONLY),
                Cancelled => Some(OWNER_OR_ADMIN),
                Requested | Paid => None,
            },
            Approved => match to {
                Paid | Denied => Some(ADMIN_ONLY),
                Requested | Approved | Cancelled => None,
            },
            // terminal: nothing leaves these states
            Paid | Cancelled | Denied => None,
        },
    }
}
