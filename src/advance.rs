//! Advance aggregate: statuses, actors, timestamps and the owned history chain
use crate::error::LifecycleError;
use crate::transition;
use crate::types::{Money, TimeStamp};
use chrono::Utc;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceKind {
    /// Early disbursement of earned wages.
    #[n(0)]
    Payroll,
    /// Early disbursement of a prorated bonus.
    #[n(1)]
    Premium,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdvanceStatus {
    #[n(0)]
    Requested,
    #[n(1)]
    Approved,
    #[n(2)]
    Paid,
    #[n(3)]
    Cancelled,
    #[n(4)]
    Denied,
}

impl AdvanceStatus {
    pub fn describe(&self) -> &'static str {
        match self {
            AdvanceStatus::Requested => "awaiting review",
            AdvanceStatus::Approved => "approved, awaiting payment",
            AdvanceStatus::Paid => "paid out",
            AdvanceStatus::Cancelled => "cancelled by the employee",
            AdvanceStatus::Denied => "denied by an administrator",
        }
    }
    pub fn is_terminal(&self) -> bool {
        match self {
            AdvanceStatus::Requested | AdvanceStatus::Approved => false,
            AdvanceStatus::Paid | AdvanceStatus::Cancelled | AdvanceStatus::Denied => true,
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    #[n(0)]
    Employee,
    #[n(1)]
    Admin,
}

/// The principal attempting a transition. Employee actors carry their own id
/// so ownership of the advance can be checked; admin actors optionally carry
/// a user id for the audit trail.
#[derive(Debug, Clone)]
pub enum Actor {
    Employee { employee_id: String },
    Admin { user_id: Option<String> },
}

impl Actor {
    pub fn role(&self) -> ActorRole {
        match self {
            Actor::Employee { .. } => ActorRole::Employee,
            Actor::Admin { .. } => ActorRole::Admin,
        }
    }
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Actor::Employee { employee_id } => Some(employee_id),
            Actor::Admin { user_id } => user_id.as_deref(),
        }
    }
}

/// Per-status timestamps, each written exactly once the first time the
/// status is reached and never reset.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct StatusTimestamps {
    #[n(0)]
    pub created_at: TimeStamp<Utc>,
    #[n(1)]
    pub approved_at: Option<TimeStamp<Utc>>,
    #[n(2)]
    pub paid_at: Option<TimeStamp<Utc>>,
    #[n(3)]
    pub cancelled_at: Option<TimeStamp<Utc>>,
    #[n(4)]
    pub denied_at: Option<TimeStamp<Utc>>,
}

impl StatusTimestamps {
    fn new(created_at: TimeStamp<Utc>) -> Self {
        Self {
            created_at,
            approved_at: None,
            paid_at: None,
            cancelled_at: None,
            denied_at: None,
        }
    }

    /// Whether the advance has ever reached `status`.
    fn reached(&self, status: AdvanceStatus) -> bool {
        match status {
            // created_at is written at construction
            AdvanceStatus::Requested => true,
            AdvanceStatus::Approved => self.approved_at.is_some(),
            AdvanceStatus::Paid => self.paid_at.is_some(),
            AdvanceStatus::Cancelled => self.cancelled_at.is_some(),
            AdvanceStatus::Denied => self.denied_at.is_some(),
        }
    }

    /// Write the timestamp for `status` if it has never been written.
    /// Returns false when the slot is already taken, which means the
    /// transition was applied before.
    fn stamp_once(&mut self, status: AdvanceStatus, at: TimeStamp<Utc>) -> bool {
        let slot = match status {
            AdvanceStatus::Requested => return false,
            AdvanceStatus::Approved => &mut self.approved_at,
            AdvanceStatus::Paid => &mut self.paid_at,
            AdvanceStatus::Cancelled => &mut self.cancelled_at,
            AdvanceStatus::Denied => &mut self.denied_at,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(at);
        true
    }
}

/// One row of the audit trail. Rows are appended on every successful
/// transition and never mutated; `from` is None only on the creation row.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct AdvanceHistory {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub advance_id: String,
    #[n(2)]
    pub actor: ActorRole,
    #[n(3)]
    pub actor_user_id: Option<String>,
    #[n(4)]
    pub from: Option<AdvanceStatus>,
    #[n(5)]
    pub to: AdvanceStatus,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct AdvanceRequest {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub kind: AdvanceKind,
    #[n(2)]
    pub employee_id: String,
    #[n(3)]
    pub company_id: String,
    #[n(4)]
    pub requested_amount: Money,
    #[n(5)]
    pub status: AdvanceStatus,
    #[n(6)]
    pub timestamps: StatusTimestamps,
    #[n(7)]
    pub history: Vec<AdvanceHistory>,
    #[n(8)]
    pub version: u64,
}

/// The slice of employee master data the engine needs: the owning company
/// and the periodic advance limit. Registered by the surrounding
/// application.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Employee {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub company_id: String,
    #[n(2)]
    pub advance_limit: Money,
}

impl AdvanceRequest {
    /// Create a fresh advance in Requested status, with the creation row
    /// already on the history chain.
    pub fn new(
        id: String,
        kind: AdvanceKind,
        employee_id: String,
        company_id: String,
        requested_amount: Money,
        created_at: TimeStamp<Utc>,
    ) -> Self {
        let creation = AdvanceHistory {
            // history ids are the advance id plus a sequence number, which
            // keeps rows ordered even when timestamps collide
            id: format!("{id}/0"),
            advance_id: id.clone(),
            actor: ActorRole::Employee,
            actor_user_id: Some(employee_id.clone()),
            from: None,
            to: AdvanceStatus::Requested,
            created_at: created_at.clone(),
        };
        Self {
            id,
            kind,
            employee_id,
            company_id,
            requested_amount,
            status: AdvanceStatus::Requested,
            timestamps: StatusTimestamps::new(created_at),
            history: vec![creation],
            version: 1,
        }
    }

    /// Validate and apply a transition to `to` on behalf of `actor`.
    ///
    /// A target the advance has already reached fails `AlreadyTransitioned`
    /// before anything else, so client retries and concurrency collisions
    /// surface distinctly from edges that never existed. On success the
    /// status, the matching timestamp, the history chain and the version are
    /// all updated; on any error the aggregate is left untouched.
    pub fn apply_transition(
        &mut self,
        to: AdvanceStatus,
        actor: &Actor,
        at: TimeStamp<Utc>,
    ) -> Result<(), LifecycleError> {
        let from = self.status;
        if self.timestamps.reached(to) {
            return Err(LifecycleError::AlreadyTransitioned {
                advance_id: self.id.clone(),
                status: to,
            });
        }
        let Some(roles) = transition::permitted_roles(self.kind, from, to) else {
            return Err(LifecycleError::InvalidTransition {
                kind: self.kind,
                from,
                to,
            });
        };
        if !roles.contains(&actor.role()) {
            return Err(LifecycleError::Unauthorized {
                role: actor.role(),
                from,
                to,
            });
        }
        // employees may only act on their own advances
        if let Actor::Employee { employee_id } = actor
            && *employee_id != self.employee_id
        {
            return Err(LifecycleError::Unauthorized {
                role: ActorRole::Employee,
                from,
                to,
            });
        }
        if !self.timestamps.stamp_once(to, at.clone()) {
            return Err(LifecycleError::AlreadyTransitioned {
                advance_id: self.id.clone(),
                status: to,
            });
        }

        self.history.push(AdvanceHistory {
            id: format!("{}/{}", self.id, self.history.len()),
            advance_id: self.id.clone(),
            actor: actor.role(),
            actor_user_id: actor.user_id().map(str::to_owned),
            from: Some(from),
            to,
            created_at: at,
        });
        self.status = to;
        self.version += 1;

        Ok(())
    }
}

/// Replay an ordered history chain from the initial creation row.
///
/// Returns the final status when the chain is well formed (starts with the
/// creation row, every row's `from` equals the previous row's `to`), or
/// None when the chain is broken.
pub fn replay_history(history: &[AdvanceHistory]) -> Option<AdvanceStatus> {
    let (first, rest) = history.split_first()?;
    if first.from.is_some() || first.to != AdvanceStatus::Requested {
        return None;
    }

    let mut current = first.to;
    for row in rest {
        if row.from != Some(current) {
            return None;
        }
        current = row.to;
    }

    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Currency;

    fn sample_advance() -> AdvanceRequest {
        AdvanceRequest::new(
            "adv_1".into(),
            AdvanceKind::Payroll,
            "emp_1".into(),
            "co_1".into(),
            Money::new(600_000, Currency::USD),
            TimeStamp::new(),
        )
    }

    #[test]
    fn new_advance_starts_requested_with_creation_row() {
        let adv = sample_advance();

        assert_eq!(adv.status, AdvanceStatus::Requested);
        assert_eq!(adv.history.len(), 1);
        assert_eq!(adv.history[0].from, None);
        assert_eq!(adv.history[0].to, AdvanceStatus::Requested);
        assert_eq!(replay_history(&adv.history), Some(AdvanceStatus::Requested));
    }

    #[test]
    fn admin_approval_stamps_and_appends() {
        let mut adv = sample_advance();
        let admin = Actor::Admin {
            user_id: Some("adm_1".into()),
        };

        adv.apply_transition(AdvanceStatus::Approved, &admin, TimeStamp::new())
            .unwrap();

        assert_eq!(adv.status, AdvanceStatus::Approved);
        assert!(adv.timestamps.approved_at.is_some());
        assert_eq!(adv.history.len(), 2);
        assert_eq!(adv.version, 2);
        assert_eq!(replay_history(&adv.history), Some(AdvanceStatus::Approved));
    }

    #[test]
    fn timestamps_are_first_write_only() {
        let mut adv = sample_advance();
        let admin = Actor::Admin { user_id: None };

        adv.apply_transition(AdvanceStatus::Approved, &admin, TimeStamp::new())
            .unwrap();
        let approved_at = adv.timestamps.approved_at.clone();

        // retrying the applied transition is a duplicate, not an illegal edge
        let err = adv
            .apply_transition(AdvanceStatus::Approved, &admin, TimeStamp::new())
            .unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyTransitioned { .. }));
        assert_eq!(adv.timestamps.approved_at, approved_at);
        assert_eq!(adv.history.len(), 2);
        assert_eq!(adv.version, 2);
    }

    #[test]
    fn employee_cannot_cancel_someone_elses_advance() {
        let mut adv = sample_advance();
        let stranger = Actor::Employee {
            employee_id: "emp_2".into(),
        };

        let err = adv
            .apply_transition(AdvanceStatus::Cancelled, &stranger, TimeStamp::new())
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Unauthorized { .. }));
        assert_eq!(adv.status, AdvanceStatus::Requested);
        assert_eq!(adv.history.len(), 1);
    }

    #[test]
    fn status_descriptions_are_distinct() {
        let all = [
            AdvanceStatus::Requested,
            AdvanceStatus::Approved,
            AdvanceStatus::Paid,
            AdvanceStatus::Cancelled,
            AdvanceStatus::Denied,
        ];
        let described: std::collections::HashSet<&str> =
            all.iter().map(AdvanceStatus::describe).collect();
        assert_eq!(described.len(), all.len());
    }

    #[test]
    fn replay_detects_broken_chains() {
        let mut adv = sample_advance();
        let admin = Actor::Admin { user_id: None };
        adv.apply_transition(AdvanceStatus::Approved, &admin, TimeStamp::new())
            .unwrap();
        adv.apply_transition(AdvanceStatus::Paid, &admin, TimeStamp::new())
            .unwrap();

        assert_eq!(replay_history(&adv.history), Some(AdvanceStatus::Paid));

        // drop the middle row, the chain no longer connects
        let mut broken = adv.history.clone();
        broken.remove(1);
        assert_eq!(replay_history(&broken), None);

        assert_eq!(replay_history(&[]), None);
    }
}
