//! Advance lifecycle and points ledger engine.
//!
//! Companies grant employees salary (payroll) and premium advances; an
//! advance moves through a fixed status workflow (requested, approved,
//! paid, cancelled, denied) with per-edge actor rules, an append-only audit
//! trail and a periodic availability limit. Alongside it sits a per-company
//! points ledger: an append-only transaction log with a transactionally
//! maintained summary row.
//!
//! The crate is a library consumed by route handlers; it owns no HTTP
//! surface. Entry points are [`service::AdvanceService`] and
//! [`points::PointsService`] over a [`store::Store`], with outbound
//! notifications behind [`notify::Notifier`].

pub mod advance;
pub mod calculator;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod points;
pub mod service;
pub mod store;
pub mod transition;
pub mod types;
pub mod utils;
