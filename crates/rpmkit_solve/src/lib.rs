#![deny(missing_docs)]
//! `rpmkit-solve` turns install, upgrade and remove requests into a transaction.
//!
//! A [`Goal`] collects jobs against the packages of a [`rpmkit_sack::Sack`]. Resolving the goal
//! translates the jobs into a SAT problem for [`rpmkit_libsolv_rs::Solver`], keeps installed
//! packages where possible and classifies the outcome into [`TransactionItem`]s. When no
//! solution exists the reasons are reported as a [`ProblemList`].

mod config;
mod goal;
mod problem;
mod provider;
mod settings;
mod transaction;

pub use config::SolverConfig;
pub use goal::{Goal, GoalError};
pub use problem::{ProblemEntry, ProblemList, ProblemRule};
pub use rpmkit_sack::ConfigError;
pub use settings::{GoalJobSettings, GoalSetting};
pub use transaction::{TransactionItem, TransactionItemAction, TransactionItemReason};
