//! Economic attention allocation.
//!
//! Every atom in an [`AtomSpace`](crate::store::AtomSpace) carries an
//! [`AttentionValue`](crate::atom::AttentionValue) held by the store's
//! [`AttentionBank`]. Stimulation spends from a shared STI fund; maintenance
//! ticks spread importance along links ([`ImportanceDiffusion`]), collect it
//! back as rent ([`RentCollector`]) and forget unimportant atoms
//! ([`ForgettingAgent`]). The [`MaintenanceScheduler`] drives all three.
//!
//! ```no_run
//! use std::sync::Arc;
//! use atomspace_core::{AtomSpace, AtomType, MaintenanceScheduler};
//!
//! let space = Arc::new(AtomSpace::new());
//! let dog = space.add_node(AtomType::ConceptNode, "dog", None)?;
//! space.stimulate(dog, 200)?;
//!
//! let scheduler = MaintenanceScheduler::new(space.clone());
//! let report = scheduler.tick()?;
//! println!("funds after tick: {}", report.sti_funds);
//! # Ok::<(), atomspace_core::Error>(())
//! ```

mod bank;
mod config;
mod diffusion;
mod focus;
mod forgetting;
mod goals;
#[cfg(test)]
mod proptest;
mod rent;
mod scheduler;

pub use bank::{AttentionBank, BankSummary};
pub use config::AttentionConfig;
pub use diffusion::{DiffusionReport, ImportanceDiffusion};
pub use forgetting::{ForgetReport, ForgettingAgent};
pub use goals::{Goal, GoalRegistry};
pub use rent::{RentCollector, RentReport};
#[cfg(feature = "tokio-runtime")]
pub use scheduler::MaintenanceHandle;
pub use scheduler::{MaintenanceScheduler, TickReport};
