//! Forgetting: keeps the store under `max_atoms`.
//!
//! Only atoms nothing else references are eligible, lowest LTI first (STI
//! breaks ties, then age). VLTI atoms are never forgotten. Removing a link
//! can make its targets eligible, so the agent repeats until the store fits
//! or the per-tick budget runs out.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::atom::Handle;
use crate::error::{ErrorKind, Result};
use crate::store::{AtomSpace, RemoveMode};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgetReport {
    pub removed: Vec<Handle>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ForgettingAgent;

impl ForgettingAgent {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip_all)]
    pub fn run(&self, space: &AtomSpace) -> Result<ForgetReport> {
        let config = space.attention().config();
        let mut report = ForgetReport::default();
        let Some(max_atoms) = config.max_atoms else {
            return Ok(report);
        };
        let mut budget = config.max_forget_per_tick;

        while budget > 0 {
            let excess = space.size().saturating_sub(max_atoms);
            if excess == 0 {
                break;
            }
            let victims = self.candidates(space, excess.min(budget))?;
            if victims.is_empty() {
                debug!(excess, "nothing left to forget");
                break;
            }
            for handle in victims {
                match space.remove_atom(handle, RemoveMode::Strict) {
                    Ok(_) => {
                        report.removed.push(handle);
                        budget -= 1;
                    }
                    // Gained a dependent since the scan.
                    Err(e) if e.kind() == ErrorKind::ReferenceIntegrity => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
            }
        }

        if !report.removed.is_empty() {
            info!(count = report.removed.len(), size = space.size(), "forgot atoms");
        }
        Ok(report)
    }

    /// Up to `limit` unreferenced, non-VLTI atoms in forgetting order.
    fn candidates(&self, space: &AtomSpace, limit: usize) -> Result<Vec<Handle>> {
        let table = space.read()?;
        let state = space.attention().lock()?;
        let mut eligible: Vec<(i32, i32, Handle)> = table
            .atoms
            .keys()
            .filter(|h| table.index.incoming_len(**h) == 0)
            .filter_map(|h| {
                let av = state.values.get(h).copied().unwrap_or_default();
                (!av.vlti).then_some((av.lti, av.sti, *h))
            })
            .collect();
        eligible.sort();
        Ok(eligible.into_iter().take(limit).map(|(_, _, h)| h).collect())
    }
}
