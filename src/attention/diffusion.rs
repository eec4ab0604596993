//! Importance spreading.
//!
//! Each atom above `spread_threshold` gives up to `max_spread_percentage` of
//! its STI, split evenly across a random tournament of at most
//! `tournament_size` neighbours (incoming and outgoing). Total STI is
//! conserved: what a source gives up is exactly what its neighbours receive.

use std::collections::BTreeSet;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::config::AttentionConfig;
use crate::atom::Handle;
use crate::error::{Error, Result};
use crate::store::AtomSpace;

/// What one diffusion pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffusionReport {
    /// Atoms that spread importance.
    pub spreaders: usize,
    /// Individual source-to-neighbour transfers.
    pub transfers: usize,
    /// Total STI moved.
    pub amount: i64,
}

pub struct ImportanceDiffusion {
    rng: Mutex<StdRng>,
}

impl ImportanceDiffusion {
    /// Seeded from `config.seed` when set, otherwise from OS entropy.
    pub fn new(config: &AttentionConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    #[instrument(skip_all)]
    pub fn run(&self, space: &AtomSpace) -> Result<DiffusionReport> {
        let bank = space.attention();
        let config = bank.config();
        let sources = bank.atoms_above(config.spread_threshold)?;
        if sources.is_empty() || config.max_spread_percentage <= 0.0 {
            return Ok(DiffusionReport::default());
        }

        // Sample neighbours under the table lock only.
        let plans: Vec<(Handle, Vec<Handle>)> = {
            let table = space.read()?;
            let mut rng = self.rng.lock().map_err(|_| Error::poisoned("diffusion rng"))?;
            sources
                .iter()
                .filter_map(|(source, _)| {
                    let mut neighbours: BTreeSet<Handle> =
                        table.index.incoming(*source).cloned().unwrap_or_default();
                    if let Some(atom) = table.get(*source) {
                        neighbours.extend(atom.outgoing().iter().copied());
                    }
                    neighbours.remove(source);
                    if neighbours.is_empty() {
                        return None;
                    }
                    let pool: Vec<Handle> = neighbours.into_iter().collect();
                    let picked: Vec<Handle> = pool
                        .choose_multiple(&mut *rng, config.tournament_size)
                        .copied()
                        .collect();
                    Some((*source, picked))
                })
                .collect()
        };

        let mut report = DiffusionReport::default();
        let max = config.max_importance;
        let mut state = bank.lock()?;
        for (source, targets) in plans {
            let Some(sti) = state.values.get(&source).map(|av| av.sti) else {
                continue;
            };
            if sti <= config.spread_threshold {
                continue;
            }
            let budget = (f64::from(sti) * config.max_spread_percentage).floor() as i64;
            let live: Vec<Handle> = targets
                .into_iter()
                .filter(|t| state.values.contains_key(t))
                .collect();
            if live.is_empty() {
                continue;
            }
            let share = budget / live.len() as i64;
            if share <= 0 {
                continue;
            }

            let mut given = 0i64;
            for target in live {
                if let Some(av) = state.values.get_mut(&target) {
                    let room = i64::from(max) - i64::from(av.sti);
                    let amount = share.min(room.max(0));
                    if amount > 0 {
                        av.sti += amount as i32;
                        given += amount;
                        report.transfers += 1;
                    }
                }
            }
            if let Some(av) = state.values.get_mut(&source) {
                av.sti -= given as i32;
            }
            if given > 0 {
                report.spreaders += 1;
                report.amount += given;
            }
        }
        if report.amount > 0 {
            state.focus.mark_dirty();
        }
        debug!(
            spreaders = report.spreaders,
            transfers = report.transfers,
            amount = report.amount,
            "diffusion pass"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for ImportanceDiffusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportanceDiffusion").finish_non_exhaustive()
    }
}
