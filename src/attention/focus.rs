//! Attentional focus with hysteresis.
//!
//! The focus is the top-K atoms by STI. Incumbents rank with a bonus of
//! `af_hysteresis`, so an outsider has to beat a member by more than that
//! margin before it takes the member's place. Small STI fluctuations around
//! the cut therefore do not swap atoms in and out.

use std::collections::{BTreeSet, HashMap};

use super::config::AttentionConfig;
use crate::atom::{AttentionValue, Handle};

#[derive(Debug, Default)]
pub(crate) struct FocusState {
    members: BTreeSet<Handle>,
    /// Membership changes (entries plus exits) since creation.
    churn: u64,
    dirty: bool,
}

impl FocusState {
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn members(&self) -> &BTreeSet<Handle> {
        &self.members
    }

    pub fn churn(&self) -> u64 {
        self.churn
    }

    pub fn forget(&mut self, handle: Handle) {
        if self.members.remove(&handle) {
            self.churn += 1;
        }
        self.dirty = true;
    }

    pub fn clear(&mut self) {
        self.churn += self.members.len() as u64;
        self.members.clear();
        self.dirty = false;
    }

    /// Recompute membership if anything changed since the last refresh.
    pub fn refresh_if_dirty(
        &mut self,
        values: &HashMap<Handle, AttentionValue>,
        config: &AttentionConfig,
    ) {
        if self.dirty {
            self.refresh(values, config);
        }
    }

    pub fn refresh(&mut self, values: &HashMap<Handle, AttentionValue>, config: &AttentionConfig) {
        self.dirty = false;

        let bonus = i64::from(config.af_hysteresis);
        let mut ranked: Vec<(i64, Handle)> = values
            .iter()
            .map(|(h, av)| {
                let incumbent = if self.members.contains(h) { bonus } else { 0 };
                (i64::from(av.sti) + incumbent, *h)
            })
            .collect();
        // Highest effective STI first; older handles win ties.
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let qualifying = ranked
            .iter()
            .take_while(|(eff, _)| *eff >= i64::from(config.af_boundary))
            .count();
        let k = qualifying
            .clamp(config.af_min_size, config.af_max_size)
            .min(ranked.len());

        let next: BTreeSet<Handle> = ranked[..k].iter().map(|(_, h)| *h).collect();
        self.churn += self.members.symmetric_difference(&next).count() as u64;
        self.members = next;
    }
}
