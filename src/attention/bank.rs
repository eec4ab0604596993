//! The attention bank: per-atom attention values and the global funds.
//!
//! All state sits behind one mutex that is separate from the store's
//! structural lock, so attention churn never blocks graph reads. Funds are a
//! budget, not a hard cap: stimulation may drive them negative and rent
//! collection brings them back.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use super::config::AttentionConfig;
use super::focus::FocusState;
use crate::atom::{AttentionValue, Handle};
use crate::error::{Error, Result};

#[derive(Debug)]
pub(crate) struct BankState {
    pub values: HashMap<Handle, AttentionValue>,
    pub sti_funds: i64,
    pub lti_funds: i64,
    pub focus: FocusState,
}

/// Snapshot of the bank's economy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankSummary {
    pub sti_funds: i64,
    pub lti_funds: i64,
    /// Sum of STI held by atoms.
    pub total_sti: i64,
    /// Sum of LTI held by atoms.
    pub total_lti: i64,
    pub atoms: usize,
    pub focus_size: usize,
}

/// Tracks attention values and the bounded STI/LTI fund economy.
#[derive(Debug)]
pub struct AttentionBank {
    config: AttentionConfig,
    state: Mutex<BankState>,
}

impl AttentionBank {
    /// Create a bank, rejecting invalid configuration.
    pub fn new(config: AttentionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: AttentionConfig) -> Self {
        let state = BankState {
            values: HashMap::new(),
            sti_funds: config.target_sti_funds,
            lti_funds: config.target_lti_funds,
            focus: FocusState::default(),
        };
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &AttentionConfig {
        &self.config
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, BankState>> {
        self.state.lock().map_err(|_| Error::poisoned("attention bank"))
    }

    /// Start tracking a new atom with the default attention value.
    pub(crate) fn register(&self, handle: Handle) -> Result<()> {
        let mut state = self.lock()?;
        state.values.entry(handle).or_default();
        state.focus.mark_dirty();
        Ok(())
    }

    /// Stop tracking an atom; whatever it held goes back to the funds.
    pub(crate) fn unregister(&self, handle: Handle) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(av) = state.values.remove(&handle) {
            state.sti_funds += i64::from(av.sti);
            state.lti_funds += i64::from(av.lti);
        }
        state.focus.forget(handle);
        Ok(())
    }

    /// Drop every tracked atom, refunding their importance.
    pub(crate) fn unregister_all(&self) -> Result<()> {
        let mut state = self.lock()?;
        let (sti, lti) = state.values.values().fold((0i64, 0i64), |(s, l), av| {
            (s + i64::from(av.sti), l + i64::from(av.lti))
        });
        state.sti_funds += sti;
        state.lti_funds += lti;
        state.values.clear();
        state.focus.clear();
        Ok(())
    }

    /// Attention value of an atom.
    pub fn get_attention(&self, handle: Handle) -> Result<AttentionValue> {
        self.lock()?
            .values
            .get(&handle)
            .copied()
            .ok_or_else(|| Error::handle_not_found(handle))
    }

    /// Overwrite an atom's attention value.
    ///
    /// The difference is settled against the funds so the total economy is
    /// unchanged.
    pub fn set_attention(&self, handle: Handle, av: AttentionValue) -> Result<()> {
        for (label, v) in [("STI", av.sti), ("LTI", av.lti)] {
            if v < self.config.min_importance || v > self.config.max_importance {
                return Err(Error::validation_for(
                    handle,
                    format!(
                        "{} {} outside [{}, {}]",
                        label, v, self.config.min_importance, self.config.max_importance
                    ),
                ));
            }
        }
        let mut state = self.lock()?;
        let old = state
            .values
            .get(&handle)
            .copied()
            .ok_or_else(|| Error::handle_not_found(handle))?;
        state.sti_funds -= i64::from(av.sti) - i64::from(old.sti);
        state.lti_funds -= i64::from(av.lti) - i64::from(old.lti);
        state.values.insert(handle, av);
        state.focus.mark_dirty();
        Ok(())
    }

    /// Set or clear the VLTI flag.
    pub fn set_vlti(&self, handle: Handle, vlti: bool) -> Result<()> {
        let mut state = self.lock()?;
        let av = state
            .values
            .get_mut(&handle)
            .ok_or_else(|| Error::handle_not_found(handle))?;
        av.vlti = vlti;
        Ok(())
    }

    /// Raise an atom's STI by `amount`, paid from the STI fund.
    ///
    /// Also pays an LTI wage of `amount * lti_wage_ratio`. Returns the STI
    /// actually granted, which is smaller than `amount` only when the atom
    /// hits `max_importance`. Unknown handles are ignored and yield 0.
    pub fn stimulate(&self, handle: Handle, amount: i32) -> Result<i32> {
        let max = self.config.max_importance;
        let min = self.config.min_importance;
        let wage_ratio = self.config.lti_wage_ratio;

        let mut state = self.lock()?;
        let Some(av) = state.values.get_mut(&handle) else {
            debug!(%handle, "stimulus for unknown atom ignored");
            return Ok(0);
        };

        let new_sti = (i64::from(av.sti) + i64::from(amount)).clamp(i64::from(min), i64::from(max));
        let granted = new_sti - i64::from(av.sti);
        av.sti = new_sti as i32;

        let wage = (granted.max(0) as f64 * wage_ratio).round() as i64;
        let new_lti = (i64::from(av.lti) + wage).min(i64::from(max));
        let lti_paid = new_lti - i64::from(av.lti);
        av.lti = new_lti as i32;

        state.sti_funds -= granted;
        state.lti_funds -= lti_paid;
        state.focus.mark_dirty();
        Ok(granted as i32)
    }

    /// Current attentional focus, most important first.
    pub fn attentional_focus(&self) -> Result<Vec<Handle>> {
        let mut state = self.lock()?;
        let BankState { values, focus, .. } = &mut *state;
        focus.refresh_if_dirty(values, &self.config);

        let mut members: Vec<(i32, Handle)> = focus
            .members()
            .iter()
            .map(|h| (values.get(h).map_or(0, |av| av.sti), *h))
            .collect();
        members.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        Ok(members.into_iter().map(|(_, h)| h).collect())
    }

    /// Whether an atom is currently in the attentional focus.
    pub fn in_focus(&self, handle: Handle) -> Result<bool> {
        let mut state = self.lock()?;
        let BankState { values, focus, .. } = &mut *state;
        focus.refresh_if_dirty(values, &self.config);
        Ok(focus.members().contains(&handle))
    }

    /// Force a focus recomputation.
    pub fn refresh_focus(&self) -> Result<()> {
        let mut state = self.lock()?;
        let BankState { values, focus, .. } = &mut *state;
        focus.refresh(values, &self.config);
        Ok(())
    }

    /// Total focus membership changes so far.
    pub fn focus_churn(&self) -> Result<u64> {
        Ok(self.lock()?.focus.churn())
    }

    pub fn sti_funds(&self) -> Result<i64> {
        Ok(self.lock()?.sti_funds)
    }

    pub fn lti_funds(&self) -> Result<i64> {
        Ok(self.lock()?.lti_funds)
    }

    /// Atoms with STI strictly above `threshold`, highest first.
    pub fn atoms_above(&self, threshold: i32) -> Result<Vec<(Handle, i32)>> {
        let state = self.lock()?;
        let mut above: Vec<(Handle, i32)> = state
            .values
            .iter()
            .filter(|(_, av)| av.sti > threshold)
            .map(|(h, av)| (*h, av.sti))
            .collect();
        above.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(above)
    }

    pub fn summary(&self) -> Result<BankSummary> {
        let state = self.lock()?;
        let (total_sti, total_lti) = state.values.values().fold((0i64, 0i64), |(s, l), av| {
            (s + i64::from(av.sti), l + i64::from(av.lti))
        });
        Ok(BankSummary {
            sti_funds: state.sti_funds,
            lti_funds: state.lti_funds,
            total_sti,
            total_lti,
            atoms: state.values.len(),
            focus_size: state.focus.members().len(),
        })
    }
}

impl Default for AttentionBank {
    fn default() -> Self {
        Self::from_valid(AttentionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank_with(handles: &[u64]) -> AttentionBank {
        let bank = AttentionBank::new(AttentionConfig::default()).unwrap();
        for h in handles {
            bank.register(Handle::new(*h)).unwrap();
        }
        bank
    }

    #[test]
    fn test_stimulate_draws_from_fund() {
        let bank = bank_with(&[1]);
        let granted = bank.stimulate(Handle::new(1), 100).unwrap();
        assert_eq!(granted, 100);

        let av = bank.get_attention(Handle::new(1)).unwrap();
        assert_eq!(av.sti, 100);
        assert_eq!(av.lti, 10);
        assert_eq!(bank.sti_funds().unwrap(), 9_900);
        assert_eq!(bank.lti_funds().unwrap(), 9_990);
    }

    #[test]
    fn test_stimulate_unknown_is_noop() {
        let bank = bank_with(&[]);
        assert_eq!(bank.stimulate(Handle::new(9), 100).unwrap(), 0);
        assert_eq!(bank.sti_funds().unwrap(), 10_000);
    }

    #[test]
    fn test_fund_may_go_negative() {
        let bank = bank_with(&[1, 2, 3]);
        for h in 1..=3 {
            bank.stimulate(Handle::new(h), 30_000).unwrap();
        }
        assert!(bank.sti_funds().unwrap() < 0);
    }

    #[test]
    fn test_negative_stimulus_gives_back() {
        let bank = bank_with(&[1]);
        bank.stimulate(Handle::new(1), -50).unwrap();
        assert_eq!(bank.get_attention(Handle::new(1)).unwrap().sti, -50);
        assert_eq!(bank.sti_funds().unwrap(), 10_050);
    }

    #[test]
    fn test_set_attention_conserves_total() {
        let bank = bank_with(&[1]);
        bank.set_attention(Handle::new(1), AttentionValue::new(300, 20, true))
            .unwrap();
        let summary = bank.summary().unwrap();
        assert_eq!(summary.sti_funds + summary.total_sti, 10_000);
        assert_eq!(summary.lti_funds + summary.total_lti, 10_000);

        let err = bank
            .set_attention(Handle::new(1), AttentionValue::new(1_000_000, 0, false))
            .unwrap_err();
        assert_eq!(err.handle(), Some(Handle::new(1)));
    }

    #[test]
    fn test_unregister_refunds() {
        let bank = bank_with(&[1]);
        bank.stimulate(Handle::new(1), 500).unwrap();
        bank.unregister(Handle::new(1)).unwrap();
        assert_eq!(bank.sti_funds().unwrap(), 10_000);
        assert!(bank.get_attention(Handle::new(1)).is_err());
    }

    #[test]
    fn test_focus_ordering() {
        let bank = bank_with(&[1, 2, 3]);
        bank.stimulate(Handle::new(2), 50).unwrap();
        bank.stimulate(Handle::new(3), 80).unwrap();
        let focus = bank.attentional_focus().unwrap();
        assert_eq!(focus[0], Handle::new(3));
        assert_eq!(focus[1], Handle::new(2));
        assert!(bank.in_focus(Handle::new(3)).unwrap());
    }
}
