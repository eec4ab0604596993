//! Rent collection.
//!
//! Rent is the negative-feedback half of the economy. When the STI fund sits
//! below its target, atoms above `rent_floor` pay a share of their STI back.
//! The rate grows with the fund's deficit (up to `max_rent_rate`) and drops
//! to zero once the fund reaches its target. Rent collected in one pass never
//! exceeds the deficit, so the fund approaches the target monotonically and
//! never overshoots. VLTI atoms pay nothing.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::bank::AttentionBank;
use super::config::AttentionConfig;
use crate::atom::Handle;
use crate::error::Result;

/// What one rent pass collected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RentReport {
    /// STI rent rate applied this pass.
    pub rate: f64,
    pub sti_collected: i64,
    pub lti_collected: i64,
    /// Atoms that paid STI rent.
    pub payers: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RentCollector;

impl RentCollector {
    pub fn new() -> Self {
        Self
    }

    /// Adaptive rate for a fund at `funds` aiming at `target`.
    pub fn rate(config: &AttentionConfig, funds: i64, target: i64) -> f64 {
        if funds >= target {
            return 0.0;
        }
        if target <= 0 {
            return config.max_rent_rate;
        }
        let deficit = (target - funds) as f64;
        (config.base_rent_rate * (1.0 + deficit / target as f64)).min(config.max_rent_rate)
    }

    #[instrument(skip_all)]
    pub fn run(&self, bank: &AttentionBank) -> Result<RentReport> {
        let config = bank.config();
        let mut state = bank.lock()?;

        let rate = Self::rate(config, state.sti_funds, config.target_sti_funds);
        let mut report = RentReport {
            rate,
            ..Default::default()
        };
        if rate <= 0.0 {
            return Ok(report);
        }

        // Richest atoms pay first so the deficit cap bites on the tail.
        let mut payers: Vec<(Handle, i32, i32)> = state
            .values
            .iter()
            .filter(|(_, av)| !av.vlti)
            .map(|(h, av)| (*h, av.sti, av.lti))
            .collect();
        payers.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut sti_left = config.target_sti_funds - state.sti_funds;
        let lti_rate = rate * config.lti_rent_ratio;
        let mut lti_left = (config.target_lti_funds - state.lti_funds).max(0);

        for (handle, sti, lti) in payers {
            let mut paid_sti = 0i64;
            if sti > config.rent_floor && sti_left > 0 {
                let headroom = i64::from(sti) - i64::from(config.rent_floor);
                let due = ((f64::from(sti) * rate).ceil() as i64).max(1);
                paid_sti = due.min(headroom).min(sti_left);
                sti_left -= paid_sti;
            }
            let mut paid_lti = 0i64;
            if lti > 0 && lti_left > 0 && lti_rate > 0.0 {
                let due = ((f64::from(lti) * lti_rate).ceil() as i64).max(1);
                paid_lti = due.min(i64::from(lti)).min(lti_left);
                lti_left -= paid_lti;
            }
            if paid_sti == 0 && paid_lti == 0 {
                continue;
            }
            if let Some(av) = state.values.get_mut(&handle) {
                av.sti -= paid_sti as i32;
                av.lti -= paid_lti as i32;
            }
            if paid_sti > 0 {
                report.payers += 1;
            }
            report.sti_collected += paid_sti;
            report.lti_collected += paid_lti;
        }

        state.sti_funds += report.sti_collected;
        state.lti_funds += report.lti_collected;
        if report.sti_collected > 0 {
            state.focus.mark_dirty();
        }
        debug!(
            rate,
            sti = report.sti_collected,
            lti = report.lti_collected,
            payers = report.payers,
            funds = state.sti_funds,
            "collected rent"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AttentionValue;

    fn bank(config: AttentionConfig, handles: &[u64]) -> AttentionBank {
        let bank = AttentionBank::new(config).unwrap();
        for h in handles {
            bank.register(Handle::new(*h)).unwrap();
        }
        bank
    }

    #[test]
    fn test_rate_adapts_to_deficit() {
        let config = AttentionConfig::default();
        assert_eq!(RentCollector::rate(&config, 10_000, 10_000), 0.0);
        assert_eq!(RentCollector::rate(&config, 20_000, 10_000), 0.0);
        let near = RentCollector::rate(&config, 9_900, 10_000);
        let far = RentCollector::rate(&config, 1_000, 10_000);
        assert!(near > 0.0 && near < far);
        assert_eq!(RentCollector::rate(&config, -1_000_000, 10_000), config.max_rent_rate);
    }

    #[test]
    fn test_rent_moves_fund_towards_target() {
        let bank = bank(AttentionConfig::default(), &[1, 2]);
        bank.stimulate(Handle::new(1), 2_000).unwrap();
        bank.stimulate(Handle::new(2), 1_000).unwrap();
        let before = bank.sti_funds().unwrap();

        let report = RentCollector::new().run(&bank).unwrap();
        assert_eq!(report.payers, 2);
        let after = bank.sti_funds().unwrap();
        assert!(after > before);
        assert!(after <= 10_000);
        assert_eq!(after - before, report.sti_collected);

        let summary = bank.summary().unwrap();
        assert_eq!(summary.sti_funds + summary.total_sti, 10_000);
        assert_eq!(summary.lti_funds + summary.total_lti, 10_000);
    }

    #[test]
    fn test_vlti_and_floor_exempt() {
        let config = AttentionConfig {
            rent_floor: 50,
            ..Default::default()
        };
        let bank = bank(config, &[1, 2, 3]);
        bank.stimulate(Handle::new(1), 40).unwrap();
        bank.set_attention(Handle::new(2), AttentionValue::new(500, 0, true))
            .unwrap();
        bank.stimulate(Handle::new(3), 500).unwrap();

        RentCollector::new().run(&bank).unwrap();
        assert_eq!(bank.get_attention(Handle::new(1)).unwrap().sti, 40);
        assert_eq!(bank.get_attention(Handle::new(2)).unwrap().sti, 500);
        let paid = bank.get_attention(Handle::new(3)).unwrap().sti;
        assert!(paid < 500 && paid >= 50);
    }

    #[test]
    fn test_no_overshoot() {
        let bank = bank(AttentionConfig::default(), &[1]);
        bank.stimulate(Handle::new(1), 3).unwrap();
        let mut last = bank.sti_funds().unwrap();
        for _ in 0..3 {
            let report = RentCollector::new().run(&bank).unwrap();
            assert_eq!(report.sti_collected, 1);
            let funds = bank.sti_funds().unwrap();
            assert!(funds > last && funds <= 10_000);
            last = funds;
        }
        assert_eq!(last, 10_000);
        assert_eq!(bank.get_attention(Handle::new(1)).unwrap().sti, 0);

        let idle = RentCollector::new().run(&bank).unwrap();
        assert_eq!(idle.rate, 0.0);
        assert_eq!(idle.sti_collected, 0);
    }
}
