//! Economic parameters of the attention bank.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for the attention economy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttentionConfig {
    /// STI fund level the rent controller steers towards
    pub target_sti_funds: i64,
    /// LTI fund level the rent controller steers towards
    pub target_lti_funds: i64,
    /// Smallest attentional focus (when enough atoms exist)
    pub af_min_size: usize,
    /// Largest attentional focus
    pub af_max_size: usize,
    /// STI an atom needs to count towards growing the focus past its minimum
    pub af_boundary: i32,
    /// STI margin an outsider must beat an incumbent by to displace it
    pub af_hysteresis: i32,
    /// Atoms above this STI spread importance to neighbours
    pub spread_threshold: i32,
    /// Upper bound on the fraction of STI an atom spreads per tick
    pub max_spread_percentage: f64,
    /// Neighbours sampled per spreading atom
    pub tournament_size: usize,
    /// Atoms at or below this STI pay no rent
    pub rent_floor: i32,
    /// Rent rate when the fund is just below target
    pub base_rent_rate: f64,
    /// Ceiling on the adaptive rent rate
    pub max_rent_rate: f64,
    /// LTI earned per unit of STI stimulus
    pub lti_wage_ratio: f64,
    /// LTI rent rate as a fraction of the STI rent rate
    pub lti_rent_ratio: f64,
    /// Lowest representable STI/LTI
    pub min_importance: i32,
    /// Highest representable STI/LTI
    pub max_importance: i32,
    /// Forget atoms while the store holds more than this many
    pub max_atoms: Option<usize>,
    /// Upper bound on atoms forgotten per tick
    pub max_forget_per_tick: usize,
    /// Fixed RNG seed for reproducible diffusion
    pub seed: Option<u64>,
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            target_sti_funds: 10_000,
            target_lti_funds: 10_000,
            af_min_size: 5,
            af_max_size: 100,
            af_boundary: 1,
            af_hysteresis: 10,
            spread_threshold: 20,
            max_spread_percentage: 0.4,
            tournament_size: 5,
            rent_floor: 0,
            base_rent_rate: 0.05,
            max_rent_rate: 0.5,
            lti_wage_ratio: 0.1,
            lti_rent_ratio: 0.1,
            min_importance: i32::from(i16::MIN),
            max_importance: i32::from(i16::MAX),
            max_atoms: None,
            max_forget_per_tick: 100,
            seed: None,
        }
    }
}

impl AttentionConfig {
    /// Slow-moving economy: little spreading, gentle rent.
    pub fn conservative() -> Self {
        Self {
            max_spread_percentage: 0.1,
            tournament_size: 3,
            base_rent_rate: 0.01,
            max_rent_rate: 0.1,
            af_hysteresis: 20,
            ..Default::default()
        }
    }

    /// Fast-moving economy: wide spreading, steep rent.
    pub fn aggressive() -> Self {
        Self {
            max_spread_percentage: 0.6,
            tournament_size: 8,
            base_rent_rate: 0.1,
            max_rent_rate: 0.9,
            af_hysteresis: 5,
            ..Default::default()
        }
    }

    /// Load from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the bank cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.af_min_size > self.af_max_size {
            return Err(Error::Capacity(format!(
                "af_min_size {} exceeds af_max_size {}",
                self.af_min_size, self.af_max_size
            )));
        }
        if self.af_max_size == 0 {
            return Err(Error::Capacity("af_max_size must be positive".to_string()));
        }
        for (name, v) in [
            ("max_spread_percentage", self.max_spread_percentage),
            ("base_rent_rate", self.base_rent_rate),
            ("max_rent_rate", self.max_rent_rate),
            ("lti_rent_ratio", self.lti_rent_ratio),
        ] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(Error::Config(format!("{} {} outside [0, 1]", name, v)));
            }
        }
        if !self.lti_wage_ratio.is_finite() || self.lti_wage_ratio < 0.0 {
            return Err(Error::Config(format!(
                "lti_wage_ratio {} must be non-negative",
                self.lti_wage_ratio
            )));
        }
        if self.base_rent_rate > self.max_rent_rate {
            return Err(Error::Config(
                "base_rent_rate exceeds max_rent_rate".to_string(),
            ));
        }
        if self.tournament_size == 0 {
            return Err(Error::Config("tournament_size must be positive".to_string()));
        }
        if self.target_sti_funds < 0 || self.target_lti_funds < 0 {
            return Err(Error::Config("Fund targets must be non-negative".to_string()));
        }
        if self.min_importance >= self.max_importance {
            return Err(Error::Config(
                "min_importance must be below max_importance".to_string(),
            ));
        }
        if self.af_hysteresis < 0 {
            return Err(Error::Config("af_hysteresis must be non-negative".to_string()));
        }
        Ok(())
    }
}
