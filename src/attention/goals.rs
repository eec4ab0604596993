//! Goal-weighted stimulation.
//!
//! A goal is a named pattern with a weight. After [`GoalRegistry::refresh`],
//! every atom that grounds a goal pattern (the matched atoms and the atoms
//! bound to its variables) has its stimulation multiplied by the goal's
//! weight. When several goals cover an atom the largest weight wins.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::atom::Handle;
use crate::error::{Error, Result};
use crate::query::{Pattern, PatternMatcher, Query};
use crate::store::AtomSpace;

/// A registered goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub name: String,
    pub weight: f64,
    pub pattern: Pattern,
    /// Atoms covered as of the last refresh.
    #[serde(skip)]
    pub covered: BTreeSet<Handle>,
}

#[derive(Debug, Default)]
pub struct GoalRegistry {
    goals: RwLock<HashMap<String, Goal>>,
}

impl GoalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a goal. Coverage is empty until the next refresh.
    pub fn add_goal(&self, name: impl Into<String>, weight: f64, pattern: Pattern) -> Result<()> {
        let name = name.into();
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::validation(format!(
                "goal '{}' weight {} must be finite and non-negative",
                name, weight
            )));
        }
        pattern.validate()?;
        let goal = Goal {
            name: name.clone(),
            weight,
            pattern,
            covered: BTreeSet::new(),
        };
        self.goals
            .write()
            .map_err(|_| Error::poisoned("goal registry"))?
            .insert(name, goal);
        Ok(())
    }

    /// Returns false if no goal had this name.
    pub fn remove_goal(&self, name: &str) -> Result<bool> {
        Ok(self
            .goals
            .write()
            .map_err(|_| Error::poisoned("goal registry"))?
            .remove(name)
            .is_some())
    }

    pub fn goals(&self) -> Result<Vec<Goal>> {
        let goals = self.goals.read().map_err(|_| Error::poisoned("goal registry"))?;
        let mut out: Vec<Goal> = goals.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    /// Re-match every goal pattern against `space`.
    #[instrument(skip_all)]
    pub fn refresh(&self, space: &AtomSpace) -> Result<()> {
        let patterns: Vec<(String, Pattern)> = {
            let goals = self.goals.read().map_err(|_| Error::poisoned("goal registry"))?;
            goals
                .values()
                .map(|g| (g.name.clone(), g.pattern.clone()))
                .collect()
        };

        let matcher = PatternMatcher::new(space).distinct(false);
        let mut coverage = HashMap::with_capacity(patterns.len());
        for (name, pattern) in patterns {
            let report = matcher.run_with_report(&Query::from_pattern(pattern))?;
            let covered: BTreeSet<Handle> = report
                .groundings
                .iter()
                .flat_map(|g| g.atoms.iter().copied().chain(g.binding.handles()))
                .collect();
            debug!(goal = %name, covered = covered.len(), "refreshed goal");
            coverage.insert(name, covered);
        }

        let mut goals = self
            .goals
            .write()
            .map_err(|_| Error::poisoned("goal registry"))?;
        for (name, covered) in coverage {
            // A goal removed while matching stays removed.
            if let Some(goal) = goals.get_mut(&name) {
                goal.covered = covered;
            }
        }
        Ok(())
    }

    /// Stimulation multiplier for an atom: the largest weight among goals
    /// covering it, or 1.0.
    pub fn multiplier(&self, handle: Handle) -> Result<f64> {
        let goals = self.goals.read().map_err(|_| Error::poisoned("goal registry"))?;
        Ok(goals
            .values()
            .filter(|g| g.covered.contains(&handle))
            .map(|g| g.weight)
            .fold(None, |best: Option<f64>, w| Some(best.map_or(w, |b| b.max(w))))
            .unwrap_or(1.0))
    }
}

impl AtomSpace {
    /// Recompute which atoms each goal covers.
    pub fn refresh_goals(&self) -> Result<()> {
        self.goals().refresh(self)
    }
}
