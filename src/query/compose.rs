//! Boolean composition of queries.
//!
//! Each leaf is matched on its own and the binding sets are combined
//! afterwards. Leaves ignore `max_results`; the cap applies to the combined
//! result.

use std::collections::HashSet;

use tracing::debug;

use super::binding::Binding;
use super::matcher::{PatternMatcher, Query};
use super::pattern::Pattern;
use crate::error::Result;

/// A tree of queries joined by AND, OR and NOT.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpr {
    Pattern(Query),
    /// Bindings of both sides that agree on shared variables, merged.
    And(Box<QueryExpr>, Box<QueryExpr>),
    /// Bindings of either side, deduplicated.
    Or(Box<QueryExpr>, Box<QueryExpr>),
    /// Bindings of `keep` whose assignment no binding of `exclude` repeats.
    ///
    /// Only variables both sides mention are compared. An `exclude` binding
    /// that shares no variable with a kept binding says nothing about it, so
    /// an `exclude` query over unrelated variables removes nothing.
    Not {
        keep: Box<QueryExpr>,
        exclude: Box<QueryExpr>,
    },
}

impl QueryExpr {
    pub fn pattern(pattern: Pattern) -> Self {
        Self::Pattern(Query::from_pattern(pattern))
    }

    pub fn and(self, other: QueryExpr) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: QueryExpr) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    pub fn and_not(self, exclude: QueryExpr) -> Self {
        Self::Not {
            keep: Box::new(self),
            exclude: Box::new(exclude),
        }
    }

    /// Evaluate with the matcher's options.
    pub fn evaluate(&self, matcher: &PatternMatcher<'_>) -> Result<Vec<Binding>> {
        let mut leaf_options = matcher.options().clone();
        leaf_options.max_results = None;
        let leaf = PatternMatcher::new(matcher.space()).with_options(leaf_options);

        let mut out = self.eval(&leaf)?;
        if let Some(max) = matcher.options().max_results {
            out.truncate(max);
        }
        Ok(out)
    }

    fn eval(&self, matcher: &PatternMatcher<'_>) -> Result<Vec<Binding>> {
        match self {
            Self::Pattern(query) => matcher.run_query(query),
            Self::And(left, right) => {
                let left = left.eval(matcher)?;
                let right = right.eval(matcher)?;
                let mut seen = HashSet::new();
                let mut out = Vec::new();
                for a in &left {
                    for b in &right {
                        if let Some(joined) = a.merge(b) {
                            if seen.insert(joined.clone()) {
                                out.push(joined);
                            }
                        }
                    }
                }
                debug!(left = left.len(), right = right.len(), joined = out.len(), "and");
                Ok(out)
            }
            Self::Or(left, right) => {
                let mut seen = HashSet::new();
                let mut out = Vec::new();
                for b in left.eval(matcher)?.into_iter().chain(right.eval(matcher)?) {
                    if seen.insert(b.clone()) {
                        out.push(b);
                    }
                }
                Ok(out)
            }
            Self::Not { keep, exclude } => {
                let excluded = exclude.eval(matcher)?;
                Ok(keep
                    .eval(matcher)?
                    .into_iter()
                    .filter(|b| !excluded.iter().any(|e| overlaps(b, e) && b.is_compatible(e)))
                    .collect())
            }
        }
    }
}

/// Whether two bindings assign at least one common variable.
fn overlaps(a: &Binding, b: &Binding) -> bool {
    a.iter().any(|(variable, _)| b.get(variable).is_some())
}

impl From<Query> for QueryExpr {
    fn from(query: Query) -> Self {
        Self::Pattern(query)
    }
}

impl From<Pattern> for QueryExpr {
    fn from(pattern: Pattern) -> Self {
        Self::pattern(pattern)
    }
}
