//! Backtracking pattern matcher.
//!
//! The search runs over an explicit choice-point stack. Each frame holds the
//! candidate atoms for one clause; at every depth the matcher picks the
//! unresolved clause with the smallest candidate source, so the most
//! constrained clause is tried first. Candidate sources are the type index or
//! the incoming set of an already-resolved slot, whichever is smaller.
//!
//! The store's read lock is held for the whole match, so the matcher sees a
//! consistent snapshot and writers wait until it finishes.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::binding::Binding;
use super::pattern::{Constraint, Pattern, Variable};
use crate::atom::{Atom, AtomType, Handle};
use crate::error::Result;
use crate::store::{AtomSpace, AtomTable};

/// Budgets and ordering for a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    /// Stop the search once this many results exist.
    pub max_results: Option<usize>,
    /// Stop the search after this many candidate unifications.
    pub max_evaluations: Option<usize>,
    /// Try high-STI candidates first.
    pub prioritize_by_attention: bool,
    /// Drop groundings whose binding was already produced.
    pub distinct: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            max_results: None,
            max_evaluations: None,
            prioritize_by_attention: false,
            distinct: true,
        }
    }
}

/// A conjunction of clauses sharing variables, plus constraints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    clauses: Vec<Pattern>,
    constraints: Vec<Constraint>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pattern(pattern: Pattern) -> Self {
        Self::new().clause(pattern)
    }

    pub fn clause(mut self, pattern: Pattern) -> Self {
        self.clauses.push(pattern);
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn constraints_from(mut self, constraints: &[Constraint]) -> Self {
        self.constraints.extend_from_slice(constraints);
        self
    }

    pub fn clauses(&self) -> &[Pattern] {
        &self.clauses
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Variables across all clauses, in order of first occurrence.
    pub fn variables(&self) -> Vec<Variable> {
        let mut out: Vec<Variable> = Vec::new();
        for clause in &self.clauses {
            for v in clause.variables() {
                if !out.contains(&v) {
                    out.push(v);
                }
            }
        }
        out
    }
}

/// A binding together with the atom that grounded each clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grounding {
    pub binding: Binding,
    /// `atoms[i]` is the atom clause `i` matched.
    pub atoms: Vec<Handle>,
}

/// Outcome of a match, with search statistics.
#[derive(Debug, Clone, Default)]
pub struct MatchReport {
    pub groundings: Vec<Grounding>,
    /// Candidate unifications attempted.
    pub evaluations: usize,
    /// True when a budget cut the search short.
    pub truncated: bool,
}

impl MatchReport {
    pub fn bindings(&self) -> Vec<Binding> {
        self.groundings.iter().map(|g| g.binding.clone()).collect()
    }

    pub fn into_bindings(self) -> Vec<Binding> {
        self.groundings.into_iter().map(|g| g.binding).collect()
    }
}

/// Where a clause's candidates come from.
#[derive(Debug, Clone)]
enum Source {
    Empty,
    Single(Handle),
    Type { atom_type: AtomType, subtypes: bool },
    Incoming(Handle),
    All,
}

/// What a pattern resolves to under the current bindings.
enum Resolved {
    Found(Handle),
    Missing,
    Unknown,
}

struct Frame {
    clause: usize,
    candidates: Vec<Handle>,
    next: usize,
    /// Trail length when the frame was pushed.
    mark: usize,
}

/// Answers queries against an [`AtomSpace`].
pub struct PatternMatcher<'a> {
    space: &'a AtomSpace,
    options: MatchOptions,
}

impl<'a> PatternMatcher<'a> {
    pub fn new(space: &'a AtomSpace) -> Self {
        Self {
            space,
            options: MatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn max_results(mut self, max: usize) -> Self {
        self.options.max_results = Some(max);
        self
    }

    pub fn max_evaluations(mut self, max: usize) -> Self {
        self.options.max_evaluations = Some(max);
        self
    }

    pub fn prioritize_by_attention(mut self, enabled: bool) -> Self {
        self.options.prioritize_by_attention = enabled;
        self
    }

    pub fn distinct(mut self, enabled: bool) -> Self {
        self.options.distinct = enabled;
        self
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    pub(crate) fn space(&self) -> &'a AtomSpace {
        self.space
    }

    /// All bindings of a single pattern.
    pub fn run(&self, pattern: &Pattern) -> Result<Vec<Binding>> {
        self.run_query(&Query::from_pattern(pattern.clone()))
    }

    pub fn run_query(&self, query: &Query) -> Result<Vec<Binding>> {
        Ok(self.run_with_report(query)?.into_bindings())
    }

    /// Run a query and report groundings plus search statistics.
    ///
    /// "No match" is an empty report, never an error. Only structurally
    /// malformed clauses are rejected. Constraints that mention variables
    /// absent from the query are ill-formed and yield no results.
    #[instrument(skip(self, query), fields(clauses = query.clauses.len()))]
    pub fn run_with_report(&self, query: &Query) -> Result<MatchReport> {
        for clause in &query.clauses {
            clause.validate()?;
        }
        let mut report = MatchReport::default();
        if query.clauses.is_empty() || self.options.max_results == Some(0) {
            return Ok(report);
        }
        let variables = query.variables();
        if query
            .constraints
            .iter()
            .flat_map(|c| c.variables())
            .any(|v| !variables.iter().any(|known| known == v))
        {
            debug!("constraint mentions an unknown variable; no results");
            return Ok(report);
        }

        let table = self.space.read()?;
        let clause_count = query.clauses.len();
        let mut done = vec![false; clause_count];
        let mut grounded: Vec<Option<Handle>> = vec![None; clause_count];
        let mut bindings: BTreeMap<Variable, Handle> = BTreeMap::new();
        let mut trail: Vec<Variable> = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut seen: HashSet<Binding> = HashSet::new();
        let mut descend = true;

        'search: loop {
            if descend {
                match self.pick_clause(&table, query, &done, &bindings)? {
                    Some((clause, candidates)) => {
                        done[clause] = true;
                        stack.push(Frame {
                            clause,
                            candidates,
                            next: 0,
                            mark: trail.len(),
                        });
                    }
                    None => {
                        let binding = Binding::from_map(bindings.clone());
                        if !self.options.distinct || seen.insert(binding.clone()) {
                            report.groundings.push(Grounding {
                                binding,
                                atoms: grounded.iter().flatten().copied().collect(),
                            });
                            if self
                                .options
                                .max_results
                                .is_some_and(|max| report.groundings.len() >= max)
                            {
                                report.truncated = true;
                                break 'search;
                            }
                        }
                    }
                }
            }

            let Some(frame) = stack.last_mut() else {
                break;
            };
            undo(&mut bindings, &mut trail, frame.mark);
            let mut advanced = false;
            while frame.next < frame.candidates.len() {
                let candidate = frame.candidates[frame.next];
                frame.next += 1;
                report.evaluations += 1;
                if self
                    .options
                    .max_evaluations
                    .is_some_and(|max| report.evaluations > max)
                {
                    report.evaluations -= 1;
                    report.truncated = true;
                    break 'search;
                }
                if unify(
                    &table,
                    &query.clauses[frame.clause],
                    candidate,
                    &query.constraints,
                    &mut bindings,
                    &mut trail,
                ) {
                    grounded[frame.clause] = Some(candidate);
                    advanced = true;
                    break;
                }
                undo(&mut bindings, &mut trail, frame.mark);
            }

            if advanced {
                descend = true;
            } else {
                if let Some(exhausted) = stack.pop() {
                    done[exhausted.clause] = false;
                    grounded[exhausted.clause] = None;
                }
                descend = false;
            }
        }

        debug!(
            results = report.groundings.len(),
            evaluations = report.evaluations,
            truncated = report.truncated,
            "match finished"
        );
        Ok(report)
    }

    /// The unresolved clause with the fewest candidates, and those candidates.
    fn pick_clause(
        &self,
        table: &AtomTable,
        query: &Query,
        done: &[bool],
        bindings: &BTreeMap<Variable, Handle>,
    ) -> Result<Option<(usize, Vec<Handle>)>> {
        let mut best: Option<(usize, Source, usize)> = None;
        for (i, clause) in query.clauses.iter().enumerate() {
            if done[i] {
                continue;
            }
            let source = clause_source(table, clause, &query.constraints, bindings);
            let size = source_size(table, &source);
            if best.as_ref().map_or(true, |(_, _, s)| size < *s) {
                best = Some((i, source, size));
            }
        }

        let Some((clause, source, _)) = best else {
            return Ok(None);
        };
        let mut candidates = materialize(table, &source);
        if self.options.prioritize_by_attention && candidates.len() > 1 {
            let bank = self.space.attention().lock()?;
            let sti = |h: &Handle| bank.values.get(h).map_or(0, |av| av.sti);
            candidates.sort_by(|a, b| sti(b).cmp(&sti(a)).then(a.cmp(b)));
        }
        Ok(Some((clause, candidates)))
    }
}

fn undo(bindings: &mut BTreeMap<Variable, Handle>, trail: &mut Vec<Variable>, mark: usize) {
    while trail.len() > mark {
        if let Some(v) = trail.pop() {
            bindings.remove(&v);
        }
    }
}

fn resolve(
    table: &AtomTable,
    pattern: &Pattern,
    bindings: &BTreeMap<Variable, Handle>,
) -> Resolved {
    match pattern {
        Pattern::Variable { name } => bindings
            .get(name)
            .map_or(Resolved::Unknown, |h| Resolved::Found(*h)),
        Pattern::Handle { handle } => {
            if table.atoms.contains_key(handle) {
                Resolved::Found(*handle)
            } else {
                Resolved::Missing
            }
        }
        Pattern::Node { atom_type, name } => {
            if atom_type.is_abstract() {
                let matching: Vec<Handle> = table
                    .index
                    .by_name(name)
                    .map(|set| {
                        set.iter()
                            .copied()
                            .filter(|h| table.get(*h).is_some_and(|a| a.atom_type().is_a(atom_type)))
                            .collect()
                    })
                    .unwrap_or_default();
                match matching.as_slice() {
                    [] => Resolved::Missing,
                    [one] => Resolved::Found(*one),
                    _ => Resolved::Unknown,
                }
            } else {
                table
                    .index
                    .lookup_node(atom_type, name)
                    .map_or(Resolved::Missing, Resolved::Found)
            }
        }
        Pattern::Link {
            atom_type,
            outgoing,
        } => {
            let mut handles = Vec::with_capacity(outgoing.len());
            let mut unknown = false;
            for child in outgoing {
                match resolve(table, child, bindings) {
                    Resolved::Found(h) => handles.push(h),
                    Resolved::Missing => return Resolved::Missing,
                    Resolved::Unknown => unknown = true,
                }
            }
            if unknown || atom_type.is_abstract() {
                return Resolved::Unknown;
            }
            table
                .index
                .lookup(&Atom::Link {
                    atom_type: atom_type.clone(),
                    outgoing: handles,
                })
                .map_or(Resolved::Missing, Resolved::Found)
        }
    }
}

fn clause_source(
    table: &AtomTable,
    clause: &Pattern,
    constraints: &[Constraint],
    bindings: &BTreeMap<Variable, Handle>,
) -> Source {
    match resolve(table, clause, bindings) {
        Resolved::Found(h) => return Source::Single(h),
        Resolved::Missing => return Source::Empty,
        Resolved::Unknown => {}
    }
    match clause {
        Pattern::Variable { name } => constraints
            .iter()
            .find_map(|c| match c {
                Constraint::Type {
                    variable,
                    atom_type,
                    include_subtypes,
                } if variable == name => Some(Source::Type {
                    atom_type: atom_type.clone(),
                    subtypes: *include_subtypes || atom_type.is_abstract(),
                }),
                _ => None,
            })
            .unwrap_or(Source::All),
        Pattern::Node { atom_type, .. } => Source::Type {
            atom_type: atom_type.clone(),
            subtypes: true,
        },
        Pattern::Link {
            atom_type,
            outgoing,
        } => {
            let mut best = Source::Type {
                atom_type: atom_type.clone(),
                subtypes: atom_type.is_abstract(),
            };
            let mut best_size = source_size(table, &best);
            for child in outgoing {
                match resolve(table, child, bindings) {
                    Resolved::Found(h) => {
                        let size = table.index.incoming_len(h);
                        if size < best_size {
                            best = Source::Incoming(h);
                            best_size = size;
                        }
                    }
                    Resolved::Missing => return Source::Empty,
                    Resolved::Unknown => {}
                }
            }
            best
        }
        Pattern::Handle { .. } => Source::Empty,
    }
}

fn source_size(table: &AtomTable, source: &Source) -> usize {
    match source {
        Source::Empty => 0,
        Source::Single(_) => 1,
        Source::Type {
            atom_type,
            subtypes: false,
        } => table.count_of_type(atom_type),
        Source::Type {
            atom_type,
            subtypes: true,
        } => table
            .index
            .subtypes_present(atom_type)
            .map(|(_, set)| set.len())
            .sum(),
        Source::Incoming(h) => table.index.incoming_len(*h),
        Source::All => table.atoms.len(),
    }
}

fn materialize(table: &AtomTable, source: &Source) -> Vec<Handle> {
    match source {
        Source::Empty => Vec::new(),
        Source::Single(h) => vec![*h],
        Source::Type {
            atom_type,
            subtypes,
        } => table.handles_of_type(atom_type, *subtypes),
        Source::Incoming(h) => table.incoming(*h),
        Source::All => {
            let mut all: Vec<Handle> = table.atoms.keys().copied().collect();
            all.sort();
            all
        }
    }
}

/// Unify `pattern` with the atom at `handle`, extending `bindings`.
///
/// Every new binding is pushed on `trail`; on failure the caller rewinds the
/// trail to its mark.
fn unify(
    table: &AtomTable,
    pattern: &Pattern,
    handle: Handle,
    constraints: &[Constraint],
    bindings: &mut BTreeMap<Variable, Handle>,
    trail: &mut Vec<Variable>,
) -> bool {
    let mut work: Vec<(&Pattern, Handle)> = vec![(pattern, handle)];
    while let Some((p, h)) = work.pop() {
        let Some(atom) = table.get(h) else {
            return false;
        };
        match p {
            Pattern::Variable { name } => match bindings.get(name) {
                Some(bound) => {
                    if *bound != h {
                        return false;
                    }
                }
                None => {
                    if !admits(constraints, name, h, atom, bindings) {
                        return false;
                    }
                    bindings.insert(name.clone(), h);
                    trail.push(name.clone());
                }
            },
            Pattern::Handle { handle } => {
                if *handle != h {
                    return false;
                }
            }
            Pattern::Node { atom_type, name } => match atom {
                Atom::Node {
                    atom_type: t,
                    name: n,
                } if t.is_a(atom_type) && n == name => {}
                _ => return false,
            },
            Pattern::Link {
                atom_type,
                outgoing,
            } => match atom {
                Atom::Link {
                    atom_type: t,
                    outgoing: out,
                } if t.is_a(atom_type) && out.len() == outgoing.len() => {
                    for (child, target) in outgoing.iter().zip(out.iter()).rev() {
                        work.push((child, *target));
                    }
                }
                _ => return false,
            },
        }
    }
    true
}

/// Whether binding `variable` to `handle` satisfies every constraint.
fn admits(
    constraints: &[Constraint],
    variable: &str,
    handle: Handle,
    atom: &Atom,
    bindings: &BTreeMap<Variable, Handle>,
) -> bool {
    constraints.iter().all(|c| match c {
        Constraint::Type {
            variable: v,
            atom_type,
            include_subtypes,
        } if v == variable => {
            if *include_subtypes {
                atom.atom_type().is_a(atom_type)
            } else {
                atom.atom_type() == atom_type
            }
        }
        Constraint::Equal { left, right } | Constraint::NotEqual { left, right }
            if left == variable || right == variable =>
        {
            let other = if left == variable { right } else { left };
            let want_equal = matches!(c, Constraint::Equal { .. });
            if other == variable {
                return want_equal;
            }
            match bindings.get(other) {
                Some(bound) => (*bound == handle) == want_equal,
                None => true,
            }
        }
        _ => true,
    })
}

impl AtomSpace {
    /// Match a pattern with optional constraints and result cap.
    pub fn match_pattern(
        &self,
        pattern: &Pattern,
        constraints: &[Constraint],
        max_results: Option<usize>,
    ) -> Result<Vec<Binding>> {
        let mut matcher = PatternMatcher::new(self);
        if let Some(max) = max_results {
            matcher = matcher.max_results(max);
        }
        matcher.run_query(&Query::from_pattern(pattern.clone()).constraints_from(constraints))
    }
}
