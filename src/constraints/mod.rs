use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use itertools::Itertools;

use crate::literals::PuzLit;

/// A named, immutable clause-set over assignment literals.
///
/// Constraints are created once when a problem is built and shared from then
/// on. Equality, ordering and hashing go by the flattened clause
/// representation, not the name, so two phrasings of the same logical content
/// compare equal and deduplicate structurally.
#[derive(Clone, Debug)]
pub struct Constraint(Arc<ConstraintInner>);

#[derive(Debug)]
struct ConstraintInner {
    name: String,
    clauses: Vec<Vec<PuzLit>>,
    lits: Vec<PuzLit>,
    choices: Option<Vec<(PuzLit, String)>>,
}

impl Constraint {
    /// A constraint holding a single clause (a disjunction of literals).
    pub fn clause(name: impl Into<String>, lits: Vec<PuzLit>) -> Self {
        Self::build(name.into(), vec![lits], None)
    }

    /// A single-clause constraint whose explanation lists the still-possible
    /// alternatives. `choice_names[i]` names the alternative asserted by
    /// `lits[i]`.
    pub fn clause_with_choices(
        name: impl Into<String>,
        lits: Vec<PuzLit>,
        choice_names: Vec<String>,
    ) -> Self {
        assert_eq!(lits.len(), choice_names.len(), "one choice name per literal");
        let choices = lits.iter().cloned().zip(choice_names).collect();
        Self::build(name.into(), vec![lits], Some(choices))
    }

    /// A constraint holding several clauses (their conjunction).
    pub fn clause_set(name: impl Into<String>, clauses: Vec<Vec<PuzLit>>) -> Self {
        Self::build(name.into(), clauses, None)
    }

    fn build(
        name: String,
        mut clauses: Vec<Vec<PuzLit>>,
        choices: Option<Vec<(PuzLit, String)>>,
    ) -> Self {
        for clause in &mut clauses {
            clause.sort();
        }
        clauses.sort();
        let lits = clauses.iter().flatten().cloned().sorted().dedup().collect();
        Self(Arc::new(ConstraintInner { name, clauses, lits, choices }))
    }

    /// The constraint's display name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The flattened clause representation compiled into the oracle.
    pub fn clauses(&self) -> &[Vec<PuzLit>] {
        &self.0.clauses
    }

    /// All literals this constraint mentions, sorted and deduplicated.
    pub fn lits(&self) -> &[PuzLit] {
        &self.0.lits
    }

    /// Renders the constraint against the currently known facts: the name,
    /// plus the alternatives whose negations are not yet known.
    pub fn explain(&self, known: &[PuzLit]) -> String {
        let Some(choices) = &self.0.choices else {
            return self.0.name.clone();
        };
        let remaining = choices
            .iter()
            .filter(|(lit, _)| !known.contains(&lit.neg()))
            .map(|(_, name)| name.as_str())
            .join(", ");
        format!("{} (Choices are: {})", self.0.name, remaining)
    }
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        self.0.clauses == other.0.clauses
    }
}

impl Eq for Constraint {}

impl PartialOrd for Constraint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Constraint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.clauses.cmp(&other.0.clauses)
    }
}

impl Hash for Constraint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.clauses.hash(state);
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// A minimal unsatisfiable subset: constraints whose conjunction with the
/// known facts and a negated target literal is unsatisfiable, kept as a
/// sorted list so equal subsets compare and hash identically.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Mus(Vec<Constraint>);

impl Mus {
    /// Builds a MUS from an unordered constraint list.
    pub fn new(mut constraints: Vec<Constraint>) -> Self {
        constraints.sort();
        Self(constraints)
    }

    /// Number of constraints in the subset.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` for the empty subset (a fact forced by the problem design).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The constraints, in sorted order.
    pub fn constraints(&self) -> &[Constraint] {
        &self.0
    }

    /// Iterates over the constraints in sorted order.
    pub fn iter(&self) -> std::slice::Iter<'_, Constraint> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a Mus {
    type Item = &'a Constraint;
    type IntoIter = std::slice::Iter<'a, Constraint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
