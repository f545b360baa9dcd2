use std::collections::{BTreeSet, HashMap};

use rustsat::types::Lit;

use crate::constraints::Constraint;
use crate::literals::PuzLit;

/// Bidirectional mapping between domain literals and solver literals, plus
/// the selector literal guarding each constraint.
///
/// Built once when the problem is compiled and shared read-only between the
/// controller and every worker thread. The codec also precomputes, for every
/// literal, the constraints mentioning its negation directly (distance 1) and
/// the constraints reachable through one more hop (distance 2); the tiny-MUS
/// fast path searches those neighborhoods only.
#[derive(Debug)]
pub struct LitCodec {
    lit2sat: HashMap<PuzLit, Lit>,
    sat2lits: HashMap<Lit, BTreeSet<PuzLit>>,
    selector2con: HashMap<Lit, Constraint>,
    con2selector: HashMap<Constraint, Lit>,
    selectors: Vec<Lit>,
    var_lits: Vec<Lit>,
    d1: HashMap<PuzLit, Vec<Lit>>,
    d2: HashMap<PuzLit, Vec<Lit>>,
    n_vars: u32,
}

impl LitCodec {
    /// The solver literal for a domain literal.
    ///
    /// # Panics
    ///
    /// Panics if the literal was never registered. An assumption set built
    /// from unknown literals indicates a wiring bug in the caller, and
    /// silently ignoring it could poison every cached result downstream.
    pub fn sat_lit(&self, lit: &PuzLit) -> Lit {
        *self
            .lit2sat
            .get(lit)
            .unwrap_or_else(|| panic!("literal not known to the solver: {lit}"))
    }

    /// The domain literals a solver literal stands for. Several literals may
    /// share one solver literal in derived encodings.
    pub fn lits_for(&self, sat: Lit) -> Option<&BTreeSet<PuzLit>> {
        self.sat2lits.get(&sat)
    }

    /// The constraint guarded by a selector literal, if `sat` is one.
    pub fn constraint_for(&self, sat: Lit) -> Option<&Constraint> {
        self.selector2con.get(&sat)
    }

    /// Whether `sat` is a constraint selector.
    pub fn is_selector(&self, sat: Lit) -> bool {
        self.selector2con.contains_key(&sat)
    }

    /// The selector literal guarding `con`.
    ///
    /// # Panics
    ///
    /// Panics if the constraint was never registered, for the same reason as
    /// [`LitCodec::sat_lit`].
    pub fn selector_for(&self, con: &Constraint) -> Lit {
        *self
            .con2selector
            .get(con)
            .unwrap_or_else(|| panic!("constraint not known to the solver: {con}"))
    }

    /// Every constraint selector, in sorted order.
    pub fn selectors(&self) -> &[Lit] {
        &self.selectors
    }

    /// The solver literal of every assignment variable, in sorted order.
    pub fn var_lits(&self) -> &[Lit] {
        &self.var_lits
    }

    /// The constraint selectors within the given distance of `lit`: at
    /// distance 1 the constraints mentioning `lit`'s negation, at distance 2
    /// additionally everything reachable through one shared literal.
    pub fn neighbours(&self, lit: &PuzLit, distance: u32) -> &[Lit] {
        let index = if distance <= 1 { &self.d1 } else { &self.d2 };
        index.get(lit).map_or(&[], Vec::as_slice)
    }

    /// Number of solver variables allocated, including selectors.
    pub const fn n_vars(&self) -> u32 {
        self.n_vars
    }
}

/// Accumulates literal and selector registrations during compilation.
#[derive(Debug, Default)]
pub(crate) struct CodecBuilder {
    lit2sat: HashMap<PuzLit, Lit>,
    sat2lits: HashMap<Lit, BTreeSet<PuzLit>>,
    selector2con: HashMap<Lit, Constraint>,
    con2selector: HashMap<Constraint, Lit>,
    var_lits: BTreeSet<Lit>,
    next_var: u32,
}

impl CodecBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Allocates the next solver variable, returned as its positive literal.
    pub(crate) fn fresh_var(&mut self) -> Lit {
        let lit = Lit::positive(self.next_var);
        self.next_var += 1;
        lit
    }

    pub(crate) fn sat_lit(&self, lit: &PuzLit) -> Lit {
        *self
            .lit2sat
            .get(lit)
            .unwrap_or_else(|| panic!("constraint mentions an unregistered literal: {lit}"))
    }

    /// Registers `lit` as holding exactly when `sat` is true; the negations
    /// of both are linked as well. A negative `sat` is normalized first.
    pub(crate) fn register_lit(&mut self, lit: &PuzLit, sat: Lit) {
        if sat.is_neg() {
            self.register_lit(&lit.neg(), !sat);
            return;
        }
        self.lit2sat.insert(lit.clone(), sat);
        self.lit2sat.insert(lit.neg(), !sat);
        self.sat2lits.entry(sat).or_default().insert(lit.clone());
        self.sat2lits.entry(!sat).or_default().insert(lit.neg());
        self.var_lits.insert(sat);
        self.next_var = self.next_var.max(sat.var().idx32() + 1);
    }

    /// Makes sure the variable counter covers `lit` (used when auxiliary
    /// variables arrive inside a pre-compiled formula).
    pub(crate) fn note_lit(&mut self, lit: Lit) {
        self.next_var = self.next_var.max(lit.var().idx32() + 1);
    }

    /// Registers `sat` as the selector guarding `con`.
    ///
    /// # Panics
    ///
    /// Panics if `con` already has a selector; double registration would make
    /// cores ambiguous.
    pub(crate) fn register_selector(&mut self, con: Constraint, sat: Lit) {
        assert!(
            !self.con2selector.contains_key(&con),
            "constraint registered under two selectors: {con}"
        );
        self.selector2con.insert(sat, con.clone());
        self.con2selector.insert(con, sat);
        self.next_var = self.next_var.max(sat.var().idx32() + 1);
    }

    /// Freezes the registrations and precomputes the locality indexes.
    pub(crate) fn finish(self) -> LitCodec {
        let mut d1: HashMap<PuzLit, BTreeSet<Lit>> =
            self.lit2sat.keys().map(|l| (l.clone(), BTreeSet::new())).collect();
        let mut connected: HashMap<PuzLit, BTreeSet<PuzLit>> =
            self.lit2sat.keys().map(|l| (l.clone(), BTreeSet::new())).collect();
        for (&sel, con) in &self.selector2con {
            let neglits: Vec<PuzLit> = con.lits().iter().map(PuzLit::neg).collect();
            for lit in &neglits {
                d1.entry(lit.clone()).or_default().insert(sel);
                connected.entry(lit.clone()).or_default().extend(neglits.iter().cloned());
            }
        }
        let mut d2 = HashMap::with_capacity(d1.len());
        for (lit, near) in &connected {
            let mut reachable: BTreeSet<Lit> = d1.get(lit).cloned().unwrap_or_default();
            for other in near {
                if let Some(sels) = d1.get(other) {
                    reachable.extend(sels.iter().copied());
                }
            }
            d2.insert(lit.clone(), reachable.into_iter().collect::<Vec<_>>());
        }
        let selectors: BTreeSet<Lit> = self.selector2con.keys().copied().collect();
        LitCodec {
            lit2sat: self.lit2sat,
            sat2lits: self.sat2lits,
            selector2con: self.selector2con,
            con2selector: self.con2selector,
            selectors: selectors.into_iter().collect(),
            var_lits: self.var_lits.into_iter().collect(),
            d1: d1.into_iter().map(|(k, v)| (k, v.into_iter().collect())).collect(),
            d2,
            n_vars: self.next_var,
        }
    }
}
