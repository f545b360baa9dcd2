use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::info;
use rustsat::solvers::{Solve, SolveIncremental};
use rustsat::types::{Clause, Lit, TernaryVal, Var};

use crate::constraints::Constraint;
use crate::literals::PuzLit;
use crate::search::SearchConfig;
use crate::solver::codec::CodecBuilder;
use crate::solver::{LitCodec, Tristate};

/// Solves taking longer than this are reported through the log.
const LONG_SOLVE: Duration = Duration::from_secs(5);

/// Aborts the search when the remaining conflict budget runs out.
///
/// BatSat has no public conflict budget, but its callbacks see every learnt
/// clause (one per conflict) and its `stop` hook is polled from the search
/// loop, which is enough to rebuild one. The counter restarts with each
/// solve; an exhausted budget surfaces as an interrupted (`Undef`) result.
#[derive(Debug, Default)]
struct ConflictBudget {
    limit: Option<u64>,
    conflicts: u64,
}

impl batsat::Callbacks for ConflictBudget {
    fn on_start(&mut self) {
        self.conflicts = 0;
    }

    fn on_new_clause(&mut self, _c: &[batsat::Lit], kind: batsat::ClauseKind) {
        if matches!(kind, batsat::ClauseKind::Learnt) {
            self.conflicts += 1;
        }
    }

    fn stop(&self) -> bool {
        self.limit.is_some_and(|limit| self.conflicts >= limit)
    }
}

type Backend = rustsat_batsat::Solver<ConflictBudget>;

/// Running counters over oracle invocations.
///
/// Resettable and additive, so statistics gathered inside worker threads can
/// be merged back into the parent oracle at pool barriers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OracleStats {
    /// Number of satisfiability queries issued.
    pub solves: u64,
    /// Number of unsat-core extractions attempted.
    pub core_calls: u64,
    /// Cumulative wall time spent inside the SAT backend.
    pub solve_time: Duration,
}

impl OracleStats {
    /// Zeroes all counters.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Adds another statistics record onto this one.
    pub fn merge(&mut self, other: &Self) {
        self.solves += other.solves;
        self.core_calls += other.core_calls;
        self.solve_time += other.solve_time;
    }
}

/// Result of [`SatOracle::solve_single`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SingleOutcome {
    /// No solution under the current facts and assumptions.
    Unsat,
    /// More than one solution exists.
    Multiple,
    /// Exactly one solution, given as its assignment literals.
    Unique(Vec<PuzLit>),
}

/// Everything needed to bootstrap an identical oracle in another thread:
/// the compiled formula and codec are shared, the fact lists are copied.
#[derive(Debug)]
pub(crate) struct OracleBlueprint {
    clauses: Arc<Vec<Clause>>,
    codec: Arc<LitCodec>,
    known_sat: Vec<Lit>,
    known: Vec<PuzLit>,
    budget: Option<u32>,
    use_cores: bool,
}

impl OracleBlueprint {
    /// Builds a fresh oracle from the blueprint.
    pub(crate) fn build(&self) -> Result<SatOracle> {
        let solver = bootstrap(&self.clauses, self.codec.n_vars())?;
        Ok(SatOracle {
            solver,
            codec: Arc::clone(&self.codec),
            clauses: Arc::clone(&self.clauses),
            known_sat: self.known_sat.clone(),
            known: self.known.clone(),
            stack: Vec::new(),
            stats: OracleStats::default(),
            budget: self.budget,
            use_cores: self.use_cores,
        })
    }
}

fn bootstrap(clauses: &[Clause], n_vars: u32) -> Result<Backend> {
    let mut solver = Backend::default();
    if n_vars > 0 {
        solver.reserve(Var::new(n_vars - 1))?;
    }
    for clause in clauses {
        solver.add_clause_ref(clause)?;
    }
    Ok(solver)
}

const fn tri(result: rustsat::solvers::SolverResult) -> Tristate {
    match result {
        rustsat::solvers::SolverResult::Sat => Tristate::True,
        rustsat::solvers::SolverResult::Unsat => Tristate::False,
        rustsat::solvers::SolverResult::Interrupted => Tristate::Undef,
    }
}

/// Incremental SAT oracle over a compiled constraint problem.
///
/// Wraps the backend solver together with the literal codec, the selector
/// literals guarding each constraint, and the stack-scoped known facts. Known
/// facts are held as persistent assumptions rather than clauses, which keeps
/// them revertible (`push`/`pop`) and lets `reboot` rebuild the solver from
/// the pristine clause list at any time.
#[derive(Debug)]
pub struct SatOracle {
    solver: Backend,
    codec: Arc<LitCodec>,
    clauses: Arc<Vec<Clause>>,
    known_sat: Vec<Lit>,
    known: Vec<PuzLit>,
    stack: Vec<(usize, usize)>,
    stats: OracleStats,
    budget: Option<u32>,
    use_cores: bool,
}

impl SatOracle {
    /// Compiles a problem from `(variable, domain)` pairs and constraints.
    ///
    /// Every `(variable, value)` pair gets one solver variable; every
    /// constraint gets a selector variable `s` and its clauses are added as
    /// `clause ∨ ¬s`, so asserting `s` enforces the constraint.
    pub fn new<S: AsRef<str>>(
        vars: &[(S, Vec<i32>)],
        constraints: Vec<Constraint>,
        config: &SearchConfig,
    ) -> Result<Self> {
        let mut builder = CodecBuilder::new();
        for (name, domain) in vars {
            for &value in domain {
                let sat = builder.fresh_var();
                builder.register_lit(&PuzLit::eq(name.as_ref(), value), sat);
            }
        }
        let mut clauses = Vec::new();
        for con in constraints {
            let selector = builder.fresh_var();
            for clause in con.clauses() {
                let mut sat_clause: Vec<Lit> =
                    clause.iter().map(|lit| builder.sat_lit(lit)).collect();
                sat_clause.push(!selector);
                clauses.push(Clause::from(&sat_clause[..]));
            }
            builder.register_selector(con, selector);
        }
        Self::assemble(builder.finish(), clauses, config)
    }

    /// Builds an oracle from an already compiled formula: the hard clauses,
    /// the domain-literal map, and the selector guarding each constraint.
    /// Selector implications must already be part of `clauses`.
    pub fn from_parts(
        clauses: Vec<Clause>,
        litmap: Vec<(PuzLit, Lit)>,
        conmap: Vec<(Constraint, Lit)>,
        config: &SearchConfig,
    ) -> Result<Self> {
        let mut builder = CodecBuilder::new();
        for (lit, sat) in &litmap {
            builder.register_lit(lit, *sat);
        }
        for (con, selector) in conmap {
            builder.register_selector(con, selector);
        }
        for clause in &clauses {
            for &lit in clause.iter() {
                builder.note_lit(lit);
            }
        }
        Self::assemble(builder.finish(), clauses, config)
    }

    fn assemble(codec: LitCodec, clauses: Vec<Clause>, config: &SearchConfig) -> Result<Self> {
        let blueprint = OracleBlueprint {
            clauses: Arc::new(clauses),
            codec: Arc::new(codec),
            known_sat: Vec::new(),
            known: Vec::new(),
            budget: config.solve_limited.then_some(config.solve_limited_budget),
            use_cores: config.use_unsat_cores,
        };
        blueprint.build()
    }

    /// The literal/variable codec this oracle was compiled with.
    pub fn codec(&self) -> &LitCodec {
        &self.codec
    }

    /// Decides satisfiability with **all** constraints enabled, plus the
    /// known facts, plus `assume`.
    pub fn solve(&mut self, assume: &[PuzLit]) -> Result<Tristate> {
        let lits = self.full_assumptions(assume);
        self.solve_lits(&lits, None)
    }

    /// Decides satisfiability with exactly the given constraints enabled,
    /// plus the known facts, plus `assume`. This is the solving mode of the
    /// MUS machinery; a returned `False` means `active ∪ assume ∪ facts` is
    /// an unsatisfiable set.
    pub fn solve_with_constraints(
        &mut self,
        assume: &[PuzLit],
        active: &[Constraint],
    ) -> Result<Tristate> {
        let mut lits: Vec<Lit> = active.iter().map(|c| self.codec.selector_for(c)).collect();
        lits.extend(assume.iter().map(|l| self.codec.sat_lit(l)));
        self.solve_lits(&lits, None)
    }

    /// The assignment literals of the model found by the last successful
    /// solve: the equality literal where the solver set a variable true, the
    /// disequality literals where it set one false.
    pub fn model_lits(&self) -> Result<Vec<PuzLit>> {
        let mut out = Vec::new();
        for &var_lit in self.codec.var_lits() {
            let holds = match self.solver.lit_val(var_lit)? {
                TernaryVal::True => var_lit,
                TernaryVal::False => !var_lit,
                TernaryVal::DontCare => continue,
            };
            if let Some(lits) = self.codec.lits_for(holds) {
                out.extend(lits.iter().cloned());
            }
        }
        Ok(out)
    }

    /// Checks whether the problem has exactly one solution under the current
    /// facts and `assume`, probing each assignment variable for an
    /// alternative model.
    pub fn solve_single(&mut self, assume: &[PuzLit]) -> Result<SingleOutcome> {
        if self.solve(assume)? != Tristate::True {
            return Ok(SingleOutcome::Unsat);
        }
        let mut values = Vec::with_capacity(self.codec.var_lits().len());
        for &var_lit in self.codec.var_lits() {
            values.push((var_lit, self.solver.lit_val(var_lit)?));
        }
        let model = self.model_lits()?;
        let base = self.full_assumptions(assume);
        for &(var_lit, value) in &values {
            let flipped = match value {
                TernaryVal::True => !var_lit,
                TernaryVal::False => var_lit,
                TernaryVal::DontCare => continue,
            };
            let mut probe = base.clone();
            probe.push(flipped);
            if self.solve_lits(&probe, None)? == Tristate::True {
                return Ok(SingleOutcome::Multiple);
            }
        }
        Ok(SingleOutcome::Unique(model))
    }

    /// Every assignment literal forced by the problem together with the
    /// current facts and `assume`: for each assignment variable both
    /// polarities are probed, and variables with only one satisfiable
    /// polarity contribute their literals.
    pub fn solve_all(&mut self, assume: &[PuzLit]) -> Result<Vec<PuzLit>> {
        let base = self.full_assumptions(assume);
        let var_lits = self.codec.var_lits().to_vec();
        let mut forced = Vec::new();
        for var_lit in var_lits {
            let mut probe = base.clone();
            probe.push(var_lit);
            let pos = self.solve_lits(&probe, None)? == Tristate::True;
            *probe.last_mut().expect("probe is never empty") = !var_lit;
            let neg = self.solve_lits(&probe, None)? == Tristate::True;
            if !(pos && neg) {
                let holds = if pos { var_lit } else { !var_lit };
                if let Some(lits) = self.codec.lits_for(holds) {
                    forced.extend(lits.iter().cloned());
                }
            }
        }
        Ok(forced)
    }

    /// Permanently asserts a literal as a known fact. Reversible only through
    /// [`SatOracle::pop`].
    pub fn add_fact(&mut self, lit: &PuzLit) {
        if self.known.contains(lit) {
            return;
        }
        let sat = self.codec.sat_lit(lit);
        self.known.push(lit.clone());
        if !self.known_sat.contains(&sat) {
            self.known_sat.push(sat);
        }
    }

    /// The known facts, in insertion order.
    pub fn known_facts(&self) -> &[PuzLit] {
        &self.known
    }

    /// Saves the current fact stack.
    pub fn push(&mut self) {
        self.stack.push((self.known.len(), self.known_sat.len()));
    }

    /// Restores the fact stack to the matching [`SatOracle::push`].
    ///
    /// # Panics
    ///
    /// Panics if there was no matching `push`.
    pub fn pop(&mut self) {
        let (known, known_sat) = self.stack.pop().expect("pop without a matching push");
        self.known.truncate(known);
        self.known_sat.truncate(known_sat);
    }

    /// Renders a constraint's explanation against the current known facts.
    pub fn explain(&self, con: &Constraint) -> String {
        con.explain(&self.known)
    }

    /// Discards all learnt state by rebuilding the backend from the stored
    /// clause list in a freshly shuffled order. Known facts survive: they are
    /// assumptions, not clauses. Used to escape pathological solver states
    /// and to decorrelate repeated searches.
    pub fn reboot(&mut self, seed: u64) -> Result<()> {
        let mut order: Vec<usize> = (0..self.clauses.len()).collect();
        fastrand::Rng::with_seed(seed).shuffle(&mut order);
        let mut solver = Backend::default();
        if self.codec.n_vars() > 0 {
            solver.reserve(Var::new(self.codec.n_vars() - 1))?;
        }
        for index in order {
            solver.add_clause_ref(&self.clauses[index])?;
        }
        self.solver = solver;
        Ok(())
    }

    /// A fresh oracle over the same formula, codec and facts, with zeroed
    /// statistics. This is what each pool worker receives at startup.
    pub fn worker_copy(&self) -> Result<Self> {
        self.blueprint().build()
    }

    pub(crate) fn blueprint(&self) -> OracleBlueprint {
        OracleBlueprint {
            clauses: Arc::clone(&self.clauses),
            codec: Arc::clone(&self.codec),
            known_sat: self.known_sat.clone(),
            known: self.known.clone(),
            budget: self.budget,
            use_cores: self.use_cores,
        }
    }

    /// The statistics gathered so far.
    pub const fn stats(&self) -> &OracleStats {
        &self.stats
    }

    /// Zeroes the statistics.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// Adds statistics gathered elsewhere (typically by pool workers).
    pub fn merge_stats(&mut self, other: &OracleStats) {
        self.stats.merge(other);
    }

    /// Solver-literal-level satisfiability, unbudgeted. The known facts are
    /// always appended to the assumptions.
    pub(crate) fn solve_sat(&mut self, lits: &[Lit]) -> Result<Tristate> {
        self.solve_lits(lits, None)
    }

    /// Solver-literal-level satisfiability under the configured conflict
    /// budget; `Undef` when the budget ran out before a verdict.
    pub(crate) fn solve_sat_limited(&mut self, lits: &[Lit]) -> Result<Tristate> {
        self.solve_lits(lits, self.budget)
    }

    /// A subset of `lits` sufficient for unsatisfiability, or `None` when the
    /// set is satisfiable or the budget ran out first. Callers must treat
    /// both the same way: not provably removable within budget.
    pub(crate) fn basic_core(&mut self, lits: &[Lit]) -> Result<Option<Vec<Lit>>> {
        self.stats.core_calls += 1;
        match self.solve_sat_limited(lits)? {
            Tristate::True | Tristate::Undef => Ok(None),
            Tristate::False => {
                if self.use_cores {
                    let mut core = self.solver.core()?;
                    core.retain(|l| !self.known_sat.contains(l));
                    debug_assert!(core.iter().all(|l| lits.contains(l)));
                    Ok(Some(core))
                } else {
                    Ok(Some(lits.to_vec()))
                }
            }
        }
    }

    fn full_assumptions(&self, assume: &[PuzLit]) -> Vec<Lit> {
        let mut lits: Vec<Lit> = self.codec.selectors().to_vec();
        lits.extend(assume.iter().map(|l| self.codec.sat_lit(l)));
        lits
    }

    fn solve_lits(&mut self, lits: &[Lit], budget: Option<u32>) -> Result<Tristate> {
        let mut assumptions = lits.to_vec();
        assumptions.extend_from_slice(&self.known_sat);
        if budget.is_some() {
            self.solver.batsat_mut().cb_mut().limit = budget.map(u64::from);
        }
        let start = Instant::now();
        let result = self.solver.solve_assumps(&assumptions);
        let elapsed = start.elapsed();
        if budget.is_some() {
            self.solver.batsat_mut().cb_mut().limit = None;
        }
        self.stats.solves += 1;
        self.stats.solve_time += elapsed;
        if elapsed > LONG_SOLVE {
            info!("long solve: {} assumptions, {elapsed:?}", assumptions.len());
        }
        Ok(tri(result?))
    }
}
