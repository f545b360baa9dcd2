/// Configuration for one MUS search round.
///
/// Loaded once before a round and never mutated mid-search: worker threads
/// capture a snapshot at pool startup, and changing knobs under them would
/// desynchronize the search. All knobs default to the values the search was
/// tuned with.
#[allow(clippy::struct_excessive_bools)]
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SearchConfig {
    /// Worker threads for the parallel phases. `0` or `1` runs everything
    /// sequentially in-process.
    pub cores: usize,
    /// How many times to look for very tiny cores per literal.
    pub small_repeats: usize,
    /// How many searches to run per literal at each cascade size.
    pub repeats: usize,
    /// Bound shrinking solves by a conflict budget, so a single hard query
    /// cannot stall the whole search.
    pub solve_limited: bool,
    /// The conflict budget for bounded solves.
    pub solve_limited_budget: u32,
    /// Seed each round with the previous round's MUSes and revalidate them.
    pub use_cache: bool,
    /// Stop a cascade round as soon as a small enough MUS is known, and let
    /// in-flight tasks skip their work once one is.
    pub early_exit: bool,
    /// When officially looking for a MUS of size `k`, search up to
    /// `cascade_mult * k`: not much more work, and often wanted later.
    pub cascade_mult: usize,
    /// Run the distance-1 tiny-MUS fast path first.
    pub check_small1: bool,
    /// Run the distance-2 tiny-MUS pass *instead of* the full cascade.
    pub check_small2: bool,
    /// Order shrink candidates so constraints near the target literal come
    /// first.
    pub check_close_first: bool,
    /// Smallest MUS size the cascade starts looking for.
    pub base_size_mus: usize,
    /// Shrink via the solver's unsat cores instead of plain deletion.
    pub use_unsat_cores: bool,
    /// Restart the worker pool (fresh solver state) for each cascade size.
    pub reset_solver_mus: bool,
    /// Keep one worker pool alive across the phases of a round.
    pub reuse_pool: bool,
    /// Minimize with galloping search instead of the final deletion pass.
    pub galloping_mus: bool,
    /// Start by chopping a large suffix off the candidate set.
    pub prechop_mus: bool,
    /// Try a handful of independently shuffled random chops; give up on the
    /// whole search if none lands.
    pub try_many_chop_mus: bool,
    /// One budgeted chunk-removal scan before minimizing.
    pub min_precheck_mus: bool,
    /// Budgeted chunk-removal scans iterated to a fixpoint.
    pub min_precheck_steps_mus: bool,
    /// Last-resort bound on the cascade's size escalation. The full
    /// constraint set is always a valid core, so the loop terminates long
    /// before this in practice.
    pub size_ceiling: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cores: 8,
            small_repeats: 1,
            repeats: 2,
            solve_limited: true,
            solve_limited_budget: 10_000,
            use_cache: true,
            early_exit: true,
            cascade_mult: 2,
            check_small1: true,
            check_small2: false,
            check_close_first: false,
            base_size_mus: 4,
            use_unsat_cores: true,
            reset_solver_mus: false,
            reuse_pool: false,
            galloping_mus: false,
            prechop_mus: false,
            try_many_chop_mus: true,
            min_precheck_mus: false,
            min_precheck_steps_mus: false,
            size_ceiling: 10_000,
        }
    }
}

impl SearchConfig {
    /// Sets the number of worker threads.
    #[must_use]
    pub const fn cores(mut self, cores: usize) -> Self {
        self.cores = cores;
        self
    }

    /// Sets the tiny-MUS repeat count.
    #[must_use]
    pub const fn small_repeats(mut self, repeats: usize) -> Self {
        self.small_repeats = repeats;
        self
    }

    /// Sets the per-size cascade repeat count.
    #[must_use]
    pub const fn repeats(mut self, repeats: usize) -> Self {
        self.repeats = repeats;
        self
    }

    /// Enables or disables conflict-budgeted solving.
    #[must_use]
    pub const fn solve_limited(mut self, limited: bool) -> Self {
        self.solve_limited = limited;
        self
    }

    /// Sets the conflict budget for bounded solves.
    #[must_use]
    pub const fn solve_limited_budget(mut self, budget: u32) -> Self {
        self.solve_limited_budget = budget;
        self
    }

    /// Enables or disables the cross-round MUS cache.
    #[must_use]
    pub const fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Enables or disables cooperative early exit.
    #[must_use]
    pub const fn early_exit(mut self, early_exit: bool) -> Self {
        self.early_exit = early_exit;
        self
    }

    /// Sets the size-target headroom multiplier.
    #[must_use]
    pub const fn cascade_mult(mut self, mult: usize) -> Self {
        self.cascade_mult = mult;
        self
    }

    /// Enables or disables the distance-1 fast path.
    #[must_use]
    pub const fn check_small1(mut self, check: bool) -> Self {
        self.check_small1 = check;
        self
    }

    /// Enables or disables the distance-2 pass (replacing the cascade).
    #[must_use]
    pub const fn check_small2(mut self, check: bool) -> Self {
        self.check_small2 = check;
        self
    }

    /// Enables or disables close-first candidate ordering.
    #[must_use]
    pub const fn check_close_first(mut self, close_first: bool) -> Self {
        self.check_close_first = close_first;
        self
    }

    /// Sets the cascade's starting size.
    #[must_use]
    pub const fn base_size_mus(mut self, size: usize) -> Self {
        self.base_size_mus = size;
        self
    }

    /// Enables or disables unsat-core-driven shrinking.
    #[must_use]
    pub const fn use_unsat_cores(mut self, use_cores: bool) -> Self {
        self.use_unsat_cores = use_cores;
        self
    }

    /// Enables or disables pool restarts per cascade size.
    #[must_use]
    pub const fn reset_solver_mus(mut self, reset: bool) -> Self {
        self.reset_solver_mus = reset;
        self
    }

    /// Enables or disables pool reuse across a round's phases.
    #[must_use]
    pub const fn reuse_pool(mut self, reuse: bool) -> Self {
        self.reuse_pool = reuse;
        self
    }

    /// Enables or disables galloping minimization.
    #[must_use]
    pub const fn galloping_mus(mut self, galloping: bool) -> Self {
        self.galloping_mus = galloping;
        self
    }

    /// Enables or disables the prechop stage.
    #[must_use]
    pub const fn prechop_mus(mut self, prechop: bool) -> Self {
        self.prechop_mus = prechop;
        self
    }

    /// Enables or disables the random geometric chop stage.
    #[must_use]
    pub const fn try_many_chop_mus(mut self, chop: bool) -> Self {
        self.try_many_chop_mus = chop;
        self
    }

    /// Enables or disables the single budgeted scan stage.
    #[must_use]
    pub const fn min_precheck_mus(mut self, precheck: bool) -> Self {
        self.min_precheck_mus = precheck;
        self
    }

    /// Enables or disables the fixpoint budgeted scan stage.
    #[must_use]
    pub const fn min_precheck_steps_mus(mut self, precheck: bool) -> Self {
        self.min_precheck_steps_mus = precheck;
        self
    }

    /// Sets the cascade's last-resort size ceiling.
    #[must_use]
    pub const fn size_ceiling(mut self, ceiling: usize) -> Self {
        self.size_ceiling = ceiling;
        self
    }
}
