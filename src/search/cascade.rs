//! The cascading search controller: drives the core-shrinking algorithm
//! across an escalating size threshold until every literal has a small
//! enough MUS, fanning the individual searches out to a worker pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use log::info;

use crate::constraints::Mus;
use crate::explanations::MusDict;
use crate::literals::PuzLit;
use crate::pool::WorkerPool;
use crate::search::shrink::{mus_still_proves, shrink_mus, tiny_mus};
use crate::search::SearchConfig;
use crate::solver::{OracleStats, SatOracle};
use crate::util::rng_from_seed;

/// Stands in for "no MUS known yet" in the shared best-size counter.
const MAX_MUS: usize = 999_999_999;

/// Hands out worker pools to the search phases, honoring the reuse and
/// reset knobs, and keeps the statistics drained from retired pools.
struct PoolSource<'a> {
    oracle: &'a SatOracle,
    config: &'a SearchConfig,
    held: Option<WorkerPool>,
    stats: OracleStats,
}

impl<'a> PoolSource<'a> {
    fn new(oracle: &'a SatOracle, config: &'a SearchConfig) -> Self {
        Self { oracle, config, held: None, stats: OracleStats::default() }
    }

    fn get(&mut self) -> Result<&mut WorkerPool> {
        if self.held.is_none() {
            self.held = Some(WorkerPool::new(self.oracle, self.config.cores)?);
        }
        Ok(self.held.as_mut().expect("pool was just created"))
    }

    /// Ends a phase: without `reuse_pool`, drains and retires the pool so the
    /// next phase starts with fresh worker solvers.
    fn finish_phase(&mut self) -> Result<()> {
        if !self.config.reuse_pool {
            self.retire()?;
        }
        Ok(())
    }

    fn retire(&mut self) -> Result<()> {
        if let Some(mut pool) = self.held.take() {
            self.stats.merge(&pool.drain_stats()?);
        }
        Ok(())
    }

    fn into_stats(mut self) -> Result<OracleStats> {
        self.retire()?;
        Ok(self.stats)
    }
}

/// The search controller invoked once per puzzle-solving step.
///
/// Owns the oracle (callers mutate the known facts through
/// [`CascadeMusFinder::oracle_mut`] between rounds) and the previous round's
/// MUS cache. The configuration is captured at construction and never
/// changes mid-search.
#[derive(Debug)]
pub struct CascadeMusFinder {
    oracle: SatOracle,
    config: SearchConfig,
    best_cache: MusDict,
}

impl CascadeMusFinder {
    /// Builds a finder over a compiled oracle.
    pub fn new(oracle: SatOracle, config: SearchConfig) -> Self {
        Self { oracle, config, best_cache: MusDict::new() }
    }

    /// The underlying oracle.
    pub const fn oracle(&self) -> &SatOracle {
        &self.oracle
    }

    /// Mutable access to the oracle, for `add_fact`/`push`/`pop` between
    /// rounds.
    pub fn oracle_mut(&mut self) -> &mut SatOracle {
        &mut self.oracle
    }

    /// Finds, for every literal in `lits`, the smallest MUS the configured
    /// effort can reach this round.
    ///
    /// Phases: the distance-1 tiny-MUS fast path (with a global early exit
    /// once any literal has a singleton justification, since singletons
    /// dominate everything else for the caller), an unrestricted tiny pass to
    /// prime the search, revalidation of the previous round's cache, then
    /// either the distance-2 tiny pass or the full cascading search. The
    /// returned dictionary under-populates on failure; it never panics for an
    /// ordinary search miss.
    pub fn smallest_mus(&mut self, lits: &[PuzLit]) -> Result<MusDict> {
        let config = self.config.clone();
        let mut musdict = MusDict::new();
        if lits.is_empty() {
            if config.use_cache {
                self.best_cache = MusDict::new();
            }
            return Ok(musdict);
        }
        let mut pools = PoolSource::new(&self.oracle, &config);

        let outcome = Self::run_phases(&mut pools, &config, &self.best_cache, lits, &mut musdict);
        let stats = pools.into_stats()?;
        self.oracle.merge_stats(&stats);
        outcome?;

        if config.use_cache {
            self.best_cache = musdict.clone();
        }
        Ok(musdict)
    }

    fn run_phases(
        pools: &mut PoolSource,
        config: &SearchConfig,
        cache: &MusDict,
        lits: &[PuzLit],
        musdict: &mut MusDict,
    ) -> Result<()> {
        if config.check_small1 {
            get_tiny_muses(pools, lits, musdict, 1, config.small_repeats, 3)?;
            info!("smallest MUS after distance-1 pass: {:?}", musdict.minimum());
            if musdict.minimum().is_some_and(|m| m <= 1) {
                return Ok(());
            }
        }

        // unrestricted tiny pass, to prime the cascade with easy wins
        get_tiny_muses(
            pools,
            lits,
            musdict,
            u32::MAX,
            config.small_repeats,
            config.base_size_mus.saturating_mul(2),
        )?;
        info!("smallest MUS after unrestricted pass: {:?}", musdict.minimum());
        if musdict.minimum().is_some_and(|m| m <= 1) {
            return Ok(());
        }

        if config.use_cache {
            check_cached_muses(pools, config, lits, cache, musdict)?;
        }

        if config.check_small2 {
            get_tiny_muses(pools, lits, musdict, 2, config.small_repeats, 5)?;
            info!("distance-2 pass replaced the cascade");
        } else {
            cascade(pools, config, lits, musdict)?;
        }
        Ok(())
    }

    /// Tests in parallel which of `candidates` the given MUS also proves.
    /// The same constraint subset is often unsatisfiable with several
    /// different negated literals, and the caller merges those deductions
    /// into one explanation step.
    pub fn check_which_lits_a_mus_proves(
        &mut self,
        candidates: &[PuzLit],
        mus: &Mus,
    ) -> Result<Vec<PuzLit>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let mut pools = PoolSource::new(&self.oracle, &self.config);
        let shared = mus.clone();
        let outcome = pools.get()?.map(candidates.to_vec(), move |oracle, lit| {
            let proves = mus_still_proves(oracle, &lit.neg(), &shared);
            (lit, proves)
        });
        let stats = pools.into_stats()?;
        self.oracle.merge_stats(&stats);

        let mut proved = Vec::new();
        for (lit, proves) in outcome? {
            if proves? {
                proved.push(lit);
            }
        }
        proved.sort();
        Ok(proved)
    }
}

fn get_tiny_muses(
    pools: &mut PoolSource,
    lits: &[PuzLit],
    musdict: &mut MusDict,
    distance: u32,
    repeats: usize,
    bad_limit: usize,
) -> Result<()> {
    info!(
        "tiny MUS pass: distance {distance}, {} literals, {repeats} repeats",
        lits.len()
    );
    let tasks: Vec<PuzLit> =
        (0..repeats).flat_map(|_| lits.iter().cloned()).collect();
    let results = pools.get()?.map(tasks, move |oracle, lit| {
        let mus = tiny_mus(oracle, &lit.neg(), distance, bad_limit);
        (lit, mus)
    })?;
    for (lit, mus) in results {
        musdict.merge(lit, mus?);
    }
    pools.finish_phase()
}

/// Revalidates the previous round's cache: for every cached MUS, re-run the
/// shrink seeded with exactly that constraint set, confirming it still holds
/// under the newly known facts and opportunistically shrinking it further.
/// Entries that no longer hold just drop out; the cache is speculative.
fn check_cached_muses(
    pools: &mut PoolSource,
    config: &SearchConfig,
    lits: &[PuzLit],
    cache: &MusDict,
    musdict: &mut MusDict,
) -> Result<()> {
    let tasks: Vec<(PuzLit, Mus)> = lits
        .iter()
        .filter_map(|lit| cache.get(lit).map(|entry| (lit, entry)))
        .flat_map(|(lit, entry)| {
            entry.witnesses().iter().map(|mus| (lit.clone(), mus.clone()))
        })
        .collect();
    if tasks.is_empty() {
        return Ok(());
    }
    info!("revalidating {} cached MUSes", tasks.len());
    let shared_config = config.clone();
    let results = pools.get()?.map(tasks, move |oracle, (lit, old)| {
        let mut rng = rng_from_seed("X");
        let mus =
            shrink_mus(oracle, &mut rng, &lit.neg(), usize::MAX, &shared_config, Some(&old));
        (lit, mus)
    })?;
    for (lit, mus) in results {
        musdict.merge(lit, mus?);
    }
    pools.finish_phase()
}

/// The size-escalating loop. A shared best-size counter (relaxed atomics: a
/// performance hint, not a correctness mechanism) lets queued tasks skip
/// their work once any worker has already found something at least as good.
fn cascade(
    pools: &mut PoolSource,
    config: &SearchConfig,
    lits: &[PuzLit],
    musdict: &mut MusDict,
) -> Result<()> {
    let found = Arc::new(AtomicUsize::new(musdict.minimum().unwrap_or(MAX_MUS)));
    let required = Arc::new(AtomicUsize::new(MAX_MUS));
    let ceiling = config.size_ceiling.max(config.base_size_mus + 1);

    for min_size in config.base_size_mus..ceiling {
        required.store(min_size, Ordering::Relaxed);
        if config.early_exit && found.load(Ordering::Relaxed) <= min_size {
            info!("cascade early exit: size {} already known", found.load(Ordering::Relaxed));
            return Ok(());
        }
        info!(
            "cascade: {} x {} searches at size {min_size}",
            config.repeats,
            lits.len()
        );
        // repeat-major order, so repeated searches for one literal land on
        // different workers
        let tasks: Vec<(PuzLit, String)> = (0..config.repeats)
            .flat_map(|repeat| {
                lits.iter().map(move |lit| (lit.clone(), format!("{repeat}:{lit}:{min_size}")))
            })
            .collect();
        let task_config = config.clone();
        let task_found = Arc::clone(&found);
        let task_required = Arc::clone(&required);
        let results = pools.get()?.map(tasks, move |oracle, (lit, seed)| {
            if task_config.early_exit
                && task_found.load(Ordering::Relaxed) <= task_required.load(Ordering::Relaxed)
            {
                return (lit, Ok(None));
            }
            let mut rng = rng_from_seed(&seed);
            let target = min_size.saturating_mul(task_config.cascade_mult);
            let mus = shrink_mus(oracle, &mut rng, &lit.neg(), target, &task_config, None);
            if let Ok(Some(found_mus)) = &mus {
                task_found.fetch_min(found_mus.len(), Ordering::Relaxed);
            }
            (lit, mus)
        })?;
        for (lit, mus) in results {
            let mus = mus?;
            if let Some(found_mus) = &mus {
                if found_mus.len() < min_size {
                    info!("found a smaller MUS: {} < {min_size}", found_mus.len());
                } else if found_mus.len() > min_size {
                    info!("found a bigger MUS: {} > {min_size}", found_mus.len());
                }
            }
            musdict.merge(lit, mus);
        }
        if musdict.minimum().is_some_and(|m| m <= min_size) {
            return Ok(());
        }
        if config.reset_solver_mus {
            pools.finish_phase()?;
        }
    }
    pools.finish_phase()
}
