//! The core-shrinking algorithm: given an assumption literal and a candidate
//! set of constraint selectors, repeatedly call the oracle to shrink the set
//! to a smaller unsatisfiable core.
//!
//! The strategies run in a fixed order, each optional via configuration and
//! each operating on the same working set. Every accepted shrink comes
//! straight from an UNSAT verdict, so the invariant "assumption plus working
//! set is unsatisfiable" holds by construction and is never re-checked.

use std::collections::BTreeSet;

use anyhow::Result;
use fastrand::Rng;
use itertools::Itertools;
use log::{debug, info};
use rustsat::types::Lit;

use crate::constraints::Mus;
use crate::literals::PuzLit;
use crate::search::SearchConfig;
use crate::solver::{SatOracle, Tristate};

/// Shrink fractions for the random geometric chop, steepest first.
const CHOP_SCHEDULE: [f64; 12] = [
    1.0 / 2.0,
    1.0 / 4.0,
    1.0 / 8.0,
    1.0 / 16.0,
    1.0 / 32.0,
    1.0 / 64.0,
    1.0 / 128.0,
    1.0 / 256.0,
    1.0 / 512.0,
    1.0 / 1024.0,
    1.0 / 2048.0,
    1.0 / 4096.0,
];

/// A chop schedule entry is only used while the expected number of random
/// tries it needs stays within this bound.
const CHOP_TRIES_BOUND: f64 = 10.0;

fn assume_and(assume: Lit, rest: &[Lit]) -> Vec<Lit> {
    let mut lits = Vec::with_capacity(rest.len() + 1);
    lits.push(assume);
    lits.extend_from_slice(rest);
    lits
}

/// Runs `basic_core` over `assume + candidates` and keeps only selector
/// literals of the answer, so the working set always counts constraints.
fn core_of(oracle: &mut SatOracle, assume: Lit, candidates: &[Lit]) -> Result<Option<Vec<Lit>>> {
    let core = oracle.basic_core(&assume_and(assume, candidates))?;
    Ok(core.map(|lits| {
        lits.into_iter().filter(|&l| oracle.codec().is_selector(l)).collect()
    }))
}

fn mus_of(oracle: &SatOracle, core: &[Lit]) -> Mus {
    Mus::new(core.iter().filter_map(|&l| oracle.codec().constraint_for(l).cloned()).collect())
}

fn selectors_of(oracle: &SatOracle, mus: &Mus) -> Vec<Lit> {
    mus.iter().map(|con| oracle.codec().selector_for(con)).collect()
}

/// The tiny-MUS fast path: restrict the candidates to the precomputed
/// neighborhood of `assume` (distance 1 or 2; anything else means all
/// constraints), take one core, then run a bounded deletion pass that gives
/// up once more than `bad_limit` deletions have failed. Cheap, and catches
/// most justifications that are local to the target literal.
pub(crate) fn tiny_mus(
    oracle: &mut SatOracle,
    assume: &PuzLit,
    distance: u32,
    bad_limit: usize,
) -> Result<Option<Mus>> {
    let sat_assume = oracle.codec().sat_lit(assume);
    let candidates: Vec<Lit> = match distance {
        1 | 2 => oracle.codec().neighbours(assume, distance).to_vec(),
        _ => oracle.codec().selectors().to_vec(),
    };
    let Some(mut core) = core_of(oracle, sat_assume, &candidates)? else {
        return Ok(None);
    };
    let mut bad_count = 1usize;
    let snapshot = core.clone();
    for lit in snapshot {
        if core.len() > 1 && core.contains(&lit) {
            let to_test = core.iter().copied().filter(|&l| l != lit).collect_vec();
            if let Some(smaller) = core_of(oracle, sat_assume, &to_test)? {
                core = smaller;
            } else {
                bad_count += 1;
                if bad_count > bad_limit {
                    debug!("tiny MUS for {assume} abandoned at {} left", core.len());
                    return Ok(None);
                }
            }
        }
    }
    debug!("tiny MUS for {assume}: size {} with {bad_count} failures", core.len());
    Ok(Some(mus_of(oracle, &core)))
}

/// Tests whether a previously found MUS still proves `assume` on its own:
/// one budgeted core call over exactly the cached selector set.
pub(crate) fn mus_still_proves(
    oracle: &mut SatOracle,
    assume: &PuzLit,
    mus: &Mus,
) -> Result<bool> {
    let sat_assume = oracle.codec().sat_lit(assume);
    let selectors = selectors_of(oracle, mus);
    Ok(oracle.basic_core(&assume_and(sat_assume, &selectors))?.is_some())
}

/// Shrinks a candidate set to an unsatisfiable core of at most `min_size`
/// constraints (when a strategy can certify that early), or minimizes fully
/// when `min_size` is `usize::MAX`. `initial` seeds the working set with a
/// cached MUS instead of the full candidate list; if that seed no longer
/// proves `assume`, the search reports `None` and the caller drops the cache
/// entry.
pub(crate) fn shrink_mus(
    oracle: &mut SatOracle,
    rng: &mut Rng,
    assume: &PuzLit,
    min_size: usize,
    config: &SearchConfig,
    initial: Option<&Mus>,
) -> Result<Option<Mus>> {
    let sat_assume = oracle.codec().sat_lit(assume);

    let mut core: Vec<Lit> = match initial {
        Some(mus) => {
            let mut lits = selectors_of(oracle, mus);
            rng.shuffle(&mut lits);
            lits
        }
        None if config.check_close_first => {
            let close: BTreeSet<Lit> =
                oracle.codec().neighbours(assume, 1).iter().copied().collect();
            let mut first = close.iter().copied().collect_vec();
            let mut rest = oracle
                .codec()
                .selectors()
                .iter()
                .copied()
                .filter(|l| !close.contains(l))
                .collect_vec();
            rng.shuffle(&mut first);
            rng.shuffle(&mut rest);
            first.extend(rest);
            first
        }
        None => {
            let mut lits = oracle.codec().selectors().to_vec();
            rng.shuffle(&mut lits);
            lits
        }
    };

    // A cached seed may have been invalidated by newly learnt facts.
    if initial.is_some() && oracle.basic_core(&assume_and(sat_assume, &core))?.is_none() {
        return Ok(None);
    }

    if config.prechop_mus {
        prechop(oracle, sat_assume, &mut core, min_size)?;
    }

    if config.try_many_chop_mus {
        if let Chop::Miss = many_chop(oracle, rng, sat_assume, &mut core, min_size)? {
            return Ok(None);
        }
    }

    if config.min_precheck_mus {
        let step = core.len() / min_size.saturating_mul(2).max(1);
        if step > 1 && !budgeted_scan(oracle, sat_assume, &mut core, min_size, step)? {
            return Ok(None);
        }
    }

    if config.min_precheck_steps_mus {
        let mut step = core.len() / min_size.saturating_mul(2).max(1);
        while step > 2 {
            let before = core.len();
            if !budgeted_scan(oracle, sat_assume, &mut core, min_size, step)? {
                return Ok(None);
            }
            if core.len() == before {
                debug!("budgeted scan stuck for {assume} at {} left", core.len());
                return Ok(None);
            }
            step = core.len() / min_size.saturating_mul(2).max(1);
        }
    }

    if config.galloping_mus {
        return gallop(oracle, assume, sat_assume, core, min_size);
    }

    final_deletion(oracle, assume, sat_assume, core, min_size)
}

/// Repeatedly tries to drop a large suffix, halving the suffix length on
/// failure; stops at the first success.
fn prechop(oracle: &mut SatOracle, assume: Lit, core: &mut Vec<Lit>, min_size: usize) -> Result<()> {
    let mut step = core.len() / 2;
    while step > 1 && core.len() > min_size {
        let to_test = &core[..core.len() - step];
        if let Some(smaller) = core_of(oracle, assume, to_test)? {
            debug_assert!(smaller.len() < core.len());
            *core = smaller;
            break;
        }
        step = (step / 2).min(core.len() / 2);
    }
    Ok(())
}

enum Chop {
    Hit,
    Miss,
    Skipped,
}

/// Picks the steepest shrink fraction whose expected number of independent
/// random tries stays within [`CHOP_TRIES_BOUND`] for the given target size,
/// then attempts that many shuffled suffix drops. This stage prunes
/// probabilistically: if no try lands the whole search fails fast rather than
/// falling back to slower strategies.
fn many_chop(
    oracle: &mut SatOracle,
    rng: &mut Rng,
    assume: Lit,
    core: &mut Vec<Lit>,
    min_size: usize,
) -> Result<Chop> {
    let exponent = min_size as f64 + 1.0;
    let mut squash = *CHOP_SCHEDULE.last().expect("schedule is not empty");
    let mut tries = f64::INFINITY;
    for fraction in CHOP_SCHEDULE {
        squash = fraction;
        tries = (1.0 / (1.0 - fraction)).powf(exponent);
        if tries <= CHOP_TRIES_BOUND {
            break;
        }
    }
    if tries > CHOP_TRIES_BOUND {
        debug!("skipping random chop: target {min_size} too large");
        return Ok(Chop::Skipped);
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let step = (core.len() as f64 * squash) as usize;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let tries = tries as usize;
    debug!("random chop: squash {squash}, step {step}, {tries} tries over {}", core.len());
    for attempt in 0..tries {
        rng.shuffle(core);
        let to_test = &core[..core.len() - step];
        if let Some(smaller) = core_of(oracle, assume, to_test)? {
            debug!("random chop hit on try {attempt}: {} left", smaller.len());
            *core = smaller;
            return Ok(Chop::Hit);
        }
    }
    debug!("random chop missed after {tries} tries");
    Ok(Chop::Miss)
}

/// One pass of chunkwise removal probing under the conflict budget. Returns
/// `false` once more than `min_size` chunks are *confirmed* unremovable, a
/// probabilistic sign that the true minimum exceeds the target.
/// Budget-exhausted probes advance the cursor without counting as failures.
fn budgeted_scan(
    oracle: &mut SatOracle,
    assume: Lit,
    core: &mut Vec<Lit>,
    min_size: usize,
    step: usize,
) -> Result<bool> {
    let mut index = 0usize;
    let mut bad_count = 0usize;
    while index * step < core.len() {
        let lo = index * step;
        let hi = ((index + 1) * step).min(core.len());
        let to_test: Vec<Lit> = core[..lo].iter().chain(&core[hi..]).copied().collect();
        let verdict = oracle.solve_sat_limited(&assume_and(assume, &to_test))?;
        debug!("scan chunk {index} (step {step}, {} left): {verdict:?}", core.len());
        match verdict {
            Tristate::False => *core = to_test,
            Tristate::True => {
                index += 1;
                bad_count += 1;
                if bad_count > min_size {
                    debug!("scan rejected after {bad_count} confirmed failures");
                    return Ok(false);
                }
            }
            Tristate::Undef => index += 1,
        }
    }
    Ok(true)
}

/// Galloping minimization: keep a cursor and a step; successful block
/// removals double the step, failures halve it, and a step of zero confirms
/// the literal at the cursor as necessary. Once the cursor reaches
/// `min_size`, the prefix must already be unsatisfiable on its own or the
/// search fails. Amortizes to near-linear oracle calls against the naive
/// one-deletion-per-literal pass.
fn gallop(
    oracle: &mut SatOracle,
    label: &PuzLit,
    assume: Lit,
    mut core: Vec<Lit>,
    min_size: usize,
) -> Result<Option<Mus>> {
    let mut pos = 0usize;
    let mut step = 1usize;
    let mut calls = 0u64;
    loop {
        // hunt: find a removable block, growing the step while removals keep
        // succeeding
        loop {
            if pos >= core.len() {
                debug!("gallop for {label} done: size {} after {calls} calls", core.len());
                return Ok(Some(mus_of(oracle, &core)));
            }
            let to_test = without_block(&core, pos, step);
            calls += 1;
            if oracle.solve_sat(&assume_and(assume, &to_test))? == Tristate::False {
                core = to_test;
                step *= 2;
            } else {
                break;
            }
        }
        // focus: retry with shrinking steps down to a single literal
        step /= 2;
        while step > 0 {
            let to_test = without_block(&core, pos, step);
            calls += 1;
            if oracle.solve_sat(&assume_and(assume, &to_test))? == Tristate::False {
                core = to_test;
            }
            step /= 2;
        }
        step = 1;
        pos += 1;
        if pos >= min_size {
            let head = &core[..pos.min(core.len())];
            calls += 1;
            if oracle.solve_sat(&assume_and(assume, head))? == Tristate::False {
                debug!("gallop for {label}: accepting prefix of {} after {calls} calls", head.len());
                return Ok(Some(mus_of(oracle, head)));
            }
            debug!("gallop for {label} failed at target {min_size} after {calls} calls");
            return Ok(None);
        }
    }
}

fn without_block(core: &[Lit], pos: usize, step: usize) -> Vec<Lit> {
    let hi = (pos + step).min(core.len());
    core[..pos].iter().chain(&core[hi..]).copied().collect()
}

/// The closing linear deletion pass. Counts failed deletions; when the
/// failure count reaches `min_size`, the first `min_size` elements are
/// tested as-is and accepted if already unsatisfiable, a deliberate "good
/// enough" cutoff instead of continued exhaustive search.
fn final_deletion(
    oracle: &mut SatOracle,
    label: &PuzLit,
    assume: Lit,
    mut core: Vec<Lit>,
    min_size: usize,
) -> Result<Option<Mus>> {
    let mut steps = 0u64;
    let mut bad_count = 0usize;
    let snapshot = core.clone();
    for lit in snapshot {
        if !core.contains(&lit) {
            continue;
        }
        let to_test = core.iter().copied().filter(|&l| l != lit).collect_vec();
        steps += 1;
        match core_of(oracle, assume, &to_test)? {
            Some(smaller) => core = smaller,
            None => {
                bad_count += 1;
                if bad_count == min_size {
                    let head = &core[..min_size.min(core.len())];
                    if head.len() < core.len()
                        && oracle.solve_sat(&assume_and(assume, head))? != Tristate::False
                    {
                        info!("core for {label} failed: target {min_size}, {steps} deletions");
                        return Ok(None);
                    }
                    info!(
                        "core for {label} accepted by failure budget: size {} after {steps} deletions",
                        head.len()
                    );
                    return Ok(Some(mus_of(oracle, head)));
                }
            }
        }
    }
    info!(
        "core for {label}: size {} after {steps} deletions, {bad_count} failed (target {min_size})",
        core.len()
    );
    Ok(Some(mus_of(oracle, &core)))
}
