//! End-to-end checks of the public surface: compile a puzzle, establish
//! facts, ask for smallest MUSes, and verify the answers against the oracle.

use itertools::Itertools;
use test_log::test;

use musket::constraints::{Constraint, Mus};
use musket::explanations::MusDict;
use musket::literals::PuzLit;
use musket::pool::WorkerPool;
use musket::search::{CascadeMusFinder, SearchConfig};
use musket::solver::{SatOracle, SingleOutcome, Tristate};

fn cell(row: i32, col: i32) -> String {
    format!("r{row}c{col}")
}

/// An n-by-n Latin square: domain clauses per cell, disequalities per
/// row/column pair.
fn latin_square(n: i32) -> (Vec<(String, Vec<i32>)>, Vec<Constraint>) {
    let domain: Vec<i32> = (1..=n).collect();
    let mut vars = Vec::new();
    let mut constraints = Vec::new();
    for row in 1..=n {
        for col in 1..=n {
            vars.push((cell(row, col), domain.clone()));
            constraints.push(Constraint::clause_with_choices(
                format!("{} must have some value", cell(row, col)),
                domain.iter().map(|&v| PuzLit::eq(cell(row, col), v)).collect(),
                domain.iter().map(ToString::to_string).collect(),
            ));
        }
    }
    let mut diff = |a: String, b: String| {
        constraints.push(Constraint::clause_set(
            format!("{a} != {b}"),
            domain
                .iter()
                .map(|&v| vec![PuzLit::neq(a.clone(), v), PuzLit::neq(b.clone(), v)])
                .collect(),
        ));
    };
    for fixed in 1..=n {
        for first in 1..=n {
            for second in (first + 1)..=n {
                diff(cell(fixed, first), cell(fixed, second));
                diff(cell(first, fixed), cell(second, fixed));
            }
        }
    }
    (vars, constraints)
}

fn place(oracle: &mut SatOracle, var: &str, val: i32, n: i32) {
    oracle.add_fact(&PuzLit::eq(var, val));
    for other in 1..=n {
        if other != val {
            oracle.add_fact(&PuzLit::neq(var, other));
        }
    }
}

fn unexplained(oracle: &mut SatOracle) -> Vec<PuzLit> {
    let known = oracle.known_facts().to_vec();
    let forced = oracle.solve_all(&[]).unwrap();
    forced.into_iter().filter(|l| !known.contains(l)).sorted().dedup().collect()
}

/// Every witness must be unsatisfiable together with the negated literal.
fn assert_sound(oracle: &mut SatOracle, musdict: &MusDict) {
    for (lit, entry) in musdict.iter().map(|(l, e)| (l.clone(), e.clone())).collect_vec() {
        for mus in entry.witnesses() {
            assert_eq!(
                oracle.solve_with_constraints(&[lit.neg()], mus.constraints()).unwrap(),
                Tristate::False,
                "MUS does not prove {lit}"
            );
        }
    }
}

/// Removing any single constraint must break the proof. Only holds for
/// results whose deletion pass ran to completion (the failure-budget
/// truncation in the cascade deliberately accepts non-minimal cores), so
/// callers apply this where that is guaranteed.
fn assert_irredundant(oracle: &mut SatOracle, musdict: &MusDict) {
    for (lit, entry) in musdict.iter().map(|(l, e)| (l.clone(), e.clone())).collect_vec() {
        for mus in entry.witnesses() {
            for skip in 0..mus.len() {
                let reduced: Vec<Constraint> = mus
                    .constraints()
                    .iter()
                    .enumerate()
                    .filter(|&(i, _)| i != skip)
                    .map(|(_, c)| c.clone())
                    .collect();
                assert_ne!(
                    oracle.solve_with_constraints(&[lit.neg()], &reduced).unwrap(),
                    Tristate::False,
                    "MUS for {lit} has a redundant constraint"
                );
            }
        }
    }
}

#[test]
fn two_cell_scenario_returns_the_disequality() {
    let vars = [("a", vec![1, 2]), ("b", vec![1, 2])];
    let constraints = vec![
        Constraint::clause("a must have some value", vec![PuzLit::eq("a", 1), PuzLit::eq("a", 2)]),
        Constraint::clause("b must have some value", vec![PuzLit::eq("b", 1), PuzLit::eq("b", 2)]),
        Constraint::clause_set(
            "a != b",
            vec![
                vec![PuzLit::neq("a", 1), PuzLit::neq("b", 1)],
                vec![PuzLit::neq("a", 2), PuzLit::neq("b", 2)],
            ],
        ),
    ];
    let config = SearchConfig::default().cores(2);
    let mut oracle = SatOracle::new(&vars, constraints, &config).unwrap();
    oracle.add_fact(&PuzLit::eq("a", 1));

    let target = PuzLit::neq("b", 1);
    let mut finder = CascadeMusFinder::new(oracle, config);
    let musdict = finder.smallest_mus(std::slice::from_ref(&target)).unwrap();

    let entry = musdict.get(&target).expect("the deduction must be explained");
    assert_eq!(entry.best_size(), 1);
    assert_eq!(entry.witnesses().len(), 1);
    assert_eq!(entry.first().constraints()[0].name(), "a != b");
    assert_sound(finder.oracle_mut(), &musdict);
    assert_irredundant(finder.oracle_mut(), &musdict);
}

#[test]
fn latin_square_round_terminates_and_is_sound() {
    let n = 3;
    let (vars, constraints) = latin_square(n);
    let constraint_count = constraints.len();
    let config = SearchConfig::default().cores(2).base_size_mus(1).repeats(1);
    let mut oracle = SatOracle::new(&vars, constraints, &config).unwrap();
    place(&mut oracle, "r1c1", 1, n);
    place(&mut oracle, "r1c2", 2, n);
    place(&mut oracle, "r2c1", 2, n);

    assert!(matches!(oracle.solve_single(&[]).unwrap(), SingleOutcome::Unique(_)));

    let lits = unexplained(&mut oracle);
    assert!(!lits.is_empty());
    let mut finder = CascadeMusFinder::new(oracle, config);
    let musdict = finder.smallest_mus(&lits).unwrap();

    assert!(!musdict.is_empty());
    for (_, entry) in musdict.iter() {
        assert!(entry.best_size() <= constraint_count);
    }
    assert_sound(finder.oracle_mut(), &musdict);

    // the distance-1 fast path finds a singleton here and exits early, so
    // every recorded witness came out of a completed deletion pass
    assert_eq!(musdict.minimum(), Some(1));
    assert_irredundant(finder.oracle_mut(), &musdict);
}

#[test]
fn explanation_session_runs_to_completion() {
    let n = 3;
    let (vars, constraints) = latin_square(n);
    let config = SearchConfig::default().cores(2).base_size_mus(1).repeats(1);
    let mut oracle = SatOracle::new(&vars, constraints, &config).unwrap();
    place(&mut oracle, "r1c1", 1, n);
    place(&mut oracle, "r1c2", 2, n);
    place(&mut oracle, "r2c1", 2, n);
    let mut finder = CascadeMusFinder::new(oracle, config);

    // keep explaining and learning until nothing is forced anymore; the
    // cross-round cache gets revalidated on every later round
    for _round in 0..32 {
        let lits = unexplained(finder.oracle_mut());
        if lits.is_empty() {
            break;
        }
        let musdict = finder.smallest_mus(&lits).unwrap();
        assert!(!musdict.is_empty(), "a forced literal went unexplained");

        // merge the cheapest justification's companions into one step
        let best = musdict
            .iter()
            .min_by_key(|(_, entry)| entry.best_size())
            .map(|(lit, entry)| (lit.clone(), entry.first().clone()))
            .unwrap();
        let proved = finder.check_which_lits_a_mus_proves(&lits, &best.1).unwrap();
        assert!(proved.contains(&best.0));
        for lit in proved {
            finder.oracle_mut().add_fact(&lit);
        }
    }
    assert!(unexplained(finder.oracle_mut()).is_empty(), "session did not converge");

    // the finished grid is the unique solution
    match finder.oracle_mut().solve_single(&[]).unwrap() {
        SingleOutcome::Unique(model) => {
            // givens 1,2 / 2,.. force rows (1,2,3), (2,3,1), (3,1,2)
            assert!(model.contains(&PuzLit::eq("r2c2", 3)));
            assert!(model.contains(&PuzLit::eq("r3c3", 2)));
        }
        other => panic!("expected a unique solution, got {other:?}"),
    }
}

#[test]
fn duplicate_justifications_collapse_across_literals() {
    let vars = [("a", vec![1, 2]), ("b", vec![1, 2])];
    let shared = Constraint::clause_set(
        "a != b",
        vec![
            vec![PuzLit::neq("a", 1), PuzLit::neq("b", 1)],
            vec![PuzLit::neq("a", 2), PuzLit::neq("b", 2)],
        ],
    );
    let constraints = vec![
        Constraint::clause("a must have some value", vec![PuzLit::eq("a", 1), PuzLit::eq("a", 2)]),
        Constraint::clause("b must have some value", vec![PuzLit::eq("b", 1), PuzLit::eq("b", 2)]),
        shared.clone(),
    ];
    let config = SearchConfig::default().cores(0);
    let mut oracle = SatOracle::new(&vars, constraints, &config).unwrap();
    oracle.add_fact(&PuzLit::eq("a", 1));
    oracle.add_fact(&PuzLit::neq("a", 2));

    let lits = [PuzLit::neq("b", 1), PuzLit::eq("b", 2)];
    let mut finder = CascadeMusFinder::new(oracle, config);
    let mut musdict = finder.smallest_mus(&lits).unwrap();

    // `b != 1` is justified by the disequality alone; after dedup at most one
    // literal may still carry that exact witness
    musdict.remove_duplicates();
    let carriers = musdict
        .iter()
        .filter(|(_, entry)| entry.witnesses().contains(&Mus::new(vec![shared.clone()])))
        .count();
    assert!(carriers <= 1);
}

#[test]
fn pool_map_results_cover_every_argument_exactly_once() {
    let vars = [("x", vec![1, 2, 3])];
    let constraints = vec![Constraint::clause(
        "x must have some value",
        (1..=3).map(|v| PuzLit::eq("x", v)).collect(),
    )];
    let config = SearchConfig::default();
    let oracle = SatOracle::new(&vars, constraints, &config).unwrap();

    for workers in [1usize, 2, 5] {
        let mut pool = WorkerPool::new(&oracle, workers).unwrap();
        let args: Vec<u32> = (0..41).collect();
        let mut squares = pool.map(args, |_oracle, x| (x, u64::from(x) * u64::from(x))).unwrap();
        squares.sort_unstable();
        assert_eq!(
            squares,
            (0..41u32).map(|x| (x, u64::from(x) * u64::from(x))).collect::<Vec<_>>()
        );
    }
}

#[test]
fn statistics_from_workers_flow_back_to_the_oracle() {
    let vars = [("a", vec![1, 2]), ("b", vec![1, 2])];
    let constraints = vec![
        Constraint::clause("a must have some value", vec![PuzLit::eq("a", 1), PuzLit::eq("a", 2)]),
        Constraint::clause_set(
            "a != b",
            vec![
                vec![PuzLit::neq("a", 1), PuzLit::neq("b", 1)],
                vec![PuzLit::neq("a", 2), PuzLit::neq("b", 2)],
            ],
        ),
    ];
    let config = SearchConfig::default().cores(2);
    let mut oracle = SatOracle::new(&vars, constraints, &config).unwrap();
    oracle.add_fact(&PuzLit::eq("a", 1));
    let mut finder = CascadeMusFinder::new(oracle, config);

    assert_eq!(finder.oracle().stats().solves, 0);
    let target = PuzLit::neq("b", 1);
    finder.smallest_mus(std::slice::from_ref(&target)).unwrap();
    assert!(finder.oracle().stats().solves > 0, "worker solve counts were not merged");
}
