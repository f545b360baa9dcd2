use rustsat::types::Lit;

use crate::constraints::Constraint;
use crate::literals::PuzLit;
use crate::search::SearchConfig;
use crate::solver::SatOracle;

fn two_cell_oracle() -> SatOracle {
    let vars = [("a", vec![1, 2]), ("b", vec![1, 2])];
    let constraints = vec![
        Constraint::clause("a has a value", vec![PuzLit::eq("a", 1), PuzLit::eq("a", 2)]),
        Constraint::clause_set(
            "a != b",
            vec![
                vec![PuzLit::neq("a", 1), PuzLit::neq("b", 1)],
                vec![PuzLit::neq("a", 2), PuzLit::neq("b", 2)],
            ],
        ),
        Constraint::clause("b has a value", vec![PuzLit::eq("b", 1), PuzLit::eq("b", 2)]),
    ];
    SatOracle::new(&vars, constraints, &SearchConfig::default()).unwrap()
}

#[test]
fn literals_map_both_ways() {
    let oracle = two_cell_oracle();
    let codec = oracle.codec();
    let eq = PuzLit::eq("a", 1);
    let sat = codec.sat_lit(&eq);
    assert_eq!(codec.sat_lit(&eq.neg()), !sat);
    assert!(codec.lits_for(sat).unwrap().contains(&eq));
    assert!(codec.lits_for(!sat).unwrap().contains(&eq.neg()));
    assert_eq!(codec.var_lits().len(), 4);
}

#[test]
#[should_panic(expected = "literal not known")]
fn unknown_literal_is_a_wiring_bug() {
    let oracle = two_cell_oracle();
    oracle.codec().sat_lit(&PuzLit::eq("zebra", 9));
}

#[test]
fn selectors_map_back_to_their_constraints() {
    let oracle = two_cell_oracle();
    let codec = oracle.codec();
    assert_eq!(codec.selectors().len(), 3);
    for &selector in codec.selectors() {
        assert!(codec.is_selector(selector));
        let con = codec.constraint_for(selector).unwrap();
        assert_eq!(codec.selector_for(con), selector);
    }
    assert!(!codec.is_selector(codec.sat_lit(&PuzLit::eq("a", 1))));
}

#[test]
fn neighbourhoods_grow_with_distance() {
    let diff = |a: &str, b: &str| {
        Constraint::clause_set(
            format!("{a} != {b}"),
            vec![
                vec![PuzLit::neq(a.to_string(), 1), PuzLit::neq(b.to_string(), 1)],
                vec![PuzLit::neq(a.to_string(), 2), PuzLit::neq(b.to_string(), 2)],
            ],
        )
    };
    let vars = [("a", vec![1, 2]), ("b", vec![1, 2]), ("c", vec![1, 2])];
    let constraints = vec![diff("a", "b"), diff("b", "c")];
    let oracle = SatOracle::new(&vars, constraints, &SearchConfig::default()).unwrap();
    let codec = oracle.codec();
    let name = |l: Lit| codec.constraint_for(l).unwrap().name().to_string();

    // distance 1: only the constraint mentioning the literal's negation
    let d1: Vec<String> =
        codec.neighbours(&PuzLit::eq("a", 1), 1).iter().map(|&l| name(l)).collect();
    assert_eq!(d1, ["a != b"]);

    // distance 2 reaches "b != c" through the shared b literals
    let d2: Vec<String> =
        codec.neighbours(&PuzLit::eq("a", 1), 2).iter().map(|&l| name(l)).collect();
    assert_eq!(d2.len(), 2);
    assert!(d2.contains(&"a != b".to_string()));
    assert!(d2.contains(&"b != c".to_string()));

    assert!(codec.neighbours(&PuzLit::eq("zebra", 9), 1).is_empty());
}
