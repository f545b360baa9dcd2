
use crate::constraints::Constraint;
use crate::literals::PuzLit;

/// An `n`-by-`n` Latin square: cell variables `r{row}c{col}` with domain
/// `1..=n`, one "has a value" constraint per cell, and one disequality
/// constraint per cell pair sharing a row or column.
pub(crate) fn latin_square(n: i32) -> (Vec<(String, Vec<i32>)>, Vec<Constraint>) {
    let cell = |row: i32, col: i32| format!("r{row}c{col}");
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

/// Marks a cell as solved: the equality fact plus the disequalities for the
/// rest of the domain, the way an interactive session records a placed value.
pub(crate) fn place(
    oracle: &mut crate::solver::SatOracle,
    var: &str,
    val: i32,
    domain: std::ops::RangeInclusive<i32>,
) {
    oracle.add_fact(&PuzLit::eq(var, val));
    for other in domain {
        if other != val {
            oracle.add_fact(&PuzLit::neq(var, other));
        }
    }
}
