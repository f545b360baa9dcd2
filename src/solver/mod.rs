mod codec;
mod oracle;
#[cfg(test)]
mod tests;

pub use codec::LitCodec;
pub use oracle::{OracleStats, SatOracle, SingleOutcome};

/// Outcome of one oracle call: satisfiable, unsatisfiable, or inconclusive
/// because a conflict budget ran out first.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Tristate {
    /// The query is satisfiable.
    True,
    /// The query is unsatisfiable.
    False,
    /// The solver gave up within its budget; neither verdict holds.
    Undef,
}
