#![doc = include_str!("../README.md")]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, missing_docs)]
#![allow(
    clippy::similar_names,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

/// Named constraints and minimal unsatisfiable subsets over them.
pub mod constraints;
/// The per-literal MUS dictionary with cross-step reuse.
pub mod explanations;
/// Domain-level assignment literals.
pub mod literals;
/// Worker threads, each owning a private solver instance.
pub mod pool;
/// Core shrinking and the cascading search controller.
pub mod search;
/// The incremental SAT oracle and the literal/variable codec.
pub mod solver;
mod util;
