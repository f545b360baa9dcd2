use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Builds a deterministic RNG from a string seed.
pub(crate) fn rng_from_seed(seed: &str) -> fastrand::Rng {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    fastrand::Rng::with_seed(hasher.finish())
}

/// Splits `items` into `parts` lists of near-equal length, preserving order.
/// The first `len % parts` lists get one extra element.
pub(crate) fn split_evenly<T>(items: Vec<T>, parts: usize) -> Vec<Vec<T>> {
    assert!(parts > 0, "cannot split into zero parts");
    let base = items.len() / parts;
    let extra = items.len() % parts;
    let mut out = Vec::with_capacity(parts);
    let mut rest = items;
    for i in 0..parts {
        let take = base + usize::from(i < extra);
        let tail = rest.split_off(take);
        out.push(rest);
        rest = tail;
    }
    out
}
