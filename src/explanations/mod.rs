use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};

use log::{debug, info};

use crate::constraints::Mus;
use crate::literals::PuzLit;

/// The witnesses recorded for one literal: the smallest MUS size seen so far
/// and every distinct MUS of that size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MusEntry {
    best_size: usize,
    witnesses: Vec<Mus>,
}

impl MusEntry {
    /// Size of every witness in this entry.
    pub const fn best_size(&self) -> usize {
        self.best_size
    }

    /// All distinct witnesses of the best size, first found first.
    pub fn witnesses(&self) -> &[Mus] {
        &self.witnesses
    }

    /// The representative (first found) witness.
    pub fn first(&self) -> &Mus {
        &self.witnesses[0]
    }
}

/// Per-literal record of the smallest MUSes found so far.
///
/// Every entry holds witnesses of one size only; a strictly smaller MUS found
/// later replaces the whole list. Instances live for one search round and may
/// seed the next round's cache.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MusDict {
    entries: BTreeMap<PuzLit, MusEntry>,
}

impl MusDict {
    /// An empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of literals with at least one recorded MUS.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a MUS is recorded for `lit`.
    pub fn contains(&self, lit: &PuzLit) -> bool {
        self.entries.contains_key(lit)
    }

    /// The entry recorded for `lit`.
    pub fn get(&self, lit: &PuzLit) -> Option<&MusEntry> {
        self.entries.get(lit)
    }

    /// The representative MUS recorded for `lit`.
    pub fn first(&self, lit: &PuzLit) -> Option<&Mus> {
        self.entries.get(lit).map(MusEntry::first)
    }

    /// The recorded literals in sorted order.
    pub fn literals(&self) -> impl Iterator<Item = &PuzLit> {
        self.entries.keys()
    }

    /// Iterates over `(literal, entry)` pairs in literal order.
    pub fn iter(&self) -> impl Iterator<Item = (&PuzLit, &MusEntry)> {
        self.entries.iter()
    }

    /// The smallest recorded MUS size over all literals, `None` if empty.
    pub fn minimum(&self) -> Option<usize> {
        self.entries.values().map(MusEntry::best_size).min()
    }

    /// Records a search result for `lit`.
    ///
    /// An absent result is a no-op. A first result is inserted, a smaller one
    /// replaces the entry, an equal-sized one is appended unless already
    /// present. Reporting a result *worse* than the recorded best is a
    /// contract violation and panics: a searcher must never regress an entry
    /// unless the caller raised the size target, and callers doing that go
    /// through [`MusDict::merge`] instead.
    pub fn update(&mut self, lit: PuzLit, mus: Option<Mus>) {
        let Some(mus) = mus else { return };
        match self.entries.entry(lit) {
            Entry::Vacant(slot) => {
                info!("first MUS for {}: size {}", slot.key(), mus.len());
                slot.insert(MusEntry { best_size: mus.len(), witnesses: vec![mus] });
            }
            Entry::Occupied(slot) => {
                let lit = slot.key().clone();
                let entry = slot.into_mut();
                assert!(
                    mus.len() <= entry.best_size,
                    "MUS search for {lit} reported size {} but size {} is already recorded",
                    mus.len(),
                    entry.best_size
                );
                if mus.len() < entry.best_size {
                    info!("new best MUS for {lit}: {} -> {}", entry.best_size, mus.len());
                    entry.best_size = mus.len();
                    entry.witnesses = vec![mus];
                } else if entry.witnesses.contains(&mus) {
                    debug!("duplicate MUS for {lit}");
                } else {
                    debug!("another best MUS for {lit} ({} now)", entry.witnesses.len() + 1);
                    entry.witnesses.push(mus);
                }
            }
        }
    }

    /// Keep-smallest merge for callers searching under a raised size target:
    /// results no better than the recorded entry are dropped silently instead
    /// of tripping the [`MusDict::update`] contract check.
    pub fn merge(&mut self, lit: PuzLit, mus: Option<Mus>) {
        let Some(mus) = mus else { return };
        if let Some(entry) = self.entries.get(&lit) {
            if mus.len() > entry.best_size {
                debug!("dropping MUS of size {} for {lit}, have {}", mus.len(), entry.best_size);
                return;
            }
        }
        self.update(lit, Some(mus));
    }

    /// Removes MUS values that already appear under an earlier literal: the
    /// same minimal justification often proves several literals at once, and
    /// one copy is enough. Empty (size 0) witnesses are exempt, since "forced
    /// by the problem design" is per-literal information. Literals left with
    /// no witnesses disappear.
    pub fn remove_duplicates(&mut self) {
        let mut seen: HashSet<Mus> = HashSet::new();
        let lits: Vec<PuzLit> = self.entries.keys().cloned().collect();
        for lit in lits {
            let entry = self.entries.get_mut(&lit).expect("key taken from the map");
            entry.witnesses.retain(|m| m.is_empty() || !seen.contains(m));
            for mus in &entry.witnesses {
                if !mus.is_empty() {
                    seen.insert(mus.clone());
                }
            }
            if entry.witnesses.is_empty() {
                self.entries.remove(&lit);
            }
        }
    }
}
