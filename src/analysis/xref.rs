//! Cross-reference index

use crate::analysis::{Reference, ReferenceKind};
use crate::memory::CpuAddress;
use serde::Serialize;
use std::collections::HashMap;

/// Every static reference discovered in a program, indexed by both ends.
///
/// References are appended as analysis finds them; duplicates are tolerated
/// on insert and collapsed on lookup, so inserting is a single push.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CrossReferenceIndex {
    xrefs: Vec<Reference>,

    #[serde(skip)]
    target_index: HashMap<CpuAddress, Vec<usize>>,

    #[serde(skip)]
    source_index: HashMap<CpuAddress, Vec<usize>>,
}

impl CrossReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_reference(&mut self, from: CpuAddress, to: CpuAddress, kind: ReferenceKind) {
        let id = self.xrefs.len();

        self.xrefs.push(Reference::new(from, to, kind));
        self.target_index.entry(to).or_insert_with(Vec::new).push(id);
        self.source_index.entry(from).or_insert_with(Vec::new).push(id);
    }

    /// All references to `to`, ordered by source address.
    pub fn get_references(&self, to: CpuAddress) -> Vec<(CpuAddress, ReferenceKind)> {
        let mut refs: Vec<_> = self
            .target_index
            .get(&to)
            .into_iter()
            .flatten()
            .filter_map(|id| self.xrefs.get(*id))
            .map(|r| (r.as_source(), r.kind()))
            .collect();

        refs.sort();
        refs.dedup();
        refs
    }

    /// All references made by the instruction at `from`, ordered by target.
    pub fn references_from(&self, from: CpuAddress) -> Vec<(CpuAddress, ReferenceKind)> {
        let mut refs: Vec<_> = self
            .source_index
            .get(&from)
            .into_iter()
            .flatten()
            .filter_map(|id| self.xrefs.get(*id))
            .map(|r| (r.as_target(), r.kind()))
            .collect();

        refs.sort();
        refs.dedup();
        refs
    }

    /// Every referenced address, in ascending order.
    pub fn targets(&self) -> Vec<CpuAddress> {
        let mut targets: Vec<_> = self.target_index.keys().copied().collect();

        targets.sort();
        targets
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reference> {
        self.xrefs.iter()
    }

    /// Number of references recorded, duplicates included.
    pub fn len(&self) -> usize {
        self.xrefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xrefs.is_empty()
    }

    /// Fold another index into this one.
    pub fn merge(&mut self, other: &CrossReferenceIndex) {
        for xref in other.iter() {
            self.add_reference(xref.as_source(), xref.as_target(), xref.kind());
        }
    }
}
