//! Analyzing independent regions in parallel

use crate::analysis::analyzer::unclassified_ranges;
use crate::analysis::{
    Analysis, Anomaly, Cancellation, ControlFlowAnalyzer, CrossReferenceIndex, EntryPoint,
    Result, Subroutine,
};
use crate::arch::w65c816::OpcodeTable;
use crate::memory::{CpuAddress, RomImage};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

/// Run one analyzer per region on the rayon pool and merge the results.
///
/// Every analyzer reads the same ROM and opcode table; neither is ever
/// written to, so no locking is needed. If any region is cancelled, the
/// whole call is.
pub fn analyze_regions(
    rom: &RomImage<'_>,
    table: &OpcodeTable,
    regions: &[Vec<EntryPoint>],
    cancel: &Cancellation,
) -> Result<Analysis> {
    let analyses = regions
        .par_iter()
        .map(|entries| {
            let mut analyzer = ControlFlowAnalyzer::new(rom, table);

            for entry in entries {
                analyzer.add_entry_point(entry.clone());
            }

            analyzer.run_with_cancel(cancel)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(merge_analyses(rom, analyses))
}

/// Who decoded a ROM byte during a merge.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Claim {
    /// Head offset of the owning subroutine.
    owner: usize,

    /// Offset and length of the instruction the byte belongs to.
    start: usize,
    len: usize,
}

impl Claim {
    fn is_instruction_start(&self, offset: usize) -> bool {
        self.start == offset
    }
}

/// Combine separately produced analyses of the same ROM.
///
/// Analyses are folded in order and the first to decode a byte owns it, the
/// same rule a single analyzer applies. Subroutines are matched by the ROM
/// offset of their head; a later duplicate only contributes its entry, exit
/// and call sets. A later subroutine whose head lands on another
/// subroutine's instruction is folded into it as an extra entry. Later
/// instructions which overlap a claimed byte at a different boundary are
/// dropped and reported as boundary conflicts.
///
/// References made by dropped instructions are dropped with them. Steps and
/// unclassified ranges are recomputed from the merged coverage.
pub fn merge_analyses(
    rom: &RomImage<'_>,
    analyses: impl IntoIterator<Item = Analysis>,
) -> Analysis {
    let mut claims: Vec<Option<Claim>> = vec![None; rom.len()];
    let mut by_head: BTreeMap<usize, Subroutine> = BTreeMap::new();
    let mut references = Vec::new();
    let mut anomalies = Vec::new();
    let mut seen: HashSet<Anomaly> = HashSet::new();

    for analysis in analyses {
        let (subroutines, their_xrefs, their_anomalies, _) = analysis.into_parts();
        let mut found = Vec::new();

        for sub in subroutines {
            merge_subroutine(rom, &mut claims, &mut by_head, sub, &mut found);
        }

        references.extend(their_xrefs.iter().copied());

        // Earlier analyses may already have reported the same thing.
        let fresh: Vec<Anomaly> = their_anomalies
            .into_iter()
            .chain(found)
            .filter(|a| !seen.contains(a))
            .collect();

        seen.extend(fresh.iter().cloned());
        anomalies.extend(fresh);
    }

    let mut subroutines: Vec<Subroutine> = by_head.into_iter().map(|(_, sub)| sub).collect();
    subroutines.sort_by_key(|s| s.start());

    let decoded: HashSet<CpuAddress> = subroutines
        .iter()
        .flat_map(|s| s.instructions())
        .map(|i| i.address())
        .collect();

    let mut xrefs = CrossReferenceIndex::new();
    for reference in references.iter().filter(|r| decoded.contains(&r.as_source())) {
        xrefs.add_reference(reference.as_source(), reference.as_target(), reference.kind());
    }

    let given_up: BTreeSet<usize> = anomalies
        .iter()
        .filter_map(|a| match a {
            Anomaly::Truncated { offset, .. } => Some(*offset),
            _ => None,
        })
        .filter(|offset| matches!(claims.get(*offset), Some(None)))
        .collect();
    let steps = claims.iter().filter(|c| c.is_some()).count() + given_up.len();

    let unclassified = unclassified_ranges(rom, &subroutines);

    Analysis::from_parts(subroutines, xrefs, unclassified, anomalies, steps)
}

fn merge_subroutine(
    rom: &RomImage<'_>,
    claims: &mut [Option<Claim>],
    by_head: &mut BTreeMap<usize, Subroutine>,
    mut sub: Subroutine,
    found: &mut Vec<Anomaly>,
) {
    let head = sub.head_offset();

    if let Some(existing) = by_head.get_mut(&head) {
        debug!(start = %sub.start(), "merging duplicate subroutine");
        existing.absorb(sub);
        return;
    }

    if let Some(claim) = claim_at(claims, head) {
        if claim.is_instruction_start(head) {
            if let Some(owner) = by_head.get_mut(&claim.owner) {
                debug!(start = %sub.start(), owner = %owner.start(), "folding subroutine into owner");
                record(found, Anomaly::EntryInsideSubroutine {
                    target: sub.start(),
                    owner: owner.start(),
                });
                owner.add_entries(sub.entries().iter().copied());
            }
        } else {
            record(found, Anomaly::BoundaryConflict {
                at: sub.start(),
                existing: address_of(rom, claim.start),
            });
        }

        return;
    }

    let head_conflict = sub
        .instructions()
        .iter()
        .find(|i| i.rom_offset() == head)
        .and_then(|i| (head..head + i.len()).find_map(|o| claim_at(claims, o)));

    if let Some(claim) = head_conflict {
        record(found, Anomaly::BoundaryConflict {
            at: sub.start(),
            existing: address_of(rom, claim.start),
        });
        return;
    }

    // Owners this subroutine ran into, and the first address it did so at.
    let mut entered: BTreeMap<usize, CpuAddress> = BTreeMap::new();

    sub.retain_instructions(|instr| {
        let start = instr.rom_offset();
        let span = start..start + instr.len();

        match span.clone().find_map(|o| claim_at(claims, o)) {
            None => {
                for offset in span {
                    if let Some(slot) = claims.get_mut(offset) {
                        *slot = Some(Claim {
                            owner: head,
                            start,
                            len: instr.len(),
                        });
                    }
                }

                true
            }
            Some(claim) if claim.start == start && claim.len == instr.len() => {
                entered.entry(claim.owner).or_insert(instr.address());
                false
            }
            Some(claim) => {
                record(found, Anomaly::BoundaryConflict {
                    at: instr.address(),
                    existing: address_of(rom, claim.start),
                });
                false
            }
        }
    });

    for (owner, target) in entered {
        if let Some(owner) = by_head.get(&owner) {
            record(found, Anomaly::EntryInsideSubroutine {
                target,
                owner: owner.start(),
            });
        }
    }

    by_head.insert(head, sub);
}

fn claim_at(claims: &[Option<Claim>], offset: usize) -> Option<Claim> {
    claims.get(offset).copied().flatten()
}

fn address_of(rom: &RomImage<'_>, offset: usize) -> CpuAddress {
    rom.translator()
        .rom_offset_to_cpu(offset)
        .unwrap_or_default()
}

fn record(found: &mut Vec<Anomaly>, anomaly: Anomaly) {
    warn!(%anomaly, "anomaly");
    found.push(anomaly);
}
