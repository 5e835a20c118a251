//! Queue-driven control-flow analysis
//!
//! The analyzer starts from a set of entry points and follows every
//! statically known path through the program, decoding each ROM byte at
//! most once. Calls start new subroutines; branches and jumps extend the
//! subroutine they were found in. Anything the analyzer cannot make sense of
//! is written to the anomaly log and analysis carries on.

use crate::analysis::{
    AnalysisError, Anomaly, Cancellation, CrossReferenceIndex, DecodeError, Flow, ReferenceKind,
    Result, Subroutine,
};
use crate::arch::w65c816::{DecodedInstruction, Decoder, OpcodeTable, WidthState};
use crate::memory::{CpuAddress, RomImage};
use crate::platform::VectorTable;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::{debug, info, trace, warn};

/// An address known to be executable before analysis starts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntryPoint {
    address: CpuAddress,
    width: WidthState,
    name: Option<String>,
}

impl EntryPoint {
    /// An unnamed entry point, entered with 8-bit registers.
    pub fn new(address: CpuAddress) -> Self {
        EntryPoint {
            address,
            width: WidthState::default(),
            name: None,
        }
    }

    pub fn with_width(mut self, width: WidthState) -> Self {
        self.width = width;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn address(&self) -> CpuAddress {
        self.address
    }

    pub fn width(&self) -> WidthState {
        self.width
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// What analysis knows about one byte of ROM.
///
/// `owner` is the start address of the subroutine that claimed the byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum AddressState {
    Unvisited,
    SubroutineHead { owner: CpuAddress },
    Decoded { owner: CpuAddress },
    Operand { owner: CpuAddress },

    /// Decoding was attempted here and failed.
    Unclassified,
}

/// A run of ROM bytes no traced path decoded as code.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnclassifiedRange {
    /// First ROM offset in the range.
    start: usize,

    /// ROM offset just past the range.
    end: usize,

    /// Where the first byte of the range appears on the bus.
    address: CpuAddress,
}

impl UnclassifiedRange {
    fn new(rom: &RomImage<'_>, start: usize, end: usize) -> Self {
        UnclassifiedRange {
            start,
            end,
            address: rom
                .translator()
                .rom_offset_to_cpu(start)
                .unwrap_or_default(),
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn address(&self) -> CpuAddress {
        self.address
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Compute the ROM ranges not covered by any instruction of `subroutines`.
pub(crate) fn unclassified_ranges(
    rom: &RomImage<'_>,
    subroutines: &[Subroutine],
) -> Vec<UnclassifiedRange> {
    let mut covered = vec![false; rom.len()];

    for instr in subroutines.iter().flat_map(|s| s.instructions()) {
        let end = instr.rom_offset() + instr.len();

        if let Some(span) = covered.get_mut(instr.rom_offset()..end) {
            span.iter_mut().for_each(|byte| *byte = true);
        }
    }

    let mut ranges = Vec::new();
    let mut run_start = None;

    for (offset, is_covered) in covered
        .iter()
        .copied()
        .chain(std::iter::once(true))
        .enumerate()
    {
        match (is_covered, run_start) {
            (false, None) => run_start = Some(offset),
            (true, Some(start)) => {
                ranges.push(UnclassifiedRange::new(rom, start, offset));
                run_start = None;
            }
            _ => {}
        }
    }

    ranges
}

/// Everything one analysis run produced.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Analysis {
    subroutines: Vec<Subroutine>,
    xrefs: CrossReferenceIndex,
    unclassified: Vec<UnclassifiedRange>,
    anomalies: Vec<Anomaly>,
    steps: usize,
}

impl Analysis {
    pub(crate) fn from_parts(
        subroutines: Vec<Subroutine>,
        xrefs: CrossReferenceIndex,
        unclassified: Vec<UnclassifiedRange>,
        anomalies: Vec<Anomaly>,
        steps: usize,
    ) -> Self {
        Analysis {
            subroutines,
            xrefs,
            unclassified,
            anomalies,
            steps,
        }
    }

    pub(crate) fn into_parts(self) -> (Vec<Subroutine>, CrossReferenceIndex, Vec<Anomaly>, usize) {
        (self.subroutines, self.xrefs, self.anomalies, self.steps)
    }

    /// Subroutines, ordered by start address.
    pub fn subroutines(&self) -> &[Subroutine] {
        &self.subroutines
    }

    pub fn subroutine(&self, start: CpuAddress) -> Option<&Subroutine> {
        self.subroutines.iter().find(|s| s.start() == start)
    }

    pub fn subroutine_containing(&self, addr: CpuAddress) -> Option<&Subroutine> {
        self.subroutines.iter().find(|s| s.contains(addr))
    }

    pub fn xrefs(&self) -> &CrossReferenceIndex {
        &self.xrefs
    }

    /// ROM ranges no traced path reached, ordered by offset.
    pub fn unclassified(&self) -> &[UnclassifiedRange] {
        &self.unclassified
    }

    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }

    /// Put anomalies found before analysis started ahead of the rest.
    pub fn with_leading_anomalies(
        mut self,
        anomalies: impl IntoIterator<Item = Anomaly>,
    ) -> Self {
        let mut leading: Vec<Anomaly> = anomalies.into_iter().collect();

        leading.append(&mut self.anomalies);
        self.anomalies = leading;
        self
    }

    /// Number of ROM bytes decoding claimed or gave up on.
    pub fn steps(&self) -> usize {
        self.steps
    }
}

/// Per-byte bookkeeping. Owners index `ControlFlowAnalyzer::subs`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Head(usize),
    Decoded(usize),
    Operand(usize),
    Unclassified,
}

/// A subroutine while it is still being discovered.
#[derive(Clone, Debug)]
struct Builder {
    start: CpuAddress,
    head: usize,
    name: Option<String>,
    instructions: Vec<DecodedInstruction>,
    entries: BTreeSet<CpuAddress>,
    calls: BTreeSet<CpuAddress>,
}

#[derive(Clone, Debug)]
struct WorkItem {
    target: CpuAddress,
    width: WidthState,

    /// Subroutine a branch or jump extends. Calls and entry points have no
    /// owner and start a subroutine of their own.
    owner: Option<usize>,

    /// The instruction that referenced `target`.
    from: Option<CpuAddress>,

    name: Option<String>,

    /// Other addresses that reached the same offset before it was traced,
    /// such as a bank mirror of `target`.
    aliases: Vec<CpuAddress>,
}

pub struct ControlFlowAnalyzer<'a> {
    rom: RomImage<'a>,
    decoder: Decoder<'a>,
    marks: Vec<Mark>,
    subs: Vec<Builder>,

    /// ROM offsets waiting to be traced, each at most once.
    queue: VecDeque<usize>,
    pending: HashMap<usize, WorkItem>,

    xrefs: CrossReferenceIndex,
    anomalies: Vec<Anomaly>,
    steps: usize,
}

impl<'a> ControlFlowAnalyzer<'a> {
    pub fn new(rom: &RomImage<'a>, table: &'a OpcodeTable) -> Self {
        ControlFlowAnalyzer {
            rom: *rom,
            decoder: Decoder::new(table),
            marks: vec![Mark::Unvisited; rom.len()],
            subs: Vec::new(),
            queue: VecDeque::new(),
            pending: HashMap::new(),
            xrefs: CrossReferenceIndex::new(),
            anomalies: Vec::new(),
            steps: 0,
        }
    }

    pub fn add_entry_point(&mut self, entry: EntryPoint) {
        self.enqueue(WorkItem {
            target: entry.address,
            width: entry.width,
            owner: None,
            from: None,
            name: entry.name,
            aliases: Vec::new(),
        });
    }

    /// Seed analysis from every interrupt and reset handler in the ROM.
    ///
    /// Vectors which could not be read or which point outside ROM are
    /// logged as anomalies.
    pub fn add_vector_entries(&mut self, vectors: &VectorTable) {
        for (vector, handler) in vectors.handlers() {
            self.add_entry_point(EntryPoint::new(handler).named(vector.name()));
        }

        for anomaly in vectors.anomalies() {
            self.record(anomaly);
        }
    }

    /// What analysis has determined so far about a ROM offset.
    pub fn state(&self, offset: usize) -> AddressState {
        let owner = |sub: usize| self.subs.get(sub).map(|b| b.start).unwrap_or_default();

        match self.mark(offset) {
            Mark::Unvisited => AddressState::Unvisited,
            Mark::Head(sub) => AddressState::SubroutineHead { owner: owner(sub) },
            Mark::Decoded(sub) => AddressState::Decoded { owner: owner(sub) },
            Mark::Operand(sub) => AddressState::Operand { owner: owner(sub) },
            Mark::Unclassified => AddressState::Unclassified,
        }
    }

    pub fn state_at(&self, addr: CpuAddress) -> Option<AddressState> {
        self.rom
            .translator()
            .cpu_to_rom_offset(addr)
            .map(|offset| self.state(offset))
    }

    pub fn run(&mut self) -> Result<Analysis> {
        self.run_with_cancel(&Cancellation::new())
    }

    /// Drain the work queue, checking `cancel` before each item.
    ///
    /// A cancelled analyzer keeps its progress. Adding more entry points and
    /// running again resumes where it left off, and bytes already decoded
    /// are never decoded twice.
    pub fn run_with_cancel(&mut self, cancel: &Cancellation) -> Result<Analysis> {
        while let Some(offset) = self.queue.pop_front() {
            if cancel.is_cancelled() {
                self.queue.push_front(offset);
                info!(steps = self.steps, "analysis cancelled");

                return Err(AnalysisError::Cancelled { steps: self.steps });
            }

            if let Some(item) = self.pending.remove(&offset) {
                self.process(offset, item);
            }
        }

        let analysis = self.finalize();

        info!(
            subroutines = analysis.subroutines().len(),
            anomalies = analysis.anomalies().len(),
            unclassified = analysis.unclassified().len(),
            steps = analysis.steps(),
            "analysis complete"
        );

        Ok(analysis)
    }

    fn mark(&self, offset: usize) -> Mark {
        self.marks.get(offset).copied().unwrap_or(Mark::Unclassified)
    }

    fn set_mark(&mut self, offset: usize, mark: Mark) {
        if let Some(slot) = self.marks.get_mut(offset) {
            *slot = mark;
        }
    }

    fn record(&mut self, anomaly: Anomaly) {
        warn!(%anomaly, "anomaly");
        self.anomalies.push(anomaly);
    }

    fn enqueue(&mut self, item: WorkItem) {
        let offset = match self.rom.translator().try_cpu_to_rom_offset(item.target) {
            Ok(offset) => offset,
            Err(_) => {
                self.record(Anomaly::OutOfWindow {
                    from: item.from,
                    target: item.target,
                });
                return;
            }
        };

        if self.mark(offset) != Mark::Unvisited {
            self.revisit(offset, item);
            return;
        }

        match self.pending.get_mut(&offset) {
            Some(queued) => {
                // A call outranks a branch: the target becomes a subroutine.
                if queued.owner.is_some() && item.owner.is_none() {
                    queued.owner = None;
                    queued.target = item.target;
                    queued.from = item.from;
                    queued.aliases.clear();
                }

                if item.owner.is_none() && item.target != queued.target {
                    queued.aliases.push(item.target);
                }

                if queued.name.is_none() {
                    queued.name = item.name;
                }
            }
            None => {
                self.pending.insert(offset, item);
                self.queue.push_back(offset);
            }
        }
    }

    /// Control reached a byte that has already been looked at.
    fn revisit(&mut self, offset: usize, item: WorkItem) {
        match self.mark(offset) {
            Mark::Unvisited => {}
            Mark::Unclassified => self.record(Anomaly::IntoUnclassified {
                from: item.from,
                target: item.target,
            }),
            Mark::Head(sub) => {
                if item.owner.is_none() {
                    self.add_entry(sub, item.target, item.name);

                    for alias in item.aliases {
                        self.add_entry(sub, alias, None);
                    }
                }
            }
            Mark::Decoded(sub) => {
                if item.owner != Some(sub) {
                    if item.owner.is_none() {
                        self.add_entry(sub, item.target, item.name);

                        for alias in item.aliases {
                            self.add_entry(sub, alias, None);
                        }
                    }

                    let owner = self.subs.get(sub).map(|b| b.start).unwrap_or_default();
                    self.record(Anomaly::EntryInsideSubroutine {
                        target: item.target,
                        owner,
                    });
                }
            }
            Mark::Operand(_) => {
                let existing = self.instruction_covering(offset);

                self.record(Anomaly::BoundaryConflict {
                    at: item.target,
                    existing,
                });
            }
        }
    }

    fn add_entry(&mut self, sub: usize, entry: CpuAddress, name: Option<String>) {
        if let Some(builder) = self.subs.get_mut(sub) {
            builder.entries.insert(entry);

            if builder.name.is_none() {
                builder.name = name;
            }
        }
    }

    /// Address of the instruction whose bytes include `offset`.
    fn instruction_covering(&self, offset: usize) -> CpuAddress {
        let start = (offset.saturating_sub(3)..=offset)
            .rev()
            .find(|o| matches!(self.mark(*o), Mark::Head(_) | Mark::Decoded(_)))
            .unwrap_or(offset);

        self.rom
            .translator()
            .rom_offset_to_cpu(start)
            .unwrap_or_default()
    }

    fn process(&mut self, offset: usize, item: WorkItem) {
        if self.mark(offset) != Mark::Unvisited {
            self.revisit(offset, item);
            return;
        }

        let sub = match item.owner {
            Some(sub) => sub,
            None => {
                let sub = self.subs.len();
                let mut entries: BTreeSet<CpuAddress> = item.aliases.iter().copied().collect();
                entries.insert(item.target);

                debug!(start = %item.target, name = ?item.name, "new subroutine");

                self.subs.push(Builder {
                    start: item.target,
                    head: offset,
                    name: item.name,
                    instructions: Vec::new(),
                    entries,
                    calls: BTreeSet::new(),
                });

                sub
            }
        };

        self.trace(sub, offset, item.target, item.width);
    }

    /// Decode in a straight line from `offset` until control leaves.
    fn trace(&mut self, sub: usize, mut offset: usize, mut pc: CpuAddress, mut width: WidthState) {
        loop {
            if self.mark(offset) != Mark::Unvisited {
                self.revisit(
                    offset,
                    WorkItem {
                        target: pc,
                        width,
                        owner: Some(sub),
                        from: None,
                        name: None,
                        aliases: Vec::new(),
                    },
                );
                return;
            }

            // The program counter never carries into the bank byte, so an
            // instruction can't straddle the end of a bank.
            let bank_end = offset + (0x1_0000 - pc.addr() as usize);
            let bytes = &self.rom.bytes()[..bank_end.min(self.rom.len())];

            let instr = match self.decoder.decode_one(bytes, offset, pc, width) {
                Ok(instr) => instr,
                Err(DecodeError::Truncated { .. }) => {
                    self.set_mark(offset, Mark::Unclassified);
                    self.steps += 1;
                    self.record(Anomaly::Truncated {
                        offset,
                        address: pc,
                    });

                    match self.fallthrough(pc, pc.wrapping_add(1)) {
                        Some(next) => {
                            offset = next;
                            pc = pc.wrapping_add(1);
                            continue;
                        }
                        None => return,
                    }
                }
            };

            let len = instr.len();
            let at = instr.address();

            if let Some(taken) = (offset + 1..offset + len).find(|o| self.mark(*o) != Mark::Unvisited) {
                let existing = self.instruction_covering(taken);

                self.record(Anomaly::BoundaryConflict { at, existing });
                return;
            }

            let is_head = self.subs.get(sub).map_or(false, |b| b.head == offset);
            self.set_mark(offset, if is_head { Mark::Head(sub) } else { Mark::Decoded(sub) });
            for operand in offset + 1..offset + len {
                self.set_mark(operand, Mark::Operand(sub));
            }
            self.steps += len;

            trace!(address = %at, instr = %instr, "decoded");

            if self.decoder.table().lookup(instr.opcode()).is_reserved() {
                self.record(Anomaly::ReservedOpcode { at });
            }

            let next = instr.end_address();
            let width_after = instr.width_after();
            let flow = instr.flow();
            let target = instr.target();
            let data = instr.data_address();
            let indirect = instr.is_indirect();

            if let Some(builder) = self.subs.get_mut(sub) {
                builder.instructions.push(instr);
            }

            let keep_going = match flow {
                Flow::Normal => {
                    if let Some(data) = data {
                        self.xrefs.add_reference(at, data, ReferenceKind::DataRead);
                    }

                    true
                }
                Flow::Call => {
                    if let Some(callee) = target {
                        self.xrefs.add_reference(at, callee, ReferenceKind::Call);

                        if let Some(builder) = self.subs.get_mut(sub) {
                            builder.calls.insert(callee);
                        }

                        self.enqueue(WorkItem {
                            target: callee,
                            width: width_after,
                            owner: None,
                            from: Some(at),
                            name: None,
                            aliases: Vec::new(),
                        });
                    } else if indirect {
                        self.record(Anomaly::IndirectJump { at });
                    }

                    true
                }
                Flow::Branching(conditional) => match target {
                    Some(dest) => {
                        let kind = if conditional {
                            ReferenceKind::Branch
                        } else {
                            ReferenceKind::Jump
                        };

                        self.xrefs.add_reference(at, dest, kind);
                        self.enqueue(WorkItem {
                            target: dest,
                            width: width_after,
                            owner: Some(sub),
                            from: Some(at),
                            name: None,
                            aliases: Vec::new(),
                        });

                        conditional || dest == next
                    }
                    None => conditional,
                },
                Flow::Indirect => {
                    self.record(Anomaly::IndirectJump { at });
                    false
                }
                Flow::Returning | Flow::Halting => false,
            };

            if !keep_going {
                return;
            }

            match self.fallthrough(at, next) {
                Some(next_offset) => {
                    offset = next_offset;
                    pc = next;
                    width = width_after;
                }
                None => return,
            }
        }
    }

    /// Translate the next sequential address, logging it if it leaves ROM.
    fn fallthrough(&mut self, from: CpuAddress, next: CpuAddress) -> Option<usize> {
        match self.rom.translator().try_cpu_to_rom_offset(next) {
            Ok(offset) => Some(offset),
            Err(_) => {
                self.record(Anomaly::OutOfWindow {
                    from: Some(from),
                    target: next,
                });
                None
            }
        }
    }

    fn is_exit(&self, instr: &DecodedInstruction, body: &HashSet<usize>) -> bool {
        match instr.flow() {
            Flow::Returning | Flow::Indirect | Flow::Halting => true,
            Flow::Branching(_) => match instr.target() {
                Some(dest) => self
                    .rom
                    .translator()
                    .cpu_to_rom_offset(dest)
                    .map_or(true, |offset| !body.contains(&offset)),
                None => false,
            },
            Flow::Normal | Flow::Call => false,
        }
    }

    fn finalize(&self) -> Analysis {
        let mut subroutines: Vec<Subroutine> = self
            .subs
            .iter()
            .filter(|b| !b.instructions.is_empty())
            .map(|b| {
                let body: HashSet<usize> = b.instructions.iter().map(|i| i.rom_offset()).collect();
                let exits = b
                    .instructions
                    .iter()
                    .filter(|i| self.is_exit(i, &body))
                    .map(|i| i.address())
                    .collect();

                Subroutine::from_parts(
                    b.start,
                    b.head,
                    b.name.clone(),
                    b.instructions.clone(),
                    b.entries.clone(),
                    exits,
                    b.calls.clone(),
                )
            })
            .collect();

        subroutines.sort_by_key(|s| s.start());

        let unclassified = unclassified_ranges(&self.rom, &subroutines);

        Analysis::from_parts(
            subroutines,
            self.xrefs.clone(),
            unclassified,
            self.anomalies.clone(),
            self.steps,
        )
    }
}
