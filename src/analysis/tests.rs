//! Control-flow analysis tests

use crate::analysis::{
    analyze_regions, merge_analyses, AddressState, Analysis, AnalysisError, Anomaly,
    Cancellation, ControlFlowAnalyzer, CrossReferenceIndex, EntryPoint, ReferenceKind,
};
use crate::arch::w65c816::{OpcodeTable, WidthState};
use crate::memory::{CpuAddress, RomImage};
use crate::platform::{MappingMode, VectorTable};
use pretty_assertions::assert_eq;
use std::collections::{BTreeSet, HashSet};

const fn lo(addr: u16) -> CpuAddress {
    CpuAddress::new(0x00, addr)
}

fn set(addrs: &[CpuAddress]) -> BTreeSet<CpuAddress> {
    addrs.iter().copied().collect()
}

fn lorom(bytes: &[u8]) -> RomImage<'_> {
    RomImage::new(bytes, 0, MappingMode::LoROM).unwrap()
}

fn analyze(rom: &RomImage<'_>, entries: &[CpuAddress]) -> Analysis {
    let mut analyzer = ControlFlowAnalyzer::new(rom, OpcodeTable::shared());

    for entry in entries {
        analyzer.add_entry_point(EntryPoint::new(*entry));
    }

    analyzer.run().unwrap()
}

#[test]
fn call_out_of_window() {
    let code = [
        0x20, 0x00, 0x90, // JSR $9000
        0x60, // RTS
    ];
    let rom = lorom(&code);
    let analysis = analyze(&rom, &[lo(0x8000)]);

    assert_eq!(analysis.subroutines().len(), 1);

    let sub = &analysis.subroutines()[0];
    assert_eq!(sub.start(), lo(0x8000));
    assert_eq!(sub.instructions().len(), 2);
    assert_eq!(sub.entries(), &set(&[lo(0x8000)]));
    assert_eq!(sub.calls(), &set(&[lo(0x9000)]));
    assert_eq!(sub.exits(), &set(&[lo(0x8003)]));
    assert_eq!(sub.end(), lo(0x8004));
    assert_eq!(sub.len_bytes(), 4);

    assert_eq!(
        analysis.xrefs().get_references(lo(0x9000)),
        vec![(lo(0x8000), ReferenceKind::Call)]
    );
    assert_eq!(
        analysis.anomalies(),
        &[Anomaly::OutOfWindow {
            from: Some(lo(0x8000)),
            target: lo(0x9000)
        }]
    );
    assert_eq!(analysis.steps(), 4);
    assert!(analysis.unclassified().is_empty());
}

#[test]
fn call_starts_a_subroutine() {
    let mut code = vec![0xFF; 0x1001];
    code[..4].copy_from_slice(&[0x20, 0x00, 0x90, 0x60]);
    code[0x1000] = 0x60;

    let rom = lorom(&code);
    let analysis = analyze(&rom, &[lo(0x8000)]);
    let starts: Vec<_> = analysis.subroutines().iter().map(|s| s.start()).collect();

    assert_eq!(starts, vec![lo(0x8000), lo(0x9000)]);
    assert!(analysis.anomalies().is_empty());

    let callee = analysis.subroutine(lo(0x9000)).unwrap();
    assert_eq!(callee.entries(), &set(&[lo(0x9000)]));
    assert_eq!(callee.exits(), &set(&[lo(0x9000)]));
    assert!(callee.calls().is_empty());

    assert_eq!(analysis.unclassified().len(), 1);
    assert_eq!(analysis.unclassified()[0].start(), 4);
    assert_eq!(analysis.unclassified()[0].end(), 0x1000);
    assert_eq!(analysis.unclassified()[0].address(), lo(0x8004));
}

#[test]
fn truncated_tail() {
    let code = [
        0xEA, // NOP
        0x22, 0x00, // JSL, missing its last byte
    ];
    let rom = lorom(&code);
    let mut analyzer = ControlFlowAnalyzer::new(&rom, OpcodeTable::shared());

    analyzer.add_entry_point(EntryPoint::new(lo(0x8000)));
    let analysis = analyzer.run().unwrap();

    assert_eq!(analyzer.state(0), AddressState::SubroutineHead { owner: lo(0x8000) });
    assert_eq!(analyzer.state(1), AddressState::Unclassified);
    assert_eq!(analyzer.state(2), AddressState::Unclassified);

    assert_eq!(
        analysis.anomalies(),
        &[
            Anomaly::Truncated {
                offset: 1,
                address: lo(0x8001)
            },
            Anomaly::Truncated {
                offset: 2,
                address: lo(0x8002)
            },
            Anomaly::OutOfWindow {
                from: Some(lo(0x8002)),
                target: lo(0x8003)
            },
        ]
    );

    let sub = &analysis.subroutines()[0];
    assert_eq!(sub.instructions().len(), 1);
    assert!(sub.exits().is_empty());

    assert_eq!(analysis.unclassified().len(), 1);
    assert_eq!(analysis.unclassified()[0].start(), 1);
    assert_eq!(analysis.unclassified()[0].len(), 2);
    assert!(analysis.steps() <= code.len());
}

#[test]
fn instructions_do_not_cross_banks() {
    let mut code = vec![0x60; 0x10004];
    code[0xFFFE] = 0xEA; // NOP
    code[0xFFFF] = 0x20; // JSR, whose operand would be in the next bank

    let rom = RomImage::new(&code, 0, MappingMode::HiROM).unwrap();
    let analysis = analyze(&rom, &[CpuAddress::new(0xC0, 0xFFFE)]);

    assert!(analysis.anomalies().contains(&Anomaly::Truncated {
        offset: 0xFFFF,
        address: CpuAddress::new(0xC0, 0xFFFF)
    }));

    // The program counter wraps to the start of the same bank.
    let sub = analysis.subroutine(CpuAddress::new(0xC0, 0xFFFE)).unwrap();
    let addrs: Vec<_> = sub.instructions().iter().map(|i| i.address()).collect();

    assert_eq!(
        addrs,
        vec![CpuAddress::new(0xC0, 0x0000), CpuAddress::new(0xC0, 0xFFFE)]
    );
    assert_eq!(sub.exits(), &set(&[CpuAddress::new(0xC0, 0x0000)]));
}

#[test]
fn loop_stays_in_one_subroutine() {
    let code = [
        0xA2, 0x10, // LDX #$10
        0xCA, // DEX
        0xD0, 0xFD, // BNE $8002
        0x60, // RTS
    ];
    let rom = lorom(&code);
    let analysis = analyze(&rom, &[lo(0x8000)]);

    assert_eq!(analysis.subroutines().len(), 1);

    let sub = &analysis.subroutines()[0];
    assert_eq!(sub.instructions().len(), 4);
    assert_eq!(sub.exits(), &set(&[lo(0x8005)]));
    assert!(sub.contains(lo(0x8004)));
    assert!(!sub.contains(lo(0x8006)));

    assert_eq!(
        analysis.xrefs().get_references(lo(0x8002)),
        vec![(lo(0x8003), ReferenceKind::Branch)]
    );
    assert!(analysis.anomalies().is_empty());
    assert!(analysis.unclassified().is_empty());
    assert_eq!(analysis.steps(), code.len());
}

#[test]
fn jump_to_next_instruction_is_not_an_exit() {
    let code = [
        0x4C, 0x03, 0x80, // JMP $8003
        0x60, // RTS
    ];
    let rom = lorom(&code);
    let analysis = analyze(&rom, &[lo(0x8000)]);

    assert_eq!(analysis.subroutines().len(), 1);
    assert_eq!(analysis.subroutines()[0].exits(), &set(&[lo(0x8003)]));
    assert!(analysis.anomalies().is_empty());
}

#[test]
fn tail_jump_is_an_exit() {
    let mut code = vec![0xFF; 0x11];
    code[..3].copy_from_slice(&[0x4C, 0x10, 0x80]);
    code[0x10] = 0x60;

    let rom = lorom(&code);
    let analysis = analyze(&rom, &[lo(0x8000), lo(0x8010)]);

    assert_eq!(analysis.subroutines().len(), 2);
    assert_eq!(
        analysis.subroutine(lo(0x8000)).unwrap().exits(),
        &set(&[lo(0x8000)])
    );
    assert_eq!(
        analysis.xrefs().get_references(lo(0x8010)),
        vec![(lo(0x8000), ReferenceKind::Jump)]
    );
}

#[test]
fn indirect_jump_ends_the_path() {
    let code = [
        0x6C, 0x00, 0x02, // JMP ($0200)
        0x60, // RTS, unreachable
    ];
    let rom = lorom(&code);
    let mut analyzer = ControlFlowAnalyzer::new(&rom, OpcodeTable::shared());

    analyzer.add_entry_point(EntryPoint::new(lo(0x8000)));
    let analysis = analyzer.run().unwrap();

    assert_eq!(analysis.anomalies(), &[Anomaly::IndirectJump { at: lo(0x8000) }]);
    assert_eq!(analysis.subroutines()[0].exits(), &set(&[lo(0x8000)]));
    assert_eq!(analyzer.state(3), AddressState::Unvisited);
    assert_eq!(analysis.unclassified()[0].start(), 3);
}

#[test]
fn indirect_call_continues() {
    let code = [
        0xFC, 0x00, 0x02, // JSR ($0200,X)
        0x60, // RTS
    ];
    let rom = lorom(&code);
    let analysis = analyze(&rom, &[lo(0x8000)]);

    assert_eq!(analysis.anomalies(), &[Anomaly::IndirectJump { at: lo(0x8000) }]);
    assert_eq!(analysis.subroutines()[0].instructions().len(), 2);
    assert!(analysis.subroutines()[0].calls().is_empty());
}

#[test]
fn reserved_opcode_halts() {
    let code = [0x42, 0x00, 0xEA];
    let rom = lorom(&code);
    let analysis = analyze(&rom, &[lo(0x8000)]);

    assert_eq!(analysis.anomalies(), &[Anomaly::ReservedOpcode { at: lo(0x8000) }]);
    assert_eq!(analysis.subroutines()[0].exits(), &set(&[lo(0x8000)]));
    assert_eq!(analysis.unclassified()[0].start(), 2);
}

#[test]
fn first_boundary_wins() {
    let code = [
        0x80, 0x01, // BRA $8003
        0xA9, 0xEA, // LDA #$EA, when entered at $8002
        0x60, // RTS
    ];
    let rom = lorom(&code);
    let mut analyzer = ControlFlowAnalyzer::new(&rom, OpcodeTable::shared());

    analyzer.add_entry_point(EntryPoint::new(lo(0x8000)));
    analyzer.add_entry_point(EntryPoint::new(lo(0x8002)));
    let analysis = analyzer.run().unwrap();

    assert_eq!(
        analysis.anomalies(),
        &[Anomaly::BoundaryConflict {
            at: lo(0x8003),
            existing: lo(0x8002)
        }]
    );
    assert_eq!(analyzer.state(3), AddressState::Operand { owner: lo(0x8002) });

    let bra = analysis.subroutine(lo(0x8000)).unwrap();
    assert_eq!(bra.instructions().len(), 1);
    assert_eq!(bra.exits(), &set(&[lo(0x8000)]));

    let lda = analysis.subroutine(lo(0x8002)).unwrap();
    assert_eq!(lda.instructions().len(), 2);
    assert_eq!(lda.exits(), &set(&[lo(0x8004)]));
}

#[test]
fn overlapping_decode_is_abandoned() {
    let code = [
        0xA9, // LDA #, when entered at $8000
        0x60, // RTS
        0x60,
    ];
    let rom = lorom(&code);
    let mut analyzer = ControlFlowAnalyzer::new(&rom, OpcodeTable::shared());

    analyzer.add_entry_point(EntryPoint::new(lo(0x8001)));
    analyzer.add_entry_point(EntryPoint::new(lo(0x8000)));
    let analysis = analyzer.run().unwrap();

    assert_eq!(
        analysis.anomalies(),
        &[Anomaly::BoundaryConflict {
            at: lo(0x8000),
            existing: lo(0x8001)
        }]
    );

    // The abandoned subroutine decoded nothing, so it is not reported.
    let starts: Vec<_> = analysis.subroutines().iter().map(|s| s.start()).collect();
    assert_eq!(starts, vec![lo(0x8001)]);
    assert_eq!(analyzer.state(0), AddressState::Unvisited);
    assert_eq!(analysis.unclassified().len(), 2);
}

#[test]
fn entry_inside_subroutine() {
    let code = [
        0x20, 0x04, 0x80, // JSR $8004
        0x60, // RTS
        0xEA, // NOP
        0xEA, // NOP
        0x60, // RTS
    ];
    let rom = lorom(&code);
    let mut analyzer = ControlFlowAnalyzer::new(&rom, OpcodeTable::shared());

    analyzer.add_entry_point(EntryPoint::new(lo(0x8000)));
    let first = analyzer.run().unwrap();
    assert!(first.anomalies().is_empty());
    assert_eq!(first.steps(), code.len());

    analyzer.add_entry_point(EntryPoint::new(lo(0x8005)));
    let second = analyzer.run().unwrap();

    assert_eq!(
        second.anomalies(),
        &[Anomaly::EntryInsideSubroutine {
            target: lo(0x8005),
            owner: lo(0x8004)
        }]
    );
    assert_eq!(second.subroutines().len(), 2);
    assert_eq!(
        second.subroutine(lo(0x8004)).unwrap().entries(),
        &set(&[lo(0x8004), lo(0x8005)])
    );
    assert_eq!(second.steps(), code.len());
    assert_eq!(
        second.subroutine_containing(lo(0x8005)).map(|s| s.start()),
        Some(lo(0x8004))
    );
}

#[test]
fn mirrored_entries_share_a_subroutine() {
    let code = [0x60];
    let rom = lorom(&code);
    let mut analyzer = ControlFlowAnalyzer::new(&rom, OpcodeTable::shared());

    analyzer.add_entry_point(EntryPoint::new(lo(0x8000)));
    analyzer.add_entry_point(EntryPoint::new(CpuAddress::new(0x80, 0x8000)));
    let analysis = analyzer.run().unwrap();

    assert_eq!(analysis.subroutines().len(), 1);
    assert_eq!(
        analysis.subroutines()[0].entries(),
        &set(&[lo(0x8000), CpuAddress::new(0x80, 0x8000)])
    );
    assert_eq!(
        analyzer.state_at(CpuAddress::new(0x80, 0x8000)),
        Some(AddressState::SubroutineHead { owner: lo(0x8000) })
    );
    assert_eq!(analyzer.state_at(lo(0x0000)), None);

    // A later mirror of an already decoded head is also just another entry.
    analyzer.add_entry_point(EntryPoint::new(CpuAddress::new(0x01, 0x8000)));
    analyzer.add_entry_point(EntryPoint::new(CpuAddress::new(0x80, 0x8000)));
    let again = analyzer.run().unwrap();
    assert_eq!(again.subroutines().len(), 1);
    assert!(again.anomalies().iter().any(|a| match a {
        Anomaly::OutOfWindow { target, .. } => *target == CpuAddress::new(0x01, 0x8000),
        _ => false,
    }));
}

#[test]
fn entry_width_is_threaded() {
    let code = [
        0xA9, 0x34, 0x12, // LDA #$1234
        0xE2, 0x20, // SEP #$20
        0xA9, 0x56, // LDA #$56
        0x60, // RTS
    ];
    let rom = lorom(&code);
    let mut analyzer = ControlFlowAnalyzer::new(&rom, OpcodeTable::shared());

    analyzer.add_entry_point(EntryPoint::new(lo(0x8000)).with_width(WidthState::SIXTEEN_BIT));
    let analysis = analyzer.run().unwrap();
    let text: Vec<String> = analysis.subroutines()[0]
        .instructions()
        .iter()
        .map(|i| format!("{}", i))
        .collect();

    assert_eq!(text, vec!["LDA #$1234", "SEP #$20", "LDA #$56", "RTS"]);
}

#[test]
fn vectors_seed_analysis() {
    let mut code = vec![0x00; 0x10000];
    code[0x8000..0x8008].copy_from_slice(&[
        0x18, // CLC
        0xFB, // XCE
        0xC2, 0x30, // REP #$30
        0xA9, 0x34, 0x12, // LDA #$1234
        0x60, // RTS
    ]);
    code[0xFFFC] = 0x00;
    code[0xFFFD] = 0x80;

    let rom = RomImage::new(&code, 0, MappingMode::HiROM).unwrap();
    let vectors = VectorTable::read(&rom);
    let mut analyzer = ControlFlowAnalyzer::new(&rom, OpcodeTable::shared());

    analyzer.add_vector_entries(&vectors);
    let analysis = analyzer.run().unwrap();

    assert_eq!(analysis.subroutines().len(), 1);

    let reset = &analysis.subroutines()[0];
    assert_eq!(reset.start(), lo(0x8000));
    assert_eq!(reset.name(), Some("reset"));
    assert_eq!(reset.instructions().len(), 5);
    assert_eq!(reset.instructions()[3].len(), 3);

    // Every other vector is zero, which HiROM maps to work RAM.
    assert_eq!(analysis.anomalies().len(), 9);
    assert!(analysis.anomalies().iter().all(|a| match a {
        Anomaly::OutOfWindow { from, target } => from.is_some() && *target == lo(0x0000),
        _ => false,
    }));
}

#[test]
fn named_entry_points() {
    let code = [0x60];
    let rom = lorom(&code);
    let mut analyzer = ControlFlowAnalyzer::new(&rom, OpcodeTable::shared());

    analyzer.add_entry_point(EntryPoint::new(lo(0x8000)).named("main"));
    let analysis = analyzer.run().unwrap();

    assert_eq!(analysis.subroutines()[0].name(), Some("main"));
}

#[test]
fn cancellation_keeps_progress() {
    let code = [0xEA, 0x60];
    let rom = lorom(&code);
    let mut analyzer = ControlFlowAnalyzer::new(&rom, OpcodeTable::shared());
    let cancel = Cancellation::new();

    analyzer.add_entry_point(EntryPoint::new(lo(0x8000)));
    cancel.cancel();

    assert_eq!(
        analyzer.run_with_cancel(&cancel).unwrap_err(),
        AnalysisError::Cancelled { steps: 0 }
    );
    assert_eq!(analyzer.state(0), AddressState::Unvisited);

    let analysis = analyzer.run().unwrap();
    assert_eq!(analysis.subroutines().len(), 1);
    assert_eq!(analysis.steps(), 2);
}

/// Small linear congruential generator, so the noise is the same every run.
fn noise(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x1234_5678;

    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            (state >> 16) as u8
        })
        .collect()
}

#[test]
fn noise_terminates_within_bound() {
    let code = noise(0x8000);
    let rom = lorom(&code);
    let mut analyzer = ControlFlowAnalyzer::new(&rom, OpcodeTable::shared());

    for offset in (0..0x8000u16).step_by(0x100) {
        let width = if offset & 0x100 == 0 {
            WidthState::EIGHT_BIT
        } else {
            WidthState::SIXTEEN_BIT
        };

        analyzer.add_entry_point(EntryPoint::new(lo(0x8000 + offset)).with_width(width));
    }

    let analysis = analyzer.run().unwrap();
    assert!(analysis.steps() <= code.len());

    // Every byte is claimed by at most one instruction.
    let mut claimed = HashSet::new();
    for instr in analysis.subroutines().iter().flat_map(|s| s.instructions()) {
        for offset in instr.rom_offset()..instr.rom_offset() + instr.len() {
            assert!(claimed.insert(offset), "offset {:#X} claimed twice", offset);
        }
    }

    let unclassified: usize = analysis.unclassified().iter().map(|r| r.len()).sum();
    assert_eq!(claimed.len() + unclassified, code.len());
    assert!(analysis.subroutines().iter().all(|s| !s.instructions().is_empty()));
}

#[test]
fn xref_lookup_is_ordered_and_deduplicated() {
    let mut index = CrossReferenceIndex::new();

    index.add_reference(lo(0x8006), lo(0x8010), ReferenceKind::Call);
    index.add_reference(lo(0x8000), lo(0x8010), ReferenceKind::Call);
    index.add_reference(lo(0x8003), lo(0x8010), ReferenceKind::Branch);
    index.add_reference(lo(0x8000), lo(0x8010), ReferenceKind::Call);
    index.add_reference(lo(0x8000), lo(0x9000), ReferenceKind::DataRead);

    assert_eq!(
        index.get_references(lo(0x8010)),
        vec![
            (lo(0x8000), ReferenceKind::Call),
            (lo(0x8003), ReferenceKind::Branch),
            (lo(0x8006), ReferenceKind::Call),
        ]
    );
    assert_eq!(
        index.references_from(lo(0x8000)),
        vec![
            (lo(0x8010), ReferenceKind::Call),
            (lo(0x9000), ReferenceKind::DataRead),
        ]
    );
    assert!(index.get_references(lo(0x8000)).is_empty());
    assert_eq!(index.targets(), vec![lo(0x8010), lo(0x9000)]);
    assert_eq!(index.len(), 5);

    let mut merged = CrossReferenceIndex::new();
    merged.merge(&index);
    assert_eq!(merged.get_references(lo(0x8010)), index.get_references(lo(0x8010)));
}

fn shared_callee() -> Vec<u8> {
    let mut code = vec![0xFF; 0x11];

    code[..8].copy_from_slice(&[
        0x20, 0x10, 0x80, // JSR $8010
        0x60, // RTS
        0x20, 0x10, 0x80, // JSR $8010
        0x60, // RTS
    ]);
    code[0x10] = 0x60;
    code
}

#[test]
fn regions_merge_shared_callees() {
    let code = shared_callee();
    let rom = lorom(&code);
    let regions = vec![
        vec![EntryPoint::new(lo(0x8000))],
        vec![EntryPoint::new(lo(0x8004))],
    ];

    let analysis =
        analyze_regions(&rom, OpcodeTable::shared(), &regions, &Cancellation::new()).unwrap();
    let starts: Vec<_> = analysis.subroutines().iter().map(|s| s.start()).collect();

    assert_eq!(starts, vec![lo(0x8000), lo(0x8004), lo(0x8010)]);
    assert_eq!(
        analysis.xrefs().get_references(lo(0x8010)),
        vec![
            (lo(0x8000), ReferenceKind::Call),
            (lo(0x8004), ReferenceKind::Call),
        ]
    );
    assert_eq!(analysis.unclassified().len(), 1);
    assert_eq!(analysis.unclassified()[0].start(), 8);
    assert_eq!(analysis.unclassified()[0].end(), 0x10);

    // The shared callee is only counted once.
    assert_eq!(analysis.steps(), 9);
}

#[test]
fn merge_unions_entries() {
    let code = shared_callee();
    let rom = lorom(&code);

    let a = analyze(&rom, &[lo(0x8010)]);
    let b = analyze(&rom, &[CpuAddress::new(0x80, 0x8010)]);
    let merged = merge_analyses(&rom, vec![a, b]);

    assert_eq!(merged.subroutines().len(), 1);
    assert_eq!(merged.subroutines()[0].start(), lo(0x8010));
    assert_eq!(
        merged.subroutines()[0].entries(),
        &set(&[lo(0x8010), CpuAddress::new(0x80, 0x8010)])
    );
    assert_eq!(merged.steps(), 1);
}

#[test]
fn merge_keeps_first_boundary() {
    let code = [
        0xA9, 0x60, // LDA #$60
        0x60, // RTS
    ];
    let rom = lorom(&code);
    let regions = vec![
        vec![EntryPoint::new(lo(0x8000))],
        vec![EntryPoint::new(lo(0x8001))],
    ];

    let merged =
        analyze_regions(&rom, OpcodeTable::shared(), &regions, &Cancellation::new()).unwrap();
    let single = analyze(&rom, &[lo(0x8000), lo(0x8001)]);
    let starts: Vec<_> = merged.subroutines().iter().map(|s| s.start()).collect();

    assert_eq!(starts, vec![lo(0x8000)]);
    assert_eq!(
        merged.anomalies(),
        &[Anomaly::BoundaryConflict {
            at: lo(0x8001),
            existing: lo(0x8000)
        }]
    );
    assert_eq!(merged.anomalies(), single.anomalies());
    assert_eq!(merged.steps(), code.len());
    assert_eq!(merged.steps(), single.steps());
}

#[test]
fn merge_folds_heads_inside_subroutines() {
    let code = [
        0xEA, // NOP
        0xEA, // NOP
        0x60, // RTS
    ];
    let rom = lorom(&code);
    let regions = vec![
        vec![EntryPoint::new(lo(0x8000))],
        vec![EntryPoint::new(lo(0x8001))],
    ];

    let merged =
        analyze_regions(&rom, OpcodeTable::shared(), &regions, &Cancellation::new()).unwrap();
    let single = analyze(&rom, &[lo(0x8000), lo(0x8001)]);

    assert_eq!(merged.subroutines(), single.subroutines());
    assert_eq!(merged.subroutines().len(), 1);
    assert_eq!(
        merged.subroutines()[0].entries(),
        &set(&[lo(0x8000), lo(0x8001)])
    );
    assert_eq!(
        merged.anomalies(),
        &[Anomaly::EntryInsideSubroutine {
            target: lo(0x8001),
            owner: lo(0x8000)
        }]
    );
    assert_eq!(merged.anomalies(), single.anomalies());
    assert_eq!(merged.steps(), code.len());
}

#[test]
fn merged_noise_claims_each_byte_once() {
    let code = noise(0x8000);
    let rom = lorom(&code);
    let regions: Vec<Vec<EntryPoint>> = (0..0x8000u16)
        .step_by(0x80)
        .map(|offset| {
            let width = if offset & 0x80 == 0 {
                WidthState::EIGHT_BIT
            } else {
                WidthState::SIXTEEN_BIT
            };

            vec![EntryPoint::new(lo(0x8000 + offset)).with_width(width)]
        })
        .collect();

    let analysis =
        analyze_regions(&rom, OpcodeTable::shared(), &regions, &Cancellation::new()).unwrap();
    assert!(analysis.steps() <= code.len());

    let mut claimed = HashSet::new();
    for instr in analysis.subroutines().iter().flat_map(|s| s.instructions()) {
        for offset in instr.rom_offset()..instr.rom_offset() + instr.len() {
            assert!(claimed.insert(offset), "offset {:#X} claimed twice", offset);
        }
    }

    let unclassified: usize = analysis.unclassified().iter().map(|r| r.len()).sum();
    assert_eq!(claimed.len() + unclassified, code.len());

    // Nothing refers from an instruction the merge dropped.
    for reference in analysis.xrefs().iter() {
        assert!(analysis.subroutine_containing(reference.as_source()).is_some());
    }
}

#[test]
fn parallel_vectors_report_unusable_handlers() {
    let mut code = vec![0x00; 0x10000];
    code[0x8000] = 0x60; // RTS
    code[0xFFFC] = 0x00;
    code[0xFFFD] = 0x80;

    let rom = RomImage::new(&code, 0, MappingMode::HiROM).unwrap();
    let vectors = VectorTable::read(&rom);

    let mut analyzer = ControlFlowAnalyzer::new(&rom, OpcodeTable::shared());
    analyzer.add_vector_entries(&vectors);
    let single = analyzer.run().unwrap();

    let regions: Vec<Vec<EntryPoint>> = vectors
        .handlers()
        .map(|(vector, handler)| vec![EntryPoint::new(handler).named(vector.name())])
        .collect();
    let parallel =
        analyze_regions(&rom, OpcodeTable::shared(), &regions, &Cancellation::new())
            .unwrap()
            .with_leading_anomalies(vectors.anomalies());

    assert_eq!(parallel.anomalies().len(), 9);
    assert_eq!(parallel.anomalies(), single.anomalies());
    assert_eq!(parallel.subroutines(), single.subroutines());
}

#[test]
fn call_into_unclassified_byte() {
    let code = [
        0x20, 0x04, 0x80, // JSR $8004
        0x60, // RTS
        0x22, // JSL, missing its operand
    ];
    let rom = lorom(&code);
    let analysis = analyze(&rom, &[lo(0x8004), lo(0x8000)]);
    let starts: Vec<_> = analysis.subroutines().iter().map(|s| s.start()).collect();

    assert_eq!(starts, vec![lo(0x8000)]);
    assert_eq!(analysis.subroutines()[0].calls(), &set(&[lo(0x8004)]));
    assert_eq!(
        analysis.anomalies(),
        &[
            Anomaly::Truncated {
                offset: 4,
                address: lo(0x8004)
            },
            Anomaly::OutOfWindow {
                from: Some(lo(0x8004)),
                target: lo(0x8005)
            },
            Anomaly::IntoUnclassified {
                from: Some(lo(0x8000)),
                target: lo(0x8004)
            },
        ]
    );
    assert_eq!(analysis.steps(), code.len());
}

#[test]
fn unnamed_subroutines_get_labels() {
    let code = shared_callee();
    let rom = lorom(&code);
    let mut analyzer = ControlFlowAnalyzer::new(&rom, OpcodeTable::shared());

    analyzer.add_entry_point(EntryPoint::new(lo(0x8000)).named("main"));
    let analysis = analyzer.run().unwrap();
    let labels: Vec<_> = analysis.subroutines().iter().map(|s| s.label()).collect();

    assert_eq!(labels, vec!["main", "sub_00_8010"]);
    assert_eq!(analysis.subroutines()[1].name(), None);
}

#[test]
fn cancelled_region_cancels_all() {
    let code = shared_callee();
    let rom = lorom(&code);
    let cancel = Cancellation::new();
    let regions = vec![vec![EntryPoint::new(lo(0x8000))]];

    cancel.cancel();

    assert_eq!(
        analyze_regions(&rom, OpcodeTable::shared(), &regions, &cancel).unwrap_err(),
        AnalysisError::Cancelled { steps: 0 }
    );
}
