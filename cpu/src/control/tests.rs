use base::image::ImageError;
use base::prelude::*;

use super::{transition_allowed, Cpu, CycleStatus, State};
use crate::bus::{BusDevice, BusInputs, BusOutputs, DeviceReply, Strobe};
use crate::config::{JumpzPolarity, MachineConfig};
use crate::fault::FaultKind;
use crate::io::Backplane;
use crate::regs::flag;
use crate::system::System;

const W: WordWidth = WordWidth::W16;

fn asm(opcode: Opcode, operand: u32) -> Word {
    SymbolicInstruction::new(opcode, operand)
        .encode(W)
        .expect("test instruction should encode")
        .into()
}

/// Raise HLT through a flags exchange; the next fetch commits to
/// HALT.
fn halt_pair() -> [Word; 2] {
    [asm(Opcode::Lit, 1 << flag::HLT), asm(Opcode::Set, 0)]
}

fn boot(config: MachineConfig, image: &[Word]) -> System {
    System::new(config, image).expect("test image should load")
}

fn run_to_halt(system: &mut System) {
    assert_eq!(
        system.run(200_000),
        CycleStatus::Halted,
        "program should halt"
    );
    assert!(
        system.fault().is_none(),
        "no fault expected: {:?}",
        system.fault()
    );
}

fn peek(system: &System, addr: u32) -> Word {
    system
        .ram()
        .peek(addr)
        .expect("peeked address should be inside RAM")
}

#[test]
fn test_every_state_lasts_n_plus_one_cycles() {
    // On a 16-bit machine the cycle counter runs 0..=16 in every
    // state, HALT included.
    let image = halt_pair();
    let mut system = boot(MachineConfig::base16(), &image);
    for i in 0_u64..200 {
        assert_eq!(system.cpu().total_cycles(), i);
        assert_eq!(
            u64::from(system.cpu().snapshot().cycle),
            i % 17,
            "cycle counter off at total cycle {}",
            i
        );
        system.step();
    }
}

#[test]
fn test_strobes_follow_the_state() {
    // Walk a program that visits all nine states and check, on every
    // single cycle, that the strobe matches the state and that stop
    // is only ever asserted in HALT.
    let mut image = vec![
        asm(Opcode::Ind, 1),
        asm(Opcode::Load, 10),
        asm(Opcode::Xor, 11),
        asm(Opcode::Ind, 0),
        asm(Opcode::Store, 24),
        asm(Opcode::Lit, 1 << flag::HLT),
        asm(Opcode::Set, 0),
    ];
    image.resize(10, Word::zero(W));
    image.extend([w16!(14), w16!(0x0F0), Word::zero(W), Word::zero(W), w16!(0xAA)]);
    let mut system = boot(MachineConfig::base16(), &image);

    let mut seen: Vec<State> = Vec::new();
    let mut after_halt = 40_u32;
    for _ in 0..200_000 {
        let state = system.cpu().state();
        let cycle = system.cpu().snapshot().cycle;
        let outputs = system.cpu().bus_outputs();
        if !seen.contains(&state) {
            seen.push(state);
        }
        if state != State::Halt {
            assert!(!outputs.stop, "stop asserted in {}", state);
        }
        match (state, cycle) {
            (State::Reset, _) => assert_eq!(outputs.strobe, Some(Strobe::Address)),
            (State::Halt, _) => {
                assert_eq!(outputs.strobe, None);
                assert!(outputs.stop);
            }
            (_, 0) => assert_eq!(outputs.strobe, None, "{} drove a strobe on cycle 0", state),
            (State::Fetch, _) | (State::Operand, _) | (State::Load, _) => {
                assert_eq!(outputs.strobe, Some(Strobe::Input), "in {}", state)
            }
            (State::Indirect, _) | (State::Advance, _) => {
                assert_eq!(outputs.strobe, Some(Strobe::Address), "in {}", state)
            }
            (State::Store, _) => assert_eq!(outputs.strobe, Some(Strobe::Output)),
            (State::Execute, _) => assert!(
                outputs.strobe.is_none() || outputs.strobe == Some(Strobe::Address),
                "EXECUTE may only stream an address"
            ),
        }
        match system.step() {
            CycleStatus::Running => {}
            CycleStatus::Halted => {
                if after_halt == 0 {
                    break;
                }
                after_halt -= 1;
            }
            CycleStatus::Faulted => panic!("unexpected fault: {:?}", system.fault()),
        }
    }
    for state in [
        State::Reset,
        State::Fetch,
        State::Indirect,
        State::Operand,
        State::Execute,
        State::Load,
        State::Store,
        State::Advance,
        State::Halt,
    ] {
        assert!(seen.contains(&state), "walk never visited {}", state);
    }
}

#[test]
fn test_transition_edges() {
    use IsaVariant::{Base, Extended};
    for variant in [Base, Extended] {
        assert!(transition_allowed(variant, State::Reset, State::Fetch));
        assert!(transition_allowed(variant, State::Fetch, State::Halt));
        assert!(transition_allowed(variant, State::Fetch, State::Reset));
        assert!(transition_allowed(variant, State::Execute, State::Fetch));
        assert!(transition_allowed(variant, State::Halt, State::Halt));
        assert!(!transition_allowed(variant, State::Halt, State::Execute));
        assert!(!transition_allowed(variant, State::Load, State::Store));
        assert!(!transition_allowed(variant, State::Reset, State::Execute));
    }
    // Indirection edges exist only in the base graph.
    assert!(transition_allowed(Base, State::Fetch, State::Indirect));
    assert!(transition_allowed(Base, State::Indirect, State::Operand));
    assert!(transition_allowed(Base, State::Operand, State::Execute));
    assert!(!transition_allowed(Extended, State::Fetch, State::Indirect));
    assert!(!transition_allowed(Extended, State::Indirect, State::Operand));
    // Dispatch and wake edges exist only in the extended graph.
    assert!(transition_allowed(Extended, State::Fetch, State::Fetch));
    assert!(transition_allowed(Extended, State::Halt, State::Fetch));
    assert!(!transition_allowed(Base, State::Fetch, State::Fetch));
    assert!(!transition_allowed(Base, State::Halt, State::Fetch));
}

#[test]
fn test_cycle_skew_latches_a_structural_fault() {
    let mut cpu = Cpu::new(MachineConfig::base16());
    cpu.seq.corrupt_first_latch();
    assert_eq!(cpu.step(&BusInputs::quiet()), CycleStatus::Faulted);
    let fault = cpu.fault().expect("skew should latch a fault");
    assert_eq!(fault.kind(), FaultKind::Structural);
    // Faulted is absorbing.
    assert_eq!(cpu.step(&BusInputs::quiet()), CycleStatus::Faulted);
}

#[test]
fn test_hostile_device_latches_a_bus_fault() {
    // A device that drives the data line on every cycle breaks the
    // protocol on the very first (Address) cycle of RESET.
    struct Jammer;
    impl BusDevice for Jammer {
        fn name(&self) -> &'static str {
            "jammer"
        }
        fn tick(&mut self, _outputs: &BusOutputs) -> DeviceReply {
            DeviceReply {
                data: Some(true),
                irq: false,
            }
        }
    }

    let mut cpu = Cpu::new(MachineConfig::base16());
    let mut plane = Backplane::new();
    plane.attach(Box::new(Jammer));
    let outputs = cpu.bus_outputs();
    match plane.tick(&outputs) {
        Ok(_) => panic!("jammed cycle should report a fault"),
        Err(details) => cpu.latch_fault(details),
    }
    let fault = cpu.fault().expect("fault should be latched");
    assert_eq!(fault.kind(), FaultKind::BusProtocol);
    assert_eq!(fault.snapshot.state, State::Reset);
    // The faulted machine steps nowhere and drives an idle bus.
    assert_eq!(cpu.step(&BusInputs::quiet()), CycleStatus::Faulted);
    assert_eq!(cpu.bus_outputs(), BusOutputs::idle());
    assert_eq!(cpu.total_cycles(), 0);
    // Only the operator's reset line releases it.
    cpu.reset();
    assert!(cpu.fault().is_none());
    assert_eq!(cpu.state(), State::Reset);
}

#[test]
fn test_image_words_must_match_the_machine_width() {
    let narrow = [Word::from_bits(WordWidth::W8, 1)];
    let result = System::new(MachineConfig::base16(), &narrow);
    assert!(matches!(
        result,
        Err(ImageError::WrongWidth {
            index: 0,
            got: 8,
            want: 16
        })
    ));
}

#[test]
fn test_add_and_store() {
    let mut image = vec![
        asm(Opcode::Lit, 5),
        asm(Opcode::Add, 6),
        asm(Opcode::Store, 17),
    ];
    image.extend(halt_pair());
    let mut system = boot(MachineConfig::base16(), &image);
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 17).value(), 11);
    assert!(system.stop_asserted());
}

#[test]
fn test_bitwise_identities() {
    // OR 0, XOR 0 and an all-ones immediate AND all leave the
    // accumulator alone; the AND holds even though the immediate
    // operand has no top-nibble bits to mask with.
    let mut image = vec![
        asm(Opcode::Lit, 0xA5),
        asm(Opcode::Sl, 0xFF),
        asm(Opcode::Or, 0x5A5),
        asm(Opcode::And, 0xFFF),
        asm(Opcode::Or, 0),
        asm(Opcode::Xor, 0),
        asm(Opcode::Store, 16),
    ];
    image.extend(halt_pair());
    let mut system = boot(MachineConfig::base16(), &image);
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 16).value(), 0xA5A5);
}

#[test]
fn test_add_wraps_and_sets_carry() {
    // 0xFFFF + 1 wraps to zero with the carry flag set; the flags
    // word captured right after shows CF and the recomputed Z.
    let mut image = vec![
        asm(Opcode::Lit, 0xFFF),
        asm(Opcode::Sl, 0xF),
        asm(Opcode::Or, 0xFFF),
        asm(Opcode::Add, 1),
        asm(Opcode::Get, 0),
        asm(Opcode::Store, 16),
    ];
    image.extend(halt_pair());
    let mut system = boot(MachineConfig::base16(), &image);
    run_to_halt(&mut system);
    assert_eq!(
        peek(&system, 16).value(),
        1 << flag::CF | 1 << flag::Z,
        "expected CF and Z only"
    );
}

#[test]
fn test_zero_negative_parity_flags() {
    // 0x8000: not zero, negative, one set bit (odd parity).
    let mut image = vec![
        asm(Opcode::Lit, 0x800),
        asm(Opcode::Sl, 0xF),
        asm(Opcode::Get, 0),
        asm(Opcode::Store, 16),
    ];
    image.extend(halt_pair());
    let mut system = boot(MachineConfig::base16(), &image);
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 16).value(), 1 << flag::NG | 1 << flag::PAR);

    // A zero accumulator raises Z alone.
    let mut image = vec![
        asm(Opcode::Or, 0),
        asm(Opcode::Get, 0),
        asm(Opcode::Store, 16),
    ];
    image.extend(halt_pair());
    let mut system = boot(MachineConfig::base16(), &image);
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 16).value(), 1 << flag::Z);
}

#[test]
fn test_jumpz_polarity_is_configurable() {
    // With a zero accumulator, one polarity takes the jump and the
    // other falls through to the 0xBAD store.
    let image = [
        asm(Opcode::Lit, 0),
        asm(Opcode::Jumpz, 5),
        asm(Opcode::Lit, 0xBAD),
        asm(Opcode::Store, 16),
        asm(Opcode::Jump, 7),
        asm(Opcode::Lit, 1),
        asm(Opcode::Store, 16),
        asm(Opcode::Lit, 1 << flag::HLT),
        asm(Opcode::Set, 0),
    ];

    let mut system = boot(MachineConfig::base16(), &image);
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 16).value(), 1, "taken-when-zero should jump");

    let config = MachineConfig::new(W, IsaVariant::Base, JumpzPolarity::TakenWhenNonzero)
        .expect("config should build");
    let mut system = boot(config, &image);
    run_to_halt(&mut system);
    assert_eq!(
        peek(&system, 16).value(),
        0xBAD,
        "taken-when-nonzero should fall through on a zero accumulator"
    );
}

#[test]
fn test_store_drains_and_load_restores() {
    // The first store moves the word out; the second proves the
    // accumulator was left empty; the load brings the word back.
    let mut image = vec![
        asm(Opcode::Lit, 0x5A5),
        asm(Opcode::Store, 16),
        asm(Opcode::Store, 17),
        asm(Opcode::Load, 16),
        asm(Opcode::Store, 18),
    ];
    image.extend(halt_pair());
    let mut system = boot(MachineConfig::base16(), &image);
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 16).value(), 0x5A5);
    assert_eq!(
        peek(&system, 17).value(),
        0,
        "a store empties the accumulator"
    );
    assert_eq!(peek(&system, 18).value(), 0x5A5);
}

#[test]
fn test_complementing_memory_ops() {
    // STOREC complements on the way out, LOADC on the way in; the
    // pair round-trips while memory holds the complement.
    let mut image = vec![
        asm(Opcode::Lit, 0x5A5),
        asm(Opcode::Storec, 16),
        asm(Opcode::Loadc, 16),
        asm(Opcode::Store, 17),
    ];
    image.extend(halt_pair());
    let mut system = boot(MachineConfig::base16(), &image);
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 16).value(), 0xFA5A);
    assert_eq!(peek(&system, 17).value(), 0x5A5);
}

#[test]
fn test_indirection_is_sticky_until_disarmed() {
    // One IND 1 covers both the LOAD and the XOR that follows: the
    // load goes through mem[10] and the XOR operand comes from
    // mem[11].
    let mut image = vec![
        asm(Opcode::Ind, 1),
        asm(Opcode::Load, 10),
        asm(Opcode::Xor, 11),
        asm(Opcode::Ind, 0),
        asm(Opcode::Store, 24),
        asm(Opcode::Lit, 1 << flag::HLT),
        asm(Opcode::Set, 0),
    ];
    image.resize(10, Word::zero(W));
    image.extend([w16!(14), w16!(0x0F0), Word::zero(W), Word::zero(W), w16!(0xAA)]);
    let mut system = boot(MachineConfig::base16(), &image);
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 24).value(), 0xAA ^ 0xF0);
}

#[test]
fn test_operand_top_bit_blocks_indirection() {
    // With indirection armed, a LOAD whose operand has the top
    // (I/O select) bit set still runs direct: here it reads the
    // console data port instead of chasing a pointer.
    let mut image = vec![
        asm(Opcode::Ind, 1),
        asm(Opcode::Load, 0x802),
        asm(Opcode::Ind, 0),
        asm(Opcode::Store, 24),
    ];
    image.extend(halt_pair());
    let mut system = boot(MachineConfig::base16(), &image);
    system.console().queue_input(b"k");
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 24).value(), u32::from(b'k'));
    assert_eq!(system.console().pending_input(), 0);
}

#[test]
fn test_get_set_reach_the_console_window() {
    // With the I/O select bit set, SET becomes a peripheral store
    // and GET a peripheral load.
    let mut image = vec![
        asm(Opcode::Lit, u32::from(b'A')),
        asm(Opcode::Set, 0x800),
        asm(Opcode::Get, 0x802),
        asm(Opcode::Store, 16),
    ];
    image.extend(halt_pair());
    let mut system = boot(MachineConfig::base16(), &image);
    system.console().queue_input(b"B");
    run_to_halt(&mut system);
    assert_eq!(system.console().take_output(), b"A");
    assert_eq!(peek(&system, 16).value(), u32::from(b'B'));
}

#[test]
fn test_console_status_poll_leaves_input_queued() {
    let mut image = vec![asm(Opcode::Get, 0x801), asm(Opcode::Store, 16)];
    image.extend(halt_pair());
    let mut system = boot(MachineConfig::base16(), &image);
    system.console().queue_input(b"x");
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 16).value(), 1);
    assert_eq!(system.console().pending_input(), 1);
}

#[test]
fn test_open_bus_reads_zero() {
    // mem[30] points far beyond both RAM and the peripheral window;
    // the indirect load finds nobody driving and reads all zeros.
    let mut image = vec![
        asm(Opcode::Lit, 0xFFF),
        asm(Opcode::Ind, 1),
        asm(Opcode::Load, 30),
        asm(Opcode::Ind, 0),
        asm(Opcode::Store, 24),
    ];
    image.extend(halt_pair());
    image.resize(30, Word::zero(W));
    image.push(w16!(0x4000));
    let mut system = boot(MachineConfig::base16(), &image);
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 24).value(), 0);
}

#[test]
fn test_exchange_with_pc_is_a_computed_jump() {
    // SET 1 swaps the accumulator with PC: control moves to address
    // 5 and the accumulator comes back holding the old PC.
    let image = [
        asm(Opcode::Lit, 5),
        asm(Opcode::Set, 1),
        asm(Opcode::Lit, 0xBAD),
        asm(Opcode::Store, 24),
        Word::zero(W),
        asm(Opcode::Store, 24),
        asm(Opcode::Lit, 1 << flag::HLT),
        asm(Opcode::Set, 0),
    ];
    let mut system = boot(MachineConfig::base16(), &image);
    run_to_halt(&mut system);
    assert_eq!(
        peek(&system, 24).value(),
        1,
        "the exchange should capture the old PC"
    );
}

#[test]
fn test_shift_amount_is_the_operand_popcount() {
    // SL 0xFFF is twelve set bits, so a twelve-place shift.
    let mut image = vec![
        asm(Opcode::Lit, 2),
        asm(Opcode::Sl, 0xFFF),
        asm(Opcode::Store, 24),
    ];
    image.extend(halt_pair());
    let mut system = boot(MachineConfig::base16(), &image);
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 24).value(), 2 << 12);
}

#[test]
fn test_rotate_flag_recirculates_shifts() {
    // With ROT set, the bit leaving one end re-enters the other;
    // with ROT clear it is simply lost.
    let mut image = vec![
        asm(Opcode::Lit, 1 << flag::ROT),
        asm(Opcode::Set, 0),
        asm(Opcode::Lit, 1),
        asm(Opcode::Sr, 1),
        asm(Opcode::Store, 24),
        asm(Opcode::Lit, 0),
        asm(Opcode::Set, 0),
        asm(Opcode::Lit, 1),
        asm(Opcode::Sr, 1),
        asm(Opcode::Store, 25),
    ];
    image.extend(halt_pair());
    let mut system = boot(MachineConfig::base16(), &image);
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 24).value(), 0x8000, "rotated bit should wrap");
    assert_eq!(peek(&system, 25).value(), 0, "plain shift should drop it");
}

#[test]
fn test_indirect_and_masks_the_full_word() {
    // An indirect AND operand arrives as a full word, so unlike the
    // immediate form it can clear the top nibble.
    let mut image = vec![
        asm(Opcode::Lit, 0xA5),
        asm(Opcode::Sl, 0xFF),
        asm(Opcode::Or, 0x5A),
        asm(Opcode::Ind, 1),
        asm(Opcode::And, 20),
        asm(Opcode::Ind, 0),
        asm(Opcode::Store, 24),
    ];
    image.extend(halt_pair());
    image.resize(20, Word::zero(W));
    image.push(w16!(0x0FF0));
    let mut system = boot(MachineConfig::base16(), &image);
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 24).value(), 0xA55A & 0x0FF0);
}

fn watch_and_drain(config: MachineConfig) -> (Word, Word) {
    // Runs LIT then AND 0xABC and samples the operand register twice
    // inside the AND's EXECUTE window: mid-window (after eight data
    // cycles) and again at the setup cycle of the following ADVANCE.
    let mut image = vec![asm(Opcode::Lit, 0x123), asm(Opcode::And, 0xABC)];
    image.extend(halt_pair());
    let mut system = boot(config, &image);
    let mut windows = 0_u8;
    let mut mid = None;
    let mut after = None;
    for _ in 0..5_000 {
        let state = system.cpu().state();
        let cycle = system.cpu().snapshot().cycle;
        if state == State::Execute && cycle == 0 {
            windows += 1;
        }
        if windows == 2 {
            if state == State::Execute && cycle == 9 {
                mid = Some(system.cpu().registers().operand);
            }
            if state == State::Advance && cycle == 0 {
                after = Some(system.cpu().registers().operand);
                break;
            }
        }
        system.step();
    }
    (
        mid.expect("AND window never reached cycle 9"),
        after.expect("AND window never committed"),
    )
}

#[test]
fn test_base_and_rotates_the_operand_back_into_place() {
    let (mid, after) = watch_and_drain(MachineConfig::base16());
    // Eight rotations displace the field; twelve rotations plus the
    // four trailing shifts put it back exactly.
    assert_eq!(mid.value(), 0xBC0A);
    assert_eq!(after.value(), 0x0ABC);
}

#[test]
fn test_extended_and_consumes_the_operand() {
    let (mid, after) = watch_and_drain(MachineConfig::extended16());
    assert_eq!(mid.value(), 0x000A);
    assert_eq!(after.value(), 0);
}

#[test]
fn test_halt_is_absorbing() {
    let image = halt_pair();
    let mut system = boot(MachineConfig::base16(), &image);
    run_to_halt(&mut system);
    for _ in 0..100 {
        assert_eq!(system.step(), CycleStatus::Halted);
        assert_eq!(system.cpu().state(), State::Halt);
        assert!(system.stop_asserted());
    }
}

#[test]
fn test_reset_flag_restarts_the_machine() {
    // The first pass through the program finds mem[24] zero, writes
    // a one there and raises RST; the restarted pass finds the one
    // and halts.  RAM contents survive the machine reset.
    let image = [
        asm(Opcode::Load, 24),
        asm(Opcode::Jumpz, 4),
        asm(Opcode::Lit, 1 << flag::HLT),
        asm(Opcode::Set, 0),
        asm(Opcode::Lit, 1),
        asm(Opcode::Store, 24),
        asm(Opcode::Lit, 1 << flag::RST),
        asm(Opcode::Set, 0),
    ];
    let mut system = boot(MachineConfig::base16(), &image);
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 24).value(), 1);
}

#[test]
fn test_base_variant_ignores_the_interrupt_line() {
    let mut image = vec![asm(Opcode::Lit, 1), asm(Opcode::Store, 16)];
    image.extend(halt_pair());
    let mut system = boot(MachineConfig::base16(), &image);
    // Pending console input holds irq high for the whole run.
    system.console().queue_input(b"!");
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 16).value(), 1);
    assert!(!system.cpu().registers().flag(flag::IR));
}

#[test]
fn test_narrow_machine_runs() {
    // Width is a parameter: an 8-bit machine has 4-bit operands, so
    // reaching the HLT flag value 0x20 takes two shifts.
    let w8 = WordWidth::W8;
    let asm8 = |opcode: Opcode, operand: u32| -> Word {
        SymbolicInstruction::new(opcode, operand)
            .encode(w8)
            .expect("test instruction should encode")
            .into()
    };
    let image = [
        asm8(Opcode::Lit, 0xA),
        asm8(Opcode::Store, 0xF),
        asm8(Opcode::Lit, 1),
        asm8(Opcode::Sl, 0xF),
        asm8(Opcode::Sl, 1),
        asm8(Opcode::Set, 0),
    ];
    let config = MachineConfig::new(w8, IsaVariant::Base, JumpzPolarity::TakenWhenZero)
        .expect("config should build");
    let mut system = boot(config, &image);
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 0xF).value(), 0xA);
}

#[test]
fn test_wide_machine_runs() {
    let w32 = WordWidth::new(32).expect("32 is a valid width");
    let asm32 = |opcode: Opcode, operand: u32| -> Word {
        SymbolicInstruction::new(opcode, operand)
            .encode(w32)
            .expect("test instruction should encode")
            .into()
    };
    let image = [
        asm32(Opcode::Lit, 5),
        asm32(Opcode::Add, 6),
        asm32(Opcode::Store, 17),
        asm32(Opcode::Lit, 1 << flag::HLT),
        asm32(Opcode::Set, 0),
    ];
    let config = MachineConfig::new(w32, IsaVariant::Base, JumpzPolarity::TakenWhenZero)
        .expect("config should build");
    let mut system = boot(config, &image);
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 17).value(), 11);
}

#[test]
fn test_sub_and_underflow() {
    // 3 - 7 wraps and borrows: UF set, and Z rides along in the
    // captured flags because the accumulator was drained first.
    let mut image = vec![
        asm(Opcode::Lit, 3),
        asm(Opcode::Sub, 7),
        asm(Opcode::Store, 24),
        asm(Opcode::Get, 0),
        asm(Opcode::Store, 25),
    ];
    image.extend(halt_pair());
    let mut system = boot(MachineConfig::extended16(), &image);
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 24).value(), 0xFFFC);
    assert_eq!(peek(&system, 25).value(), 1 << flag::UF | 1 << flag::Z);

    // 9 - 4 does not borrow.
    let mut image = vec![
        asm(Opcode::Lit, 9),
        asm(Opcode::Sub, 4),
        asm(Opcode::Store, 24),
        asm(Opcode::Get, 0),
        asm(Opcode::Store, 25),
    ];
    image.extend(halt_pair());
    let mut system = boot(MachineConfig::extended16(), &image);
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 24).value(), 5);
    assert_eq!(peek(&system, 25).value(), 1 << flag::Z);
}

#[test]
fn test_invert_is_xnor() {
    let mut image = vec![
        asm(Opcode::Lit, 0xF0F),
        asm(Opcode::Invert, 0xFF),
        asm(Opcode::Store, 24),
    ];
    image.extend(halt_pair());
    let mut system = boot(MachineConfig::extended16(), &image);
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 24).value(), 0xF00F);
}

#[test]
fn test_interrupt_round_trip() {
    // Console input raises irq before the main program has even
    // enabled interrupts.  Once it does, the spin at 4/5 is
    // interrupted; the handler reads the byte, posts it to the
    // mailbox at 24, restores IE and returns through shadow + SET
    // PC.  The resumed spin sees the mailbox and copies it to 25.
    let mut image = vec![
        asm(Opcode::Lit, 16),
        asm(Opcode::Shadow, 0),
        asm(Opcode::Lit, 1 << flag::IE),
        asm(Opcode::Set, 0),
        asm(Opcode::Load, 24),
        asm(Opcode::Jumpz, 4),
        asm(Opcode::Store, 25),
        asm(Opcode::Lit, 1 << flag::HLT),
        asm(Opcode::Set, 0),
    ];
    image.resize(16, Word::zero(W));
    image.extend([
        asm(Opcode::Get, 0x802),
        asm(Opcode::Store, 24),
        asm(Opcode::Lit, 1 << flag::IE),
        asm(Opcode::Set, 0),
        asm(Opcode::Shadow, 0),
        asm(Opcode::Set, 1),
    ]);
    let mut system = boot(MachineConfig::extended16(), &image);
    system.console().queue_input(b"k");
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 24).value(), u32::from(b'k'));
    assert_eq!(peek(&system, 25).value(), u32::from(b'k'));
    assert_eq!(system.console().pending_input(), 0);
}

#[test]
fn test_interrupt_wakes_the_halted_machine() {
    // The main program parks itself in HALT with IE set.  A byte
    // arriving later wakes it straight into the handler; the
    // handler's return lands on the re-halt pair at 4/5.
    let mut image = vec![
        asm(Opcode::Lit, 16),
        asm(Opcode::Shadow, 0),
        asm(Opcode::Lit, 1 << flag::IE | 1 << flag::HLT),
        asm(Opcode::Set, 0),
        asm(Opcode::Lit, 1 << flag::HLT),
        asm(Opcode::Set, 0),
    ];
    image.resize(16, Word::zero(W));
    image.extend([
        asm(Opcode::Get, 0x802),
        asm(Opcode::Store, 24),
        asm(Opcode::Shadow, 0),
        asm(Opcode::Set, 1),
    ]);
    let mut system = boot(MachineConfig::extended16(), &image);
    run_to_halt(&mut system);
    assert_eq!(
        peek(&system, 24).value(),
        0,
        "nothing should run before the byte"
    );

    system.console().queue_input(b"k");
    for _ in 0..5_000 {
        system.step();
    }
    assert_eq!(
        system.cpu().state(),
        State::Halt,
        "machine should halt again"
    );
    assert_eq!(peek(&system, 24).value(), u32::from(b'k'));
    assert_eq!(system.console().pending_input(), 0);
    assert!(system.fault().is_none());
}

#[test]
fn test_instruction_counter_fires_at_compare() {
    // Compare is armed at 8 after seven instructions have already
    // bumped the counter, so the eighth fetch commit (the second
    // spin) dispatches.  The handler swaps the counter out: its own
    // fetch made it 9.
    let mut image = vec![
        asm(Opcode::Lit, 16),
        asm(Opcode::Shadow, 0),
        asm(Opcode::Lit, 1 << flag::IE),
        asm(Opcode::Set, 0),
        asm(Opcode::Lit, 8),
        asm(Opcode::Shadow, 2),
        asm(Opcode::Jump, 6),
    ];
    image.resize(16, Word::zero(W));
    image.extend([
        asm(Opcode::Shadow, 1),
        asm(Opcode::Store, 24),
        asm(Opcode::Lit, 1 << flag::HLT),
        asm(Opcode::Set, 0),
    ]);
    let mut system = boot(MachineConfig::extended16(), &image);
    run_to_halt(&mut system);
    assert_eq!(peek(&system, 24).value(), 9);
}

#[test]
fn test_hello() {
    // LITERAL 5, ADD 6, then an indirect copy loop that feeds the
    // message through the console port and halts on the
    // terminator.  The sum is banked at 17 the instant ADD commits.
    const PTR: u32 = 16;
    const RESULT: u32 = 17;
    let mut image = vec![
        asm(Opcode::Lit, 5),
        asm(Opcode::Add, 6),
        asm(Opcode::Store, RESULT),
        asm(Opcode::Ind, 1),
        asm(Opcode::Load, PTR),
        asm(Opcode::Jumpz, 13),
        asm(Opcode::Set, 0x800),
        asm(Opcode::Ind, 0),
        asm(Opcode::Load, PTR),
        asm(Opcode::Add, 1),
        asm(Opcode::Store, PTR),
        asm(Opcode::Ind, 1),
        asm(Opcode::Jump, 4),
        asm(Opcode::Lit, 1 << flag::HLT),
        asm(Opcode::Set, 0),
        Word::zero(W),
        w16!(18),
        Word::zero(W),
    ];
    for byte in b"HELLO\r\n" {
        image.push(Word::from_bits(W, u32::from(*byte)));
    }
    image.push(Word::zero(W));

    let mut system = boot(MachineConfig::base16(), &image);
    run_to_halt(&mut system);
    assert_eq!(system.console().take_output(), b"HELLO\r\n");
    assert_eq!(peek(&system, RESULT).value(), 11);
    assert!(system.stop_asserted());
    assert_eq!(system.cpu().state(), State::Halt);
}
