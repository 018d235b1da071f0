//! The control unit: a nine-state machine clocked one bit per cycle.
//!
//! Every state occupies exactly N+1 cycles on an N-bit machine.
//! Cycle 0 is the setup cycle, where the state decides what it is
//! about to do (EXECUTE decodes the opcode nibble here).  Cycles
//! 1..=N each move one bit, least significant first.  Cycle N is also
//! the commit cycle: the successor state is chosen and becomes
//! current before the next cycle begins.
//!
//! Within this model the control unit performs the following
//! functions:
//!
//! - Drive the bus lines for the current cycle ([`Cpu::bus_outputs`])
//! - Shift the register bank one bit per cycle ([`Cpu::step`])
//! - Dispatch the sixteen operations of the configured variant
//! - Recompute Z/NG/PAR from the recirculating accumulator each fetch
//! - Latch and dispatch interrupts (extended variant)
//! - Police its own cycle bookkeeping and state edges, latching a
//!   [`Fault`] when either breaks
//!
//! The split between `bus_outputs` and `step` models a synchronous
//! register-transfer update: outputs are a pure function of the
//! current state, devices answer combinationally, and the whole
//! machine then commits one clock edge atomically.

use std::fmt::{self, Display, Formatter};

use serde::Serialize;
use tracing::{event, Level};

use base::prelude::*;

use crate::alu::full_add;
use crate::bus::{BusInputs, BusOutputs, Strobe};
use crate::config::MachineConfig;
use crate::fault::{Fault, FaultDetails, MachineSnapshot};
use crate::regs::{flag, Registers};
use crate::sequencer::Sequencer;

mod execute;
#[cfg(test)]
mod tests;

use execute::ExecAction;

/// The control states.  INDIRECT and OPERAND exist only in the base
/// variant's state graph; the extended variant reaches neither.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum State {
    Reset,
    Fetch,
    Indirect,
    Operand,
    Execute,
    Load,
    Store,
    Advance,
    Halt,
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Reset => "RESET",
            State::Fetch => "FETCH",
            State::Indirect => "INDIRECT",
            State::Operand => "OPERAND",
            State::Execute => "EXECUTE",
            State::Load => "LOAD",
            State::Store => "STORE",
            State::Advance => "ADVANCE",
            State::Halt => "HALT",
        })
    }
}

/// What one call to [`Cpu::step`] left behind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CycleStatus {
    Running,
    /// The machine is in HALT with the stop line asserted.  Not an
    /// error; the program finished.
    Halted,
    /// A fault is latched; every further step reports it again.
    Faulted,
}

/// The edge set of the state graph.  `commit` only ever returns edges
/// from this set; the check in `step` exists to catch the model
/// contradicting itself.
pub(crate) fn transition_allowed(variant: IsaVariant, from: State, to: State) -> bool {
    use State::*;
    let common = matches!(
        (from, to),
        (Reset, Fetch)
            | (Fetch, Execute)
            | (Fetch, Halt)
            | (Fetch, Reset)
            | (Execute, Advance)
            | (Execute, Load)
            | (Execute, Store)
            | (Execute, Fetch)
            | (Load, Advance)
            | (Store, Advance)
            | (Advance, Fetch)
            | (Halt, Halt)
    );
    common
        || match variant {
            IsaVariant::Base => matches!(
                (from, to),
                (Fetch, Indirect) | (Indirect, Operand) | (Operand, Execute)
            ),
            IsaVariant::Extended => matches!((from, to), (Fetch, Fetch) | (Halt, Fetch)),
        }
}

/// The processor.  Peripherals are not part of it; wire it to a
/// [`Backplane`](crate::io::Backplane) (or drive the bus by hand) and
/// alternate [`Cpu::bus_outputs`] with [`Cpu::step`].
#[derive(Debug)]
pub struct Cpu {
    config: MachineConfig,
    state: State,
    seq: Sequencer,
    regs: Registers,
    fault: Option<Fault>,
    total_cycles: u64,

    // Intra-instruction latches.
    carry: bool,
    exec: ExecAction,
    data_complement: bool,
    ind_sampled: bool,
    indirect_pass: bool,
    dispatch: bool,
    // The raw interrupt flip-flop.  Kept apart from flag bit 9 so a
    // level arriving while the flag register is mid-shift cannot
    // smear into neighbouring bits; it transfers into the IR flag at
    // the commits that consult it.
    irq_latch: bool,

    // Fetch-time condition taps on the recirculating accumulator.
    z_run: bool,
    par_run: bool,
    ng_latch: bool,
}

impl Cpu {
    pub fn new(config: MachineConfig) -> Cpu {
        Cpu {
            config,
            state: State::Reset,
            seq: Sequencer::new(config.width()),
            regs: Registers::new(config.width()),
            fault: None,
            total_cycles: 0,
            carry: false,
            exec: ExecAction::Idle,
            data_complement: false,
            ind_sampled: false,
            indirect_pass: false,
            dispatch: false,
            irq_latch: false,
            z_run: true,
            par_run: false,
            ng_latch: false,
        }
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            state: self.state,
            cycle: self.seq.counter(),
            total_cycles: self.total_cycles,
            stop: self.state == State::Halt,
            registers: self.regs.snapshot(),
        }
    }

    /// The operator's reset line.  Re-enters RESET at cycle 0 and
    /// releases a latched fault; nothing inside the machine does
    /// either.
    pub fn reset(&mut self) {
        event!(Level::INFO, "external reset");
        self.state = State::Reset;
        self.seq.reseed();
        self.fault = None;
        self.dispatch = false;
        self.irq_latch = false;
    }

    /// What the processor drives on the bus during the current cycle.
    /// Pure: calling this any number of times between steps returns
    /// the same lines.
    pub fn bus_outputs(&self) -> BusOutputs {
        let mut out = BusOutputs::idle();
        if self.fault.is_some() {
            return out;
        }
        match self.state {
            // RESET parks the bus: address-enable with zeros, every
            // cycle, so device address latches come up cleared too.
            State::Reset => {
                out.strobe = Some(Strobe::Address);
            }
            State::Halt => {
                out.stop = true;
            }
            _ if self.seq.is_first() => {}
            State::Fetch => {
                if self.dispatch {
                    // The shadow bit about to enter PC doubles as the
                    // address stream for the handler fetch.
                    out.strobe = Some(Strobe::Address);
                    out.a = self.regs.shadow.bit0();
                } else {
                    out.strobe = Some(Strobe::Input);
                }
            }
            State::Indirect => {
                out.strobe = Some(Strobe::Address);
                out.a = self.regs.operand.bit0();
            }
            State::Operand | State::Load => {
                out.strobe = Some(Strobe::Input);
            }
            State::Store => {
                out.strobe = Some(Strobe::Output);
                out.o = self.regs.acc.bit0() ^ self.data_complement;
            }
            State::Advance => {
                // The incremented PC is visible while it forms, so
                // the following fetch needs no separate address run.
                out.strobe = Some(Strobe::Address);
                out.a = full_add(self.regs.pc.bit0(), false, self.carry).0;
            }
            State::Execute => self.execute_outputs(&mut out),
        }
        out
    }

    /// Advance the machine by one clock cycle, sampling `inputs` as
    /// the device answers for this cycle.
    pub fn step(&mut self, inputs: &BusInputs) -> CycleStatus {
        if self.fault.is_some() {
            return CycleStatus::Faulted;
        }
        if let Err(details) = self.seq.check() {
            self.latch_fault(details);
            return CycleStatus::Faulted;
        }
        // The raw interrupt latch samples the line every cycle; the
        // flag register only learns about it at commit time.
        if self.config.variant() == IsaVariant::Extended && inputs.irq {
            self.irq_latch = true;
        }
        match self.state {
            State::Reset => self.reset_cycle(),
            State::Fetch => self.fetch_cycle(inputs),
            State::Indirect => self.indirect_cycle(),
            State::Operand => self.operand_cycle(inputs),
            State::Execute => self.execute_cycle(),
            State::Load => self.load_cycle(inputs),
            State::Store => self.store_cycle(),
            State::Advance => self.advance_cycle(),
            State::Halt => {}
        }
        if self.seq.is_last() {
            let next = self.commit();
            if transition_allowed(self.config.variant(), self.state, next) {
                event!(Level::TRACE, "{} -> {}", self.state, next);
                self.state = next;
            } else {
                self.latch_fault(FaultDetails::IllegalTransition {
                    from: self.state,
                    to: next,
                });
                return CycleStatus::Faulted;
            }
        }
        self.seq.advance();
        self.total_cycles += 1;
        if self.state == State::Halt {
            CycleStatus::Halted
        } else {
            CycleStatus::Running
        }
    }

    pub(crate) fn latch_fault(&mut self, details: FaultDetails) {
        let fault = Fault {
            details,
            snapshot: self.snapshot(),
        };
        event!(Level::ERROR, "{}", fault);
        self.fault = Some(fault);
    }

    fn reset_cycle(&mut self) {
        if self.seq.is_first() {
            self.carry = false;
            self.exec = ExecAction::Idle;
            self.data_complement = false;
            self.ind_sampled = false;
            self.indirect_pass = false;
            self.dispatch = false;
            self.irq_latch = false;
        }
        // One zero enters every register per cycle; N+1 cycles leave
        // the whole bank cleared, the RST flag included.
        self.regs.acc = self.regs.acc.shifted_in_high(false);
        self.regs.pc = self.regs.pc.shifted_in_high(false);
        self.regs.operand = self.regs.operand.shifted_in_high(false);
        self.regs.flags = self.regs.flags.shifted_in_high(false);
        self.regs.shift_opcode_in(false);
        if self.config.variant() == IsaVariant::Extended {
            self.regs.shadow = self.regs.shadow.shifted_in_high(false);
            self.regs.counter = self.regs.counter.shifted_in_high(false);
            self.regs.compare = self.regs.compare.shifted_in_high(false);
        }
    }

    fn fetch_cycle(&mut self, inputs: &BusInputs) {
        if self.seq.is_first() {
            self.z_run = true;
            self.par_run = false;
            self.ng_latch = false;
            self.indirect_pass = false;
            return;
        }
        if self.dispatch {
            // PC and shadow trade places one bit at a time.  The
            // accumulator and flags stay put: the handler inherits
            // the interrupted context.
            let from_pc = self.regs.pc.bit0();
            let from_shadow = self.regs.shadow.bit0();
            self.regs.pc = self.regs.pc.shifted_in_high(from_shadow);
            self.regs.shadow = self.regs.shadow.shifted_in_high(from_pc);
            return;
        }
        if self.config.variant() == IsaVariant::Base && self.seq.counter() == 1 {
            // Indirection is decided on the first data cycle; an IND
            // landing later in this very fetch arms the next one.
            self.ind_sampled = self.regs.flag(flag::IND);
        }
        let incoming = inputs.i;
        if self.seq.is_last4() {
            self.regs.operand = self.regs.operand.shifted_in_high(false);
            self.regs.shift_opcode_in(incoming);
        } else {
            self.regs.operand = self.regs.operand.shifted_in_high(incoming);
        }
        // The accumulator recirculates so the condition taps can see
        // every bit without losing any.
        let observed = self.regs.acc.bit0();
        self.regs.acc = self.regs.acc.rotated_right();
        self.z_run &= !observed;
        self.par_run ^= observed;
        if self.seq.is_last() {
            self.ng_latch = observed;
        }
    }

    fn indirect_cycle(&mut self) {
        if !self.seq.is_first() {
            self.regs.operand = self.regs.operand.rotated_right();
        }
    }

    fn operand_cycle(&mut self, inputs: &BusInputs) {
        if !self.seq.is_first() {
            self.regs.operand = self.regs.operand.shifted_in_high(inputs.i);
        }
    }

    fn load_cycle(&mut self, inputs: &BusInputs) {
        if !self.seq.is_first() {
            self.regs.acc = self
                .regs
                .acc
                .shifted_in_high(inputs.i ^ self.data_complement);
        }
    }

    fn store_cycle(&mut self) {
        if !self.seq.is_first() {
            // The driven bit leaves for good; a store empties the
            // accumulator.
            self.regs.acc = self.regs.acc.shifted_in_high(false);
        }
    }

    fn advance_cycle(&mut self) {
        if self.seq.is_first() {
            self.carry = true;
            return;
        }
        let (sum, carry) = full_add(self.regs.pc.bit0(), false, self.carry);
        self.carry = carry;
        self.regs.pc = self.regs.pc.shifted_in_high(sum);
    }

    fn commit(&mut self) -> State {
        match self.state {
            State::Reset => State::Fetch,
            State::Fetch => self.commit_fetch(),
            State::Indirect => State::Operand,
            State::Operand => {
                self.indirect_pass = true;
                State::Execute
            }
            State::Execute => self.commit_execute(),
            State::Load | State::Store => State::Advance,
            State::Advance => State::Fetch,
            State::Halt => self.commit_halt(),
        }
    }

    fn commit_fetch(&mut self) -> State {
        if self.dispatch {
            self.dispatch = false;
            self.regs.set_flag(flag::IR, false);
            self.regs.set_flag(flag::IE, false);
            event!(
                Level::DEBUG,
                "interrupt dispatched, handler at {}",
                self.regs.pc
            );
            return State::Fetch;
        }
        self.transfer_irq_latch();
        self.regs.set_flag(flag::Z, self.z_run);
        self.regs.set_flag(flag::NG, self.ng_latch);
        self.regs.set_flag(flag::PAR, self.par_run);
        if self.config.variant() == IsaVariant::Extended {
            self.bump_instruction_counter();
        }
        if self.regs.flag(flag::HLT) {
            event!(Level::INFO, "halt flag set, stopping");
            return State::Halt;
        }
        if self.regs.flag(flag::RST) {
            event!(Level::INFO, "reset flag set, restarting");
            return State::Reset;
        }
        if self.config.variant() == IsaVariant::Extended
            && self.regs.flag(flag::IE)
            && self.regs.flag(flag::IR)
        {
            // The instruction just fetched is discarded; PC still
            // points at it, so the handler's return refetches it.
            self.dispatch = true;
            return State::Fetch;
        }
        if self.config.variant() == IsaVariant::Base
            && self.ind_sampled
            && self.regs.opcode & 0x8 == 0
            && self.regs.operand.value() >> io_select_bit(self.config.width()) & 1 == 0
        {
            return State::Indirect;
        }
        State::Execute
    }

    /// Move a pending raw interrupt into flag bit 9.  Runs only at
    /// the commits that consult the flag, never while the flag
    /// register is shifting.
    fn transfer_irq_latch(&mut self) {
        if self.irq_latch {
            self.irq_latch = false;
            self.regs.set_flag(flag::IR, true);
        }
    }

    /// The instruction counter has its own ripple carry chain; it is
    /// not a user of the shared adder.
    fn bump_instruction_counter(&mut self) {
        let width = self.config.width();
        let bumped = Word::from_bits(width, self.regs.counter.value().wrapping_add(1));
        self.regs.counter = bumped;
        // A compare value of zero disarms the timer.
        if !self.regs.compare.is_zero() && bumped == self.regs.compare {
            event!(Level::DEBUG, "instruction counter reached {}", bumped);
            self.regs.set_flag(flag::IR, true);
        }
    }

    fn commit_halt(&mut self) -> State {
        self.transfer_irq_latch();
        if self.config.variant() == IsaVariant::Extended
            && self.regs.flag(flag::IE)
            && self.regs.flag(flag::IR)
        {
            // Waking releases the halt latch; what runs after the
            // handler returns is the program's business.
            self.regs.set_flag(flag::HLT, false);
            self.dispatch = true;
            event!(Level::INFO, "interrupt wakes the halted machine");
            return State::Fetch;
        }
        State::Halt
    }
}
