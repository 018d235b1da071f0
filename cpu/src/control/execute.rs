//! The EXECUTE window: opcode dispatch and the per-cycle work of
//! every operation that completes inside it.
//!
//! EXECUTE decodes the opcode nibble once, on the setup cycle, into
//! an [`ExecAction`].  The data cycles then run the chosen action one
//! bit at a time, and the commit cycle writes whichever flags the
//! action produces and picks the successor state.  Operations needing
//! a data phase on the bus (LOAD/STORE and their complemented and
//! peripheral forms) spend their EXECUTE window streaming the address
//! and hand off to the LOAD or STORE state.

use tracing::{event, Level};

use base::prelude::*;

use crate::alu::full_add;
use crate::bus::{BusOutputs, Strobe};
use crate::config::JumpzPolarity;
use crate::regs::flag;

use super::{Cpu, State};

/// What the current EXECUTE window is doing, decoded once on the
/// setup cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum ExecAction {
    /// Nothing moves (power-on value; JUMPZ when the test fails).
    Idle,
    Bitwise(BitOp),
    Arith { subtract: bool },
    /// One conditional shift per set operand bit.
    Shift { left: bool },
    /// LIT: the operand streams straight into the accumulator.
    Literal,
    /// Stream the operand as an address; the data phase follows in
    /// LOAD or STORE.
    MemoryAddress { store: bool, complement: bool },
    /// Bit-serial swap of the accumulator with another register.
    Exchange(SwapTarget),
    /// JUMP, or a JUMPZ whose test passed: the operand streams into
    /// PC and onto the address lines at once.
    JumpTaken,
    /// IND: arm or disarm indirection at commit (base variant).
    WriteIndirectFlag(bool),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum BitOp {
    Or,
    And,
    Xor,
    /// INVERT is XNOR: equivalence with the operand.
    Xnor,
}

/// Register on the far side of an exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum SwapTarget {
    Flags,
    Pc,
    Shadow,
    Counter,
    Compare,
}

impl Cpu {
    /// Decode the opcode nibble for this EXECUTE window.  Runs on the
    /// setup cycle, before any bit moves.
    fn execute_setup(&mut self) {
        let opcode = Opcode::decode(self.config.variant(), self.regs.opcode);
        let operand = self.regs.operand.value();
        let peripheral = operand >> io_select_bit(self.config.width()) & 1 != 0;
        self.exec = match opcode {
            Opcode::Or => ExecAction::Bitwise(BitOp::Or),
            Opcode::And => ExecAction::Bitwise(BitOp::And),
            Opcode::Xor => ExecAction::Bitwise(BitOp::Xor),
            Opcode::Invert => ExecAction::Bitwise(BitOp::Xnor),
            Opcode::Add => {
                self.carry = false;
                ExecAction::Arith { subtract: false }
            }
            Opcode::Sub => {
                // Inverted operand plus one: the carry seeds high.
                self.carry = true;
                ExecAction::Arith { subtract: true }
            }
            Opcode::Lit => ExecAction::Literal,
            Opcode::Sl => ExecAction::Shift { left: true },
            Opcode::Sr => ExecAction::Shift { left: false },
            Opcode::Load => ExecAction::MemoryAddress {
                store: false,
                complement: false,
            },
            Opcode::Loadc => ExecAction::MemoryAddress {
                store: false,
                complement: true,
            },
            Opcode::Store => ExecAction::MemoryAddress {
                store: true,
                complement: false,
            },
            Opcode::Storec => ExecAction::MemoryAddress {
                store: true,
                complement: true,
            },
            // With I/O select set, GET and SET are the peripheral
            // forms of LOAD and STORE.
            Opcode::Get if peripheral => ExecAction::MemoryAddress {
                store: false,
                complement: false,
            },
            Opcode::Set if peripheral => ExecAction::MemoryAddress {
                store: true,
                complement: false,
            },
            Opcode::Get | Opcode::Set => {
                ExecAction::Exchange(match ExchangeTarget::from_operand(operand) {
                    ExchangeTarget::Flags => SwapTarget::Flags,
                    ExchangeTarget::ProgramCounter => SwapTarget::Pc,
                })
            }
            Opcode::Jump => ExecAction::JumpTaken,
            Opcode::Jumpz => {
                let zero = self.regs.flag(flag::Z);
                let taken = match self.config.jumpz() {
                    JumpzPolarity::TakenWhenZero => zero,
                    JumpzPolarity::TakenWhenNonzero => !zero,
                };
                if taken {
                    ExecAction::JumpTaken
                } else {
                    ExecAction::Idle
                }
            }
            Opcode::Ind => ExecAction::WriteIndirectFlag(self.regs.operand.bit0()),
            Opcode::Shadow => {
                ExecAction::Exchange(match ShadowTarget::from_operand(operand) {
                    ShadowTarget::Shadow => SwapTarget::Shadow,
                    ShadowTarget::Counter => SwapTarget::Counter,
                    ShadowTarget::Compare => SwapTarget::Compare,
                })
            }
        };
        event!(
            Level::DEBUG,
            "execute {} operand {:#x} as {:?}",
            opcode,
            operand,
            self.exec
        );
    }

    /// Bus lines EXECUTE drives on a data cycle.  Only the address
    /// producers assert anything.
    pub(super) fn execute_outputs(&self, out: &mut BusOutputs) {
        match self.exec {
            ExecAction::MemoryAddress { .. } | ExecAction::JumpTaken => {
                out.strobe = Some(Strobe::Address);
                out.a = self.regs.operand.bit0();
            }
            ExecAction::Exchange(SwapTarget::Pc) => {
                // The accumulator bit entering PC is the address
                // stream for the computed jump.
                out.strobe = Some(Strobe::Address);
                out.a = self.regs.acc.bit0();
            }
            _ => {}
        }
    }

    pub(super) fn execute_cycle(&mut self) {
        if self.seq.is_first() {
            self.execute_setup();
            return;
        }
        match self.exec {
            ExecAction::Idle | ExecAction::WriteIndirectFlag(_) => {}
            ExecAction::Bitwise(op) => self.bitwise_cycle(op),
            ExecAction::Arith { subtract } => {
                let (sum, carry) = full_add(
                    self.regs.acc.bit0(),
                    self.regs.operand.bit0() ^ subtract,
                    self.carry,
                );
                self.carry = carry;
                self.regs.acc = self.regs.acc.shifted_in_high(sum);
                self.regs.operand = self.regs.operand.rotated_right();
            }
            ExecAction::Shift { left } => {
                let shift_now = self.regs.operand.bit0();
                self.regs.operand = self.regs.operand.rotated_right();
                if shift_now {
                    let recirculate = self.regs.flag(flag::ROT);
                    if left {
                        let leaving = self.regs.acc.top_bit();
                        self.regs.acc = self.regs.acc.shifted_in_low(recirculate && leaving);
                    } else {
                        let leaving = self.regs.acc.bit0();
                        self.regs.acc = self.regs.acc.shifted_in_high(recirculate && leaving);
                    }
                }
            }
            ExecAction::Literal => {
                self.regs.acc = self.regs.acc.shifted_in_high(self.regs.operand.bit0());
                self.regs.operand = self.regs.operand.rotated_right();
            }
            ExecAction::MemoryAddress { .. } => {
                self.regs.operand = self.regs.operand.rotated_right();
            }
            ExecAction::JumpTaken => {
                self.regs.pc = self.regs.pc.shifted_in_high(self.regs.operand.bit0());
                self.regs.operand = self.regs.operand.rotated_right();
            }
            ExecAction::Exchange(target) => self.exchange_cycle(target),
        }
    }

    fn bitwise_cycle(&mut self, op: BitOp) {
        let a = self.regs.acc.bit0();
        let last4 = self.seq.is_last4();
        let (y, consumed) = match op {
            // AND consumes its operand.  Without indirection the
            // operand register holds a zero-extended field, so during
            // the final four cycles the operand input is forced high
            // (the accumulator's top nibble passes through) and the
            // register plain-shifts; the four shifts put the field
            // bits, rotated out earlier, back where they started.
            BitOp::And => {
                let force_ones = last4 && !self.indirect_pass;
                let consume = self.indirect_pass
                    || self.config.variant() == IsaVariant::Extended
                    || last4;
                let y = if force_ones {
                    true
                } else {
                    self.regs.operand.bit0()
                };
                (y, consume)
            }
            _ => (self.regs.operand.bit0(), false),
        };
        let result = match op {
            BitOp::Or => a || y,
            BitOp::And => a && y,
            BitOp::Xor => a != y,
            BitOp::Xnor => a == y,
        };
        self.regs.acc = self.regs.acc.shifted_in_high(result);
        self.regs.operand = if consumed {
            self.regs.operand.shifted_in_high(false)
        } else {
            self.regs.operand.rotated_right()
        };
    }

    /// One cycle of a bit-serial swap.  Both registers shift at once;
    /// each one's departing bit enters the other.  Plain reads and
    /// writes do not exist at this level, which is why GET and SET
    /// are both exchanges.
    fn exchange_cycle(&mut self, target: SwapTarget) {
        let from_acc = self.regs.acc.bit0();
        let from_target = match target {
            SwapTarget::Flags => {
                let bit = self.regs.flags.bit0();
                self.regs.flags = self.regs.flags.shifted_in_high(from_acc);
                bit
            }
            SwapTarget::Pc => {
                let bit = self.regs.pc.bit0();
                self.regs.pc = self.regs.pc.shifted_in_high(from_acc);
                bit
            }
            SwapTarget::Shadow => {
                let bit = self.regs.shadow.bit0();
                self.regs.shadow = self.regs.shadow.shifted_in_high(from_acc);
                bit
            }
            SwapTarget::Counter => {
                let bit = self.regs.counter.bit0();
                self.regs.counter = self.regs.counter.shifted_in_high(from_acc);
                bit
            }
            SwapTarget::Compare => {
                let bit = self.regs.compare.bit0();
                self.regs.compare = self.regs.compare.shifted_in_high(from_acc);
                bit
            }
        };
        self.regs.acc = self.regs.acc.shifted_in_high(from_target);
    }

    pub(super) fn commit_execute(&mut self) -> State {
        match self.exec {
            ExecAction::Arith { subtract: false } => {
                self.regs.set_flag(flag::CF, self.carry);
                State::Advance
            }
            ExecAction::Arith { subtract: true } => {
                // A final carry means no borrow happened.
                self.regs.set_flag(flag::UF, !self.carry);
                State::Advance
            }
            ExecAction::MemoryAddress { store, complement } => {
                self.data_complement = complement;
                if store {
                    State::Store
                } else {
                    State::Load
                }
            }
            // Jumps already streamed the new PC as the fetch address;
            // ADVANCE would wreck it.
            ExecAction::JumpTaken | ExecAction::Exchange(SwapTarget::Pc) => State::Fetch,
            ExecAction::WriteIndirectFlag(armed) => {
                self.regs.set_flag(flag::IND, armed);
                State::Advance
            }
            ExecAction::Idle
            | ExecAction::Bitwise(_)
            | ExecAction::Shift { .. }
            | ExecAction::Literal
            | ExecAction::Exchange(_) => State::Advance,
        }
    }
}
