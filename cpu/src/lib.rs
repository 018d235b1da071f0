//! Cycle-accurate model of a bit-serial processor: one bit of
//! address, data and control moves per clock cycle, and every
//! architectural register is a shift register.
#![crate_name = "cpu"]

mod alu;
mod bus;
mod config;
mod control;
mod fault;
mod io;
mod regs;
mod sequencer;
mod system;

pub use bus::{BusDevice, BusInputs, BusOutputs, BusTap, DataCycle, DeviceReply, Strobe};
pub use config::{ConfigError, JumpzPolarity, MachineConfig};
pub use control::{Cpu, CycleStatus, State};
pub use fault::{Fault, FaultDetails, FaultKind, MachineSnapshot};
pub use io::console::{Console, ConsoleHandle, PORT_IN_DATA, PORT_IN_STATUS, PORT_OUT};
pub use io::ram::{Ram, RamHandle};
pub use io::{is_peripheral_address, peripheral_base, Backplane};
pub use regs::{flag, RegisterSnapshot, Registers};
pub use sequencer::Sequencer;
pub use system::System;
