//! Fatal simulation faults.
//!
//! The model distrusts itself: the strobes derived from the cycle
//! counter are cross-checked every cycle, state transitions are
//! validated against the machine's edge set, and the backplane
//! polices who may drive the data line.  When any of those checks
//! fails the machine latches a [`Fault`] carrying a full snapshot,
//! and every later step reports the same fault.  Nothing
//! auto-recovers; a faulted machine is evidence to examine, not a
//! thing to keep running.
//!
//! Halting is not a fault.  A program that sets the HLT flag has
//! finished, and the stepping API reports that as its own status.

use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use crate::bus::Strobe;
use crate::control::State;
use crate::regs::RegisterSnapshot;

/// Broad classification of a fault, for reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FaultKind {
    /// The simulation's own invariants broke: cycle bookkeeping or an
    /// impossible state transition.
    Structural,
    /// A device violated the bus protocol.
    BusProtocol,
}

impl Display for FaultKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FaultKind::Structural => "structural fault",
            FaultKind::BusProtocol => "bus protocol fault",
        })
    }
}

/// What exactly went wrong.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FaultDetails {
    /// The latched first/last4/last strobes disagree with the cycle
    /// counter they are derived from.
    CycleCounterSkew {
        counter: u8,
        first: bool,
        last4: bool,
        last: bool,
    },
    /// The state machine tried to commit an edge that does not exist.
    IllegalTransition { from: State, to: State },
    /// A device drove the data line on a cycle without an Input
    /// strobe.
    DataDrivenWithoutEnable {
        device: &'static str,
        strobe: Option<Strobe>,
    },
    /// Two devices drove the data line in the same cycle.
    MultipleBusDrivers {
        first: &'static str,
        second: &'static str,
    },
}

impl FaultDetails {
    pub fn kind(&self) -> FaultKind {
        match self {
            FaultDetails::CycleCounterSkew { .. } | FaultDetails::IllegalTransition { .. } => {
                FaultKind::Structural
            }
            FaultDetails::DataDrivenWithoutEnable { .. }
            | FaultDetails::MultipleBusDrivers { .. } => FaultKind::BusProtocol,
        }
    }
}

impl Display for FaultDetails {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FaultDetails::CycleCounterSkew {
                counter,
                first,
                last4,
                last,
            } => write!(
                f,
                "cycle counter {counter} disagrees with its strobes \
                 (first={first} last4={last4} last={last})"
            ),
            FaultDetails::IllegalTransition { from, to } => {
                write!(f, "no transition exists from {from} to {to}")
            }
            FaultDetails::DataDrivenWithoutEnable { device, strobe } => match strobe {
                Some(s) => write!(f, "device {device} drove data during an {s} cycle"),
                None => write!(f, "device {device} drove data with no strobe asserted"),
            },
            FaultDetails::MultipleBusDrivers { first, second } => {
                write!(f, "devices {first} and {second} both drove the data line")
            }
        }
    }
}

/// The machine state at the moment a fault fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MachineSnapshot {
    pub state: State,
    pub cycle: u8,
    pub total_cycles: u64,
    pub stop: bool,
    pub registers: RegisterSnapshot,
}

impl Display for MachineSnapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "state={} cycle={} total_cycles={} stop={} {}",
            self.state, self.cycle, self.total_cycles, self.stop, self.registers
        )
    }
}

/// A latched fault: the details plus the snapshot taken when it
/// fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Fault {
    pub details: FaultDetails,
    pub snapshot: MachineSnapshot,
}

impl Fault {
    pub fn kind(&self) -> FaultKind {
        self.details.kind()
    }
}

impl Display for Fault {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.kind(), self.details, self.snapshot)
    }
}

impl std::error::Error for Fault {}
