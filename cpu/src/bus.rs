//! Bus lines and the device interface.
//!
//! The bus is one bit wide in each direction.  The processor drives
//! an address bit `a`, a data-out bit `o`, one of three enable
//! strobes and the `stop` indicator; it samples a data-in bit `i` and
//! the interrupt line.  A word transfer is N consecutive data cycles
//! under the same strobe, least significant bit first, and the
//! address for a transfer is always streamed (under an Address
//! strobe) in the state preceding the data phase.
//!
//! At most one strobe may be asserted per cycle.  The arbitration is
//! structural: outputs carry an `Option<Strobe>`, so the processor
//! cannot express a double assertion at all.  Devices remain able to
//! misbehave (drive data without an Input strobe, or two at once),
//! which the backplane reports as a bus fault.

use std::fmt::{self, Display, Formatter};

use base::prelude::WordWidth;
use serde::Serialize;

/// The three enable strobes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Strobe {
    /// The processor is streaming an address (or fresh PC) on `a`.
    Address,
    /// The addressed device must stream data on `i`.
    Input,
    /// The processor is streaming store data on `o`.
    Output,
}

impl Display for Strobe {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strobe::Address => "ae",
            Strobe::Input => "ie",
            Strobe::Output => "oe",
        })
    }
}

/// What the processor drives during one cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BusOutputs {
    /// Serial address bit, meaningful under an Address strobe.
    pub a: bool,
    /// Serial data-out bit, meaningful under an Output strobe.
    pub o: bool,
    pub strobe: Option<Strobe>,
    /// Asserted on every cycle the machine spends halted.
    pub stop: bool,
}

impl BusOutputs {
    pub const fn idle() -> BusOutputs {
        BusOutputs {
            a: false,
            o: false,
            strobe: None,
            stop: false,
        }
    }
}

/// What the processor samples during one cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BusInputs {
    /// Serial data-in bit.
    pub i: bool,
    /// Interrupt line.  The base variant ignores it.
    pub irq: bool,
}

impl BusInputs {
    pub const fn quiet() -> BusInputs {
        BusInputs { i: false, irq: false }
    }
}

/// One device's contribution to one cycle.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeviceReply {
    /// `Some(bit)` drives the data line.  Legal only during an Input
    /// strobe, and only for one device at a time.
    pub data: Option<bool>,
    /// Level-triggered interrupt request.
    pub irq: bool,
}

/// A peripheral on the bus.  `tick` is called exactly once per clock
/// cycle, after the processor has driven its outputs for that cycle;
/// whatever the device returns is what the processor samples in the
/// same cycle.
pub trait BusDevice {
    fn name(&self) -> &'static str;

    fn tick(&mut self, outputs: &BusOutputs) -> DeviceReply;
}

/// Position of the current cycle within a data run, as a device sees
/// it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataCycle {
    pub strobe: Strobe,
    /// Zero-based bit index within the run.
    pub index: u8,
    /// True on the cycle carrying the word's top bit, when writes
    /// commit and reads retire.
    pub is_last: bool,
}

/// The bookkeeping a word-at-a-time device keeps on the bus: an
/// address latch fed by Address strobes and a bit counter for data
/// runs.  Every such device carries its own copy; the processor does
/// not re-announce the address during the data phase.
#[derive(Debug)]
pub struct BusTap {
    width: WordWidth,
    addr: u32,
    run: Option<(Strobe, u8)>,
}

impl BusTap {
    pub fn new(width: WordWidth) -> BusTap {
        BusTap {
            width,
            addr: 0,
            run: None,
        }
    }

    /// The most recently completed address.  Meaningful during data
    /// runs; mid-shift values are transient.
    pub fn address(&self) -> u32 {
        self.addr
    }

    pub fn width(&self) -> WordWidth {
        self.width
    }

    /// Absorb one cycle's strobes.  Returns the data-run position
    /// when this cycle moves a data bit.
    pub fn observe(&mut self, outputs: &BusOutputs) -> Option<DataCycle> {
        match outputs.strobe {
            Some(Strobe::Address) => {
                let top = (outputs.a as u32) << self.width.top_bit();
                self.addr = (self.addr >> 1) | top;
                self.run = None;
                None
            }
            Some(strobe) => {
                let index = match self.run {
                    Some((running, i)) if running == strobe => i.saturating_add(1),
                    _ => 0,
                };
                self.run = Some((strobe, index));
                Some(DataCycle {
                    strobe,
                    index,
                    is_last: index == self.width.top_bit(),
                })
            }
            None => {
                self.run = None;
                None
            }
        }
    }
}
