//! The backplane and the peripherals that plug into it.
//!
//! A device sees the same four lines the processor drives and may
//! answer with one data bit and an interrupt level per cycle.  The
//! processor never knows which device answered; the backplane merges
//! the replies and enforces the two rules a shared data line imposes:
//!
//! - A device may drive data only during an Input-strobe cycle.
//! - At most one device may drive data in any cycle.
//!
//! Breaking either rule is a bus fault, reported to the processor so
//! it latches with a snapshot like any other fault.
//!
//! ## Address decoding
//!
//! There is no address decoder in the processor; each device carries
//! a [`BusTap`](crate::bus::BusTap) and decides for itself whether a
//! transfer is aimed at it.  By convention the addresses whose I/O
//! select bit is set and whose higher bits are all clear form the
//! peripheral window (0x0800..=0x0FFF on a 16-bit machine); RAM
//! answers below it.  A read nobody answers returns zeros, like the
//! undriven line it models.

use tracing::{event, Level};

use base::prelude::*;

use crate::bus::{BusDevice, BusInputs, BusOutputs, Strobe};
use crate::fault::FaultDetails;

pub mod console;
pub mod ram;

/// Lowest address of the peripheral window.
pub const fn peripheral_base(width: WordWidth) -> u32 {
    1 << io_select_bit(width)
}

/// True when `addr` falls inside the peripheral window: the I/O
/// select bit set, every higher bit clear.
pub const fn is_peripheral_address(width: WordWidth, addr: u32) -> bool {
    addr >> io_select_bit(width) == 1
}

/// The shared data and interrupt lines, with every attached device
/// hanging off them.
pub struct Backplane {
    devices: Vec<Box<dyn BusDevice>>,
    // True while an undriven input run has already been reported, so
    // a floating word warns once rather than once per bit.
    floating_run: bool,
}

impl Backplane {
    pub fn new() -> Backplane {
        Backplane {
            devices: Vec::new(),
            floating_run: false,
        }
    }

    pub fn attach(&mut self, device: Box<dyn BusDevice>) {
        event!(Level::DEBUG, "attached {} to the backplane", device.name());
        self.devices.push(device);
    }

    /// Run every device for one cycle and merge their replies into
    /// the lines the processor samples.
    pub fn tick(&mut self, outputs: &BusOutputs) -> Result<BusInputs, FaultDetails> {
        let mut inputs = BusInputs::quiet();
        let mut driver: Option<&'static str> = None;
        for device in self.devices.iter_mut() {
            let reply = device.tick(outputs);
            inputs.irq |= reply.irq;
            if let Some(bit) = reply.data {
                if outputs.strobe != Some(Strobe::Input) {
                    return Err(FaultDetails::DataDrivenWithoutEnable {
                        device: device.name(),
                        strobe: outputs.strobe,
                    });
                }
                if let Some(first) = driver {
                    return Err(FaultDetails::MultipleBusDrivers {
                        first,
                        second: device.name(),
                    });
                }
                driver = Some(device.name());
                inputs.i = bit;
            }
        }
        match (outputs.strobe, driver) {
            (Some(Strobe::Input), None) => {
                if !self.floating_run {
                    event!(Level::WARN, "input run with no device answering, reading zeros");
                    self.floating_run = true;
                }
            }
            _ => {
                self.floating_run = false;
            }
        }
        Ok(inputs)
    }
}

impl Default for Backplane {
    fn default() -> Backplane {
        Backplane::new()
    }
}
