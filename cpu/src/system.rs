//! The assembled machine: one processor, one backplane, the standard
//! peripherals, and the clock loop that ties them together.
//!
//! Each simulated cycle runs in the same fixed order: the processor's
//! output lines are computed, every device ticks against them, and
//! the merged device replies are the inputs the processor commits
//! with.  Devices therefore see the address and data streams of the
//! very cycle they answer, which is what lets a transfer resolve
//! synchronously with no handshake lines.

use tracing::{event, span, Level};

use base::image::ImageError;
use base::prelude::*;

use crate::config::MachineConfig;
use crate::control::{Cpu, CycleStatus};
use crate::fault::Fault;
use crate::io::console::{Console, ConsoleHandle};
use crate::io::ram::{Ram, RamHandle};
use crate::io::Backplane;

pub struct System {
    cpu: Cpu,
    backplane: Backplane,
    ram: RamHandle,
    console: ConsoleHandle,
}

impl System {
    /// Build the standard machine and load `image` at address zero.
    /// Every image word must have the configured width.
    pub fn new(config: MachineConfig, image: &[Word]) -> Result<System, ImageError> {
        let width = config.width();
        for (index, word) in image.iter().enumerate() {
            if word.width() != width {
                return Err(ImageError::WrongWidth {
                    index,
                    got: word.width().get(),
                    want: width.get(),
                });
            }
        }
        let (ram, ram_handle) = Ram::new(width);
        let (console, console_handle) = Console::new(width);
        ram_handle.load(image);
        let mut backplane = Backplane::new();
        backplane.attach(Box::new(ram));
        backplane.attach(Box::new(console));
        event!(
            Level::DEBUG,
            "built a {} {}-bit machine with a {}-word image",
            config.variant(),
            width.get(),
            image.len()
        );
        Ok(System {
            cpu: Cpu::new(config),
            backplane,
            ram: ram_handle,
            console: console_handle,
        })
    }

    /// Advance the whole machine by one clock cycle.
    pub fn step(&mut self) -> CycleStatus {
        let outputs = self.cpu.bus_outputs();
        match self.backplane.tick(&outputs) {
            Ok(inputs) => self.cpu.step(&inputs),
            Err(details) => {
                self.cpu.latch_fault(details);
                CycleStatus::Faulted
            }
        }
    }

    /// Step until the machine halts, faults, or `max_cycles` cycles
    /// have run.  Returns `Running` only when the budget ran out.
    pub fn run(&mut self, max_cycles: u64) -> CycleStatus {
        let span = span!(Level::DEBUG, "run", max_cycles);
        let _enter = span.enter();
        for _ in 0..max_cycles {
            match self.step() {
                CycleStatus::Running => (),
                stopped => return stopped,
            }
        }
        CycleStatus::Running
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn ram(&self) -> &RamHandle {
        &self.ram
    }

    pub fn console(&self) -> &ConsoleHandle {
        &self.console
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.cpu.fault()
    }

    /// True while the processor asserts the stop line.
    pub fn stop_asserted(&self) -> bool {
        self.cpu.bus_outputs().stop
    }

    /// Pull the operator's reset line.
    pub fn reset(&mut self) {
        self.cpu.reset();
    }
}
