//! A minimal byte console occupying the bottom of the peripheral
//! window.
//!
//! Three ports, addressed at fixed offsets from the window base:
//!
//! |offset|name  |direction|meaning                                   |
//! |------|------|---------|------------------------------------------|
//! |  0   |OUT   |write    |low eight bits leave as one output byte   |
//! |  1   |STATUS|read     |nonzero while input is waiting            |
//! |  2   |IN    |read     |next input byte, consumed by the read     |
//!
//! A read streams a whole machine word; bytes are carried in the low
//! eight bits with the rest zero.  The interrupt line follows the
//! input queue: it stays raised while a byte is waiting, which on the
//! extended variant keeps the raw-interrupt flag latched until the
//! program drains the queue.  The base variant simply never looks.
//!
//! The word a read streams is latched on the run's first bit, so a
//! byte arriving from the host mid-run cannot tear the transfer.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{event, Level};

use base::prelude::*;

use crate::bus::{BusDevice, BusOutputs, BusTap, DataCycle, DeviceReply, Strobe};
use crate::io::{is_peripheral_address, peripheral_base};

/// Port offsets within the peripheral window.
pub const PORT_OUT: u32 = 0;
pub const PORT_IN_STATUS: u32 = 1;
pub const PORT_IN_DATA: u32 = 2;

#[derive(Debug, Default)]
struct Shared {
    output: Vec<u8>,
    input: VecDeque<u8>,
}

pub struct Console {
    tap: BusTap,
    shared: Rc<RefCell<Shared>>,
    // Output run assembly and the latched word for input runs.
    inbound: u32,
    streaming: u32,
}

/// Host-side end of the console: feed the input queue, collect the
/// output bytes.
#[derive(Clone)]
pub struct ConsoleHandle {
    shared: Rc<RefCell<Shared>>,
}

impl Console {
    pub fn new(width: WordWidth) -> (Console, ConsoleHandle) {
        let shared: Rc<RefCell<Shared>> = Rc::new(RefCell::new(Shared::default()));
        let console = Console {
            tap: BusTap::new(width),
            shared: shared.clone(),
            inbound: 0,
            streaming: 0,
        };
        let handle = ConsoleHandle { shared };
        (console, handle)
    }

    fn port(&self) -> Option<u32> {
        let width = self.tap.width();
        let addr = self.tap.address();
        if !is_peripheral_address(width, addr) {
            return None;
        }
        let offset = addr - peripheral_base(width);
        (offset <= PORT_IN_DATA).then_some(offset)
    }

    fn input_cycle(&mut self, port: u32, cycle: &DataCycle) -> Option<bool> {
        if port == PORT_OUT {
            return None;
        }
        if cycle.index == 0 {
            let shared = self.shared.borrow();
            self.streaming = match port {
                PORT_IN_STATUS => u32::from(!shared.input.is_empty()),
                _ => shared.input.front().copied().map_or(0, u32::from),
            };
        }
        if cycle.is_last && port == PORT_IN_DATA {
            // The byte is consumed by the read that carried it out.
            self.shared.borrow_mut().input.pop_front();
        }
        Some(self.streaming >> cycle.index & 1 != 0)
    }

    fn output_cycle(&mut self, port: u32, cycle: &DataCycle, bit: bool) {
        if port != PORT_OUT {
            return;
        }
        if cycle.index == 0 {
            self.inbound = 0;
        }
        self.inbound |= (bit as u32) << cycle.index;
        if cycle.is_last {
            let byte = (self.inbound & 0xff) as u8;
            event!(Level::DEBUG, "console output byte {:#04x}", byte);
            self.shared.borrow_mut().output.push(byte);
        }
    }
}

impl BusDevice for Console {
    fn name(&self) -> &'static str {
        "console"
    }

    fn tick(&mut self, outputs: &BusOutputs) -> DeviceReply {
        let mut reply = DeviceReply {
            data: None,
            irq: !self.shared.borrow().input.is_empty(),
        };
        if let Some(cycle) = self.tap.observe(outputs) {
            if let Some(port) = self.port() {
                match cycle.strobe {
                    Strobe::Input => reply.data = self.input_cycle(port, &cycle),
                    Strobe::Output => self.output_cycle(port, &cycle, outputs.o),
                    Strobe::Address => unreachable!("address cycles are not data cycles"),
                }
            }
        }
        reply
    }
}

impl ConsoleHandle {
    /// Append bytes to the input queue.  The interrupt line rises
    /// with the first waiting byte.
    pub fn queue_input(&self, bytes: &[u8]) {
        self.shared.borrow_mut().input.extend(bytes.iter().copied());
    }

    pub fn pending_input(&self) -> usize {
        self.shared.borrow().input.len()
    }

    /// Take everything the program has written so far.
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut self.shared.borrow_mut().output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_address(console: &mut Console, addr: u32) {
        for k in 0..16 {
            let outputs = BusOutputs {
                a: addr >> k & 1 != 0,
                strobe: Some(Strobe::Address),
                ..BusOutputs::idle()
            };
            console.tick(&outputs);
        }
        console.tick(&BusOutputs::idle());
    }

    fn stream_write(console: &mut Console, value: u32) {
        for k in 0..16 {
            let outputs = BusOutputs {
                o: value >> k & 1 != 0,
                strobe: Some(Strobe::Output),
                ..BusOutputs::idle()
            };
            console.tick(&outputs);
        }
        console.tick(&BusOutputs::idle());
    }

    fn stream_read(console: &mut Console) -> Option<u32> {
        let mut value = 0_u32;
        let mut drove = false;
        for k in 0..16 {
            let outputs = BusOutputs {
                strobe: Some(Strobe::Input),
                ..BusOutputs::idle()
            };
            if let Some(bit) = console.tick(&outputs).data {
                drove = true;
                value |= (bit as u32) << k;
            }
        }
        console.tick(&BusOutputs::idle());
        drove.then_some(value)
    }

    const BASE: u32 = 0x0800;

    #[test]
    fn test_output_bytes_reach_the_host() {
        let (mut console, handle) = Console::new(WordWidth::W16);
        stream_address(&mut console, BASE + PORT_OUT);
        stream_write(&mut console, u32::from(b'H'));
        stream_write(&mut console, u32::from(b'i'));
        assert_eq!(handle.take_output(), b"Hi");
        assert_eq!(handle.take_output(), b"", "taking drains the buffer");
    }

    #[test]
    fn test_status_follows_the_queue() {
        let (mut console, handle) = Console::new(WordWidth::W16);
        stream_address(&mut console, BASE + PORT_IN_STATUS);
        assert_eq!(stream_read(&mut console), Some(0));
        handle.queue_input(b"x");
        assert_eq!(stream_read(&mut console), Some(1));
    }

    #[test]
    fn test_reading_consumes_exactly_one_byte() {
        let (mut console, handle) = Console::new(WordWidth::W16);
        handle.queue_input(b"ab");
        stream_address(&mut console, BASE + PORT_IN_DATA);
        assert_eq!(stream_read(&mut console), Some(u32::from(b'a')));
        assert_eq!(stream_read(&mut console), Some(u32::from(b'b')));
        assert_eq!(stream_read(&mut console), Some(0), "empty queue reads zero");
        assert_eq!(handle.pending_input(), 0);
    }

    #[test]
    fn test_irq_level_follows_pending_input() {
        let (mut console, handle) = Console::new(WordWidth::W16);
        let idle = BusOutputs::idle();
        assert!(!console.tick(&idle).irq);
        handle.queue_input(b"!");
        assert!(console.tick(&idle).irq);
        stream_address(&mut console, BASE + PORT_IN_DATA);
        stream_read(&mut console);
        assert!(!console.tick(&idle).irq, "a drained queue drops the line");
    }

    #[test]
    fn test_status_port_does_not_consume() {
        let (mut console, handle) = Console::new(WordWidth::W16);
        handle.queue_input(b"q");
        stream_address(&mut console, BASE + PORT_IN_STATUS);
        stream_read(&mut console);
        stream_read(&mut console);
        assert_eq!(handle.pending_input(), 1);
    }
}
