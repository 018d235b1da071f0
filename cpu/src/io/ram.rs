//! Word-addressed RAM on the serial bus.
//!
//! The array answers every address below its size that is not in the
//! peripheral window.  Like the real part it models, it has no
//! notion of instructions or data: it assembles Output runs into a
//! word committed on the last bit, and streams words back during
//! Input runs, least significant bit first.
//!
//! The cell array is shared with a [`RamHandle`] so a program image
//! can be loaded before the machine starts and the contents examined
//! after it stops.  The model is single-threaded; the shared handle
//! is plain `Rc<RefCell<..>>`.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{event, Level};

use base::prelude::*;

use crate::bus::{BusDevice, BusOutputs, BusTap, DataCycle, DeviceReply, Strobe};
use crate::io::is_peripheral_address;

type Cells = Rc<RefCell<Vec<Word>>>;

pub struct Ram {
    tap: BusTap,
    cells: Cells,
    // Output run assembly; committed when the last bit lands.
    inbound: u32,
}

/// Host-side access to the cell array.
#[derive(Clone)]
pub struct RamHandle {
    width: WordWidth,
    cells: Cells,
}

impl Ram {
    /// RAM spanning the whole directly addressable space (less the
    /// peripheral window, which it never answers).
    pub fn new(width: WordWidth) -> (Ram, RamHandle) {
        Ram::with_size(width, 1 << operand_bits(width))
    }

    /// RAM of `words` cells starting at address zero.
    pub fn with_size(width: WordWidth, words: usize) -> (Ram, RamHandle) {
        let cells: Cells = Rc::new(RefCell::new(vec![Word::zero(width); words]));
        let ram = Ram {
            tap: BusTap::new(width),
            cells: cells.clone(),
            inbound: 0,
        };
        let handle = RamHandle { width, cells };
        (ram, handle)
    }

    fn claims(&self, addr: u32) -> bool {
        !is_peripheral_address(self.tap.width(), addr)
            && (addr as usize) < self.cells.borrow().len()
    }

    fn input_cycle(&mut self, cycle: &DataCycle) -> Option<bool> {
        let addr = self.tap.address();
        if !self.claims(addr) {
            return None;
        }
        let word = self.cells.borrow()[addr as usize];
        Some(word.value() >> cycle.index & 1 != 0)
    }

    fn output_cycle(&mut self, cycle: &DataCycle, bit: bool) {
        let addr = self.tap.address();
        if !self.claims(addr) {
            return;
        }
        if cycle.index == 0 {
            self.inbound = 0;
        }
        self.inbound |= (bit as u32) << cycle.index;
        if cycle.is_last {
            let word = Word::from_bits(self.tap.width(), self.inbound);
            event!(Level::TRACE, "ram[{:#x}] <- {}", addr, word);
            self.cells.borrow_mut()[addr as usize] = word;
        }
    }
}

impl BusDevice for Ram {
    fn name(&self) -> &'static str {
        "ram"
    }

    fn tick(&mut self, outputs: &BusOutputs) -> DeviceReply {
        let mut reply = DeviceReply::default();
        if let Some(cycle) = self.tap.observe(outputs) {
            match cycle.strobe {
                Strobe::Input => reply.data = self.input_cycle(&cycle),
                Strobe::Output => self.output_cycle(&cycle, outputs.o),
                Strobe::Address => unreachable!("address cycles are not data cycles"),
            }
        }
        reply
    }
}

impl RamHandle {
    pub fn len(&self) -> usize {
        self.cells.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.borrow().is_empty()
    }

    /// The word at `addr`, or `None` outside the array.
    pub fn peek(&self, addr: u32) -> Option<Word> {
        self.cells.borrow().get(addr as usize).copied()
    }

    /// Write one word, silently dropping addresses outside the array.
    pub fn poke(&self, addr: u32, word: Word) {
        let value = Word::from_bits(self.width, word.value());
        if let Some(cell) = self.cells.borrow_mut().get_mut(addr as usize) {
            *cell = value;
        }
    }

    /// Copy a program image into the array starting at address zero.
    /// Words beyond the end of the array are dropped with a warning.
    pub fn load(&self, image: &[Word]) {
        let mut cells = self.cells.borrow_mut();
        if image.len() > cells.len() {
            event!(
                Level::WARN,
                "image of {} words truncated to the {}-word array",
                image.len(),
                cells.len()
            );
        }
        for (cell, word) in cells.iter_mut().zip(image.iter()) {
            *cell = Word::from_bits(self.width, word.value());
        }
    }
}
