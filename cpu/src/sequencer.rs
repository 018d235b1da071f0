//! The per-state cycle sequencer.
//!
//! Every control state lasts exactly N+1 clock cycles on an N-bit
//! machine.  Cycle 0 is the setup cycle (`first`), cycles 1..=N move
//! one bit each, and the final four moving cycles (`last4`) are the
//! window in which a fetch routes incoming bits to the opcode nibble
//! instead of the operand latch.  Cycle N (`last`) is the commit
//! cycle: the next state is chosen and the counter reseeds.
//!
//! The hardware derives `first`/`last4`/`last` as separate strobes
//! off the counter, so the model keeps them as distinct latches and
//! cross-checks them against the counter every cycle.  A disagreement
//! means the simulation itself has gone wrong and surfaces as a
//! structural fault rather than silently corrupting a transfer.

use base::prelude::WordWidth;

use crate::fault::FaultDetails;

#[derive(Clone, Copy, Debug)]
pub struct Sequencer {
    n: u8,
    counter: u8,
    first: bool,
    last4: bool,
    last: bool,
}

fn derive(n: u8, counter: u8) -> (bool, bool, bool) {
    let first = counter == 0;
    let last4 = counter >= n - 3 && counter <= n;
    let last = counter == n;
    (first, last4, last)
}

impl Sequencer {
    pub fn new(width: WordWidth) -> Sequencer {
        let n = width.get();
        let (first, last4, last) = derive(n, 0);
        Sequencer {
            n,
            counter: 0,
            first,
            last4,
            last,
        }
    }

    pub fn counter(&self) -> u8 {
        self.counter
    }

    /// Zero-based index of the bit moved on this cycle, or `None` on
    /// the setup cycle.
    pub fn bit_index(&self) -> Option<u8> {
        self.counter.checked_sub(1)
    }

    pub fn is_first(&self) -> bool {
        self.first
    }

    pub fn is_last4(&self) -> bool {
        self.last4
    }

    pub fn is_last(&self) -> bool {
        self.last
    }

    /// Move to the next cycle, wrapping to 0 after the commit cycle.
    pub fn advance(&mut self) {
        self.counter = if self.counter == self.n {
            0
        } else {
            self.counter + 1
        };
        let (first, last4, last) = derive(self.n, self.counter);
        self.first = first;
        self.last4 = last4;
        self.last = last;
    }

    /// Reseed to cycle 0, as RESET entry does.
    pub fn reseed(&mut self) {
        self.counter = 0;
        let (first, last4, last) = derive(self.n, 0);
        self.first = first;
        self.last4 = last4;
        self.last = last;
    }

    /// Cross-check the latched strobes against the counter.
    pub fn check(&self) -> Result<(), FaultDetails> {
        let (first, last4, last) = derive(self.n, self.counter);
        if self.counter > self.n
            || first != self.first
            || last4 != self.last4
            || last != self.last
        {
            Err(FaultDetails::CycleCounterSkew {
                counter: self.counter,
                first: self.first,
                last4: self.last4,
                last: self.last,
            })
        } else {
            Ok(())
        }
    }

    #[cfg(test)]
    pub(crate) fn corrupt_first_latch(&mut self) {
        self.first = !self.first;
    }
}
