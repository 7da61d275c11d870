//! # Register Allocation
//!
//! Every declared variable owns one register for the whole program. Lowering
//! additionally borrows scratch registers, which are requested and released
//! in strictly nested order, so a LIFO free list is all the bookkeeping
//! needed.
//!
//! ```text
//! R1 .. Rn        named registers (declaration order)
//! Rn+1 .. Rn+k    scratch registers (k = deepest nesting seen)
//! ```

use tracing::trace;

use super::ir::Register;
use crate::{Error, Result};

/// Register allocator over a finite pool
#[derive(Debug)]
pub struct RegisterAllocator {
    /// Total registers available on the target
    pool: usize,
    /// Number of named registers handed out
    named: usize,
    /// Highest register id minted so far
    high_water: usize,
    /// Released scratch registers, most recent last
    free: Vec<Register>,
    /// Live scratch registers in allocation order
    live: Vec<Register>,
}

impl RegisterAllocator {
    /// Create an allocator for a pool of `pool` registers
    pub fn new(pool: usize) -> Self {
        Self {
            pool,
            named: 0,
            high_water: 0,
            free: Vec::new(),
            live: Vec::new(),
        }
    }

    /// Bind the next register to a declared variable
    pub fn allocate_named(&mut self, variable: &str) -> Result<Register> {
        if self.high_water > self.named {
            return Err(Error::conflict(
                Register::new(self.high_water as u32),
                format!(
                    "named register for '{}' requested after scratch allocation began",
                    variable
                ),
            ));
        }
        if self.named + 1 > self.pool {
            return Err(Error::AllocationExhausted {
                requested: self.named + 1,
                pool: self.pool,
                line: None,
            });
        }

        self.named += 1;
        self.high_water = self.named;
        let reg = Register::new(self.named as u32);
        trace!(%reg, variable, "allocated named register");
        Ok(reg)
    }

    /// Borrow a scratch register; it holds zero when handed out
    pub fn allocate_scratch(&mut self) -> Result<Register> {
        let reg = match self.free.pop() {
            Some(reg) => reg,
            None => {
                if self.high_water + 1 > self.pool {
                    return Err(Error::AllocationExhausted {
                        requested: self.high_water + 1,
                        pool: self.pool,
                        line: None,
                    });
                }
                self.high_water += 1;
                Register::new(self.high_water as u32)
            }
        };

        self.live.push(reg);
        trace!(%reg, depth = self.live.len(), "allocated scratch register");
        Ok(reg)
    }

    /// Return the most recently borrowed scratch register
    pub fn release(&mut self, reg: Register) -> Result<()> {
        if self.is_named(reg) {
            return Err(Error::conflict(reg, "named registers are never released"));
        }

        match self.live.last() {
            Some(&top) if top == reg => {
                self.live.pop();
                self.free.push(reg);
                trace!(%reg, depth = self.live.len(), "released scratch register");
                Ok(())
            }
            Some(&top) if self.live.contains(&reg) => Err(Error::conflict(
                reg,
                format!("released out of order while {} is still live", top),
            )),
            _ => Err(Error::conflict(reg, "released while not live")),
        }
    }

    /// True if `reg` is bound to a declared variable
    pub fn is_named(&self, reg: Register) -> bool {
        reg.id() >= 1 && (reg.id() as usize) <= self.named
    }

    /// Live scratch registers, innermost last
    pub fn live_scratch(&self) -> &[Register] {
        &self.live
    }

    /// Number of named registers
    pub fn named_count(&self) -> usize {
        self.named
    }

    /// Total registers used so far (named plus scratch high-water mark)
    pub fn register_count(&self) -> usize {
        self.high_water
    }

    /// Close the allocator, returning the register file size
    ///
    /// Fails if any scratch register is still live.
    pub fn finish(self) -> Result<usize> {
        match self.live.first() {
            Some(&reg) => Err(Error::conflict(
                reg,
                "scratch register still live at end of program",
            )),
            None => Ok(self.high_water),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_registers_are_distinct() {
        let mut alloc = RegisterAllocator::new(4);
        let a = alloc.allocate_named("a").unwrap();
        let b = alloc.allocate_named("b").unwrap();
        assert_ne!(a, b);
        assert_eq!((a.id(), b.id()), (1, 2));
        assert!(alloc.is_named(a));
    }

    #[test]
    fn test_named_pool_exhausted() {
        let mut alloc = RegisterAllocator::new(1);
        alloc.allocate_named("a").unwrap();
        assert_eq!(
            alloc.allocate_named("b"),
            Err(Error::AllocationExhausted {
                requested: 2,
                pool: 1,
                line: None,
            })
        );
        assert_eq!(alloc.named_count(), 1);
    }

    #[test]
    fn test_scratch_lifo_reuse() {
        let mut alloc = RegisterAllocator::new(8);
        let a = alloc.allocate_named("a").unwrap();

        let s1 = alloc.allocate_scratch().unwrap();
        let s2 = alloc.allocate_scratch().unwrap();
        assert!(s1 != a && s2 != a && s1 != s2);

        alloc.release(s2).unwrap();
        let s3 = alloc.allocate_scratch().unwrap();
        assert_eq!(s3, s2);

        alloc.release(s3).unwrap();
        alloc.release(s1).unwrap();
        assert_eq!(alloc.named_count(), 1);
        assert_eq!(alloc.register_count(), 3);
        assert_eq!(alloc.finish(), Ok(3));
    }

    #[test]
    fn test_scratch_pool_exhausted() {
        let mut alloc = RegisterAllocator::new(2);
        alloc.allocate_named("a").unwrap();
        alloc.allocate_scratch().unwrap();
        assert!(matches!(
            alloc.allocate_scratch(),
            Err(Error::AllocationExhausted {
                requested: 3,
                pool: 2,
                line: None,
            })
        ));
    }

    #[test]
    fn test_release_discipline() {
        let mut alloc = RegisterAllocator::new(8);
        let a = alloc.allocate_named("a").unwrap();
        let s1 = alloc.allocate_scratch().unwrap();
        let s2 = alloc.allocate_scratch().unwrap();

        assert!(matches!(
            alloc.release(a),
            Err(Error::RegisterConflict { .. })
        ));
        assert!(matches!(
            alloc.release(s1),
            Err(Error::RegisterConflict { .. })
        ));
        alloc.release(s2).unwrap();
        assert!(matches!(
            alloc.release(s2),
            Err(Error::RegisterConflict { .. })
        ));
    }

    #[test]
    fn test_finish_with_live_scratch() {
        let mut alloc = RegisterAllocator::new(8);
        let s = alloc.allocate_scratch().unwrap();
        assert_eq!(
            alloc.finish(),
            Err(Error::conflict(s, "scratch register still live at end of program"))
        );
    }

    #[test]
    fn test_named_after_scratch_conflicts() {
        let mut alloc = RegisterAllocator::new(8);
        let s = alloc.allocate_scratch().unwrap();
        alloc.release(s).unwrap();
        assert!(matches!(
            alloc.allocate_named("late"),
            Err(Error::RegisterConflict { .. })
        ));
    }
}
