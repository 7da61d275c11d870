//! Arithmetic lowering with destructive-transfer loops
//!
//! The machine cannot read a register without emptying it, so every
//! non-destructive use of a value drains it into two places at once and then
//! refills it from the scratch copy:
//!
//! ```text
//! loop:  TST src -> step, back      ; while src != 0
//! step:  DEC src
//!        INC dst                    ; the actual transfer
//!        INC tmp                    ; remember what was taken
//!        JMP loop
//! back:  TST tmp -> undo, done      ; while tmp != 0
//! undo:  DEC tmp
//!        INC src
//!        JMP back
//! done:
//! ```
//!
//! Scratch registers are zero whenever they are idle; every primitive below
//! hands its scratch registers back zeroed.

use super::{CodegenState, Lowerer};
use crate::ast::{BinaryOp, Expression, Operand};
use crate::compiler::ir::{Fragment, LabelKind, Register};
use crate::{Error, Result};

/// `r = 0`
pub fn clear(state: &mut CodegenState, reg: Register) -> Fragment {
    let top = state.label(LabelKind::ClearLoop);
    let step = state.label(LabelKind::TransferStep);
    let done = state.label(LabelKind::TransferDone);

    let mut f = Fragment::new();
    f.define(top);
    f.test(reg, step, done);
    f.define(step);
    f.dec(reg);
    f.jump(top);
    f.define(done);
    f
}

/// Drain `src` into every register of `dsts`, one unit at a time
///
/// Leaves `src` at zero. Callers guarantee `src` is not among `dsts`.
fn drain_into(state: &mut CodegenState, src: Register, dsts: &[Register]) -> Fragment {
    let top = state.label(LabelKind::TransferLoop);
    let step = state.label(LabelKind::TransferStep);
    let done = state.label(LabelKind::TransferDone);

    let mut f = Fragment::new();
    f.define(top);
    f.test(src, step, done);
    f.define(step);
    f.dec(src);
    for dst in dsts {
        f.inc(*dst);
    }
    f.jump(top);
    f.define(done);
    f
}

/// `dst += src; src = 0`
pub fn move_into(state: &mut CodegenState, src: Register, dst: Register) -> Result<Fragment> {
    if src == dst {
        return Err(Error::conflict(src, "move source and destination alias"));
    }
    Ok(drain_into(state, src, &[dst]))
}

/// `dst += src`, leaving `src` unchanged
///
/// Uses one scratch register for the duration of the fragment.
pub fn copy_into(state: &mut CodegenState, src: Register, dst: Register) -> Result<Fragment> {
    if src == dst {
        return Err(Error::conflict(src, "copy source and destination alias"));
    }

    let tmp = state.scratch()?;
    let mut f = drain_into(state, src, &[dst, tmp]);
    f.append(drain_into(state, tmp, &[src]));
    state.release(tmp)?;
    Ok(f)
}

/// `dst = max(dst - src, 0)`, leaving `src` unchanged
///
/// The subtrahend is first copied into a scratch counter. Each round tests
/// the counter first, then decrements both it and `dst`. Once `dst` hits
/// zero the rest of the counter is drained so it is released clean.
pub fn saturating_sub(state: &mut CodegenState, dst: Register, src: Register) -> Result<Fragment> {
    let count = state.scratch()?;
    let mut f = copy_into(state, src, count)?;

    let top = state.label(LabelKind::TransferLoop);
    let check = state.label(LabelKind::SubtractStep);
    let step = state.label(LabelKind::TransferStep);
    let drain = state.label(LabelKind::SubtractDrain);
    let done = state.label(LabelKind::TransferDone);

    f.define(top);
    f.test(count, check, done);
    f.define(check);
    f.test(dst, step, drain);
    f.define(step);
    f.dec(dst);
    f.dec(count);
    f.jump(top);
    f.define(drain);
    f.dec(count);
    f.jump(top);
    f.define(done);

    state.release(count)?;
    Ok(f)
}

/// `dst += n`
pub fn add_literal(dst: Register, n: u64) -> Fragment {
    let mut f = Fragment::new();
    for _ in 0..n {
        f.inc(dst);
    }
    f
}

/// `dst = max(dst - n, 0)`, one guarded decrement per unit
pub fn sub_literal(state: &mut CodegenState, dst: Register, n: u64) -> Fragment {
    let mut f = Fragment::new();
    for _ in 0..n {
        let step = state.label(LabelKind::SubtractStep);
        let skip = state.label(LabelKind::SubtractSkip);
        f.test(dst, step, skip);
        f.define(step);
        f.dec(dst);
        f.define(skip);
    }
    f
}

/// Operand after name resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Value {
    Reg(Register),
    Lit(u64),
}

impl Lowerer<'_> {
    fn value(&self, operand: &Operand, line: usize) -> Result<Value> {
        match operand {
            Operand::Variable(name) => Ok(Value::Reg(self.symbols.resolve(name, line)?)),
            Operand::Literal(n) => self.fits(*n, line).map(|()| Value::Lit(*n)),
        }
    }

    /// A literal expands to at least one instruction per unit, so it must fit
    /// in what is left of the instruction limit
    fn fits(&self, n: u64, line: usize) -> Result<()> {
        match usize::try_from(n) {
            Ok(n) if n <= self.remaining() => Ok(()),
            _ => Err(self.too_large(line)),
        }
    }

    /// `dst += value`
    fn accumulate(&mut self, dst: Register, value: Value) -> Result<Fragment> {
        match value {
            Value::Reg(src) => copy_into(&mut self.state, src, dst),
            Value::Lit(n) => Ok(add_literal(dst, n)),
        }
    }

    /// `dst = max(dst - value, 0)`
    fn subtract(&mut self, dst: Register, value: Value) -> Result<Fragment> {
        match value {
            Value::Reg(src) => saturating_sub(&mut self.state, dst, src),
            Value::Lit(n) => Ok(sub_literal(&mut self.state, dst, n)),
        }
    }

    /// `target = lhs op rhs` evaluated into a scratch accumulator, then
    /// committed; used when the target is read by the expression
    fn via_accumulator(
        &mut self,
        target: Register,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
    ) -> Result<Fragment> {
        let acc = self.state.scratch()?;
        let mut f = self.accumulate(acc, lhs)?;
        f.append(match op {
            BinaryOp::Add => self.accumulate(acc, rhs)?,
            BinaryOp::Sub => self.subtract(acc, rhs)?,
        });
        f.append(clear(&mut self.state, target));
        f.append(move_into(&mut self.state, acc, target)?);
        self.state.release(acc)?;
        Ok(f)
    }

    pub(super) fn lower_assign(
        &mut self,
        target: &str,
        value: &Expression,
        line: usize,
    ) -> Result<Fragment> {
        if self.loop_bindings.iter().any(|b| b == target) {
            return Err(Error::unsupported(
                format!("assignment to loop variable '{}' inside its loop", target),
                line,
            ));
        }
        let t = self.symbols.resolve(target, line)?;

        let (op, lhs, rhs) = match value {
            Expression::Operand(operand) => {
                return match self.value(operand, line)? {
                    Value::Reg(src) if src == t => Ok(Fragment::new()),
                    Value::Reg(src) => {
                        let mut f = clear(&mut self.state, t);
                        f.append(copy_into(&mut self.state, src, t)?);
                        Ok(f)
                    }
                    Value::Lit(n) => {
                        let mut f = clear(&mut self.state, t);
                        f.append(add_literal(t, n));
                        Ok(f)
                    }
                };
            }
            Expression::Binary { op, lhs, rhs } => {
                (*op, self.value(lhs, line)?, self.value(rhs, line)?)
            }
        };

        let me = Value::Reg(t);
        match (op, lhs, rhs) {
            (op, Value::Lit(a), Value::Lit(b)) => {
                let n = match op {
                    BinaryOp::Add => a.checked_add(b).ok_or_else(|| self.too_large(line))?,
                    BinaryOp::Sub => a.saturating_sub(b),
                };
                self.fits(n, line)?;
                let mut f = clear(&mut self.state, t);
                f.append(add_literal(t, n));
                Ok(f)
            }

            // in place: t = t + x, t = x + t
            (BinaryOp::Add, l, r) if l == me && r != me => self.accumulate(t, r),
            (BinaryOp::Add, l, r) if r == me && l != me => self.accumulate(t, l),
            // in place: t = t - x (covers t = t - t)
            (BinaryOp::Sub, l, r) if l == me => self.subtract(t, r),

            (op, l, r) if l == me || r == me => self.via_accumulator(t, op, l, r),

            (op, l, r) => {
                let mut f = clear(&mut self.state, t);
                f.append(self.accumulate(t, l)?);
                f.append(match op {
                    BinaryOp::Add => self.accumulate(t, r)?,
                    BinaryOp::Sub => self.subtract(t, r)?,
                });
                Ok(f)
            }
        }
    }
}
