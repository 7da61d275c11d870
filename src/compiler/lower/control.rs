//! If/else and counted-loop lowering
//!
//! `TST` is the only branch the machine has, so every condition must reduce
//! to "is this register zero". Counted loops run on a scratch copy of the
//! bound so the trip count is fixed at entry and the bound survives.

use super::expr::{clear, copy_into};
use super::Lowerer;
use crate::ast::{CompareOp, Condition, Operand, Statement};
use crate::compiler::ir::{Fragment, LabelKind, Register};
use crate::{Error, Result};

/// Branch sense of a zero test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sense {
    /// Then branch runs when the register is zero
    Zero,
    /// Then branch runs when the register is non-zero
    NonZero,
}

/// Reduce a comparison against zero to a register test
///
/// On unsigned registers `x > 0` is `x != 0` and `x <= 0` is `x == 0`.
/// `x < 0` and `x >= 0` are constant and rejected along with every
/// comparison that is not against the literal zero.
fn zero_test(condition: &Condition, line: usize) -> Result<(&str, Sense)> {
    let (name, op) = match (&condition.lhs, &condition.rhs) {
        (Operand::Variable(name), Operand::Literal(0)) => (name.as_str(), condition.op),
        (Operand::Literal(0), Operand::Variable(name)) => (name.as_str(), condition.op.mirrored()),
        _ => {
            return Err(Error::unsupported(
                format!("condition '{}' (only comparisons with 0)", condition),
                line,
            ))
        }
    };

    match op {
        CompareOp::Eq | CompareOp::Le => Ok((name, Sense::Zero)),
        CompareOp::Ne | CompareOp::Gt => Ok((name, Sense::NonZero)),
        CompareOp::Lt | CompareOp::Ge => Err(Error::unsupported(
            format!("condition '{}' is constant on unsigned registers", condition),
            line,
        )),
    }
}

impl Lowerer<'_> {
    pub(super) fn lower_if(
        &mut self,
        condition: &Condition,
        then_branch: &[Statement],
        else_branch: &[Statement],
        line: usize,
    ) -> Result<Fragment> {
        let (name, sense) = zero_test(condition, line)?;
        let reg = self.symbols.resolve(name, line)?;

        let then_label = self.state.label(LabelKind::Then);
        let else_label = self.state.label(LabelKind::Else);
        let end = self.state.label(LabelKind::EndIf);

        let mut f = Fragment::new();
        match sense {
            Sense::NonZero => f.test(reg, then_label, else_label),
            Sense::Zero => f.test(reg, else_label, then_label),
        }
        f.define(then_label);
        f.append(self.lower_block(then_branch)?);
        f.jump(end);
        f.define(else_label);
        f.append(self.lower_block(else_branch)?);
        f.define(end);
        Ok(f)
    }

    pub(super) fn lower_for(
        &mut self,
        variable: &str,
        bound: &Operand,
        body: &[Statement],
        line: usize,
    ) -> Result<Fragment> {
        let bound = match bound {
            Operand::Variable(name) => self.symbols.resolve(name, line)?,
            Operand::Literal(n) => {
                return Err(Error::unsupported(
                    format!("range({}) (loop bound must be a variable)", n),
                    line,
                ))
            }
        };
        if self.loop_bindings.iter().any(|b| b == variable) {
            return Err(Error::unsupported(
                format!("nested loop rebinding '{}'", variable),
                line,
            ));
        }
        let binding = self.symbols.get(variable).map(|s| s.register);

        let counter = self.state.scratch()?;
        let mut f = copy_into(&mut self.state, bound, counter)?;

        self.loop_bindings.push(variable.to_string());
        let lowered = self.loop_skeleton(counter, binding, body);
        self.loop_bindings.pop();
        f.append(lowered?);

        self.state.release(counter)?;
        Ok(f)
    }

    /// Everything after the counter copy; `counter` is zero on exit
    fn loop_skeleton(
        &mut self,
        counter: Register,
        binding: Option<Register>,
        body: &[Statement],
    ) -> Result<Fragment> {
        let entry = self.state.label(LabelKind::LoopEntry);
        let header = self.state.label(LabelKind::LoopHeader);
        let step = self.state.label(LabelKind::LoopStep);
        let body_label = self.state.label(LabelKind::LoopBody);
        let exit = self.state.label(LabelKind::LoopExit);

        let mut f = Fragment::new();
        f.test(counter, entry, exit);
        f.define(entry);
        if let Some(i) = binding {
            f.append(clear(&mut self.state, i));
        }
        f.jump(body_label);

        f.define(header);
        f.test(counter, step, exit);
        f.define(step);
        if let Some(i) = binding {
            f.inc(i);
        }

        f.define(body_label);
        f.append(self.lower_block(body)?);
        f.dec(counter);
        f.jump(header);
        f.define(exit);
        Ok(f)
    }
}
