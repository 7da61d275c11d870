//! Two-pass linker: label addresses first, then hole fixup
//!
//! ```text
//! pass 1   concatenate fragments, record label -> absolute address
//!          append the single HLT (labels at the end resolve to it)
//! pass 2   rewrite every JMP target and both TST targets
//! ```

use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::ir::{AddressBase, Fragment, Hole, Instruction, Label, Program, Register};
use crate::{Error, Result};

/// Resolves fragment holes into absolute addresses
#[derive(Debug, Clone, Copy, Default)]
pub struct Linker {
    base: AddressBase,
}

impl Linker {
    /// Linker emitting addresses in `base`
    pub fn new(base: AddressBase) -> Self {
        Self { base }
    }

    /// Link fragments in order into a finished program
    ///
    /// No partial output is produced: any unresolved hole aborts the link.
    pub fn link(
        &self,
        fragments: impl IntoIterator<Item = Fragment>,
        registers: Vec<u64>,
        symbols: BTreeMap<String, Register>,
    ) -> Result<Program> {
        let fragment: Fragment = fragments.into_iter().collect();
        let (mut instructions, holes, labels) = fragment.into_parts();
        instructions.push(Instruction::Hlt);

        let first = self.base.first();
        let mut addresses: HashMap<Label, usize> = HashMap::with_capacity(labels.len());
        for (label, offset) in labels {
            if addresses.insert(label, first + offset).is_some() {
                return Err(Error::UnresolvedLabel {
                    label: label.to_string(),
                    reason: "label defined more than once".into(),
                });
            }
        }

        let resolve = |label: Label| -> Result<usize> {
            addresses
                .get(&label)
                .copied()
                .ok_or_else(|| Error::UnresolvedLabel {
                    label: label.to_string(),
                    reason: "no definition in the program".into(),
                })
        };

        for hole in &holes {
            let at = hole.at();
            let patched = match (hole, instructions.get(at)) {
                (Hole::Jump { target, .. }, Some(Instruction::Jmp(_))) => {
                    Instruction::Jmp(resolve(*target)?)
                }
                (
                    Hole::Test {
                        if_nonzero,
                        if_zero,
                        ..
                    },
                    Some(Instruction::Tst { register, .. }),
                ) => Instruction::Tst {
                    register: *register,
                    if_nonzero: resolve(*if_nonzero)?,
                    if_zero: resolve(*if_zero)?,
                },
                (_, other) => {
                    return Err(Error::UnresolvedLabel {
                        label: format!("hole@{}", at),
                        reason: format!("hole does not match instruction {:?}", other),
                    })
                }
            };
            instructions[at] = patched;
        }

        debug!(
            instructions = instructions.len(),
            holes = holes.len(),
            registers = registers.len(),
            "link complete"
        );
        Ok(Program::new(instructions, registers, symbols, self.base))
    }
}
