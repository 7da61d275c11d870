//! # Jump Optimizer for Bonsai Compilation
//!
//! Peephole passes over the lowered fragment, before linking:
//! - Jump threading: a target that lands on `JMP L2` is retargeted to `L2`
//! - Jump-to-next removal: a `JMP` to the instruction right after it is dropped
//!
//! Passes repeat until nothing changes. The program keeps its single trailing
//! `HLT`; jumps to the end are never rewritten into halts.

use super::ir::{Fragment, Hole, Instruction, Label};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Upper bound on optimizer rounds
const MAX_PASSES: usize = 32;

/// Optimizer with configurable optimization level
#[derive(Debug, Clone, Copy)]
pub struct Optimizer {
    level: u8,
}

impl Optimizer {
    /// Create a new optimizer with the specified optimization level (0-1)
    pub fn new(level: u8) -> Self {
        Self { level }
    }

    /// Run all passes enabled at this level
    pub fn optimize(&self, fragment: Fragment) -> Fragment {
        if self.level == 0 {
            return fragment;
        }

        let before = fragment.len();
        let mut current = fragment;
        for pass in 0..MAX_PASSES {
            let (threaded, retargeted) = thread_jumps(current);
            let (next, removed) = remove_jumps_to_next(threaded);
            current = next;

            if retargeted == 0 && removed == 0 {
                debug!(
                    passes = pass + 1,
                    removed = before - current.len(),
                    instructions = current.len(),
                    "optimizer reached fixed point"
                );
                return current;
            }
        }

        warn!(
            max_passes = MAX_PASSES,
            instructions = current.len(),
            "optimizer stopped before reaching a fixed point"
        );
        current
    }
}

/// Retarget holes whose label lands on an unconditional jump
fn thread_jumps(fragment: Fragment) -> (Fragment, usize) {
    let (instructions, mut holes, labels) = fragment.into_parts();

    let offsets: HashMap<Label, usize> = labels.iter().copied().collect();
    let jumps: HashMap<usize, Label> = holes
        .iter()
        .filter_map(|h| match h {
            Hole::Jump { at, target } => Some((*at, *target)),
            Hole::Test { .. } => None,
        })
        .collect();

    // follow JMP chains, stopping on a cycle
    let final_target = |label: Label| -> Label {
        let mut seen = HashSet::new();
        let mut current = label;
        while let Some(next) = offsets.get(&current).and_then(|o| jumps.get(o)) {
            if !seen.insert(current) {
                break;
            }
            current = *next;
        }
        current
    };

    let mut retargeted = 0;
    let mut update = |label: &mut Label| {
        let threaded = final_target(*label);
        if threaded != *label {
            *label = threaded;
            retargeted += 1;
        }
    };
    for hole in holes.iter_mut() {
        match hole {
            Hole::Jump { target, .. } => update(target),
            Hole::Test {
                if_nonzero,
                if_zero,
                ..
            } => {
                update(if_nonzero);
                update(if_zero);
            }
        }
    }

    (Fragment::from_parts(instructions, holes, labels), retargeted)
}

/// Drop every `JMP` whose target is the following instruction
fn remove_jumps_to_next(fragment: Fragment) -> (Fragment, usize) {
    let (instructions, holes, labels) = fragment.into_parts();

    let offsets: HashMap<Label, usize> = labels.iter().copied().collect();
    let doomed: HashSet<usize> = holes
        .iter()
        .filter_map(|h| match h {
            Hole::Jump { at, target } if offsets.get(target) == Some(&(at + 1)) => Some(*at),
            _ => None,
        })
        .collect();

    if doomed.is_empty() {
        return (Fragment::from_parts(instructions, holes, labels), 0);
    }

    // new index of every old offset, including one past the end
    let mut remap = Vec::with_capacity(instructions.len() + 1);
    let mut dropped = 0;
    for idx in 0..=instructions.len() {
        remap.push(idx - dropped);
        if doomed.contains(&idx) {
            dropped += 1;
        }
    }

    let kept: Vec<Instruction> = instructions
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| !doomed.contains(idx))
        .map(|(_, instr)| instr)
        .collect();

    let holes = holes
        .into_iter()
        .filter(|h| !doomed.contains(&h.at()))
        .map(|h| match h {
            Hole::Jump { at, target } => Hole::Jump {
                at: remap[at],
                target,
            },
            Hole::Test {
                at,
                if_nonzero,
                if_zero,
            } => Hole::Test {
                at: remap[at],
                if_nonzero,
                if_zero,
            },
        })
        .collect();

    let labels = labels
        .into_iter()
        .map(|(label, offset)| (label, remap[offset]))
        .collect();

    (Fragment::from_parts(kept, holes, labels), dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{LabelGen, LabelKind, Register};

    #[test]
    fn test_level_zero_is_identity() {
        let mut labels = LabelGen::new();
        let next = labels.fresh(LabelKind::EndIf);
        let mut f = Fragment::new();
        f.jump(next);
        f.define(next);

        assert_eq!(Optimizer::new(0).optimize(f.clone()), f);
        assert!(Optimizer::new(1).optimize(f).is_empty());
    }

    #[test]
    fn test_thread_jump_chain() {
        let mut labels = LabelGen::new();
        let r = Register::new(1);
        let a = labels.fresh(LabelKind::Then);
        let b = labels.fresh(LabelKind::Else);
        let c = labels.fresh(LabelKind::EndIf);

        // TST r -> a, c ; a: JMP b ; INC r ; b: JMP c ; INC r ; c:
        let mut f = Fragment::new();
        f.test(r, a, c);
        f.define(a);
        f.jump(b);
        f.inc(r);
        f.define(b);
        f.jump(c);
        f.inc(r);
        f.define(c);

        let out = Optimizer::new(1).optimize(f);
        match out.holes()[0] {
            Hole::Test { if_nonzero, .. } => assert_eq!(if_nonzero, c),
            other => panic!("unexpected hole {:?}", other),
        }
        assert_eq!(out.offset_of(c), Some(out.len()));
    }

    #[test]
    fn test_remove_jump_to_next_renumbers() {
        let mut labels = LabelGen::new();
        let r = Register::new(1);
        let skip = labels.fresh(LabelKind::EndIf);
        let top = labels.fresh(LabelKind::LoopHeader);

        let mut f = Fragment::new();
        f.jump(skip);
        f.define(skip);
        f.define(top);
        f.inc(r);
        f.jump(top);

        let out = Optimizer::new(1).optimize(f);
        assert_eq!(out.len(), 2);
        assert_eq!(out.offset_of(top), Some(0));
        assert_eq!(out.holes(), &[Hole::Jump { at: 1, target: top }]);
    }

    #[test]
    fn test_jump_cycle_terminates() {
        let mut labels = LabelGen::new();
        let a = labels.fresh(LabelKind::LoopHeader);
        let b = labels.fresh(LabelKind::LoopBody);

        let mut f = Fragment::new();
        f.define(a);
        f.jump(b);
        f.inc(Register::new(1));
        f.define(b);
        f.jump(a);

        let out = Optimizer::new(1).optimize(f);
        assert_eq!(out.len(), 3);
    }
}
