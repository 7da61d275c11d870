//! Instruction fragments with unresolved jump holes

use std::fmt;

use super::instruction::{Instruction, Register};

/// What a label marks, kept for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    /// Start of a register-clearing loop
    ClearLoop,
    /// Start of a unit-transfer loop
    TransferLoop,
    /// Body of a unit-transfer loop
    TransferStep,
    /// Exit of a unit-transfer loop
    TransferDone,
    /// Saturating decrement of the minuend
    SubtractStep,
    /// Draining the subtrahend copy after saturation
    SubtractDrain,
    /// Skip target of a guarded literal decrement
    SubtractSkip,
    /// Then branch of an if
    Then,
    /// Else branch of an if
    Else,
    /// Join point after an if
    EndIf,
    /// First iteration entry of a loop
    LoopEntry,
    /// Re-test of the loop counter
    LoopHeader,
    /// Binding increment before a repeated iteration
    LoopStep,
    /// Loop body
    LoopBody,
    /// Loop exit
    LoopExit,
}

impl LabelKind {
    fn prefix(self) -> &'static str {
        match self {
            LabelKind::ClearLoop => "clear",
            LabelKind::TransferLoop => "transfer",
            LabelKind::TransferStep => "transfer-step",
            LabelKind::TransferDone => "transfer-done",
            LabelKind::SubtractStep => "sub-step",
            LabelKind::SubtractDrain => "sub-drain",
            LabelKind::SubtractSkip => "sub-skip",
            LabelKind::Then => "then",
            LabelKind::Else => "else",
            LabelKind::EndIf => "end-if",
            LabelKind::LoopEntry => "loop-entry",
            LabelKind::LoopHeader => "loop-start",
            LabelKind::LoopStep => "loop-step",
            LabelKind::LoopBody => "loop-body",
            LabelKind::LoopExit => "loop-end",
        }
    }
}

/// Symbolic jump target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label {
    id: u32,
    kind: LabelKind,
}

impl Label {
    /// Unique id within one compilation
    pub fn id(self) -> u32 {
        self.id
    }

    /// What the label marks
    pub fn kind(self) -> LabelKind {
        self.kind
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, ".{}_{}", self.kind.prefix(), self.id)
    }
}

/// Mints fresh labels for one compilation
#[derive(Debug, Default)]
pub struct LabelGen {
    next: u32,
}

impl LabelGen {
    /// Create a generator starting at id 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh label of the given kind
    pub fn fresh(&mut self, kind: LabelKind) -> Label {
        let id = self.next;
        self.next += 1;
        Label { id, kind }
    }
}

/// Placeholder jump target awaiting fixup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hole {
    /// Target of a `JMP` at index `at`
    Jump {
        /// Instruction index within the fragment
        at: usize,
        /// Destination
        target: Label,
    },
    /// Both targets of a `TST` at index `at`
    Test {
        /// Instruction index within the fragment
        at: usize,
        /// Destination when the register is non-zero
        if_nonzero: Label,
        /// Destination when the register is zero
        if_zero: Label,
    },
}

impl Hole {
    /// Index of the instruction this hole patches
    pub fn at(&self) -> usize {
        match self {
            Hole::Jump { at, .. } | Hole::Test { at, .. } => *at,
        }
    }

    fn shifted(self, offset: usize) -> Self {
        match self {
            Hole::Jump { at, target } => Hole::Jump {
                at: at + offset,
                target,
            },
            Hole::Test {
                at,
                if_nonzero,
                if_zero,
            } => Hole::Test {
                at: at + offset,
                if_nonzero,
                if_zero,
            },
        }
    }
}

/// Ordered instructions plus the holes and label definitions they carry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    instructions: Vec<Instruction>,
    holes: Vec<Hole>,
    labels: Vec<(Label, usize)>,
}

impl Fragment {
    /// Empty fragment
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// True if the fragment holds no instructions
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Instructions in order (jump operands are placeholders)
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Unresolved holes
    pub fn holes(&self) -> &[Hole] {
        &self.holes
    }

    /// Label definitions as (label, local offset)
    pub fn labels(&self) -> &[(Label, usize)] {
        &self.labels
    }

    /// Local offset of a label defined in this fragment
    pub fn offset_of(&self, label: Label) -> Option<usize> {
        self.labels
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, offset)| *offset)
    }

    /// Bind `label` to the next instruction emitted
    pub fn define(&mut self, label: Label) {
        self.labels.push((label, self.instructions.len()));
    }

    /// Emit `INC r`
    pub fn inc(&mut self, register: Register) {
        self.instructions.push(Instruction::Inc(register));
    }

    /// Emit `DEC r`
    pub fn dec(&mut self, register: Register) {
        self.instructions.push(Instruction::Dec(register));
    }

    /// Emit `JMP target` with a hole
    pub fn jump(&mut self, target: Label) {
        let at = self.instructions.len();
        self.holes.push(Hole::Jump { at, target });
        self.instructions.push(Instruction::Jmp(0));
    }

    /// Emit `TST r` with holes for both successors
    pub fn test(&mut self, register: Register, if_nonzero: Label, if_zero: Label) {
        let at = self.instructions.len();
        self.holes.push(Hole::Test {
            at,
            if_nonzero,
            if_zero,
        });
        self.instructions.push(Instruction::Tst {
            register,
            if_nonzero: 0,
            if_zero: 0,
        });
    }

    /// Concatenate `other` after this fragment
    pub fn append(&mut self, other: Fragment) {
        let offset = self.instructions.len();
        self.instructions.extend(other.instructions);
        self.holes
            .extend(other.holes.into_iter().map(|h| h.shifted(offset)));
        self.labels.extend(
            other
                .labels
                .into_iter()
                .map(|(label, at)| (label, at + offset)),
        );
    }

    pub(crate) fn into_parts(self) -> (Vec<Instruction>, Vec<Hole>, Vec<(Label, usize)>) {
        (self.instructions, self.holes, self.labels)
    }

    pub(crate) fn from_parts(
        instructions: Vec<Instruction>,
        holes: Vec<Hole>,
        labels: Vec<(Label, usize)>,
    ) -> Self {
        Self {
            instructions,
            holes,
            labels,
        }
    }
}

impl FromIterator<Fragment> for Fragment {
    fn from_iter<I: IntoIterator<Item = Fragment>>(iter: I) -> Self {
        let mut out = Fragment::new();
        for fragment in iter {
            out.append(fragment);
        }
        out
    }
}
