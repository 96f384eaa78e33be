//! Provenance-tracked abstract values.

use std::fmt;

use crate::ir::{ConstValue, Pc, ValueType};

/// Identifier of a [`Register`] in its per-method arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegId(pub(crate) usize);

impl RegId {
    pub(crate) const fn new(index: usize) -> Self {
        RegId(index)
    }

    /// Index of the register in the arena.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Debug for RegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegId({})", self.0)
    }
}

impl fmt::Display for RegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

impl From<usize> for RegId {
    fn from(index: usize) -> Self {
        RegId(index)
    }
}

impl From<RegId> for usize {
    fn from(id: RegId) -> Self {
        id.0
    }
}

/// How a register came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum RegKind {
    /// A literal constant push, or the return address pushed by a
    /// subroutine call.
    Const,
    /// A value entering the operand stack from outside it: a method
    /// parameter, a field or array read, an invoke result, a computed
    /// value, or a caught exception object.
    Load,
    /// A copy inserted by a stack shuffle (`dup` family).
    Move,
    /// A synthetic value standing for two or more registers meeting at
    /// the same slot of a join point.
    Merge,
}

/// One abstract value: where it was created, what produced it, its
/// inferred type, and its links to the registers it was derived from
/// (`sources`) and to the merge registers derived from it (`dependents`).
///
/// Registers are append-only apart from two sanctioned mutations, both
/// performed by the inference engine: the type may shrink (narrowing and
/// merge extension) and the link lists may grow. Identity never changes;
/// replacing a value at a join point always means writing a different
/// [`RegId`] into the affected frames, never rewriting this record.
#[derive(Debug, Clone, PartialEq)]
pub struct Register {
    id: RegId,
    pc: Pc,
    kind: RegKind,
    ty: ValueType,
    value: Option<ConstValue>,
    sources: Vec<RegId>,
    dependents: Vec<RegId>,
}

impl Register {
    /// The register's identifier.
    #[must_use]
    pub const fn id(&self) -> RegId {
        self.id
    }

    /// PC of the operation that created the register. For merge registers
    /// this is the join-point PC; for parameters it is the method entry.
    #[must_use]
    pub const fn pc(&self) -> Pc {
        self.pc
    }

    /// The register's provenance kind.
    #[must_use]
    pub const fn kind(&self) -> RegKind {
        self.kind
    }

    /// The inferred type, possibly still a multi-candidate set.
    #[must_use]
    pub const fn ty(&self) -> &ValueType {
        &self.ty
    }

    /// The constant value, for [`RegKind::Const`] registers that carry one.
    #[must_use]
    pub const fn value(&self) -> Option<&ConstValue> {
        self.value.as_ref()
    }

    /// Registers this one was derived from: merge inputs, the original of
    /// a copy, or the operands of a computed value.
    #[must_use]
    pub fn sources(&self) -> &[RegId] {
        &self.sources
    }

    /// Merge registers that take this one as an input.
    #[must_use]
    pub fn dependents(&self) -> &[RegId] {
        &self.dependents
    }
}

/// Per-method register arena.
///
/// Registers are addressed by [`RegId`] and never removed; a method's
/// full provenance history stays navigable after inference completes.
#[derive(Debug, Clone, Default)]
pub struct Registers {
    registers: Vec<Register>,
}

impl Registers {
    pub(crate) fn new() -> Self {
        Registers::default()
    }

    pub(crate) fn alloc(
        &mut self,
        pc: Pc,
        kind: RegKind,
        ty: ValueType,
        value: Option<ConstValue>,
        sources: Vec<RegId>,
    ) -> RegId {
        let id = RegId::new(self.registers.len());
        self.registers.push(Register {
            id,
            pc,
            kind,
            ty,
            value,
            sources,
            dependents: Vec::new(),
        });
        id
    }

    /// Re-derives an existing register when its creating operation is
    /// re-executed. The inferred type only shrinks: the recomputed type
    /// is joined with the current one so narrowings applied by readers
    /// survive re-derivation. Dependent links are kept; sources and the
    /// constant value are replaced.
    ///
    /// Returns `false` when the joined type is irreconcilable with the
    /// recomputed one, which means inference diverged.
    pub(crate) fn rederive(
        &mut self,
        id: RegId,
        ty: &ValueType,
        value: Option<ConstValue>,
        sources: Vec<RegId>,
    ) -> bool {
        let register = &mut self.registers[id.index()];
        match register.ty.join(ty) {
            Some(joined) => {
                register.ty = joined;
                register.value = value;
                register.sources = sources;
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_type(&mut self, id: RegId, ty: ValueType) {
        self.registers[id.index()].ty = ty;
    }

    pub(crate) fn add_source(&mut self, id: RegId, source: RegId) {
        let sources = &mut self.registers[id.index()].sources;
        if !sources.contains(&source) {
            sources.push(source);
        }
    }

    pub(crate) fn add_dependent(&mut self, id: RegId, dependent: RegId) {
        let dependents = &mut self.registers[id.index()].dependents;
        if !dependents.contains(&dependent) {
            dependents.push(dependent);
        }
    }

    /// The register with the given identifier.
    #[must_use]
    pub fn get(&self, id: RegId) -> &Register {
        &self.registers[id.index()]
    }

    /// Number of registers allocated so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registers.len()
    }

    /// Returns `true` if no register has been allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// All registers in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = &Register> {
        self.registers.iter()
    }
}
