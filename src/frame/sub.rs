//! Subroutine (`jsr`/`ret`) call contexts.

use std::fmt;

use crate::frame::Frame;
use crate::ir::Pc;

/// Identifier of a [`Sub`] in its per-method arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubId(pub(crate) usize);

impl SubId {
    pub(crate) const fn new(index: usize) -> Self {
        SubId(index)
    }

    /// Index of the context in the arena.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Debug for SubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubId({})", self.0)
    }
}

impl fmt::Display for SubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub{}", self.0)
    }
}

impl From<usize> for SubId {
    fn from(index: usize) -> Self {
        SubId(index)
    }
}

impl From<SubId> for usize {
    fn from(id: SubId) -> Self {
        id.0
    }
}

/// One subroutine: its entry PC, the call sites discovered so far, and
/// the matching `ret` once inference reaches it.
///
/// The operand stack depth recorded at the first call binds every later
/// call site and the `ret`: entering a subroutine never resizes the
/// stack, so disagreement means the method was never verifiable.
#[derive(Debug, Clone)]
pub struct Sub {
    id: SubId,
    entry_pc: Pc,
    ret_pc: Option<Pc>,
    entry_depth: Option<usize>,
    continuations: Vec<Pc>,
    return_frame: Option<Frame>,
}

impl Sub {
    pub(crate) const fn new(id: SubId, entry_pc: Pc) -> Self {
        Sub {
            id,
            entry_pc,
            ret_pc: None,
            entry_depth: None,
            continuations: Vec::new(),
            return_frame: None,
        }
    }

    /// The context's identifier.
    #[must_use]
    pub const fn id(&self) -> SubId {
        self.id
    }

    /// PC of the subroutine's first operation.
    #[must_use]
    pub const fn entry_pc(&self) -> Pc {
        self.entry_pc
    }

    /// PC of the matching `ret`, once discovered.
    #[must_use]
    pub const fn ret_pc(&self) -> Option<Pc> {
        self.ret_pc
    }

    /// Operand stack depth at entry, recorded at the first call site.
    #[must_use]
    pub const fn entry_depth(&self) -> Option<usize> {
        self.entry_depth
    }

    /// Continuation PCs of the discovered call sites.
    #[must_use]
    pub fn continuations(&self) -> &[Pc] {
        &self.continuations
    }

    /// The frame recorded when the `ret` was processed, already stripped
    /// of this context.
    #[must_use]
    pub const fn return_frame(&self) -> Option<&Frame> {
        self.return_frame.as_ref()
    }

    pub(crate) fn set_ret_pc(&mut self, pc: Pc) {
        self.ret_pc = Some(pc);
    }

    pub(crate) fn set_entry_depth(&mut self, depth: usize) {
        self.entry_depth = Some(depth);
    }

    pub(crate) fn add_continuation(&mut self, pc: Pc) {
        if !self.continuations.contains(&pc) {
            self.continuations.push(pc);
        }
    }

    pub(crate) fn set_return_frame(&mut self, frame: Frame) {
        self.return_frame = Some(frame);
    }
}
