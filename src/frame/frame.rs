//! Abstract machine state at one program point.

use crate::frame::{RegId, SubId};

/// Locals, operand stack and subroutine stack at one PC, holding
/// [`RegId`] handles rather than values.
///
/// The locals array has the method's declared size and never grows. A
/// `None` local is dead: never written, poisoned as the upper half of a
/// long/double pair, or the result of an irreconcilable join. Category-2
/// values occupy a single operand-stack entry but two local slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    locals: Vec<Option<RegId>>,
    stack: Vec<RegId>,
    subs: Vec<SubId>,
}

impl Frame {
    /// Creates an empty frame with `max_locals` dead local slots.
    #[must_use]
    pub(crate) fn new(max_locals: usize) -> Self {
        Frame {
            locals: vec![None; max_locals],
            stack: Vec::new(),
            subs: Vec::new(),
        }
    }

    /// The register in local `slot`, or `None` for a dead slot or a slot
    /// outside the declared range.
    #[must_use]
    pub fn local(&self, slot: usize) -> Option<RegId> {
        self.locals.get(slot).copied().flatten()
    }

    pub(crate) fn set_local(&mut self, slot: usize, register: Option<RegId>) {
        if let Some(entry) = self.locals.get_mut(slot) {
            *entry = register;
        }
    }

    /// All local slots in order.
    #[must_use]
    pub fn locals(&self) -> &[Option<RegId>] {
        &self.locals
    }

    pub(crate) fn locals_mut(&mut self) -> &mut [Option<RegId>] {
        &mut self.locals
    }

    /// The operand stack, bottom first.
    #[must_use]
    pub fn stack(&self) -> &[RegId] {
        &self.stack
    }

    pub(crate) fn stack_mut(&mut self) -> &mut Vec<RegId> {
        &mut self.stack
    }

    /// Current operand stack depth in abstract entries.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub(crate) fn push(&mut self, register: RegId) {
        self.stack.push(register);
    }

    pub(crate) fn pop(&mut self) -> Option<RegId> {
        self.stack.pop()
    }

    pub(crate) fn clear_stack(&mut self) {
        self.stack.clear();
    }

    /// The active subroutine contexts, outermost first.
    #[must_use]
    pub fn subs(&self) -> &[SubId] {
        &self.subs
    }

    pub(crate) fn push_sub(&mut self, sub: SubId) {
        self.subs.push(sub);
    }

    pub(crate) fn pop_sub(&mut self) -> Option<SubId> {
        self.subs.pop()
    }

    /// Returns `true` if `sub` is already on the subroutine stack.
    #[must_use]
    pub fn in_sub(&self, sub: SubId) -> bool {
        self.subs.contains(&sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locals_and_stack() {
        let mut frame = Frame::new(3);
        assert_eq!(frame.local(0), None);
        assert_eq!(frame.local(9), None);

        frame.set_local(1, Some(RegId::new(4)));
        assert_eq!(frame.local(1), Some(RegId::new(4)));
        frame.set_local(1, None);
        assert_eq!(frame.local(1), None);

        frame.push(RegId::new(0));
        frame.push(RegId::new(1));
        assert_eq!(frame.depth(), 2);
        assert_eq!(frame.pop(), Some(RegId::new(1)));
        assert_eq!(frame.stack(), &[RegId::new(0)]);
    }

    #[test]
    fn subroutine_stack() {
        let mut frame = Frame::new(0);
        frame.push_sub(SubId::new(0));
        assert!(frame.in_sub(SubId::new(0)));
        assert!(!frame.in_sub(SubId::new(1)));
        assert_eq!(frame.pop_sub(), Some(SubId::new(0)));
        assert_eq!(frame.pop_sub(), None);
    }
}
