//! Per-method analysis input: operations, exception table, frame limits.
//!
//! A [`MethodBody`] is everything the upstream decoder hands over for one
//! method. It is read-only to this crate; all analysis state lives in the
//! graph, frame and structure layers built on top of it.

use std::sync::Arc;

use crate::ir::{Op, Operation, Pc, ValueType};

/// One exception-table entry.
///
/// `start_pc` is inclusive, `end_pc` exclusive. A `None` catch type is the
/// "any" entry used for `finally` blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionEntry {
    /// First covered PC.
    pub start_pc: Pc,
    /// First PC no longer covered.
    pub end_pc: Pc,
    /// Handler entry PC.
    pub handler_pc: Pc,
    /// Caught class in internal form, or `None` for any/finally.
    pub catch_type: Option<Arc<str>>,
}

impl ExceptionEntry {
    /// Creates an entry catching a specific exception class.
    pub fn catching(
        start_pc: Pc,
        end_pc: Pc,
        handler_pc: Pc,
        catch_type: impl Into<Arc<str>>,
    ) -> Self {
        ExceptionEntry {
            start_pc,
            end_pc,
            handler_pc,
            catch_type: Some(catch_type.into()),
        }
    }

    /// Creates an any/finally entry.
    #[must_use]
    pub const fn finally(start_pc: Pc, end_pc: Pc, handler_pc: Pc) -> Self {
        ExceptionEntry {
            start_pc,
            end_pc,
            handler_pc,
            catch_type: None,
        }
    }

    /// Whether this entry catches every exception type.
    #[must_use]
    pub const fn catches_any(&self) -> bool {
        self.catch_type.is_none()
    }

    /// Whether the given PC lies in the protected region.
    #[must_use]
    pub const fn covers(&self, pc: Pc) -> bool {
        self.start_pc <= pc && pc < self.end_pc
    }
}

/// The complete decoded body of one method.
///
/// # Examples
///
/// ```rust
/// use classflow::{MethodBody, Operation, Op, ConstValue};
///
/// let body = MethodBody::new(
///     vec![
///         Operation::new(Op::Const(ConstValue::Int(0))),
///         Operation::new(Op::Return { kind: Some(classflow::SlotKind::Int) }),
///     ],
///     vec![],
///     1,
///     1,
///     vec![],
/// );
/// assert_eq!(body.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MethodBody {
    ops: Vec<Operation>,
    exceptions: Vec<ExceptionEntry>,
    max_locals: usize,
    max_stack: usize,
    params: Vec<ValueType>,
}

impl MethodBody {
    /// Assembles a method body.
    ///
    /// `params` are the types of the leading local slots at entry, one
    /// entry per slot: the receiver first for instance methods, then the
    /// parameters with wide types contributing two entries (the second
    /// being ignored). They come from the externally parsed method
    /// descriptor, like the field and invoke descriptors on the
    /// operations themselves.
    #[must_use]
    pub fn new(
        ops: Vec<Operation>,
        exceptions: Vec<ExceptionEntry>,
        max_locals: usize,
        max_stack: usize,
        params: Vec<ValueType>,
    ) -> Self {
        MethodBody {
            ops,
            exceptions,
            max_locals,
            max_stack,
            params,
        }
    }

    /// Number of operations (the PC range is `0..len()`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the body holds no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The operation at `pc`, or `None` past the end.
    #[must_use]
    pub fn op(&self, pc: Pc) -> Option<&Op> {
        self.ops.get(pc).map(|operation| &operation.op)
    }

    /// All operations in PC order.
    #[must_use]
    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    /// Source line recorded for `pc`, if any.
    #[must_use]
    pub fn line(&self, pc: Pc) -> Option<u32> {
        self.ops.get(pc).and_then(|operation| operation.line)
    }

    /// The exception table in declaration order.
    #[must_use]
    pub fn exceptions(&self) -> &[ExceptionEntry] {
        &self.exceptions
    }

    /// Exception entries covering `pc`, in declaration order.
    pub fn handlers_for(&self, pc: Pc) -> impl Iterator<Item = &ExceptionEntry> {
        self.exceptions.iter().filter(move |entry| entry.covers(pc))
    }

    /// Declared local slot count.
    #[must_use]
    pub const fn max_locals(&self) -> usize {
        self.max_locals
    }

    /// Declared operand stack depth.
    #[must_use]
    pub const fn max_stack(&self) -> usize {
        self.max_stack
    }

    /// Entry types of the leading local slots.
    #[must_use]
    pub fn params(&self) -> &[ValueType] {
        &self.params
    }
}
