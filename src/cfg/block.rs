//! Basic blocks and their arena identifiers.
//!
//! Blocks are owned by a [`crate::cfg::MethodGraph`] arena and referenced by
//! [`BlockId`] everywhere else, including from edges and recovered
//! structures. Identifiers are plain indices: cheap to copy, stable across
//! the whole analysis (blocks are never removed), and free of lifetime
//! entanglement between the graph and the structure tree.
//!
//! A block's arena index doubles as its *creation order*, the stable
//! tie-breaker used by loop-tail selection and follow-node election. Splits
//! preserve this meaning: the head half of a split is a newly created block
//! and thus ordered after everything created before the split.

use std::fmt;
use std::ops::Range;

use crate::cfg::EdgeId;
use crate::ir::Pc;
use crate::structure::StructId;

/// Identifier of a [`BasicBlock`] within its method's graph arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    /// Creates a block identifier from an arena index.
    #[must_use]
    pub(crate) const fn new(index: usize) -> Self {
        BlockId(index)
    }

    /// The arena index, which is also the block's creation order.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

impl From<usize> for BlockId {
    fn from(index: usize) -> Self {
        BlockId(index)
    }
}

impl From<BlockId> for usize {
    fn from(id: BlockId) -> Self {
        id.0
    }
}

/// A maximal straight-line run of operations with a single entry PC.
///
/// Blocks hold a half-open PC range rather than copies of the operations;
/// the range partitions the method's reachable PCs exactly once. The
/// postorder number distinguishes forward from back edges and is assigned
/// in one pass after construction finishes; the structure annotations are
/// filled in by the structuring sweep.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    id: BlockId,
    pub(crate) start_pc: Pc,
    pub(crate) end_pc: Pc,
    pub(crate) postorder: Option<usize>,
    pub(crate) predecessors: Vec<EdgeId>,
    pub(crate) successors: Vec<EdgeId>,
    pub(crate) owner: Option<StructId>,
    pub(crate) head_of: Option<StructId>,
}

impl BasicBlock {
    pub(crate) const fn new(id: BlockId, start_pc: Pc, end_pc: Pc) -> Self {
        BasicBlock {
            id,
            start_pc,
            end_pc,
            postorder: None,
            predecessors: Vec::new(),
            successors: Vec::new(),
            owner: None,
            head_of: None,
        }
    }

    /// This block's identifier.
    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    /// First PC of the block.
    #[must_use]
    pub const fn start_pc(&self) -> Pc {
        self.start_pc
    }

    /// One past the last PC of the block.
    #[must_use]
    pub const fn end_pc(&self) -> Pc {
        self.end_pc
    }

    /// The half-open PC range covered by this block.
    #[must_use]
    pub const fn pc_range(&self) -> Range<Pc> {
        self.start_pc..self.end_pc
    }

    /// Whether `pc` falls inside this block.
    #[must_use]
    pub const fn contains_pc(&self, pc: Pc) -> bool {
        self.start_pc <= pc && pc < self.end_pc
    }

    /// Creation order; identical to [`BlockId::index`].
    #[must_use]
    pub const fn order(&self) -> usize {
        self.id.0
    }

    /// Postorder number, assigned once after construction. `None` only
    /// for blocks unreachable from the entry.
    #[must_use]
    pub const fn postorder(&self) -> Option<usize> {
        self.postorder
    }

    /// Incoming edges, in attachment order.
    #[must_use]
    pub fn predecessors(&self) -> &[EdgeId] {
        &self.predecessors
    }

    /// Outgoing edges, in attachment order: control edges first, then
    /// exception edges in ascending handler PC.
    #[must_use]
    pub fn successors(&self) -> &[EdgeId] {
        &self.successors
    }

    /// The innermost structure this block is a member of, if any.
    #[must_use]
    pub const fn owner(&self) -> Option<StructId> {
        self.owner
    }

    /// The first structure recovered with this block as its head, if any.
    #[must_use]
    pub const fn head_of(&self) -> Option<StructId> {
        self.head_of
    }
}
