//! The recovered structure tree.
//!
//! [`Struct`]s live in a per-method arena ([`StructTree`]) and reference
//! blocks and each other by index, mirroring the block/edge arenas in
//! [`crate::cfg`]. A structure records its kind, its head block, the blocks
//! belonging to each branch, the follow block where control reconverges and
//! the immediately enclosing structure. Downstream statement synthesis
//! walks the parent chain to resolve break and continue targets.

use std::fmt;

use crate::cfg::{BlockId, CaseKeys};

/// Identifier of a [`Struct`] within its method's tree arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructId(pub(crate) usize);

impl StructId {
    #[must_use]
    pub(crate) const fn new(index: usize) -> Self {
        StructId(index)
    }

    /// The arena index of this structure.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Debug for StructId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StructId({})", self.0)
    }
}

impl fmt::Display for StructId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Conditional flavor.
///
/// The `Not` forms mark a guard whose false edge enters the branch body,
/// the usual shape for a compiled `if` without negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CondKind {
    /// One armed, body on the true edge.
    If,
    /// One armed, body on the false edge.
    IfNot,
    /// Two armed, first branch on the true edge.
    IfElse,
    /// Two armed, first branch on the false edge.
    IfNotElse,
}

/// Loop flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LoopKind {
    /// Pre-test, body on the true edge of the head.
    While,
    /// Pre-test, body on the false edge of the head.
    WhileNot,
    /// Post-test, true edge of the tail re-enters the head.
    DoWhile,
    /// Post-test, false edge of the tail re-enters the head.
    DoWhileNot,
    /// No guard; exits only through break-like edges.
    Endless,
}

/// Switch flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SwitchKind {
    /// Every key and the default land on a single target.
    NoDefault,
    /// The default terminates the statement; nothing reconverges after.
    WithDefault,
    /// Cases and default reconverge at a follow block.
    Switch,
}

/// Kind of a recovered structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructKind {
    /// A conditional rooted at a two-way branch.
    Cond(CondKind),
    /// A loop entered through its head block.
    Loop(LoopKind),
    /// A switch rooted at a multi-way dispatch.
    Switch(SwitchKind),
}

impl fmt::Display for StructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructKind::Cond(kind) => write!(f, "cond/{}", kind),
            StructKind::Loop(kind) => write!(f, "loop/{}", kind),
            StructKind::Switch(kind) => write!(f, "switch/{}", kind),
        }
    }
}

/// Branch-value key of one member list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchKey {
    /// Outcome of a conditional head.
    Bool(bool),
    /// Case keys selecting a switch branch.
    Cases(CaseKeys),
    /// The single unkeyed branch of a loop body.
    Body,
}

impl fmt::Display for BranchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchKey::Bool(value) => write!(f, "{}", value),
            BranchKey::Cases(keys) => write!(f, "{}", keys),
            BranchKey::Body => write!(f, "body"),
        }
    }
}

/// One recovered control structure.
#[derive(Debug, Clone)]
pub struct Struct {
    id: StructId,
    kind: StructKind,
    head: BlockId,
    parent: Option<StructId>,
    branches: Vec<(BranchKey, Vec<BlockId>)>,
    follow: Option<BlockId>,
}

impl Struct {
    /// This structure's identifier.
    #[must_use]
    pub const fn id(&self) -> StructId {
        self.id
    }

    /// The kind, fixed at creation.
    #[must_use]
    pub const fn kind(&self) -> StructKind {
        self.kind
    }

    /// The head block that dominates the structure.
    #[must_use]
    pub const fn head(&self) -> BlockId {
        self.head
    }

    /// The immediately enclosing structure, if any.
    #[must_use]
    pub const fn parent(&self) -> Option<StructId> {
        self.parent
    }

    /// Branches in discovery order. For switches this is case emission
    /// order, with fall-through cases adjacent.
    #[must_use]
    pub fn branches(&self) -> &[(BranchKey, Vec<BlockId>)] {
        &self.branches
    }

    /// Member blocks of the branch with the given key.
    #[must_use]
    pub fn branch(&self, key: &BranchKey) -> Option<&[BlockId]> {
        self.branches
            .iter()
            .find(|(branch_key, _)| branch_key == key)
            .map(|(_, blocks)| blocks.as_slice())
    }

    /// All member blocks across all branches.
    pub fn member_blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.branches
            .iter()
            .flat_map(|(_, blocks)| blocks.iter().copied())
    }

    /// Whether `block` is a direct member of this structure.
    #[must_use]
    pub fn is_member(&self, block: BlockId) -> bool {
        self.member_blocks().any(|member| member == block)
    }

    /// The block where all branches reconverge, or `None` when control
    /// never rejoins (every branch returns or throws).
    #[must_use]
    pub const fn follow(&self) -> Option<BlockId> {
        self.follow
    }

    pub(crate) fn add_branch(&mut self, key: BranchKey, blocks: Vec<BlockId>) {
        self.branches.push((key, blocks));
    }

    pub(crate) fn remove_member(&mut self, block: BlockId) {
        for (_, blocks) in &mut self.branches {
            blocks.retain(|member| *member != block);
        }
    }

    pub(crate) fn set_follow(&mut self, follow: Option<BlockId>) {
        self.follow = follow;
    }
}

/// Per-method structure arena.
#[derive(Debug, Clone, Default)]
pub struct StructTree {
    structs: Vec<Struct>,
}

impl StructTree {
    pub(crate) fn new() -> Self {
        StructTree::default()
    }

    /// Reserves a structure so members can be claimed against its id
    /// while classification is still in progress.
    pub(crate) fn begin(
        &mut self,
        kind: StructKind,
        head: BlockId,
        parent: Option<StructId>,
    ) -> StructId {
        let id = StructId::new(self.structs.len());
        self.structs.push(Struct {
            id,
            kind,
            head,
            parent,
            branches: Vec::new(),
            follow: None,
        });
        id
    }

    pub(crate) fn struct_mut(&mut self, id: StructId) -> &mut Struct {
        &mut self.structs[id.index()]
    }

    /// The structure with the given identifier.
    #[must_use]
    pub fn get(&self, id: StructId) -> &Struct {
        &self.structs[id.index()]
    }

    /// Number of recovered structures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.structs.len()
    }

    /// True when the method is straight-line code.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.structs.is_empty()
    }

    /// All structures in discovery order (outer before inner).
    pub fn iter(&self) -> impl Iterator<Item = &Struct> {
        self.structs.iter()
    }

    /// Top-level structures with no enclosing parent.
    pub fn roots(&self) -> impl Iterator<Item = &Struct> {
        self.structs.iter().filter(|s| s.parent().is_none())
    }

    /// Structures directly enclosed by `id`.
    pub fn children(&self, id: StructId) -> impl Iterator<Item = &Struct> {
        self.structs
            .iter()
            .filter(move |s| s.parent() == Some(id))
    }

    /// The enclosing chain of `id`, innermost first. Break and continue
    /// targets are found by scanning this chain for the nearest loop or
    /// switch.
    pub fn ancestors(&self, id: StructId) -> impl Iterator<Item = &Struct> {
        let mut current = self.get(id).parent();
        std::iter::from_fn(move || {
            let parent = current?;
            let found = self.get(parent);
            current = found.parent();
            Some(found)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_formats() {
        let id = StructId::new(2);
        assert_eq!(id.index(), 2);
        assert_eq!(format!("{}", id), "s2");
        assert_eq!(format!("{:?}", id), "StructId(2)");
    }

    #[test]
    fn kind_display() {
        assert_eq!(
            format!("{}", StructKind::Cond(CondKind::IfNotElse)),
            "cond/if_not_else"
        );
        assert_eq!(
            format!("{}", StructKind::Loop(LoopKind::DoWhile)),
            "loop/do_while"
        );
        assert_eq!(
            format!("{}", StructKind::Switch(SwitchKind::WithDefault)),
            "switch/with_default"
        );
    }

    #[test]
    fn arena_and_parent_chain() {
        let mut tree = StructTree::new();
        let outer = tree.begin(
            StructKind::Loop(LoopKind::Endless),
            BlockId::new(0),
            None,
        );
        let inner = tree.begin(
            StructKind::Cond(CondKind::If),
            BlockId::new(1),
            Some(outer),
        );

        tree.struct_mut(outer)
            .add_branch(BranchKey::Body, vec![BlockId::new(0), BlockId::new(1)]);
        tree.struct_mut(inner)
            .add_branch(BranchKey::Bool(true), vec![BlockId::new(2)]);
        tree.struct_mut(inner).set_follow(Some(BlockId::new(3)));

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.roots().count(), 1);
        assert_eq!(tree.children(outer).count(), 1);

        let chain: Vec<StructId> = tree.ancestors(inner).map(Struct::id).collect();
        assert_eq!(chain, vec![outer]);

        let inner = tree.get(inner);
        assert!(inner.is_member(BlockId::new(2)));
        assert!(!inner.is_member(BlockId::new(3)));
        assert_eq!(
            inner.branch(&BranchKey::Bool(true)),
            Some(&[BlockId::new(2)][..])
        );
        assert_eq!(inner.branch(&BranchKey::Bool(false)), None);
        assert_eq!(inner.follow(), Some(BlockId::new(3)));
    }
}
