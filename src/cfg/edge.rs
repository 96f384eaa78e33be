//! Typed control-flow edges.
//!
//! Every edge carries a discriminant describing *why* control may take it:
//! plain fall-through or goto, a conditional branch outcome, a set of switch
//! case keys, a set of caught exception types, or subroutine linkage. The
//! discriminant never changes after creation; the only post-creation
//! mutations are the one-time retarget when the target block is split and
//! the back-edge flag set by the postorder pass.
//!
//! Switch and exception discriminants are *sets* with a reserved sentinel:
//! a [`CaseKeys`] may carry the default marker next to explicit keys when
//! both land on the same target, and a [`CatchTypes`] may carry the
//! catch-any marker used by `finally` handlers.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::cfg::BlockId;

/// Identifier of an [`Edge`] within its method's graph arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub(crate) usize);

impl EdgeId {
    #[must_use]
    pub(crate) const fn new(index: usize) -> Self {
        EdgeId(index)
    }

    /// The arena index of this edge.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Debug for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeId({})", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Case-key set carried by a switch edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseKeys {
    /// Explicit keys that select this target.
    pub keys: BTreeSet<i32>,
    /// Whether the default sentinel also selects this target.
    pub has_default: bool,
}

impl CaseKeys {
    /// Keys-only set without the default sentinel.
    #[must_use]
    pub fn of(keys: impl IntoIterator<Item = i32>) -> Self {
        CaseKeys {
            keys: keys.into_iter().collect(),
            has_default: false,
        }
    }

    /// The bare default sentinel.
    #[must_use]
    pub fn default_only() -> Self {
        CaseKeys {
            keys: BTreeSet::new(),
            has_default: true,
        }
    }
}

impl fmt::Display for CaseKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for key in &self.keys {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{}", key)?;
            first = false;
        }
        if self.has_default {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "default")?;
        }
        Ok(())
    }
}

/// Exception-type set carried by a handler edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchTypes {
    /// Caught classes in internal form.
    pub types: BTreeSet<Arc<str>>,
    /// Whether the catch-any sentinel (`finally`) is present.
    pub catches_any: bool,
}

impl CatchTypes {
    /// A set catching the single named class.
    #[must_use]
    pub fn of(name: impl Into<Arc<str>>) -> Self {
        CatchTypes {
            types: [name.into()].into_iter().collect(),
            catches_any: false,
        }
    }

    /// The bare catch-any sentinel.
    #[must_use]
    pub fn any() -> Self {
        CatchTypes {
            types: BTreeSet::new(),
            catches_any: true,
        }
    }
}

/// Discriminant of a control-flow edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeKind {
    /// Fall-through or unconditional goto.
    Sequential,
    /// Conditional branch outcome; `true` for the branch-taken edge.
    Branch(bool),
    /// Switch dispatch for the carried key set.
    Case(CaseKeys),
    /// Exception transfer for the carried type set.
    Catch(CatchTypes),
    /// `jsr` to a subroutine entry.
    SubCall,
    /// `ret` continuation back to the PC after a `jsr`.
    SubReturn,
}

impl EdgeKind {
    /// Whether this is a plain sequential/goto edge.
    #[must_use]
    pub const fn is_sequential(&self) -> bool {
        matches!(self, EdgeKind::Sequential)
    }

    /// The branch outcome, if this is a conditional edge.
    #[must_use]
    pub const fn branch_value(&self) -> Option<bool> {
        match self {
            EdgeKind::Branch(value) => Some(*value),
            _ => None,
        }
    }

    /// Whether this is a switch-case edge.
    #[must_use]
    pub const fn is_case(&self) -> bool {
        matches!(self, EdgeKind::Case(_))
    }

    /// Whether this is an exception-handler edge.
    #[must_use]
    pub const fn is_exception(&self) -> bool {
        matches!(self, EdgeKind::Catch(_))
    }

    /// Whether this is subroutine linkage (call or return).
    #[must_use]
    pub const fn is_subroutine(&self) -> bool {
        matches!(self, EdgeKind::SubCall | EdgeKind::SubReturn)
    }

    /// Short label for DOT rendering and diagnostics.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            EdgeKind::Sequential => String::new(),
            EdgeKind::Branch(true) => "T".to_string(),
            EdgeKind::Branch(false) => "F".to_string(),
            EdgeKind::Case(keys) => format!("case {}", keys),
            EdgeKind::Catch(types) => {
                if types.catches_any && types.types.is_empty() {
                    "catch any".to_string()
                } else {
                    let names: Vec<&str> =
                        types.types.iter().map(|name| name.as_ref()).collect();
                    if types.catches_any {
                        format!("catch {},any", names.join(","))
                    } else {
                        format!("catch {}", names.join(","))
                    }
                }
            }
            EdgeKind::SubCall => "jsr".to_string(),
            EdgeKind::SubReturn => "ret".to_string(),
        }
    }
}

/// A directed edge between two blocks of the same method graph.
#[derive(Debug, Clone)]
pub struct Edge {
    id: EdgeId,
    pub(crate) source: BlockId,
    pub(crate) target: BlockId,
    pub(crate) kind: EdgeKind,
    pub(crate) back: bool,
}

impl Edge {
    pub(crate) const fn new(id: EdgeId, source: BlockId, target: BlockId, kind: EdgeKind) -> Self {
        Edge {
            id,
            source,
            target,
            kind,
            back: false,
        }
    }

    /// This edge's identifier.
    #[must_use]
    pub const fn id(&self) -> EdgeId {
        self.id
    }

    /// Source block.
    #[must_use]
    pub const fn source(&self) -> BlockId {
        self.source
    }

    /// Target block.
    #[must_use]
    pub const fn target(&self) -> BlockId {
        self.target
    }

    /// The discriminant.
    #[must_use]
    pub const fn kind(&self) -> &EdgeKind {
        &self.kind
    }

    /// Whether the target's postorder number is greater than or equal to
    /// the source's. Set once by the postorder pass.
    #[must_use]
    pub const fn is_back(&self) -> bool {
        self.back
    }
}
