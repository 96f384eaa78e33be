//! Control structure recovery.
//!
//! Lifts the flat control flow graph back into the nested conditionals,
//! loops and switches the source was written with. The result is a
//! [`StructTree`] per method: each [`Struct`] names its head block, the
//! blocks of every branch, the follow block where control reconverges
//! and its enclosing structure, which is what a statement printer walks
//! to emit `if`/`while`/`switch` nesting and to resolve `break` and
//! `continue` targets.
//!
//! # Key Components
//!
//! - [`build_structure`] - Runs the classification sweep over a
//!   postorder-numbered graph and returns the tree
//! - [`StructTree`] - Arena of recovered structures, outer entries
//!   before the structures they enclose, with parent and child lookup
//! - [`Struct`] - One conditional, loop or switch: kind, head, branch
//!   member lists keyed by [`BranchKey`], follow and parent
//!
//! # Architecture
//!
//! Blocks are visited in descending postorder, so outer heads are seen
//! before the heads nested inside them. Loops are recognized first, at
//! the target of a non-exception back edge, then switch heads by their
//! case edges, then any remaining two-way block as a conditional. Each
//! structure claims its member blocks as it is built; a later claim
//! overrides an earlier one, so ownership always names the innermost
//! structure and the owner of a head at creation time is the new
//! structure's parent. Classification is total: a shape that matches
//! nothing is logged and left unstructured rather than failing the
//! method.
//!
//! # Usage Examples
//!
//! ```rust
//! use classflow::cfg::build_graph;
//! use classflow::structure::{build_structure, LoopKind, StructKind};
//! use classflow::{BranchKind, CondOp, ConstValue, MethodBody, Op, Operation};
//!
//! // while-style loop: test at the top, body jumps back
//! let body = MethodBody::new(
//!     vec![
//!         Operation::new(Op::Const(ConstValue::Int(1))),
//!         Operation::new(Op::Branch {
//!             kind: BranchKind::IntZero(CondOp::Eq),
//!             target: 4,
//!         }),
//!         Operation::new(Op::Iinc { slot: 0, delta: 1 }),
//!         Operation::new(Op::Goto { target: 0 }),
//!         Operation::new(Op::Return { kind: None }),
//!     ],
//!     vec![],
//!     1,
//!     8,
//!     vec![],
//! );
//!
//! let mut graph = build_graph("Sample.spin", &body)?;
//! let tree = build_structure("Sample.spin", &mut graph);
//!
//! assert_eq!(tree.len(), 1);
//! let root = tree.roots().next().unwrap();
//! assert_eq!(root.kind(), StructKind::Loop(LoopKind::WhileNot));
//! assert_eq!(root.follow(), graph.block_at(4));
//! # Ok::<(), classflow::Error>(())
//! ```

mod conds;
mod engine;
mod loops;
mod switches;
mod tree;

pub use engine::build_structure;
pub use tree::{
    BranchKey, CondKind, LoopKind, Struct, StructId, StructKind, StructTree, SwitchKind,
};
