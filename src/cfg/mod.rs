//! Control flow graph construction and analysis.
//!
//! Turns a method's flat operation stream into an explicit graph of basic
//! blocks connected by typed edges, then annotates it with a postorder
//! numbering that marks every back edge. The graph is the substrate both
//! later stages run on: the frame engine walks its edges to propagate
//! abstract machine states, and the structuring engine reads its postorder
//! and back flags to recover loops, conditionals and switches.
//!
//! # Key Components
//!
//! - [`MethodGraph`] - Arena holding every [`BasicBlock`] and [`Edge`] of
//!   one method, with the entry block, a PC lookup map and the postorder
//!   sequence
//! - [`build_graph`] - Builds the graph for one method body, splitting
//!   blocks at jump targets and exception region boundaries
//! - [`EdgeKind`] - What an edge means: fall-through, branch polarity,
//!   switch case keys, caught exception types, or subroutine linkage
//!
//! # Architecture
//!
//! Blocks and edges live in append-only arenas addressed by [`BlockId`] and
//! [`EdgeId`], so identifiers stay stable across block splits and creation
//! order doubles as a total order for later tie-breaking. Every edge is
//! attached from its source exactly once, control transfers before
//! exception edges, case and catch edges in ascending target order, which
//! makes traversal order deterministic for a given body.
//!
//! # Usage Examples
//!
//! ```rust
//! use classflow::cfg::build_graph;
//! use classflow::{ConstValue, MethodBody, Op, Operation, SlotKind};
//!
//! let body = MethodBody::new(
//!     vec![
//!         Operation::new(Op::Const(ConstValue::Int(0))),
//!         Operation::new(Op::Return { kind: Some(SlotKind::Int) }),
//!     ],
//!     vec![],
//!     1,
//!     1,
//!     vec![],
//! );
//!
//! let graph = build_graph("Sample.zero", &body)?;
//! assert_eq!(graph.block_count(), 1);
//! assert_eq!(graph.entry(), graph.block_at(0).unwrap());
//! # Ok::<(), classflow::Error>(())
//! ```

mod block;
mod builder;
mod edge;
mod graph;

pub use block::{BasicBlock, BlockId};
pub use builder::build_graph;
pub use edge::{CaseKeys, CatchTypes, Edge, EdgeId, EdgeKind};
pub use graph::MethodGraph;
