// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![allow(dead_code)]

//! # classflow
//!
//! [![Crates.io](https://img.shields.io/crates/v/classflow.svg)](https://crates.io/crates/classflow)
//! [![Documentation](https://docs.rs/classflow/badge.svg)](https://docs.rs/classflow)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://opensource.org/licenses/Apache-2.0)
//!
//! The middle end of a JVM bytecode decompiler. `classflow` takes the decoded
//! operation stream of one method and recovers everything a statement
//! synthesizer needs: a control flow graph of basic blocks, inferred types for
//! every stack slot and local variable, and a tree of nested conditionals,
//! loops and switches.
//!
//! ## Features
//!
//! - **Control flow recovery** - Basic blocks with classified edges, postorder
//!   numbering and back-edge detection
//! - **Type inference without debug info** - An abstract interpreter assigns a
//!   typed register to every operand and return value, merging and narrowing
//!   across joins until a fixpoint
//! - **Structure recovery** - Conditionals, pre/post-test loops and switches
//!   reported as a nested tree with branch membership and follow blocks
//! - **Subroutine support** - `jsr`/`ret` pairs are matched and their frame
//!   effects threaded through call sites
//! - **Parallel batch analysis** - Methods are independent, so whole classes
//!   fan out over a thread pool with per-method failure isolation
//!
//! ## Quick Start
//!
//! Add `classflow` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! classflow = "0.2"
//! ```
//!
//! ### Using the Prelude
//!
//! For convenient access to the most commonly used types, import the prelude:
//!
//! ```rust
//! use classflow::prelude::*;
//!
//! // int two() { return 2; }
//! let body = MethodBody::new(
//!     vec![
//!         Operation::new(Op::Const(ConstValue::Int(2))),
//!         Operation::new(Op::Return { kind: Some(SlotKind::Int) }),
//!     ],
//!     vec![],
//!     0,
//!     1,
//!     vec![],
//! );
//!
//! let analysis = analyze_method("Sample.two", &body)?;
//! assert_eq!(analysis.graph().block_count(), 1);
//! # Ok::<(), classflow::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `classflow` is organized as a three-stage pipeline over a shared input
//! model:
//!
//! - [`ir`] - Decoded operations, method bodies and the value-type lattice
//! - [`cfg`] - Basic-block discovery and the [`cfg::MethodGraph`]
//! - [`frame`] - The worklist interpreter and the register arena
//! - [`structure`] - The structuring sweep and the [`structure::StructTree`]
//! - [`pipeline`] - Per-method driver and the parallel batch entry point
//! - [`Error`] and [`Result`] - Error handling shared by all stages
//!
//! The stages run strictly in order: [`cfg::build_graph`] first,
//! [`frame::infer_frames`] on the same body, then
//! [`structure::build_structure`] over the finished graph.
//! [`analyze_method`] packages the sequence; [`analyze_batch`] runs it over
//! many methods at once.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Malformed input is
//! rejected with a located error rather than a panic, and one unanalyzable
//! method never poisons a batch:
//!
//! ```rust
//! use classflow::{analyze_method, Error, MethodBody};
//!
//! // A method with no operations has no entry block.
//! let body = MethodBody::new(vec![], vec![], 0, 0, vec![]);
//! match analyze_method("Sample.empty", &body) {
//!     Err(Error::Malformed { message, .. }) => println!("rejected: {}", message),
//!     other => panic!("expected a malformed error, got {:?}", other.is_ok()),
//! }
//! ```

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// This module provides a curated selection of the most frequently used types
/// from across the classflow library, allowing for convenient glob imports.
///
/// # Example
///
/// ```rust
/// use classflow::prelude::*;
///
/// let body = MethodBody::new(
///     vec![Operation::new(Op::Return { kind: None })],
///     vec![],
///     0,
///     0,
///     vec![],
/// );
/// let analysis = analyze_method("Sample.noop", &body)?;
/// assert!(analysis.structure().is_empty());
/// # Ok::<(), classflow::Error>(())
/// ```
pub mod prelude;

/// Input model: decoded operations, method bodies and the value-type lattice.
///
/// The upstream bytecode decoder produces a [`MethodBody`] per method: a flat,
/// PC-addressed array of [`Operation`]s plus exception table, slot count and
/// parameter types. Nothing in this module is computed; it is the immutable
/// contract the three analysis stages consume.
///
/// # Key Types
///
/// - [`Op`] - The closed union of decoded operations
/// - [`ir::ValueType`] - The inference lattice over primitives and references
/// - [`ir::descriptor`] - Field and method descriptor parsing
pub mod ir;

/// Basic-block discovery and the per-method control flow graph.
///
/// [`cfg::build_graph`] carves the operation stream into [`cfg::BasicBlock`]s,
/// connects them with kind-tagged [`cfg::Edge`]s (branches, switch cases,
/// exception dispatch, subroutine calls), numbers the blocks in DFS postorder
/// and flags back edges. The resulting [`cfg::MethodGraph`] is the substrate
/// both later stages annotate.
///
/// # Examples
///
/// ```rust
/// use classflow::cfg::build_graph;
/// use classflow::{ConstValue, MethodBody, Op, Operation, SlotKind};
///
/// let body = MethodBody::new(
///     vec![
///         Operation::new(Op::Const(ConstValue::Int(7))),
///         Operation::new(Op::Return { kind: Some(SlotKind::Int) }),
///     ],
///     vec![],
///     0,
///     1,
///     vec![],
/// );
/// let graph = build_graph("Sample.seven", &body)?;
/// assert_eq!(graph.block_count(), 1);
/// # Ok::<(), classflow::Error>(())
/// ```
pub mod cfg;

/// Frame and type inference over the operation stream.
///
/// A worklist interpreter pushes abstract [`frame::Frame`]s through every
/// reachable operation, allocating a typed register per produced value and
/// merging frames where control joins. After the fixpoint every operand and
/// result of every reachable PC is annotated with a register whose type has
/// been narrowed as far as the method's uses allow.
pub mod frame;

/// Structure recovery: conditionals, loops and switches as a nested tree.
///
/// [`structure::build_structure`] sweeps the finished graph in descending
/// postorder and classifies every branching block into a
/// [`structure::Struct`], claiming member blocks for the innermost enclosing
/// structure. The sweep never fails a method; shapes it cannot prove are
/// reported best-effort and logged.
pub mod structure;

/// The per-method analysis pipeline and the parallel batch driver.
///
/// [`analyze_method`] runs graph construction, frame inference and structure
/// recovery in order and bundles the results into a [`MethodAnalysis`].
/// [`analyze_batch`] fans a slice of named methods out over the rayon thread
/// pool.
pub mod pipeline;

/// `classflow` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is
/// always [`Error`]. This is used consistently throughout the crate for all
/// fallible operations.
///
/// # Examples
///
/// ```rust,no_run
/// use classflow::{analyze_method, MethodAnalysis, MethodBody, Result};
///
/// fn analyze(name: &str, body: &MethodBody) -> Result<MethodAnalysis> {
///     analyze_method(name, body)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `classflow` Error type
///
/// The main error type for all operations in this crate. Provides detailed
/// error information for malformed input, type conflicts, stack discipline
/// violations and interpreter divergence.
///
/// # Examples
///
/// ```rust
/// use classflow::{analyze_method, Error, MethodBody};
///
/// let body = MethodBody::new(vec![], vec![], 0, 0, vec![]);
/// match analyze_method("Sample.empty", &body) {
///     Err(Error::Malformed { .. }) => {}
///     other => panic!("expected a malformed error, got {:?}", other.is_ok()),
/// }
/// ```
pub use error::Error;

/// The decoded input model, re-exported for convenient construction.
///
/// These are the types the upstream decoder hands in: the method container,
/// the operation union and the enums its variants carry.
pub use ir::{BranchKind, CondOp, ConstValue, MethodBody, Op, Operation, SlotKind};

/// Main entry points for running the analysis pipeline.
///
/// See [`pipeline`] for the stage-by-stage description.
///
/// # Example
///
/// ```rust
/// use classflow::{analyze_method, MethodBody, Op, Operation};
///
/// let body = MethodBody::new(
///     vec![Operation::new(Op::Return { kind: None })],
///     vec![],
///     0,
///     0,
///     vec![],
/// );
/// let analysis = analyze_method("Sample.noop", &body)?;
/// assert_eq!(analysis.graph().block_count(), 1);
/// # Ok::<(), classflow::Error>(())
/// ```
pub use pipeline::{analyze_batch, analyze_method, analyze_method_with, AnalysisOptions, MethodAnalysis};
