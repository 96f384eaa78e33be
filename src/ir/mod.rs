//! Input model: decoded operations, method bodies and the value-type lattice.
//!
//! This module is the contract between the out-of-scope bytecode decoder and
//! the analysis stages. It deliberately contains no analysis logic: the
//! [`MethodBody`] handed in by the decoder is immutable, and everything the
//! graph builder, frame engine and structuring engine compute lives in their
//! own layers.
//!
//! # Key Components
//!
//! - [`Op`] / [`Operation`] - the closed operation union ([`ops`])
//! - [`MethodBody`] / [`ExceptionEntry`] - per-method input ([`method`])
//! - [`ValueType`] / [`PrimMask`] - the inference lattice ([`types`])
//! - [`descriptor`] - field/method descriptor parsing
//!
//! # Usage Examples
//!
//! ```rust
//! use classflow::{MethodBody, Operation, Op, ConstValue, SlotKind};
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
//! assert_eq!(body.len(), 2);
//! ```

pub mod descriptor;
pub mod method;
pub mod ops;
pub mod types;

/// A program counter: a zero-based index into a method's operation array.
pub type Pc = usize;

pub use method::{ExceptionEntry, MethodBody};
pub use ops::{
    ArithOp, ArrayKind, BranchKind, CondOp, ConstValue, ConvTarget, FieldRef, InvokeKind,
    MethodRef, NumKind, Op, Operation, SlotKind, StackOp,
};
pub use types::{Demand, PrimMask, RefType, ValueType};
