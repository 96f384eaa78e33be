//! # classflow Prelude
//!
//! This module provides a convenient prelude for the most commonly used types
//! from the classflow library. Import this module to get quick access to the
//! essential types for method analysis.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all classflow operations
pub use crate::Error;

/// The result type used throughout classflow
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Per-method pipeline drivers and the parallel batch entry point
pub use crate::pipeline::{analyze_batch, analyze_method, analyze_method_with};

/// Tuning knobs and the bundled per-method result
pub use crate::pipeline::{AnalysisOptions, MethodAnalysis};

// ================================================================================================
// Input Model
// ================================================================================================

/// The per-method input container and its exception table entries
pub use crate::ir::{ExceptionEntry, MethodBody, Pc};

/// The decoded operation union and its operand enums
pub use crate::ir::{
    ArithOp, ArrayKind, BranchKind, CondOp, ConstValue, ConvTarget, FieldRef, InvokeKind,
    MethodRef, NumKind, Op, Operation, SlotKind, StackOp,
};

/// The value-type lattice used by the inference stage
pub use crate::ir::{PrimMask, RefType, ValueType};

// ================================================================================================
// Control Flow Graph
// ================================================================================================

/// Graph construction from a decoded method body
pub use crate::cfg::build_graph;

/// Blocks, edges and the per-method graph container
pub use crate::cfg::{BasicBlock, BlockId, CaseKeys, CatchTypes, Edge, EdgeId, EdgeKind, MethodGraph};

// ================================================================================================
// Frames and Registers
// ================================================================================================

/// Frame and type inference over one method
pub use crate::frame::infer_frames;

/// Inference results: frames, registers and per-PC operand annotations
pub use crate::frame::{Frame, FrameAnalysis, OpTypes, RegId, RegKind, Register, Registers};

/// Subroutine records matched from `jsr`/`ret` pairs
pub use crate::frame::{Sub, SubId};

// ================================================================================================
// Structure Recovery
// ================================================================================================

/// Structure recovery over a finished graph
pub use crate::structure::build_structure;

/// The recovered structure tree and its node types
pub use crate::structure::{
    BranchKey, CondKind, LoopKind, Struct, StructId, StructKind, StructTree, SwitchKind,
};
