//! Frame and register type inference.
//!
//! The second analysis stage: an abstract interpreter walks the operation
//! stream and reconstructs, for every reachable PC, the state of the JVM
//! frame at that point. Values are tracked as provenance [`Register`]s in a
//! per-method arena rather than raw types, so a consumer can follow any
//! operand back through copies and join points to the operations that
//! produced it.
//!
//! # Key Components
//!
//! - [`infer_frames`] - runs inference for one method
//! - [`FrameAnalysis`] - the per-method result: registers, frames, per-op
//!   annotations and discovered subroutines
//! - [`Frame`] - locals, operand stack and active subroutine contexts at
//!   one PC
//! - [`Register`] / [`Registers`] - provenance records and their arena
//! - [`Sub`] - a `jsr`/`ret` subroutine context
//!
//! # Architecture
//!
//! Inference is a FIFO worklist over PCs. Each step clones the frame stored
//! at a PC, applies that operation's transfer rule and hands the result to
//! every successor, where it either lands verbatim (first visit) or is
//! merged slot by slot with the state already there. Distinct registers
//! meeting in a slot produce a [`RegKind::Merge`] register; typed reads
//! narrow a register's candidate set and push that constraint back through
//! its merge and copy sources. The loop runs to a fixpoint; re-running it
//! on a settled method changes nothing.
//!
//! # Usage Examples
//!
//! ```rust
//! use classflow::frame::infer_frames;
//! use classflow::{AnalysisOptions, MethodBody, Operation, Op, ConstValue, SlotKind};
//!
//! // int five() { return 5; }
//! let body = MethodBody::new(
//!     vec![
//!         Operation::new(Op::Const(ConstValue::Int(5))),
//!         Operation::new(Op::Return { kind: Some(SlotKind::Int) }),
//!     ],
//!     vec![],
//!     0,
//!     1,
//!     vec![],
//! );
//! let analysis = infer_frames(
//!     "Sample.five",
//!     &body,
//!     AnalysisOptions::default().max_interp_steps,
//! )?;
//!
//! // The return consumes the constant pushed at PC 0.
//! let register = analysis.op_types(1).unwrap().inputs[0];
//! assert_eq!(analysis.registers().get(register).pc(), 0);
//! # Ok::<(), classflow::Error>(())
//! ```

mod frame;
mod interp;
mod register;
mod sub;

pub use frame::Frame;
pub use interp::{infer_frames, FrameAnalysis, OpTypes};
pub use register::{RegId, RegKind, Register, Registers};
pub use sub::{Sub, SubId};
