//! The per-method analysis pipeline and the parallel batch driver.
//!
//! One call takes a [`MethodBody`] through all three stages: graph
//! construction, frame and type inference, structure recovery. The
//! stages share nothing across methods, so the batch driver simply
//! fans methods out over the rayon thread pool and collects per-method
//! results; one method failing hard never affects another.
//!
//! # Usage Examples
//!
//! ```rust
//! use classflow::{analyze_method, ConstValue, MethodBody, Op, Operation, SlotKind};
//!
//! let body = MethodBody::new(
//!     vec![
//!         Operation::new(Op::Const(ConstValue::Int(5))),
//!         Operation::new(Op::Return { kind: Some(SlotKind::Int) }),
//!     ],
//!     vec![],
//!     1,
//!     1,
//!     vec![],
//! );
//!
//! let analysis = analyze_method("Sample.five", &body)?;
//! assert_eq!(analysis.graph().block_count(), 1);
//! assert!(analysis.structure().is_empty());
//! assert_eq!(analysis.frames().op_types(0).unwrap().results.len(), 1);
//! # Ok::<(), classflow::Error>(())
//! ```

use dashmap::DashMap;
use rayon::prelude::*;

use crate::cfg::{build_graph, MethodGraph};
use crate::frame::{infer_frames, FrameAnalysis};
use crate::ir::MethodBody;
use crate::structure::{build_structure, StructTree};
use crate::Result;

/// Tuning knobs for one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Upper bound on interpreter worklist steps before the method is
    /// abandoned with [`Error::IterationLimit`](crate::Error::IterationLimit).
    pub max_interp_steps: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            max_interp_steps: 1 << 20,
        }
    }
}

/// Everything the middle end produces for one method.
#[derive(Debug)]
pub struct MethodAnalysis {
    graph: MethodGraph,
    frames: FrameAnalysis,
    structure: StructTree,
}

impl MethodAnalysis {
    /// The control flow graph, with postorder numbers, back-edge flags
    /// and per-block structure annotations.
    #[must_use]
    pub fn graph(&self) -> &MethodGraph {
        &self.graph
    }

    /// The register arena and per-PC operand annotations.
    #[must_use]
    pub fn frames(&self) -> &FrameAnalysis {
        &self.frames
    }

    /// The recovered structure tree.
    #[must_use]
    pub fn structure(&self) -> &StructTree {
        &self.structure
    }
}

/// Runs the full pipeline on one method with default options.
pub fn analyze_method(method: &str, body: &MethodBody) -> Result<MethodAnalysis> {
    analyze_method_with(method, body, &AnalysisOptions::default())
}

/// Runs the full pipeline on one method.
pub fn analyze_method_with(
    method: &str,
    body: &MethodBody,
    options: &AnalysisOptions,
) -> Result<MethodAnalysis> {
    let mut graph = build_graph(method, body)?;
    let frames = infer_frames(method, body, options.max_interp_steps)?;
    let structure = build_structure(method, &mut graph);
    Ok(MethodAnalysis {
        graph,
        frames,
        structure,
    })
}

/// Analyzes a batch of named methods in parallel with default options.
///
/// Every entry lands in the returned map; a method that fails hard is
/// its own `Err` and the batch always completes.
pub fn analyze_batch(methods: &[(String, MethodBody)]) -> DashMap<String, Result<MethodAnalysis>> {
    let results = DashMap::with_capacity(methods.len());
    methods.par_iter().for_each(|(name, body)| {
        let analysis = analyze_method(name, body);
        if let Err(error) = &analysis {
            log::warn!("{}: analysis failed: {}", name, error);
        }
        results.insert(name.clone(), analysis);
    });
    results
}
