use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every failure is scoped to the single method whose analysis raised it; the batch driver
/// catches these per method and continues with the rest. Each variant carries enough context
/// (usually the program counter involved) to attribute the failure precisely.
///
/// # Error Categories
///
/// ## Malformed Input
/// - [`Error::Malformed`] - Operation stream or exception table violates the input contract
///
/// ## Data-Flow Errors
/// - [`Error::TypeConflict`] - A value was read with a type incompatible with its inferred type
/// - [`Error::StackUnderflow`] - An operation popped from an empty operand stack
/// - [`Error::StackDepthMismatch`] - Operand stacks of different depth met at a join point
/// - [`Error::UndefinedSlot`] - A local slot was read before any definition reached it
/// - [`Error::SubroutineViolation`] - Recursive subroutine entry or call-site disagreement
/// - [`Error::IterationLimit`] - The inference worklist exceeded its configured step bound
///
/// ## Graph Errors
/// - [`Error::GraphError`] - Inconsistent block/edge state detected during construction
///
/// # Examples
///
/// ```rust
/// use classflow::{analyze_method, Error, MethodBody};
///
/// let body = MethodBody::new(vec![], vec![], 0, 0, vec![]);
/// match analyze_method("Sample.empty", &body) {
///     Ok(analysis) => {
///         println!("{} blocks", analysis.graph().block_count());
///     }
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("malformed input: {} ({}:{})", message, file, line);
///     }
///     Err(e) => {
///         eprintln!("analysis failed: {}", e);
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The operation stream is damaged and could not be analyzed.
    ///
    /// This error indicates that the method input does not conform to the
    /// expected contract: a branch target outside the PC range, a switch
    /// without a default target, an unsupported opcode, or an exception
    /// table entry with inverted bounds. The error includes the source
    /// location where the malformation was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A value was read with a type its provenance cannot satisfy.
    ///
    /// Raised when narrowing a register's candidate type set against the
    /// type demanded by a reading operation leaves the set empty, for
    /// example reading a `returnAddress` register as an integer.
    #[error("Type conflict at pc {pc}: {message}")]
    TypeConflict {
        /// Program counter of the reading operation
        pc: usize,
        /// What was demanded and what the register could provide
        message: String,
    },

    /// An operation required more operand-stack entries than were present.
    #[error("Operand stack underflow at pc {0}")]
    StackUnderflow(usize),

    /// Two frames with different operand-stack depths met at a join point.
    ///
    /// Verified bytecode keeps the stack depth a pure function of the
    /// program counter; a mismatch means the input was never verifiable
    /// and inference cannot continue for this method.
    #[error("Operand stack depth mismatch at pc {0}")]
    StackDepthMismatch(usize),

    /// A local slot was read before any definition reached it.
    ///
    /// Also raised for the poisoned upper half of a long/double pair and
    /// for slots whose incoming types were irreconcilable at a join.
    #[error("Read of undefined local slot {slot} at pc {pc}")]
    UndefinedSlot {
        /// Program counter of the reading operation
        pc: usize,
        /// Index of the local slot
        slot: usize,
    },

    /// Subroutine call/return discipline was violated.
    ///
    /// Covers recursive entry into a subroutine that is already on the
    /// frame's subroutine stack, a `ret` with no matching subroutine, and
    /// call sites that disagree on the operand-stack depth at entry.
    #[error("Subroutine violation at pc {pc}: {message}")]
    SubroutineViolation {
        /// Program counter of the offending call or return
        pc: usize,
        /// Description of the violated rule
        message: String,
    },

    /// Inference worklist exceeded its configured step bound.
    ///
    /// The fixpoint is finite by construction; this limit exists as a
    /// safety valve for pathological inputs. The associated value is the
    /// bound that was hit.
    #[error("Frame inference exceeded {0} worklist steps")]
    IterationLimit(usize),

    /// Inconsistent block or edge state.
    ///
    /// Raised when graph construction observes a state that violates its
    /// own invariants, such as an edge retarget for a block that was never
    /// split. Indicates a bug rather than bad input.
    #[error("{0}")]
    GraphError(String),
}
