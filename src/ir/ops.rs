//! Operation records: the decoded, PC-addressed instruction model.
//!
//! The upstream decoder turns the raw bytecode of one method into a flat
//! `Vec<Operation>`; this module defines that contract. [`Op`] is a closed
//! tagged union over opcode *categories* rather than raw opcodes: the 200-odd
//! JVM opcodes collapse onto a few dozen variants with typed payloads
//! (`iload_0`, `iload 5` and `wide iload 300` are all `Load { slot, kind:
//! SlotKind::Int }`). Every consumer matches exhaustively; opcodes the
//! decoder does not understand arrive as [`Op::Unsupported`] and take a
//! compile-time-checked arm instead of an error-prone catch-all.
//!
//! PCs are zero-based indices into the operation array, and branch targets
//! are PCs of the same method. Member references carry owner, name and
//! descriptor strings; nothing here is resolved against a class path.

use std::sync::Arc;

use crate::ir::Pc;

/// One decoded operation with its optional advisory source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// The operation itself.
    pub op: Op,
    /// Source line from the line-number table, if present. Advisory only;
    /// never affects control or type semantics.
    pub line: Option<u32>,
}

impl Operation {
    /// Wraps an [`Op`] without line information.
    #[must_use]
    pub const fn new(op: Op) -> Self {
        Operation { op, line: None }
    }

    /// Wraps an [`Op`] with a source line.
    #[must_use]
    pub const fn with_line(op: Op, line: u32) -> Self {
        Operation {
            op,
            line: Some(line),
        }
    }
}

/// A constant pushed by a constant-pool or immediate instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    /// `iconst_*`, `bipush`, `sipush`, integer `ldc`.
    Int(i32),
    /// `lconst_*`, long `ldc2_w`.
    Long(i64),
    /// `fconst_*`, float `ldc`.
    Float(f32),
    /// `dconst_*`, double `ldc2_w`.
    Double(f64),
    /// String `ldc`.
    Str(Arc<str>),
    /// Class-literal `ldc` (internal-form name).
    Class(Arc<str>),
    /// `aconst_null`.
    Null,
}

/// Reference to a field, by name and descriptor only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    /// Declaring class, internal form.
    pub owner: Arc<str>,
    /// Field name.
    pub name: Arc<str>,
    /// Field descriptor, e.g. `I` or `Ljava/lang/String;`.
    pub descriptor: Arc<str>,
}

/// Reference to a method, by name and descriptor only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    /// Declaring class or interface, internal form.
    pub owner: Arc<str>,
    /// Method name.
    pub name: Arc<str>,
    /// Method descriptor, e.g. `(IJ)V`.
    pub descriptor: Arc<str>,
}

/// Invocation dispatch kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    /// `invokevirtual`
    Virtual,
    /// `invokestatic`
    Static,
    /// `invokespecial`
    Special,
    /// `invokeinterface`
    Interface,
}

impl InvokeKind {
    /// Whether the invocation pops a receiver before the arguments.
    #[must_use]
    pub const fn has_receiver(&self) -> bool {
        !matches!(self, InvokeKind::Static)
    }
}

/// The four computational types instructions are specialized on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum NumKind {
    /// `i*` instructions
    Int,
    /// `l*` instructions
    Long,
    /// `f*` instructions
    Float,
    /// `d*` instructions
    Double,
}

/// Slot type of a local load/store or a typed return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SlotKind {
    /// `iload`/`istore`/`ireturn` family
    Int,
    /// `lload` family
    Long,
    /// `fload` family
    Float,
    /// `dload` family
    Double,
    /// `aload` family
    Ref,
}

/// Binary/unary arithmetic and logic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// `add`
    Add,
    /// `sub`
    Sub,
    /// `mul`
    Mul,
    /// `div`
    Div,
    /// `rem`
    Rem,
    /// `neg` (unary)
    Neg,
    /// `shl` (shift distance is always int)
    Shl,
    /// `shr`
    Shr,
    /// `ushr`
    Ushr,
    /// `and`
    And,
    /// `or`
    Or,
    /// `xor`
    Xor,
}

impl ArithOp {
    /// Whether the operator pops a single operand.
    #[must_use]
    pub const fn is_unary(&self) -> bool {
        matches!(self, ArithOp::Neg)
    }

    /// Whether the second operand is an int shift distance regardless of
    /// the operator's computational type.
    #[must_use]
    pub const fn is_shift(&self) -> bool {
        matches!(self, ArithOp::Shl | ArithOp::Shr | ArithOp::Ushr)
    }
}

/// Destination of a primitive conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvTarget {
    /// `*2i`
    Int,
    /// `*2l`
    Long,
    /// `*2f`
    Float,
    /// `*2d`
    Double,
    /// `i2b`
    Byte,
    /// `i2c`
    Char,
    /// `i2s`
    Short,
}

/// Relation tested by a conditional branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondOp {
    /// `eq`
    Eq,
    /// `ne`
    Ne,
    /// `lt`
    Lt,
    /// `ge`
    Ge,
    /// `gt`
    Gt,
    /// `le`
    Le,
}

/// Operand shape of a two-way branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    /// `ifeq` .. `ifle`: one int-family operand compared against zero.
    IntZero(CondOp),
    /// `if_icmpeq` .. `if_icmple`: two int-family operands.
    IntCmp(CondOp),
    /// `if_acmpeq`/`if_acmpne`: two reference operands; `true` for `eq`.
    RefCmp(bool),
    /// `ifnull`/`ifnonnull`: one reference operand; `true` for `ifnull`.
    RefNull(bool),
}

/// Element type of an array access instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    /// `iaload`/`iastore`
    Int,
    /// `laload`/`lastore`
    Long,
    /// `faload`/`fastore`
    Float,
    /// `daload`/`dastore`
    Double,
    /// `aaload`/`aastore`
    Ref,
    /// `baload`/`bastore` (covers both `byte[]` and `boolean[]`)
    Byte,
    /// `caload`/`castore`
    Char,
    /// `saload`/`sastore`
    Short,
}

/// Pure operand-stack shuffles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter)]
pub enum StackOp {
    /// `pop`
    Pop,
    /// `pop2` (one wide value or two narrow ones)
    Pop2,
    /// `dup`
    Dup,
    /// `dup_x1`
    DupX1,
    /// `dup_x2`
    DupX2,
    /// `dup2`
    Dup2,
    /// `dup2_x1`
    Dup2X1,
    /// `dup2_x2`
    Dup2X2,
    /// `swap`
    Swap,
}

/// One decoded operation.
///
/// Variants are grouped by concern; the payloads carry everything the
/// type-transfer and control-transfer rules need.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Push a constant.
    Const(ConstValue),
    /// Load a local slot onto the stack.
    Load {
        /// Local slot index.
        slot: usize,
        /// Declared load type.
        kind: SlotKind,
    },
    /// Pop into a local slot. An `astore` also accepts a subroutine
    /// return address.
    Store {
        /// Local slot index.
        slot: usize,
        /// Declared store type.
        kind: SlotKind,
    },
    /// `iinc`: in-place increment of an int local, no stack effect.
    Iinc {
        /// Local slot index.
        slot: usize,
        /// Signed increment.
        delta: i32,
    },
    /// Arithmetic or logic on one computational type.
    Arith {
        /// Operator.
        op: ArithOp,
        /// Computational type of the operands.
        kind: NumKind,
    },
    /// `lcmp`/`fcmpl`/`fcmpg`/`dcmpl`/`dcmpg`: pops two, pushes an int.
    Compare {
        /// Computational type of the operands.
        kind: NumKind,
    },
    /// Primitive conversion.
    Convert {
        /// Operand's computational type.
        from: NumKind,
        /// Conversion destination.
        to: ConvTarget,
    },
    /// `getstatic`/`getfield`.
    GetField {
        /// The referenced field.
        field: FieldRef,
        /// `true` for `getstatic` (no receiver popped).
        is_static: bool,
    },
    /// `putstatic`/`putfield`.
    PutField {
        /// The referenced field.
        field: FieldRef,
        /// `true` for `putstatic` (no receiver popped).
        is_static: bool,
    },
    /// Typed array element load; pops array reference and index.
    ArrayLoad {
        /// Element type.
        kind: ArrayKind,
    },
    /// Typed array element store; pops array reference, index and value.
    ArrayStore {
        /// Element type.
        kind: ArrayKind,
    },
    /// `arraylength`.
    ArrayLength,
    /// `new`: push an uninitialized instance reference.
    New {
        /// Class to instantiate, internal form.
        class: Arc<str>,
    },
    /// `newarray`/`anewarray`: pops the length, pushes the array.
    NewArray {
        /// Full array descriptor, e.g. `[I` or `[Ljava/lang/String;`.
        descriptor: Arc<str>,
    },
    /// `multianewarray`: pops `dims` lengths, pushes the array.
    MultiNewArray {
        /// Full array descriptor.
        descriptor: Arc<str>,
        /// Number of dimensions popped.
        dims: u8,
    },
    /// Method invocation; pops arguments (and receiver), pushes the
    /// return value unless the descriptor returns `V`.
    Invoke {
        /// The referenced method.
        method: MethodRef,
        /// Dispatch kind.
        kind: InvokeKind,
    },
    /// Two-way conditional branch; falls through on the false outcome.
    Branch {
        /// Operand shape and relation.
        kind: BranchKind,
        /// Branch-taken target PC.
        target: Pc,
    },
    /// Unconditional jump.
    Goto {
        /// Target PC.
        target: Pc,
    },
    /// `tableswitch`/`lookupswitch`, collapsed to explicit pairs.
    Switch {
        /// `(key, target)` pairs.
        cases: Vec<(i32, Pc)>,
        /// Default target. `None` marks a decode gap and fails the
        /// method's graph construction.
        default: Option<Pc>,
    },
    /// Typed or void return.
    Return {
        /// `None` for `return`, the value type otherwise.
        kind: Option<SlotKind>,
    },
    /// `athrow`.
    Throw,
    /// `monitorenter`.
    MonitorEnter,
    /// `monitorexit`.
    MonitorExit,
    /// `jsr`/`jsr_w`: push a return address, jump to the subroutine.
    Jsr {
        /// Subroutine entry PC.
        target: Pc,
    },
    /// `ret`: return through the address stored in a local slot.
    Ret {
        /// Local slot holding the return address.
        slot: usize,
    },
    /// `checkcast`: the popped reference is re-pushed as the named type.
    CheckCast {
        /// Asserted type, internal form.
        class: Arc<str>,
    },
    /// `instanceof`: pops a reference, pushes an int/boolean result.
    InstanceOf {
        /// Tested type, internal form.
        class: Arc<str>,
    },
    /// Pure stack shuffle.
    Stack(StackOp),
    /// `nop`.
    Nop,
    /// An opcode the decoder could not classify. Fails graph
    /// construction for the enclosing method.
    Unsupported {
        /// The raw opcode byte (or `0xc4`-prefixed wide form).
        opcode: u16,
    },
}

impl Op {
    /// Whether control never continues at the following PC.
    ///
    /// Conditional branches and `jsr` are *not* terminators: a branch
    /// falls through on the false outcome, and the PC after a `jsr` is
    /// the subroutine's return continuation.
    #[must_use]
    pub const fn is_terminator(&self) -> bool {
        matches!(
            self,
            Op::Goto { .. }
                | Op::Switch { .. }
                | Op::Return { .. }
                | Op::Throw
                | Op::Ret { .. }
                | Op::Unsupported { .. }
        )
    }

    /// Whether this operation ends its basic block.
    #[must_use]
    pub const fn is_block_end(&self) -> bool {
        self.is_terminator() || matches!(self, Op::Branch { .. } | Op::Jsr { .. })
    }
}
