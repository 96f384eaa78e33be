//! Shared test support: a tiny method assembler.
//!
//! Unit and integration tests describe methods as chained op sequences
//! instead of hand-written `Vec<Operation>` literals. The assembler infers
//! `max_locals` from the slots it sees and leaves semantic checking to the
//! analysis under test.

use std::sync::Arc;

use crate::ir::{
    ArithOp, ArrayKind, BranchKind, CondOp, ConstValue, ConvTarget, ExceptionEntry, FieldRef,
    InvokeKind, MethodBody, MethodRef, NumKind, Op, Operation, Pc, SlotKind, StackOp, ValueType,
};

/// Chained builder producing a [`MethodBody`] for tests.
///
/// ```rust,ignore
/// // int half(int x) { return x / 2; }
/// let body = MethodAssembler::new()
///     .params_desc("(I)I", true)
///     .iload(1)
///     .iconst(2)
///     .arith(ArithOp::Div, NumKind::Int)
///     .ireturn()
///     .body();
/// ```
#[derive(Default)]
pub struct MethodAssembler {
    ops: Vec<Operation>,
    exceptions: Vec<ExceptionEntry>,
    params: Vec<ValueType>,
    max_locals: Option<usize>,
    max_stack: Option<usize>,
    highest_slot: usize,
}

impl MethodAssembler {
    pub fn new() -> Self {
        MethodAssembler::default()
    }

    /// Appends a raw operation.
    pub fn op(mut self, op: Op) -> Self {
        self.ops.push(Operation::new(op));
        self
    }

    /// Attaches a source line to the most recent operation.
    pub fn line(mut self, line: u32) -> Self {
        if let Some(last) = self.ops.last_mut() {
            last.line = Some(line);
        }
        self
    }

    /// Sets the leading local slot types from a method descriptor.
    /// `instance` prepends a receiver slot typed `java/lang/Object`.
    pub fn params_desc(mut self, descriptor: &str, instance: bool) -> Self {
        let (types, _) =
            crate::ir::descriptor::parse_method_descriptor(descriptor).expect("descriptor");
        let mut params = Vec::new();
        if instance {
            params.push(ValueType::Ref(crate::ir::RefType::object(
                ValueType::OBJECT,
            )));
        }
        for ty in types {
            let wide = ty.is_wide();
            params.push(ty);
            if wide {
                // Filler for the second slot of a wide parameter.
                params.push(ValueType::int());
            }
        }
        self.params = params;
        self
    }

    pub fn max_locals(mut self, n: usize) -> Self {
        self.max_locals = Some(n);
        self
    }

    pub fn max_stack(mut self, n: usize) -> Self {
        self.max_stack = Some(n);
        self
    }

    pub fn catch(mut self, start: Pc, end: Pc, handler: Pc, class: &str) -> Self {
        self.exceptions
            .push(ExceptionEntry::catching(start, end, handler, class));
        self
    }

    pub fn finally(mut self, start: Pc, end: Pc, handler: Pc) -> Self {
        self.exceptions
            .push(ExceptionEntry::finally(start, end, handler));
        self
    }

    // ---- constants ----

    pub fn iconst(self, value: i32) -> Self {
        self.op(Op::Const(ConstValue::Int(value)))
    }

    pub fn lconst(self, value: i64) -> Self {
        self.op(Op::Const(ConstValue::Long(value)))
    }

    pub fn fconst(self, value: f32) -> Self {
        self.op(Op::Const(ConstValue::Float(value)))
    }

    pub fn ldc_str(self, value: &str) -> Self {
        self.op(Op::Const(ConstValue::Str(Arc::from(value))))
    }

    pub fn aconst_null(self) -> Self {
        self.op(Op::Const(ConstValue::Null))
    }

    // ---- locals ----

    fn track_slot(&mut self, slot: usize, wide: bool) {
        self.highest_slot = self.highest_slot.max(slot + usize::from(wide));
    }

    pub fn load(mut self, slot: usize, kind: SlotKind) -> Self {
        self.track_slot(slot, matches!(kind, SlotKind::Long | SlotKind::Double));
        self.op(Op::Load { slot, kind })
    }

    pub fn store(mut self, slot: usize, kind: SlotKind) -> Self {
        self.track_slot(slot, matches!(kind, SlotKind::Long | SlotKind::Double));
        self.op(Op::Store { slot, kind })
    }

    pub fn iload(self, slot: usize) -> Self {
        self.load(slot, SlotKind::Int)
    }

    pub fn istore(self, slot: usize) -> Self {
        self.store(slot, SlotKind::Int)
    }

    pub fn aload(self, slot: usize) -> Self {
        self.load(slot, SlotKind::Ref)
    }

    pub fn astore(self, slot: usize) -> Self {
        self.store(slot, SlotKind::Ref)
    }

    pub fn lload(self, slot: usize) -> Self {
        self.load(slot, SlotKind::Long)
    }

    pub fn lstore(self, slot: usize) -> Self {
        self.store(slot, SlotKind::Long)
    }

    pub fn iinc(mut self, slot: usize, delta: i32) -> Self {
        self.track_slot(slot, false);
        self.op(Op::Iinc { slot, delta })
    }

    // ---- arithmetic and conversion ----

    pub fn arith(self, op: ArithOp, kind: NumKind) -> Self {
        self.op(Op::Arith { op, kind })
    }

    pub fn iadd(self) -> Self {
        self.arith(ArithOp::Add, NumKind::Int)
    }

    pub fn isub(self) -> Self {
        self.arith(ArithOp::Sub, NumKind::Int)
    }

    pub fn ixor(self) -> Self {
        self.arith(ArithOp::Xor, NumKind::Int)
    }

    pub fn lcmp(self) -> Self {
        self.op(Op::Compare {
            kind: NumKind::Long,
        })
    }

    pub fn convert(self, from: NumKind, to: ConvTarget) -> Self {
        self.op(Op::Convert { from, to })
    }

    // ---- fields and calls ----

    fn field(owner: &str, name: &str, descriptor: &str) -> FieldRef {
        FieldRef {
            owner: Arc::from(owner),
            name: Arc::from(name),
            descriptor: Arc::from(descriptor),
        }
    }

    fn method(owner: &str, name: &str, descriptor: &str) -> MethodRef {
        MethodRef {
            owner: Arc::from(owner),
            name: Arc::from(name),
            descriptor: Arc::from(descriptor),
        }
    }

    pub fn getstatic(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.op(Op::GetField {
            field: Self::field(owner, name, descriptor),
            is_static: true,
        })
    }

    pub fn getfield(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.op(Op::GetField {
            field: Self::field(owner, name, descriptor),
            is_static: false,
        })
    }

    pub fn putstatic(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.op(Op::PutField {
            field: Self::field(owner, name, descriptor),
            is_static: true,
        })
    }

    pub fn putfield(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.op(Op::PutField {
            field: Self::field(owner, name, descriptor),
            is_static: false,
        })
    }

    pub fn invoke_static(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.op(Op::Invoke {
            method: Self::method(owner, name, descriptor),
            kind: InvokeKind::Static,
        })
    }

    pub fn invoke_virtual(self, owner: &str, name: &str, descriptor: &str) -> Self {
        self.op(Op::Invoke {
            method: Self::method(owner, name, descriptor),
            kind: InvokeKind::Virtual,
        })
    }

    // ---- arrays and objects ----

    pub fn newarray(self, descriptor: &str) -> Self {
        self.op(Op::NewArray {
            descriptor: Arc::from(descriptor),
        })
    }

    pub fn array_load(self, kind: ArrayKind) -> Self {
        self.op(Op::ArrayLoad { kind })
    }

    pub fn array_store(self, kind: ArrayKind) -> Self {
        self.op(Op::ArrayStore { kind })
    }

    pub fn arraylength(self) -> Self {
        self.op(Op::ArrayLength)
    }

    pub fn new_object(self, class: &str) -> Self {
        self.op(Op::New {
            class: Arc::from(class),
        })
    }

    pub fn checkcast(self, class: &str) -> Self {
        self.op(Op::CheckCast {
            class: Arc::from(class),
        })
    }

    // ---- control transfer ----

    pub fn branch(self, kind: BranchKind, target: Pc) -> Self {
        self.op(Op::Branch { kind, target })
    }

    pub fn ifeq(self, target: Pc) -> Self {
        self.branch(BranchKind::IntZero(CondOp::Eq), target)
    }

    pub fn ifne(self, target: Pc) -> Self {
        self.branch(BranchKind::IntZero(CondOp::Ne), target)
    }

    pub fn ifge(self, target: Pc) -> Self {
        self.branch(BranchKind::IntZero(CondOp::Ge), target)
    }

    pub fn if_icmplt(self, target: Pc) -> Self {
        self.branch(BranchKind::IntCmp(CondOp::Lt), target)
    }

    pub fn if_icmpge(self, target: Pc) -> Self {
        self.branch(BranchKind::IntCmp(CondOp::Ge), target)
    }

    pub fn ifnull(self, target: Pc) -> Self {
        self.branch(BranchKind::RefNull(true), target)
    }

    pub fn goto(self, target: Pc) -> Self {
        self.op(Op::Goto { target })
    }

    pub fn switch(self, cases: &[(i32, Pc)], default: Pc) -> Self {
        self.op(Op::Switch {
            cases: cases.to_vec(),
            default: Some(default),
        })
    }

    pub fn switch_no_default(self, cases: &[(i32, Pc)]) -> Self {
        self.op(Op::Switch {
            cases: cases.to_vec(),
            default: None,
        })
    }

    pub fn jsr(self, target: Pc) -> Self {
        self.op(Op::Jsr { target })
    }

    pub fn ret(mut self, slot: usize) -> Self {
        self.track_slot(slot, false);
        self.op(Op::Ret { slot })
    }

    pub fn ireturn(self) -> Self {
        self.op(Op::Return {
            kind: Some(SlotKind::Int),
        })
    }

    pub fn areturn(self) -> Self {
        self.op(Op::Return {
            kind: Some(SlotKind::Ref),
        })
    }

    pub fn vreturn(self) -> Self {
        self.op(Op::Return { kind: None })
    }

    pub fn athrow(self) -> Self {
        self.op(Op::Throw)
    }

    // ---- stack and misc ----

    pub fn stack(self, op: StackOp) -> Self {
        self.op(Op::Stack(op))
    }

    pub fn dup(self) -> Self {
        self.stack(StackOp::Dup)
    }

    pub fn pop(self) -> Self {
        self.stack(StackOp::Pop)
    }

    pub fn swap(self) -> Self {
        self.stack(StackOp::Swap)
    }

    pub fn nop(self) -> Self {
        self.op(Op::Nop)
    }

    pub fn unsupported(self, opcode: u16) -> Self {
        self.op(Op::Unsupported { opcode })
    }

    /// Finalizes the body. `max_locals` defaults to the highest slot seen
    /// (wide-aware) plus one, or the parameter slot count if larger;
    /// `max_stack` defaults to 8.
    pub fn body(self) -> MethodBody {
        let floor = (self.highest_slot + 1).max(self.params.len());
        let max_locals = self.max_locals.unwrap_or(floor);
        let max_stack = self.max_stack.unwrap_or(8);
        MethodBody::new(
            self.ops,
            self.exceptions,
            max_locals,
            max_stack,
            self.params,
        )
    }
}
