//! The worklist type-inference interpreter.
//!
//! Abstract interpretation over the operation stream: one [`Frame`] snapshot
//! per visited PC, a FIFO worklist seeded with the entry, and an exhaustive
//! per-operation transfer function. Processing a PC clones its stored frame,
//! applies the operation's stack and register effect, and propagates the
//! result to every successor PC through [merge]. Reads narrow the candidate
//! type set of the register they consume; narrowing flows backwards through
//! merge and copy links so every path that feeds a constrained value agrees
//! with the constraint.
//!
//! [merge]: #merging
//!
//! # Merging
//!
//! The first frame to arrive at a PC is stored verbatim. Later arrivals are
//! compared slot by slot: identical registers are skipped, a dead side kills
//! the slot, and genuinely distinct registers produce a merge register
//! rooted at the join PC. A merge rooted at the join absorbs further inputs
//! in place; a fresh merge replaces the stale register in every downstream
//! frame that still holds it, and every touched PC is requeued so the
//! fixpoint is re-validated. Frames with different operand stack depths or
//! subroutine stacks never merge; such methods were never verifiable.
//!
//! # Termination
//!
//! Candidate sets only shrink, reference joins only move towards
//! `java/lang/Object`, and every operation re-derives the same result
//! registers it created on its first execution, so the state space is
//! finite and the worklist drains. A configurable step bound exists as a
//! safety valve and surfaces as [`Error::IterationLimit`].

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use crate::frame::{Frame, RegId, RegKind, Registers, Sub, SubId};
use crate::ir::descriptor::{parse_field_descriptor, parse_method_descriptor, sink_demand};
use crate::ir::{
    ArithOp, ArrayKind, BranchKind, ConstValue, ConvTarget, Demand, MethodBody, NumKind, Op, Pc,
    PrimMask, RefType, SlotKind, StackOp, ValueType,
};
use crate::{Error, Result};

/// Demand satisfied by any category-1 integral value.
const INT_ANY: Demand = Demand::Prim(PrimMask::INT_LIKE);

/// Exception type used for `finally` handlers, which catch anything.
const THROWABLE: &str = "java/lang/Throwable";

/// Registers consumed and produced by one operation.
///
/// `inputs` lists consumed registers most recently popped first (the local
/// register for loads, increments and `ret`). `results` lists the registers
/// the operation put on the stack or into a local.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpTypes {
    /// Consumed registers, top of stack first.
    pub inputs: Vec<RegId>,
    /// Produced registers.
    pub results: Vec<RegId>,
}

/// Everything type inference learned about one method.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    registers: Registers,
    subs: Vec<Sub>,
    frames: Vec<Option<Frame>>,
    op_types: Vec<OpTypes>,
}

impl FrameAnalysis {
    /// The register arena with full provenance links.
    #[must_use]
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    /// Discovered subroutine contexts.
    #[must_use]
    pub fn subs(&self) -> &[Sub] {
        &self.subs
    }

    /// The frame on entry to `pc`, if `pc` was reached.
    #[must_use]
    pub fn frame_at(&self, pc: Pc) -> Option<&Frame> {
        self.frames.get(pc).and_then(Option::as_ref)
    }

    /// Per-operation register annotations for `pc`.
    #[must_use]
    pub fn op_types(&self, pc: Pc) -> Option<&OpTypes> {
        self.op_types.get(pc)
    }
}

/// Runs type inference for one method.
///
/// `max_steps` bounds the number of worklist iterations; use
/// [`crate::AnalysisOptions::default`] for the standard bound. `method`
/// only labels diagnostics.
///
/// # Errors
///
/// Data-flow violations surface as [`Error::TypeConflict`],
/// [`Error::StackUnderflow`], [`Error::StackDepthMismatch`],
/// [`Error::UndefinedSlot`] or [`Error::SubroutineViolation`]; a runaway
/// fixpoint as [`Error::IterationLimit`]. All are scoped to this method.
pub fn infer_frames(method: &str, body: &MethodBody, max_steps: usize) -> Result<FrameAnalysis> {
    let mut interp = Interpreter::new(method, body, max_steps);
    interp.seed()?;
    interp.drain()?;
    Ok(interp.finish())
}

/// Identifies one frame slot across the frames of consecutive PCs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Local(usize),
    /// Operand stack entry, indexed from the bottom.
    Stack(usize),
}

/// Where control continues after one operation.
enum Next {
    Fall,
    Jump(Pc),
    /// Taken target plus fall-through.
    Fork(Pc),
    Many(Vec<Pc>),
    /// Terminator, or an operation that propagated its frames itself.
    Stop,
}

struct Interpreter<'a> {
    method: &'a str,
    body: &'a MethodBody,
    max_steps: usize,
    steps: usize,
    registers: Registers,
    subs: Vec<Sub>,
    frames: Vec<Option<Frame>>,
    op_types: Vec<OpTypes>,
    /// Result registers allocated per PC, reused on re-execution so
    /// register identity is a pure function of the creation site.
    created: Vec<Vec<RegId>>,
    cursor: usize,
    /// The single exception register per handler PC.
    handler_regs: BTreeMap<Pc, RegId>,
    worklist: VecDeque<Pc>,
    in_worklist: Vec<bool>,
}

impl<'a> Interpreter<'a> {
    fn new(method: &'a str, body: &'a MethodBody, max_steps: usize) -> Self {
        let len = body.len();
        Interpreter {
            method,
            body,
            max_steps,
            steps: 0,
            registers: Registers::new(),
            subs: Vec::new(),
            frames: vec![None; len],
            op_types: vec![OpTypes::default(); len],
            created: vec![Vec::new(); len],
            cursor: 0,
            handler_regs: BTreeMap::new(),
            worklist: VecDeque::new(),
            in_worklist: vec![false; len],
        }
    }

    /// Builds the entry frame from the parameter slot types and queues PC 0.
    fn seed(&mut self) -> Result<()> {
        if self.body.is_empty() {
            return Err(malformed_error!(
                "Operation stream of {} is empty",
                self.method
            ));
        }

        let mut frame = Frame::new(self.body.max_locals());
        let mut slot = 0;
        for ty in self.body.params() {
            let span = if ty.is_wide() { 2 } else { 1 };
            if slot + span > self.body.max_locals() {
                return Err(malformed_error!(
                    "Parameters of {} exceed max_locals {}",
                    self.method,
                    self.body.max_locals()
                ));
            }
            let register = self
                .registers
                .alloc(0, RegKind::Load, ty.clone(), None, Vec::new());
            frame.set_local(slot, Some(register));
            slot += span;
        }

        self.frames[0] = Some(frame);
        self.enqueue(0);
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        while let Some(pc) = self.worklist.pop_front() {
            self.in_worklist[pc] = false;
            self.steps += 1;
            if self.steps > self.max_steps {
                return Err(Error::IterationLimit(self.max_steps));
            }
            self.step(pc)?;
        }
        Ok(())
    }

    fn finish(self) -> FrameAnalysis {
        FrameAnalysis {
            registers: self.registers,
            subs: self.subs,
            frames: self.frames,
            op_types: self.op_types,
        }
    }

    fn enqueue(&mut self, pc: Pc) {
        if !self.in_worklist[pc] {
            self.in_worklist[pc] = true;
            self.worklist.push_back(pc);
        }
    }

    fn step(&mut self, pc: Pc) -> Result<()> {
        let Some(frame) = self.frames[pc].clone() else {
            return Err(Error::GraphError(format!(
                "pc {} queued without a frame in {}",
                pc, self.method
            )));
        };

        // Any covered operation may fault before completing, so the pre-op
        // state reaches every active handler.
        let body = self.body;
        for entry in body.handlers_for(pc) {
            self.propagate_to_handler(entry.handler_pc, entry.catch_type.clone(), &frame)?;
        }

        self.cursor = 0;
        self.execute(pc, frame)
    }

    fn execute(&mut self, pc: Pc, mut frame: Frame) -> Result<()> {
        let op = self.body.ops()[pc].op.clone();
        let mut inputs = Vec::new();
        let mut results = Vec::new();

        let next = match op {
            Op::Const(value) => {
                let ty = const_type(&value);
                let register =
                    self.alloc_at(pc, RegKind::Const, ty, Some(value), Vec::new())?;
                frame.push(register);
                results.push(register);
                Next::Fall
            }

            Op::Load { slot, kind } => {
                let register = frame.local(slot).ok_or(Error::UndefinedSlot { pc, slot })?;
                self.narrow(pc, register, &slot_demand(kind))?;
                frame.push(register);
                inputs.push(register);
                results.push(register);
                Next::Fall
            }

            Op::Store { slot, kind } => {
                let register = self.pop_value(&mut frame, pc)?;
                // astore is the one legal way to save a return address.
                let keep_addr = kind == SlotKind::Ref
                    && matches!(self.registers.get(register).ty(), ValueType::RetAddr(_));
                if !keep_addr {
                    self.narrow(pc, register, &slot_demand(kind))?;
                }
                let span = if self.registers.get(register).ty().is_wide() {
                    2
                } else {
                    1
                };
                if slot + span > self.body.max_locals() {
                    return Err(malformed_error!(
                        "Store to local {} outside max_locals {} in {}",
                        slot,
                        self.body.max_locals(),
                        self.method
                    ));
                }
                self.store_local(&mut frame, slot, register);
                inputs.push(register);
                Next::Fall
            }

            Op::Iinc { slot, .. } => {
                let register = frame.local(slot).ok_or(Error::UndefinedSlot { pc, slot })?;
                self.narrow(pc, register, &INT_ANY)?;
                let result =
                    self.alloc_at(pc, RegKind::Load, ValueType::int(), None, vec![register])?;
                self.store_local(&mut frame, slot, result);
                inputs.push(register);
                results.push(result);
                Next::Fall
            }

            Op::Arith { op: arith, kind } => {
                let result = if arith.is_unary() {
                    let value = self.pop_as(&mut frame, pc, &num_demand(kind))?;
                    inputs.push(value);
                    self.alloc_at(pc, RegKind::Load, num_result(kind), None, vec![value])?
                } else if arith.is_shift() {
                    let amount = self.pop_as(&mut frame, pc, &INT_ANY)?;
                    let value = self.pop_as(&mut frame, pc, &num_demand(kind))?;
                    inputs.push(amount);
                    inputs.push(value);
                    self.alloc_at(pc, RegKind::Load, num_result(kind), None, vec![value, amount])?
                } else {
                    let b = self.pop_as(&mut frame, pc, &num_demand(kind))?;
                    let a = self.pop_as(&mut frame, pc, &num_demand(kind))?;
                    inputs.push(b);
                    inputs.push(a);
                    // The logical operators are the one family where a
                    // boolean result is possible and worth preserving.
                    let ty = if kind == NumKind::Int
                        && matches!(arith, ArithOp::And | ArithOp::Or | ArithOp::Xor)
                    {
                        logical_int_type(self.registers.get(a).ty(), self.registers.get(b).ty())
                    } else {
                        num_result(kind)
                    };
                    self.alloc_at(pc, RegKind::Load, ty, None, vec![a, b])?
                };
                frame.push(result);
                results.push(result);
                Next::Fall
            }

            Op::Compare { kind } => {
                let b = self.pop_as(&mut frame, pc, &num_demand(kind))?;
                let a = self.pop_as(&mut frame, pc, &num_demand(kind))?;
                inputs.push(b);
                inputs.push(a);
                let result =
                    self.alloc_at(pc, RegKind::Load, ValueType::int(), None, vec![a, b])?;
                frame.push(result);
                results.push(result);
                Next::Fall
            }

            Op::Convert { from, to } => {
                let value = self.pop_as(&mut frame, pc, &num_demand(from))?;
                inputs.push(value);
                let result =
                    self.alloc_at(pc, RegKind::Load, conv_result(to), None, vec![value])?;
                frame.push(result);
                results.push(result);
                Next::Fall
            }

            Op::GetField { field, is_static } => {
                if !is_static {
                    let object = self.pop_as(&mut frame, pc, &Demand::Reference)?;
                    inputs.push(object);
                }
                let ty = parse_field_descriptor(&field.descriptor)?;
                let result = self.alloc_at(pc, RegKind::Load, ty, None, Vec::new())?;
                frame.push(result);
                results.push(result);
                Next::Fall
            }

            Op::PutField { field, is_static } => {
                let ty = parse_field_descriptor(&field.descriptor)?;
                let value = self.pop_as(&mut frame, pc, &sink_demand(&ty))?;
                inputs.push(value);
                if !is_static {
                    let object = self.pop_as(&mut frame, pc, &Demand::Reference)?;
                    inputs.push(object);
                }
                Next::Fall
            }

            Op::ArrayLoad { kind } => {
                let index = self.pop_as(&mut frame, pc, &INT_ANY)?;
                let array = self.pop_as(&mut frame, pc, &Demand::Reference)?;
                inputs.push(index);
                inputs.push(array);
                let result =
                    self.alloc_at(pc, RegKind::Load, element_type(kind), None, Vec::new())?;
                frame.push(result);
                results.push(result);
                Next::Fall
            }

            Op::ArrayStore { kind } => {
                let value = self.pop_as(&mut frame, pc, &sink_demand(&element_type(kind)))?;
                let index = self.pop_as(&mut frame, pc, &INT_ANY)?;
                let array = self.pop_as(&mut frame, pc, &Demand::Reference)?;
                inputs.push(value);
                inputs.push(index);
                inputs.push(array);
                Next::Fall
            }

            Op::ArrayLength => {
                let array = self.pop_as(&mut frame, pc, &Demand::Reference)?;
                inputs.push(array);
                let result =
                    self.alloc_at(pc, RegKind::Load, ValueType::int(), None, vec![array])?;
                frame.push(result);
                results.push(result);
                Next::Fall
            }

            Op::New { class } => {
                let ty = ValueType::Ref(RefType::Object(class));
                let result = self.alloc_at(pc, RegKind::Load, ty, None, Vec::new())?;
                frame.push(result);
                results.push(result);
                Next::Fall
            }

            Op::NewArray { descriptor } => {
                let count = self.pop_as(&mut frame, pc, &INT_ANY)?;
                inputs.push(count);
                let ty = ValueType::Ref(RefType::Object(descriptor));
                let result = self.alloc_at(pc, RegKind::Load, ty, None, vec![count])?;
                frame.push(result);
                results.push(result);
                Next::Fall
            }

            Op::MultiNewArray { descriptor, dims } => {
                let mut counts = Vec::new();
                for _ in 0..dims {
                    let count = self.pop_as(&mut frame, pc, &INT_ANY)?;
                    inputs.push(count);
                    counts.push(count);
                }
                let ty = ValueType::Ref(RefType::Object(descriptor));
                let result = self.alloc_at(pc, RegKind::Load, ty, None, counts)?;
                frame.push(result);
                results.push(result);
                Next::Fall
            }

            Op::Invoke { method, kind } => {
                let (params, ret) = parse_method_descriptor(&method.descriptor)?;
                for param in params.iter().rev() {
                    let argument = self.pop_as(&mut frame, pc, &sink_demand(param))?;
                    inputs.push(argument);
                }
                if kind.has_receiver() {
                    let receiver = self.pop_as(&mut frame, pc, &Demand::Reference)?;
                    inputs.push(receiver);
                }
                if let Some(ret_ty) = ret {
                    let result = self.alloc_at(pc, RegKind::Load, ret_ty, None, Vec::new())?;
                    frame.push(result);
                    results.push(result);
                }
                Next::Fall
            }

            Op::Branch { kind, target } => {
                match kind {
                    BranchKind::IntZero(_) => {
                        let value = self.pop_as(&mut frame, pc, &INT_ANY)?;
                        inputs.push(value);
                    }
                    BranchKind::IntCmp(_) => {
                        let b = self.pop_as(&mut frame, pc, &INT_ANY)?;
                        let a = self.pop_as(&mut frame, pc, &INT_ANY)?;
                        inputs.push(b);
                        inputs.push(a);
                    }
                    BranchKind::RefCmp(_) => {
                        let b = self.pop_as(&mut frame, pc, &Demand::Reference)?;
                        let a = self.pop_as(&mut frame, pc, &Demand::Reference)?;
                        inputs.push(b);
                        inputs.push(a);
                    }
                    BranchKind::RefNull(_) => {
                        let value = self.pop_as(&mut frame, pc, &Demand::Reference)?;
                        inputs.push(value);
                    }
                }
                Next::Fork(target)
            }

            Op::Goto { target } => Next::Jump(target),

            Op::Switch { cases, default } => {
                let Some(default) = default else {
                    return Err(malformed_error!(
                        "Switch at pc {} in {} has no default target",
                        pc,
                        self.method
                    ));
                };
                let key = self.pop_as(&mut frame, pc, &INT_ANY)?;
                inputs.push(key);
                let mut targets: Vec<Pc> = cases.into_iter().map(|(_, target)| target).collect();
                targets.push(default);
                targets.sort_unstable();
                targets.dedup();
                Next::Many(targets)
            }

            Op::Return { kind } => {
                if let Some(kind) = kind {
                    let value = self.pop_as(&mut frame, pc, &slot_demand(kind))?;
                    inputs.push(value);
                }
                Next::Stop
            }

            Op::Throw => {
                let value = self.pop_as(&mut frame, pc, &Demand::Reference)?;
                inputs.push(value);
                Next::Stop
            }

            Op::MonitorEnter | Op::MonitorExit => {
                let object = self.pop_as(&mut frame, pc, &Demand::Reference)?;
                inputs.push(object);
                Next::Fall
            }

            Op::Jsr { target } => {
                let sub = self.sub_for_entry(target);
                if frame.in_sub(sub) {
                    return Err(Error::SubroutineViolation {
                        pc,
                        message: format!("recursive entry into subroutine at pc {}", target),
                    });
                }
                let address =
                    self.alloc_at(pc, RegKind::Const, ValueType::RetAddr(target), None, Vec::new())?;
                frame.push(address);
                results.push(address);

                let depth = frame.depth();
                match self.subs[sub.index()].entry_depth() {
                    None => self.subs[sub.index()].set_entry_depth(depth),
                    Some(expected) if expected != depth => {
                        return Err(Error::SubroutineViolation {
                            pc,
                            message: format!(
                                "call sites disagree on stack depth at subroutine pc {} ({} vs {})",
                                target, expected, depth
                            ),
                        });
                    }
                    Some(_) => {}
                }
                self.subs[sub.index()].add_continuation(pc + 1);
                // A call site discovered after the ret still reaches its
                // continuation from the recorded return state.
                if let Some(return_frame) = self.subs[sub.index()].return_frame().cloned() {
                    self.propagate(pc + 1, return_frame)?;
                }
                frame.push_sub(sub);
                self.propagate(target, frame.clone())?;
                Next::Stop
            }

            Op::Ret { slot } => {
                let register = frame.local(slot).ok_or(Error::UndefinedSlot { pc, slot })?;
                inputs.push(register);
                self.narrow(pc, register, &Demand::RetAddr)?;
                let entry = match self.registers.get(register).ty() {
                    ValueType::RetAddr(entry) => *entry,
                    other => {
                        return Err(Error::TypeConflict {
                            pc,
                            message: format!("{} of type {} used as a return address", register, other),
                        });
                    }
                };
                let sub = self.sub_for_entry(entry);
                match frame.pop_sub() {
                    Some(top) if top == sub => {}
                    Some(top) => {
                        return Err(Error::SubroutineViolation {
                            pc,
                            message: format!(
                                "ret for subroutine pc {} while the subroutine at pc {} is innermost",
                                entry,
                                self.subs[top.index()].entry_pc()
                            ),
                        });
                    }
                    None => {
                        return Err(Error::SubroutineViolation {
                            pc,
                            message: "ret outside any subroutine".to_string(),
                        });
                    }
                }
                if let Some(expected) = self.subs[sub.index()].entry_depth() {
                    if frame.depth() + 1 != expected {
                        return Err(Error::SubroutineViolation {
                            pc,
                            message: format!(
                                "return stack depth {} does not match call depth {}",
                                frame.depth(),
                                expected
                            ),
                        });
                    }
                }
                self.subs[sub.index()].set_ret_pc(pc);
                self.subs[sub.index()].set_return_frame(frame.clone());
                let continuations = self.subs[sub.index()].continuations().to_vec();
                for continuation in continuations {
                    self.propagate(continuation, frame.clone())?;
                }
                Next::Stop
            }

            Op::CheckCast { class } => {
                let value = self.pop_as(&mut frame, pc, &Demand::Reference)?;
                inputs.push(value);
                let ty = ValueType::Ref(RefType::Object(class));
                let result = self.alloc_at(pc, RegKind::Load, ty, None, vec![value])?;
                frame.push(result);
                results.push(result);
                Next::Fall
            }

            Op::InstanceOf { .. } => {
                let value = self.pop_as(&mut frame, pc, &Demand::Reference)?;
                inputs.push(value);
                let ty = ValueType::Prim(PrimMask::INT | PrimMask::BOOLEAN);
                let result = self.alloc_at(pc, RegKind::Load, ty, None, vec![value])?;
                frame.push(result);
                results.push(result);
                Next::Fall
            }

            Op::Stack(stack_op) => {
                self.shuffle(pc, &mut frame, stack_op, &mut inputs, &mut results)?;
                Next::Fall
            }

            Op::Nop => Next::Fall,

            Op::Unsupported { opcode } => {
                return Err(malformed_error!(
                    "Unsupported opcode 0x{:04x} at pc {} in {}",
                    opcode,
                    pc,
                    self.method
                ));
            }
        };

        match next {
            Next::Fall => self.propagate(pc + 1, frame)?,
            Next::Jump(target) => self.propagate(target, frame)?,
            Next::Fork(target) => {
                self.propagate(target, frame.clone())?;
                self.propagate(pc + 1, frame)?;
            }
            Next::Many(targets) => {
                for target in targets {
                    self.propagate(target, frame.clone())?;
                }
            }
            Next::Stop => {}
        }

        self.op_types[pc] = OpTypes { inputs, results };
        Ok(())
    }

    /// Applies a `dup`/`pop`/`swap` family operation. Duplicated entries
    /// become fresh [`RegKind::Move`] registers; reordered and retained
    /// entries keep their identity. Word-counted forms follow the value
    /// category of what they find on the stack.
    fn shuffle(
        &mut self,
        pc: Pc,
        frame: &mut Frame,
        op: StackOp,
        inputs: &mut Vec<RegId>,
        results: &mut Vec<RegId>,
    ) -> Result<()> {
        match op {
            StackOp::Pop => {
                let a = self.pop_cat1(frame, pc)?;
                inputs.push(a);
            }
            StackOp::Pop2 => {
                let a = self.pop_value(frame, pc)?;
                inputs.push(a);
                if !self.is_wide(a) {
                    let b = self.pop_cat1(frame, pc)?;
                    inputs.push(b);
                }
            }
            StackOp::Dup => {
                let a = self.pop_cat1(frame, pc)?;
                let copy = self.copy_of(pc, a)?;
                frame.push(a);
                frame.push(copy);
                inputs.push(a);
                results.push(copy);
            }
            StackOp::DupX1 => {
                let a = self.pop_cat1(frame, pc)?;
                let b = self.pop_cat1(frame, pc)?;
                let copy = self.copy_of(pc, a)?;
                frame.push(copy);
                frame.push(b);
                frame.push(a);
                inputs.push(a);
                inputs.push(b);
                results.push(copy);
            }
            StackOp::DupX2 => {
                let a = self.pop_cat1(frame, pc)?;
                let b = self.pop_value(frame, pc)?;
                let copy = self.copy_of(pc, a)?;
                if self.is_wide(b) {
                    frame.push(copy);
                    frame.push(b);
                    frame.push(a);
                    inputs.extend([a, b]);
                } else {
                    let c = self.pop_cat1(frame, pc)?;
                    frame.push(copy);
                    frame.push(c);
                    frame.push(b);
                    frame.push(a);
                    inputs.extend([a, b, c]);
                }
                results.push(copy);
            }
            StackOp::Dup2 => {
                let a = self.pop_value(frame, pc)?;
                if self.is_wide(a) {
                    let copy = self.copy_of(pc, a)?;
                    frame.push(a);
                    frame.push(copy);
                    inputs.push(a);
                    results.push(copy);
                } else {
                    let b = self.pop_cat1(frame, pc)?;
                    let copy_b = self.copy_of(pc, b)?;
                    let copy_a = self.copy_of(pc, a)?;
                    frame.push(b);
                    frame.push(a);
                    frame.push(copy_b);
                    frame.push(copy_a);
                    inputs.extend([a, b]);
                    results.extend([copy_b, copy_a]);
                }
            }
            StackOp::Dup2X1 => {
                let a = self.pop_value(frame, pc)?;
                if self.is_wide(a) {
                    let b = self.pop_cat1(frame, pc)?;
                    let copy = self.copy_of(pc, a)?;
                    frame.push(copy);
                    frame.push(b);
                    frame.push(a);
                    inputs.extend([a, b]);
                    results.push(copy);
                } else {
                    let b = self.pop_cat1(frame, pc)?;
                    let c = self.pop_cat1(frame, pc)?;
                    let copy_b = self.copy_of(pc, b)?;
                    let copy_a = self.copy_of(pc, a)?;
                    frame.push(copy_b);
                    frame.push(copy_a);
                    frame.push(c);
                    frame.push(b);
                    frame.push(a);
                    inputs.extend([a, b, c]);
                    results.extend([copy_b, copy_a]);
                }
            }
            StackOp::Dup2X2 => {
                let a = self.pop_value(frame, pc)?;
                if self.is_wide(a) {
                    let b = self.pop_value(frame, pc)?;
                    let copy = self.copy_of(pc, a)?;
                    if self.is_wide(b) {
                        frame.push(copy);
                        frame.push(b);
                        frame.push(a);
                        inputs.extend([a, b]);
                    } else {
                        let c = self.pop_cat1(frame, pc)?;
                        frame.push(copy);
                        frame.push(c);
                        frame.push(b);
                        frame.push(a);
                        inputs.extend([a, b, c]);
                    }
                    results.push(copy);
                } else {
                    let b = self.pop_cat1(frame, pc)?;
                    let c = self.pop_value(frame, pc)?;
                    let copy_b = self.copy_of(pc, b)?;
                    let copy_a = self.copy_of(pc, a)?;
                    if self.is_wide(c) {
                        frame.push(copy_b);
                        frame.push(copy_a);
                        frame.push(c);
                        frame.push(b);
                        frame.push(a);
                        inputs.extend([a, b, c]);
                    } else {
                        let d = self.pop_cat1(frame, pc)?;
                        frame.push(copy_b);
                        frame.push(copy_a);
                        frame.push(d);
                        frame.push(c);
                        frame.push(b);
                        frame.push(a);
                        inputs.extend([a, b, c, d]);
                    }
                    results.extend([copy_b, copy_a]);
                }
            }
            StackOp::Swap => {
                let a = self.pop_cat1(frame, pc)?;
                let b = self.pop_cat1(frame, pc)?;
                frame.push(a);
                frame.push(b);
                inputs.extend([a, b]);
            }
        }
        Ok(())
    }

    fn copy_of(&mut self, pc: Pc, original: RegId) -> Result<RegId> {
        let ty = self.registers.get(original).ty().clone();
        self.alloc_at(pc, RegKind::Move, ty, None, vec![original])
    }

    fn is_wide(&self, register: RegId) -> bool {
        self.registers.get(register).ty().is_wide()
    }

    fn pop_value(&self, frame: &mut Frame, pc: Pc) -> Result<RegId> {
        frame.pop().ok_or(Error::StackUnderflow(pc))
    }

    fn pop_cat1(&self, frame: &mut Frame, pc: Pc) -> Result<RegId> {
        let register = frame.pop().ok_or(Error::StackUnderflow(pc))?;
        if self.is_wide(register) {
            return Err(Error::TypeConflict {
                pc,
                message: format!(
                    "{} is category-2 where a category-1 value is required",
                    register
                ),
            });
        }
        Ok(register)
    }

    fn pop_as(&mut self, frame: &mut Frame, pc: Pc, demand: &Demand) -> Result<RegId> {
        let register = frame.pop().ok_or(Error::StackUnderflow(pc))?;
        self.narrow(pc, register, demand)?;
        Ok(register)
    }

    /// Writes `register` into local `slot`, killing any long/double pair
    /// the write overlaps and poisoning the upper slot of a wide value.
    fn store_local(&self, frame: &mut Frame, slot: usize, register: RegId) {
        if slot > 0 {
            if let Some(previous) = frame.local(slot - 1) {
                if self.is_wide(previous) {
                    frame.set_local(slot - 1, None);
                }
            }
        }
        if let Some(previous) = frame.local(slot) {
            if self.is_wide(previous) {
                frame.set_local(slot + 1, None);
            }
        }
        frame.set_local(slot, Some(register));
        if self.is_wide(register) {
            frame.set_local(slot + 1, None);
        }
    }

    /// Narrows `register` against a reader's demand, refining its candidate
    /// set in place and flowing the constraint to its sources.
    fn narrow(&mut self, pc: Pc, register: RegId, demand: &Demand) -> Result<()> {
        let current = self.registers.get(register).ty().clone();
        let Some(narrowed) = current.narrowed(demand) else {
            return Err(Error::TypeConflict {
                pc,
                message: format!("{} of type {} read as {}", register, current, demand),
            });
        };
        if narrowed == current {
            return Ok(());
        }
        log::debug!(
            "{}: read at pc {} narrows {} from {} to {}",
            self.method,
            pc,
            register,
            current,
            narrowed
        );
        self.registers.set_type(register, narrowed);
        self.propagate_narrowing(pc, register)
    }

    /// Flows a tightened type through merge and copy links.
    ///
    /// Sources of merge and copy registers absorb the constraint; any
    /// register in the walk that already feeds a merge gets its creation
    /// PC requeued so the downstream join is re-validated. The visited set
    /// keeps loop-shaped merge graphs from cycling.
    fn propagate_narrowing(&mut self, pc: Pc, root: RegId) -> Result<()> {
        let mut work = vec![root];
        let mut visited = vec![false; self.registers.len()];

        while let Some(register) = work.pop() {
            if visited[register.index()] {
                continue;
            }
            visited[register.index()] = true;

            let (kind, ty, creation, sources, feeds_merge) = {
                let r = self.registers.get(register);
                (
                    r.kind(),
                    r.ty().clone(),
                    r.pc(),
                    r.sources().to_vec(),
                    !r.dependents().is_empty(),
                )
            };
            if feeds_merge {
                self.enqueue(creation);
            }
            if !matches!(kind, RegKind::Merge | RegKind::Move) {
                continue;
            }
            for source in sources {
                let source_ty = self.registers.get(source).ty().clone();
                match source_ty.join(&ty) {
                    Some(joined) if joined != source_ty => {
                        self.registers.set_type(source, joined);
                        work.push(source);
                    }
                    Some(_) => {}
                    None => {
                        return Err(Error::TypeConflict {
                            pc,
                            message: format!(
                                "merge input {} of type {} cannot satisfy {}",
                                source, source_ty, ty
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Merges `incoming` into the frame stored at `target`, storing it
    /// verbatim on first contact and requeuing `target` on any change.
    fn propagate(&mut self, target: Pc, incoming: Frame) -> Result<()> {
        if target >= self.body.len() {
            return Err(Error::GraphError(format!(
                "propagation past the end of {} (pc {})",
                self.method, target
            )));
        }

        let mut current = match &self.frames[target] {
            None => {
                self.frames[target] = Some(incoming);
                self.enqueue(target);
                return Ok(());
            }
            Some(existing) => existing.clone(),
        };

        if current.depth() != incoming.depth() {
            return Err(Error::StackDepthMismatch(target));
        }
        if current.subs() != incoming.subs() {
            return Err(Error::SubroutineViolation {
                pc: target,
                message: "subroutine stacks disagree at join point".to_string(),
            });
        }

        let mut changed = false;
        for slot in 0..current.locals().len() {
            let old = current.local(slot);
            let new = incoming.local(slot);
            if old == new {
                continue;
            }
            let merged = self.merge_values(target, Slot::Local(slot), old, new, &mut changed)?;
            current.set_local(slot, merged);
        }
        for index in 0..current.depth() {
            let old = current.stack()[index];
            let new = incoming.stack()[index];
            if old == new {
                continue;
            }
            let merged =
                self.merge_values(target, Slot::Stack(index), Some(old), Some(new), &mut changed)?;
            let Some(merged) = merged else {
                return Err(Error::TypeConflict {
                    pc: target,
                    message: format!(
                        "operand stack entry {} has irreconcilable incoming types",
                        index
                    ),
                });
            };
            current.stack_mut()[index] = merged;
        }

        if changed {
            self.frames[target] = Some(current);
            self.enqueue(target);
        }
        Ok(())
    }

    /// Joins two registers meeting at one slot of `target`.
    ///
    /// A dead side kills the slot. A merge register already rooted at
    /// `target` absorbs the newcomer; otherwise a fresh merge is created
    /// and the stale register is replaced downstream.
    fn merge_values(
        &mut self,
        target: Pc,
        slot: Slot,
        old: Option<RegId>,
        new: Option<RegId>,
        changed: &mut bool,
    ) -> Result<Option<RegId>> {
        let (Some(a), Some(b)) = (old, new) else {
            *changed |= old.is_some();
            return Ok(None);
        };

        let rooted_here = {
            let existing = self.registers.get(a);
            existing.kind() == RegKind::Merge && existing.pc() == target
        };
        let joined = self.registers.get(a).ty().join(self.registers.get(b).ty());

        if rooted_here {
            let Some(ty) = joined else {
                *changed = true;
                return Ok(None);
            };
            if !self.registers.get(a).sources().contains(&b) {
                self.registers.add_source(a, b);
                self.registers.add_dependent(b, a);
            }
            if &ty != self.registers.get(a).ty() {
                self.registers.set_type(a, ty);
                *changed = true;
            }
            Ok(Some(a))
        } else {
            let Some(ty) = joined else {
                *changed = true;
                return Ok(None);
            };
            let merge = self
                .registers
                .alloc(target, RegKind::Merge, ty, None, vec![a, b]);
            self.registers.add_dependent(a, merge);
            self.registers.add_dependent(b, merge);
            log::debug!(
                "{}: {} and {} meet at pc {}, merged as {}",
                self.method,
                a,
                b,
                target,
                merge
            );
            *changed = true;
            self.replace_downstream(target, slot, a, merge)?;
            Ok(Some(merge))
        }
    }

    /// Replaces `stale` with `fresh` in the stored frames downstream of
    /// `target`, stopping on each path where the slot no longer holds the
    /// stale register, and requeues every touched PC.
    fn replace_downstream(&mut self, target: Pc, slot: Slot, stale: RegId, fresh: RegId) -> Result<()> {
        let mut visited = vec![false; self.body.len()];
        let mut work = self.flow_successors(target);

        while let Some(pc) = work.pop() {
            if visited[pc] {
                continue;
            }
            visited[pc] = true;

            let Some(frame) = self.frames[pc].as_mut() else {
                continue;
            };
            let holds = match slot {
                Slot::Local(index) => frame.local(index) == Some(stale),
                Slot::Stack(index) => frame.stack().get(index) == Some(&stale),
            };
            if !holds {
                continue;
            }
            match slot {
                Slot::Local(index) => frame.set_local(index, Some(fresh)),
                Slot::Stack(index) => frame.stack_mut()[index] = fresh,
            }
            self.enqueue(pc);
            work.extend(self.flow_successors(pc));
        }
        Ok(())
    }

    /// PCs an executed operation can hand its frame to, including the
    /// handlers covering it.
    fn flow_successors(&self, pc: Pc) -> Vec<Pc> {
        let mut out = Vec::new();
        match &self.body.ops()[pc].op {
            Op::Branch { target, .. } => {
                out.push(*target);
                out.push(pc + 1);
            }
            Op::Goto { target } => out.push(*target),
            Op::Switch { cases, default } => {
                out.extend(cases.iter().map(|(_, target)| *target));
                if let Some(default) = default {
                    out.push(*default);
                }
            }
            Op::Return { .. } | Op::Throw => {}
            Op::Jsr { target } => {
                out.push(*target);
                out.push(pc + 1);
            }
            Op::Ret { .. } => {
                for sub in &self.subs {
                    if sub.ret_pc() == Some(pc) {
                        out.extend(sub.continuations().iter().copied());
                    }
                }
            }
            _ => out.push(pc + 1),
        }
        for entry in self.body.handlers_for(pc) {
            out.push(entry.handler_pc);
        }
        out.retain(|&p| p < self.body.len());
        out
    }

    /// Merges the synthetic handler-entry frame: current locals and
    /// subroutine stack, operand stack cleared down to the handler's
    /// single exception register. The register is created once per
    /// handler and reused by every covered throw site.
    fn propagate_to_handler(
        &mut self,
        handler_pc: Pc,
        catch_type: Option<Arc<str>>,
        frame: &Frame,
    ) -> Result<()> {
        let register = match self.handler_regs.get(&handler_pc) {
            Some(&register) => register,
            None => {
                let name = catch_type.unwrap_or_else(|| Arc::from(THROWABLE));
                let register = self.registers.alloc(
                    handler_pc,
                    RegKind::Load,
                    ValueType::Ref(RefType::Object(name)),
                    None,
                    Vec::new(),
                );
                self.handler_regs.insert(handler_pc, register);
                register
            }
        };

        let mut synthetic = frame.clone();
        synthetic.clear_stack();
        synthetic.push(register);
        self.propagate(handler_pc, synthetic)
    }

    /// Allocates (or on re-execution re-derives) the next result register
    /// of `pc`, keeping register identity stable across worklist visits.
    fn alloc_at(
        &mut self,
        pc: Pc,
        kind: RegKind,
        ty: ValueType,
        value: Option<ConstValue>,
        sources: Vec<RegId>,
    ) -> Result<RegId> {
        let index = self.cursor;
        self.cursor += 1;

        if let Some(&existing) = self.created[pc].get(index) {
            if !self.registers.rederive(existing, &ty, value, sources) {
                return Err(Error::TypeConflict {
                    pc,
                    message: format!(
                        "{} re-derived as {} conflicts with its narrowed type {}",
                        existing,
                        ty,
                        self.registers.get(existing).ty()
                    ),
                });
            }
            return Ok(existing);
        }

        let register = self.registers.alloc(pc, kind, ty, value, sources);
        self.created[pc].push(register);
        Ok(register)
    }

    fn sub_for_entry(&mut self, entry: Pc) -> SubId {
        if let Some(sub) = self.subs.iter().find(|sub| sub.entry_pc() == entry) {
            return sub.id();
        }
        let id = SubId::new(self.subs.len());
        self.subs.push(Sub::new(id, entry));
        id
    }
}

fn const_type(value: &ConstValue) -> ValueType {
    match value {
        ConstValue::Int(v) => ValueType::Prim(PrimMask::for_int_constant(*v)),
        ConstValue::Long(_) => ValueType::Prim(PrimMask::LONG),
        ConstValue::Float(_) => ValueType::Prim(PrimMask::FLOAT),
        ConstValue::Double(_) => ValueType::Prim(PrimMask::DOUBLE),
        ConstValue::Str(_) => ValueType::Ref(RefType::object("java/lang/String")),
        ConstValue::Class(_) => ValueType::Ref(RefType::object("java/lang/Class")),
        ConstValue::Null => ValueType::Ref(RefType::Null),
    }
}

fn slot_demand(kind: SlotKind) -> Demand {
    match kind {
        SlotKind::Int => INT_ANY,
        SlotKind::Long => Demand::Prim(PrimMask::LONG),
        SlotKind::Float => Demand::Prim(PrimMask::FLOAT),
        SlotKind::Double => Demand::Prim(PrimMask::DOUBLE),
        SlotKind::Ref => Demand::Reference,
    }
}

fn num_demand(kind: NumKind) -> Demand {
    match kind {
        NumKind::Int => INT_ANY,
        NumKind::Long => Demand::Prim(PrimMask::LONG),
        NumKind::Float => Demand::Prim(PrimMask::FLOAT),
        NumKind::Double => Demand::Prim(PrimMask::DOUBLE),
    }
}

fn num_result(kind: NumKind) -> ValueType {
    match kind {
        NumKind::Int => ValueType::Prim(PrimMask::INT),
        NumKind::Long => ValueType::Prim(PrimMask::LONG),
        NumKind::Float => ValueType::Prim(PrimMask::FLOAT),
        NumKind::Double => ValueType::Prim(PrimMask::DOUBLE),
    }
}

fn conv_result(to: ConvTarget) -> ValueType {
    match to {
        ConvTarget::Int => ValueType::Prim(PrimMask::INT),
        ConvTarget::Long => ValueType::Prim(PrimMask::LONG),
        ConvTarget::Float => ValueType::Prim(PrimMask::FLOAT),
        ConvTarget::Double => ValueType::Prim(PrimMask::DOUBLE),
        ConvTarget::Byte => ValueType::Prim(PrimMask::BYTE),
        ConvTarget::Char => ValueType::Prim(PrimMask::CHAR),
        ConvTarget::Short => ValueType::Prim(PrimMask::SHORT),
    }
}

fn element_type(kind: ArrayKind) -> ValueType {
    match kind {
        ArrayKind::Int => ValueType::Prim(PrimMask::INT),
        ArrayKind::Long => ValueType::Prim(PrimMask::LONG),
        ArrayKind::Float => ValueType::Prim(PrimMask::FLOAT),
        ArrayKind::Double => ValueType::Prim(PrimMask::DOUBLE),
        // baload/bastore serve both byte[] and boolean[].
        ArrayKind::Byte => ValueType::Prim(PrimMask::BYTE | PrimMask::BOOLEAN),
        ArrayKind::Char => ValueType::Prim(PrimMask::CHAR),
        ArrayKind::Short => ValueType::Prim(PrimMask::SHORT),
        ArrayKind::Ref => ValueType::Ref(RefType::object(ValueType::OBJECT)),
    }
}

fn logical_int_type(a: &ValueType, b: &ValueType) -> ValueType {
    let mut mask = PrimMask::INT;
    if let (ValueType::Prim(x), ValueType::Prim(y)) = (a, b) {
        if (*x & *y).contains(PrimMask::BOOLEAN) {
            mask |= PrimMask::BOOLEAN;
        }
    }
    ValueType::Prim(mask)
}
