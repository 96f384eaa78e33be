//! Graph construction integration tests.
//!
//! Each test:
//! 1. Describes a method as decoded operations
//! 2. Builds the control flow graph
//! 3. Checks block boundaries, edge kinds and edge ordering

use classflow::cfg::{build_graph, EdgeKind, MethodGraph};
use classflow::ir::ExceptionEntry;
use classflow::{BranchKind, CondOp, ConstValue, MethodBody, Op, Operation, Result, SlotKind};

/// Wraps an operation sequence into a method body with two locals.
fn method(ops: Vec<Op>) -> MethodBody {
    method_with(ops, vec![])
}

/// Same, with an exception table.
fn method_with(ops: Vec<Op>, exceptions: Vec<ExceptionEntry>) -> MethodBody {
    MethodBody::new(
        ops.into_iter().map(Operation::new).collect(),
        exceptions,
        2,
        8,
        vec![],
    )
}

/// Collects the successor edge kinds of the block starting at `pc`.
fn successor_kinds(graph: &MethodGraph, pc: usize) -> Vec<EdgeKind> {
    let block = graph.block_at(pc).unwrap();
    graph
        .successors(block)
        .map(|edge| edge.kind().clone())
        .collect()
}

fn iconst(value: i32) -> Op {
    Op::Const(ConstValue::Int(value))
}

fn istore(slot: usize) -> Op {
    Op::Store {
        slot,
        kind: SlotKind::Int,
    }
}

fn astore(slot: usize) -> Op {
    Op::Store {
        slot,
        kind: SlotKind::Ref,
    }
}

fn iload(slot: usize) -> Op {
    Op::Load {
        slot,
        kind: SlotKind::Int,
    }
}

fn if_icmplt(target: usize) -> Op {
    Op::Branch {
        kind: BranchKind::IntCmp(CondOp::Lt),
        target,
    }
}

fn goto(target: usize) -> Op {
    Op::Goto { target }
}

fn vreturn() -> Op {
    Op::Return { kind: None }
}

#[test]
fn test_backward_branch_splits_its_target_block() -> Result<()> {
    // The loop entry at pc 2 is discovered after pcs 0..5 were already
    // carved into one block, forcing a split.
    let body = method(vec![
        iconst(0),
        istore(0),
        Op::Iinc { slot: 0, delta: 1 },
        iload(0),
        iconst(5),
        if_icmplt(2),
        vreturn(),
    ]);
    let graph = build_graph("It.split", &body)?;

    assert_eq!(graph.block_count(), 3);
    let head = graph.block_at(0).unwrap();
    let tail = graph.block_at(2).unwrap();
    assert_eq!(graph.block(head).pc_range(), 0..2);
    assert_eq!(graph.block(tail).pc_range(), 2..6);

    // The loop collapses onto a single self edge.
    let back: Vec<_> = graph.edges().filter(|edge| edge.is_back()).collect();
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].source(), tail);
    assert_eq!(back[0].target(), tail);

    assert_eq!(
        graph.block(graph.entry()).postorder(),
        Some(graph.block_count() - 1)
    );
    Ok(())
}

#[test]
fn test_handler_boundaries_carve_the_protected_region() -> Result<()> {
    // try { x = 2; } catch (Exception e) { } with straight-line code
    // on both sides of the protected range.
    let body = method_with(
        vec![
            iconst(1),
            istore(0),
            iconst(2),
            istore(0),
            goto(6),
            astore(1),
            vreturn(),
        ],
        vec![ExceptionEntry::catching(2, 4, 5, "java/lang/Exception")],
    );
    let graph = build_graph("It.protected", &body)?;

    // Boundaries fall exactly where the covering handler set changes.
    assert_eq!(graph.block_count(), 5);
    for (pc, range) in [(0, 0..2), (2, 2..4), (4, 4..5), (5, 5..6), (6, 6..7)] {
        let block = graph.block_at(pc).unwrap();
        assert_eq!(graph.block(block).pc_range(), range, "block at pc {}", pc);
    }

    // Only the protected block throws to the handler, and its control
    // edge comes before the exception edge.
    let kinds = successor_kinds(&graph, 2);
    assert_eq!(kinds.len(), 2);
    assert_eq!(kinds[0], EdgeKind::Sequential);
    let EdgeKind::Catch(types) = &kinds[1] else {
        panic!("expected a catch edge, got {:?}", kinds[1]);
    };
    assert!(!types.catches_any);
    assert!(types.types.contains("java/lang/Exception"));

    for pc in [0, 4, 5] {
        let kinds = successor_kinds(&graph, pc);
        assert!(
            kinds.iter().all(|kind| !kind.is_exception()),
            "unprotected block at pc {} throws",
            pc
        );
    }

    // Exception edges render dashed.
    let dot = graph.to_dot();
    assert!(dot.starts_with("digraph cfg {\n"));
    assert!(dot.contains("style=dashed"));
    Ok(())
}

#[test]
fn test_finally_handler_catches_everything() -> Result<()> {
    let body = method_with(
        vec![
            iconst(1),
            istore(0),
            iconst(2),
            istore(0),
            goto(6),
            astore(1),
            vreturn(),
        ],
        vec![ExceptionEntry::finally(2, 4, 5)],
    );
    let graph = build_graph("It.finally", &body)?;

    let kinds = successor_kinds(&graph, 2);
    let EdgeKind::Catch(types) = &kinds[1] else {
        panic!("expected a catch edge, got {:?}", kinds[1]);
    };
    assert!(types.catches_any);
    assert!(types.types.is_empty());
    Ok(())
}

#[test]
fn test_distinct_handlers_get_distinct_edges() -> Result<()> {
    // One protected range, two typed handlers. Edges leave in
    // ascending handler order.
    let body = method_with(
        vec![
            iconst(1),
            istore(0),
            goto(7),
            astore(1),
            goto(7),
            astore(1),
            goto(7),
            vreturn(),
        ],
        vec![
            ExceptionEntry::catching(0, 2, 3, "java/lang/Exception"),
            ExceptionEntry::catching(0, 2, 5, "java/lang/Error"),
        ],
    );
    let graph = build_graph("It.two_handlers", &body)?;

    let protected = graph.block_at(0).unwrap();
    let targets: Vec<_> = graph
        .successors(protected)
        .filter(|edge| edge.kind().is_exception())
        .map(|edge| graph.block(edge.target()).start_pc())
        .collect();
    assert_eq!(targets, vec![3, 5]);
    Ok(())
}

#[test]
fn test_shared_handler_merges_its_catch_types() -> Result<()> {
    // Two table entries covering the same range and landing on the
    // same handler produce a single edge carrying both types.
    let body = method_with(
        vec![
            iconst(1),
            istore(0),
            goto(5),
            astore(1),
            goto(5),
            vreturn(),
        ],
        vec![
            ExceptionEntry::catching(0, 2, 3, "java/lang/Exception"),
            ExceptionEntry::catching(0, 2, 3, "java/lang/Error"),
        ],
    );
    let graph = build_graph("It.shared_handler", &body)?;

    let protected = graph.block_at(0).unwrap();
    let catches: Vec<_> = graph
        .successors(protected)
        .filter(|edge| edge.kind().is_exception())
        .collect();
    assert_eq!(catches.len(), 1);
    let EdgeKind::Catch(types) = catches[0].kind() else {
        panic!("expected a catch edge");
    };
    let names: Vec<&str> = types.types.iter().map(|name| name.as_ref()).collect();
    assert_eq!(names, vec!["java/lang/Error", "java/lang/Exception"]);
    Ok(())
}
