//! The structuring sweep and the branch walk shared by all classifiers.
//!
//! Blocks are visited in descending postorder, so a structure's head is
//! always reached before the heads nested inside it. Each classifier
//! claims its member blocks as it runs, which makes parent attribution a
//! single lookup: whoever owns a head when its structure is created is
//! the enclosing structure. Classification never fails a method; shapes
//! that match nothing are logged and left unstructured.

use crate::cfg::{BlockId, EdgeId, MethodGraph};
use crate::structure::tree::{StructId, StructTree};
use crate::structure::{conds, loops, switches};

/// Recovers nested conditionals, loops and switches from `graph`.
///
/// Writes ownership and head marks back onto the blocks and returns the
/// structure tree, outer entries before the structures they enclose.
pub fn build_structure(method: &str, graph: &mut MethodGraph) -> StructTree {
    let mut tree = StructTree::new();
    let order: Vec<BlockId> = graph.postorder().iter().rev().copied().collect();
    let mut absorbed = vec![false; graph.block_count()];
    for head in order {
        if is_loop_head(graph, head) {
            if let Some(test_block) = loops::classify(graph, &mut tree, head) {
                absorbed[test_block.index()] = true;
            }
        }
        // a block whose branch became a loop test heads nothing else
        if absorbed[head.index()] {
            continue;
        }
        if graph.successors(head).any(|edge| edge.kind().is_case()) {
            switches::classify(method, graph, &mut tree, head);
        } else if two_way(graph, head).is_some() {
            conds::classify(method, graph, &mut tree, head);
        }
    }
    tree
}

/// Whether `block` is the target of a non-exception back edge.
pub(crate) fn is_loop_head(graph: &MethodGraph, block: BlockId) -> bool {
    graph
        .predecessors(block)
        .any(|edge| edge.is_back() && !edge.kind().is_exception())
}

/// The true and false edges of a two-way block, if it has both.
pub(crate) fn two_way(graph: &MethodGraph, block: BlockId) -> Option<(EdgeId, EdgeId)> {
    let mut true_edge = None;
    let mut false_edge = None;
    for edge in graph.successors(block) {
        match edge.kind().branch_value() {
            Some(true) => true_edge = Some(edge.id()),
            Some(false) => false_edge = Some(edge.id()),
            None => {}
        }
    }
    Some((true_edge?, false_edge?))
}

/// Collects the blocks of one branch, entered through `entry`.
///
/// A frontier block joins the branch once every incoming forward edge is
/// accounted for: the entry edge itself, an edge from a block already in
/// the branch, or an edge from a `seed` block absorbed by an earlier
/// branch of the same structure. Deferring a block until its
/// predecessors resolve keeps joins internal to the branch from being
/// mistaken for follow candidates. Whatever never resolves is an end
/// node where the branch meets the rest of the method. Back and
/// exception edges are invisible to the walk.
pub(crate) fn walk_branch(
    graph: &MethodGraph,
    entry: EdgeId,
    seed: &[BlockId],
) -> (Vec<BlockId>, Vec<BlockId>) {
    let head = graph.edge(entry).source();
    let start = graph.edge(entry).target();
    if start == head {
        return (Vec::new(), vec![start]);
    }
    let mut members: Vec<BlockId> = Vec::new();
    let mut frontier: Vec<BlockId> = vec![start];
    loop {
        let mut progressed = false;
        let mut index = 0;
        while index < frontier.len() {
            let candidate = frontier[index];
            let admissible = graph.predecessors(candidate).all(|edge| {
                edge.id() == entry
                    || edge.is_back()
                    || edge.kind().is_exception()
                    || members.contains(&edge.source())
                    || seed.contains(&edge.source())
            });
            if !admissible {
                index += 1;
                continue;
            }
            frontier.remove(index);
            members.push(candidate);
            for edge in graph.successors(candidate) {
                if edge.is_back() || edge.kind().is_exception() {
                    continue;
                }
                let target = edge.target();
                if target != head && !members.contains(&target) && !frontier.contains(&target) {
                    frontier.push(target);
                }
            }
            progressed = true;
        }
        if !progressed {
            break;
        }
    }
    (members, frontier)
}

/// Claims `blocks` for `owner`. A block claimed again moves to the new
/// structure, leaving both the ownership mark and the member lists
/// naming only the innermost structure containing it.
pub(crate) fn claim(
    graph: &mut MethodGraph,
    tree: &mut StructTree,
    owner: StructId,
    blocks: &[BlockId],
) {
    for &block in blocks {
        if let Some(previous) = graph.block(block).owner() {
            if previous != owner {
                tree.struct_mut(previous).remove_member(block);
            }
        }
        graph.block_mut(block).owner = Some(owner);
    }
}

/// Marks `head` as heading `id`, keeping the first mark when several
/// structures share a head block.
pub(crate) fn mark_head(graph: &mut MethodGraph, head: BlockId, id: StructId) {
    let block = graph.block_mut(head);
    if block.head_of.is_none() {
        block.head_of = Some(id);
    }
}

/// The earliest-created end node, used as the follow block.
pub(crate) fn lowest_end(ends: &[BlockId]) -> Option<BlockId> {
    ends.iter().copied().min_by_key(|block| block.index())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::build_graph;
    use crate::structure::tree::{CondKind, LoopKind, StructKind};
    use crate::test::MethodAssembler;

    fn structure(assembler: MethodAssembler) -> (MethodGraph, StructTree) {
        let body = assembler.body();
        let mut graph = build_graph("Sample.test", &body).unwrap();
        let tree = build_structure("Sample.test", &mut graph);
        (graph, tree)
    }

    /// A conditional nested in a loop body hangs off the loop:
    ///
    /// ```text
    ///   0: iconst 1
    ///   1: ifeq 8      <- loop guard, exits to 8
    ///   2: iconst 1
    ///   3: ifeq 6      <- inner guard, skips to 6
    ///   4: iconst 5
    ///   5: istore 0
    ///   6: iinc 0 1
    ///   7: goto 0      <- back edge
    ///   8: return
    /// ```
    #[test]
    fn cond_inside_loop_hangs_off_the_loop() {
        let (graph, tree) = structure(
            MethodAssembler::new()
                .iconst(1)
                .ifeq(8)
                .iconst(1)
                .ifeq(6)
                .iconst(5)
                .istore(0)
                .iinc(0, 1)
                .goto(0)
                .vreturn(),
        );

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.roots().count(), 1);
        let outer = tree.roots().next().unwrap();
        let inner = tree.children(outer.id()).next().unwrap();
        assert_eq!(outer.kind(), StructKind::Loop(LoopKind::WhileNot));
        assert_eq!(inner.kind(), StructKind::Cond(CondKind::IfNot));
        assert_eq!(inner.parent(), Some(outer.id()));

        // the inner guard block stays owned by the loop, its branch body
        // moves to the conditional
        let guard = graph.block_at(2).unwrap();
        let body = graph.block_at(4).unwrap();
        assert_eq!(graph.block(guard).owner(), Some(outer.id()));
        assert_eq!(graph.block(body).owner(), Some(inner.id()));
        assert_eq!(graph.block(guard).head_of(), Some(inner.id()));
        assert!(outer.is_member(guard));
        assert!(!outer.is_member(body));
        assert!(inner.is_member(body));

        let chain: Vec<_> = tree.ancestors(inner.id()).map(|s| s.id()).collect();
        assert_eq!(chain, vec![outer.id()]);
    }

    /// The loop guard consumes its head block: no extra conditional is
    /// recovered for the branch that became the loop test.
    #[test]
    fn pre_test_head_is_not_reclassified() {
        let (_, tree) = structure(
            MethodAssembler::new()
                .iconst(1)
                .ifeq(5)
                .iinc(0, 1)
                .nop()
                .goto(0)
                .vreturn(),
        );

        assert_eq!(tree.len(), 1);
        let root = tree.roots().next().unwrap();
        assert_eq!(root.kind(), StructKind::Loop(LoopKind::WhileNot));
    }

    /// A branch whose inner diamond reconverges inside the arm keeps the
    /// join as a member instead of cutting the arm short:
    ///
    /// ```text
    ///   0: iconst 1
    ///   1: ifeq 11     <- outer guard
    ///   2: iconst 1
    ///   3: ifeq 7      <- inner if/else
    ///   4: iconst 5
    ///   5: istore 0
    ///   6: goto 9
    ///   7: iconst 6
    ///   8: istore 0
    ///   9: iconst 0
    ///  10: istore 0    <- inner join, still inside the outer arm
    ///  11: return
    /// ```
    #[test]
    fn inner_join_stays_inside_the_branch() {
        let (graph, tree) = structure(
            MethodAssembler::new()
                .iconst(1)
                .ifeq(11)
                .iconst(1)
                .ifeq(7)
                .iconst(5)
                .istore(0)
                .goto(9)
                .iconst(6)
                .istore(0)
                .iconst(0)
                .istore(0)
                .vreturn(),
        );

        assert_eq!(tree.len(), 2);
        let outer = tree.roots().next().unwrap();
        let inner = tree.children(outer.id()).next().unwrap();
        let join = graph.block_at(9).unwrap();
        let exit = graph.block_at(11).unwrap();

        assert_eq!(outer.kind(), StructKind::Cond(CondKind::IfNot));
        assert!(outer.is_member(join));
        assert_eq!(outer.follow(), Some(exit));

        assert_eq!(inner.kind(), StructKind::Cond(CondKind::IfElse));
        assert_eq!(inner.parent(), Some(outer.id()));
        assert_eq!(inner.follow(), Some(join));
        // the join is the inner follow, so the outer structure keeps it
        assert_eq!(graph.block(join).owner(), Some(outer.id()));
    }

    #[test]
    fn straight_line_method_has_no_structures() {
        let (_, tree) = structure(
            MethodAssembler::new().iconst(1).istore(0).vreturn(),
        );
        assert!(tree.is_empty());
    }

    #[test]
    fn branch_walk_defers_until_predecessors_resolve() {
        let body = MethodAssembler::new()
            .iconst(1)
            .ifeq(11)
            .iconst(1)
            .ifeq(7)
            .iconst(5)
            .istore(0)
            .goto(9)
            .iconst(6)
            .istore(0)
            .iconst(0)
            .istore(0)
            .vreturn()
            .body();
        let graph = build_graph("Sample.test", &body).unwrap();

        let head = graph.block_at(0).unwrap();
        let (_, false_edge) = two_way(&graph, head).unwrap();
        let (members, ends) = walk_branch(&graph, false_edge, &[]);

        let join = graph.block_at(9).unwrap();
        let exit = graph.block_at(11).unwrap();
        assert!(members.contains(&join));
        assert_eq!(ends, vec![exit]);
    }
}
