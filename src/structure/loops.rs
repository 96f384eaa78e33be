//! Loop classification.
//!
//! A block targeted by a non-exception back edge heads a loop. Members
//! are the natural loop: everything that reaches a latching block without
//! crossing the head. The guard is then found at the head (pre-test) or
//! at the latest latching block (post-test); when both qualify, the tail
//! exit's closure decides which branch is the real test.

use crate::cfg::{BlockId, EdgeId, MethodGraph};
use crate::structure::engine::{claim, mark_head, two_way, walk_branch};
use crate::structure::tree::{BranchKey, LoopKind, StructKind, StructTree};

struct PreTest {
    exit_edge: EdgeId,
    body_on_true: bool,
}

struct PostTest {
    exit_edge: EdgeId,
    latch_on_true: bool,
}

enum Guard {
    Pre(PreTest),
    Post(PostTest),
}

/// Classifies `head` as a loop head. Returns the block whose branch was
/// absorbed as the loop test, if any; that block must not additionally
/// head a conditional.
pub(crate) fn classify(
    graph: &mut MethodGraph,
    tree: &mut StructTree,
    head: BlockId,
) -> Option<BlockId> {
    let back_sources: Vec<BlockId> = graph
        .predecessors(head)
        .filter(|edge| edge.is_back() && !edge.kind().is_exception())
        .map(|edge| edge.source())
        .collect();
    let tail = back_sources
        .iter()
        .copied()
        .max_by_key(|block| block.index())?;

    // natural loop: walk backward from the latching blocks to the head
    let mut members: Vec<BlockId> = vec![head];
    let mut stack: Vec<BlockId> = back_sources;
    while let Some(block) = stack.pop() {
        if members.contains(&block) {
            continue;
        }
        members.push(block);
        for edge in graph.predecessors(block) {
            if edge.is_back() || edge.kind().is_exception() {
                continue;
            }
            let source = edge.source();
            if !members.contains(&source) && !stack.contains(&source) {
                stack.push(source);
            }
        }
    }

    let pre = two_way(graph, head).and_then(|(true_edge, false_edge)| {
        let true_in = members.contains(&graph.edge(true_edge).target());
        let false_in = members.contains(&graph.edge(false_edge).target());
        match (true_in, false_in) {
            (true, false) => Some(PreTest {
                exit_edge: false_edge,
                body_on_true: true,
            }),
            (false, true) => Some(PreTest {
                exit_edge: true_edge,
                body_on_true: false,
            }),
            _ => None,
        }
    });
    let post = if tail == head {
        None
    } else {
        two_way(graph, tail).and_then(|(true_edge, false_edge)| {
            if graph.edge(true_edge).target() == head {
                Some(PostTest {
                    exit_edge: false_edge,
                    latch_on_true: true,
                })
            } else if graph.edge(false_edge).target() == head {
                Some(PostTest {
                    exit_edge: true_edge,
                    latch_on_true: false,
                })
            } else {
                None
            }
        })
    };
    let guard = match (pre, post) {
        (Some(pre), None) => Some(Guard::Pre(pre)),
        (None, Some(post)) => Some(Guard::Post(post)),
        (None, None) => None,
        (Some(pre), Some(post)) => {
            // the guard exit resurfacing behind the tail exit means the
            // head branch is an ordinary conditional inside a post-test
            // loop; otherwise the pre-test reading wins
            let guard_exit = graph.edge(pre.exit_edge).target();
            let (_, tail_ends) = walk_branch(graph, post.exit_edge, &[]);
            if tail_ends.contains(&guard_exit) {
                Some(Guard::Post(post))
            } else {
                Some(Guard::Pre(pre))
            }
        }
    };

    let (kind, follow, absorbed) = match guard {
        Some(Guard::Pre(pre)) => {
            let kind = if pre.body_on_true {
                LoopKind::While
            } else {
                LoopKind::WhileNot
            };
            (kind, Some(graph.edge(pre.exit_edge).target()), Some(head))
        }
        Some(Guard::Post(post)) => {
            let kind = if post.latch_on_true {
                LoopKind::DoWhile
            } else {
                LoopKind::DoWhileNot
            };
            (kind, Some(graph.edge(post.exit_edge).target()), Some(tail))
        }
        None => (LoopKind::Endless, None, None),
    };
    let parent = graph.block(head).owner();
    let id = tree.begin(StructKind::Loop(kind), head, parent);
    claim(graph, tree, id, &members);
    tree.struct_mut(id).add_branch(BranchKey::Body, members);
    tree.struct_mut(id).set_follow(follow);
    mark_head(graph, head, id);
    absorbed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::build_graph;
    use crate::structure::build_structure;
    use crate::test::MethodAssembler;

    fn structure(assembler: MethodAssembler) -> (MethodGraph, StructTree) {
        let body = assembler.body();
        let mut graph = build_graph("Sample.test", &body).unwrap();
        let tree = build_structure("Sample.test", &mut graph);
        (graph, tree)
    }

    /// Head tests, body on the false edge, exit on the true edge.
    #[test]
    fn head_guard_is_while_not() {
        let (graph, tree) = structure(
            MethodAssembler::new()
                .iconst(1)
                .ifeq(5)
                .iinc(0, 1)
                .nop()
                .goto(0)
                .vreturn(),
        );

        assert_eq!(tree.len(), 1);
        let lp = tree.roots().next().unwrap();
        let head = graph.block_at(0).unwrap();
        let body = graph.block_at(2).unwrap();
        let exit = graph.block_at(5).unwrap();

        assert_eq!(lp.kind(), StructKind::Loop(LoopKind::WhileNot));
        assert_eq!(lp.head(), head);
        assert_eq!(lp.branch(&BranchKey::Body), Some(&[head, body][..]));
        assert_eq!(lp.follow(), Some(exit));
        assert_eq!(graph.block(head).owner(), Some(lp.id()));
        assert_eq!(graph.block(body).owner(), Some(lp.id()));
        assert_eq!(graph.block(head).head_of(), Some(lp.id()));
    }

    /// The compiled while shape jumps to a bottom test first; the test
    /// block gets the lower postorder, so the body edge into it is the
    /// back edge and the loop still reads as pre-test.
    #[test]
    fn bottom_test_entry_jump_is_while() {
        let (graph, tree) = structure(
            MethodAssembler::new()
                .goto(3)
                .iinc(0, 1)
                .nop()
                .iload(0)
                .iconst(5)
                .if_icmplt(1)
                .vreturn(),
        );

        assert_eq!(tree.len(), 1);
        let lp = tree.roots().next().unwrap();
        let test = graph.block_at(3).unwrap();
        let body = graph.block_at(1).unwrap();

        assert_eq!(lp.kind(), StructKind::Loop(LoopKind::While));
        assert_eq!(lp.head(), test);
        assert!(lp.is_member(body));
        assert_eq!(lp.follow(), Some(graph.block_at(6).unwrap()));
    }

    /// Body first, guard at the tail branching back: a post-test loop.
    /// The tail's branch is absorbed as the loop test and heads nothing
    /// else.
    #[test]
    fn tail_guard_is_do_while() {
        let (graph, tree) = structure(
            MethodAssembler::new()
                .iconst(0)
                .istore(0)
                .iinc(0, 1)
                .goto(4)
                .iload(0)
                .iconst(5)
                .if_icmplt(2)
                .vreturn(),
        );

        assert_eq!(tree.len(), 1);
        let lp = tree.roots().next().unwrap();
        let body = graph.block_at(2).unwrap();
        let tail = graph.block_at(4).unwrap();

        assert_eq!(lp.kind(), StructKind::Loop(LoopKind::DoWhile));
        assert_eq!(lp.head(), body);
        assert_eq!(lp.branch(&BranchKey::Body), Some(&[body, tail][..]));
        assert_eq!(lp.follow(), Some(graph.block_at(7).unwrap()));
        assert!(tree.iter().all(|s| s.head() != tail));
    }

    #[test]
    fn self_spin_is_endless() {
        let (graph, tree) = structure(MethodAssembler::new().nop().goto(0));

        assert_eq!(tree.len(), 1);
        let lp = tree.roots().next().unwrap();
        assert_eq!(lp.kind(), StructKind::Loop(LoopKind::Endless));
        assert_eq!(lp.head(), graph.block_at(0).unwrap());
        assert_eq!(lp.branch(&BranchKey::Body), Some(&[lp.head()][..]));
        assert_eq!(lp.follow(), None);
    }

    /// Head and tail both test. The head exit reappears behind the tail
    /// exit, so the tail wins and the loop is post-test:
    ///
    /// ```text
    ///   0: iconst 1
    ///   1: ifeq 8      <- head branch, exits to the shared join
    ///   2: iinc 0 1
    ///   3: iconst 1
    ///   4: ifne 0      <- tail guard, back edge to 0
    ///   5: iconst 3
    ///   6: istore 0
    ///   7: goto 8      <- tail exit path reaches the join
    ///   8: return
    /// ```
    #[test]
    fn competing_guards_prefer_the_tail_when_its_exit_reaches_the_head_exit() {
        let (graph, tree) = structure(
            MethodAssembler::new()
                .iconst(1)
                .ifeq(8)
                .iinc(0, 1)
                .iconst(1)
                .ifne(0)
                .iconst(3)
                .istore(0)
                .goto(8)
                .vreturn(),
        );

        let lp = tree
            .iter()
            .find(|s| matches!(s.kind(), StructKind::Loop(_)))
            .unwrap();
        let tail = graph.block_at(2).unwrap();
        let tail_exit = graph.block_at(5).unwrap();

        assert_eq!(lp.kind(), StructKind::Loop(LoopKind::DoWhile));
        assert_eq!(lp.follow(), Some(tail_exit));
        // the absorbed tail heads nothing
        assert!(tree.iter().all(|s| s.head() != tail));
    }

    /// Head and tail both test, but the tail exit returns without ever
    /// reaching the head exit: the pre-test reading wins.
    #[test]
    fn competing_guards_prefer_the_head_otherwise() {
        let (graph, tree) = structure(
            MethodAssembler::new()
                .iconst(1)
                .ifeq(7)
                .iinc(0, 1)
                .iconst(1)
                .ifne(0)
                .nop()
                .vreturn()
                .vreturn(),
        );

        let lp = tree
            .iter()
            .find(|s| matches!(s.kind(), StructKind::Loop(_)))
            .unwrap();
        assert_eq!(lp.kind(), StructKind::Loop(LoopKind::WhileNot));
        assert_eq!(lp.follow(), Some(graph.block_at(7).unwrap()));
    }
}
