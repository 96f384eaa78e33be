//! Conditional classification.
//!
//! A two-way block not absorbed as a loop test heads a conditional. The
//! branch whose target has the smaller postorder is walked first; where
//! one branch falls straight into the other's head the shape is a plain
//! `if`, where both branches stall at the same end node it is an
//! `if`/`else` with that node as follow. Anything else is logged and
//! structured best-effort.

use crate::cfg::{BlockId, MethodGraph};
use crate::structure::engine::{claim, lowest_end, mark_head, two_way, walk_branch};
use crate::structure::tree::{BranchKey, CondKind, StructKind, StructTree};

pub(crate) fn classify(
    method: &str,
    graph: &mut MethodGraph,
    tree: &mut StructTree,
    head: BlockId,
) {
    let Some((true_edge, false_edge)) = two_way(graph, head) else {
        return;
    };
    let true_back = graph.edge(true_edge).is_back();
    let false_back = graph.edge(false_edge).is_back();
    if true_back && false_back {
        log::warn!(
            "{}: both branches of {} are back edges, leaving it unstructured",
            method,
            head
        );
        return;
    }
    let true_target = graph.edge(true_edge).target();
    let false_target = graph.edge(false_edge).target();
    let parent = graph.block(head).owner();
    if true_target == false_target {
        // both outcomes land on the same block, an empty conditional
        let id = tree.begin(StructKind::Cond(CondKind::If), head, parent);
        tree.struct_mut(id).set_follow(Some(true_target));
        mark_head(graph, head, id);
        return;
    }

    let postorder = |block: BlockId| graph.block(block).postorder().unwrap_or(0);
    let (first, second) = if true_back {
        (false_edge, true_edge)
    } else if false_back {
        (true_edge, false_edge)
    } else if postorder(true_target) <= postorder(false_target) {
        (true_edge, false_edge)
    } else {
        (false_edge, true_edge)
    };
    let first_is_true = first == true_edge;
    let first_target = graph.edge(first).target();
    let second_target = graph.edge(second).target();

    let (first_members, first_ends) = walk_branch(graph, first, &[]);
    if first_ends.is_empty() || first_ends.contains(&second_target) {
        // one-armed: the first branch exits or rejoins at the other target
        let kind = if first_is_true {
            CondKind::If
        } else {
            CondKind::IfNot
        };
        let id = tree.begin(StructKind::Cond(kind), head, parent);
        claim(graph, tree, id, &first_members);
        tree.struct_mut(id)
            .add_branch(BranchKey::Bool(first_is_true), first_members);
        tree.struct_mut(id).set_follow(Some(second_target));
        mark_head(graph, head, id);
        return;
    }
    let (second_members, second_ends) = walk_branch(graph, second, &[]);
    if second_ends.is_empty() || second_ends.contains(&first_target) {
        let kind = if first_is_true {
            CondKind::IfNot
        } else {
            CondKind::If
        };
        let id = tree.begin(StructKind::Cond(kind), head, parent);
        claim(graph, tree, id, &second_members);
        tree.struct_mut(id)
            .add_branch(BranchKey::Bool(!first_is_true), second_members);
        tree.struct_mut(id).set_follow(Some(first_target));
        mark_head(graph, head, id);
        return;
    }

    let first_low = lowest_end(&first_ends);
    let second_low = lowest_end(&second_ends);
    if first_low != second_low {
        log::warn!(
            "{}: branches of {} do not reconverge, structuring best-effort",
            method,
            head
        );
    }
    let kind = if first_is_true {
        CondKind::IfElse
    } else {
        CondKind::IfNotElse
    };
    let id = tree.begin(StructKind::Cond(kind), head, parent);
    claim(graph, tree, id, &first_members);
    claim(graph, tree, id, &second_members);
    tree.struct_mut(id)
        .add_branch(BranchKey::Bool(first_is_true), first_members);
    tree.struct_mut(id)
        .add_branch(BranchKey::Bool(!first_is_true), second_members);
    tree.struct_mut(id).set_follow(first_low);
    mark_head(graph, head, id);
}
