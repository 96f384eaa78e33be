//! Switch classification.
//!
//! Case branches are walked in edge order, after moving the case only
//! the head reaches to the front. A branch that stalls at a later case's
//! target falls through: that case is pulled forward and its walk is
//! seeded with the blocks of the branch falling into it. The follow is
//! the earliest-created end node no branch absorbed.

use crate::cfg::{BlockId, CaseKeys, EdgeId, EdgeKind, MethodGraph};
use crate::structure::engine::{claim, lowest_end, mark_head, walk_branch};
use crate::structure::tree::{BranchKey, StructKind, StructTree, SwitchKind};

pub(crate) fn classify(
    method: &str,
    graph: &mut MethodGraph,
    tree: &mut StructTree,
    head: BlockId,
) {
    let mut ordered: Vec<(EdgeId, CaseKeys)> = graph
        .successors(head)
        .filter_map(|edge| match edge.kind() {
            EdgeKind::Case(keys) => Some((edge.id(), keys.clone())),
            _ => None,
        })
        .collect();
    let defaults = ordered.iter().filter(|(_, keys)| keys.has_default).count();
    if defaults != 1 {
        log::warn!(
            "{}: switch at {} carries {} default edges, leaving it unstructured",
            method,
            head,
            defaults
        );
        return;
    }
    // the case only the head reaches is emitted first
    if let Some(position) = ordered.iter().position(|(edge, _)| {
        let target = graph.edge(*edge).target();
        graph.predecessors(target).all(|pred| pred.source() == head)
    }) {
        let sole = ordered.remove(position);
        ordered.insert(0, sole);
    }

    let mut branches: Vec<(CaseKeys, Vec<BlockId>)> = Vec::new();
    let mut end_pool: Vec<BlockId> = Vec::new();
    let mut seed: Vec<BlockId> = Vec::new();
    let mut index = 0;
    while index < ordered.len() {
        let (edge, keys) = ordered[index].clone();
        if graph.edge(edge).is_back() {
            // jumps straight back into an enclosing loop, an empty branch
            branches.push((keys, Vec::new()));
            seed = Vec::new();
            index += 1;
            continue;
        }
        let (members, ends) = walk_branch(graph, edge, &seed);
        let mut next_seed: Vec<BlockId> = Vec::new();
        for &end in &ends {
            let later = ordered[index + 1..]
                .iter()
                .position(|(later, _)| graph.edge(*later).target() == end);
            if let Some(offset) = later {
                if graph.block(end).predecessors().len() > 1 {
                    // this branch falls through into that case: walk it
                    // next, seeded so the fall-in edge resolves
                    let pulled = ordered.remove(index + 1 + offset);
                    ordered.insert(index + 1, pulled);
                    if next_seed.is_empty() {
                        next_seed.extend(seed.iter().copied());
                        next_seed.extend(members.iter().copied());
                    }
                    continue;
                }
            }
            if !end_pool.contains(&end) {
                end_pool.push(end);
            }
        }
        seed = next_seed;
        branches.push((keys, members));
        index += 1;
    }

    let claimed: Vec<BlockId> = branches
        .iter()
        .flat_map(|(_, blocks)| blocks.iter().copied())
        .collect();
    end_pool.retain(|end| !claimed.contains(end));
    let follow = lowest_end(&end_pool);
    let kind = if ordered.len() == 1 {
        SwitchKind::NoDefault
    } else if follow.is_none() {
        SwitchKind::WithDefault
    } else {
        SwitchKind::Switch
    };
    let parent = graph.block(head).owner();
    let id = tree.begin(StructKind::Switch(kind), head, parent);
    for (keys, blocks) in branches {
        claim(graph, tree, id, &blocks);
        tree.struct_mut(id).add_branch(BranchKey::Cases(keys), blocks);
    }
    tree.struct_mut(id).set_follow(follow);
    mark_head(graph, head, id);
}
