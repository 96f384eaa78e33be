//! The per-method graph arena.
//!
//! [`MethodGraph`] owns every block and edge of one method, addressed by
//! [`BlockId`]/[`EdgeId`] indices. The arena is append-only: splitting a
//! block creates a new block rather than removing one, so identifiers stay
//! valid for the lifetime of the analysis and creation order is preserved
//! as a tie-breaking total order.
//!
//! # Postorder
//!
//! After construction the graph runs one explicit-stack depth-first pass
//! from the entry block, assigning each reachable block its DFS finish
//! index. The entry block finishes last and therefore carries the largest
//! number. An edge is a *back edge* iff its target's number is greater than
//! or equal to its source's; the pass stamps that flag onto every edge so
//! later stages never re-derive it.
//!
//! # Rendering
//!
//! [`MethodGraph::to_dot`] produces a Graphviz view of the annotated graph
//! with edge discriminants as labels, exception edges dashed and back edges
//! highlighted, which is the quickest way to inspect a miscompiled method.

use crate::cfg::{BasicBlock, BlockId, Edge, EdgeId, EdgeKind};
use crate::ir::Pc;

/// Explicit DFS stack entry for the postorder pass.
enum State {
    Enter,
    Exit,
}

/// Arena of blocks and edges for one method, plus the postorder index.
#[derive(Debug, Clone, Default)]
pub struct MethodGraph {
    blocks: Vec<BasicBlock>,
    edges: Vec<Edge>,
    entry: Option<BlockId>,
    postorder_list: Vec<BlockId>,
    pc_map: Vec<Option<BlockId>>,
}

impl MethodGraph {
    /// Creates an empty graph.
    #[must_use]
    pub(crate) fn new() -> Self {
        MethodGraph::default()
    }

    /// Appends a block covering `start_pc..end_pc`.
    pub(crate) fn add_block(&mut self, start_pc: Pc, end_pc: Pc) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        self.blocks.push(BasicBlock::new(id, start_pc, end_pc));
        if self.entry.is_none() {
            self.entry = Some(id);
        }
        id
    }

    /// Appends an edge and links it into both endpoint blocks.
    pub(crate) fn add_edge(&mut self, source: BlockId, target: BlockId, kind: EdgeKind) -> EdgeId {
        let id = EdgeId::new(self.edges.len());
        self.edges.push(Edge::new(id, source, target, kind));
        self.blocks[source.index()].successors.push(id);
        self.blocks[target.index()].predecessors.push(id);
        id
    }

    /// Moves every incoming edge of `from` onto `to`.
    ///
    /// Used exactly once per block split: the new head block takes over
    /// the original's predecessors while the original keeps its outgoing
    /// edges, so self-loops and back edges keep pointing at the tail.
    pub(crate) fn retarget_incoming(&mut self, from: BlockId, to: BlockId) {
        let moved = std::mem::take(&mut self.blocks[from.index()].predecessors);
        for &edge_id in &moved {
            self.edges[edge_id.index()].target = to;
        }
        self.blocks[to.index()].predecessors = moved;
    }

    pub(crate) fn set_entry(&mut self, entry: BlockId) {
        self.entry = Some(entry);
    }

    pub(crate) fn set_pc_map(&mut self, map: Vec<Option<BlockId>>) {
        self.pc_map = map;
    }

    /// The entry block.
    ///
    /// # Panics
    ///
    /// Panics if the graph has no blocks yet; a built graph always has an
    /// entry.
    #[must_use]
    pub fn entry(&self) -> BlockId {
        self.entry.expect("graph has no entry block")
    }

    /// Number of blocks in the arena.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of edges in the arena.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// The block with the given identifier.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }

    /// The edge with the given identifier.
    #[must_use]
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    /// All blocks in creation order.
    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter()
    }

    /// All edges in creation order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Reachable blocks in ascending postorder.
    pub fn blocks_postorder(&self) -> impl Iterator<Item = &BasicBlock> {
        self.postorder_list.iter().map(|id| self.block(*id))
    }

    /// Identifiers of reachable blocks in ascending postorder.
    #[must_use]
    pub fn postorder(&self) -> &[BlockId] {
        &self.postorder_list
    }

    /// The block covering `pc`, if `pc` is reachable code.
    #[must_use]
    pub fn block_at(&self, pc: Pc) -> Option<BlockId> {
        self.pc_map.get(pc).copied().flatten()
    }

    /// Outgoing edges of `id` in attachment order.
    pub fn successors(&self, id: BlockId) -> impl Iterator<Item = &Edge> {
        self.blocks[id.index()]
            .successors
            .iter()
            .map(|edge_id| self.edge(*edge_id))
    }

    /// Incoming edges of `id` in attachment order.
    pub fn predecessors(&self, id: BlockId) -> impl Iterator<Item = &Edge> {
        self.blocks[id.index()]
            .predecessors
            .iter()
            .map(|edge_id| self.edge(*edge_id))
    }

    /// Runs the postorder pass and stamps every edge's back flag.
    ///
    /// Depth-first from the entry with an explicit enter/exit stack; a
    /// block's successors are tried in edge attachment order. Reachable
    /// blocks receive numbers `0..k` in finish order, the entry last.
    pub(crate) fn assign_postorder(&mut self) {
        let Some(entry) = self.entry else {
            return;
        };

        let mut visited = vec![false; self.blocks.len()];
        let mut sequence = Vec::with_capacity(self.blocks.len());
        let mut stack = vec![(entry, State::Enter)];

        while let Some((id, state)) = stack.pop() {
            match state {
                State::Enter => {
                    if visited[id.index()] {
                        continue;
                    }
                    visited[id.index()] = true;
                    stack.push((id, State::Exit));
                    // Reversed push so the first-attached edge is walked first.
                    for pos in (0..self.blocks[id.index()].successors.len()).rev() {
                        let edge_id = self.blocks[id.index()].successors[pos];
                        let target = self.edges[edge_id.index()].target;
                        if !visited[target.index()] {
                            stack.push((target, State::Enter));
                        }
                    }
                }
                State::Exit => {
                    self.blocks[id.index()].postorder = Some(sequence.len());
                    sequence.push(id);
                }
            }
        }

        self.postorder_list = sequence;

        let numbers: Vec<Option<usize>> =
            self.blocks.iter().map(BasicBlock::postorder).collect();
        for edge in &mut self.edges {
            if let (Some(source), Some(target)) =
                (numbers[edge.source.index()], numbers[edge.target.index()])
            {
                edge.back = target >= source;
            }
        }
    }

    /// Renders the graph in Graphviz DOT format.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let dot = analysis.graph().to_dot();
    /// std::fs::write("method.dot", dot)?;
    /// ```
    #[must_use]
    pub fn to_dot(&self) -> String {
        use std::fmt::Write;

        let mut out = String::from("digraph cfg {\n");
        out.push_str("    node [shape=box, fontname=\"monospace\"];\n");

        for block in &self.blocks {
            let postorder = block
                .postorder()
                .map_or_else(|| "-".to_string(), |n| n.to_string());
            let _ = writeln!(
                out,
                "    {} [label=\"{} pc {}..{} po {}\"{}];",
                block.id(),
                block.id(),
                block.start_pc(),
                block.end_pc(),
                postorder,
                if Some(block.id()) == self.entry {
                    ", penwidth=2"
                } else {
                    ""
                }
            );
        }

        for edge in &self.edges {
            let mut attrs = Vec::new();
            let label = edge.kind().label();
            if !label.is_empty() {
                attrs.push(format!("label=\"{}\"", label));
            }
            if edge.kind().is_exception() {
                attrs.push("style=dashed".to_string());
            }
            if edge.is_back() {
                attrs.push("color=red".to_string());
            }
            let _ = writeln!(
                out,
                "    {} -> {}{};",
                edge.source(),
                edge.target(),
                if attrs.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", attrs.join(", "))
                }
            );
        }

        out.push_str("}\n");
        out
    }
}
