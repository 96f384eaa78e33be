//! Basic-block discovery and edge construction.
//!
//! The builder walks the operation stream from the entry PC, carving blocks
//! at control transfers, at discovered jump targets, and wherever the set of
//! active exception handlers changes, so that every block has a uniform
//! handler edge set. Targets are discovered lazily through an open-block
//! queue; a target landing inside an already-scanned block triggers a
//! *split* that carves off the head portion as a new block while the
//! original keeps its identity, its outgoing edges, and therefore any
//! self-loop or back edge pointing at it.
//!
//! Subroutines get their linkage in two halves: a `jsr` immediately gets a
//! call edge to the subroutine entry, while the return edge from the
//! matching `ret` block to the call site's continuation is attached in a
//! deferred resolution pass, because either side may be discovered first.
//!
//! Construction failures (unsupported opcode, switch without a default,
//! `ret` outside any subroutine, targets outside the PC range) are warned
//! about with the method name and abort only this method's graph.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use crate::cfg::{BlockId, CaseKeys, CatchTypes, EdgeKind, MethodGraph};
use crate::ir::{MethodBody, Op, Pc};
use crate::Result;

/// Builds the basic-block graph for one method.
///
/// On success the returned graph is fully postorder-numbered with back
/// edges marked. `method` only labels diagnostics.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] for an empty operation stream, an
/// out-of-range exception table or jump target, control falling off the
/// end of the code, a switch without a default target, a `ret` outside
/// any subroutine, or an [`Op::Unsupported`] operation.
pub fn build_graph(method: &str, body: &MethodBody) -> Result<MethodGraph> {
    GraphBuilder::new(method, body)?.run()
}

/// Call/return bookkeeping for one subroutine entry PC.
#[derive(Default)]
struct SubSites {
    /// Blocks ending in a `ret` that belongs to this subroutine.
    ret_blocks: Vec<BlockId>,
    /// Continuation PCs of discovered call sites, with the caller's own
    /// subroutine context.
    continuations: Vec<(Pc, Option<Pc>)>,
    /// Return edges already attached, keyed by (ret block, continuation).
    attached: HashSet<(BlockId, Pc)>,
}

struct GraphBuilder<'a> {
    method: &'a str,
    body: &'a MethodBody,
    graph: MethodGraph,
    /// Block starting at each PC, if any.
    starts: Vec<Option<BlockId>>,
    /// Block whose scanned range covers each PC, if any.
    covering: Vec<Option<BlockId>>,
    /// Active exception-table entries per PC, in declaration order.
    handler_sets: Vec<Vec<usize>>,
    /// Created but not yet scanned blocks.
    open: VecDeque<BlockId>,
    /// Subroutine entry context per block, parallel to the block arena.
    block_sub: Vec<Option<Pc>>,
    subs: BTreeMap<Pc, SubSites>,
}

impl<'a> GraphBuilder<'a> {
    fn new(method: &'a str, body: &'a MethodBody) -> Result<Self> {
        if body.is_empty() {
            return Err(malformed_error!("Operation stream of {} is empty", method));
        }

        for entry in body.exceptions() {
            if entry.start_pc >= entry.end_pc
                || entry.end_pc > body.len()
                || entry.handler_pc >= body.len()
            {
                return Err(malformed_error!(
                    "Exception entry {}..{} -> {} out of range in {}",
                    entry.start_pc,
                    entry.end_pc,
                    entry.handler_pc,
                    method
                ));
            }
        }

        let mut handler_sets = vec![Vec::new(); body.len()];
        for (index, entry) in body.exceptions().iter().enumerate() {
            for pc in entry.start_pc..entry.end_pc {
                handler_sets[pc].push(index);
            }
        }

        Ok(GraphBuilder {
            method,
            body,
            graph: MethodGraph::new(),
            starts: vec![None; body.len()],
            covering: vec![None; body.len()],
            handler_sets,
            open: VecDeque::new(),
            block_sub: Vec::new(),
            subs: BTreeMap::new(),
        })
    }

    fn run(mut self) -> Result<MethodGraph> {
        self.ensure_block_at(0, None)?;
        loop {
            while let Some(block) = self.open.pop_front() {
                self.scan(block)?;
            }
            if !self.resolve_sub_returns()? {
                break;
            }
        }

        let covering = std::mem::take(&mut self.covering);
        let mut graph = self.graph;
        graph.set_pc_map(covering);
        graph.assign_postorder();
        Ok(graph)
    }

    /// Returns the block starting at `pc`, creating or splitting as needed.
    ///
    /// A fresh block is queued for scanning; `sub` becomes its subroutine
    /// context. An existing block keeps the context it was created with.
    fn ensure_block_at(&mut self, pc: Pc, sub: Option<Pc>) -> Result<BlockId> {
        if pc >= self.body.len() {
            return Err(malformed_error!(
                "Jump target {} outside the PC range of {}",
                pc,
                self.method
            ));
        }
        if let Some(existing) = self.starts[pc] {
            return Ok(existing);
        }
        if let Some(hit) = self.covering[pc] {
            return self.split(hit, pc);
        }

        let id = self.graph.add_block(pc, pc);
        self.block_sub.push(sub);
        self.starts[pc] = Some(id);
        self.open.push_back(id);
        Ok(id)
    }

    /// Carves `original`'s head range off into a new block.
    ///
    /// The new head takes over the covered PCs below `pc` and every
    /// incoming edge; `original` shrinks to start at `pc` and keeps all
    /// outgoing edges, so a backward jump to `pc` lands on the tail.
    fn split(&mut self, original: BlockId, pc: Pc) -> Result<BlockId> {
        let start = self.graph.block(original).start_pc();
        let head = self.graph.add_block(start, pc);
        self.block_sub.push(self.block_sub[original.index()]);

        self.graph.retarget_incoming(original, head);
        self.graph.block_mut(original).start_pc = pc;
        self.starts[start] = Some(head);
        self.starts[pc] = Some(original);
        for covered in start..pc {
            self.covering[covered] = Some(head);
        }
        self.graph.add_edge(head, original, EdgeKind::Sequential);
        if start == 0 {
            self.graph.set_entry(head);
        }
        // The handler set is uniform across the original range, but the
        // catch edges stayed on the tail; the head gets its own copies.
        self.attach_catch_edges(head)?;
        Ok(original)
    }

    /// Scans one queued block: claims PCs until a block end, then attaches
    /// its outgoing control and exception edges.
    fn scan(&mut self, block: BlockId) -> Result<()> {
        let sub = self.block_sub[block.index()];
        let mut pc = self.graph.block(block).start_pc();

        loop {
            self.covering[pc] = Some(block);
            if self.body.ops()[pc].op.is_block_end() {
                self.graph.block_mut(block).end_pc = pc + 1;
                self.attach_terminal_edges(block, pc, sub)?;
                break;
            }

            let next = pc + 1;
            if next == self.body.len() {
                return Err(malformed_error!(
                    "Control falls off the end of {} at pc {}",
                    self.method,
                    pc
                ));
            }
            if self.starts[next].is_some() || self.handler_sets[next] != self.handler_sets[pc] {
                self.graph.block_mut(block).end_pc = next;
                let target = self.ensure_block_at(next, sub)?;
                self.graph.add_edge(block, target, EdgeKind::Sequential);
                break;
            }
            pc = next;
        }

        self.attach_catch_edges(block)
    }

    fn attach_terminal_edges(&mut self, block: BlockId, pc: Pc, sub: Option<Pc>) -> Result<()> {
        let op = self.body.ops()[pc].op.clone();
        match op {
            Op::Branch { target, .. } => {
                let taken = self.ensure_block_at(target, sub)?;
                self.graph.add_edge(block, taken, EdgeKind::Branch(true));
                let fall = self.ensure_block_at(pc + 1, sub)?;
                self.graph.add_edge(block, fall, EdgeKind::Branch(false));
            }
            Op::Goto { target } => {
                let target = self.ensure_block_at(target, sub)?;
                self.graph.add_edge(block, target, EdgeKind::Sequential);
            }
            Op::Switch { cases, default } => {
                let Some(default) = default else {
                    log::warn!(
                        "{}: switch at pc {} has no default target",
                        self.method,
                        pc
                    );
                    return Err(malformed_error!(
                        "Switch at pc {} in {} has no default target",
                        pc,
                        self.method
                    ));
                };
                let mut by_target: BTreeMap<Pc, CaseKeys> = BTreeMap::new();
                for (key, target) in cases {
                    by_target
                        .entry(target)
                        .or_insert_with(|| CaseKeys::of([]))
                        .keys
                        .insert(key);
                }
                by_target
                    .entry(default)
                    .or_insert_with(|| CaseKeys::of([]))
                    .has_default = true;
                for (target, keys) in by_target {
                    let target = self.ensure_block_at(target, sub)?;
                    self.graph.add_edge(block, target, EdgeKind::Case(keys));
                }
            }
            Op::Jsr { target } => {
                let entry = self.ensure_block_at(target, Some(target))?;
                self.graph.add_edge(block, entry, EdgeKind::SubCall);
                self.subs
                    .entry(target)
                    .or_default()
                    .continuations
                    .push((pc + 1, sub));
            }
            Op::Ret { .. } => {
                let Some(entry) = sub else {
                    log::warn!("{}: ret at pc {} outside any subroutine", self.method, pc);
                    return Err(malformed_error!(
                        "Ret at pc {} in {} is not inside a subroutine",
                        pc,
                        self.method
                    ));
                };
                self.subs.entry(entry).or_default().ret_blocks.push(block);
            }
            Op::Unsupported { opcode } => {
                log::warn!(
                    "{}: unsupported opcode 0x{:04x} at pc {}",
                    self.method,
                    opcode,
                    pc
                );
                return Err(malformed_error!(
                    "Unsupported opcode 0x{:04x} at pc {} in {}",
                    opcode,
                    pc,
                    self.method
                ));
            }
            Op::Return { .. } | Op::Throw => {}
            _ => {}
        }
        Ok(())
    }

    /// Attaches one `Catch` edge per distinct handler of the block's
    /// region, in ascending handler PC, each carrying the full type set.
    fn attach_catch_edges(&mut self, block: BlockId) -> Result<()> {
        let start = self.graph.block(block).start_pc();
        let sub = self.block_sub[block.index()];
        let active = self.handler_sets[start].clone();
        if active.is_empty() {
            return Ok(());
        }

        let mut by_handler: BTreeMap<Pc, CatchTypes> = BTreeMap::new();
        for index in active {
            let entry = &self.body.exceptions()[index];
            let types = by_handler.entry(entry.handler_pc).or_insert_with(|| CatchTypes {
                types: BTreeSet::new(),
                catches_any: false,
            });
            match &entry.catch_type {
                Some(name) => {
                    types.types.insert(name.clone());
                }
                None => types.catches_any = true,
            }
        }
        for (handler_pc, types) in by_handler {
            let handler = self.ensure_block_at(handler_pc, sub)?;
            self.graph.add_edge(block, handler, EdgeKind::Catch(types));
        }
        Ok(())
    }

    /// Attaches `SubReturn` edges for every known (ret, continuation)
    /// pair not yet linked. Returns whether anything new was attached,
    /// which may have queued fresh blocks to scan.
    fn resolve_sub_returns(&mut self) -> Result<bool> {
        let mut work = Vec::new();
        for (&entry, sites) in &self.subs {
            for &ret_block in &sites.ret_blocks {
                for &(continuation, caller_sub) in &sites.continuations {
                    if !sites.attached.contains(&(ret_block, continuation)) {
                        work.push((entry, ret_block, continuation, caller_sub));
                    }
                }
            }
        }

        let progressed = !work.is_empty();
        for (entry, ret_block, continuation, caller_sub) in work {
            let target = self.ensure_block_at(continuation, caller_sub)?;
            self.graph.add_edge(ret_block, target, EdgeKind::SubReturn);
            if let Some(sites) = self.subs.get_mut(&entry) {
                sites.attached.insert((ret_block, continuation));
            }
        }
        Ok(progressed)
    }
}
