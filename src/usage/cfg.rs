//! Slow tier: reaching writes over a control flow graph
//!
//! The code unit is lowered to basic blocks of usage events. The entry block
//! holds the initial writes of the parameters and the exit block holds the
//! implicit reads of ref/out parameters. A forward fixpoint computes which
//! writes reach each block, then a replay marks the writes every read sees.

use super::walker::{self, captured_symbols, FlowVisitor, WriteId, WriteTable};
use super::{SymbolUsageResult, UsageContext, UsageFacts};
use crate::cancellation::CancellationToken;
use crate::error::{Error, Result};
use crate::ir::{CodeUnit, Operation, SymbolId, SymbolTable};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{DfsPostOrder, EdgeRef};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet};

const MAX_ITERATIONS: usize = 1000;

/// Edge kind in the usage graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowEdge {
    /// Straight-line fallthrough
    Fall,
    /// Condition held
    True,
    /// Condition failed
    False,
    /// Loop back edge
    Back,
    /// Early return to the exit block
    Return,
}

/// A usage fact in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageEvent {
    Read(SymbolId),
    Write(WriteId),
    /// Implicit read of a ref/out parameter when control leaves the unit
    ExitRead(SymbolId),
}

#[derive(Debug, Clone, Default)]
pub struct UsageBlock {
    pub events: Vec<UsageEvent>,
}

impl UsageBlock {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Control flow graph of one code unit, annotated with usage events
pub struct UsageGraph<'a> {
    graph: DiGraph<UsageBlock, FlowEdge>,
    entry: NodeIndex,
    exit: NodeIndex,
    writes: WriteTable<'a>,
    reads: HashSet<SymbolId>,
    captured: HashSet<SymbolId>,
}

impl<'a> UsageGraph<'a> {
    /// Lower `unit` into a usage graph
    pub fn build(
        unit: &'a CodeUnit,
        context: &UsageContext<'a>,
        cancellation: &CancellationToken,
    ) -> Result<Self> {
        let mut graph = DiGraph::new();
        let entry = graph.add_node(UsageBlock::default());
        let exit = graph.add_node(UsageBlock::default());
        let mut builder = GraphBuilder {
            context,
            cancellation,
            graph,
            current: entry,
            exit,
            writes: WriteTable::new(),
            reads: HashSet::new(),
            reachable: HashSet::from([entry]),
        };

        for parameter in &context.declaration.parameters {
            if context.is_tracked(*parameter) {
                let id = builder.writes.intern(*parameter, None);
                builder.push(UsageEvent::Write(id));
            }
        }
        let body = builder.start_block(FlowEdge::Fall);
        builder.current = body;

        walker::walk(&mut builder, &unit.body)?;
        builder.connect(builder.current, exit, FlowEdge::Fall);

        for parameter in context.ref_or_out_parameters() {
            builder.graph[exit].events.push(UsageEvent::ExitRead(parameter));
        }

        let captured = captured_symbols(context, &unit.body);
        log::debug!(
            "Usage graph for '{}': {} blocks, {} edges, {} writes",
            context.declaration.name,
            builder.graph.node_count(),
            builder.graph.edge_count(),
            builder.writes.len()
        );

        Ok(Self {
            graph: builder.graph,
            entry,
            exit,
            writes: builder.writes,
            reads: builder.reads,
            captured,
        })
    }

    pub fn graph(&self) -> &DiGraph<UsageBlock, FlowEdge> {
        &self.graph
    }

    pub fn writes(&self) -> &WriteTable<'a> {
        &self.writes
    }

    /// Blocks in reverse post-order from the entry, unreachable blocks last
    fn block_order(&self) -> Vec<NodeIndex> {
        let mut post_order = Vec::new();
        let mut dfs = DfsPostOrder::new(&self.graph, self.entry);
        while let Some(node) = dfs.next(&self.graph) {
            post_order.push(node);
        }
        post_order.reverse();

        let reached: HashSet<NodeIndex> = post_order.iter().copied().collect();
        post_order.extend(self.graph.node_indices().filter(|n| !reached.contains(n)));
        post_order
    }

    fn transfer(&self, state: &mut BTreeSet<WriteId>, event: UsageEvent) {
        if let UsageEvent::Write(id) = event {
            let symbol = self.writes.symbol_of(id);
            state.retain(|other| self.writes.symbol_of(*other) != symbol);
            state.insert(id);
        }
    }

    /// Writes reaching the start of every block
    fn reaching_in(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<HashMap<NodeIndex, BTreeSet<WriteId>>> {
        let order = self.block_order();
        let mut reach_in: HashMap<NodeIndex, BTreeSet<WriteId>> =
            order.iter().map(|n| (*n, BTreeSet::new())).collect();
        let mut reach_out = reach_in.clone();

        let mut changed = true;
        let mut iteration = 0;
        while changed {
            cancellation.check()?;
            if iteration >= MAX_ITERATIONS {
                return Err(Error::solver("reaching writes did not converge"));
            }
            changed = false;
            iteration += 1;

            for node in &order {
                let mut state = BTreeSet::new();
                for pred in self.graph.neighbors_directed(*node, Direction::Incoming) {
                    state.extend(reach_out[&pred].iter().copied());
                }
                reach_in.insert(*node, state.clone());

                for event in &self.graph[*node].events {
                    self.transfer(&mut state, *event);
                }
                if state != reach_out[node] {
                    reach_out.insert(*node, state);
                    changed = true;
                }
            }
        }

        log::trace!("Reaching writes converged after {} iterations", iteration);
        Ok(reach_in)
    }

    /// Solve and package the result
    pub fn solve(&self, cancellation: &CancellationToken) -> Result<SymbolUsageResult<'a>> {
        let reach_in = self.reaching_in(cancellation)?;
        let mut facts = UsageFacts {
            reads: self.reads.clone(),
            read_writes: HashSet::new(),
        };

        for node in self.graph.node_indices() {
            let mut state = reach_in.get(&node).cloned().unwrap_or_default();
            for event in &self.graph[node].events {
                match *event {
                    UsageEvent::Read(symbol) => facts.read_writes.extend(
                        state
                            .iter()
                            .copied()
                            .filter(|id| self.writes.symbol_of(*id) == symbol),
                    ),
                    UsageEvent::ExitRead(symbol) => facts.read_writes.extend(
                        state.iter().copied().filter(|id| {
                            let write = self.writes.get(*id);
                            write.symbol == symbol && !write.is_initial()
                        }),
                    ),
                    UsageEvent::Write(_) => {}
                }
                self.transfer(&mut state, *event);
            }
        }

        Ok(facts.into_result(&self.writes, &self.captured))
    }

    /// Export the graph to DOT format
    pub fn to_dot(&self, symbols: &SymbolTable) -> String {
        let name = |symbol: SymbolId| {
            symbols
                .get(symbol)
                .map(|s| s.name.clone())
                .unwrap_or_else(|| symbol.to_string())
        };

        let mut dot = String::new();
        dot.push_str("digraph {\n");
        dot.push_str("  rankdir=TB;\n");
        dot.push_str("  node [shape=box, fontname=\"monospace\"];\n\n");

        for node in self.graph.node_indices() {
            let mut label = if node == self.entry {
                "ENTRY".to_string()
            } else if node == self.exit {
                "EXIT".to_string()
            } else {
                format!("Block {}", node.index())
            };
            for event in &self.graph[node].events {
                let line = match *event {
                    UsageEvent::Read(symbol) => format!("read {}", name(symbol)),
                    UsageEvent::ExitRead(symbol) => format!("exit-read {}", name(symbol)),
                    UsageEvent::Write(id) => {
                        let write = self.writes.get(id);
                        match write.site {
                            Some(site) => format!("write {} @{}", name(write.symbol), site.span),
                            None => format!("write {} (initial)", name(write.symbol)),
                        }
                    }
                };
                label.push_str("\\l");
                label.push_str(&line);
            }
            dot.push_str(&format!("  {} [ label = \"{}\\l\" ]\n", node.index(), label));
        }

        dot.push('\n');
        for edge in self.graph.edge_references() {
            dot.push_str(&format!(
                "  {} -> {} [ label = \"{:?}\" ]\n",
                edge.source().index(),
                edge.target().index(),
                edge.weight()
            ));
        }
        dot.push_str("}\n");
        dot
    }
}

struct GraphBuilder<'a, 'c> {
    context: &'c UsageContext<'a>,
    cancellation: &'c CancellationToken,
    graph: DiGraph<UsageBlock, FlowEdge>,
    current: NodeIndex,
    exit: NodeIndex,
    writes: WriteTable<'a>,
    reads: HashSet<SymbolId>,
    /// Blocks with a forward path from the entry
    reachable: HashSet<NodeIndex>,
}

impl GraphBuilder<'_, '_> {
    fn push(&mut self, event: UsageEvent) {
        self.graph[self.current].events.push(event);
    }

    fn connect(&mut self, from: NodeIndex, to: NodeIndex, edge: FlowEdge) {
        if self.reachable.contains(&from) {
            self.reachable.insert(to);
        }
        self.graph.add_edge(from, to, edge);
    }

    /// New block reached from the current one
    fn start_block(&mut self, edge: FlowEdge) -> NodeIndex {
        let block = self.graph.add_node(UsageBlock::default());
        self.connect(self.current, block, edge);
        block
    }
}

impl<'a> FlowVisitor<'a> for GraphBuilder<'a, '_> {
    fn context(&self) -> &UsageContext<'a> {
        self.context
    }

    fn cancellation(&self) -> &CancellationToken {
        self.cancellation
    }

    fn read(&mut self, symbol: SymbolId) {
        self.reads.insert(symbol);
        self.push(UsageEvent::Read(symbol));
    }

    fn write(&mut self, symbol: SymbolId, site: &'a Operation) {
        // Stores after a return never run
        if !self.reachable.contains(&self.current) {
            return;
        }
        let id = self.writes.intern(symbol, Some(site));
        self.push(UsageEvent::Write(id));
    }

    fn conditional(
        &mut self,
        condition: &'a Operation,
        when_true: &'a Operation,
        when_false: Option<&'a Operation>,
    ) -> Result<()> {
        walker::walk(self, condition)?;
        let branch = self.current;
        let join = self.graph.add_node(UsageBlock::default());

        self.current = self.start_block(FlowEdge::True);
        walker::walk(self, when_true)?;
        self.connect(self.current, join, FlowEdge::Fall);

        self.current = branch;
        match when_false {
            Some(when_false) => {
                self.current = self.start_block(FlowEdge::False);
                walker::walk(self, when_false)?;
                self.connect(self.current, join, FlowEdge::Fall);
            }
            None => self.connect(branch, join, FlowEdge::False),
        }

        self.current = join;
        Ok(())
    }

    fn while_loop(&mut self, condition: &'a Operation, body: &'a Operation) -> Result<()> {
        let header = self.start_block(FlowEdge::Fall);
        self.current = header;
        walker::walk(self, condition)?;
        let test = self.current;

        self.current = self.start_block(FlowEdge::True);
        walker::walk(self, body)?;
        self.connect(self.current, header, FlowEdge::Back);

        self.current = test;
        self.current = self.start_block(FlowEdge::False);
        Ok(())
    }

    fn exit(&mut self, value: Option<&'a Operation>) -> Result<()> {
        if let Some(value) = value {
            walker::walk(self, value)?;
        }
        self.connect(self.current, self.exit, FlowEdge::Return);
        // Anything after a return is unreachable
        self.current = self.graph.add_node(UsageBlock::default());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CodeUnitKind, IrBuilder, TypeRef};

    #[test]
    fn test_loop_carried_write_is_read() {
        // int x = 0; while (c) { use(x); x = x + 1; }
        let mut b = IrBuilder::new();
        let mut f = b.method("f", TypeRef::void());
        let c = b.parameter(&mut f, "c", TypeRef::boolean(), Default::default());
        let x = b.local(&f, "x", TypeRef::int());
        let zero = b.int(0);
        let declare = b.declare(x, Some(zero));
        let cond = b.param_ref(c);
        let read = b.local_ref(x);
        let use_x = b.expr_stmt(read);
        let target = b.local_ref(x);
        let lhs = b.local_ref(x);
        let one = b.int(1);
        let sum = b.binary(lhs, one, TypeRef::int());
        let assign = b.assign(target, sum);
        let bump = b.expr_stmt(assign);
        let loop_body = b.block(vec![use_x, bump]);
        let looping = b.while_(cond, loop_body);
        b.body(&mut f, CodeUnitKind::MethodBody, vec![declare, looping]);
        b.add(f);

        let compilation = b.finish();
        let f = &compilation.declarations[0];
        let context = UsageContext::new(f, &compilation.symbols);
        let token = CancellationToken::none();

        let graph = UsageGraph::build(&f.code_units[0], &context, &token).unwrap();
        assert!(graph
            .graph()
            .edge_references()
            .any(|edge| *edge.weight() == FlowEdge::Back));

        let slow = graph.solve(&token).unwrap();
        assert!(!slow.has_unread_writes());

        let fast = crate::usage::tree::TreeWalker::run(&f.code_units[0], &context, &token).unwrap();
        assert_eq!(fast.unread_writes().len(), 1, "the tree walk misses the back edge");
    }

    #[test]
    fn test_stores_after_return_are_not_tracked() {
        // int x = 0; if (c) { return; x = 1; } use(x);
        let mut b = IrBuilder::new();
        let mut f = b.method("f", TypeRef::void());
        let c = b.parameter(&mut f, "c", TypeRef::boolean(), Default::default());
        let x = b.local(&f, "x", TypeRef::int());
        let zero = b.int(0);
        let declare = b.declare(x, Some(zero));
        let cond = b.param_ref(c);
        let ret = b.ret(None);
        let target = b.local_ref(x);
        let one = b.int(1);
        let assign = b.assign(target, one);
        let dead = b.expr_stmt(assign);
        let then = b.block(vec![ret, dead]);
        let branch = b.if_(cond, then, None);
        let read = b.local_ref(x);
        let use_x = b.expr_stmt(read);
        b.body(&mut f, CodeUnitKind::MethodBody, vec![declare, branch, use_x]);
        b.add(f);

        let compilation = b.finish();
        let f = &compilation.declarations[0];
        let context = UsageContext::new(f, &compilation.symbols);
        let token = CancellationToken::none();

        let graph = UsageGraph::build(&f.code_units[0], &context, &token).unwrap();
        assert_eq!(graph.writes().len(), 2);

        let slow = graph.solve(&token).unwrap();
        assert!(!slow.has_unread_writes());
        assert_eq!(slow.write_count(x), 1);

        let fast = crate::usage::tree::TreeWalker::run(&f.code_units[0], &context, &token).unwrap();
        assert!(!fast.has_unread_writes());
        assert_eq!(fast.write_count(x), 1);
    }

    #[test]
    fn test_dot_output_names_symbols() {
        let mut b = IrBuilder::new();
        let mut f = b.method("f", TypeRef::void());
        let p = b.parameter(&mut f, "p", TypeRef::int(), Default::default());
        let read = b.param_ref(p);
        let statement = b.expr_stmt(read);
        b.body(&mut f, CodeUnitKind::MethodBody, vec![statement]);
        b.add(f);

        let compilation = b.finish();
        let f = &compilation.declarations[0];
        let context = UsageContext::new(f, &compilation.symbols);
        let graph =
            UsageGraph::build(&f.code_units[0], &context, &CancellationToken::none()).unwrap();
        let dot = graph.to_dot(&compilation.symbols);
        assert!(dot.contains("write p (initial)"));
        assert!(dot.contains("read p"));
        assert!(dot.contains("EXIT"));
    }
}
