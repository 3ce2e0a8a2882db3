//! `cfg`: dump the usage graph the slow tier solves

use crate::cancellation::CancellationToken;
use crate::usage::{UsageContext, UsageEvent, UsageGraph};
use anyhow::Result;
use std::path::Path;

/// Build the usage graph of every code unit of one declaration
pub fn cfg(input: &Path, declaration_name: &str, output_dot: Option<&Path>) -> Result<()> {
    let compilation = super::load_compilation(input)?;
    let Some(declaration) = compilation.find_declaration(declaration_name) else {
        anyhow::bail!("No declaration named '{}'", declaration_name);
    };

    let context = UsageContext::new(declaration, &compilation.symbols);
    let cancellation = CancellationToken::none();
    let mut dot = String::new();

    for (index, unit) in declaration.code_units.iter().enumerate() {
        if !unit.kind.is_analyzable() || unit.is_empty() {
            println!("Unit {} {:?}: not analyzed", index, unit.kind);
            continue;
        }
        let graph = UsageGraph::build(unit, &context, &cancellation)?;
        let solved = graph.solve(&cancellation)?;

        println!("Unit {} {:?}:", index, unit.kind);
        println!("  Blocks: {}", graph.graph().node_count());
        println!("  Edges: {}", graph.graph().edge_count());
        println!("  Writes: {}", graph.writes().len());
        for node in graph.graph().node_indices() {
            let block = &graph.graph()[node];
            if block.is_empty() {
                continue;
            }
            let reads = block
                .events
                .iter()
                .filter(|event| !matches!(event, UsageEvent::Write(_)))
                .count();
            println!(
                "    Block {}: {} event(s), {} read(s)",
                node.index(),
                block.events.len(),
                reads
            );
        }
        println!("  Unread writes: {}", solved.unread_writes().len());

        dot.push_str(&graph.to_dot(&compilation.symbols));
    }

    if let Some(path) = output_dot {
        std::fs::write(path, dot)?;
        println!("DOT written to {}", path.display());
    }
    Ok(())
}
