//! `scan`: show escape flags and the tier chosen for every code unit

use crate::analyzer::plan_declaration;
use crate::cancellation::CancellationToken;
use anyhow::Result;
use std::path::Path;

/// Run the scan subcommand
pub fn scan(input: &Path) -> Result<()> {
    let compilation = super::load_compilation(input)?;
    let cancellation = CancellationToken::none();

    for declaration in compilation.all_declarations() {
        println!("{} ({:?})", declaration.name, declaration.kind);
        let plans = plan_declaration(declaration, &compilation.symbols, &cancellation)?;
        for (index, plan) in plans.iter().enumerate() {
            println!("  Unit {} {:?}: {}", index, plan.kind, plan.decision);
            let Some(escape) = &plan.escape else {
                continue;
            };
            let flags = escape.flags;
            println!(
                "    delegate creation: {}, stored in member: {}, converted: {}",
                flags.has_delegate_creation,
                flags.delegate_escaped_to_field_or_property,
                flags.has_delegate_to_non_delegate_conversion
            );
            for (span, reason) in &escape.sites {
                println!("    {} {:?}", span, reason);
            }
        }
    }
    Ok(())
}
