//! List strategies command.

use anyhow::Result;
use quant_strategies::StrategyRegistry;

pub async fn run() -> Result<()> {
    let registry = StrategyRegistry::new();

    println!("Available Strategies");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    for info in registry.list() {
        println!("  {} ", info.name);
        println!("  ───────────────────────────────────────────────────────");
        println!("  {}", info.description);
        println!();
        println!("  Default configuration:");
        for line in serde_json::to_string_pretty(&info.default_config)?.lines() {
            println!("    {}", line);
        }
        println!();
    }

    println!("Use --strategy <name> to select a strategy and --strategy-config");
    println!("<file.json> to override any of the fields above.");

    Ok(())
}
