//! Write a default config file.

use anyhow::{bail, Context, Result};
use console::style;
use std::path::Path;
use wpfix_core::HarnessConfig;

pub fn run(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let config = HarnessConfig::default();
    config
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("{} Wrote {}", style("✓").green(), style(path.display()).cyan());
    println!();
    println!("Sections:");
    println!("  [fixtures]      - Login prefix, email domain, secret, baseline role");
    println!("  [token]         - Random suffix range for fixture names");
    println!("  [capabilities]  - What the site under test supports");
    println!("  [cleanup]       - Post-delete verification");
    println!("  [suite]         - Query time budget");

    Ok(())
}
