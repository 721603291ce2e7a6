//! List built-in cases.

use anyhow::{bail, Result};
use console::style;

pub fn run(filter: Option<&str>) -> Result<()> {
    let selected: Vec<_> = wpfix_core::cases()
        .iter()
        .filter(|c| c.matches(filter))
        .collect();
    if selected.is_empty() {
        bail!("No case matches '{}'", filter.unwrap_or_default());
    }

    let width = selected.iter().map(|c| c.name.len()).max().unwrap_or(0);
    for case in &selected {
        let tag = if case.requires_rest {
            style("[rest]").yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "{}  {} {}",
            style(format!("{:width$}", case.name, width = width)).cyan(),
            case.description,
            tag
        );
    }
    println!();
    println!("{} cases", selected.len());

    Ok(())
}
