//! Run the conformance suite.

use crate::OutputFormat;
use anyhow::{bail, Result};
use chrono::Local;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::{debug, info};
use wpfix_core::{
    run_suite, Backend, CaseReport, HarnessConfig, HarnessError, HttpSite, InMemorySite,
    SuiteReport, Verdict,
};

pub fn run(
    config_path: &Path,
    filter: Option<&str>,
    format: OutputFormat,
    site_url: Option<String>,
) -> Result<()> {
    let mut config = HarnessConfig::load(config_path).map_err(with_hint)?;
    debug!(path = %config_path.display(), "config loaded");
    if site_url.is_some() {
        config.site.url = site_url;
        config.validate().map_err(with_hint)?;
    }
    let backend = backend(&config).map_err(with_hint)?;

    let total = wpfix_core::cases()
        .iter()
        .filter(|c| c.matches(filter))
        .count();

    let pb = match format {
        OutputFormat::Text => {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")?
                    .progress_chars("=> "),
            );
            pb
        }
        OutputFormat::Json => ProgressBar::hidden(),
    };

    let report = run_suite(backend.as_ref(), &config, filter, |case| {
        pb.set_message(case.name.clone());
        if format == OutputFormat::Text {
            pb.println(case_line(case));
        }
        pb.inc(1);
    })
    .map_err(with_hint)?;
    pb.finish_and_clear();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_summary(&report),
    }

    if report.has_failures() {
        bail!("{} failed, {} errored", report.failed, report.errored);
    }
    Ok(())
}

/// The configured live site, or the in-memory reference site.
fn backend(config: &HarnessConfig) -> wpfix_core::Result<Box<dyn Backend>> {
    if config.site.url.is_none() {
        return Ok(Box::new(InMemorySite::new()));
    }
    let site = HttpSite::new(&config.site)?;
    info!(url = site.base_url(), "testing live site");
    Ok(Box::new(site))
}

fn with_hint(err: HarnessError) -> anyhow::Error {
    if let Some(hint) = err.recovery_suggestion() {
        eprintln!("{} {}", style("hint:").yellow(), hint);
    }
    err.into()
}

fn case_line(case: &CaseReport) -> String {
    let label = style(format!("{:>5}", case.verdict.label()));
    let label = match case.verdict {
        Verdict::Passed => label.green(),
        Verdict::Failed { .. } | Verdict::Errored { .. } => label.red(),
        Verdict::Skipped { .. } => label.yellow(),
    };
    let mut line = format!(
        "{} {} {}",
        label,
        case.name,
        style(format!("({}ms)", case.duration_ms)).dim()
    );
    if let Some(detail) = case.verdict.detail() {
        line.push_str(&format!("\n      {}", detail));
    }
    if !case.cleanup.is_clean() {
        line.push_str(&format!(
            "\n      {} cleanup: {} errors, {} leaked",
            style("⚠").yellow(),
            case.cleanup.errors.len(),
            case.cleanup.leaked.len()
        ));
    }
    line
}

fn print_summary(report: &SuiteReport) {
    println!();
    println!("{}", style("Suite Report:").bold());
    println!("  Passed:   {}", style(report.passed).green());
    println!("  Failed:   {}", style(report.failed).red());
    println!("  Errored:  {}", style(report.errored).red());
    println!("  Skipped:  {}", style(report.skipped).yellow());
    println!("  Duration: {}ms", report.duration_ms);
    println!("  Finished: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));

    let unclean = report.unclean().count();
    if unclean > 0 {
        println!();
        println!(
            "{} {} case(s) left fixtures behind or hit cleanup errors",
            style("⚠").yellow(),
            unclean
        );
        println!(
            "  {} Re-run with {} for details",
            style("→").cyan(),
            style("RUST_LOG=wpfix_core=warn").cyan()
        );
    }

    println!();
    if report.has_failures() {
        println!("{}", style(report.summary()).red().bold());
    } else {
        println!("{} {}", style("✓").green(), style(report.summary()).green());
    }
}
