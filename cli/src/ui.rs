// Terminal UI utilities

use colored::Colorize;
use std::collections::BTreeMap;

use crate::infrastructure::state::ImageOutputs;
use crate::services::engine::{Outcome, RunReport};

pub fn print_header(title: &str) {
    println!();
    println!(
        "{}",
        "╔════════════════════════════════════════════════════════════╗".bright_blue()
    );
    println!("{}", format!("║  {:<58}║", title).bright_blue());
    println!(
        "{}",
        "╚════════════════════════════════════════════════════════════╝".bright_blue()
    );
    println!();
}

pub fn print_success(message: &str) {
    println!("{}", format!("✅ {}", message).bright_green().bold());
}

pub fn print_error(message: &str) {
    eprintln!("{}", format!("❌ {}", message).bright_red().bold());
}

pub fn print_info(message: &str) {
    println!("{}", format!("ℹ️  {}", message).bright_cyan());
}

pub fn print_warning(message: &str) {
    println!("{}", format!("⚠️  {}", message).bright_yellow());
}

/// One line per resource, in the order they settled
pub fn print_run_summary(report: &RunReport) {
    println!();
    println!(
        "{}",
        "════════════════════════════════════════════════════════════".bright_blue()
    );
    for (id, outcome) in &report.outcomes {
        match outcome {
            Outcome::Succeeded { status, duration } => println!(
                "  {} {:<28} {} ({:.1}s)",
                "✓".green(),
                id.as_str(),
                status.label(),
                duration.as_secs_f64()
            ),
            Outcome::Failed { error, duration } => println!(
                "  {} {:<28} {} ({:.1}s)",
                "✗".red(),
                id.as_str(),
                error.red(),
                duration.as_secs_f64()
            ),
            Outcome::Skipped { blocked_by } => println!(
                "  {} {:<28} skipped ({} did not succeed)",
                "-".yellow(),
                id.as_str(),
                blocked_by
            ),
        }
    }
    println!(
        "{}",
        "════════════════════════════════════════════════════════════".bright_blue()
    );
    println!();
}

pub fn print_outputs(outputs: &BTreeMap<String, ImageOutputs>) {
    if outputs.is_empty() {
        print_info("No outputs recorded for this stack");
        return;
    }
    println!("{}", "Outputs:".bold());
    for (image, output) in outputs {
        println!("  {}", image.bright_white().bold());
        println!("    repository: {}", output.repository_name);
        println!("    url:        {}", output.repository_url);
        if let Some(name) = &output.image_name {
            println!("    image:      {}", name);
        }
    }
    println!();
}
