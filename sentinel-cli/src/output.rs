//! Human-readable session report.

use std::path::Path;

use colored::Colorize;
use sentinel_core::{FlagStatus, SessionReport};

use crate::utils::truncate;

const VENDOR_WIDTH: usize = 24;
const SOURCE_WIDTH: usize = 28;

pub fn print_report(report: &SessionReport, csv_path: Option<&Path>) {
    println!();
    if report.has_red_flags() {
        println!("{}", "╔════════════════════════════════════════╗".red());
        println!("{}", "║            RED FLAGS FOUND             ║".red().bold());
        println!("{}", "╚════════════════════════════════════════╝".red());
    } else {
        println!("{}", "╔════════════════════════════════════════╗".green());
        println!("{}", "║             NO RED FLAGS               ║".green().bold());
        println!("{}", "╚════════════════════════════════════════╝".green());
    }
    println!();

    print_rows(report);
    print_groups(report);
    print_failures(report);

    let summary = &report.summary;
    println!(
        "   {} {} records, {} red, {} green, {} failed",
        "Summary:".dimmed(),
        summary.records,
        summary.red.to_string().red(),
        summary.green.to_string().green(),
        summary.failed
    );
    if let Some(path) = csv_path {
        println!("   {} {}", "CSV report:".dimmed(), path.display());
    }
    println!();
}

fn print_rows(report: &SessionReport) {
    if report.rows.is_empty() {
        println!("   {}", "No records analyzed.".dimmed());
        println!();
        return;
    }

    println!(
        "   {}",
        format!(
            "{:<9}  {:<6}  {:<vw$}  {:<sw$}",
            "RECORD",
            "STATUS",
            "VENDOR",
            "SOURCE",
            vw = VENDOR_WIDTH,
            sw = SOURCE_WIDTH
        )
        .dimmed()
    );

    for row in &report.rows {
        // Pad before colorizing: escape codes would count toward the width.
        let status = format!("{:<6}", row.status);
        let status = match row.status {
            FlagStatus::Red => status.red().bold(),
            FlagStatus::Green => status.green(),
        };
        let vendor = if row.vendor_name.is_empty() {
            "-".to_string()
        } else {
            truncate(&row.vendor_name, VENDOR_WIDTH)
        };
        println!(
            "   {:<9}  {}  {:<vw$}  {:<sw$}",
            row.record_id,
            status,
            vendor,
            truncate(&row.source, SOURCE_WIDTH),
            vw = VENDOR_WIDTH,
            sw = SOURCE_WIDTH
        );
    }
    println!();
}

fn print_groups(report: &SessionReport) {
    for group in &report.groups {
        println!("   {} ({})", group.label.red().bold(), group.entries.len());
        for entry in &group.entries {
            println!(
                "     {} {} {}",
                entry.record_id.to_string().bold(),
                truncate(&entry.vendor_name, VENDOR_WIDTH),
                format!("[{}]", entry.source).dimmed()
            );
            println!("       {} {}", "conflicts with".dimmed(), entry.detail);
        }
        println!();
    }
}

fn print_failures(report: &SessionReport) {
    if report.failures.is_empty() {
        return;
    }
    println!("   {}", "Extraction failures".yellow().bold());
    for failure in &report.failures {
        println!("     {} {}", failure.source.bold(), failure.error.dimmed());
    }
    println!();
}
