//! Terminal rendering

use colored::{ColoredString, Colorize};
use deploy_api::{ExecutionStatus, HealthReport, HealthStatus};

pub fn status(status: ExecutionStatus) -> ColoredString {
    let text = status.as_str();
    match status {
        ExecutionStatus::Completed => text.green(),
        ExecutionStatus::Failed | ExecutionStatus::RolledBack => text.red(),
        ExecutionStatus::Cancelled => text.yellow(),
        _ => text.cyan(),
    }
}

pub fn health(status: HealthStatus) -> ColoredString {
    let text = status.as_str();
    match status {
        HealthStatus::Healthy => text.green(),
        HealthStatus::Warning => text.yellow(),
        HealthStatus::Unhealthy => text.red(),
    }
}

pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn failure(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

pub fn header(title: &str) {
    println!("{}", title.bold());
    println!("{}", "=".repeat(title.chars().count()));
}

/// Text progress bar, `width` cells wide
pub fn progress_bar(percent: f64, width: usize) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!(
        "[{}{}] {:5.1}%",
        "#".repeat(filled),
        "-".repeat(width - filled),
        percent
    )
}

pub fn health_report(report: &HealthReport) {
    println!("{}: {}", report.environment.bold(), health(report.overall_status));
    for (name, check) in &report.checks {
        match &check.error {
            Some(error) => println!("  {:<24} {} ({})", name, health(check.status), error),
            None => println!("  {:<24} {}", name, health(check.status)),
        }
    }
}
