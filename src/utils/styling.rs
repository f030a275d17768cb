//! Terminal styling for the CLI output

use std::path::Path;
use std::time::Duration;

use console::{style, Emoji};

pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">> ");
pub static CHART: Emoji<'_, '_> = Emoji("📊 ", "");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static TARGET: Emoji<'_, '_> = Emoji("🎯 ", "");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "");

const BOX_WIDTH: usize = 56;

pub fn print_banner(version: &str) {
    println!();
    println!(
        "    {} {}",
        style("nasabin").cyan().bold(),
        style(format!("v{}", version)).dim()
    );
    println!(
        "    {}",
        style("Event-rate binning with temporal stability").dim()
    );
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

/// Configuration card: input, target and the key/value settings of the run
pub fn print_config(input: &Path, target: &str, settings: &[(&str, String)]) {
    let line = "─".repeat(BOX_WIDTH - 2);

    println!("    ┌{}┐", line);
    println!(
        "    │ {}{}│",
        style("Configuration").cyan().bold(),
        " ".repeat(BOX_WIDTH - 16)
    );
    println!("    ├{}┤", line);
    println!("    │  {}Input:  {:<42}│", FOLDER, truncate_path(input, 41));
    println!("    │  {}Target: {:<42}│", TARGET, truncate_string(target, 41));
    println!("    ├{}┤", line);
    for (key, value) in settings {
        println!(
            "    │  {}{:<22} {:<27}│",
            CHART,
            format!("{}:", key),
            style(truncate_string(value, 26)).yellow()
        );
    }
    println!("    └{}┘", line);
    println!();
}

pub fn print_step_header(step_num: u8, title: &str) {
    println!();
    println!(
        "    {} {} {}",
        style(format!("STEP {}", step_num)).cyan().bold(),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
}

pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

pub fn print_info(message: &str) {
    println!("    {} {}", INFO, message);
}

pub fn print_warning(message: &str) {
    println!("    {} {}", WARN, style(message).yellow());
}

pub fn print_step_time(elapsed: Duration) {
    println!(
        "    {}{}",
        CLOCK,
        style(format!("{:.2}s", elapsed.as_secs_f64())).dim()
    );
}

pub fn print_completion() {
    println!();
    println!("    {} {}", ROCKET, style("Binning complete!").green().bold());
    println!();
}

/// Print a styled count message
pub fn print_count(description: &str, count: usize, detail: Option<&str>) {
    match detail {
        Some(detail) => println!(
            "      Found {} {} {}",
            style(count).yellow().bold(),
            description,
            style(detail).dim()
        ),
        None => println!("      Found {} {}", style(count).yellow().bold(), description),
    }
}

fn truncate_path(path: &Path, max_len: usize) -> String {
    truncate_string(&path.display().to_string(), max_len)
}

/// Keep the tail of `s`, prefixed with "...", when it exceeds `max_len` chars
pub fn truncate_string(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_string()
    } else {
        let tail: String = chars[chars.len() - (max_len - 3)..].iter().collect();
        format!("...{}", tail)
    }
}
