//! Terminal summary of a fitted binner

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, CellAlignment, Color, Table};
use console::style;

use crate::pipeline::{Encoding, EventRatePivot, FeaturePipeline, FittedBinner};

/// IV below which a feature is considered unpredictive
const WEAK_IV: f64 = 0.02;
/// IV above which a feature is considered strong
const STRONG_IV: f64 = 0.3;
/// Distribution shift above which a feature is flagged as drifting
const DRIFT_PSI: f64 = 0.25;

fn iv_color(iv: f64) -> Color {
    if iv < WEAK_IV {
        Color::Red
    } else if iv > STRONG_IV {
        Color::Green
    } else {
        Color::Yellow
    }
}

fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|l| Cell::new(l).add_attribute(Attribute::Bold))
        .collect()
}

fn format_rate(rate: Option<f64>) -> String {
    rate.map_or_else(|| "-".to_string(), |r| format!("{:.2}%", r * 100.0))
}

/// One row per fitted feature: kind, bins, IV, encoding and drift
pub fn features_table(binner: &FittedBinner) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&["Feature", "Kind", "Bins", "IV", "Encoding", "Shift"]));

    let mut features: Vec<&FeaturePipeline> = binner.features().iter().collect();
    features.sort_by(|a, b| b.iv.total_cmp(&a.iv));

    for feature in features {
        let bins = Cell::new(feature.n_bins()).set_alignment(CellAlignment::Right);
        let bins = if feature.degenerate {
            bins.fg(Color::Red)
        } else {
            bins
        };
        let encoding = match feature.encoding() {
            Some(Encoding::Ordinal) => Cell::new("ordinal").fg(Color::Yellow),
            Some(Encoding::Woe) | None => Cell::new("woe"),
        };
        let shift = match feature.distribution_shift() {
            Some(psi) if psi > DRIFT_PSI => Cell::new(format!("{:.4}", psi)).fg(Color::Red),
            Some(psi) => Cell::new(format!("{:.4}", psi)),
            None => Cell::new("-"),
        };

        table.add_row(vec![
            Cell::new(&feature.feature),
            Cell::new(feature.kind),
            bins,
            Cell::new(format!("{:.4}", feature.iv))
                .fg(iv_color(feature.iv))
                .set_alignment(CellAlignment::Right),
            encoding,
            shift,
        ]);
    }

    table
}

/// Aggregated bins of one feature
pub fn bins_table(feature: &FeaturePipeline) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&["Code", "Bin", "Count", "Event", "Non-event", "Event rate", "WoE"]));

    for bin in feature.table.aggregate() {
        let woe = feature
            .woe
            .iter()
            .find(|(code, _)| *code == bin.code)
            .map_or_else(|| "-".to_string(), |(_, w)| format!("{:+.4}", w));
        table.add_row(vec![
            Cell::new(bin.code),
            Cell::new(&bin.bin),
            Cell::new(bin.count).set_alignment(CellAlignment::Right),
            Cell::new(bin.event).set_alignment(CellAlignment::Right),
            Cell::new(bin.non_event).set_alignment(CellAlignment::Right),
            Cell::new(format_rate(bin.event_rate)).set_alignment(CellAlignment::Right),
            Cell::new(woe).set_alignment(CellAlignment::Right),
        ]);
    }

    table
}

/// (feature, bin) x period event rates
pub fn pivot_table(pivot: &EventRatePivot) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);

    let mut labels = vec![
        Cell::new("Feature").add_attribute(Attribute::Bold),
        Cell::new("Bin").add_attribute(Attribute::Bold),
    ];
    labels.extend(
        pivot
            .periods()
            .iter()
            .map(|p| Cell::new(p).add_attribute(Attribute::Bold)),
    );
    table.set_header(labels);

    for (key, row) in pivot.index().iter().zip(pivot.values()) {
        let mut cells = vec![Cell::new(&key.variable), Cell::new(&key.bin)];
        cells.extend(
            row.iter()
                .map(|v| Cell::new(format_rate(*v)).set_alignment(CellAlignment::Right)),
        );
        table.add_row(cells);
    }

    table
}

fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

fn print_section(icon: &str, title: &str) {
    println!();
    println!("    {} {}", style(icon).cyan(), style(title).white().bold());
    println!("    {}", style("─".repeat(50)).dim());
    println!();
}

/// Print the fitted summary; `show_bins` adds one bin table per feature
pub fn display_summary(binner: &FittedBinner, show_bins: bool) {
    print_section("📋", "BINNING SUMMARY");
    print_indented(&features_table(binner));

    println!();
    println!(
        "    Total IV: {}   Features: {}   Ignored: {}   Failed: {}",
        style(format!("{:.4}", binner.total_iv())).green().bold(),
        style(binner.features().len()).yellow().bold(),
        style(binner.ignored().len()).dim(),
        style(binner.failures().len()).red()
    );

    if show_bins {
        for feature in binner.features() {
            print_section("📊", &feature.feature);
            print_indented(&bins_table(feature));
        }
    }

    if !binner.ignored().is_empty() {
        print_section("📝", "IGNORED COLUMNS");
        for name in binner.ignored() {
            println!("        {} {}", style("•").dim(), name);
        }
    }

    if !binner.failures().is_empty() {
        print_section("⚠️", "FAILED FEATURES");
        for failure in binner.failures() {
            println!(
                "        {} {}: {}",
                style("•").dim(),
                style(&failure.feature).yellow(),
                failure.error
            );
        }
    }
}

/// Print the stability pivot
pub fn display_pivot(pivot: &EventRatePivot) {
    print_section("📈", "EVENT RATE BY PERIOD");
    print_indented(&pivot_table(pivot));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Binner, BinnerConfig};
    use polars::prelude::*;

    fn fitted() -> FittedBinner {
        let n = 400;
        let score: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let y: Vec<i32> = (0..n).map(|i| i32::from(i % 10 < i / 40)).collect();
        let df = df! { "score" => score, "y" => y }.unwrap();
        Binner::new(BinnerConfig::default()).fit(&df, "y").unwrap()
    }

    #[test]
    fn test_features_table_lists_every_feature() {
        let binner = fitted();
        let rendered = features_table(&binner).to_string();
        assert!(rendered.contains("score"));
        assert!(rendered.contains("numeric"));
    }

    #[test]
    fn test_bins_table_has_one_row_per_bin() {
        let binner = fitted();
        let feature = binner.feature("score").unwrap();
        let table = bins_table(feature);
        assert_eq!(table.row_iter().count(), feature.n_bins());
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(Some(0.125)), "12.50%");
        assert_eq!(format_rate(None), "-");
    }
}
