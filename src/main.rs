//! nasabin: credit-risk binning CLI
//!
//! Loads a dataset, bins every feature against a binary target, prints the
//! fitted bins with their IV and stability, and optionally writes the
//! transformed dataset.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;

use nasabin::cli::Cli;
use nasabin::pipeline::{load_dataset, save_dataset, Binner};
use nasabin::report::{display_pivot, display_summary};
use nasabin::utils::{
    create_spinner, finish_with_success, print_banner, print_completion, print_config,
    print_count, print_info, print_step_header, print_step_time, print_success, print_warning,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli
        .binner_config()
        .context("Invalid binning configuration")?;

    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(&cli.input, &cli.target, &cli.settings_summary(&config));

    // Step 1: Load dataset
    print_step_header(1, "Load Dataset");
    let step_start = Instant::now();
    let spinner = create_spinner("Reading dataset...");
    let mut df = load_dataset(&cli.input, cli.infer_schema_length)?;
    finish_with_success(&spinner, "Dataset loaded");

    let (rows, cols) = df.shape();
    println!("\n    {} Dataset Statistics:", style("✧").cyan());
    println!("      Rows: {}", rows);
    println!("      Columns: {}", cols);

    if !cli.drop_columns.is_empty() {
        let present: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .filter(|name| cli.drop_columns.contains(name))
            .collect();
        df = df.drop_many(&present);
        print_count("column(s) dropped before binning", present.len(), None);
    }
    print_step_time(step_start.elapsed());

    // Step 2: Fit
    print_step_header(2, "Fit Bins");
    let step_start = Instant::now();
    let binner = Binner::new(config);
    let fitted = binner
        .fit(&df, &cli.target)
        .with_context(|| format!("Failed to bin dataset against '{}'", cli.target))?;

    print_success(&format!("{} feature(s) binned", fitted.features().len()));
    if !fitted.failures().is_empty() {
        print_warning(&format!("{} feature(s) failed", fitted.failures().len()));
    }
    let degenerate = fitted.features().iter().filter(|f| f.degenerate).count();
    if degenerate > 0 {
        print_count("feature(s) with fewer than 2 bins", degenerate, None);
    }
    print_step_time(step_start.elapsed());

    display_summary(&fitted, cli.show_bins);

    // Step 3: Stability over time
    if let Some(time_col) = &cli.time_col {
        print_step_header(3, "Stability Over Time");
        let pivot = fitted
            .stability_over_time(&df, &cli.target, time_col)
            .context("Failed to compute event rates by period")?;
        if pivot.shape().0 == 0 {
            print_info("No bins to compare across periods");
        } else {
            display_pivot(&pivot);
        }
    }

    // Step 4: Transform
    if let Some(output) = &cli.output {
        print_step_header(4, "Save Transformed Dataset");
        let step_start = Instant::now();
        let spinner = create_spinner("Writing output file...");
        let mut transformed = fitted.transform(&df, cli.transform)?;
        save_dataset(&mut transformed, output)?;
        finish_with_success(&spinner, &format!("Saved to {}", output.display()));
        print_step_time(step_start.elapsed());
    }

    print_completion();

    Ok(())
}
