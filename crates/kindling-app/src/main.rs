// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Kindling — command-line entry point.
//
// Initialises logging, merges the config file with command-line flags, opens
// the recorded session for the requested book, and drives the conversion onto
// a PDF canvas (or a recording canvas for `--dry-run`).

mod cli;
mod output;

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use kindling_core::ConversionConfig;
use kindling_core::error::Result;
use kindling_core::human_errors::humanize_error;
use kindling_document::{PdfCanvas, RecordingCanvas};
use kindling_fetch::{PaginationDriver, ReplayFetcher};

use cli::Cli;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "conversion failed");
            let human = humanize_error(&err);
            eprintln!("{}", human.message);
            eprintln!("  {}", human.suggestion);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => ConversionConfig::load(path)?,
        None => ConversionConfig::default(),
    };
    cli.apply(&mut config);
    config.validate()?;

    let replay = ReplayFetcher::open(cli.recording_dir())?;
    let page_size = config.page_size_pt();
    let mut driver = PaginationDriver::new(replay.clone(), replay, config)?;

    let output = match &cli.output {
        Some(path) => path.clone(),
        None => output::default_output_path(&driver.session().title),
    };
    info!(asin = %cli.asin, output = %output.display(), "Kindling starting");

    let summary = if cli.dry_run {
        let mut canvas = RecordingCanvas::new(page_size);
        driver.run(&mut canvas, &output)?
    } else {
        let mut canvas = PdfCanvas::new(page_size);
        driver.run(&mut canvas, &output)?
    };

    if cli.dry_run {
        println!(
            "{} pages in {} batches (dry run, nothing written)",
            summary.pages, summary.batches
        );
    } else {
        println!(
            "{} pages in {} batches written to {}",
            summary.pages,
            summary.batches,
            output.display()
        );
    }
    Ok(())
}
