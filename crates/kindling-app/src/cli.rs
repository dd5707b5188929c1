// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use kindling_core::{ConversionConfig, PaperSize};

/// Convert an e-book rendered by the reader service into a PDF.
#[derive(Debug, Parser)]
#[command(name = "kindling", version, about)]
pub struct Cli {
    /// ASIN of the book to convert.
    pub asin: String,

    /// Directory holding the recorded session and batches.
    /// Defaults to `recordings/<ASIN>`.
    #[arg(long, value_name = "DIR")]
    pub recording: Option<PathBuf>,

    /// Output PDF path. Defaults to `<title>.pdf`.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// JSON config file; flags given here take precedence.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Font size to request from the renderer.
    #[arg(long)]
    pub font_size: Option<u32>,

    /// Renderer resolution.
    #[arg(long)]
    pub dpi: Option<u32>,

    /// Paper size: a3, a4, a5, letter or legal.
    #[arg(long, value_parser = parse_paper)]
    pub paper: Option<PaperSize>,

    /// Pages requested per batch.
    #[arg(long)]
    pub pages_per_batch: Option<u32>,

    /// Renew the session before every batch.
    #[arg(long)]
    pub refresh: bool,

    /// Walk the whole book without writing a PDF.
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut ConversionConfig) {
        if let Some(font_size) = self.font_size {
            config.font_size = font_size;
        }
        if let Some(dpi) = self.dpi {
            config.dpi = dpi;
        }
        if let Some(paper) = self.paper {
            config.paper_size = paper;
        }
        if let Some(pages) = self.pages_per_batch {
            config.pages_per_batch = pages;
        }
        if self.refresh {
            config.refresh = true;
        }
    }

    pub fn recording_dir(&self) -> PathBuf {
        self.recording
            .clone()
            .unwrap_or_else(|| PathBuf::from("recordings").join(&self.asin))
    }
}

fn parse_paper(value: &str) -> Result<PaperSize, String> {
    match value.to_ascii_lowercase().as_str() {
        "a3" => Ok(PaperSize::A3),
        "a4" => Ok(PaperSize::A4),
        "a5" => Ok(PaperSize::A5),
        "letter" => Ok(PaperSize::Letter),
        "legal" => Ok(PaperSize::Legal),
        other => Err(format!("unknown paper size {other:?}")),
    }
}
