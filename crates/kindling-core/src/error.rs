// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Kindling.

use thiserror::Error;

/// Top-level error type for all Kindling operations.
#[derive(Debug, Error)]
pub enum KindlingError {
    // -- Configuration --
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -- Session errors --
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("full book {asin} is not owned by this account")]
    NotOwned { asin: String },

    #[error("book {asin} is not available for download ({reason})")]
    DownloadRestricted { asin: String, reason: String },

    // -- Fetch errors --
    #[error("batch fetch failed: {0}")]
    Fetch(String),

    #[error("batch starting at position {start_position} returned no page data")]
    EmptyBatch { start_position: u64 },

    #[error("batch starting at position {start_position} did not advance past it")]
    NoProgress { start_position: u64 },

    #[error("malformed batch: {0}")]
    MalformedBatch(String),

    // -- Security errors --
    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("malformed encrypted payload: {0}")]
    MalformedPayload(String),

    // -- Layout errors --
    #[error("layout lookup failed: {0}")]
    LayoutLookup(String),

    #[error("invalid glyph path data: {0}")]
    PathData(String),

    #[error("corrupted transform: {0}")]
    CorruptTransform(String),

    // -- Output errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KindlingError {
    /// Whether the compositor may skip the offending run and carry on.
    ///
    /// Everything else aborts the conversion before the document is saved.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::LayoutLookup(_) | Self::PathData(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, KindlingError>;
