// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the command line.
//
// Every technical error is mapped to plain English with a clear suggestion.

use crate::error::KindlingError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Network blip or stale token; running the conversion again may work.
    Transient,
    /// The user must do something first (sign in, buy the book, fix a flag).
    ActionRequired,
    /// Retrying will not help.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary.
    pub message: String,
    /// What the user should try.
    pub suggestion: String,
    /// Whether running the conversion again is worthwhile.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `KindlingError` into a `HumanError`.
pub fn humanize_error(err: &KindlingError) -> HumanError {
    match err {
        KindlingError::InvalidConfig(detail) => HumanError {
            message: "The conversion settings aren't valid.".into(),
            suggestion: format!("Check the config file and command-line flags. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        // -- Session --
        KindlingError::Auth(_) => HumanError {
            message: "We couldn't sign in to the reading service.".into(),
            suggestion: "Sign in to the web reader in your browser again, then rerun the conversion.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        KindlingError::NotOwned { asin } => HumanError {
            message: format!("You don't own the full book {asin}."),
            suggestion: "Samples and borrowed previews can't be converted. Check the book is in your library.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        KindlingError::DownloadRestricted { asin, reason } => HumanError {
            message: format!("The publisher doesn't allow {asin} to be downloaded."),
            suggestion: format!("This restriction comes from the service and can't be worked around. (Reason: {reason})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        // -- Fetch --
        KindlingError::Fetch(_) => HumanError {
            message: "Downloading part of the book failed.".into(),
            suggestion: "Check your internet connection and start the conversion again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        KindlingError::EmptyBatch { start_position } => HumanError {
            message: "The reading service sent back an empty section.".into(),
            suggestion: format!("Your session may have expired. Sign in again and rerun the conversion. (Position {start_position})"),
            retriable: true,
            severity: Severity::Transient,
        },

        KindlingError::NoProgress { start_position } => HumanError {
            message: "The reading service kept sending the same section.".into(),
            suggestion: format!("Try a different font size or page size. (Stuck at position {start_position})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        KindlingError::MalformedBatch(_) | KindlingError::CorruptTransform(_) => HumanError {
            message: "The book's page data didn't make sense.".into(),
            suggestion: "The service may have changed its format. Try again later, or report it.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        // -- Security --
        KindlingError::Decryption(_) | KindlingError::MalformedPayload(_) => HumanError {
            message: "The book's images couldn't be unlocked.".into(),
            suggestion: "The session token may be stale. Rerun the conversion with --refresh.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        // -- Layout (normally recovered before reaching the user) --
        KindlingError::LayoutLookup(_) | KindlingError::PathData(_) => HumanError {
            message: "Some text on a page couldn't be drawn.".into(),
            suggestion: "The rest of the book is unaffected. Try a different font size if the gap matters.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        // -- Output --
        KindlingError::PdfError(_) => HumanError {
            message: "Writing the PDF failed.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        KindlingError::ImageError(_) => HumanError {
            message: "One of the book's images is damaged.".into(),
            suggestion: "Rerun the conversion; the image may download cleanly next time.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        KindlingError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "A file or folder couldn't be found.".into(),
                    suggestion: "Check the paths you passed on the command line.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "Kindling doesn't have permission to write there.".into(),
                    suggestion: "Choose a different output path with --output.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, your disk may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        KindlingError::Serialization(_) => HumanError {
            message: "Some data couldn't be read.".into(),
            suggestion: "Check the config or recording files are valid JSON.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },
    }
}
