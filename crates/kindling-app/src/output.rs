// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output naming.

use std::path::PathBuf;

const RESERVED: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Make a book title safe to use as a file name.
pub fn sanitize_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !RESERVED.contains(c) && !c.is_control())
        .collect();
    cleaned.trim().trim_end_matches('.').trim_end().to_owned()
}

/// `<title>.pdf` in the working directory, or `book.pdf` when nothing of the
/// title survives sanitising.
pub fn default_output_path(title: &str) -> PathBuf {
    let stem = sanitize_filename(title);
    if stem.is_empty() {
        PathBuf::from("book.pdf")
    } else {
        PathBuf::from(format!("{stem}.pdf"))
    }
}
