// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — the canvas that writes composed pages out with `lopdf`.

pub mod writer;

pub use writer::PdfCanvas;
