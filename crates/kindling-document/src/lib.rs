// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// kindling-document — Turns decoded page descriptions into PDF pages.
//
// Provides the page/font model decoded from a batch, glyph-run drawings built
// from font outlines, the page compositor that walks a batch and keeps
// bookmark coverage, and a `lopdf`-backed canvas that writes the result.

pub mod canvas;
pub mod compositor;
pub mod glyphs;
pub mod layout;
pub mod pdf;

// Re-export the primary structs so callers can use `kindling_document::PdfCanvas` etc.
pub use canvas::{CanvasEvent, DocumentCanvas, RecordingCanvas};
pub use compositor::{BookmarkCursor, PageCompositor, Placement};
pub use glyphs::{GlyphRunDrawing, RgbColor};
pub use layout::{Child, ChildKind, FontIndex, FontRecord, Page};
pub use pdf::writer::PdfCanvas;
