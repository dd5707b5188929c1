// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The drawing surface the compositor writes to.

use std::path::Path;

use kindling_core::error::Result;
use kindling_core::types::{Position, Rect};

use crate::glyphs::GlyphRunDrawing;

/// A paginated output document with a current, open page.
///
/// Coordinates are PDF points with the origin at the bottom-left of the page.
pub trait DocumentCanvas {
    /// Page size in points (width, height).
    fn page_size(&self) -> (f64, f64);

    fn set_title(&mut self, title: &str);

    /// Make `position` a jump target resolving to the current page.
    fn bookmark_page(&mut self, position: Position);

    /// Draw encoded image bytes (JPEG, PNG, ...) stretched over `rect`.
    fn draw_image(&mut self, image: &[u8], rect: Rect) -> Result<()>;

    /// Draw a glyph run whose top-left origin is placed at (`x`, `y`).
    fn draw_glyph_run(&mut self, drawing: &GlyphRunDrawing, x: f64, y: f64) -> Result<()>;

    /// Make `rect` on the current page a link to the bookmark for `destination`.
    fn link_rect(&mut self, destination: Position, rect: Rect);

    /// Seal the current page and start a fresh one.
    fn new_page(&mut self) -> Result<()>;

    /// Write the finished document to `path`.
    fn save(&mut self, path: &Path) -> Result<()>;
}

/// Everything a [`RecordingCanvas`] was asked to do, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    Bookmark { position: Position, page: usize },
    Image { rect: Rect, bytes: usize },
    GlyphRun { drawing: GlyphRunDrawing, x: f64, y: f64 },
    Link { destination: Position, rect: Rect },
    NewPage,
    Saved { path: std::path::PathBuf },
}

/// A canvas that draws nothing and records every call.
///
/// Backs the CLI's dry-run mode and the compositor tests.
#[derive(Debug, Clone)]
pub struct RecordingCanvas {
    page_size: (f64, f64),
    title: Option<String>,
    page: usize,
    events: Vec<CanvasEvent>,
}

impl RecordingCanvas {
    /// An empty recording whose pages report `page_size` points.
    pub fn new(page_size: (f64, f64)) -> Self {
        Self {
            page_size,
            title: None,
            page: 0,
            events: Vec::new(),
        }
    }

    /// Title set by the driver, if any.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Every recorded call, oldest first.
    pub fn events(&self) -> &[CanvasEvent] {
        &self.events
    }

    /// Bookmarked positions in emission order.
    pub fn bookmarks(&self) -> Vec<Position> {
        self.events
            .iter()
            .filter_map(|event| match event {
                CanvasEvent::Bookmark { position, .. } => Some(*position),
                _ => None,
            })
            .collect()
    }

    /// Number of pages sealed so far.
    pub fn sealed_pages(&self) -> usize {
        self.page
    }
}

impl DocumentCanvas for RecordingCanvas {
    fn page_size(&self) -> (f64, f64) {
        self.page_size
    }

    fn set_title(&mut self, title: &str) {
        self.title = Some(title.to_owned());
    }

    fn bookmark_page(&mut self, position: Position) {
        self.events.push(CanvasEvent::Bookmark {
            position,
            page: self.page,
        });
    }

    fn draw_image(&mut self, image: &[u8], rect: Rect) -> Result<()> {
        self.events.push(CanvasEvent::Image {
            rect,
            bytes: image.len(),
        });
        Ok(())
    }

    fn draw_glyph_run(&mut self, drawing: &GlyphRunDrawing, x: f64, y: f64) -> Result<()> {
        self.events.push(CanvasEvent::GlyphRun {
            drawing: drawing.clone(),
            x,
            y,
        });
        Ok(())
    }

    fn link_rect(&mut self, destination: Position, rect: Rect) {
        self.events.push(CanvasEvent::Link { destination, rect });
    }

    fn new_page(&mut self) -> Result<()> {
        self.page += 1;
        self.events.push(CanvasEvent::NewPage);
        Ok(())
    }

    fn save(&mut self, path: &Path) -> Result<()> {
        self.events.push(CanvasEvent::Saved {
            path: path.to_path_buf(),
        });
        Ok(())
    }
}
