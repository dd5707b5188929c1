// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page compositor — walks the pages of one batch, draws every child onto the
// canvas, and keeps bookmark coverage of the content positions it passes.
//
// Coverage rule: every position between the cursor and a newly observed
// boundary is bookmarked exactly once, and the cursor only ever moves forward.
// Repeated or out-of-order boundaries therefore emit nothing.

use tracing::{debug, instrument, warn};

use kindling_core::error::{KindlingError, Result};
use kindling_core::types::{ImageMap, Position, Rect};

use crate::canvas::DocumentCanvas;
use crate::glyphs::GlyphRunDrawing;
use crate::layout::{Child, ChildKind, FontIndex, ImageNode, Page, RunNode};

/// The next content position still lacking a bookmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookmarkCursor {
    next: Position,
}

impl BookmarkCursor {
    /// A cursor with nothing covered yet; `start` is the first position to
    /// bookmark.
    pub fn new(start: Position) -> Self {
        Self { next: start }
    }

    /// The first position not yet bookmarked.
    pub fn position(&self) -> Position {
        self.next
    }

    /// Bookmark every position from the cursor through `through` on the
    /// current page, then move the cursor past `through`.
    ///
    /// Returns how many bookmarks were emitted.
    pub fn cover_through<C: DocumentCanvas + ?Sized>(
        &mut self,
        through: Position,
        canvas: &mut C,
    ) -> u64 {
        let mut emitted = 0;
        for position in self.next..=through {
            canvas.bookmark_page(position);
            emitted += 1;
        }
        self.next = self.next.max(through.saturating_add(1));
        emitted
    }
}

/// Where a child lands on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// The child's transform scaled from device pixels to points.
    pub matrix: [f64; 6],
    /// Bounding rectangle in page points (origin bottom-left).
    pub rect: Rect,
}

impl Placement {
    /// Scale the child's transform by `device_to_points` and derive its
    /// bottom-left-origin rectangle.
    pub fn compute(child: &Child, device_to_points: f64, page_height: f64) -> Result<Self> {
        let matrix = child.transform.map(|v| v * device_to_points);
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(KindlingError::CorruptTransform(format!(
                "transform {:?} is not finite after scaling",
                child.transform
            )));
        }

        let width = child.rect.right * matrix[0];
        let height = child.rect.bottom * matrix[3];
        let x = matrix[4];
        let y = page_height - matrix[5] - height;
        Ok(Self {
            matrix,
            rect: Rect::new(x, y, width, height),
        })
    }
}

/// Draws the pages of one batch.
pub struct PageCompositor<'a> {
    fonts: &'a FontIndex,
    images: &'a ImageMap,
    /// `72 / dpi`.
    device_to_points: f64,
    /// Links at or past this position are dropped.
    end_position: Position,
}

impl<'a> PageCompositor<'a> {
    /// Borrow one batch's fonts and decrypted images.
    ///
    /// `device_to_points` is `72 / dpi`; links to `end_position` or beyond
    /// are dropped.
    pub fn new(
        fonts: &'a FontIndex,
        images: &'a ImageMap,
        device_to_points: f64,
        end_position: Position,
    ) -> Self {
        Self {
            fonts,
            images,
            device_to_points,
            end_position,
        }
    }

    /// Draw `pages` in order, starting bookmark coverage at `start`.
    ///
    /// Returns the next content position to fetch from.
    #[instrument(skip(self, pages, canvas), fields(pages = pages.len()))]
    pub fn compose_batch<C: DocumentCanvas + ?Sized>(
        &self,
        pages: &[Page],
        canvas: &mut C,
        start: Position,
    ) -> Result<Position> {
        let mut cursor = BookmarkCursor::new(start);
        for page in pages {
            self.compose_page(page, canvas, &mut cursor)?;
        }
        debug!(next = cursor.position(), "batch composed");
        Ok(cursor.position())
    }

    /// Draw one page and seal it.
    pub fn compose_page<C: DocumentCanvas + ?Sized>(
        &self,
        page: &Page,
        canvas: &mut C,
        cursor: &mut BookmarkCursor,
    ) -> Result<()> {
        let (_, page_height) = canvas.page_size();

        for child in &page.children {
            if let Some(start) = child.start_position_id {
                cursor.cover_through(start, canvas);
            }

            let placement = Placement::compute(child, self.device_to_points, page_height)?;

            let drawn = match &child.kind {
                ChildKind::Run(run) => self.draw_run(run, &placement, page_height, canvas),
                ChildKind::Image(image) => self.draw_image(image, &placement, canvas),
            };
            match drawn {
                Ok(()) => {}
                Err(err) if err.is_recoverable() => {
                    warn!(error = %err, end_position = page.end_position_id, "skipping child");
                }
                Err(err) => return Err(err),
            }

            if let Some(destination) = child.link_destination(self.end_position) {
                canvas.link_rect(destination, placement.rect);
            }
        }

        cursor.cover_through(page.end_position_id, canvas);
        canvas.new_page()?;
        debug!(end_position = page.end_position_id, "page sealed");
        Ok(())
    }

    fn draw_run<C: DocumentCanvas + ?Sized>(
        &self,
        run: &RunNode,
        placement: &Placement,
        page_height: f64,
        canvas: &mut C,
    ) -> Result<()> {
        let drawing = GlyphRunDrawing::compose(run, placement.matrix, self.fonts)?;
        if drawing.is_empty() {
            return Ok(());
        }
        canvas.draw_glyph_run(&drawing, 0.0, page_height)
    }

    fn draw_image<C: DocumentCanvas + ?Sized>(
        &self,
        image: &ImageNode,
        placement: &Placement,
        canvas: &mut C,
    ) -> Result<()> {
        let bytes = self.images.get(&image.image_reference).ok_or_else(|| {
            KindlingError::LayoutLookup(format!(
                "image {} not present in batch",
                image.image_reference
            ))
        })?;
        canvas.draw_image(bytes, placement.rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{CanvasEvent, RecordingCanvas};
    use crate::layout::decode_pages;
    use kindling_core::types::PaperSize;
    use proptest::prelude::*;
    use serde_json::{Value, json};

    const DPI_160: f64 = 72.0 / 160.0;

    fn a4() -> RecordingCanvas {
        RecordingCanvas::new(PaperSize::A4.dimensions_pt())
    }

    fn fonts() -> FontIndex {
        FontIndex::decode(&json!([{
            "fontKey": "F1",
            "unitsPerEm": 2048,
            "glyphs": {
                "10": { "path": "m3,4 M0 0L100 0L100 100Z" },
                "11": { "path": "M0 0L50 50" }
            }
        }]))
        .expect("fonts")
    }

    fn image_child(start: Option<u64>, link: Option<u64>) -> Value {
        let mut child = json!({
            "type": "image",
            "transform": [1, 0, 0, 1, 0, 0],
            "rect": { "right": 10, "bottom": 10 },
            "imageReference": "a.jpg"
        });
        if let Some(start) = start {
            child["startPositionId"] = json!(start);
        }
        if let Some(link) = link {
            child["link"] = json!({ "linkPositionId": link });
        }
        child
    }

    fn compose(pages: Value, start: Position, canvas: &mut RecordingCanvas) -> Position {
        let pages = decode_pages(&pages).expect("pages");
        let images = ImageMap::from([("a.jpg".to_string(), vec![0xFF, 0xD8, 0xFF])]);
        let fonts = fonts();
        PageCompositor::new(&fonts, &images, DPI_160, 1_000)
            .compose_batch(&pages, canvas, start)
            .expect("compose")
    }

    #[test]
    fn cursor_covers_gaps_once() {
        let mut canvas = a4();
        let mut cursor = BookmarkCursor::new(0);
        assert_eq!(cursor.cover_through(3, &mut canvas), 4);
        assert_eq!(cursor.cover_through(3, &mut canvas), 0);
        assert_eq!(cursor.cover_through(1, &mut canvas), 0);
        assert_eq!(cursor.cover_through(5, &mut canvas), 2);
        assert_eq!(cursor.position(), 6);
        assert_eq!(canvas.bookmarks(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn bookmarks_are_monotonic_across_unordered_boundaries() {
        let pages = json!([
            { "endPositionId": 9, "children": [
                image_child(Some(4), None),
                image_child(Some(2), None),
                image_child(Some(4), None),
                image_child(Some(7), None)
            ]},
            { "endPositionId": 8, "children": [image_child(Some(6), None)] },
            { "endPositionId": 15, "children": [image_child(Some(12), None)] }
        ]);
        let mut canvas = a4();
        let next = compose(pages, 0, &mut canvas);

        assert_eq!(next, 16);
        assert_eq!(canvas.bookmarks(), (0..16).collect::<Vec<_>>());
        assert_eq!(canvas.sealed_pages(), 3);
    }

    #[test]
    fn bookmarks_land_on_the_page_that_reaches_them() {
        let pages = json!([
            { "endPositionId": 2, "children": [] },
            { "endPositionId": 4, "children": [image_child(Some(3), None)] }
        ]);
        let mut canvas = a4();
        compose(pages, 0, &mut canvas);

        let pages_of: Vec<(u64, usize)> = canvas
            .events()
            .iter()
            .filter_map(|e| match e {
                CanvasEvent::Bookmark { position, page } => Some((*position, *page)),
                _ => None,
            })
            .collect();
        assert_eq!(pages_of, vec![(0, 0), (1, 0), (2, 0), (3, 1), (4, 1)]);
    }

    #[test]
    fn resuming_mid_book_starts_at_the_cursor() {
        let pages = json!([{ "endPositionId": 12, "children": [image_child(Some(11), None)] }]);
        let mut canvas = a4();
        let next = compose(pages, 10, &mut canvas);
        assert_eq!(next, 13);
        assert_eq!(canvas.bookmarks(), vec![10, 11, 12]);
    }

    #[test]
    fn link_at_end_position_is_dropped() {
        let pages = json!([{ "endPositionId": 0, "children": [
            image_child(None, Some(1_000)),
            image_child(None, Some(999))
        ]}]);
        let mut canvas = a4();
        compose(pages, 0, &mut canvas);

        let links: Vec<u64> = canvas
            .events()
            .iter()
            .filter_map(|e| match e {
                CanvasEvent::Link { destination, .. } => Some(*destination),
                _ => None,
            })
            .collect();
        assert_eq!(links, vec![999]);
    }

    #[test]
    fn run_is_drawn_from_the_top_of_the_page_with_stripped_moves() {
        let pages = json!([{ "endPositionId": 3, "children": [{
            "type": "run",
            "transform": [1, 0, 0, 1, 160, 320],
            "rect": { "right": 200, "bottom": 30 },
            "fontKey": "F1",
            "glyphs": [10, 11],
            "xPosition": [0, 1200],
            "fontSize": 32,
            "textColor": "#000000"
        }]}]);
        let mut canvas = a4();
        compose(pages, 0, &mut canvas);

        let (_, page_height) = PaperSize::A4.dimensions_pt();
        let run = canvas
            .events()
            .iter()
            .find_map(|e| match e {
                CanvasEvent::GlyphRun { drawing, x, y } => Some((drawing.clone(), *x, *y)),
                _ => None,
            })
            .expect("glyph run drawn");
        assert_eq!((run.1, run.2), (0.0, page_height));
        assert_eq!(run.0.matrix, [0.45, 0.0, 0.0, 0.45, 72.0, 144.0]);
        assert_eq!(run.0.glyphs.len(), 2);
        assert_eq!(run.0.glyphs[0].path, "M0 0L100 0L100 100Z");
        assert!((run.0.glyphs[0].scale - 32.0 / 2048.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_font_skips_only_that_run() {
        let pages = json!([{ "endPositionId": 1, "children": [
            {
                "type": "run",
                "transform": [1, 0, 0, 1, 0, 0],
                "rect": { "right": 1, "bottom": 1 },
                "fontKey": "nope",
                "glyphs": [10],
                "xPosition": [0],
                "fontSize": 12,
                "textColor": "#000",
                "link": { "linkPositionId": 5 }
            },
            image_child(None, None)
        ]}]);
        let mut canvas = a4();
        let next = compose(pages, 0, &mut canvas);

        assert_eq!(next, 2);
        assert!(canvas.events().iter().any(|e| matches!(e, CanvasEvent::Image { .. })));
        assert!(canvas.events().iter().any(|e| matches!(e, CanvasEvent::Link { destination: 5, .. })));
        assert!(!canvas.events().iter().any(|e| matches!(e, CanvasEvent::GlyphRun { .. })));
    }

    #[test]
    fn image_rect_follows_scaled_transform() {
        let pages = json!([{ "endPositionId": 0, "children": [{
            "type": "image",
            "transform": [2, 0, 0, 2, 100, 200],
            "rect": { "right": 300, "bottom": 400 },
            "imageReference": "a.jpg"
        }]}]);
        let mut canvas = a4();
        compose(pages, 0, &mut canvas);

        let (_, page_height) = PaperSize::A4.dimensions_pt();
        let rect = canvas
            .events()
            .iter()
            .find_map(|e| match e {
                CanvasEvent::Image { rect, .. } => Some(*rect),
                _ => None,
            })
            .expect("image drawn");
        // 300 * 2 * 0.45 = 270, 400 * 2 * 0.45 = 360
        assert!((rect.width - 270.0).abs() < 1e-9);
        assert!((rect.height - 360.0).abs() < 1e-9);
        assert!((rect.x - 45.0).abs() < 1e-9);
        assert!((rect.y - (page_height - 90.0 - 360.0)).abs() < 1e-9);
    }

    #[test]
    fn non_finite_transform_is_fatal() {
        let pages = decode_pages(&json!([{ "endPositionId": 0, "children": [{
            "type": "image",
            "transform": [1e308, 0, 0, 1, 0, 0],
            "rect": { "right": 1, "bottom": 1 },
            "imageReference": "a.jpg"
        }]}]))
        .expect("pages");
        let fonts = fonts();
        let images = ImageMap::new();
        let mut canvas = a4();
        // 1e308 * (72 / 1e-3 dpi) overflows to infinity.
        let result = PageCompositor::new(&fonts, &images, 72_000.0, 10)
            .compose_batch(&pages, &mut canvas, 0);
        assert!(matches!(result, Err(KindlingError::CorruptTransform(_))));
    }

    #[test]
    fn missing_image_is_skipped() {
        let pages = decode_pages(&json!([{ "endPositionId": 0, "children": [image_child(None, None)] }]))
            .expect("pages");
        let fonts = fonts();
        let images = ImageMap::new();
        let mut canvas = a4();
        let next = PageCompositor::new(&fonts, &images, DPI_160, 10)
            .compose_batch(&pages, &mut canvas, 0)
            .expect("missing image is recoverable");
        assert_eq!(next, 1);
        assert!(!canvas.events().iter().any(|e| matches!(e, CanvasEvent::Image { .. })));
    }

    proptest! {
        #[test]
        fn every_position_is_bookmarked_once_in_order(
            pages in prop::collection::vec(
                (prop::collection::vec(prop::option::of(0u64..300), 0..5), 0u64..300),
                1..8,
            ),
        ) {
            let highest = pages
                .iter()
                .flat_map(|(starts, end)| starts.iter().flatten().copied().chain([*end]))
                .max()
                .unwrap_or(0);
            let document: Vec<Value> = pages
                .iter()
                .map(|(starts, end)| {
                    let children: Vec<Value> =
                        starts.iter().map(|start| image_child(*start, None)).collect();
                    json!({ "endPositionId": end, "children": children })
                })
                .collect();

            let mut canvas = a4();
            let next = compose(Value::Array(document), 0, &mut canvas);

            prop_assert_eq!(next, highest + 1);
            prop_assert_eq!(canvas.bookmarks(), (0..next).collect::<Vec<_>>());
            prop_assert_eq!(canvas.sealed_pages(), pages.len());
        }
    }
}
