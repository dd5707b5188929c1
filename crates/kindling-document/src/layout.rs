// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page and font model — the typed form of a batch's `page_data_0_*` and
// `glyphs.json` documents.
//
// Children are decoded as a tagged union on their `type` field. Any other
// node type is rejected when the batch is decoded rather than skipped while
// drawing.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use kindling_core::error::{KindlingError, Result};
use kindling_core::types::Position;

/// One rendered page of a batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub children: Vec<Child>,
    /// Last content position on this page; the next page starts after it.
    pub end_position_id: Position,
}

/// A positioned element on a page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Child {
    /// Affine matrix `[a, b, c, d, e, f]` in renderer device pixels.
    pub transform: [f64; 6],
    pub rect: LayoutRect,
    #[serde(default)]
    pub start_position_id: Option<Position>,
    #[serde(default)]
    pub link: Option<Link>,
    #[serde(flatten)]
    pub kind: ChildKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChildKind {
    Run(RunNode),
    Image(ImageNode),
}

/// A run of glyphs sharing one font, size and colour.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunNode {
    pub font_key: String,
    #[serde(default)]
    pub glyphs: Vec<u32>,
    /// Horizontal offset of each glyph, in font-size-scaled units.
    #[serde(default)]
    pub x_position: Vec<f64>,
    pub font_size: f64,
    pub text_color: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageNode {
    pub image_reference: String,
}

/// Extent of a child in its own (pre-transform) space.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LayoutRect {
    pub right: f64,
    pub bottom: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    /// Internal destination; absent for links the renderer could not resolve.
    #[serde(default)]
    pub link_position_id: Option<Position>,
}

impl Child {
    /// The link destination, if it addresses a position before `end_position`.
    pub fn link_destination(&self, end_position: Position) -> Option<Position> {
        self.link
            .and_then(|link| link.link_position_id)
            .filter(|dest| *dest < end_position)
    }
}

/// Decode a page-layout document into pages.
pub fn decode_pages(document: &Value) -> Result<Vec<Page>> {
    let pages = Vec::<Page>::deserialize(document)
        .map_err(|e| KindlingError::MalformedBatch(format!("page layout: {e}")))?;
    debug!(pages = pages.len(), "page layout decoded");
    Ok(pages)
}

// -- Fonts ----------------------------------------------------------------------

/// Outline data for one font of the batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontRecord {
    pub font_key: String,
    pub units_per_em: f64,
    /// Glyph id (as a decimal string) → outline.
    #[serde(default)]
    pub glyphs: HashMap<String, GlyphOutline>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlyphOutline {
    /// SVG path data; missing or empty for whitespace glyphs.
    #[serde(default)]
    pub path: Option<String>,
}

impl FontRecord {
    /// Outline for `glyph_id`.
    ///
    /// `Ok(None)` means the glyph exists but draws nothing. An id the font does
    /// not know at all is a lookup failure.
    pub fn outline(&self, glyph_id: u32) -> Result<Option<&str>> {
        let glyph = self.glyphs.get(&glyph_id.to_string()).ok_or_else(|| {
            KindlingError::LayoutLookup(format!(
                "glyph {glyph_id} missing from font {}",
                self.font_key
            ))
        })?;
        Ok(glyph.path.as_deref().filter(|path| !path.trim().is_empty()))
    }
}

/// Font key → record, built once per batch.
#[derive(Debug, Clone, Default)]
pub struct FontIndex {
    fonts: HashMap<String, FontRecord>,
}

impl FontIndex {
    /// Index the records. When a key repeats, the first record wins.
    pub fn new(records: Vec<FontRecord>) -> Self {
        let mut fonts = HashMap::with_capacity(records.len());
        for record in records {
            fonts.entry(record.font_key.clone()).or_insert(record);
        }
        Self { fonts }
    }

    /// Decode and index a `glyphs.json` document.
    pub fn decode(document: &Value) -> Result<Self> {
        let records = Vec::<FontRecord>::deserialize(document)
            .map_err(|e| KindlingError::MalformedBatch(format!("font table: {e}")))?;
        debug!(fonts = records.len(), "font table decoded");
        Ok(Self::new(records))
    }

    /// Look up a font; an unknown key is a recoverable lookup failure.
    pub fn get(&self, font_key: &str) -> Result<&FontRecord> {
        self.fonts
            .get(font_key)
            .ok_or_else(|| KindlingError::LayoutLookup(format!("unknown font key {font_key}")))
    }

    /// Number of distinct font keys.
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_run_and_image_children() {
        let doc = json!([{
            "endPositionId": 41,
            "children": [
                {
                    "type": "run",
                    "transform": [1, 0, 0, 1, 10, 20],
                    "rect": { "left": 0, "top": 0, "right": 100, "bottom": 12 },
                    "startPositionId": 30,
                    "fontKey": "F1",
                    "glyphs": [3, 4],
                    "xPosition": [0.0, 6.5],
                    "fontSize": 12.0,
                    "textColor": "#000000"
                },
                {
                    "type": "image",
                    "transform": [2, 0, 0, 2, 0, 0],
                    "rect": { "right": 50, "bottom": 40 },
                    "imageReference": "img/1.jpg",
                    "link": { "linkPositionId": 7 }
                }
            ]
        }]);

        let pages = decode_pages(&doc).expect("decode");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].end_position_id, 41);
        let children = &pages[0].children;
        assert!(matches!(&children[0].kind, ChildKind::Run(run) if run.glyphs == vec![3, 4]));
        assert_eq!(children[0].start_position_id, Some(30));
        assert!(
            matches!(&children[1].kind, ChildKind::Image(img) if img.image_reference == "img/1.jpg")
        );
        assert_eq!(children[1].link_destination(100), Some(7));
    }

    #[test]
    fn unknown_child_type_is_rejected() {
        let doc = json!([{
            "endPositionId": 1,
            "children": [{
                "type": "video",
                "transform": [1, 0, 0, 1, 0, 0],
                "rect": { "right": 1, "bottom": 1 }
            }]
        }]);
        assert!(matches!(
            decode_pages(&doc),
            Err(KindlingError::MalformedBatch(_))
        ));
    }

    #[test]
    fn short_transform_is_rejected() {
        let doc = json!([{
            "endPositionId": 1,
            "children": [{
                "type": "image",
                "transform": [1, 0, 0, 1],
                "rect": { "right": 1, "bottom": 1 },
                "imageReference": "a"
            }]
        }]);
        assert!(decode_pages(&doc).is_err());
    }

    #[test]
    fn link_destination_is_strictly_below_end() {
        let child = |dest: Position| Child {
            transform: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            rect: LayoutRect {
                right: 1.0,
                bottom: 1.0,
            },
            start_position_id: None,
            link: Some(Link {
                link_position_id: Some(dest),
            }),
            kind: ChildKind::Image(ImageNode {
                image_reference: "a".into(),
            }),
        };
        assert_eq!(child(99).link_destination(100), Some(99));
        assert_eq!(child(100).link_destination(100), None);
    }

    #[test]
    fn font_index_keeps_first_record() {
        let doc = json!([
            { "fontKey": "F1", "unitsPerEm": 1000, "glyphs": { "3": { "path": "M0 0L1 1" } } },
            { "fontKey": "F1", "unitsPerEm": 2048, "glyphs": {} },
            { "fontKey": "F2", "unitsPerEm": 2048, "glyphs": { "5": {} } }
        ]);
        let index = FontIndex::decode(&doc).expect("decode");
        assert_eq!(index.len(), 2);

        let f1 = index.get("F1").expect("F1");
        assert_eq!(f1.units_per_em, 1000.0);
        assert_eq!(f1.outline(3).expect("glyph 3"), Some("M0 0L1 1"));
        assert!(matches!(f1.outline(9), Err(KindlingError::LayoutLookup(_))));

        let f2 = index.get("F2").expect("F2");
        assert_eq!(f2.outline(5).expect("glyph 5"), None);
        assert!(matches!(index.get("F3"), Err(KindlingError::LayoutLookup(_))));
    }
}
