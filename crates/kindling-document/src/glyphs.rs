// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Glyph-run drawings — a run of font outlines positioned along a baseline and
// placed on the page by the run's affine matrix.
//
// The drawing lives in a y-down space whose origin is the top-left corner of
// the page, the same space the renderer's transforms are expressed in.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;

use kindling_core::error::{KindlingError, Result};

use crate::layout::{FontIndex, RunNode};

/// Relative move segments at the start of an outline. They offset the pen
/// from the run origin and show up as stray strokes once the outlines are
/// accumulated.
static LEADING_MOVES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\s*m[\d.,\-\s]+)+").expect("leading-move pattern is valid")
});

/// Remove leading `m <numbers>` segments from SVG path data.
pub fn strip_leading_moves(path: &str) -> String {
    LEADING_MOVES.replace(path, "").into_owned()
}

/// An sRGB colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RgbColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl RgbColor {
    pub const BLACK: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    /// Parse `#rrggbb`, `#rrggbbaa`, `#rgb`, `rgb(r, g, b)`, `black` or
    /// `white`. Alpha is ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(hex) = text.strip_prefix('#') {
            let expanded: String = match hex.len() {
                3 => hex.chars().flat_map(|c| [c, c]).collect(),
                6 | 8 => hex.to_owned(),
                _ => return None,
            };
            let channel = |i: usize| {
                u8::from_str_radix(expanded.get(i..i + 2)?, 16)
                    .ok()
                    .map(|v| f64::from(v) / 255.0)
            };
            if expanded.len() == 8 {
                channel(6)?;
            }
            return Some(Self {
                r: channel(0)?,
                g: channel(2)?,
                b: channel(4)?,
            });
        }
        if let Some(body) = text
            .strip_prefix("rgb(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let mut parts = body.split(',').map(|p| p.trim().parse::<u8>().ok());
            let (r, g, b) = (parts.next()??, parts.next()??, parts.next()??);
            if parts.next().is_some() {
                return None;
            }
            return Some(Self {
                r: f64::from(r) / 255.0,
                g: f64::from(g) / 255.0,
                b: f64::from(b) / 255.0,
            });
        }
        match text.to_ascii_lowercase().as_str() {
            "black" => Some(Self::BLACK),
            "white" => Some(Self {
                r: 1.0,
                g: 1.0,
                b: 1.0,
            }),
            _ => None,
        }
    }

    fn to_hex(self) -> String {
        let byte = |v: f64| (v * 255.0).round().clamp(0.0, 255.0) as u8;
        format!("#{:02x}{:02x}{:02x}", byte(self.r), byte(self.g), byte(self.b))
    }
}

/// One glyph outline positioned within its run.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedGlyph {
    /// Offset along the run baseline, in run units.
    pub offset_x: f64,
    /// `font_size / units_per_em`.
    pub scale: f64,
    /// Outline with leading relative moves removed.
    pub path: String,
}

/// A run of glyph outlines ready to be drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRunDrawing {
    /// Run matrix, already scaled to points.
    pub matrix: [f64; 6],
    /// Fill and stroke colour.
    pub color: RgbColor,
    pub glyphs: Vec<PlacedGlyph>,
}

impl GlyphRunDrawing {
    /// Build the drawing for `run` placed by `matrix`.
    ///
    /// Fails with a lookup error when the font, a glyph id, an offset or the
    /// colour cannot be resolved; the caller skips such runs.
    pub fn compose(run: &RunNode, matrix: [f64; 6], fonts: &FontIndex) -> Result<Self> {
        let font = fonts.get(&run.font_key)?;
        if !(font.units_per_em.is_finite() && font.units_per_em > 0.0) {
            return Err(KindlingError::LayoutLookup(format!(
                "font {} has unusable unitsPerEm {}",
                font.font_key, font.units_per_em
            )));
        }
        if run.x_position.len() < run.glyphs.len() {
            return Err(KindlingError::LayoutLookup(format!(
                "run in font {} has {} glyphs but {} offsets",
                run.font_key,
                run.glyphs.len(),
                run.x_position.len()
            )));
        }
        let color = RgbColor::parse(&run.text_color).ok_or_else(|| {
            KindlingError::LayoutLookup(format!("unrecognised text colour {:?}", run.text_color))
        })?;

        let scale = run.font_size / font.units_per_em;
        let mut glyphs = Vec::with_capacity(run.glyphs.len());
        for (glyph_id, offset_x) in run.glyphs.iter().zip(&run.x_position) {
            let Some(outline) = font.outline(*glyph_id)? else {
                continue;
            };
            let path = strip_leading_moves(outline);
            if path.trim().is_empty() {
                continue;
            }
            glyphs.push(PlacedGlyph {
                offset_x: *offset_x,
                scale,
                path,
            });
        }

        Ok(Self {
            matrix,
            color,
            glyphs,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// The drawing as a standalone SVG document.
    pub fn to_svg(&self) -> String {
        let [a, b, c, d, e, f] = self.matrix;
        let color = self.color.to_hex();
        let mut svg = String::from(
            "<?xml version=\"1.0\" standalone=\"no\"?>\n<svg version=\"1.1\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        );
        let _ = writeln!(svg, "<g transform=\"matrix({a}, {b}, {c}, {d}, {e}, {f})\">");
        for glyph in &self.glyphs {
            let _ = writeln!(
                svg,
                "<g transform=\"translate({}, 0) scale({})\"><path d=\"{}\" fill=\"{color}\" stroke=\"{color}\"/></g>",
                glyph.offset_x, glyph.scale, glyph.path
            );
        }
        svg.push_str("</g>\n</svg>\n");
        svg
    }
}
