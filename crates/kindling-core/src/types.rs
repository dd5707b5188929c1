// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Kindling converter.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A point in the book's content stream.
///
/// The same integer space is used as the pagination cursor, the bookmark key
/// and the link destination.
pub type Position = u64;

/// Image reference → raw bytes, as delivered by a batch.
pub type ImageMap = HashMap<String, Vec<u8>>;

/// Tokens are renewed once the clock is within this many milliseconds of
/// their expiry.
pub const RENEWAL_MARGIN_MS: i64 = 5_000;

/// Points per inch, the unit both the canvas and the margins are expressed in.
pub const POINTS_PER_INCH: f64 = 72.0;

/// The rotating renderer token handed out when a reading session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub token: String,
    /// Expiry as milliseconds since the Unix epoch.
    pub expires_at: i64,
}

impl AuthToken {
    /// Whether the token is too close to its expiry to be used for a fetch.
    pub fn is_expiring(&self, now_millis: i64) -> bool {
        now_millis >= self.expires_at.saturating_sub(RENEWAL_MARGIN_MS)
    }
}

/// An established reading session.
///
/// Sessions are never patched in place: renewal produces a whole new value
/// which replaces the old one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub title: String,
    /// Content-format revision the renderer expects back.
    pub version: String,
    /// Inclusive upper bound of addressable content positions.
    pub end_position: Position,
    pub auth: AuthToken,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
}

impl Session {
    pub fn needs_renewal(&self, now_millis: i64) -> bool {
        self.auth.is_expiring(now_millis)
    }
}

/// Source of wall-clock time for expiry decisions.
pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Standard paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    A3,
    A5,
    Letter,
    Legal,
    Custom { width_mm: u32, height_mm: u32 },
}

impl PaperSize {
    /// Dimensions in points (width, height).
    pub fn dimensions_pt(&self) -> (f64, f64) {
        match self {
            Self::Letter => (612.0, 792.0),
            Self::Legal => (612.0, 1008.0),
            other => {
                let (w, h) = other.dimensions_mm();
                (mm_to_pt(w), mm_to_pt(h))
            }
        }
    }

    /// Dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::A4 => (210, 297),
            Self::A3 => (297, 420),
            Self::A5 => (148, 210),
            Self::Letter => (216, 279),
            Self::Legal => (216, 356),
            Self::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }
}

fn mm_to_pt(mm: u32) -> f64 {
    f64::from(mm) / 25.4 * POINTS_PER_INCH
}

/// An axis-aligned rectangle in page points, origin at the bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// `[x1, y1, x2, y2]`, the corner form PDF annotations use.
    pub fn corners(&self) -> [f64; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }
}
