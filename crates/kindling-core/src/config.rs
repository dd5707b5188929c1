// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversion configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KindlingError, Result};
use crate::types::{POINTS_PER_INCH, PaperSize};

/// Settings that shape both the renderer request and the output PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Font size requested from the renderer.
    pub font_size: u32,
    /// Output page size; also sent to the renderer in device pixels.
    pub paper_size: PaperSize,
    /// Resolution the renderer lays pages out at.
    pub dpi: u32,
    /// Margins in inches.
    pub left_margin: f64,
    pub right_margin: f64,
    pub top_margin: f64,
    pub bottom_margin: f64,
    /// Renew the session before every batch, for reproducible recordings.
    pub refresh: bool,
    /// Pages requested per batch.
    pub pages_per_batch: u32,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            font_size: 12,
            paper_size: PaperSize::A4,
            dpi: 160,
            left_margin: 0.5,
            right_margin: 0.5,
            top_margin: 0.5,
            bottom_margin: 0.5,
            refresh: false,
            pages_per_batch: 6,
        }
    }
}

impl ConversionConfig {
    /// Load a JSON config file. Missing keys fall back to the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the layout maths cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.dpi == 0 {
            return Err(KindlingError::InvalidConfig("dpi must be positive".into()));
        }
        if self.pages_per_batch == 0 {
            return Err(KindlingError::InvalidConfig(
                "pages_per_batch must be positive".into(),
            ));
        }
        if self.font_size == 0 {
            return Err(KindlingError::InvalidConfig(
                "font_size must be positive".into(),
            ));
        }
        let margins = [
            self.left_margin,
            self.right_margin,
            self.top_margin,
            self.bottom_margin,
        ];
        if margins.iter().any(|m| !m.is_finite() || *m < 0.0) {
            return Err(KindlingError::InvalidConfig(
                "margins must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Factor converting renderer device pixels to points.
    pub fn device_to_points(&self) -> f64 {
        POINTS_PER_INCH / f64::from(self.dpi)
    }

    /// Page size in points (width, height).
    pub fn page_size_pt(&self) -> (f64, f64) {
        self.paper_size.dimensions_pt()
    }
}
