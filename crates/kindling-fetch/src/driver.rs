// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pagination driver — fetches batches from position zero until the cursor
// passes the book's end position, renewing the session ahead of token expiry,
// then titles and saves the canvas.
//
// Per batch: renew if needed, fetch, fall back to manifest images when none
// were bundled, decrypt, compose, advance. A batch without pages, or one that
// fails to move the cursor forward, aborts the conversion without output.

use std::path::Path;

use tracing::{debug, info, instrument};

use kindling_core::ConversionConfig;
use kindling_core::error::{KindlingError, Result};
use kindling_core::types::{Clock, Position, Session, SystemClock};
use kindling_document::layout::decode_pages;
use kindling_document::{DocumentCanvas, PageCompositor};
use kindling_security::decrypt_images;

use crate::batch::{BatchFetcher, RenderRequest};
use crate::session::SessionProvider;

/// What a finished conversion did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionSummary {
    pub batches: u64,
    pub pages: u64,
    pub renewals: u64,
    /// First position past the last page composed.
    pub final_position: Position,
}

/// Drives one book through fetch, decrypt and composition.
pub struct PaginationDriver<P, F, C = SystemClock> {
    provider: P,
    fetcher: F,
    clock: C,
    config: ConversionConfig,
    session: Session,
}

impl<P: SessionProvider, F: BatchFetcher> PaginationDriver<P, F, SystemClock> {
    /// Start a session and prepare to convert.
    pub fn new(provider: P, fetcher: F, config: ConversionConfig) -> Result<Self> {
        Self::with_clock(provider, fetcher, config, SystemClock)
    }
}

impl<P: SessionProvider, F: BatchFetcher, C: Clock> PaginationDriver<P, F, C> {
    /// Like [`PaginationDriver::new`], reading expiry time from `clock`.
    pub fn with_clock(provider: P, fetcher: F, config: ConversionConfig, clock: C) -> Result<Self> {
        config.validate()?;
        let session = provider.start_session()?;
        Ok(Self {
            provider,
            fetcher,
            clock,
            config,
            session,
        })
    }

    /// The session the next fetch will use.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Settings the driver was built with.
    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Convert the whole book onto `canvas` and save it at `output`.
    #[instrument(skip(self, canvas, output), fields(title = %self.session.title))]
    pub fn run<D: DocumentCanvas + ?Sized>(
        &mut self,
        canvas: &mut D,
        output: &Path,
    ) -> Result<ConversionSummary> {
        let mut summary = ConversionSummary::default();
        let mut cursor: Position = 0;

        while cursor <= self.session.end_position {
            if self.renew_if_needed()? {
                summary.renewals += 1;
            }
            let (next, pages) = self.convert_batch(cursor, canvas)?;
            if next <= cursor {
                return Err(KindlingError::NoProgress {
                    start_position: cursor,
                });
            }

            summary.batches += 1;
            summary.pages += pages;
            info!(
                start = cursor,
                next,
                end = self.session.end_position,
                "batch composed"
            );
            cursor = next;
        }
        summary.final_position = cursor;

        canvas.set_title(&self.session.title);
        canvas.save(output)?;
        info!(
            batches = summary.batches,
            pages = summary.pages,
            renewals = summary.renewals,
            "conversion complete"
        );
        Ok(summary)
    }

    /// Replace the session when a refresh is forced or the token is about to
    /// expire. Returns whether it was replaced.
    fn renew_if_needed(&mut self) -> Result<bool> {
        let now = self.clock.now_millis();
        if !self.config.refresh && !self.session.needs_renewal(now) {
            return Ok(false);
        }
        debug!(
            now,
            expires_at = self.session.auth.expires_at,
            forced = self.config.refresh,
            "renewing session"
        );
        self.session = self.provider.start_session()?;
        Ok(true)
    }

    /// Fetch, decrypt and compose the batch starting at `cursor`.
    ///
    /// Returns the next cursor and the number of pages drawn.
    fn convert_batch<D: DocumentCanvas + ?Sized>(
        &self,
        cursor: Position,
        canvas: &mut D,
    ) -> Result<(Position, u64)> {
        let request = RenderRequest::new(
            &self.config,
            cursor,
            self.config.pages_per_batch,
            &self.session.auth.token,
        );
        let mut batch = self.fetcher.fetch_batch(&request, &self.session)?;

        let pages = match batch.page_document() {
            Some(document) => decode_pages(document)?,
            None => Vec::new(),
        };
        if pages.is_empty() {
            return Err(KindlingError::EmptyBatch {
                start_position: cursor,
            });
        }
        let fonts = batch.fonts()?;

        if batch.images.is_empty()
            && let Some(manifest) = batch.manifest()?
            && !manifest.cdn_resources.is_empty()
        {
            debug!(
                resources = manifest.cdn_resources.len(),
                "batch has no bundled images, downloading"
            );
            batch.images = self.fetcher.download_images(&manifest, &self.session)?;
        }
        decrypt_images(&mut batch.images, &self.session.auth)?;

        let compositor = PageCompositor::new(
            &fonts,
            &batch.images,
            self.config.device_to_points(),
            self.session.end_position,
        );
        let next = compositor.compose_batch(&pages, canvas, cursor)?;
        Ok((next, pages.len() as u64))
    }
}
