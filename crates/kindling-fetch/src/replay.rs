// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Replay fetcher — serves sessions, batches and images from a directory of
// recorded reader-service responses, so a conversion can be re-run offline.
//
// Layout:
//
//   session.json          { "asin", "startReading", "metadata", "headers", "cookies" }
//   batch-<start>.tar     renderer response for startingPosition=<start>
//   assets/<url>          out-of-band images named by manifest resource url

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use kindling_core::error::{KindlingError, Result};
use kindling_core::types::{ImageMap, Position, Session};

use crate::batch::{Batch, BatchFetcher, Manifest, RenderRequest};
use crate::session::{BookMetadata, SessionProvider, StartReading, establish_session};

pub const SESSION_FILE: &str = "session.json";
pub const ASSETS_DIR: &str = "assets";

/// `session.json` as recorded.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordedSession {
    asin: String,
    start_reading: StartReading,
    /// Either the raw `loadMetadata(...)` script or the object inside it.
    metadata: Value,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    cookies: BTreeMap<String, String>,
}

/// A [`SessionProvider`] and [`BatchFetcher`] backed by a recording directory.
#[derive(Debug, Clone)]
pub struct ReplayFetcher {
    root: PathBuf,
}

impl ReplayFetcher {
    /// Open a recording. Fails when the directory has no session file.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.join(SESSION_FILE).is_file() {
            return Err(KindlingError::Auth(format!(
                "no recorded session in {}",
                root.display()
            )));
        }
        info!(path = %root.display(), "replaying recorded conversion");
        Ok(Self { root })
    }

    /// Where the batch for `start` is recorded.
    pub fn batch_path(&self, start: Position) -> PathBuf {
        self.root.join(format!("batch-{start}.tar"))
    }

    /// Where the image for manifest url `url` is recorded, if the url stays
    /// inside the assets directory.
    pub fn asset_path(&self, url: &str) -> Option<PathBuf> {
        let relative = Path::new(url);
        let contained = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        contained.then(|| self.root.join(ASSETS_DIR).join(relative))
    }
}

impl SessionProvider for ReplayFetcher {
    #[instrument(skip(self))]
    fn start_session(&self) -> Result<Session> {
        let raw = std::fs::read_to_string(self.root.join(SESSION_FILE))?;
        let recorded: RecordedSession = serde_json::from_str(&raw)
            .map_err(|err| KindlingError::Auth(format!("unreadable recorded session: {err}")))?;

        let metadata = match &recorded.metadata {
            Value::String(script) => BookMetadata::from_script(script)?,
            other => BookMetadata::from_json(other)?,
        };
        establish_session(
            &recorded.asin,
            recorded.start_reading,
            metadata,
            recorded.headers,
            recorded.cookies,
        )
    }
}

impl BatchFetcher for ReplayFetcher {
    #[instrument(skip(self, request, _session), fields(start = request.start_position))]
    fn fetch_batch(&self, request: &RenderRequest, _session: &Session) -> Result<Batch> {
        let path = self.batch_path(request.start_position);
        let bytes = std::fs::read(&path).map_err(|err| {
            KindlingError::Fetch(format!(
                "no recorded batch for position {} ({}): {err}",
                request.start_position,
                path.display()
            ))
        })?;
        Batch::from_tar(&bytes)
    }

    #[instrument(skip_all, fields(resources = manifest.cdn_resources.len()))]
    fn download_images(&self, manifest: &Manifest, session: &Session) -> Result<ImageMap> {
        let mut images = ImageMap::new();
        for resource in &manifest.cdn_resources {
            let location = manifest.resource_location(resource, &session.auth);
            let Some(path) = self.asset_path(&resource.url) else {
                warn!(%location, "refusing asset path outside the recording");
                continue;
            };
            match std::fs::read(&path) {
                Ok(bytes) => {
                    debug!(%location, bytes = bytes.len(), "replayed image");
                    images.insert(resource.url.clone(), bytes);
                }
                Err(err) => {
                    warn!(%location, error = %err, "failed to load image");
                }
            }
        }
        debug!(loaded = images.len(), "manifest images loaded");
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::tests::tar_of;
    use crate::batch::{Cdn, CdnResource};
    use kindling_core::ConversionConfig;
    use serde_json::json;

    fn record_session(dir: &Path, owned: bool) {
        let session = json!({
            "asin": "B000TEST",
            "startReading": {
                "isOwned": owned,
                "karamelToken": { "token": "t".repeat(100), "expiresAt": 4_000_000_000_000i64 }
            },
            "metadata": "loadMetadata({\"title\":\"Replay\",\"version\":\"2\",\"endPosition\":10});"
        });
        std::fs::write(dir.join(SESSION_FILE), session.to_string()).expect("write session");
    }

    #[test]
    fn open_requires_session_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            ReplayFetcher::open(dir.path()),
            Err(KindlingError::Auth(_))
        ));
    }

    #[test]
    fn replays_session_and_batch() {
        let dir = tempfile::tempdir().expect("tempdir");
        record_session(dir.path(), true);
        std::fs::write(
            dir.path().join("batch-0.tar"),
            tar_of(&[("glyphs.json", b"[]".to_vec())]),
        )
        .expect("write batch");

        let replay = ReplayFetcher::open(dir.path()).expect("open");
        let session = replay.start_session().expect("session");
        assert_eq!(session.title, "Replay");
        assert_eq!(session.end_position, 10);

        let request = RenderRequest::new(&ConversionConfig::default(), 0, 6, &session.auth.token);
        let batch = replay.fetch_batch(&request, &session).expect("batch");
        assert!(batch.documents.contains_key("glyphs.json"));

        let later = RenderRequest::new(&ConversionConfig::default(), 7, 6, &session.auth.token);
        assert!(matches!(
            replay.fetch_batch(&later, &session),
            Err(KindlingError::Fetch(_))
        ));
    }

    #[test]
    fn unowned_recording_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        record_session(dir.path(), false);
        let replay = ReplayFetcher::open(dir.path()).expect("open");
        assert!(matches!(
            replay.start_session(),
            Err(KindlingError::NotOwned { .. })
        ));
    }

    #[test]
    fn downloads_recorded_assets_and_skips_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        record_session(dir.path(), true);
        std::fs::create_dir_all(dir.path().join("assets/img")).expect("mkdir");
        std::fs::write(dir.path().join("assets/img/a.png"), [9u8, 9]).expect("write");

        let replay = ReplayFetcher::open(dir.path()).expect("open");
        let session = replay.start_session().expect("session");
        let manifest = Manifest {
            cdn: Cdn {
                base_url: "https://cdn.example".into(),
                auth_parameter: String::new(),
            },
            cdn_resources: vec![
                CdnResource { url: "img/a.png".into() },
                CdnResource { url: "img/missing.png".into() },
                CdnResource { url: "../escape.png".into() },
            ],
        };
        let images = replay.download_images(&manifest, &session).expect("images");
        assert_eq!(images.len(), 1);
        assert_eq!(images["img/a.png"], vec![9, 9]);
    }
}
