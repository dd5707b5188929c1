// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batches — the unit the renderer returns for one fetch.
//
// A batch arrives as a tar stream. JSON members (the page-layout document,
// the font table, an optional manifest) are decoded eagerly; members under
// `assets/` are bundled images keyed by the name that follows the prefix.

use std::collections::BTreeMap;
use std::io::Read;

use flate2::read::GzDecoder;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use kindling_core::ConversionConfig;
use kindling_core::error::{KindlingError, Result};
use kindling_core::types::{AuthToken, ImageMap, Position, Session};
use kindling_document::FontIndex;

/// Prefix of the page-layout document's member name.
pub const PAGE_DOCUMENT_PREFIX: &str = "page_data_0_";
pub const FONT_TABLE: &str = "glyphs.json";
pub const MANIFEST: &str = "manifest.json";
const ASSET_PREFIX: &str = "assets/";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Renderer layout constants.
const RENDERER_VERSION: &str = "3.0";
const FONT_FAMILY: &str = "Bookerly";
const LINE_HEIGHT: &str = "1.4";

// -- Fetch seam ---------------------------------------------------------------

/// Retrieves batches and out-of-band images from the renderer.
pub trait BatchFetcher {
    /// Render `request.num_pages` pages starting at `request.start_position`.
    fn fetch_batch(&self, request: &RenderRequest, session: &Session) -> Result<Batch>;

    /// Download the images listed in `manifest`, keyed by resource url.
    /// Resources that cannot be fetched are left out.
    fn download_images(&self, manifest: &Manifest, session: &Session) -> Result<ImageMap>;
}

// -- Render request -----------------------------------------------------------

/// Query for one render call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub start_position: Position,
    pub num_pages: u32,
    /// Renderer query parameters, excluding the book id and revision which
    /// the fetcher adds from its own state and the session.
    pub params: BTreeMap<&'static str, String>,
}

impl RenderRequest {
    pub fn new(config: &ConversionConfig, start: Position, num_pages: u32, token: &str) -> Self {
        let (width_pt, height_pt) = config.page_size_pt();
        let dpi = f64::from(config.dpi);
        let device = |points: f64| ((points * dpi / 72.0) as i64).to_string();
        let margin = |inches: f64| ((inches * 72.0) as i64).to_string();

        let params = BTreeMap::from([
            ("version", RENDERER_VERSION.to_owned()),
            ("contentType", "FullBook".to_owned()),
            ("fontFamily", FONT_FAMILY.to_owned()),
            ("fontSize", config.font_size.to_string()),
            ("lineHeight", LINE_HEIGHT.to_owned()),
            ("dpi", config.dpi.to_string()),
            ("width", device(width_pt)),
            ("height", device(height_pt)),
            ("marginLeft", margin(config.left_margin)),
            ("marginRight", margin(config.right_margin)),
            ("marginTop", margin(config.top_margin)),
            ("marginBottom", margin(config.bottom_margin)),
            ("maxNumberColumns", "1".to_owned()),
            ("theme", "default".to_owned()),
            ("locationMap", "true".to_owned()),
            ("packageType", "TAR".to_owned()),
            ("encryptionVersion", "NONE".to_owned()),
            ("numPage", num_pages.to_string()),
            ("skipPageCount", "0".to_owned()),
            ("startingPosition", start.to_string()),
            ("bundleImages", "false".to_owned()),
            ("token", token.to_owned()),
        ]);

        Self {
            start_position: start,
            num_pages,
            params,
        }
    }
}

// -- Manifest -----------------------------------------------------------------

/// Out-of-band image listing for batches rendered without bundled images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub cdn: Cdn,
    #[serde(default)]
    pub cdn_resources: Vec<CdnResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cdn {
    pub base_url: String,
    #[serde(default)]
    pub auth_parameter: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdnResource {
    pub url: String,
}

impl Manifest {
    /// Download location of `resource`: the CDN auth parameter followed by
    /// the session token and its expiry.
    pub fn resource_location(&self, resource: &CdnResource, auth: &AuthToken) -> String {
        let base = self.cdn.base_url.trim_end_matches('/');
        let token = utf8_percent_encode(&auth.token, NON_ALPHANUMERIC);
        let mut location = format!("{base}/{}?", resource.url);
        if !self.cdn.auth_parameter.is_empty() {
            location.push_str(&self.cdn.auth_parameter);
            location.push('&');
        }
        location.push_str(&format!("token={token}&expiration={}", auth.expires_at));
        location
    }
}

// -- Batch --------------------------------------------------------------------

/// One renderer response, decoded.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    /// JSON members by name.
    pub documents: BTreeMap<String, Value>,
    /// Image payloads by reference, encrypted until the decryptor runs.
    pub images: ImageMap,
}

impl Batch {
    /// Unpack a tar stream, gzip-compressed or not.
    #[instrument(skip(bytes), fields(bytes = bytes.len()))]
    pub fn from_tar(bytes: &[u8]) -> Result<Self> {
        if bytes.starts_with(&GZIP_MAGIC) {
            debug!("batch is gzip-compressed");
            Self::from_archive(tar::Archive::new(GzDecoder::new(bytes)))
        } else {
            Self::from_archive(tar::Archive::new(bytes))
        }
    }

    fn from_archive<R: Read>(mut archive: tar::Archive<R>) -> Result<Self> {
        let mut batch = Self::default();

        let entries = archive
            .entries()
            .map_err(|err| KindlingError::MalformedBatch(format!("unreadable tar stream: {err}")))?;
        for entry in entries {
            let mut entry = entry
                .map_err(|err| KindlingError::MalformedBatch(format!("bad tar entry: {err}")))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name = entry
                .path()
                .map_err(|err| KindlingError::MalformedBatch(format!("bad member name: {err}")))?
                .to_string_lossy()
                .trim_start_matches("./")
                .to_owned();
            let mut content = Vec::new();
            entry.read_to_end(&mut content).map_err(|err| {
                KindlingError::MalformedBatch(format!("truncated member {name}: {err}"))
            })?;

            if name.ends_with(".json") {
                let value = serde_json::from_slice(&content).map_err(|err| {
                    KindlingError::MalformedBatch(format!("member {name} is not JSON: {err}"))
                })?;
                batch.documents.insert(name, value);
            } else if let Some(asset) = name.strip_prefix(ASSET_PREFIX) {
                batch.images.insert(asset.to_owned(), content);
            }
        }

        debug!(
            documents = batch.documents.len(),
            images = batch.images.len(),
            "batch unpacked"
        );
        Ok(batch)
    }

    /// The page-layout document, if the batch has one.
    pub fn page_document(&self) -> Option<&Value> {
        self.documents
            .iter()
            .find(|(name, _)| name.starts_with(PAGE_DOCUMENT_PREFIX))
            .map(|(_, value)| value)
    }

    /// Font table indexed by key.
    pub fn fonts(&self) -> Result<FontIndex> {
        match self.documents.get(FONT_TABLE) {
            Some(table) => FontIndex::decode(table),
            None => Err(KindlingError::MalformedBatch(format!(
                "batch has no {FONT_TABLE}"
            ))),
        }
    }

    pub fn manifest(&self) -> Result<Option<Manifest>> {
        self.documents
            .get(MANIFEST)
            .map(|value| {
                Manifest::deserialize(value).map_err(|err| {
                    KindlingError::MalformedBatch(format!("unreadable {MANIFEST}: {err}"))
                })
            })
            .transpose()
    }
}
