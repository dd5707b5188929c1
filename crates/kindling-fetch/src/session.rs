// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reading sessions — the provider seam and the assembly of a `Session` from
// the reader service's start-reading and metadata responses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use kindling_core::error::{KindlingError, Result};
use kindling_core::types::{AuthToken, Position, Session};

/// Source of reading sessions.
///
/// Called once when a conversion starts and again whenever the token is about
/// to expire. Every call returns a complete, independent session.
pub trait SessionProvider {
    /// Start a new session for the book this provider was built for.
    ///
    /// Fails with `Auth` when credentials are rejected, `NotOwned` when the
    /// account does not own the book, and `DownloadRestricted` when the
    /// service refuses to render it.
    fn start_session(&self) -> Result<Session>;
}

/// The reader service's answer to a start-reading call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartReading {
    #[serde(default)]
    pub is_owned: bool,
    /// Samples are never renderable as a full book.
    #[serde(default)]
    pub is_sample: bool,
    /// Present when the service refuses to render the book.
    #[serde(default)]
    pub download_restriction_reason: Option<RestrictionReason>,
    #[serde(default)]
    pub karamel_token: Option<AuthToken>,
    #[serde(default)]
    pub metadata_url: Option<String>,
}

/// Why the service refuses to render a book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestrictionReason {
    #[serde(default)]
    pub reason_code: String,
}

/// Book metadata from the metadata endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookMetadata {
    pub title: String,
    pub version: String,
    pub end_position: Position,
}

impl BookMetadata {
    /// Parse the `loadMetadata({...});` script the metadata endpoint serves.
    /// A bare JSON object is accepted too.
    pub fn from_script(script: &str) -> Result<Self> {
        const WRAPPER: &str = "loadMetadata(";
        let body = match (script.find(WRAPPER), script.rfind(");")) {
            (Some(open), Some(close)) if open + WRAPPER.len() <= close => {
                &script[open + WRAPPER.len()..close]
            }
            _ => script,
        };
        let value: Value = serde_json::from_str(body.trim())
            .map_err(|err| KindlingError::Auth(format!("unreadable book metadata: {err}")))?;
        Self::from_json(&value)
    }

    /// Read metadata from an already-parsed JSON object.
    pub fn from_json(value: &Value) -> Result<Self> {
        let field = |name: &str| {
            value
                .get(name)
                .ok_or_else(|| KindlingError::Auth(format!("book metadata lacks {name}")))
        };
        let title = field("title")?
            .as_str()
            .ok_or_else(|| KindlingError::Auth("book title is not a string".into()))?
            .to_owned();
        // The revision is echoed back verbatim, whatever JSON type it arrives as.
        let version = match field("version")? {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let end_position = field("endPosition")?
            .as_u64()
            .ok_or_else(|| KindlingError::Auth("endPosition is not a position".into()))?;
        Ok(Self {
            title,
            version,
            end_position,
        })
    }
}

/// Combine the start-reading response and the book metadata into a session.
#[instrument(skip(start, metadata, headers, cookies))]
pub fn establish_session(
    asin: &str,
    start: StartReading,
    metadata: BookMetadata,
    headers: BTreeMap<String, String>,
    cookies: BTreeMap<String, String>,
) -> Result<Session> {
    if let Some(restriction) = start.download_restriction_reason {
        return Err(KindlingError::DownloadRestricted {
            asin: asin.to_owned(),
            reason: restriction.reason_code,
        });
    }
    if !start.is_owned || start.is_sample {
        return Err(KindlingError::NotOwned {
            asin: asin.to_owned(),
        });
    }
    let auth = start
        .karamel_token
        .ok_or_else(|| KindlingError::Auth("start-reading response carried no token".into()))?;

    info!(
        title = %metadata.title,
        end_position = metadata.end_position,
        expires_at = auth.expires_at,
        "reading session established"
    );
    Ok(Session {
        title: metadata.title,
        version: metadata.version,
        end_position: metadata.end_position,
        auth,
        headers,
        cookies,
    })
}
