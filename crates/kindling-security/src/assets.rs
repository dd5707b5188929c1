// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image asset decryption — PBKDF2-HMAC-SHA256 key derivation (`ring`) and
// AES-128-GCM with a 16-byte IV (`aes-gcm`).
//
// Payload layout (ASCII base64):
//
//   [0, 24)   salt, 16 bytes
//   [24, 48)  IV, 16 bytes
//   [48, ..)  ciphertext || 16-byte tag

use std::num::NonZeroU32;

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::aes::Aes128;
use aes_gcm::{AesGcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use ring::pbkdf2;
use tracing::{debug, instrument};

use kindling_core::error::{KindlingError, Result};
use kindling_core::types::{AuthToken, ImageMap};

/// AES-128-GCM with the non-standard 128-bit nonce the renderer uses.
type Aes128Gcm16 = AesGcm<Aes128, U16>;

const PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(1_000) {
    Some(n) => n,
    None => unreachable!(),
};
const KEY_LEN: usize = 16;
const SALT_LEN: usize = 16;
const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;
/// Width of the token window used as the PBKDF2 password.
const WINDOW_LEN: usize = 40;
/// Prefix of the window bound in as additional authenticated data.
const AAD_LEN: usize = 9;
/// The token window starts at `expires_at mod KEY_OFFSET_MODULUS`.
const KEY_OFFSET_MODULUS: i64 = 60;

/// Base64 character offsets of the salt and IV atoms.
const SALT_CHARS: std::ops::Range<usize> = 0..24;
const IV_CHARS: std::ops::Range<usize> = 24..48;

/// The token-derived secret shared by every payload of one batch.
#[derive(Clone)]
pub struct KeyMaterial {
    window: Vec<u8>,
}

impl KeyMaterial {
    /// Cut the key window out of the session token.
    ///
    /// The window is 40 bytes starting at `expires_at mod 60`, truncated if the
    /// token ends first.
    pub fn from_token(auth: &AuthToken) -> Result<Self> {
        let token = auth.token.as_bytes();
        let start = auth.expires_at.rem_euclid(KEY_OFFSET_MODULUS) as usize;
        if start >= token.len() {
            return Err(KindlingError::Decryption(format!(
                "token of {} bytes is too short for key offset {start}",
                token.len()
            )));
        }
        let end = (start + WINDOW_LEN).min(token.len());
        Ok(Self {
            window: token[start..end].to_vec(),
        })
    }

    /// Raw window bytes (the PBKDF2 password).
    pub fn window(&self) -> &[u8] {
        &self.window
    }

    /// Additional authenticated data bound into every payload.
    pub fn aad(&self) -> &[u8] {
        &self.window[..self.window.len().min(AAD_LEN)]
    }

    /// Derive the per-payload AES key from the window and the payload's salt.
    pub fn derive_key(&self, salt: &[u8]) -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            PBKDF2_ITERATIONS,
            salt,
            &self.window,
            &mut key,
        );
        key
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("window_len", &self.window.len())
            .finish()
    }
}

/// Opens sealed image payloads for one session token.
#[derive(Debug, Clone)]
pub struct AssetDecryptor {
    material: KeyMaterial,
}

impl AssetDecryptor {
    /// Take the key window from `auth`. Fails when the token is too short to
    /// hold it.
    pub fn new(auth: &AuthToken) -> Result<Self> {
        Ok(Self {
            material: KeyMaterial::from_token(auth)?,
        })
    }

    /// Decrypt one base64 payload into the original image bytes.
    pub fn decrypt_payload(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let sealed = SealedPayload::parse(payload)?;
        let key = self.material.derive_key(&sealed.salt);
        let cipher = Aes128Gcm16::new_from_slice(&key)
            .map_err(|e| KindlingError::Decryption(e.to_string()))?;

        cipher
            .decrypt(
                Nonce::<U16>::from_slice(&sealed.iv),
                Payload {
                    msg: &sealed.ciphertext,
                    aad: self.material.aad(),
                },
            )
            .map_err(|_| {
                KindlingError::Decryption(
                    "authentication tag mismatch (stale token or tampered payload)".into(),
                )
            })
    }

    /// Decrypt every sealed entry of `images` in place.
    ///
    /// Entries that already carry a raw JPEG or PNG are left alone: batches
    /// delivered through the CDN fallback may not be sealed.
    #[instrument(skip_all, fields(images = images.len()))]
    pub fn decrypt_images(&self, images: &mut ImageMap) -> Result<()> {
        let mut opened = 0usize;
        for (name, bytes) in images.iter_mut() {
            if is_plain_image(bytes) {
                debug!(image = %name, "payload already plaintext");
                continue;
            }
            let plaintext = self.decrypt_payload(bytes).map_err(|e| match e {
                KindlingError::Decryption(detail) => {
                    KindlingError::Decryption(format!("image {name}: {detail}"))
                }
                KindlingError::MalformedPayload(detail) => {
                    KindlingError::MalformedPayload(format!("image {name}: {detail}"))
                }
                other => other,
            })?;
            *bytes = plaintext;
            opened += 1;
        }
        debug!(opened, "image payloads decrypted");
        Ok(())
    }
}

/// Decrypt every sealed entry of `images` in place using `auth`'s key window.
pub fn decrypt_images(images: &mut ImageMap, auth: &AuthToken) -> Result<()> {
    AssetDecryptor::new(auth)?.decrypt_images(images)
}

/// Seal `plaintext` the way the renderer does, producing a base64 payload
/// that [`AssetDecryptor::decrypt_payload`] opens.
///
/// Used to build recorded batches and test fixtures.
pub fn seal_image(
    plaintext: &[u8],
    auth: &AuthToken,
    salt: [u8; SALT_LEN],
    iv: [u8; IV_LEN],
) -> Result<Vec<u8>> {
    let material = KeyMaterial::from_token(auth)?;
    let key = material.derive_key(&salt);
    let cipher = Aes128Gcm16::new_from_slice(&key)
        .map_err(|e| KindlingError::Decryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(
            Nonce::<U16>::from_slice(&iv),
            Payload {
                msg: plaintext,
                aad: material.aad(),
            },
        )
        .map_err(|_| KindlingError::Decryption("sealing failed".into()))?;

    let mut payload = STANDARD.encode(salt);
    payload.push_str(&STANDARD.encode(iv));
    payload.push_str(&STANDARD.encode(ciphertext));
    Ok(payload.into_bytes())
}

/// The three decoded atoms of a payload.
struct SealedPayload {
    salt: Vec<u8>,
    iv: Vec<u8>,
    /// Ciphertext with the tag still appended, as `aes-gcm` expects it.
    ciphertext: Vec<u8>,
}

impl SealedPayload {
    fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() <= IV_CHARS.end {
            return Err(KindlingError::MalformedPayload(format!(
                "payload of {} bytes is shorter than its header",
                payload.len()
            )));
        }

        let salt = decode_atom(&payload[SALT_CHARS], "salt")?;
        let iv = decode_atom(&payload[IV_CHARS], "iv")?;
        let ciphertext = decode_atom(payload[IV_CHARS.end..].trim_ascii(), "ciphertext")?;

        if salt.len() != SALT_LEN {
            return Err(KindlingError::MalformedPayload(format!(
                "salt is {} bytes, expected {SALT_LEN}",
                salt.len()
            )));
        }
        if iv.len() != IV_LEN {
            return Err(KindlingError::MalformedPayload(format!(
                "iv is {} bytes, expected {IV_LEN}",
                iv.len()
            )));
        }
        if ciphertext.len() < TAG_LEN {
            return Err(KindlingError::MalformedPayload(format!(
                "ciphertext of {} bytes cannot hold a {TAG_LEN}-byte tag",
                ciphertext.len()
            )));
        }

        Ok(Self {
            salt,
            iv,
            ciphertext,
        })
    }
}

fn decode_atom(atom: &[u8], what: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(atom)
        .map_err(|e| KindlingError::MalformedPayload(format!("{what}: {e}")))
}

/// JPEG and PNG signatures. Neither can start a base64 payload.
fn is_plain_image(bytes: &[u8]) -> bool {
    bytes.starts_with(&[0xFF, 0xD8, 0xFF]) || bytes.starts_with(b"\x89PNG\r\n\x1a\n")
}
