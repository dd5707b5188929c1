// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// kindling-security — Decryption of the image assets embedded in rendered
// batches.
//
// Every image payload is sealed with AES-128-GCM under a key derived from a
// window of the current session token, so a payload only opens with the token
// that was live when its batch was fetched.

pub mod assets;

pub use assets::{AssetDecryptor, KeyMaterial, decrypt_images, seal_image};
