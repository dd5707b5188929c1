// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Kindling Fetch — the collaborator seams towards the reader service (session
// start, batch rendering, image download), the tar batch format, a recorded
// directory replay of both, and the pagination driver that ties them to the
// decryptor and the page compositor.

pub mod batch;
pub mod driver;
pub mod replay;
pub mod session;

pub use batch::{Batch, BatchFetcher, Manifest, RenderRequest};
pub use driver::{ConversionSummary, PaginationDriver};
pub use replay::ReplayFetcher;
pub use session::{BookMetadata, RestrictionReason, SessionProvider, StartReading, establish_session};
