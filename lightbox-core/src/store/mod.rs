//! Persistent storage for rendered derivatives.
//!
//! The store is best-effort by contract: readers see a value or nothing, and
//! a failing backend degrades into cache misses rather than surfacing errors
//! to UI callers. Only `trim` reports failures, because it is invoked by
//! maintenance logic that can act on them.

use async_trait::async_trait;
use lightbox_model::{DerivativeKey, SourceId};

use crate::error::Result;
use crate::image::DerivativeImage;

mod sqlite;

pub use sqlite::SqliteDerivativeStore;

#[async_trait]
pub trait DerivativeStore: Send + Sync {
    /// Exact lookup for `key`. Absence and backend failures both read as
    /// `None`; failures are logged.
    async fn get(&self, key: &DerivativeKey) -> Option<DerivativeImage>;

    /// Idempotent upsert keyed on `(source, width, height)`. Encode or write
    /// failures are logged and the write dropped.
    async fn put(&self, key: &DerivativeKey, image: &DerivativeImage);

    /// Whether any derivative of any size exists for the source. Used to
    /// decide whether a background fill pass is needed for a new source.
    async fn exists_any_size(&self, source: &SourceId) -> bool;

    /// Delete oldest-inserted entries until at most `max_entries` remain.
    /// Returns the number of entries removed.
    async fn trim(&self, max_entries: u32) -> Result<u64>;

    /// Release backend resources. Idempotent.
    async fn close(&self);
}
