//! Derivative-image cache and asynchronous rendering pipeline.
//!
//! Computing a thumbnail or preview is expensive (file I/O, EXIF decode,
//! resampling, rotation), so this crate avoids redundant work three ways:
//! concurrent requests for the same derivative coalesce onto a single render,
//! completed derivatives persist across sessions in an embedded SQLite store
//! with oldest-first eviction, and a LIFO worker pool services the newest
//! (still on-screen) requests before a scrolled-past backlog.
//!
//! The public entry point is [`DerivativeService`]; see its module for the
//! request/completion contract.

pub mod config;
pub mod error;
pub mod image;
pub mod metadata;
pub mod pipeline;
pub(crate) mod placeholder;
pub(crate) mod render;
pub mod store;

pub use config::DerivativeCacheConfig;
pub use error::{CacheError, Result};
pub use image::DerivativeImage;
pub use metadata::{ExifMetadataProvider, MetadataProvider};
pub use pipeline::pool::WorkerPool;
pub use pipeline::{DerivativeConsumer, DerivativeService};
pub use store::{DerivativeStore, SqliteDerivativeStore};

pub use lightbox_model::{DerivativeKey, Orientation, SourceId};
