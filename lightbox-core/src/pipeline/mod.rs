//! Request coordination: deduplication, dispatch, and completion fan-out.
//!
//! `DerivativeService` is the public entry point. A request either returns a
//! stored derivative synchronously, or registers the consumer in the pending
//! table and returns the placeholder while a single render job per key runs
//! on the worker pool. Every consumer registered while a key was pending gets
//! exactly one `ready` callback when that render completes.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use lightbox_model::{DerivativeKey, Orientation, SourceId};
use tracing::{debug, info, warn};

use crate::config::DerivativeCacheConfig;
use crate::error::Result;
use crate::image::DerivativeImage;
use crate::metadata::MetadataProvider;
use crate::placeholder;
use crate::render;
use crate::store::{DerivativeStore, SqliteDerivativeStore};

pub mod pool;

use pool::WorkerPool;

/// Receives the completion callback for a requested derivative.
///
/// `ready` runs on a worker task; consumers that mutate UI state must
/// re-dispatch to their UI thread themselves. Consumers are also expected to
/// check that the result is still relevant (the row may have scrolled away).
pub trait DerivativeConsumer: Send + Sync {
    fn ready(&self, key: &DerivativeKey, image: &DerivativeImage);
}

type Waiters = Vec<Arc<dyn DerivativeConsumer>>;

/// The pending-request table: one entry per in-flight render, holding every
/// consumer awaiting that key. Entries are created on first miss and removed
/// atomically at completion so no waiter can be dropped by interleaving.
struct PendingRequests {
    entries: Mutex<HashMap<DerivativeKey, Waiters>>,
}

impl PendingRequests {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Join the pending entry for `key` (or, for rotatable requests, its
    /// rotation) if one exists; otherwise create a new entry. Returns `true`
    /// when the caller owns a fresh entry and must submit a render job.
    ///
    /// One lock acquisition covers the whole check-then-insert, which is what
    /// upholds the at-most-one-in-flight-per-key invariant.
    fn join_or_create(
        &self,
        key: &DerivativeKey,
        rotatable: bool,
        consumer: Arc<dyn DerivativeConsumer>,
    ) -> bool {
        let mut entries = self.entries.lock().expect("pending table poisoned");

        if let Some(waiters) = entries.get_mut(key) {
            push_if_new(waiters, consumer);
            return false;
        }
        if rotatable && !key.is_square() {
            if let Some(waiters) = entries.get_mut(&key.rotated()) {
                push_if_new(waiters, consumer);
                return false;
            }
        }

        entries.insert(key.clone(), vec![consumer]);
        true
    }

    /// Remove the entry for `key` and hand back every registered waiter in
    /// one step.
    fn drain(&self, key: &DerivativeKey) -> Waiters {
        let mut entries = self.entries.lock().expect("pending table poisoned");
        entries.remove(key).unwrap_or_default()
    }
}

fn push_if_new(waiters: &mut Waiters, consumer: Arc<dyn DerivativeConsumer>) {
    if !waiters.iter().any(|w| Arc::ptr_eq(w, &consumer)) {
        waiters.push(consumer);
    }
}

/// Registered by `warm` so cache-filling passes share the coordination path
/// with UI requests without anyone listening for the result.
struct WarmConsumer;

impl DerivativeConsumer for WarmConsumer {
    fn ready(&self, _key: &DerivativeKey, _image: &DerivativeImage) {}
}

struct ServiceInner {
    store: Arc<dyn DerivativeStore>,
    metadata: Arc<dyn MetadataProvider>,
    pending: PendingRequests,
    placeholder: DerivativeImage,
}

/// The derivative cache service: persistent store, renderer and worker pool
/// behind one request entry point.
///
/// Explicitly constructed and injected; it owns its lifecycle via
/// [`DerivativeService::open`] / [`DerivativeService::close`].
pub struct DerivativeService {
    inner: Arc<ServiceInner>,
    pool: WorkerPool,
    config: DerivativeCacheConfig,
    closed: AtomicBool,
}

impl fmt::Debug for DerivativeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivativeService")
            .field("config", &self.config)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl DerivativeService {
    /// Open the SQLite-backed cache described by `config`.
    ///
    /// Fails when the database cannot be opened or when a configured
    /// placeholder cannot be loaded; the latter is a deployment error that
    /// should abort startup.
    pub async fn open(
        config: DerivativeCacheConfig,
        metadata: Arc<dyn MetadataProvider>,
    ) -> Result<Self> {
        let store = SqliteDerivativeStore::open(&config.database_path).await?;
        Self::with_store(Arc::new(store), metadata, config)
    }

    /// Assemble a service over an externally constructed store. Must run
    /// inside a tokio runtime (the worker pool spawns tasks immediately).
    pub fn with_store(
        store: Arc<dyn DerivativeStore>,
        metadata: Arc<dyn MetadataProvider>,
        config: DerivativeCacheConfig,
    ) -> Result<Self> {
        let placeholder = placeholder::load(&config)?;
        let pool = WorkerPool::new(config.workers);
        info!(
            workers = config.workers,
            max_entries = config.max_entries,
            "derivative cache opened"
        );
        Ok(Self {
            inner: Arc::new(ServiceInner {
                store,
                metadata,
                pending: PendingRequests::new(),
                placeholder,
            }),
            pool,
            config,
            closed: AtomicBool::new(false),
        })
    }

    /// Request the derivative for `key`.
    ///
    /// Returns synchronously in all cases: the stored image on a hit, a
    /// best-effort rotated substitute for rotatable requests, or the
    /// placeholder while a render is (or becomes) in flight. On a miss the
    /// consumer is registered for exactly one `ready` callback.
    pub async fn request(
        &self,
        key: DerivativeKey,
        rotatable: bool,
        consumer: Arc<dyn DerivativeConsumer>,
    ) -> DerivativeImage {
        if self.closed.load(Ordering::SeqCst) {
            debug!(%key, "request after close, serving placeholder");
            return self.inner.placeholder.clone();
        }

        if let Some(image) = self.inner.store.get(&key).await {
            return image;
        }

        // A derivative rendered for the transposed box satisfies a rotatable
        // request when its raster is already in tall orientation.
        if rotatable && !key.is_square() {
            if let Some(image) = self.inner.store.get(&key.rotated()).await {
                if image.width() < image.height() {
                    debug!(%key, "serving rotated-key substitute");
                    return image;
                }
            }
        }

        let owns_entry = self
            .inner
            .pending
            .join_or_create(&key, rotatable, consumer);

        if owns_entry {
            let inner = Arc::clone(&self.inner);
            let job_key = key.clone();
            self.pool
                .submit(async move { run_render_job(inner, job_key, rotatable).await });
        } else {
            debug!(%key, "coalesced with in-flight render");
        }

        self.inner.placeholder.clone()
    }

    /// Ensure some derivative exists for `source`, rendering one at the given
    /// size if the store has none at any size. Returns whether a render was
    /// scheduled. Used by background fill passes after loading a directory.
    pub async fn warm(&self, source: &SourceId, width: u32, height: u32) -> bool {
        if self.inner.store.exists_any_size(source).await {
            return false;
        }
        let key = DerivativeKey::new(source.clone(), width, height);
        self.request(key, true, Arc::new(WarmConsumer)).await;
        true
    }

    /// Evict oldest-inserted entries beyond the configured bound. Invoked by
    /// surrounding application logic, not by the cache itself.
    pub async fn trim(&self) -> Result<u64> {
        self.inner.store.trim(self.config.max_entries).await
    }

    /// The image served while derivatives are rendering.
    pub fn placeholder(&self) -> &DerivativeImage {
        &self.inner.placeholder
    }

    /// Stop the worker pool and release the store. Idempotent; requests after
    /// close are answered with the placeholder and schedule no work.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pool.shutdown().await;
        self.inner.store.close().await;
        info!("derivative cache closed");
    }
}

/// One render job: select a pixel source, render off-thread, persist, then
/// drain and notify every waiter registered for the key.
///
/// Failures stay inside the job: the pending entry is still drained so later
/// requests can retry, but no `ready` callback fires for the attempt.
async fn run_render_job(inner: Arc<ServiceInner>, key: DerivativeKey, rotatable: bool) {
    let orientation = match inner.metadata.orientation(&key.source).await {
        Ok(orientation) => orientation,
        Err(e) => {
            warn!(%key, error = %e, "orientation unavailable, assuming normal");
            Orientation::Normal
        }
    };

    let embedded = match inner.metadata.embedded_thumbnail(&key.source).await {
        Ok(embedded) => embedded,
        Err(e) => {
            warn!(%key, error = %e, "embedded thumbnail unavailable");
            None
        }
    };

    let source_bytes = match select_source_bytes(&key, rotatable, orientation, embedded).await {
        Some(bytes) => bytes,
        None => {
            warn!(%key, "source unreadable, abandoning render");
            inner.pending.drain(&key);
            return;
        }
    };

    let (target_w, target_h) = (key.width, key.height);
    let rendered = tokio::task::spawn_blocking(move || {
        render::render_from_bytes(&source_bytes, target_w, target_h, orientation)
    })
    .await;

    let image = match rendered {
        Ok(Ok(image)) => image,
        Ok(Err(e)) => {
            warn!(%key, error = %e, "render failed");
            inner.pending.drain(&key);
            return;
        }
        Err(e) => {
            warn!(%key, error = %e, "render task panicked");
            inner.pending.drain(&key);
            return;
        }
    };

    inner.store.put(&key, &image).await;

    let waiters = inner.pending.drain(&key);
    debug!(%key, waiters = waiters.len(), "derivative ready");
    for waiter in waiters {
        waiter.ready(&key, &image);
    }
}

/// Prefer the EXIF-embedded thumbnail when it can satisfy the request without
/// upscaling; otherwise fall back to the full original. `None` when the
/// original cannot be read either.
async fn select_source_bytes(
    key: &DerivativeKey,
    rotatable: bool,
    orientation: Orientation,
    embedded: Option<Vec<u8>>,
) -> Option<Vec<u8>> {
    if let Some(thumb) = embedded {
        if let Some((w, h)) = render::probe_dimensions(&thumb) {
            if render::embedded_thumbnail_usable(w, h, key, rotatable, orientation) {
                debug!(%key, width = w, height = h, "reusing embedded thumbnail");
                return Some(thumb);
            }
        }
    }

    match tokio::fs::read(key.source.as_path()).await {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(%key, error = %e, "cannot read original");
            None
        }
    }
}
