#![allow(dead_code)]

//! Shared fixtures for the derivative-cache integration tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;
use lightbox_core::{
    CacheError, DerivativeCacheConfig, DerivativeConsumer, DerivativeImage, DerivativeKey,
    DerivativeService, MetadataProvider, Orientation, SourceId,
};
use tokio::sync::Semaphore;

/// Test double for the metadata collaborator.
///
/// Renders can be held back by gating: each render job consumes one gate
/// permit inside `orientation`, so a test can stack up requests while the
/// first job is provably still in flight, then release it.
#[derive(Debug)]
pub struct FakeMetadataProvider {
    orientation: Orientation,
    embedded: Option<Vec<u8>>,
    gate: Option<Arc<Semaphore>>,
    orientation_calls: AtomicUsize,
}

impl FakeMetadataProvider {
    pub fn new() -> Self {
        Self {
            orientation: Orientation::Normal,
            embedded: None,
            gate: None,
            orientation_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_embedded_thumbnail(mut self, bytes: Vec<u8>) -> Self {
        self.embedded = Some(bytes);
        self
    }

    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// Number of render jobs that reached the metadata stage; a proxy for
    /// "renders started".
    pub fn renders_started(&self) -> usize {
        self.orientation_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataProvider for FakeMetadataProvider {
    async fn orientation(&self, _source: &SourceId) -> lightbox_core::Result<Orientation> {
        self.orientation_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| CacheError::Internal("gate closed".into()))?;
            permit.forget();
        }
        Ok(self.orientation)
    }

    async fn embedded_thumbnail(
        &self,
        _source: &SourceId,
    ) -> lightbox_core::Result<Option<Vec<u8>>> {
        Ok(self.embedded.clone())
    }
}

/// Consumer that records every `ready` callback it receives.
#[derive(Debug, Default)]
pub struct RecordingConsumer {
    events: Mutex<Vec<(DerivativeKey, u32, u32)>>,
}

impl RecordingConsumer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn callback_count(&self) -> usize {
        self.events.lock().expect("events poisoned").len()
    }

    pub fn last_dimensions(&self) -> Option<(u32, u32)> {
        self.events
            .lock()
            .expect("events poisoned")
            .last()
            .map(|(_, w, h)| (*w, *h))
    }

    pub fn last_key(&self) -> Option<DerivativeKey> {
        self.events
            .lock()
            .expect("events poisoned")
            .last()
            .map(|(key, _, _)| key.clone())
    }
}

impl DerivativeConsumer for RecordingConsumer {
    fn ready(&self, key: &DerivativeKey, image: &DerivativeImage) {
        self.events
            .lock()
            .expect("events poisoned")
            .push((key.clone(), image.width(), image.height()));
    }
}

/// Poll `condition` until it holds or the timeout elapses; panics on timeout.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Duration::from_secs(10);
    let poll = Duration::from_millis(10);
    let result = tokio::time::timeout(deadline, async {
        while !condition() {
            tokio::time::sleep(poll).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for: {what}");
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 251) as u8, (y % 241) as u8, 60])
    });
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Jpeg,
        )
        .expect("encode test jpeg");
    bytes
}

/// Write a JPEG test photograph and return its path.
pub fn write_photo(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, jpeg_bytes(width, height)).expect("write test photo");
    path
}

/// Open a single-worker service over a fresh temp database.
pub fn single_worker_config(dir: &Path) -> DerivativeCacheConfig {
    let mut config = DerivativeCacheConfig::thumbnails(dir.join("derivatives.db"));
    config.workers = 1;
    config
}

pub async fn open_service(
    config: DerivativeCacheConfig,
    provider: Arc<FakeMetadataProvider>,
) -> DerivativeService {
    DerivativeService::open(config, provider)
        .await
        .expect("open derivative service")
}
