use std::path::Path;

use async_trait::async_trait;
use lightbox_model::{DerivativeKey, SourceId};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, warn};

use crate::config::STORED_JPEG_QUALITY;
use crate::error::Result;
use crate::image::DerivativeImage;
use crate::store::DerivativeStore;

/// SQLite-backed derivative store.
///
/// One table, keyed by the `(source_id, width, height)` triple; the rowid
/// `id` records insertion order and drives oldest-first trimming. Rasters are
/// stored JPEG-encoded.
#[derive(Debug, Clone)]
pub struct SqliteDerivativeStore {
    pool: SqlitePool,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS derivatives (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id TEXT    NOT NULL,
    width     INTEGER NOT NULL,
    height    INTEGER NOT NULL,
    data      BLOB    NOT NULL,
    UNIQUE (source_id, width, height)
)
"#;

impl SqliteDerivativeStore {
    /// Open (creating if necessary) the database at `path`.
    ///
    /// The pool is deliberately tiny: the workload is one reader interleaved
    /// with one writer, and SQLite serializes writers anyway.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA).execute(&pool).await?;

        debug!(path = %path.display(), "derivative store opened");
        Ok(Self { pool })
    }

    /// Number of stored derivatives. Maintenance/diagnostic helper.
    pub async fn entry_count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM derivatives")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.get("n");
        Ok(n as u64)
    }
}

#[async_trait]
impl DerivativeStore for SqliteDerivativeStore {
    async fn get(&self, key: &DerivativeKey) -> Option<DerivativeImage> {
        let fetched = sqlx::query(
            r#"
            SELECT data FROM derivatives
            WHERE source_id = ?1 AND width = ?2 AND height = ?3
            "#,
        )
        .bind(key.source.as_str())
        .bind(i64::from(key.width))
        .bind(i64::from(key.height))
        .fetch_optional(&self.pool)
        .await;

        let row = match fetched {
            Ok(row) => row?,
            Err(e) => {
                warn!(%key, error = %e, "derivative read failed, treating as miss");
                return None;
            }
        };

        let data: Vec<u8> = row.get("data");
        let decoded =
            tokio::task::spawn_blocking(move || DerivativeImage::from_encoded(&data)).await;

        match decoded {
            Ok(Ok(image)) => Some(image),
            Ok(Err(e)) => {
                warn!(%key, error = %e, "stored derivative undecodable, treating as miss");
                None
            }
            Err(e) => {
                warn!(%key, error = %e, "derivative decode task panicked");
                None
            }
        }
    }

    async fn put(&self, key: &DerivativeKey, image: &DerivativeImage) {
        let to_encode = image.clone();
        let encoded =
            tokio::task::spawn_blocking(move || to_encode.to_jpeg(STORED_JPEG_QUALITY)).await;

        let bytes = match encoded {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                warn!(%key, error = %e, "derivative encode failed, dropping write");
                return;
            }
            Err(e) => {
                warn!(%key, error = %e, "derivative encode task panicked");
                return;
            }
        };

        let written = sqlx::query(
            r#"
            INSERT INTO derivatives (source_id, width, height, data)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (source_id, width, height) DO UPDATE SET
                data = excluded.data
            "#,
        )
        .bind(key.source.as_str())
        .bind(i64::from(key.width))
        .bind(i64::from(key.height))
        .bind(bytes)
        .execute(&self.pool)
        .await;

        if let Err(e) = written {
            warn!(%key, error = %e, "derivative write failed, dropping write");
        }
    }

    async fn exists_any_size(&self, source: &SourceId) -> bool {
        let found = sqlx::query("SELECT 1 FROM derivatives WHERE source_id = ?1 LIMIT 1")
            .bind(source.as_str())
            .fetch_optional(&self.pool)
            .await;

        match found {
            Ok(row) => row.is_some(),
            Err(e) => {
                warn!(%source, error = %e, "existence check failed, treating as absent");
                false
            }
        }
    }

    async fn trim(&self, max_entries: u32) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM derivatives
            WHERE id NOT IN (
                SELECT id FROM derivatives ORDER BY id DESC LIMIT ?1
            )
            "#,
        )
        .bind(i64::from(max_entries))
        .execute(&self.pool)
        .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            debug!(removed, max_entries, "trimmed derivative store");
        }
        Ok(removed)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
