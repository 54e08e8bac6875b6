//! Split-storage paste store: a metadata row in `data` plus a ciphertext
//! file named by the row's internal filename.
//!
//! The entry counter is advisory. It is seeded from the table at startup
//! and moved with atomics outside any lock, so it can drift from the true
//! row count under races; capacity eviction tolerates that.

use deadpool_postgres::Pool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use zeroize::Zeroizing;

use crate::{
    crypto::{
        envelope::{EnvelopeKeys, WrappingKey},
        token,
    },
    error::{AppError, Result},
    models::paste::{DurableRecord, Paste, PasteListing},
    repositories::paste as paste_repo,
    validation::paste::{validate_expiry_days, validate_payload},
};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// One of the two writes behind a durable insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Half {
    Row,
    File,
}

/// Drives the row write and the file write concurrently to completion.
///
/// Neither half is dropped early. Also returns which half failed first,
/// so a double failure reports the earlier error.
async fn join_halves(
    row: impl Future<Output = Result<()>>,
    file: impl Future<Output = Result<()>>,
) -> (Result<()>, Result<()>, Option<Half>) {
    tokio::pin!(row, file);
    let mut row_done = None;
    let mut file_done = None;
    let mut first_failure = None;

    loop {
        tokio::select! {
            result = &mut row, if row_done.is_none() => {
                if result.is_err() {
                    first_failure.get_or_insert(Half::Row);
                }
                row_done = Some(result);
            }
            result = &mut file, if file_done.is_none() => {
                if result.is_err() {
                    first_failure.get_or_insert(Half::File);
                }
                file_done = Some(result);
            }
        }

        match (row_done.take(), file_done.take()) {
            (Some(row), Some(file)) => return (row, file, first_failure),
            (row, file) => {
                row_done = row;
                file_done = file;
            }
        }
    }
}

/// The durable paste store.
#[derive(Clone)]
pub struct DurableStore {
    db: Pool,
    data_dir: Arc<PathBuf>,
    count: Arc<AtomicI64>,
    max_entries: i64,
    max_entry_size: usize,
}

impl DurableStore {
    /// Opens the store and seeds the entry counter from the table.
    ///
    /// # Arguments
    ///
    /// * `db` - The database connection pool.
    /// * `data_dir` - The directory holding the ciphertext files. Must exist.
    /// * `max_entries` - The entry count that triggers eviction of the oldest entry.
    /// * `max_entry_size` - The largest accepted payload in bytes.
    pub async fn open(
        db: Pool,
        data_dir: impl Into<PathBuf>,
        max_entries: i64,
        max_entry_size: usize,
    ) -> Result<Self> {
        let data_dir = data_dir.into();
        if !tokio::fs::metadata(&data_dir).await?.is_dir() {
            return Err(AppError::Internal(format!(
                "Data path {} is not a directory",
                data_dir.display()
            )));
        }

        let count = paste_repo::count(&db).await?;
        tracing::info!("Durable store opened with {} entries", count);

        Ok(Self {
            db,
            data_dir: Arc::new(data_dir),
            count: Arc::new(AtomicI64::new(count)),
            max_entries,
            max_entry_size,
        })
    }

    /// The directory holding the ciphertext files.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The advisory number of stored entries.
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::SeqCst)
    }

    fn file_path(&self, filename: &str) -> Result<PathBuf> {
        if filename.is_empty() {
            return Err(AppError::NotFound);
        }
        Ok(self.data_dir.join(filename))
    }

    /// Stores a payload owned by `user_id`, sealed under that user's wrapping key.
    ///
    /// The row and the file are written concurrently on a detached task, so
    /// a caller that gives up waiting does not interrupt either write. If
    /// only one half succeeds it is undone; when the undo fails too, the
    /// orphan is reported as `StorageInconsistency`. When both fail, the
    /// error of the half that failed first is returned.
    ///
    /// # Returns
    ///
    /// The public id of the new entry.
    pub async fn insert(
        &self,
        plaintext: Zeroizing<Vec<u8>>,
        content_type: &str,
        user_id: i64,
        expire_at: Option<i64>,
        wrapping_key: WrappingKey,
    ) -> Result<String> {
        validate_payload(&plaintext, self.max_entry_size)?;

        if self.count() >= self.max_entries {
            self.evict_oldest_in_background();
        }

        let record = DurableRecord {
            user_id,
            public_id: token::generate_public_id(content_type)?,
            filename: token::generate_filename()?,
            keys: EnvelopeKeys::generate()?,
            content_type: content_type.to_string(),
            expire_at,
        };

        let store = self.clone();
        tokio::spawn(async move { store.write_both(record, plaintext, wrapping_key).await })
            .await
            .map_err(|e| AppError::Internal(format!("Durable insert task failed: {}", e)))?
    }

    async fn write_both(
        &self,
        record: DurableRecord,
        plaintext: Zeroizing<Vec<u8>>,
        wrapping_key: WrappingKey,
    ) -> Result<String> {
        let (row, file, first_failure) = join_halves(
            paste_repo::insert_record(&self.db, &record),
            self.write_ciphertext(&record, &plaintext, &wrapping_key),
        )
        .await;

        match (row, file) {
            (Ok(()), Ok(())) => {
                self.count.fetch_add(1, Ordering::SeqCst);
                tracing::info!("Stored durable paste {} for user {}", record.public_id, record.user_id);
                Ok(record.public_id)
            }
            (Err(row_err), Err(file_err)) => {
                tracing::warn!("Durable insert failed on both halves: {}; {}", row_err, file_err);
                match first_failure {
                    Some(Half::File) => Err(file_err),
                    _ => Err(row_err),
                }
            }
            (Ok(()), Err(file_err)) => {
                match paste_repo::delete_by_public_id(&self.db, &record.public_id, None).await {
                    Ok(_) => Err(file_err),
                    Err(undo_err) => Err(AppError::StorageInconsistency(format!(
                        "orphan row {} (file write: {}; row undo: {})",
                        record.public_id, file_err, undo_err
                    ))),
                }
            }
            (Err(row_err), Ok(())) => {
                match tokio::fs::remove_file(self.file_path(&record.filename)?).await {
                    Ok(()) => Err(row_err),
                    Err(undo_err) => Err(AppError::StorageInconsistency(format!(
                        "orphan file {} (row write: {}; file undo: {})",
                        record.filename, row_err, undo_err
                    ))),
                }
            }
        }
    }

    async fn write_ciphertext(
        &self,
        record: &DurableRecord,
        plaintext: &[u8],
        wrapping_key: &[u8],
    ) -> Result<()> {
        let ciphertext = record.keys.seal(plaintext, wrapping_key)?;
        tokio::fs::write(self.file_path(&record.filename)?, ciphertext).await?;
        Ok(())
    }

    /// Reads and opens a durable paste.
    ///
    /// Anyone holding the public id may read it; expired rows the sweeper
    /// has not reached yet count as missing.
    pub async fn fetch(&self, public_id: &str) -> Result<Paste> {
        let now = chrono::Utc::now().timestamp();
        let (record, wrapping_key) = paste_repo::find_readable(&self.db, public_id, now)
            .await?
            .ok_or(AppError::NotFound)?;

        let ciphertext = match tokio::fs::read(self.file_path(&record.filename)?).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Row {} has no ciphertext file", public_id);
                return Err(AppError::NotFound);
            }
            Err(e) => return Err(e.into()),
        };

        let data = record.keys.open(&ciphertext, &wrapping_key)?;
        Ok(Paste {
            content_type: record.content_type,
            data,
        })
    }

    /// Deletes an entry and its file, whoever owns it.
    pub async fn delete_by_public_id(&self, public_id: &str) -> Result<()> {
        self.delete_matching(public_id, None).await
    }

    /// Deletes an entry and its file if `user_id` owns it.
    pub async fn delete_owned(&self, public_id: &str, user_id: i64) -> Result<()> {
        self.delete_matching(public_id, Some(user_id)).await
    }

    async fn delete_matching(&self, public_id: &str, owner: Option<i64>) -> Result<()> {
        let filename = paste_repo::delete_by_public_id(&self.db, public_id, owner)
            .await?
            .ok_or(AppError::NotFound)?;
        self.count.fetch_sub(1, Ordering::SeqCst);
        self.remove_file(&filename).await?;
        tracing::info!("Deleted durable paste {}", public_id);
        Ok(())
    }

    async fn remove_file(&self, filename: &str) -> Result<()> {
        tokio::fs::remove_file(self.file_path(filename)?).await?;
        Ok(())
    }

    /// Deletes the oldest entry and its file.
    ///
    /// Returns `CapacityRace` when there was nothing left to delete.
    pub async fn evict_oldest(&self) -> Result<()> {
        let filename = paste_repo::delete_oldest(&self.db)
            .await?
            .ok_or(AppError::CapacityRace)?;
        self.count.fetch_sub(1, Ordering::SeqCst);
        self.remove_file(&filename).await
    }

    /// Fire-and-forget capacity eviction. Failures are only logged, and the
    /// insert that triggered it does not wait, so the store may briefly hold
    /// more than `max_entries` entries.
    fn evict_oldest_in_background(&self) {
        let store = self.clone();
        tokio::spawn(async move {
            match store.evict_oldest().await {
                Ok(()) => tracing::debug!("Evicted oldest durable paste"),
                Err(AppError::CapacityRace) => {
                    tracing::debug!("Capacity eviction found nothing to evict")
                }
                Err(e) => tracing::warn!("Capacity eviction failed: {}", e),
            }
        });
    }

    /// Sets an entry's expiry to `days` from now.
    ///
    /// Fails with `Unauthorized` if `user_id` does not own the entry.
    pub async fn set_expiry(&self, public_id: &str, user_id: i64, days: i64) -> Result<()> {
        validate_expiry_days(days)?;
        let expire_at = chrono::Utc::now().timestamp() + days * SECONDS_PER_DAY;

        match paste_repo::set_expiry(&self.db, public_id, user_id, expire_at).await? {
            0 => Err(AppError::Unauthorized),
            _ => Ok(()),
        }
    }

    /// Lists the entries owned by `user_id`.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<PasteListing>> {
        paste_repo::list_for_user(&self.db, user_id).await
    }

    /// Deletes every entry whose expiry is at or before `now`, with its file.
    ///
    /// # Returns
    ///
    /// The number of rows removed.
    pub async fn sweep_expired(&self, now: i64) -> Result<usize> {
        let filenames = paste_repo::delete_expired(&self.db, now).await?;
        for filename in &filenames {
            self.count.fetch_sub(1, Ordering::SeqCst);
            if let Err(e) = self.remove_file(filename).await {
                tracing::warn!("Failed to remove expired file {}: {}", filename, e);
            }
        }
        Ok(filenames.len())
    }
}
