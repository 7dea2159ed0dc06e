//! Image files uploaded from the dashboard, stored flat in one directory and
//! served under `/uploads`.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use axum::extract::multipart::{Field, MultipartError};
use rand::Rng;

use super::ApiError;

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const FALLBACK_EXTENSION: &str = ".jpg";
const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 9;

/// An image read from a multipart field, not yet written to disk.
#[derive(Debug)]
pub struct UploadedImage {
    pub original_name: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: Arc<PathBuf>,
    max_bytes: usize,
}

impl UploadStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            dir: Arc::new(dir.into()),
            max_bytes,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the upload directory if it is missing.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the directory cannot be created.
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(self.dir.as_path()).await
    }

    /// Drain a multipart file field into memory, enforcing the size limit.
    pub async fn read_field(
        &self,
        rid: &str,
        field: Field<'_>,
    ) -> Result<UploadedImage, ApiError> {
        let original_name = field.file_name().map(ToOwned::to_owned);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(rid, &e))?;
        if bytes.len() > self.max_bytes {
            return Err(too_large(rid, self.max_bytes));
        }
        Ok(UploadedImage {
            original_name,
            bytes: bytes.to_vec(),
        })
    }

    /// Write an image under a fresh unique name and return that name.
    pub async fn save(&self, rid: &str, image: &UploadedImage) -> Result<String, ApiError> {
        let filename = stored_filename(
            image.original_name.as_deref(),
            unix_millis(),
            &random_suffix(),
        );
        let path = self.dir.join(&filename);
        if let Err(e) = self.ensure_dir().await {
            tracing::error!(error = %e, dir = %self.dir.display(), "failed to create upload dir");
            return Err(ApiError::new(rid, "internal_error", "failed to store upload"));
        }
        if let Err(e) = tokio::fs::write(&path, &image.bytes).await {
            tracing::error!(error = %e, path = %path.display(), "failed to write upload");
            return Err(ApiError::new(rid, "internal_error", "failed to store upload"));
        }
        tracing::info!(filename = %filename, bytes = image.bytes.len(), "stored upload");
        Ok(filename)
    }

    /// Best-effort removal of a previously stored file. Values that are not
    /// plain filenames (absolute URLs, paths) are left alone.
    pub async fn remove(&self, filename: &str) {
        if !is_plain_filename(filename) {
            return;
        }
        let path = self.dir.join(filename);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::info!(filename = %filename, "removed upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(error = %e, path = %path.display(), "failed to remove upload"),
        }
    }
}

pub(super) fn multipart_error(rid: &str, error: &MultipartError) -> ApiError {
    if error.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::new(rid, "payload_too_large", "upload exceeds the size limit");
    }
    ApiError::new(rid, "bad_request", format!("invalid multipart body: {error}"))
}

fn too_large(rid: &str, max_bytes: usize) -> ApiError {
    ApiError::new(
        rid,
        "payload_too_large",
        format!("upload exceeds the {max_bytes} byte limit"),
    )
}

/// `<millis>-<suffix><ext>`, keeping the client's extension only when it is a
/// known image type.
pub(super) fn stored_filename(original: Option<&str>, millis: u128, suffix: &str) -> String {
    let ext = original
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
        .map_or_else(|| FALLBACK_EXTENSION.to_string(), |ext| format!(".{ext}"));
    format!("{millis}-{suffix}{ext}")
}

fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..SUFFIX_LEN)
        .map(|_| char::from(SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())]))
        .collect()
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains("://")
}
