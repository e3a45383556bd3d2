//! Generated assets written under the uploads directory.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// URL prefix the uploads directory is served under.
pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredImage {
    pub mime_type: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Decodes a base64 (or data URL) image and writes it to
    /// `images/{user}/{task}_{index}.{ext}`.
    pub async fn save_base64_image(
        &self,
        user_id: &str,
        task_id: &str,
        index: usize,
        payload: &str,
        declared_mime: Option<&str>,
    ) -> Result<StoredImage> {
        let (data_url_mime, encoded) = split_data_url(payload);
        let bytes = STANDARD
            .decode(encoded.trim())
            .context("Image payload is not valid base64")?;

        let mime_type = sniff_image_mime(&bytes)
            .or(data_url_mime)
            .or(declared_mime)
            .unwrap_or("image/png");
        let ext = extension_for(mime_type);

        let user_dir = safe_segment(user_id);
        let file_name = format!("{}_{index}.{ext}", safe_segment(task_id));
        let dir = self.root.join("images").join(&user_dir);

        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(&file_name);
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        debug!(path = %path.display(), bytes = bytes.len(), "Stored generated image");

        Ok(StoredImage {
            mime_type: mime_type.to_string(),
            url: format!("{PUBLIC_PREFIX}/images/{user_dir}/{file_name}"),
        })
    }
}

fn split_data_url(payload: &str) -> (Option<&str>, &str) {
    let Some(rest) = payload.strip_prefix("data:") else {
        return (None, payload);
    };
    match rest.split_once(',') {
        Some((meta, data)) => (meta.split(';').next().filter(|m| !m.is_empty()), data),
        None => (None, payload),
    }
}

/// Detects the common image formats from their magic bytes.
#[must_use]
pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "png",
    }
}

/// Keeps a path segment to `[A-Za-z0-9_-]`.
fn safe_segment(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "anonymous".to_string()
    } else {
        cleaned
    }
}
