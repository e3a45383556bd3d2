use axum::extract::Multipart;
use std::collections::HashMap;

use super::ApiError;
use crate::clients::videos::ReferenceFile;

/// Text fields and uploaded files of a multipart request.
#[derive(Debug, Default)]
pub struct MultipartBody {
    pub fields: HashMap<String, String>,
    pub files: Vec<ReferenceFile>,
}

impl MultipartBody {
    /// Drains the request. Parts named `file_field` become files, the rest
    /// are read as text. More than `max_files` files is rejected.
    pub async fn read(
        mut multipart: Multipart,
        file_field: &str,
        max_files: usize,
    ) -> Result<Self, ApiError> {
        let mut body = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::validation(format!("Invalid multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if name == file_field {
                if body.files.len() >= max_files {
                    return Err(ApiError::validation(format!(
                        "At most {max_files} reference images are allowed"
                    )));
                }
                let file_name = field.file_name().unwrap_or("reference").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation(format!("Failed to read upload: {e}")))?;

                body.files.push(ReferenceFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::validation(format!("Invalid field '{name}': {e}")))?;
                body.fields.insert(name, text);
            }
        }

        Ok(body)
    }

    /// Non-blank text field.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(ToString::to_string)
    }

    pub fn number(&self, name: &str) -> Result<Option<u32>, ApiError> {
        self.text(name)
            .map(|v| {
                v.parse()
                    .map_err(|_| ApiError::validation(format!("{name} must be a positive integer")))
            })
            .transpose()
    }
}
