//! Multipart form reading with attachment policy checks.
//!
//! Text fields are collected by name; parts named `file_field` become
//! `Upload`s. Every file is checked against the `AttachmentPolicy` (count,
//! size, declared type and extension type) before any service call, so a
//! rejected form never reaches the blob store.

use std::collections::HashMap;

use axum::extract::Multipart;

use workdesk_infra::blob::detect_mime;
use workdesk_types::attachment::{AttachmentPolicy, Upload};

use crate::http::error::AppError;

/// A parsed multipart body.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<Upload>,
}

impl MultipartForm {
    /// Trimmed, non-empty text value.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Parse a field with `FromStr`, rejecting unparseable values.
    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>, AppError> {
        self.text(name)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|_| AppError::Validation(format!("'{name}' has an invalid value '{raw}'")))
            })
            .transpose()
    }

    pub fn require<T: std::str::FromStr>(&self, name: &str) -> Result<T, AppError> {
        self.parse(name)?
            .ok_or_else(|| AppError::Validation(format!("'{name}' is required")))
    }
}

/// Read every part of `multipart`, enforcing `policy` on the `file_field` parts.
pub async fn read_form(
    mut multipart: Multipart,
    file_field: &str,
    policy: &AttachmentPolicy,
) -> Result<MultipartForm, AppError> {
    let mut form = MultipartForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == file_field {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let content_type = field
                .content_type()
                .map(str::to_string)
                .unwrap_or_else(|| detect_mime(&filename));
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read '{filename}': {e}")))?;

            let upload = Upload::new(filename, content_type, data.to_vec());
            policy
                .check_file(&upload, &detect_mime(&upload.filename))
                .map_err(AppError::Validation)?;
            form.files.push(upload);
            policy
                .check_count(form.files.len())
                .map_err(AppError::Validation)?;
        } else if !name.is_empty() {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read '{name}': {e}")))?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}
