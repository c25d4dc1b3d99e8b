//! HTTP side of a conversion: upload the file, collect the artifact.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;

/// Name of the multipart field the server expects.
const FILE_FIELD: &str = "file";

/// Artifact name used when the server does not send one.
pub const DEFAULT_ARTIFACT_NAME: &str = "beatscoin.opus";

/// A file read from disk, ready to upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub mime: String,
    pub data: Vec<u8>,
}

impl UploadFile {
    /// Read `path` into memory and guess its media type from the extension.
    pub async fn read(path: &Path) -> bc_core::Result<Self> {
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                bc_core::Error::Validation(format!("{} is not a file", path.display()))
            })?;
        let mime = guess_mime(&name).to_string();
        Ok(Self { name, mime, data })
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// The converted file returned by the server.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl Artifact {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for `POST /api/convert`.
#[derive(Debug, Clone)]
pub struct ConvertClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ConvertClient {
    /// Point at a server root such as `http://127.0.0.1:8080`.
    pub fn new(server_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/api/convert", server_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Upload `file` and return the artifact.
    ///
    /// # Errors
    ///
    /// - [`bc_core::Error::Transport`] if the server cannot be reached or the
    ///   body is cut short.
    /// - [`bc_core::Error::Remote`] for any non-2xx response, carrying the
    ///   server's JSON `error` message when there is one.
    pub async fn convert(&self, file: &UploadFile) -> bc_core::Result<Artifact> {
        let part = Part::bytes(file.data.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime)
            .map_err(|e| bc_core::Error::Validation(format!("invalid media type: {e}")))?;
        let form = Form::new().part(FILE_FIELD, part);

        tracing::debug!(endpoint = %self.endpoint, file = %file.name, bytes = file.size(), "Uploading");

        let resp = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| bc_core::Error::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(bc_core::Error::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let file_name = resp
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(attachment_file_name)
            .unwrap_or_else(|| DEFAULT_ARTIFACT_NAME.to_string());
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let data = resp
            .bytes()
            .await
            .map_err(|e| bc_core::Error::Transport(e.to_string()))?
            .to_vec();

        Ok(Artifact {
            file_name,
            content_type,
            data,
        })
    }
}

/// Extract the `filename` from a `Content-Disposition` value, keeping only the
/// final path component.
pub fn attachment_file_name(value: &str) -> Option<String> {
    let raw = value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?
        .trim_matches('"');

    Path::new(raw)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
}

/// Media type from the file extension, as a browser file picker would report.
pub fn guess_mime(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "aif" | "aiff" => "audio/aiff",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}
