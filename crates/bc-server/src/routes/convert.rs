//! `POST /api/convert`: upload an audio file, get the encoded artifact back.
//!
//! The upload is streamed into a scratch input file, the external encoder is
//! run on it, and the scratch output file is streamed back as an attachment.
//! The [`ScratchPair`] travels with the response body, so both files are
//! removed once the body has been sent or dropped. On every error path the
//! pair is dropped before the JSON error is produced.

use std::path::Path;
use std::time::Instant;

use axum::body::Body;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Extension, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bc_encode::ScratchPair;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use tower_http::request_id::RequestId;

use crate::context::AppContext;
use crate::error::AppError;
use crate::trace::request_id_str;

/// Name of the multipart field carrying the upload.
pub const FILE_FIELD: &str = "file";

/// Chunk size used when streaming the artifact back.
const STREAM_CHUNK: usize = 64 * 1024;

/// Convert one uploaded file.
pub async fn convert(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let request_id = request_id_str(&request_id).to_string();
    let multipart = match multipart {
        Ok(m) => m,
        Err(e) => {
            return Err(AppError::new(bc_core::Error::Validation(e.body_text()))
                .with_request_id(request_id))
        }
    };

    convert_upload(&ctx, multipart)
        .await
        .map_err(|e| AppError::new(e).with_request_id(request_id))
}

async fn convert_upload(ctx: &AppContext, multipart: Multipart) -> bc_core::Result<Response> {
    let upload = receive_upload(ctx, multipart).await?;

    tracing::info!(
        file_name = upload.file_name.as_deref().unwrap_or("-"),
        content_type = upload.content_type.as_deref().unwrap_or("-"),
        bytes = upload.size,
        "Upload received"
    );

    let started = Instant::now();
    if let Err(e) = ctx
        .encoder
        .execute(upload.scratch.input(), upload.scratch.output())
        .await
    {
        tracing::warn!(error = %e, "Encoder failed");
        return Err(e);
    }

    let file = tokio::fs::File::open(upload.scratch.output()).await?;
    let size = file.metadata().await?.len();

    tracing::info!(
        input_bytes = upload.size,
        output_bytes = size,
        elapsed = ?started.elapsed(),
        "Conversion complete"
    );

    Ok(artifact_response(ctx, file, size, upload.scratch))
}

/// A received upload sitting in its scratch input file.
struct Upload {
    scratch: ScratchPair,
    file_name: Option<String>,
    content_type: Option<String>,
    size: u64,
}

/// Pull the single `file` field out of the multipart body into a scratch file.
///
/// Fields with other names are skipped, and so is a `file` field sent as a
/// plain form value (no filename). A second `file` upload, an empty file, or
/// no file at all are validation errors.
async fn receive_upload(ctx: &AppContext, mut multipart: Multipart) -> bc_core::Result<Upload> {
    let mut upload: Option<Upload> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        if field.file_name().is_none() {
            tracing::debug!("Ignoring '{FILE_FIELD}' form value without a filename");
            continue;
        }
        if upload.is_some() {
            return Err(bc_core::Error::Validation(
                "multiple file fields are not allowed; send exactly one field named 'file'".into(),
            ));
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let extension = file_name
            .as_deref()
            .and_then(|n| Path::new(n).extension())
            .and_then(|e| e.to_str());

        let (scratch, mut file) =
            ScratchPair::new(&ctx.scratch_dir, extension, ctx.output_extension())?;
        let mut size = 0u64;

        // Owned by `current` from here on so an early return cleans up.
        let current = upload.insert(Upload {
            scratch,
            file_name,
            content_type,
            size: 0,
        });

        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            file.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        file.flush().await?;
        current.size = size;
    }

    match upload {
        None => Err(bc_core::Error::Validation("no file received".into())),
        Some(u) if u.size == 0 => Err(bc_core::Error::Validation("uploaded file is empty".into())),
        Some(u) => Ok(u),
    }
}

fn multipart_error(e: MultipartError) -> bc_core::Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        bc_core::Error::PayloadTooLarge(e.body_text())
    } else {
        bc_core::Error::Validation(e.body_text())
    }
}

/// Stream the encoder output back as an attachment.
///
/// `scratch` is moved into the body stream and dropped with it.
fn artifact_response(
    ctx: &AppContext,
    file: tokio::fs::File,
    size: u64,
    scratch: ScratchPair,
) -> Response {
    let stream = ReaderStream::with_capacity(file, STREAM_CHUNK).map(move |chunk| {
        let _keep_alive = &scratch;
        chunk
    });
    let body = Body::from_stream(stream);

    let artifact = &ctx.config.artifact;
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE.as_str(), artifact.content_type.clone()),
            (header::CONTENT_LENGTH.as_str(), size.to_string()),
            (
                header::CONTENT_DISPOSITION.as_str(),
                content_disposition(&artifact.file_name),
            ),
        ],
        body,
    )
        .into_response()
}

/// `attachment; filename="<name>"` with quotes and backslashes stripped.
pub fn content_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .collect();
    format!("attachment; filename=\"{safe}\"")
}
