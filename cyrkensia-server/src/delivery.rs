//! Streaming of resolved content files

use std::io::SeekFrom;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use httpdate::{fmt_http_date, parse_http_date};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::response::ApiError;

/// Inclusive byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Parse a single `Range: bytes=` header against a file of `size` bytes.
///
/// Malformed or multi-range headers are ignored and the whole file is sent.
/// A well-formed range outside the file is an error.
pub fn parse_range(value: Option<&HeaderValue>, size: u64) -> Result<Option<ByteRange>, ApiError> {
    let Some(value) = value.and_then(|v| v.to_str().ok()) else {
        return Ok(None);
    };
    let Some(ranges) = value.trim().strip_prefix("bytes=") else {
        return Ok(None);
    };
    if ranges.contains(',') {
        return Ok(None);
    }
    let Some((start, end)) = ranges.split_once('-') else {
        return Ok(None);
    };
    let (start, end) = (start.trim(), end.trim());

    let range = if start.is_empty() {
        // Suffix range: the last N bytes
        let Ok(suffix) = end.parse::<u64>() else {
            return Ok(None);
        };
        if suffix == 0 || size == 0 {
            return Err(ApiError::RangeNotSatisfiable(size));
        }
        ByteRange {
            start: size.saturating_sub(suffix),
            end: size - 1,
        }
    } else {
        let Ok(start) = start.parse::<u64>() else {
            return Ok(None);
        };
        let end = if end.is_empty() {
            size.saturating_sub(1)
        } else {
            match end.parse::<u64>() {
                Ok(end) => end.min(size.saturating_sub(1)),
                Err(_) => return Ok(None),
            }
        };
        if start >= size || start > end {
            return Err(ApiError::RangeNotSatisfiable(size));
        }
        ByteRange { start, end }
    };

    Ok(Some(range))
}

/// HTTP dates carry whole seconds only
fn unix_seconds(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

fn header_value(value: impl ToString) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&value.to_string())
        .map_err(|e| ApiError::Internal(format!("invalid header value: {}", e)))
}

/// Stream `path` with content headers, honouring `Range` and `If-Range`.
pub async fn send_file(path: &Path, request_headers: &HeaderMap) -> Result<Response, ApiError> {
    let metadata = fs::metadata(path).await?;
    if !metadata.is_file() {
        return Err(ApiError::NotFound);
    }
    let size = metadata.len();
    let modified = metadata.modified().ok();
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, header_value(mime.essence_str())?);
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Some(modified) = modified {
        headers.insert(header::LAST_MODIFIED, header_value(fmt_http_date(modified))?);
    }

    // A stale If-Range validator downgrades the request to a full transfer
    let if_range_matches = match request_headers.get(header::IF_RANGE).and_then(|v| v.to_str().ok()) {
        Some(value) => match (parse_http_date(value), modified) {
            (Ok(date), Some(modified)) => match (unix_seconds(modified), unix_seconds(date)) {
                (Some(modified), Some(date)) => modified <= date,
                _ => false,
            },
            _ => false,
        },
        None => true,
    };
    let range = if if_range_matches {
        parse_range(request_headers.get(header::RANGE), size)?
    } else {
        None
    };

    let mut file = File::open(path).await?;

    match range {
        Some(range) => {
            debug!("Range {}-{}/{} of {:?}", range.start, range.end, size, path);
            file.seek(SeekFrom::Start(range.start)).await?;
            headers.insert(
                header::CONTENT_RANGE,
                header_value(format!("bytes {}-{}/{}", range.start, range.end, size))?,
            );
            headers.insert(header::CONTENT_LENGTH, header_value(range.length())?);
            let body = Body::from_stream(ReaderStream::new(file.take(range.length())));
            Ok((StatusCode::PARTIAL_CONTENT, headers, body).into_response())
        }
        None => {
            headers.insert(header::CONTENT_LENGTH, header_value(size)?);
            let body = Body::from_stream(ReaderStream::new(file));
            Ok((StatusCode::OK, headers, body).into_response())
        }
    }
}
