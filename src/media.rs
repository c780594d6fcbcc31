//! Chunked media upload: `INIT` → `APPEND` (repeated, multipart) →
//! `FINALIZE` → `STATUS` (polled while the server reports async
//! processing). Built on [`crate::client::HttpClient::rest_json`] for the
//! JSON-bodied commands and [`crate::client::HttpClient::rest_raw`] for
//! the binary `APPEND` part.

use std::time::Duration;

use serde_json::{json, Value};

use crate::client::HttpClient;
use crate::error::{Error, Result};
use crate::transport::Method;

const UPLOAD_PATH: &str = "/1.1/media/upload.json";
const CHUNK_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingState {
    Pending,
    InProgress,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ProcessingInfo {
    pub state: ProcessingState,
    pub check_after: Duration,
}

#[derive(Debug, Clone)]
pub struct MediaUploadResult {
    pub media_id: String,
    pub media_id_string: String,
    pub size: Option<u64>,
    pub expires_after: Option<Duration>,
    pub processing: Option<ProcessingInfo>,
}

/// Uploads raw media bytes through the full chunked sequence, polling
/// `STATUS` until the server finishes async processing (if any).
pub async fn upload(
    client: &HttpClient,
    bytes: &[u8],
    media_type: &str,
    media_category: Option<&str>,
) -> Result<MediaUploadResult> {
    let media_id_string = init(client, bytes.len(), media_type, media_category).await?;

    for (index, chunk) in bytes.chunks(CHUNK_SIZE).enumerate() {
        append(client, &media_id_string, index as u32, chunk).await?;
    }

    let mut result = finalize(client, &media_id_string).await?;
    while let Some(processing) = &result.processing {
        match &processing.state {
            ProcessingState::Succeeded => break,
            ProcessingState::Failed(reason) => {
                return Err(Error::corrupted(format!("media processing failed: {reason}")));
            }
            ProcessingState::Pending | ProcessingState::InProgress => {
                tokio::time::sleep(processing.check_after).await;
                result = status(client, &result.media_id_string).await?;
            }
        }
    }
    Ok(result)
}

async fn init(client: &HttpClient, total_bytes: usize, media_type: &str, media_category: Option<&str>) -> Result<String> {
    let mut body = json!({
        "command": "INIT",
        "total_bytes": total_bytes,
        "media_type": media_type,
    });
    if let Some(category) = media_category {
        body["media_category"] = json!(category);
    }
    let response: Value = client.rest_json(UPLOAD_PATH, Method::Post, Some(body), true).await?;
    response
        .get("media_id_string")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::corrupted("media INIT response missing media_id_string"))
}

async fn append(client: &HttpClient, media_id: &str, segment_index: u32, chunk: &[u8]) -> Result<()> {
    let (content_type, body) = build_append_multipart(media_id, segment_index, chunk);
    client.rest_raw(UPLOAD_PATH, Method::Post, &content_type, body, true).await?;
    Ok(())
}

async fn finalize(client: &HttpClient, media_id: &str) -> Result<MediaUploadResult> {
    let body = json!({ "command": "FINALIZE", "media_id": media_id });
    let response: Value = client.rest_json(UPLOAD_PATH, Method::Post, Some(body), true).await?;
    parse_upload_result(&response)
}

async fn status(client: &HttpClient, media_id: &str) -> Result<MediaUploadResult> {
    let path = format!("{UPLOAD_PATH}?command=STATUS&media_id={media_id}");
    let response: Value = client.rest_json(&path, Method::Get, None, true).await?;
    parse_upload_result(&response)
}

fn build_append_multipart(media_id: &str, segment_index: u32, chunk: &[u8]) -> (String, Vec<u8>) {
    let boundary = format!("xactions-{media_id}-{segment_index}");
    let mut body = Vec::with_capacity(chunk.len() + 512);
    let mut field = |name: &str, value: &str| {
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    };
    field("command", "APPEND");
    field("media_id", media_id);
    field("segment_index", &segment_index.to_string());
    body.extend_from_slice(
        format!("--{boundary}\r\nContent-Disposition: form-data; name=\"media\"; filename=\"chunk\"\r\nContent-Type: application/octet-stream\r\n\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(chunk);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

fn parse_upload_result(response: &Value) -> Result<MediaUploadResult> {
    let media_id_string = response
        .get("media_id_string")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::corrupted("media upload response missing media_id_string"))?
        .to_string();
    let media_id = response
        .get("media_id")
        .and_then(|v| v.as_u64())
        .map(|v| v.to_string())
        .unwrap_or_else(|| media_id_string.clone());
    let size = response.get("size").and_then(|v| v.as_u64());
    let expires_after = response
        .get("expires_after_secs")
        .and_then(|v| v.as_u64())
        .map(Duration::from_secs);
    let processing = response.get("processing_info").map(parse_processing_info);
    Ok(MediaUploadResult {
        media_id,
        media_id_string,
        size,
        expires_after,
        processing,
    })
}

fn parse_processing_info(value: &Value) -> ProcessingInfo {
    let check_after = value
        .get("check_after_secs")
        .and_then(|v| v.as_u64())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(1));
    let state = match value.get("state").and_then(|v| v.as_str()).unwrap_or("") {
        "succeeded" => ProcessingState::Succeeded,
        "in_progress" => ProcessingState::InProgress,
        "failed" => {
            let reason = value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown processing error")
                .to_string();
            ProcessingState::Failed(reason)
        }
        _ => ProcessingState::Pending,
    };
    ProcessingInfo { state, check_after }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_multipart_contains_chunk_and_fields() {
        let (content_type, body) = build_append_multipart("123", 0, b"hello");
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("name=\"command\""));
        assert!(text.contains("APPEND"));
        assert!(text.contains("name=\"media_id\""));
        assert!(text.contains("123"));
        assert!(text.contains("hello"));
    }

    #[test]
    fn parse_upload_result_without_processing_is_immediately_ready() {
        let response = json!({ "media_id_string": "999", "size": 10 });
        let result = parse_upload_result(&response).unwrap();
        assert_eq!(result.media_id_string, "999");
        assert!(result.processing.is_none());
    }

    #[test]
    fn parse_upload_result_surfaces_failed_processing() {
        let response = json!({
            "media_id_string": "1",
            "processing_info": { "state": "failed", "error": { "message": "bad format" } },
        });
        let result = parse_upload_result(&response).unwrap();
        match result.processing.unwrap().state {
            ProcessingState::Failed(reason) => assert_eq!(reason, "bad format"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
