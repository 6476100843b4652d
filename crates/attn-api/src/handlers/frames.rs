//! Frame ingestion over HTTP.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use attn_models::{Frame, MeetingId};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Maximum accepted meeting id length.
const MAX_MEETING_ID_LENGTH: usize = 128;

/// Frame submission body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitFrameRequest {
    /// Base64 image, optionally as a `data:` URL
    pub frame_data: String,
    /// Capture time; the server clock is used when absent
    #[serde(default)]
    pub timestamp_ms: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SubmitFrameResponse {
    pub accepted: bool,
}

/// POST /api/meetings/:meeting_id/frames
pub async fn submit_frame(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
    payload: Result<Json<SubmitFrameRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitFrameResponse>)> {
    let meeting_id = parse_meeting_id(&meeting_id)?;
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let frame = build_frame(meeting_id, &request.frame_data, request.timestamp_ms)?;
    let accepted = state.pool.submit(frame);
    metrics::record_frame_ingested("http", accepted);

    let status = if accepted {
        StatusCode::ACCEPTED
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok((status, Json(SubmitFrameResponse { accepted })))
}

/// Validate a meeting id taken from the path.
pub fn parse_meeting_id(raw: &str) -> ApiResult<MeetingId> {
    let valid = !raw.is_empty()
        && raw.len() <= MAX_MEETING_ID_LENGTH
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if valid {
        Ok(MeetingId::from(raw))
    } else {
        Err(ApiError::bad_request("Invalid meeting id"))
    }
}

/// Decode a frame payload and stamp it with its capture time.
pub fn build_frame(meeting_id: MeetingId, frame_data: &str, timestamp_ms: Option<i64>) -> ApiResult<Frame> {
    let image = decode_frame_data(frame_data)?;
    let timestamp_ms = match timestamp_ms {
        Some(ts) => validate_timestamp(ts)?,
        None => Utc::now().timestamp_millis(),
    };
    Ok(Frame::new(meeting_id, image, timestamp_ms))
}

/// Capture times must be non-negative and representable as a date.
fn validate_timestamp(timestamp_ms: i64) -> ApiResult<i64> {
    if timestamp_ms < 0 || DateTime::<Utc>::from_timestamp_millis(timestamp_ms).is_none() {
        return Err(ApiError::bad_request(format!(
            "timestampMs out of range: {}",
            timestamp_ms
        )));
    }
    Ok(timestamp_ms)
}

/// Decode base64 image bytes, accepting `data:image/...;base64,` prefixes.
pub fn decode_frame_data(frame_data: &str) -> ApiResult<Vec<u8>> {
    let encoded = match frame_data.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => frame_data,
    };

    let image = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ApiError::bad_request(format!("frameData is not valid base64: {}", e)))?;
    if image.is_empty() {
        return Err(ApiError::bad_request("frameData is empty"));
    }

    debug!(bytes = image.len(), "Decoded frame payload");
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_and_data_url() {
        assert_eq!(decode_frame_data("AQID").unwrap(), vec![1, 2, 3]);
        assert_eq!(
            decode_frame_data("data:image/jpeg;base64,AQID").unwrap(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_frame_data("not base64!"), Err(ApiError::BadRequest(_))));
        assert!(matches!(decode_frame_data(""), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_meeting_id_validation() {
        assert!(parse_meeting_id("team-standup_1").is_ok());
        assert!(parse_meeting_id("").is_err());
        assert!(parse_meeting_id("a b").is_err());
        assert!(parse_meeting_id(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_build_frame_defaults_timestamp() {
        let before = Utc::now().timestamp_millis();
        let frame = build_frame(MeetingId::from("m"), "AQID", None).unwrap();
        assert!(frame.timestamp_ms >= before);

        let frame = build_frame(MeetingId::from("m"), "AQID", Some(42)).unwrap();
        assert_eq!(frame.timestamp_ms, 42);
    }

    #[test]
    fn test_build_frame_rejects_out_of_range_timestamps() {
        for ts in [i64::MIN, -1, i64::MAX] {
            assert!(
                matches!(
                    build_frame(MeetingId::from("m"), "AQID", Some(ts)),
                    Err(ApiError::BadRequest(_))
                ),
                "timestamp {} accepted",
                ts
            );
        }
        assert!(build_frame(MeetingId::from("m"), "AQID", Some(0)).is_ok());
    }
}
