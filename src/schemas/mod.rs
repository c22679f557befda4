pub(crate) mod attempt;
pub(crate) mod auth;
pub(crate) mod question;
pub(crate) mod quiz;
pub(crate) mod user;

use axum::Json;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum ResponseStatus {
    Success,
    Fail,
}

/// Uniform response envelope. Every endpoint, success or failure, wraps
/// its payload in this shape.
#[derive(Debug, Serialize)]
pub(crate) struct Envelope<T: Serialize> {
    pub(crate) status: ResponseStatus,
    pub(crate) message: String,
    pub(crate) data: T,
}

impl<T: Serialize> Envelope<T> {
    pub(crate) fn success(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self { status: ResponseStatus::Success, message: message.into(), data })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RootResponse {
    pub(crate) name: String,
    pub(crate) version: String,
    pub(crate) docs: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) database: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_screaming_status() {
        let Json(envelope) = Envelope::success("Created", serde_json::json!({"id": "x"}));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["status"], "SUCCESS");
        assert_eq!(value["message"], "Created");
        assert_eq!(value["data"]["id"], "x");
    }
}
