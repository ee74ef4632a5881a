use crate::utils::error::{ApiError, ConsoleError, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

/// A request that can be replayed: the gateway re-sends it after a token refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    fn new<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Get, segments)
    }

    pub fn post<I, S>(segments: I, body: Value) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Post, segments).with_body(body)
    }

    pub fn put<I, S>(segments: I, body: Value) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Put, segments).with_body(body)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// The single outbound HTTP client. Knows how an access token goes on the wire.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| ConsoleError::InvalidConfigValueError {
            field: "service.base_url".to_string(),
            value: base_url.to_string(),
            reason: format!("Invalid URL format: {}", e),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConsoleError::InvalidConfigValueError {
                field: "service.base_url".to_string(),
                value: base_url.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            });
        }

        Ok(Self {
            client: Client::new(),
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, request: &ApiRequest) -> std::result::Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Network {
                message: format!("cannot build a request URL from {}", self.base_url),
            })?
            .pop_if_empty()
            .extend(request.segments.iter());
        Ok(url)
    }

    /// Sends the request, stamping it with `access_token` when given, and returns the
    /// decoded JSON body. Non-2xx statuses and envelopes with `success: false` are errors.
    pub async fn send(
        &self,
        request: &ApiRequest,
        access_token: Option<&str>,
    ) -> std::result::Result<Value, ApiError> {
        let url = self.url_for(request)?;

        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Put => self.client.put(url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = access_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        builder = builder.timeout(self.timeout);

        tracing::debug!(
            method = ?request.method,
            path = %request.path(),
            authenticated = access_token.is_some(),
            "dispatching request"
        );

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        tracing::debug!(path = %request.path(), status = status.as_u16(), "response received");

        if !status.is_success() {
            return Err(status_error(status, &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        let body: Value = serde_json::from_str(&text).map_err(|e| ApiError::Decode {
            message: e.to_string(),
        })?;
        if body.get("success").and_then(Value::as_bool) == Some(false) {
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message: error_message(&body).unwrap_or_else(|| "Request failed".to_string()),
            });
        }
        Ok(body)
    }
}

fn status_error(status: StatusCode, text: &str) -> ApiError {
    let message = serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|body| error_message(&body))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized { message },
        StatusCode::NOT_FOUND => ApiError::NotFound { message },
        _ => ApiError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

/// `error`, then `message`, from a service envelope.
pub fn error_message(body: &Value) -> Option<String> {
    ["error", "message"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|msg| !msg.is_empty())
        .map(str::to_string)
}

/// The envelope payload: `data` when present, otherwise the whole body.
pub fn payload(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

pub fn decode<T: DeserializeOwned>(body: Value) -> std::result::Result<T, ApiError> {
    serde_json::from_value(payload(body)).map_err(|e| ApiError::Decode {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_unwraps_envelope() {
        assert_eq!(payload(json!({"success": true, "data": [1, 2]})), json!([1, 2]));
        assert_eq!(payload(json!([1, 2])), json!([1, 2]));
        assert_eq!(payload(json!({"ok": true})), json!({"ok": true}));
    }

    #[test]
    fn test_error_message_order() {
        assert_eq!(
            error_message(&json!({"error": "Invalid email or password", "message": "x"})),
            Some("Invalid email or password".to_string())
        );
        assert_eq!(
            error_message(&json!({"error": "", "message": "Teacher profile not found"})),
            Some("Teacher profile not found".to_string())
        );
        assert_eq!(error_message(&json!({"success": false})), None);
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(status_error(StatusCode::UNAUTHORIZED, "").is_unauthorized());
        assert_eq!(
            status_error(StatusCode::NOT_FOUND, r#"{"error": "Student not found"}"#),
            ApiError::NotFound {
                message: "Student not found".to_string()
            }
        );
        assert_eq!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            ApiError::Rejected {
                status: 500,
                message: "Internal Server Error".to_string()
            }
        );
    }

    #[test]
    fn test_url_for_keeps_base_path() {
        let transport =
            HttpTransport::new("http://localhost:5000/api/", Duration::from_secs(5)).unwrap();
        let request = ApiRequest::get(["students", "class", "8th"]).with_query("admission_year", "2026");
        let url = transport.url_for(&request).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/students/class/8th");
        assert_eq!(request.path(), "/students/class/8th");
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(HttpTransport::new("not a url", Duration::from_secs(5)).is_err());
        assert!(HttpTransport::new("mailto:admin@school.org", Duration::from_secs(5)).is_err());
    }
}
