use crate::adapters::http::transport::{decode, ApiRequest, HttpTransport};
use crate::core::session::SessionManager;
use crate::utils::error::{ConsoleError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Initial,
    /// The access token was refreshed after a 401; this is the last try.
    RetriedAfterRefresh,
}

/// Dispatches authenticated calls, stamping each with the session's current
/// access token and retrying once after a token refresh.
#[derive(Clone)]
pub struct RequestGateway {
    transport: HttpTransport,
    session: SessionManager,
}

fn is_refresh_endpoint(request: &ApiRequest) -> bool {
    request.segments == ["auth", "refresh"]
}

impl RequestGateway {
    pub fn new(transport: HttpTransport, session: SessionManager) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub async fn send(&self, request: &ApiRequest) -> Result<Value> {
        let mut token = self.session.access_token();
        let mut attempt = Attempt::Initial;

        loop {
            let err = match self.transport.send(request, token.as_deref()).await {
                Ok(body) => return Ok(body),
                Err(err) => err,
            };

            if !err.is_unauthorized() || is_refresh_endpoint(request) {
                return Err(ConsoleError::ServiceUnavailable(err));
            }

            match attempt {
                Attempt::Initial => {
                    // Another call may already have rotated the token this one was sent with.
                    let current = self.session.access_token();
                    if current.is_some() && current != token {
                        tracing::debug!(path = %request.path(), "retrying with the already refreshed token");
                        token = current;
                        attempt = Attempt::RetriedAfterRefresh;
                        continue;
                    }

                    tracing::info!(path = %request.path(), "access token rejected, refreshing");
                    match self.session.refresh().await {
                        Ok(fresh) => {
                            token = Some(fresh);
                            attempt = Attempt::RetriedAfterRefresh;
                        }
                        Err(e) => {
                            tracing::warn!(path = %request.path(), error = %e, "refresh failed, session expired");
                            return Err(ConsoleError::SessionExpired);
                        }
                    }
                }
                Attempt::RetriedAfterRefresh => {
                    tracing::warn!(path = %request.path(), "request rejected again with a fresh token");
                    return Err(ConsoleError::ServiceUnavailable(err));
                }
            }
        }
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        let body = self.send(request).await?;
        decode(body).map_err(ConsoleError::ServiceUnavailable)
    }
}
