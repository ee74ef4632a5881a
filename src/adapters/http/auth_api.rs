use super::transport::{decode, error_message, ApiRequest, HttpTransport};
use crate::domain::model::{LoginGrant, RefreshGrant, RegistrationForm, RegistrationReceipt, Subject};
use crate::domain::ports::AuthApi;
use crate::utils::error::ApiError;
use async_trait::async_trait;
use serde_json::json;

/// `/auth/*` endpoints. These bypass the gateway's retry policy: each call
/// carries exactly the token it is given.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    transport: HttpTransport,
}

impl HttpAuthApi {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, email: &str, password: &str) -> Result<LoginGrant, ApiError> {
        let request = ApiRequest::post(
            ["auth", "login"],
            json!({ "email": email, "password": password }),
        );
        let body = self.transport.send(&request, None).await?;
        decode(body)
    }

    async fn register(&self, form: &RegistrationForm) -> Result<RegistrationReceipt, ApiError> {
        let body = serde_json::to_value(form).map_err(|e| ApiError::Decode {
            message: e.to_string(),
        })?;
        let request = ApiRequest::post(["auth", "register"], body);
        let response = self.transport.send(&request, None).await?;
        let message = error_message(&response);
        let mut receipt: RegistrationReceipt = decode(response)?;
        receipt.message = message;
        Ok(receipt)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshGrant, ApiError> {
        let request = ApiRequest::post(
            ["auth", "refresh"],
            json!({ "refresh_token": refresh_token }),
        );
        let body = self.transport.send(&request, None).await?;
        decode(body)
    }

    async fn whoami(&self, access_token: &str) -> Result<Subject, ApiError> {
        let request = ApiRequest::get(["auth", "me"]);
        let body = self.transport.send(&request, Some(access_token)).await?;
        decode(body)
    }

    async fn logout(&self, access_token: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post(["auth", "logout"], json!({}));
        self.transport.send(&request, Some(access_token)).await?;
        Ok(())
    }
}
