use crate::domain::model::{
    CohortSelector, LoginGrant, Prediction, RefreshGrant, RegistrationForm, RegistrationReceipt,
    RiskUpdate, ScoringRequest, StoredTokens, StudentRecord, Subject,
};
use crate::utils::error::{ApiError, Result};
use async_trait::async_trait;

/// Durable holder of the current token pair and subject id.
///
/// Only the session manager writes to it.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> Result<Option<StoredTokens>>;
    async fn save(&self, tokens: &StoredTokens) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// The remote authentication endpoints. Calls carry explicit tokens.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> std::result::Result<LoginGrant, ApiError>;
    async fn register(
        &self,
        form: &RegistrationForm,
    ) -> std::result::Result<RegistrationReceipt, ApiError>;
    async fn refresh(&self, refresh_token: &str) -> std::result::Result<RefreshGrant, ApiError>;
    async fn whoami(&self, access_token: &str) -> std::result::Result<Subject, ApiError>;
    async fn logout(&self, access_token: &str) -> std::result::Result<(), ApiError>;
}

/// Student-record store, read and written by reference.
#[async_trait]
pub trait StudentDirectory: Send + Sync {
    async fn fetch_cohort(&self, selector: &CohortSelector) -> Result<Vec<StudentRecord>>;
    async fn persist_risk(&self, student_id: &str, update: &RiskUpdate) -> Result<()>;
}

#[async_trait]
pub trait ScoringService: Send + Sync {
    /// One prediction per request, same order. Length is checked by the caller.
    async fn predict_batch(&self, requests: &[ScoringRequest]) -> Result<Vec<Prediction>>;
    async fn predict(&self, request: &ScoringRequest) -> Result<Prediction>;
}

#[async_trait]
impl<T: StudentDirectory + ?Sized> StudentDirectory for std::sync::Arc<T> {
    async fn fetch_cohort(&self, selector: &CohortSelector) -> Result<Vec<StudentRecord>> {
        (**self).fetch_cohort(selector).await
    }

    async fn persist_risk(&self, student_id: &str, update: &RiskUpdate) -> Result<()> {
        (**self).persist_risk(student_id, update).await
    }
}

#[async_trait]
impl<T: ScoringService + ?Sized> ScoringService for std::sync::Arc<T> {
    async fn predict_batch(&self, requests: &[ScoringRequest]) -> Result<Vec<Prediction>> {
        (**self).predict_batch(requests).await
    }

    async fn predict(&self, request: &ScoringRequest) -> Result<Prediction> {
        (**self).predict(request).await
    }
}
