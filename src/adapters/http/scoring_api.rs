use super::transport::ApiRequest;
use crate::core::gateway::RequestGateway;
use crate::domain::model::{Prediction, ScoringRequest};
use crate::domain::ports::ScoringService;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::json;

#[derive(Clone)]
pub struct HttpScoringService {
    gateway: RequestGateway,
}

impl HttpScoringService {
    pub fn new(gateway: RequestGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl ScoringService for HttpScoringService {
    async fn predict_batch(&self, requests: &[ScoringRequest]) -> Result<Vec<Prediction>> {
        let request = ApiRequest::post(
            ["prediction", "predict-batch"],
            json!({ "students": requests }),
        );
        self.gateway.send_json(&request).await
    }

    async fn predict(&self, request: &ScoringRequest) -> Result<Prediction> {
        let request = ApiRequest::post(["prediction", "predict"], serde_json::to_value(request)?);
        self.gateway.send_json(&request).await
    }
}
