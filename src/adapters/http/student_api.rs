use super::transport::{payload, ApiRequest};
use crate::core::gateway::RequestGateway;
use crate::domain::model::{CohortSelector, RiskUpdate, StudentRecord};
use crate::domain::ports::StudentDirectory;
use crate::utils::error::{ApiError, ConsoleError, Result};
use async_trait::async_trait;

/// Student-record endpoints, called through the gateway.
#[derive(Clone)]
pub struct HttpStudentDirectory {
    gateway: RequestGateway,
}

impl HttpStudentDirectory {
    pub fn new(gateway: RequestGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl StudentDirectory for HttpStudentDirectory {
    async fn fetch_cohort(&self, selector: &CohortSelector) -> Result<Vec<StudentRecord>> {
        let request = ApiRequest::get(["students", "class", selector.class_label.trim()])
            .with_query("admission_year", selector.admission_year.trim());
        let body = self.gateway.send(&request).await?;

        // A null payload is an empty class.
        let records = payload(body);
        if records.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(records).map_err(|e| {
            ConsoleError::ServiceUnavailable(ApiError::Decode {
                message: e.to_string(),
            })
        })
    }

    async fn persist_risk(&self, student_id: &str, update: &RiskUpdate) -> Result<()> {
        let request = ApiRequest::put(["students", student_id], serde_json::to_value(update)?);
        self.gateway.send(&request).await?;
        Ok(())
    }
}
