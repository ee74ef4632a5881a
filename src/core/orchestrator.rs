use crate::domain::model::{
    BatchOutcome, BatchReport, BatchResultItem, BatchStatus, CohortSelector, Prediction, RiskUpdate,
    ScoringRequest, StudentRecord,
};
use crate::domain::ports::{ScoringService, StudentDirectory};
use crate::utils::error::{ConsoleError, FailureReason, Result};
use crate::utils::validation::Validate;
use chrono::Utc;
use futures::stream::{self, StreamExt};

pub const DEFAULT_MAX_CONCURRENT_PERSISTS: usize = 4;

/// Scores a cohort in one call, then persists each result independently.
pub struct PredictionOrchestrator<D: StudentDirectory, S: ScoringService> {
    directory: D,
    scoring: S,
    max_concurrent_persists: usize,
}

fn cohort_error(err: ConsoleError) -> ConsoleError {
    match err {
        ConsoleError::ServiceUnavailable(reason) => ConsoleError::CohortUnavailable { reason },
        other => other,
    }
}

fn scoring_error(err: ConsoleError) -> ConsoleError {
    match err {
        ConsoleError::ServiceUnavailable(reason) => ConsoleError::ScoringUnavailable { reason },
        other => other,
    }
}

fn failure_reason(err: ConsoleError) -> FailureReason {
    match err {
        ConsoleError::ServiceUnavailable(api) => api.into(),
        ConsoleError::SessionExpired | ConsoleError::NoRefreshToken => FailureReason::SessionExpired,
        other => FailureReason::Network {
            message: other.to_string(),
        },
    }
}

impl<D: StudentDirectory, S: ScoringService> PredictionOrchestrator<D, S> {
    pub fn new(directory: D, scoring: S) -> Self {
        Self {
            directory,
            scoring,
            max_concurrent_persists: DEFAULT_MAX_CONCURRENT_PERSISTS,
        }
    }

    /// 1 gives strictly sequential persistence.
    pub fn with_max_concurrent_persists(mut self, limit: usize) -> Self {
        self.max_concurrent_persists = limit.max(1);
        self
    }

    pub async fn fetch_cohort(&self, selector: &CohortSelector) -> Result<Vec<StudentRecord>> {
        selector.validate()?;
        self.directory
            .fetch_cohort(selector)
            .await
            .map_err(cohort_error)
    }

    pub async fn run_batch(&self, selector: &CohortSelector) -> Result<BatchReport> {
        let started_at = Utc::now();
        let cohort = self.fetch_cohort(selector).await?;

        if cohort.is_empty() {
            tracing::info!(
                class = %selector.class_label,
                admission_year = %selector.admission_year,
                "cohort is empty, nothing to score"
            );
            return Ok(BatchReport {
                selector: selector.clone(),
                status: BatchStatus::EmptyCohort,
                items: Vec::new(),
                started_at,
                finished_at: Utc::now(),
            });
        }

        let requests: Vec<ScoringRequest> = cohort
            .iter()
            .map(|record| ScoringRequest::from_record(record, Some(selector)))
            .collect();

        tracing::info!(
            class = %selector.class_label,
            admission_year = %selector.admission_year,
            students = requests.len(),
            "submitting cohort for scoring"
        );
        let predictions = self
            .scoring
            .predict_batch(&requests)
            .await
            .map_err(scoring_error)?;

        if predictions.len() != cohort.len() {
            tracing::error!(
                expected = cohort.len(),
                actual = predictions.len(),
                "scoring response does not match the submitted cohort"
            );
            return Err(ConsoleError::ResponseShapeMismatch {
                expected: cohort.len(),
                actual: predictions.len(),
            });
        }

        // `buffered` yields in submission order regardless of completion order.
        let items: Vec<BatchResultItem> = stream::iter(cohort.into_iter().zip(predictions))
            .map(|(record, prediction)| self.persist_item(record, prediction))
            .buffered(self.max_concurrent_persists)
            .collect()
            .await;

        let report = BatchReport {
            selector: selector.clone(),
            status: BatchStatus::Completed,
            items,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            total = report.total(),
            persisted = report.persisted_count(),
            failed = report.unsaved_count(),
            "batch prediction finished"
        );
        Ok(report)
    }

    /// Single-student flow: score one record, then persist it.
    pub async fn score_student(&self, record: &StudentRecord) -> Result<BatchResultItem> {
        let request = ScoringRequest::from_record(record, None);
        let prediction = self.scoring.predict(&request).await.map_err(scoring_error)?;
        Ok(self.persist_item(record.clone(), prediction).await)
    }

    async fn persist_item(&self, record: StudentRecord, prediction: Prediction) -> BatchResultItem {
        let update = RiskUpdate::from(&prediction);
        let outcome = match self
            .directory
            .persist_risk(&record.student_id, &update)
            .await
        {
            Ok(()) => BatchOutcome::Scored(prediction),
            Err(e) => {
                tracing::warn!(student_id = %record.student_id, error = %e, "failed to persist prediction");
                BatchOutcome::Failed {
                    reason: failure_reason(e),
                    prediction,
                }
            }
        };

        BatchResultItem {
            student_id: record.student_id,
            roll_no: record.roll_no,
            student_name: record.student_name,
            outcome,
        }
    }
}
