use crate::utils::error::{ConsoleError, FailureReason, Result};
use crate::utils::validation::Validate;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_INCOME: &str = "Medium";
pub const DEFAULT_LOCATION: &str = "Urban";
pub const DEFAULT_PARENT_OCCUPATION: &str = "Small Business";
pub const DEFAULT_GENDER: &str = "Other";

/// The authenticated principal as reported by the service (a teacher account).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl Subject {
    pub fn display_name(&self) -> String {
        self.full_name
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.id.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub subject: Subject,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn subject_id(&self) -> &str {
        &self.subject.id
    }

    pub fn display_name(&self) -> String {
        self.subject.display_name()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unknown,
    Restoring,
    Authenticated(Session),
    /// Transient; holds the session whose access token is being replaced.
    RefreshingToken(Session),
    Anonymous,
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) | SessionState::RefreshingToken(session) => {
                Some(session)
            }
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

/// What the token store persists between process restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub subject_id: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub teacher: Subject,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshGrant {
    pub access_token: String,
    /// Read but never stored: a refresh keeps the refresh token issued at login.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

pub(crate) fn expiry_from(expires_in: Option<i64>) -> Option<DateTime<Utc>> {
    expires_in
        .filter(|secs| *secs > 0)
        .map(|secs| Utc::now() + Duration::seconds(secs))
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegistrationReceipt {
    #[serde(deserialize_with = "lenient::string")]
    pub teacher_id: String,
    pub email: String,
    pub full_name: String,
    #[serde(skip)]
    pub message: Option<String>,
}

/// Identifies one cohort: a class in a given admission year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortSelector {
    pub class_label: String,
    pub admission_year: String,
}

impl CohortSelector {
    pub fn new(class_label: impl Into<String>, admission_year: impl Into<String>) -> Self {
        Self {
            class_label: class_label.into(),
            admission_year: admission_year.into(),
        }
    }
}

impl Validate for CohortSelector {
    fn validate(&self) -> Result<()> {
        if self.class_label.trim().is_empty() {
            return Err(ConsoleError::InvalidSelector {
                reason: "class label is required".to_string(),
            });
        }
        let year = self.admission_year.trim();
        if year.is_empty() {
            return Err(ConsoleError::InvalidSelector {
                reason: "admission year is required".to_string(),
            });
        }
        if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConsoleError::InvalidSelector {
                reason: format!("admission year must be a four digit year, got '{}'", year),
            });
        }
        Ok(())
    }
}

/// Local copy of a remote student record, held for one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    #[serde(deserialize_with = "lenient::string")]
    pub student_id: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub roll_no: Option<String>,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default, rename = "class")]
    pub class_label: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub attendance: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub marks: Option<f64>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub income: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub parent_occupation: Option<String>,
    #[serde(default, rename = "dropout_risk")]
    pub risk_label: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub risk_score: Option<f64>,
}

/// The shape the scoring endpoint expects for one student.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringRequest {
    pub student_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_no: Option<String>,
    pub attendance: f64,
    pub marks: f64,
    pub gender: String,
    #[serde(rename = "class")]
    pub class_label: String,
    pub income: String,
    pub location: String,
    pub parent_occupation: String,
}

fn or_neutral(value: &Option<String>, neutral: &str) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(neutral)
        .to_string()
}

impl ScoringRequest {
    /// Missing demographic data falls back to neutral values instead of failing.
    pub fn from_record(record: &StudentRecord, selector: Option<&CohortSelector>) -> Self {
        let class_label = record
            .class_label
            .clone()
            .or_else(|| selector.map(|s| s.class_label.clone()))
            .unwrap_or_default();

        Self {
            student_id: record.student_id.clone(),
            roll_no: record.roll_no.clone(),
            attendance: record.attendance.unwrap_or(0.0),
            marks: record.marks.unwrap_or(0.0),
            gender: or_neutral(&record.gender, DEFAULT_GENDER),
            class_label,
            income: or_neutral(&record.income, DEFAULT_INCOME),
            location: or_neutral(&record.location, DEFAULT_LOCATION),
            parent_occupation: or_neutral(&record.parent_occupation, DEFAULT_PARENT_OCCUPATION),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(rename = "dropout_risk")]
    pub risk_label: String,
    #[serde(deserialize_with = "lenient::f64")]
    pub risk_score: f64,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

/// Body of the per-student persist call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskUpdate {
    #[serde(rename = "dropout_risk")]
    pub risk_label: String,
    pub risk_score: f64,
}

impl From<&Prediction> for RiskUpdate {
    fn from(prediction: &Prediction) -> Self {
        Self {
            risk_label: prediction.risk_label.clone(),
            risk_score: prediction.risk_score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Completed,
    /// Informational: the selector matched no students.
    EmptyCohort,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
    Scored(Prediction),
    /// Scored but not persisted; the prediction is kept so it can still be shown.
    Failed {
        reason: FailureReason,
        prediction: Prediction,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResultItem {
    pub student_id: String,
    pub roll_no: Option<String>,
    pub student_name: Option<String>,
    pub outcome: BatchOutcome,
}

impl BatchResultItem {
    pub fn is_persisted(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Scored(_))
    }

    pub fn prediction(&self) -> &Prediction {
        match &self.outcome {
            BatchOutcome::Scored(prediction) => prediction,
            BatchOutcome::Failed { prediction, .. } => prediction,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.outcome {
            BatchOutcome::Scored(_) => None,
            BatchOutcome::Failed { reason, .. } => Some(reason),
        }
    }

    /// The prediction if it was saved, `PersistFailed` otherwise.
    pub fn into_result(self) -> Result<Prediction> {
        match self.outcome {
            BatchOutcome::Scored(prediction) => Ok(prediction),
            BatchOutcome::Failed { reason, .. } => Err(ConsoleError::PersistFailed {
                student_id: self.student_id,
                reason,
            }),
        }
    }
}

/// Outcome of one batch run, items in submitted cohort order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub selector: CohortSelector,
    pub status: BatchStatus,
    pub items: Vec<BatchResultItem>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn persisted_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_persisted()).count()
    }

    pub fn unsaved_count(&self) -> usize {
        self.total() - self.persisted_count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchResultItem> {
        self.items.iter().filter(|item| !item.is_persisted())
    }

    pub fn summary(&self) -> String {
        match self.status {
            BatchStatus::EmptyCohort => format!(
                "No students found in class {} ({})",
                self.selector.class_label, self.selector.admission_year
            ),
            BatchStatus::Completed => format!(
                "Predictions completed for {} students: {} saved, {} failed to save",
                self.total(),
                self.persisted_count(),
                self.unsaved_count()
            ),
        }
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "student_id",
            "roll_no",
            "student_name",
            "status",
            "dropout_risk",
            "risk_score",
            "confidence",
            "failure",
        ])?;

        for item in &self.items {
            let prediction = item.prediction();
            let status = if item.is_persisted() { "saved" } else { "failed" };
            let failure = item.failure().map(|r| r.to_string()).unwrap_or_default();
            let risk_score = format!("{:.4}", prediction.risk_score);
            let confidence = format!("{:.4}", prediction.confidence);
            writer.write_record([
                item.student_id.as_str(),
                item.roll_no.as_deref().unwrap_or(""),
                item.student_name.as_deref().unwrap_or(""),
                status,
                prediction.risk_label.as_str(),
                risk_score.as_str(),
                confidence.as_str(),
                failure.as_str(),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        csv_text(bytes)
    }
}

fn csv_text(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| {
        ConsoleError::CsvError(csv::Error::from(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e,
        )))
    })
}

/// The service is loose about JSON types: ids and numbers show up as strings.
mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        match Value::deserialize(d)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(D::Error::custom(format!(
                "expected string or number, got {}",
                other
            ))),
        }
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            Value::Number(n) => Ok(Some(n.to_string())),
            other => Err(D::Error::custom(format!(
                "expected string or number, got {}",
                other
            ))),
        }
    }

    pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
    }

    pub fn f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        opt_f64(d)?.ok_or_else(|| D::Error::custom("expected a number"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prediction(label: &str, score: f64) -> Prediction {
        Prediction {
            risk_label: label.to_string(),
            risk_score: score,
            confidence: 0.9,
            recommendation: None,
        }
    }

    #[test]
    fn test_selector_validation() {
        assert!(CohortSelector::new("8th", "2026").validate().is_ok());
        assert!(matches!(
            CohortSelector::new("", "2026").validate(),
            Err(ConsoleError::InvalidSelector { .. })
        ));
        assert!(matches!(
            CohortSelector::new("8th", " ").validate(),
            Err(ConsoleError::InvalidSelector { .. })
        ));
        assert!(matches!(
            CohortSelector::new("8th", "20x6").validate(),
            Err(ConsoleError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_student_record_accepts_loose_types() {
        let record: StudentRecord = serde_json::from_value(json!({
            "student_id": 42,
            "roll_no": 7,
            "student_name": "Asha",
            "class": "8th",
            "attendance": "72.5",
            "marks": 55,
            "gender": "Female",
            "income": null
        }))
        .unwrap();

        assert_eq!(record.student_id, "42");
        assert_eq!(record.roll_no.as_deref(), Some("7"));
        assert_eq!(record.attendance, Some(72.5));
        assert_eq!(record.marks, Some(55.0));
        assert_eq!(record.income, None);
        assert_eq!(record.risk_label, None);
    }

    #[test]
    fn test_scoring_request_fills_neutral_defaults() {
        let record: StudentRecord = serde_json::from_value(json!({
            "student_id": "s1",
            "attendance": "not a number",
            "location": "   "
        }))
        .unwrap();
        let selector = CohortSelector::new("8th", "2026");

        let request = ScoringRequest::from_record(&record, Some(&selector));

        assert_eq!(request.attendance, 0.0);
        assert_eq!(request.marks, 0.0);
        assert_eq!(request.income, DEFAULT_INCOME);
        assert_eq!(request.location, DEFAULT_LOCATION);
        assert_eq!(request.parent_occupation, DEFAULT_PARENT_OCCUPATION);
        assert_eq!(request.gender, DEFAULT_GENDER);
        assert_eq!(request.class_label, "8th");

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["class"], "8th");
        assert!(body.get("roll_no").is_none());
    }

    #[test]
    fn test_prediction_wire_names() {
        let parsed: Prediction = serde_json::from_value(json!({
            "dropout_risk": "High",
            "risk_score": 0.81,
            "confidence": 0.81,
            "recommendation": "Schedule a parent meeting"
        }))
        .unwrap();
        assert_eq!(parsed.risk_label, "High");

        let update = serde_json::to_value(RiskUpdate::from(&parsed)).unwrap();
        assert_eq!(update, json!({"dropout_risk": "High", "risk_score": 0.81}));
    }

    #[test]
    fn test_failed_item_into_result_is_persist_failed() {
        let item = BatchResultItem {
            student_id: "s7".to_string(),
            roll_no: None,
            student_name: None,
            outcome: BatchOutcome::Failed {
                reason: FailureReason::NotFound,
                prediction: prediction("High", 0.9),
            },
        };

        match item.into_result() {
            Err(ConsoleError::PersistFailed { student_id, reason }) => {
                assert_eq!(student_id, "s7");
                assert_eq!(reason, FailureReason::NotFound);
            }
            other => panic!("expected PersistFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_non_utf8_csv_is_csv_error() {
        let err = csv_text(vec![b's', 0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, ConsoleError::CsvError(_)));
        assert!(err.to_string().starts_with("CSV"));
    }

    #[test]
    fn test_batch_report_counts_and_csv() {
        let now = Utc::now();
        let report = BatchReport {
            selector: CohortSelector::new("8th", "2026"),
            status: BatchStatus::Completed,
            items: vec![
                BatchResultItem {
                    student_id: "s1".to_string(),
                    roll_no: Some("1".to_string()),
                    student_name: Some("Asha".to_string()),
                    outcome: BatchOutcome::Scored(prediction("High", 0.8)),
                },
                BatchResultItem {
                    student_id: "s2".to_string(),
                    roll_no: None,
                    student_name: None,
                    outcome: BatchOutcome::Failed {
                        reason: FailureReason::Timeout,
                        prediction: prediction("Low", 0.1),
                    },
                },
            ],
            started_at: now,
            finished_at: now,
        };

        assert_eq!(report.total(), 2);
        assert_eq!(report.persisted_count(), 1);
        assert_eq!(report.unsaved_count(), 1);
        assert_eq!(report.failures().count(), 1);
        assert!(report.summary().contains("1 failed to save"));

        let csv = report.to_csv().unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "student_id,roll_no,student_name,status,dropout_risk,risk_score,confidence,failure"
        );
        assert_eq!(lines[1], "s1,1,Asha,saved,High,0.8000,0.9000,");
        assert_eq!(lines[2], "s2,,,failed,Low,0.1000,0.9000,Timeout");
    }

    #[test]
    fn test_subject_display_name_fallbacks() {
        let subject: Subject =
            serde_json::from_value(json!({"id": 3, "email": "t@school.org"})).unwrap();
        assert_eq!(subject.id, "3");
        assert_eq!(subject.display_name(), "t@school.org");
    }
}
