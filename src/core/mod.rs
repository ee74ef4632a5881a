pub mod gateway;
pub mod orchestrator;
pub mod session;

pub use crate::domain::model::{
    BatchOutcome, BatchReport, BatchResultItem, BatchStatus, CohortSelector, Prediction, Session,
    SessionState, StudentRecord, Subject,
};
pub use crate::domain::ports::{AuthApi, ScoringService, StudentDirectory, TokenStore};
pub use crate::utils::error::Result;
