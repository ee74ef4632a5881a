pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::storage::{FileTokenStore, MemoryTokenStore};
pub use crate::app::AdminConsole;
pub use crate::config::ConsoleConfig;
pub use crate::core::{
    gateway::RequestGateway, orchestrator::PredictionOrchestrator, session::SessionManager,
};
pub use crate::domain::model::{
    BatchOutcome, BatchReport, BatchResultItem, BatchStatus, CohortSelector, Prediction,
    RegistrationForm, SessionState, StudentRecord, Subject,
};
pub use crate::utils::error::{ApiError, ConsoleError, FailureReason, Result};
