// Adapters layer: concrete implementations of the domain ports (HTTP service, token storage).

pub mod http {
    pub mod auth_api;
    pub mod scoring_api;
    pub mod student_api;
    pub mod transport;

    pub use auth_api::HttpAuthApi;
    pub use scoring_api::HttpScoringService;
    pub use student_api::HttpStudentDirectory;
    pub use transport::{ApiRequest, HttpTransport, Method};
}

pub mod storage;
