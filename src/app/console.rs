use crate::adapters::http::{HttpAuthApi, HttpScoringService, HttpStudentDirectory, HttpTransport};
use crate::adapters::storage::FileTokenStore;
use crate::config::ConsoleConfig;
use crate::core::gateway::RequestGateway;
use crate::core::orchestrator::PredictionOrchestrator;
use crate::core::session::SessionManager;
use crate::domain::ports::TokenStore;
use crate::utils::error::Result;
use crate::utils::logger;
use crate::utils::validation::Validate;
use std::sync::Arc;

pub type HttpOrchestrator = PredictionOrchestrator<HttpStudentDirectory, HttpScoringService>;

/// Everything a UI event handler needs, wired from one configuration.
pub struct AdminConsole {
    config: ConsoleConfig,
    session: SessionManager,
    gateway: RequestGateway,
    orchestrator: HttpOrchestrator,
}

impl AdminConsole {
    /// Uses a file-backed token store under `session.storage_dir`.
    pub fn from_config(config: ConsoleConfig) -> Result<Self> {
        let store = Arc::new(FileTokenStore::new(
            config.storage_dir(),
            &config.session.storage_key,
        ));
        Self::with_store(config, store)
    }

    pub fn with_store(config: ConsoleConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        config.validate()?;

        let transport = HttpTransport::new(&config.service.base_url, config.request_timeout())?;
        let auth = Arc::new(HttpAuthApi::new(transport.clone()));
        let session = SessionManager::new(store, auth);
        let gateway = RequestGateway::new(transport, session.clone());
        let orchestrator = PredictionOrchestrator::new(
            HttpStudentDirectory::new(gateway.clone()),
            HttpScoringService::new(gateway.clone()),
        )
        .with_max_concurrent_persists(config.batch.max_concurrent_persists);

        tracing::info!(
            base_url = %config.service.base_url,
            timeout_seconds = config.service.timeout_seconds,
            max_concurrent_persists = config.batch.max_concurrent_persists,
            "admin console initialised"
        );

        Ok(Self {
            config,
            session,
            gateway,
            orchestrator,
        })
    }

    /// Installs the global tracing subscriber described by `[logging]`. Call once.
    pub fn init_logging(config: &ConsoleConfig) {
        if config.logging.json {
            logger::init_json_logger(&config.logging.level);
        } else {
            logger::init_logger(&config.logging.level);
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn gateway(&self) -> &RequestGateway {
        &self.gateway
    }

    pub fn orchestrator(&self) -> &HttpOrchestrator {
        &self.orchestrator
    }
}
