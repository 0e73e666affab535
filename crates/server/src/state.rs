use std::sync::Arc;
use vidrelay_core::{AllowList, Config, SanitizedConfig, SubmissionService};

/// Shared application state
pub struct AppState {
    config: Config,
    service: Arc<dyn SubmissionService>,
    allow_list: AllowList,
}

impl AppState {
    /// State with an in-memory allow list seeded from the config.
    pub fn new(config: Config, service: Arc<dyn SubmissionService>) -> Self {
        let allow_list = AllowList::new(config.access.allowed_submitters.iter().cloned());
        Self::with_allow_list(config, service, allow_list)
    }

    pub fn with_allow_list(
        config: Config,
        service: Arc<dyn SubmissionService>,
        allow_list: AllowList,
    ) -> Self {
        Self {
            config,
            service,
            allow_list,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Key guarding the allow list endpoints, if management is enabled.
    pub fn admin_api_key(&self) -> Option<&str> {
        self.config.access.admin_api_key.as_deref()
    }

    pub fn service(&self) -> &dyn SubmissionService {
        self.service.as_ref()
    }
}
