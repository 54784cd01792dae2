//! Shared state handed to the router and the admission middleware.

use std::sync::Arc;

use super::client::ClientResolver;
use crate::admission::{AdmissionController, Clock, SystemClock};
use crate::config::AdmissionConfig;

/// App's shared state.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<AdmissionController>,
    pub clock: Arc<dyn Clock>,
    pub resolver: ClientResolver,
}

impl AppState {
    pub fn new(
        controller: Arc<AdmissionController>,
        clock: Arc<dyn Clock>,
        resolver: ClientResolver,
    ) -> Self {
        Self {
            controller,
            clock,
            resolver,
        }
    }

    /// State for a controller using the system clock and the resolver
    /// settings from `config`.
    pub fn from_config(controller: Arc<AdmissionController>, config: &AdmissionConfig) -> Self {
        Self::new(
            controller,
            Arc::new(SystemClock),
            ClientResolver::new(config.trust_forwarded_for, config.unknown_client_id.clone()),
        )
    }
}
