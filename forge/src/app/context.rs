//! Run context
//!
//! Single shared context passed into the capability modules: the remote API
//! handle, the loaded configuration, and the identifier registry. Replaces
//! cross-cutting inheritance with plain arguments.

use std::sync::Arc;

use crate::api::OrchestratorApi;
use crate::config::ReleaseConfig;
use crate::errors::ForgeError;
use crate::registry::IdRegistry;

pub struct RunContext {
    pub api: Arc<dyn OrchestratorApi>,
    pub config: ReleaseConfig,
    pub registry: IdRegistry,

    /// Remote id of the template under construction; set by the driver
    /// right after template creation
    pub template_id: String,
}

impl RunContext {
    pub fn new(api: Arc<dyn OrchestratorApi>, config: ReleaseConfig) -> Self {
        Self {
            api,
            config,
            registry: IdRegistry::new(),
            template_id: String::new(),
        }
    }

    /// Remote id of a phase created this run
    pub fn phase_id(&self, phase: &str) -> Result<String, ForgeError> {
        self.registry
            .phase_id(phase)
            .map(|s| s.to_string())
            .ok_or_else(|| ForgeError::PhaseError(format!("phase '{}' was never created", phase)))
    }
}
