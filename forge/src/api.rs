//! Orchestration-engine API seam
//!
//! Every remote mutation goes through this trait, so the planners and
//! emitters can be exercised against a recording fake.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ForgeError;

/// Template search result
#[derive(Debug, Clone, serde::Deserialize)]
pub struct TemplateStub {
    pub id: String,
    pub title: String,
}

/// Phase search result
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PhaseStub {
    pub id: String,
    pub title: String,
}

/// Outcome of a create-variable call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableOutcome {
    Created(String),
    /// The remote reported a duplicate key; treated as success
    AlreadyExists,
}

/// REST surface of the orchestration engine used by this tool
#[async_trait]
pub trait OrchestratorApi: Send + Sync {
    /// Resolve a folder path to its remote id
    async fn find_folder(&self, path: &str) -> Result<String, ForgeError>;

    /// List templates matching a title
    async fn search_templates(&self, title: &str) -> Result<Vec<TemplateStub>, ForgeError>;

    async fn delete_template(&self, template_id: &str) -> Result<(), ForgeError>;

    /// Create a template in a folder, returning its remote id
    async fn create_template(&self, folder_id: &str, body: &Value) -> Result<String, ForgeError>;

    /// Create a phase under a template, returning its remote id
    async fn create_phase(&self, template_id: &str, body: &Value) -> Result<String, ForgeError>;

    /// Find phases of a template by title
    async fn find_phases_by_title(
        &self,
        template_id: &str,
        title: &str,
    ) -> Result<Vec<PhaseStub>, ForgeError>;

    async fn delete_phase(&self, phase_id: &str) -> Result<(), ForgeError>;

    /// Create a task/group/gate under a parent container
    async fn create_task(&self, parent_id: &str, body: &Value) -> Result<String, ForgeError>;

    /// Attach a checkbox condition to a gate task
    async fn create_condition(&self, task_id: &str, title: &str) -> Result<(), ForgeError>;

    /// Declare a template variable
    async fn create_variable(
        &self,
        template_id: &str,
        body: &Value,
    ) -> Result<VariableOutcome, ForgeError>;
}
