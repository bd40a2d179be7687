//! Shared test fixtures: a recording fake of the orchestration-engine API
//! and deployment-specification builders.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use relforge::api::{OrchestratorApi, PhaseStub, TemplateStub, VariableOutcome};
use relforge::app::context::RunContext;
use relforge::config::ReleaseConfig;
use relforge::errors::ForgeError;

/// One recorded create-task call
#[derive(Debug, Clone)]
pub struct Emission {
    pub kind: String,
    pub parent: String,
    pub title: String,
    pub body: Value,
}

/// In-memory fake recording every mutation in call order
#[derive(Default)]
pub struct RecordingApi {
    counter: Mutex<u64>,
    pub tasks: Mutex<Vec<Emission>>,
    pub variables: Mutex<Vec<Value>>,
    pub phases: Mutex<Vec<(String, String)>>,
    /// Variable keys the fake reports as already declared remotely
    pub duplicate_keys: Mutex<Vec<String>>,
}

impl RecordingApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        format!("{}-{}", prefix, counter)
    }

    pub fn tasks_snapshot(&self) -> Vec<Emission> {
        self.tasks.lock().unwrap().clone()
    }

    pub fn tasks_titled(&self, title: &str) -> Vec<Emission> {
        self.tasks_snapshot()
            .into_iter()
            .filter(|t| t.title == title)
            .collect()
    }

    pub fn count_kind(&self, kind: &str) -> usize {
        self.tasks_snapshot()
            .iter()
            .filter(|t| t.kind == kind)
            .count()
    }

    /// Position of the first task with this title in emission order
    pub fn position_of(&self, title: &str) -> Option<usize> {
        self.tasks_snapshot().iter().position(|t| t.title == title)
    }

    pub fn variable_keys(&self) -> Vec<String> {
        self.variables
            .lock()
            .unwrap()
            .iter()
            .filter_map(|v| v.get("key").and_then(|k| k.as_str()).map(String::from))
            .collect()
    }

    pub fn variable_body(&self, key: &str) -> Option<Value> {
        self.variables
            .lock()
            .unwrap()
            .iter()
            .find(|v| v.get("key").and_then(|k| k.as_str()) == Some(key))
            .cloned()
    }

    pub fn phase_titles(&self) -> Vec<String> {
        self.phases
            .lock()
            .unwrap()
            .iter()
            .map(|(_, title)| title.clone())
            .collect()
    }
}

#[async_trait]
impl OrchestratorApi for RecordingApi {
    async fn find_folder(&self, _path: &str) -> Result<String, ForgeError> {
        Ok("folder-1".to_string())
    }

    async fn search_templates(&self, _title: &str) -> Result<Vec<TemplateStub>, ForgeError> {
        Ok(Vec::new())
    }

    async fn delete_template(&self, _template_id: &str) -> Result<(), ForgeError> {
        Ok(())
    }

    async fn create_template(&self, _folder_id: &str, _body: &Value) -> Result<String, ForgeError> {
        Ok(self.next_id("template"))
    }

    async fn create_phase(&self, _template_id: &str, body: &Value) -> Result<String, ForgeError> {
        let id = self.next_id("phase");
        let title = body
            .get("title")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();
        self.phases.lock().unwrap().push((id.clone(), title));
        Ok(id)
    }

    async fn find_phases_by_title(
        &self,
        _template_id: &str,
        title: &str,
    ) -> Result<Vec<PhaseStub>, ForgeError> {
        Ok(self
            .phases
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, t)| t == title)
            .map(|(id, t)| PhaseStub {
                id: id.clone(),
                title: t.clone(),
            })
            .collect())
    }

    async fn delete_phase(&self, _phase_id: &str) -> Result<(), ForgeError> {
        Ok(())
    }

    async fn create_task(&self, parent_id: &str, body: &Value) -> Result<String, ForgeError> {
        let id = self.next_id("task");
        self.tasks.lock().unwrap().push(Emission {
            kind: body
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_string(),
            parent: parent_id.to_string(),
            title: body
                .get("title")
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_string(),
            body: body.clone(),
        });
        Ok(id)
    }

    async fn create_condition(&self, _task_id: &str, _title: &str) -> Result<(), ForgeError> {
        Ok(())
    }

    async fn create_variable(
        &self,
        _template_id: &str,
        body: &Value,
    ) -> Result<VariableOutcome, ForgeError> {
        let key = body
            .get("key")
            .and_then(|k| k.as_str())
            .unwrap_or_default()
            .to_string();
        if self.duplicate_keys.lock().unwrap().contains(&key) {
            return Ok(VariableOutcome::AlreadyExists);
        }
        self.variables.lock().unwrap().push(body.clone());
        Ok(VariableOutcome::Created(self.next_id("var")))
    }
}

pub fn config_from_yaml(yaml: &str) -> ReleaseConfig {
    serde_yaml::from_str(yaml).unwrap()
}

/// Fresh context over a recording fake, template id preset
pub fn context_from_yaml(yaml: &str) -> (Arc<RecordingApi>, RunContext) {
    let api = RecordingApi::new();
    let config = config_from_yaml(yaml);
    let mut ctx = RunContext::new(api.clone(), config);
    ctx.template_id = "template-0".to_string();
    (api, ctx)
}

/// Minimal single-phase specification, extended per test
pub const BASE_YAML: &str = r#"
general:
  template_name: "DEMO release"
  folder: "Applications/Folder/DEMO"
  iua: "NXDEMO"
  phases: [DEV]
auth:
  username: ops
  password: s3cret
orchestrator:
  base_url: "https://xlr.example.net"
packages:
  - name: app
    application_path: "Applications/DEMO/app/"
    environment_path: "Environments/DEMO/<ENV>/<XLD_env>"
phases:
  DEV:
    - xldeploy: [app]
"#;
