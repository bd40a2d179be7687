//! Typed model of the YAML deployment specification

use std::collections::HashMap;

use secrecy::SecretString;
use serde::Deserialize;

/// Top-level deployment specification
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseConfig {
    pub general: GeneralInfo,
    pub auth: Credentials,
    pub orchestrator: OrchestratorOptions,

    /// Candidate environments per phase; BENCH entries may carry "ENV;PREFIX"
    #[serde(default)]
    pub environments: HashMap<String, Vec<String>>,

    #[serde(default)]
    pub packages: Vec<PackageDef>,

    #[serde(default)]
    pub controlm: ControlmOptions,

    #[serde(default)]
    pub jenkins: Option<JenkinsOptions>,

    /// Ordered, heterogeneous task list per phase
    #[serde(default)]
    pub phases: HashMap<String, Vec<TaskEntry>>,

    #[serde(default)]
    pub technical_tasks: TechnicalTasks,

    #[serde(default)]
    pub notifications: Notifications,
}

impl ReleaseConfig {
    /// Look up a declared package by name
    pub fn package(&self, name: &str) -> Option<&PackageDef> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Task list for a phase (empty when none declared)
    pub fn phase_tasks(&self, phase: &str) -> &[TaskEntry] {
        self.phases.get(phase).map(|t| t.as_slice()).unwrap_or(&[])
    }

    /// Candidate environments configured for a phase
    pub fn phase_environments(&self, phase: &str) -> &[String] {
        self.environments
            .get(phase)
            .map(|e| e.as_slice())
            .unwrap_or(&[])
    }

    /// Phases gated behind the change-management lifecycle
    pub fn is_change_managed(&self, phase: &str) -> bool {
        matches!(phase, "BENCH" | "PRODUCTION")
    }

    /// True when any phase task list orders scheduler folders
    pub fn has_scheduler_folders(&self) -> bool {
        self.phases
            .values()
            .flatten()
            .any(|t| matches!(t, TaskEntry::Controlm(_)))
    }

    pub fn has_technical_tasks(&self) -> bool {
        !self.technical_tasks.before_deployment.is_empty()
            || !self.technical_tasks.before_xldeploy.is_empty()
            || !self.technical_tasks.after_xldeploy.is_empty()
            || !self.technical_tasks.after_deployment.is_empty()
    }
}

/// General template metadata
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralInfo {
    pub template_name: String,

    /// Orchestration-engine folder path hosting the template
    pub folder: String,

    /// Application code used by the change-management system
    pub iua: String,

    /// Phases to build, in order
    pub phases: Vec<String>,

    #[serde(default)]
    pub phase_mode: PhaseMode,

    #[serde(default)]
    pub package_mode: PackageMode,

    /// Resolve package versions through a latest-version lookup task
    #[serde(default)]
    pub option_latest: bool,

    #[serde(default)]
    pub change_assignment_group: Option<String>,

    #[serde(default)]
    pub change_approver: Option<String>,

    /// Assignment group for DBA technical tasks; falls back to
    /// change_assignment_group
    #[serde(default)]
    pub change_dba_group: Option<String>,

    /// Set when changes follow a pre-approved standard model
    #[serde(default)]
    pub standard_change_model: Option<String>,

    #[serde(default)]
    pub short_description: Option<String>,
}

/// How the release-start form selects phases
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseMode {
    #[default]
    OneList,
    MultiList,
}

/// How the release-start form selects packages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageMode {
    #[default]
    #[serde(rename = "string")]
    Fixed,
    Listbox,
}

/// API credentials (basic auth)
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// Remote server references and endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorOptions {
    pub base_url: String,

    #[serde(default = "default_deploy_server_ref")]
    pub deploy_server_ref: String,

    #[serde(default = "default_scheduler_server_ref")]
    pub scheduler_server_ref: String,

    #[serde(default = "default_ctm_prod")]
    pub scheduler_ctm_prod: String,

    #[serde(default = "default_ctm_bench")]
    pub scheduler_ctm_bench: String,

    /// Direct scheduler webhook endpoint, used for resource adjustments
    #[serde(default)]
    pub scheduler_api_url: Option<String>,

    /// Change-system query endpoint, used to resolve the change assignee
    #[serde(default = "default_change_api_url")]
    pub change_api_url: String,

    #[serde(default = "default_change_server_ref")]
    pub change_server_ref: String,

    #[serde(default = "default_mail_server_ref")]
    pub mail_server_ref: String,

    #[serde(default)]
    pub from_address: Option<String>,
}

fn default_deploy_server_ref() -> String {
    "Configuration/Custom/XLDeploy PROD".to_string()
}
fn default_scheduler_server_ref() -> String {
    "Configuration/Custom/API_CONTROLM".to_string()
}
fn default_ctm_prod() -> String {
    "CTM_PROD".to_string()
}
fn default_ctm_bench() -> String {
    "CTM_BENCH".to_string()
}
fn default_change_server_ref() -> String {
    "Configuration/Custom/Sun Prod".to_string()
}
fn default_change_api_url() -> String {
    "https://itaas.api.intranatixis.com/support/sun/change/v1/getList".to_string()
}
fn default_mail_server_ref() -> String {
    "Configuration/Custom/Server Mail".to_string()
}

/// One deployable package definition
#[derive(Debug, Clone, Deserialize)]
pub struct PackageDef {
    pub name: String,

    /// Literal artifact name; omitted when versions are runtime-resolved
    #[serde(default)]
    pub build_name: Option<String>,

    /// Deployment-tool application path (artifact parent)
    pub application_path: String,

    /// Deployment-tool environment path pattern with substitution tokens
    pub environment_path: String,

    /// Packages to undeploy before this one is deployed
    #[serde(default)]
    pub auto_undeploy: Vec<String>,

    /// Emit a version-existence check task ahead of the deploy
    #[serde(default)]
    pub check_version_exists: bool,
}

/// Scheduler integration options
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControlmOptions {
    #[serde(default)]
    pub mode: ControlmMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlmMode {
    #[default]
    Plain,
    /// Folder pruning intersects against a master-package selection first
    Master,
}

/// Named scheduler resource and its capacity
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceSpec {
    pub name: String,
    pub max: u32,
}

/// Build-server integration options
#[derive(Debug, Clone, Deserialize)]
pub struct JenkinsOptions {
    pub server_ref: String,
    pub username: String,

    #[serde(default)]
    pub token: Option<SecretString>,

    /// Jobs keyed by package name
    #[serde(default)]
    pub jobs: HashMap<String, JenkinsJob>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JenkinsJob {
    pub job_name: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

fn default_branch() -> String {
    "master".to_string()
}

/// One entry of a phase task list, written in YAML as a single-key map
/// (`- xldeploy: [app]`)
#[derive(Debug, Clone)]
pub enum TaskEntry {
    /// Deploy the named packages
    Xldeploy(Vec<String>),

    /// Order/wait a group of scheduler folders under one umbrella
    Controlm(ControlmGroup),

    /// Adjust a scheduler resource capacity
    ControlmResource(ResourceSpec),

    LaunchScriptWindows(ScriptSpec),

    LaunchScriptLinux(ScriptSpec),

    /// Trigger builds for the named packages
    Jenkins(Vec<String>),
}

impl<'de> Deserialize<'de> for TaskEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "snake_case")]
        enum Tag {
            Xldeploy,
            Controlm,
            ControlmResource,
            LaunchScriptWindows,
            LaunchScriptLinux,
            Jenkins,
        }

        struct EntryVisitor;

        impl<'de> serde::de::Visitor<'de> for EntryVisitor {
            type Value = TaskEntry;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map with a single task key")
            }

            fn visit_map<M>(self, mut map: M) -> Result<TaskEntry, M::Error>
            where
                M: serde::de::MapAccess<'de>,
            {
                let tag: Tag = map
                    .next_key()?
                    .ok_or_else(|| serde::de::Error::custom("task entry is empty"))?;
                let entry = match tag {
                    Tag::Xldeploy => TaskEntry::Xldeploy(map.next_value()?),
                    Tag::Controlm => TaskEntry::Controlm(map.next_value()?),
                    Tag::ControlmResource => TaskEntry::ControlmResource(map.next_value()?),
                    Tag::LaunchScriptWindows => TaskEntry::LaunchScriptWindows(map.next_value()?),
                    Tag::LaunchScriptLinux => TaskEntry::LaunchScriptLinux(map.next_value()?),
                    Tag::Jenkins => TaskEntry::Jenkins(map.next_value()?),
                };
                if map.next_key::<serde::de::IgnoredAny>()?.is_some() {
                    return Err(serde::de::Error::custom(
                        "task entry must carry exactly one key",
                    ));
                }
                Ok(entry)
            }
        }

        deserializer.deserialize_map(EntryVisitor)
    }
}

impl TaskEntry {
    pub fn is_deploy(&self) -> bool {
        matches!(self, TaskEntry::Xldeploy(_))
    }
}

/// A named umbrella (STOP, START, ...) over scheduler folders
#[derive(Debug, Clone, Deserialize)]
pub struct ControlmGroup {
    pub group: String,
    pub folders: Vec<ControlmFolder>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlmFolder {
    pub name: String,

    /// Order the folder held; a FREE edit releases it afterwards
    #[serde(default)]
    pub hold: bool,

    #[serde(default)]
    pub free: bool,

    #[serde(default)]
    pub run_now: bool,

    #[serde(default)]
    pub ignore_criteria: bool,

    #[serde(default = "default_true")]
    pub append_job: bool,

    /// Package membership, consulted by the pruning scripts
    #[serde(default)]
    pub packages: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// A remote script execution request
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptSpec {
    pub title: String,
    pub script: String,
    pub target_host: String,

    #[serde(default = "default_temp_path")]
    pub remote_path: String,

    #[serde(default)]
    pub sudo_user: Option<String>,
}

fn default_temp_path() -> String {
    "/tmp".to_string()
}

/// Technical-task catalogs per ordering hook
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TechnicalTasks {
    #[serde(default)]
    pub before_deployment: Vec<TechnicalTask>,

    #[serde(default)]
    pub before_xldeploy: Vec<TechnicalTask>,

    #[serde(default)]
    pub after_xldeploy: Vec<TechnicalTask>,

    #[serde(default)]
    pub after_deployment: Vec<TechnicalTask>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TechnicalTask {
    pub kind: TechnicalKind,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechnicalKind {
    Ops,
    DbaFactor,
    DbaOther,
}

/// Notification recipients
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Notifications {
    #[serde(default)]
    pub close_release: Option<CloseNotification>,

    #[serde(default)]
    pub end_release: Option<EndNotification>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloseNotification {
    #[serde(default)]
    pub cc: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndNotification {
    pub to: Vec<String>,

    #[serde(default)]
    pub cc: Vec<String>,
}
