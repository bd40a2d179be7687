//! Variable synthesizer
//!
//! Decides, per configuration key, what kind of named parameter to declare
//! in the template and whether it is user-visible at release start. All
//! declares are idempotent against the identifier registry, and a remote
//! duplicate-key rejection is treated as success.

use serde_json::json;
use tracing::info;

use crate::api::VariableOutcome;
use crate::app::context::RunContext;
use crate::envmap;
use crate::errors::ForgeError;
use crate::config::PhaseMode;

/// Placeholder written to logs in place of secret values
pub const SECRET_PLACEHOLDER: &str = "secret";

/// Variable kinds the synthesizer can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    String,
    Password,
    Boolean,
    Date,
    StringList,
    MapStringString,
}

impl VariableKind {
    fn type_name(&self) -> &'static str {
        match self {
            VariableKind::String => "xlrelease.StringVariable",
            VariableKind::Password => "xlrelease.PasswordStringVariable",
            VariableKind::Boolean => "xlrelease.BooleanVariable",
            VariableKind::Date => "xlrelease.DateVariable",
            VariableKind::StringList => "xlrelease.ListStringVariable",
            VariableKind::MapStringString => "xlrelease.MapStringStringVariable",
        }
    }
}

/// Declare options; defaults match a hidden, optional string variable
#[derive(Debug, Clone)]
pub struct DeclareOptions {
    pub label: String,
    pub description: String,
    pub value: serde_json::Value,
    pub requires_value: bool,
    pub show_on_release_start: bool,
    pub multiline: bool,
}

impl Default for DeclareOptions {
    fn default() -> Self {
        Self {
            label: String::new(),
            description: String::new(),
            value: json!(""),
            requires_value: false,
            show_on_release_start: false,
            multiline: false,
        }
    }
}

/// Keys carrying secrets are always masked, whatever kind was requested
pub fn is_secret_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    lower.contains("password") || lower.contains("token")
}

/// Value as it may appear in log output
pub fn display_value(key: &str, value: &serde_json::Value) -> String {
    if is_secret_key(key) {
        SECRET_PLACEHOLDER.to_string()
    } else {
        match value.as_str() {
            Some(s) => s.to_string(),
            None => value.to_string(),
        }
    }
}

fn registry_key(key: &str) -> String {
    format!("var_{}", key)
}

/// Declare one template variable. Skipped silently when the key was already
/// declared this run.
pub async fn declare(
    ctx: &mut RunContext,
    key: &str,
    kind: VariableKind,
    opts: DeclareOptions,
) -> Result<(), ForgeError> {
    let guard = registry_key(key);
    if ctx.registry.contains(&guard) {
        return Ok(());
    }

    let kind = if is_secret_key(key) {
        VariableKind::Password
    } else {
        kind
    };

    let body = json!({
        "id": null,
        "key": key,
        "type": kind.type_name(),
        "requiresValue": opts.requires_value,
        "showOnReleaseStart": opts.show_on_release_start,
        "value": opts.value.clone(),
        "label": opts.label,
        "description": opts.description,
        "multiline": opts.multiline,
    });

    let template_id = ctx.template_id.clone();
    match ctx.api.create_variable(&template_id, &body).await? {
        VariableOutcome::Created(id) => {
            ctx.registry.register(&guard, &id);
            info!(
                "CREATE VARIABLE : {} = {}",
                key,
                display_value(key, &opts.value)
            );
        }
        VariableOutcome::AlreadyExists => {
            ctx.registry.register(&guard, "existing");
            info!("VARIABLE {} already exists, kept", key);
        }
    }
    Ok(())
}

/// Declare a selection variable backed by a literal value list
pub async fn declare_listbox_static(
    ctx: &mut RunContext,
    key: &str,
    label: &str,
    values: &[String],
    show_on_release_start: bool,
) -> Result<(), ForgeError> {
    let guard = registry_key(key);
    if ctx.registry.contains(&guard) {
        return Ok(());
    }

    let body = json!({
        "key": key,
        "label": label,
        "type": "xlrelease.StringVariable",
        "requiresValue": false,
        "showOnReleaseStart": show_on_release_start,
        "valueProvider": {
            "id": "",
            "type": "xlrelease.ListOfStringValueProviderConfiguration",
            "values": values,
        },
    });

    register_outcome(ctx, key, &guard, &body).await
}

/// Declare a multi-select list variable backed by a literal value list
pub async fn declare_list_static(
    ctx: &mut RunContext,
    key: &str,
    values: &[String],
    show_on_release_start: bool,
) -> Result<(), ForgeError> {
    let guard = registry_key(key);
    if ctx.registry.contains(&guard) {
        return Ok(());
    }

    let body = json!({
        "key": key,
        "label": key,
        "type": "xlrelease.ListStringVariable",
        "requiresValue": false,
        "showOnReleaseStart": show_on_release_start,
        "valueProvider": {
            "id": "",
            "type": "xlrelease.ListOfStringValueProviderConfiguration",
            "values": values,
        },
    });

    register_outcome(ctx, key, &guard, &body).await
}

/// Declare a multi-select list variable whose allowed values come from
/// another variable at runtime
pub async fn declare_list_from_variable(
    ctx: &mut RunContext,
    key: &str,
    source_variable: &str,
    show_on_release_start: bool,
) -> Result<(), ForgeError> {
    let guard = registry_key(key);
    if ctx.registry.contains(&guard) {
        return Ok(());
    }

    let body = json!({
        "key": key,
        "label": key,
        "type": "xlrelease.ListStringVariable",
        "requiresValue": false,
        "showOnReleaseStart": show_on_release_start,
        "valueProvider": {
            "id": "",
            "type": "xlrelease.ListOfStringValueProviderConfiguration",
            "variableMapping": {
                "values": format!("${{{}}}", source_variable),
            },
        },
    });

    register_outcome(ctx, key, &guard, &body).await
}

async fn register_outcome(
    ctx: &mut RunContext,
    key: &str,
    guard: &str,
    body: &serde_json::Value,
) -> Result<(), ForgeError> {
    let template_id = ctx.template_id.clone();
    match ctx.api.create_variable(&template_id, body).await? {
        VariableOutcome::Created(id) => {
            ctx.registry.register(guard, &id);
            info!("CREATE VARIABLE : {} (list)", key);
        }
        VariableOutcome::AlreadyExists => {
            ctx.registry.register(guard, "existing");
            info!("VARIABLE {} already exists, kept", key);
        }
    }
    Ok(())
}

/// Synthesize environment-selection variables.
///
/// `one_list` mode declares a single Choice_ENV listbox shared by all
/// phases; `multi_list` mode declares one `env_<PHASE>` variable per phase,
/// a choice when the phase admits more than one candidate environment and a
/// fixed string otherwise. BENCH candidates are stored as "ENV;PREFIX"
/// pairs, only the ENV half is offered for selection.
pub async fn declare_environment_variables(ctx: &mut RunContext) -> Result<(), ForgeError> {
    let phases = ctx.config.general.phases.clone();

    if ctx.config.general.phase_mode == PhaseMode::OneList && phases.len() > 1 {
        let choices: Vec<String> = phases.clone();
        declare_listbox_static(ctx, "Choice_ENV", "Choice_ENV", &choices, true).await?;
    }

    for phase in phases {
        let candidates: Vec<String> = ctx.config.phase_environments(&phase).to_vec();
        if candidates.is_empty() {
            continue;
        }
        let key = format!("env_{}", phase);
        let display: Vec<String> = candidates
            .iter()
            .map(|c| envmap::split_env_entry(c).0.to_string())
            .collect();

        if display.len() > 1 {
            declare_listbox_static(ctx, &key, &phase, &display, true).await?;
        } else {
            let opts = DeclareOptions {
                label: phase.to_string(),
                value: json!(display[0].clone()),
                ..Default::default()
            };
            declare(ctx, &key, VariableKind::String, opts).await?;
        }
    }
    Ok(())
}

/// Seed the base variables every template carries
pub async fn seed_base_variables(ctx: &mut RunContext) -> Result<(), ForgeError> {
    let username = ctx.config.auth.username.clone();
    declare(
        ctx,
        "ops_username_api",
        VariableKind::String,
        DeclareOptions {
            value: json!(username),
            ..Default::default()
        },
    )
    .await?;
    declare(
        ctx,
        "ops_password_api",
        VariableKind::Password,
        DeclareOptions::default(),
    )
    .await?;
    declare(
        ctx,
        "email_owner_release",
        VariableKind::String,
        DeclareOptions {
            label: "email_owner_release".to_string(),
            requires_value: true,
            show_on_release_start: true,
            ..Default::default()
        },
    )
    .await?;
    let iua = ctx.config.general.iua.clone();
    declare(
        ctx,
        "IUA",
        VariableKind::String,
        DeclareOptions {
            value: json!(iua),
            ..Default::default()
        },
    )
    .await?;
    declare(
        ctx,
        "release_Variables_in_progress",
        VariableKind::MapStringString,
        DeclareOptions {
            value: release_progress_value(ctx),
            ..Default::default()
        },
    )
    .await?;

    let phases: Vec<String> = ctx.config.general.phases.clone();
    declare_list_static(ctx, "xlr_list_phase_selection", &phases, true).await?;

    // Package picker, consumed by the pruning scripts
    if ctx.config.packages.len() > 1
        || ctx.config.general.package_mode == crate::config::PackageMode::Listbox
    {
        let names: Vec<String> = ctx.config.packages.iter().map(|p| p.name.clone()).collect();
        declare_list_static(ctx, "xlr_list_package_selection", &names, true).await?;
    }

    declare_environment_variables(ctx).await?;

    // Per-phase scheduler folder maps, consumed by the pruning scripts
    if ctx.config.has_scheduler_folders() {
        let folder_maps: Vec<(String, serde_json::Value)> = ctx
            .config
            .general
            .phases
            .iter()
            .filter_map(|phase| {
                let folders = scheduler_folder_map(ctx, phase);
                if folders.as_object().map(|o| o.is_empty()).unwrap_or(true) {
                    None
                } else {
                    Some((format!("template_list_controlm_{}", phase), folders))
                }
            })
            .collect();
        for (key, value) in folder_maps {
            declare(
                ctx,
                &key,
                VariableKind::MapStringString,
                DeclareOptions {
                    value,
                    ..Default::default()
                },
            )
            .await?;
        }
    }

    Ok(())
}

/// Bookkeeping map recording what the template was generated from
fn release_progress_value(ctx: &RunContext) -> serde_json::Value {
    let packages: Vec<&str> = ctx.config.packages.iter().map(|p| p.name.as_str()).collect();
    json!({
        "template_name": ctx.config.general.template_name,
        "phases": ctx.config.general.phases.join(","),
        "packages": packages.join(","),
    })
}

/// Map "umbrella group" → "folder,folder,..." for one phase
fn scheduler_folder_map(ctx: &RunContext, phase: &str) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for entry in ctx.config.phase_tasks(phase) {
        if let crate::config::TaskEntry::Controlm(group) = entry {
            let folders: Vec<&str> = group.folders.iter().map(|f| f.name.as_str()).collect();
            map.insert(group.group.clone(), json!(folders.join(",")));
        }
    }
    serde_json::Value::Object(map)
}
