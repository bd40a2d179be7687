//! Group containers, gates and user-input tasks

use serde_json::json;
use tracing::info;

use crate::app::context::RunContext;
use crate::errors::ForgeError;
use crate::variables::{self, DeclareOptions, VariableKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Sequential,
    Parallel,
}

impl GroupKind {
    fn type_name(&self) -> &'static str {
        match self {
            GroupKind::Sequential => "xlrelease.SequentialGroup",
            GroupKind::Parallel => "xlrelease.ParallelGroup",
        }
    }
}

/// Create a grouping container under a parent
pub async fn create_group(
    ctx: &RunContext,
    parent_id: &str,
    kind: GroupKind,
    title: &str,
    precondition: Option<&str>,
) -> Result<String, ForgeError> {
    let body = json!({
        "id": "null",
        "type": kind.type_name(),
        "title": title,
        "status": "PLANNED",
        "precondition": precondition,
    });
    ctx.api.create_task(parent_id, &body).await
}

/// Create a grouping container once per dedup key; later calls for the same
/// key return the stored container id
pub async fn create_group_once(
    ctx: &mut RunContext,
    parent_id: &str,
    kind: GroupKind,
    title: &str,
    dedup_key: &str,
) -> Result<String, ForgeError> {
    if let Some(id) = ctx.registry.lookup(dedup_key) {
        return Ok(id.to_string());
    }
    let id = create_group(ctx, parent_id, kind, title, None).await?;
    ctx.registry.register(dedup_key, &id);
    info!("Add group : '{}'", title);
    Ok(id)
}

/// Create a manual gate, optionally carrying a checkbox condition
pub async fn create_gate(
    ctx: &RunContext,
    parent_id: &str,
    phase: &str,
    title: &str,
    condition: Option<&str>,
) -> Result<String, ForgeError> {
    let body = json!({
        "id": "null",
        "type": "xlrelease.GateTask",
        "title": title,
        "description": "",
    });
    let id = ctx.api.create_task(parent_id, &body).await?;
    if let Some(cond_title) = condition {
        ctx.api.create_condition(&id, cond_title).await?;
    }
    info!("ON PHASE : {} --- Add task : 'GATE' : {}", phase, title);
    Ok(id)
}

/// Declare the `<phase>_username_<category>` / `<phase>_password_<category>`
/// pair and bind both to a user-input task. Emitted once per phase and
/// category; later calls are no-ops.
pub async fn add_user_input(
    ctx: &mut RunContext,
    parent_id: &str,
    phase: &str,
    category: &str,
) -> Result<(), ForgeError> {
    let dedup_key = format!("input_{}_{}", phase, category);
    if ctx.registry.contains(&dedup_key) {
        return Ok(());
    }

    let username_key = format!("{}_username_{}", phase, category);
    let password_key = format!("{}_password_{}", phase, category);

    variables::declare(
        ctx,
        &username_key,
        VariableKind::String,
        DeclareOptions {
            label: username_key.clone(),
            ..Default::default()
        },
    )
    .await?;
    variables::declare(
        ctx,
        &password_key,
        VariableKind::Password,
        DeclareOptions {
            label: password_key.clone(),
            ..Default::default()
        },
    )
    .await?;

    let mut bound = Vec::new();
    for key in [&username_key, &password_key] {
        if let Some(id) = ctx.registry.lookup(&format!("var_{}", key)) {
            if id != "existing" {
                bound.push(id.to_string());
            }
        }
    }

    let body = json!({
        "id": "null",
        "type": "xlrelease.UserInputTask",
        "title": format!("Please enter user password for {} on {}", category, phase),
        "status": "PLANNED",
        "variables": bound,
    });
    let task_id = ctx.api.create_task(parent_id, &body).await?;

    ctx.registry.register(&dedup_key, &task_id);
    ctx.registry
        .register_phase_task(phase, &username_key, &task_id);
    info!(
        "ON PHASE : {} --- Add task : 'user_input - {}'",
        phase, category
    );
    Ok(())
}
