//! Technical/manual task emitters
//!
//! Manual OPS and DBA work items from the configuration catalogs, emitted at
//! one of three ordering hooks. Each hook is emitted at most once per phase;
//! on change-managed phases every work item is mirrored onto the change
//! record and gets a closing step.

use tracing::info;

use crate::app::context::RunContext;
use crate::config::{TechnicalKind, TechnicalTask};
use crate::errors::ForgeError;
use crate::tasks::{groups, sun};
use crate::variables::{self, DeclareOptions, VariableKind};

/// Ordering hooks for technical tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    BeforeDeployment,
    BeforeXldeploy,
    AfterXldeploy,
    AfterDeployment,
}

impl Hook {
    pub fn key(&self) -> &'static str {
        match self {
            Hook::BeforeDeployment => "before_deployment",
            Hook::BeforeXldeploy => "before_xldeploy",
            Hook::AfterXldeploy => "after_xldeploy",
            Hook::AfterDeployment => "after_deployment",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Hook::BeforeDeployment => "before deployment",
            Hook::BeforeXldeploy => "before deploy",
            Hook::AfterXldeploy => "after deploy",
            Hook::AfterDeployment => "after deployment",
        }
    }

    fn catalog<'a>(&self, ctx: &'a RunContext) -> &'a [TechnicalTask] {
        let tasks = &ctx.config.technical_tasks;
        match self {
            Hook::BeforeDeployment => &tasks.before_deployment,
            Hook::BeforeXldeploy => &tasks.before_xldeploy,
            Hook::AfterXldeploy => &tasks.after_xldeploy,
            Hook::AfterDeployment => &tasks.after_deployment,
        }
    }
}

fn kind_label(kind: TechnicalKind) -> &'static str {
    match kind {
        TechnicalKind::Ops => "OPS",
        TechnicalKind::DbaFactor => "DBA FACTOR",
        TechnicalKind::DbaOther => "DBA OTHER",
    }
}

fn assignment_group(ctx: &RunContext, kind: TechnicalKind) -> String {
    let general = &ctx.config.general;
    let ops = general.change_assignment_group.clone().unwrap_or_default();
    match kind {
        TechnicalKind::Ops => ops,
        TechnicalKind::DbaFactor | TechnicalKind::DbaOther => {
            general.change_dba_group.clone().unwrap_or(ops)
        }
    }
}

/// Emit the technical tasks of one hook into a phase. A no-op when the hook
/// was already emitted for this phase or its catalog is empty.
pub async fn emit_hook(
    ctx: &mut RunContext,
    phase: &str,
    hook: Hook,
    sun_step: &mut u32,
) -> Result<(), ForgeError> {
    let dedup_key = format!("{}_done_{}", hook.key(), phase);
    if ctx.registry.contains(&dedup_key) {
        return Ok(());
    }
    let entries: Vec<TechnicalTask> = hook.catalog(ctx).to_vec();
    if entries.is_empty() {
        return Ok(());
    }

    let phase_id = ctx.phase_id(phase)?;
    let group_title = format!("Technical task {} {}", hook.label(), phase);
    let group_id = groups::create_group(
        ctx,
        &phase_id,
        groups::GroupKind::Sequential,
        &group_title,
        None,
    )
    .await?;
    ctx.registry.register(&dedup_key, &group_id);

    let change_managed = ctx.config.is_change_managed(phase);
    for (ordinal, entry) in entries.iter().enumerate() {
        let n = ordinal + 1;
        let title = format!(
            "Action {} {} {} : {}",
            kind_label(entry.kind),
            n,
            hook.label(),
            entry.title
        );
        let gate_id = groups::create_gate(ctx, &group_id, phase, &title, Some(&title)).await?;

        let item_key = format!("{}_{}_{}", hook.key(), n, phase);
        ctx.registry.register_phase_task(phase, &item_key, &gate_id);

        if change_managed {
            let mirror_key = sun::mirror_variable(hook.key(), &n.to_string(), phase);
            variables::declare(
                ctx,
                &mirror_key,
                VariableKind::String,
                DeclareOptions::default(),
            )
            .await?;
            let group = assignment_group(ctx, entry.kind);
            sun::add_deployment_task(ctx, phase, &title, &mirror_key, *sun_step, &group).await?;
            *sun_step += 10;
            sun::close_task(ctx, &group_id, phase, &title, &mirror_key).await?;
        }
    }

    info!(
        "ON PHASE : {} --- Technical tasks '{}' emitted ({})",
        phase,
        hook.label(),
        entries.len()
    );
    Ok(())
}
