//! Phase/grouping planner
//!
//! Walks each phase's declarative task list in order and dispatches to the
//! task emitters, maintaining run-scoped dedup state in the identifier
//! registry for shared containers. Change-managed phases get a companion
//! change phase and per-step close mirroring.

use serde_json::json;
use tracing::info;

use crate::app::context::RunContext;
use crate::config::{ControlmGroup, PackageDef, ScriptSpec, TaskEntry};
use crate::errors::ForgeError;
use crate::tasks::technical::Hook;
use crate::tasks::{controlm, deploy, groups, jenkins, notify, script, sun, technical};
use crate::variables::{self, DeclareOptions, VariableKind};

/// Explicit planner state, threaded through one phase walk
#[derive(Debug)]
pub struct PlanState {
    /// Display-order counter for mirrored change tasks
    pub sun_step: u32,

    pub auto_undeploy_done: bool,

    pub after_hook_done: bool,
}

impl Default for PlanState {
    fn default() -> Self {
        Self {
            sun_step: 10,
            auto_undeploy_done: false,
            after_hook_done: false,
        }
    }
}

/// Build every requested phase, in declared order
pub async fn build_phases(ctx: &mut RunContext) -> Result<(), ForgeError> {
    let phases = ctx.config.general.phases.clone();
    for phase in phases {
        build_phase(ctx, &phase).await?;
    }
    Ok(())
}

/// Create one phase container in the template
pub async fn create_phase_container(
    ctx: &mut RunContext,
    title: &str,
) -> Result<String, ForgeError> {
    let body = json!({
        "id": null,
        "type": "xlrelease.Phase",
        "title": title,
        "flagStatus": "OK",
    });
    let template_id = ctx.template_id.clone();
    let id = ctx.api.create_phase(&template_id, &body).await?;
    ctx.registry.register_phase(title, &id);
    info!("CREATE PHASE : {}", title);
    Ok(id)
}

/// Build one phase end to end. Unmanaged phases are framed by two manual
/// gates; change-managed phases get the companion phase, the validation
/// gates of the change lifecycle and the assignee resolution before any
/// work task runs.
pub async fn build_phase(ctx: &mut RunContext, phase: &str) -> Result<(), ForgeError> {
    let mut state = PlanState::default();

    if !ctx.config.is_change_managed(phase) {
        let phase_id = create_phase_container(ctx, phase).await?;
        groups::create_gate(
            ctx,
            &phase_id,
            phase,
            "Validation_release_template",
            Some("Validation_release_template OK"),
        )
        .await?;
        plan_phase(ctx, phase, &mut state).await?;
        groups::create_gate(
            ctx,
            &phase_id,
            phase,
            &format!("DEV team: Validate installation in {}", phase),
            Some(&format!("DEV team: Validate the delivery in {}", phase)),
        )
        .await?;
        return Ok(());
    }

    build_change_phase(ctx, phase).await?;

    let phase_id = create_phase_container(ctx, phase).await?;
    groups::create_gate(
        ctx,
        &phase_id,
        phase,
        &format!("OPS TASK : Validation of the SNOW ${{{}.sun.id}}", phase),
        Some(&format!(
            "change put in state deploiement ${{{}.sun.id}}",
            phase
        )),
    )
    .await?;

    // BENCH changes pass through Scheduled on the way to Implement
    if phase == "BENCH" {
        sun::update_change_state(ctx, phase, sun::ChangeState::Scheduled).await?;
    }
    sun::update_change_state(ctx, phase, sun::ChangeState::Implement).await?;
    sun::search_change_assignee(ctx, phase).await?;
    sun::resolve_change_assignee_email(ctx, phase).await?;

    plan_phase(ctx, phase, &mut state).await?;
    technical::emit_hook(ctx, phase, Hook::AfterDeployment, &mut state.sun_step).await?;

    if ctx.config.notifications.close_release.is_some() {
        notify::close_release_reminder(ctx, &phase_id, phase).await?;
    }
    if phase != "BENCH" {
        groups::create_gate(
            ctx,
            &phase_id,
            phase,
            &format!("DEV team: Validate installation in {}", phase),
            Some(&format!("DEV team: Validate the delivery in {}", phase)),
        )
        .await?;
    }
    if ctx.config.notifications.end_release.is_some() {
        notify::end_release_notice(ctx, &phase_id, phase).await?;
    }
    sun::close_change(ctx, phase).await?;
    Ok(())
}

/// Companion phase creating the change record and waiting for approval
async fn build_change_phase(ctx: &mut RunContext, phase: &str) -> Result<(), ForgeError> {
    let name = sun::change_phase_name(phase);
    let phase_id = create_phase_container(ctx, &name).await?;

    variables::declare(
        ctx,
        "Release_Email_resquester",
        VariableKind::String,
        DeclareOptions {
            description: "Email of the release requester".to_string(),
            ..Default::default()
        },
    )
    .await?;
    for key in [format!("{}.sun.id", phase), format!("{}.sun.url", phase)] {
        variables::declare(ctx, &key, VariableKind::String, DeclareOptions::default()).await?;
    }

    sun::add_date_input(ctx, &phase_id, phase).await?;
    sun::create_change(ctx, &phase_id, phase).await?;
    groups::create_gate(
        ctx,
        &phase_id,
        phase,
        &format!("Validation creation SNOW ${{{}.sun.id}}", phase),
        None,
    )
    .await?;

    // Pre-approved standard changes go straight to Scheduled, production
    // only; everywhere else the change waits for its initial approval
    if ctx.config.general.standard_change_model.is_some() && phase == "PRODUCTION" {
        sun::update_change_state(ctx, phase, sun::ChangeState::Scheduled).await?;
    } else {
        sun::update_change_state(ctx, phase, sun::ChangeState::InitialValidation).await?;
        sun::wait_initial_approval(ctx, phase).await?;
    }
    Ok(())
}

/// Walk one phase task list in order
pub async fn plan_phase(
    ctx: &mut RunContext,
    phase: &str,
    state: &mut PlanState,
) -> Result<(), ForgeError> {
    let tasks: Vec<TaskEntry> = ctx.config.phase_tasks(phase).to_vec();
    let last_deploy = tasks.iter().rposition(|t| t.is_deploy());

    technical::emit_hook(ctx, phase, Hook::BeforeDeployment, &mut state.sun_step).await?;

    // No deploy entries at all: the after hook fires up front
    if last_deploy.is_none() {
        technical::emit_hook(ctx, phase, Hook::AfterXldeploy, &mut state.sun_step).await?;
        state.after_hook_done = true;
    }

    for (index, entry) in tasks.iter().enumerate() {
        match entry {
            TaskEntry::Xldeploy(names) => {
                plan_deploy_entry(ctx, phase, names, state).await?;
                if Some(index) == last_deploy {
                    technical::emit_hook(ctx, phase, Hook::AfterXldeploy, &mut state.sun_step)
                        .await?;
                    state.after_hook_done = true;
                }
            }
            TaskEntry::Controlm(group) => plan_controlm_entry(ctx, phase, group, state).await?,
            TaskEntry::ControlmResource(resource) => {
                let phase_id = ctx.phase_id(phase)?;
                groups::add_user_input(ctx, &phase_id, phase, "controlm").await?;
                let resource = resource.clone();
                controlm::set_resource(ctx, &phase_id, phase, &resource).await?;
            }
            TaskEntry::LaunchScriptWindows(spec) => {
                plan_script_entry(ctx, phase, spec, "script_windows", state).await?;
            }
            TaskEntry::LaunchScriptLinux(spec) => {
                plan_script_entry(ctx, phase, spec, "script_linux", state).await?;
            }
            TaskEntry::Jenkins(names) => plan_jenkins_entry(ctx, phase, names).await?,
        }
    }
    Ok(())
}

fn ops_group(ctx: &RunContext) -> String {
    ctx.config
        .general
        .change_assignment_group
        .clone()
        .unwrap_or_default()
}

async fn plan_deploy_entry(
    ctx: &mut RunContext,
    phase: &str,
    names: &[String],
    state: &mut PlanState,
) -> Result<(), ForgeError> {
    let phase_id = ctx.phase_id(phase)?;
    groups::add_user_input(ctx, &phase_id, phase, "xldeploy").await?;
    technical::emit_hook(ctx, phase, Hook::BeforeXldeploy, &mut state.sun_step).await?;

    let packages: Vec<PackageDef> = names
        .iter()
        .filter_map(|n| ctx.config.package(n).cloned())
        .collect();
    let option_latest = ctx.config.general.option_latest;
    let change_managed = ctx.config.is_change_managed(phase);

    for package in &packages {
        if package.build_name.is_none() {
            let key = format!("{}_version", package.name);
            variables::declare(
                ctx,
                &key,
                VariableKind::String,
                DeclareOptions {
                    label: key.clone(),
                    requires_value: !option_latest,
                    show_on_release_start: !option_latest,
                    ..Default::default()
                },
            )
            .await?;
        }
    }

    // Dependent applications come down first, in parallel, ahead of any
    // deploy or version-check task
    if !state.auto_undeploy_done {
        let dependents: Vec<PackageDef> = packages
            .iter()
            .flat_map(|p| p.auto_undeploy.iter())
            .filter_map(|n| ctx.config.package(n).cloned())
            .collect();
        if !dependents.is_empty() {
            let group_id = groups::create_group(
                ctx,
                &phase_id,
                groups::GroupKind::Parallel,
                &format!("Undeploy before deploy {}", phase),
                None,
            )
            .await?;
            for dependent in &dependents {
                deploy::undeploy(ctx, &group_id, phase, dependent).await?;
            }
        }
        state.auto_undeploy_done = true;
    }

    let checks: Vec<PackageDef> = packages
        .iter()
        .filter(|p| p.check_version_exists)
        .cloned()
        .collect();
    if !checks.is_empty() {
        let group_id = groups::create_group_once(
            ctx,
            &phase_id,
            groups::GroupKind::Parallel,
            "Check XLD packages",
            &format!("grp_xld_check_{}", phase),
        )
        .await?;
        for package in &checks {
            let key = format!("check_xld_{}", package.name);
            variables::declare(ctx, &key, VariableKind::Boolean, DeclareOptions::default())
                .await?;
            deploy::check_version_exists(ctx, &group_id, phase, package).await?;
        }
    }

    if option_latest {
        let group_id = groups::create_group_once(
            ctx,
            &phase_id,
            groups::GroupKind::Parallel,
            "XLD Search latest versions",
            &format!("grp_xld_latest_{}", phase),
        )
        .await?;
        for package in &packages {
            if package.build_name.is_none() {
                deploy::latest_version_lookup(ctx, &group_id, phase, package).await?;
            }
        }
    }

    let group_id = groups::create_group_once(
        ctx,
        &phase_id,
        groups::GroupKind::Sequential,
        "XLD DEPLOY",
        &format!("grp_xld_{}", phase),
    )
    .await?;
    for package in &packages {
        let task_id = deploy::deploy(ctx, &group_id, phase, package).await?;
        ctx.registry
            .register_phase_task(phase, &format!("xldeploy_{}", package.name), &task_id);

        if change_managed {
            let title = format!("XLD-Deploy {}", package.name);
            let mirror_key = sun::mirror_variable("xldeploy", &package.name, phase);
            variables::declare(
                ctx,
                &mirror_key,
                VariableKind::String,
                DeclareOptions::default(),
            )
            .await?;
            let group = ops_group(ctx);
            sun::add_deployment_task(ctx, phase, &title, &mirror_key, state.sun_step, &group)
                .await?;
            state.sun_step += 10;
            sun::close_task(ctx, &group_id, phase, &title, &mirror_key).await?;
        }
    }
    Ok(())
}

async fn plan_controlm_entry(
    ctx: &mut RunContext,
    phase: &str,
    group: &ControlmGroup,
    state: &mut PlanState,
) -> Result<(), ForgeError> {
    let group = group.clone();
    let phase_id = ctx.phase_id(phase)?;
    groups::add_user_input(ctx, &phase_id, phase, "controlm").await?;

    let date_guard = format!("controlm_date_{}", phase);
    if !ctx.registry.contains(&date_guard) {
        variables::declare(
            ctx,
            "controlm_today",
            VariableKind::String,
            DeclareOptions::default(),
        )
        .await?;
        let task_id = controlm::date_variable_script(ctx, &phase_id, phase).await?;
        ctx.registry.register(&date_guard, &task_id);
    }

    let umbrella_id = groups::create_group_once(
        ctx,
        &phase_id,
        groups::GroupKind::Sequential,
        &format!("CONTROLM : {}", group.group),
        &format!("grp_controlm_{}_{}", group.group, phase),
    )
    .await?;

    let change_managed = ctx.config.is_change_managed(phase);
    for folder in &group.folders {
        let folder_key = crate::envmap::folder_variable_key(&folder.name);
        variables::declare(
            ctx,
            &format!("id_{}", folder_key),
            VariableKind::String,
            DeclareOptions::default(),
        )
        .await?;

        controlm::order_folder(ctx, &umbrella_id, phase, folder).await?;
        if folder.hold && folder.free {
            controlm::edit_job(ctx, &umbrella_id, phase, &folder.name, controlm::EditAction::Free)
                .await?;
        }
        if folder.run_now {
            controlm::edit_job(
                ctx,
                &umbrella_id,
                phase,
                &folder.name,
                controlm::EditAction::RunNow,
            )
            .await?;
        }
        controlm::wait_job_status(ctx, &umbrella_id, phase, &folder.name, "Ended OK").await?;

        if change_managed {
            let title = format!("CONTROLM {} {}", group.group, folder.name);
            let mirror_key = sun::mirror_variable(
                "controlm",
                &format!("{}_{}", group.group, folder_key),
                phase,
            );
            variables::declare(
                ctx,
                &mirror_key,
                VariableKind::String,
                DeclareOptions::default(),
            )
            .await?;
            let assignment = ops_group(ctx);
            sun::add_deployment_task(ctx, phase, &title, &mirror_key, state.sun_step, &assignment)
                .await?;
            state.sun_step += 10;
            sun::close_task(ctx, &umbrella_id, phase, &title, &mirror_key).await?;
        }
    }
    Ok(())
}

async fn plan_script_entry(
    ctx: &mut RunContext,
    phase: &str,
    spec: &ScriptSpec,
    category: &str,
    state: &mut PlanState,
) -> Result<(), ForgeError> {
    let spec = spec.clone();
    let phase_id = ctx.phase_id(phase)?;
    groups::add_user_input(ctx, &phase_id, phase, category).await?;

    let umbrella_id = groups::create_group_once(
        ctx,
        &phase_id,
        groups::GroupKind::Sequential,
        &format!("SCRIPT {}", category),
        &format!("grp_{}_{}", category, phase),
    )
    .await?;

    let task_id = if category == "script_windows" {
        script::launch_script_windows(ctx, &umbrella_id, phase, &spec).await?
    } else {
        script::launch_script_linux(ctx, &umbrella_id, phase, &spec).await?
    };
    ctx.registry
        .register_phase_task(phase, &format!("{}_{}", category, spec.title), &task_id);

    if ctx.config.is_change_managed(phase) {
        let mirror_key = sun::mirror_variable(category, &spec.title.replace(' ', "_"), phase);
        variables::declare(
            ctx,
            &mirror_key,
            VariableKind::String,
            DeclareOptions::default(),
        )
        .await?;
        let assignment = ops_group(ctx);
        sun::add_deployment_task(ctx, phase, &spec.title, &mirror_key, state.sun_step, &assignment)
            .await?;
        state.sun_step += 10;
        sun::close_task(ctx, &umbrella_id, phase, &spec.title, &mirror_key).await?;
    }
    Ok(())
}

async fn plan_jenkins_entry(
    ctx: &mut RunContext,
    phase: &str,
    names: &[String],
) -> Result<(), ForgeError> {
    let phase_id = ctx.phase_id(phase)?;
    let group_id = groups::create_group_once(
        ctx,
        &phase_id,
        groups::GroupKind::Parallel,
        "Jenkins BUILD",
        &format!("grp_jenkins_{}", phase),
    )
    .await?;

    for name in names {
        let key = format!("{}_build_number", name);
        variables::declare(ctx, &key, VariableKind::String, DeclareOptions::default()).await?;
        let task_id = jenkins::build_job(ctx, &group_id, phase, name).await?;
        ctx.registry
            .register_phase_task(phase, &format!("jenkins_{}", name), &task_id);
    }
    Ok(())
}

/// Delete the default phase the engine seeds into a fresh template
pub async fn delete_default_phase(ctx: &mut RunContext) -> Result<(), ForgeError> {
    let template_id = ctx.template_id.clone();
    let phases = ctx
        .api
        .find_phases_by_title(&template_id, "New Phase")
        .await?;
    for phase in phases {
        ctx.api.delete_phase(&phase.id).await?;
        info!("DELETE default phase '{}'", phase.title);
    }
    Ok(())
}
