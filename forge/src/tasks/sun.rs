//! Change-management lifecycle task emitters
//!
//! Change-managed phases get a companion `CREATE_CHANGE_<phase>` phase that
//! creates the change record in draft, waits for approval, and carries one
//! mirrored deployment-task entry per work step. The deployment phase itself
//! transitions the change to Implement, closes each mirrored task as the
//! work completes, and finally closes the change.

use serde_json::json;
use tracing::info;

use crate::app::context::RunContext;
use crate::envmap;
use crate::errors::ForgeError;

/// Title of the companion phase hosting the change creation
pub fn change_phase_name(phase: &str) -> String {
    format!("CREATE_CHANGE_{}", phase)
}

/// Registry/variable key of a mirrored change task
pub fn mirror_variable(kind: &str, label: &str, phase: &str) -> String {
    format!("task_sun_{}_{}_{}", kind, label, phase)
}

/// Change lifecycle states this tool transitions through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeState {
    InitialValidation,
    Scheduled,
    Implement,
}

impl ChangeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeState::InitialValidation => "Initial validation",
            ChangeState::Scheduled => "Scheduled",
            ChangeState::Implement => "Implement",
        }
    }
}

/// Declare the start/end date pair and bind both to a user-input task, then
/// add the script formatting them for the change system
pub async fn add_date_input(
    ctx: &mut RunContext,
    parent_id: &str,
    phase: &str,
) -> Result<(), ForgeError> {
    use crate::variables::{declare, DeclareOptions, VariableKind};

    let start_key = format!("{}_sun_start_date", phase);
    let end_key = format!("{}_sun_end_date", phase);
    for key in [&start_key, &end_key] {
        declare(
            ctx,
            key,
            VariableKind::Date,
            DeclareOptions {
                label: key.clone(),
                value: json!(null),
                requires_value: true,
                show_on_release_start: true,
                ..Default::default()
            },
        )
        .await?;
    }

    // The formatted counterparts the change payload references
    for key in [
        format!("{}_sun_start_format", phase),
        format!("{}_sun_end_format", phase),
    ] {
        declare(ctx, &key, VariableKind::String, DeclareOptions::default()).await?;
    }

    let mut bound = Vec::new();
    for key in [&start_key, &end_key] {
        if let Some(id) = ctx.registry.lookup(&format!("var_{}", key)) {
            if id != "existing" {
                bound.push(id.to_string());
            }
        }
    }

    let body = json!({
        "id": "null",
        "type": "xlrelease.UserInputTask",
        "title": format!("Please enter change dates for {}", phase),
        "status": "PLANNED",
        "variables": bound,
    });
    ctx.api.create_task(parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : 'user_input - change dates'",
        change_phase_name(phase)
    );

    let script = format!(
        "import datetime\n\
         start = releaseVariables['{start}']\n\
         end = releaseVariables['{end}']\n\
         releaseVariables['{phase}_sun_start_format'] = start.strftime('%Y-%m-%d %H:%M:%S')\n\
         releaseVariables['{phase}_sun_end_format'] = end.strftime('%Y-%m-%d %H:%M:%S')\n",
        start = start_key,
        end = end_key,
        phase = phase,
    );
    let format_task = json!({
        "id": "null",
        "type": "xlrelease.ScriptTask",
        "locked": true,
        "title": format!("Format change dates for {}", phase),
        "script": script,
    });
    ctx.api.create_task(parent_id, &format_task).await?;
    Ok(())
}

/// Create the change record in draft state, binding its number and URL to
/// `${<phase>.sun.id}` / `${<phase>.sun.url}`
pub async fn create_change(
    ctx: &RunContext,
    parent_id: &str,
    phase: &str,
) -> Result<String, ForgeError> {
    let general = &ctx.config.general;
    let environment = envmap::change_environment_word(phase)?;
    let snow_type = if general.standard_change_model.is_some() {
        "Standard"
    } else {
        "Normal"
    };

    let body = json!({
        "id": null,
        "type": "xlrelease.CustomScriptTask",
        "title": format!("Creation Change SUN {}", phase),
        "owner": "${release.owner}",
        "status": "PLANNED",
        "variableMapping": {
            "pythonScript.changeRequestUrl": format!("${{{}.sun.url}}", phase),
            "pythonScript.changeRequestNumber": format!("${{{}.sun.id}}", phase),
        },
        "pythonScript": {
            "type": "servicenowNxs.CreateChangeRequest",
            "id": null,
            "servicenowNxsServer": ctx.config.orchestrator.change_server_ref,
            "iua": general.iua,
            "requestedBy": "${Release_Email_resquester}",
            "assignedTo": "",
            "assignmentgroup": general.change_assignment_group.as_deref().unwrap_or(""),
            "initialApprover": general.change_approver,
            "environment": environment,
            "snowType": snow_type,
            "modelNumber": general.standard_change_model.as_deref().unwrap_or(""),
            "startDate": format!("${{{}_sun_start_format}}", phase),
            "endDate": format!("${{{}_sun_end_format}}", phase),
            "shortDescription": general.short_description.as_deref().unwrap_or(""),
            "createInDraftState": true,
            "impact": "Without impact on the service rendered",
        },
    });
    let id = ctx.api.create_task(parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : 'Creation Change SUN {}'",
        change_phase_name(phase),
        phase
    );
    Ok(id)
}

/// Transition the change record to a new state. The emitting phase depends
/// on the state: early approval states live in the companion phase, the
/// implement transition lives in the deployment phase.
pub async fn update_change_state(
    ctx: &RunContext,
    phase: &str,
    state: ChangeState,
) -> Result<String, ForgeError> {
    // Initial validation lives in the companion phase; so does the Scheduled
    // transition of a pre-approved standard production change. Implement, and
    // the Scheduled step BENCH passes through on the way there, run inside
    // the deployment phase itself.
    let in_change_phase = match state {
        ChangeState::InitialValidation => true,
        ChangeState::Scheduled => {
            phase == "PRODUCTION" && ctx.config.general.standard_change_model.is_some()
        }
        ChangeState::Implement => false,
    };
    let parent_id = if in_change_phase {
        ctx.phase_id(&change_phase_name(phase))?
    } else {
        ctx.phase_id(phase)?
    };

    let body = json!({
        "id": null,
        "type": "xlrelease.CustomScriptTask",
        "title": format!("Put change ${{{}.sun.id}} in state {}", phase, state.as_str()),
        "owner": "${release.owner}",
        "dueSoonNotified": false,
        "status": "PLANNED",
        "locked": false,
        "pythonScript": {
            "type": "servicenowNxs.UpdateChangeState",
            "id": null,
            "servicenowNxsServer": ctx.config.orchestrator.change_server_ref,
            "changeNumber": format!("${{{}.sun.id}}", phase),
            "newState": state.as_str(),
            "comment": "in progress",
        },
    });
    let id = ctx.api.create_task(&parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : change state {}",
        phase,
        state.as_str()
    );
    Ok(id)
}

/// Poll the change system until the record passes initial approval
pub async fn wait_initial_approval(ctx: &RunContext, phase: &str) -> Result<String, ForgeError> {
    let parent_id = ctx.phase_id(&change_phase_name(phase))?;
    let body = json!({
        "id": null,
        "type": "xlrelease.CustomScriptTask",
        "title": format!("wait state SUN {} APPROVAL CHG: ${{{}.sun.id}}", phase, phase),
        "owner": "${release.owner}",
        "flagStatus": "OK",
        "dueSoonNotified": false,
        "waitForScheduledStartDate": true,
        "taskFailureHandlerEnabled": false,
        "failuresCount": 0,
        "variableMapping": {},
        "pythonScript": {
            "type": "servicenowNxs.WaitForInitialChangeApproval",
            "id": null,
            "servicenowNxsServer": ctx.config.orchestrator.change_server_ref,
            "changeNumber": format!("${{{}.sun.id}}", phase),
            "interval": 1,
        },
    });
    let id = ctx.api.create_task(&parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : wait initial change approval",
        change_phase_name(phase)
    );
    Ok(id)
}

/// Webhook pulling the change record to find who it is assigned to; the raw
/// payload lands in `${change_user_assign}` for the unpacking step
pub async fn search_change_assignee(
    ctx: &mut RunContext,
    phase: &str,
) -> Result<String, ForgeError> {
    use crate::variables::{declare, DeclareOptions, VariableKind};

    declare(
        ctx,
        "change_user_assign",
        VariableKind::String,
        DeclareOptions::default(),
    )
    .await?;

    let parent_id = ctx.phase_id(phase)?;
    let url = format!(
        "{}?query=number%3D${{{}.sun.id}}&offset=0",
        ctx.config.orchestrator.change_api_url, phase
    );
    let body = json!({
        "id": "null",
        "type": "xlrelease.CustomScriptTask",
        "title": "Search in SUN user assign to the change",
        "locked": true,
        "variableMapping": {
            "pythonScript.result": "${change_user_assign}",
        },
        "pythonScript": {
            "type": "webhook.JsonWebhook",
            "id": "null",
            "URL": url,
            "method": "GET",
            "username": "${ops_username_api}",
            "password": "${ops_password_api}",
            "jsonPathExpression": "Data",
        },
    });
    let id = ctx.api.create_task(&parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : 'Search in SUN user assign to the change'",
        phase
    );
    Ok(id)
}

/// Unpack the webhook payload into the assignee email that closes the
/// mirrored tasks, refreshing the owner email alongside
pub async fn resolve_change_assignee_email(
    ctx: &RunContext,
    phase: &str,
) -> Result<String, ForgeError> {
    let parent_id = ctx.phase_id(phase)?;
    let script = "import json\n\
        null = None\n\
        result = json.loads(releaseVariables['change_user_assign'])\n\
        releaseVariables['change_user_assign'] = result[0]['assigned_to.email']\n\
        releaseVariables['email_owner_release'] = userApi.getUser('${release.owner}').email\n";
    let body = json!({
        "id": "null",
        "type": "xlrelease.ScriptTask",
        "locked": true,
        "title": "Get email of the user assigned to the change",
        "script": script,
    });
    let id = ctx.api.create_task(&parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : 'Get email of the user assigned to the change'",
        phase
    );
    Ok(id)
}

/// Mirror one work step onto the change record as a deployment task,
/// ordered by an explicit step number; the created task number binds to the
/// mirror variable so the deployment phase can close it later
pub async fn add_deployment_task(
    ctx: &RunContext,
    phase: &str,
    short_description: &str,
    mirror_key: &str,
    order: u32,
    assignment_group: &str,
) -> Result<String, ForgeError> {
    let parent_id = ctx.phase_id(&change_phase_name(phase))?;
    let body = json!({
        "id": "null",
        "type": "xlrelease.CustomScriptTask",
        "title": short_description,
        "owner": "${release.owner}",
        "status": "PLANNED",
        "variableMapping": {
            "pythonScript.taskNumber": format!("${{{}}}", mirror_key),
        },
        "pythonScript": {
            "type": "servicenowNxs.AddDeploymentTask",
            "id": "null",
            "servicenowNxsServer": ctx.config.orchestrator.change_server_ref,
            "changeRequestNumber": format!("${{{}.sun.id}}", phase),
            "shortDescription": short_description,
            "description": short_description,
            "assignmentgroup": assignment_group,
            "order": order,
        },
    });
    let id = ctx.api.create_task(&parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add SUN task : '{}'",
        change_phase_name(phase),
        short_description
    );
    Ok(id)
}

/// Close one mirrored change task after the corresponding work step
pub async fn close_task(
    ctx: &RunContext,
    parent_id: &str,
    phase: &str,
    title: &str,
    mirror_key: &str,
) -> Result<String, ForgeError> {
    let body = json!({
        "id": "null",
        "type": "xlrelease.CustomScriptTask",
        "title": title,
        "owner": "${release.owner}",
        "locked": false,
        "status": "PLANNED",
        "pythonScript": {
            "type": "servicenowNxs.UpdateTask",
            "id": "null",
            "servicenowNxsServer": ctx.config.orchestrator.change_server_ref,
            "taskNumber": format!("${{{}}}", mirror_key),
            "status": "Close complete",
            "closeNotes": "task ok",
            "updateAs": "${change_user_assign}",
        },
    });
    let id = ctx.api.create_task(parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : SUN closing : '{}'",
        phase, title
    );
    Ok(id)
}

/// Close the change record once all work steps completed
pub async fn close_change(ctx: &RunContext, phase: &str) -> Result<String, ForgeError> {
    let parent_id = ctx.phase_id(phase)?;
    let body = json!({
        "id": null,
        "type": "xlrelease.CustomScriptTask",
        "title": format!("Close Change ${{{}.sun.id}}", phase),
        "owner": "${release.owner}",
        "status": "PLANNED",
        "pythonScript": {
            "type": "servicenowNxs.UpdateChangeState",
            "id": null,
            "servicenowNxsServer": ctx.config.orchestrator.change_server_ref,
            "changeNumber": format!("${{{}.sun.id}}", phase),
            "newState": "Closed",
            "comment": "done",
            "closeCode": "Successful",
            "closeNotes": "done",
        },
    });
    let id = ctx.api.create_task(&parent_id, &body).await?;
    info!("ON PHASE : {} --- Add task : 'Close Change'", phase);
    Ok(id)
}
