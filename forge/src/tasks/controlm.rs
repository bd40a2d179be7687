//! Batch-scheduler task emitters

use serde_json::json;
use tracing::info;

use crate::app::context::RunContext;
use crate::config::{ControlmFolder, ResourceSpec};
use crate::envmap;
use crate::errors::ForgeError;

/// Job-edit actions the scheduler plugin supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditAction {
    Free,
    RunNow,
}

impl EditAction {
    fn as_str(&self) -> &'static str {
        match self {
            EditAction::Free => "FREE",
            EditAction::RunNow => "RUN_NOW",
        }
    }
}

/// Order a folder for execution; the folder id lands in `${id_<folder>}`
/// and the order date comes from `${controlm_today}`
pub async fn order_folder(
    ctx: &RunContext,
    parent_id: &str,
    phase: &str,
    folder: &ControlmFolder,
) -> Result<String, ForgeError> {
    let key = envmap::folder_variable_key(&folder.name);
    let body = json!({
        "id": "null",
        "locked": false,
        "type": "xlrelease.CustomScriptTask",
        "title": format!("Order Folder {}", folder.name),
        "variableMapping": {
            "pythonScript.orderDate": "${controlm_today}",
            "pythonScript.folderId": format!("${{id_{}}}", key),
        },
        "pythonScript": {
            "type": "controlM.OrderFolder",
            "id": "null",
            "server": ctx.config.orchestrator.scheduler_server_ref,
            "ctm": envmap::scheduler_ctm(&ctx.config, &folder.name),
            "folderName": folder.name,
            "ignoreCriteria": folder.ignore_criteria,
            "appendJob": folder.append_job,
            "hold": folder.hold,
            "jobIds": {},
        },
        "keepPreviousOutputPropertiesOnRetry": false,
    });
    let id = ctx.api.create_task(parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : 'Order Folder {}'",
        phase, folder.name
    );
    Ok(id)
}

/// Poll a folder until it reaches the wanted status, with a fixed number of
/// attempts and an explicit failure status distinct from the success status
pub async fn wait_job_status(
    ctx: &RunContext,
    parent_id: &str,
    phase: &str,
    folder_name: &str,
    status_to_wait_for: &str,
) -> Result<String, ForgeError> {
    let key = envmap::folder_variable_key(folder_name);
    let body = json!({
        "id": "null",
        "locked": false,
        "type": "xlrelease.CustomScriptTask",
        "title": format!("Wait {} in status {}", folder_name, status_to_wait_for),
        "pythonScript": {
            "type": "controlM.WaitJobStatusById",
            "id": "null",
            "server": ctx.config.orchestrator.scheduler_server_ref,
            "ctm": envmap::scheduler_ctm(&ctx.config, folder_name),
            "folderName": folder_name,
            "attempts": 15,
            "interval": 60,
            "statusToFailOn": "Ended Not OK",
            "statusToWaitFor": status_to_wait_for,
            "jobId": format!("${{id_{}}}", key),
        },
        "keepPreviousOutputPropertiesOnRetry": false,
    });
    let id = ctx.api.create_task(parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : 'Wait {} in status {}'",
        phase, folder_name, status_to_wait_for
    );
    Ok(id)
}

/// Edit the run/hold state of an ordered folder
pub async fn edit_job(
    ctx: &RunContext,
    parent_id: &str,
    phase: &str,
    folder_name: &str,
    action: EditAction,
) -> Result<String, ForgeError> {
    let key = envmap::folder_variable_key(folder_name);
    let body = json!({
        "id": "null",
        "locked": false,
        "type": "xlrelease.CustomScriptTask",
        "title": format!("{} FOLDER {}", action.as_str(), folder_name),
        "pythonScript": {
            "type": "controlM.EditJob",
            "id": "null",
            "server": ctx.config.orchestrator.scheduler_server_ref,
            "ctm": envmap::scheduler_ctm(&ctx.config, folder_name),
            "jobId": format!("${{id_{}}}", key),
            "action": action.as_str(),
        },
        "keepPreviousOutputPropertiesOnRetry": false,
    });
    let id = ctx.api.create_task(parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : '{} FOLDER {}'",
        phase,
        action.as_str(),
        folder_name
    );
    Ok(id)
}

/// Adjust a named resource capacity through the scheduler webhook
pub async fn set_resource(
    ctx: &RunContext,
    parent_id: &str,
    phase: &str,
    resource: &ResourceSpec,
) -> Result<String, ForgeError> {
    let body = json!({
        "id": "null",
        "type": "xlrelease.CustomScriptTask",
        "title": format!("Change RESSOURCE value {}", resource.name),
        "locked": true,
        "pythonScript": {
            "type": "webhook.JsonWebhook",
            "id": "null",
            "URL": format!(
                "{}/resource",
                ctx.config.orchestrator.scheduler_api_url.as_deref().unwrap_or_default()
            ),
            "method": "POST",
            "body": {
                "ctm": envmap::scheduler_ctm(&ctx.config, &resource.name),
                "name": resource.name,
                "max": resource.max,
            },
            "username": format!("${{{}_username_controlm}}", phase),
            "password": format!("${{{}_password_controlm}}", phase),
        },
    });
    let id = ctx.api.create_task(parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : 'Change RESSOURCE value {}'",
        phase, resource.name
    );
    Ok(id)
}

/// Engine-side script setting `${controlm_today}` to today's date in the
/// format folder ordering expects
pub async fn date_variable_script(
    ctx: &RunContext,
    parent_id: &str,
    phase: &str,
) -> Result<String, ForgeError> {
    let script = "from time import strftime\n\
                  date_format = strftime('%Y%m%d')\n\
                  releaseVariables['controlm_today'] = date_format\n";
    let body = json!({
        "id": "null",
        "type": "xlrelease.ScriptTask",
        "locked": true,
        "title": "Format date for scheduler ordering",
        "script": script,
    });
    let id = ctx.api.create_task(parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : 'Format date for scheduler ordering'",
        phase
    );
    Ok(id)
}
