//! Script tasks: engine-side Jython scripts and remote script execution

use serde_json::json;
use tracing::info;

use crate::app::context::RunContext;
use crate::config::ScriptSpec;
use crate::errors::ForgeError;

/// Create a locked engine-side Jython script task. The body runs inside the
/// orchestration engine's own interpreter at release time.
pub async fn jython_script(
    ctx: &RunContext,
    parent_id: &str,
    title: &str,
    script: &str,
) -> Result<String, ForgeError> {
    let body = json!({
        "id": "null",
        "type": "xlrelease.ScriptTask",
        "locked": true,
        "title": title,
        "script": script,
    });
    ctx.api.create_task(parent_id, &body).await
}

/// Remote script over the Windows management protocol. The credential pair
/// `<phase>_username_script_windows` / `<phase>_password_script_windows`
/// must have been declared beforehand.
pub async fn launch_script_windows(
    ctx: &RunContext,
    parent_id: &str,
    phase: &str,
    spec: &ScriptSpec,
) -> Result<String, ForgeError> {
    let body = json!({
        "id": "null",
        "type": "xlrelease.CustomScriptTask",
        "title": spec.title,
        "locked": true,
        "pythonScript": {
            "type": "remoteScript.WindowsSmb",
            "id": "null",
            "script": spec.script,
            "remotePath": spec.remote_path,
            "temporaryDirectoryPath": "",
            "address": spec.target_host,
            "username": format!("${{{}_username_script_windows}}", phase),
            "password": format!("${{{}_password_script_windows}}", phase),
            "connectionType": "WINRM_NATIVE",
        },
    });
    let id = ctx.api.create_task(parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : WindowsSmb : {}",
        phase, spec.title
    );
    Ok(id)
}

/// Remote script over SSH/SCP
pub async fn launch_script_linux(
    ctx: &RunContext,
    parent_id: &str,
    phase: &str,
    spec: &ScriptSpec,
) -> Result<String, ForgeError> {
    let sudo = spec.sudo_user.is_some();
    let body = json!({
        "id": "null",
        "type": "xlrelease.CustomScriptTask",
        "title": spec.title,
        "locked": true,
        "pythonScript": {
            "type": "remoteScript.Unix",
            "id": "null",
            "script": spec.script,
            "remotePath": spec.remote_path,
            "temporaryDirectoryPath": "",
            "address": spec.target_host,
            "port": 22,
            "username": format!("${{{}_username_script_linux}}", phase),
            "password": format!("${{{}_password_script_linux}}", phase),
            "connectionType": "SCP",
            "sudo": sudo,
            "sudoUsername": spec.sudo_user.as_deref().unwrap_or(""),
        },
    });
    let id = ctx.api.create_task(parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : Unix : {}",
        phase, spec.title
    );
    Ok(id)
}
