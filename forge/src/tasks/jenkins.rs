//! Build-server task emitter

use secrecy::ExposeSecret;
use serde_json::json;
use tracing::info;

use crate::app::context::RunContext;
use crate::errors::ForgeError;

/// Trigger a parameterized build for a package, mapping the resulting build
/// number into `${<pkg>_build_number}`
pub async fn build_job(
    ctx: &RunContext,
    parent_id: &str,
    phase: &str,
    package_name: &str,
) -> Result<String, ForgeError> {
    let jenkins = ctx.config.jenkins.as_ref().ok_or_else(|| {
        ForgeError::ConfigError("jenkins task requested without a jenkins section".to_string())
    })?;
    let job = jenkins.jobs.get(package_name).ok_or_else(|| {
        ForgeError::ConfigError(format!("no jenkins job declared for package '{}'", package_name))
    })?;

    let parameters: String = job
        .parameters
        .iter()
        .map(|(k, v)| format!("{}={}\n", k, v))
        .collect();

    let body = json!({
        "id": "null",
        "type": "xlrelease.CustomScriptTask",
        "title": format!("Jenkins {}", package_name),
        "variableMapping": {
            "pythonScript.buildNumber": format!("${{{}_build_number}}", package_name),
        },
        "pythonScript": {
            "type": "jenkins.Build",
            "id": "null",
            "jenkinsServer": jenkins.server_ref,
            "buildStatus": "SUCCESS",
            "buildNumber": "5",
            "username": jenkins.username,
            "password": null,
            "jobName": job.job_name,
            "apiToken": jenkins.token.as_ref().map(|t| t.expose_secret().to_string()),
            "jobParameters": parameters,
            "branch": job.branch,
        },
    });
    let id = ctx.api.create_task(parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : 'Jenkins For Package: {}'",
        phase, package_name
    );
    Ok(id)
}
