//! Deployment-tool task emitters

use serde_json::json;
use tracing::info;

use crate::app::context::RunContext;
use crate::config::PackageDef;
use crate::envmap;
use crate::errors::ForgeError;

/// Artifact reference for a package: a fixed build name when one is
/// configured, the runtime-resolved version variable otherwise
pub fn deployment_package(package: &PackageDef) -> String {
    let base = package.application_path.trim_end_matches('/');
    match &package.build_name {
        Some(name) => format!("{}/{}", base, name),
        None => format!("{}/${{{}_version}}", base, package.name),
    }
}

/// Target environment path for a package in a phase, all tokens substituted
pub fn environment_path(
    ctx: &RunContext,
    phase: &str,
    package: &PackageDef,
) -> Result<String, ForgeError> {
    let target = envmap::resolve(&ctx.config, phase)?;
    Ok(envmap::substitute_path(
        &package.environment_path,
        &target,
        phase,
    ))
}

/// Deploy a package version to the phase environment
pub async fn deploy(
    ctx: &RunContext,
    parent_id: &str,
    phase: &str,
    package: &PackageDef,
) -> Result<String, ForgeError> {
    let env_path = environment_path(ctx, phase, package)?;
    let body = json!({
        "id": "null",
        "type": "xlrelease.CustomScriptTask",
        "title": format!("XLD-Deploy {}", package.name),
        "status": "PLANNED",
        "locked": false,
        "waitForScheduledStartDate": true,
        "pythonScript": {
            "server": ctx.config.orchestrator.deploy_server_ref,
            "type": "xldeploy.Deploy",
            "continueIfStepFails": false,
            "displayStepLogs": true,
            "retryCounter": {
                "currentContinueRetrial": "0",
                "currentPollingTrial": "0",
            },
            "id": "null",
            "username": format!("${{{}_username_xldeploy}}", phase),
            "password": format!("${{{}_password_xldeploy}}", phase),
            "deploymentPackage": deployment_package(package),
            "deploymentEnvironment": env_path,
            "overrideDeployedProps": {},
            "rollbackOnFailure": false,
            "cancelOnError": false,
            "failOnPause": false,
            "keepPreviousOutputPropertiesOnRetry": false,
        },
    });
    let id = ctx.api.create_task(parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : 'XLD-Deploy {}'",
        phase, package.name
    );
    Ok(id)
}

/// Undeploy an application from the phase environment
pub async fn undeploy(
    ctx: &RunContext,
    parent_id: &str,
    phase: &str,
    package: &PackageDef,
) -> Result<String, ForgeError> {
    let env_path = environment_path(ctx, phase, package)?;
    let application_name = package
        .application_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(&package.name)
        .to_string();

    let body = json!({
        "id": null,
        "type": "xlrelease.CustomScriptTask",
        "title": format!("Undeploy {}", package.name),
        "status": "PLANNED",
        "locked": false,
        "pythonScript": {
            "server": ctx.config.orchestrator.deploy_server_ref,
            "type": "xldeploy.Undeploy",
            "id": null,
            "username": format!("${{{}_username_xldeploy}}", phase),
            "password": format!("${{{}_password_xldeploy}}", phase),
            "connectionFailureCount": 0,
            "deployedApplication": format!("{}/{}", env_path, application_name),
            "orchestrators": "",
            "deployedApplicationProperties": "",
            "continueIfStepFails": false,
            "numberOfContinueRetrials": 0,
            "pollingInterval": 10,
            "numberOfPollingTrials": 0,
            "displayStepLogs": true,
            "retryCounter": {},
            "connectionRetries": 10,
            "rollbackOnFailure": false,
            "rollbackOnAbort": false,
            "cancelOnError": false,
            "failOnPause": false,
            "failIfApplicationDoesNotExist": false,
        },
    });
    let id = ctx.api.create_task(parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : 'Undeploy {}'",
        phase, package.name
    );
    Ok(id)
}

/// Resolve the latest available version of a package into its version
/// variable
pub async fn latest_version_lookup(
    ctx: &RunContext,
    parent_id: &str,
    phase: &str,
    package: &PackageDef,
) -> Result<String, ForgeError> {
    let body = json!({
        "id": "null",
        "type": "xlrelease.CustomScriptTask",
        "title": format!("XLD-Deploy Search last version : {}", package.name),
        "status": "PLANNED",
        "color": "#00ff00",
        "variableMapping": {
            "pythonScript.packageId": format!("${{{}_version}}", package.name),
        },
        "locked": false,
        "waitForScheduledStartDate": true,
        "checkAttributes": false,
        "pythonScript": {
            "server": ctx.config.orchestrator.deploy_server_ref,
            "type": "xld.GetLatestVersion",
            "id": "null",
            "username": format!("${{{}_username_xldeploy}}", phase),
            "password": format!("${{{}_password_xldeploy}}", phase),
            "connectionFailureCount": 0,
            "applicationId": package.application_path,
            "stripApplications": false,
            "throwOnFail": false,
        },
    });
    let id = ctx.api.create_task(parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : 'XLD-Deploy Search last version : {}'",
        phase, package.name
    );
    Ok(id)
}

/// Check whether the requested package version already exists in the
/// deployment tool, binding the result to `${check_xld_<pkg>}`
pub async fn check_version_exists(
    ctx: &RunContext,
    parent_id: &str,
    phase: &str,
    package: &PackageDef,
) -> Result<String, ForgeError> {
    let body = json!({
        "id": null,
        "type": "xlrelease.CustomScriptTask",
        "title": format!("Check XLD package exist {}", package.name),
        "status": "PLANNED",
        "locked": false,
        "variableMapping": {
            "pythonScript.exists": format!("${{check_xld_{}}}", package.name),
        },
        "waitForScheduledStartDate": true,
        "pythonScript": {
            "xldeployServer": ctx.config.orchestrator.deploy_server_ref,
            "type": "xldeploy.DoesCIExist",
            "id": null,
            "username": format!("${{{}_username_xldeploy}}", phase),
            "password": format!("${{{}_password_xldeploy}}", phase),
            "ciID": format!(
                "{}${{{}_version}}",
                package.application_path, package.name
            ),
            "throwOnFail": false,
            "exists": false,
        },
    });
    let id = ctx.api.create_task(parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : 'Check XLD package exist {}'",
        phase, package.name
    );
    Ok(id)
}
