//! Email notification task emitters
//!
//! Two fixed templates: a closure reminder to the release owner and a
//! completion notice to a distribution list.

use serde_json::json;
use tracing::info;

use crate::app::context::RunContext;
use crate::errors::ForgeError;

fn from_address(ctx: &RunContext) -> String {
    ctx.config
        .orchestrator
        .from_address
        .clone()
        .unwrap_or_default()
}

/// Reminder to the release owner to close the release (and with it the
/// change record)
pub async fn close_release_reminder(
    ctx: &RunContext,
    parent_id: &str,
    phase: &str,
) -> Result<String, ForgeError> {
    let cc = ctx
        .config
        .notifications
        .close_release
        .as_ref()
        .map(|n| n.cc.join(", "))
        .unwrap_or_default();

    let body = json!({
        "id": "null",
        "locked": true,
        "type": "xlrelease.CustomScriptTask",
        "title": "EMAIL : Close Release ${release.title}",
        "pythonScript": {
            "type": "nxsCustomNotification.MailNotification",
            "id": "null",
            "smtpServer": ctx.config.orchestrator.mail_server_ref,
            "fromAddress": from_address(ctx),
            "toAddresses": "${email_owner_release}",
            "ccAddresses": cc,
            "priority": "Normal",
            "subject": "Deployment finished - Release : ${release.title}",
            "body": " The release ${release.title} finished OK.\n \n \
                     Please close the release so the change record can be closed.\n \n \
                     Link to the release: ${release.id}\n \n Thanks\n",
        },
    });
    let id = ctx.api.create_task(parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : 'EMAIL : Close Release'",
        phase
    );
    Ok(id)
}

/// Completion notice to the configured distribution list
pub async fn end_release_notice(
    ctx: &RunContext,
    parent_id: &str,
    phase: &str,
) -> Result<String, ForgeError> {
    let notification = match &ctx.config.notifications.end_release {
        Some(n) => n,
        None => {
            return Err(ForgeError::ConfigError(
                "end_release notification requested without recipients".to_string(),
            ))
        }
    };

    let body = json!({
        "id": "null",
        "locked": true,
        "type": "xlrelease.CustomScriptTask",
        "title": format!("EMAIL : {} Validation Release", phase),
        "pythonScript": {
            "type": "nxsCustomNotification.MailNotification",
            "id": "null",
            "smtpServer": ctx.config.orchestrator.mail_server_ref,
            "fromAddress": from_address(ctx),
            "toAddresses": notification.to.join(", "),
            "ccAddresses": notification.cc.join(", "),
            "priority": "Normal",
            "subject": "Deployment finished - Release : ${release.title}",
            "body": " The release ${release.title} finished OK.\n \n \
                     Link to the release: ${release.id}\n \n Thanks\n",
        },
    });
    let id = ctx.api.create_task(parent_id, &body).await?;
    info!(
        "ON PHASE : {} --- Add task : 'EMAIL : {} Validation Release'",
        phase, phase
    );
    Ok(id)
}
