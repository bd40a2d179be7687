//! Generation driver
//!
//! One run replaces any same-titled template in the target folder: resolve
//! the folder, drop the previous template, create a fresh one, seed its
//! variables, add the pruning phase, then build every declared phase in
//! order.

use std::sync::Arc;

use colored::Colorize;
use secrecy::ExposeSecret;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::api::OrchestratorApi;
use crate::app::context::RunContext;
use crate::config::ReleaseConfig;
use crate::errors::ForgeError;
use crate::{planner, pruner, variables};

/// Generate the template, returning its browser URL
pub async fn run(
    api: Arc<dyn OrchestratorApi>,
    config: ReleaseConfig,
    base_url: &str,
) -> Result<String, ForgeError> {
    let run_id = Uuid::new_v4();
    info!(%run_id, "Template generation started");

    let mut ctx = RunContext::new(api, config);

    let folder_path = ctx.config.general.folder.clone();
    let folder_id = ctx.api.find_folder(&folder_path).await?;
    info!("FOLDER : {} ({})", folder_path, folder_id);

    let title = ctx.config.general.template_name.clone();
    let existing = ctx.api.search_templates(&title).await?;
    if existing.len() > 1 {
        return Err(ForgeError::TemplateError(format!(
            "{} templates titled '{}' found, refusing to pick one",
            existing.len(),
            title
        )));
    }
    for stub in existing {
        ctx.api.delete_template(&stub.id).await?;
        info!("DELETE previous template : {} ({})", stub.title, stub.id);
    }

    let body = json!({
        "id": null,
        "type": "xlrelease.Release",
        "title": title,
        "status": "TEMPLATE",
        "scriptUsername": ctx.config.auth.username,
        "scriptUserPassword": ctx.config.auth.password.expose_secret(),
    });
    let template_id = ctx.api.create_template(&folder_id, &body).await?;
    ctx.template_id = template_id.clone();
    info!("CREATE TEMPLATE : {} ({})", title, template_id);

    planner::delete_default_phase(&mut ctx).await?;
    variables::seed_base_variables(&mut ctx).await?;
    pruner::build_dynamic_phase(&mut ctx).await?;
    planner::build_phases(&mut ctx).await?;

    for phase in &ctx.config.general.phases {
        if let Some(record) = ctx.registry.phase(phase) {
            info!(
                "PHASE {} : {} registered tasks ({})",
                phase,
                record.task_ids.len(),
                record.id
            );
        }
    }

    let url = format!(
        "{}/#/templates/{}",
        base_url.trim_end_matches('/'),
        template_id.replace('/', "-")
    );
    println!("{}", "Template generated".green().bold());
    println!("{}", url);
    info!(%run_id, "Template generation finished : {}", url);
    Ok(url)
}
