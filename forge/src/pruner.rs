//! Release-start pruning
//!
//! The template is built for every declared phase, package and scheduler
//! folder; at release start a leading `dynamic_release` phase trims the
//! parts the operator did not select. The pruning logic runs inside the
//! orchestration engine as generated Jython, so everything it needs from
//! the configuration is inlined at generation time.

use std::collections::BTreeMap;

use serde_json::json;
use tracing::info;

use crate::app::context::RunContext;
use crate::config::{ControlmMode, PackageMode, PhaseMode, ReleaseConfig, TaskEntry};
use crate::errors::ForgeError;
use crate::tasks::script;
use crate::variables::{self, DeclareOptions, VariableKind};

/// Title of the pruning phase
pub const DYNAMIC_PHASE: &str = "dynamic_release";

/// A single-phase, single-package template with no technical tasks has
/// nothing to prune
pub fn needs_dynamic_phase(config: &ReleaseConfig) -> bool {
    config.general.phases.len() > 1
        || config.packages.len() > 1
        || config.has_technical_tasks()
}

/// Build the pruning phase and its scripts
pub async fn build_dynamic_phase(ctx: &mut RunContext) -> Result<(), ForgeError> {
    if !needs_dynamic_phase(&ctx.config) {
        info!("Single phase, single package, no technical tasks : pruning phase skipped");
        return Ok(());
    }

    let body = json!({
        "id": null,
        "type": "xlrelease.Phase",
        "title": DYNAMIC_PHASE,
        "flagStatus": "OK",
    });
    let template_id = ctx.template_id.clone();
    let phase_id = ctx.api.create_phase(&template_id, &body).await?;
    ctx.registry.register_phase(DYNAMIC_PHASE, &phase_id);
    info!("CREATE PHASE : {}", DYNAMIC_PHASE);

    if let Some(prefix_script) = bench_prefix_script(&ctx.config) {
        variables::declare(
            ctx,
            "controlm_prefix_BENCH",
            VariableKind::String,
            DeclareOptions::default(),
        )
        .await?;
        script::jython_script(ctx, &phase_id, "Resolve BENCH scheduler prefix", &prefix_script)
            .await?;
    }

    if ctx.config.general.phases.len() > 1 {
        let selection = phase_selection_script(&ctx.config);
        script::jython_script(ctx, &phase_id, "Delete unselected phases", &selection).await?;
    }

    if let Some(package_script) = package_pruning_script(&ctx.config) {
        script::jython_script(ctx, &phase_id, "Delete unselected package tasks", &package_script)
            .await?;
    }

    let phases = ctx.config.general.phases.clone();
    for phase in phases {
        if let Some(folder_script) = folder_pruning_script(&ctx.config, &phase) {
            script::jython_script(
                ctx,
                &phase_id,
                &format!("Delete unselected scheduler folders {}", phase),
                &folder_script,
            )
            .await?;
        }
    }
    Ok(())
}

/// Phase-deletion script. In `one_list` mode a single choice drives the
/// selection; in `multi_list` mode the operator checks phases off a list.
/// Companion change phases follow their deployment phase.
pub fn phase_selection_script(config: &ReleaseConfig) -> String {
    let managed = jython_str_list(&config.general.phases);
    let keep = match config.general.phase_mode {
        PhaseMode::OneList => "keep = [releaseVariables['Choice_ENV']]".to_string(),
        PhaseMode::MultiList => "keep = releaseVariables['xlr_list_phase_selection']".to_string(),
    };
    format!(
        "release = getCurrentRelease()\n\
         managed = {managed}\n\
         {keep}\n\
         for phase in list(release.phases):\n\
         \x20   title = str(phase.title)\n\
         \x20   if title in managed and title not in keep:\n\
         \x20       phaseApi.deletePhase(str(phase.id))\n\
         \x20   if title.startswith('CREATE_CHANGE_') and title[len('CREATE_CHANGE_'):] not in keep:\n\
         \x20       phaseApi.deletePhase(str(phase.id))\n",
    )
}

/// BENCH prefix resolution for split-BENCH installations. Emitted only when
/// more than one BENCH variant is configured; the environment-to-letter map
/// comes from the configuration, with B as the fallback letter.
pub fn bench_prefix_script(config: &ReleaseConfig) -> Option<String> {
    let candidates = config.phase_environments("BENCH");
    if candidates.len() <= 1 {
        return None;
    }
    let mut letters = BTreeMap::new();
    for candidate in candidates {
        let (env, letter) = crate::envmap::split_env_entry(candidate);
        letters.insert(env.to_string(), letter.unwrap_or("B").to_string());
    }
    let map = jython_str_map(&letters);
    Some(format!(
        "prefixes = {map}\n\
         env = releaseVariables['env_BENCH']\n\
         releaseVariables['controlm_prefix_BENCH'] = prefixes.get(env, 'B')\n",
    ))
}

/// Package-task deletion script, emitted when the operator picks packages
/// from a list. Every task carrying a deselected package name in its title
/// goes, deployment phase and companion change phase alike.
pub fn package_pruning_script(config: &ReleaseConfig) -> Option<String> {
    if config.packages.len() <= 1 && config.general.package_mode != PackageMode::Listbox {
        return None;
    }
    let names: Vec<String> = config.packages.iter().map(|p| p.name.clone()).collect();
    let all = jython_str_list(&names);
    Some(format!(
        "release = getCurrentRelease()\n\
         all_packages = {all}\n\
         chosen = releaseVariables['xlr_list_package_selection']\n\
         titles = ['XLD-Deploy %s', 'XLD-Deploy Search last version : %s',\n\
         \x20         'Check XLD package exist %s', 'Undeploy %s', 'Jenkins %s']\n\
         for pack in all_packages:\n\
         \x20   if pack in chosen:\n\
         \x20       continue\n\
         \x20   for pattern in titles:\n\
         \x20       for task in taskApi.searchTasksByTitle(pattern % pack, None, release.id):\n\
         \x20           taskApi.deleteTask(str(task.id))\n",
    ))
}

/// Scheduler-folder deletion script for one phase. A folder stays when one
/// of its member packages was chosen; folders with no recorded membership
/// always stay. When a whole umbrella empties out the umbrella itself goes,
/// and once every umbrella of the phase is gone the scheduler credential
/// input goes with them.
pub fn folder_pruning_script(config: &ReleaseConfig, phase: &str) -> Option<String> {
    let has_folders = config
        .phase_tasks(phase)
        .iter()
        .any(|t| matches!(t, TaskEntry::Controlm(_)));
    if !has_folders || config.packages.len() <= 1 {
        return None;
    }

    let mut membership = BTreeMap::new();
    for entry in config.phase_tasks(phase) {
        if let TaskEntry::Controlm(group) = entry {
            for folder in &group.folders {
                membership.insert(folder.name.clone(), folder.packages.clone());
            }
        }
    }
    let membership = jython_str_list_map(&membership);

    // Master mode narrows the chosen list to the packages this template was
    // generated for before it drives folder retention
    let chosen = match config.controlm.mode {
        ControlmMode::Plain => "chosen = list(releaseVariables['xlr_list_package_selection'])"
            .to_string(),
        ControlmMode::Master => "master = releaseVariables['release_Variables_in_progress']['packages'].split(',')\n\
             chosen = [p for p in releaseVariables['xlr_list_package_selection'] if p in master]\n\
             if not chosen:\n\
             \x20   chosen = list(releaseVariables['xlr_list_package_selection'])"
            .to_string(),
    };

    Some(format!(
        "release = getCurrentRelease()\n\
         membership = {membership}\n\
         groups = releaseVariables['template_list_controlm_{phase}']\n\
         {chosen}\n\
         count_deleted_groups = 0\n\
         for group in groups:\n\
         \x20   listfolder = groups[group].split(',')\n\
         \x20   listfolder_delete = []\n\
         \x20   for folder in listfolder:\n\
         \x20       packs = membership.get(folder, [])\n\
         \x20       if packs and not [p for p in packs if p in chosen]:\n\
         \x20           listfolder_delete.append(folder)\n\
         \x20   if len(listfolder_delete) == len(listfolder):\n\
         \x20       count_deleted_groups += 1\n\
         \x20       for task in taskApi.searchTasksByTitle('CONTROLM : ' + group, '{phase}', release.id):\n\
         \x20           taskApi.deleteTask(str(task.id))\n\
         \x20   else:\n\
         \x20       for folder in listfolder_delete:\n\
         \x20           for title in ['Order Folder ' + folder,\n\
         \x20                         'Wait ' + folder + ' in status Ended OK',\n\
         \x20                         'FREE FOLDER ' + folder,\n\
         \x20                         'RUN_NOW FOLDER ' + folder]:\n\
         \x20               for task in taskApi.searchTasksByTitle(title, '{phase}', release.id):\n\
         \x20                   taskApi.deleteTask(str(task.id))\n\
         if count_deleted_groups == len(groups):\n\
         \x20   for task in taskApi.searchTasksByTitle('Please enter user password for controlm on {phase}', '{phase}', release.id):\n\
         \x20       taskApi.deleteTask(str(task.id))\n",
    ))
}

fn jython_str_list(values: &[String]) -> String {
    let quoted: Vec<String> = values.iter().map(|v| format!("'{}'", v)).collect();
    format!("[{}]", quoted.join(", "))
}

fn jython_str_map(map: &BTreeMap<String, String>) -> String {
    let entries: Vec<String> = map
        .iter()
        .map(|(k, v)| format!("'{}': '{}'", k, v))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

fn jython_str_list_map(map: &BTreeMap<String, Vec<String>>) -> String {
    let entries: Vec<String> = map
        .iter()
        .map(|(k, v)| format!("'{}': {}", k, jython_str_list(v)))
        .collect();
    format!("{{{}}}", entries.join(", "))
}
