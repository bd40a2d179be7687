//! Phase to environment mapping
//!
//! Fixed lookup table from phase name to environment code, directory
//! segment, and scheduler prefix letter, plus the path-token substitution
//! used by deployment tasks.

use crate::config::ReleaseConfig;
use crate::errors::ForgeError;

/// IUA codes whose single-BENCH installations run under the Q prefix
const Q_PREFIX_IUA: &str = "NXFFA";

/// Variable reference resolved at release start for split-BENCH setups
pub const BENCH_PREFIX_VAR: &str = "${controlm_prefix_BENCH}";

/// Resolved substitution values for one phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvTarget {
    /// Value for the `<ENV>` token; a `${env_<PHASE>}` reference when the
    /// phase admits configured environments
    pub env: String,

    /// Value for the `<xld_prefix_env>` token
    pub prefix: String,

    /// Value for the `<XLD_env>` directory token
    pub dir: &'static str,
}

/// Map a phase to its substitution values
pub fn resolve(config: &ReleaseConfig, phase: &str) -> Result<EnvTarget, ForgeError> {
    let (default_prefix, dir) = match phase {
        "DEV" => ("D", "DEV"),
        "TEST" => ("T", "TST"),
        "UAT" => ("U", "UAT"),
        "BENCH" => ("B", "BCH"),
        "PRODUCTION" => ("P", "PRD"),
        other => {
            return Err(ForgeError::PhaseError(format!(
                "no environment mapping for phase '{}'",
                other
            )))
        }
    };

    let candidates = config.phase_environments(phase);
    let env = if candidates.is_empty() {
        dir.to_string()
    } else {
        format!("${{env_{}}}", phase)
    };

    let prefix = if phase == "BENCH" {
        bench_prefix(config, candidates)
    } else {
        default_prefix.to_string()
    };

    Ok(EnvTarget { env, prefix, dir })
}

/// BENCH prefix letter: a runtime variable reference when more than one
/// BENCH variant is configured, otherwise a literal resolved from the
/// single candidate (or the IUA exception table).
fn bench_prefix(config: &ReleaseConfig, candidates: &[String]) -> String {
    if candidates.len() > 1 {
        return BENCH_PREFIX_VAR.to_string();
    }
    if let Some(entry) = candidates.first() {
        if let (_, Some(letter)) = split_env_entry(entry) {
            return letter.to_string();
        }
    }
    if config.general.iua.contains(Q_PREFIX_IUA) {
        "Q".to_string()
    } else {
        "B".to_string()
    }
}

/// Split an environment candidate of the form "ENV;PREFIXLETTER"
pub fn split_env_entry(entry: &str) -> (&str, Option<&str>) {
    match entry.split_once(';') {
        Some((env, letter)) if !letter.is_empty() => (env, Some(letter)),
        _ => (entry, None),
    }
}

/// Substitute path tokens into a deployment environment-path pattern
pub fn substitute_path(pattern: &str, target: &EnvTarget, phase: &str) -> String {
    pattern
        .replace("<ENV>", &target.env)
        .replace("<XLD_env>", target.dir)
        .replace("<xld_prefix_env>", &target.prefix)
        .replace("<SNAPSHOT-RELEASE>", snapshot_release(phase))
}

/// Artifact repository segment: production deploys released artifacts
pub fn snapshot_release(phase: &str) -> &'static str {
    if phase == "PRODUCTION" {
        "Release"
    } else {
        "Snapshot"
    }
}

/// Scheduler instance for a folder: production folders are named with a
/// leading 'p'
pub fn scheduler_ctm<'a>(config: &'a ReleaseConfig, folder_name: &str) -> &'a str {
    if folder_name.to_lowercase().starts_with('p') {
        &config.orchestrator.scheduler_ctm_prod
    } else {
        &config.orchestrator.scheduler_ctm_bench
    }
}

/// Folder name with the BENCH prefix reference stripped, used to build
/// per-folder variable keys
pub fn folder_variable_key(folder_name: &str) -> String {
    folder_name.replace(BENCH_PREFIX_VAR, "")
}

/// Environment word the change-management system expects
pub fn change_environment_word(phase: &str) -> Result<&'static str, ForgeError> {
    match phase {
        "DEV" => Ok("Dev"),
        "UAT" => Ok("Uat"),
        "BENCH" => Ok("Bench"),
        "PRODUCTION" => Ok("Production"),
        other => Err(ForgeError::PhaseError(format!(
            "no change-management environment for phase '{}'",
            other
        ))),
    }
}
