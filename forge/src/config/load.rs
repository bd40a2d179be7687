//! Deployment specification loading

use std::path::Path;

use tracing::info;

use crate::config::model::{ReleaseConfig, TaskEntry};
use crate::errors::ForgeError;

/// Load and validate the deployment specification.
///
/// Cross-reference violations are fatal here, before any remote call.
pub fn load_config(path: &Path) -> Result<ReleaseConfig, ForgeError> {
    let raw = std::fs::read_to_string(path)?;
    let config: ReleaseConfig = serde_yaml::from_str(&raw)?;
    validate(&config)?;
    info!(
        "Loaded deployment specification '{}' ({} phases, {} packages)",
        config.general.template_name,
        config.general.phases.len(),
        config.packages.len()
    );
    Ok(config)
}

fn validate(config: &ReleaseConfig) -> Result<(), ForgeError> {
    if config.general.phases.is_empty() {
        return Err(ForgeError::ConfigError(
            "general.phases must name at least one phase".to_string(),
        ));
    }

    for phase in &config.general.phases {
        if !config.phases.contains_key(phase) {
            return Err(ForgeError::ConfigError(format!(
                "phase '{}' is listed in general.phases but has no task list",
                phase
            )));
        }
    }

    for (phase, tasks) in &config.phases {
        for entry in tasks {
            match entry {
                TaskEntry::Xldeploy(packages) | TaskEntry::Jenkins(packages) => {
                    for name in packages {
                        require_package(config, phase, name)?;
                    }
                }
                TaskEntry::Controlm(group) => {
                    for folder in &group.folders {
                        for name in &folder.packages {
                            require_package(config, phase, name)?;
                        }
                    }
                }
                _ => {}
            }
        }
    }

    for package in &config.packages {
        for dep in &package.auto_undeploy {
            if config.package(dep).is_none() {
                return Err(ForgeError::ConfigError(format!(
                    "package '{}' auto-undeploys undeclared package '{}'",
                    package.name, dep
                )));
            }
        }
    }

    if let Some(jenkins) = &config.jenkins {
        for name in jenkins.jobs.keys() {
            if config.package(name).is_none() {
                return Err(ForgeError::ConfigError(format!(
                    "jenkins job declared for undeclared package '{}'",
                    name
                )));
            }
        }
    }

    Ok(())
}

fn require_package(config: &ReleaseConfig, phase: &str, name: &str) -> Result<(), ForgeError> {
    if config.package(name).is_none() {
        return Err(ForgeError::ConfigError(format!(
            "phase '{}' references undeclared package '{}'",
            phase, name
        )));
    }
    Ok(())
}
