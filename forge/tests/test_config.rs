//! Deployment-specification parsing and validation

mod common;

use common::config_from_yaml;
use relforge::config::{ControlmMode, PackageMode, PhaseMode, ReleaseConfig, TaskEntry};

const FULL_YAML: &str = r#"
general:
  template_name: "PAY release"
  folder: "Applications/Folder/PAY"
  iua: "NXPAY"
  phases: [BENCH, PRODUCTION]
  phase_mode: multi_list
  package_mode: listbox
  option_latest: true
  change_assignment_group: "OPS-PAY"
  change_approver: "approver@example.net"
  standard_change_model: "MDL0042"
  short_description: "Payment stack rollout"
auth:
  username: ops
  password: s3cret
orchestrator:
  base_url: "https://xlr.example.net"
  scheduler_api_url: "https://ctm.example.net/api"
environments:
  BENCH: ["BENCH1;L", "BENCH2;M"]
packages:
  - name: front
    application_path: "Applications/PAY/front/"
    environment_path: "Environments/PAY/<ENV>/<XLD_env>"
    check_version_exists: true
  - name: back
    application_path: "Applications/PAY/back/"
    environment_path: "Environments/PAY/<ENV>/<XLD_env>"
    auto_undeploy: [front]
controlm:
  mode: master
jenkins:
  server_ref: "Configuration/Custom/Jenkins"
  username: ci
  token: tok
  jobs:
    front:
      job_name: "pay-front-build"
phases:
  BENCH:
    - controlm:
        group: STOP
        folders:
          - name: "${controlm_prefix_BENCH}STOP-PAY"
            hold: true
            free: true
            packages: [front]
    - xldeploy: [front, back]
  PRODUCTION:
    - xldeploy: [front]
    - jenkins: [front]
technical_tasks:
  before_deployment:
    - kind: ops
      title: "Warm standby check"
notifications:
  end_release:
    to: ["team@example.net"]
"#;

#[test]
fn parses_full_specification() {
    let config: ReleaseConfig = config_from_yaml(FULL_YAML);

    assert_eq!(config.general.template_name, "PAY release");
    assert_eq!(config.general.phases, vec!["BENCH", "PRODUCTION"]);
    assert_eq!(config.general.phase_mode, PhaseMode::MultiList);
    assert_eq!(config.general.package_mode, PackageMode::Listbox);
    assert!(config.general.option_latest);
    assert_eq!(config.controlm.mode, ControlmMode::Master);

    let back = config.package("back").unwrap();
    assert_eq!(back.auto_undeploy, vec!["front"]);
    assert!(config.package("front").unwrap().check_version_exists);

    let bench = config.phase_tasks("BENCH");
    assert_eq!(bench.len(), 2);
    match &bench[0] {
        TaskEntry::Controlm(group) => {
            assert_eq!(group.group, "STOP");
            assert!(group.folders[0].hold);
            assert!(group.folders[0].append_job);
        }
        other => panic!("expected controlm entry, got {:?}", other),
    }

    assert!(config.has_scheduler_folders());
    assert!(config.has_technical_tasks());
    assert_eq!(config.phase_environments("BENCH").len(), 2);
}

#[test]
fn task_entries_parse_from_single_key_maps() {
    let yaml = r#"
- xldeploy: [app]
- controlm:
    group: STOP
    folders:
      - name: PSTOP-ALL
- controlm_resource:
    name: SEM_APP
    max: 1
- launch_script_windows:
    title: "Flush cache"
    script: "Restart-Service cache"
    target_host: "win01"
- launch_script_linux:
    title: "Restart consumers"
    script: "systemctl restart consumers"
    target_host: "worker01"
- jenkins: [app]
"#;
    let entries: Vec<TaskEntry> = serde_yaml::from_str(yaml).unwrap();

    assert_eq!(entries.len(), 6);
    assert!(matches!(&entries[0], TaskEntry::Xldeploy(names) if names == &["app"]));
    assert!(matches!(&entries[1], TaskEntry::Controlm(group) if group.group == "STOP"));
    assert!(matches!(&entries[2], TaskEntry::ControlmResource(r) if r.max == 1));
    assert!(matches!(&entries[3], TaskEntry::LaunchScriptWindows(_)));
    assert!(matches!(&entries[4], TaskEntry::LaunchScriptLinux(_)));
    assert!(matches!(&entries[5], TaskEntry::Jenkins(_)));
}

#[test]
fn task_entry_rejects_unknown_and_stacked_keys() {
    assert!(serde_yaml::from_str::<Vec<TaskEntry>>("- teleport: [app]\n").is_err());
    assert!(
        serde_yaml::from_str::<Vec<TaskEntry>>("- xldeploy: [app]\n  jenkins: [app]\n").is_err()
    );
}

#[test]
fn defaults_are_applied() {
    let config = config_from_yaml(common::BASE_YAML);

    assert_eq!(config.general.phase_mode, PhaseMode::OneList);
    assert_eq!(config.general.package_mode, PackageMode::Fixed);
    assert!(!config.general.option_latest);
    assert_eq!(
        config.orchestrator.scheduler_ctm_prod,
        "CTM_PROD".to_string()
    );
    assert_eq!(
        config.orchestrator.deploy_server_ref,
        "Configuration/Custom/XLDeploy PROD"
    );
}

#[test]
fn change_management_covers_bench_and_production() {
    let config = config_from_yaml(common::BASE_YAML);
    assert!(config.is_change_managed("BENCH"));
    assert!(config.is_change_managed("PRODUCTION"));
    assert!(!config.is_change_managed("DEV"));
    assert!(!config.is_change_managed("UAT"));
}

#[test]
fn validation_rejects_phase_without_task_list() {
    let yaml = common::BASE_YAML.replace("phases: [DEV]", "phases: [DEV, UAT]");
    let path = std::env::temp_dir().join("relforge_test_missing_phase.yaml");
    std::fs::write(&path, yaml).unwrap();

    let err = relforge::config::load_config(&path).unwrap_err();
    assert!(err.to_string().contains("UAT"));
    std::fs::remove_file(&path).ok();
}

#[test]
fn validation_rejects_undeclared_package() {
    let yaml = common::BASE_YAML.replace("xldeploy: [app]", "xldeploy: [ghost]");
    let path = std::env::temp_dir().join("relforge_test_ghost_package.yaml");
    std::fs::write(&path, yaml).unwrap();

    let err = relforge::config::load_config(&path).unwrap_err();
    assert!(err.to_string().contains("ghost"));
    std::fs::remove_file(&path).ok();
}

#[test]
fn validation_rejects_undeclared_auto_undeploy() {
    let yaml = common::BASE_YAML.replace(
        "environment_path: \"Environments/DEMO/<ENV>/<XLD_env>\"",
        "environment_path: \"Environments/DEMO/<ENV>/<XLD_env>\"\n    auto_undeploy: [ghost]",
    );
    let path = std::env::temp_dir().join("relforge_test_ghost_undeploy.yaml");
    std::fs::write(&path, yaml).unwrap();

    let err = relforge::config::load_config(&path).unwrap_err();
    assert!(err.to_string().contains("ghost"));
    std::fs::remove_file(&path).ok();
}
