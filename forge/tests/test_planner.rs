//! Phase planning: ordering, grouping dedup, hooks, change mirroring

mod common;

use common::context_from_yaml;
use relforge::planner::{self, PlanState};

const TWO_CONTROLM_YAML: &str = r#"
general:
  template_name: "DEMO release"
  folder: "Applications/Folder/DEMO"
  iua: "NXDEMO"
  phases: [DEV]
auth:
  username: ops
  password: s3cret
orchestrator:
  base_url: "https://xlr.example.net"
packages:
  - name: app
    application_path: "Applications/DEMO/app/"
    environment_path: "Environments/DEMO/<ENV>/<XLD_env>"
phases:
  DEV:
    - controlm:
        group: STOP
        folders:
          - name: BSTOP-ONE
    - controlm:
        group: STOP
        folders:
          - name: BSTOP-TWO
"#;

#[tokio::test]
async fn same_group_controlm_entries_share_one_umbrella() {
    let (api, mut ctx) = context_from_yaml(TWO_CONTROLM_YAML);

    planner::create_phase_container(&mut ctx, "DEV").await.unwrap();
    let mut state = PlanState::default();
    planner::plan_phase(&mut ctx, "DEV", &mut state).await.unwrap();

    assert_eq!(api.tasks_titled("CONTROLM : STOP").len(), 1);
    let umbrella = &api.tasks_titled("CONTROLM : STOP")[0];
    assert_eq!(umbrella.kind, "xlrelease.SequentialGroup");

    // both folders land under the same umbrella
    let orders: Vec<_> = api
        .tasks_snapshot()
        .into_iter()
        .filter(|t| t.title.starts_with("Order Folder"))
        .collect();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].parent, orders[1].parent);

    // the date script and credential input are emitted once
    assert_eq!(
        api.tasks_titled("Format date for scheduler ordering").len(),
        1
    );
    assert_eq!(
        api.tasks_titled("Please enter user password for controlm on DEV")
            .len(),
        1
    );
}

const HOOK_YAML: &str = r#"
general:
  template_name: "DEMO release"
  folder: "Applications/Folder/DEMO"
  iua: "NXDEMO"
  phases: [DEV]
auth:
  username: ops
  password: s3cret
orchestrator:
  base_url: "https://xlr.example.net"
packages:
  - name: alpha
    application_path: "Applications/DEMO/alpha/"
    environment_path: "Environments/DEMO/<ENV>"
  - name: beta
    application_path: "Applications/DEMO/beta/"
    environment_path: "Environments/DEMO/<ENV>"
phases:
  DEV:
    - xldeploy: [alpha]
    - xldeploy: [beta]
    - launch_script_linux:
        title: "Restart consumers"
        script: "systemctl restart consumers"
        target_host: "worker01"
technical_tasks:
  before_deployment:
    - kind: ops
      title: "Freeze traffic"
  before_xldeploy:
    - kind: dba_factor
      title: "Snapshot schemas"
  after_xldeploy:
    - kind: ops
      title: "Smoke check"
"#;

#[tokio::test]
async fn hooks_bracket_the_deploy_entries() {
    let (api, mut ctx) = context_from_yaml(HOOK_YAML);

    planner::create_phase_container(&mut ctx, "DEV").await.unwrap();
    let mut state = PlanState::default();
    planner::plan_phase(&mut ctx, "DEV", &mut state).await.unwrap();

    let before_all = api
        .position_of("Technical task before deployment DEV")
        .unwrap();
    let before_deploys = api.position_of("Technical task before deploy DEV").unwrap();
    let after = api.position_of("Technical task after deploy DEV").unwrap();
    let first_deploy = api.position_of("XLD-Deploy alpha").unwrap();
    let last_deploy = api.position_of("XLD-Deploy beta").unwrap();
    let script = api.position_of("Restart consumers").unwrap();

    assert!(before_all < before_deploys);
    assert!(before_deploys < first_deploy);
    assert!(first_deploy < last_deploy);
    // the after hook lands right after the LAST deploy entry, not the first,
    // and ahead of the trailing script entry
    assert!(last_deploy < after);
    assert!(after < script);

    // each hook fires once
    assert_eq!(api.tasks_titled("Technical task after deploy DEV").len(), 1);
    assert_eq!(
        api.tasks_titled("Technical task before deploy DEV").len(),
        1
    );
}

#[tokio::test]
async fn hooks_fire_up_front_without_deploy_entries() {
    let yaml = HOOK_YAML.replace(
        "    - xldeploy: [alpha]\n    - xldeploy: [beta]\n",
        "",
    );
    let (api, mut ctx) = context_from_yaml(&yaml);

    planner::create_phase_container(&mut ctx, "DEV").await.unwrap();
    let mut state = PlanState::default();
    planner::plan_phase(&mut ctx, "DEV", &mut state).await.unwrap();

    let after = api.position_of("Technical task after deploy DEV").unwrap();
    let script = api.position_of("Restart consumers").unwrap();
    assert!(after < script);
}

#[tokio::test]
async fn deploy_credential_input_is_emitted_once() {
    let (api, mut ctx) = context_from_yaml(HOOK_YAML);

    planner::create_phase_container(&mut ctx, "DEV").await.unwrap();
    let mut state = PlanState::default();
    planner::plan_phase(&mut ctx, "DEV", &mut state).await.unwrap();

    assert_eq!(
        api.tasks_titled("Please enter user password for xldeploy on DEV")
            .len(),
        1
    );
    // both deploy entries share the one deploy group
    assert_eq!(api.tasks_titled("XLD DEPLOY").len(), 1);
    let deploys: Vec<_> = api
        .tasks_snapshot()
        .into_iter()
        .filter(|t| t.title.starts_with("XLD-Deploy "))
        .collect();
    assert_eq!(deploys.len(), 2);
    assert_eq!(deploys[0].parent, deploys[1].parent);
}

const CHANGE_YAML: &str = r#"
general:
  template_name: "PAY release"
  folder: "Applications/Folder/PAY"
  iua: "NXPAY"
  phases: [BENCH]
  change_assignment_group: "OPS-PAY"
  change_approver: "approver@example.net"
auth:
  username: ops
  password: s3cret
orchestrator:
  base_url: "https://xlr.example.net"
packages:
  - name: app
    application_path: "Applications/PAY/app/"
    environment_path: "Environments/PAY/<ENV>/<XLD_env>"
phases:
  BENCH:
    - xldeploy: [app]
"#;

#[tokio::test]
async fn change_managed_phase_gets_a_companion_phase() {
    let (api, mut ctx) = context_from_yaml(CHANGE_YAML);

    planner::build_phases(&mut ctx).await.unwrap();

    let titles = api.phase_titles();
    assert_eq!(titles, vec!["CREATE_CHANGE_BENCH", "BENCH"]);

    // creation, approval wait, implement transition, close
    let snapshot = api.tasks_snapshot();
    let kinds: Vec<&str> = snapshot
        .iter()
        .filter_map(|t| t.body["pythonScript"]["type"].as_str())
        .collect();
    assert!(kinds.contains(&"servicenowNxs.CreateChangeRequest"));
    assert!(kinds.contains(&"servicenowNxs.WaitForInitialChangeApproval"));
    assert!(kinds.contains(&"servicenowNxs.AddDeploymentTask"));
    assert!(kinds.contains(&"servicenowNxs.UpdateTask"));

    // no standard model: initial validation first, then the BENCH Scheduled
    // step and Implement in the deploy phase
    let states: Vec<&str> = snapshot
        .iter()
        .filter(|t| t.body["pythonScript"]["type"] == "servicenowNxs.UpdateChangeState")
        .filter_map(|t| t.body["pythonScript"]["newState"].as_str())
        .collect();
    assert_eq!(
        states,
        vec!["Initial validation", "Scheduled", "Implement", "Closed"]
    );
}

#[tokio::test]
async fn change_date_format_variables_are_declared() {
    let (api, mut ctx) = context_from_yaml(CHANGE_YAML);

    planner::build_phases(&mut ctx).await.unwrap();

    let keys = api.variable_keys();
    for expected in [
        "BENCH_sun_start_date",
        "BENCH_sun_end_date",
        "BENCH_sun_start_format",
        "BENCH_sun_end_format",
    ] {
        assert!(keys.contains(&expected.to_string()), "missing {}", expected);
    }
}

#[tokio::test]
async fn change_assignee_is_resolved_before_the_work_starts() {
    let (api, mut ctx) = context_from_yaml(CHANGE_YAML);

    planner::build_phases(&mut ctx).await.unwrap();

    let webhooks = api.tasks_titled("Search in SUN user assign to the change");
    assert_eq!(webhooks.len(), 1);
    assert_eq!(
        webhooks[0].body["variableMapping"]["pythonScript.result"],
        "${change_user_assign}"
    );
    let url = webhooks[0].body["pythonScript"]["URL"].as_str().unwrap();
    assert!(url.contains("number%3D${BENCH.sun.id}"));

    let search = api
        .position_of("Search in SUN user assign to the change")
        .unwrap();
    let unpack = api
        .position_of("Get email of the user assigned to the change")
        .unwrap();
    let deploy = api.position_of("XLD-Deploy app").unwrap();
    assert!(search < unpack);
    assert!(unpack < deploy);
}

#[tokio::test]
async fn gates_frame_an_unmanaged_phase() {
    let (api, mut ctx) = context_from_yaml(HOOK_YAML);

    planner::build_phases(&mut ctx).await.unwrap();

    let start_gates = api.tasks_titled("Validation_release_template");
    assert_eq!(start_gates.len(), 1);
    assert_eq!(start_gates[0].kind, "xlrelease.GateTask");

    let start = api.position_of("Validation_release_template").unwrap();
    let first_deploy = api.position_of("XLD-Deploy alpha").unwrap();
    let end = api
        .position_of("DEV team: Validate installation in DEV")
        .unwrap();
    assert!(start < first_deploy);
    assert!(first_deploy < end);
}

#[tokio::test]
async fn change_phase_gates_follow_the_lifecycle() {
    let (api, mut ctx) = context_from_yaml(CHANGE_YAML);

    planner::build_phases(&mut ctx).await.unwrap();

    let snow_gates = api.tasks_titled("Validation creation SNOW ${BENCH.sun.id}");
    assert_eq!(snow_gates.len(), 1);
    assert_eq!(snow_gates[0].kind, "xlrelease.GateTask");

    // the OPS gate precedes the Implement transition
    let ops_gate = api
        .position_of("OPS TASK : Validation of the SNOW ${BENCH.sun.id}")
        .unwrap();
    let implement = api
        .position_of("Put change ${BENCH.sun.id} in state Implement")
        .unwrap();
    assert!(ops_gate < implement);

    // the trailing validation gate is skipped on BENCH
    assert!(api
        .position_of("DEV team: Validate installation in BENCH")
        .is_none());
}

#[tokio::test]
async fn after_deployment_tasks_close_out_a_managed_phase() {
    let yaml = format!(
        "{}technical_tasks:\n  after_deployment:\n    - kind: ops\n      title: \"Unfreeze traffic\"\n",
        CHANGE_YAML
    );
    let (api, mut ctx) = context_from_yaml(&yaml);

    planner::build_phases(&mut ctx).await.unwrap();

    let deploy = api.position_of("XLD-Deploy app").unwrap();
    let hook = api
        .position_of("Technical task after deployment BENCH")
        .unwrap();
    let close = api.position_of("Close Change ${BENCH.sun.id}").unwrap();
    assert!(deploy < hook);
    assert!(hook < close);
}

#[tokio::test]
async fn mirrored_change_tasks_count_by_tens() {
    let (api, mut ctx) = context_from_yaml(CHANGE_YAML);

    planner::build_phases(&mut ctx).await.unwrap();

    let mirror = api.tasks_titled("XLD-Deploy app");
    let add = mirror
        .iter()
        .find(|t| t.body["pythonScript"]["type"] == "servicenowNxs.AddDeploymentTask")
        .unwrap();
    assert_eq!(add.body["pythonScript"]["order"], 10);
    assert_eq!(
        add.body["variableMapping"]["pythonScript.taskNumber"],
        "${task_sun_xldeploy_app_BENCH}"
    );

    let close = mirror
        .iter()
        .find(|t| t.body["pythonScript"]["type"] == "servicenowNxs.UpdateTask")
        .unwrap();
    assert_eq!(close.body["pythonScript"]["status"], "Close complete");
}

#[tokio::test]
async fn standard_production_change_skips_the_approval_wait() {
    let yaml = CHANGE_YAML
        .replace("phases: [BENCH]", "phases: [PRODUCTION]")
        .replace("  BENCH:", "  PRODUCTION:")
        .replace(
            "change_approver: \"approver@example.net\"",
            "change_approver: \"approver@example.net\"\n  standard_change_model: \"MDL0042\"",
        );
    let (api, mut ctx) = context_from_yaml(&yaml);

    planner::build_phases(&mut ctx).await.unwrap();

    let snapshot = api.tasks_snapshot();
    let kinds: Vec<&str> = snapshot
        .iter()
        .filter_map(|t| t.body["pythonScript"]["type"].as_str())
        .collect();
    assert!(!kinds.contains(&"servicenowNxs.WaitForInitialChangeApproval"));

    let states: Vec<&str> = snapshot
        .iter()
        .filter(|t| t.body["pythonScript"]["type"] == "servicenowNxs.UpdateChangeState")
        .filter_map(|t| t.body["pythonScript"]["newState"].as_str())
        .collect();
    assert_eq!(states, vec!["Scheduled", "Implement", "Closed"]);

    let create = snapshot
        .iter()
        .find(|t| t.body["pythonScript"]["type"] == "servicenowNxs.CreateChangeRequest")
        .unwrap();
    assert_eq!(create.body["pythonScript"]["snowType"], "Standard");
    assert_eq!(create.body["pythonScript"]["modelNumber"], "MDL0042");

    // production keeps the trailing validation gate
    assert!(api
        .position_of("DEV team: Validate installation in PRODUCTION")
        .is_some());
}

#[tokio::test]
async fn standard_bench_change_still_waits_for_approval() {
    let yaml = CHANGE_YAML.replace(
        "change_approver: \"approver@example.net\"",
        "change_approver: \"approver@example.net\"\n  standard_change_model: \"MDL0042\"",
    );
    let (api, mut ctx) = context_from_yaml(&yaml);

    planner::build_phases(&mut ctx).await.unwrap();

    let kinds: Vec<String> = api
        .tasks_snapshot()
        .iter()
        .filter_map(|t| t.body["pythonScript"]["type"].as_str().map(String::from))
        .collect();
    assert!(kinds.contains(&"servicenowNxs.WaitForInitialChangeApproval".to_string()));
}

#[tokio::test]
async fn auto_undeploy_precedes_the_deploy_group() {
    let yaml = HOOK_YAML.replace(
        "  - name: beta\n    application_path: \"Applications/DEMO/beta/\"\n    environment_path: \"Environments/DEMO/<ENV>\"",
        "  - name: beta\n    application_path: \"Applications/DEMO/beta/\"\n    environment_path: \"Environments/DEMO/<ENV>\"\n    auto_undeploy: [alpha]",
    );
    // deploy beta first so its dependency drives the undeploy group
    let yaml = yaml.replace(
        "    - xldeploy: [alpha]\n    - xldeploy: [beta]",
        "    - xldeploy: [beta]\n    - xldeploy: [alpha]",
    );
    let (api, mut ctx) = context_from_yaml(&yaml);

    planner::create_phase_container(&mut ctx, "DEV").await.unwrap();
    let mut state = PlanState::default();
    planner::plan_phase(&mut ctx, "DEV", &mut state).await.unwrap();

    let undeploy_group = api.position_of("Undeploy before deploy DEV").unwrap();
    let undeploy = api.position_of("Undeploy alpha").unwrap();
    let deploy_group = api.position_of("XLD DEPLOY").unwrap();
    assert!(undeploy_group < undeploy);
    assert!(undeploy < deploy_group);
    // the group is created once even with two deploy entries
    assert_eq!(api.tasks_titled("Undeploy before deploy DEV").len(), 1);
}

#[tokio::test]
async fn latest_version_lookup_follows_the_option() {
    let yaml = HOOK_YAML.replace("phases: [DEV]", "phases: [DEV]\n  option_latest: true");
    let (api, mut ctx) = context_from_yaml(&yaml);

    planner::create_phase_container(&mut ctx, "DEV").await.unwrap();
    let mut state = PlanState::default();
    planner::plan_phase(&mut ctx, "DEV", &mut state).await.unwrap();

    assert_eq!(api.tasks_titled("XLD Search latest versions").len(), 1);
    assert!(api
        .position_of("XLD-Deploy Search last version : alpha")
        .is_some());

    // version variables stay hidden when resolved at runtime
    let version = api.variable_body("alpha_version").unwrap();
    assert_eq!(version["showOnReleaseStart"], false);
}
