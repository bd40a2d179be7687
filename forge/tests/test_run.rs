//! End-to-end generation against the recording fake

mod common;

use common::{config_from_yaml, RecordingApi};

#[tokio::test]
async fn run_builds_the_template_end_to_end() {
    let api = RecordingApi::new();
    let config = config_from_yaml(common::BASE_YAML);

    let url = relforge::app::run::run(api.clone(), config, "https://xlr.example.net/")
        .await
        .unwrap();

    assert!(url.starts_with("https://xlr.example.net/#/templates/template-"));
    assert_eq!(api.phase_titles(), vec!["DEV".to_string()]);

    let keys = api.variable_keys();
    assert!(keys.contains(&"IUA".to_string()));
    assert!(keys.contains(&"ops_username_api".to_string()));

    // the single deploy entry lands in the DEV phase
    assert!(api.position_of("XLD-Deploy app").is_some());
    assert_eq!(api.tasks_titled("XLD DEPLOY").len(), 1);
}
