use atb_cli::{load_scenario, simulate_file};
use atb_core::BattleOutcome;
use std::fs;
use tempfile::TempDir;

const SCENARIO: &str = r#"{
    "schema_version": 1,
    "config": { "mode": "strict_queue", "seed": 5 },
    "content": { "skills": [{ "id": 1, "name": "Attack", "is_attack": true }] },
    "members": [
        { "id": 1, "side": "party", "agility": 14, "hp": 120, "power": 40 },
        { "id": 2, "side": "troop", "agility": 9, "hp": 50, "power": 8 }
    ]
}"#;

#[test]
fn test_simulate_file_writes_trace() {
    let dir = TempDir::new().unwrap();
    let scenario = dir.path().join("battle.json");
    let out = dir.path().join("trace.json");
    fs::write(&scenario, SCENARIO).unwrap();

    let response = simulate_file(&scenario, Some(&out)).unwrap();
    assert_eq!(response.outcome, Some(BattleOutcome::Victory));

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written["outcome"], "victory");
    assert_eq!(written["events"].as_array().unwrap().len(), response.events.len());
}

#[test]
fn test_missing_scenario_reports_path() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.json");
    let err = simulate_file(&missing, None).unwrap_err();
    assert!(err.to_string().contains("nope.json"));
}

#[test]
fn test_bad_schema_version_fails() {
    let dir = TempDir::new().unwrap();
    let scenario = dir.path().join("old.json");
    let stale = SCENARIO.replace("\"schema_version\": 1", "\"schema_version\": 0");
    fs::write(&scenario, stale).unwrap();

    assert!(load_scenario(&scenario).is_ok());
    let err = simulate_file(&scenario, None).unwrap_err();
    assert!(format!("{err:#}").contains("schema version"));
}
