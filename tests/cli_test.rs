//! CLI command execution tests using temporary input files

use std::io::Write;
use std::path::PathBuf;

use clinical_threshold_rl::cli::{execute_command, Commands};
use clinical_threshold_rl::config::Config;
use clinical_threshold_rl::Domain;
use serde_json::Value;
use tempfile::NamedTempFile;

fn input_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn path(file: &NamedTempFile) -> PathBuf {
    file.path().to_path_buf()
}

const TRAINING_INPUT: &str = r#"{
    "features": [[1.0, 5.0], [3.0, 1.0], [1.5, 4.0], [2.8, 1.5]],
    "labels": [0, 1, 0, 1],
    "scorer": {"type": "logistic", "weights": [2.0, -2.0], "bias": 0.0},
    "scaler": {"mean": [2.0, 3.0], "scale": [1.0, 2.0]}
}"#;

#[test]
fn test_sweep_command_outputs_threshold_result() {
    let file = input_file(r#"{"labels": [0, 1, 0, 1, 0], "probabilities": [0.2, 0.8, 0.3, 0.9, 0.4]}"#);
    let result = execute_command(
        Commands::Sweep {
            domain: Domain::Dengue,
            input: path(&file),
        },
        &Config::default(),
    );
    assert_eq!(result.exit_code, 0, "{}", result.message);

    let json: Value = serde_json::from_str(&result.message).unwrap();
    let threshold = json["threshold"].as_f64().unwrap();
    assert!((threshold - 0.42).abs() < 1e-9);
    assert_eq!(json["metrics"]["domain"], "dengue");
}

#[test]
fn test_evaluate_batch_command_with_unknown_domain_falls_back() {
    let file = input_file(
        r#"{"results": [
            {"prediction": 1, "probability": 0.9, "status": "success", "true_label": 1},
            {"prediction": 0, "probability": 0.4, "status": "timeout"},
            {"prediction": 0, "probability": 0.2, "status": "success"}
        ]}"#,
    );
    let result = execute_command(
        Commands::EvaluateBatch {
            domain: "cardiology".to_string(),
            input: path(&file),
        },
        &Config::default(),
    );
    assert_eq!(result.exit_code, 0, "{}", result.message);

    let json: Value = serde_json::from_str(&result.message).unwrap();
    assert_eq!(json["domain"], "dengue");
    assert_eq!(json["total_records"], 3);
    assert_eq!(json["processed_records"], 2);
    assert_eq!(json["skipped_records"], 1);
    assert_eq!(json["unlabeled_records"], 1);
    assert!(json["individual_rewards"][1]["reward"].is_null());
}

#[test]
fn test_train_command_reports_run() {
    let file = input_file(TRAINING_INPUT);
    let result = execute_command(
        Commands::Train {
            domain: Domain::Kidney,
            input: path(&file),
            episodes: Some(5),
            seed: Some(3),
        },
        &Config::default(),
    );
    assert_eq!(result.exit_code, 0, "{}", result.message);

    let json: Value = serde_json::from_str(&result.message).unwrap();
    assert_eq!(json["report"]["episodes"], 5);
    assert_eq!(json["report"]["agent_kind"], "tabular");
    assert_eq!(json["report"]["episode_rewards"].as_array().unwrap().len(), 5);
    let threshold = json["recommended_threshold"].as_f64().unwrap();
    assert!(threshold > 0.0 && threshold <= 1.0);
}

#[test]
fn test_evaluate_model_command() {
    let file = input_file(TRAINING_INPUT);
    let result = execute_command(
        Commands::EvaluateModel {
            domain: Domain::MentalHealth,
            input: path(&file),
        },
        &Config::default(),
    );
    assert_eq!(result.exit_code, 0, "{}", result.message);

    let json: Value = serde_json::from_str(&result.message).unwrap();
    assert!(json.get("improvement").is_some());
    assert_eq!(json["domain"], "mental_health");
}

#[test]
fn test_mismatched_scaler_is_reported() {
    let file = input_file(
        r#"{
            "features": [[1.0, 2.0]],
            "labels": [1],
            "scorer": {"type": "logistic", "weights": [1.0, 1.0]},
            "scaler": {"mean": [0.0], "scale": [1.0]}
        }"#,
    );
    let result = execute_command(
        Commands::EvaluateModel {
            domain: Domain::Dengue,
            input: path(&file),
        },
        &Config::default(),
    );
    assert_eq!(result.exit_code, 1);
    assert!(result.message.contains("expected 1 features, got 2"));
}

#[test]
fn test_malformed_json_is_reported() {
    let file = input_file("{not json");
    let result = execute_command(
        Commands::Sweep {
            domain: Domain::Kidney,
            input: path(&file),
        },
        &Config::default(),
    );
    assert_eq!(result.exit_code, 1);
    assert!(result.message.contains("JSON error"));
}
