use std::path::PathBuf;

use clap::Parser;
use pacsbridge::cli::{execute, Cli, Cmd};
use pacsbridge::config::Config;

#[test]
fn parses_echo_with_global_overrides() {
    let cli = Cli::try_parse_from([
        "pacsbridge",
        "echo",
        "ORTHANC@127.0.0.1:4242",
        "--aet",
        "WORKSTATION",
        "-t",
        "7",
    ])
    .expect("valid arguments");

    let Cmd::Echo { node } = &cli.cmd else {
        panic!("expected echo, got {:?}", cli.cmd);
    };
    assert_eq!(node.ae_title.as_str(), "ORTHANC");
    assert_eq!(node.port, 4242);

    let mut config = Config::default();
    cli.apply_overrides(&mut config).unwrap();
    assert_eq!(config.scu.local_aet.as_str(), "WORKSTATION");
    assert_eq!(config.scu.timeout_seconds, 7);
}

#[test]
fn parses_find_criteria() {
    let cli = Cli::try_parse_from([
        "pacsbridge",
        "find",
        "PACS@pacs:104",
        "--patient-id",
        "P1",
        "--modality",
        "CT",
    ])
    .unwrap();

    match cli.cmd {
        Cmd::Find {
            patient_id,
            modality,
            patient_name,
            ..
        } => {
            assert_eq!(patient_id.as_deref(), Some("P1"));
            assert_eq!(modality.as_deref(), Some("CT"));
            assert_eq!(patient_name, None);
        }
        other => panic!("expected find, got {:?}", other),
    }
}

#[test]
fn store_requires_files() {
    assert!(Cli::try_parse_from(["pacsbridge", "store", "PACS@pacs:104"]).is_err());

    let cli = Cli::try_parse_from(["pacsbridge", "store", "PACS@pacs:104", "a.dcm", "b.dcm"]).unwrap();
    match cli.cmd {
        Cmd::Store { files, .. } => {
            assert_eq!(files, vec![PathBuf::from("a.dcm"), PathBuf::from("b.dcm")])
        }
        other => panic!("expected store, got {:?}", other),
    }
}

#[test]
fn rejects_malformed_node() {
    assert!(Cli::try_parse_from(["pacsbridge", "echo", "pacs:104"]).is_err());
    assert!(Cli::try_parse_from(["pacsbridge", "echo", "A_TITLE_LONGER_THAN_16@pacs:104"]).is_err());
}

#[test]
fn rejects_invalid_aet_override() {
    let cli = Cli::try_parse_from(["pacsbridge", "echo", "PACS@pacs:104", "--aet", "BAD\\AET"]).unwrap();
    let mut config = Config::default();
    assert!(cli.apply_overrides(&mut config).is_err());
}

#[test]
fn invalid_move_prints_error_result_as_json() {
    let cli = Cli::try_parse_from(["pacsbridge", "move", "PACS@127.0.0.1:104", " "]).unwrap();
    let config = Config::default();
    let scu = dimse::DimseScu::new(&config.scu);

    let mut out = Vec::new();
    let result = execute(&scu, &cli, &config, &mut out).unwrap();
    assert!(!result.is_ok());

    let text = String::from_utf8(out).unwrap();
    let line: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
    assert_eq!(line["event"], "result");
    assert_eq!(line["status"], "Error");
    assert!(line["message"].as_str().unwrap().contains("Invalid parameters"));
}
