// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! End-to-end tests driving the `rivc` binary over the scenario-1 minimal
//! file from the format's test suite: Backboard + one Artboard.
#![allow(clippy::unwrap_used)] // test fixtures, failure is the test failing

use assert_cmd::Command;
use rivc_core::bitstream::Writer;
use rivc_core::header::Header;
use rivc_core::object_stream::{self, Record};
use rivc_core::schema::{PropertyKey, PropertyType, Value};
use tempfile::tempdir;

fn minimal_container() -> Vec<u8> {
    let header = Header::new(
        7,
        0,
        0,
        vec![
            (3, PropertyType::Uint),
            (5, PropertyType::Uint),
            (7, PropertyType::Double),
            (8, PropertyType::Double),
        ],
    );
    let mut backboard = Record::new(23);
    backboard.properties.push((PropertyKey(3), Value::Uint(0)));
    let mut artboard = Record::new(1);
    artboard.properties.push((PropertyKey(3), Value::Uint(2)));
    artboard.properties.push((PropertyKey(5), Value::Uint(0)));
    artboard
        .properties
        .push((PropertyKey(7), Value::Double(500.0)));
    artboard
        .properties
        .push((PropertyKey(8), Value::Double(400.0)));

    let mut writer = Writer::new();
    header.encode(&mut writer);
    let declared = |k: u32| matches!(k, 3 | 5 | 7 | 8);
    object_stream::write_records(&mut writer, &[backboard, artboard], &declared).unwrap();
    writer.into_bytes()
}

#[test]
fn extract_then_analyze_reports_one_artboard() {
    let dir = tempdir().unwrap();
    let container_path = dir.path().join("scene.container");
    let json_path = dir.path().join("scene.json");
    std::fs::write(&container_path, minimal_container()).unwrap();

    Command::cargo_bin("rivc")
        .unwrap()
        .args([
            "extract",
            container_path.to_str().unwrap(),
            json_path.to_str().unwrap(),
            "--pretty",
        ])
        .assert()
        .success();

    let text = std::fs::read_to_string(&json_path).unwrap();
    assert!(text.contains("\"width\": 500.0"));

    Command::cargo_bin("rivc")
        .unwrap()
        .args(["analyze", container_path.to_str().unwrap(), "--json"])
        .assert()
        .success()
        .stdout(predicates::str::contains("\"count\":1"));
}

#[test]
fn convert_round_trips_extracted_json() {
    let dir = tempdir().unwrap();
    let container_path = dir.path().join("scene.container");
    let json_path = dir.path().join("scene.json");
    let roundtrip_path = dir.path().join("roundtrip.container");
    std::fs::write(&container_path, minimal_container()).unwrap();

    Command::cargo_bin("rivc")
        .unwrap()
        .args([
            "extract",
            container_path.to_str().unwrap(),
            json_path.to_str().unwrap(),
        ])
        .assert()
        .success();

    Command::cargo_bin("rivc")
        .unwrap()
        .args([
            "convert",
            json_path.to_str().unwrap(),
            roundtrip_path.to_str().unwrap(),
        ])
        .assert()
        .success();

    Command::cargo_bin("rivc")
        .unwrap()
        .args([
            "diff",
            container_path.to_str().unwrap(),
            roundtrip_path.to_str().unwrap(),
        ])
        .assert()
        .success();
}

#[test]
fn analyze_rejects_unparseable_file() {
    let dir = tempdir().unwrap();
    let bogus_path = dir.path().join("bogus.container");
    std::fs::write(&bogus_path, b"NOPE").unwrap();

    Command::cargo_bin("rivc")
        .unwrap()
        .args(["analyze", bogus_path.to_str().unwrap()])
        .assert()
        .code(2);
}
