use std::{fs, io::Write};

use jiff::Timestamp;
use skein_core::{Shape, Signature};
use tempfile::TempDir;

use super::*;

fn signature() -> Signature {
    Signature {
        problem: "demo".into(),
        variables: vec![
            Shape {
                name: "x".into(),
                len: 2,
            },
            Shape {
                name: "y".into(),
                len: 1,
            },
        ],
        constraints: vec![Shape {
            name: "g".into(),
            len: 1,
        }],
        objectives: vec!["f".into()],
    }
}

fn record(index: u64, feasible: bool) -> Record {
    let base = index as f64;
    Record {
        index,
        timestamp: Timestamp::now(),
        x: vec![base + 0.1, base + 0.2, 1.0 / 3.0],
        objectives: vec![base * 1.5],
        constraints: vec![-base],
        gradient: None,
        iteration: Some(Iteration {
            major: index,
            minor: 0,
        }),
        feasible,
        warnings: Vec::new(),
    }
}

fn write_records(dir: &TempDir, count: u64) -> std::path::PathBuf {
    let path = dir.path().join("history.jsonl");
    let mut writer = HistoryWriter::create(&path, &signature()).unwrap();
    for index in 0..count {
        writer.append(&record(index, index % 2 == 0)).unwrap();
    }
    path
}

#[test]
fn exact_restart_returns_the_last_record() {
    let dir = TempDir::new().unwrap();
    let path = write_records(&dir, 4);

    let restart = restart(&path, RestartMode::Exact, &signature()).unwrap();

    assert_eq!(restart.record().index, 3);
    assert_eq!(restart.records().len(), 4);
    assert_eq!(restart.record(), &read(&path).unwrap().records[3]);
}

#[test]
fn values_round_trip_bit_for_bit() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bits.jsonl");
    let mut original = record(0, true);
    original.x = vec![0.1 + 0.2, f64::MIN_POSITIVE, 1e-300, -123_456.789_012_345_67];
    original.gradient = Some(GradientRecord {
        objectives: vec![vec![std::f64::consts::PI]],
        jacobian: vec![2.0 / 3.0],
    });
    original.warnings = vec!["step reflected".into()];

    let mut writer = HistoryWriter::create(&path, &signature()).unwrap();
    writer.append(&original).unwrap();

    let log = read(&path).unwrap();
    let restored = &log.records[0];
    assert_eq!(restored, &original);
    for (a, b) in restored.x.iter().zip(&original.x) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn interrupted_final_write_is_ignored() {
    let dir = TempDir::new().unwrap();
    let path = write_records(&dir, 3);

    // Simulate a crash halfway through writing record 3.
    let mut line = serde_json::to_vec(&record::EntryRef::Record(&record(3, true))).unwrap();
    line.truncate(line.len() / 2);
    fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .unwrap()
        .write_all(&line)
        .unwrap();

    let log = read(&path).unwrap();
    assert!(log.truncated);
    assert_eq!(log.records.len(), 3);

    let restart = restart(&path, RestartMode::Exact, &signature()).unwrap();
    assert_eq!(restart.record().index, 2);
}

#[test]
fn corruption_before_the_last_line_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = write_records(&dir, 3);
    let text = fs::read_to_string(&path).unwrap();
    let mut lines: Vec<&str> = text.lines().collect();
    lines[2] = "{\"kind\":\"record\",\"index\":";
    fs::write(&path, lines.join("\n") + "\n").unwrap();

    let result = read(&path);

    assert!(matches!(result, Err(RestartUnavailable::Corrupt { line: 3, .. })));
}

#[test]
fn non_increasing_indices_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dupes.jsonl");
    let header = serde_json::to_string(&record::EntryRef::Header(&Header::new(signature()))).unwrap();
    let first = serde_json::to_string(&record::EntryRef::Record(&record(5, true))).unwrap();
    let second = serde_json::to_string(&record::EntryRef::Record(&record(5, true))).unwrap();
    fs::write(&path, format!("{header}\n{first}\n{second}\n")).unwrap();

    assert!(matches!(
        read(&path),
        Err(RestartUnavailable::NonMonotonic {
            line: 3,
            index: 5,
            previous: 5,
        })
    ));
}

#[test]
fn writer_rejects_out_of_order_records() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("order.jsonl");
    let mut writer = HistoryWriter::create(&path, &signature()).unwrap();
    writer.append(&record(2, true)).unwrap();

    let result = writer.append(&record(1, true));

    assert!(matches!(result, Err(HistoryError::OutOfOrder { index: 1, last: 2 })));
    assert_eq!(writer.last_index(), Some(2));
}

#[test]
fn missing_or_empty_files_are_unavailable() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.jsonl");
    assert!(matches!(
        restart(&missing, RestartMode::Exact, &signature()),
        Err(RestartUnavailable::Io { .. })
    ));

    let empty = dir.path().join("empty.jsonl");
    fs::write(&empty, "").unwrap();
    assert!(matches!(read(&empty), Err(RestartUnavailable::Empty)));

    let headless = dir.path().join("headless.jsonl");
    let line = serde_json::to_string(&record::EntryRef::Record(&record(0, true))).unwrap();
    fs::write(&headless, line + "\n").unwrap();
    assert!(matches!(read(&headless), Err(RestartUnavailable::MissingHeader)));
}

#[test]
fn header_only_file_has_no_records() {
    let dir = TempDir::new().unwrap();
    let path = write_records(&dir, 0);

    assert!(matches!(
        restart(&path, RestartMode::Exact, &signature()),
        Err(RestartUnavailable::NoRecords)
    ));
}

#[test]
fn exact_restart_requires_matching_variables() {
    let dir = TempDir::new().unwrap();
    let path = write_records(&dir, 2);
    let mut changed = signature();
    changed.variables[1].len = 2;

    assert!(matches!(
        restart(&path, RestartMode::Exact, &changed),
        Err(RestartUnavailable::SignatureMismatch)
    ));
}

#[test]
fn exact_restart_survives_an_added_constraint() {
    let dir = TempDir::new().unwrap();
    let path = write_records(&dir, 3);
    let mut extended = signature();
    extended.constraints.push(Shape {
        name: "h".into(),
        len: 2,
    });

    let restart = restart(&path, RestartMode::Exact, &extended).unwrap();

    assert_eq!(restart.record().index, 2);
    assert!(!restart.signature().matches(&extended));
}

#[test]
fn warm_restart_uses_last_feasible_record_and_maps_groups() {
    let dir = TempDir::new().unwrap();
    let path = write_records(&dir, 4);

    let mut current = signature();
    current.variables = vec![
        Shape {
            name: "y".into(),
            len: 1,
        },
        Shape {
            name: "z".into(),
            len: 2,
        },
        Shape {
            name: "x".into(),
            len: 2,
        },
    ];

    let restart = restart(&path, RestartMode::Warm, &current).unwrap();
    assert_eq!(restart.record().index, 2);

    let start = restart.starting_point(&current, &[9.0; 5]);
    assert_eq!(start, vec![1.0 / 3.0, 9.0, 9.0, 2.1, 2.2]);
}

#[test]
fn warm_restart_without_feasible_records_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("infeasible.jsonl");
    let mut writer = HistoryWriter::create(&path, &signature()).unwrap();
    writer.append(&record(0, false)).unwrap();

    assert!(matches!(
        restart(&path, RestartMode::Warm, &signature()),
        Err(RestartUnavailable::NoFeasibleRecord)
    ));
}

#[test]
fn reopened_writer_continues_after_an_interrupted_write() {
    let dir = TempDir::new().unwrap();
    let path = write_records(&dir, 3);
    let mut line = serde_json::to_vec(&record::EntryRef::Record(&record(3, true))).unwrap();
    line.truncate(line.len() / 3);
    fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .unwrap()
        .write_all(&line)
        .unwrap();

    let mut writer = HistoryWriter::append_to(&path, &signature()).unwrap();
    assert_eq!(writer.last_index(), Some(2));
    writer.append(&record(3, true)).unwrap();
    writer.append(&record(4, false)).unwrap();

    let log = read(&path).unwrap();
    assert!(!log.truncated);
    let indices: Vec<u64> = log.records.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
}

#[test]
fn reopening_needs_the_same_structure() {
    let dir = TempDir::new().unwrap();
    let path = write_records(&dir, 1);
    let mut changed = signature();
    changed.objectives.push("g".into());

    assert!(matches!(
        HistoryWriter::append_to(&path, &changed),
        Err(HistoryError::SignatureMismatch { .. })
    ));
    assert!(matches!(
        HistoryWriter::append_to(dir.path().join("missing.jsonl"), &signature()),
        Err(HistoryError::Unreadable(RestartUnavailable::Io { .. }))
    ));
}
