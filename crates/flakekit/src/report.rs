//! Reporting: aggregate diffs and write report files.
//!
//! Layout of the report directory:
//!
//! - `<host>.txt`: host header, revision transition, rule, diff lines
//! - `diff_lists.json`: `{ "<host>": ["<line>", ...] }` for every host diffed
//! - `diff_list.txt`: transition header, rule, unique sorted lines of all hosts
//!
//! [`ReportMode::FlatOnly`] writes `diff_list.txt` alone. Files are
//! overwritten whole; nothing is appended.

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::{
    AggregateDiff, DiffOutcome, DiffReport, PinState, ReportMode, file_name, rule,
};

/// File holding the structured per-host record.
pub const JSON_FILE: &str = "diff_lists.json";

/// File holding the aggregate report.
pub const AGGREGATE_FILE: &str = "diff_list.txt";

/// Header line describing the revision transition of `input`.
pub fn revision_header(input: &str, before: PinState, after: PinState) -> String {
    format!("Went from {input} revision {before} -> {after}")
}

/// Union of every successful host diff, deduplicated and sorted.
pub fn aggregate(diffs: &DiffReport, header: impl Into<String>) -> AggregateDiff {
    let lines: BTreeSet<&str> = diffs
        .records()
        .flat_map(|(_, record)| record.lines().iter().map(String::as_str))
        .collect();

    AggregateDiff {
        header: header.into(),
        lines: lines.into_iter().map(ToString::to_string).collect(),
    }
}

/// Text of the report for one host.
pub fn host_report(host: &str, before: PinState, after: PinState, outcome: &DiffOutcome) -> String {
    let body = match outcome {
        DiffOutcome::Changed(record) => record.lines().join("\n"),
        DiffOutcome::Failed(message) => format!("diff failed: {message}"),
    };
    format!("Host: {host}\n{before} -> {after}\n{}\n{body}", rule())
}

/// Structured record mapping each successfully diffed host to its lines.
pub fn diff_record_json(diffs: &DiffReport) -> Value {
    let map: Map<String, Value> = diffs
        .records()
        .map(|(host, record)| {
            let lines = record.lines().iter().cloned().map(Value::String).collect();
            (host.to_string(), Value::Array(lines))
        })
        .collect();
    Value::Object(map)
}

/// Where and how to write reports.
#[derive(Debug, Clone)]
pub struct ReportTarget<'a> {
    /// Directory receiving the report files
    pub dir: &'a Path,
    /// Which files to write
    pub mode: ReportMode,
    /// Revision before the update
    pub before: PinState,
    /// Revision after the update
    pub after: PinState,
}

/// Write report files, calling `on_host` with each host report right after it is written.
///
/// Returns the paths written, in write order.
pub fn persist(
    target: &ReportTarget<'_>,
    diffs: &DiffReport,
    aggregate: &AggregateDiff,
    on_host: &mut dyn FnMut(&str, &str),
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(target.dir)?;
    let mut written = Vec::new();

    if target.mode == ReportMode::PerHost {
        let json_path = target.dir.join(JSON_FILE);
        fs::write(&json_path, serde_json::to_string_pretty(&diff_record_json(diffs))?)?;
        written.push(json_path);

        for (host, outcome) in diffs.iter() {
            let text = host_report(host, target.before, target.after, outcome);
            let path = target.dir.join(format!("{}.txt", file_name(host)));
            fs::write(&path, &text)?;
            log::debug!("Wrote {}", path.display());
            written.push(path);
            on_host(host, &text);
        }
    }

    let aggregate_path = target.dir.join(AGGREGATE_FILE);
    fs::write(&aggregate_path, aggregate.render())?;
    written.push(aggregate_path);

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DiffRecord;
    use tempfile::TempDir;

    fn record(lines: &[&str]) -> DiffOutcome {
        DiffOutcome::Changed(DiffRecord::new(lines.iter().map(ToString::to_string).collect()))
    }

    fn sample() -> DiffReport {
        let mut diffs = DiffReport::new();
        diffs.insert("h1", record(&["x->y"]));
        diffs.insert("h2", record(&["x->y", "z->w"]));
        diffs
    }

    #[test]
    fn test_aggregate_dedup_and_sort() {
        let aggregate = aggregate(&sample(), "header");
        assert_eq!(aggregate.lines, ["x->y", "z->w"]);
        assert_eq!(aggregate.header, "header");
    }

    #[test]
    fn test_aggregate_is_sorted_without_duplicates() {
        let mut diffs = DiffReport::new();
        diffs.insert("a", record(&["zlib 1.3 -> 1.3.1", "bash 5.2 -> 5.3", "curl 8.5 -> 8.6"]));
        diffs.insert("b", record(&["curl 8.5 -> 8.6", "acl 2.3 -> 2.3.2"]));
        diffs.insert("c", DiffOutcome::Failed("boom".to_string()));

        let lines = aggregate(&diffs, "h").lines;
        let mut expected = lines.clone();
        expected.sort();
        expected.dedup();
        assert_eq!(lines, expected);
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let diffs = sample();
        let first = aggregate(&diffs, "header").render();
        let second = aggregate(&diffs, "header").render();
        assert_eq!(first, second);
    }

    #[test]
    fn test_host_report_layout() {
        let before = PinState::new(1);
        let after = PinState::new(2);
        let text = host_report("h2", before, after, &record(&["x->y", "z->w"]));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Host: h2");
        assert_eq!(lines[1], format!("{before} -> {after}"));
        assert_eq!(lines[2], rule());
        assert_eq!(&lines[3..], ["x->y", "z->w"]);
    }

    #[test]
    fn test_host_report_failure_marker() {
        let text = host_report(
            "h1",
            PinState::new(1),
            PinState::new(2),
            &DiffOutcome::Failed("exit 1".to_string()),
        );
        assert!(text.ends_with("diff failed: exit 1"));
    }

    #[test]
    fn test_json_record_keeps_host_order() {
        let mut diffs = DiffReport::new();
        diffs.insert("zeta", record(&["a"]));
        diffs.insert("alpha", record(&["b"]));
        diffs.insert("broken", DiffOutcome::Failed("x".to_string()));

        let json = serde_json::to_string(&diff_record_json(&diffs)).unwrap();
        assert_eq!(json, r#"{"zeta":["a"],"alpha":["b"]}"#);
    }

    #[test]
    fn test_persist_per_host() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("diff_lists");
        let diffs = sample();
        let agg = aggregate(&diffs, "Went from nixpkgs revision a -> b");
        let target = ReportTarget {
            dir: &dir,
            mode: ReportMode::PerHost,
            before: PinState::new(1),
            after: PinState::new(2),
        };

        let mut echoed = Vec::new();
        let written = persist(&target, &diffs, &agg, &mut |host, _| {
            echoed.push(host.to_string());
        })
        .unwrap();

        assert_eq!(echoed, ["h1", "h2"]);
        assert_eq!(written.len(), 4);
        assert!(dir.join("h1.txt").exists());
        assert!(dir.join("h2.txt").exists());

        let json: Value =
            serde_json::from_str(&fs::read_to_string(dir.join(JSON_FILE)).unwrap()).unwrap();
        assert_eq!(json["h2"][1], "z->w");

        let flat = fs::read_to_string(dir.join(AGGREGATE_FILE)).unwrap();
        assert_eq!(
            flat,
            format!("Went from nixpkgs revision a -> b\n{}\nx->y\nz->w", rule())
        );
    }

    #[test]
    fn test_persist_flat_only() {
        let tmp = TempDir::new().unwrap();
        let diffs = sample();
        let agg = aggregate(&diffs, "header");
        let target = ReportTarget {
            dir: tmp.path(),
            mode: ReportMode::FlatOnly,
            before: PinState::new(1),
            after: PinState::new(2),
        };

        let mut calls = 0;
        let written = persist(&target, &diffs, &agg, &mut |_, _| calls += 1).unwrap();

        assert_eq!(calls, 0);
        assert_eq!(written, [tmp.path().join(AGGREGATE_FILE)]);
        assert!(!tmp.path().join(JSON_FILE).exists());
        assert!(!tmp.path().join("h1.txt").exists());
    }

    #[test]
    fn test_persist_keeps_host_files_inside_dir() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("reports");
        let mut diffs = DiffReport::new();
        diffs.insert("../escape", record(&["a"]));
        diffs.insert("nested/host", record(&["b"]));
        let agg = aggregate(&diffs, "header");
        let target = ReportTarget {
            dir: &dir,
            mode: ReportMode::PerHost,
            before: PinState::new(1),
            after: PinState::new(2),
        };

        let written = persist(&target, &diffs, &agg, &mut |_, _| {}).unwrap();

        assert!(written.iter().all(|p| p.parent() == Some(dir.as_path())));
        assert!(dir.join(".._escape.txt").exists());
        assert!(dir.join("nested_host.txt").exists());
        assert!(!tmp.path().join("escape.txt").exists());

        let json: Value =
            serde_json::from_str(&fs::read_to_string(dir.join(JSON_FILE)).unwrap()).unwrap();
        assert_eq!(json["nested/host"][0], "b");
    }

    #[test]
    fn test_persist_overwrites() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(AGGREGATE_FILE), "stale content that is longer").unwrap();
        let agg = aggregate(&DiffReport::new(), "header");
        let target = ReportTarget {
            dir: tmp.path(),
            mode: ReportMode::FlatOnly,
            before: PinState::new(1),
            after: PinState::new(1),
        };
        persist(&target, &DiffReport::new(), &agg, &mut |_, _| {}).unwrap();
        let flat = fs::read_to_string(tmp.path().join(AGGREGATE_FILE)).unwrap();
        assert_eq!(flat, format!("header\n{}", rule()));
    }
}
