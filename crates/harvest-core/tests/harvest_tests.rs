//! End-to-end runs over local checkouts written to a temp directory.

use std::fs;
use std::path::Path;

use harvest_core::clean::dedup::DedupKeyMode;
use harvest_core::collect::local::LocalCheckouts;
use harvest_core::models::DATASET_COLUMNS;
use harvest_core::store::{CsvSink, MultiSink, RowSink, SqliteSink};
use harvest_core::{HarvestConfig, HarvestError, HarvestStats, Harvester};

fn write(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

const GREETER: &str = "\
package demo;

public class Greeter {
  private final String name;

  public Greeter(String name) {
    this.name = name;
  }

  @Override
  public String toString() {
    return \"Greeter(\" + name + \")\";
  }

  public String greet(String other) {
    String line = \"Hello, \" + other;
    return line + \" from \" + name;
  }

  void noop() { }
}
";

/// Shared with `Greeter.toString` in the first repository.
const COPY: &str = "\
class Copy {
  @Override
  public String toString() {
    return \"Greeter(\" + name + \")\";
  }

  int answer() {
    int base = 40;
    return base + 2;
  }
}
";

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "alpha/src/demo/Greeter.java", GREETER.as_bytes());
        write(root, "alpha/src/demo/Broken.java", b"public class Broken { void f( }");
        write(root, "alpha/README.md", b"# alpha");
        write(root, "beta/Copy.java", COPY.as_bytes());
        write(root, "beta/Latin1.java", b"class L { String s = \"caf\xe9\"; }");
        write(root, "gamma/Secret.java", GREETER.as_bytes());
        write(
            root,
            "manifest.json",
            br#"{"repositories": [
                {"name": "acme/alpha", "license": "apache-2.0", "path": "alpha", "commit_sha": "a1a1"},
                {"name": "acme/beta", "license": "MIT", "path": "beta", "commit_sha": "b2b2",
                 "file_commits": {"Copy.java": "b3b3"}},
                {"name": "acme/gamma", "license": "proprietary", "path": "gamma", "commit_sha": "c3c3"}
            ]}"#,
        );
        Self { dir }
    }

    fn manifest(&self) -> std::path::PathBuf {
        self.dir.path().join("manifest.json")
    }

    fn run(&self, config: HarvestConfig, sink: &mut dyn RowSink) -> Result<HarvestStats, HarvestError> {
        let source = LocalCheckouts::from_manifest(&self.manifest(), &config)?;
        Harvester::new(config)?.run(&source, &source, sink)
    }
}

fn read_rows(path: &Path) -> Vec<csv::StringRecord> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers, DATASET_COLUMNS);
    reader.records().map(|r| r.unwrap()).collect()
}

#[test]
fn manifest_to_csv_end_to_end() {
    let fixture = Fixture::new();
    let out = fixture.dir.path().join("dataset.csv");
    let mut sink = CsvSink::create(&out).unwrap();
    let stats = fixture.run(HarvestConfig::default(), &mut sink).unwrap();
    drop(sink);

    let rows = read_rows(&out);
    let keys: Vec<(&str, &str, &str)> = rows.iter().map(|r| (&r[0], &r[3], &r[4])).collect();
    assert_eq!(
        keys,
        vec![
            ("acme/alpha", "src/demo/Greeter.java", "toString"),
            ("acme/alpha", "src/demo/Greeter.java", "greet"),
            ("acme/beta", "Copy.java", "answer"),
        ]
    );

    let to_string = &rows[0];
    assert_eq!(&to_string[1], "https://github.com/acme/alpha");
    assert_eq!(&to_string[2], "a1a1");
    assert_eq!(&to_string[5], "11");
    assert_eq!(&to_string[6], "13");
    assert!(to_string[7].contains("public String toString()"));
    assert!(to_string[8].starts_with("  public String toString() {"));
    let tokens: Vec<String> = serde_json::from_str(&to_string[9]).unwrap();
    assert_eq!(&tokens[..4], ["public", "String", "toString", "("]);
    assert_eq!(&rows[2][2], "b3b3");

    assert_eq!(stats.repositories_seen, 2);
    assert_eq!(stats.repositories_failed, 0);
    assert_eq!(stats.repositories_skipped_license, 1);
    assert_eq!(stats.files_seen, 4);
    assert_eq!(stats.files_failed_parse, 1);
    assert_eq!(stats.files_failed_encoding, 1);
    assert_eq!(stats.rejected.too_short, 1);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.rows_written, 3);
}

#[test]
fn location_keys_keep_cross_repository_copies() {
    let fixture = Fixture::new();
    let mut sink = harvest_core::store::MemorySink::default();
    let config = HarvestConfig {
        dedup_key: DedupKeyMode::Location,
        ..HarvestConfig::default()
    };
    let stats = fixture.run(config, &mut sink).unwrap();
    assert_eq!(stats.duplicates, 0);
    let copies = sink
        .rows
        .iter()
        .filter(|r| r.method_name == "toString")
        .count();
    assert_eq!(copies, 2);
}

#[test]
fn constructors_are_harvested_when_enabled() {
    let fixture = Fixture::new();
    let mut sink = harvest_core::store::MemorySink::default();
    let config = HarvestConfig {
        include_constructors: true,
        ..HarvestConfig::default()
    };
    fixture.run(config, &mut sink).unwrap();
    assert_eq!(sink.rows[0].method_name, "Greeter");
    assert_eq!((sink.rows[0].start_line, sink.rows[0].end_line), (6, 8));
}

#[test]
fn csv_and_sqlite_receive_the_same_rows() {
    let fixture = Fixture::new();
    let csv_path = fixture.dir.path().join("dataset.csv");
    let db_path = fixture.dir.path().join("dataset.sqlite");

    let mut sink = MultiSink::new();
    sink.push(Box::new(CsvSink::create(&csv_path).unwrap()));
    sink.push(Box::new(
        SqliteSink::create(&db_path, DedupKeyMode::Code).unwrap(),
    ));
    let stats = fixture.run(HarvestConfig::default(), &mut sink).unwrap();
    drop(sink);

    let db = SqliteSink::resume(&db_path, DedupKeyMode::Code).unwrap();
    assert_eq!(db.row_count().unwrap(), stats.rows_written);
    assert_eq!(read_rows(&csv_path).len(), stats.rows_written);
}

#[test]
fn resumed_run_writes_nothing_new() {
    let fixture = Fixture::new();
    let db_path = fixture.dir.path().join("dataset.sqlite");
    let config = HarvestConfig::default();
    let source = LocalCheckouts::from_manifest(&fixture.manifest(), &config).unwrap();
    let harvester = Harvester::new(config).unwrap();

    let mut first = SqliteSink::create(&db_path, DedupKeyMode::Code).unwrap();
    let written = harvester.run(&source, &source, &mut first).unwrap().rows_written;
    drop(first);

    let mut second = SqliteSink::resume(&db_path, DedupKeyMode::Code).unwrap();
    let seen = second.seen_keys().unwrap();
    let (stats, seen) = harvester
        .run_with_seen(&source, &source, &mut second, seen)
        .unwrap();
    assert_eq!(stats.rows_written, 0);
    assert_eq!(stats.duplicates, written + 1);
    assert_eq!(seen.len(), written);
    assert_eq!(second.row_count().unwrap(), written);
}

#[test]
fn every_repository_failing_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "one/Bad.java", b"class {");
    write(
        dir.path(),
        "manifest.json",
        br#"{"repositories": [
            {"name": "x/one", "license": "mit", "path": "one", "commit_sha": "1"},
            {"name": "x/missing", "license": "mit", "path": "nowhere", "commit_sha": "2"}
        ]}"#,
    );
    let config = HarvestConfig::default();
    let source = LocalCheckouts::from_manifest(&dir.path().join("manifest.json"), &config).unwrap();
    let mut sink = harvest_core::store::MemorySink::default();
    let err = Harvester::new(config)
        .unwrap()
        .run(&source, &source, &mut sink)
        .unwrap_err();
    assert!(matches!(err, HarvestError::AllRepositoriesFailed { attempted: 2 }));
}

#[test]
fn toml_config_drives_the_run() {
    let fixture = Fixture::new();
    let config_path = fixture.dir.path().join("harvest.toml");
    write(
        fixture.dir.path(),
        "harvest.toml",
        b"min_lines = 4\nallowed_licenses = [\"mit\"]\n",
    );
    let config = HarvestConfig::from_toml_str(&fs::read_to_string(config_path).unwrap()).unwrap();
    let mut sink = harvest_core::store::MemorySink::default();
    let stats = fixture.run(config, &mut sink).unwrap();
    assert_eq!(stats.repositories_seen, 1);
    assert_eq!(stats.repositories_skipped_license, 2);
    let names: Vec<&str> = sink.rows.iter().map(|r| r.method_name.as_str()).collect();
    assert_eq!(names, vec!["answer"]);
    assert_eq!(stats.rejected.too_short, 1);
}
