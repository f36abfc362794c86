use std::fs;
use std::path::Path;

use cot_qc::config::QcConfig;
use cot_qc::pipeline::checks::builtin;
use cot_qc::pipeline::{Orchestrator, RunError, SkipReason};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    config: QcConfig,
}

impl Fixture {
    fn new(roster_csv: &str) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path().join("portfolios");
        let output = dir.path().join("output");
        fs::create_dir(&root).expect("mkdir root");

        let roster_path = dir.path().join("AccountList.csv");
        fs::write(&roster_path, roster_csv).expect("write roster");

        let config = QcConfig {
            root_dir: root,
            roster_path,
            output_dir: output,
            portfolio_column: "PortfolioNo".to_string(),
            history_marker: "COT Data".to_string(),
            null_sentinel: "(null)".to_string(),
            account_key_column: "AccountNo".to_string(),
            lookup_columns: vec!["Seller".to_string()],
        };
        Self { _dir: dir, config }
    }

    fn add_unit(&self, name: &str) -> std::path::PathBuf {
        let path = self.config.root_dir.join(name);
        fs::create_dir(&path).expect("mkdir unit");
        path
    }

    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.config.clone(),
            builtin::default_checks(&self.config.account_key_column),
        )
    }
}

fn standard_roster() -> &'static str {
    "AccountNo,PortfolioNo,Seller\n\
     A-1,1,Acme Debt\n\
     A-2,1,Acme Debt\n\
     B-1,2,Beta Capital\n\
     C-1,3,Gamma Funding\n"
}

fn read_csv_rows(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .expect("read output file")
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn scenario_processes_skips_and_excludes_units() {
    let fixture = Fixture::new(standard_roster());

    let unit_1 = fixture.add_unit("1-A");
    fs::write(
        unit_1.join("COT Data export.csv"),
        "AccountNo,sold_date,purchase_date\nA-1,2023-01-05,2023-03-01\nA-1,(null),2023-01-02\n",
    )
    .expect("write history");

    // Unit 2 exists but holds no marker-matching file.
    let unit_2 = fixture.add_unit("2-B");
    fs::write(unit_2.join("notes.csv"), "a\n1\n").expect("write stray file");

    // Non-digit prefix: excluded at discovery, not skipped.
    fixture.add_unit("X-bad");

    let summary = fixture.orchestrator().run().expect("run succeeds");

    let written: Vec<i64> = summary.written.iter().map(|w| w.portfolio_id).collect();
    assert_eq!(written, [1]);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].portfolio_id, 2);
    assert_eq!(summary.skipped[0].reason, SkipReason::NoHistoryFiles);
    assert!(summary.errors.is_empty());

    // Per-portfolio file exists for 1, for nobody else.
    assert!(fixture.config.output_dir.join("COT_QC_Flags_1.csv").exists());
    assert!(!fixture.config.output_dir.join("COT_QC_Flags_2.csv").exists());

    // Master carries only portfolio 1, tagged with id and folder.
    let master_path = summary.master_path.expect("master written");
    let rows = read_csv_rows(&master_path);
    assert!(rows[0].contains("PortfolioNo"));
    assert!(rows[0].contains("PortfolioFolder"));
    assert!(rows[1..].iter().all(|row| row.contains("1-A")));

    // No failures, so no error log.
    assert!(summary.error_log_path.is_none());
    assert!(!fixture.config.output_dir.join("COT_QC_Errors.csv").exists());
}

#[test]
fn default_checks_flag_expected_anomalies_with_enrichment() {
    let fixture = Fixture::new(standard_roster());
    let unit = fixture.add_unit("1-A");
    // A-1 sold before purchased; A-2 absent entirely; distinct counts 2 vs 1.
    fs::write(
        unit.join("COT Data export.csv"),
        "AccountNo,sold_date,purchase_date\nA-1,2023-01-05,2023-03-01\n",
    )
    .expect("write history");

    let summary = fixture.orchestrator().run().expect("run succeeds");
    assert_eq!(summary.written[0].rows, 3);

    let rows = read_csv_rows(&summary.written[0].output_path);
    let header = &rows[0];
    assert!(header.starts_with("AccountNo,Check,Detail"));
    assert!(header.contains("Seller"));

    let missing = rows
        .iter()
        .find(|row| row.contains("account_missing_from_cot"))
        .expect("missing-account flag present");
    // Enriched from the roster subset.
    assert!(missing.contains("A-2"));
    assert!(missing.contains("Acme Debt"));

    // The portfolio-level count flag has no account key, so its lookup
    // columns stay empty rather than the row being dropped.
    let mismatch = rows
        .iter()
        .find(|row| row.contains("unique_account_count_mismatch"))
        .expect("count flag present");
    assert!(!mismatch.contains("Acme Debt"));

    assert!(rows.iter().any(|row| row.contains("sold_before_purchase")));
}

#[test]
fn failing_portfolio_is_isolated_and_logged() {
    let fixture = Fixture::new(standard_roster());

    let unit_1 = fixture.add_unit("1-A");
    fs::write(
        unit_1.join("COT Data export.csv"),
        "AccountNo,sold_date,purchase_date\nA-1,2023-01-05,2023-03-01\nA-2,2023-02-01,2023-01-01\n",
    )
    .expect("write history");

    // Ragged record: the loader reports this portfolio as failed.
    let unit_2 = fixture.add_unit("2-B");
    fs::write(
        unit_2.join("COT Data export.csv"),
        "AccountNo,sold_date\nB-1,2023-01-01,unexpected-extra\n",
    )
    .expect("write history");

    let summary = fixture.orchestrator().run().expect("run still succeeds");

    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].portfolio_id, 2);
    let written: Vec<i64> = summary.written.iter().map(|w| w.portfolio_id).collect();
    assert_eq!(written, [1]);

    // Failed portfolio leaves no partial output file.
    assert!(!fixture.config.output_dir.join("COT_QC_Flags_2.csv").exists());

    let error_log = summary.error_log_path.expect("error log written");
    let rows = read_csv_rows(&error_log);
    assert_eq!(rows[0], "PortfolioNo,Folder,Error");
    assert_eq!(rows.len(), 2);
    assert!(rows[1].starts_with("2,"));
    assert!(rows[1].contains("2-B"));

    // Master still carries the healthy portfolio untouched.
    let master = read_csv_rows(&summary.master_path.expect("master written"));
    assert!(master[1..].iter().all(|row| row.contains("1-A")));
}

#[test]
fn empty_roster_subset_skips_without_any_output() {
    let fixture = Fixture::new(standard_roster());
    let unit = fixture.add_unit("9-Orphan");
    fs::write(
        unit.join("COT Data export.csv"),
        "AccountNo,sold_date,purchase_date\nZ-1,2023-01-01,2023-01-01\n",
    )
    .expect("write history");

    let summary = fixture.orchestrator().run().expect("run succeeds");

    assert!(summary.written.is_empty());
    assert!(summary.errors.is_empty());
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].reason, SkipReason::EmptyRoster);
    assert!(summary.master_path.is_none());
    assert!(!fixture.config.output_dir.join("COT_QC_Flags_9.csv").exists());
}

#[test]
fn every_discovered_unit_lands_in_exactly_one_bucket() {
    let fixture = Fixture::new(standard_roster());

    let unit_1 = fixture.add_unit("1-A");
    fs::write(
        unit_1.join("COT Data export.csv"),
        "AccountNo,sold_date,purchase_date\nA-1,2023-04-01,2023-01-01\n",
    )
    .expect("write history");
    fixture.add_unit("2-B"); // no history files -> skip
    let unit_3 = fixture.add_unit("3-C");
    fs::write(unit_3.join("COT Data broken.csv"), "a,b\n1,2,3\n").expect("write history");
    fixture.add_unit("NotAPortfolio"); // excluded at discovery

    let summary = fixture.orchestrator().run().expect("run succeeds");

    let mut seen: Vec<i64> = summary
        .written
        .iter()
        .map(|w| w.portfolio_id)
        .chain(summary.skipped.iter().map(|s| s.portfolio_id))
        .chain(summary.errors.iter().map(|e| e.portfolio_id))
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, [1, 2, 3]);
}

#[test]
fn reruns_produce_byte_identical_outputs() {
    let fixture = Fixture::new(standard_roster());
    let unit = fixture.add_unit("1-A");
    fs::write(
        unit.join("COT Data a.csv"),
        "AccountNo,sold_date,purchase_date\nA-1,2023-01-05,2023-03-01\n",
    )
    .expect("write history");
    fs::write(
        unit.join("COT Data b.csv"),
        "AccountNo,sold_date,purchase_date\nA-2,(null),2023-01-01\n",
    )
    .expect("write history");

    let orchestrator = fixture.orchestrator();
    let first = orchestrator.run().expect("first run succeeds");
    let flags_first = fs::read(&first.written[0].output_path).expect("read flags");
    let master_first = fs::read(first.master_path.as_ref().expect("master")).expect("read master");

    let second = orchestrator.run().expect("second run succeeds");
    let flags_second = fs::read(&second.written[0].output_path).expect("read flags");
    let master_second =
        fs::read(second.master_path.as_ref().expect("master")).expect("read master");

    assert_eq!(flags_first, flags_second);
    assert_eq!(master_first, master_second);
}

#[test]
fn missing_portfolio_column_aborts_the_whole_run() {
    let fixture = Fixture::new("AccountNo,Seller\nA-1,Acme Debt\n");
    let unit = fixture.add_unit("1-A");
    fs::write(
        unit.join("COT Data export.csv"),
        "AccountNo,sold_date,purchase_date\nA-1,2023-01-01,2023-01-01\n",
    )
    .expect("write history");

    let err = fixture.orchestrator().run().expect_err("setup error is fatal");
    match err {
        RunError::MissingPortfolioColumn { column, available } => {
            assert_eq!(column, "PortfolioNo");
            assert_eq!(available, ["AccountNo", "Seller"]);
        }
        other => panic!("expected missing-column error, got {other:?}"),
    }
}

#[test]
fn sentinel_dates_survive_the_full_pipeline() {
    let fixture = Fixture::new(standard_roster());
    let unit = fixture.add_unit("1-A");
    fs::write(
        unit.join("COT Data export.csv"),
        "AccountNo,sold_date,purchase_date\nA-1,(null),2023-01-01\nA-2,bogus,2023-02-01\n",
    )
    .expect("write history");

    // Neither the sentinel nor the malformed date may error the
    // portfolio; they normalize to absent values.
    let summary = fixture.orchestrator().run().expect("run succeeds");
    assert!(summary.errors.is_empty());
    assert_eq!(summary.written.len(), 1);
    // With both accounts present and no parsable sold-before-purchase
    // pair, only zero or portfolio-level flags can appear.
    let rows = read_csv_rows(&summary.written[0].output_path);
    assert!(!rows.iter().any(|row| row.contains("sold_before_purchase")));
}
