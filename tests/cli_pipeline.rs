use std::io::Write;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use enrolment_insights::error::{Error, LoadError, SchemaError};
use enrolment_insights::{loader, AnomalyParams, Dataset, FilterRequest, Session};

const HEADER: &str = "date,state,district,pincode,age_0_5,age_5_17,age_18_greater";

fn write_csv(lines: &[&str]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file.flush().unwrap();
    file
}

fn load(lines: &[&str]) -> Session {
    let file = write_csv(lines);
    let table = loader::load_csv(file.path()).unwrap();
    let mut session = Session::new(AnomalyParams::default());
    session.replace(Dataset::from_table(table));
    session
}

#[test]
fn single_date_bundle_serializes_undefined_std_as_null() {
    let session = load(&[
        "01-01-2024,West Bengal,Birbhum,700001,2,3,5",
        "01-01-2024,West Bengal,Birbhum,700001,0,0,0",
        "01-01-2024,West Bengal,Birbhum,700001,0,0,0",
    ]);
    let analysis = serde_json::to_value(session.analyze(&FilterRequest::default()).unwrap()).unwrap();

    assert_eq!(analysis["summary"]["total_enrolments"], json!(10.0));
    assert_eq!(analysis["summary"]["unique_pincodes"], json!(1));
    assert_eq!(analysis["summary"]["daily_statistics"]["mean"], json!(10.0));
    assert_eq!(analysis["summary"]["daily_statistics"]["std"], Value::Null);
    assert_eq!(
        analysis["summary"]["date_range"],
        json!({"start": "2024-01-01", "end": "2024-01-01", "days": 0})
    );
    assert_eq!(analysis["temporal"]["day_of_week_pattern"]["days"][0], json!("Monday"));

    let anomalies = serde_json::to_value(
        session.detect_anomalies(&FilterRequest::default(), None).unwrap(),
    )
    .unwrap();
    assert_eq!(anomalies["zscore_analysis"]["all_days"][0]["z_score"], Value::Null);
    assert_eq!(anomalies["zscore_analysis"]["all_days"][0]["anomaly_type"], json!("normal"));
    assert_eq!(anomalies["methodology"]["zscore_threshold"], json!(2.5));
    assert_eq!(anomalies["methodology"]["rolling_window_days"], json!(7));
}

#[test]
fn filter_request_from_json_narrows_both_bundles() {
    let session = load(&[
        "01-01-2024,West Bengal,Birbhum,731101,1,1,1",
        "02-01-2024,West Bengal,Birbhum,731102,2,2,2",
        "03-01-2024,West Bengal,Bankura,722101,3,3,3",
        "bad-date,West Bengal,Bankura,722101,50,50,50",
    ]);
    let request: FilterRequest =
        serde_json::from_value(json!({"end_date": "2024-01-02", "pincodes": ["731102"]})).unwrap();

    let analysis = session.analyze(&request).unwrap();
    assert_eq!(analysis.summary.total_enrolments, 6.0);
    assert_eq!(analysis.geographic.district_summary.len(), 1);

    let everything = session.analyze(&FilterRequest::default()).unwrap();
    assert_eq!(everything.summary.total_enrolments, 18.0);
    assert_eq!(everything.geographic.district_summary[0].district, "Bankura");
}

#[test]
fn missing_columns_reject_the_file_before_analysis() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "date,state,pincode,age_0_5,age_5_17").unwrap();
    writeln!(file, "01-01-2024,West Bengal,700001,1,1").unwrap();
    file.flush().unwrap();

    let error = loader::load_csv(file.path()).unwrap_err();
    match error {
        LoadError::Schema(SchemaError::MissingColumns(missing)) => {
            assert_eq!(missing, vec!["district".to_string(), "age_18_greater".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn analysis_without_data_is_refused() {
    let session = Session::default();
    let error = session.detect_anomalies(&FilterRequest::default(), None).unwrap_err();
    assert!(matches!(error, Error::Session(_)));
}

#[test]
fn exported_csv_reloads_identically() {
    let session = load(&[
        "05-02-2024,West Bengal,Birbhum,731101,4,0,1",
        "01-02-2024,West Bengal,Birbhum,731101,1,2,3",
    ]);
    let original = session.snapshot().unwrap();

    let out = tempfile::NamedTempFile::new().unwrap();
    loader::export_csv(out.path(), &original.records).unwrap();
    let reloaded = Dataset::from_table(loader::load_csv(out.path()).unwrap());

    assert_eq!(reloaded.records, original.records);
}
