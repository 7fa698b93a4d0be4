use std::collections::{BTreeMap, HashSet};
use std::io::{Read, Write};
use std::path::Path;

use tracing::info;

use crate::analysis::date_span;
use crate::config::REQUIRED_COLUMNS;
use crate::error::{LoadError, SchemaError};
use crate::models::{DataInfo, EnrolmentRecord, RawRecord};

/// A schema-checked table straight from CSV; dates are still text.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawRecord>,
}

pub fn validate_columns<S: AsRef<str>>(columns: &[S]) -> Result<(), SchemaError> {
    let present: HashSet<&str> = columns.iter().map(|column| column.as_ref()).collect();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !present.contains(*column))
        .map(|column| column.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::MissingColumns(missing))
    }
}

/// Reads and schema-checks a CSV table. Nothing is returned unless the
/// header carries every required column and every row decodes.
pub fn read_csv<R: Read>(source: R) -> Result<RawTable, LoadError> {
    let mut reader = csv::Reader::from_reader(source);
    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    validate_columns(&columns)?;

    let rows = reader
        .deserialize::<RawRecord>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RawTable { columns, rows })
}

pub fn load_csv(path: &Path) -> Result<RawTable, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.display().to_string()));
    }
    let table = read_csv(std::fs::File::open(path)?)?;
    info!(path = %path.display(), rows = table.rows.len(), "loaded enrolment table");
    Ok(table)
}

pub fn data_info(columns: &[String], records: &[EnrolmentRecord]) -> DataInfo {
    let mut seen = HashSet::new();
    let districts = records
        .iter()
        .filter(|record| seen.insert(record.district.as_str()))
        .map(|record| record.district.clone())
        .collect();

    let mut missing_values: BTreeMap<String, usize> =
        columns.iter().map(|column| (column.clone(), 0)).collect();
    for record in records {
        let gaps = [
            ("state", record.state.is_empty()),
            ("district", record.district.is_empty()),
            ("age_0_5", record.age_0_5.is_nan()),
            ("age_5_17", record.age_5_17.is_nan()),
            ("age_18_greater", record.age_18_greater.is_nan()),
        ];
        for (column, missing) in gaps {
            if missing {
                *missing_values.entry(column.to_string()).or_insert(0) += 1;
            }
        }
    }

    DataInfo {
        total_records: records.len(),
        columns: columns.to_vec(),
        date_range: date_span(records),
        districts,
        pincodes_count: records.iter().map(|r| r.pincode).collect::<HashSet<_>>().len(),
        missing_values,
    }
}

/// Writes records back in the ingestion layout, so the output re-loads to
/// the same dataset.
pub fn write_csv<W: Write>(records: &[EnrolmentRecord], sink: W) -> Result<(), LoadError> {
    let mut writer = csv::Writer::from_writer(sink);
    for record in records {
        writer.serialize(RawRecord::from(record))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_csv(path: &Path, records: &[EnrolmentRecord]) -> Result<(), LoadError> {
    write_csv(records, std::fs::File::create(path)?)?;
    info!(path = %path.display(), rows = records.len(), "exported cleaned dataset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::preprocess;

    const SAMPLE: &str = "\
date,state,district,pincode,age_0_5,age_5_17,age_18_greater,extra
01-01-2024,West Bengal,Birbhum,731101,2,3,5,x
02-01-2024,West Bengal,Birbhum,731102,1,,4,y
not-a-date,West Bengal,Bolpur,731101,1,1,1,z
";

    #[test]
    fn reports_every_missing_column() {
        let error = read_csv("date,state,pincode,age_0_5\n".as_bytes()).unwrap_err();
        match error {
            LoadError::Schema(SchemaError::MissingColumns(missing)) => {
                assert_eq!(missing, vec!["district", "age_5_17", "age_18_greater"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reads_rows_and_keeps_empty_counts_as_missing() {
        let table = read_csv(SAMPLE.as_bytes()).unwrap();
        assert_eq!(table.columns.len(), 8);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[1].age_5_17, None);
        assert_eq!(table.rows[0].pincode, 731101);
    }

    #[test]
    fn non_integer_pincode_is_a_load_error() {
        let body = "date,state,district,pincode,age_0_5,age_5_17,age_18_greater\n\
                    01-01-2024,WB,Birbhum,Suri,1,1,1\n";
        assert!(matches!(read_csv(body.as_bytes()), Err(LoadError::Csv(_))));
    }

    #[test]
    fn missing_file_is_reported() {
        let error = load_csv(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(error, LoadError::NotFound(_)));
    }

    #[test]
    fn info_describes_preprocessed_records() {
        let table = read_csv(SAMPLE.as_bytes()).unwrap();
        let records = preprocess(table.rows);
        let info = data_info(&table.columns, &records);
        assert_eq!(info.total_records, 2);
        assert_eq!(info.districts, vec!["Birbhum"]);
        assert_eq!(info.pincodes_count, 2);
        assert_eq!(info.missing_values["age_5_17"], 1);
        assert_eq!(info.missing_values["extra"], 0);
        assert_eq!(info.date_range.unwrap().days, 1);
    }

    #[test]
    fn export_reloads_to_the_same_dataset() {
        let table = read_csv(SAMPLE.as_bytes()).unwrap();
        let records = preprocess(table.rows);

        let mut buffer = Vec::new();
        write_csv(&records, &mut buffer).unwrap();
        let reloaded = preprocess(read_csv(buffer.as_slice()).unwrap().rows);

        assert_eq!(reloaded.len(), records.len());
        assert_eq!(reloaded[0], records[0]);
        assert!(reloaded[1].age_5_17.is_nan());
        assert_eq!(reloaded[1].date, records[1].date);
    }
}
