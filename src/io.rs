//! Reading reader-produced tables and writing the prepared ones.

use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use crate::error::{AtomError, Result};

/// Read a `.csv` or `.parquet` table. CSV column names are trimmed.
pub fn read_table(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("parquet") => Ok(ParquetReader::new(File::open(path)?).finish()?),
        Some("csv") => {
            let mut df = CsvReadOptions::default()
                .with_has_header(true)
                .try_into_reader_with_file_path(Some(path.to_path_buf()))?
                .finish()?;
            let trimmed: Vec<String> = df
                .get_column_names_str()
                .iter()
                .map(|c| c.trim().to_string())
                .collect();
            df.set_column_names(trimmed.as_slice())?;
            Ok(df)
        }
        _ => Err(AtomError::InvalidData(format!(
            "unsupported table format: {}",
            path.display()
        ))),
    }
}

pub fn write_parquet(df: &DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut df = df.clone();
    ParquetWriter::new(file).finish(&mut df)?;
    Ok(())
}

pub fn write_csv(df: &DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let mut file = File::create(path.as_ref())?;
    let mut df = df.clone();
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        DataFrame::new(vec![
            Column::new("atomic_number".into(), &[14i64, 26]),
            Column::new("energy".into(), &[0.0356f64, 1.2]),
        ])
        .unwrap()
    }

    #[test]
    fn parquet_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("levels.parquet");
        write_parquet(&sample(), &path).unwrap();
        let back = read_table(&path).unwrap();
        assert!(back.equals(&sample()));
    }

    #[test]
    fn csv_round_trip_trims_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("levels.csv");
        std::fs::write(&path, "atomic_number , energy\n14,0.0356\n26,1.2\n").unwrap();
        let back = read_table(&path).unwrap();
        assert_eq!(back.get_column_names_str(), vec!["atomic_number", "energy"]);
        assert_eq!(back.height(), 2);

        let out = dir.path().join("out.csv");
        write_csv(&sample(), &out).unwrap();
        assert!(std::fs::read_to_string(&out).unwrap().starts_with("atomic_number,energy"));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(matches!(read_table("levels.h5"), Err(AtomError::InvalidData(_))));
    }
}
