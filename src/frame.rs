//! Typed column access on polars frames.
//!
//! Readers hand over frames with whatever integer/float widths their parser
//! produced; everything is cast to `Int64`/`Float64` on the way in.

use polars::prelude::*;

use crate::error::{AtomError, Result};
use crate::schema::species;

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.schema().contains(name)
}

pub fn require_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    for &col_name in required {
        if !has_column(df, col_name) {
            return Err(AtomError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| AtomError::MissingColumn(name.to_string()))
}

pub fn i64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let cast = column(df, name)?.cast(&DataType::Int64)?;
    Ok(cast.i64()?.into_iter().collect())
}

pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let cast = column(df, name)?.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

pub fn str_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let cast = column(df, name)?.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

pub fn bool_values(df: &DataFrame, name: &str) -> Result<Vec<Option<bool>>> {
    let cast = column(df, name)?.cast(&DataType::Boolean)?;
    Ok(cast.bool()?.into_iter().collect())
}

/// A list column of floats; a row with a null entry anywhere is `None`.
pub fn f64_list_values(df: &DataFrame, name: &str) -> Result<Vec<Option<Vec<f64>>>> {
    let lists = column(df, name)?.as_materialized_series().list()?.clone();
    let mut values = Vec::with_capacity(lists.len());
    for i in 0..lists.len() {
        let row = match lists.get_as_series(i) {
            Some(series) => {
                let cast = series.cast(&DataType::Float64)?;
                cast.f64()?.into_iter().collect::<Option<Vec<f64>>>()
            }
            None => None,
        };
        values.push(row);
    }
    Ok(values)
}

/// Accept `ion_charge` as an alias of `ion_number`.
pub fn normalize_species_columns(mut df: DataFrame) -> Result<DataFrame> {
    if !has_column(&df, species::ION_NUMBER) && has_column(&df, species::ION_CHARGE) {
        df.rename(species::ION_CHARGE, species::ION_NUMBER.into())?;
    }
    Ok(df)
}

pub fn column_names(df: &DataFrame) -> String {
    df.get_column_names_str().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casts_integer_widths() {
        let df = DataFrame::new(vec![
            Column::new("a".into(), &[1i32, 2, 3]),
            Column::new("b".into(), &[0.5f32, 1.5, 2.5]),
        ])
        .unwrap();
        assert_eq!(i64_values(&df, "a").unwrap(), vec![Some(1), Some(2), Some(3)]);
        assert_eq!(f64_values(&df, "a").unwrap()[2], Some(3.0));
        assert_eq!(f64_values(&df, "b").unwrap()[0], Some(0.5));
    }

    #[test]
    fn missing_column_is_reported_by_name() {
        let df = DataFrame::new(vec![Column::new("a".into(), &[1i64])]).unwrap();
        match i64_values(&df, "energy") {
            Err(AtomError::MissingColumn(name)) => assert_eq!(name, "energy"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(require_columns(&df, &["a"]).is_ok());
        assert!(require_columns(&df, &["a", "g"]).is_err());
    }

    #[test]
    fn renames_ion_charge() {
        let df = DataFrame::new(vec![
            Column::new("atomic_number".into(), &[14i64]),
            Column::new("ion_charge".into(), &[1i64]),
        ])
        .unwrap();
        let df = normalize_species_columns(df).unwrap();
        assert!(has_column(&df, "ion_number"));
        assert!(!has_column(&df, "ion_charge"));
    }

    #[test]
    fn reads_float_lists() {
        let rows = vec![
            Series::new("".into(), &[0.0f64, 0.5, 1.0]),
            Series::new("".into(), &[1.0f64, 2.0]),
        ];
        let df = DataFrame::new(vec![Column::new("btemp".into(), rows)]).unwrap();
        let values = f64_list_values(&df, "btemp").unwrap();
        assert_eq!(values[0], Some(vec![0.0, 0.5, 1.0]));
        assert_eq!(values[1], Some(vec![1.0, 2.0]));
    }
}
