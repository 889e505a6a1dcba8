//! Table-by-table comparison of two prepared datasets.

use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::*;
use tracing::{info, warn};

use crate::atom_data::{AtomData, PreparedTable};
use crate::error::{AtomError, Result};
use crate::frame::{bool_values, f64_values, i64_values, str_values};
use crate::schema::{comparison, species};
use crate::species::{species_list, Species};

/// Default relative tolerance of [`AtomDataCompare::ion_diff`].
pub const DEFAULT_RTOL: f64 = 1e-7;
const ATOL: f64 = 1e-8;

pub struct AtomDataCompare {
    left: BTreeMap<PreparedTable, DataFrame>,
    right: BTreeMap<PreparedTable, DataFrame>,
}

impl AtomDataCompare {
    pub fn new(
        left: BTreeMap<PreparedTable, DataFrame>,
        right: BTreeMap<PreparedTable, DataFrame>,
    ) -> Self {
        Self { left, right }
    }

    pub fn from_atom_data(left: &AtomData, right: &AtomData) -> Self {
        Self::new(left.tables().clone(), right.tables().clone())
    }

    /// One row per table: present on each side, and identical.
    pub fn comparison_table(&self) -> Result<DataFrame> {
        let keys: BTreeSet<PreparedTable> =
            self.left.keys().chain(self.right.keys()).copied().collect();
        let mut names = Vec::with_capacity(keys.len());
        let mut exists_1 = Vec::with_capacity(keys.len());
        let mut exists_2 = Vec::with_capacity(keys.len());
        let mut matches = Vec::with_capacity(keys.len());
        for key in keys {
            let (a, b) = (self.left.get(&key), self.right.get(&key));
            names.push(key.name());
            exists_1.push(a.is_some());
            exists_2.push(b.is_some());
            matches.push(match (a, b) {
                (Some(a), Some(b)) => a.equals_missing(b),
                _ => false,
            });
        }
        Ok(DataFrame::new(vec![
            Column::new(comparison::TABLE.into(), &names),
            Column::new(comparison::EXISTS_1.into(), &exists_1),
            Column::new(comparison::EXISTS_2.into(), &exists_2),
            Column::new(comparison::MATCH.into(), &matches),
        ])?)
    }

    fn pair(&self, table: PreparedTable) -> Result<(&DataFrame, &DataFrame)> {
        match (self.left.get(&table), self.right.get(&table)) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(AtomError::Validation(format!(
                "{table} is missing from one of the datasets"
            ))),
        }
    }

    /// Non-index columns present in both versions of `table`.
    fn common_columns(&self, table: PreparedTable) -> Result<Vec<String>> {
        let (a, b) = self.pair(table)?;
        let index = table.index_columns();
        let names_a: Vec<&str> = a.get_column_names_str();
        let names_b: Vec<&str> = b.get_column_names_str();
        for name in index {
            if !names_a.contains(name) || !names_b.contains(name) {
                return Err(AtomError::Validation(format!(
                    "index column `{name}` of {table} is missing from one of the datasets"
                )));
            }
        }

        let common: Vec<String> = names_a
            .iter()
            .filter(|c| names_b.contains(c) && !index.contains(c))
            .map(|c| c.to_string())
            .collect();
        if common.is_empty() {
            return Err(AtomError::Validation(format!(
                "{table} has no common columns to compare"
            )));
        }
        let mismatched: Vec<&str> = names_a
            .iter()
            .filter(|c| !names_b.contains(c))
            .chain(names_b.iter().filter(|c| !names_a.contains(c)))
            .copied()
            .collect();
        if !mismatched.is_empty() {
            warn!(
                "Columns of {} do not match: {}. Comparing {}.",
                table,
                mismatched.join(", "),
                common.join(", ")
            );
        }

        let (species_a, species_b) = (species_of(a)?, species_of(b)?);
        let only_one: BTreeSet<Species> =
            species_a.symmetric_difference(&species_b).copied().collect();
        if !only_one.is_empty() {
            warn!(
                "Species of {} not in both datasets: {}.",
                table,
                species_list(&only_one)
            );
        }
        Ok(common)
    }

    /// Row-by-row comparison of one species: `{col}_1`, `{col}_2`,
    /// `matches_{col}` (and `pct_change_{col}` for numbers), rows aligned on
    /// the table's index columns.
    pub fn ion_diff(&self, table: PreparedTable, ion: Species, rtol: f64) -> Result<DataFrame> {
        let (a, b) = self.pair(table)?;
        let value_columns = self.common_columns(table)?;
        let index: Vec<&str> = table
            .index_columns()
            .iter()
            .copied()
            .filter(|c| *c != species::ATOMIC_NUMBER && *c != species::ION_NUMBER)
            .collect();

        let select = |df: &DataFrame, suffix: &str| -> Result<DataFrame> {
            let mut exprs: Vec<Expr> = index.iter().map(|c| col(*c)).collect();
            exprs.extend(
                value_columns
                    .iter()
                    .map(|c| col(c.as_str()).alias(format!("{c}{suffix}"))),
            );
            let picked = df
                .clone()
                .lazy()
                .filter(
                    col(species::ATOMIC_NUMBER)
                        .eq(lit(ion.atomic_number))
                        .and(col(species::ION_NUMBER).eq(lit(ion.ion_number))),
                )
                .select(exprs)
                .collect()?;
            if picked.height() == 0 {
                return Err(AtomError::Validation(format!(
                    "{ion} does not exist in one of the {table} tables"
                )));
            }
            Ok(picked)
        };
        let (left, right) = (select(a, "_1")?, select(b, "_2")?);

        let merged = if index.is_empty() {
            left.hstack(right.get_columns())?
        } else {
            let keys: Vec<Expr> = index.iter().map(|c| col(*c)).collect();
            left.lazy()
                .join(
                    right.lazy(),
                    keys.clone(),
                    keys.clone(),
                    JoinArgs::new(JoinType::Inner),
                )
                .sort_by_exprs(keys, SortMultipleOptions::default())
                .collect()?
        };

        let mut columns: Vec<Column> = index
            .iter()
            .map(|c| merged.column(c).cloned())
            .collect::<PolarsResult<_>>()?;
        for c in &value_columns {
            let (first, second) = (format!("{c}_1"), format!("{c}_2"));
            columns.push(merged.column(&first)?.clone());
            columns.push(merged.column(&second)?.clone());
            let dtype = merged.column(&first)?.dtype().clone();
            if matches!(dtype, DataType::Boolean | DataType::String) {
                let equal = exact_matches(&merged, &first, &second, &dtype)?;
                columns.push(Column::new(format!("matches_{c}").into(), &equal));
            } else {
                let x = f64_values(&merged, &first)?;
                let y = f64_values(&merged, &second)?;
                let close: Vec<bool> = x.iter().zip(&y).map(|(a, b)| is_close(*a, *b, rtol)).collect();
                let change: Vec<f64> = x.iter().zip(&y).map(|(a, b)| pct_change(*a, *b)).collect();
                columns.push(Column::new(format!("matches_{c}").into(), &close));
                columns.push(Column::new(format!("pct_change_{c}").into(), &change));
            }
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Per species present on both sides: compared rows and how many of them
    /// disagree in each column.
    pub fn key_diff(&self, table: PreparedTable, rtol: f64) -> Result<DataFrame> {
        let (a, b) = self.pair(table)?;
        let shared: Vec<Species> = species_of(a)?
            .intersection(&species_of(b)?)
            .copied()
            .collect();
        info!("Comparing {} species of {}.", shared.len(), table);

        let mut atomic_number = Vec::with_capacity(shared.len());
        let mut ion_number = Vec::with_capacity(shared.len());
        let mut total_rows = Vec::with_capacity(shared.len());
        let mut mismatches: BTreeMap<String, Vec<i64>> = BTreeMap::new();
        let mut order: Vec<String> = Vec::new();
        for ion in shared {
            let diff = self.ion_diff(table, ion, rtol)?;
            atomic_number.push(ion.atomic_number);
            ion_number.push(ion.ion_number);
            total_rows.push(diff.height() as i64);
            for name in diff.get_column_names_str() {
                let Some(column) = name.strip_prefix("matches_") else {
                    continue;
                };
                let key = format!("not_matches_{column}");
                let not_matching = bool_values(&diff, name)?
                    .into_iter()
                    .filter(|v| *v != Some(true))
                    .count() as i64;
                if !mismatches.contains_key(&key) {
                    order.push(key.clone());
                }
                mismatches.entry(key).or_default().push(not_matching);
            }
        }

        let mut columns = vec![
            Column::new(species::ATOMIC_NUMBER.into(), &atomic_number),
            Column::new(species::ION_NUMBER.into(), &ion_number),
            Column::new("total_rows".into(), &total_rows),
        ];
        for key in order {
            let values = mismatches.remove(&key).unwrap_or_default();
            columns.push(Column::new(key.into(), &values));
        }
        Ok(DataFrame::new(columns)?)
    }
}

fn species_of(df: &DataFrame) -> Result<BTreeSet<Species>> {
    let zs = i64_values(df, species::ATOMIC_NUMBER)?;
    let ions = i64_values(df, species::ION_NUMBER)?;
    Ok(zs
        .into_iter()
        .zip(ions)
        .filter_map(|(z, ion)| Some(Species::new(z?, ion?)))
        .collect())
}

fn exact_matches(df: &DataFrame, first: &str, second: &str, dtype: &DataType) -> Result<Vec<bool>> {
    Ok(match dtype {
        DataType::Boolean => bool_values(df, first)?
            .into_iter()
            .zip(bool_values(df, second)?)
            .map(|(a, b)| a == b)
            .collect(),
        _ => str_values(df, first)?
            .into_iter()
            .zip(str_values(df, second)?)
            .map(|(a, b)| a == b)
            .collect(),
    })
}

/// `|a - b| <= atol + rtol |b|`; two missing values match.
fn is_close(a: Option<f64>, b: Option<f64>, rtol: f64) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).abs() <= ATOL + rtol * b.abs(),
        (None, None) => true,
        _ => false,
    }
}

/// Relative change from `a` to `b`; 0 where undefined.
fn pct_change(a: Option<f64>, b: Option<f64>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) if a != 0.0 => (b - a) / a,
        (Some(a), Some(b)) if a == b => 0.0,
        (Some(_), Some(_)) => f64::INFINITY,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(energy_of_second: f64, metastable: bool) -> DataFrame {
        DataFrame::new(vec![
            Column::new("atomic_number".into(), &[14i64, 14, 26]),
            Column::new("ion_number".into(), &[1i64, 1, 1]),
            Column::new("level_number".into(), &[0i64, 1, 0]),
            Column::new("energy".into(), &[0.0f64, energy_of_second, 0.0]),
            Column::new("g".into(), &[2i64, 4, 10]),
            Column::new("metastable".into(), &[true, metastable, true]),
        ])
        .unwrap()
    }

    fn compare(right_energy: f64, right_metastable: bool) -> AtomDataCompare {
        let left = BTreeMap::from([(PreparedTable::Levels, levels(0.0356, true))]);
        let right = BTreeMap::from([
            (PreparedTable::Levels, levels(right_energy, right_metastable)),
            (
                PreparedTable::IonizationEnergies,
                DataFrame::new(vec![
                    Column::new("atomic_number".into(), &[14i64]),
                    Column::new("ion_number".into(), &[2i64]),
                    Column::new("ionization_energy".into(), &[16.345_845f64]),
                ])
                .unwrap(),
            ),
        ]);
        AtomDataCompare::new(left, right)
    }

    #[test]
    fn comparison_table_flags_missing_and_changed_tables() {
        let table = compare(0.0356, true).comparison_table().unwrap();
        assert_eq!(table.height(), 2);
        let names = str_values(&table, "table").unwrap();
        assert_eq!(names[0].as_deref(), Some("ionization_energies_prepared"));
        assert_eq!(bool_values(&table, "exists_1").unwrap(), vec![Some(false), Some(true)]);
        assert_eq!(bool_values(&table, "match").unwrap(), vec![Some(false), Some(true)]);

        let table = compare(0.0357, true).comparison_table().unwrap();
        assert_eq!(bool_values(&table, "match").unwrap()[1], Some(false));
    }

    #[test]
    fn ion_diff_aligns_rows_and_flags_differences() {
        let diff = compare(0.0357, false)
            .ion_diff(PreparedTable::Levels, Species::new(14, 1), DEFAULT_RTOL)
            .unwrap();
        assert_eq!(diff.height(), 2);
        assert_eq!(
            bool_values(&diff, "matches_energy").unwrap(),
            vec![Some(true), Some(false)]
        );
        assert_eq!(
            bool_values(&diff, "matches_metastable").unwrap(),
            vec![Some(true), Some(false)]
        );
        assert_eq!(bool_values(&diff, "matches_g").unwrap(), vec![Some(true), Some(true)]);
        assert!(diff.column("energy_1").is_ok());
        assert!(diff.column("pct_change_energy").is_ok());
        assert!(diff.column("pct_change_metastable").is_err());
    }

    #[test]
    fn ion_diff_of_a_missing_species_fails() {
        let result = compare(0.0356, true).ion_diff(
            PreparedTable::Levels,
            Species::new(8, 0),
            DEFAULT_RTOL,
        );
        assert!(matches!(result, Err(AtomError::Validation(_))));
        let result = compare(0.0356, true).ion_diff(
            PreparedTable::IonizationEnergies,
            Species::new(14, 2),
            DEFAULT_RTOL,
        );
        assert!(matches!(result, Err(AtomError::Validation(_))));
    }

    fn lines(wavelengths: &[f64]) -> DataFrame {
        DataFrame::new(vec![
            Column::new("atomic_number".into(), &[14i64, 14, 14]),
            Column::new("ion_number".into(), &[1i64, 1, 1]),
            Column::new("level_number_lower".into(), &[0i64, 0, 1]),
            Column::new("level_number_upper".into(), &[2i64, 2, 2]),
            Column::new("line_id".into(), &[0i64, 1, 2]),
            Column::new("wavelength".into(), wavelengths),
        ])
        .unwrap()
    }

    #[test]
    fn lines_on_one_level_pair_stay_separate() {
        let compare = AtomDataCompare::new(
            BTreeMap::from([(PreparedTable::Lines, lines(&[1808.0, 1816.9, 1817.4]))]),
            BTreeMap::from([(PreparedTable::Lines, lines(&[1808.0, 1817.0, 1817.4]))]),
        );
        let diff = compare
            .ion_diff(PreparedTable::Lines, Species::new(14, 1), DEFAULT_RTOL)
            .unwrap();
        assert_eq!(diff.height(), 3);
        assert_eq!(i64_values(&diff, "line_id").unwrap(), vec![Some(0), Some(1), Some(2)]);
        assert_eq!(
            bool_values(&diff, "matches_wavelength").unwrap(),
            vec![Some(true), Some(false), Some(true)]
        );
    }

    #[test]
    fn key_diff_counts_mismatches_per_species() {
        let summary = compare(0.0357, true)
            .key_diff(PreparedTable::Levels, DEFAULT_RTOL)
            .unwrap();
        assert_eq!(summary.height(), 2);
        assert_eq!(i64_values(&summary, "total_rows").unwrap(), vec![Some(2), Some(1)]);
        assert_eq!(
            i64_values(&summary, "not_matches_energy").unwrap(),
            vec![Some(1), Some(0)]
        );
    }

    #[test]
    fn closeness_and_change() {
        assert!(is_close(Some(1.0), Some(1.0 + 1e-9), DEFAULT_RTOL));
        assert!(!is_close(Some(1.0), Some(1.01), DEFAULT_RTOL));
        assert!(is_close(None, None, DEFAULT_RTOL));
        assert_eq!(pct_change(Some(2.0), Some(3.0)), 0.5);
        assert_eq!(pct_change(Some(0.0), Some(0.0)), 0.0);
    }
}
