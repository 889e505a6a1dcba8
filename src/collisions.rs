//! Electron-impact collision strengths in the Burgess & Tully (1992) scaled
//! form, turned into collisional de-excitation factors on a temperature grid.

use polars::prelude::*;
use tracing::{debug, info};

use crate::culling::LevelsLines;
use crate::error::{AtomError, Result};
use crate::levels::LevelRegistry;
use crate::schema::{collisions, levels, lines, species};
use crate::source::CollisionRecord;
use crate::species::{DataSource, Species};
use crate::spline::{unit_linspace, CubicSpline};
use crate::units::K_B_EV;

/// Burgess & Tully (1992) eq. 20 and 22.
const COLLISIONAL_FACTOR: f64 = 8.63e-6;

/// Effective collision strength Υ at reduced energy `kt / ΔE` from the
/// scaled spline of one transition.
pub fn burgess_tully_upsilon(ttype: i64, cups: f64, spline: &CubicSpline, reduced: f64) -> Result<f64> {
    let ttype = base_transition_type(ttype)?;
    let log_scaled_x = || 1.0 - cups.ln() / (reduced + cups).ln();
    let linear_x = || reduced / (reduced + cups);
    let upsilon = match ttype {
        1 => spline.evaluate(log_scaled_x()) * (reduced + std::f64::consts::E).ln(),
        2 => spline.evaluate(linear_x()),
        3 => spline.evaluate(linear_x()) / (reduced + 1.0),
        4 => spline.evaluate(log_scaled_x()) * (reduced + cups).ln(),
        other => return Err(AtomError::UnsupportedTransitionType(other)),
    };
    Ok(upsilon)
}

/// Burgess & Tully scaling 1..=4 of `ttype`. Types 6..=10 are the same
/// scalings as 1..=5; type 5 has no supported form.
pub fn base_transition_type(ttype: i64) -> Result<i64> {
    let base = if ttype > 5 { ttype - 5 } else { ttype };
    match base {
        1..=4 => Ok(base),
        other => Err(AtomError::UnsupportedTransitionType(other)),
    }
}

/// `8.63e-6 Υ / (g_u √T)` for every temperature [K], with `ΔE` in eV.
pub fn collisional_ul_factors(
    record: &CollisionRecord,
    delta_e: f64,
    g_upper: i64,
    temperatures: &[u32],
) -> Result<Vec<f64>> {
    let x_knots = unit_linspace(record.btemp.len());
    let spline = CubicSpline::not_a_knot(&x_knots, &record.bscups)?;
    temperatures
        .iter()
        .map(|&t| {
            let t = f64::from(t);
            let reduced = K_B_EV * t / delta_e;
            let upsilon = burgess_tully_upsilon(record.ttype, record.cups, &spline, reduced)?;
            Ok(COLLISIONAL_FACTOR * upsilon / (g_upper as f64 * t.sqrt()))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCollision {
    pub e_col_id: i64,
    pub species: Species,
    pub lower_level_id: i64,
    pub upper_level_id: i64,
    pub level_number_lower: i64,
    pub level_number_upper: i64,
    pub ttype: i64,
    pub cups: f64,
    pub gf: Option<f64>,
    pub g_ratio: f64,
    /// K
    pub delta_e: f64,
    /// One per grid temperature.
    pub factors: Vec<f64>,
    pub source: DataSource,
}

#[derive(Debug, Clone, Default)]
pub struct Collisions {
    temperatures: Vec<u32>,
    rows: Vec<PreparedCollision>,
}

impl Collisions {
    pub fn rows(&self) -> &[PreparedCollision] {
        &self.rows
    }

    pub fn temperatures(&self) -> &[u32] {
        &self.temperatures
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn collisions_prepared(&self) -> Result<DataFrame> {
        let n = self.rows.len();
        let mut atomic_number = Vec::with_capacity(n);
        let mut ion_number = Vec::with_capacity(n);
        let mut lower = Vec::with_capacity(n);
        let mut upper = Vec::with_capacity(n);
        let mut g_ratio = Vec::with_capacity(n);
        let mut delta_e = Vec::with_capacity(n);
        let mut factors: Vec<Vec<f64>> = vec![Vec::with_capacity(n); self.temperatures.len()];
        for row in &self.rows {
            atomic_number.push(row.species.atomic_number);
            ion_number.push(row.species.ion_number);
            lower.push(row.level_number_lower);
            upper.push(row.level_number_upper);
            g_ratio.push(row.g_ratio);
            delta_e.push(row.delta_e);
            for (column, value) in factors.iter_mut().zip(&row.factors) {
                column.push(*value);
            }
        }

        let mut columns = vec![
            Column::new(species::ATOMIC_NUMBER.into(), &atomic_number),
            Column::new(species::ION_NUMBER.into(), &ion_number),
            Column::new(lines::LEVEL_NUMBER_LOWER.into(), &lower),
            Column::new(lines::LEVEL_NUMBER_UPPER.into(), &upper),
            Column::new(collisions::G_RATIO.into(), &g_ratio),
            Column::new(collisions::DELTA_E.into(), &delta_e),
        ];
        // zero-padded names sort like the temperatures
        let mut by_temperature: Vec<(u32, Vec<f64>)> =
            self.temperatures.iter().copied().zip(factors).collect();
        by_temperature.sort_by_key(|(t, _)| *t);
        for (t, values) in by_temperature {
            columns.push(Column::new(
                collisions::temperature_column(t).into(),
                &values,
            ));
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Every column of the prepared rows, keyed by `e_col_id`.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let n = self.rows.len();
        let mut e_col_id = Vec::with_capacity(n);
        let mut lower_id = Vec::with_capacity(n);
        let mut upper_id = Vec::with_capacity(n);
        let mut ds_id = Vec::with_capacity(n);
        let mut ttype = Vec::with_capacity(n);
        let mut cups = Vec::with_capacity(n);
        let mut gf = Vec::with_capacity(n);
        for row in &self.rows {
            e_col_id.push(row.e_col_id);
            lower_id.push(row.lower_level_id);
            upper_id.push(row.upper_level_id);
            ds_id.push(row.source.ds_id());
            ttype.push(row.ttype);
            cups.push(row.cups);
            gf.push(row.gf);
        }
        let mut df = DataFrame::new(vec![
            Column::new(collisions::E_COL_ID.into(), &e_col_id),
            Column::new(lines::LOWER_LEVEL_ID.into(), &lower_id),
            Column::new(lines::UPPER_LEVEL_ID.into(), &upper_id),
            Column::new(levels::DS_ID.into(), &ds_id),
            Column::new(collisions::TTYPE.into(), &ttype),
            Column::new(collisions::CUPS.into(), &cups),
            Column::new(lines::GF.into(), &gf),
        ])?;
        df = df.hstack(self.collisions_prepared()?.get_columns())?;
        Ok(df)
    }
}

/// Matches collision strengths to the consolidated levels.
pub struct CollisionsPreparer<'a> {
    registry: &'a LevelRegistry,
}

impl<'a> CollisionsPreparer<'a> {
    pub fn new(registry: &'a LevelRegistry) -> Self {
        Self { registry }
    }

    /// `first_id` is the first `e_col_id`, one past the last line id.
    pub fn prepare(
        &self,
        records: &[CollisionRecord],
        levels_lines: &LevelsLines,
        first_id: i64,
        temperatures: &[u32],
    ) -> Result<Collisions> {
        info!("Ingesting collisional strengths.");
        let resolution = self.registry.resolution();

        let mut matched = Vec::with_capacity(records.len());
        for record in records {
            if !resolution.wins(record.source, record.species) {
                continue;
            }
            // checked ahead of the culled-level drop below
            base_transition_type(record.ttype)?;
            let lower =
                self.registry
                    .require(record.species, record.source, record.level_index_lower)?;
            let upper =
                self.registry
                    .require(record.species, record.source, record.level_index_upper)?;
            matched.push((lower, upper, record));
        }
        matched.sort_by_key(|(lower, upper, _)| (*lower, *upper));

        info!("Matching collisions and levels.");
        let mut rows = Vec::with_capacity(matched.len());
        for ((lower_id, upper_id, record), e_col_id) in matched.into_iter().zip(first_id..) {
            let (Some(lower), Some(upper)) =
                (levels_lines.level(lower_id), levels_lines.level(upper_id))
            else {
                debug!(
                    "Dropping collision {} of {}: level culled.",
                    e_col_id, record.species
                );
                continue;
            };
            let delta_e_ev = upper.energy - lower.energy;
            let factors = collisional_ul_factors(record, delta_e_ev, upper.g, temperatures)?;
            rows.push(PreparedCollision {
                e_col_id,
                species: record.species,
                lower_level_id: lower_id,
                upper_level_id: upper_id,
                level_number_lower: lower.level_number,
                level_number_upper: upper.level_number,
                ttype: record.ttype,
                cups: record.cups,
                gf: record.gf,
                g_ratio: lower.g as f64 / upper.g as f64,
                delta_e: delta_e_ev / K_B_EV,
                factors,
                source: record.source,
            });
        }

        info!("Prepared {} collision transitions.", rows.len());
        Ok(Collisions {
            temperatures: temperatures.to_vec(),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(ttype: i64, bscups: Vec<f64>) -> CollisionRecord {
        CollisionRecord {
            species: Species::new(14, 1),
            level_index_lower: 0,
            level_index_upper: 1,
            ttype,
            cups: 2.0,
            btemp: unit_linspace(bscups.len()),
            bscups,
            gf: None,
            source: DataSource::Chianti,
        }
    }

    #[test]
    fn flat_type_two_gives_constant_upsilon() {
        let r = record(2, vec![0.7; 5]);
        let factors = collisional_ul_factors(&r, 1.0, 4, &[2000, 8000]).unwrap();
        assert_relative_eq!(factors[0], 8.63e-6 * 0.7 / (4.0 * 2000f64.sqrt()), max_relative = 1e-9);
        assert_relative_eq!(factors[1], 8.63e-6 * 0.7 / (4.0 * 8000f64.sqrt()), max_relative = 1e-9);
    }

    #[test]
    fn type_one_scales_with_log() {
        let flat = CubicSpline::not_a_knot(&unit_linspace(5), &[1.0; 5]).unwrap();
        let reduced = 0.5;
        let upsilon = burgess_tully_upsilon(1, 2.0, &flat, reduced).unwrap();
        assert_relative_eq!(upsilon, (reduced + std::f64::consts::E).ln(), max_relative = 1e-12);
        let upsilon = burgess_tully_upsilon(3, 2.0, &flat, reduced).unwrap();
        assert_relative_eq!(upsilon, 1.0 / (reduced + 1.0), max_relative = 1e-12);
        let upsilon = burgess_tully_upsilon(4, 2.0, &flat, reduced).unwrap();
        assert_relative_eq!(upsilon, (reduced + 2.0f64).ln(), max_relative = 1e-12);
    }

    #[test]
    fn shifted_types_match_their_base() {
        let spline = CubicSpline::not_a_knot(&unit_linspace(5), &[0.1, 0.3, 0.2, 0.5, 0.4]).unwrap();
        for base in 1..=4 {
            let a = burgess_tully_upsilon(base, 1.5, &spline, 0.8).unwrap();
            let b = burgess_tully_upsilon(base + 5, 1.5, &spline, 0.8).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn type_five_is_unsupported() {
        let r = record(5, vec![0.7; 5]);
        assert!(matches!(
            collisional_ul_factors(&r, 1.0, 4, &[2000]),
            Err(AtomError::UnsupportedTransitionType(5))
        ));
        let r = record(10, vec![0.7; 5]);
        assert!(matches!(
            collisional_ul_factors(&r, 1.0, 4, &[2000]),
            Err(AtomError::UnsupportedTransitionType(5))
        ));
    }

    #[test]
    fn base_types() {
        assert_eq!(base_transition_type(3).unwrap(), 3);
        assert_eq!(base_transition_type(9).unwrap(), 4);
        for bad in [0, 5, 10, 11, -1] {
            assert!(matches!(
                base_transition_type(bad),
                Err(AtomError::UnsupportedTransitionType(_))
            ));
        }
    }

    #[test]
    fn too_few_knots_is_invalid() {
        let r = record(2, vec![0.7; 3]);
        assert!(matches!(
            collisional_ul_factors(&r, 1.0, 4, &[2000]),
            Err(AtomError::InvalidData(_))
        ));
    }
}
