//! Photoionization cross sections matched to the culled levels.

use polars::prelude::*;
use tracing::info;

use crate::culling::LevelsLines;
use crate::error::Result;
use crate::levels::LevelRegistry;
use crate::schema::{cross_sections, levels, species};
use crate::source::CrossSectionPoint;
use crate::species::Species;
use crate::units::{MBARN_TO_CM2, RYDBERG_TO_HZ};

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCrossSection {
    pub x_sect_id: i64,
    pub species: Species,
    pub level_id: i64,
    pub level_number: i64,
    /// Hz
    pub nu: f64,
    /// cm^2
    pub x_sect: f64,
}

pub struct PhotoIonizationPreparer<'a> {
    registry: &'a LevelRegistry,
}

impl<'a> PhotoIonizationPreparer<'a> {
    pub fn new(registry: &'a LevelRegistry) -> Self {
        Self { registry }
    }

    /// `first_id` is the first `x_sect_id`, one past the last line id.
    pub fn prepare(
        &self,
        points: &[CrossSectionPoint],
        levels_lines: &LevelsLines,
        first_id: i64,
    ) -> Result<Vec<PreparedCrossSection>> {
        info!("Ingesting photoionization cross sections.");
        let resolution = self.registry.resolution();

        let mut matched = Vec::with_capacity(points.len());
        for point in points {
            if !resolution.wins(point.source, point.species) {
                continue;
            }
            let level_id = self
                .registry
                .require(point.species, point.source, point.level_index)?;
            matched.push((level_id, point));
        }
        matched.sort_by_key(|(level_id, _)| *level_id);

        let prepared: Vec<PreparedCrossSection> = matched
            .into_iter()
            .zip(first_id..)
            .filter_map(|((level_id, point), x_sect_id)| {
                let level = levels_lines.level(level_id)?;
                Some(PreparedCrossSection {
                    x_sect_id,
                    species: point.species,
                    level_id,
                    level_number: level.level_number,
                    nu: point.energy * RYDBERG_TO_HZ,
                    x_sect: point.sigma * MBARN_TO_CM2,
                })
            })
            .collect();
        info!("Prepared {} cross-section points.", prepared.len());
        Ok(prepared)
    }
}

pub fn cross_sections_prepared(prepared: &[PreparedCrossSection]) -> Result<DataFrame> {
    let n = prepared.len();
    let mut atomic_number = Vec::with_capacity(n);
    let mut ion_number = Vec::with_capacity(n);
    let mut level_number = Vec::with_capacity(n);
    let mut nu = Vec::with_capacity(n);
    let mut x_sect = Vec::with_capacity(n);
    for p in prepared {
        atomic_number.push(p.species.atomic_number);
        ion_number.push(p.species.ion_number);
        level_number.push(p.level_number);
        nu.push(p.nu);
        x_sect.push(p.x_sect);
    }
    Ok(DataFrame::new(vec![
        Column::new(species::ATOMIC_NUMBER.into(), &atomic_number),
        Column::new(species::ION_NUMBER.into(), &ion_number),
        Column::new(levels::LEVEL_NUMBER.into(), &level_number),
        Column::new(cross_sections::NU.into(), &nu),
        Column::new(cross_sections::X_SECT.into(), &x_sect),
    ])?)
}
