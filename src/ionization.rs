//! Ionization energies and NIST ground levels.

use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::*;
use tracing::{info, warn};

use crate::error::Result;
use crate::frame::{f64_values, has_column, i64_values, normalize_species_columns, str_values};
use crate::schema::{ionization, levels, species};
use crate::source::SourceLevel;
use crate::species::{species_list, DataSource, Species};

/// Priority carried by the NIST ground levels. They never take part in the
/// resolution, so any value works.
const GROUND_LEVEL_PRIORITY: i64 = 0;

#[derive(Debug, Clone, PartialEq)]
pub struct GroundLevel {
    pub species: Species,
    pub g: i64,
    pub label: Option<String>,
}

/// Ionization energy [eV] of each species, plus its ground level.
#[derive(Debug, Clone, Default)]
pub struct IonizationEnergies {
    energies: BTreeMap<Species, f64>,
    ground_levels: Vec<GroundLevel>,
    pub version: Option<String>,
}

impl IonizationEnergies {
    /// Build from an ionization table (`atomic_number`, `ion_number`,
    /// `ionization_energy`) and a ground-level table (`atomic_number`,
    /// `ion_number`, `g` or `j`, optional `configuration`/`label`).
    pub fn from_frame(ionization_df: &DataFrame, ground_levels_df: &DataFrame) -> Result<Self> {
        let df = normalize_species_columns(ionization_df.clone())?;
        let zs = i64_values(&df, species::ATOMIC_NUMBER)?;
        let ions = i64_values(&df, species::ION_NUMBER)?;
        let values = f64_values(&df, ionization::IONIZATION_ENERGY)?;

        let mut energies = BTreeMap::new();
        for i in 0..df.height() {
            let (Some(z), Some(ion)) = (zs[i], ions[i]) else {
                warn!("Dropping ionization row {}: missing species.", i);
                continue;
            };
            let species = Species::new(z, ion);
            match values[i].filter(|v| v.is_finite()) {
                Some(value) if species.is_valid() => {
                    energies.insert(species, value);
                }
                _ => warn!(
                    "Dropping ionization row {} for {}: missing or invalid `{}`.",
                    i,
                    species,
                    ionization::IONIZATION_ENERGY
                ),
            }
        }

        let ground_levels = Self::read_ground_levels(ground_levels_df)?;
        info!(
            "Loaded {} ionization energies and {} ground levels.",
            energies.len(),
            ground_levels.len()
        );

        Ok(Self {
            energies,
            ground_levels,
            version: None,
        })
    }

    /// Ionization energies only, e.g. from a secondary source.
    pub fn from_energies(energies: impl IntoIterator<Item = (Species, f64)>) -> Self {
        Self {
            energies: energies.into_iter().collect(),
            ground_levels: Vec::new(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    fn read_ground_levels(df: &DataFrame) -> Result<Vec<GroundLevel>> {
        let df = normalize_species_columns(df.clone())?;
        let zs = i64_values(&df, species::ATOMIC_NUMBER)?;
        let ions = i64_values(&df, species::ION_NUMBER)?;
        let weights: Vec<Option<i64>> = if has_column(&df, levels::G) {
            i64_values(&df, levels::G)?
        } else {
            f64_values(&df, levels::J)?
                .into_iter()
                .map(|j| j.map(|j| (2.0 * j + 1.0).round() as i64))
                .collect()
        };
        let labels = if has_column(&df, levels::CONFIGURATION) {
            str_values(&df, levels::CONFIGURATION)?
        } else if has_column(&df, levels::LABEL) {
            str_values(&df, levels::LABEL)?
        } else {
            vec![None; df.height()]
        };

        let mut ground_levels = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let (Some(z), Some(ion), Some(g)) = (zs[i], ions[i], weights[i]) else {
                warn!("Dropping ground level row {}: missing species or weight.", i);
                continue;
            };
            let species = Species::new(z, ion);
            if !species.is_valid() || g <= 0 {
                warn!("Dropping ground level row {} for {}: invalid species or g.", i, species);
                continue;
            }
            ground_levels.push(GroundLevel {
                species,
                g,
                label: labels[i].clone(),
            });
        }
        Ok(ground_levels)
    }

    pub fn get(&self, species: Species) -> Option<f64> {
        self.energies.get(&species).copied()
    }

    pub fn species(&self) -> impl Iterator<Item = &Species> {
        self.energies.keys()
    }

    pub fn len(&self) -> usize {
        self.energies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energies.is_empty()
    }

    pub fn ground_levels(&self) -> &[GroundLevel] {
        &self.ground_levels
    }

    /// Merge with `other`; where both carry a value, `other` wins. Ground
    /// levels are kept from `self`.
    pub fn combine_first(&self, other: &IonizationEnergies) -> IonizationEnergies {
        let ours: BTreeSet<Species> = self.energies.keys().copied().collect();
        let theirs: BTreeSet<Species> = other.energies.keys().copied().collect();
        let only_one: BTreeSet<Species> = ours.symmetric_difference(&theirs).copied().collect();
        if !only_one.is_empty() {
            warn!(
                "Ionization energies present in only one table: {}.",
                species_list(&only_one)
            );
        }

        let mut energies = self.energies.clone();
        energies.extend(other.energies.iter().map(|(s, v)| (*s, *v)));
        IonizationEnergies {
            energies,
            ground_levels: self.ground_levels.clone(),
            version: self.version.clone().or_else(|| other.version.clone()),
        }
    }

    /// The ground levels as NIST level rows (`level_index` 0, energy 0).
    pub fn ground_level_records(&self) -> Vec<SourceLevel> {
        self.ground_levels
            .iter()
            .map(|ground| SourceLevel {
                species: ground.species,
                level_index: 0,
                g: ground.g,
                energy: 0.0,
                label: ground.label.clone(),
                source: DataSource::Nist,
                priority: GROUND_LEVEL_PRIORITY,
            })
            .collect()
    }

    /// Flat table in the downstream convention where the ionization energy
    /// of stage `i` is keyed by `i + 1`.
    pub fn prepared(&self) -> Result<DataFrame> {
        let mut atomic_number = Vec::with_capacity(self.energies.len());
        let mut ion_number = Vec::with_capacity(self.energies.len());
        let mut energy = Vec::with_capacity(self.energies.len());
        for (species, value) in &self.energies {
            atomic_number.push(species.atomic_number);
            ion_number.push(species.ion_number + 1);
            energy.push(*value);
        }
        Ok(DataFrame::new(vec![
            Column::new(species::ATOMIC_NUMBER.into(), &atomic_number),
            Column::new(species::ION_NUMBER.into(), &ion_number),
            Column::new(ionization::IONIZATION_ENERGY.into(), &energy),
        ])?)
    }
}
