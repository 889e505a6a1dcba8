//! Culling of autoionizing levels and weak lines, metastability flags and
//! level numbering.

use std::collections::{BTreeSet, HashMap, HashSet};

use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::ionization::IonizationEnergies;
use crate::levels::LevelRegistry;
use crate::lines::CanonicalLine;
use crate::radiative::RadiativeQuantities;
use crate::schema::{levels, lines, species};
use crate::species::{species_list, DataSource, Species};

/// `level_id` of the synthetic fully-ionized levels.
pub const PLACEHOLDER_LEVEL_ID: i64 = -1;

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedLevel {
    pub level_id: i64,
    pub species: Species,
    pub level_number: i64,
    /// eV
    pub energy: f64,
    pub g: i64,
    pub metastable: bool,
    /// `None` for the fully-ionized placeholders.
    pub source: Option<DataSource>,
}

impl PreparedLevel {
    pub fn is_placeholder(&self) -> bool {
        self.level_id == PLACEHOLDER_LEVEL_ID
    }

    fn fully_ionized(atomic_number: i64) -> Self {
        Self {
            level_id: PLACEHOLDER_LEVEL_ID,
            species: Species::fully_ionized(atomic_number),
            level_number: 0,
            energy: 0.0,
            g: 1,
            metastable: true,
            source: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedLine {
    pub line_id: i64,
    pub species: Species,
    pub lower_level_id: i64,
    pub upper_level_id: i64,
    pub level_number_lower: i64,
    pub level_number_upper: i64,
    /// Å, vacuum
    pub wavelength: f64,
    pub gf: f64,
    pub loggf: f64,
    pub radiative: RadiativeQuantities,
}

/// The culled levels and lines with everything TARDIS needs.
#[derive(Debug, Clone)]
pub struct LevelsLines {
    levels: Vec<PreparedLevel>,
    lines: Vec<PreparedLine>,
    by_id: HashMap<i64, usize>,
}

impl LevelsLines {
    pub fn build(
        registry: &LevelRegistry,
        consolidated: &[CanonicalLine],
        ionization: &IonizationEnergies,
        config: &PipelineConfig,
    ) -> Result<Self> {
        info!("Culling levels and lines.");

        // Autoionizing levels go first, so lines to them disappear below.
        let mut missing_ie = BTreeSet::new();
        let mut kept: Vec<PreparedLevel> = Vec::with_capacity(registry.len());
        for level in registry.levels() {
            let Some(ionization_energy) = ionization.get(level.species) else {
                missing_ie.insert(level.species);
                continue;
            };
            if level.energy >= ionization_energy {
                continue;
            }
            kept.push(PreparedLevel {
                level_id: level.level_id,
                species: level.species,
                level_number: 0,
                energy: level.energy,
                g: level.g,
                metastable: true,
                source: Some(level.source),
            });
        }
        if !missing_ie.is_empty() {
            warn!(
                "No ionization energy for {}; dropping their levels.",
                species_list(&missing_ie)
            );
        }
        for species in registry.species() {
            if !kept.iter().any(|l| l.species == species) {
                debug!("{} has no levels left after culling.", species);
            }
        }

        // Metastability looks at every consolidated line, culled or not.
        let radiating_uppers: HashSet<i64> = consolidated
            .iter()
            .filter(|line| line.loggf > config.levels_metastable_loggf_threshold)
            .map(|line| line.upper_level_id)
            .collect();
        for level in &mut kept {
            level.metastable = !radiating_uppers.contains(&level.level_id);
        }

        kept.sort_by(|a, b| {
            a.species
                .cmp(&b.species)
                .then(a.energy.total_cmp(&b.energy))
                .then(a.g.cmp(&b.g))
        });
        number_levels(&mut kept);

        let by_id: HashMap<i64, usize> = kept
            .iter()
            .enumerate()
            .map(|(pos, level)| (level.level_id, pos))
            .collect();

        let mut prepared_lines = Vec::with_capacity(consolidated.len());
        let mut weak = 0usize;
        for line in consolidated {
            if let Some(threshold) = config.lines_loggf_threshold {
                if line.loggf <= threshold {
                    weak += 1;
                    continue;
                }
            }
            let (Some(&lower), Some(&upper)) =
                (by_id.get(&line.lower_level_id), by_id.get(&line.upper_level_id))
            else {
                continue;
            };
            let (lower, upper) = (&kept[lower], &kept[upper]);
            prepared_lines.push(PreparedLine {
                line_id: line.line_id,
                species: line.species,
                lower_level_id: line.lower_level_id,
                upper_level_id: line.upper_level_id,
                level_number_lower: lower.level_number,
                level_number_upper: upper.level_number,
                wavelength: line.wavelength,
                gf: line.gf,
                loggf: line.loggf,
                radiative: RadiativeQuantities::derive(line.gf, line.wavelength, lower.g, upper.g),
            });
        }
        debug!("Culled {} weak lines.", weak);

        let atomic_numbers: BTreeSet<i64> = kept.iter().map(|l| l.species.atomic_number).collect();
        let present: HashSet<Species> = kept.iter().map(|l| l.species).collect();
        let mut all_levels = kept;
        for z in atomic_numbers {
            if !present.contains(&Species::fully_ionized(z)) {
                all_levels.push(PreparedLevel::fully_ionized(z));
            }
        }
        all_levels.sort_by(|a, b| {
            a.species
                .cmp(&b.species)
                .then(a.level_number.cmp(&b.level_number))
        });
        let by_id = all_levels
            .iter()
            .enumerate()
            .filter(|(_, level)| !level.is_placeholder())
            .map(|(pos, level)| (level.level_id, pos))
            .collect();

        info!(
            "Kept {} levels and {} lines after culling.",
            all_levels.len(),
            prepared_lines.len()
        );
        Ok(Self {
            levels: all_levels,
            lines: prepared_lines,
            by_id,
        })
    }

    /// Levels including the fully-ionized placeholders, sorted by
    /// (atomic_number, ion_number, level_number).
    pub fn levels(&self) -> &[PreparedLevel] {
        &self.levels
    }

    /// Lines in `line_id` order.
    pub fn lines(&self) -> &[PreparedLine] {
        &self.lines
    }

    /// A surviving level by id. Placeholders have no id to look up.
    pub fn level(&self, level_id: i64) -> Option<&PreparedLevel> {
        self.by_id.get(&level_id).map(|&pos| &self.levels[pos])
    }

    pub fn levels_prepared(&self) -> Result<DataFrame> {
        let n = self.levels.len();
        let mut atomic_number = Vec::with_capacity(n);
        let mut ion_number = Vec::with_capacity(n);
        let mut level_number = Vec::with_capacity(n);
        let mut energy = Vec::with_capacity(n);
        let mut g = Vec::with_capacity(n);
        let mut metastable = Vec::with_capacity(n);
        for level in &self.levels {
            atomic_number.push(level.species.atomic_number);
            ion_number.push(level.species.ion_number);
            level_number.push(level.level_number);
            energy.push(level.energy);
            g.push(level.g);
            metastable.push(level.metastable);
        }
        Ok(DataFrame::new(vec![
            Column::new(species::ATOMIC_NUMBER.into(), &atomic_number),
            Column::new(species::ION_NUMBER.into(), &ion_number),
            Column::new(levels::LEVEL_NUMBER.into(), &level_number),
            Column::new(levels::ENERGY.into(), &energy),
            Column::new(levels::G.into(), &g),
            Column::new(levels::METASTABLE.into(), &metastable),
        ])?)
    }

    pub fn lines_prepared(&self) -> Result<DataFrame> {
        let n = self.lines.len();
        let mut atomic_number = Vec::with_capacity(n);
        let mut ion_number = Vec::with_capacity(n);
        let mut lower = Vec::with_capacity(n);
        let mut upper = Vec::with_capacity(n);
        let mut line_id = Vec::with_capacity(n);
        let mut wavelength = Vec::with_capacity(n);
        let mut nu = Vec::with_capacity(n);
        let mut f_lu = Vec::with_capacity(n);
        let mut f_ul = Vec::with_capacity(n);
        let mut a_ul = Vec::with_capacity(n);
        let mut b_lu = Vec::with_capacity(n);
        let mut b_ul = Vec::with_capacity(n);
        for line in &self.lines {
            atomic_number.push(line.species.atomic_number);
            ion_number.push(line.species.ion_number);
            lower.push(line.level_number_lower);
            upper.push(line.level_number_upper);
            line_id.push(line.line_id);
            wavelength.push(line.wavelength);
            nu.push(line.radiative.nu);
            f_lu.push(line.radiative.f_lu);
            f_ul.push(line.radiative.f_ul);
            a_ul.push(line.radiative.a_ul);
            b_lu.push(line.radiative.b_lu);
            b_ul.push(line.radiative.b_ul);
        }
        Ok(DataFrame::new(vec![
            Column::new(species::ATOMIC_NUMBER.into(), &atomic_number),
            Column::new(species::ION_NUMBER.into(), &ion_number),
            Column::new(lines::LEVEL_NUMBER_LOWER.into(), &lower),
            Column::new(lines::LEVEL_NUMBER_UPPER.into(), &upper),
            Column::new(lines::LINE_ID.into(), &line_id),
            Column::new(lines::WAVELENGTH.into(), &wavelength),
            Column::new(lines::NU.into(), &nu),
            Column::new(lines::F_LU.into(), &f_lu),
            Column::new(lines::F_UL.into(), &f_ul),
            Column::new(lines::A_UL.into(), &a_ul),
            Column::new(lines::B_LU.into(), &b_lu),
            Column::new(lines::B_UL.into(), &b_ul),
        ])?)
    }
}

/// `level_number` 0.. within each species; `levels` must be grouped by
/// species.
fn number_levels(levels: &mut [PreparedLevel]) {
    let mut current: Option<Species> = None;
    let mut next = 0;
    for level in levels {
        if current != Some(level.species) {
            current = Some(level.species);
            next = 0;
        }
        level.level_number = next;
        next += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TieBreak;
    use crate::lines::LineConsolidator;
    use crate::priority::resolve_priorities;
    use crate::source::{SourceLevel, SourceLine};

    fn level(index: i64, g: i64, energy: f64) -> SourceLevel {
        SourceLevel {
            species: Species::new(14, 1),
            level_index: index,
            g,
            energy,
            label: None,
            source: DataSource::Gfall,
            priority: 10,
        }
    }

    fn line(lower: i64, upper: i64, loggf: f64) -> SourceLine {
        SourceLine {
            species: Species::new(14, 1),
            level_index_lower: lower,
            level_index_upper: upper,
            wavelength: 180.0,
            gf: 10f64.powf(loggf),
            source: DataSource::Gfall,
        }
    }

    fn build(config: &PipelineConfig) -> LevelsLines {
        // given out of energy order on purpose
        let source_levels = vec![
            level(0, 2, 0.0),
            level(1, 4, 0.0356),
            level(2, 2, 6.86),
            level(3, 6, 5.31),
            level(4, 2, 17.0),
        ];
        let source_lines = vec![
            line(0, 2, 0.1),
            line(1, 2, -0.2),
            line(0, 3, -4.43),
            line(1, 4, 0.5),
        ];
        let resolution = resolve_priorities(&source_levels, TieBreak::Error).unwrap();
        let registry = LevelRegistry::consolidate(&[], &source_levels, resolution).unwrap();
        let consolidated = LineConsolidator::new(&registry)
            .consolidate(&source_lines)
            .unwrap();
        let ionization = IonizationEnergies::from_energies([(Species::new(14, 1), 16.345_845)]);
        LevelsLines::build(&registry, &consolidated, &ionization, config).unwrap()
    }

    #[test]
    fn autoionizing_levels_and_their_lines_are_culled() {
        let ll = build(&PipelineConfig::default());
        let si2: Vec<_> = ll
            .levels()
            .iter()
            .filter(|l| l.species == Species::new(14, 1))
            .collect();
        assert_eq!(si2.len(), 4);
        assert!(si2.iter().all(|l| l.energy < 16.345_845));
        assert!(ll.lines().iter().all(|l| l.line_id != 4));
    }

    #[test]
    fn levels_are_numbered_by_energy() {
        let ll = build(&PipelineConfig::default());
        let numbers: Vec<(i64, f64)> = ll
            .levels()
            .iter()
            .filter(|l| !l.is_placeholder())
            .map(|l| (l.level_number, l.energy))
            .collect();
        assert_eq!(numbers, vec![(0, 0.0), (1, 0.0356), (2, 5.31), (3, 6.86)]);
    }

    #[test]
    fn weak_line_is_culled_but_counts_for_metastability() {
        let ll = build(&PipelineConfig::default());
        assert_eq!(ll.lines().len(), 2);
        assert!(ll.lines().iter().all(|l| l.loggf > -3.0));
        // 5.31 eV level only has the loggf=-4.43 line, below -3: metastable
        let level = ll.levels().iter().find(|l| l.energy == 5.31).unwrap();
        assert!(level.metastable);

        let loose = PipelineConfig {
            levels_metastable_loggf_threshold: -5.0,
            ..PipelineConfig::default()
        };
        let ll = build(&loose);
        let level = ll.levels().iter().find(|l| l.energy == 5.31).unwrap();
        assert!(!level.metastable);
        assert_eq!(ll.lines().len(), 2);
    }

    #[test]
    fn threshold_none_keeps_weak_lines() {
        let config = PipelineConfig {
            lines_loggf_threshold: None,
            ..PipelineConfig::default()
        };
        let ll = build(&config);
        assert_eq!(ll.lines().len(), 3);
    }

    #[test]
    fn placeholder_is_appended_per_element() {
        let ll = build(&PipelineConfig::default());
        let placeholders: Vec<_> = ll.levels().iter().filter(|l| l.is_placeholder()).collect();
        assert_eq!(placeholders.len(), 1);
        let p = placeholders[0];
        assert_eq!(p.species, Species::new(14, 14));
        assert_eq!((p.level_number, p.energy, p.g, p.metastable), (0, 0.0, 1, true));
        assert_eq!(ll.levels().last().unwrap().level_id, PLACEHOLDER_LEVEL_ID);
    }

    #[test]
    fn lines_carry_level_numbers() {
        let ll = build(&PipelineConfig::default());
        let first = &ll.lines()[0];
        assert_eq!((first.level_number_lower, first.level_number_upper), (0, 3));
        let df = ll.lines_prepared().unwrap();
        assert_eq!(df.width(), 12);
        assert_eq!(ll.levels_prepared().unwrap().height(), 5);
    }

    #[test]
    fn species_without_ionization_energy_loses_its_levels() {
        let source_levels = vec![level(0, 2, 0.0), level(1, 4, 0.0356)];
        let resolution = resolve_priorities(&source_levels, TieBreak::Error).unwrap();
        let registry = LevelRegistry::consolidate(&[], &source_levels, resolution).unwrap();
        let ll = LevelsLines::build(
            &registry,
            &[],
            &IonizationEnergies::default(),
            &PipelineConfig::default(),
        )
        .unwrap();
        assert!(ll.levels().is_empty());
    }
}
