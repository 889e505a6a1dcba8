//! The full curation run: every prepared table, computed once.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use polars::prelude::*;
use tracing::info;
use uuid::Uuid;

use crate::collisions::{Collisions, CollisionsPreparer};
use crate::config::PipelineConfig;
use crate::culling::LevelsLines;
use crate::error::{AtomError, Result};
use crate::io;
use crate::ionization::IonizationEnergies;
use crate::levels::LevelRegistry;
use crate::lines::{CanonicalLine, LineConsolidator};
use crate::macro_atom::MacroAtom;
use crate::photoionization::{cross_sections_prepared, PhotoIonizationPreparer, PreparedCrossSection};
use crate::priority::resolve_priorities;
use crate::schema::{lines, levels, macro_atom, metadata, species};
use crate::source::SourceTables;
use crate::species::DataSource;

pub const FORMAT_VERSION: &str = "1.0";

/// The exported tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreparedTable {
    IonizationEnergies,
    Levels,
    Lines,
    MacroAtom,
    MacroAtomReferences,
    Collisions,
    CrossSections,
}

impl PreparedTable {
    pub const ALL: [PreparedTable; 7] = [
        PreparedTable::IonizationEnergies,
        PreparedTable::Levels,
        PreparedTable::Lines,
        PreparedTable::MacroAtom,
        PreparedTable::MacroAtomReferences,
        PreparedTable::Collisions,
        PreparedTable::CrossSections,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PreparedTable::IonizationEnergies => "ionization_energies_prepared",
            PreparedTable::Levels => "levels_prepared",
            PreparedTable::Lines => "lines_prepared",
            PreparedTable::MacroAtom => "macro_atom_prepared",
            PreparedTable::MacroAtomReferences => "macro_atom_references_prepared",
            PreparedTable::Collisions => "collisions_prepared",
            PreparedTable::CrossSections => "cross_sections_prepared",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Columns identifying a row.
    pub fn index_columns(self) -> &'static [&'static str] {
        match self {
            PreparedTable::IonizationEnergies => &[species::ATOMIC_NUMBER, species::ION_NUMBER],
            PreparedTable::Levels | PreparedTable::CrossSections => {
                &[species::ATOMIC_NUMBER, species::ION_NUMBER, levels::LEVEL_NUMBER]
            }
            PreparedTable::Collisions => &[
                species::ATOMIC_NUMBER,
                species::ION_NUMBER,
                lines::LEVEL_NUMBER_LOWER,
                lines::LEVEL_NUMBER_UPPER,
            ],
            // a level pair can carry several lines
            PreparedTable::Lines => &[
                species::ATOMIC_NUMBER,
                species::ION_NUMBER,
                lines::LEVEL_NUMBER_LOWER,
                lines::LEVEL_NUMBER_UPPER,
                lines::LINE_ID,
            ],
            PreparedTable::MacroAtom => &[
                species::ATOMIC_NUMBER,
                species::ION_NUMBER,
                macro_atom::SOURCE_LEVEL_NUMBER,
                macro_atom::DESTINATION_LEVEL_NUMBER,
                macro_atom::TRANSITION_TYPE,
                macro_atom::TRANSITION_LINE_ID,
            ],
            PreparedTable::MacroAtomReferences => &[
                species::ATOMIC_NUMBER,
                species::ION_NUMBER,
                macro_atom::SOURCE_LEVEL_NUMBER,
            ],
        }
    }
}

impl fmt::Display for PreparedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a run is built from.
#[derive(Debug, Clone)]
pub struct AtomDataInputs {
    pub ionization: IonizationEnergies,
    /// Ionization energies overriding `ionization` where both have a value.
    pub ionization_override: Option<IonizationEnergies>,
    /// In declaration order.
    pub sources: Vec<SourceTables>,
}

impl AtomDataInputs {
    pub fn new(ionization: IonizationEnergies) -> Self {
        Self {
            ionization,
            ionization_override: None,
            sources: Vec::new(),
        }
    }

    pub fn with_ionization_override(mut self, other: IonizationEnergies) -> Self {
        self.ionization_override = Some(other);
        self
    }

    pub fn with_source(mut self, source: SourceTables) -> Self {
        self.sources.push(source);
        self
    }

    fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for tables in &self.sources {
            if tables.source == DataSource::Nist {
                return Err(AtomError::Validation(
                    "NIST contributes ground levels through the ionization energies, not as a source"
                        .into(),
                ));
            }
            if !seen.insert(tables.source) {
                return Err(AtomError::Validation(format!(
                    "{} is declared more than once",
                    tables.source
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunMetadata {
    pub format_version: String,
    pub uuid: Uuid,
    pub date: DateTime<Utc>,
    /// Dataset name → version, for the datasets that declare one.
    pub datasets: BTreeMap<String, String>,
}

impl RunMetadata {
    fn new(inputs: &AtomDataInputs) -> Self {
        let mut datasets = BTreeMap::new();
        let ionization = [Some(&inputs.ionization), inputs.ionization_override.as_ref()];
        for (name, ie) in ["NIST ionization", "ionization override"].iter().zip(ionization) {
            if let Some(version) = ie.and_then(|ie| ie.version.clone()) {
                datasets.insert(name.to_string(), version);
            }
        }
        for tables in &inputs.sources {
            if let Some(version) = &tables.version {
                datasets.insert(tables.source.to_string(), version.clone());
            }
        }
        Self {
            format_version: FORMAT_VERSION.to_string(),
            uuid: Uuid::new_v4(),
            date: Utc::now(),
            datasets,
        }
    }

    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut fields = vec!["format", "run", "run"];
        let mut keys = vec!["version".to_string(), "uuid".to_string(), "date".to_string()];
        let mut values = vec![
            self.format_version.clone(),
            self.uuid.to_string(),
            self.date.to_rfc3339_opts(SecondsFormat::Secs, true),
        ];
        for (name, version) in &self.datasets {
            fields.push("datasets");
            keys.push(name.clone());
            values.push(version.clone());
        }
        Ok(DataFrame::new(vec![
            Column::new(metadata::FIELD.into(), &fields),
            Column::new(metadata::KEY.into(), &keys),
            Column::new(metadata::VALUE.into(), &values),
        ])?)
    }
}

/// Everything derived from one set of inputs and one configuration.
pub struct AtomData {
    inputs: AtomDataInputs,
    config: PipelineConfig,
    metadata: RunMetadata,
    ionization: IonizationEnergies,
    registry: LevelRegistry,
    lines: Vec<CanonicalLine>,
    levels_lines: LevelsLines,
    macro_atom: MacroAtom,
    collisions: Collisions,
    cross_sections: Vec<PreparedCrossSection>,
    tables: BTreeMap<PreparedTable, DataFrame>,
}

impl AtomData {
    pub fn new(inputs: AtomDataInputs, config: PipelineConfig) -> Result<Self> {
        inputs.validate()?;
        config.validate()?;
        info!("Building atomic data from {} sources.", inputs.sources.len());

        let ionization = match &inputs.ionization_override {
            Some(other) => inputs.ionization.combine_first(other),
            None => inputs.ionization.clone(),
        };

        let mut level_records = Vec::new();
        let mut line_records = Vec::new();
        let mut collision_records = Vec::new();
        let mut cross_section_points = Vec::new();
        for tables in &inputs.sources {
            level_records.extend(tables.level_records()?);
            line_records.extend(tables.line_records()?);
            collision_records.extend(tables.collision_records()?);
            cross_section_points.extend(tables.cross_section_records()?);
        }

        let resolution = resolve_priorities(&level_records, config.priority_tie_break)?;
        let registry = LevelRegistry::consolidate(
            &ionization.ground_level_records(),
            &level_records,
            resolution,
        )?;
        let lines = LineConsolidator::new(&registry).consolidate(&line_records)?;
        let levels_lines = LevelsLines::build(&registry, &lines, &ionization, &config)?;
        let macro_atom = MacroAtom::build(&levels_lines)?;

        let next_id = lines.last().map_or(0, |l| l.line_id) + 1;
        let collisions = CollisionsPreparer::new(&registry).prepare(
            &collision_records,
            &levels_lines,
            next_id,
            &config.collision_temperatures.temperatures(),
        )?;
        let cross_sections =
            PhotoIonizationPreparer::new(&registry).prepare(&cross_section_points, &levels_lines, next_id)?;

        let mut tables = BTreeMap::new();
        tables.insert(PreparedTable::IonizationEnergies, ionization.prepared()?);
        tables.insert(PreparedTable::Levels, levels_lines.levels_prepared()?);
        tables.insert(PreparedTable::Lines, levels_lines.lines_prepared()?);
        tables.insert(PreparedTable::MacroAtom, macro_atom.macro_atom_prepared()?);
        tables.insert(
            PreparedTable::MacroAtomReferences,
            macro_atom.references_prepared()?,
        );
        tables.insert(PreparedTable::Collisions, collisions.collisions_prepared()?);
        tables.insert(
            PreparedTable::CrossSections,
            cross_sections_prepared(&cross_sections)?,
        );

        let metadata = RunMetadata::new(&inputs);
        info!("Atomic data {} ready.", metadata.uuid);
        Ok(Self {
            inputs,
            config,
            metadata,
            ionization,
            registry,
            lines,
            levels_lines,
            macro_atom,
            collisions,
            cross_sections,
            tables,
        })
    }

    /// Rebuild every table from the same inputs under a new configuration.
    pub fn recompute(&mut self, config: PipelineConfig) -> Result<()> {
        *self = Self::new(self.inputs.clone(), config)?;
        Ok(())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    pub fn ionization_energies(&self) -> &IonizationEnergies {
        &self.ionization
    }

    pub fn registry(&self) -> &LevelRegistry {
        &self.registry
    }

    /// Consolidated lines before culling.
    pub fn all_lines(&self) -> &[CanonicalLine] {
        &self.lines
    }

    pub fn levels_lines(&self) -> &LevelsLines {
        &self.levels_lines
    }

    pub fn macro_atom(&self) -> &MacroAtom {
        &self.macro_atom
    }

    pub fn collisions(&self) -> &Collisions {
        &self.collisions
    }

    pub fn cross_sections(&self) -> &[PreparedCrossSection] {
        &self.cross_sections
    }

    pub fn table(&self, table: PreparedTable) -> Option<&DataFrame> {
        self.tables.get(&table)
    }

    pub fn tables(&self) -> &BTreeMap<PreparedTable, DataFrame> {
        &self.tables
    }

    /// One `<table>.parquet` per prepared table plus `metadata.parquet`.
    pub fn write_parquet(&self, dir: impl AsRef<Path>) -> Result<()> {
        self.write_all(dir.as_ref(), "parquet", |df, path| io::write_parquet(df, path))
    }

    /// One `<table>.csv` per prepared table plus `metadata.csv`.
    pub fn write_csv(&self, dir: impl AsRef<Path>) -> Result<()> {
        self.write_all(dir.as_ref(), "csv", |df, path| io::write_csv(df, path))
    }

    fn write_all(
        &self,
        dir: &Path,
        extension: &str,
        write: fn(&DataFrame, &Path) -> Result<()>,
    ) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        for (table, df) in &self.tables {
            write(df, &dir.join(format!("{}.{}", table.name(), extension)))?;
        }
        write(
            &self.metadata.to_frame()?,
            &dir.join(format!("metadata.{extension}")),
        )?;
        info!("Wrote {} tables to {}.", self.tables.len() + 1, dir.display());
        Ok(())
    }
}
