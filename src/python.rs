use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyModule;
use pyo3_polars::PyDataFrame;

use crate::atom_data::{AtomData, AtomDataInputs, PreparedTable};
use crate::compare::{AtomDataCompare, DEFAULT_RTOL};
use crate::config::PipelineConfig;
use crate::gfall::GfallIngester;
use crate::io;
use crate::ionization::IonizationEnergies;
use crate::schema;
use crate::source::SourceTables;
use crate::species::{DataSource, Species};

fn parse_table(name: &str) -> PyResult<PreparedTable> {
    PreparedTable::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = PreparedTable::ALL.iter().map(|t| t.name()).collect();
        PyValueError::new_err(format!(
            "unknown table `{name}`, expected one of: {}",
            known.join(", ")
        ))
    })
}

fn parse_source(name: &str) -> PyResult<DataSource> {
    DataSource::from_name(name)
        .ok_or_else(|| PyValueError::new_err(format!("unknown data source `{name}`")))
}

fn load_config(path: Option<&str>) -> PyResult<PipelineConfig> {
    Ok(match path {
        Some(path) => PipelineConfig::from_path(path)?,
        None => PipelineConfig::default(),
    })
}

#[pyclass(name = "AtomData")]
pub struct PyAtomData {
    inputs: AtomDataInputs,
    config: PipelineConfig,
    data: Option<AtomData>,
}

#[pymethods]
impl PyAtomData {
    /// Start a run from NIST ionization energies and ground levels.
    /// `config` is an optional path to a TOML run configuration.
    #[new]
    #[pyo3(signature = (ionization_energies, ground_levels, config=None))]
    fn new(
        ionization_energies: PyDataFrame,
        ground_levels: PyDataFrame,
        config: Option<&str>,
    ) -> PyResult<Self> {
        let ionization = IonizationEnergies::from_frame(&ionization_energies.0, &ground_levels.0)?;
        Ok(Self {
            inputs: AtomDataInputs::new(ionization),
            config: load_config(config)?,
            data: None,
        })
    }

    // ── Inputs ──────────────────────────────────────────────────────────────

    #[pyo3(signature = (source, levels, lines, collisions=None, cross_sections=None, priority=None, version=None))]
    #[allow(clippy::too_many_arguments)]
    fn add_source(
        &mut self,
        source: &str,
        levels: PyDataFrame,
        lines: PyDataFrame,
        collisions: Option<PyDataFrame>,
        cross_sections: Option<PyDataFrame>,
        priority: Option<i64>,
        version: Option<String>,
    ) -> PyResult<()> {
        let mut tables = SourceTables::new(parse_source(source)?, levels.0, lines.0);
        if let Some(priority) = priority {
            tables = tables.with_priority(priority);
        }
        if let Some(collisions) = collisions {
            tables = tables.with_collisions(collisions.0);
        }
        if let Some(cross_sections) = cross_sections {
            tables = tables.with_cross_sections(cross_sections.0);
        }
        if let Some(version) = version {
            tables = tables.with_version(version);
        }
        self.push_source(tables);
        Ok(())
    }

    /// Add Kurucz GFALL from its parsed rows. `ions` restricts the species
    /// as `(atomic_number, ion_number)` pairs.
    #[pyo3(signature = (gfall, ions=None, priority=None, version=None))]
    fn add_gfall(
        &mut self,
        gfall: PyDataFrame,
        ions: Option<Vec<(i64, i64)>>,
        priority: Option<i64>,
        version: Option<String>,
    ) -> PyResult<()> {
        let mut ingester = GfallIngester::default();
        if let Some(ions) = ions {
            ingester = ingester.with_ions(ions.into_iter().map(|(z, ion)| Species::new(z, ion)));
        }
        if let Some(priority) = priority {
            ingester = ingester.with_priority(priority);
        }
        let mut tables = ingester.ingest(&gfall.0)?;
        if let Some(version) = version {
            tables = tables.with_version(version);
        }
        self.push_source(tables);
        Ok(())
    }

    /// Ionization energies taking precedence over the NIST ones.
    fn override_ionization_energies(
        &mut self,
        ionization_energies: PyDataFrame,
        ground_levels: PyDataFrame,
    ) -> PyResult<()> {
        let other = IonizationEnergies::from_frame(&ionization_energies.0, &ground_levels.0)?;
        self.inputs.ionization_override = Some(other);
        self.data = None;
        Ok(())
    }

    /// Swap the run configuration and rebuild every table.
    #[pyo3(signature = (config=None))]
    fn recompute(&mut self, config: Option<&str>) -> PyResult<()> {
        self.config = load_config(config)?;
        self.data = None;
        self.built()?;
        Ok(())
    }

    // ── Prepared tables ─────────────────────────────────────────────────────

    fn table(&mut self, name: &str) -> PyResult<PyDataFrame> {
        self.prepared(parse_table(name)?)
    }

    fn ionization_energies_prepared(&mut self) -> PyResult<PyDataFrame> {
        self.prepared(PreparedTable::IonizationEnergies)
    }

    fn levels_prepared(&mut self) -> PyResult<PyDataFrame> {
        self.prepared(PreparedTable::Levels)
    }

    fn lines_prepared(&mut self) -> PyResult<PyDataFrame> {
        self.prepared(PreparedTable::Lines)
    }

    fn macro_atom_prepared(&mut self) -> PyResult<PyDataFrame> {
        self.prepared(PreparedTable::MacroAtom)
    }

    fn macro_atom_references_prepared(&mut self) -> PyResult<PyDataFrame> {
        self.prepared(PreparedTable::MacroAtomReferences)
    }

    fn collisions_prepared(&mut self) -> PyResult<PyDataFrame> {
        self.prepared(PreparedTable::Collisions)
    }

    fn cross_sections_prepared(&mut self) -> PyResult<PyDataFrame> {
        self.prepared(PreparedTable::CrossSections)
    }

    fn metadata(&mut self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.built()?.metadata().to_frame()?))
    }

    // ── Export ──────────────────────────────────────────────────────────────

    fn write_parquet(&mut self, dir: &str) -> PyResult<()> {
        self.built()?.write_parquet(dir)?;
        Ok(())
    }

    fn write_csv(&mut self, dir: &str) -> PyResult<()> {
        self.built()?.write_csv(dir)?;
        Ok(())
    }

    /// Read a `.csv` or `.parquet` reader output.
    #[staticmethod]
    fn load_table(path: &str) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(io::read_table(path)?))
    }

    fn compare(&mut self, mut other: PyRefMut<'_, PyAtomData>) -> PyResult<PyAtomDataCompare> {
        let left = self.built()?.tables().clone();
        let right = other.built()?.tables().clone();
        Ok(PyAtomDataCompare {
            inner: AtomDataCompare::new(left, right),
        })
    }
}

impl PyAtomData {
    fn push_source(&mut self, tables: SourceTables) {
        self.inputs.sources.push(tables);
        self.data = None;
    }

    fn built(&mut self) -> PyResult<&AtomData> {
        if self.data.is_none() {
            self.data = Some(AtomData::new(self.inputs.clone(), self.config.clone())?);
        }
        self.data
            .as_ref()
            .ok_or_else(|| PyValueError::new_err("atomic data could not be built"))
    }

    fn prepared(&mut self, table: PreparedTable) -> PyResult<PyDataFrame> {
        let df = self
            .built()?
            .table(table)
            .cloned()
            .ok_or_else(|| PyValueError::new_err(format!("{table} was not produced")))?;
        Ok(PyDataFrame(df))
    }
}

#[pyclass(name = "AtomDataCompare")]
pub struct PyAtomDataCompare {
    inner: AtomDataCompare,
}

#[pymethods]
impl PyAtomDataCompare {
    fn comparison_table(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.inner.comparison_table()?))
    }

    #[pyo3(signature = (table, atomic_number, ion_number, rtol=DEFAULT_RTOL))]
    fn ion_diff(
        &self,
        table: &str,
        atomic_number: i64,
        ion_number: i64,
        rtol: f64,
    ) -> PyResult<PyDataFrame> {
        let diff = self.inner.ion_diff(
            parse_table(table)?,
            Species::new(atomic_number, ion_number),
            rtol,
        )?;
        Ok(PyDataFrame(diff))
    }

    #[pyo3(signature = (table, rtol=DEFAULT_RTOL))]
    fn key_diff(&self, table: &str, rtol: f64) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.inner.key_diff(parse_table(table)?, rtol)?))
    }
}

/// Export schema constants as Python submodules
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let species = PyModule::new(m.py(), "species")?;
    species.add("ATOMIC_NUMBER", schema::species::ATOMIC_NUMBER)?;
    species.add("ION_NUMBER", schema::species::ION_NUMBER)?;
    m.add_submodule(&species)?;

    let levels = PyModule::new(m.py(), "levels")?;
    levels.add("LEVEL_ID", schema::levels::LEVEL_ID)?;
    levels.add("LEVEL_INDEX", schema::levels::LEVEL_INDEX)?;
    levels.add("LEVEL_NUMBER", schema::levels::LEVEL_NUMBER)?;
    levels.add("ENERGY", schema::levels::ENERGY)?;
    levels.add("G", schema::levels::G)?;
    levels.add("METASTABLE", schema::levels::METASTABLE)?;
    levels.add("PRIORITY", schema::levels::PRIORITY)?;
    levels.add("DS_ID", schema::levels::DS_ID)?;
    m.add_submodule(&levels)?;

    let lines = PyModule::new(m.py(), "lines")?;
    lines.add("LINE_ID", schema::lines::LINE_ID)?;
    lines.add("LEVEL_NUMBER_LOWER", schema::lines::LEVEL_NUMBER_LOWER)?;
    lines.add("LEVEL_NUMBER_UPPER", schema::lines::LEVEL_NUMBER_UPPER)?;
    lines.add("WAVELENGTH", schema::lines::WAVELENGTH)?;
    lines.add("GF", schema::lines::GF)?;
    lines.add("LOGGF", schema::lines::LOGGF)?;
    lines.add("NU", schema::lines::NU)?;
    lines.add("F_LU", schema::lines::F_LU)?;
    lines.add("F_UL", schema::lines::F_UL)?;
    lines.add("A_UL", schema::lines::A_UL)?;
    lines.add("B_LU", schema::lines::B_LU)?;
    lines.add("B_UL", schema::lines::B_UL)?;
    m.add_submodule(&lines)?;

    let macro_atom = PyModule::new(m.py(), "macro_atom")?;
    macro_atom.add("SOURCE_LEVEL_NUMBER", schema::macro_atom::SOURCE_LEVEL_NUMBER)?;
    macro_atom.add(
        "DESTINATION_LEVEL_NUMBER",
        schema::macro_atom::DESTINATION_LEVEL_NUMBER,
    )?;
    macro_atom.add("TRANSITION_LINE_ID", schema::macro_atom::TRANSITION_LINE_ID)?;
    macro_atom.add("TRANSITION_TYPE", schema::macro_atom::TRANSITION_TYPE)?;
    macro_atom.add(
        "TRANSITION_PROBABILITY",
        schema::macro_atom::TRANSITION_PROBABILITY,
    )?;
    macro_atom.add("COUNT_DOWN", schema::references::COUNT_DOWN)?;
    macro_atom.add("COUNT_UP", schema::references::COUNT_UP)?;
    macro_atom.add("COUNT_TOTAL", schema::references::COUNT_TOTAL)?;
    m.add_submodule(&macro_atom)?;

    let transition_type = PyModule::new(m.py(), "transition_type")?;
    transition_type.add("EMISSION_DOWN", schema::transition_type::EMISSION_DOWN)?;
    transition_type.add("INTERNAL_DOWN", schema::transition_type::INTERNAL_DOWN)?;
    transition_type.add("INTERNAL_UP", schema::transition_type::INTERNAL_UP)?;
    m.add_submodule(&transition_type)?;

    let collisions = PyModule::new(m.py(), "collisions")?;
    collisions.add("G_RATIO", schema::collisions::G_RATIO)?;
    collisions.add("DELTA_E", schema::collisions::DELTA_E)?;
    m.add_submodule(&collisions)?;

    let cross_sections = PyModule::new(m.py(), "cross_sections")?;
    cross_sections.add("NU", schema::cross_sections::NU)?;
    cross_sections.add("X_SECT", schema::cross_sections::X_SECT)?;
    m.add_submodule(&cross_sections)?;

    Ok(())
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyAtomData>()?;
    m.add_class::<PyAtomDataCompare>()?;
    add_schema_exports(m)?;
    Ok(())
}
