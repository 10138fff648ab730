//! Versioned on-disk copy of the combined pipeline output.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregationMethod;
use crate::error::{Error, Result};
use crate::io::{read_parquet, write_atomic, write_csv, write_parquet};
use crate::pipeline::PipelinePayload;
use crate::taxonomy::Taxonomy;

/// Version tag carried by every stored file name
pub const CACHE_VERSION: &str = "v1";

/// File formats a payload can be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Parquet,
    Csv,
}

impl OutputFormat {
    const fn extension(self) -> &'static str {
        match self {
            Self::Parquet => "parquet",
            Self::Csv => "csv",
        }
    }
}

/// Metadata stored next to the tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub employment_years: BTreeMap<Taxonomy, i64>,
    pub weighted_rows: usize,
    pub simple_rows: usize,
}

impl Manifest {
    /// Describe `payload` as of now
    #[must_use]
    pub fn for_payload(payload: &PipelinePayload) -> Self {
        Self {
            version: CACHE_VERSION.to_string(),
            created_at: Utc::now(),
            employment_years: payload.employment_years.clone(),
            weighted_rows: payload.weighted.num_rows(),
            simple_rows: payload.simple.num_rows(),
        }
    }
}

/// Directory of `daioe_<method>_<version>` tables plus a manifest
#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
    version: String,
}

impl OutputStore {
    /// Store in `dir` with the current cache version
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            version: CACHE_VERSION.to_string(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the table written for `method`
    #[must_use]
    pub fn table_path(&self, method: AggregationMethod, format: OutputFormat) -> PathBuf {
        self.dir.join(format!(
            "daioe_{method}_{}.{}",
            self.version,
            format.extension()
        ))
    }

    /// Manifest describing the tables written in `format`.
    ///
    /// Parquet keeps the plain `manifest_<version>.json` name read by
    /// [`OutputStore::load`]; other formats get their own file so an export
    /// never relabels stored Parquet tables.
    #[must_use]
    pub fn manifest_path(&self, format: OutputFormat) -> PathBuf {
        match format {
            OutputFormat::Parquet => self.dir.join(format!("manifest_{}.json", self.version)),
            OutputFormat::Csv => self.dir.join(format!(
                "manifest_{}_{}.json",
                format.extension(),
                self.version
            )),
        }
    }

    /// Write both tables as Parquet and then the manifest
    pub fn save(&self, payload: &PipelinePayload) -> Result<()> {
        self.save_as(payload, OutputFormat::Parquet, ',')
    }

    /// Write both tables in `format`, then the manifest.
    ///
    /// `delimiter` only applies to CSV.
    pub fn save_as(
        &self,
        payload: &PipelinePayload,
        format: OutputFormat,
        delimiter: char,
    ) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        for method in AggregationMethod::ALL {
            let path = self.table_path(method, format);
            match format {
                OutputFormat::Parquet => write_parquet(&path, payload.table(method))?,
                OutputFormat::Csv => write_csv(&path, payload.table(method), delimiter)?,
            }
        }

        let manifest = Manifest::for_payload(payload);
        let json = serde_json::to_vec_pretty(&manifest)?;
        write_atomic(&self.manifest_path(format), |mut file| {
            file.write_all(&json)?;
            Ok(())
        })
    }

    /// Read the manifest of the tables stored in `format`, if present
    pub fn manifest(&self, format: OutputFormat) -> Result<Option<Manifest>> {
        let path = self.manifest_path(format);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Read a stored Parquet payload; `None` when any file is absent.
    ///
    /// Tables whose row counts disagree with the manifest are an integrity
    /// error.
    pub fn load(&self) -> Result<Option<PipelinePayload>> {
        let weighted_path = self.table_path(AggregationMethod::Weighted, OutputFormat::Parquet);
        let simple_path = self.table_path(AggregationMethod::Simple, OutputFormat::Parquet);
        if !weighted_path.exists() || !simple_path.exists() {
            return Ok(None);
        }
        let Some(manifest) = self.manifest(OutputFormat::Parquet)? else {
            return Ok(None);
        };

        let weighted = read_parquet(&weighted_path)?;
        let simple = read_parquet(&simple_path)?;
        if weighted.num_rows() != manifest.weighted_rows
            || simple.num_rows() != manifest.simple_rows
        {
            return Err(Error::Integrity(format!(
                "stored tables in {} have {} weighted and {} simple rows, manifest expects {} and {}",
                self.dir.display(),
                weighted.num_rows(),
                simple.num_rows(),
                manifest.weighted_rows,
                manifest.simple_rows
            )));
        }

        Ok(Some(PipelinePayload {
            weighted,
            simple,
            employment_years: manifest.employment_years,
        }))
    }
}
