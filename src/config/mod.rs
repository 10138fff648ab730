//! Configuration for the roll-up pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::taxonomy::Taxonomy;

/// Default prefix identifying metric columns in the leaf table
pub const DEFAULT_METRIC_PREFIX: &str = "daioe_";

/// Default prefix for percentile-rank output columns
pub const DEFAULT_RANK_PREFIX: &str = "pct_rank_";

/// Column naming for metrics and their ranks
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MetricNaming {
    /// Prefix shared by every metric column
    pub metric_prefix: String,
    /// Prefix put in front of the stripped metric name for rank columns
    pub rank_prefix: String,
}

impl Default for MetricNaming {
    fn default() -> Self {
        Self {
            metric_prefix: DEFAULT_METRIC_PREFIX.to_string(),
            rank_prefix: DEFAULT_RANK_PREFIX.to_string(),
        }
    }
}

impl MetricNaming {
    /// Whether `column` names a metric
    #[must_use]
    pub fn is_metric(&self, column: &str) -> bool {
        column.starts_with(&self.metric_prefix)
    }

    /// Rank column for a metric, e.g. `daioe_genai` -> `pct_rank_genai`
    #[must_use]
    pub fn rank_column(&self, metric: &str) -> String {
        let suffix = metric.strip_prefix(&self.metric_prefix).unwrap_or(metric);
        format!("{}{suffix}", self.rank_prefix)
    }
}

/// Configuration for a pipeline run
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Taxonomies to process, in output order
    pub taxonomies: Vec<Taxonomy>,
    /// Field delimiter of CSV inputs
    pub delimiter: char,
    /// Metric and rank column naming
    pub naming: MetricNaming,
    /// Directory holding `daioe_<taxonomy>.csv` and `employment_<taxonomy>.csv`
    pub data_dir: PathBuf,
    /// Explicit leaf table paths, overriding `data_dir`
    pub leaf_paths: BTreeMap<Taxonomy, PathBuf>,
    /// Explicit employment table paths, overriding `data_dir`
    pub employment_paths: BTreeMap<Taxonomy, PathBuf>,
    /// Where aggregated tables are written, if anywhere
    pub output_dir: Option<PathBuf>,
    /// Process taxonomies concurrently
    pub parallel: bool,
    /// Worker threads used when `parallel` is set
    pub threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            taxonomies: Taxonomy::ALL.to_vec(),
            delimiter: ',',
            naming: MetricNaming::default(),
            data_dir: PathBuf::from("data"),
            leaf_paths: BTreeMap::new(),
            employment_paths: BTreeMap::new(),
            output_dir: None,
            parallel: true,
            threads: num_cpus::get(),
        }
    }
}

impl PipelineConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load a JSON config file; absent keys keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DAIOE_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("DAIOE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("DATA_CACHE_DIR") {
            self.output_dir = Some(PathBuf::from(dir));
        }
        if let Ok(sep) = std::env::var("DAIOE_CSV_SEP") {
            self.delimiter = parse_delimiter(&sep)?;
        }
        for taxonomy in Taxonomy::ALL {
            let upper = taxonomy.name().to_ascii_uppercase();
            if let Ok(path) = std::env::var(format!("DAIOE_{upper}_PATH")) {
                self.leaf_paths.insert(taxonomy, PathBuf::from(path));
            }
            if let Ok(path) = std::env::var(format!("DAIOE_EMPLOYMENT_{upper}_PATH")) {
                self.employment_paths.insert(taxonomy, PathBuf::from(path));
            }
        }
        self.validate()
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.taxonomies.is_empty() {
            return Err(Error::Config("no taxonomies selected".to_string()));
        }
        if !self.delimiter.is_ascii() {
            return Err(Error::Config(format!(
                "CSV delimiter must be a single ASCII character, got '{}'",
                self.delimiter
            )));
        }
        if self.naming.metric_prefix.is_empty() {
            return Err(Error::Config("metric prefix must not be empty".to_string()));
        }
        if self.naming.metric_prefix == self.naming.rank_prefix {
            return Err(Error::Config(
                "metric and rank prefixes must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Leaf metric CSV for a taxonomy
    #[must_use]
    pub fn leaf_path(&self, taxonomy: Taxonomy) -> PathBuf {
        self.leaf_paths
            .get(&taxonomy)
            .cloned()
            .unwrap_or_else(|| self.data_dir.join(format!("daioe_{taxonomy}.csv")))
    }

    /// Employment CSV for a taxonomy
    #[must_use]
    pub fn employment_path(&self, taxonomy: Taxonomy) -> PathBuf {
        self.employment_paths
            .get(&taxonomy)
            .cloned()
            .unwrap_or_else(|| self.data_dir.join(format!("employment_{taxonomy}.csv")))
    }
}

/// Parse a one-character delimiter; `\t` and `tab` name the tab character
pub fn parse_delimiter(value: &str) -> Result<char> {
    let value = match value {
        "\\t" | "tab" => "\t",
        other => other,
    };
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c),
        _ => Err(Error::Config(format!(
            "CSV delimiter must be a single ASCII character, got '{value}'"
        ))),
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline Configuration:")?;
        let names: Vec<&str> = self.taxonomies.iter().map(|t| t.name()).collect();
        writeln!(f, "  Taxonomies: {}", names.join(", "))?;
        writeln!(f, "  Delimiter: {:?}", self.delimiter)?;
        writeln!(f, "  Metric Prefix: {}", self.naming.metric_prefix)?;
        writeln!(f, "  Rank Prefix: {}", self.naming.rank_prefix)?;
        writeln!(f, "  Data Directory: {}", self.data_dir.display())?;
        if let Some(dir) = &self.output_dir {
            writeln!(f, "  Output Directory: {}", dir.display())?;
        }
        if self.parallel {
            writeln!(f, "  Parallel: yes ({} threads)", self.threads)?;
        } else {
            writeln!(f, "  Parallel: no")?;
        }
        Ok(())
    }
}
