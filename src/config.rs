use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Report gain matrix construction progress every this many connections.
pub(crate) const PRINT_FREQUENCY_DQ :usize = 10000;

/// Report heap construction progress every this many nodes.
pub(crate) const PRINT_FREQUENCY_DQH :usize = 1000;

/// Above this many community slots, progress shows the size histogram.
pub(crate) const HISTOGRAM_THRESHOLD :usize = 10;

pub(crate) const DEFAULT_RESOLUTION :f64 = 1.0;

pub(crate) const DEFAULT_CUTOFF :usize = 1;

/// Returned by a merge step once no candidate is left.
pub(crate) const DEFAULT_SENTINEL :f64 = -2605.0;

pub(crate) const READ_BUFFER_SIZE :usize = 8 * 1024 * 1024;

pub const DEFAULT_DESCRIPTOR :&str = "global_params.json";

/// Runtime options of one partition run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CnmOptions {
    /// Multiplier on the null-model term, larger values favour smaller communities.
    pub resolution: f64,
    /// Stop as soon as this many communities are left.
    pub cutoff: usize,
    /// Log setup progress and the partition after every merge.
    pub verbose: bool,
    /// Terminal value of a merge step with no candidates left.
    pub sentinel: f64,
}

impl Default for CnmOptions {
    fn default() -> Self {
        CnmOptions {
            resolution: DEFAULT_RESOLUTION,
            cutoff: DEFAULT_CUTOFF,
            verbose: false,
            sentinel: DEFAULT_SENTINEL,
        }
    }
}

impl CnmOptions {
    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_cutoff(mut self, cutoff: usize) -> Self {
        self.cutoff = cutoff;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Load options from a YAML file, missing fields take their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open config {}", path.display()))?;
        let options: CnmOptions = serde_yaml::from_reader(file)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(options)
    }
}

#[cfg(test)]
mod test_config {
    use std::io::Write;

    use crate::config::CnmOptions;

    #[test]
    fn test_defaults() {
        let options = CnmOptions::default();
        assert_eq!(options.resolution, 1.0);
        assert_eq!(options.cutoff, 1);
        assert!(!options.verbose);
        assert_eq!(options.sentinel, -2605.0);
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "resolution: 0.5").unwrap();
        writeln!(file, "cutoff: 4").unwrap();
        file.flush().unwrap();

        let options = CnmOptions::from_yaml_file(file.path()).unwrap();
        assert_eq!(options, CnmOptions::default().with_resolution(0.5).with_cutoff(4));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "resolutoin: 0.5").unwrap();
        file.flush().unwrap();
        assert!(CnmOptions::from_yaml_file(file.path()).is_err());
    }
}
