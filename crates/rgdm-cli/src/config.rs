//! TOML run files.
//!
//! ```toml
//! [zones]
//! path = "zones.csv"
//! zone_id = "zone"
//!
//! [[zones.sectors]]
//! name = "commute"
//! origin_total_col = "workers"
//! dest_total_col = "jobs"
//!
//! [friction]
//! path = "skim.csv"
//! friction_origin_col = "from"
//! friction_dest_col = "to"
//! travel_time_col = "minutes"
//!
//! [balancing]
//! tolerance = 1e-4
//!
//! [deterrence]
//! type = "Exponential"
//! beta = 0.08
//! ```
//!
//! Relative paths are resolved against the directory of the run file.

use anyhow::{Context, Result};
use rgdm_calibrate::CalibrationParameters;
use rgdm_core::io::{FrictionColumns, ZoneColumns};
use rgdm_core::{BalancingParameters, DeterrenceFunction};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct ZoneSource {
    pub path: PathBuf,
    #[serde(flatten)]
    pub columns: ZoneColumns,
}

#[derive(Debug, Deserialize)]
pub struct FrictionSource {
    pub path: PathBuf,
    #[serde(flatten)]
    pub columns: FrictionColumns,
}

#[derive(Debug, Deserialize)]
pub struct RunConfig {
    /// Zone totals; not needed for calibration, which derives them from observed flows
    pub zones: Option<ZoneSource>,
    pub friction: FrictionSource,
    #[serde(default)]
    pub balancing: BalancingParameters,
    #[serde(default)]
    pub calibration: CalibrationParameters,
    pub deterrence: Option<Box<dyn DeterrenceFunction>>,
}

impl RunConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read run file {}", path.display()))?;
        let mut config: RunConfig = toml::from_str(&text)
            .with_context(|| format!("Failed to parse run file {}", path.display()))?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        if let Some(zones) = self.zones.as_mut() {
            resolve(&mut zones.path);
        }
        resolve(&mut self.friction.path);
    }
}

/// `<stem>_<sector>.<ext>` next to `output`.
pub fn sector_output(output: &Path, sector: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "flows".to_string());
    let name = match output.extension() {
        Some(ext) => format!("{}_{}.{}", stem, sector, ext.to_string_lossy()),
        None => format!("{}_{}", stem, sector),
    };
    output.with_file_name(name)
}
