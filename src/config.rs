use crate::error::{PowerError, Result};
use crate::request::DEFAULT_PARAMETERS;
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_OUTPUT_DIRECTORY: &str = "nasa_power_data";
pub const DEFAULT_BASE_URL: &str = "https://power.larc.nasa.gov/api/temporal/daily/point";

/// A configured point of interest. `point_id` is the provider's grid point
/// identifier and is carried through to every output row.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub code: String,
    pub point_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub parameters: Vec<String>,
    pub community: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            parameters: DEFAULT_PARAMETERS.iter().map(|p| p.to_string()).collect(),
            community: "AG".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub sites: Vec<Site>,
    pub years: Vec<i32>,
    pub output_directory: PathBuf,
    pub api: ApiSettings,
}

// Site entries live at the top level of the file, keyed by site code, next to
// the `sites`/`years` lists. Everything not named here lands in `entries`.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    sites: Vec<String>,
    #[serde(default)]
    years: Vec<i32>,
    output_directory: Option<PathBuf>,
    #[serde(default)]
    api_settings: ApiSettings,
    #[serde(flatten)]
    entries: BTreeMap<String, Value>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PowerError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_yaml_str(&text)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(text)?;

        if raw.sites.is_empty() {
            return Err(PowerError::config("`sites` must list at least one site code"));
        }
        if raw.years.is_empty() {
            return Err(PowerError::config("`years` must list at least one year"));
        }
        if raw.api_settings.parameters.is_empty() {
            return Err(PowerError::config("`api_settings.parameters` is empty"));
        }

        let mut seen = HashSet::new();
        let mut sites = Vec::with_capacity(raw.sites.len());
        for code in &raw.sites {
            if !seen.insert(code.as_str()) {
                return Err(PowerError::config(format!("site {code} is listed twice")));
            }
            sites.push(parse_site(code, raw.entries.get(code))?);
        }

        Ok(Config {
            sites,
            years: raw.years,
            output_directory: raw
                .output_directory
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIRECTORY)),
            api: raw.api_settings,
        })
    }

    /// First and last configured year, used in output file names.
    pub fn year_span(&self) -> (i32, i32) {
        let start = self.years.iter().copied().min().unwrap_or_default();
        let end = self.years.iter().copied().max().unwrap_or_default();
        (start, end)
    }

    pub fn log_summary(&self) {
        let (start, end) = self.year_span();
        let codes = self
            .sites
            .iter()
            .map(|s| s.code.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        info!(sites = %codes, "Configuration summary");
        info!(start, end, count = self.years.len(), "Years");
        info!(count = self.api.parameters.len(), community = %self.api.community, "Weather parameters");
        info!(path = %self.output_directory.display(), "Output directory");
        for site in &self.sites {
            info!(
                site = %site.code,
                point = %site.point_id,
                lat = site.latitude,
                long = site.longitude,
                "Site"
            );
        }
    }
}

fn parse_site(code: &str, entry: Option<&Value>) -> Result<Site> {
    let entry = entry.ok_or_else(|| {
        PowerError::config(format!("site {code} is listed in `sites` but has no entry"))
    })?;

    let point_id = match entry.get("POINTS") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(PowerError::config(format!(
                "site {code}: missing POINTS identifier"
            )))
        }
    };

    Ok(Site {
        code: code.to_string(),
        point_id,
        latitude: coordinate(code, entry, "lat")?,
        longitude: coordinate(code, entry, "long")?,
    })
}

fn coordinate(code: &str, entry: &Value, key: &str) -> Result<f64> {
    match entry.get(key) {
        None | Some(Value::Null) => Err(PowerError::config(format!("site {code}: missing `{key}`"))),
        Some(v) => v.as_f64().ok_or_else(|| {
            PowerError::config(format!("site {code}: `{key}` is not numeric"))
        }),
    }
}
