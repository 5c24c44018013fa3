use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::DriverResult;
use crate::raster::ResampleAlg;
use crate::tile::RasterFormat;

/// Interpolation policy for tile sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    Nearest,
    Average,
    #[default]
    Bilinear,
    Cubic,
    #[serde(alias = "cubic_spline")]
    CubicSpline,
}

impl Interpolation {
    /// Resampling used for image band reads.
    ///
    /// Average maps to bilinear: area averaging shows artifacts on imagery
    /// at high levels.
    pub fn image_resample_alg(self) -> ResampleAlg {
        match self {
            Interpolation::Nearest => ResampleAlg::NearestNeighbour,
            Interpolation::Average | Interpolation::Bilinear => ResampleAlg::Bilinear,
            Interpolation::Cubic => ResampleAlg::Cubic,
            Interpolation::CubicSpline => ResampleAlg::CubicSpline,
        }
    }
}

/// Per-layer options for opening and sampling a dataset.
#[derive(Clone, Deserialize)]
pub struct SourceOptions {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default)]
    pub sub_dataset: Option<usize>,
    #[serde(default)]
    pub interpolation: Interpolation,
    #[serde(default)]
    pub no_data_value: Option<f32>,
    #[serde(default)]
    pub min_valid_value: Option<f32>,
    #[serde(default)]
    pub max_valid_value: Option<f32>,
    #[serde(default)]
    pub max_data_level: Option<u32>,
    #[serde(default = "default_max_warp_error")]
    pub max_warp_error: f64,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            uri: None,
            connection: None,
            sub_dataset: None,
            interpolation: Interpolation::default(),
            no_data_value: None,
            min_valid_value: None,
            max_valid_value: None,
            max_data_level: None,
            max_warp_error: default_max_warp_error(),
        }
    }
}

// Connection strings routinely embed credentials
impl fmt::Debug for SourceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceOptions")
            .field("uri", &self.uri)
            .field("connection", &self.connection.as_ref().map(|_| "[REDACTED]"))
            .field("sub_dataset", &self.sub_dataset)
            .field("interpolation", &self.interpolation)
            .field("no_data_value", &self.no_data_value)
            .field("min_valid_value", &self.min_valid_value)
            .field("max_valid_value", &self.max_valid_value)
            .field("max_data_level", &self.max_data_level)
            .field("max_warp_error", &self.max_warp_error)
            .finish()
    }
}

fn default_max_warp_error() -> f64 {
    5.0
}

impl SourceOptions {
    pub fn with_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Default::default()
        }
    }

    /// Parse layer options from their JSON form.
    pub fn from_json(json: &str) -> DriverResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The identifier to open, preferring `uri` over `connection`.
    ///
    /// Empty strings count as absent.
    pub fn source_name(&self) -> Option<&str> {
        self.uri
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.connection.as_deref().filter(|s| !s.is_empty()))
    }

    /// Whether the source names a file (as opposed to a connection string).
    pub fn is_file(&self) -> bool {
        self.uri.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Settings for the `tilesampler` binary.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceOptions,
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_tile_size() -> u32 {
    256
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("tiles")
}

fn default_format() -> String {
    "png".to_string()
}

impl Config {
    pub fn load() -> Result<Arc<Self>, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("tilesampler").required(false))
            .add_source(
                config::Environment::with_prefix("TILESAMPLER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Config = config.try_deserialize()?;
        Ok(Arc::new(settings))
    }

    pub fn raster_format(&self) -> RasterFormat {
        RasterFormat::from_extension(&self.format).unwrap_or(RasterFormat::Png)
    }
}
