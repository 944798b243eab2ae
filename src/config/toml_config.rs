use crate::adapters::http::BackendSettings;
use crate::adapters::regions::is_catalog_locator;
use crate::core::aggregator::DEFAULT_SCALE_FACTOR;
use crate::core::orchestrator::{RunOptions, DEFAULT_ZONAL_SCALE_M};
use crate::domain::model::ZonalStatistic;
use crate::utils::error::{Result, SeriesError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 原始程式對點位預設擴展 10 公里
pub const DEFAULT_EXPAND_DISTANCE_M: f64 = 10_000.0;
const DEFAULT_TIMEOUT_SECONDS: u64 = 300;
const REGION_EXTENSIONS: [&str; 3] = ["csv", "geojson", "json"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub run: RunSection,
    pub regions: RegionsSection,
    pub raster: RasterSection,
    pub backend: BackendSection,
    #[serde(default)]
    pub statistics: StatisticsSection,
    pub output: OutputSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    pub start: String,
    pub end: String,
    pub emit: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionsSection {
    pub path: String,
    pub id_property: Option<String>,
    pub expand: Option<bool>,
    pub expand_distance_m: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterSection {
    pub source: String,
    pub band: String,
    pub scale_factor: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSection {
    pub endpoint: String,
    pub token: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatisticsSection {
    pub statistic: Option<ZonalStatistic>,
    pub scale_m: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    pub path: String,
    pub combined: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(SeriesError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| SeriesError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${ZONAL_SERIES_TOKEN})，未設定者保留原字串
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| SeriesError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn emit(&self) -> bool {
        self.run.emit.unwrap_or(true)
    }

    pub fn id_property(&self) -> &str {
        self.regions.id_property.as_deref().unwrap_or("name")
    }

    /// 若啟用擴展，回傳緩衝距離（公尺）
    pub fn expand_distance(&self) -> Option<f64> {
        if self.regions.expand.unwrap_or(false) {
            Some(self.regions.expand_distance_m.unwrap_or(DEFAULT_EXPAND_DISTANCE_M))
        } else {
            None
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            scale_factor: self.raster.scale_factor.unwrap_or(DEFAULT_SCALE_FACTOR),
            statistic: self.statistics.statistic.unwrap_or_default(),
            zonal_scale_m: self.statistics.scale_m.unwrap_or(DEFAULT_ZONAL_SCALE_M),
            combined_output: self.output.combined.clone(),
        }
    }

    pub fn backend_settings(&self) -> BackendSettings {
        BackendSettings {
            endpoint: self.backend.endpoint.clone(),
            token: self.backend.token.clone().filter(|t| !t.is_empty()),
            timeout: Duration::from_secs(self.backend.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)),
        }
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("run.start", &self.run.start)?;
        validation::validate_non_empty_string("run.end", &self.run.end)?;
        validation::validate_path("regions.path", &self.regions.path)?;
        if !is_catalog_locator(&self.regions.path) {
            validation::validate_file_extension("regions.path", &self.regions.path, &REGION_EXTENSIONS)?;
        }
        validation::validate_non_empty_string("regions.id_property", self.id_property())?;
        if let Some(distance) = self.expand_distance() {
            validation::validate_positive("regions.expand_distance_m", distance)?;
        }
        validation::validate_non_empty_string("raster.source", &self.raster.source)?;
        validation::validate_non_empty_string("raster.band", &self.raster.band)?;
        if let Some(factor) = self.raster.scale_factor {
            validation::validate_positive("raster.scale_factor", factor)?;
        }
        validation::validate_url("backend.endpoint", &self.backend.endpoint)?;
        if let Some(0) = self.backend.timeout_seconds {
            return Err(SeriesError::InvalidConfigValueError {
                field: "backend.timeout_seconds".to_string(),
                value: "0".to_string(),
                reason: "Timeout must be at least 1 second".to_string(),
            });
        }
        if let Some(scale) = self.statistics.scale_m {
            validation::validate_positive("statistics.scale_m", scale)?;
        }
        validation::validate_path("output.path", &self.output.path)?;
        if let Some(combined) = &self.output.combined {
            validation::validate_path("output.combined", combined)?;
        }
        Ok(())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
