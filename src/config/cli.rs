use crate::config::toml_config::{
    BackendSection, OutputSection, RasterSection, RegionsSection, RunSection, StatisticsSection,
    TomlConfig,
};
use crate::domain::model::ZonalStatistic;
use crate::utils::error::Result;
use crate::utils::validation::validate_required_field;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "zonal-series")]
#[command(about = "Monthly or yearly zonal statistics time series from a remote raster collection")]
#[command(version)]
pub struct CliConfig {
    /// TOML run configuration; flags given on the command line override it
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<String>,

    /// Region file (.csv with name,latitude,longitude rows, or .geojson) or a feature catalog id
    #[arg(short, long, value_name = "FILE")]
    pub regions: Option<String>,

    /// GeoJSON property holding the region identifier
    #[arg(long, value_name = "NAME")]
    pub id_property: Option<String>,

    /// Buffer point regions into circles before sampling
    #[arg(long)]
    pub expand: bool,

    /// Buffer radius in meters when --expand is set
    #[arg(long, value_name = "METERS")]
    pub expand_distance: Option<f64>,

    /// First period, MM-YYYY or YYYY
    #[arg(long, value_name = "PERIOD")]
    pub start: Option<String>,

    /// Last period (inclusive), same format as --start
    #[arg(long, value_name = "PERIOD")]
    pub end: Option<String>,

    /// Raster collection identifier
    #[arg(long, value_name = "ID")]
    pub source: Option<String>,

    /// Band to sample
    #[arg(long, value_name = "NAME")]
    pub band: Option<String>,

    /// Multiplier applied to the reduced raster (default 0.02)
    #[arg(long, value_name = "FACTOR")]
    pub scale_factor: Option<f64>,

    /// Zonal statistic: mean, median, min, max or count
    #[arg(long, value_name = "STAT")]
    pub statistic: Option<ZonalStatistic>,

    /// Nominal sampling scale for zonal statistics, in meters
    #[arg(long, value_name = "METERS")]
    pub zonal_scale: Option<f64>,

    /// Raster backend base URL
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Bearer token for the raster backend
    #[arg(long, env = "ZONAL_SERIES_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Backend request timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Output directory for the per-period CSV files
    #[arg(short, long, value_name = "DIR")]
    pub output_path: Option<String>,

    /// Also write the merged series to this file inside the output directory
    #[arg(long, value_name = "FILE")]
    pub combined: Option<String>,

    /// Aggregate every window without writing any files
    #[arg(long)]
    pub dry_run: bool,

    /// Log system CPU and memory usage per phase
    #[arg(long)]
    pub monitor: bool,

    /// Emit JSON log lines
    #[arg(long)]
    pub json_logs: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliConfig {
    /// 合併設定檔與命令列參數，命令列優先
    pub fn into_run_config(self) -> Result<TomlConfig> {
        let mut config = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig {
                run: RunSection {
                    start: validate_required_field("start", &self.start)?.clone(),
                    end: validate_required_field("end", &self.end)?.clone(),
                    emit: None,
                },
                regions: RegionsSection {
                    path: validate_required_field("regions", &self.regions)?.clone(),
                    id_property: None,
                    expand: None,
                    expand_distance_m: None,
                },
                raster: RasterSection {
                    source: validate_required_field("source", &self.source)?.clone(),
                    band: validate_required_field("band", &self.band)?.clone(),
                    scale_factor: None,
                },
                backend: BackendSection {
                    endpoint: validate_required_field("endpoint", &self.endpoint)?.clone(),
                    token: None,
                    timeout_seconds: None,
                },
                statistics: StatisticsSection::default(),
                output: OutputSection {
                    path: self.output_path.clone().unwrap_or_else(|| "./output".to_string()),
                    combined: None,
                },
            },
        };

        if let Some(start) = self.start {
            config.run.start = start;
        }
        if let Some(end) = self.end {
            config.run.end = end;
        }
        if self.dry_run {
            config.run.emit = Some(false);
        }
        if let Some(regions) = self.regions {
            config.regions.path = regions;
        }
        if self.id_property.is_some() {
            config.regions.id_property = self.id_property;
        }
        if self.expand {
            config.regions.expand = Some(true);
        }
        if self.expand_distance.is_some() {
            config.regions.expand_distance_m = self.expand_distance;
        }
        if let Some(source) = self.source {
            config.raster.source = source;
        }
        if let Some(band) = self.band {
            config.raster.band = band;
        }
        if self.scale_factor.is_some() {
            config.raster.scale_factor = self.scale_factor;
        }
        if self.statistic.is_some() {
            config.statistics.statistic = self.statistic;
        }
        if self.zonal_scale.is_some() {
            config.statistics.scale_m = self.zonal_scale;
        }
        if let Some(endpoint) = self.endpoint {
            config.backend.endpoint = endpoint;
        }
        if self.token.is_some() {
            config.backend.token = self.token;
        }
        if self.timeout.is_some() {
            config.backend.timeout_seconds = self.timeout;
        }
        if let Some(output_path) = self.output_path {
            config.output.path = output_path;
        }
        if self.combined.is_some() {
            config.output.combined = self.combined;
        }

        Ok(config)
    }
}
