use clap::Parser;
use zonal_series::adapters::open_region_source;
use zonal_series::core::orchestrator::Orchestrator;
use zonal_series::utils::error::SeriesError;
use zonal_series::utils::monitor::SystemMonitor;
use zonal_series::utils::{logger, validation::Validate};
use zonal_series::{CliConfig, GridZonalStatistics, HttpRasterBackend, LocalStorage, TomlConfig};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting zonal-series");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let monitor = SystemMonitor::new(cli.monitor);
    if monitor.is_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }

    let result = match cli.into_run_config() {
        Ok(config) => run(config, &monitor).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            monitor.log_final_stats();
        }
        Err(e) => {
            tracing::error!("❌ Run failed: {} (Category: {:?})", e, e.category());
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(config: TomlConfig, monitor: &SystemMonitor) -> Result<(), SeriesError> {
    config.validate()?;
    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config);

    // 後端連線於此建立，區域目錄與管線共用
    let backend = HttpRasterBackend::connect(&config.backend_settings())?;

    let source = open_region_source(&config.regions.path, config.id_property(), &backend);
    let mut regions = source.load(&config.regions.path).await?;
    if let Some(distance) = config.expand_distance() {
        tracing::info!("Buffering point regions by {} m", distance);
        regions = regions.buffered(distance);
    }
    monitor.log_stats("Regions loaded");

    let storage = LocalStorage::new(config.output.path.clone());
    let orchestrator = Orchestrator::with_options(
        backend,
        GridZonalStatistics,
        storage,
        config.run_options(),
    );
    tracing::debug!("Run options: {:?}", orchestrator.options());

    let (series, report) = orchestrator
        .run_with_report(
            &regions,
            &config.run.start,
            &config.run.end,
            &config.raster.source,
            &config.raster.band,
            config.emit(),
        )
        .await?;
    monitor.log_stats("Windows processed");

    match series {
        Some(series) => {
            println!(
                "✅ {} row(s) across {} period(s)",
                series.len(),
                series.periods().len()
            );
            println!("📁 Output saved to: {}", orchestrator.storage().base_path().display());
            for output in &report.outputs {
                println!("   {}", output);
            }
        }
        None => {
            println!(
                "🔍 Dry run complete: {} window(s) aggregated, nothing written",
                report.windows.len()
            );
        }
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig) {
    let options = config.run_options();
    println!("📋 Run Summary:");
    println!("  Periods: {} .. {}", config.run.start, config.run.end);
    println!("  Regions: {}", config.regions.path);
    if let Some(distance) = config.expand_distance() {
        println!("  Buffer: {} m", distance);
    }
    println!("  Raster: {} / {}", config.raster.source, config.raster.band);
    println!("  Scale factor: {}", options.scale_factor);
    println!("  Statistic: {} at {} m", options.statistic, options.zonal_scale_m);
    println!("  Backend: {}", config.backend.endpoint);
    println!("  Output: {}", config.output.path);
    if !config.emit() {
        println!("  🔍 DRY RUN MODE ENABLED");
    }
    println!();
}
