use crate::core::aggregator::{WindowAggregator, DEFAULT_SCALE_FACTOR};
use crate::core::calendar::build_window;
use crate::core::decompose::{decompose, Windows};
use crate::core::export;
use crate::domain::model::{RegionSet, RunReport, TimeSeries, ZonalStatistic};
use crate::domain::period::Granularity;
use crate::domain::ports::{RasterBackend, Storage, ZonalStatistics};
use crate::utils::error::{Result, SeriesError};
use chrono::Utc;

/// Nominal sampling scale handed to the zonal statistics engine, in meters.
pub const DEFAULT_ZONAL_SCALE_M: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub scale_factor: f64,
    pub statistic: ZonalStatistic,
    pub zonal_scale_m: f64,
    /// 若設定，所有視窗完成後另外輸出一份合併的時間序列
    pub combined_output: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            statistic: ZonalStatistic::Mean,
            zonal_scale_m: DEFAULT_ZONAL_SCALE_M,
            combined_output: None,
        }
    }
}

/// Validates the date pair and returns the windows it covers.
pub fn plan_windows(start: &str, end: &str) -> Result<(Granularity, Windows)> {
    let granularity = Granularity::detect(start);
    if granularity != Granularity::detect(end) {
        return Err(SeriesError::MixedGranularity {
            start: start.to_string(),
            end: end.to_string(),
        });
    }

    let windows = if start.trim() == end.trim() {
        Windows::single(build_window(start, granularity)?)
    } else {
        decompose(start, end, granularity)?
    };
    Ok((granularity, windows))
}

/// 時間序列管線：驗證日期、切分視窗、逐一聚合並輸出。
/// 不保存跨呼叫狀態，後端連線由呼叫端建立後傳入。
pub struct Orchestrator<B: RasterBackend, Z: ZonalStatistics, S: Storage> {
    backend: B,
    zonal: Z,
    storage: S,
    options: RunOptions,
}

impl<B: RasterBackend, Z: ZonalStatistics, S: Storage> Orchestrator<B, Z, S> {
    pub fn new(backend: B, zonal: Z, storage: S) -> Self {
        Self::with_options(backend, zonal, storage, RunOptions::default())
    }

    pub fn with_options(backend: B, zonal: Z, storage: S, options: RunOptions) -> Self {
        Self {
            backend,
            zonal,
            storage,
            options,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub async fn run(
        &self,
        regions: &RegionSet,
        start: &str,
        end: &str,
        source_id: &str,
        band: &str,
        emit: bool,
    ) -> Result<Option<TimeSeries>> {
        let (series, _report) = self
            .run_with_report(regions, start, end, source_id, band, emit)
            .await?;
        Ok(series)
    }

    /// 失敗即中止；先前完成的視窗檔案保留在輸出目錄中
    pub async fn run_with_report(
        &self,
        regions: &RegionSet,
        start: &str,
        end: &str,
        source_id: &str,
        band: &str,
        emit: bool,
    ) -> Result<(Option<TimeSeries>, RunReport)> {
        let started_at = Utc::now();
        let run_id = format!("run-{}", started_at.format("%Y%m%dT%H%M%S%.3f"));
        let (granularity, windows) = plan_windows(start, end)?;

        tracing::info!(
            "🚀 {} {}: {} {} window(s) of {}/{} over {} region(s)",
            run_id,
            if emit { "export" } else { "dry run" },
            windows.len(),
            granularity.column_name().to_lowercase(),
            source_id,
            band,
            regions.len()
        );

        let aggregator = WindowAggregator::with_scale_factor(&self.backend, self.options.scale_factor);
        let mut series = TimeSeries::new(granularity, regions.id_attribute(), self.options.statistic);
        let mut processed = Vec::with_capacity(windows.len());
        let mut outputs = Vec::new();

        for window in windows {
            tracing::info!("🛰️ Aggregating {} {}", window.label, window.window);
            let aggregated = aggregator.aggregate(&window, source_id, band, regions).await?;
            processed.push(window.label);

            if !emit {
                tracing::debug!("Dry run, skipping export of {}", window.label);
                continue;
            }

            let table = self
                .zonal
                .reduce_regions(
                    &aggregated.raster,
                    regions,
                    self.options.statistic,
                    self.options.zonal_scale_m,
                )
                .await?;

            let output = aggregated.label.file_name();
            if table.rows.len() != regions.len() {
                return Err(SeriesError::ExportError {
                    output,
                    message: format!(
                        "expected {} rows, statistics engine returned {}",
                        regions.len(),
                        table.rows.len()
                    ),
                });
            }

            let rows = table.into_series_rows(aggregated.label);
            let bytes = export::render_rows(
                regions.id_attribute(),
                self.options.statistic,
                granularity,
                &rows,
            )?;
            self.storage.write_file(&output, &bytes).await?;
            tracing::debug!("Wrote {} ({} rows, {} bytes)", output, rows.len(), bytes.len());

            outputs.push(output);
            series.rows.extend(rows);
        }

        if emit {
            if let Some(combined) = &self.options.combined_output {
                let bytes = export::render_series(&series)?;
                self.storage.write_file(combined, &bytes).await?;
                tracing::info!("📁 Combined series written to {}", combined);
                outputs.push(combined.clone());
            }
        }

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            windows: processed,
            outputs,
            emitted: emit,
        };
        tracing::info!(
            "✅ {} finished: {} window(s), {} file(s)",
            report.run_id,
            report.windows.len(),
            report.outputs.len()
        );

        Ok((emit.then_some(series), report))
    }
}
