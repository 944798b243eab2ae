use crate::domain::model::{ReducedRaster, RegionSet, StatisticsTable, ZonalStatistic};
use crate::domain::period::CalendarWindow;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::Serialize;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 依路徑或識別碼載入區域集合
#[async_trait]
pub trait RegionSource: Send + Sync {
    async fn load(&self, locator: &str) -> Result<RegionSet>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalReducer {
    #[default]
    Mean,
}

/// 對遠端影像集合的單一視窗查詢
#[derive(Debug, Clone, Copy)]
pub struct RasterQuery<'a> {
    pub source_id: &'a str,
    pub band: &'a str,
    pub window: CalendarWindow,
    pub clip: &'a RegionSet,
    pub reducer: TemporalReducer,
}

/// Returns one temporally reduced, unscaled raster per query. Unknown collections and
/// bands must surface as `UnknownRasterSource` / `UnknownBand`.
#[async_trait]
pub trait RasterBackend: Send + Sync {
    async fn query(&self, query: &RasterQuery<'_>) -> Result<ReducedRaster>;
}

#[async_trait]
pub trait ZonalStatistics: Send + Sync {
    /// One row per region, in region order. `scale_m` is the nominal sampling scale.
    async fn reduce_regions(
        &self,
        raster: &ReducedRaster,
        regions: &RegionSet,
        statistic: ZonalStatistic,
        scale_m: f64,
    ) -> Result<StatisticsTable>;
}
