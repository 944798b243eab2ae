use crate::domain::model::{AggregatedWindow, RegionSet};
use crate::domain::period::LabeledWindow;
use crate::domain::ports::{RasterBackend, RasterQuery, TemporalReducer};
use crate::utils::error::Result;

/// Digital-number to physical-unit conversion applied to every reduced raster.
pub const DEFAULT_SCALE_FACTOR: f64 = 0.02;

/// 對單一時間視窗取得平均影像並套用比例係數
pub struct WindowAggregator<'a, B: RasterBackend + ?Sized> {
    backend: &'a B,
    scale_factor: f64,
}

impl<'a, B: RasterBackend + ?Sized> WindowAggregator<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self::with_scale_factor(backend, DEFAULT_SCALE_FACTOR)
    }

    pub fn with_scale_factor(backend: &'a B, scale_factor: f64) -> Self {
        Self {
            backend,
            scale_factor,
        }
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// 後端錯誤（未知集合或波段）直接回傳，不重試
    pub async fn aggregate(
        &self,
        window: &LabeledWindow,
        source_id: &str,
        band: &str,
        regions: &RegionSet,
    ) -> Result<AggregatedWindow> {
        let query = RasterQuery {
            source_id,
            band,
            window: window.window,
            clip: regions,
            reducer: TemporalReducer::Mean,
        };

        tracing::debug!(
            "Requesting {} mean of {}/{} for {}",
            window.label,
            source_id,
            band,
            window.window
        );
        let raster = self.backend.query(&query).await?;

        Ok(AggregatedWindow {
            raster: raster.scaled(self.scale_factor),
            label: window.label,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::calendar::build_month_window;
    use crate::domain::model::{ReducedRaster, Region};
    use crate::domain::period::CalendarWindow;
    use crate::utils::error::SeriesError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedBackend {
        value: f64,
        seen: Mutex<Vec<(String, String, CalendarWindow)>>,
    }

    impl FixedBackend {
        fn new(value: f64) -> Self {
            Self {
                value,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RasterBackend for FixedBackend {
        async fn query(&self, query: &RasterQuery<'_>) -> Result<ReducedRaster> {
            if query.source_id != "SRC" {
                return Err(SeriesError::UnknownRasterSource {
                    source_id: query.source_id.to_string(),
                });
            }
            self.seen.lock().unwrap().push((
                query.source_id.to_string(),
                query.band.to_string(),
                query.window,
            ));
            let bbox = query.clip.bbox().unwrap();
            Ok(ReducedRaster::uniform(query.band, bbox, self.value))
        }
    }

    fn regions() -> RegionSet {
        RegionSet::new("name", vec![Region::point("A", 0.0, 0.0)])
    }

    #[tokio::test]
    async fn test_scale_factor_is_applied_exactly() {
        let backend = FixedBackend::new(1234.0);
        let aggregator = WindowAggregator::new(&backend);
        assert_eq!(aggregator.scale_factor(), DEFAULT_SCALE_FACTOR);
        let window = build_month_window("04-2014").unwrap();

        let result = aggregator.aggregate(&window, "SRC", "B", &regions()).await.unwrap();

        assert_eq!(result.raster.values(), &[1234.0 * 0.02]);
        assert_eq!(result.label.to_string(), "04-2014");
        assert_eq!(result.raster.band(), "B");
    }

    #[tokio::test]
    async fn test_query_carries_window_source_and_band() {
        let backend = FixedBackend::new(1.0);
        let aggregator = WindowAggregator::with_scale_factor(&backend, 1.0);
        let window = build_month_window("02-2016").unwrap();

        aggregator.aggregate(&window, "SRC", "NDVI", &regions()).await.unwrap();

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, "NDVI");
        assert_eq!(seen[0].2.end().to_string(), "2016-02-29");
    }

    #[tokio::test]
    async fn test_unknown_source_is_surfaced() {
        let backend = FixedBackend::new(1.0);
        let aggregator = WindowAggregator::new(&backend);
        let window = build_month_window("04-2014").unwrap();

        let err = aggregator
            .aggregate(&window, "NOPE", "B", &regions())
            .await
            .unwrap_err();
        assert!(matches!(err, SeriesError::UnknownRasterSource { .. }));
    }
}
