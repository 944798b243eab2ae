use crate::domain::model::{
    Geometry, LonLat, ReducedRaster, RegionSet, RegionStatistic, StatisticsTable, ZonalStatistic,
    METERS_PER_DEGREE,
};
use crate::domain::ports::ZonalStatistics;
use crate::utils::error::{Result, SeriesError};
use async_trait::async_trait;

/// Upper bound on lattice samples per polygon; the lattice is coarsened past it.
const MAX_SAMPLES_PER_REGION: f64 = 1_000_000.0;

/// 在記憶體中對網格做區域統計。
/// 點位取所在像素；多邊形以 `scale_m` 間距取樣，無取樣點時退回形心。
#[derive(Debug, Clone, Copy, Default)]
pub struct GridZonalStatistics;

impl GridZonalStatistics {
    fn samples(raster: &ReducedRaster, geometry: &Geometry, scale_m: f64) -> Vec<f64> {
        match geometry {
            Geometry::Point(point) => raster.value_at(*point).into_iter().collect(),
            Geometry::Polygon(_) => {
                let bbox = geometry.bbox();
                let center_lat = (bbox.north + bbox.south) / 2.0;
                let mut step_lat = scale_m / METERS_PER_DEGREE;
                let mut step_lon =
                    scale_m / (METERS_PER_DEGREE * center_lat.to_radians().cos().max(1e-6));

                let estimate = ((bbox.east - bbox.west) / step_lon).ceil().max(1.0)
                    * ((bbox.north - bbox.south) / step_lat).ceil().max(1.0);
                if estimate > MAX_SAMPLES_PER_REGION {
                    let factor = (estimate / MAX_SAMPLES_PER_REGION).sqrt();
                    step_lat *= factor;
                    step_lon *= factor;
                }

                // 以整數索引取樣，極小間距也不會停在同一座標
                let nx = lattice_len(bbox.east - bbox.west, step_lon);
                let ny = lattice_len(bbox.north - bbox.south, step_lat);

                let mut values = Vec::new();
                let mut inside_any = false;
                for j in 0..ny {
                    let lat = bbox.south + (j as f64 + 0.5) * step_lat;
                    for i in 0..nx {
                        let point = LonLat::new(bbox.west + (i as f64 + 0.5) * step_lon, lat);
                        if geometry.contains(point) {
                            inside_any = true;
                            values.extend(raster.value_at(point));
                        }
                    }
                }

                if !inside_any {
                    values.extend(raster.value_at(geometry.centroid()));
                }
                values
            }
        }
    }
}

/// Cell centers `(k + 0.5) * step` that fall strictly inside `extent`.
fn lattice_len(extent: f64, step: f64) -> usize {
    let n = (extent / step - 0.5).ceil();
    if n.is_finite() && n > 0.0 {
        n as usize
    } else {
        0
    }
}

#[async_trait]
impl ZonalStatistics for GridZonalStatistics {
    async fn reduce_regions(
        &self,
        raster: &ReducedRaster,
        regions: &RegionSet,
        statistic: ZonalStatistic,
        scale_m: f64,
    ) -> Result<StatisticsTable> {
        if !(scale_m > 0.0) {
            return Err(SeriesError::InvalidConfigValueError {
                field: "statistics.scale_m".to_string(),
                value: scale_m.to_string(),
                reason: "Scale must be a positive number of meters".to_string(),
            });
        }

        let rows = regions
            .iter()
            .map(|region| {
                let samples = Self::samples(raster, &region.geometry, scale_m);
                RegionStatistic {
                    region_id: region.id.clone(),
                    value: statistic.reduce(&samples),
                }
            })
            .collect();

        Ok(StatisticsTable { statistic, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Region;

    /// 4x4 像素、每像素 0.1 度，值為列號*10+行號
    fn raster() -> ReducedRaster {
        let values = (0..16).map(|i| f64::from((i / 4) * 10 + i % 4)).collect();
        ReducedRaster::new("B", LonLat::new(0.0, 0.4), 0.1, 4, 4, values).unwrap()
    }

    fn polygon(id: &str, west: f64, south: f64, east: f64, north: f64) -> Region {
        Region {
            id: id.to_string(),
            geometry: Geometry::Polygon(vec![
                LonLat::new(west, south),
                LonLat::new(east, south),
                LonLat::new(east, north),
                LonLat::new(west, north),
            ]),
            properties: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_point_regions_sample_their_pixel() {
        let regions = RegionSet::new(
            "name",
            vec![Region::point("A", 0.05, 0.35), Region::point("far", 5.0, 5.0)],
        );

        let table = GridZonalStatistics
            .reduce_regions(&raster(), &regions, ZonalStatistic::Mean, 1000.0)
            .await
            .unwrap();

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].region_id, "A");
        assert_eq!(table.rows[0].value, Some(0.0));
        assert_eq!(table.rows[1].value, None);
    }

    #[tokio::test]
    async fn test_polygon_mean_over_lattice() {
        // 覆蓋左上 2x2 像素：0, 1, 10, 11
        let regions = RegionSet::new("name", vec![polygon("P", 0.0, 0.2, 0.2, 0.4)]);

        let table = GridZonalStatistics
            .reduce_regions(&raster(), &regions, ZonalStatistic::Mean, 1000.0)
            .await
            .unwrap();
        let mean = table.rows[0].value.unwrap();
        assert!((mean - 5.5).abs() < 1e-9, "mean was {}", mean);

        let max = GridZonalStatistics
            .reduce_regions(&raster(), &regions, ZonalStatistic::Max, 1000.0)
            .await
            .unwrap();
        assert_eq!(max.rows[0].value, Some(11.0));
    }

    #[tokio::test]
    async fn test_small_polygon_falls_back_to_centroid() {
        let regions = RegionSet::new("name", vec![polygon("tiny", 0.31, 0.01, 0.32, 0.02)]);

        let table = GridZonalStatistics
            .reduce_regions(&raster(), &regions, ZonalStatistic::Mean, 10_000.0)
            .await
            .unwrap();

        assert_eq!(table.rows[0].value, Some(33.0));
    }

    #[tokio::test]
    async fn test_vanishing_scale_is_coarsened() {
        let regions = RegionSet::new("name", vec![polygon("P", 0.0, 0.2, 0.2, 0.4)]);

        let count = GridZonalStatistics
            .reduce_regions(&raster(), &regions, ZonalStatistic::Count, 1e-12)
            .await
            .unwrap();
        let samples = count.rows[0].value.unwrap();
        assert!(samples > 0.0 && samples <= 1_100_000.0, "{} samples", samples);

        let mean = GridZonalStatistics
            .reduce_regions(&raster(), &regions, ZonalStatistic::Mean, 1e-12)
            .await
            .unwrap();
        let mean = mean.rows[0].value.unwrap();
        assert!((mean - 5.5).abs() < 0.1, "mean was {}", mean);
    }

    #[test]
    fn test_lattice_len() {
        assert_eq!(lattice_len(0.2, 0.1), 2);
        assert_eq!(lattice_len(0.3, 0.1), 3);
        assert_eq!(lattice_len(0.0, 0.1), 0);
        assert_eq!(lattice_len(0.2, f64::INFINITY), 0);
    }

    #[tokio::test]
    async fn test_non_positive_scale_is_rejected() {
        let regions = RegionSet::new("name", vec![Region::point("A", 0.05, 0.35)]);
        let result = GridZonalStatistics
            .reduce_regions(&raster(), &regions, ZonalStatistic::Mean, 0.0)
            .await;
        assert!(result.is_err());
    }
}
