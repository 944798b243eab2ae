use crate::domain::period::{Granularity, PeriodLabel};
use crate::utils::error::{Result, SeriesError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const METERS_PER_DEGREE: f64 = 111_320.0;
const BUFFER_SEGMENTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            west: self.west.min(other.west),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            north: self.north.max(other.north),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(LonLat),
    /// 外環座標，首尾可相同也可不同
    Polygon(Vec<LonLat>),
}

impl Geometry {
    pub fn bbox(&self) -> BoundingBox {
        match self {
            Geometry::Point(p) => BoundingBox {
                west: p.lon,
                south: p.lat,
                east: p.lon,
                north: p.lat,
            },
            Geometry::Polygon(ring) => ring.iter().fold(
                BoundingBox {
                    west: f64::INFINITY,
                    south: f64::INFINITY,
                    east: f64::NEG_INFINITY,
                    north: f64::NEG_INFINITY,
                },
                |acc, p| BoundingBox {
                    west: acc.west.min(p.lon),
                    south: acc.south.min(p.lat),
                    east: acc.east.max(p.lon),
                    north: acc.north.max(p.lat),
                },
            ),
        }
    }

    pub fn centroid(&self) -> LonLat {
        match self {
            Geometry::Point(p) => *p,
            Geometry::Polygon(ring) if ring.is_empty() => LonLat::new(0.0, 0.0),
            Geometry::Polygon(ring) => {
                let n = ring.len() as f64;
                let (lon, lat) = ring
                    .iter()
                    .fold((0.0, 0.0), |(lon, lat), p| (lon + p.lon, lat + p.lat));
                LonLat::new(lon / n, lat / n)
            }
        }
    }

    /// Ray casting; points never contain anything.
    pub fn contains(&self, point: LonLat) -> bool {
        let ring = match self {
            Geometry::Point(_) => return false,
            Geometry::Polygon(ring) => ring,
        };
        let mut inside = false;
        let mut j = ring.len().wrapping_sub(1);
        for i in 0..ring.len() {
            let (a, b) = (ring[i], ring[j]);
            if (a.lat > point.lat) != (b.lat > point.lat)
                && point.lon < (b.lon - a.lon) * (point.lat - a.lat) / (b.lat - a.lat) + a.lon
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// 將點擴展為近似圓形的多邊形，半徑以公尺計
    pub fn buffer(&self, distance_m: f64) -> Geometry {
        match self {
            Geometry::Point(center) => {
                let dlat = distance_m / METERS_PER_DEGREE;
                let dlon = distance_m / (METERS_PER_DEGREE * center.lat.to_radians().cos().max(1e-6));
                let ring = (0..BUFFER_SEGMENTS)
                    .map(|i| {
                        let theta = 2.0 * std::f64::consts::PI * i as f64 / BUFFER_SEGMENTS as f64;
                        LonLat::new(center.lon + dlon * theta.cos(), center.lat + dlat * theta.sin())
                    })
                    .collect();
                Geometry::Polygon(ring)
            }
            Geometry::Polygon(_) => self.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl Region {
    pub fn point(id: impl Into<String>, lon: f64, lat: f64) -> Self {
        Self {
            id: id.into(),
            geometry: Geometry::Point(LonLat::new(lon, lat)),
            properties: HashMap::new(),
        }
    }
}

/// 不可變的區域集合，`id_attribute` 為識別欄位名稱
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSet {
    id_attribute: String,
    regions: Vec<Region>,
}

impl RegionSet {
    pub fn new(id_attribute: impl Into<String>, regions: Vec<Region>) -> Self {
        Self {
            id_attribute: id_attribute.into(),
            regions,
        }
    }

    pub fn id_attribute(&self) -> &str {
        &self.id_attribute
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Region> {
        self.regions.iter()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Bounding box of every region, `None` for an empty set.
    pub fn bbox(&self) -> Option<BoundingBox> {
        self.regions
            .iter()
            .map(|r| r.geometry.bbox())
            .reduce(|acc, b| acc.union(&b))
    }

    /// Buffers point regions into circles of `distance_m`. Polygon regions are kept
    /// as they are; a warning reports how many were left unbuffered.
    pub fn buffered(&self, distance_m: f64) -> RegionSet {
        let polygons = self
            .regions
            .iter()
            .filter(|r| matches!(r.geometry, Geometry::Polygon(_)))
            .count();
        if polygons > 0 {
            tracing::warn!(
                "⚠️ {} polygon region(s) are not buffered; only point regions are expanded",
                polygons
            );
        }
        let regions = self
            .regions
            .iter()
            .map(|r| Region {
                geometry: r.geometry.buffer(distance_m),
                ..r.clone()
            })
            .collect();
        RegionSet::new(self.id_attribute.clone(), regions)
    }
}

/// 時間平均後的單波段網格，原點為西北角，`NaN` 表示無資料
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedRaster {
    band: String,
    origin: LonLat,
    pixel_size: f64,
    width: usize,
    height: usize,
    values: Vec<f64>,
}

impl ReducedRaster {
    pub fn new(
        band: impl Into<String>,
        origin: LonLat,
        pixel_size: f64,
        width: usize,
        height: usize,
        values: Vec<f64>,
    ) -> Result<Self> {
        if width == 0 || height == 0 || values.len() != width * height {
            return Err(SeriesError::Backend {
                status: 200,
                message: format!(
                    "raster of {}x{} pixels carries {} values",
                    width,
                    height,
                    values.len()
                ),
            });
        }
        if !(pixel_size > 0.0) {
            return Err(SeriesError::Backend {
                status: 200,
                message: format!("non-positive pixel size {}", pixel_size),
            });
        }
        Ok(Self {
            band: band.into(),
            origin,
            pixel_size,
            width,
            height,
            values,
        })
    }

    /// Single-value raster covering `bbox`; handy for backends that return a scalar mean.
    pub fn uniform(band: impl Into<String>, bbox: BoundingBox, value: f64) -> Self {
        let span = (bbox.east - bbox.west).max(bbox.north - bbox.south);
        Self {
            band: band.into(),
            origin: LonLat::new(bbox.west, bbox.north),
            pixel_size: if span > 0.0 { span } else { 1.0 },
            width: 1,
            height: 1,
            values: vec![value],
        }
    }

    pub fn band(&self) -> &str {
        &self.band
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn pixel_size(&self) -> f64 {
        self.pixel_size
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn scaled(mut self, factor: f64) -> Self {
        for value in &mut self.values {
            *value *= factor;
        }
        self
    }

    /// 取得座標所在像素的值；範圍外或無資料時回傳 `None`
    pub fn value_at(&self, point: LonLat) -> Option<f64> {
        if !point.lon.is_finite() || !point.lat.is_finite() {
            return None;
        }
        let col = ((point.lon - self.origin.lon) / self.pixel_size).floor();
        let row = ((self.origin.lat - point.lat) / self.pixel_size).floor();
        // 東緣與南緣歸入最後一列
        let col = if col as usize == self.width && point.lon <= self.east() { col - 1.0 } else { col };
        let row = if row as usize == self.height && point.lat >= self.south() { row - 1.0 } else { row };
        if col < 0.0 || row < 0.0 || col as usize >= self.width || row as usize >= self.height {
            return None;
        }
        let value = self.values[row as usize * self.width + col as usize];
        if value.is_nan() {
            None
        } else {
            Some(value)
        }
    }

    fn east(&self) -> f64 {
        self.origin.lon + self.pixel_size * self.width as f64
    }

    fn south(&self) -> f64 {
        self.origin.lat - self.pixel_size * self.height as f64
    }
}

/// 視窗聚合結果
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedWindow {
    pub raster: ReducedRaster,
    pub label: PeriodLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZonalStatistic {
    #[default]
    Mean,
    Median,
    Min,
    Max,
    Count,
}

impl ZonalStatistic {
    pub fn column_name(&self) -> &'static str {
        match self {
            ZonalStatistic::Mean => "mean",
            ZonalStatistic::Median => "median",
            ZonalStatistic::Min => "min",
            ZonalStatistic::Max => "max",
            ZonalStatistic::Count => "count",
        }
    }

    /// Reduce samples; `None` when there is nothing to reduce (except `Count`).
    pub fn reduce(&self, samples: &[f64]) -> Option<f64> {
        match self {
            ZonalStatistic::Count => Some(samples.len() as f64),
            _ if samples.is_empty() => None,
            ZonalStatistic::Mean => Some(samples.iter().sum::<f64>() / samples.len() as f64),
            ZonalStatistic::Min => samples.iter().copied().reduce(f64::min),
            ZonalStatistic::Max => samples.iter().copied().reduce(f64::max),
            ZonalStatistic::Median => {
                let mut sorted = samples.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    Some((sorted[mid - 1] + sorted[mid]) / 2.0)
                } else {
                    Some(sorted[mid])
                }
            }
        }
    }
}

impl fmt::Display for ZonalStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for ZonalStatistic {
    type Err = SeriesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(ZonalStatistic::Mean),
            "median" => Ok(ZonalStatistic::Median),
            "min" => Ok(ZonalStatistic::Min),
            "max" => Ok(ZonalStatistic::Max),
            "count" => Ok(ZonalStatistic::Count),
            other => Err(SeriesError::InvalidConfigValueError {
                field: "statistic".to_string(),
                value: other.to_string(),
                reason: "Valid statistics: mean, median, min, max, count".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionStatistic {
    pub region_id: String,
    pub value: Option<f64>,
}

/// 區域統計結果，列順序與輸入區域相同
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsTable {
    pub statistic: ZonalStatistic,
    pub rows: Vec<RegionStatistic>,
}

impl StatisticsTable {
    /// 附加時間標籤欄位，產生時間序列列
    pub fn into_series_rows(self, label: PeriodLabel) -> Vec<TimeSeriesRow> {
        self.rows
            .into_iter()
            .map(|row| TimeSeriesRow {
                region_id: row.region_id,
                period: label,
                value: row.value,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesRow {
    pub region_id: String,
    pub period: PeriodLabel,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub granularity: Granularity,
    pub id_attribute: String,
    pub statistic: ZonalStatistic,
    pub rows: Vec<TimeSeriesRow>,
}

impl TimeSeries {
    pub fn new(granularity: Granularity, id_attribute: impl Into<String>, statistic: ZonalStatistic) -> Self {
        Self {
            granularity,
            id_attribute: id_attribute.into(),
            statistic,
            rows: Vec::new(),
        }
    }

    /// 依時間先後列出的標籤，不重複
    pub fn periods(&self) -> Vec<PeriodLabel> {
        let mut periods: Vec<PeriodLabel> = Vec::new();
        for row in &self.rows {
            if periods.last() != Some(&row.period) {
                periods.push(row.period);
            }
        }
        periods
    }

    pub fn rows_for(&self, period: PeriodLabel) -> impl Iterator<Item = &TimeSeriesRow> {
        self.rows.iter().filter(move |row| row.period == period)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// 單次執行的摘要
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub windows: Vec<PeriodLabel>,
    pub outputs: Vec<String>,
    pub emitted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(west: f64, south: f64, size: f64) -> Geometry {
        Geometry::Polygon(vec![
            LonLat::new(west, south),
            LonLat::new(west + size, south),
            LonLat::new(west + size, south + size),
            LonLat::new(west, south + size),
        ])
    }

    #[test]
    fn test_polygon_contains() {
        let poly = square(0.0, 0.0, 2.0);
        assert!(poly.contains(LonLat::new(1.0, 1.0)));
        assert!(!poly.contains(LonLat::new(3.0, 1.0)));
        assert!(!Geometry::Point(LonLat::new(1.0, 1.0)).contains(LonLat::new(1.0, 1.0)));
    }

    #[test]
    fn test_buffer_turns_point_into_polygon_around_it() {
        let point = Geometry::Point(LonLat::new(35.0, -6.0));
        let buffered = point.buffer(10_000.0);
        assert!(matches!(buffered, Geometry::Polygon(ref ring) if ring.len() == BUFFER_SEGMENTS));
        assert!(buffered.contains(LonLat::new(35.0, -6.0)));
        assert!(!buffered.contains(LonLat::new(35.0, -5.8)));
        let bbox = buffered.bbox();
        assert!((bbox.north - (-6.0 + 10_000.0 / METERS_PER_DEGREE)).abs() < 1e-9);
    }

    #[test]
    fn test_buffered_expands_points_and_keeps_polygons() {
        let polygon = square(0.0, 0.0, 1.0);
        let set = RegionSet::new(
            "name",
            vec![
                Region::point("A", 35.0, -6.0),
                Region {
                    id: "P".to_string(),
                    geometry: polygon.clone(),
                    properties: HashMap::new(),
                },
            ],
        );

        let buffered = set.buffered(10_000.0);
        assert_eq!(buffered.id_attribute(), "name");
        assert!(matches!(buffered.regions()[0].geometry, Geometry::Polygon(_)));
        assert_eq!(buffered.regions()[1].geometry, polygon);
    }

    #[test]
    fn test_region_set_bbox() {
        let set = RegionSet::new(
            "name",
            vec![Region::point("A", 0.0, 0.0), Region::point("B", 2.0, -1.0)],
        );
        let bbox = set.bbox().unwrap();
        assert_eq!(bbox.west, 0.0);
        assert_eq!(bbox.east, 2.0);
        assert_eq!(bbox.south, -1.0);
        assert_eq!(bbox.north, 0.0);
        assert!(RegionSet::new("name", vec![]).bbox().is_none());
    }

    #[test]
    fn test_raster_value_lookup() {
        let raster = ReducedRaster::new(
            "B",
            LonLat::new(0.0, 2.0),
            1.0,
            2,
            2,
            vec![1.0, 2.0, 3.0, f64::NAN],
        )
        .unwrap();
        assert_eq!(raster.value_at(LonLat::new(0.5, 1.5)), Some(1.0));
        assert_eq!(raster.value_at(LonLat::new(1.5, 1.5)), Some(2.0));
        assert_eq!(raster.value_at(LonLat::new(0.5, 0.5)), Some(3.0));
        assert_eq!(raster.value_at(LonLat::new(1.5, 0.5)), None);
        assert_eq!(raster.value_at(LonLat::new(5.0, 0.5)), None);
        // 東南角落在網格邊界上
        assert_eq!(raster.value_at(LonLat::new(2.0, 2.0)), Some(2.0));
    }

    #[test]
    fn test_raster_rejects_wrong_value_count() {
        let result = ReducedRaster::new("B", LonLat::new(0.0, 0.0), 1.0, 2, 2, vec![1.0]);
        assert!(matches!(result, Err(SeriesError::Backend { .. })));
    }

    #[test]
    fn test_uniform_raster_covers_point_bbox() {
        let bbox = Geometry::Point(LonLat::new(0.0, 0.0)).bbox();
        let raster = ReducedRaster::uniform("B", bbox, 7.0);
        assert_eq!(raster.value_at(LonLat::new(0.0, 0.0)), Some(7.0));
    }

    #[test]
    fn test_statistics_reduce() {
        let samples = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(ZonalStatistic::Mean.reduce(&samples), Some(2.5));
        assert_eq!(ZonalStatistic::Median.reduce(&samples), Some(2.5));
        assert_eq!(ZonalStatistic::Min.reduce(&samples), Some(1.0));
        assert_eq!(ZonalStatistic::Max.reduce(&samples), Some(4.0));
        assert_eq!(ZonalStatistic::Count.reduce(&samples), Some(4.0));
        assert_eq!(ZonalStatistic::Mean.reduce(&[]), None);
        assert_eq!(ZonalStatistic::Count.reduce(&[]), Some(0.0));
        assert_eq!("MEAN".parse::<ZonalStatistic>().unwrap(), ZonalStatistic::Mean);
        assert!("mode".parse::<ZonalStatistic>().is_err());
    }
}
