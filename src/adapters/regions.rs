use crate::adapters::http::HttpRasterBackend;
use crate::domain::model::{Geometry, LonLat, Region, RegionSet};
use crate::domain::ports::RegionSource;
use crate::utils::error::{Result, SeriesError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// 本機區域檔案：`.csv` 點位表或 `.geojson` 要素集合
#[derive(Debug, Clone)]
pub struct FileRegionSource {
    id_property: String,
}

impl FileRegionSource {
    /// `id_property` is the GeoJSON property holding each region's identifier;
    /// CSV files name it in their header instead.
    pub fn new(id_property: impl Into<String>) -> Self {
        Self {
            id_property: id_property.into(),
        }
    }
}

impl Default for FileRegionSource {
    fn default() -> Self {
        Self::new("name")
    }
}

#[async_trait]
impl RegionSource for FileRegionSource {
    async fn load(&self, locator: &str) -> Result<RegionSet> {
        let extension = Path::new(locator)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        let regions = match extension.as_deref() {
            Some("csv") => {
                let content = std::fs::read(locator).map_err(|e| region_error(locator, e))?;
                parse_csv_regions(locator, &content)?
            }
            Some("geojson") | Some("json") => {
                let content = std::fs::read(locator).map_err(|e| region_error(locator, e))?;
                parse_geojson_regions(locator, &content, &self.id_property)?
            }
            _ => {
                return Err(region_error(
                    locator,
                    "unsupported region source, expected a .csv or .geojson file",
                ))
            }
        };

        log_loaded(locator, &regions);
        Ok(regions)
    }
}

/// 遠端要素集合，透過既有的後端連線下載 GeoJSON
#[derive(Debug, Clone)]
pub struct CatalogRegionSource {
    backend: HttpRasterBackend,
    id_property: String,
}

impl CatalogRegionSource {
    pub fn new(backend: HttpRasterBackend, id_property: impl Into<String>) -> Self {
        Self {
            backend,
            id_property: id_property.into(),
        }
    }
}

#[async_trait]
impl RegionSource for CatalogRegionSource {
    async fn load(&self, locator: &str) -> Result<RegionSet> {
        let content = self.backend.fetch_features(locator).await?;
        let regions = parse_geojson_regions(locator, &content, &self.id_property)?;
        log_loaded(locator, &regions);
        Ok(regions)
    }
}

/// Locators without a file extension name a remote feature collection
/// (e.g. `users/someone/TanzaniaDHS`); everything else is read from disk.
pub fn is_catalog_locator(locator: &str) -> bool {
    Path::new(locator.trim()).extension().is_none()
}

pub fn open_region_source(
    locator: &str,
    id_property: &str,
    backend: &HttpRasterBackend,
) -> Box<dyn RegionSource> {
    if is_catalog_locator(locator) {
        tracing::debug!("Region locator '{}' resolved to the feature catalog", locator);
        Box::new(CatalogRegionSource::new(backend.clone(), id_property))
    } else {
        Box::new(FileRegionSource::new(id_property))
    }
}

fn log_loaded(locator: &str, regions: &RegionSet) {
    tracing::info!(
        "📍 Loaded {} region(s) from {} (id attribute '{}')",
        regions.len(),
        locator,
        regions.id_attribute()
    );
}

/// Header's first column names the identifying attribute; every following line reads
/// `name,latitude,longitude`. Extra columns are kept as region properties.
pub fn parse_csv_regions(locator: &str, content: &[u8]) -> Result<RegionSet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content);

    let headers = reader.headers()?.clone();
    let attribute = headers
        .get(0)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| region_error(locator, "header line is missing the identifying attribute"))?
        .to_string();

    let mut regions = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        if record.len() < 3 {
            return Err(region_error(
                locator,
                format!("line {}: expected name,latitude,longitude", line),
            ));
        }

        let lat = parse_coordinate(locator, line, "latitude", &record[1])?;
        let lon = parse_coordinate(locator, line, "longitude", &record[2])?;
        let properties: HashMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .skip(3)
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        regions.push(Region {
            id: record[0].to_string(),
            geometry: Geometry::Point(LonLat::new(lon, lat)),
            properties,
        });
    }

    Ok(RegionSet::new(attribute, regions))
}

fn parse_coordinate(locator: &str, line: u64, what: &str, raw: &str) -> Result<f64> {
    raw.parse::<f64>().map_err(|_| {
        region_error(
            locator,
            format!("line {}: {} '{}' is not a number", line, what, raw),
        )
    })
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: FeatureGeometry,
    #[serde(default)]
    properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
enum FeatureGeometry {
    Point([f64; 2]),
    Polygon(Vec<Vec<[f64; 2]>>),
}

/// Point and Polygon features only; polygon holes are ignored.
pub fn parse_geojson_regions(locator: &str, content: &[u8], id_property: &str) -> Result<RegionSet> {
    let collection: FeatureCollection =
        serde_json::from_slice(content).map_err(|e| region_error(locator, e))?;

    let mut regions = Vec::with_capacity(collection.features.len());
    for (index, feature) in collection.features.into_iter().enumerate() {
        let mut id = None;
        let mut properties = HashMap::new();
        for (key, value) in feature.properties {
            let text = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            if key == id_property {
                id = Some(text);
            } else {
                properties.insert(key, text);
            }
        }
        let id = id.ok_or_else(|| {
            region_error(
                locator,
                format!("feature {} has no '{}' property", index, id_property),
            )
        })?;

        let geometry = match feature.geometry {
            FeatureGeometry::Point([lon, lat]) => Geometry::Point(LonLat::new(lon, lat)),
            FeatureGeometry::Polygon(rings) => {
                let outer = rings.into_iter().next().ok_or_else(|| {
                    region_error(locator, format!("feature {} has an empty polygon", index))
                })?;
                Geometry::Polygon(outer.into_iter().map(|[lon, lat]| LonLat::new(lon, lat)).collect())
            }
        };

        regions.push(Region {
            id,
            geometry,
            properties,
        });
    }

    Ok(RegionSet::new(id_property, regions))
}

fn region_error(locator: &str, message: impl ToString) -> SeriesError {
    SeriesError::RegionSource {
        locator: locator.to_string(),
        message: message.to_string(),
    }
}
