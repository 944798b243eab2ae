use crate::domain::model::{BoundingBox, LonLat, ReducedRaster};
use crate::domain::period::CalendarDate;
use crate::domain::ports::{RasterBackend, RasterQuery, TemporalReducer};
use crate::utils::error::{Result, SeriesError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REDUCE_PATH: &str = "/v1/reduce";
const FEATURES_PATH: &str = "/v1/features";

/// 後端連線設定，由呼叫端建立並在執行前完成初始化
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub endpoint: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl BackendSettings {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Authenticated session against a raster reduction service.
#[derive(Debug, Clone)]
pub struct HttpRasterBackend {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReduceRequest<'a> {
    collection: &'a str,
    band: &'a str,
    start: CalendarDate,
    end: CalendarDate,
    end_exclusive: CalendarDate,
    reducer: TemporalReducer,
    bbox: Option<[f64; 4]>,
}

#[derive(Debug, Deserialize)]
struct ReduceResponse {
    origin: LonLat,
    pixel_size: f64,
    width: usize,
    height: usize,
    values: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    message: Option<String>,
}

impl HttpRasterBackend {
    pub fn connect(settings: &BackendSettings) -> Result<Self> {
        crate::utils::validation::validate_url("backend.endpoint", &settings.endpoint)?;
        let client = Client::builder().timeout(settings.timeout).build()?;
        tracing::debug!("Raster backend session opened for {}", settings.endpoint);
        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 下載遠端要素集合（GeoJSON），例如 `users/someone/TanzaniaDHS`
    pub async fn fetch_features(&self, asset_id: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}{}/{}",
            self.endpoint,
            FEATURES_PATH,
            asset_id.trim_matches('/')
        );
        tracing::debug!("GET {}", url);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("Feature catalog response status: {}", status);

        if status == StatusCode::NOT_FOUND {
            return Err(SeriesError::RegionSource {
                locator: asset_id.to_string(),
                message: "unknown feature collection".to_string(),
            });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SeriesError::Backend {
                status: status.as_u16(),
                message: text,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl RasterBackend for HttpRasterBackend {
    async fn query(&self, query: &RasterQuery<'_>) -> Result<ReducedRaster> {
        let body = ReduceRequest {
            collection: query.source_id,
            band: query.band,
            start: query.window.start(),
            end: query.window.end(),
            end_exclusive: query.window.next_start(),
            reducer: query.reducer,
            bbox: query.clip.bbox().map(|b: BoundingBox| [b.west, b.south, b.east, b.north]),
        };

        let url = format!("{}{}", self.endpoint, REDUCE_PATH);
        tracing::debug!("POST {} ({}/{} {}..{})", url, body.collection, body.band, body.start, body.end);

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("Raster backend response status: {}", status);

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_error(status, &text, query));
        }

        let payload: ReduceResponse = serde_json::from_slice(&response.bytes().await?)?;
        let values = payload
            .values
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        ReducedRaster::new(
            query.band,
            payload.origin,
            payload.pixel_size,
            payload.width,
            payload.height,
            values,
        )
    }
}

fn map_error(status: StatusCode, text: &str, query: &RasterQuery<'_>) -> SeriesError {
    let body: Option<ErrorBody> = serde_json::from_str(text).ok();
    match (status, body) {
        (StatusCode::NOT_FOUND, Some(body)) if body.error == "unknown_source" => {
            SeriesError::UnknownRasterSource {
                source_id: query.source_id.to_string(),
            }
        }
        (StatusCode::NOT_FOUND, Some(body)) if body.error == "unknown_band" => SeriesError::UnknownBand {
            source_id: query.source_id.to_string(),
            band: query.band.to_string(),
        },
        (status, Some(body)) => SeriesError::Backend {
            status: status.as_u16(),
            message: body.message.unwrap_or(body.error),
        },
        (status, None) => SeriesError::Backend {
            status: status.as_u16(),
            message: text.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::calendar::build_month_window;
    use crate::domain::model::{Region, RegionSet};
    use httpmock::prelude::*;

    fn query<'a>(regions: &'a RegionSet, source_id: &'a str, band: &'a str) -> RasterQuery<'a> {
        RasterQuery {
            source_id,
            band,
            window: build_month_window("02-2016").unwrap().window,
            clip: regions,
            reducer: TemporalReducer::Mean,
        }
    }

    fn regions() -> RegionSet {
        RegionSet::new("name", vec![Region::point("A", 1.0, 2.0)])
    }

    #[tokio::test]
    async fn test_reduce_request_and_grid_response() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/reduce")
                .header("authorization", "Bearer secret")
                .body_contains("\"collection\":\"SRC\"")
                .body_contains("\"start\":\"2016-02-01\"")
                .body_contains("\"end\":\"2016-02-29\"")
                .body_contains("\"end_exclusive\":\"2016-03-01\"")
                .body_contains("\"reducer\":\"mean\"");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "origin": {"lon": 0.0, "lat": 3.0},
                    "pixel_size": 1.5,
                    "width": 2,
                    "height": 2,
                    "values": [100.0, null, 300.0, 400.0]
                }));
        });

        let mut settings = BackendSettings::new(server.base_url());
        settings.token = Some("secret".to_string());
        let backend = HttpRasterBackend::connect(&settings).unwrap();
        let regions = regions();

        let raster = backend.query(&query(&regions, "SRC", "B")).await.unwrap();

        api_mock.assert();
        assert_eq!(raster.dimensions(), (2, 2));
        assert_eq!(raster.value_at(LonLat::new(1.0, 2.0)), Some(100.0));
        assert_eq!(raster.value_at(LonLat::new(2.0, 2.0)), None);
    }

    #[tokio::test]
    async fn test_unknown_source_and_band_are_typed() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/reduce").body_contains("\"collection\":\"NOPE\"");
            then.status(404)
                .json_body(serde_json::json!({"error": "unknown_source"}));
        });
        server.mock(|when, then| {
            when.method(POST).path("/v1/reduce").body_contains("\"band\":\"ZZ\"");
            then.status(404)
                .json_body(serde_json::json!({"error": "unknown_band"}));
        });

        let backend = HttpRasterBackend::connect(&BackendSettings::new(server.base_url())).unwrap();
        let regions = regions();

        let err = backend.query(&query(&regions, "NOPE", "B")).await.unwrap_err();
        assert!(matches!(err, SeriesError::UnknownRasterSource { .. }));

        let err = backend.query(&query(&regions, "SRC", "ZZ")).await.unwrap_err();
        assert!(matches!(err, SeriesError::UnknownBand { .. }));
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST).path("/v1/reduce");
            then.status(503).body("maintenance");
        });

        let backend = HttpRasterBackend::connect(&BackendSettings::new(server.base_url())).unwrap();
        let regions = regions();

        let err = backend.query(&query(&regions, "SRC", "B")).await.unwrap_err();

        api_mock.assert_hits(1);
        match err {
            SeriesError::Backend { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "maintenance");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_features_from_catalog() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/features/users/someone/TanzaniaDHS")
                .header("authorization", "Bearer secret");
            then.status(200).body(r#"{"features": []}"#);
        });
        server.mock(|when, then| {
            when.method(GET).path("/v1/features/users/someone/Missing");
            then.status(404).json_body(serde_json::json!({"error": "not_found"}));
        });

        let mut settings = BackendSettings::new(server.base_url());
        settings.token = Some("secret".to_string());
        let backend = HttpRasterBackend::connect(&settings).unwrap();

        let body = backend.fetch_features("users/someone/TanzaniaDHS").await.unwrap();
        api_mock.assert();
        assert_eq!(body, br#"{"features": []}"#.to_vec());

        let err = backend.fetch_features("users/someone/Missing").await.unwrap_err();
        assert!(matches!(err, SeriesError::RegionSource { .. }));
    }

    #[test]
    fn test_connect_rejects_bad_endpoint() {
        assert!(HttpRasterBackend::connect(&BackendSettings::new("not a url")).is_err());
    }
}
