use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::{Feature, Geometry, RegionWindow};
use crate::error::DysonError;

pub const TOKEN_ENV: &str = "DYSON_ENGINE_TOKEN";

/// Server-side stretch applied before extraction so the exported bands are
/// already display-ready bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    pub bands: Vec<String>,
    pub min: f64,
    pub max: f64,
}

impl Default for Visualization {
    fn default() -> Self {
        Self {
            bands: vec!["red".to_string(), "green".to_string(), "blue".to_string()],
            min: 0.0,
            max: 3000.0,
        }
    }
}

/// Opaque reference to an image computed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub String);

impl ImageHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The region-extraction capability of the remote compute engine.
pub trait RegionService: Send + Sync {
    /// Median composite of `source` over the feature's geometry, visualized
    /// with `visualization`. No download happens here.
    fn request_region(
        &self,
        source: &str,
        feature: &Feature,
        visualization: &Visualization,
    ) -> Result<ImageHandle, DysonError>;

    /// Time-limited url for a zip of the image clipped to `window`.
    fn download_url(
        &self,
        image: &ImageHandle,
        window: &RegionWindow,
        scale: f64,
    ) -> Result<String, DysonError>;
}

#[derive(Debug, Serialize)]
struct ComputeRegionRequest<'a> {
    source: &'a str,
    geometry: &'a Geometry,
    reducer: &'static str,
    visualization: &'a Visualization,
}

#[derive(Debug, Deserialize)]
struct ComputeRegionResponse {
    image: String,
}

#[derive(Debug, Serialize)]
struct DownloadUrlRequest<'a> {
    region: &'a RegionWindow,
    scale: f64,
}

#[derive(Debug, Deserialize)]
struct DownloadUrlResponse {
    url: String,
}

/// Session with the engine. Built once at startup and passed by reference.
#[derive(Clone)]
pub struct EngineHttpClient {
    client: Client,
    base_url: String,
}

impl EngineHttpClient {
    pub fn new(base_url: &str) -> Result<Self, DysonError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("dyson/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DysonError::EngineHttp(err.to_string()))?,
        );

        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.trim().is_empty() {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                        .map_err(|err| DysonError::EngineHttp(err.to_string()))?,
                );
            }
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| DysonError::EngineHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, DysonError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|err| DysonError::EngineHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "engine request failed".to_string());
            return Err(DysonError::EngineStatus { status, message });
        }
        response
            .json::<R>()
            .map_err(|err| DysonError::EngineResponse(format!("{path}: {err}")))
    }
}

impl RegionService for EngineHttpClient {
    fn request_region(
        &self,
        source: &str,
        feature: &Feature,
        visualization: &Visualization,
    ) -> Result<ImageHandle, DysonError> {
        let request = ComputeRegionRequest {
            source,
            geometry: &feature.geometry,
            reducer: "median",
            visualization,
        };
        let response: ComputeRegionResponse = self.post_json("v1/regions:compute", &request)?;
        Ok(ImageHandle(response.image))
    }

    fn download_url(
        &self,
        image: &ImageHandle,
        window: &RegionWindow,
        scale: f64,
    ) -> Result<String, DysonError> {
        let request = DownloadUrlRequest {
            region: window,
            scale,
        };
        let path = format!("v1/images/{}:getDownloadUrl", image.as_str());
        let response: DownloadUrlResponse = self.post_json(&path, &request)?;
        Ok(response.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_request_shape() {
        let feature = Feature {
            geometry: Geometry::Point([27.48, -10.71]),
            properties: Default::default(),
        };
        let visualization = Visualization::default();
        let request = ComputeRegionRequest {
            source: "landsat/l8-sr-masked",
            geometry: &feature.geometry,
            reducer: "median",
            visualization: &visualization,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["geometry"]["type"], "Point");
        assert_eq!(value["geometry"]["coordinates"][1], -10.71);
        assert_eq!(value["visualization"]["bands"][2], "blue");
        assert_eq!(value["visualization"]["max"], 3000.0);
    }

    #[test]
    fn download_request_shape() {
        let window = RegionWindow::around([1.0, 2.0], 0.5);
        let request = DownloadUrlRequest {
            region: &window,
            scale: 30.0,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["region"].as_array().unwrap().len(), 4);
        assert_eq!(value["region"][0][0], 1.5);
        assert_eq!(value["scale"], 30.0);
    }
}
