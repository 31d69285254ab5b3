//! Client for the vPIC vehicle API (VIN decode, models by make/year).

use async_trait::async_trait;
use serde::Deserialize;

use super::{DecodedVehicle, VehicleLookup};
use crate::error::LookupError;

const SERVICE: &str = "vpic";

/// Longest identifier the decode service accepts.
const MAX_VIN_LENGTH: usize = 17;

/// `decodevin` response: a flat list of variable/value pairs.
#[derive(Debug, Deserialize)]
struct DecodeResponse {
    #[serde(rename = "Results", default)]
    results: Vec<DecodedVariable>,
}

#[derive(Debug, Deserialize)]
struct DecodedVariable {
    #[serde(rename = "Variable", default)]
    variable: String,
    #[serde(rename = "Value", default)]
    value: Option<String>,
}

/// `GetModelsForMakeYear` response.
#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(rename = "Results", default)]
    results: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    #[serde(rename = "Model_Name", default)]
    model_name: Option<String>,
}

pub struct VpicClient {
    client: reqwest::Client,
    base_url: String,
}

impl VpicClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build `{base}/{segments...}?format=json` with each segment escaped.
    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, LookupError> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| LookupError::RequestFailed {
            service: SERVICE.into(),
            reason: format!("bad base URL {}: {e}", self.base_url),
        })?;
        url.path_segments_mut()
            .map_err(|_| LookupError::RequestFailed {
                service: SERVICE.into(),
                reason: format!("base URL {} cannot take a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut().append_pair("format", "json");
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: reqwest::Url,
    ) -> Result<T, LookupError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LookupError::RequestFailed {
                service: SERVICE.into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LookupError::RequestFailed {
                service: SERVICE.into(),
                reason: format!("status {status}"),
            });
        }

        resp.json().await.map_err(|e| LookupError::InvalidResponse {
            service: SERVICE.into(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl VehicleLookup for VpicClient {
    async fn decode_vin(&self, vin: &str) -> Result<DecodedVehicle, LookupError> {
        let vin = normalize_vin(vin)?;
        let url = self.url(&["decodevin", &vin])?;
        let body: DecodeResponse = self.get_json(url).await?;
        Ok(extract_vehicle(&body.results))
    }

    async fn models_for_make_year(
        &self,
        make: &str,
        year: &str,
    ) -> Result<Vec<String>, LookupError> {
        let url = self.url(&[
            "GetModelsForMakeYear",
            "make",
            make.trim(),
            "modelyear",
            year.trim(),
        ])?;
        let body: ModelsResponse = self.get_json(url).await?;
        Ok(model_names(body.results))
    }
}

/// Trim and uppercase; reject anything that cannot be a VIN.
fn normalize_vin(vin: &str) -> Result<String, LookupError> {
    let vin = vin.trim().to_ascii_uppercase();
    if vin.is_empty()
        || vin.len() > MAX_VIN_LENGTH
        || !vin.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        return Err(LookupError::MalformedIdentifier(vin));
    }
    Ok(vin)
}

/// Pull year/make/model out of the decode variables by exact name.
fn extract_vehicle(results: &[DecodedVariable]) -> DecodedVehicle {
    let get = |name: &str| {
        results
            .iter()
            .find(|r| r.variable == name)
            .and_then(|r| r.value.as_deref())
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    };
    DecodedVehicle {
        year: get("Model Year"),
        make: get("Make"),
        model: get("Model"),
    }
}

fn model_names(results: Vec<ModelEntry>) -> Vec<String> {
    results
        .into_iter()
        .filter_map(|r| r.model_name)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect()
}
