//! OSRM HTTP adapter for distance/duration matrices.

use serde::Deserialize;

use crate::matrix::UNREACHABLE;
use crate::traits::{DistanceMatrixProvider, MatrixError, TravelMatrices};

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }
}

impl DistanceMatrixProvider for OsrmClient {
    fn matrices_for(&self, locations: &[(f64, f64)]) -> Result<TravelMatrices, MatrixError> {
        let coords = locations
            .iter()
            .map(|(lat, lng)| format!("{:.6},{:.6}", lng, lat))
            .collect::<Vec<_>>()
            .join(";");

        let url = format!(
            "{}/table/v1/{}/{}?annotations=duration,distance",
            self.config.base_url, self.config.profile, coords
        );

        let body = self
            .client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.json::<OsrmTableResponse>())
            .map_err(|error| MatrixError::Transport(error.to_string()))?;

        matrices_from(body, locations.len())
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    /// Pairwise durations in seconds; `null` marks an unroutable pair.
    durations: Option<Vec<Vec<Option<f64>>>>,
    /// Pairwise distances in meters; `null` marks an unroutable pair.
    distances: Option<Vec<Vec<Option<f64>>>>,
}

fn matrices_from(body: OsrmTableResponse, expected: usize) -> Result<TravelMatrices, MatrixError> {
    let distances = body
        .distances
        .ok_or_else(|| MatrixError::BadResponse("missing distances table".to_string()))?;
    let durations = body
        .durations
        .ok_or_else(|| MatrixError::BadResponse("missing durations table".to_string()))?;
    Ok(TravelMatrices {
        distances: densify(distances, expected)?,
        durations: densify(durations, expected)?,
    })
}

/// Maps unroutable (`null`) entries onto the unreachable sentinel so the
/// formulations never place a variable on them.
fn densify(
    table: Vec<Vec<Option<f64>>>,
    expected: usize,
) -> Result<Vec<Vec<f64>>, MatrixError> {
    if table.len() != expected || table.iter().any(|row| row.len() != expected) {
        return Err(MatrixError::BadResponse(format!(
            "expected a {}x{} table",
            expected, expected
        )));
    }
    Ok(table
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|entry| entry.unwrap_or(UNREACHABLE))
                .collect()
        })
        .collect())
}
