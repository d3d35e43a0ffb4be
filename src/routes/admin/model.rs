use serde::{Deserialize, Serialize};

use crate::ai::{FragmentError, LocationEnhancement};
use crate::models::Location;

#[derive(Debug, Serialize, Deserialize)]
pub struct EnhanceLocationResponse {
    pub location: Location,
    pub enhancement: LocationEnhancement,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnhanceAllResponse {
    pub enhanced: Vec<String>,
    pub failed: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fragment_errors: Vec<FragmentError>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateCoordinatesRequest {
    pub lat: f64,
    pub lng: f64,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateJobResponse {
    pub job_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunJobsResponse {
    pub processed: usize,
}
