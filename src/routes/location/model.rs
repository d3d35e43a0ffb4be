use serde::Deserialize;

use crate::error::AppError;
use crate::geo::Coordinate;

#[derive(Debug, Default, Deserialize)]
pub struct LocationQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// 只返回该距离（米）以内的地点
    pub within: Option<f64>,
}

impl LocationQuery {
    pub fn position(&self) -> Result<Option<Coordinate>, AppError> {
        match (self.lat, self.lng) {
            (None, None) => Ok(None),
            (Some(lat), Some(lng)) => {
                let position = Coordinate::new(lat, lng);
                position
                    .validate()
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                Ok(Some(position))
            }
            _ => Err(AppError::Validation(
                "lat and lng must be given together".to_string(),
            )),
        }
    }
}
