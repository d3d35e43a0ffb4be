use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 地球平均半径（米）
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// 默认签到半径（米）
pub const DEFAULT_CHECK_IN_RADIUS: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn validate(&self) -> Result<(), CoordinateError> {
        // NaN 不满足区间判断，会在这里被拒绝
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(CoordinateError::Latitude(self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(CoordinateError::Longitude(self.lng));
        }
        Ok(())
    }
}

/// 使用 Haversine 公式计算两点间的球面距离（米）
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_phi = (b.lat - a.lat).to_radians();
    let delta_lambda = (b.lng - a.lng).to_radians();

    let hav = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    // 浮点误差可能让 hav 略大于 1
    let hav = hav.clamp(0.0, 1.0);
    let c = 2.0 * hav.sqrt().atan2((1.0 - hav).sqrt());

    EARTH_RADIUS_METERS * c
}

/// 边界值（距离等于半径）视为在范围内
pub fn is_within_radius(user: Coordinate, target: Coordinate, radius_meters: f64) -> bool {
    distance_meters(user, target) <= radius_meters
}

/// 地理围栏判断结果，用户位置可能未知
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eligibility {
    PositionUnavailable,
    InRange { distance: f64 },
    OutOfRange { distance: f64 },
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::InRange { .. })
    }

    pub fn distance(&self) -> Option<f64> {
        match self {
            Eligibility::PositionUnavailable => None,
            Eligibility::InRange { distance } | Eligibility::OutOfRange { distance } => {
                Some(*distance)
            }
        }
    }
}

/// 没有定位时直接返回不可签到，不计算距离
pub fn eligibility(user: Option<Coordinate>, target: Coordinate, radius_meters: f64) -> Eligibility {
    let Some(user) = user else {
        return Eligibility::PositionUnavailable;
    };
    let distance = distance_meters(user, target);
    if distance <= radius_meters {
        Eligibility::InRange { distance }
    } else {
        Eligibility::OutOfRange { distance }
    }
}

pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.round() as i64)
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}

/// 设备上报的一次定位
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub coordinates: Coordinate,
    /// 精度（米）
    pub accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum PositionError {
    #[error("Location access denied. Please allow location access in your settings.")]
    PermissionDenied,
    #[error("Location unavailable. Check that GPS is turned on.")]
    PositionUnavailable,
    #[error("Timed out while getting your location.")]
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PositionState {
    #[default]
    Pending,
    Fix(PositionFix),
    Error(PositionError),
}

impl PositionState {
    pub fn coordinates(&self) -> Option<Coordinate> {
        match self {
            PositionState::Fix(fix) => Some(fix.coordinates),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tolerance: f64) {
        assert!((a - b).abs() <= tolerance, "{a} vs {b}");
    }

    #[test]
    fn distance_to_self_is_zero() {
        for c in [
            Coordinate::new(-14.0642, -41.3025),
            Coordinate::new(90.0, 0.0),
            Coordinate::new(-90.0, 180.0),
            Coordinate::new(0.0, -180.0),
        ] {
            assert_eq!(distance_meters(c, c), 0.0);
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (Coordinate::new(-15.7942, -47.8822), Coordinate::new(-15.8050, -47.8850)),
            (Coordinate::new(51.5, -0.12), Coordinate::new(40.71, -74.0)),
            (Coordinate::new(-33.9, 151.2), Coordinate::new(35.7, 139.7)),
        ];
        for (a, b) in pairs {
            let ab = distance_meters(a, b);
            let ba = distance_meters(b, a);
            assert!((ab - ba).abs() <= ab * 1e-6);
        }
    }

    #[test]
    fn one_hundred_meters_of_latitude() {
        let a = Coordinate::new(-14.0642, -41.3025);
        let b = Coordinate::new(-14.0642 + 0.0009, -41.3025);
        let d = distance_meters(a, b);
        assert!((95.0..=105.0).contains(&d), "{d}");
    }

    #[test]
    fn antimeridian_is_short_hop() {
        let a = Coordinate::new(0.0, 179.9995);
        let b = Coordinate::new(0.0, -179.9995);
        // 跨越日期变更线只有约 111 米
        assert_close(distance_meters(a, b), 111.2, 1.0);
    }

    #[test]
    fn poles_and_antipodes_stay_finite() {
        let north = Coordinate::new(90.0, 0.0);
        let south = Coordinate::new(-90.0, 0.0);
        let d = distance_meters(north, south);
        assert!(d.is_finite());
        assert_close(d, std::f64::consts::PI * EARTH_RADIUS_METERS, 1.0);

        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 180.0);
        assert!(distance_meters(a, b).is_finite());
        // 极点附近经度无意义
        assert_close(distance_meters(north, Coordinate::new(90.0, 123.0)), 0.0, 1e-6);
    }

    #[test]
    fn within_radius_of_self() {
        let p = Coordinate::new(-14.0642, -41.3025);
        for r in [0.0, 1.0, 50.0, 10_000.0] {
            assert!(is_within_radius(p, p, r));
        }
    }

    #[test]
    fn radius_boundary_is_inclusive() {
        let a = Coordinate::new(-15.7942, -47.8822);
        let b = Coordinate::new(-15.7950, -47.8830);
        let d = distance_meters(a, b);
        assert!(is_within_radius(a, b, d));
        assert!(!is_within_radius(a, b, d - 1e-6));
        assert!(!is_within_radius(a, b, d * (1.0 - 1e-9)));
    }

    #[test]
    fn missing_position_is_not_eligible() {
        let target = Coordinate::new(-14.0642, -41.3025);
        let result = eligibility(None, target, 50.0);
        assert_eq!(result, Eligibility::PositionUnavailable);
        assert!(!result.is_eligible());
        assert_eq!(result.distance(), None);
    }

    #[test]
    fn eligibility_reports_distance() {
        let target = Coordinate::new(-14.2000, -41.5000);
        let user = Coordinate::new(-14.0642, -41.3025);
        match eligibility(Some(user), target, 50.0) {
            Eligibility::OutOfRange { distance } => assert!(distance > 20_000.0),
            other => panic!("unexpected {other:?}"),
        }
        assert!(eligibility(Some(target), target, 50.0).is_eligible());
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(Coordinate::new(-14.0, -41.0).validate().is_ok());
        assert_eq!(
            Coordinate::new(91.0, 0.0).validate(),
            Err(CoordinateError::Latitude(91.0))
        );
        assert_eq!(
            Coordinate::new(0.0, -180.5).validate(),
            Err(CoordinateError::Longitude(-180.5))
        );
        assert!(Coordinate::new(f64::NAN, 0.0).validate().is_err());
    }

    #[test]
    fn formats_distance() {
        assert_eq!(format_distance(42.4), "42m");
        assert_eq!(format_distance(999.4), "999m");
        assert_eq!(format_distance(1234.0), "1.2km");
        assert_eq!(format_distance(25_000.0), "25.0km");
    }
}
