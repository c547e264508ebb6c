//! Angle and distance helpers shared by line-up and leadership checks
//!
//! All angles are in degrees. A bearing of 0 points along +z, and bearings
//! grow towards +x.

use shared::{CarStatus, Vector3};

/// Bearing from `from` towards `to`, expressed in the frame of a car at
/// `from` whose heading is `heading`. The result lies in [0, 360).
pub fn bearing(from: Vector3, to: Vector3, heading: f32) -> f32 {
    let mut angle = (to.x - from.x).atan2(to.z - from.z).to_degrees();
    if angle < 0.0 {
        angle += 360.0;
    }

    (angle + heading).rem_euclid(360.0)
}

/// Bearing from one car towards another in the first car's heading frame
pub fn relative_bearing(from: &CarStatus, to: &CarStatus) -> f32 {
    bearing(from.position, to.position, from.rotation_angle())
}

/// Signed difference between two headings, normalized into [-180, 180)
pub fn heading_difference(a: f32, b: f32) -> f32 {
    (a - b + 180.0 + 360.0).rem_euclid(360.0) - 180.0
}

pub fn distance_squared(a: &CarStatus, b: &CarStatus) -> f32 {
    a.position.distance_squared(&b.position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = Vector3::ZERO;
        assert_eq!(bearing(origin, Vector3::new(0.0, 0.0, 10.0), 0.0), 0.0);
        assert_eq!(bearing(origin, Vector3::new(10.0, 0.0, 0.0), 0.0), 90.0);
        assert_eq!(bearing(origin, Vector3::new(0.0, 0.0, -10.0), 0.0), 180.0);
        assert_eq!(bearing(origin, Vector3::new(-10.0, 0.0, 0.0), 0.0), 270.0);
    }

    #[test]
    fn test_bearing_ignores_height() {
        let origin = Vector3::ZERO;
        assert_eq!(bearing(origin, Vector3::new(10.0, 50.0, 0.0), 0.0), 90.0);
    }

    #[test]
    fn test_bearing_adds_heading() {
        let origin = Vector3::ZERO;
        let right = Vector3::new(10.0, 0.0, 0.0);

        assert_eq!(bearing(origin, right, 45.0), 135.0);
        assert_eq!(bearing(origin, right, 300.0), 30.0);
        assert_eq!(bearing(origin, right, 270.0), 0.0);
    }

    #[test]
    fn test_bearing_diagonal() {
        let angle = bearing(Vector3::ZERO, Vector3::new(5.0, 0.0, 5.0), 0.0);
        assert_approx_eq!(angle, 45.0, 0.001);
    }

    #[test]
    fn test_heading_difference_wraps() {
        assert_eq!(heading_difference(5.0, 0.0), 5.0);
        assert_eq!(heading_difference(0.0, 5.0), -5.0);
        assert_eq!(heading_difference(2.0, 358.0), 4.0);
        assert_eq!(heading_difference(358.0, 2.0), -4.0);
        assert_eq!(heading_difference(90.0, 270.0), -180.0);
    }

    #[test]
    fn test_relative_bearing_uses_rotation() {
        let mut from = CarStatus::default();
        from.rotation.x = std::f32::consts::PI;
        let mut to = CarStatus::default();
        to.position = Vector3::new(0.0, 0.0, 20.0);

        assert_approx_eq!(relative_bearing(&from, &to), 180.0, 0.001);
    }

    #[test]
    fn test_distance_squared() {
        let a = CarStatus::default();
        let mut b = CarStatus::default();
        b.position = Vector3::new(6.0, 0.0, 8.0);

        assert_eq!(distance_squared(&a, &b), 100.0);
    }
}
