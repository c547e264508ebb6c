//! Start alignment check for two racing cars

use super::geometry::{distance_squared, heading_difference, relative_bearing};
use shared::CarStatus;

/// Maximum squared distance between the cars when strict line-up is off (30 units)
pub const RELAXED_DISTANCE_SQUARED: f32 = 900.0;
/// Maximum squared distance between the cars for a strict line-up (10 units)
pub const STRICT_DISTANCE_SQUARED: f32 = 100.0;
/// Maximum difference in heading between the cars, in degrees
pub const MAX_HEADING_DIFFERENCE: f32 = 5.0;

/// True when the bearing points to the side of the car rather than ahead or behind
pub fn is_beside(bearing: f32) -> bool {
    (75.0..=105.0).contains(&bearing) || (255.0..=285.0).contains(&bearing)
}

/// Decides whether two cars are lined up for a start.
///
/// Without `line_up_required` the cars only need to be close. Otherwise they
/// must be closer still, sit side by side from both cars' point of view and
/// face the same direction.
pub fn are_lined_up(challenger: &CarStatus, challenged: &CarStatus, line_up_required: bool) -> bool {
    let distance_squared = distance_squared(challenger, challenged);

    if !line_up_required {
        return distance_squared <= RELAXED_DISTANCE_SQUARED;
    }

    if distance_squared > STRICT_DISTANCE_SQUARED {
        return false;
    }

    if !is_beside(relative_bearing(challenger, challenged)) {
        return false;
    }

    if !is_beside(relative_bearing(challenged, challenger)) {
        return false;
    }

    let difference = heading_difference(challenger.rotation_angle(), challenged.rotation_angle());
    difference.abs() <= MAX_HEADING_DIFFERENCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Vector3;

    fn car_at(x: f32, z: f32, heading: f32) -> CarStatus {
        CarStatus::new(
            Vector3::new(x, 0.0, z),
            Vector3::ZERO,
            Vector3::new(heading.to_radians(), 0.0, 0.0),
        )
    }

    #[test]
    fn test_relaxed_only_checks_distance() {
        let challenger = car_at(0.0, 0.0, 0.0);

        assert!(are_lined_up(&challenger, &car_at(30.0, 0.0, 0.0), false));
        assert!(are_lined_up(&challenger, &car_at(0.0, 12.0, 170.0), false));
        assert!(!are_lined_up(&challenger, &car_at(30.0, 1.0, 0.0), false));
        assert!(!are_lined_up(&challenger, &car_at(0.0, 45.0, 0.0), false));
    }

    #[test]
    fn test_strict_side_by_side_at_max_distance() {
        let challenger = car_at(0.0, 0.0, 0.0);
        assert!(are_lined_up(&challenger, &car_at(10.0, 0.0, 0.0), true));
        assert!(are_lined_up(&challenger, &car_at(-10.0, 0.0, 0.0), true));
    }

    #[test]
    fn test_strict_rejects_beyond_distance() {
        let challenger = car_at(0.0, 0.0, 0.0);
        assert!(!are_lined_up(&challenger, &car_at(10.5, 0.0, 0.0), true));
        assert!(!are_lined_up(&challenger, &car_at(10.0, 1.0, 0.0), true));
    }

    #[test]
    fn test_strict_rejects_car_ahead() {
        let challenger = car_at(0.0, 0.0, 0.0);
        assert!(!are_lined_up(&challenger, &car_at(0.0, 8.0, 0.0), true));
        assert!(!are_lined_up(&challenger, &car_at(0.0, -8.0, 0.0), true));
    }

    #[test]
    fn test_strict_accepts_both_facing_backwards() {
        let challenger = car_at(0.0, 0.0, 180.0);
        assert!(are_lined_up(&challenger, &car_at(6.0, 0.0, 180.0), true));
    }

    #[test]
    fn test_strict_heading_difference() {
        let challenger = car_at(0.0, 0.0, 0.0);
        assert!(are_lined_up(&challenger, &car_at(6.0, 0.0, 3.0), true));
        assert!(are_lined_up(&challenger, &car_at(6.0, 0.0, 357.0), true));
        assert!(!are_lined_up(&challenger, &car_at(6.0, 0.0, 8.0), true));
        assert!(!are_lined_up(&challenger, &car_at(6.0, 0.0, 352.0), true));
    }

    #[test]
    fn test_strict_challenged_bearing_alone_fails() {
        // Challenger sees the opponent at 104 degrees, the opponent sees it at 288
        let challenger = car_at(0.0, 0.0, 14.0);
        let challenged = car_at(6.0, 0.0, 18.0);
        assert!(!are_lined_up(&challenger, &challenged, true));
    }

    #[test]
    fn test_strict_challenger_bearing_alone_fails() {
        let challenger = car_at(0.0, 0.0, 18.0);
        let challenged = car_at(6.0, 0.0, 14.0);
        assert!(!are_lined_up(&challenger, &challenged, true));
    }

    #[test]
    fn test_side_window_boundaries() {
        for bearing in [75.0, 90.0, 105.0, 255.0, 270.0, 285.0] {
            assert!(is_beside(bearing), "{} should be beside", bearing);
        }
        for bearing in [0.0, 74.9, 105.1, 180.0, 254.9, 285.1, 359.9] {
            assert!(!is_beside(bearing), "{} should not be beside", bearing);
        }
    }

    #[test]
    fn test_heading_difference_boundaries() {
        assert!(heading_difference(5.0, 0.0).abs() <= MAX_HEADING_DIFFERENCE);
        assert!(heading_difference(0.0, 5.0).abs() <= MAX_HEADING_DIFFERENCE);
        assert!(heading_difference(5.5, 0.0).abs() > MAX_HEADING_DIFFERENCE);
        assert!(heading_difference(0.0, 5.5).abs() > MAX_HEADING_DIFFERENCE);
    }
}
