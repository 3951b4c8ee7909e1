use crate::stops::StopSet;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Stop name reported when nothing can be matched.
pub const UNKNOWN_STOP: &str = "Unknown";

/// `(latitude, longitude)` in degrees.
pub type Coords = (f64, f64);

// Calculate haversine distance between two GPS coordinates (returns meters)
pub fn distance_meters(from: Coords, to: Coords) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push `a` marginally above 1 for antipodal points.
    let c = 2.0 * a.min(1.0).sqrt().asin();
    EARTH_RADIUS_METERS * c
}

/// Name of the stop closest to the given point, scanning every line in order.
///
/// The first stop wins on ties. Returns [`UNKNOWN_STOP`] for an empty stop set.
pub fn nearest_stop(latitude: f64, longitude: f64, stops: &StopSet) -> &str {
    let mut best: Option<(&str, f64)> = None;
    for stop in stops.iter() {
        let distance = distance_meters((latitude, longitude), stop.coords);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((stop.name.as_str(), distance)),
        }
    }
    best.map_or(UNKNOWN_STOP, |(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stops::{Line, Stop};

    const POINTS: [Coords; 6] = [
        (14.634644, 121.075036),
        (14.646273, 121.080724),
        (0.0, 0.0),
        (-33.8688, 151.2093),
        (89.9999, -179.9999),
        (-90.0, 180.0),
    ];

    #[test]
    fn distance_to_self_is_zero() {
        for point in POINTS {
            assert_eq!(distance_meters(point, point), 0.0, "{point:?}");
        }
    }

    #[test]
    fn distance_is_symmetric_and_non_negative() {
        for from in POINTS {
            for to in POINTS {
                let forward = distance_meters(from, to);
                let backward = distance_meters(to, from);
                assert!(forward >= 0.0);
                assert!((forward - backward).abs() < 1e-6, "{from:?} {to:?}");
            }
        }
    }

    #[test]
    fn one_degree_of_latitude() {
        let distance = distance_meters((0.0, 0.0), (1.0, 0.0));
        assert!((distance - 111_194.93).abs() < 0.01, "{distance}");
    }

    #[test]
    fn campus_gates_are_a_few_hundred_meters_apart() {
        let distance = distance_meters((14.634644, 121.075036), (14.637709, 121.076327));
        assert!((360.0..376.0).contains(&distance), "{distance}");
    }

    #[test]
    fn antipodal_points_do_not_produce_nan() {
        let distance = distance_meters((0.0, 0.0), (0.0, 180.0));
        assert!((distance - std::f64::consts::PI * EARTH_RADIUS_METERS).abs() < 1.0);
    }

    #[test]
    fn nearest_stop_on_top_of_a_stop() {
        let stops = StopSet::default();
        assert_eq!(nearest_stop(14.640081, 121.078496, &stops), "Xavier Hall E-Jeep Station");
        assert_eq!(nearest_stop(14.646273, 121.080724, &stops), "Ateneo Senior High School FLC E-Jeep Station");
    }

    #[test]
    fn nearest_stop_is_always_a_member_of_the_set() {
        let stops = StopSet::default();
        for lat_step in 0..10 {
            for lon_step in 0..10 {
                let latitude = 14.60 + f64::from(lat_step) * 0.01;
                let longitude = 121.05 + f64::from(lon_step) * 0.01;
                let name = nearest_stop(latitude, longitude, &stops);
                assert!(stops.iter().any(|stop| stop.name == name), "{name}");
            }
        }
    }

    #[test]
    fn nearest_stop_of_empty_set_is_unknown() {
        assert_eq!(nearest_stop(14.64, 121.08, &StopSet::new(Vec::new())), UNKNOWN_STOP);
        let hollow = StopSet::new(vec![Line { name: "lineA".into(), stops: Vec::new() }]);
        assert_eq!(nearest_stop(14.64, 121.08, &hollow), UNKNOWN_STOP);
    }

    #[test]
    fn first_stop_wins_a_tie() {
        let stop = |name: &str| Stop { name: name.into(), coords: (1.0, 1.0) };
        let stops = StopSet::new(vec![
            Line { name: "lineA".into(), stops: vec![stop("first")] },
            Line { name: "lineB".into(), stops: vec![stop("second")] },
        ]);
        assert_eq!(nearest_stop(0.0, 0.0, &stops), "first");
    }
}
