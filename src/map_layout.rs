use std::collections::HashMap;
use std::f64::consts::PI;

use crate::data::MapBounds;

pub const TILE_SIZE: f64 = 256.0;
pub const CLUSTER_CELL_PX: f64 = 50.0;
pub const FIT_PADDING_PX: f64 = 50.0;
pub const FIT_MAX_ZOOM: f64 = 4.0;
pub const REFIT_CHANGE_RATIO: f64 = 0.3;

const MAX_LATITUDE: f64 = 85.051_128_78;

/// World pixel coordinates of a location at `zoom`.
pub fn project(latitude: f64, longitude: f64, zoom: f64) -> (f64, f64) {
    let scale = TILE_SIZE * 2f64.powf(zoom);
    let lat = latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (longitude + 180.0) / 360.0 * scale;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * scale;
    (x, y)
}

pub fn unproject(x: f64, y: f64, zoom: f64) -> (f64, f64) {
    let scale = TILE_SIZE * 2f64.powf(zoom);
    let longitude = x / scale * 360.0 - 180.0;
    let n = PI * (1.0 - 2.0 * y / scale);
    let latitude = n.sinh().atan().to_degrees();
    (latitude, longitude)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Indices into the clustered slice, in input order.
    pub members: Vec<usize>,
    pub latitude: f64,
    pub longitude: f64,
    pub bounds: MapBounds,
}

impl Cluster {
    pub fn is_single(&self) -> bool {
        self.members.len() == 1
    }
}

/// Greedy grid clustering: every point joins the cell it projects into.
/// Clusters come out in order of their first member.
pub fn cluster_points(points: &[(f64, f64)], zoom: f64, cell_px: f64) -> Vec<Cluster> {
    let mut cells: HashMap<(i64, i64), usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for (index, &(lat, lng)) in points.iter().enumerate() {
        let (x, y) = project(lat, lng, zoom);
        let cell = ((x / cell_px).floor() as i64, (y / cell_px).floor() as i64);
        match cells.get(&cell) {
            Some(&group) => groups[group].push(index),
            None => {
                cells.insert(cell, groups.len());
                groups.push(vec![index]);
            }
        }
    }

    groups
        .into_iter()
        .filter_map(|members| {
            let located: Vec<(f64, f64)> = members.iter().map(|&i| points[i]).collect();
            let bounds = bounds_of(&located)?;
            let count = located.len() as f64;
            let latitude = located.iter().map(|p| p.0).sum::<f64>() / count;
            let longitude = located.iter().map(|p| p.1).sum::<f64>() / count;
            Some(Cluster { members, latitude, longitude, bounds })
        })
        .collect()
}

pub fn bounds_of(points: &[(f64, f64)]) -> Option<MapBounds> {
    let (&(lat, lng), rest) = points.split_first()?;
    let mut bounds = MapBounds { north: lat, south: lat, east: lng, west: lng };
    for &(lat, lng) in rest {
        bounds.north = bounds.north.max(lat);
        bounds.south = bounds.south.min(lat);
        bounds.east = bounds.east.max(lng);
        bounds.west = bounds.west.min(lng);
    }
    Some(bounds)
}

/// Marker radius in pixels: 4 for year 1000 and earlier, 12 from 2000 on.
pub fn marker_radius(year: i32) -> f64 {
    let t = ((year as f64 - 1000.0) / 1000.0).clamp(0.0, 1.0);
    4.0 + t * 8.0
}

/// Centre and zoom showing `bounds` inside a `width` x `height` widget.
pub fn fit_camera(bounds: &MapBounds, width: f64, height: f64) -> (f64, f64, f64) {
    let (left, top) = project(bounds.north, bounds.west, 0.0);
    let (right, bottom) = project(bounds.south, bounds.east, 0.0);
    let span_x = (right - left).abs();
    let span_y = (bottom - top).abs();

    let usable_w = (width - 2.0 * FIT_PADDING_PX).max(1.0);
    let usable_h = (height - 2.0 * FIT_PADDING_PX).max(1.0);

    let zoom = if span_x <= f64::EPSILON && span_y <= f64::EPSILON {
        FIT_MAX_ZOOM
    } else {
        let scale_x = if span_x > f64::EPSILON { usable_w / span_x } else { f64::INFINITY };
        let scale_y = if span_y > f64::EPSILON { usable_h / span_y } else { f64::INFINITY };
        scale_x.min(scale_y).log2().clamp(0.0, FIT_MAX_ZOOM)
    };

    let (latitude, longitude) = unproject((left + right) / 2.0, (top + bottom) / 2.0, 0.0);
    (latitude, longitude, zoom)
}

/// Decides when a new marker set should move the camera.
#[derive(Debug, Default, Clone)]
pub struct FitPolicy {
    fitted_count: Option<usize>,
    user_interacted: bool,
}

impl FitPolicy {
    pub fn should_fit(&self, count: usize) -> bool {
        if self.user_interacted || count == 0 {
            return false;
        }
        match self.fitted_count {
            None | Some(0) => true,
            Some(previous) => {
                let change = (count as f64 - previous as f64).abs() / previous as f64;
                change > REFIT_CHANGE_RATIO
            }
        }
    }

    pub fn record_fit(&mut self, count: usize) {
        self.fitted_count = Some(count);
    }

    pub fn mark_user_interaction(&mut self) {
        self.user_interacted = true;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn projection_inverts() {
        for &(lat, lng) in &[(51.5074, -0.1278), (-33.8688, 151.2093), (0.0, 0.0)] {
            let (x, y) = project(lat, lng, 3.0);
            let (back_lat, back_lng) = unproject(x, y, 3.0);
            assert!(close(lat, back_lat) && close(lng, back_lng));
        }
        assert_eq!(project(0.0, 0.0, 0.0), (128.0, 128.0));
    }

    #[test]
    fn nearby_points_cluster_at_low_zoom_only() {
        // London, Paris, Tokyo.
        let points = [(51.5074, -0.1278), (48.8566, 2.3522), (35.6762, 139.6503)];

        let far = cluster_points(&points, 1.0, CLUSTER_CELL_PX);
        assert_eq!(far.len(), 2);
        assert_eq!(far[0].members, vec![0, 1]);
        assert!(far[1].is_single());
        assert_eq!(far[0].bounds.north, 51.5074);
        assert_eq!(far[0].bounds.west, -0.1278);

        let near = cluster_points(&points, 8.0, CLUSTER_CELL_PX);
        assert_eq!(near.len(), 3);
        assert!(near.iter().all(Cluster::is_single));
    }

    #[test]
    fn every_point_lands_in_exactly_one_cluster() {
        let points: Vec<(f64, f64)> = (0..40)
            .map(|i| (-60.0 + i as f64 * 3.0, -170.0 + i as f64 * 8.5))
            .collect();
        let clusters = cluster_points(&points, 2.0, CLUSTER_CELL_PX);

        let mut seen: Vec<usize> = clusters.iter().flat_map(|c| c.members.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..40).collect::<Vec<_>>());
    }

    #[test]
    fn marker_radius_is_bounded() {
        assert_eq!(marker_radius(-500), 4.0);
        assert_eq!(marker_radius(1000), 4.0);
        assert_eq!(marker_radius(1500), 8.0);
        assert_eq!(marker_radius(2000), 12.0);
        assert_eq!(marker_radius(2024), 12.0);
    }

    #[test]
    fn single_location_fits_at_max_zoom() {
        let bounds = MapBounds { north: 10.0, south: 10.0, east: 20.0, west: 20.0 };
        let (lat, lng, zoom) = fit_camera(&bounds, 800.0, 600.0);
        assert!(close(lat, 10.0) && close(lng, 20.0));
        assert_eq!(zoom, FIT_MAX_ZOOM);
    }

    #[test]
    fn world_spanning_bounds_fit_zoomed_out() {
        let bounds = MapBounds { north: 60.0, south: -40.0, east: 150.0, west: -120.0 };
        let (_, lng, zoom) = fit_camera(&bounds, 800.0, 600.0);
        assert!(zoom >= 0.0 && zoom < 2.0);
        assert!(close(lng, 15.0));

        // The padded box must hold the projected extent at that zoom.
        let (x1, y1) = project(bounds.north, bounds.west, zoom);
        let (x2, y2) = project(bounds.south, bounds.east, zoom);
        assert!(x2 - x1 <= 800.0 - 2.0 * FIT_PADDING_PX + 1e-6);
        assert!(y2 - y1 <= 600.0 - 2.0 * FIT_PADDING_PX + 1e-6);
    }

    #[test]
    fn fit_policy_refits_on_large_changes() {
        let mut policy = FitPolicy::default();
        assert!(!policy.should_fit(0));
        assert!(policy.should_fit(100));
        policy.record_fit(100);

        assert!(!policy.should_fit(120));
        assert!(policy.should_fit(131));
        assert!(policy.should_fit(60));
    }

    #[test]
    fn fit_policy_yields_to_the_user() {
        let mut policy = FitPolicy::default();
        policy.mark_user_interaction();
        assert!(!policy.should_fit(100));

        policy.reset();
        assert!(policy.should_fit(100));
    }
}
