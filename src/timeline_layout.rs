use std::collections::HashMap;

use crate::data::AsEvent;

pub const MARGIN_LEFT: f64 = 50.0;
pub const MARGIN_RIGHT: f64 = 50.0;
pub const MARGIN_TOP: f64 = 100.0;
pub const MARGIN_BOTTOM: f64 = 100.0;
pub const DOMAIN_PADDING_YEARS: f64 = 50.0;
pub const MIN_SCALE: f64 = 0.5;
pub const MAX_SCALE: f64 = 10.0;
pub const NODE_RADIUS: f64 = 8.0;
pub const STACK_BASE: f64 = 60.0;
pub const STACK_STEP: f64 = 40.0;
pub const TICK_TARGET: usize = 20;
pub const SLIDER_MAX: f64 = 100.0;

/// Linear map from years onto `0..=width`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeScale {
    pub start: f64,
    pub end: f64,
    pub width: f64,
}

impl TimeScale {
    pub fn for_years(min_year: i32, max_year: i32, width: f64) -> Self {
        Self {
            start: min_year as f64 - DOMAIN_PADDING_YEARS,
            end: max_year as f64 + DOMAIN_PADDING_YEARS,
            width,
        }
    }

    pub fn x(&self, year: f64) -> f64 {
        (year - self.start) / (self.end - self.start) * self.width
    }

    pub fn year_at(&self, x: f64) -> f64 {
        self.start + x / self.width * (self.end - self.start)
    }
}

pub struct Era {
    pub label: &'static str,
    pub start: f64,
    pub end: f64,
}

pub const ERAS: [Era; 6] = [
    Era { label: "Ancient", start: f64::NEG_INFINITY, end: 1000.0 },
    Era { label: "Medieval", start: 1000.0, end: 1500.0 },
    Era { label: "Early Modern", start: 1500.0, end: 1800.0 },
    Era { label: "Industrial", start: 1800.0, end: 1900.0 },
    Era { label: "20th Century", start: 1900.0, end: 2000.0 },
    Era { label: "21st Century", start: 2000.0, end: f64::INFINITY },
];

#[derive(Debug, Clone, PartialEq)]
pub struct EraBand {
    pub label: &'static str,
    pub x0: f64,
    pub x1: f64,
    pub label_x: f64,
    /// Alternates between the two band tints.
    pub tinted: bool,
}

/// Eras overlapping `min_year..=max_year`, clipped to the padded domain.
pub fn era_bands(scale: &TimeScale, min_year: i32, max_year: i32) -> Vec<EraBand> {
    let (min, max) = (min_year as f64, max_year as f64);
    ERAS.iter()
        .enumerate()
        .filter(|(_, era)| era.end >= min && era.start <= max)
        .map(|(i, era)| EraBand {
            label: era.label,
            x0: scale.x(era.start.max(scale.start)),
            x1: scale.x(era.end.min(scale.end)),
            label_x: scale.x((era.start.max(min) + era.end.min(max)) / 2.0),
            tinted: i % 2 == 0,
        })
        .collect()
}

/// Round tick values covering `start..=end`, roughly `count` of them, with
/// steps of 1, 2 or 5 times a power of ten.
pub fn nice_ticks(start: f64, end: f64, count: usize) -> Vec<f64> {
    if !(end > start) || count == 0 {
        return Vec::new();
    }

    let raw = (end - start) / count as f64;
    let power = 10f64.powf(raw.log10().floor());
    let error = raw / power;
    let factor = if error >= 50f64.sqrt() {
        10.0
    } else if error >= 10f64.sqrt() {
        5.0
    } else if error >= 2f64.sqrt() {
        2.0
    } else {
        1.0
    };
    let step = factor * power;

    let first = (start / step).ceil() as i64;
    let last = (end / step).floor() as i64;
    (first..=last).map(|i| i as f64 * step).collect()
}

/// Vertical offset of the `index`-th event sharing a year: even indices
/// above the axis, odd below, each pair further out.
pub fn stack_offset(axis_y: f64, index: usize) -> f64 {
    let pair = (index / 2) as f64;
    if index % 2 == 0 {
        axis_y - STACK_BASE - pair * STACK_STEP
    } else {
        axis_y + STACK_BASE + pair * STACK_STEP
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    /// Index into the laid-out slice.
    pub index: usize,
    /// Data space: offsets from the top-left margin at zoom 1. Only x is
    /// transformed.
    pub x: f64,
    pub y: f64,
}

pub struct TimelineLayout {
    pub scale: TimeScale,
    pub axis_y: f64,
    pub plot_height: f64,
    pub bands: Vec<EraBand>,
    pub ticks: Vec<f64>,
    pub nodes: Vec<Node>,
}

impl TimelineLayout {
    /// `None` for an empty slice or a widget with no room to draw.
    pub fn compute<E: AsEvent>(events: &[E], width: f64, height: f64) -> Option<Self> {
        let plot_width = width - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_height = height - MARGIN_TOP - MARGIN_BOTTOM;
        if plot_width <= 0.0 || plot_height <= 0.0 {
            return None;
        }

        let min_year = events.iter().map(|e| e.event().year).min()?;
        let max_year = events.iter().map(|e| e.event().year).max()?;
        let scale = TimeScale::for_years(min_year, max_year, plot_width);
        let axis_y = plot_height / 2.0;

        let mut per_year: HashMap<i32, usize> = HashMap::new();
        let nodes = events
            .iter()
            .enumerate()
            .map(|(index, e)| {
                let year = e.event().year;
                let slot = per_year.entry(year).or_insert(0);
                let y = stack_offset(axis_y, *slot);
                *slot += 1;
                Node { index, x: scale.x(year as f64), y }
            })
            .collect();

        Some(Self {
            bands: era_bands(&scale, min_year, max_year),
            ticks: nice_ticks(scale.start, scale.end, TICK_TARGET),
            scale,
            axis_y,
            plot_height,
            nodes,
        })
    }

    /// Closest node within `NODE_RADIUS` screen pixels of the pointer.
    pub fn hit_test(&self, transform: &ViewTransform, screen_x: f64, screen_y: f64) -> Option<usize> {
        let data_x = transform.to_data_x(screen_x);
        let data_y = screen_y - MARGIN_TOP;

        self.nodes
            .iter()
            .map(|node| {
                let dx = (node.x - data_x) * transform.k;
                let dy = node.y - data_y;
                (node.index, (dx * dx + dy * dy).sqrt())
            })
            .filter(|&(_, distance)| distance <= NODE_RADIUS)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }

    pub fn slider_to_year(&self, position: f64) -> f64 {
        let t = position.clamp(0.0, SLIDER_MAX) / SLIDER_MAX;
        self.scale.start + t * (self.scale.end - self.scale.start)
    }

    pub fn year_to_slider(&self, year: f64) -> f64 {
        let t = (year - self.scale.start) / (self.scale.end - self.scale.start);
        (t * SLIDER_MAX).clamp(0.0, SLIDER_MAX)
    }

    /// Pans so `year` sits in the middle of a `view_width` wide widget.
    pub fn center_on(&self, transform: &mut ViewTransform, year: f64, view_width: f64) {
        transform.tx = view_width / 2.0 - MARGIN_LEFT - transform.k * self.scale.x(year);
    }

    pub fn centered_year(&self, transform: &ViewTransform, view_width: f64) -> f64 {
        self.scale.year_at(transform.to_data_x(view_width / 2.0))
    }
}

/// Horizontal pan and zoom: `screen_x = MARGIN_LEFT + tx + k * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub tx: f64,
    pub k: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self { tx: 0.0, k: 1.0 }
    }
}

impl ViewTransform {
    pub fn to_screen_x(&self, x: f64) -> f64 {
        MARGIN_LEFT + self.tx + self.k * x
    }

    pub fn to_data_x(&self, screen_x: f64) -> f64 {
        (screen_x - MARGIN_LEFT - self.tx) / self.k
    }

    pub fn pan(&mut self, dx: f64) {
        self.tx += dx;
    }

    /// Scales by `factor`, keeping the point under `screen_x` in place.
    pub fn zoom_at(&mut self, screen_x: f64, factor: f64) {
        let anchor = self.to_data_x(screen_x);
        self.k = (self.k * factor).clamp(MIN_SCALE, MAX_SCALE);
        self.tx = screen_x - MARGIN_LEFT - self.k * anchor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Category, HistoricalEvent};

    fn event(year: i32, title: &str) -> HistoricalEvent {
        HistoricalEvent {
            year,
            title: title.to_string(),
            description: String::new(),
            category: Category::General,
            url: String::new(),
            month: None,
            day: None,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn domain_is_padded_by_fifty_years() {
        let scale = TimeScale::for_years(1800, 1900, 1000.0);
        assert_eq!(scale.x(1750.0), 0.0);
        assert_eq!(scale.x(1950.0), 1000.0);
        assert_eq!(scale.x(1850.0), 500.0);
        assert!(close(scale.year_at(250.0), 1800.0));
    }

    #[test]
    fn same_year_events_alternate_outward() {
        let events: Vec<HistoricalEvent> = (0..4).map(|i| event(1900, &format!("e{}", i))).collect();
        let layout = TimelineLayout::compute(&events, 1100.0, 600.0).unwrap();
        let axis = layout.axis_y;
        assert_eq!(axis, 200.0);

        let ys: Vec<f64> = layout.nodes.iter().map(|n| n.y).collect();
        assert_eq!(ys, vec![axis - 60.0, axis + 60.0, axis - 100.0, axis + 100.0]);
        assert!(layout.nodes.iter().all(|n| n.x == layout.nodes[0].x));
    }

    #[test]
    fn stacking_counts_per_year() {
        let events = vec![event(1900, "a"), event(1950, "b"), event(1900, "c")];
        let layout = TimelineLayout::compute(&events, 1100.0, 600.0).unwrap();
        assert_eq!(layout.nodes[1].y, layout.axis_y - 60.0);
        assert_eq!(layout.nodes[2].y, layout.axis_y + 60.0);
    }

    #[test]
    fn empty_or_cramped_input_has_no_layout() {
        let none: Vec<HistoricalEvent> = Vec::new();
        assert!(TimelineLayout::compute(&none, 800.0, 600.0).is_none());
        assert!(TimelineLayout::compute(&[event(1900, "a")], 90.0, 600.0).is_none());
        assert!(TimelineLayout::compute(&[event(1900, "a")], 800.0, 150.0).is_none());
    }

    #[test]
    fn eras_are_clipped_to_the_domain() {
        let scale = TimeScale::for_years(1450, 1850, 1000.0);
        let bands = era_bands(&scale, 1450, 1850);
        let labels: Vec<&str> = bands.iter().map(|b| b.label).collect();
        assert_eq!(labels, vec!["Medieval", "Early Modern", "Industrial"]);

        assert_eq!(bands[0].x0, 0.0);
        assert_eq!(bands[2].x1, 1000.0);
        assert!(close(bands[1].x0, scale.x(1500.0)));
        assert!(bands[0].tinted != bands[1].tinted);
        // Label centred on the data part of the era.
        assert!(close(bands[0].label_x, scale.x(1475.0)));
    }

    #[test]
    fn ticks_use_round_steps() {
        assert_eq!(nice_ticks(0.0, 100.0, 10), (0..=10).map(|i| i as f64 * 10.0).collect::<Vec<_>>());

        let ticks = nice_ticks(950.0, 2074.0, TICK_TARGET);
        assert_eq!(ticks.first(), Some(&950.0));
        assert_eq!(ticks.last(), Some(&2050.0));
        assert!(ticks.windows(2).all(|w| close(w[1] - w[0], 50.0)));

        assert!(nice_ticks(5.0, 5.0, 20).is_empty());
    }

    #[test]
    fn transform_inverts() {
        let transform = ViewTransform { tx: -120.0, k: 2.5 };
        for x in [0.0, 17.5, 640.0] {
            assert!(close(transform.to_data_x(transform.to_screen_x(x)), x));
        }
    }

    #[test]
    fn zoom_is_clamped_and_keeps_the_pointer_anchored() {
        let mut transform = ViewTransform::default();
        let anchor = transform.to_data_x(400.0);

        transform.zoom_at(400.0, 3.0);
        assert_eq!(transform.k, 3.0);
        assert!(close(transform.to_data_x(400.0), anchor));

        transform.zoom_at(400.0, 100.0);
        assert_eq!(transform.k, MAX_SCALE);
        assert!(close(transform.to_data_x(400.0), anchor));

        transform.zoom_at(400.0, 0.0001);
        assert_eq!(transform.k, MIN_SCALE);
    }

    #[test]
    fn slider_maps_onto_the_domain() {
        let layout = TimelineLayout::compute(&[event(1000, "a"), event(2000, "b")], 1100.0, 600.0).unwrap();
        assert_eq!(layout.slider_to_year(0.0), 950.0);
        assert_eq!(layout.slider_to_year(100.0), 2050.0);
        assert_eq!(layout.slider_to_year(50.0), 1500.0);
        assert_eq!(layout.year_to_slider(1500.0), 50.0);
        assert_eq!(layout.year_to_slider(3000.0), 100.0);
    }

    #[test]
    fn centering_reports_the_same_year_back() {
        let layout = TimelineLayout::compute(&[event(1000, "a"), event(2000, "b")], 1100.0, 600.0).unwrap();
        let mut transform = ViewTransform { tx: 0.0, k: 4.0 };

        layout.center_on(&mut transform, 1815.0, 1100.0);
        assert!(close(layout.centered_year(&transform, 1100.0), 1815.0));
        assert!(close(transform.to_screen_x(layout.scale.x(1815.0)), 550.0));
    }

    #[test]
    fn hit_test_finds_the_nearest_node_within_its_radius() {
        let events = vec![event(1900, "above"), event(1900, "below"), event(1960, "later")];
        let layout = TimelineLayout::compute(&events, 1100.0, 600.0).unwrap();
        let transform = ViewTransform { tx: -30.0, k: 2.0 };

        let node = layout.nodes[1];
        let sx = transform.to_screen_x(node.x);
        let sy = MARGIN_TOP + node.y;

        assert_eq!(layout.hit_test(&transform, sx + 3.0, sy - 3.0), Some(1));
        assert_eq!(layout.hit_test(&transform, sx, sy - 120.0), Some(0));
        assert_eq!(layout.hit_test(&transform, sx + 9.0, sy), None);
        assert_eq!(layout.hit_test(&transform, sx, MARGIN_TOP + layout.axis_y), None);
    }
}
