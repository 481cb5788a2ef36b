use log::debug;
use rand::Rng;

use crate::coordinates::PLACES;
use crate::data::{GeocodedEvent, HistoricalEvent};

/// Populated region used when nothing in the text names a known place.
#[derive(Debug, Clone, Copy)]
pub struct Anchor {
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    /// Full jitter span in degrees; offsets stay within half of it.
    pub radius: f64,
}

pub const ANCHORS: [Anchor; 5] = [
    Anchor { name: "Europe", latitude: 51.0, longitude: 10.0, radius: 20.0 },
    Anchor { name: "Asia", latitude: 35.0, longitude: 105.0, radius: 30.0 },
    Anchor { name: "North America", latitude: 40.0, longitude: -100.0, radius: 25.0 },
    Anchor { name: "South America", latitude: -15.0, longitude: -50.0, radius: 20.0 },
    Anchor { name: "Africa", latitude: 0.0, longitude: 20.0, radius: 25.0 },
];

/// Title and description, lower-cased, punctuation other than hyphens
/// turned into spaces, whitespace collapsed.
pub fn clean_text(title: &str, description: &str) -> String {
    let lowered = format!("{} {}", title, description).to_lowercase();
    let stripped: String = lowered
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Two-pass gazetteer match over cleaned text.
///
/// Short names can hit inside unrelated words ("bath" in "bathhouse"); that
/// is accepted as part of the approximation.
pub fn match_places(cleaned: &str) -> Option<(f64, f64)> {
    // Whole place name anywhere in the text, table order.
    if let Some((_, lat, lng)) = PLACES.iter().find(|(place, _, _)| cleaned.contains(place)) {
        return Some((*lat, *lng));
    }

    // Word-level fallback for compound names.
    cleaned
        .split(' ')
        .filter(|word| word.chars().count() > 3)
        .find_map(|word| {
            PLACES
                .iter()
                .find(|(place, _, _)| place.contains(word) || word.contains(place))
                .map(|(_, lat, lng)| (*lat, *lng))
        })
}

pub fn locate_known(event: &HistoricalEvent) -> Option<(f64, f64)> {
    match_places(&clean_text(&event.title, &event.description))
}

/// Random point near one of the continental anchors.
pub fn random_coordinates<R: Rng>(rng: &mut R) -> (f64, f64) {
    let anchor = ANCHORS[rng.gen_range(0..ANCHORS.len())];
    debug!("No known place, scattering near {}", anchor.name);
    let latitude = anchor.latitude + (rng.gen::<f64>() - 0.5) * anchor.radius;
    let longitude = anchor.longitude + (rng.gen::<f64>() - 0.5) * anchor.radius;
    (latitude, longitude)
}

pub fn locate<R: Rng>(event: &HistoricalEvent, rng: &mut R) -> (f64, f64) {
    locate_known(event).unwrap_or_else(|| random_coordinates(rng))
}

/// One geocoded event per input, same order.
pub fn geocode_events<R: Rng>(events: &[HistoricalEvent], rng: &mut R) -> Vec<GeocodedEvent> {
    events
        .iter()
        .map(|event| GeocodedEvent::new(event.clone(), locate(event, rng)))
        .collect()
}
