use log::info;
use rand::Rng;
use std::collections::{BTreeSet, HashSet};

use crate::cache::LocalCache;
use crate::data::{Category, GeocodedEvent, HistoricalEvent};
use crate::filter::EventFilter;
use crate::geocoding::geocode_events;
use crate::history_api::{merge_unique, AbortToken, EventSource, FetchError};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedEvents {
    pub events: Vec<HistoricalEvent>,
    pub geocoded: Vec<GeocodedEvent>,
}

/// Geocoded slot first, then the raw slot (geocoding it and saving the
/// result). Empty records count as misses.
pub fn load_cached<R: Rng>(cache: &LocalCache, rng: &mut R) -> Option<LoadedEvents> {
    if let Some(geocoded) = cache.geocoded.load().filter(|g| !g.is_empty()) {
        info!(
            "Loaded {} geocoded events from cache ({}h old)",
            geocoded.len(),
            cache.geocoded.age_hours().unwrap_or(0)
        );
        let events = geocoded.iter().map(|g| g.event.clone()).collect();
        return Some(LoadedEvents { events, geocoded });
    }

    let events = cache.events.load().filter(|e| !e.is_empty())?;
    info!("Loaded {} events from cache, geocoding", events.len());
    let geocoded = geocode_events(&events, rng);
    cache.geocoded.save(&geocoded);
    Some(LoadedEvents { events, geocoded })
}

/// Cached events when present, otherwise the full timeline sample from the
/// network, geocoded and written back to both slots.
pub async fn load_events(
    source: &EventSource,
    cache: &LocalCache,
    token: &AbortToken,
) -> Result<LoadedEvents, FetchError> {
    if let Some(loaded) = load_cached(cache, &mut rand::thread_rng()) {
        return Ok(loaded);
    }

    let events = source.fetch_historical_timeline(token).await?;
    let geocoded = geocode_events(&events, &mut rand::thread_rng());
    if !events.is_empty() {
        cache.events.save(&events);
        cache.geocoded.save(&geocoded);
    }
    Ok(LoadedEvents { events, geocoded })
}

fn event_key(event: &HistoricalEvent) -> (i32, String) {
    (event.year, event.title.clone())
}

pub struct AppState {
    pub events: Vec<HistoricalEvent>,
    pub geocoded: Vec<GeocodedEvent>,
    pub filter: EventFilter,
    /// Categories present in the loaded events.
    pub available: BTreeSet<Category>,
    pub loading: bool,
}

impl AppState {
    pub fn new(year_range: (i32, i32)) -> Self {
        Self {
            events: Vec::new(),
            geocoded: Vec::new(),
            filter: EventFilter::new(year_range),
            available: BTreeSet::new(),
            loading: false,
        }
    }

    /// Installs a fresh load and selects every category it contains.
    pub fn replace(&mut self, loaded: LoadedEvents) {
        self.available = loaded.events.iter().map(|e| e.category).collect();
        self.filter.categories = self.available.clone();
        self.events = loaded.events;
        self.geocoded = loaded.geocoded;
    }

    /// Merges the events of a randomly picked year and narrows the search to
    /// it. Returns false, leaving everything untouched, when there is nothing
    /// to merge.
    pub fn merge_year<R: Rng>(&mut self, year: i32, incoming: Vec<HistoricalEvent>, rng: &mut R) -> bool {
        if incoming.is_empty() {
            return false;
        }

        let known: HashSet<(i32, String)> = self.events.iter().map(event_key).collect();
        self.events = merge_unique(std::mem::take(&mut self.events), incoming);
        let added: Vec<HistoricalEvent> = self
            .events
            .iter()
            .filter(|e| !known.contains(&event_key(e)))
            .cloned()
            .collect();

        self.geocoded.extend(geocode_events(&added, rng));
        for event in &added {
            if self.available.insert(event.category) {
                self.filter.categories.insert(event.category);
            }
        }
        self.filter.search = year.to_string();
        info!("Merged {} new events for {}", added.len(), year);
        true
    }

    /// Adds region events not already known by `(year, title)`. Returns how
    /// many were new.
    pub fn merge_region(&mut self, located: Vec<GeocodedEvent>) -> usize {
        let mut known: HashSet<(i32, String)> = self.events.iter().map(event_key).collect();
        let fresh: Vec<GeocodedEvent> = located
            .into_iter()
            .filter(|g| known.insert(event_key(&g.event)))
            .collect();

        for g in &fresh {
            if self.available.insert(g.event.category) {
                self.filter.categories.insert(g.event.category);
            }
        }
        self.events.extend(fresh.iter().map(|g| g.event.clone()));
        let count = fresh.len();
        self.geocoded.extend(fresh);
        count
    }

    pub fn save(&self, cache: &LocalCache) {
        cache.events.save(&self.events);
        cache.geocoded.save(&self.geocoded);
    }

    pub fn visible_geocoded(&self) -> Vec<GeocodedEvent> {
        self.filter.apply(&self.geocoded).into_iter().cloned().collect()
    }

    pub fn visible_events(&self) -> Vec<HistoricalEvent> {
        self.filter.apply(&self.events).into_iter().cloned().collect()
    }
}
