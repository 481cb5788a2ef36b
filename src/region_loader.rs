use gtk::glib;
use log::{info, warn};
use std::cell::RefCell;
use std::collections::HashSet;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use crate::data::{GeocodedEvent, HistoricalEvent, MapBounds};
use crate::geocoding::geocode_events;
use crate::history_api::{abort_pair, AbortHandle, AbortToken, EventSource, FetchError};

const REGION_ROUNDING: f64 = 10.0;

/// Where region events come from.
pub trait RegionFeed {
    fn fetch_region(
        &self,
        bounds: MapBounds,
        year_range: (i32, i32),
        token: AbortToken,
    ) -> impl Future<Output = Result<Vec<HistoricalEvent>, FetchError>>;
}

impl RegionFeed for EventSource {
    async fn fetch_region(
        &self,
        bounds: MapBounds,
        year_range: (i32, i32),
        token: AbortToken,
    ) -> Result<Vec<HistoricalEvent>, FetchError> {
        self.fetch_events_for_region(bounds, year_range, &token).await
    }
}

/// Rounds half up, like JavaScript's `Math.round`.
fn round_to_region(value: f64) -> i64 {
    ((value / REGION_ROUNDING + 0.5).floor() * REGION_ROUNDING) as i64
}

pub fn region_key(bounds: &MapBounds) -> String {
    format!(
        "{},{},{},{}",
        round_to_region(bounds.north),
        round_to_region(bounds.south),
        round_to_region(bounds.east),
        round_to_region(bounds.west)
    )
}

type LoadingSignal = Rc<dyn Fn(bool)>;

/// A load still waiting on its debounce timer.
struct ScheduledLoad {
    key: String,
    timer: glib::JoinHandle<()>,
    on_loading_changed: LoadingSignal,
}

/// Region keys seen so far, plus the one load waiting on its timer.
#[derive(Default)]
pub struct RegionLoadState {
    pub loaded: HashSet<String>,
    pub pending: HashSet<String>,
    pub in_flight: bool,
    scheduled: Option<ScheduledLoad>,
    abort: Option<AbortHandle>,
    generation: u64,
}

#[derive(Clone)]
pub struct RegionLoader {
    state: Rc<RefCell<RegionLoadState>>,
    min_zoom: f64,
    throttle: Duration,
}

impl RegionLoader {
    pub fn new(min_zoom: f64, throttle: Duration) -> Self {
        Self {
            state: Rc::new(RefCell::new(RegionLoadState::default())),
            min_zoom,
            throttle,
        }
    }

    pub fn should_load(&self, bounds: &MapBounds, zoom: f64) -> bool {
        if zoom < self.min_zoom {
            return false;
        }

        let state = self.state.borrow();
        if state.in_flight {
            return false;
        }

        let key = region_key(bounds);
        !state.loaded.contains(&key) && !state.pending.contains(&key)
    }

    /// Schedules a load for `bounds` after the throttle delay, replacing any
    /// load still waiting on its timer.
    pub fn load_region<F, L, C>(
        &self,
        bounds: MapBounds,
        year_range: (i32, i32),
        feed: F,
        on_loaded: L,
        on_loading_changed: C,
    ) where
        F: RegionFeed + 'static,
        L: FnOnce(Vec<GeocodedEvent>) + 'static,
        C: Fn(bool) + 'static,
    {
        let key = region_key(&bounds);
        let on_loading_changed: LoadingSignal = Rc::new(on_loading_changed);

        {
            let mut state = self.state.borrow_mut();
            if let Some(superseded) = state.scheduled.take() {
                superseded.timer.abort();
                state.pending.remove(&superseded.key);
            }
            state.pending.insert(key.clone());
        }
        on_loading_changed(true);

        let loader = self.clone();
        let throttle = self.throttle;
        let task_key = key.clone();
        let signal = on_loading_changed.clone();
        let timer = glib::spawn_future_local(async move {
            glib::timeout_future(throttle).await;
            loader.state.borrow_mut().scheduled = None;
            loader
                .run_load(task_key, bounds, year_range, &feed, on_loaded, move |flag| signal(flag))
                .await;
        });

        self.state.borrow_mut().scheduled = Some(ScheduledLoad {
            key,
            timer,
            on_loading_changed,
        });
    }

    /// The fetch half of a load: fetch, geocode, keep what lies inside
    /// `bounds`, then settle the key and signal loading stopped.
    pub(crate) async fn run_load<F, L, C>(
        &self,
        key: String,
        bounds: MapBounds,
        year_range: (i32, i32),
        feed: &F,
        on_loaded: L,
        on_loading_changed: C,
    ) where
        F: RegionFeed,
        L: FnOnce(Vec<GeocodedEvent>),
        C: Fn(bool),
    {
        let (handle, token) = abort_pair();
        let generation = {
            let mut state = self.state.borrow_mut();
            state.in_flight = true;
            state.abort = Some(handle);
            state.generation
        };

        info!("Loading events for region: {}", key);
        let result = feed.fetch_region(bounds, year_range, token).await;

        let delivered = {
            let mut state = self.state.borrow_mut();
            if state.generation != generation {
                info!("Dropping stale results for region: {}", key);
                None
            } else {
                state.in_flight = false;
                state.abort = None;
                state.pending.remove(&key);

                match result {
                    Ok(events) => {
                        state.loaded.insert(key.clone());
                        Some(events)
                    }
                    Err(e) => {
                        warn!("Error loading regional events for {}: {}", key, e);
                        None
                    }
                }
            }
        };

        if let Some(events) = delivered {
            let geocoded = geocode_events(&events, &mut rand::thread_rng());
            let in_bounds: Vec<GeocodedEvent> = geocoded
                .into_iter()
                .filter(|event| bounds.contains(event.latitude, event.longitude))
                .collect();
            info!("Loaded {} events for region: {}", in_bounds.len(), key);
            on_loaded(in_bounds);
        }

        on_loading_changed(false);
    }

    /// Forgets every region and aborts whatever is scheduled or in flight.
    ///
    /// A load cancelled before its timer fired never reaches `run_load`, so
    /// its stop signal is sent from here.
    pub fn reset(&self) {
        let cancelled = {
            let mut state = self.state.borrow_mut();
            state.loaded.clear();
            state.pending.clear();
            state.in_flight = false;
            state.generation += 1;

            if let Some(abort) = state.abort.take() {
                abort.abort();
            }
            state.scheduled.take()
        };

        if let Some(scheduled) = cancelled {
            scheduled.timer.abort();
            (scheduled.on_loading_changed)(false);
        }
    }
}
