use futures_util::future::{join_all, BoxFuture, FutureExt, Shared};
use log::{debug, info, warn};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;

use crate::config::NetworkConfig;
use crate::data::{
    Category, CompactResponse, HistoricalEvent, MapBounds, RicherResponse, YearField,
};

/// Below this many compact-feed events the richer feed is queried as well.
const MIN_COMPACT_EVENTS: usize = 5;

const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Science,
        &[
            "science", "discovery", "space", "nasa", "technology", "invention", "research",
            "nobel", "physics", "chemistry", "biology", "medicine", "atom", "moon", "mars",
            "telescope", "experiment",
        ],
    ),
    (
        Category::Politics,
        &[
            "war", "treaty", "president", "election", "government", "independence",
            "revolution", "battle", "congress", "parliament", "prime minister", "king",
            "queen", "empire", "declaration", "peace", "military",
        ],
    ),
    (
        Category::Culture,
        &[
            "art", "music", "literature", "film", "theater", "novel", "painting", "sculpture",
            "museum", "opera", "symphony", "exhibition", "artist", "writer", "poet", "composer",
        ],
    ),
    (
        Category::Sports,
        &[
            "olympic", "championship", "world cup", "athlete", "record", "marathon",
            "tournament", "medal", "soccer", "football", "basketball", "tennis",
        ],
    ),
    (
        Category::Technology,
        &[
            "computer", "internet", "software", "digital", "electronic", "robot", "ai",
            "machine", "patent", "innovation", "algorithm",
        ],
    ),
    (
        Category::Nature,
        &[
            "earthquake", "volcano", "hurricane", "tsunami", "flood", "disaster", "meteor",
            "comet", "eclipse", "climate",
        ],
    ),
    (
        Category::Society,
        &[
            "civil rights", "protest", "movement", "social", "law", "court", "justice",
            "reform", "education", "university",
        ],
    ),
];

/// Anniversaries used to pull events for a single year.
const YEAR_SAMPLE_DATES: [(u32, u32); 12] = [
    (1, 1),
    (2, 14),
    (3, 15),
    (4, 15),
    (5, 1),
    (6, 21),
    (7, 4),
    (8, 15),
    (9, 11),
    (10, 31),
    (11, 11),
    (12, 25),
];

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("fetch aborted")]
    Aborted,
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// Sender half of an abort signal. Dropping it does not abort.
#[derive(Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

/// Receiver half, passed down every multi-date fetch.
#[derive(Debug, Clone)]
pub struct AbortToken {
    rx: watch::Receiver<bool>,
}

pub fn abort_pair() -> (AbortHandle, AbortToken) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle { tx }, AbortToken { rx })
}

impl AbortHandle {
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }
}

impl AbortToken {
    /// A token that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        AbortToken { rx }
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the paired handle aborts; pends forever if the handle
    /// is dropped without aborting.
    pub async fn aborted(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|aborted| *aborted).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Short-lived map from request key to an in-flight or finished request.
///
/// Entries older than the window are purged before every lookup.
pub struct RequestCache<V> {
    window: Duration,
    entries: Mutex<HashMap<String, (Instant, V)>>,
}

impl<V: Clone> RequestCache<V> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_or_insert_with(&self, key: &str, now: Instant, make: impl FnOnce() -> V) -> V {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let window = self.window;
        entries.retain(|_, (created, _)| now.saturating_duration_since(*created) <= window);

        if let Some((_, value)) = entries.get(key) {
            debug!("request cache hit for {}", key);
            return value.clone();
        }

        let value = make();
        entries.insert(key.to_string(), (now, value.clone()));
        value
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

type SharedFetch = Shared<BoxFuture<'static, Vec<HistoricalEvent>>>;

/// Client for the two "on this day" feeds.
#[derive(Clone)]
pub struct EventSource {
    client: reqwest::Client,
    compact_base_url: String,
    richer_base_url: String,
    batch_size: usize,
    batch_concurrency: usize,
    requests: Arc<RequestCache<SharedFetch>>,
}

impl EventSource {
    pub fn new(config: &NetworkConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("timescape/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            compact_base_url: config.compact_base_url.trim_end_matches('/').to_string(),
            richer_base_url: config.richer_base_url.trim_end_matches('/').to_string(),
            batch_size: config.batch_size.max(1),
            batch_concurrency: config.batch_concurrency.max(1),
            requests: Arc::new(RequestCache::new(config.dedup_window())),
        })
    }

    /// Drops every remembered request so the next fetch hits the network.
    pub fn clear_requests(&self) {
        self.requests.clear();
    }

    /// Events from the compact feed; empty on any failure.
    pub async fn fetch_compact(&self, month: u32, day: u32) -> Vec<HistoricalEvent> {
        let url = format!(
            "{}/on-this-day/{}/{}/events.json",
            self.compact_base_url, month, day
        );
        self.dedup_fetch(format!("byabbe-{}-{}", month, day), url, move |body| {
            parse_compact(body, month, day)
        })
        .await
    }

    /// Events from the richer feed; empty on any failure.
    pub async fn fetch_richer(&self, month: u32, day: u32) -> Vec<HistoricalEvent> {
        let url = format!(
            "{}/feed/onthisday/events/{}/{}",
            self.richer_base_url, month, day
        );
        self.dedup_fetch(format!("wikipedia-{}-{}", month, day), url, move |body| {
            parse_richer(body, month, day)
        })
        .await
    }

    fn dedup_fetch(
        &self,
        key: String,
        url: String,
        parse: impl FnOnce(&str) -> Result<Vec<HistoricalEvent>, FetchError> + Send + 'static,
    ) -> SharedFetch {
        let client = self.client.clone();
        self.requests.get_or_insert_with(&key, Instant::now(), move || {
            async move {
                debug!("Fetching {}", url);
                let result = match get_text(&client, &url).await {
                    Ok(body) => parse(&body),
                    Err(e) => Err(e),
                };
                match result {
                    Ok(events) => events,
                    Err(e) => {
                        warn!("Error fetching {}: {}", url, e);
                        Vec::new()
                    }
                }
            }
            .boxed()
            .shared()
        })
    }

    /// Compact feed first, richer feed only when the compact one came up short.
    pub async fn fetch_for_date(&self, month: u32, day: u32) -> Vec<HistoricalEvent> {
        let mut events = self.fetch_compact(month, day).await;
        if events.len() >= MIN_COMPACT_EVENTS {
            return events;
        }

        events.extend(self.fetch_richer(month, day).await);
        events
    }

    /// Fetches `dates` in batches, a bounded number of batches at a time.
    ///
    /// Every batch in a group is awaited before its results are appended, so
    /// the output keeps date order.
    pub async fn fetch_dates(
        &self,
        dates: &[(u32, u32)],
        token: &AbortToken,
    ) -> Result<Vec<HistoricalEvent>, FetchError> {
        let mut all_events = Vec::new();
        let batches: Vec<&[(u32, u32)]> = dates.chunks(self.batch_size).collect();

        for group in batches.chunks(self.batch_concurrency) {
            if token.is_aborted() {
                return Err(FetchError::Aborted);
            }

            let work = join_all(group.iter().map(|batch| {
                join_all(batch.iter().map(|&(month, day)| self.fetch_for_date(month, day)))
            }));

            let results = tokio::select! {
                biased;
                _ = token.aborted() => return Err(FetchError::Aborted),
                results = work => results,
            };

            for batch in results {
                for events in batch {
                    all_events.extend(events);
                }
            }
        }

        Ok(all_events)
    }

    /// The broad sample loaded at start-up, sorted by year.
    pub async fn fetch_historical_timeline(
        &self,
        token: &AbortToken,
    ) -> Result<Vec<HistoricalEvent>, FetchError> {
        let mut events = self.fetch_dates(&timeline_dates(), token).await?;
        events.sort_by_key(|event| event.year);
        info!("Fetched {} timeline events", events.len());
        Ok(events)
    }

    pub async fn fetch_events_for_year(
        &self,
        year: i32,
        token: &AbortToken,
    ) -> Result<Vec<HistoricalEvent>, FetchError> {
        let events = self.fetch_dates(&YEAR_SAMPLE_DATES, token).await?;
        Ok(events.into_iter().filter(|event| event.year == year).collect())
    }

    /// Events for a viewport. The feeds know nothing about geography, so only
    /// the year range narrows the result; callers filter by bounds.
    pub async fn fetch_events_for_region(
        &self,
        _bounds: MapBounds,
        (start, end): (i32, i32),
        token: &AbortToken,
    ) -> Result<Vec<HistoricalEvent>, FetchError> {
        let events = self.fetch_dates(&region_dates(), token).await?;
        Ok(events
            .into_iter()
            .filter(|event| event.year >= start && event.year <= end)
            .collect())
    }
}

async fn get_text(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    Ok(response.text().await?)
}

/// Category of the first keyword group with any substring hit.
pub fn classify(text: &str) -> Category {
    let lowered = text.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| lowered.contains(keyword)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::General)
}

/// Leading integer of a feed year; a trailing "BC"/"BCE" makes it negative.
pub fn parse_year(raw: &str) -> Option<i32> {
    let trimmed = raw.trim();
    let (sign, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed),
    };

    let digits_len = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let value: i32 = rest[..digits_len].parse().ok()?;
    let era = if rest[digits_len..].trim_start().to_ascii_uppercase().starts_with("BC") {
        -1
    } else {
        1
    };

    Some(sign * era * value)
}

fn year_from_field(field: &YearField) -> Option<i32> {
    match field {
        YearField::Number(n) => i32::try_from(*n).ok(),
        YearField::Text(text) => parse_year(text),
    }
}

pub fn parse_compact(body: &str, month: u32, day: u32) -> Result<Vec<HistoricalEvent>, FetchError> {
    let response: CompactResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    Ok(response
        .events
        .into_iter()
        .flatten()
        .filter_map(|event| {
            let description = event.description.filter(|d| !d.trim().is_empty())?;
            let year = event.year.as_ref().and_then(year_from_field)?;
            let wiki = event.wikipedia.first();
            let title = wiki
                .map(|w| w.title.clone())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| format!("Event in {}", year));

            Some(HistoricalEvent {
                year,
                title,
                category: classify(&description),
                url: wiki.map(|w| w.wikipedia.clone()).unwrap_or_default(),
                description,
                month: Some(month),
                day: Some(day),
            })
        })
        .collect())
}

pub fn parse_richer(body: &str, month: u32, day: u32) -> Result<Vec<HistoricalEvent>, FetchError> {
    let response: RicherResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    Ok(response
        .events
        .into_iter()
        .flatten()
        .filter_map(|event| {
            let text = event.text.filter(|t| !t.trim().is_empty())?;
            let year = event.year?;
            let page = event.pages.first();
            let title = page
                .map(|p| {
                    p.normalizedtitle
                        .clone()
                        .unwrap_or_else(|| p.title.replace('_', " "))
                })
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| format!("Event in {}", year));
            let url = page
                .and_then(|p| p.content_urls.as_ref())
                .and_then(|urls| urls.desktop.as_ref())
                .map(|desktop| desktop.page.clone())
                .unwrap_or_default();

            Some(HistoricalEvent {
                year,
                title,
                category: classify(&text),
                url,
                description: text,
                month: Some(month),
                day: Some(day),
            })
        })
        .collect())
}

/// Appends `incoming` to `existing`, keeping the first event for each
/// `(year, title)` pair.
pub fn merge_unique(
    existing: Vec<HistoricalEvent>,
    incoming: Vec<HistoricalEvent>,
) -> Vec<HistoricalEvent> {
    let mut seen: HashSet<(i32, String)> = HashSet::new();
    existing
        .into_iter()
        .chain(incoming)
        .filter(|event| seen.insert((event.year, event.title.clone())))
        .collect()
}

/// Four days per month: 1, 10, 20 and 28 (15 in February).
pub fn timeline_dates() -> Vec<(u32, u32)> {
    (1..=12)
        .flat_map(|month| {
            let last = if month == 2 { 15 } else { 28 };
            [(month, 1), (month, 10), (month, 20), (month, last)]
        })
        .collect()
}

/// Days 1, 10, 20 and `min(month + 10, 28)`, repeats dropped.
pub fn region_dates() -> Vec<(u32, u32)> {
    let mut seen = HashSet::new();
    (1..=12)
        .flat_map(|month| [(month, 1), (month, 10), (month, 20), (month, (month + 10).min(28))])
        .filter(|date| seen.insert(*date))
        .collect()
}

pub fn random_year<R: Rng>(rng: &mut R, min: i32, max: i32) -> i32 {
    rng.gen_range(min.min(max)..=min.max(max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    impl<V> RequestCache<V> {
        fn len(&self) -> usize {
            self.entries.lock().unwrap().len()
        }
    }

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

    fn compact_body(count: usize) -> String {
        let events: Vec<String> = (0..count)
            .map(|i| {
                format!(
                    r#"{{"year":"{}","description":"Treaty number {}","wikipedia":[{{"title":"Treaty {}","wikipedia":"https://en.wikipedia.org/wiki/Treaty_{}"}}]}}"#,
                    1800 + i,
                    i,
                    i,
                    i
                )
            })
            .collect();
        format!(r#"{{"date":"July 4","events":[{}]}}"#, events.join(","))
    }

    const RICHER_BODY: &str = r#"{"events":[{"year":1969,"text":"Apollo 11 lands on the Moon.","pages":[{"title":"Apollo_11","normalizedtitle":"Apollo 11","content_urls":{"desktop":{"page":"https://en.wikipedia.org/wiki/Apollo_11"}}}]}]}"#;

    /// Minimal HTTP/1.1 responder; counts requests per path.
    async fn serve(
        routes: Vec<(String, u16, String)>,
    ) -> (String, Arc<Mutex<HashMap<String, usize>>>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits: Arc<Mutex<HashMap<String, usize>>> = Arc::new(Mutex::new(HashMap::new()));
        let hits_for_server = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let routes = routes.clone();
                let hits = hits_for_server.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).to_string();
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                    *hits.lock().unwrap().entry(path.clone()).or_insert(0) += 1;

                    let (status, body) = routes
                        .iter()
                        .find(|(route, _, _)| *route == path)
                        .map(|(_, status, body)| (*status, body.clone()))
                        .unwrap_or((404, String::new()));
                    let response = format!(
                        "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (format!("http://{}", addr), hits)
    }

    fn source_for(base: &str) -> EventSource {
        EventSource::new(&NetworkConfig {
            compact_base_url: base.to_string(),
            richer_base_url: base.to_string(),
            timeout_secs: 5,
            ..NetworkConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn classification_examples() {
        assert_eq!(classify("NASA launches new telescope"), Category::Science);
        assert_eq!(classify("A quiet day passed"), Category::General);
        assert_eq!(classify("The Treaty of Versailles is signed"), Category::Politics);
        assert_eq!(classify("The first FIFA World Cup final"), Category::Sports);
    }

    #[test]
    fn first_matching_category_wins() {
        // "space" (Science) and "war" (Politics) both match.
        assert_eq!(classify("The space war begins"), Category::Science);
    }

    #[test]
    fn years_parse_from_feed_text() {
        assert_eq!(parse_year("1969"), Some(1969));
        assert_eq!(parse_year(" 476 "), Some(476));
        assert_eq!(parse_year("44 BC"), Some(-44));
        assert_eq!(parse_year("490 BCE"), Some(-490));
        assert_eq!(parse_year("-30"), Some(-30));
        assert_eq!(parse_year("c. 1200"), None);
        assert_eq!(parse_year(""), None);
    }

    #[test]
    fn compact_feed_is_normalized() {
        let body = r#"{"date":"July 20","events":[
            {"year":"1969","description":"Apollo 11 lands on the Moon","wikipedia":[{"title":"Apollo 11","wikipedia":"https://en.wikipedia.org/wiki/Apollo_11"}]},
            {"year":"1976","description":"Viking 1 lands on Mars","wikipedia":[]},
            {"year":"1800","description":""},
            null,
            {"year":"unknown","description":"Something happened"}
        ]}"#;

        let events = parse_compact(body, 7, 20).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "Apollo 11");
        assert_eq!(events[0].category, Category::Science);
        assert_eq!(events[0].month, Some(7));
        assert_eq!(events[0].day, Some(20));
        assert_eq!(events[1].title, "Event in 1976");
        assert_eq!(events[1].url, "");
    }

    #[test]
    fn richer_feed_is_normalized() {
        let events = parse_richer(RICHER_BODY, 7, 20).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].year, 1969);
        assert_eq!(events[0].title, "Apollo 11");
        assert_eq!(events[0].url, "https://en.wikipedia.org/wiki/Apollo_11");
        assert_eq!(events[0].description, "Apollo 11 lands on the Moon.");
    }

    #[test]
    fn richer_titles_fall_back_to_underscored_names() {
        let body = r#"{"events":[{"year":1815,"text":"Battle of Waterloo","pages":[{"title":"Battle_of_Waterloo"}]},{"year":1066,"text":"Hastings"}]}"#;
        let events = parse_richer(body, 6, 18).unwrap();
        assert_eq!(events[0].title, "Battle of Waterloo");
        assert_eq!(events[1].title, "Event in 1066");
    }

    #[test]
    fn malformed_bodies_are_parse_errors() {
        assert!(matches!(parse_compact("<html>", 1, 1), Err(FetchError::Parse(_))));
        assert!(matches!(parse_richer("{\"events\": 5}", 1, 1), Err(FetchError::Parse(_))));
    }

    #[test]
    fn merge_keeps_first_of_each_year_and_title() {
        let merged = merge_unique(
            vec![event(1969, "Apollo 11 Moon Landing"), event(1989, "Fall of the Berlin Wall")],
            vec![event(1969, "Apollo 11 Moon Landing"), event(1969, "Woodstock")],
        );
        let titles: Vec<&str> = merged.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["Apollo 11 Moon Landing", "Fall of the Berlin Wall", "Woodstock"]);
    }

    #[test]
    fn sampled_dates() {
        let dates = timeline_dates();
        assert_eq!(dates.len(), 48);
        assert!(dates.contains(&(2, 15)));
        assert!(!dates.contains(&(2, 28)));
        assert!(dates.contains(&(12, 28)));

        assert_eq!(YEAR_SAMPLE_DATES.len(), 12);

        let region = region_dates();
        assert!(region.contains(&(1, 11)));
        assert!(region.contains(&(12, 20)));
        let unique: HashSet<_> = region.iter().collect();
        assert_eq!(unique.len(), region.len());
    }

    #[test]
    fn random_year_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let year = random_year(&mut rng, 1000, 2024);
            assert!((1000..=2024).contains(&year));
        }
        assert_eq!(random_year(&mut rng, 1500, 1500), 1500);
    }

    #[test]
    fn request_cache_reuses_entries_inside_the_window() {
        let cache = RequestCache::new(Duration::from_secs(300));
        let start = Instant::now();
        let mut calls = 0;

        let first = cache.get_or_insert_with("byabbe-7-4", start, || {
            calls += 1;
            1
        });
        let second = cache.get_or_insert_with("byabbe-7-4", start + Duration::from_secs(60), || {
            calls += 1;
            2
        });

        assert_eq!((first, second), (1, 1));
        assert_eq!(calls, 1);
    }

    #[test]
    fn request_cache_purges_expired_entries() {
        let cache = RequestCache::new(Duration::from_secs(300));
        let start = Instant::now();
        cache.get_or_insert_with("a", start, || 1);
        cache.get_or_insert_with("b", start + Duration::from_secs(200), || 2);

        let later = start + Duration::from_secs(301);
        let refreshed = cache.get_or_insert_with("a", later, || 3);
        assert_eq!(refreshed, 3);
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn abort_token_fires_once_aborted() {
        let (handle, token) = abort_pair();
        assert!(!token.is_aborted());
        handle.abort();
        assert!(token.is_aborted());
        token.aborted().await;
        assert!(!AbortToken::never().is_aborted());
    }

    #[tokio::test]
    async fn aborted_token_stops_multi_date_fetch() {
        // Nothing listens here; the token must short-circuit before any request.
        let source = source_for("http://127.0.0.1:9");
        let (handle, token) = abort_pair();
        handle.abort();

        let result = source.fetch_dates(&timeline_dates(), &token).await;
        assert!(matches!(result, Err(FetchError::Aborted)));
    }

    #[tokio::test]
    async fn richer_feed_only_used_when_compact_is_short() {
        let (base, hits) = serve(vec![
            ("/on-this-day/7/4/events.json".to_string(), 200, compact_body(6)),
            ("/on-this-day/7/20/events.json".to_string(), 200, compact_body(1)),
            ("/feed/onthisday/events/7/4".to_string(), 200, RICHER_BODY.to_string()),
            ("/feed/onthisday/events/7/20".to_string(), 200, RICHER_BODY.to_string()),
        ])
        .await;
        let source = source_for(&base);

        let plentiful = source.fetch_for_date(7, 4).await;
        assert_eq!(plentiful.len(), 6);

        let short = source.fetch_for_date(7, 20).await;
        assert_eq!(short.len(), 2);
        assert_eq!(short[1].title, "Apollo 11");

        let hits = hits.lock().unwrap();
        assert!(!hits.contains_key("/feed/onthisday/events/7/4"));
        assert_eq!(hits.get("/feed/onthisday/events/7/20"), Some(&1));
    }

    #[tokio::test]
    async fn upstream_failures_yield_empty_results() {
        let (base, _) = serve(vec![
            ("/on-this-day/1/1/events.json".to_string(), 500, String::new()),
            ("/feed/onthisday/events/1/1".to_string(), 200, "not json".to_string()),
        ])
        .await;
        let source = source_for(&base);

        assert!(source.fetch_for_date(1, 1).await.is_empty());
    }

    #[tokio::test]
    async fn identical_dates_share_one_request() {
        let (base, hits) = serve(vec![(
            "/on-this-day/3/15/events.json".to_string(),
            200,
            compact_body(5),
        )])
        .await;
        let source = source_for(&base);

        let (a, b) = tokio::join!(source.fetch_compact(3, 15), source.fetch_compact(3, 15));
        let c = source.fetch_compact(3, 15).await;
        assert_eq!(a.len(), 5);
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(hits.lock().unwrap().get("/on-this-day/3/15/events.json"), Some(&1));

        source.clear_requests();
        source.fetch_compact(3, 15).await;
        assert_eq!(hits.lock().unwrap().get("/on-this-day/3/15/events.json"), Some(&2));
    }

    #[tokio::test]
    async fn year_fetch_keeps_only_the_requested_year() {
        let routes = YEAR_SAMPLE_DATES
            .iter()
            .map(|(m, d)| (format!("/on-this-day/{}/{}/events.json", m, d), 200, compact_body(5)))
            .collect();
        let (base, _) = serve(routes).await;
        let source = source_for(&base);

        let events = source
            .fetch_events_for_year(1802, &AbortToken::never())
            .await
            .unwrap();
        assert_eq!(events.len(), 12);
        assert!(events.iter().all(|e| e.year == 1802));
    }

    #[tokio::test]
    async fn every_normalized_event_has_a_known_category() {
        let (base, _) = serve(vec![
            ("/on-this-day/2/14/events.json".to_string(), 200, compact_body(2)),
            ("/feed/onthisday/events/2/14".to_string(), 200, RICHER_BODY.to_string()),
        ])
        .await;
        let source = source_for(&base);

        let events = source.fetch_for_date(2, 14).await;
        assert_eq!(events.len(), 3);
        for event in events {
            assert!(Category::ALL.contains(&event.category));
        }
    }

    #[test]
    fn error_messages() {
        assert_eq!(FetchError::Status(503).to_string(), "upstream returned status 503");
        assert_eq!(FetchError::Aborted.to_string(), "fetch aborted");
    }

    /// Six events per date, years running backwards so the feed order is
    /// the reverse of the sorted order.
    fn descending_body(month: u32, day: u32) -> String {
        let events: Vec<String> = (0..6)
            .map(|i| {
                format!(
                    r#"{{"year":"{}","description":"Charter {}-{}-{}","wikipedia":[{{"title":"Charter {}-{}-{}","wikipedia":""}}]}}"#,
                    2000 - (month * 40 + day) as i32 - i * 300,
                    month, day, i,
                    month, day, i
                )
            })
            .collect();
        format!(r#"{{"events":[{}]}}"#, events.join(","))
    }

    #[tokio::test]
    async fn timeline_joins_every_batch_and_sorts_by_year() {
        let dates = timeline_dates();
        let routes = dates
            .iter()
            .map(|&(m, d)| (format!("/on-this-day/{}/{}/events.json", m, d), 200, descending_body(m, d)))
            .collect();
        let (base, hits) = serve(routes).await;
        let source = EventSource::new(&NetworkConfig {
            compact_base_url: base.clone(),
            richer_base_url: base,
            timeout_secs: 5,
            batch_size: 5,
            batch_concurrency: 2,
            ..NetworkConfig::default()
        })
        .unwrap();

        let events = source
            .fetch_historical_timeline(&AbortToken::never())
            .await
            .unwrap();

        assert_eq!(events.len(), dates.len() * 6);
        assert!(events.windows(2).all(|pair| pair[0].year <= pair[1].year));

        let covered: HashSet<(u32, u32)> = events
            .iter()
            .filter_map(|e| Some((e.month?, e.day?)))
            .collect();
        assert_eq!(covered.len(), dates.len());

        let hits = hits.lock().unwrap();
        for (m, d) in &dates {
            assert_eq!(hits.get(&format!("/on-this-day/{}/{}/events.json", m, d)), Some(&1));
        }
        assert!(hits.keys().all(|path| !path.starts_with("/feed/")));
    }
}
