use serde::{Deserialize, Serialize};
use std::fmt;

pub const APP_ID: &str = "com.toasterrepair.TimeScape";
pub const COMPACT_FEED_URL: &str = "https://byabbe.se";
pub const RICHER_FEED_URL: &str = "https://en.wikipedia.org/api/rest_v1";
pub const TILE_URL: &str = "https://a.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Science,
    Politics,
    Culture,
    Sports,
    Technology,
    Nature,
    Society,
    General,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Science,
        Category::Politics,
        Category::Culture,
        Category::Sports,
        Category::Technology,
        Category::Nature,
        Category::Society,
        Category::General,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Science => "Science",
            Category::Politics => "Politics",
            Category::Culture => "Culture",
            Category::Sports => "Sports",
            Category::Technology => "Technology",
            Category::Nature => "Nature",
            Category::Society => "Society",
            Category::General => "General",
        }
    }

    /// Fill colour used for markers and timeline nodes.
    pub fn color_hex(self) -> &'static str {
        match self {
            Category::Science => "#3b82f6",
            Category::Politics => "#ef4444",
            Category::Culture => "#a855f7",
            Category::Sports => "#22c55e",
            Category::Technology => "#06b6d4",
            Category::Nature => "#eab308",
            Category::Society => "#ec4899",
            Category::General => "#6b7280",
        }
    }

    /// CSS class carrying the palette colour for GTK widgets.
    pub fn css_class(self) -> String {
        format!("category-{}", self.name().to_lowercase())
    }

    /// Palette colour as `(r, g, b)` in `0.0..=1.0` for cairo.
    pub fn rgb(self) -> (f64, f64, f64) {
        match gdk::RGBA::parse(self.color_hex()) {
            Ok(rgba) => (rgba.red() as f64, rgba.green() as f64, rgba.blue() as f64),
            Err(_) => (0.42, 0.45, 0.5),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalEvent {
    pub year: i32,
    pub title: String,
    pub description: String,
    pub category: Category,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedEvent {
    #[serde(flatten)]
    pub event: HistoricalEvent,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeocodedEvent {
    pub fn new(event: HistoricalEvent, (latitude, longitude): (f64, f64)) -> Self {
        Self { event, latitude, longitude }
    }
}

/// Lets the filter and the views treat raw and geocoded events alike.
pub trait AsEvent {
    fn event(&self) -> &HistoricalEvent;
}

impl AsEvent for HistoricalEvent {
    fn event(&self) -> &HistoricalEvent {
        self
    }
}

impl AsEvent for GeocodedEvent {
    fn event(&self) -> &HistoricalEvent {
        &self.event
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapBounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl MapBounds {
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.south
            && latitude <= self.north
            && longitude >= self.west
            && longitude <= self.east
    }
}

// byabbe.se "events for this date" feed

#[derive(Debug, Deserialize)]
pub struct CompactResponse {
    #[serde(default)]
    pub events: Vec<Option<CompactEvent>>,
}

#[derive(Debug, Deserialize)]
pub struct CompactEvent {
    pub year: Option<YearField>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub wikipedia: Vec<CompactWikiRef>,
}

/// The compact feed sends years as strings ("1969", "44 BC") but numbers
/// turn up too.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum YearField {
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
pub struct CompactWikiRef {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub wikipedia: String,
}

// Wikipedia REST "on this day" feed

#[derive(Debug, Deserialize)]
pub struct RicherResponse {
    #[serde(default)]
    pub events: Vec<Option<RicherEvent>>,
}

#[derive(Debug, Deserialize)]
pub struct RicherEvent {
    pub year: Option<i32>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub pages: Vec<RicherPage>,
}

#[derive(Debug, Deserialize)]
pub struct RicherPage {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub normalizedtitle: Option<String>,
    #[serde(default)]
    pub content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
pub struct ContentUrls {
    #[serde(default)]
    pub desktop: Option<PageUrl>,
}

#[derive(Debug, Deserialize)]
pub struct PageUrl {
    #[serde(default)]
    pub page: String,
}
