mod cache;
mod config;
mod coordinates;
mod data;
mod filter;
mod geocoding;
mod history_api;
mod logging;
mod map_layout;
mod map_view;
mod region_loader;
mod shell;
mod timeline_layout;
mod timeline_view;

use gtk::prelude::*;
use gtk::{glib, Align, Label, Orientation, SearchEntry};
use libadwaita::{prelude::*, Application, ApplicationWindow, ColorScheme, HeaderBar, StatusPage, StyleManager, ToolbarView, ViewStack, ViewSwitcher};
use log::{error, info, warn};
use std::cell::{Cell, OnceCell, RefCell};
use std::rc::Rc;

use crate::cache::LocalCache;
use crate::config::Config;
use crate::data::{Category, MapBounds, APP_ID};
use crate::history_api::{abort_pair, random_year, AbortHandle, AbortToken, EventSource, FetchError};
use crate::map_view::{create_map_view, MapControl};
use crate::region_loader::RegionLoader;
use crate::shell::AppState;
use crate::timeline_view::{create_timeline_view, TimelineControl};

fn main() -> glib::ExitCode {
    let config = Config::load();
    let _logger = match logging::init_logging(&config.log.level) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("{e:#}");
            None
        }
    };

    // reqwest needs a Tokio reactor; UI futures still run on the GLib loop.
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            return glib::ExitCode::FAILURE;
        }
    };
    let _guard = rt.enter();

    let app = Application::builder()
        .application_id(APP_ID)
        .build();

    let config = Rc::new(config);
    app.connect_activate(move |app| build_ui(app, &config));

    let exit_code = app.run();

    drop(_guard);
    drop(rt);

    exit_code
}

/// Everything the header bar and views act on.
#[derive(Clone)]
struct TimeScape {
    config: Rc<Config>,
    state: Rc<RefCell<AppState>>,
    source: EventSource,
    cache: Rc<LocalCache>,
    region_loader: RegionLoader,
    map: MapControl,
    timeline: TimelineControl,
    content: gtk::Stack,
    loading_overlay: gtk::Box,
    region_spinner: gtk::Spinner,
    search_entry: SearchEntry,
    category_buttons: Rc<Vec<(Category, gtk::ToggleButton)>>,
    action_buttons: Rc<Vec<gtk::Button>>,
    /// Set while controls are updated from state, so their handlers stay quiet.
    syncing_controls: Rc<Cell<bool>>,
    load_abort: Rc<RefCell<Option<AbortHandle>>>,
}

impl TimeScape {
    fn refresh_views(&self) {
        let (located, events) = {
            let state = self.state.borrow();
            (state.visible_geocoded(), state.visible_events())
        };
        let loading = self.state.borrow().loading;

        let page = if events.is_empty() && !loading { "empty" } else { "events" };
        self.content.set_visible_child_name(page);

        self.map.show_events(located);
        self.timeline.show_events(events);
    }

    fn sync_controls(&self) {
        self.syncing_controls.set(true);
        {
            let state = self.state.borrow();
            for (category, button) in self.category_buttons.iter() {
                button.set_sensitive(state.available.contains(category));
                button.set_active(state.filter.categories.contains(category));
            }
            if self.search_entry.text().as_str() != state.filter.search {
                self.search_entry.set_text(&state.filter.search);
            }
        }
        self.syncing_controls.set(false);
    }

    fn set_loading(&self, loading: bool) {
        self.state.borrow_mut().loading = loading;
        self.loading_overlay.set_visible(loading);
        for button in self.action_buttons.iter() {
            button.set_sensitive(!loading);
        }
    }

    /// Starts a fresh abortable operation, aborting the previous one.
    fn begin_operation(&self) -> AbortToken {
        let (handle, token) = abort_pair();
        if let Some(previous) = self.load_abort.borrow_mut().replace(handle) {
            previous.abort();
        }
        token
    }

    /// Loads from cache or network. `force` discards both caches and every
    /// remembered region first.
    fn load(&self, force: bool) {
        if force {
            info!("Refreshing: clearing caches and loaded regions");
            self.cache.clear_all();
            self.source.clear_requests();
            self.region_loader.reset();
            self.map.reset_fit();
        }

        let token = self.begin_operation();
        self.set_loading(true);

        let app = self.clone();
        glib::spawn_future_local(async move {
            match shell::load_events(&app.source, &app.cache, &token).await {
                Ok(loaded) => {
                    info!("Showing {} events", loaded.events.len());
                    app.state.borrow_mut().replace(loaded);
                }
                Err(FetchError::Aborted) => return,
                Err(e) => warn!("Error loading events: {}", e),
            }
            app.set_loading(false);
            app.sync_controls();
            app.refresh_views();
        });
    }

    fn load_random_year(&self) {
        let (min, max) = self.config.events.year_range();
        let year = random_year(&mut rand::thread_rng(), min, max);
        info!("Fetching events for random year {}", year);

        let token = self.begin_operation();
        self.set_loading(true);

        let app = self.clone();
        glib::spawn_future_local(async move {
            match app.source.fetch_events_for_year(year, &token).await {
                Ok(events) => {
                    let merged = app.state.borrow_mut().merge_year(year, events, &mut rand::thread_rng());
                    if merged {
                        app.state.borrow().save(&app.cache);
                        app.sync_controls();
                    } else {
                        info!("No events found for {}", year);
                    }
                }
                Err(FetchError::Aborted) => return,
                Err(e) => warn!("Error fetching random year: {}", e),
            }
            app.set_loading(false);
            app.refresh_views();
        });
    }

    fn on_map_settled(&self, bounds: MapBounds, zoom: f64) {
        if !self.region_loader.should_load(&bounds, zoom) {
            return;
        }

        let app = self.clone();
        let spinner = self.region_spinner.clone();
        self.region_loader.load_region(
            bounds,
            self.config.events.year_range(),
            self.source.clone(),
            move |located| {
                let added = app.state.borrow_mut().merge_region(located);
                if added > 0 {
                    info!("Added {} regional events", added);
                    app.sync_controls();
                    app.refresh_views();
                }
            },
            move |loading| {
                spinner.set_visible(loading);
                spinner.set_spinning(loading);
            },
        );
    }
}

fn build_ui(app: &Application, config: &Rc<Config>) {
    let style_manager = StyleManager::default();
    style_manager.set_color_scheme(ColorScheme::PreferDark);

    let source = match EventSource::new(&config.network) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            return;
        }
    };
    let cache = Rc::new(LocalCache::new(&config.cache));
    info!("Caching events in {}", cache.events.path().display());
    if cache.geocoded.is_valid() || cache.events.is_valid() {
        info!("Event cache is still valid");
    }

    let stack = ViewStack::builder()
        .build();

    // The map is built before the app handle exists; settle events reach it
    // through this cell.
    let app_cell: Rc<OnceCell<TimeScape>> = Rc::new(OnceCell::new());
    let app_for_settle = app_cell.clone();
    let (map_page, map_control) = create_map_view(&config.map, move |bounds, zoom| {
        if let Some(app) = app_for_settle.get() {
            app.on_map_settled(bounds, zoom);
        }
    });
    stack.add_titled(&map_page, Some("map"), "Map");
    stack.page(&map_page).set_icon_name(Some("mark-location-symbolic"));

    let (timeline_page, timeline_control) = create_timeline_view();
    stack.add_titled(&timeline_page, Some("timeline"), "Timeline");
    stack.page(&timeline_page).set_icon_name(Some("document-open-recent-symbolic"));

    let view_switcher = ViewSwitcher::builder()
        .stack(&stack)
        .policy(libadwaita::ViewSwitcherPolicy::Wide)
        .halign(Align::Center)
        .valign(Align::End)
        .margin_bottom(24)
        .build();
    view_switcher.add_css_class("floating-switcher");

    let attribution = Label::builder()
        .label("Data from <a href=\"https://byabbe.se/on-this-day/\">byabbe.se</a> &amp; Wikipedia")
        .use_markup(true)
        .halign(Align::End)
        .valign(Align::End)
        .margin_end(12)
        .margin_bottom(12)
        .build();
    attribution.add_css_class("attribution");

    let spinner = gtk::Spinner::builder()
        .spinning(true)
        .width_request(32)
        .height_request(32)
        .build();
    let loading_label = Label::builder()
        .label("Loading more events...")
        .build();
    let loading_overlay = gtk::Box::builder()
        .orientation(Orientation::Vertical)
        .spacing(12)
        .halign(Align::Center)
        .valign(Align::Center)
        .visible(false)
        .build();
    loading_overlay.add_css_class("loading-overlay");
    loading_overlay.append(&spinner);
    loading_overlay.append(&loading_label);

    let overlay = gtk::Overlay::new();
    overlay.set_child(Some(&stack));
    overlay.add_overlay(&view_switcher);
    overlay.add_overlay(&attribution);

    let empty_refresh = gtk::Button::builder()
        .label("Refresh")
        .halign(Align::Center)
        .build();
    empty_refresh.add_css_class("pill");
    empty_refresh.add_css_class("suggested-action");
    let empty_page = StatusPage::builder()
        .icon_name("find-location-symbolic")
        .title("No events found")
        .description("Try adjusting your filters or search term")
        .child(&empty_refresh)
        .build();

    let content = gtk::Stack::new();
    content.add_named(&overlay, Some("events"));
    content.add_named(&empty_page, Some("empty"));
    content.set_visible_child_name("events");

    let root_overlay = gtk::Overlay::new();
    root_overlay.set_child(Some(&content));
    root_overlay.add_overlay(&loading_overlay);

    let header_bar = HeaderBar::builder()
        .build();

    let search_entry = SearchEntry::builder()
        .placeholder_text("Search events, descriptions or years...")
        .width_chars(32)
        .build();
    header_bar.set_title_widget(Some(&search_entry));

    let refresh_button = gtk::Button::builder()
        .icon_name("view-refresh-symbolic")
        .tooltip_text("Refresh events")
        .build();
    let random_button = gtk::Button::builder()
        .label("Random Year")
        .tooltip_text("Add events from a random year")
        .build();
    let region_spinner = gtk::Spinner::builder()
        .tooltip_text("Loading events for this region")
        .visible(false)
        .build();

    header_bar.pack_start(&refresh_button);
    header_bar.pack_start(&random_button);
    header_bar.pack_end(&region_spinner);

    let category_bar = gtk::Box::builder()
        .orientation(Orientation::Horizontal)
        .spacing(6)
        .halign(Align::Center)
        .margin_top(6)
        .margin_bottom(6)
        .build();
    let category_buttons: Vec<(Category, gtk::ToggleButton)> = Category::ALL
        .iter()
        .map(|&category| {
            let button = gtk::ToggleButton::builder()
                .label(category.name())
                .active(true)
                .sensitive(false)
                .build();
            button.add_css_class("category-toggle");
            button.add_css_class(&category.css_class());
            category_bar.append(&button);
            (category, button)
        })
        .collect();

    let year_range = config.events.year_range();
    let timescape = TimeScape {
        config: config.clone(),
        state: Rc::new(RefCell::new(AppState::new(year_range))),
        source,
        cache,
        region_loader: RegionLoader::new(config.map.min_region_zoom, config.map.region_throttle()),
        map: map_control,
        timeline: timeline_control,
        content,
        loading_overlay,
        region_spinner,
        search_entry: search_entry.clone(),
        category_buttons: Rc::new(category_buttons),
        action_buttons: Rc::new(vec![refresh_button.clone(), random_button.clone(), empty_refresh.clone()]),
        syncing_controls: Rc::new(Cell::new(false)),
        load_abort: Rc::new(RefCell::new(None)),
    };
    if app_cell.set(timescape.clone()).is_err() {
        warn!("Application state initialised twice");
    }

    for (category, button) in timescape.category_buttons.iter() {
        let app = timescape.clone();
        let category = *category;
        button.connect_toggled(move |button| {
            if app.syncing_controls.get() {
                return;
            }
            app.state.borrow_mut().filter.toggle_category(category, button.is_active());
            app.refresh_views();
        });
    }

    let app_for_search = timescape.clone();
    search_entry.connect_search_changed(move |entry| {
        if app_for_search.syncing_controls.get() {
            return;
        }
        app_for_search.state.borrow_mut().filter.search = entry.text().to_string();
        app_for_search.refresh_views();
    });

    let app_for_refresh = timescape.clone();
    refresh_button.connect_clicked(move |_| app_for_refresh.load(true));
    let app_for_empty = timescape.clone();
    empty_refresh.connect_clicked(move |_| app_for_empty.load(true));
    let app_for_random = timescape.clone();
    random_button.connect_clicked(move |_| app_for_random.load_random_year());

    let toolbar_view = ToolbarView::builder()
        .build();
    toolbar_view.add_top_bar(&header_bar);
    toolbar_view.add_top_bar(&category_bar);
    toolbar_view.set_content(Some(&root_overlay));

    let window = ApplicationWindow::builder()
        .application(app)
        .title("TimeScape")
        .default_width(1200)
        .default_height(800)
        .build();

    let css_provider = gtk::CssProvider::new();
    css_provider.load_from_data(&stylesheet());
    gtk::style_context_add_provider_for_display(
        &gtk::prelude::WidgetExt::display(&window),
        &css_provider,
        gtk::STYLE_PROVIDER_PRIORITY_APPLICATION,
    );

    window.set_content(Some(&toolbar_view));
    window.present();

    timescape.load(false);
}

fn stylesheet() -> String {
    let mut css = String::from(
        ".floating-switcher {
            background-color: alpha(@window_bg_color, 0.85);
            border-radius: 12px;
            padding: 8px;
            box-shadow: 0 4px 12px alpha(black, 0.3);
        }
        .map-marker {
            background-color: alpha(@accent_bg_color, 0.75);
            border-radius: 16px;
            padding: 4px 10px;
            font-size: 11px;
            font-weight: bold;
            min-height: 0;
            min-width: 0;
            box-shadow: 0 2px 6px alpha(black, 0.4);
        }
        .map-marker:hover {
            background-color: alpha(@accent_bg_color, 0.95);
            box-shadow: 0 3px 8px alpha(black, 0.5);
        }
        .event-marker {
            border-radius: 9999px;
            border: 2px solid white;
            padding: 0;
            min-height: 0;
            min-width: 0;
            opacity: 0.85;
        }
        .event-marker:hover {
            opacity: 1;
        }
        .category-swatch {
            border-radius: 9999px;
        }
        .map-popover > contents {
            background-color: alpha(@card_bg_color, 0.95);
            border-radius: 12px;
            box-shadow: 0 4px 16px alpha(black, 0.6);
        }
        .event-count {
            background-color: alpha(@window_bg_color, 0.9);
            border-radius: 8px;
            padding: 8px 12px;
            font-weight: 600;
        }
        .loading-overlay {
            background-color: alpha(@card_bg_color, 0.95);
            border-radius: 12px;
            padding: 24px;
            box-shadow: 0 4px 16px alpha(black, 0.6);
        }
        .attribution {
            font-size: 11px;
            background-color: alpha(@window_bg_color, 0.8);
            border-radius: 8px;
            padding: 4px 10px;
            color: alpha(@window_fg_color, 0.6);
        }
        .timeline {
            background-color: #111827;
        }
        .category-toggle {
            font-size: 12px;
            padding: 2px 10px;
        }
        ",
    );

    for category in Category::ALL {
        let class = category.css_class();
        let color = category.color_hex();
        css.push_str(&format!(
            ".event-marker.{class}, .category-swatch.{class} {{ background-color: {color}; }}\n\
             .category-toggle.{class}:checked {{ background-color: alpha({color}, 0.35); }}\n"
        ));
    }

    css
}
