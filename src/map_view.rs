use gtk::prelude::*;
use gtk::{glib, Align, Label, Orientation, Popover};
use libshumate::prelude::{LocationExt, MarkerExt};
use log::{debug, error};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::config::MapConfig;
use crate::data::{GeocodedEvent, MapBounds};
use crate::filter::shown_label;
use crate::map_layout::{bounds_of, cluster_points, fit_camera, marker_radius, Cluster, FitPolicy, CLUSTER_CELL_PX};

const SETTLE_DELAY: Duration = Duration::from_millis(300);
const MIN_ZOOM: u32 = 1;
const MAX_ZOOM: u32 = 10;
const FALLBACK_SIZE: (f64, f64) = (800.0, 600.0);

type SettleHandler = Rc<dyn Fn(MapBounds, f64)>;

#[derive(Clone)]
pub struct MapControl {
    map: libshumate::SimpleMap,
    marker_layer: Option<libshumate::MarkerLayer>,
    count_label: Label,
    shown: Rc<RefCell<Vec<GeocodedEvent>>>,
    fit_policy: Rc<RefCell<FitPolicy>>,
    settle_timer: Rc<RefCell<Option<glib::SourceId>>>,
}

impl MapControl {
    /// Replaces the displayed markers. Moves the camera when the fit policy
    /// allows it.
    pub fn show_events(&self, events: Vec<GeocodedEvent>) {
        let count = events.len();
        *self.shown.borrow_mut() = events;
        self.count_label.set_label(&shown_label(count));
        self.rebuild_markers();

        let should_fit = self.fit_policy.borrow().should_fit(count);
        if should_fit {
            self.fit_to_shown();
            self.fit_policy.borrow_mut().record_fit(count);
        }
    }

    /// Lets the next marker set move the camera again.
    pub fn reset_fit(&self) {
        self.fit_policy.borrow_mut().reset();
    }

    fn viewport(&self) -> Option<libshumate::Viewport> {
        self.map.map().and_then(|map| map.viewport())
    }

    fn zoom_level(&self) -> f64 {
        self.viewport().map(|v| v.zoom_level()).unwrap_or(2.0)
    }

    fn widget_size(&self) -> (f64, f64) {
        let (width, height) = (self.map.width() as f64, self.map.height() as f64);
        if width > 0.0 && height > 0.0 {
            (width, height)
        } else {
            FALLBACK_SIZE
        }
    }

    /// Geographic rectangle currently on screen.
    pub fn visible_bounds(&self) -> Option<MapBounds> {
        let map = self.map.map()?;
        let viewport = map.viewport()?;
        let (width, height) = (map.width() as f64, map.height() as f64);
        if width <= 0.0 || height <= 0.0 {
            return None;
        }

        let (north, west) = viewport.widget_coords_to_location(&map, 0.0, 0.0);
        let (south, east) = viewport.widget_coords_to_location(&map, width, height);
        Some(MapBounds { north, south, east, west })
    }

    fn fly_to(&self, latitude: f64, longitude: f64, zoom: f64) {
        if let Some(map) = self.map.map() {
            map.go_to_full(latitude, longitude, zoom);
        }
    }

    fn fit_to_shown(&self) {
        let points: Vec<(f64, f64)> = self
            .shown
            .borrow()
            .iter()
            .map(|e| (e.latitude, e.longitude))
            .collect();
        if let Some(bounds) = bounds_of(&points) {
            let (width, height) = self.widget_size();
            let (latitude, longitude, zoom) = fit_camera(&bounds, width, height);
            debug!("Fitting map to {} events at zoom {:.2}", points.len(), zoom);
            self.fly_to(latitude, longitude, zoom);
        }
    }

    /// Re-clusters the shown events at the current zoom.
    fn rebuild_markers(&self) {
        let Some(layer) = self.marker_layer.as_ref() else {
            return;
        };
        layer.remove_all();

        let shown = self.shown.borrow();
        let points: Vec<(f64, f64)> = shown.iter().map(|e| (e.latitude, e.longitude)).collect();
        for cluster in cluster_points(&points, self.zoom_level(), CLUSTER_CELL_PX) {
            let marker = libshumate::Marker::new();
            let child = if cluster.is_single() {
                create_event_marker(&shown[cluster.members[0]])
            } else {
                create_cluster_marker(self, &cluster)
            };
            marker.set_child(Some(&child));
            marker.set_location(cluster.latitude, cluster.longitude);
            layer.add_marker(&marker);
        }
    }

    fn zoom_into(&self, cluster: &Cluster) {
        let (width, height) = self.widget_size();
        let (latitude, longitude, fitted) = fit_camera(&cluster.bounds, width, height);
        let zoom = fitted.max(self.zoom_level() + 1.0).min(MAX_ZOOM as f64);
        self.fly_to(latitude, longitude, zoom);
    }

    fn settled(&self, on_settle: &SettleHandler) {
        self.rebuild_markers();
        if let Some(bounds) = self.visible_bounds() {
            on_settle(bounds, self.zoom_level());
        }
    }
}

pub fn create_map_view(config: &MapConfig, on_settle: impl Fn(MapBounds, f64) + 'static) -> (gtk::Overlay, MapControl) {
    let map = libshumate::SimpleMap::new();
    let map_source = libshumate::RasterRenderer::from_url(&config.tile_url);
    map.set_map_source(Some(&map_source));
    map.set_vexpand(true);
    map.set_hexpand(true);

    let marker_layer = map.map().and_then(|map_view| {
        let viewport = map_view.viewport()?;
        let layer = libshumate::MarkerLayer::new(&viewport);
        map_view.add_layer(&layer);

        viewport.set_min_zoom_level(MIN_ZOOM);
        viewport.set_max_zoom_level(MAX_ZOOM);
        map_view.go_to_full(20.0, 0.0, 2.0);

        Some(layer)
    });

    let count_label = Label::builder()
        .label(&shown_label(0))
        .halign(Align::End)
        .valign(Align::Start)
        .margin_top(12)
        .margin_end(12)
        .build();
    count_label.add_css_class("event-count");

    let overlay = gtk::Overlay::new();
    overlay.set_child(Some(&map));
    overlay.add_overlay(&count_label);

    let control = MapControl {
        map: map.clone(),
        marker_layer,
        count_label,
        shown: Rc::new(RefCell::new(Vec::new())),
        fit_policy: Rc::new(RefCell::new(FitPolicy::default())),
        settle_timer: Rc::new(RefCell::new(None)),
    };

    // Any drag or scroll by the user pins the camera.
    let drag = gtk::GestureDrag::new();
    drag.set_propagation_phase(gtk::PropagationPhase::Capture);
    let fit_policy = control.fit_policy.clone();
    drag.connect_drag_begin(move |_, _, _| {
        fit_policy.borrow_mut().mark_user_interaction();
    });
    map.add_controller(drag);

    let scroll = gtk::EventControllerScroll::new(gtk::EventControllerScrollFlags::VERTICAL);
    scroll.set_propagation_phase(gtk::PropagationPhase::Capture);
    let fit_policy = control.fit_policy.clone();
    scroll.connect_scroll(move |_, _, _| {
        fit_policy.borrow_mut().mark_user_interaction();
        glib::Propagation::Proceed
    });
    map.add_controller(scroll);

    if let Some(viewport) = control.viewport() {
        let on_settle: SettleHandler = Rc::new(on_settle);
        for property in ["zoom-level", "latitude", "longitude"] {
            let control = control.clone();
            let on_settle = on_settle.clone();
            viewport.connect_notify_local(Some(property), move |_, _| {
                schedule_settle(&control, &on_settle);
            });
        }
    }

    (overlay, control)
}

/// Restarts the settle timer; the handler runs once movement stops.
fn schedule_settle(control: &MapControl, on_settle: &SettleHandler) {
    if let Some(previous) = control.settle_timer.borrow_mut().take() {
        previous.remove();
    }

    let control_clone = control.clone();
    let on_settle = on_settle.clone();
    let source = glib::timeout_add_local_once(SETTLE_DELAY, move || {
        control_clone.settle_timer.borrow_mut().take();
        control_clone.settled(&on_settle);
    });
    *control.settle_timer.borrow_mut() = Some(source);
}

fn create_cluster_marker(control: &MapControl, cluster: &Cluster) -> gtk::Button {
    let button = gtk::Button::builder()
        .label(&cluster.members.len().to_string())
        .tooltip_text("Zoom in")
        .build();
    button.add_css_class("map-marker");
    button.add_css_class("cluster-marker");

    let control = control.clone();
    let cluster = cluster.clone();
    button.connect_clicked(move |_| {
        control.fit_policy.borrow_mut().mark_user_interaction();
        control.zoom_into(&cluster);
    });

    button
}

fn create_event_marker(event: &GeocodedEvent) -> gtk::Button {
    let size = (marker_radius(event.event.year) * 2.0).round() as i32;
    let button = gtk::Button::builder()
        .tooltip_text(&event.event.title)
        .width_request(size)
        .height_request(size)
        .build();
    button.add_css_class("event-marker");
    button.add_css_class(&event.event.category.css_class());

    let event = event.clone();
    button.connect_clicked(move |button| {
        let popover = create_event_popover(&event);
        popover.set_parent(button);
        popover.connect_closed(|popover| popover.unparent());
        popover.popup();
    });

    button
}

fn create_event_popover(event: &GeocodedEvent) -> Popover {
    let event = &event.event;
    let popover = Popover::builder().build();
    popover.add_css_class("map-popover");

    let content = gtk::Box::builder()
        .orientation(Orientation::Vertical)
        .spacing(6)
        .margin_top(10)
        .margin_bottom(10)
        .margin_start(10)
        .margin_end(10)
        .width_request(220)
        .build();

    let category_row = gtk::Box::builder()
        .orientation(Orientation::Horizontal)
        .spacing(6)
        .build();
    let swatch = gtk::Box::builder()
        .width_request(12)
        .height_request(12)
        .valign(Align::Center)
        .build();
    swatch.add_css_class("category-swatch");
    swatch.add_css_class(&event.category.css_class());
    let category_label = Label::builder()
        .label(event.category.name())
        .xalign(0.0)
        .build();
    category_label.add_css_class("caption-heading");
    category_row.append(&swatch);
    category_row.append(&category_label);
    content.append(&category_row);

    let title = Label::builder()
        .label(&event.title)
        .xalign(0.0)
        .wrap(true)
        .max_width_chars(36)
        .build();
    title.add_css_class("title-3");
    content.append(&title);

    let year = Label::builder()
        .label(&format!("Year: {}", event.year))
        .xalign(0.0)
        .build();
    year.add_css_class("dim-label");
    content.append(&year);

    let description = Label::builder()
        .label(&event.description)
        .xalign(0.0)
        .wrap(true)
        .max_width_chars(36)
        .build();
    content.append(&description);

    if !event.url.is_empty() {
        let read_more = gtk::Button::builder()
            .label("Read more on Wikipedia")
            .halign(Align::Start)
            .build();
        read_more.add_css_class("flat");
        let url = event.url.clone();
        read_more.connect_clicked(move |_| {
            if let Err(e) = open::that(&url) {
                error!("Failed to open URL {}: {}", url, e);
            }
        });
        content.append(&read_more);
    }

    popover.set_child(Some(&content));
    popover
}
