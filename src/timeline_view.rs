use gtk::prelude::*;
use gtk::{cairo, glib, Align, Label, Orientation};
use log::error;
use std::cell::{Cell, RefCell};
use std::f64::consts::PI;
use std::rc::Rc;

use crate::data::HistoricalEvent;
use crate::filter::shown_label;
use crate::timeline_layout::{TimelineLayout, ViewTransform, MARGIN_TOP, NODE_RADIUS, SLIDER_MAX};

const ZOOM_STEP: f64 = 1.1;
const HOVER_RADIUS: f64 = 12.0;
const INNER_RADIUS: f64 = 4.0;
const TICK_HALF_HEIGHT: f64 = 10.0;

#[derive(Default)]
struct TimelineState {
    events: Vec<HistoricalEvent>,
    transform: ViewTransform,
    hovered: Option<usize>,
    pointer: (f64, f64),
    press: (f64, f64),
    drag_start_tx: f64,
}

#[derive(Clone)]
pub struct TimelineControl {
    area: gtk::DrawingArea,
    slider: gtk::Scale,
    year_label: Label,
    count_label: Label,
    state: Rc<RefCell<TimelineState>>,
    /// Set while the view itself moves the slider.
    syncing_slider: Rc<Cell<bool>>,
}

impl TimelineControl {
    pub fn show_events(&self, events: Vec<HistoricalEvent>) {
        self.count_label.set_label(&shown_label(events.len()));
        {
            let mut state = self.state.borrow_mut();
            state.events = events;
            state.transform = ViewTransform::default();
            state.hovered = None;
        }
        self.area.set_tooltip_text(None);
        self.redraw();
    }

    fn layout(&self) -> Option<TimelineLayout> {
        let state = self.state.borrow();
        TimelineLayout::compute(&state.events, self.area.width() as f64, self.area.height() as f64)
    }

    fn redraw(&self) {
        self.area.queue_draw();
        self.sync_slider();
    }

    /// Reports the centred year back to the slider without re-centring.
    fn sync_slider(&self) {
        let Some(layout) = self.layout() else {
            return;
        };
        let transform = self.state.borrow().transform;
        let year = layout.centered_year(&transform, self.area.width() as f64);

        self.syncing_slider.set(true);
        self.slider.set_value(layout.year_to_slider(year));
        self.syncing_slider.set(false);
        self.year_label.set_label(&format!("{:.0}", year));
    }

    fn center_on_slider(&self, position: f64) {
        let Some(layout) = self.layout() else {
            return;
        };
        let year = layout.slider_to_year(position);
        {
            let mut state = self.state.borrow_mut();
            layout.center_on(&mut state.transform, year, self.area.width() as f64);
        }
        self.year_label.set_label(&format!("{:.0}", year));
        self.area.queue_draw();
    }

    fn event_at(&self, x: f64, y: f64) -> Option<usize> {
        let layout = self.layout()?;
        let transform = self.state.borrow().transform;
        layout.hit_test(&transform, x, y)
    }

    fn update_hover(&self, x: f64, y: f64) {
        let hovered = self.event_at(x, y);
        let changed = {
            let mut state = self.state.borrow_mut();
            state.pointer = (x, y);
            let changed = state.hovered != hovered;
            state.hovered = hovered;
            changed
        };
        if !changed {
            return;
        }

        let tooltip = hovered.and_then(|index| {
            self.state.borrow().events.get(index).map(|event| {
                format!(
                    "{} ({})\n{}\n{}",
                    glib::markup_escape_text(&event.title),
                    event.year,
                    event.category,
                    glib::markup_escape_text(&event.description)
                )
            })
        });
        self.area.set_tooltip_markup(tooltip.as_deref());
        self.area.queue_draw();
    }

    fn open_event_at(&self, x: f64, y: f64) {
        let Some(index) = self.event_at(x, y) else {
            return;
        };
        let url = match self.state.borrow().events.get(index) {
            Some(event) if !event.url.is_empty() => event.url.clone(),
            _ => return,
        };
        if let Err(e) = open::that(&url) {
            error!("Failed to open URL {}: {}", url, e);
        }
    }
}

pub fn create_timeline_view() -> (gtk::Box, TimelineControl) {
    let container = gtk::Box::builder()
        .orientation(Orientation::Vertical)
        .build();

    let area = gtk::DrawingArea::builder()
        .hexpand(true)
        .vexpand(true)
        .build();
    area.add_css_class("timeline");

    let count_label = Label::builder()
        .label(&shown_label(0))
        .halign(Align::End)
        .valign(Align::Start)
        .margin_top(12)
        .margin_end(12)
        .build();
    count_label.add_css_class("event-count");

    let overlay = gtk::Overlay::new();
    overlay.set_child(Some(&area));
    overlay.add_overlay(&count_label);

    let slider = gtk::Scale::with_range(Orientation::Horizontal, 0.0, SLIDER_MAX, 1.0);
    slider.set_draw_value(false);
    slider.set_hexpand(true);

    let year_label = Label::builder()
        .label("")
        .width_chars(6)
        .build();
    year_label.add_css_class("monospace");

    let slider_row = gtk::Box::builder()
        .orientation(Orientation::Horizontal)
        .spacing(12)
        .margin_start(24)
        .margin_end(24)
        .margin_bottom(84)
        .build();
    slider_row.append(&slider);
    slider_row.append(&year_label);

    container.append(&overlay);
    container.append(&slider_row);

    let control = TimelineControl {
        area: area.clone(),
        slider: slider.clone(),
        year_label,
        count_label,
        state: Rc::new(RefCell::new(TimelineState::default())),
        syncing_slider: Rc::new(Cell::new(false)),
    };

    let state = control.state.clone();
    area.set_draw_func(move |_, cr, width, height| {
        let state = state.borrow();
        if let Some(layout) = TimelineLayout::compute(&state.events, width as f64, height as f64) {
            draw_timeline(cr, &layout, &state, width as f64);
        }
    });

    let control_clone = control.clone();
    slider.connect_value_changed(move |slider| {
        if !control_clone.syncing_slider.get() {
            control_clone.center_on_slider(slider.value());
        }
    });

    let drag = gtk::GestureDrag::new();
    let control_clone = control.clone();
    drag.connect_drag_begin(move |_, _, _| {
        let mut state = control_clone.state.borrow_mut();
        state.drag_start_tx = state.transform.tx;
    });
    let control_clone = control.clone();
    drag.connect_drag_update(move |_, offset_x, _| {
        {
            let mut state = control_clone.state.borrow_mut();
            state.transform.tx = state.drag_start_tx;
            state.transform.pan(offset_x);
        }
        control_clone.redraw();
    });
    area.add_controller(drag);

    let scroll = gtk::EventControllerScroll::new(gtk::EventControllerScrollFlags::VERTICAL);
    let control_clone = control.clone();
    scroll.connect_scroll(move |_, _, dy| {
        {
            let mut state = control_clone.state.borrow_mut();
            let pointer_x = state.pointer.0;
            state.transform.zoom_at(pointer_x, ZOOM_STEP.powf(-dy));
        }
        control_clone.redraw();
        glib::Propagation::Stop
    });
    area.add_controller(scroll);

    let motion = gtk::EventControllerMotion::new();
    let control_clone = control.clone();
    motion.connect_motion(move |_, x, y| {
        control_clone.update_hover(x, y);
    });
    let control_clone = control.clone();
    motion.connect_leave(move |_| {
        let had_hover = control_clone.state.borrow_mut().hovered.take().is_some();
        if had_hover {
            control_clone.area.set_tooltip_text(None);
            control_clone.area.queue_draw();
        }
    });
    area.add_controller(motion);

    let click = gtk::GestureClick::new();
    let control_clone = control.clone();
    click.connect_pressed(move |_, _, x, y| {
        control_clone.state.borrow_mut().press = (x, y);
    });
    let control_clone = control.clone();
    click.connect_released(move |_, _, x, y| {
        // A drag also ends in a release; only a still pointer is a click.
        let (px, py) = control_clone.state.borrow().press;
        if (px - x).abs() < 4.0 && (py - y).abs() < 4.0 {
            control_clone.open_event_at(x, y);
        }
    });
    area.add_controller(click);

    let control_clone = control.clone();
    area.connect_resize(move |_, _, _| {
        control_clone.sync_slider();
    });

    (container, control)
}

fn draw_timeline(cr: &cairo::Context, layout: &TimelineLayout, state: &TimelineState, width: f64) {
    let transform = &state.transform;
    let axis_y = MARGIN_TOP + layout.axis_y;
    let top = MARGIN_TOP;
    let bottom = MARGIN_TOP + layout.plot_height;

    cr.select_font_face("Sans", cairo::FontSlant::Normal, cairo::FontWeight::Bold);
    cr.set_font_size(14.0);
    for band in &layout.bands {
        let x0 = transform.to_screen_x(band.x0);
        let x1 = transform.to_screen_x(band.x1);
        if band.tinted {
            cr.set_source_rgba(30.0 / 255.0, 58.0 / 255.0, 138.0 / 255.0, 0.12);
        } else {
            cr.set_source_rgba(55.0 / 255.0, 65.0 / 255.0, 81.0 / 255.0, 0.12);
        }
        cr.rectangle(x0, top, x1 - x0, bottom - top);
        let _ = cr.fill();

        cr.set_source_rgba(148.0 / 255.0, 163.0 / 255.0, 184.0 / 255.0, 0.5);
        draw_centered_text(cr, band.label, transform.to_screen_x(band.label_x), top + 30.0);
    }

    // Axis
    cr.set_source_rgba(59.0 / 255.0, 130.0 / 255.0, 246.0 / 255.0, 0.5);
    cr.set_line_width(2.0);
    cr.move_to(transform.to_screen_x(0.0).max(0.0), axis_y);
    cr.line_to(transform.to_screen_x(layout.scale.width).min(width), axis_y);
    let _ = cr.stroke();

    cr.select_font_face("monospace", cairo::FontSlant::Normal, cairo::FontWeight::Normal);
    cr.set_font_size(12.0);
    cr.set_line_width(1.0);
    for &year in &layout.ticks {
        let x = transform.to_screen_x(layout.scale.x(year));
        if x < 0.0 || x > width {
            continue;
        }
        cr.set_source_rgba(148.0 / 255.0, 163.0 / 255.0, 184.0 / 255.0, 0.3);
        cr.move_to(x, axis_y - TICK_HALF_HEIGHT);
        cr.line_to(x, axis_y + TICK_HALF_HEIGHT);
        let _ = cr.stroke();

        cr.set_source_rgba(148.0 / 255.0, 163.0 / 255.0, 184.0 / 255.0, 0.7);
        draw_centered_text(cr, &format!("{:.0}", year), x, axis_y + 30.0);
    }

    for node in &layout.nodes {
        let (r, g, b) = state.events[node.index].category.rgb();
        let x = transform.to_screen_x(node.x);
        cr.set_source_rgba(r, g, b, 0.4);
        cr.move_to(x, axis_y);
        cr.line_to(x, MARGIN_TOP + node.y);
        let _ = cr.stroke();
    }

    for node in &layout.nodes {
        let (r, g, b) = state.events[node.index].category.rgb();
        let x = transform.to_screen_x(node.x);
        let y = MARGIN_TOP + node.y;
        let radius = if state.hovered == Some(node.index) { HOVER_RADIUS } else { NODE_RADIUS };

        cr.set_source_rgba(r, g, b, 0.8);
        cr.arc(x, y, radius, 0.0, 2.0 * PI);
        let _ = cr.fill_preserve();
        cr.set_line_width(2.0);
        cr.set_source_rgb(r, g, b);
        let _ = cr.stroke();

        cr.set_source_rgba(1.0, 1.0, 1.0, 0.9);
        cr.arc(x, y, INNER_RADIUS, 0.0, 2.0 * PI);
        let _ = cr.fill();
    }
}

fn draw_centered_text(cr: &cairo::Context, text: &str, x: f64, y: f64) {
    if let Ok(extents) = cr.text_extents(text) {
        cr.move_to(x - extents.width() / 2.0 - extents.x_bearing(), y);
        let _ = cr.show_text(text);
    }
}
