use std::collections::BTreeSet;

use crate::data::{AsEvent, Category};

/// What the header bar currently narrows the views to.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFilter {
    /// Empty means every category.
    pub categories: BTreeSet<Category>,
    /// Inclusive.
    pub year_range: (i32, i32),
    pub search: String,
}

impl EventFilter {
    pub fn new(year_range: (i32, i32)) -> Self {
        Self {
            categories: BTreeSet::new(),
            year_range,
            search: String::new(),
        }
    }

    pub fn toggle_category(&mut self, category: Category, active: bool) {
        if active {
            self.categories.insert(category);
        } else {
            self.categories.remove(&category);
        }
    }

    pub fn matches<E: AsEvent>(&self, item: &E) -> bool {
        let event = item.event();

        if !self.categories.is_empty() && !self.categories.contains(&event.category) {
            return false;
        }

        let (start, end) = self.year_range;
        if event.year < start || event.year > end {
            return false;
        }

        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        event.title.to_lowercase().contains(&needle)
            || event.description.to_lowercase().contains(&needle)
            || event.year.to_string().contains(&needle)
    }

    pub fn apply<'a, E: AsEvent>(&self, items: &'a [E]) -> Vec<&'a E> {
        items.iter().filter(|item| self.matches(*item)).collect()
    }
}

/// Text of the "N events shown" indicator.
pub fn shown_label(count: usize) -> String {
    if count == 1 {
        "1 event shown".to_string()
    } else {
        format!("{} events shown", count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{GeocodedEvent, HistoricalEvent};

    fn event(year: i32, title: &str, description: &str, category: Category) -> HistoricalEvent {
        HistoricalEvent {
            year,
            title: title.to_string(),
            description: description.to_string(),
            category,
            url: String::new(),
            month: None,
            day: None,
        }
    }

    fn sample() -> Vec<HistoricalEvent> {
        vec![
            event(1969, "Apollo 11", "First crewed Moon landing", Category::Science),
            event(1815, "Battle of Waterloo", "Napoleon is defeated", Category::Politics),
            event(1605, "Don Quixote", "First part is published", Category::Culture),
        ]
    }

    fn years(events: &[&HistoricalEvent]) -> Vec<i32> {
        events.iter().map(|e| e.year).collect()
    }

    #[test]
    fn empty_category_set_keeps_everything() {
        let filter = EventFilter::new((1000, 2024));
        assert_eq!(filter.apply(&sample()).len(), 3);
    }

    #[test]
    fn selected_categories_narrow_the_result() {
        let mut filter = EventFilter::new((1000, 2024));
        filter.toggle_category(Category::Science, true);
        filter.toggle_category(Category::Culture, true);
        assert_eq!(years(&filter.apply(&sample())), vec![1969, 1605]);

        filter.toggle_category(Category::Science, false);
        assert_eq!(years(&filter.apply(&sample())), vec![1605]);
    }

    #[test]
    fn year_range_is_inclusive() {
        let filter = EventFilter::new((1605, 1815));
        assert_eq!(years(&filter.apply(&sample())), vec![1815, 1605]);
    }

    #[test]
    fn search_is_case_insensitive_over_title_description_and_year() {
        let events = sample();
        let mut filter = EventFilter::new((1000, 2024));

        filter.search = "NAPOLEON".to_string();
        assert_eq!(years(&filter.apply(&events)), vec![1815]);

        filter.search = "apollo".to_string();
        assert_eq!(years(&filter.apply(&events)), vec![1969]);

        filter.search = "160".to_string();
        assert_eq!(years(&filter.apply(&events)), vec![1605]);

        filter.search = "first".to_string();
        assert_eq!(years(&filter.apply(&events)), vec![1969, 1605]);
    }

    #[test]
    fn shown_label_pluralizes() {
        assert_eq!(shown_label(0), "0 events shown");
        assert_eq!(shown_label(1), "1 event shown");
        assert_eq!(shown_label(42), "42 events shown");
    }

    #[test]
    fn filters_geocoded_events_too() {
        let located: Vec<GeocodedEvent> = sample()
            .into_iter()
            .map(|e| GeocodedEvent::new(e, (0.0, 0.0)))
            .collect();
        let mut filter = EventFilter::new((1000, 2024));
        filter.toggle_category(Category::Politics, true);

        let kept = filter.apply(&located);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].event.title, "Battle of Waterloo");
    }
}
