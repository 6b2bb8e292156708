//! Scheduler view state: focused date, view kind and display preferences.

use std::str::FromStr;

use anyhow::Result;
use appointly_core::SchedulerConfig;
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::locale::LocaleMessages;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerView {
    Day,
    #[default]
    Week,
    Month,
}

impl FromStr for SchedulerView {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(format!("unknown view: {}", other)),
        }
    }
}

/// Date navigator direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Previous,
    Next,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub current_date: NaiveDate,
    pub view: SchedulerView,
    pub start_day_hour: u32,
    pub end_day_hour: u32,
    pub locale: String,
    pub messages: LocaleMessages,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(Utc::now().date_naive())
    }
}

impl ViewState {
    pub fn new(current_date: NaiveDate) -> Self {
        let defaults = SchedulerConfig::default();
        Self {
            current_date,
            view: SchedulerView::default(),
            start_day_hour: defaults.start_day_hour,
            end_day_hour: defaults.end_day_hour,
            locale: defaults.locale,
            messages: LocaleMessages::default(),
        }
    }

    /// Build the initial state from config, focused on today.
    ///
    /// A missing messages file falls back to the widget's built-in strings.
    ///
    /// # Errors
    /// Fails if the configured messages file exists but can't be read or parsed.
    pub fn from_config(config: &SchedulerConfig) -> Result<Self> {
        let messages = match &config.messages_path {
            Some(path) if !path.exists() => {
                tracing::warn!(
                    "Locale messages {} not found, using built-in messages",
                    path.display()
                );
                LocaleMessages::default()
            }
            Some(path) => LocaleMessages::load(path)?,
            None => LocaleMessages::default(),
        };

        Ok(Self {
            current_date: Utc::now().date_naive(),
            view: SchedulerView::default(),
            start_day_hour: config.start_day_hour,
            end_day_hour: config.end_day_hour,
            locale: config.locale.clone(),
            messages,
        })
    }

    /// Move the focused date by one unit of the current view.
    pub fn navigate(&mut self, direction: Navigation) {
        let date = self.current_date;
        let moved = match (self.view, direction) {
            (SchedulerView::Day, Navigation::Previous) => date.checked_sub_signed(Duration::days(1)),
            (SchedulerView::Day, Navigation::Next) => date.checked_add_signed(Duration::days(1)),
            (SchedulerView::Week, Navigation::Previous) => date.checked_sub_signed(Duration::days(7)),
            (SchedulerView::Week, Navigation::Next) => date.checked_add_signed(Duration::days(7)),
            (SchedulerView::Month, Navigation::Previous) => date.checked_sub_months(Months::new(1)),
            (SchedulerView::Month, Navigation::Next) => date.checked_add_months(Months::new(1)),
        };
        self.current_date = moved.unwrap_or(date);
    }

    /// Half-open `[start, end)` range the current view displays.
    ///
    /// Weeks start on Sunday. The month view covers the calendar month.
    pub fn visible_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let date = self.current_date;
        // Ranges running past the calendar's limits are clamped to them.
        let (first, last) = match self.view {
            SchedulerView::Day => (date, date.checked_add_signed(Duration::days(1))),
            SchedulerView::Week => {
                let offset = i64::from(date.weekday().num_days_from_sunday());
                let first = date
                    .checked_sub_signed(Duration::days(offset))
                    .unwrap_or(NaiveDate::MIN);
                (first, first.checked_add_signed(Duration::days(7)))
            }
            SchedulerView::Month => {
                let first = date.with_day(1).unwrap_or(date);
                (first, first.checked_add_months(Months::new(1)))
            }
        };
        let last = last.unwrap_or(NaiveDate::MAX);

        (midnight(first), midnight(last))
    }

    /// Hour band shown by time-grid views; month view has none.
    pub fn visible_hours(&self) -> Option<(u32, u32)> {
        match self.view {
            SchedulerView::Day | SchedulerView::Week => {
                Some((self.start_day_hour, self.end_day_hour))
            }
            SchedulerView::Month => None,
        }
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::default()).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn state(view: SchedulerView, y: i32, m: u32, d: u32) -> ViewState {
        let mut state = ViewState::new(NaiveDate::from_ymd_opt(y, m, d).unwrap());
        state.view = view;
        state
    }

    #[test]
    fn test_week_range_starts_on_sunday() {
        // 2024-01-10 is a Wednesday
        let (start, end) = state(SchedulerView::Week, 2024, 1, 10).visible_range();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 7, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 1, 14, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_month_range() {
        let (start, end) = state(SchedulerView::Month, 2024, 2, 17).visible_range();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_navigate_by_view_unit() {
        let mut s = state(SchedulerView::Day, 2024, 1, 31);
        s.navigate(Navigation::Next);
        assert_eq!(s.current_date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());

        s.view = SchedulerView::Week;
        s.navigate(Navigation::Previous);
        assert_eq!(s.current_date, NaiveDate::from_ymd_opt(2024, 1, 25).unwrap());

        s.view = SchedulerView::Month;
        s.current_date = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        s.navigate(Navigation::Previous);
        // Clamped to the end of February
        assert_eq!(s.current_date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_visible_hours() {
        assert_eq!(state(SchedulerView::Day, 2024, 1, 1).visible_hours(), Some((9, 18)));
        assert_eq!(state(SchedulerView::Month, 2024, 1, 1).visible_hours(), None);
    }

    #[test]
    fn test_from_config_loads_messages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pl.json");
        std::fs::write(&path, r#"{"today":"Dzisiaj"}"#).unwrap();

        let config = SchedulerConfig {
            locale: "pl-PL".into(),
            start_day_hour: 8,
            end_day_hour: 20,
            messages_path: Some(path),
        };

        let state = ViewState::from_config(&config).unwrap();
        assert_eq!(state.start_day_hour, 8);
        assert_eq!(state.messages.as_value()["today"], "Dzisiaj");
    }

    #[test]
    fn test_visible_range_at_calendar_end() {
        for view in [SchedulerView::Day, SchedulerView::Week, SchedulerView::Month] {
            let mut s = ViewState::new(NaiveDate::MAX);
            s.view = view;
            let (start, end) = s.visible_range();
            assert!(start <= end);
            assert_eq!(end.date_naive(), NaiveDate::MAX);

            s.current_date = NaiveDate::MIN;
            let (start, _) = s.visible_range();
            assert!(start.date_naive() >= NaiveDate::MIN);
        }
    }

    #[test]
    fn test_from_config_without_messages_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = SchedulerConfig {
            locale: "pl-PL".into(),
            start_day_hour: 9,
            end_day_hour: 18,
            messages_path: Some(dir.path().join("missing.json")),
        };

        let state = ViewState::from_config(&config).unwrap();
        assert_eq!(state.locale, "pl-PL");
        assert!(state.messages.is_empty());
    }

    #[test]
    fn test_from_config_rejects_malformed_messages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pl.json");
        std::fs::write(&path, "{ not json").unwrap();
        let config = SchedulerConfig {
            locale: "pl-PL".into(),
            start_day_hour: 9,
            end_day_hour: 18,
            messages_path: Some(path),
        };

        assert!(ViewState::from_config(&config).is_err());
    }

    #[test]
    fn test_view_from_str() {
        assert_eq!("Month".parse::<SchedulerView>(), Ok(SchedulerView::Month));
        assert!("agenda".parse::<SchedulerView>().is_err());
    }
}
