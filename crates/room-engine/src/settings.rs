//! Read-only configuration for the booking core.
//!
//! Every field has a documented default so an empty settings table is valid.
//! Settings can be deserialized from JSON or built from the string key/value
//! pairs a settings table would hold.

use chrono::{Duration, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{BookingError, Result};
use crate::model::{hhmm, parse_time};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Earliest allowed booking start (default 09:00).
    #[serde(with = "hhmm")]
    pub office_open: NaiveTime,
    /// Latest allowed booking end (default 20:00).
    #[serde(with = "hhmm")]
    pub office_close: NaiveTime,
    /// Shortest bookable slot (default 15).
    pub min_slot_minutes: u32,
    /// How long before the start check-in opens (default 15).
    pub checkin_early_minutes: u32,
    /// How long before the start a reminder becomes due (default 30).
    pub reminder_lead_minutes: u32,
    /// Hard cap on the number of dates a recurring request may expand to (default 366).
    pub max_series_occurrences: u16,
    /// IANA timezone that defines "today" and "now" for civil dates (default UTC).
    pub timezone: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            office_open: NaiveTime::MIN + Duration::hours(9),
            office_close: NaiveTime::MIN + Duration::hours(20),
            min_slot_minutes: 15,
            checkin_early_minutes: 15,
            reminder_lead_minutes: 30,
            max_series_occurrences: 366,
            timezone: "UTC".to_string(),
        }
    }
}

impl Settings {
    /// Build settings from string key/value pairs, starting from the defaults.
    ///
    /// Unknown keys are ignored; a known key with an unparsable value is a
    /// validation error.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut settings = Settings::default();
        for (key, value) in pairs {
            let value = value.trim();
            match key {
                "office_open" => settings.office_open = parse_time(value)?,
                "office_close" => settings.office_close = parse_time(value)?,
                "min_slot_minutes" => settings.min_slot_minutes = parse_number(key, value)?,
                "checkin_early_minutes" => {
                    settings.checkin_early_minutes = parse_number(key, value)?
                }
                "reminder_lead_minutes" => {
                    settings.reminder_lead_minutes = parse_number(key, value)?
                }
                "max_series_occurrences" => {
                    settings.max_series_occurrences = parse_number(key, value)?
                }
                "timezone" => settings.timezone = value.to_string(),
                _ => {}
            }
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Check internal consistency.
    ///
    /// # Errors
    /// Returns `BookingError::Validation` when office hours are inverted, a
    /// minimum is zero, or the timezone is not a valid IANA identifier.
    pub fn validate(&self) -> Result<()> {
        if self.office_open >= self.office_close {
            return Err(BookingError::Validation(
                "office_open must be before office_close".to_string(),
            ));
        }
        if self.min_slot_minutes == 0 {
            return Err(BookingError::Validation(
                "min_slot_minutes must be positive".to_string(),
            ));
        }
        if self.max_series_occurrences == 0 {
            return Err(BookingError::Validation(
                "max_series_occurrences must be positive".to_string(),
            ));
        }
        self.tz()?;
        Ok(())
    }

    /// The configured timezone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse()
            .map_err(|_| BookingError::Validation(format!("Invalid timezone: {}", self.timezone)))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| BookingError::Validation(format!("Invalid value for {key}: '{value}'")))
}
