//! JSON formats for task dates (`YYYY-MM-DD`) and start times (`HH:MM`).

use serde::{Deserialize, Deserializer, Serializer};
use time::{macros::format_description, Date, Time};

pub fn parse_date(s: &str) -> Option<Date> {
    Date::parse(s.trim(), format_description!("[year]-[month]-[day]")).ok()
}

pub fn format_date(d: Date) -> String {
    d.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_default()
}

/// Accepts `HH:MM` and `HH:MM:SS`; seconds are dropped.
pub fn parse_time(s: &str) -> Option<Time> {
    let s = s.trim();
    Time::parse(s, format_description!("[hour]:[minute]"))
        .or_else(|_| Time::parse(s, format_description!("[hour]:[minute]:[second]")))
        .ok()
        .and_then(|t| Time::from_hms(t.hour(), t.minute(), 0).ok())
}

pub fn format_time(t: Time) -> String {
    t.format(format_description!("[hour]:[minute]"))
        .unwrap_or_default()
}

pub mod date {
    use super::*;

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(value: &Option<Date>, s: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(d) => s.serialize_str(&format_date(*d)),
                None => s.serialize_none(),
            }
        }
    }
}

pub mod time_of_day {
    use super::*;

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(value: &Option<Time>, s: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(t) => s.serialize_str(&format_time(*t)),
                None => s.serialize_none(),
            }
        }
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub fn nullable<'de, D, T>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}
