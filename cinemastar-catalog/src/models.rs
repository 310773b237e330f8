use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ROWS: i32 = 9;
pub const DEFAULT_SEATS_PER_ROW: i32 = 13;

/// A cinema venue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cinema {
    pub id: i64,
    pub name: String,
    pub address: String,
}

/// A movie that can be screened at any number of cinemas
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
}

/// A scheduled screening (showtime) of one movie at one cinema.
///
/// The seat grid bounds live on the session itself so that halls of
/// different sizes can coexist in one catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub id: i64,
    pub movie_id: i64,
    pub cinema_id: i64,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    #[serde(default = "default_rows")]
    pub rows: i32,
    #[serde(default = "default_seats_per_row")]
    pub seats_per_row: i32,
}

fn default_rows() -> i32 { DEFAULT_ROWS }

fn default_seats_per_row() -> i32 { DEFAULT_SEATS_PER_ROW }

impl Session {
    /// Whether (row, number) falls inside this session's 1-indexed grid
    pub fn contains(&self, row: i32, number: i32) -> bool {
        (1..=self.rows).contains(&row) && (1..=self.seats_per_row).contains(&number)
    }

    /// Display label, e.g. "2024-12-20 18:00"
    pub fn label(&self) -> String {
        format!("{} {}", self.date.format("%Y-%m-%d"), self.time.format("%H:%M"))
    }
}

/// One bookable seat of a session's grid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Seat {
    pub id: i64,
    pub session_id: i64,
    pub row: i32,
    pub number: i32,
    pub is_booked: bool,
}

/// Showtimes travel as "HH:MM"
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(rows: i32, seats_per_row: i32) -> Session {
        Session {
            id: 1,
            movie_id: 1,
            cinema_id: 1,
            date: NaiveDate::from_ymd_opt(2024, 12, 20).unwrap(),
            time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            rows,
            seats_per_row,
        }
    }

    #[test]
    fn test_grid_bounds() {
        let s = session(2, 3);
        assert!(s.contains(1, 1));
        assert!(s.contains(2, 3));
        assert!(!s.contains(0, 1));
        assert!(!s.contains(3, 1));
        assert!(!s.contains(1, 4));
        assert!(!s.contains(-1, -1));
    }

    #[test]
    fn test_session_label_and_time_format() {
        let s = session(9, 13);
        assert_eq!(s.label(), "2024-12-20 18:00");

        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["time"], "18:00");
        assert_eq!(json["date"], "2024-12-20");

        let back: Session = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }
}
