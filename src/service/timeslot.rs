//! Conversion between local wall-clock time slots and the canonical UTC form
//! that is written to storage.
//!
//! Everything persisted is UTC. Local values only exist at the HTTP boundary,
//! where the caller tells us its zone through a `tz_offset` parameter.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ConversionError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";
pub const CURRENT_SCHEMA_VERSION: &str = "3";

/// A clock time with minute precision, written as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(NaiveTime);

impl SlotTime {
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(SlotTime)
    }

    pub fn parse(input: &str) -> Result<Self, ConversionError> {
        let invalid = || ConversionError::InvalidTime { input: input.to_string() };
        let bytes = input.as_bytes();
        let well_formed = bytes.len() == 5
            && bytes[2] == b':'
            && bytes.iter().enumerate().all(|(i, b)| i == 2 || b.is_ascii_digit());
        if !well_formed {
            return Err(invalid());
        }
        NaiveTime::parse_from_str(input, TIME_FORMAT)
            .map(SlotTime)
            .map_err(|_| invalid())
    }

    fn truncate(time: NaiveTime) -> Self {
        // zones with second-level offsets still land on a whole minute
        SlotTime(time.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(time))
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIME_FORMAT))
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SlotTime::parse(&raw).map_err(serde::de::Error::custom)
    }
}

pub fn parse_date(input: &str) -> Result<NaiveDate, ConversionError> {
    let invalid = || ConversionError::InvalidDate { input: input.to_string() };
    let bytes = input.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !well_formed {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(input, DATE_FORMAT).map_err(|_| invalid())
}

/// Builds the caller's zone from a `tz_offset` given in minutes east of UTC.
pub fn zone_from_offset_minutes(minutes: i32) -> Result<FixedOffset, ConversionError> {
    if !(-1439..=1439).contains(&minutes) {
        return Err(ConversionError::InvalidOffset { minutes });
    }
    FixedOffset::east_opt(minutes * 60).ok_or(ConversionError::InvalidOffset { minutes })
}

/// One (calendar date, clock time) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: SlotTime,
}

impl Slot {
    pub fn new(date: NaiveDate, time: SlotTime) -> Self {
        Self { date, time }
    }

    pub fn parse(date: &str, time: &str) -> Result<Self, ConversionError> {
        Ok(Self::new(parse_date(date)?, SlotTime::parse(time)?))
    }

    fn from_naive(dt: NaiveDateTime) -> Self {
        Self::new(dt.date(), SlotTime::truncate(dt.time()))
    }

    fn naive(&self) -> NaiveDateTime {
        self.date.and_time(self.time.0)
    }

    /// Reads `self` as wall-clock time in `zone`. A repeated local time (clocks
    /// going back) resolves to its earliest instant.
    pub fn local_to_utc<Tz: TimeZone>(&self, zone: &Tz) -> Result<Slot, ConversionError> {
        let instant = match zone.from_local_datetime(&self.naive()) {
            LocalResult::Single(dt) => dt,
            LocalResult::Ambiguous(earliest, _) => earliest,
            LocalResult::None => {
                return Err(ConversionError::NonexistentLocalTime {
                    date: self.date.format(DATE_FORMAT).to_string(),
                    time: self.time.to_string(),
                })
            }
        };
        Ok(Slot::from_naive(instant.naive_utc()))
    }

    pub fn utc_to_local<Tz: TimeZone>(&self, zone: &Tz) -> Slot {
        let local = Utc.from_utc_datetime(&self.naive()).with_timezone(zone);
        Slot::from_naive(local.naive_local())
    }
}

/// Local `YYYY-MM-DD` + `HH:MM` in `zone` to the equivalent UTC slot.
pub fn to_utc<Tz: TimeZone>(zone: &Tz, local_date: &str, local_time: &str) -> Result<Slot, ConversionError> {
    Slot::parse(local_date, local_time)?.local_to_utc(zone)
}

/// UTC `YYYY-MM-DD` + `HH:MM` to wall-clock time in `zone`.
pub fn from_utc<Tz: TimeZone>(zone: &Tz, utc_date: &str, utc_time: &str) -> Result<Slot, ConversionError> {
    Ok(Slot::parse(utc_date, utc_time)?.utc_to_local(zone))
}

/// Display-path variant of [`from_utc`]: malformed input comes back untouched
/// instead of failing.
pub fn from_utc_or_passthrough<Tz: TimeZone>(zone: &Tz, utc_date: &str, utc_time: &str) -> (String, String) {
    match from_utc(zone, utc_date, utc_time) {
        Ok(slot) => (slot.date.format(DATE_FORMAT).to_string(), slot.time.to_string()),
        Err(err) => {
            debug!("passing through unconvertible slot: {}", err);
            (utc_date.to_string(), utc_time.to_string())
        }
    }
}

/// `"14:00"` -> `"2:00 PM"`. Empty or missing input gives an empty string.
pub fn format_time_for_display(time: Option<&str>) -> String {
    match time.map(str::trim) {
        None | Some("") => String::new(),
        Some(raw) => match SlotTime::parse(raw) {
            Ok(t) => t.0.format("%-I:%M %p").to_string(),
            Err(_) => raw.to_string(),
        },
    }
}

/// `"2025-02-25"` -> `"February 25, 2025"`. Empty or missing input gives an
/// empty string.
pub fn format_date_for_display(date: Option<&str>) -> String {
    match date.map(str::trim) {
        None | Some("") => String::new(),
        Some(raw) => match parse_date(raw) {
            Ok(d) => d.format("%B %-d, %Y").to_string(),
            Err(_) => raw.to_string(),
        },
    }
}

/// Hours offered on one local calendar day, both ends inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRange {
    pub date: String,
    pub start_hour: u32,
    pub end_hour: u32,
}

type SlotMap = BTreeMap<NaiveDate, BTreeSet<SlotTime>>;

fn insert_slot(map: &mut SlotMap, slot: Slot) {
    map.entry(slot.date).or_default().insert(slot.time);
}

fn iter_slots(map: &SlotMap) -> impl Iterator<Item = Slot> + '_ {
    map.iter()
        .flat_map(|(date, times)| times.iter().map(move |time| Slot::new(*date, *time)))
}

/// Canonical UTC slots: `{ "YYYY-MM-DD": ["HH:MM", ...] }`, times ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeSlots(SlotMap);

impl TimeSlots {
    pub fn insert(&mut self, slot: Slot) {
        insert_slot(&mut self.0, slot);
    }

    pub fn contains(&self, slot: &Slot) -> bool {
        self.0.get(&slot.date).map_or(false, |times| times.contains(&slot.time))
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }

    pub fn len(&self) -> usize {
        self.0.values().map(BTreeSet::len).sum()
    }

    pub fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        iter_slots(&self.0)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.0.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.0.keys().next_back().copied()
    }

    pub fn to_local<Tz: TimeZone>(&self, zone: &Tz) -> LocalSlots {
        let mut local = LocalSlots::default();
        for slot in self.slots() {
            insert_slot(&mut local.0, slot.utc_to_local(zone));
        }
        local
    }
}

impl FromIterator<Slot> for TimeSlots {
    fn from_iter<I: IntoIterator<Item = Slot>>(iter: I) -> Self {
        let mut slots = TimeSlots::default();
        for slot in iter {
            slots.insert(slot);
        }
        slots
    }
}

/// Slots rendered in a caller's zone. Only ever produced for output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LocalSlots(SlotMap);

impl LocalSlots {
    pub fn times_on(&self, date: &NaiveDate) -> Vec<SlotTime> {
        self.0.get(date).map(|t| t.iter().copied().collect()).unwrap_or_default()
    }
}

/// Expands the creator's per-day hour ranges into UTC slots, one per whole
/// hour. Local hours that fall into a DST gap are skipped.
pub fn expand_ranges<Tz: TimeZone>(zone: &Tz, ranges: &[DayRange]) -> Result<TimeSlots, ConversionError> {
    let mut slots = TimeSlots::default();
    for range in ranges {
        if range.start_hour > range.end_hour || range.end_hour > 23 {
            return Err(ConversionError::InvalidRange {
                start: range.start_hour,
                end: range.end_hour,
            });
        }
        let date = parse_date(&range.date)?;
        for hour in range.start_hour..=range.end_hour {
            let time = SlotTime::from_hm(hour, 0).ok_or(ConversionError::InvalidRange {
                start: range.start_hour,
                end: range.end_hour,
            })?;
            match Slot::new(date, time).local_to_utc(zone) {
                Ok(utc) => slots.insert(utc),
                Err(ConversionError::NonexistentLocalTime { date, time }) => {
                    debug!("skipping nonexistent local slot {} {}", date, time);
                }
                Err(err) => return Err(err),
            }
        }
    }
    Ok(slots)
}

/// A respondent's mark on one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub date: NaiveDate,
    pub time: SlotTime,
    pub available: bool,
}

impl Availability {
    pub fn slot(&self) -> Slot {
        Slot::new(self.date, self.time)
    }

    pub fn local_to_utc<Tz: TimeZone>(&self, zone: &Tz) -> Result<Availability, ConversionError> {
        let utc = self.slot().local_to_utc(zone)?;
        Ok(Availability {
            date: utc.date,
            time: utc.time,
            available: self.available,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayTimes {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub times: Vec<String>,
}

/// Stored shape of `events.time_slots`, tagged with a `version` field.
///
/// Versions 1 and 2 held wall-clock times, so upgrading them needs the zone
/// they were authored in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "version")]
pub enum TimeSlotsDocument {
    #[serde(rename = "1")]
    DatesAndTimes { dates: Vec<String>, times: Vec<String> },
    #[serde(rename = "2")]
    PerDate { slots: Vec<DayTimes> },
    #[serde(rename = "3")]
    Utc { slots: TimeSlots },
}

impl TimeSlotsDocument {
    pub fn current(slots: TimeSlots) -> Self {
        TimeSlotsDocument::Utc { slots }
    }

    pub fn version(&self) -> &'static str {
        match self {
            TimeSlotsDocument::DatesAndTimes { .. } => "1",
            TimeSlotsDocument::PerDate { .. } => "2",
            TimeSlotsDocument::Utc { .. } => CURRENT_SCHEMA_VERSION,
        }
    }

    /// Reads a stored document. Untagged rows written before the `version`
    /// field existed are recognised by shape.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ConversionError> {
        use serde_json::Value;

        let unsupported = |e: serde_json::Error| ConversionError::UnsupportedSchema { reason: e.to_string() };
        match value {
            Value::Null => Ok(TimeSlotsDocument::current(TimeSlots::default())),
            Value::Object(mut map) if map.contains_key("version") => {
                if let Some(Value::Number(n)) = map.get("version") {
                    let whole = n
                        .as_u64()
                        .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64));
                    let tag = match whole {
                        Some(v) => v.to_string(),
                        None => n.to_string(),
                    };
                    map.insert("version".to_string(), Value::String(tag));
                }
                serde_json::from_value(Value::Object(map)).map_err(unsupported)
            }
            Value::Object(mut map) if map.contains_key("dates") && map.contains_key("times") => {
                let dates = serde_json::from_value(map.remove("dates").unwrap_or_default()).map_err(unsupported)?;
                let times = serde_json::from_value(map.remove("times").unwrap_or_default()).map_err(unsupported)?;
                Ok(TimeSlotsDocument::DatesAndTimes { dates, times })
            }
            Value::Array(_) => Ok(TimeSlotsDocument::PerDate {
                slots: serde_json::from_value(value).map_err(unsupported)?,
            }),
            Value::Object(_) => Ok(TimeSlotsDocument::Utc {
                slots: serde_json::from_value(value).map_err(unsupported)?,
            }),
            other => Err(ConversionError::UnsupportedSchema {
                reason: format!("unexpected JSON value {}", other),
            }),
        }
    }

    /// Migrates any version to canonical UTC slots.
    pub fn upgrade<Tz: TimeZone>(self, legacy_zone: &Tz) -> Result<TimeSlots, ConversionError> {
        match self {
            TimeSlotsDocument::DatesAndTimes { dates, times } => {
                let mut slots = TimeSlots::default();
                for date in &dates {
                    for time in &times {
                        slots.insert(to_utc(legacy_zone, date, time)?);
                    }
                }
                Ok(slots)
            }
            TimeSlotsDocument::PerDate { slots: days } => {
                let mut slots = TimeSlots::default();
                for day in &days {
                    for time in &day.times {
                        slots.insert(to_utc(legacy_zone, &day.date, time)?);
                    }
                }
                Ok(slots)
            }
            TimeSlotsDocument::Utc { slots } => Ok(slots),
        }
    }
}
