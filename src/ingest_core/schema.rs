//! Schema resolution for heterogeneous WheelLog CSV headers
//!
//! Firmware and app versions disagree on column naming ("speed" vs "velocity",
//! "battery" vs "bat_level", etc). The resolver maps whatever headers a file
//! carries onto the fixed canonical channel set by case-insensitive substring
//! matching against a synonym list, once per file. The resulting
//! `ColumnMapping` is threaded through normalization and aggregation so the
//! heuristic is never re-derived ad hoc.

use std::collections::BTreeMap;

/// Canonical telemetry channels that source columns are mapped onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    Time,
    Speed,
    Battery,
    Distance,
    Voltage,
    Current,
    Power,
    Temperature,
    GpsLat,
    GpsLon,
    Mode,
    Alert,
}

impl Channel {
    /// Destination column name for this channel
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Time => "timestamp_ms",
            Channel::Speed => "speed",
            Channel::Battery => "battery",
            Channel::Distance => "distance",
            Channel::Voltage => "voltage",
            Channel::Current => "current",
            Channel::Power => "power",
            Channel::Temperature => "temperature",
            Channel::GpsLat => "gps_lat",
            Channel::GpsLon => "gps_lon",
            Channel::Mode => "mode",
            Channel::Alert => "alert",
        }
    }

    /// Case-insensitive substrings that identify this channel in a header
    fn synonyms(&self) -> &'static [&'static str] {
        match self {
            Channel::Time => &["time", "timestamp", "date"],
            Channel::Speed => &["speed", "velocity"],
            Channel::Battery => &["battery", "bat", "charge"],
            Channel::Distance => &["distance", "dist", "km"],
            Channel::Voltage => &["voltage", "volt"],
            Channel::Current => &["current"],
            Channel::Power => &["power", "watt"],
            Channel::Temperature => &["temp"],
            Channel::GpsLat => &["lat"],
            Channel::GpsLon => &["lon", "lng"],
            Channel::Mode => &["mode"],
            Channel::Alert => &["alert", "warn"],
        }
    }

    /// Channels parsed as floats (everything except time and the free-text pair)
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Channel::Time | Channel::Mode | Channel::Alert)
    }

    pub fn all() -> [Channel; 12] {
        [
            Channel::Time,
            Channel::Speed,
            Channel::Battery,
            Channel::Distance,
            Channel::Voltage,
            Channel::Current,
            Channel::Power,
            Channel::Temperature,
            Channel::GpsLat,
            Channel::GpsLon,
            Channel::Mode,
            Channel::Alert,
        ]
    }
}

/// A resolved source column: the header text plus its position in the row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub name: String,
    pub index: usize,
}

/// Mapping from canonical channels to source columns for one file
///
/// Transient - exists only for the duration of one file's ingestion and is
/// never persisted. Unresolved channels simply stay absent; consumers default
/// the missing data to zero/empty.
#[derive(Debug, Clone, Default)]
pub struct ColumnMapping {
    entries: BTreeMap<Channel, ColumnRef>,
    /// True when time/speed were assigned positionally rather than matched.
    /// Downstream statistics are advisory, not authoritative, in that case.
    pub fallback_used: bool,
}

impl ColumnMapping {
    /// Resolve the canonical channel set against one file's headers.
    ///
    /// For each channel the headers are scanned in order and the first
    /// substring match wins. There is no scoring among multiple matches -
    /// a known limitation, kept for behavioral parity with the source data
    /// contract rather than replaced by a "best match" computation.
    ///
    /// Fallback: an unresolved `time` gets the first header positionally and
    /// an unresolved `speed` the second. Best-effort only - this may silently
    /// pick the wrong column.
    pub fn resolve(headers: &[String]) -> Self {
        let lowered: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
        let mut entries = BTreeMap::new();

        for channel in Channel::all() {
            let hit = lowered.iter().position(|header| {
                channel.synonyms().iter().any(|syn| header.contains(syn))
            });
            if let Some(index) = hit {
                entries.insert(
                    channel,
                    ColumnRef {
                        name: headers[index].clone(),
                        index,
                    },
                );
            }
        }

        let mut mapping = Self {
            entries,
            fallback_used: false,
        };

        // Positional fallback keeps the pipeline alive on unrecognized schemas
        for (channel, position) in [(Channel::Time, 0), (Channel::Speed, 1)] {
            if !mapping.entries.contains_key(&channel) && headers.len() > position {
                log::warn!(
                    "⚠️  No {:?} column matched, falling back to header #{} ('{}')",
                    channel,
                    position + 1,
                    headers[position]
                );
                mapping.entries.insert(
                    channel,
                    ColumnRef {
                        name: headers[position].clone(),
                        index: position,
                    },
                );
                mapping.fallback_used = true;
            }
        }

        mapping
    }

    pub fn get(&self, channel: Channel) -> Option<&ColumnRef> {
        self.entries.get(&channel)
    }

    pub fn is_resolved(&self, channel: Channel) -> bool {
        self.entries.contains_key(&channel)
    }

    /// Resolved channels that carry numeric data, in canonical order
    pub fn numeric_channels(&self) -> impl Iterator<Item = (Channel, &ColumnRef)> {
        self.entries
            .iter()
            .filter(|(ch, _)| ch.is_numeric())
            .map(|(ch, col)| (*ch, col))
    }

    /// Build a mapping directly, bypassing header resolution.
    ///
    /// Lets tests (and any caller with out-of-band schema knowledge) inject
    /// an exact mapping.
    pub fn from_entries(entries: impl IntoIterator<Item = (Channel, ColumnRef)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
            fallback_used: false,
        }
    }
}
