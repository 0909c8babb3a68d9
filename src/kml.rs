//! KML location history files.
//!
//! Reads every `<coordinates>` element of a KML export. Each element holds
//! whitespace-separated `lng,lat[,alt]` tuples. KML coordinates carry no
//! timestamps, so the whole file is returned for any time window.

use std::path::Path;

use chrono::{DateTime, Utc};
use log::debug;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::source::HistorySource;
use crate::{Coordinate, History};

/// Parse all coordinates of a KML document, in document order.
pub fn parse_kml(text: &str) -> Result<History> {
    let mut reader = Reader::from_str(text);
    let mut history = History::new();
    let mut buf: Option<String> = None;

    loop {
        match reader.read_event().map_err(kml_error)? {
            Event::Start(e) if e.local_name().as_ref() == b"coordinates" => buf = Some(String::new()),
            Event::Text(t) => {
                if let Some(buf) = buf.as_mut() {
                    buf.push_str(&t.unescape().map_err(kml_error)?);
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"coordinates" => {
                if let Some(tuples) = buf.take() {
                    parse_tuples(&tuples, &mut history)?;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(history)
}

fn parse_tuples(text: &str, out: &mut History) -> Result<()> {
    for tuple in text.split_whitespace() {
        let mut parts = tuple.split(',');
        let lng = parse_degrees(parts.next(), tuple)?;
        let lat = parse_degrees(parts.next(), tuple)?;
        out.push(Coordinate::new(lat, lng));
    }
    Ok(())
}

fn parse_degrees(part: Option<&str>, tuple: &str) -> Result<f64> {
    part.and_then(|p| p.trim().parse().ok())
        .ok_or_else(|| Error::HistoryFetch(format!("bad KML coordinate {:?}", tuple)))
}

fn kml_error(e: impl std::fmt::Display) -> Error {
    Error::HistoryFetch(format!("KML parse error: {}", e))
}

/// History source backed by a KML file read once at construction.
#[derive(Debug, Clone, Default)]
pub struct KmlHistorySource {
    history: History,
}

impl KmlHistorySource {
    pub fn from_kml_str(text: &str) -> Result<Self> {
        Ok(Self {
            history: parse_kml(text)?,
        })
    }

    pub fn from_kml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_kml_str(&text)
    }

    pub fn history(&self) -> &History {
        &self.history
    }
}

impl HistorySource for KmlHistorySource {
    fn fetch_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<History> {
        debug!(
            "[KmlHistorySource] {} points, window {} .. {} not applied",
            self.history.len(),
            start,
            end
        );
        Ok(self.history.clone())
    }
}
