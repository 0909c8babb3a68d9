//! Render requests and their flat key/value encoding.

use chrono::{DateTime, Utc};
use log::debug;

use crate::bounds::BoundingBox;
use crate::error::{Error, Result};
use crate::handle::{parse_param, Params};
use crate::visualizer::Style;
use crate::Coordinate;

/// All the information necessary to specify a visualization.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub bounds: BoundingBox,
    /// Start of the history window, consumed by the history source
    pub start: DateTime<Utc>,
    /// End of the history window, consumed by the history source
    pub end: DateTime<Utc>,
    /// Output style; `None` means the configured default
    pub style: Option<Style>,
}

impl RenderRequest {
    pub fn new(bounds: BoundingBox, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            bounds,
            start,
            end,
            style: None,
        }
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }

    /// Write the request into `params`: `start`/`end` as Unix seconds and the
    /// four corner values with 16 fractional digits.
    pub fn write_params(&self, params: &mut Params) {
        let ll = self.bounds.lower_left();
        let ur = self.bounds.upper_right();

        params.insert("start".to_string(), self.start.timestamp().to_string());
        params.insert("end".to_string(), self.end.timestamp().to_string());
        params.insert("lllat".to_string(), format!("{:.16}", ll.lat));
        params.insert("lllng".to_string(), format!("{:.16}", ll.lng));
        params.insert("urlat".to_string(), format!("{:.16}", ur.lat));
        params.insert("urlng".to_string(), format!("{:.16}", ur.lng));
        if let Some(style) = self.style {
            params.insert("style".to_string(), style.to_string());
        }
    }

    /// Rebuild a request written by [`write_params`](Self::write_params).
    pub fn from_params(params: &Params) -> Result<Self> {
        let lower_left = Coordinate::new(parse_param(params, "lllat")?, parse_param(params, "lllng")?);
        let upper_right = Coordinate::new(parse_param(params, "urlat")?, parse_param(params, "urlng")?);

        debug!(
            "[RenderRequest] Bounding Box: LL[{:.6},{:.6}], UR[{:.6},{:.6}]",
            lower_left.lat, lower_left.lng, upper_right.lat, upper_right.lng
        );

        let start = parse_time(params, "start")?;
        let end = parse_time(params, "end")?;
        let bounds = BoundingBox::new(lower_left, upper_right)?;

        let style = match params.get("style") {
            Some(s) if !s.is_empty() => Some(s.parse()?),
            _ => None,
        };

        Ok(Self {
            bounds,
            start,
            end,
            style,
        })
    }
}

fn parse_time(params: &Params, key: &str) -> Result<DateTime<Utc>> {
    let secs: i64 = parse_param(params, key)?;
    DateTime::from_timestamp(secs, 0).ok_or_else(|| Error::invalid_parameter(key, &secs.to_string()))
}
