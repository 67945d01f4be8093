//! SVG uptime badges

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;

use super::handlers::{ApiError, AppState};

/// Window a badge reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeDuration {
    SevenDays,
    TwentyFourHours,
    OneHour,
}

impl BadgeDuration {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "7d" => Some(Self::SevenDays),
            "24h" => Some(Self::TwentyFourHours),
            "1h" => Some(Self::OneHour),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SevenDays => "7d",
            Self::TwentyFourHours => "24h",
            Self::OneHour => "1h",
        }
    }

    pub fn hours(&self) -> i64 {
        match self {
            Self::SevenDays => 24 * 7,
            Self::TwentyFourHours => 24,
            Self::OneHour => 1,
        }
    }

    fn label_width(&self) -> usize {
        match self {
            Self::TwentyFourHours => 70,
            Self::SevenDays | Self::OneHour => 65,
        }
    }
}

pub async fn uptime_badge(
    State(state): State<Arc<AppState>>,
    Path((duration, key)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let duration = BadgeDuration::parse(&duration).ok_or_else(|| {
        ApiError::BadRequest("Durations supported: 7d, 24h, 1h".to_string())
    })?;
    let status = state
        .store
        .get_service_status_by_key(&key)
        .ok_or_else(|| ApiError::NotFound(format!("Service '{}' not found", key)))?;

    let uptime = status.uptime.ratio(duration.hours(), Utc::now());
    let svg = uptime_badge_svg(duration, uptime);

    Ok((
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
        ],
        svg,
    )
        .into_response())
}

/// Render the badge for `uptime`, a ratio between 0 and 1
pub fn uptime_badge_svg(duration: BadgeDuration, uptime: f64) -> String {
    let label = format!("uptime {}", duration.as_str());
    let value = format_percentage(uptime);
    let color = uptime_color(uptime);

    let label_width = duration.label_width();
    let value_width = if value.contains('.') {
        value.len() * 11 - 10
    } else {
        value.len() * 11 - 4
    };
    let width = label_width + value_width;
    let label_x = label_width / 2;
    let value_x = label_width + value_width / 2;

    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="20">
  <linearGradient id="b" x2="0" y2="100%">
    <stop offset="0" stop-color="#bbb" stop-opacity=".1"/>
    <stop offset="1" stop-opacity=".1"/>
  </linearGradient>
  <mask id="a">
    <rect width="{width}" height="20" rx="3" fill="#fff"/>
  </mask>
  <g mask="url(#a)">
    <path fill="#555" d="M0 0h{label_width}v20H0z"/>
    <path fill="{color}" d="M{label_width} 0h{value_width}v20H{label_width}z"/>
    <path fill="url(#b)" d="M0 0h{width}v20H0z"/>
  </g>
  <g fill="#fff" text-anchor="middle" font-family="DejaVu Sans,Verdana,Geneva,sans-serif" font-size="11">
    <text x="{label_x}" y="15" fill="#010101" fill-opacity=".3">{label}</text>
    <text x="{label_x}" y="14">{label}</text>
    <text x="{value_x}" y="15" fill="#010101" fill-opacity=".3">{value}</text>
    <text x="{value_x}" y="14">{value}</text>
  </g>
</svg>"##
    )
}

/// Percentage with at most two decimals and no trailing zeros
fn format_percentage(uptime: f64) -> String {
    let formatted = format!("{:.2}", uptime * 100.0);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{}%", trimmed)
}

fn uptime_color(uptime: f64) -> &'static str {
    match uptime {
        u if u >= 0.975 => "#40cc11",
        u if u >= 0.95 => "#94cc11",
        u if u >= 0.9 => "#ccd311",
        u if u >= 0.8 => "#ccb311",
        u if u >= 0.65 => "#cc8111",
        _ => "#c7130a",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(BadgeDuration::parse("7d"), Some(BadgeDuration::SevenDays));
        assert_eq!(BadgeDuration::parse("24h"), Some(BadgeDuration::TwentyFourHours));
        assert_eq!(BadgeDuration::parse("1h"), Some(BadgeDuration::OneHour));
        assert_eq!(BadgeDuration::parse("30d"), None);
        assert_eq!(BadgeDuration::OneHour.hours(), 1);
        assert_eq!(BadgeDuration::SevenDays.hours(), 168);
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(1.0), "100%");
        assert_eq!(format_percentage(0.5), "50%");
        assert_eq!(format_percentage(0.9875), "98.75%");
        assert_eq!(format_percentage(0.995), "99.5%");
        assert_eq!(format_percentage(0.0), "0%");
    }

    #[test]
    fn test_color_thresholds() {
        assert_eq!(uptime_color(1.0), "#40cc11");
        assert_eq!(uptime_color(0.96), "#94cc11");
        assert_eq!(uptime_color(0.9), "#ccd311");
        assert_eq!(uptime_color(0.85), "#ccb311");
        assert_eq!(uptime_color(0.7), "#cc8111");
        assert_eq!(uptime_color(0.1), "#c7130a");
    }

    #[test]
    fn test_svg_layout() {
        let svg = uptime_badge_svg(BadgeDuration::TwentyFourHours, 0.5);

        assert!(svg.starts_with("<svg"));
        // label 70 + "50%" (3 * 11 - 4)
        assert!(svg.contains(r#"width="99""#));
        assert!(svg.contains(">uptime 24h</text>"));
        assert!(svg.contains(">50%</text>"));
        assert!(svg.contains(r##"fill="#c7130a""##));

        let svg = uptime_badge_svg(BadgeDuration::OneHour, 0.9875);
        // label 65 + "98.75%" (6 * 11 - 10)
        assert!(svg.contains(r#"width="121""#));
        assert!(svg.contains(r##"fill="#40cc11""##));
    }
}
