use chrono::NaiveDate;

use crate::model::MarriageDetails;

use super::types::TextSize;

/// Measurement capability injected into the layout engine. Implementations
/// report the rendered size of a single label string.
pub trait TextMeasure {
    fn measure(&self, text: &str) -> TextSize;
}

impl<T: TextMeasure + ?Sized> TextMeasure for &T {
    fn measure(&self, text: &str) -> TextSize {
        (**self).measure(text)
    }
}

/// Every character has the same advance. Deterministic, no font lookup.
#[derive(Debug, Clone, Copy)]
pub struct FixedWidthMeasure {
    pub char_width: f32,
    pub line_height: f32,
}

impl Default for FixedWidthMeasure {
    fn default() -> Self {
        Self {
            char_width: 7.0,
            line_height: 18.0,
        }
    }
}

impl TextMeasure for FixedWidthMeasure {
    fn measure(&self, text: &str) -> TextSize {
        let lines = text.lines().count().max(1);
        let longest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
        TextSize {
            width: longest as f32 * self.char_width,
            height: lines as f32 * self.line_height,
        }
    }
}

/// Rough advance of `ch` as a fraction of the font size, for a generic
/// proportional sans-serif face.
pub(crate) fn char_width_factor(ch: char) -> f32 {
    match ch {
        ' ' => 0.28,
        '.' | ',' | ':' | ';' | '\'' | '|' | '!' | 'i' | 'j' | 'l' | 'I' => 0.27,
        '/' | '(' | ')' | '[' | ']' | '-' | 'f' | 'r' | 't' => 0.36,
        '0'..='9' => 0.56,
        'm' | 'w' => 0.84,
        'M' | 'W' => 0.9,
        'a'..='z' => 0.52,
        'A'..='Z' => 0.66,
        '♥' | '✗' => 0.8,
        c if c.is_ascii() => 0.5,
        _ => 1.0,
    }
}

pub(crate) fn fallback_text_width(text: &str, font_size: f32) -> f32 {
    text.chars().map(char_width_factor).sum::<f32>() * font_size
}

pub const MARRIAGE_SYMBOL: char = '♥';
pub const DIVORCE_SYMBOL: char = '✗';

/// `♥ <date>[ <area>, <country>]`, or `None` without a start date.
pub fn marriage_label_text(details: &MarriageDetails, date_format: &str) -> Option<String> {
    Some(event_text(
        MARRIAGE_SYMBOL,
        details.start_date?,
        details.start_area.as_deref(),
        details.start_country.as_deref(),
        date_format,
    ))
}

/// `✗ <date>[ <area>, <country>]`, or `None` without an end date.
pub fn divorce_label_text(details: &MarriageDetails, date_format: &str) -> Option<String> {
    Some(event_text(
        DIVORCE_SYMBOL,
        details.end_date?,
        details.end_area.as_deref(),
        details.end_country.as_deref(),
        date_format,
    ))
}

fn event_text(
    symbol: char,
    date: NaiveDate,
    area: Option<&str>,
    country: Option<&str>,
    date_format: &str,
) -> String {
    let mut text = format!("{symbol} {}", format_display_date(date, date_format));
    if let (Some(area), Some(country)) = (non_blank(area), non_blank(country)) {
        text.push_str(&format!(" {area}, {country}"));
    }
    text
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Formats a date for display. An invalid format string falls back to ISO.
pub fn format_display_date(date: NaiveDate, date_format: &str) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    if write!(out, "{}", date.format(date_format)).is_err() {
        return date.format("%Y-%m-%d").to_string();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_date;

    fn details() -> MarriageDetails {
        MarriageDetails::started(parse_date("2000-06-20").unwrap())
            .ended(parse_date("2010-06-20").unwrap())
    }

    #[test]
    fn marriage_label_uses_display_format() {
        assert_eq!(
            marriage_label_text(&details(), "%d/%m/%Y").as_deref(),
            Some("♥ 20/06/2000")
        );
        assert_eq!(
            divorce_label_text(&details(), "%d/%m/%Y").as_deref(),
            Some("✗ 20/06/2010")
        );
    }

    #[test]
    fn location_needs_both_area_and_country() {
        let full = details().at("Leeds", "UK");
        assert_eq!(
            marriage_label_text(&full, "%Y").as_deref(),
            Some("♥ 2000 Leeds, UK")
        );
        let mut partial = details();
        partial.start_area = Some("Leeds".into());
        assert_eq!(marriage_label_text(&partial, "%Y").as_deref(), Some("♥ 2000"));
    }

    #[test]
    fn no_label_without_a_date() {
        let open = MarriageDetails::default();
        assert!(marriage_label_text(&open, "%Y").is_none());
        assert!(divorce_label_text(&open, "%Y").is_none());
        let current = MarriageDetails::started(parse_date("2001-01-01").unwrap());
        assert!(divorce_label_text(&current, "%Y").is_none());
    }

    #[test]
    fn bad_date_format_falls_back_to_iso() {
        let date = parse_date("1999-12-31").unwrap();
        assert_eq!(format_display_date(date, "%Q"), "1999-12-31");
    }

    #[test]
    fn fixed_width_counts_characters() {
        let measure = FixedWidthMeasure::default();
        let size = measure.measure("♥ 20/06/2000");
        assert_eq!(size.width, 12.0 * 7.0);
        assert_eq!(size.height, 18.0);
        assert_eq!(measure.measure("").width, 0.0);
    }

    #[test]
    fn fallback_width_scales_with_font_size() {
        let small = fallback_text_width("Jane", 10.0);
        let large = fallback_text_width("Jane", 20.0);
        assert!(small > 0.0);
        assert!((large - small * 2.0).abs() < 0.001);
    }
}
