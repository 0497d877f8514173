use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use ttf_parser::Face;

use crate::config::LayoutConfig;
use crate::layout::{TextMeasure, TextSize};
use crate::layout::text::fallback_text_width;

static FONT_CACHE: Lazy<Mutex<FontCache>> = Lazy::new(|| Mutex::new(FontCache::new()));

/// Width of one line of `text` in the first installed face matching
/// `font_family`, or `None` when no face could be loaded.
pub fn measure_text_width(text: &str, font_size: f32, font_family: &str) -> Option<f32> {
    if text.is_empty() || font_size <= 0.0 {
        return Some(0.0);
    }
    let mut guard = FONT_CACHE.lock().ok()?;
    guard.measure(text, font_size, font_family)
}

/// Measures label text with system fonts, falling back to a coarse
/// per-character table when no face is available or `fast` is set.
#[derive(Debug, Clone)]
pub struct FontMeasure {
    pub font_family: String,
    pub font_size: f32,
    pub line_height: f32,
    pub fast: bool,
}

impl FontMeasure {
    pub fn new(font_family: impl Into<String>, font_size: f32) -> Self {
        Self {
            font_family: font_family.into(),
            font_size,
            line_height: 1.5,
            fast: false,
        }
    }

    pub fn from_config(config: &LayoutConfig) -> Self {
        Self {
            font_family: config.font_family.clone(),
            font_size: config.label_font_size,
            line_height: config.label_line_height,
            fast: config.fast_text_metrics,
        }
    }

    fn line_width(&self, line: &str) -> f32 {
        if !self.fast
            && let Some(width) = measure_text_width(line, self.font_size, &self.font_family)
        {
            return width;
        }
        fallback_text_width(line, self.font_size)
    }
}

impl TextMeasure for FontMeasure {
    fn measure(&self, text: &str) -> TextSize {
        let lines: Vec<&str> = text.lines().collect();
        let count = lines.len().max(1);
        let width = lines
            .iter()
            .map(|line| self.line_width(line))
            .fold(0.0, f32::max);
        TextSize {
            width,
            height: count as f32 * self.font_size * self.line_height,
        }
    }
}

struct FontCache {
    db: Database,
    loaded_system_fonts: bool,
    faces: HashMap<String, Option<LoadedFace>>,
}

impl FontCache {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            faces: HashMap::new(),
        }
    }

    fn measure(&mut self, text: &str, font_size: f32, font_family: &str) -> Option<f32> {
        let key = normalize_family_key(font_family);
        if !self.faces.contains_key(&key) {
            let face = self.load_face(&key);
            self.faces.insert(key.clone(), face);
        }
        let face = self.faces.get(&key)?.as_ref()?;
        face.width(&text.replace('\t', "    "), font_size)
    }

    fn load_face(&mut self, font_family: &str) -> Option<LoadedFace> {
        let names: Vec<&str> = font_family
            .split(',')
            .map(|part| part.trim().trim_matches('"').trim_matches('\''))
            .filter(|part| !part.is_empty())
            .collect();
        let mut families: Vec<Family<'_>> = names.iter().map(|name| family_for(name)).collect();
        if families.is_empty() {
            families.push(Family::SansSerif);
        }

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let query = Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        };
        let id = self.db.query(&query)?;
        self.db
            .with_face_data(id, |data, index| LoadedFace::parse(data.to_vec(), index))
            .flatten()
    }
}

fn family_for(name: &str) -> Family<'_> {
    match name.to_ascii_lowercase().as_str() {
        "serif" => Family::Serif,
        "sans-serif" | "system-ui" | "-apple-system" | "ui-sans-serif" => Family::SansSerif,
        "monospace" | "ui-monospace" => Family::Monospace,
        "cursive" => Family::Cursive,
        "fantasy" => Family::Fantasy,
        _ => Family::Name(name),
    }
}

/// Font bytes plus a precomputed ASCII advance table. Non-ASCII text reparses
/// the face on demand instead of holding a self-referential borrow.
struct LoadedFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: u16,
    ascii_advances: [u16; 128],
}

impl LoadedFace {
    fn parse(data: Vec<u8>, index: u32) -> Option<Self> {
        let face = Face::parse(&data, index).ok()?;
        let units_per_em = face.units_per_em().max(1);
        let mut ascii_advances = [0u16; 128];
        for byte in 0u8..=127 {
            if let Some(glyph) = face.glyph_index(byte as char) {
                ascii_advances[byte as usize] = face.glyph_hor_advance(glyph).unwrap_or(0);
            }
        }
        Some(Self {
            data,
            index,
            units_per_em,
            ascii_advances,
        })
    }

    fn width(&self, text: &str, font_size: f32) -> Option<f32> {
        let scale = font_size / self.units_per_em as f32;
        let missing = font_size * 0.56;

        if text.is_ascii() {
            let width = text
                .bytes()
                .filter(|b| *b != b'\n')
                .map(|b| match self.ascii_advances[b as usize] {
                    0 => missing,
                    advance => advance as f32 * scale,
                })
                .sum::<f32>();
            return Some(width);
        }

        let face = Face::parse(&self.data, self.index).ok()?;
        let width = text
            .chars()
            .filter(|ch| *ch != '\n')
            .map(|ch| {
                face.glyph_index(ch)
                    .and_then(|glyph| face.glyph_hor_advance(glyph))
                    .map_or(missing, |advance| advance as f32 * scale)
            })
            .sum::<f32>();
        Some(width)
    }
}

fn normalize_family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_zero_width() {
        assert_eq!(measure_text_width("", 13.0, "sans-serif"), Some(0.0));
    }

    #[test]
    fn fast_measure_uses_fallback_table() {
        let mut measure = FontMeasure::new("sans-serif", 13.0);
        measure.fast = true;
        let size = measure.measure("♥ 20/06/2000");
        assert_eq!(size.width, fallback_text_width("♥ 20/06/2000", 13.0));
        assert_eq!(size.height, 13.0 * 1.5);
    }

    #[test]
    fn multi_line_text_stacks_line_heights() {
        let mut measure = FontMeasure::new("sans-serif", 10.0);
        measure.fast = true;
        let size = measure.measure("one\ntwo");
        assert_eq!(size.height, 30.0);
        assert!(size.width > 0.0);
    }

    #[test]
    fn family_key_defaults_to_sans_serif() {
        assert_eq!(normalize_family_key("  "), "sans-serif");
        assert_eq!(normalize_family_key(" Inter "), "Inter");
    }
}
