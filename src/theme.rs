use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub caption_font_size: f32,
    pub node_fill: String,
    pub node_border: String,
    pub root_fill: String,
    pub root_border: String,
    pub text_color: String,
    pub caption_color: String,
    pub line_color: String,
    pub marriage_label_color: String,
    pub divorce_label_color: String,
    pub background: String,
}

impl Theme {
    pub fn classic() -> Self {
        Self {
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 14.0,
            caption_font_size: 12.0,
            node_fill: "#FFFFFF".to_string(),
            node_border: "#A9A9A9".to_string(),
            root_fill: "#FFF8E1".to_string(),
            root_border: "#B8860B".to_string(),
            text_color: "#222222".to_string(),
            caption_color: "#555555".to_string(),
            line_color: "#555555".to_string(),
            marriage_label_color: "#B03060".to_string(),
            divorce_label_color: "#4A4A4A".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            caption_font_size: 11.0,
            node_fill: "#F8FAFF".to_string(),
            node_border: "#C7D2E5".to_string(),
            root_fill: "#EEF2F8".to_string(),
            root_border: "#7A8AA6".to_string(),
            text_color: "#1C2430".to_string(),
            caption_color: "#5B6B82".to_string(),
            line_color: "#7A8AA6".to_string(),
            marriage_label_color: "#C2185B".to_string(),
            divorce_label_color: "#546E7A".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::classic()
    }
}
