use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fixed geometry of the family-tree layout. All distances are in diagram
/// units (pixels when rendered 1:1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    pub node_width: f32,
    pub node_height: f32,
    /// Center-to-center pitch of the root's sibling row.
    pub sibling_spacing: f32,
    /// Base center-to-center distance between two partners.
    pub partner_spacing: f32,
    /// Pitch of a children row, and the drop from a couple line to it.
    pub child_spacing: f32,
    /// Vertical distance from a person's box to their parents' boxes.
    pub generation_gap: f32,
    pub fork_height: f32,
    pub padding: f32,
    pub marriage_label_offset: f32,
    pub divorce_label_offset: f32,
    /// Clear space kept on each side of a label inside a couple gap.
    pub label_margin: f32,
    /// Extra partner spacing reserved when labels are not measured yet. The
    /// default fits a dated caption with a short place name.
    pub label_allowance: f32,
    pub ancestor_generations: usize,
    pub date_format: String,
    pub font_family: String,
    pub label_font_size: f32,
    pub label_line_height: f32,
    pub fast_text_metrics: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 140.0,
            node_height: 60.0,
            sibling_spacing: 160.0,
            partner_spacing: 200.0,
            child_spacing: 150.0,
            generation_gap: 200.0,
            fork_height: 30.0,
            padding: 100.0,
            marriage_label_offset: 15.0,
            divorce_label_offset: 15.0,
            label_margin: 10.0,
            label_allowance: 110.0,
            ancestor_generations: 2,
            date_format: "%d/%m/%Y".to_string(),
            font_family: "sans-serif".to_string(),
            label_font_size: 13.0,
            label_line_height: 1.5,
            fast_text_metrics: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: Theme::classic(),
            layout: LayoutConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    caption_font_size: Option<f32>,
    node_fill: Option<String>,
    node_border: Option<String>,
    root_fill: Option<String>,
    root_border: Option<String>,
    text_color: Option<String>,
    caption_color: Option<String>,
    line_color: Option<String>,
    marriage_label_color: Option<String>,
    divorce_label_color: Option<String>,
    background: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    layout: Option<LayoutConfig>,
    render: Option<RenderConfig>,
}

/// Reads an optional JSON (or JSON5) config file on top of the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = json5::from_str(contents)?;

    match parsed.theme.as_deref() {
        Some("modern") => config.theme = Theme::modern(),
        Some("classic") | Some("default") | None => {}
        Some(other) => return Err(anyhow::anyhow!("Unknown theme `{other}`")),
    }

    if let Some(vars) = parsed.theme_variables {
        let theme = &mut config.theme;
        if let Some(v) = vars.font_family {
            theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            theme.font_size = v;
        }
        if let Some(v) = vars.caption_font_size {
            theme.caption_font_size = v;
        }
        if let Some(v) = vars.node_fill {
            theme.node_fill = v;
        }
        if let Some(v) = vars.node_border {
            theme.node_border = v;
        }
        if let Some(v) = vars.root_fill {
            theme.root_fill = v;
        }
        if let Some(v) = vars.root_border {
            theme.root_border = v;
        }
        if let Some(v) = vars.text_color {
            theme.text_color = v;
        }
        if let Some(v) = vars.caption_color {
            theme.caption_color = v;
        }
        if let Some(v) = vars.line_color {
            theme.line_color = v;
        }
        if let Some(v) = vars.marriage_label_color {
            theme.marriage_label_color = v;
        }
        if let Some(v) = vars.divorce_label_color {
            theme.divorce_label_color = v;
        }
        if let Some(v) = vars.background {
            theme.background = v;
        }
    }

    if let Some(layout) = parsed.layout {
        config.layout = layout;
    }
    if let Some(render) = parsed.render {
        config.render = render;
    }
    Ok(config)
}
