use crate::config::{LayoutConfig, RenderConfig};
use crate::layout::{ConnectorKind, Diagram, EventLabel, LabelKind, NodeBox, NodeRole};
use crate::persist::escape_xml;
use crate::theme::Theme;
use anyhow::Result;
use std::path::Path;

const NAME_CAPTION_GAP: f32 = 4.0;

/// Draws connectors first so node boxes and captions sit on top of them.
pub fn render_svg(diagram: &Diagram, theme: &Theme, config: &LayoutConfig) -> String {
    let mut svg = String::new();
    let width = diagram.width;
    let height = diagram.height;

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    ));

    for connector in &diagram.connectors {
        let stroke_width = match connector.kind {
            ConnectorKind::Couple => 1.8,
            ConnectorKind::Descent | ConnectorKind::Fork => 1.4,
        };
        svg.push_str(&format!(
            "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"{stroke_width}\"/>",
            connector.from.x, connector.from.y, connector.to.x, connector.to.y, theme.line_color
        ));
    }

    for node in &diagram.nodes {
        svg.push_str(&node_svg(node, theme));
    }

    for label in &diagram.labels {
        svg.push_str(&label_svg(label, theme, config));
    }

    svg.push_str("</svg>");
    svg
}

fn node_svg(node: &NodeBox, theme: &Theme) -> String {
    let (fill, stroke) = match node.role {
        NodeRole::Root => (&theme.root_fill, &theme.root_border),
        _ => (&theme.node_fill, &theme.node_border),
    };
    let mut out = format!(
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"8\" ry=\"8\" fill=\"{fill}\" stroke=\"{stroke}\" stroke-width=\"1.4\"/>",
        node.x, node.y, node.width, node.height
    );

    let cx = node.center_x();
    let cy = node.center_y();
    let name_y = match node.caption {
        Some(_) => cy - NAME_CAPTION_GAP,
        None => cy + theme.font_size * 0.35,
    };
    out.push_str(&format!(
        "<text x=\"{cx:.2}\" y=\"{name_y:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
        escape_xml(&theme.font_family),
        theme.font_size,
        theme.text_color,
        escape_xml(&node.name)
    ));
    if let Some(caption) = &node.caption {
        let caption_y = cy + NAME_CAPTION_GAP + theme.caption_font_size;
        out.push_str(&format!(
            "<text x=\"{cx:.2}\" y=\"{caption_y:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
            escape_xml(&theme.font_family),
            theme.caption_font_size,
            theme.caption_color,
            escape_xml(caption)
        ));
    }
    out
}

fn label_svg(label: &EventLabel, theme: &Theme, config: &LayoutConfig) -> String {
    let color = match label.kind {
        LabelKind::Marriage => &theme.marriage_label_color,
        LabelKind::Divorce => &theme.divorce_label_color,
    };
    let x = label.x + label.width / 2.0;
    // Baseline sits roughly a quarter of the box above its bottom edge.
    let y = label.y + label.height * 0.75;
    format!(
        "<text x=\"{x:.2}\" y=\"{y:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{color}\">{}</text>",
        escape_xml(&config.font_family),
        config.label_font_size,
        escape_xml(&label.text)
    )
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig, theme: &Theme) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = theme
        .font_family
        .split(',')
        .map(|f| f.trim().trim_matches('"').trim_matches('\''))
        .find(|f| !f.is_empty())
        .unwrap_or("sans-serif")
        .to_string();
    opt.fontdb_mut().load_system_fonts();
    if let Some(size) = usvg::Size::from_wh(render_cfg.width, render_cfg.height) {
        opt.default_size = size;
    }

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path, _render_cfg: &RenderConfig, _theme: &Theme) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}
