// Phase 2: pure geometry placing measured marriage/divorce captions around
// their couple lines.

use std::collections::HashMap;

use crate::config::LayoutConfig;

use super::types::{Connector, EventLabel, LabelKind, PendingLabel, TextSize};
#[cfg(test)]
use super::types::NodeBox;

type Rect = (f32, f32, f32, f32);

/// Marriage captions sit above the line, divorce captions below. Repeated
/// captions of one kind on the same connector stack away from the line.
pub(super) fn place_labels(
    pending: &[PendingLabel],
    sizes: &[TextSize],
    connectors: &[Connector],
    config: &LayoutConfig,
) -> Vec<EventLabel> {
    // (connector, kind) -> distance already used on that side
    let mut used: HashMap<(usize, bool), f32> = HashMap::new();
    let mut placed = Vec::with_capacity(pending.len());

    for (label, size) in pending.iter().zip(sizes) {
        if label.connector >= connectors.len() {
            continue;
        }
        let anchor = label.anchor;
        let above = label.kind == LabelKind::Marriage;
        let offset = used.entry((label.connector, above)).or_insert(0.0);
        let y = if above {
            anchor.y - config.marriage_label_offset - *offset - size.height
        } else {
            anchor.y + config.divorce_label_offset + *offset
        };
        *offset += size.height + config.label_margin;

        placed.push(EventLabel {
            kind: label.kind,
            text: label.text.clone(),
            connector: label.connector,
            x: anchor.x - size.width / 2.0,
            y,
            width: size.width,
            height: size.height,
        });
    }
    placed
}

pub(super) fn label_rect(label: &EventLabel) -> Rect {
    (label.x, label.y, label.width, label.height)
}

#[cfg(test)]
fn rects_overlap(a: Rect, b: Rect) -> bool {
    a.0 < b.0 + b.2 && b.0 < a.0 + a.2 && a.1 < b.1 + b.3 && b.1 < a.1 + a.3
}

#[cfg(test)]
/// True when the label's box touches the horizontal connector it belongs to.
pub(super) fn touches_connector(label: &EventLabel, connector: &Connector) -> bool {
    let (x, y, w, h) = label_rect(label);
    let line_y = connector.from.y;
    let (x0, x1) = if connector.from.x <= connector.to.x {
        (connector.from.x, connector.to.x)
    } else {
        (connector.to.x, connector.from.x)
    };
    y <= line_y && line_y <= y + h && x < x1 && x0 < x + w
}

#[cfg(test)]
pub(super) fn covers_node(label: &EventLabel, node: &NodeBox) -> bool {
    rects_overlap(label_rect(label), (node.x, node.y, node.width, node.height))
}

#[cfg(test)]
pub(super) fn labels_overlap(a: &EventLabel, b: &EventLabel) -> bool {
    rects_overlap(label_rect(a), label_rect(b))
}
