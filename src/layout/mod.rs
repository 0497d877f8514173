mod labels;
pub mod text;
pub(crate) mod types;

pub use text::{
    FixedWidthMeasure, TextMeasure, divorce_label_text, format_display_date, marriage_label_text,
};
pub use types::*;

use log::{debug, trace};

use crate::config::LayoutConfig;
use crate::error::LayoutError;
use crate::graph::FamilyGraph;
use crate::model::{Person, PersonId};

const SAME_X_EPS: f32 = 0.01;

/// Turns a rooted view of a [`FamilyGraph`] into a positioned [`Diagram`].
///
/// The engine borrows the graph and never mutates it; a layout run is a
/// function of the root and the graph state at the time of the call.
pub struct LayoutEngine<'a> {
    graph: &'a FamilyGraph,
    config: &'a LayoutConfig,
}

impl<'a> LayoutEngine<'a> {
    pub fn new(graph: &'a FamilyGraph, config: &'a LayoutConfig) -> Self {
        Self { graph, config }
    }

    /// Runs all three phases. Labels are measured while partners are placed
    /// so couple gaps widen to fit their captions.
    pub fn build(&self, root: &str, measure: &dyn TextMeasure) -> Result<Diagram, LayoutError> {
        let provisional = self.topology(root, LabelSpacing::Measured(measure))?;
        Ok(provisional.finish_with(measure))
    }

    /// Runs Phase 1 only, reserving `label_allowance` for every labelled
    /// couple gap. The host measures [`ProvisionalDiagram::pending_labels`]
    /// and resumes with [`ProvisionalDiagram::finish`].
    pub fn build_provisional(&self, root: &str) -> Result<ProvisionalDiagram, LayoutError> {
        self.topology(root, LabelSpacing::Reserved(self.config.label_allowance))
    }

    fn topology(&self, root: &str, spacing: LabelSpacing<'_>) -> Result<ProvisionalDiagram, LayoutError> {
        let person = self
            .graph
            .person(root)
            .ok_or_else(|| LayoutError::UnknownRoot(root.to_string()))?;

        let mut builder = Topology {
            graph: self.graph,
            config: self.config,
            spacing,
            nodes: Vec::new(),
            connectors: Vec::new(),
            pending: Vec::new(),
        };
        let root_idx = builder.push_node(person, NodeRole::Root, 0, 0.0, 0.0);

        let depth = builder.pedigree_depth(root, self.config.ancestor_generations);
        if depth > 0 {
            let mut texts = Vec::new();
            builder.ancestor_label_texts(root, depth, &mut texts);
            let pitch = self.config.partner_spacing
                + builder
                    .spacing
                    .extra(&texts, self.config.partner_spacing - self.config.node_width, self.config);
            let half_span = pitch / 2.0 * 2f32.powi(depth as i32 - 1);
            builder.place_parents(root_idx, depth, half_span);
        }
        builder.place_partners(root_idx);

        debug!(
            root,
            depth,
            nodes = builder.nodes.len(),
            connectors = builder.connectors.len(),
            labels = builder.pending.len();
            "Topology built",
        );

        Ok(ProvisionalDiagram {
            root: person.id().clone(),
            nodes: builder.nodes,
            connectors: builder.connectors,
            pending: builder.pending,
            config: self.config.clone(),
        })
    }
}

/// Phase 1 output: every node and connector in place, labels known by text
/// only. Owns its data so it can be held across a measurement round trip.
#[derive(Debug, Clone)]
pub struct ProvisionalDiagram {
    root: PersonId,
    nodes: Vec<NodeBox>,
    connectors: Vec<Connector>,
    pending: Vec<PendingLabel>,
    config: LayoutConfig,
}

impl ProvisionalDiagram {
    pub fn root(&self) -> &PersonId {
        &self.root
    }

    /// Provisional geometry, before normalization.
    pub fn nodes(&self) -> &[NodeBox] {
        &self.nodes
    }

    pub fn connectors(&self) -> &[Connector] {
        &self.connectors
    }

    pub fn pending_labels(&self) -> &[PendingLabel] {
        &self.pending
    }

    /// Phases 2 and 3. `sizes[i]` is the measured size of
    /// `pending_labels()[i]`.
    pub fn finish(self, sizes: &[TextSize]) -> Result<Diagram, LayoutError> {
        if sizes.len() != self.pending.len() {
            return Err(LayoutError::LabelCountMismatch {
                expected: self.pending.len(),
                got: sizes.len(),
            });
        }
        Ok(self.complete(sizes))
    }

    pub fn finish_with(self, measure: &dyn TextMeasure) -> Diagram {
        let sizes: Vec<TextSize> = self.pending.iter().map(|l| measure.measure(&l.text)).collect();
        self.complete(&sizes)
    }

    fn complete(self, sizes: &[TextSize]) -> Diagram {
        let Self {
            root,
            mut nodes,
            mut connectors,
            pending,
            config,
        } = self;
        let mut labels = labels::place_labels(&pending, sizes, &connectors, &config);
        let (width, height) = normalize(&mut nodes, &mut connectors, &mut labels, config.padding);
        Diagram {
            root,
            nodes,
            connectors,
            labels,
            width,
            height,
        }
    }
}

/// How much a couple gap grows to make room for its captions.
enum LabelSpacing<'m> {
    Measured(&'m dyn TextMeasure),
    Reserved(f32),
}

impl LabelSpacing<'_> {
    fn extra(&self, texts: &[String], free_gap: f32, config: &LayoutConfig) -> f32 {
        if texts.is_empty() {
            return 0.0;
        }
        match self {
            Self::Measured(measure) => {
                let widest = texts
                    .iter()
                    .map(|t| measure.measure(t).width)
                    .fold(0.0, f32::max);
                (widest + 2.0 * config.label_margin - free_gap).max(0.0)
            }
            Self::Reserved(allowance) => allowance.max(0.0),
        }
    }
}

struct Topology<'a, 'm> {
    graph: &'a FamilyGraph,
    config: &'a LayoutConfig,
    spacing: LabelSpacing<'m>,
    nodes: Vec<NodeBox>,
    connectors: Vec<Connector>,
    pending: Vec<PendingLabel>,
}

impl Topology<'_, '_> {
    fn push_node(&mut self, person: &Person, role: NodeRole, generation: i32, x: f32, y: f32) -> usize {
        let caption = person
            .birth_date()
            .map(|date| format_display_date(date, &self.config.date_format));
        self.nodes.push(NodeBox {
            person: person.id().clone(),
            name: person.display_name().to_string(),
            caption,
            role,
            generation,
            x,
            y,
            width: self.config.node_width,
            height: self.config.node_height,
        });
        self.nodes.len() - 1
    }

    fn line(&mut self, kind: ConnectorKind, from: Point, to: Point) -> usize {
        self.connectors.push(Connector { kind, from, to });
        self.connectors.len() - 1
    }

    fn couple_label_texts(&self, a: &str, b: &str) -> Vec<(LabelKind, String)> {
        let Some(marriage) = self.graph.marriage_with(a, b) else {
            return Vec::new();
        };
        let format = &self.config.date_format;
        let details = marriage.details();
        let mut texts = Vec::new();
        if let Some(text) = marriage_label_text(details, format) {
            texts.push((LabelKind::Marriage, text));
        }
        if let Some(text) = divorce_label_text(details, format) {
            texts.push((LabelKind::Divorce, text));
        }
        texts
    }

    fn attach_labels(&mut self, connector: usize, anchor: Point, texts: Vec<(LabelKind, String)>) {
        for (kind, text) in texts {
            self.pending.push(PendingLabel {
                kind,
                text,
                connector,
                anchor,
            });
        }
    }

    /// Number of ancestor generations that will actually be drawn.
    fn pedigree_depth(&self, id: &str, remaining: usize) -> usize {
        if remaining == 0 {
            return 0;
        }
        self.graph
            .parents(id)
            .iter()
            .map(|parent| 1 + self.pedigree_depth(parent.as_str(), remaining - 1))
            .max()
            .unwrap_or(0)
    }

    fn ancestor_label_texts(&self, id: &str, remaining: usize, out: &mut Vec<String>) {
        if remaining == 0 {
            return;
        }
        let parents = self.graph.parents(id);
        if let [p1, p2] = parents.as_slice() {
            out.extend(
                self.couple_label_texts(p1.as_str(), p2.as_str())
                    .into_iter()
                    .map(|(_, text)| text),
            );
        }
        for parent in &parents {
            self.ancestor_label_texts(parent.as_str(), remaining - 1, out);
        }
    }

    /// Places the parents of `child` one generation up, `half_span` either
    /// side of the child's center, and recurses with half the span.
    fn place_parents(&mut self, child: usize, remaining: usize, half_span: f32) {
        if remaining == 0 {
            return;
        }
        let graph = self.graph;
        let child_id = self.nodes[child].person.clone();
        let generation = self.nodes[child].generation - 1;
        let child_x = self.nodes[child].x;
        let child_center = self.nodes[child].center_x();
        let parent_y = self.nodes[child].y - self.config.generation_gap;
        let half_width = self.config.node_width / 2.0;

        let parents: Vec<&Person> = graph
            .parents(child_id.as_str())
            .iter()
            .filter_map(|id| graph.person(id.as_str()))
            .collect();
        match parents.as_slice() {
            [] => {}
            [single] => {
                let idx = self.push_node(single, NodeRole::Ancestor, generation, child_x, parent_y);
                let from = self.nodes[idx].bottom_anchor();
                let to = self.nodes[child].top_anchor();
                self.line(ConnectorKind::Descent, from, to);
                self.place_parents(idx, remaining - 1, half_span / 2.0);
            }
            [first, second, ..] => {
                let left = self.push_node(
                    first,
                    NodeRole::Ancestor,
                    generation,
                    child_center - half_span - half_width,
                    parent_y,
                );
                let right = self.push_node(
                    second,
                    NodeRole::Ancestor,
                    generation,
                    child_center + half_span - half_width,
                    parent_y,
                );

                let (p1, p2) = (first.id().as_str(), second.id().as_str());
                let connected = graph.marriage_with(p1, p2).is_some()
                    || graph.shared_descendants(p1, p2).contains(&child_id);
                if connected {
                    self.connect_parents(child, left, right, p1, p2);
                } else {
                    debug!(child:% = child_id, p1, p2; "Parents have no shared record, leaving unconnected");
                }

                self.place_parents(left, remaining - 1, half_span / 2.0);
                self.place_parents(right, remaining - 1, half_span / 2.0);
            }
        }
    }

    fn connect_parents(&mut self, child: usize, left: usize, right: usize, p1: &str, p2: &str) {
        let from = self.nodes[left].right_anchor();
        let to = self.nodes[right].left_anchor();
        let couple = self.line(ConnectorKind::Couple, from, to);
        let mid = Point::new((from.x + to.x) / 2.0, from.y);
        let texts = self.couple_label_texts(p1, p2);
        self.attach_labels(couple, mid, texts);

        let fork_y = self.nodes[child].y - self.config.fork_height;
        self.line(ConnectorKind::Descent, mid, Point::new(mid.x, fork_y));

        if self.nodes[child].role == NodeRole::Root {
            self.fan_siblings(child, p1, p2, mid.x, fork_y);
            return;
        }

        let target = self.nodes[child].top_anchor();
        if (target.x - mid.x).abs() > SAME_X_EPS {
            self.line(ConnectorKind::Fork, Point::new(mid.x, fork_y), Point::new(target.x, fork_y));
        }
        self.line(ConnectorKind::Descent, Point::new(target.x, fork_y), target);
    }

    /// Lays the root and its full siblings out in birth order under the
    /// parents' fork, moving the root into its slot.
    fn fan_siblings(&mut self, root: usize, p1: &str, p2: &str, mid_x: f32, fork_y: f32) {
        let graph = self.graph;
        let root_id = self.nodes[root].person.clone();
        let mut row = graph.shared_descendants(p1, p2);
        if !row.contains(&root_id) {
            row.push(root_id.clone());
        }
        graph.sort_by_birth(&mut row);

        let pitch = self.config.sibling_spacing;
        let span = (row.len() - 1) as f32 * pitch;
        let start = mid_x - span / 2.0;
        let row_y = self.nodes[root].y;
        if row.len() > 1 {
            self.line(
                ConnectorKind::Fork,
                Point::new(start, fork_y),
                Point::new(start + span, fork_y),
            );
        }

        let half_width = self.config.node_width / 2.0;
        for (i, id) in row.iter().enumerate() {
            let center = start + i as f32 * pitch;
            if *id == root_id {
                self.nodes[root].x = center - half_width;
            } else if let Some(sibling) = graph.person(id.as_str()) {
                self.push_node(sibling, NodeRole::Sibling, 0, center - half_width, row_y);
            } else {
                continue;
            }
            self.line(
                ConnectorKind::Descent,
                Point::new(center, fork_y),
                Point::new(center, row_y),
            );
        }
    }

    fn row_right(&self, generation: i32) -> f32 {
        self.nodes
            .iter()
            .filter(|n| n.generation == generation)
            .map(|n| n.x + n.width)
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Chains the root's partners to the right, each followed by the row of
    /// that couple's children.
    fn place_partners(&mut self, root: usize) {
        let graph = self.graph;
        let config = self.config;
        let root_id = self.nodes[root].person.clone();
        let mut children_right = f32::NEG_INFINITY;

        for partner_id in graph.partners(root_id.as_str()) {
            let Some(partner) = graph.person(partner_id.as_str()) else {
                continue;
            };
            let texts = self.couple_label_texts(root_id.as_str(), partner_id.as_str());
            let label_texts: Vec<String> = texts.iter().map(|(_, t)| t.clone()).collect();
            let free_gap = config.partner_spacing - config.node_width;
            let gap = free_gap + self.spacing.extra(&label_texts, free_gap, config);

            let x = self.row_right(0) + gap;
            let idx = self.push_node(partner, NodeRole::Partner, 0, x, self.nodes[root].y);
            let from = self.nodes[root].right_anchor();
            let to = self.nodes[idx].left_anchor();
            let couple = self.line(ConnectorKind::Couple, from, to);
            let anchor = Point::new(x - gap / 2.0, to.y);
            self.attach_labels(couple, anchor, texts);

            self.place_children(root_id.as_str(), partner_id.as_str(), anchor, &mut children_right);
        }
    }

    /// Shared children of `a` and `b` in birth order, centered under `drop`
    /// unless an earlier row forces them further right.
    fn place_children(&mut self, a: &str, b: &str, drop: Point, children_right: &mut f32) {
        let graph = self.graph;
        let mut children = graph.shared_descendants(a, b);
        if children.is_empty() {
            return;
        }
        graph.sort_by_birth(&mut children);

        let pitch = self.config.child_spacing;
        let half_width = self.config.node_width / 2.0;
        let child_y = drop.y + self.config.child_spacing;
        let fork_y = child_y - self.config.fork_height;

        let span = (children.len() - 1) as f32 * pitch;
        let mut first = drop.x - span / 2.0;
        let min_left = *children_right + (pitch - self.config.node_width);
        if first - half_width < min_left {
            trace!(a, b, shift = min_left - (first - half_width); "Shifting children row");
            first = min_left + half_width;
        }
        let last = first + span;

        self.line(ConnectorKind::Descent, drop, Point::new(drop.x, fork_y));
        let (left, right) = (first.min(drop.x), last.max(drop.x));
        if right - left > SAME_X_EPS {
            self.line(ConnectorKind::Fork, Point::new(left, fork_y), Point::new(right, fork_y));
        }

        for (i, id) in children.iter().enumerate() {
            let Some(child) = graph.person(id.as_str()) else {
                continue;
            };
            let center = first + i as f32 * pitch;
            self.push_node(child, NodeRole::Child, 1, center - half_width, child_y);
            self.line(
                ConnectorKind::Descent,
                Point::new(center, fork_y),
                Point::new(center, child_y),
            );
        }
        *children_right = last + half_width;
    }
}

/// Phase 3: shifts everything so the content's top-left corner sits at
/// `(padding, padding)` and returns the padded size.
fn normalize(
    nodes: &mut [NodeBox],
    connectors: &mut [Connector],
    labels: &mut [EventLabel],
    padding: f32,
) -> (f32, f32) {
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    let mut include = |x: f32, y: f32, w: f32, h: f32| {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x + w);
        max_y = max_y.max(y + h);
    };
    for node in nodes.iter() {
        include(node.x, node.y, node.width, node.height);
    }
    for connector in connectors.iter() {
        include(connector.from.x, connector.from.y, 0.0, 0.0);
        include(connector.to.x, connector.to.y, 0.0, 0.0);
    }
    for label in labels.iter() {
        let (x, y, w, h) = labels::label_rect(label);
        include(x, y, w, h);
    }
    if min_x > max_x {
        return (2.0 * padding, 2.0 * padding);
    }

    let dx = padding - min_x;
    let dy = padding - min_y;
    trace!(dx, dy; "Normalizing diagram");
    for node in nodes.iter_mut() {
        node.x += dx;
        node.y += dy;
    }
    for connector in connectors.iter_mut() {
        connector.from.x += dx;
        connector.from.y += dy;
        connector.to.x += dx;
        connector.to.y += dy;
    }
    for label in labels.iter_mut() {
        label.x += dx;
        label.y += dy;
    }
    (max_x - min_x + 2.0 * padding, max_y - min_y + 2.0 * padding)
}
