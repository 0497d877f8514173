use serde::Serialize;

use crate::model::PersonId;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TextSize {
    pub width: f32,
    pub height: f32,
}

/// Why a person appears in the diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeRole {
    Root,
    Ancestor,
    Sibling,
    Partner,
    Child,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeBox {
    pub person: PersonId,
    pub name: String,
    /// Formatted birth date, if known.
    pub caption: Option<String>,
    pub role: NodeRole,
    /// 0 for the root's row, negative above it, positive below.
    pub generation: i32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NodeBox {
    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    pub fn left_anchor(&self) -> Point {
        Point::new(self.x, self.center_y())
    }

    pub fn right_anchor(&self) -> Point {
        Point::new(self.x + self.width, self.center_y())
    }

    pub fn top_anchor(&self) -> Point {
        Point::new(self.center_x(), self.y)
    }

    pub fn bottom_anchor(&self) -> Point {
        Point::new(self.center_x(), self.y + self.height)
    }

    pub fn overlaps(&self, other: &NodeBox) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectorKind {
    /// Horizontal line joining two partners.
    Couple,
    /// Vertical line between a couple (or single parent) and a fork or child.
    Descent,
    /// Horizontal line a sibling or children row hangs from.
    Fork,
}

#[derive(Debug, Clone, Serialize)]
pub struct Connector {
    pub kind: ConnectorKind,
    pub from: Point,
    pub to: Point,
}

impl Connector {
    pub fn midpoint(&self) -> Point {
        Point::new((self.from.x + self.to.x) / 2.0, (self.from.y + self.to.y) / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LabelKind {
    Marriage,
    Divorce,
}

/// A marriage or divorce caption whose size is not known yet.
#[derive(Debug, Clone, Serialize)]
pub struct PendingLabel {
    pub kind: LabelKind,
    pub text: String,
    /// Index of the couple line in the diagram's connectors.
    pub connector: usize,
    /// Point on that line the caption is centered on.
    pub anchor: Point,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventLabel {
    pub kind: LabelKind,
    pub text: String,
    pub connector: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Output of a layout run, ready for a renderer. Coordinates are
/// non-negative and `width`/`height` include the padding on every side.
#[derive(Debug, Clone, Serialize)]
pub struct Diagram {
    pub root: PersonId,
    pub nodes: Vec<NodeBox>,
    pub connectors: Vec<Connector>,
    pub labels: Vec<EventLabel>,
    pub width: f32,
    pub height: f32,
}

impl Diagram {
    /// First box drawn for `id`. A person can appear twice when the same
    /// ancestor is reached through both parents.
    pub fn node(&self, id: &str) -> Option<&NodeBox> {
        self.nodes.iter().find(|n| n.person == id)
    }

    pub fn row(&self, generation: i32) -> Vec<&NodeBox> {
        let mut row: Vec<&NodeBox> = self.nodes.iter().filter(|n| n.generation == generation).collect();
        row.sort_by(|a, b| a.x.total_cmp(&b.x));
        row
    }

    pub fn labels_of(&self, kind: LabelKind) -> impl Iterator<Item = &EventLabel> {
        self.labels.iter().filter(move |l| l.kind == kind)
    }
}
