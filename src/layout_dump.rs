use crate::layout::{Diagram, LabelKind};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Flat JSON view of a [`Diagram`] for debugging and external tooling.
#[derive(Debug, Serialize)]
pub struct DiagramDump {
    pub root: String,
    pub width: f32,
    pub height: f32,
    pub nodes: Vec<NodeDump>,
    pub connectors: Vec<ConnectorDump>,
    pub labels: Vec<LabelDump>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    pub name: String,
    pub caption: Option<String>,
    pub role: String,
    pub generation: i32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Serialize)]
pub struct ConnectorDump {
    pub kind: String,
    pub points: [[f32; 2]; 2],
}

#[derive(Debug, Serialize)]
pub struct LabelDump {
    pub kind: String,
    pub text: String,
    pub connector: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl DiagramDump {
    pub fn from_diagram(diagram: &Diagram) -> Self {
        let nodes = diagram
            .nodes
            .iter()
            .map(|node| NodeDump {
                id: node.person.to_string(),
                name: node.name.clone(),
                caption: node.caption.clone(),
                role: format!("{:?}", node.role),
                generation: node.generation,
                x: node.x,
                y: node.y,
                width: node.width,
                height: node.height,
            })
            .collect();

        let connectors = diagram
            .connectors
            .iter()
            .map(|c| ConnectorDump {
                kind: format!("{:?}", c.kind),
                points: [[c.from.x, c.from.y], [c.to.x, c.to.y]],
            })
            .collect();

        let labels = diagram
            .labels
            .iter()
            .map(|label| LabelDump {
                kind: match label.kind {
                    LabelKind::Marriage => "marriage".to_string(),
                    LabelKind::Divorce => "divorce".to_string(),
                },
                text: label.text.clone(),
                connector: label.connector,
                x: label.x,
                y: label.y,
                width: label.width,
                height: label.height,
            })
            .collect();

        DiagramDump {
            root: diagram.root.to_string(),
            width: diagram.width,
            height: diagram.height,
            nodes,
            connectors,
            labels,
        }
    }
}

pub fn write_diagram_dump(path: &Path, diagram: &Diagram) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = DiagramDump::from_diagram(diagram);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
