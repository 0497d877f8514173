#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod layout;
pub mod layout_dump;
pub mod model;
pub mod persist;
pub mod render;
pub mod text_metrics;
pub mod theme;

pub use error::{DateFormatError, GraphError, LayoutError, LoadError, SaveError};
pub use graph::FamilyGraph;
pub use layout::{Diagram, LayoutEngine, ProvisionalDiagram, TextMeasure};
pub use model::{Marriage, MarriageDetails, Person, PersonId};
pub use persist::{load_family_tree, parse_family_tree, save_family_tree, write_family_tree};
