use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A date attribute that is not a strict `YYYY-MM-DD` calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid date `{text}`: expected YYYY-MM-DD")]
pub struct DateFormatError {
    pub text: String,
}

/// Rejected edits from the checked graph operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("unknown person `{0}`")]
    UnknownPerson(String),

    #[error("a person with id `{0}` already exists")]
    DuplicateId(String),

    #[error("`{0}` cannot be their own parent")]
    SelfParent(String),

    #[error("both parents of `{0}` are the same person")]
    SameParents(String),

    #[error("`{parent}` cannot be a parent of `{child}`: `{parent}` descends from `{child}`")]
    ParentCycle { parent: String, child: String },

    #[error("death date of `{id}` is before the birth date")]
    DeathBeforeBirth { id: String },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed document: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("expected <familyTree> root element, found <{0}>")]
    UnexpectedRoot(String),

    #[error("<{element}> is missing the `{attribute}` attribute")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error(transparent)]
    Date(#[from] DateFormatError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("write failed: {0}")]
    Io(#[from] io::Error),

    #[error("cannot replace target file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("root person `{0}` is not in the graph")]
    UnknownRoot(String),

    #[error("expected {expected} label measurements, got {got}")]
    LabelCountMismatch { expected: usize, got: usize },
}
