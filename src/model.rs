use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::{DateFormatError, GraphError};

static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// Parses a strict ISO-8601 calendar date (`YYYY-MM-DD`).
pub fn parse_date(text: &str) -> Result<NaiveDate, DateFormatError> {
    let trimmed = text.trim();
    if !ISO_DATE_RE.is_match(trimmed) {
        return Err(DateFormatError {
            text: text.to_string(),
        });
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| DateFormatError {
        text: text.to_string(),
    })
}

/// Like [`parse_date`], but an absent or blank value means "unset".
pub fn parse_optional_date(text: Option<&str>) -> Result<Option<NaiveDate>, DateFormatError> {
    match text.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_date(value).map(Some),
    }
}

pub fn format_iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Birth-date ordering used for sibling and child rows: dated people first,
/// oldest first, undated people last.
pub fn compare_birth_dates(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PersonId(String);

impl PersonId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PersonId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PersonId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PersonId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<str> for PersonId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PersonId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Formation and dissolution metadata of a marriage. Both mirrored records
/// of a couple carry an identical copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarriageDetails {
    pub start_date: Option<NaiveDate>,
    pub start_area: Option<String>,
    pub start_country: Option<String>,
    pub end_date: Option<NaiveDate>,
    pub end_area: Option<String>,
    pub end_country: Option<String>,
}

impl MarriageDetails {
    pub fn started(date: NaiveDate) -> Self {
        Self {
            start_date: Some(date),
            ..Self::default()
        }
    }

    pub fn ended(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    pub fn at(mut self, area: impl Into<String>, country: impl Into<String>) -> Self {
        self.start_area = Some(area.into());
        self.start_country = Some(country.into());
        self
    }
}

/// One side's record of a marriage, pointing at the other spouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marriage {
    pub(crate) spouse: PersonId,
    pub(crate) details: MarriageDetails,
}

impl Marriage {
    pub fn spouse(&self) -> &PersonId {
        &self.spouse
    }

    pub fn details(&self) -> &MarriageDetails {
        &self.details
    }

    /// A marriage without an end date is current.
    pub fn is_active(&self) -> bool {
        self.details.end_date.is_none()
    }
}

/// One individual. Relationship fields are only changed through
/// [`crate::graph::FamilyGraph`], which keeps both directions in sync.
#[derive(Debug, Clone)]
pub struct Person {
    pub(crate) id: PersonId,
    pub(crate) display_name: String,
    pub(crate) birth_date: Option<NaiveDate>,
    pub(crate) death_date: Option<NaiveDate>,
    pub(crate) parent1: Option<PersonId>,
    pub(crate) parent2: Option<PersonId>,
    pub(crate) descendants: Vec<PersonId>,
    pub(crate) marriages: Vec<Marriage>,
}

impl Person {
    pub fn new(id: impl Into<PersonId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            birth_date: None,
            death_date: None,
            parent1: None,
            parent2: None,
            descendants: Vec::new(),
            marriages: Vec::new(),
        }
    }

    pub fn born(mut self, date: NaiveDate) -> Self {
        self.birth_date = Some(date);
        self
    }

    /// Sets both dates, refusing a death date before the birth date.
    pub fn with_lifespan(
        mut self,
        birth: Option<NaiveDate>,
        death: Option<NaiveDate>,
    ) -> Result<Self, GraphError> {
        check_lifespan(&self.id, birth, death)?;
        self.birth_date = birth;
        self.death_date = death;
        Ok(self)
    }

    pub fn id(&self) -> &PersonId {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn birth_date(&self) -> Option<NaiveDate> {
        self.birth_date
    }

    pub fn death_date(&self) -> Option<NaiveDate> {
        self.death_date
    }

    pub fn parent1(&self) -> Option<&PersonId> {
        self.parent1.as_ref()
    }

    pub fn parent2(&self) -> Option<&PersonId> {
        self.parent2.as_ref()
    }

    pub fn descendants(&self) -> &[PersonId] {
        &self.descendants
    }

    pub fn marriages(&self) -> &[Marriage] {
        &self.marriages
    }

    pub fn has_parent(&self, id: &str) -> bool {
        self.parent1.as_ref().is_some_and(|p| p == id) || self.parent2.as_ref().is_some_and(|p| p == id)
    }

    /// Display order: name, then birth date (undated last), then id so the
    /// order is total.
    pub fn display_cmp(&self, other: &Person) -> Ordering {
        self.display_name
            .cmp(&other.display_name)
            .then_with(|| compare_birth_dates(self.birth_date, other.birth_date))
            .then_with(|| self.id.cmp(&other.id))
    }
}

pub(crate) fn check_lifespan(
    id: &PersonId,
    birth: Option<NaiveDate>,
    death: Option<NaiveDate>,
) -> Result<(), GraphError> {
    if let (Some(birth), Some(death)) = (birth, death)
        && death < birth
    {
        return Err(GraphError::DeathBeforeBirth { id: id.to_string() });
    }
    Ok(())
}

impl PartialEq for Person {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Person {}

impl Hash for Person {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
