use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Errors raised while turning raw records into canonical ones.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Data is not an array")]
    NotAnArray,
    #[error("Missing required fields: {0}")]
    MissingField(&'static str),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Unknown status: {0}")]
    UnknownStatus(String),
    #[error("Duplicate id: {0}")]
    DuplicateId(i64),
    #[error("Malformed record: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Inactive,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Inactive => "inactive",
        }
    }

    pub fn toggled(&self) -> Status {
        match self {
            Status::Active => Status::Inactive,
            Status::Inactive => Status::Active,
        }
    }

    /// Label of the row action that flips this status.
    pub fn toggle_label(&self) -> &'static str {
        match self {
            Status::Active => "Deactivate",
            Status::Inactive => "Activate",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Status::Active),
            "inactive" => Ok(Status::Inactive),
            _ => Err(ValidationError::UnknownStatus(s.to_string())),
        }
    }
}

/// An id as it arrives from the wire. Numbers and numeric strings are both accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(serde_json::Number),
    Text(String),
}

impl RawId {
    /// Resolves to a positive integer id. Zero and empty strings count as absent.
    pub fn resolve(&self) -> Result<i64, ValidationError> {
        let id = match self {
            RawId::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .ok_or_else(|| ValidationError::InvalidId(n.to_string()))?,
            RawId::Text(s) if s.is_empty() => return Err(ValidationError::MissingField("id")),
            RawId::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| ValidationError::InvalidId(s.clone()))?,
        };
        if id == 0 {
            return Err(ValidationError::MissingField("id"));
        }
        Ok(id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawUserRecord {
    pub id: Option<RawId>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub status: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub status: Status,
    pub avatar: String,
}

pub fn placeholder_avatar(id: i64) -> String {
    format!("https://i.pravatar.cc/150?img={id}")
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(field)),
    }
}

impl TryFrom<RawUserRecord> for UserRecord {
    type Error = ValidationError;

    fn try_from(raw: RawUserRecord) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .as_ref()
            .ok_or(ValidationError::MissingField("id"))?
            .resolve()?;
        let status: Status = required(raw.status, "status")?.parse()?;
        let avatar = match raw.avatar {
            Some(a) if !a.is_empty() => a,
            _ => placeholder_avatar(id),
        };
        Ok(UserRecord {
            id,
            name: required(raw.name, "name")?,
            email: required(raw.email, "email")?,
            mobile: required(raw.mobile, "mobile")?,
            status,
            avatar,
        })
    }
}

pub fn normalize(raw: RawUserRecord) -> Result<UserRecord, ValidationError> {
    UserRecord::try_from(raw)
}

// All or nothing: the first invalid record fails the whole batch.
pub fn normalize_batch(raw: Vec<RawUserRecord>) -> Result<Vec<UserRecord>, ValidationError> {
    let mut seen = HashSet::with_capacity(raw.len());
    let mut records = Vec::with_capacity(raw.len());
    for (idx, r) in raw.into_iter().enumerate() {
        let record = normalize(r).inspect_err(|e| debug!("Record {idx} rejected: {e}"))?;
        if !seen.insert(record.id) {
            return Err(ValidationError::DuplicateId(record.id));
        }
        records.push(record);
    }
    trace!("Normalized {} records", records.len());
    Ok(records)
}
