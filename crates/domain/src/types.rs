//! Petstore schema models
//!
//! Wire names follow the API description (camelCase); Rust names follow Rust
//! conventions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::MAX_PAGE_LIMIT;
use crate::errors::ValidationError;
use crate::impl_status_conversions;

/// Adoption status of a pet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PetStatus {
    #[default]
    Available,
    Pending,
    Sold,
}

impl_status_conversions!(PetStatus {
    Available => "available",
    Pending => "pending",
    Sold => "sold",
});

/// A pet as returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pet {
    pub id: i64,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default)]
    pub status: PetStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Request body of `createPet`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPet {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default)]
    pub status: PetStatus,
}

impl NewPet {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), tag: None, status: PetStatus::default() }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_status(mut self, status: PetStatus) -> Self {
        self.status = status;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("name".to_string()));
        }
        Ok(())
    }
}

/// Request body of `updatePet`; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PetStatus>,
}

impl PetUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.tag.is_none() && self.status.is_none()
    }
}

/// One page of `listPets`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetPage {
    #[serde(default)]
    pub items: Vec<Pet>,

    /// Opaque cursor of the next page; absent on the last page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Query parameters of `listPets`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPetsQuery {
    pub limit: Option<u32>,
    pub tag: Option<String>,
    pub status: Option<PetStatus>,
    pub cursor: Option<String>,
}

impl ListPetsQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn status(mut self, status: PetStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Same query positioned at `cursor`
    pub fn at_cursor(&self, cursor: impl Into<String>) -> Self {
        Self { cursor: Some(cursor.into()), ..self.clone() }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.limit {
            Some(limit) if limit == 0 || limit > MAX_PAGE_LIMIT => {
                Err(ValidationError::OutOfRange {
                    field: "limit".to_string(),
                    min: 1,
                    max: MAX_PAGE_LIMIT,
                    actual: limit,
                })
            }
            _ => Ok(()),
        }
    }

    /// Query pairs in declaration order, skipping absent parameters
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(tag) = &self.tag {
            pairs.push(("tag", tag.clone()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.to_string()));
        }
        if let Some(cursor) = &self.cursor {
            pairs.push(("cursor", cursor.clone()));
        }
        pairs
    }
}
