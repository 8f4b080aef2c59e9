//! Serialised node shapes.
//!
//! These structs are the JSON contract consumed verbatim as API response
//! bodies by the boundary layer; field names stay camelCase on the wire.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialisedDirectory {
    pub basename: String,
    pub directories: Vec<SerialisedDirectory>,
    pub files: Vec<SerialisedFile>,
    pub is_directory: bool,
    pub path: PathBuf,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialisedFile {
    pub basename: String,
    pub extension: String,
    pub path: PathBuf,
    pub references: Vec<ReferenceStub>,
    pub referenced_by: Vec<ReferenceStub>,
    pub url: String,
}

/// Shallow stand-in for a referenced file; never recurses into its own
/// reference lists, which could cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceStub {
    pub basename: String,
    pub extension: String,
    pub path: PathBuf,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SerialisedNode {
    Directory(SerialisedDirectory),
    File(SerialisedFile),
}
