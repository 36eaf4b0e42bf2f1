use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use refd_types::TagType;

/// Longest accepted collection name, in characters.
pub const COLLECTION_NAME_MAX: usize = 255;

/// One creator entry as uploaded.
///
/// `name` (single-field mode) is mutually exclusive with
/// `first_name`/`last_name` (two-field mode); validation enforces this.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CreatorEntry {
    pub creator_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CreatorEntry {
    /// True when no name property carries any text.
    pub fn is_nameless(&self) -> bool {
        let blank = |s: &Option<String>| s.as_deref().map_or(true, |v| v.trim().is_empty());
        blank(&self.name) && blank(&self.first_name) && blank(&self.last_name)
    }
}

/// One tag entry as uploaded. `type` defaults to a user tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagEntry {
    pub tag: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub tag_type: Option<TagType>,
}

/// An item upload.
///
/// Known structural properties are struct fields; everything else lands in
/// `fields` and must name a known data field. serde cannot combine
/// `deny_unknown_fields` with a flattened map, so the closed-schema check
/// happens in validation instead.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPayload {
    pub item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_item: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relations: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creators: Option<Vec<CreatorEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Child notes embedded in a new regular item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<i64>,
    /// Item data fields (`title`, `date`, `publisher`, ...).
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl ItemPayload {
    pub fn new(item_type: &str) -> Self {
        Self {
            item_type: item_type.to_string(),
            ..Self::default()
        }
    }

    pub fn is_child(&self) -> bool {
        self.parent_item.is_some()
    }
}

/// Parent reference on a collection upload: a key, or `false` to detach.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParentSpec {
    Key(String),
    Flag(bool),
}

/// A collection upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CollectionPayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_collection: Option<ParentSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relations: Option<BTreeMap<String, String>>,
}
