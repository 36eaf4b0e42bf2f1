use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use refd_types::{
    CreatorData, CreatorTypeId, FieldId, ItemTypeId, LinkMode, ObjectId, ObjectKey, TagType, UserId,
};

use crate::error::{DataError, DataResult};

/// An item's ordered reference to a creator row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorRef {
    pub creator: ObjectId,
    pub creator_type: CreatorTypeId,
}

/// A tag as attached to an item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagValue {
    pub name: String,
    pub tag_type: TagType,
}

/// Attachment metadata. `link_mode` never changes after creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentData {
    pub link_mode: Option<LinkMode>,
    pub content_type: Option<String>,
    pub charset: Option<String>,
    pub filename: Option<String>,
    pub md5: Option<String>,
    pub mtime: Option<i64>,
}

impl AttachmentData {
    pub fn is_imported(&self) -> bool {
        self.link_mode.map_or(false, LinkMode::is_imported)
    }
}

/// The durable payload of an item row.
///
/// Data field values are stored as content hashes into the value store,
/// never inline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub item_type: ItemTypeId,
    pub parent: Option<ObjectKey>,
    /// Trash flag. Trashed items keep their row; search excludes them by
    /// default.
    pub deleted: bool,
    pub note: Option<String>,
    pub attachment: Option<AttachmentData>,
    pub creators: Vec<CreatorRef>,
    /// Field id → content hash of the value.
    pub fields: BTreeMap<FieldId, String>,
    pub tags: Vec<TagValue>,
    pub collections: Vec<ObjectKey>,
    pub relations: BTreeMap<String, String>,
    pub created_by: Option<UserId>,
    pub last_modified_by: Option<UserId>,
}

impl ItemRecord {
    pub fn new(item_type: ItemTypeId) -> Self {
        Self {
            item_type,
            parent: None,
            deleted: false,
            note: None,
            attachment: None,
            creators: Vec::new(),
            fields: BTreeMap::new(),
            tags: Vec::new(),
            collections: Vec::new(),
            relations: BTreeMap::new(),
            created_by: None,
            last_modified_by: None,
        }
    }

    pub fn is_attachment(&self) -> bool {
        self.attachment.is_some()
    }

    pub fn is_imported_attachment(&self) -> bool {
        self.attachment.as_ref().map_or(false, AttachmentData::is_imported)
    }
}

/// The durable payload of a collection row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub name: String,
    pub parent: Option<ObjectKey>,
    pub relations: BTreeMap<String, String>,
}

/// The durable payload of a creator row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorRecord {
    pub data: CreatorData,
}

/// The durable payload of a tag row. `(name, tag_type)` is unique per
/// library.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub name: String,
    pub tag_type: TagType,
}

/// One condition of a saved search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCondition {
    pub condition: String,
    pub operator: String,
    pub value: String,
}

/// The durable payload of a saved search row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSearchRecord {
    pub name: String,
    pub conditions: Vec<SearchCondition>,
}

/// The durable payload of a relation row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRecord {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

pub(crate) fn encode<T: Serialize>(record: &T) -> DataResult<Vec<u8>> {
    bincode::serialize(record).map_err(|e| DataError::Consistency(format!("encode failed: {e}")))
}

pub(crate) fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> DataResult<T> {
    bincode::deserialize(bytes)
        .map_err(|e| DataError::Consistency(format!("corrupt record payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_record_round_trips() {
        let mut record = ItemRecord::new(ItemTypeId(3));
        record.tags.push(TagValue {
            name: "rust".into(),
            tag_type: TagType::User,
        });
        record
            .fields
            .insert(FieldId(1), "deadbeef".into());
        let bytes = encode(&record).unwrap();
        let back: ItemRecord = decode(&bytes).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn decode_rejects_garbage() {
        let result: DataResult<ItemRecord> = decode(&[0xff, 0x01, 0x02]);
        assert!(matches!(result, Err(DataError::Consistency(_))));
    }
}
