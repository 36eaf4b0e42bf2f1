use std::collections::HashMap;

use refd_store::{PrimaryRow, WriteBatch};
use refd_types::{CreatorData, LibraryId, ObjectId, Vocabulary};
use refd_wire::CreatorEntry;

use crate::creators::CreatorStore;
use crate::error::{DataError, DataResult};
use crate::record::CreatorRef;

/// Outcome of merging an incoming creator list.
pub struct CreatorMergeResult {
    /// The item's new ordered creator references, one per incoming entry.
    pub refs: Vec<CreatorRef>,
    /// Creator rows staged on the batch, to register after apply.
    pub staged: Vec<PrimaryRow>,
}

fn entry_data(entry: &CreatorEntry) -> CreatorData {
    match &entry.name {
        Some(name) => CreatorData::single_field(name.trim()),
        None => CreatorData::two_field(
            entry.first_name.as_deref().unwrap_or("").trim(),
            entry.last_name.as_deref().unwrap_or("").trim(),
        ),
    }
}

/// Merge an incoming ordered creator list onto an item's current one.
///
/// Positions are explicit. For each incoming slot: reuse the creator already
/// at that slot if the content matches (updating only the creator type),
/// otherwise reuse a content match from another slot, otherwise reuse any
/// content-identical creator in the library via hash lookup, otherwise stage
/// a new row. Existing slots past the end of the incoming list are dropped;
/// there is no insert-and-shift.
///
/// Submitting the same list twice therefore yields the same references and
/// stages nothing.
pub fn merge_creators(
    creators: &CreatorStore,
    vocab: &Vocabulary,
    library: LibraryId,
    existing: &[CreatorRef],
    incoming: &[CreatorEntry],
    batch: &mut WriteBatch,
) -> DataResult<CreatorMergeResult> {
    let existing_ids: Vec<ObjectId> = existing.iter().map(|r| r.creator).collect();
    let existing_data: HashMap<ObjectId, CreatorData> = creators
        .get_many(library, &existing_ids)?
        .into_iter()
        .collect();

    let mut refs = Vec::with_capacity(incoming.len());
    let mut staged: Vec<PrimaryRow> = Vec::new();
    // Rows staged earlier in this same merge, by content hash, so two equal
    // new creators in one payload share one row.
    let mut staged_by_hash: HashMap<String, ObjectId> = HashMap::new();

    for (slot, entry) in incoming.iter().enumerate() {
        let creator_type = vocab
            .creator_type_id(&entry.creator_type)
            .ok_or_else(|| {
                DataError::InvalidInput(format!("unknown creator type '{}'", entry.creator_type))
            })?;
        let data = entry_data(entry);
        let hash = data.hash();

        let same_slot = existing
            .get(slot)
            .filter(|r| existing_data.get(&r.creator) == Some(&data))
            .map(|r| r.creator);
        let other_slot = || {
            existing
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != slot)
                .find(|(_, r)| existing_data.get(&r.creator) == Some(&data))
                .map(|(_, r)| r.creator)
        };

        let creator = if let Some(id) = same_slot {
            id
        } else if let Some(id) = other_slot() {
            id
        } else if let Some(id) = staged_by_hash.get(&hash).copied() {
            id
        } else if let Some(id) = creators.find_by_hash(library, &hash)? {
            id
        } else {
            let row = creators.stage_create(library, &data, batch)?;
            let id = row.id;
            staged.push(row);
            staged_by_hash.insert(hash, id);
            id
        };
        refs.push(CreatorRef {
            creator,
            creator_type,
        });
    }
    Ok(CreatorMergeResult { refs, staged })
}
