use std::collections::BTreeMap;
use std::sync::Arc;

use refd_cache::DistributedCache;
use refd_gate::{AccessContext, EditTarget, PermissionGate};
use refd_index::{IndexNotifier, IndexOp};
use refd_store::{
    PrimaryRow, ShardBackend, ShardLocator, StoredRecord, Tombstone, WriteBatch, WriteOp,
};
use refd_types::{
    Library, LibraryId, LinkMode, ObjectId, ObjectKey, ObjectKind, ObjectVersion, ServerTimestamp,
    TagType, Vocabulary,
};
use refd_values::ValueStore;
use refd_wire::{AttachmentMeta, CreatorEntry, ItemContext, ItemPayload, ItemValidator};
use serde_json::Value;
use tracing::debug;

use crate::core::ObjectCore;
use crate::creators::CreatorStore;
use crate::error::{DataError, DataResult};
use crate::merge::merge_creators;
use crate::record::{decode, encode, AttachmentData, ItemRecord, TagValue};
use crate::tags::TagStore;

/// A loaded item: primary row plus durable payload.
#[derive(Clone, Debug)]
pub struct Item {
    pub row: PrimaryRow,
    pub record: ItemRecord,
}

impl Item {
    pub fn key(&self) -> ObjectKey {
        self.row.key
    }

    pub fn is_trashed(&self) -> bool {
        self.record.deleted
    }
}

/// Sub-resources a first save could not apply because the parent did not
/// exist yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeferredParts {
    pub tags: Vec<TagValue>,
    /// Embedded child notes, created as their own items under the parent.
    pub notes: Vec<String>,
}

impl DeferredParts {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.notes.is_empty()
    }
}

/// Result of a save.
///
/// `Created` with `deferred` means the caller must run
/// [`ItemStore::apply_deferred`] as an explicit second pass; the two-stage
/// protocol is part of the API, not a hidden re-entrant save.
#[derive(Debug)]
pub enum SaveOutcome {
    Created {
        item: Item,
        deferred: Option<DeferredParts>,
    },
    Updated {
        item: Item,
    },
    /// The payload matched the stored object exactly; nothing was written
    /// and the version did not move.
    Unchanged {
        item: Item,
    },
}

impl SaveOutcome {
    pub fn item(&self) -> &Item {
        match self {
            SaveOutcome::Created { item, .. }
            | SaveOutcome::Updated { item }
            | SaveOutcome::Unchanged { item } => item,
        }
    }
}

/// The item store: batched reads, validated saves with creator merge,
/// cascading deletes, trash listing.
pub struct ItemStore {
    core: ObjectCore,
    creators: Arc<CreatorStore>,
    tags: Arc<TagStore>,
    values: Arc<ValueStore>,
    gate: Arc<PermissionGate>,
    notifier: IndexNotifier,
    validator: ItemValidator,
}

impl ItemStore {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        backend: Arc<dyn ShardBackend>,
        locator: ShardLocator,
        cache: Arc<dyn DistributedCache>,
        creators: Arc<CreatorStore>,
        tags: Arc<TagStore>,
        values: Arc<ValueStore>,
        gate: Arc<PermissionGate>,
        notifier: IndexNotifier,
    ) -> Self {
        Self {
            core: ObjectCore::new(ObjectKind::Item, backend, locator, cache),
            creators,
            tags,
            values,
            gate,
            notifier,
            validator: ItemValidator::new(Vocabulary::builtin()),
        }
    }

    pub fn core(&self) -> &ObjectCore {
        &self.core
    }

    pub fn vocab(&self) -> &Vocabulary {
        self.validator.vocab()
    }

    pub fn values(&self) -> &ValueStore {
        &self.values
    }

    pub(crate) fn creator_store(&self) -> &CreatorStore {
        &self.creators
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Batched get, preserving caller order. Vanished ids are dropped, not
    /// errors.
    pub fn get(&self, library: LibraryId, ids: &[ObjectId]) -> DataResult<Vec<Item>> {
        self.core
            .load_records(library, ids)?
            .into_iter()
            .map(Self::hydrate)
            .collect()
    }

    pub fn get_by_library_and_key(
        &self,
        library: LibraryId,
        key: ObjectKey,
    ) -> DataResult<Option<Item>> {
        match self.core.load_by_key(library, key)? {
            Some(record) => Ok(Some(Self::hydrate(record)?)),
            None => Ok(None),
        }
    }

    /// Every item in the library, trash included.
    pub fn all(&self, library: LibraryId) -> DataResult<Vec<Item>> {
        let ids: Vec<ObjectId> = self.core.rows(library)?.iter().map(|r| r.id).collect();
        self.get(library, &ids)
    }

    /// Items whose trash flag is set.
    pub fn trashed(&self, library: LibraryId) -> DataResult<Vec<Item>> {
        Ok(self
            .all(library)?
            .into_iter()
            .filter(Item::is_trashed)
            .collect())
    }

    /// Resolve an item's content-addressed field values to text, keyed by
    /// field name.
    pub fn field_values(&self, item: &Item) -> DataResult<BTreeMap<&'static str, String>> {
        let hashes: Vec<String> = item.record.fields.values().cloned().collect();
        let mut resolved = self.values.get_many(&hashes)?;
        let mut out = BTreeMap::new();
        for (field, hash) in &item.record.fields {
            let name = self
                .vocab()
                .field_name(*field)
                .ok_or_else(|| DataError::Consistency(format!("unknown field id {field:?}")))?;
            if let Some(value) = resolved.remove(hash) {
                out.insert(name, value);
            }
        }
        Ok(out)
    }

    fn hydrate(record: StoredRecord) -> DataResult<Item> {
        Ok(Item {
            record: decode::<ItemRecord>(&record.payload)?,
            row: record.row,
        })
    }

    // -----------------------------------------------------------------------
    // Saves
    // -----------------------------------------------------------------------

    /// Validate and apply an upload onto a new or existing item.
    pub fn save(
        &self,
        ctx: &AccessContext,
        library: &Library,
        key: Option<ObjectKey>,
        payload: &ItemPayload,
    ) -> DataResult<SaveOutcome> {
        let existing = match key {
            Some(key) => self.get_by_library_and_key(library.id, key)?,
            None => None,
        };

        let mut wire_ctx = if existing.is_some() {
            ItemContext::existing_object()
        } else {
            ItemContext::new_object()
        };
        if library.is_group() {
            wire_ctx = wire_ctx.in_group();
        }
        if let Some(attachment) = existing.as_ref().and_then(|i| i.record.attachment.as_ref()) {
            wire_ctx = wire_ctx.with_attachment(AttachmentMeta {
                link_mode: attachment.link_mode,
                content_type: attachment.content_type.clone(),
                charset: attachment.charset.clone(),
                filename: attachment.filename.clone(),
                md5: attachment.md5.clone(),
                mtime: attachment.mtime,
            });
        }
        let effective_creators = self.validator.validate(payload, &wire_ctx)?;

        match existing {
            Some(current) => self.save_existing(ctx, library, current, payload, &effective_creators),
            None => self.save_new(ctx, library, key, payload, &effective_creators),
        }
    }

    fn save_new(
        &self,
        ctx: &AccessContext,
        library: &Library,
        key: Option<ObjectKey>,
        payload: &ItemPayload,
        creators: &[CreatorEntry],
    ) -> DataResult<SaveOutcome> {
        let imported = payload
            .link_mode
            .as_deref()
            .and_then(|s| LinkMode::parse(s).ok())
            .map_or(false, LinkMode::is_imported);
        self.gate.edit_check(
            ctx,
            library,
            EditTarget {
                imported_attachment: imported,
            },
        )?;

        let mut batch = WriteBatch::new(self.core.shard_for(library.id));
        let mut record = self.build_record(library, None, payload)?;

        // Tags and embedded notes need the parent row to exist; they go in
        // the second pass.
        let deferred_tags = std::mem::take(&mut record.tags);
        let deferred_notes = payload.notes.clone().unwrap_or_default();

        if library.is_group() {
            record.created_by = ctx.user();
            record.last_modified_by = ctx.user();
        }

        let id = self.core.allocate_id(library.id)?;
        let key = key.unwrap_or_else(ObjectKey::generate);
        let row = self.core.new_row(library.id, key, id);
        let merge = merge_creators(
            &self.creators,
            self.vocab(),
            library.id,
            &[],
            creators,
            &mut batch,
        )?;
        record.creators = merge.refs;
        batch.push(WriteOp::Upsert(StoredRecord {
            kind: ObjectKind::Item,
            row: row.clone(),
            payload: encode(&record)?,
        }));
        self.core.apply(&batch)?;
        self.creators.commit_staged(&merge.staged)?;
        self.core.note_created(&row)?;
        self.notifier.notify(library.id, key, IndexOp::Index);

        let parts = DeferredParts {
            tags: deferred_tags,
            notes: deferred_notes,
        };
        let deferred = if parts.is_empty() { None } else { Some(parts) };
        Ok(SaveOutcome::Created {
            item: Item { row, record },
            deferred,
        })
    }

    fn save_existing(
        &self,
        ctx: &AccessContext,
        library: &Library,
        current: Item,
        payload: &ItemPayload,
        creators: &[CreatorEntry],
    ) -> DataResult<SaveOutcome> {
        self.gate.edit_check(
            ctx,
            library,
            EditTarget {
                imported_attachment: current.record.is_imported_attachment(),
            },
        )?;
        self.core
            .check_version(&current.row, payload.version.map(ObjectVersion))?;

        let mut batch = WriteBatch::new(self.core.shard_for(library.id));
        let mut record = self.build_record(library, Some(&current.record), payload)?;
        let merge = merge_creators(
            &self.creators,
            self.vocab(),
            library.id,
            &current.record.creators,
            creators,
            &mut batch,
        )?;
        record.creators = merge.refs;
        record.created_by = current.record.created_by;
        record.last_modified_by = current.record.last_modified_by;

        if record == current.record {
            debug!(library = %library.id, key = %current.row.key, "save produced no change");
            return Ok(SaveOutcome::Unchanged { item: current });
        }
        if library.is_group() {
            record.last_modified_by = ctx.user();
        }

        let tag_rows = self
            .tags
            .stage_missing(library.id, &record.tags, &mut batch)?;
        let row = self.core.touched(&current.row);
        batch.push(WriteOp::Upsert(StoredRecord {
            kind: ObjectKind::Item,
            row: row.clone(),
            payload: encode(&record)?,
        }));
        self.core.apply(&batch)?;
        self.creators.commit_staged(&merge.staged)?;
        self.tags.commit_staged(&tag_rows)?;
        self.core.note_saved(&row);
        self.notifier.notify(library.id, row.key, IndexOp::Index);
        Ok(SaveOutcome::Updated {
            item: Item { row, record },
        })
    }

    /// Second pass of a two-stage save: attach the deferred sub-resources
    /// to a freshly created parent. Forces a modification bump even though
    /// only sub-resources changed.
    pub fn apply_deferred(
        &self,
        ctx: &AccessContext,
        library: &Library,
        key: ObjectKey,
        parts: DeferredParts,
    ) -> DataResult<Item> {
        let Some(current) = self.get_by_library_and_key(library.id, key)? else {
            return Err(DataError::NotFound {
                kind: ObjectKind::Item,
                library: library.id,
                key,
            });
        };
        self.gate.edit_check(
            ctx,
            library,
            EditTarget {
                imported_attachment: current.record.is_imported_attachment(),
            },
        )?;

        let mut record = current.record.clone();
        record.tags = parts.tags;

        let mut batch = WriteBatch::new(self.core.shard_for(library.id));
        let tag_rows = self
            .tags
            .stage_missing(library.id, &record.tags, &mut batch)?;

        let note_type = self.vocab().item_type_id("note").ok_or_else(|| {
            DataError::Consistency("'note' missing from the item type table".into())
        })?;
        let mut children = Vec::with_capacity(parts.notes.len());
        for text in &parts.notes {
            let mut child = ItemRecord::new(note_type);
            child.parent = Some(key);
            child.note = Some(text.clone());
            if library.is_group() {
                child.created_by = ctx.user();
                child.last_modified_by = ctx.user();
            }
            let id = self.core.allocate_id(library.id)?;
            let child_row = self.core.new_row(library.id, ObjectKey::generate(), id);
            batch.push(WriteOp::Upsert(StoredRecord {
                kind: ObjectKind::Item,
                row: child_row.clone(),
                payload: encode(&child)?,
            }));
            children.push(child_row);
        }

        let row = self.core.touched(&current.row);
        batch.push(WriteOp::Upsert(StoredRecord {
            kind: ObjectKind::Item,
            row: row.clone(),
            payload: encode(&record)?,
        }));
        self.core.apply(&batch)?;
        self.tags.commit_staged(&tag_rows)?;
        self.core.note_saved(&row);
        self.notifier.notify(library.id, key, IndexOp::Index);
        for child_row in &children {
            self.core.note_created(child_row)?;
            self.notifier
                .notify(library.id, child_row.key, IndexOp::Index);
        }
        Ok(Item { row, record })
    }

    fn build_record(
        &self,
        library: &Library,
        current: Option<&ItemRecord>,
        payload: &ItemPayload,
    ) -> DataResult<ItemRecord> {
        let type_id = self
            .vocab()
            .item_type_id(&payload.item_type)
            .ok_or_else(|| {
                DataError::InvalidInput(format!("'{}' is not a valid item type", payload.item_type))
            })?;
        let mut record = ItemRecord::new(type_id);

        if let Some(parent) = &payload.parent_item {
            let parent_key = ObjectKey::parse(parent)?;
            if self.core.resolve(library.id, parent_key)?.is_none() {
                return Err(DataError::NotFound {
                    kind: ObjectKind::Item,
                    library: library.id,
                    key: parent_key,
                });
            }
            record.parent = Some(parent_key);
        }
        record.deleted = payload.deleted.unwrap_or(false);
        record.note = payload.note.clone();

        if self.vocab().is_attachment(type_id) {
            let link_mode = match &payload.link_mode {
                Some(s) => Some(LinkMode::parse(s)?),
                None => current.and_then(|c| c.attachment.as_ref()).and_then(|a| a.link_mode),
            };
            record.attachment = Some(AttachmentData {
                link_mode,
                content_type: payload.content_type.clone(),
                charset: payload.charset.clone(),
                filename: payload.filename.clone(),
                md5: payload.md5.clone(),
                mtime: payload.mtime,
            });
        }

        for (name, value) in &payload.fields {
            let field = self.vocab().field_id(name).ok_or_else(|| {
                DataError::InvalidInput(format!("unknown property '{name}'"))
            })?;
            let Value::String(text) = value else {
                return Err(DataError::InvalidInput(format!("'{name}' must be a string")));
            };
            // An empty value clears the field.
            if text.is_empty() {
                continue;
            }
            let hash = self.values.put(text)?;
            record.fields.insert(field, hash);
        }

        if let Some(tags) = &payload.tags {
            record.tags = tags
                .iter()
                .map(|t| TagValue {
                    name: t.tag.trim().to_string(),
                    tag_type: t.tag_type.unwrap_or(TagType::User),
                })
                .collect();
        } else if let Some(current) = current {
            record.tags = current.tags.clone();
        }

        if let Some(collections) = &payload.collections {
            record.collections = collections
                .iter()
                .map(|k| Ok(ObjectKey::parse(k)?))
                .collect::<DataResult<Vec<_>>>()?;
        } else if let Some(current) = current {
            record.collections = current.collections.clone();
        }
        if let Some(relations) = &payload.relations {
            record.relations = relations.clone();
        } else if let Some(current) = current {
            record.relations = current.relations.clone();
        }
        Ok(record)
    }

    // -----------------------------------------------------------------------
    // Deletes
    // -----------------------------------------------------------------------

    /// Delete an item and, for regular items, all of its child notes and
    /// attachments, in one shard transaction. A miss is a no-op.
    pub fn delete(
        &self,
        ctx: &AccessContext,
        library: &Library,
        key: ObjectKey,
    ) -> DataResult<()> {
        let Some(item) = self.get_by_library_and_key(library.id, key)? else {
            return Ok(());
        };
        self.gate.edit_check(
            ctx,
            library,
            EditTarget {
                imported_attachment: item.record.is_imported_attachment(),
            },
        )?;

        let mut doomed = vec![item];
        // Children reference the parent by key; one scan finds them all.
        let children: Vec<Item> = self
            .all(library.id)?
            .into_iter()
            .filter(|i| i.record.parent == Some(key))
            .collect();
        for child in &children {
            self.gate.edit_check(
                ctx,
                library,
                EditTarget {
                    imported_attachment: child.record.is_imported_attachment(),
                },
            )?;
        }
        doomed.extend(children);

        let now = ServerTimestamp::now();
        let mut batch = WriteBatch::new(self.core.shard_for(library.id));
        for item in &doomed {
            batch.push(WriteOp::Delete {
                kind: ObjectKind::Item,
                library: library.id,
                key: item.row.key,
            });
            batch.push(WriteOp::UpsertTombstone(Tombstone {
                library: library.id,
                kind: ObjectKind::Item,
                key: item.row.key,
                timestamp: now,
            }));
        }
        self.core.apply(&batch)?;
        for item in &doomed {
            self.core.note_deleted(library.id, item.row.key);
            self.notifier
                .notify(library.id, item.row.key, IndexOp::Delete);
        }
        Ok(())
    }

    /// Delete several keys, deferring parents behind their children so a
    /// parent's cascade never races a child's own delete within the batch.
    pub fn delete_batch(
        &self,
        ctx: &AccessContext,
        library: &Library,
        keys: &[ObjectKey],
    ) -> DataResult<()> {
        let mut children = Vec::new();
        let mut parents = Vec::new();
        for &key in keys {
            match self.get_by_library_and_key(library.id, key)? {
                Some(item) if item.record.parent.is_some() => children.push(key),
                Some(_) => parents.push(key),
                None => {}
            }
        }
        for key in children.into_iter().chain(parents) {
            self.delete(ctx, library, key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refd_cache::MemoryCache;
    use refd_gate::{MemoryGroupAccess, MemoryPrivacyDirectory};
    use refd_index::MemoryIndexQueue;
    use refd_store::{InMemoryBackend, ShardId};
    use refd_types::{ObjectVersion, UserId};
    use refd_values::MemoryDocumentStore;
    use refd_wire::TagEntry;

    struct Fixture {
        store: ItemStore,
        backend: Arc<InMemoryBackend>,
        queue: Arc<MemoryIndexQueue>,
        library: Library,
        ctx: AccessContext,
    }

    fn fixture() -> Fixture {
        fixture_with_library(Library::user(LibraryId::new(1).unwrap(), UserId(7)))
    }

    fn fixture_with_library(library: Library) -> Fixture {
        let backend = Arc::new(InMemoryBackend::new());
        let cache: Arc<dyn DistributedCache> = Arc::new(MemoryCache::new());
        let locator = ShardLocator::single(ShardId(1));
        let groups = Arc::new(MemoryGroupAccess::new());
        groups.add_editor(library.id, UserId(7));
        let gate = Arc::new(PermissionGate::new(
            Arc::new(MemoryPrivacyDirectory::new()),
            groups,
        ));
        let queue = Arc::new(MemoryIndexQueue::new());
        let store = ItemStore::new(
            backend.clone(),
            locator.clone(),
            cache.clone(),
            Arc::new(CreatorStore::new(
                backend.clone(),
                locator.clone(),
                cache.clone(),
            )),
            Arc::new(TagStore::new(backend.clone(), locator.clone(), cache.clone())),
            Arc::new(ValueStore::new(
                cache.clone(),
                Arc::new(MemoryDocumentStore::new()),
            )),
            gate,
            IndexNotifier::new(queue.clone()),
        );
        Fixture {
            store,
            backend,
            queue,
            library,
            ctx: AccessContext::for_user(UserId(7)),
        }
    }

    fn book(title: &str) -> ItemPayload {
        let mut payload = ItemPayload::new("book");
        payload
            .fields
            .insert("title".into(), Value::String(title.into()));
        payload
    }

    fn updatable(title: &str) -> ItemPayload {
        let mut payload = book(title);
        payload.creators = Some(Vec::new());
        payload.tags = Some(Vec::new());
        payload
    }

    fn note_under(parent: ObjectKey) -> ItemPayload {
        let mut payload = ItemPayload::new("note");
        payload.parent_item = Some(parent.to_string());
        payload.note = Some("a note".into());
        payload
    }

    fn create(fx: &Fixture, payload: &ItemPayload) -> Item {
        match fx.store.save(&fx.ctx, &fx.library, None, payload) {
            Ok(SaveOutcome::Created { item, deferred }) => {
                assert!(deferred.is_none());
                item
            }
            other => panic!("expected plain creation, got {other:?}"),
        }
    }

    #[test]
    fn create_stores_fields_through_the_value_store() {
        let fx = fixture();
        let item = create(&fx, &book("Systems Programming"));
        assert_eq!(item.row.version, ObjectVersion(1));

        let loaded = fx
            .store
            .get_by_library_and_key(fx.library.id, item.key())
            .unwrap()
            .unwrap();
        let values = fx.store.field_values(&loaded).unwrap();
        assert_eq!(values.get("title").map(String::as_str), Some("Systems Programming"));
    }

    #[test]
    fn tags_on_a_new_item_come_back_as_a_second_pass() {
        let fx = fixture();
        let mut payload = book("Tagged");
        payload.tags = Some(vec![TagEntry {
            tag: "rust".into(),
            tag_type: None,
        }]);

        let (item, deferred) = match fx.store.save(&fx.ctx, &fx.library, None, &payload) {
            Ok(SaveOutcome::Created { item, deferred }) => (item, deferred),
            other => panic!("expected creation, got {other:?}"),
        };
        let parts = deferred.unwrap();
        assert_eq!(parts.tags.len(), 1);
        // The first pass left the item untagged.
        assert!(item.record.tags.is_empty());

        let finished = fx
            .store
            .apply_deferred(&fx.ctx, &fx.library, item.key(), parts)
            .unwrap();
        assert_eq!(finished.record.tags[0].name, "rust");
        assert_eq!(finished.row.version, item.row.version.bumped());
    }

    #[test]
    fn embedded_notes_become_child_items_in_the_second_pass() {
        let fx = fixture();
        let mut payload = book("Annotated");
        payload.notes = Some(vec!["first".into(), "second".into()]);

        let (item, deferred) = match fx.store.save(&fx.ctx, &fx.library, None, &payload) {
            Ok(SaveOutcome::Created { item, deferred }) => (item, deferred),
            other => panic!("expected creation, got {other:?}"),
        };
        fx.store
            .apply_deferred(&fx.ctx, &fx.library, item.key(), deferred.unwrap())
            .unwrap();

        let children: Vec<Item> = fx
            .store
            .all(fx.library.id)
            .unwrap()
            .into_iter()
            .filter(|i| i.record.parent == Some(item.key()))
            .collect();
        let mut notes: Vec<String> = children
            .iter()
            .filter_map(|c| c.record.note.clone())
            .collect();
        notes.sort();
        assert_eq!(notes, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn identical_resubmit_is_unchanged() {
        let fx = fixture();
        let mut payload = updatable("Stable");
        payload.creators = Some(vec![CreatorEntry {
            creator_type: "author".into(),
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            name: None,
        }]);
        let created = match fx.store.save(&fx.ctx, &fx.library, None, &payload).unwrap() {
            SaveOutcome::Created { item, .. } => item,
            other => panic!("expected creation, got {other:?}"),
        };

        payload.version = Some(created.row.version.0);
        let outcome = fx
            .store
            .save(&fx.ctx, &fx.library, Some(created.key()), &payload)
            .unwrap();
        match outcome {
            SaveOutcome::Unchanged { item } => assert_eq!(item.row.version, created.row.version),
            other => panic!("expected unchanged, got {other:?}"),
        }
    }

    #[test]
    fn stale_version_conflicts() {
        let fx = fixture();
        let created = create(&fx, &book("Contested"));

        let mut first = updatable("Contested, second edition");
        first.version = Some(created.row.version.0);
        fx.store
            .save(&fx.ctx, &fx.library, Some(created.key()), &first)
            .unwrap();

        let mut stale = updatable("Contested, third edition");
        stale.version = Some(created.row.version.0);
        let err = fx
            .store
            .save(&fx.ctx, &fx.library, Some(created.key()), &stale)
            .unwrap_err();
        assert!(matches!(err, DataError::VersionConflict { .. }));
    }

    #[test]
    fn version_wraps_at_the_counter_maximum() {
        let fx = fixture();
        let created = create(&fx, &book("Long lived"));

        // Fast-forward the stored row to the top of the counter.
        let mut row = created.row.clone();
        row.version = ObjectVersion(u16::MAX);
        let mut batch = WriteBatch::new(fx.store.core().shard_for(fx.library.id));
        batch.push(WriteOp::Upsert(StoredRecord {
            kind: ObjectKind::Item,
            row: row.clone(),
            payload: encode(&created.record).unwrap(),
        }));
        fx.store.core().apply(&batch).unwrap();
        fx.store.core().note_saved(&row);

        let mut payload = updatable("Long lived, renewed");
        payload.version = Some(u16::MAX);
        let outcome = fx
            .store
            .save(&fx.ctx, &fx.library, Some(created.key()), &payload)
            .unwrap();
        assert_eq!(outcome.item().row.version, ObjectVersion(0));
    }

    #[test]
    fn delete_cascades_to_children_and_tombstones_each() {
        let fx = fixture();
        let parent = create(&fx, &book("Parent"));
        let child = create(&fx, &note_under(parent.key()));

        fx.queue.drain();
        fx.store.delete(&fx.ctx, &fx.library, parent.key()).unwrap();

        assert!(fx.store.all(fx.library.id).unwrap().is_empty());
        let tombstones = fx
            .backend
            .tombstones_since(ShardId(1), fx.library.id, ServerTimestamp::new(0, 0))
            .unwrap();
        let keys: Vec<ObjectKey> = tombstones.iter().map(|t| t.key).collect();
        assert!(keys.contains(&parent.key()));
        assert!(keys.contains(&child.key()));
        assert_eq!(fx.queue.drain().len(), 2);
    }

    #[test]
    fn a_key_can_be_recreated_after_deletion() {
        let fx = fixture();
        let first = create(&fx, &book("Original"));
        fx.store.delete(&fx.ctx, &fx.library, first.key()).unwrap();

        let outcome = fx
            .store
            .save(&fx.ctx, &fx.library, Some(first.key()), &book("Replacement"))
            .unwrap();
        match outcome {
            SaveOutcome::Created { item, .. } => {
                assert_eq!(item.key(), first.key());
                assert_ne!(item.row.id, first.row.id);
            }
            other => panic!("expected re-creation, got {other:?}"),
        }
    }

    #[test]
    fn trashed_lists_only_flagged_items() {
        let fx = fixture();
        create(&fx, &book("Kept"));
        let mut doomed = book("Binned");
        doomed.deleted = Some(true);
        let binned = create(&fx, &doomed);

        let trashed = fx.store.trashed(fx.library.id).unwrap();
        assert_eq!(trashed.len(), 1);
        assert_eq!(trashed[0].key(), binned.key());
        assert_eq!(fx.store.all(fx.library.id).unwrap().len(), 2);
    }

    #[test]
    fn missing_parent_is_not_found() {
        let fx = fixture();
        let orphan = note_under(ObjectKey::generate());
        let err = fx
            .store
            .save(&fx.ctx, &fx.library, None, &orphan)
            .unwrap_err();
        assert!(matches!(err, DataError::NotFound { .. }));
    }

    #[test]
    fn group_saves_stamp_the_acting_user() {
        let fx = fixture_with_library(Library::group(LibraryId::new(100).unwrap()));
        let created = create(&fx, &book("Shared"));
        assert_eq!(created.record.created_by, Some(UserId(7)));
        assert_eq!(created.record.last_modified_by, Some(UserId(7)));
    }

    #[test]
    fn anonymous_writes_are_denied() {
        let fx = fixture();
        let err = fx
            .store
            .save(&AccessContext::anonymous(), &fx.library, None, &book("Nope"))
            .unwrap_err();
        assert!(matches!(err, DataError::PermissionDenied(_)));
    }

    #[test]
    fn delete_batch_handles_children_listed_after_parents() {
        let fx = fixture();
        let parent = create(&fx, &book("Parent"));
        let child = create(&fx, &note_under(parent.key()));

        // Parent first in the request; the store reorders internally.
        fx.store
            .delete_batch(&fx.ctx, &fx.library, &[parent.key(), child.key()])
            .unwrap();
        assert!(fx.store.all(fx.library.id).unwrap().is_empty());
    }

    #[test]
    fn saves_enqueue_index_notifications() {
        let fx = fixture();
        let item = create(&fx, &book("Findable"));
        let queued = fx.queue.drain();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].key, item.key());
        assert!(matches!(queued[0].op, IndexOp::Index));
    }
}
