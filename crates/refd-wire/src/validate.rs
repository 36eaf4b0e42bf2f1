use refd_types::{ItemTypeId, LinkMode, ObjectKey, Vocabulary};
use serde_json::Value;

use crate::error::{WireError, WireResult};
use crate::payload::{CollectionPayload, CreatorEntry, ItemPayload, ParentSpec, COLLECTION_NAME_MAX};

/// Current attachment metadata of an existing item, for immutability and
/// server-managed-field checks.
#[derive(Clone, Debug, Default)]
pub struct AttachmentMeta {
    pub link_mode: Option<LinkMode>,
    pub content_type: Option<String>,
    pub charset: Option<String>,
    pub filename: Option<String>,
    pub md5: Option<String>,
    pub mtime: Option<i64>,
}

/// Facts about the target object that validation rules depend on.
#[derive(Clone, Debug)]
pub struct ItemContext {
    /// Creating a new object vs. replacing an existing one.
    pub is_new: bool,
    /// Target library is a group library.
    pub is_group_library: bool,
    /// Present when the existing object is an attachment.
    pub existing_attachment: Option<AttachmentMeta>,
}

impl ItemContext {
    pub fn new_object() -> Self {
        Self {
            is_new: true,
            is_group_library: false,
            existing_attachment: None,
        }
    }

    pub fn existing_object() -> Self {
        Self {
            is_new: false,
            is_group_library: false,
            existing_attachment: None,
        }
    }

    pub fn in_group(mut self) -> Self {
        self.is_group_library = true;
        self
    }

    pub fn with_attachment(mut self, meta: AttachmentMeta) -> Self {
        self.existing_attachment = Some(meta);
        self
    }
}

// Group libraries manage these via the file storage path, not the JSON API.
const SERVER_MANAGED: [&str; 5] = ["contentType", "charset", "filename", "md5", "mtime"];

/// Validates item payloads against the vocabulary and cross-field rules.
pub struct ItemValidator {
    vocab: Vocabulary,
}

impl ItemValidator {
    pub fn new(vocab: Vocabulary) -> Self {
        Self { vocab }
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Full validation pass. Returns the effective creator list: the one
    /// tolerated nameless template creator on a new item is dropped, every
    /// other entry is checked and kept in order.
    pub fn validate(
        &self,
        payload: &ItemPayload,
        ctx: &ItemContext,
    ) -> WireResult<Vec<CreatorEntry>> {
        if payload.item_type.trim().is_empty() {
            return Err(WireError::MissingProperty("itemType"));
        }
        let type_id = self
            .vocab
            .item_type_id(&payload.item_type)
            .ok_or_else(|| WireError::UnknownItemType(payload.item_type.clone()))?;
        let is_note = self.vocab.is_note(type_id);
        let is_attachment = self.vocab.is_attachment(type_id);

        // Full replace of an existing regular item must carry the whole
        // object, not a delta.
        if !ctx.is_new && !is_note && !is_attachment {
            if payload.creators.is_none() {
                return Err(WireError::MissingProperty("creators"));
            }
            if payload.tags.is_none() {
                return Err(WireError::MissingProperty("tags"));
            }
        }

        if payload.is_child() && !is_note && !is_attachment {
            return Err(WireError::InvalidChildType(payload.item_type.clone()));
        }

        if payload.note.is_some() && !is_note && !is_attachment {
            return Err(WireError::InvalidProperty {
                name: "note",
                reason: "valid only for notes and attachments".into(),
            });
        }

        if let Some(notes) = &payload.notes {
            if !ctx.is_new || payload.is_child() || is_note || is_attachment {
                return Err(WireError::InvalidProperty {
                    name: "notes",
                    reason: "embedded notes are valid only on new regular items".into(),
                });
            }
            if notes.iter().any(|n| n.trim().is_empty()) {
                return Err(WireError::InvalidProperty {
                    name: "notes",
                    reason: "note cannot be empty".into(),
                });
            }
        }

        if !is_attachment {
            self.reject_attachment_properties(payload)?;
        } else {
            self.check_attachment(payload, ctx)?;
        }

        if let Some(tags) = &payload.tags {
            for entry in tags {
                if entry.tag.trim().is_empty() {
                    return Err(WireError::InvalidProperty {
                        name: "tags",
                        reason: "tag cannot be empty".into(),
                    });
                }
            }
        }

        for (name, value) in &payload.fields {
            if self.vocab.field_id(name).is_none() {
                return Err(WireError::UnknownProperty(name.clone()));
            }
            if !matches!(value, Value::String(_)) {
                return Err(WireError::InvalidProperty {
                    name: "fields",
                    reason: format!("'{name}' must be a string"),
                });
            }
        }

        self.check_creators(payload, ctx, type_id)
    }

    fn reject_attachment_properties(&self, payload: &ItemPayload) -> WireResult<()> {
        if payload.link_mode.is_some() {
            return Err(WireError::AttachmentOnlyProperty("linkMode"));
        }
        if payload.content_type.is_some() {
            return Err(WireError::AttachmentOnlyProperty("contentType"));
        }
        if payload.charset.is_some() {
            return Err(WireError::AttachmentOnlyProperty("charset"));
        }
        if payload.filename.is_some() {
            return Err(WireError::AttachmentOnlyProperty("filename"));
        }
        if payload.md5.is_some() {
            return Err(WireError::AttachmentOnlyProperty("md5"));
        }
        if payload.mtime.is_some() {
            return Err(WireError::AttachmentOnlyProperty("mtime"));
        }
        Ok(())
    }

    fn check_attachment(&self, payload: &ItemPayload, ctx: &ItemContext) -> WireResult<()> {
        let existing = ctx.existing_attachment.as_ref();
        let payload_mode = payload
            .link_mode
            .as_deref()
            .map(|s| {
                LinkMode::parse(s).map_err(|_| WireError::InvalidProperty {
                    name: "linkMode",
                    reason: format!("unknown link mode '{s}'"),
                })
            })
            .transpose()?;

        let current_mode = existing.and_then(|meta| meta.link_mode);
        if let (Some(new), Some(current)) = (payload_mode, current_mode) {
            if new != current {
                return Err(WireError::LinkModeChange);
            }
        }
        let mode = payload_mode
            .or(current_mode)
            .ok_or(WireError::MissingProperty("linkMode"))?;

        if !payload.is_child() {
            match mode {
                LinkMode::ImportedFile | LinkMode::LinkedFile => {}
                LinkMode::ImportedUrl => {
                    let pdf = payload
                        .content_type
                        .as_deref()
                        .or_else(|| existing.and_then(|m| m.content_type.as_deref()))
                        == Some("application/pdf");
                    if !pdf {
                        return Err(WireError::TopLevelAttachment);
                    }
                }
                LinkMode::LinkedUrl => return Err(WireError::TopLevelAttachment),
            }
        }

        if !mode.is_imported() {
            if payload.filename.is_some() {
                return Err(WireError::ImportedOnlyProperty("filename"));
            }
            if payload.md5.is_some() {
                return Err(WireError::ImportedOnlyProperty("md5"));
            }
            if payload.mtime.is_some() {
                return Err(WireError::ImportedOnlyProperty("mtime"));
            }
        }

        if ctx.is_group_library {
            if let Some(meta) = existing {
                self.check_server_managed(payload, meta)?;
            }
        }
        Ok(())
    }

    // Equality-checked, not presence-checked: re-sending the current value
    // is fine, changing it is not.
    fn check_server_managed(&self, payload: &ItemPayload, meta: &AttachmentMeta) -> WireResult<()> {
        fn differs(incoming: &Option<String>, current: &Option<String>) -> bool {
            incoming.is_some() && incoming != current
        }
        for name in SERVER_MANAGED {
            let changed = match name {
                "contentType" => differs(&payload.content_type, &meta.content_type),
                "charset" => differs(&payload.charset, &meta.charset),
                "filename" => differs(&payload.filename, &meta.filename),
                "md5" => differs(&payload.md5, &meta.md5),
                "mtime" => payload.mtime.is_some() && payload.mtime != meta.mtime,
                _ => unreachable!(),
            };
            if changed {
                return Err(WireError::ServerManagedProperty(name));
            }
        }
        Ok(())
    }

    fn check_creators(
        &self,
        payload: &ItemPayload,
        ctx: &ItemContext,
        type_id: ItemTypeId,
    ) -> WireResult<Vec<CreatorEntry>> {
        let Some(creators) = &payload.creators else {
            return Ok(Vec::new());
        };
        let mut effective = Vec::with_capacity(creators.len());
        let mut nameless = 0usize;
        for entry in creators {
            let valid = self
                .vocab
                .creator_type_id(&entry.creator_type)
                .map_or(false, |id| self.vocab.creator_type_valid_for(id, type_id));
            if !valid {
                return Err(WireError::InvalidCreatorType(entry.creator_type.clone()));
            }

            if entry.name.is_some() && (entry.first_name.is_some() || entry.last_name.is_some()) {
                return Err(WireError::CreatorNameExclusivity);
            }
            if entry.is_nameless() {
                nameless += 1;
                continue;
            }
            effective.push(entry.clone());
        }
        // A lone empty creator comes from unfilled client templates on new
        // items; anything beyond that is a malformed payload.
        if nameless > 1 || (nameless == 1 && !ctx.is_new) {
            return Err(WireError::EmptyCreator);
        }
        Ok(effective)
    }
}

/// Validate a collection payload.
pub fn validate_collection(payload: &CollectionPayload) -> WireResult<()> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(WireError::MissingProperty("name"));
    }
    if payload.name.chars().count() > COLLECTION_NAME_MAX {
        return Err(WireError::InvalidProperty {
            name: "name",
            reason: format!("longer than {COLLECTION_NAME_MAX} characters"),
        });
    }
    match &payload.parent_collection {
        Some(ParentSpec::Key(key)) => {
            if ObjectKey::parse(key).is_err() {
                return Err(WireError::InvalidProperty {
                    name: "parentCollection",
                    reason: format!("'{key}' is not a valid object key"),
                });
            }
        }
        Some(ParentSpec::Flag(true)) => {
            return Err(WireError::InvalidProperty {
                name: "parentCollection",
                reason: "must be a collection key or false".into(),
            });
        }
        Some(ParentSpec::Flag(false)) | None => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::TagEntry;

    fn validator() -> ItemValidator {
        ItemValidator::new(Vocabulary::builtin())
    }

    fn author(name: &str) -> CreatorEntry {
        CreatorEntry {
            creator_type: "author".into(),
            first_name: None,
            last_name: None,
            name: Some(name.into()),
        }
    }

    fn full_replace(payload: &mut ItemPayload) {
        payload.creators = Some(Vec::new());
        payload.tags = Some(Vec::new());
    }

    #[test]
    fn embedded_notes_only_on_new_regular_items() {
        let v = validator();
        let mut payload = ItemPayload::new("book");
        payload.notes = Some(vec!["first note".into()]);
        assert!(v.validate(&payload, &ItemContext::new_object()).is_ok());

        full_replace(&mut payload);
        let err = v
            .validate(&payload, &ItemContext::existing_object())
            .unwrap_err();
        assert!(matches!(err, WireError::InvalidProperty { name: "notes", .. }));

        let mut note = ItemPayload::new("note");
        note.note = Some("text".into());
        note.notes = Some(vec!["nested".into()]);
        let err = v.validate(&note, &ItemContext::new_object()).unwrap_err();
        assert!(matches!(err, WireError::InvalidProperty { name: "notes", .. }));
    }

    #[test]
    fn unknown_item_type_is_rejected() {
        let payload = ItemPayload::new("zine");
        let err = validator()
            .validate(&payload, &ItemContext::new_object())
            .unwrap_err();
        assert_eq!(err, WireError::UnknownItemType("zine".into()));
    }

    #[test]
    fn existing_regular_item_requires_creators_and_tags() {
        let v = validator();
        let mut payload = ItemPayload::new("book");
        let err = v
            .validate(&payload, &ItemContext::existing_object())
            .unwrap_err();
        assert_eq!(err, WireError::MissingProperty("creators"));

        full_replace(&mut payload);
        assert!(v.validate(&payload, &ItemContext::existing_object()).is_ok());
    }

    #[test]
    fn child_items_must_be_notes_or_attachments() {
        let v = validator();
        let mut payload = ItemPayload::new("book");
        payload.parent_item = Some("ABCD2345".into());
        full_replace(&mut payload);
        let err = v.validate(&payload, &ItemContext::new_object()).unwrap_err();
        assert_eq!(err, WireError::InvalidChildType("book".into()));

        let mut note = ItemPayload::new("note");
        note.parent_item = Some("ABCD2345".into());
        note.note = Some("text".into());
        assert!(v.validate(&note, &ItemContext::new_object()).is_ok());
    }

    #[test]
    fn top_level_attachment_policy() {
        let v = validator();
        let ctx = ItemContext::new_object();

        let mut linked_url = ItemPayload::new("attachment");
        linked_url.link_mode = Some("linked_url".into());
        assert_eq!(
            v.validate(&linked_url, &ctx).unwrap_err(),
            WireError::TopLevelAttachment
        );

        let mut imported_url = ItemPayload::new("attachment");
        imported_url.link_mode = Some("imported_url".into());
        imported_url.content_type = Some("text/html".into());
        assert_eq!(
            v.validate(&imported_url, &ctx).unwrap_err(),
            WireError::TopLevelAttachment
        );

        imported_url.content_type = Some("application/pdf".into());
        assert!(v.validate(&imported_url, &ctx).is_ok());

        let mut file = ItemPayload::new("attachment");
        file.link_mode = Some("imported_file".into());
        assert!(v.validate(&file, &ctx).is_ok());
    }

    #[test]
    fn attachment_properties_rejected_on_regular_items() {
        let mut payload = ItemPayload::new("book");
        full_replace(&mut payload);
        payload.filename = Some("a.pdf".into());
        let err = validator()
            .validate(&payload, &ItemContext::new_object())
            .unwrap_err();
        assert_eq!(err, WireError::AttachmentOnlyProperty("filename"));
    }

    #[test]
    fn file_properties_require_imported_mode() {
        let mut payload = ItemPayload::new("attachment");
        payload.link_mode = Some("linked_file".into());
        payload.md5 = Some("d41d8cd98f00b204e9800998ecf8427e".into());
        let err = validator()
            .validate(&payload, &ItemContext::new_object())
            .unwrap_err();
        assert_eq!(err, WireError::ImportedOnlyProperty("md5"));
    }

    #[test]
    fn link_mode_is_immutable() {
        let mut payload = ItemPayload::new("attachment");
        payload.parent_item = Some("ABCD2345".into());
        payload.link_mode = Some("imported_url".into());
        let ctx = ItemContext::existing_object().with_attachment(AttachmentMeta {
            link_mode: Some(LinkMode::ImportedFile),
            ..AttachmentMeta::default()
        });
        assert_eq!(
            validator().validate(&payload, &ctx).unwrap_err(),
            WireError::LinkModeChange
        );
    }

    #[test]
    fn group_server_managed_fields_are_equality_checked() {
        let v = validator();
        let meta = AttachmentMeta {
            link_mode: Some(LinkMode::ImportedFile),
            content_type: Some("application/pdf".into()),
            md5: Some("aaaa".into()),
            ..AttachmentMeta::default()
        };
        let mut payload = ItemPayload::new("attachment");
        payload.parent_item = Some("ABCD2345".into());

        // Unchanged value passes.
        payload.md5 = Some("aaaa".into());
        let ctx = ItemContext::existing_object()
            .in_group()
            .with_attachment(meta.clone());
        assert!(v.validate(&payload, &ctx).is_ok());

        // Changed value is rejected.
        payload.md5 = Some("bbbb".into());
        assert_eq!(
            v.validate(&payload, &ctx).unwrap_err(),
            WireError::ServerManagedProperty("md5")
        );
    }

    #[test]
    fn creator_name_exclusivity() {
        let v = validator();
        let mut payload = ItemPayload::new("book");
        payload.tags = Some(Vec::new());
        payload.creators = Some(vec![CreatorEntry {
            creator_type: "author".into(),
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            name: Some("Ada Lovelace".into()),
        }]);
        assert_eq!(
            v.validate(&payload, &ItemContext::new_object()).unwrap_err(),
            WireError::CreatorNameExclusivity
        );
    }

    #[test]
    fn lone_nameless_creator_tolerated_only_on_new() {
        let v = validator();
        let nameless = CreatorEntry {
            creator_type: "author".into(),
            first_name: None,
            last_name: None,
            name: None,
        };
        let mut payload = ItemPayload::new("book");
        payload.tags = Some(Vec::new());
        payload.creators = Some(vec![nameless.clone()]);

        let effective = v.validate(&payload, &ItemContext::new_object()).unwrap();
        assert!(effective.is_empty());

        assert_eq!(
            v.validate(&payload, &ItemContext::existing_object())
                .unwrap_err(),
            WireError::EmptyCreator
        );

        payload.creators = Some(vec![nameless.clone(), nameless]);
        assert_eq!(
            v.validate(&payload, &ItemContext::new_object()).unwrap_err(),
            WireError::EmptyCreator
        );
    }

    #[test]
    fn invalid_creator_type_for_item_type() {
        let v = validator();
        let mut payload = ItemPayload::new("book");
        payload.tags = Some(Vec::new());
        payload.creators = Some(vec![CreatorEntry {
            creator_type: "interviewer".into(),
            first_name: None,
            last_name: None,
            name: Some("Someone".into()),
        }]);
        assert!(matches!(
            v.validate(&payload, &ItemContext::new_object()).unwrap_err(),
            WireError::InvalidCreatorType(_)
        ));
    }

    #[test]
    fn unknown_data_field_is_rejected() {
        let v = validator();
        let mut payload = ItemPayload::new("book");
        full_replace(&mut payload);
        payload
            .fields
            .insert("starRating".into(), Value::String("5".into()));
        assert_eq!(
            v.validate(&payload, &ItemContext::new_object()).unwrap_err(),
            WireError::UnknownProperty("starRating".into())
        );
    }

    #[test]
    fn empty_tags_are_rejected() {
        let v = validator();
        let mut payload = ItemPayload::new("book");
        payload.creators = Some(Vec::new());
        payload.tags = Some(vec![TagEntry {
            tag: "   ".into(),
            tag_type: None,
        }]);
        assert!(matches!(
            v.validate(&payload, &ItemContext::new_object()).unwrap_err(),
            WireError::InvalidProperty { name: "tags", .. }
        ));
    }

    #[test]
    fn collection_name_length_limits() {
        let ok = CollectionPayload {
            name: "x".repeat(255),
            key: None,
            version: None,
            parent_collection: None,
            relations: None,
        };
        assert!(validate_collection(&ok).is_ok());

        let too_long = CollectionPayload {
            name: "x".repeat(256),
            ..ok.clone()
        };
        assert!(validate_collection(&too_long).is_err());

        let empty = CollectionPayload {
            name: String::new(),
            ..ok
        };
        assert_eq!(
            validate_collection(&empty).unwrap_err(),
            WireError::MissingProperty("name")
        );
    }

    #[test]
    fn collection_parent_true_is_invalid() {
        let payload = CollectionPayload {
            name: "Papers".into(),
            key: None,
            version: None,
            parent_collection: Some(ParentSpec::Flag(true)),
            relations: None,
        };
        assert!(validate_collection(&payload).is_err());
    }
}
