//! Type vocabularies: item types, creator types, item fields.
//!
//! The JSON validation layer resolves wire names against these tables, so an
//! unknown `itemType`, `creatorType`, or field name is caught before any
//! merge work happens. The tables are fixed at construction; custom types are
//! out of scope for this layer.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Numeric id of an item type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemTypeId(pub u16);

/// Numeric id of a creator type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CreatorTypeId(pub u16);

/// Numeric id of an item data field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub u16);

/// Tag classification: user-entered or automatically extracted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TagType {
    #[default]
    User,
    Automatic,
}

impl From<TagType> for u8 {
    fn from(t: TagType) -> u8 {
        match t {
            TagType::User => 0,
            TagType::Automatic => 1,
        }
    }
}

impl TryFrom<u8> for TagType {
    type Error = TypeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(TagType::User),
            1 => Ok(TagType::Automatic),
            other => Err(TypeError::UnknownId { vocabulary: "tag type", id: other as u16 }),
        }
    }
}

/// How an attachment references its content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
    ImportedFile,
    ImportedUrl,
    LinkedFile,
    LinkedUrl,
}

impl LinkMode {
    /// Imported modes carry stored file metadata (filename, md5, mtime).
    pub fn is_imported(self) -> bool {
        matches!(self, LinkMode::ImportedFile | LinkMode::ImportedUrl)
    }

    pub fn parse(s: &str) -> Result<Self, TypeError> {
        match s {
            "imported_file" => Ok(LinkMode::ImportedFile),
            "imported_url" => Ok(LinkMode::ImportedUrl),
            "linked_file" => Ok(LinkMode::LinkedFile),
            "linked_url" => Ok(LinkMode::LinkedUrl),
            other => Err(TypeError::UnknownName {
                vocabulary: "link mode",
                name: other.to_string(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LinkMode::ImportedFile => "imported_file",
            LinkMode::ImportedUrl => "imported_url",
            LinkMode::LinkedFile => "linked_file",
            LinkMode::LinkedUrl => "linked_url",
        }
    }
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct ItemTypeDef {
    name: &'static str,
    localized: &'static str,
    /// Valid creator types, primary first. Empty for note/attachment.
    creator_types: &'static [&'static str],
    /// The field this type exposes as its display title.
    title_field: &'static str,
}

const ITEM_TYPES: &[ItemTypeDef] = &[
    ItemTypeDef { name: "note", localized: "Note", creator_types: &[], title_field: "" },
    ItemTypeDef { name: "attachment", localized: "Attachment", creator_types: &[], title_field: "title" },
    ItemTypeDef {
        name: "book",
        localized: "Book",
        creator_types: &["author", "contributor", "editor", "seriesEditor", "translator"],
        title_field: "title",
    },
    ItemTypeDef {
        name: "bookSection",
        localized: "Book Section",
        creator_types: &["author", "bookAuthor", "contributor", "editor", "seriesEditor", "translator"],
        title_field: "title",
    },
    ItemTypeDef {
        name: "journalArticle",
        localized: "Journal Article",
        creator_types: &["author", "contributor", "editor", "reviewedAuthor", "translator"],
        title_field: "title",
    },
    ItemTypeDef {
        name: "magazineArticle",
        localized: "Magazine Article",
        creator_types: &["author", "contributor", "reviewedAuthor", "translator"],
        title_field: "title",
    },
    ItemTypeDef {
        name: "newspaperArticle",
        localized: "Newspaper Article",
        creator_types: &["author", "contributor", "reviewedAuthor", "translator"],
        title_field: "title",
    },
    ItemTypeDef {
        name: "thesis",
        localized: "Thesis",
        creator_types: &["author", "contributor"],
        title_field: "title",
    },
    ItemTypeDef {
        name: "letter",
        localized: "Letter",
        creator_types: &["author", "contributor", "recipient"],
        title_field: "title",
    },
    ItemTypeDef {
        name: "manuscript",
        localized: "Manuscript",
        creator_types: &["author", "contributor", "translator"],
        title_field: "title",
    },
    ItemTypeDef {
        name: "interview",
        localized: "Interview",
        creator_types: &["interviewee", "contributor", "interviewer", "translator"],
        title_field: "title",
    },
    ItemTypeDef {
        name: "film",
        localized: "Film",
        creator_types: &["director", "contributor", "producer", "scriptwriter"],
        title_field: "title",
    },
    ItemTypeDef {
        name: "webpage",
        localized: "Web Page",
        creator_types: &["author", "contributor", "translator"],
        title_field: "title",
    },
    ItemTypeDef {
        name: "report",
        localized: "Report",
        creator_types: &["author", "contributor", "seriesEditor", "translator"],
        title_field: "title",
    },
    ItemTypeDef {
        name: "case",
        localized: "Case",
        creator_types: &["author", "contributor", "counsel"],
        title_field: "caseName",
    },
    ItemTypeDef {
        name: "statute",
        localized: "Statute",
        creator_types: &["author", "contributor"],
        title_field: "nameOfAct",
    },
    ItemTypeDef {
        name: "presentation",
        localized: "Presentation",
        creator_types: &["presenter", "contributor"],
        title_field: "title",
    },
    ItemTypeDef {
        name: "audioRecording",
        localized: "Audio Recording",
        creator_types: &["performer", "composer", "contributor", "wordsBy"],
        title_field: "title",
    },
    ItemTypeDef {
        name: "computerProgram",
        localized: "Computer Program",
        creator_types: &["programmer", "contributor"],
        title_field: "title",
    },
    ItemTypeDef {
        name: "map",
        localized: "Map",
        creator_types: &["cartographer", "contributor", "seriesEditor"],
        title_field: "title",
    },
    ItemTypeDef {
        name: "document",
        localized: "Document",
        creator_types: &["author", "contributor", "editor", "reviewedAuthor", "translator"],
        title_field: "title",
    },
];

const CREATOR_TYPES: &[(&str, &str)] = &[
    ("author", "Author"),
    ("contributor", "Contributor"),
    ("editor", "Editor"),
    ("translator", "Translator"),
    ("seriesEditor", "Series Editor"),
    ("interviewee", "Interview With"),
    ("interviewer", "Interviewer"),
    ("director", "Director"),
    ("scriptwriter", "Scriptwriter"),
    ("producer", "Producer"),
    ("counsel", "Counsel"),
    ("recipient", "Recipient"),
    ("performer", "Performer"),
    ("composer", "Composer"),
    ("wordsBy", "Words By"),
    ("cartographer", "Cartographer"),
    ("programmer", "Programmer"),
    ("reviewedAuthor", "Reviewed Author"),
    ("presenter", "Presenter"),
    ("bookAuthor", "Book Author"),
];

const FIELDS: &[&str] = &[
    "title", "abstractNote", "date", "url", "accessDate", "language", "shortTitle",
    "extra", "publisher", "place", "pages", "numPages", "volume", "numberOfVolumes",
    "issue", "series", "seriesNumber", "edition", "publicationTitle", "bookTitle",
    "journalAbbreviation", "DOI", "ISBN", "ISSN", "callNumber", "archive",
    "archiveLocation", "libraryCatalog", "rights", "caseName", "court", "dateDecided",
    "nameOfAct", "codeNumber", "section", "institution", "reportNumber", "reportType",
    "university", "thesisType", "websiteTitle", "websiteType", "runningTime",
    "versionNumber", "system", "programmingLanguage", "medium", "scale", "mapType",
    "letterType", "interviewMedium", "presentationType", "meetingName", "distributor",
    "genre", "videoRecordingFormat", "audioRecordingFormat", "label",
];

/// The resolved vocabulary tables.
///
/// Constructed once per process (usually via [`Vocabulary::builtin`]) and
/// shared; all lookups are read-only.
pub struct Vocabulary {
    item_type_names: Vec<&'static str>,
    item_types_by_name: HashMap<&'static str, ItemTypeId>,
    item_type_localized: Vec<&'static str>,
    item_type_title_field: Vec<Option<FieldId>>,
    item_type_creators: Vec<Vec<CreatorTypeId>>,
    creator_type_names: Vec<&'static str>,
    creator_types_by_name: HashMap<&'static str, CreatorTypeId>,
    creator_type_localized: Vec<&'static str>,
    field_names: Vec<&'static str>,
    fields_by_name: HashMap<&'static str, FieldId>,
    note_type: ItemTypeId,
    attachment_type: ItemTypeId,
}

impl Vocabulary {
    /// The built-in vocabulary. Ids are assigned in table order starting
    /// at 1 and are stable for the life of the process.
    pub fn builtin() -> Self {
        let mut creator_type_names = Vec::new();
        let mut creator_types_by_name = HashMap::new();
        let mut creator_type_localized = Vec::new();
        for (i, (name, localized)) in CREATOR_TYPES.iter().enumerate() {
            let id = CreatorTypeId(i as u16 + 1);
            creator_type_names.push(*name);
            creator_type_localized.push(*localized);
            creator_types_by_name.insert(*name, id);
        }

        let mut field_names = Vec::new();
        let mut fields_by_name = HashMap::new();
        for (i, name) in FIELDS.iter().enumerate() {
            let id = FieldId(i as u16 + 1);
            field_names.push(*name);
            fields_by_name.insert(*name, id);
        }

        let mut item_type_names = Vec::new();
        let mut item_types_by_name = HashMap::new();
        let mut item_type_localized = Vec::new();
        let mut item_type_title_field = Vec::new();
        let mut item_type_creators = Vec::new();
        for (i, def) in ITEM_TYPES.iter().enumerate() {
            let id = ItemTypeId(i as u16 + 1);
            item_type_names.push(def.name);
            item_type_localized.push(def.localized);
            item_types_by_name.insert(def.name, id);
            item_type_title_field.push(fields_by_name.get(def.title_field).copied());
            item_type_creators.push(
                def.creator_types
                    .iter()
                    .map(|name| creator_types_by_name[name])
                    .collect(),
            );
        }

        let note_type = item_types_by_name["note"];
        let attachment_type = item_types_by_name["attachment"];

        Self {
            item_type_names,
            item_types_by_name,
            item_type_localized,
            item_type_title_field,
            item_type_creators,
            creator_type_names,
            creator_types_by_name,
            creator_type_localized,
            field_names,
            fields_by_name,
            note_type,
            attachment_type,
        }
    }

    // -----------------------------------------------------------------
    // Item types
    // -----------------------------------------------------------------

    pub fn item_type_id(&self, name: &str) -> Option<ItemTypeId> {
        self.item_types_by_name.get(name).copied()
    }

    pub fn item_type_name(&self, id: ItemTypeId) -> Option<&'static str> {
        self.item_type_names.get(id.0 as usize - 1).copied()
    }

    /// Localized display name, used for item-type sorts.
    pub fn item_type_localized(&self, id: ItemTypeId) -> Option<&'static str> {
        self.item_type_localized.get(id.0 as usize - 1).copied()
    }

    pub fn note_type(&self) -> ItemTypeId {
        self.note_type
    }

    pub fn attachment_type(&self) -> ItemTypeId {
        self.attachment_type
    }

    pub fn is_note(&self, id: ItemTypeId) -> bool {
        id == self.note_type
    }

    pub fn is_attachment(&self, id: ItemTypeId) -> bool {
        id == self.attachment_type
    }

    /// The field presented as this type's title (`title`, `caseName`, …).
    ///
    /// Title sorts coalesce across these per-type aliases.
    pub fn title_field(&self, id: ItemTypeId) -> Option<FieldId> {
        self.item_type_title_field.get(id.0 as usize - 1).copied().flatten()
    }

    // -----------------------------------------------------------------
    // Creator types
    // -----------------------------------------------------------------

    pub fn creator_type_id(&self, name: &str) -> Option<CreatorTypeId> {
        self.creator_types_by_name.get(name).copied()
    }

    pub fn creator_type_name(&self, id: CreatorTypeId) -> Option<&'static str> {
        self.creator_type_names.get(id.0 as usize - 1).copied()
    }

    pub fn creator_type_localized(&self, id: CreatorTypeId) -> Option<&'static str> {
        self.creator_type_localized.get(id.0 as usize - 1).copied()
    }

    pub fn creator_type_valid_for(&self, creator_type: CreatorTypeId, item_type: ItemTypeId) -> bool {
        self.item_type_creators
            .get(item_type.0 as usize - 1)
            .is_some_and(|types| types.contains(&creator_type))
    }

    /// The primary creator type of an item type (listed first in its table).
    pub fn primary_creator_type(&self, item_type: ItemTypeId) -> Option<CreatorTypeId> {
        self.item_type_creators
            .get(item_type.0 as usize - 1)
            .and_then(|types| types.first().copied())
    }

    // -----------------------------------------------------------------
    // Fields
    // -----------------------------------------------------------------

    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.fields_by_name.get(name).copied()
    }

    pub fn field_name(&self, id: FieldId) -> Option<&'static str> {
        self.field_names.get(id.0 as usize - 1).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_type_roundtrip() {
        let vocab = Vocabulary::builtin();
        let id = vocab.item_type_id("journalArticle").unwrap();
        assert_eq!(vocab.item_type_name(id), Some("journalArticle"));
        assert_eq!(vocab.item_type_localized(id), Some("Journal Article"));
    }

    #[test]
    fn unknown_item_type_is_none() {
        let vocab = Vocabulary::builtin();
        assert!(vocab.item_type_id("hologram").is_none());
    }

    #[test]
    fn note_and_attachment_have_no_creators() {
        let vocab = Vocabulary::builtin();
        assert!(vocab.primary_creator_type(vocab.note_type()).is_none());
        assert!(vocab.primary_creator_type(vocab.attachment_type()).is_none());
    }

    #[test]
    fn author_valid_for_book_not_for_film() {
        let vocab = Vocabulary::builtin();
        let author = vocab.creator_type_id("author").unwrap();
        let book = vocab.item_type_id("book").unwrap();
        let film = vocab.item_type_id("film").unwrap();
        assert!(vocab.creator_type_valid_for(author, book));
        assert!(!vocab.creator_type_valid_for(author, film));
    }

    #[test]
    fn primary_creator_is_first_listed() {
        let vocab = Vocabulary::builtin();
        let film = vocab.item_type_id("film").unwrap();
        let director = vocab.creator_type_id("director").unwrap();
        assert_eq!(vocab.primary_creator_type(film), Some(director));
    }

    #[test]
    fn case_title_field_is_case_name() {
        let vocab = Vocabulary::builtin();
        let case = vocab.item_type_id("case").unwrap();
        let title = vocab.title_field(case).unwrap();
        assert_eq!(vocab.field_name(title), Some("caseName"));
    }

    #[test]
    fn note_has_no_title_field() {
        let vocab = Vocabulary::builtin();
        assert!(vocab.title_field(vocab.note_type()).is_none());
    }

    #[test]
    fn tag_type_numeric_roundtrip() {
        assert_eq!(serde_json::to_string(&TagType::User).unwrap(), "0");
        assert_eq!(serde_json::to_string(&TagType::Automatic).unwrap(), "1");
        assert_eq!(serde_json::from_str::<TagType>("1").unwrap(), TagType::Automatic);
        assert!(serde_json::from_str::<TagType>("2").is_err());
    }

    #[test]
    fn link_mode_parse() {
        assert_eq!(LinkMode::parse("imported_file").unwrap(), LinkMode::ImportedFile);
        assert!(LinkMode::ImportedUrl.is_imported());
        assert!(!LinkMode::LinkedUrl.is_imported());
        assert!(LinkMode::parse("embedded").is_err());
    }
}
