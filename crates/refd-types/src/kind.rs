use std::fmt;

use serde::{Deserialize, Serialize};

/// The kinds of objects a library owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Item,
    Collection,
    Creator,
    Tag,
    Search,
    Relation,
}

/// Per-kind storage configuration.
///
/// An explicit lookup table instead of deriving table and column names from
/// the kind's name at runtime: every kind states its table, id column, and
/// plural form once, and the generic store code reads them from here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KindConfig {
    pub kind: ObjectKind,
    /// Singular name, also the cache-key prefix (`{singular}IDsByKey_{lib}`).
    pub singular: &'static str,
    pub plural: &'static str,
    pub table: &'static str,
    pub id_column: &'static str,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 6] = [
        ObjectKind::Item,
        ObjectKind::Collection,
        ObjectKind::Creator,
        ObjectKind::Tag,
        ObjectKind::Search,
        ObjectKind::Relation,
    ];

    pub fn config(self) -> &'static KindConfig {
        match self {
            ObjectKind::Item => &KindConfig {
                kind: ObjectKind::Item,
                singular: "item",
                plural: "items",
                table: "items",
                id_column: "itemID",
            },
            ObjectKind::Collection => &KindConfig {
                kind: ObjectKind::Collection,
                singular: "collection",
                plural: "collections",
                table: "collections",
                id_column: "collectionID",
            },
            ObjectKind::Creator => &KindConfig {
                kind: ObjectKind::Creator,
                singular: "creator",
                plural: "creators",
                table: "creators",
                id_column: "creatorID",
            },
            ObjectKind::Tag => &KindConfig {
                kind: ObjectKind::Tag,
                singular: "tag",
                plural: "tags",
                table: "tags",
                id_column: "tagID",
            },
            ObjectKind::Search => &KindConfig {
                kind: ObjectKind::Search,
                singular: "search",
                plural: "searches",
                table: "savedSearches",
                id_column: "searchID",
            },
            ObjectKind::Relation => &KindConfig {
                kind: ObjectKind::Relation,
                singular: "relation",
                plural: "relations",
                table: "relations",
                id_column: "relationID",
            },
        }
    }

    /// The distributed-cache key holding this kind's key→id map for a library.
    pub fn id_map_cache_key(self, library: crate::LibraryId) -> String {
        format!("{}IDsByKey_{}", self.config().singular, library)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config().singular)
    }
}
