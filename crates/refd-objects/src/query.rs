use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use refd_index::SearchIndex;
use refd_types::{LibraryId, ObjectKey, ObjectVersion};
use tracing::debug;

use crate::error::{DataError, DataResult};
use crate::items::{Item, ItemStore};

/// One tag parameter. Multiple filters are ANDed; the members of a
/// `Positive` set are ORed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagFilter {
    Positive(Vec<String>),
    Negative(String),
}

impl TagFilter {
    /// Parse the query-parameter syntax: `a` matches, `-a` excludes,
    /// `a||b` matches either. Tag names match whole, so phrases need no
    /// quoting.
    pub fn parse(raw: &str) -> Self {
        if let Some(negated) = raw.strip_prefix('-') {
            return TagFilter::Negative(negated.to_string());
        }
        TagFilter::Positive(raw.split("||").map(|s| s.trim().to_string()).collect())
    }

    fn matches(&self, item: &Item) -> bool {
        let has = |name: &str| item.record.tags.iter().any(|t| t.name == name);
        match self {
            TagFilter::Positive(any_of) => any_of.iter().any(|name| has(name)),
            TagFilter::Negative(name) => !has(name),
        }
    }
}

/// Sort key selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SortField {
    /// The item type's title field, coalesced across per-type aliases.
    Title,
    /// First creator's display name.
    CreatorSummary,
    Date,
    /// Localized item type name.
    ItemType,
    /// Creating user, for group libraries.
    AddedBy,
    /// Any raw data field by name.
    Field(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Where items with an empty sort key land.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmptyPlacement {
    First,
    #[default]
    Last,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Full,
    Keys,
    Versions,
}

/// Search parameters. All filters are ANDed together.
#[derive(Clone, Debug)]
pub struct SearchParams {
    /// Exclude child notes and attachments.
    pub top_level_only: bool,
    pub include_trashed: bool,
    pub tags: Vec<TagFilter>,
    pub item_type: Option<String>,
    /// Explicit key-set filter.
    pub keys: Option<Vec<ObjectKey>>,
    /// Free text, answered by the search index.
    pub text: Option<String>,
    /// Version floor: only items with `version > newer`.
    pub newer: Option<ObjectVersion>,
    pub sort: Option<SortField>,
    pub direction: SortDirection,
    pub empty: EmptyPlacement,
    pub start: usize,
    pub limit: Option<usize>,
    pub format: OutputFormat,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            top_level_only: false,
            include_trashed: false,
            tags: Vec::new(),
            item_type: None,
            keys: None,
            text: None,
            newer: None,
            sort: None,
            direction: SortDirection::default(),
            empty: EmptyPlacement::default(),
            start: 0,
            limit: None,
            format: OutputFormat::default(),
        }
    }
}

/// Search output in the requested format.
#[derive(Debug)]
pub enum SearchResults {
    Full(Vec<Item>),
    Keys(Vec<ObjectKey>),
    Versions(BTreeMap<ObjectKey, ObjectVersion>),
}

impl SearchResults {
    pub fn len(&self) -> usize {
        match self {
            SearchResults::Full(v) => v.len(),
            SearchResults::Keys(v) => v.len(),
            SearchResults::Versions(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<ObjectKey> {
        match self {
            SearchResults::Full(v) => v.iter().map(Item::key).collect(),
            SearchResults::Keys(v) => v.clone(),
            SearchResults::Versions(m) => m.keys().copied().collect(),
        }
    }
}

/// Filtered, sorted, paginated item search.
///
/// Pagination is deterministic: every sort falls back to `(version, id)`
/// so equal sort keys cannot reshuffle between pages.
pub fn search(
    store: &ItemStore,
    index: Option<&dyn SearchIndex>,
    library: LibraryId,
    params: &SearchParams,
) -> DataResult<SearchResults> {
    let mut items = store.all(library)?;

    if !params.include_trashed {
        items.retain(|i| !i.record.deleted);
    }
    if params.top_level_only {
        items.retain(|i| i.record.parent.is_none());
    }
    if let Some(type_name) = &params.item_type {
        let type_id = store.vocab().item_type_id(type_name).ok_or_else(|| {
            DataError::InvalidInput(format!("'{type_name}' is not a valid item type"))
        })?;
        items.retain(|i| i.record.item_type == type_id);
    }
    if let Some(keys) = &params.keys {
        let wanted: HashSet<ObjectKey> = keys.iter().copied().collect();
        items.retain(|i| wanted.contains(&i.row.key));
    }
    if let Some(floor) = params.newer {
        items.retain(|i| i.row.version > floor);
    }
    for filter in &params.tags {
        items.retain(|i| filter.matches(i));
    }
    if let Some(text) = &params.text {
        let index = index.ok_or_else(|| {
            DataError::InvalidInput("free-text search requires a search index".into())
        })?;
        let hits = index
            .query(library, text)
            .map_err(|e| DataError::Consistency(e.to_string()))?;
        let candidates: HashSet<ObjectKey> = hits.into_iter().map(|(_, key)| key).collect();
        let loaded: HashSet<ObjectKey> = items.iter().map(Item::key).collect();
        for stale in candidates.difference(&loaded) {
            // The index lags deletes; hits without a stored row are dropped.
            debug!(%library, key = %stale, "dropping index hit with no stored item");
        }
        items.retain(|i| candidates.contains(&i.row.key));
    }

    if let Some(sort) = &params.sort {
        let mut keyed: Vec<(String, Item)> = items
            .into_iter()
            .map(|item| Ok((sort_key(store, sort, &item)?, item)))
            .collect::<DataResult<_>>()?;
        keyed.sort_by(|(ka, a), (kb, b)| {
            match (ka.is_empty(), kb.is_empty()) {
                (true, false) => {
                    return match params.empty {
                        EmptyPlacement::First => Ordering::Less,
                        EmptyPlacement::Last => Ordering::Greater,
                    }
                }
                (false, true) => {
                    return match params.empty {
                        EmptyPlacement::First => Ordering::Greater,
                        EmptyPlacement::Last => Ordering::Less,
                    }
                }
                _ => {}
            }
            let primary = ka.cmp(kb);
            let tiebreak = (a.row.version, a.row.id).cmp(&(b.row.version, b.row.id));
            let ordering = primary.then(tiebreak);
            match params.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
        items = keyed.into_iter().map(|(_, item)| item).collect();
    } else {
        items.sort_by_key(|i| (i.row.version, i.row.id));
        if params.direction == SortDirection::Descending {
            items.reverse();
        }
    }

    let start = params.start.min(items.len());
    let end = match params.limit {
        Some(limit) => (start + limit).min(items.len()),
        None => items.len(),
    };
    let page = items.drain(start..end).collect::<Vec<_>>();

    Ok(match params.format {
        OutputFormat::Full => SearchResults::Full(page),
        OutputFormat::Keys => SearchResults::Keys(page.iter().map(Item::key).collect()),
        OutputFormat::Versions => SearchResults::Versions(
            page.iter().map(|i| (i.row.key, i.row.version)).collect(),
        ),
    })
}

fn sort_key(store: &ItemStore, sort: &SortField, item: &Item) -> DataResult<String> {
    let vocab = store.vocab();
    Ok(match sort {
        SortField::Title => {
            let title_field = vocab
                .title_field(item.record.item_type)
                .and_then(|f| vocab.field_name(f));
            match title_field {
                Some(name) => store
                    .field_values(item)?
                    .get(name)
                    .cloned()
                    .unwrap_or_default(),
                // Notes sort by their content.
                None => item.record.note.clone().unwrap_or_default(),
            }
        }
        SortField::CreatorSummary => match item.record.creators.first() {
            Some(creator_ref) => store
                .creator_store()
                .get(item.row.library, creator_ref.creator)?
                .map(|data| match data.last_name.is_empty() {
                    false => data.last_name,
                    true => data.first_name,
                })
                .unwrap_or_default(),
            None => String::new(),
        },
        SortField::Date => store
            .field_values(item)?
            .get("date")
            .cloned()
            .unwrap_or_default(),
        SortField::ItemType => vocab
            .item_type_localized(item.record.item_type)
            .unwrap_or_default()
            .to_string(),
        SortField::AddedBy => item
            .record
            .created_by
            .map(|u| u.to_string())
            .unwrap_or_default(),
        SortField::Field(name) => store
            .field_values(item)?
            .get(name.as_str())
            .cloned()
            .unwrap_or_default(),
    })
}
