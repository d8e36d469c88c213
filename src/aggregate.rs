//! Filtered, joined, projected and paginated listings.
//!
//! A [`Pipeline`] is declared with builder calls in any order but always
//! executes its stages in the same order: match, join, project, sort,
//! window. Stages run in-process over the documents the store returns for
//! the match filter, so every backend produces identical pages.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use serde_json::Value;

use crate::id::ObjectId;
use crate::models::USER_SUMMARY_FIELDS;
use crate::store::{Collection, Document, Filter, Store, StoreError, ID_FIELD, OWNER_FIELD};

pub const DEFAULT_PAGE_LIMIT: u64 = 10;
pub const MAX_PAGE_LIMIT: u64 = 100;
pub const DEFAULT_SORT_FIELD: &str = "createdAt";

/// A clamped `(page, limit)` pair. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u64,
    pub limit: u64,
}

impl PageWindow {
    /// Values below 1 become 1; limits above [`MAX_PAGE_LIMIT`] are capped.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let clamp = |raw: i64| u64::try_from(raw.max(1)).unwrap_or(1);
        Self {
            page: page.map_or(1, clamp),
            limit: limit
                .map_or(DEFAULT_PAGE_LIMIT, clamp)
                .min(MAX_PAGE_LIMIT),
        }
    }

    fn skip(&self) -> usize {
        usize::try_from((self.page - 1).saturating_mul(self.limit)).unwrap_or(usize::MAX)
    }

    fn take(&self) -> usize {
        usize::try_from(self.limit).unwrap_or(usize::MAX)
    }
}

impl Default for PageWindow {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Accepts `asc`/`ascending`/`1` and `desc`/`descending`/`-1`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" | "1" => Some(Self::Asc),
            "desc" | "descending" | "-1" => Some(Self::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: DEFAULT_SORT_FIELD.to_owned(),
            direction: SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub docs: Vec<T>,
    pub total_docs: u64,
    pub limit: u64,
    pub page: u64,
    pub total_pages: u64,
    pub has_prev_page: bool,
    pub has_next_page: bool,
}

impl<T> Page<T> {
    pub fn new(docs: Vec<T>, total_docs: u64, window: PageWindow) -> Self {
        let total_pages = total_docs.div_ceil(window.limit).max(1);
        Self {
            docs,
            total_docs,
            limit: window.limit,
            page: window.page,
            total_pages,
            has_prev_page: window.page > 1,
            has_next_page: window.page < total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            docs: self.docs.into_iter().map(f).collect(),
            total_docs: self.total_docs,
            limit: self.limit,
            page: self.page,
            total_pages: self.total_pages,
            has_prev_page: self.has_prev_page,
            has_next_page: self.has_next_page,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    collection: Collection,
    filter: Filter,
    search: Option<(Vec<String>, String)>,
    owner_fields: Option<Vec<String>>,
    projection: Option<Vec<String>>,
    sort: SortSpec,
    window: PageWindow,
}

impl Pipeline {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filter: Filter::new(),
            search: None,
            owner_fields: None,
            projection: None,
            sort: SortSpec::default(),
            window: PageWindow::default(),
        }
    }

    pub fn matching(mut self, filter: Filter) -> Self {
        self.filter = self.filter.and(filter);
        self
    }

    /// Case-insensitive substring match of `needle` against any of `fields`.
    /// A blank needle matches everything.
    pub fn search(mut self, fields: &[&str], needle: &str) -> Self {
        let needle = needle.trim().to_lowercase();
        if !needle.is_empty() {
            self.search = Some((fields.iter().map(|f| (*f).to_owned()).collect(), needle));
        }
        self
    }

    /// Replaces `owner` with the owner's public fields. Documents whose
    /// owner no longer exists are dropped.
    pub fn join_owner(mut self, fields: &[&str]) -> Self {
        self.owner_fields = Some(fields.iter().map(|f| (*f).to_owned()).collect());
        self
    }

    pub fn project(mut self, fields: &[&str]) -> Self {
        self.projection = Some(fields.iter().map(|f| (*f).to_owned()).collect());
        self
    }

    pub fn sort_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.sort = SortSpec {
            field: field.to_owned(),
            direction,
        };
        self
    }

    pub fn paginate(mut self, window: PageWindow) -> Self {
        self.window = window;
        self
    }

    /// Every matching document, sorted, without the page window.
    pub async fn collect(&self, store: &dyn Store) -> Result<Vec<Document>, StoreError> {
        let mut docs = store.find(self.collection, &self.filter).await?;

        if let Some((fields, needle)) = &self.search {
            docs.retain(|doc| matches_search(doc, fields, needle));
        }

        if let Some(fields) = &self.owner_fields {
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            docs = join_owners(store, docs, &fields).await?;
        }

        if let Some(fields) = &self.projection {
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            docs = docs.iter().map(|doc| project(doc, &fields)).collect();
        }

        sort_documents(&mut docs, &self.sort);
        Ok(docs)
    }

    pub async fn run(&self, store: &dyn Store) -> Result<Page<Document>, StoreError> {
        let docs = self.collect(store).await?;
        let total = u64::try_from(docs.len()).unwrap_or(u64::MAX);
        let window: Vec<Document> = docs
            .into_iter()
            .skip(self.window.skip())
            .take(self.window.take())
            .collect();
        Ok(Page::new(window, total, self.window))
    }
}

fn matches_search(doc: &Document, fields: &[String], needle: &str) -> bool {
    fields.iter().any(|field| {
        doc.get(field)
            .and_then(Value::as_str)
            .is_some_and(|text| text.to_lowercase().contains(needle))
    })
}

/// Keeps only the allow-listed `fields` of `doc`.
pub fn project(doc: &Document, fields: &[&str]) -> Document {
    fields
        .iter()
        .filter_map(|field| doc.get(*field).map(|value| ((*field).to_owned(), value.clone())))
        .collect()
}

/// Public user summaries keyed by id. Unknown ids are simply absent.
pub async fn lookup_users(
    store: &dyn Store,
    ids: &[ObjectId],
    fields: &[&str],
) -> Result<HashMap<String, Document>, StoreError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let users = store.find(Collection::Users, &Filter::ids(ids)).await?;
    Ok(users
        .into_iter()
        .filter_map(|user| {
            let id = user.get(ID_FIELD)?.as_str()?.to_owned();
            Some((id, project(&user, fields)))
        })
        .collect())
}

/// Inlines each document's owner, dropping documents whose owner is gone.
pub async fn join_owners(
    store: &dyn Store,
    docs: Vec<Document>,
    fields: &[&str],
) -> Result<Vec<Document>, StoreError> {
    let owner_ids: Vec<ObjectId> = docs
        .iter()
        .filter_map(|doc| doc.get(OWNER_FIELD)?.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter_map(|raw| ObjectId::parse(raw).ok())
        .collect();
    let owners = lookup_users(store, &owner_ids, fields).await?;

    Ok(docs
        .into_iter()
        .filter_map(|mut doc| {
            let owner = doc
                .get(OWNER_FIELD)
                .and_then(Value::as_str)
                .and_then(|id| owners.get(id))?
                .clone();
            doc.insert(OWNER_FIELD.to_owned(), Value::Object(owner));
            Some(doc)
        })
        .collect())
}

/// Default owner join used by most listings.
pub async fn join_owner_summaries(
    store: &dyn Store,
    docs: Vec<Document>,
) -> Result<Vec<Document>, StoreError> {
    join_owners(store, docs, USER_SUMMARY_FIELDS).await
}

fn sort_documents(docs: &mut [Document], sort: &SortSpec) {
    // Stable: equal keys keep store (id) order.
    docs.sort_by(|a, b| {
        let ordering = compare_values(
            a.get(&sort.field).unwrap_or(&Value::Null),
            b.get(&sort.field).unwrap_or(&Value::Null),
        );
        match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total order over JSON values: null, numbers, strings, objects, arrays,
/// booleans.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
