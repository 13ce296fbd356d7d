//! datarepo Test Utilities
//!
//! Shared test infrastructure for the datarepo workspace:
//! - A `Book` record and its key extractors and cache definitions
//! - An in-memory source of truth implementing the fetcher and writer traits
//! - Proptest generators
//! - Error assertions
//! - Tracing setup for tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Re-export the types most tests need
pub use datarepo_core::{
    DataRepoError, DataRepoResult, FetchError, KeyExtractor, KeyValue, Lookup,
    NonUniqueKeyCacheDefinition, RequestContext, UniqueKeyCacheDefinition, WriteError,
};
pub use datarepo_storage::{DataFetcher, DataWriter, PartialDataWriter};

// ============================================================================
// RECORDS
// ============================================================================

/// Publication state of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    Draft,
    Published,
    OutOfPrint,
}

/// The record type used throughout the tests.
///
/// `id` is the unique key, `author_id` the non-unique one. An empty `title`
/// or a `None` `author_id` means "unchanged" in a partial update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: Uuid,
    pub author_id: Option<Uuid>,
    pub title: String,
    pub status: BookStatus,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// A draft with no id yet; `create` assigns one.
    pub fn draft(author_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::nil(),
            author_id: Some(author_id),
            title: title.into(),
            status: BookStatus::Draft,
            updated_at: Utc::now(),
        }
    }

    /// A partial update touching only `title`.
    pub fn retitle(id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id,
            author_id: None,
            title: title.into(),
            status: BookStatus::Draft,
            updated_at: Utc::now(),
        }
    }
}

pub const BOOK_ID: &str = "id";
pub const BOOK_AUTHOR: &str = "author_id";

pub fn book_by_id() -> KeyExtractor<Book> {
    KeyExtractor::new(BOOK_ID, |b: &Book| b.id)
}

pub fn book_by_author() -> KeyExtractor<Book> {
    KeyExtractor::new(BOOK_AUTHOR, |b: &Book| b.author_id)
}

// ============================================================================
// IN-MEMORY SOURCE OF TRUTH
// ============================================================================

/// Thread-safe in-memory book table.
///
/// Serves unique lookups on `id` and grouped lookups on `author_id`, and
/// implements every writer operation. Every call honors the request context.
#[derive(Debug, Default)]
pub struct InMemoryDataSource {
    books: RwLock<HashMap<Uuid, Book>>,
    fail_writes: AtomicBool,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a book directly, bypassing any repository.
    pub fn insert(&self, book: Book) {
        if let Ok(mut books) = self.books.write() {
            books.insert(book.id, book);
        }
    }

    pub fn get(&self, id: Uuid) -> Option<Book> {
        self.books.read().ok()?.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.books.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every subsequent write fail with `WriteError::Rejected`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    fn check_writable(&self, ctx: &RequestContext) -> DataRepoResult<()> {
        ctx.check()?;
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(WriteError::Rejected {
                reason: "writes disabled".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn by_id(&self, id: &KeyValue) -> DataRepoResult<Option<Book>> {
        let KeyValue::Uuid(id) = id else {
            return Ok(None);
        };
        let books = self.books.read().map_err(|_| poisoned())?;
        Ok(books.get(id).cloned())
    }

    /// Books by author, oldest id first.
    fn by_author(&self, author: &KeyValue) -> DataRepoResult<Vec<Book>> {
        let KeyValue::Uuid(author) = author else {
            return Ok(Vec::new());
        };
        let books = self.books.read().map_err(|_| poisoned())?;
        let mut group: Vec<Book> = books
            .values()
            .filter(|b| b.author_id.as_ref() == Some(author))
            .cloned()
            .collect();
        group.sort_by_key(|b| b.id);
        Ok(group)
    }
}

fn poisoned() -> DataRepoError {
    FetchError::Backend {
        reason: "book table lock poisoned".to_string(),
    }
    .into()
}

fn require_field(field: &str, expected: &str) -> DataRepoResult<()> {
    if field != expected {
        return Err(FetchError::UnknownField {
            field: field.to_string(),
        }
        .into());
    }
    Ok(())
}

#[async_trait]
impl DataFetcher<Book> for InMemoryDataSource {
    async fn find_by_key(
        &self,
        ctx: &RequestContext,
        field: &str,
        id: &KeyValue,
    ) -> DataRepoResult<Lookup<Book>> {
        ctx.check()?;
        require_field(field, BOOK_ID)?;
        Ok(self.by_id(id)?.into())
    }

    async fn find_by_keys(
        &self,
        ctx: &RequestContext,
        field: &str,
        ids: &[KeyValue],
    ) -> DataRepoResult<Vec<Lookup<Book>>> {
        ctx.check()?;
        require_field(field, BOOK_ID)?;
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            found.push(self.by_id(id)?.into());
        }
        Ok(found)
    }
}

#[async_trait]
impl DataFetcher<Vec<Book>> for InMemoryDataSource {
    async fn find_by_key(
        &self,
        ctx: &RequestContext,
        field: &str,
        id: &KeyValue,
    ) -> DataRepoResult<Lookup<Vec<Book>>> {
        ctx.check()?;
        require_field(field, BOOK_AUTHOR)?;
        let group = self.by_author(id)?;
        Ok(if group.is_empty() {
            Lookup::Empty
        } else {
            Lookup::Value(group)
        })
    }

    async fn find_by_keys(
        &self,
        ctx: &RequestContext,
        field: &str,
        ids: &[KeyValue],
    ) -> DataRepoResult<Vec<Lookup<Vec<Book>>>> {
        ctx.check()?;
        require_field(field, BOOK_AUTHOR)?;
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            let group = self.by_author(id)?;
            found.push(if group.is_empty() {
                Lookup::Empty
            } else {
                Lookup::Value(group)
            });
        }
        Ok(found)
    }
}

#[async_trait]
impl DataWriter<Book> for InMemoryDataSource {
    async fn create(&self, ctx: &RequestContext, value: &mut Book) -> DataRepoResult<()> {
        self.check_writable(ctx)?;
        if value.id.is_nil() {
            value.id = Uuid::now_v7();
        }
        value.updated_at = Utc::now();

        let mut books = self.books.write().map_err(|_| poisoned())?;
        if books.contains_key(&value.id) {
            return Err(WriteError::Conflict {
                key: value.id.to_string(),
            }
            .into());
        }
        books.insert(value.id, value.clone());
        Ok(())
    }

    async fn update(&self, ctx: &RequestContext, value: &Book) -> DataRepoResult<()> {
        self.check_writable(ctx)?;
        let mut books = self.books.write().map_err(|_| poisoned())?;
        match books.get_mut(&value.id) {
            Some(stored) => {
                *stored = value.clone();
                Ok(())
            }
            None => Err(WriteError::NotFound {
                key: value.id.to_string(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl PartialDataWriter<Book> for InMemoryDataSource {
    async fn partial_update(&self, ctx: &RequestContext, value: &mut Book) -> DataRepoResult<()> {
        self.check_writable(ctx)?;
        let mut books = self.books.write().map_err(|_| poisoned())?;
        let Some(stored) = books.get_mut(&value.id) else {
            return Err(WriteError::NotFound {
                key: value.id.to_string(),
            }
            .into());
        };

        if !value.title.is_empty() {
            stored.title = value.title.clone();
        }
        if value.author_id.is_some() {
            stored.author_id = value.author_id;
        }
        stored.updated_at = Utc::now();
        *value = stored.clone();
        Ok(())
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Cache definitions and pre-built books.

    use super::*;

    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

    /// Unique cache on `id`, prefix `book:`.
    pub fn by_id_definition() -> UniqueKeyCacheDefinition<Book> {
        UniqueKeyCacheDefinition::new("book:", book_by_id(), DEFAULT_TTL)
    }

    /// Non-unique cache on `author_id` with sub-key `id`, prefix `author:`.
    pub fn by_author_definition() -> NonUniqueKeyCacheDefinition<Book> {
        NonUniqueKeyCacheDefinition::new("author:", book_by_author(), book_by_id(), DEFAULT_TTL)
    }

    /// A stored book with a fresh id.
    pub fn published_book(author_id: Uuid, title: &str) -> Book {
        Book {
            id: Uuid::now_v7(),
            author_id: Some(author_id),
            title: title.to_string(),
            status: BookStatus::Published,
            updated_at: Utc::now(),
        }
    }

    /// A book with no author, whose `author_id` key is blank.
    pub fn orphan_book(title: &str) -> Book {
        Book {
            author_id: None,
            ..published_book(Uuid::nil(), title)
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for test records.

    use super::*;
    use proptest::prelude::*;

    /// Generate a random UUID.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    pub fn arb_book_status() -> impl Strategy<Value = BookStatus> {
        prop_oneof![
            Just(BookStatus::Draft),
            Just(BookStatus::Published),
            Just(BookStatus::OutOfPrint),
        ]
    }

    /// Generate a timestamp between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
        (1577836800i64..1893456000i64)
            .prop_map(|secs| DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now))
    }

    pub fn arb_title() -> impl Strategy<Value = String> {
        "[A-Z][a-z]{2,12}( [a-z]{2,10}){0,3}"
    }

    /// Generate a book written by one of `authors`.
    pub fn arb_book(authors: Vec<Uuid>) -> impl Strategy<Value = Book> {
        (
            arb_uuid(),
            prop::sample::select(authors),
            arb_title(),
            arb_book_status(),
            arb_timestamp(),
        )
            .prop_map(|(id, author, title, status, updated_at)| Book {
                id,
                author_id: Some(author),
                title,
                status,
                updated_at,
            })
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on error classes.

    use super::*;

    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &DataRepoResult<T>) {
        match result {
            Err(e) if e.is_config() => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_dispatch_error<T: std::fmt::Debug>(result: &DataRepoResult<T>) {
        match result {
            Err(e) if e.is_dispatch() => {}
            other => panic!("Expected Dispatch error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_backend_error<T: std::fmt::Debug>(result: &DataRepoResult<T>) {
        match result {
            Err(e) if e.is_backend() => {}
            other => panic!("Expected backend error, got: {:?}", other),
        }
    }
}

// ============================================================================
// TRACING
// ============================================================================

/// Install a fmt subscriber for tests, filtered by `RUST_LOG` (default
/// `warn`). Safe to call from every test.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ctx() -> RequestContext {
        RequestContext::background()
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_groups_by_author() {
        let source = InMemoryDataSource::new();
        let author = Uuid::now_v7();

        let mut first = Book::draft(author, "First");
        let mut second = Book::draft(author, "Second");
        source.create(&ctx(), &mut first).await.unwrap();
        source.create(&ctx(), &mut second).await.unwrap();
        assert!(!first.id.is_nil());
        assert_eq!(source.len(), 2);

        let group = DataFetcher::<Vec<Book>>::find_by_key(
            &source,
            &ctx(),
            BOOK_AUTHOR,
            &KeyValue::from(author),
        )
        .await
        .unwrap();
        assert_eq!(group.into_value(), vec![first.clone(), second]);

        let id = KeyValue::from(first.id);
        let found = DataFetcher::<Book>::find_by_key(&source, &ctx(), BOOK_ID, &id)
            .await
            .unwrap();
        assert_eq!(found, Lookup::Value(first));
    }

    #[tokio::test]
    async fn test_unknown_field_rejected() {
        let source = InMemoryDataSource::new();
        let result =
            DataFetcher::<Book>::find_by_key(&source, &ctx(), "isbn", &KeyValue::from("x")).await;
        assert_eq!(
            result.unwrap_err(),
            DataRepoError::Fetch(FetchError::UnknownField {
                field: "isbn".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_partial_update_refills_full_record() {
        let source = InMemoryDataSource::new();
        let book = fixtures::published_book(Uuid::now_v7(), "Old");
        source.insert(book.clone());

        let mut patch = Book::retitle(book.id, "New");
        source.partial_update(&ctx(), &mut patch).await.unwrap();

        assert_eq!(patch.title, "New");
        assert_eq!(patch.author_id, book.author_id);
        assert_eq!(patch.status, BookStatus::Published);
        assert_eq!(source.get(book.id), Some(patch));
    }

    #[tokio::test]
    async fn test_write_failures() {
        let source = InMemoryDataSource::new();
        let missing = fixtures::published_book(Uuid::now_v7(), "Ghost");
        assertions::assert_backend_error(&source.update(&ctx(), &missing).await);

        source.set_fail_writes(true);
        let mut draft = Book::draft(Uuid::now_v7(), "Blocked");
        assertions::assert_backend_error(&source.create(&ctx(), &mut draft).await);
        assert!(source.is_empty());
    }

    #[test]
    fn test_extractors() {
        let book = fixtures::orphan_book("Alone");
        assert_eq!(book_by_id().extract(&book), KeyValue::Uuid(book.id));
        assert!(book_by_author().extract(&book).is_blank());
        assert!(fixtures::by_author_definition().validate().is_ok());
    }

    proptest! {
        #[test]
        fn prop_generated_books_belong_to_given_authors(
            book in generators::arb_book(vec![Uuid::from_u128(1), Uuid::from_u128(2)])
        ) {
            let author = book.author_id.unwrap();
            prop_assert!(author == Uuid::from_u128(1) || author == Uuid::from_u128(2));
            prop_assert!(!book.title.is_empty());
        }
    }
}
