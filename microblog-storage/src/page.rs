//! Cursor pagination over a per-author, id-descending feed.
//!
//! A token names the last post of the page it was issued with; the next page
//! starts strictly below it (`id < cursor`). Offset tokens are deliberately
//! not supported: an offset shifts whenever a newer post is prepended to the
//! feed, duplicating or skipping items across pages.

use crate::storage::StorageError;
use microblog_common::model::{
    Id,
    post::{Post, PostMarker},
};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;

pub const PAGE_LIMIT_MIN: usize = 1;
pub const PAGE_LIMIT_MAX: usize = 100;
pub const PAGE_LIMIT_DEFAULT: usize = 10;

/// Resumption point in a feed traversal, the decimal id of the last post of
/// an already-returned page.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(String);

impl PageToken {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    pub(crate) fn cursor(&self) -> Result<Id<PostMarker>, StorageError> {
        self.0
            .parse()
            .map_err(|_| StorageError::InvalidPageToken(self.0.clone()))
    }
}

impl Display for PageToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<Id<PostMarker>> for PageToken {
    fn from(value: Id<PostMarker>) -> Self {
        Self(value.to_string())
    }
}

/// Page size validated to the contract's bounds at construction, so backends
/// never see an out-of-range limit.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct PageLimit(usize);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Page limit is out of bounds: {0}")]
pub struct InvalidPageLimitError(usize);

impl PageLimit {
    #[must_use]
    pub fn new(limit: usize) -> Option<Self> {
        (PAGE_LIMIT_MIN..=PAGE_LIMIT_MAX)
            .contains(&limit)
            .then_some(Self(limit))
    }

    #[must_use]
    pub fn new_unchecked(limit: usize) -> Self {
        Self::new(limit).expect("PageLimit out of bounds.")
    }

    #[must_use]
    pub fn get(self) -> usize {
        self.0
    }

    /// Row count backends fetch to detect whether a further page exists.
    #[must_use]
    pub fn fetch_count(self) -> usize {
        self.0 + 1
    }
}

impl Default for PageLimit {
    fn default() -> Self {
        Self(PAGE_LIMIT_DEFAULT)
    }
}

impl TryFrom<usize> for PageLimit {
    type Error = InvalidPageLimitError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidPageLimitError(value))
    }
}

/// One page of an author's feed. `next` is `None` when the feed is
/// exhausted.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub next: Option<PageToken>,
}

impl PostPage {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Trims a `limit + 1` fetch down to a page. Receiving the extra row
    /// proves a further page exists, in which case the token of the last
    /// post kept becomes the resumption cursor.
    pub(crate) fn from_fetched(mut posts: Vec<Post>, limit: PageLimit) -> Self {
        if posts.len() > limit.get() {
            posts.truncate(limit.get());
            let next = posts.last().map(|post| PageToken::from(post.id));
            Self { posts, next }
        } else {
            Self { posts, next: None }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::page::{PAGE_LIMIT_MAX, PageLimit, PageToken, PostPage};
    use microblog_common::model::post::{Post, UserId};
    use time::OffsetDateTime;

    fn post(id: u64) -> Post {
        let now = OffsetDateTime::now_utc();
        Post {
            id: id.into(),
            text: format!("post {id}"),
            author_id: UserId::from("u1"),
            created_at: now,
            last_modified_at: now,
        }
    }

    #[test]
    fn page_limit_bounds() {
        assert!(PageLimit::new(0).is_none());
        assert!(PageLimit::new(1).is_some());
        assert!(PageLimit::new(PAGE_LIMIT_MAX).is_some());
        assert!(PageLimit::new(PAGE_LIMIT_MAX + 1).is_none());
        assert_eq!(PageLimit::default().get(), 10);
        assert_eq!(PageLimit::new_unchecked(3).fetch_count(), 4);
    }

    #[test]
    fn full_fetch_yields_next_token() {
        let fetched = vec![post(30), post(20), post(10)];
        let page = PostPage::from_fetched(fetched, PageLimit::new_unchecked(2));

        assert_eq!(page.posts.len(), 2);
        assert_eq!(page.posts[0].id, 30.into());
        assert_eq!(page.posts[1].id, 20.into());
        assert_eq!(page.next, Some(PageToken::new("20")));
    }

    #[test]
    fn short_fetch_ends_feed() {
        let fetched = vec![post(30), post(20)];
        let page = PostPage::from_fetched(fetched, PageLimit::new_unchecked(2));

        assert_eq!(page.posts.len(), 2);
        assert_eq!(page.next, None);
    }

    #[test]
    fn empty_fetch_is_empty_page() {
        let page = PostPage::from_fetched(Vec::new(), PageLimit::new_unchecked(2));
        assert!(page.posts.is_empty());
        assert_eq!(page.next, None);
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert!(PageToken::new("17").cursor().is_ok());
        assert!(PageToken::new("").cursor().is_err());
        assert!(PageToken::new("not-a-cursor").cursor().is_err());
        assert!(PageToken::new("-5").cursor().is_err());
    }
}
