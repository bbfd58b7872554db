use crate::model::Id;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

/// Opaque identifier of a pre-authenticated user. The service never
/// interprets it beyond equality and feed grouping.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn new(id: String) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// A stored post. `id`, `author_id` and `created_at` are immutable after
/// creation; `text` and `last_modified_at` change together on update.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Id<PostMarker>,
    pub text: String,
    pub author_id: UserId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified_at: OffsetDateTime,
}

/// Creation input. Id and timestamps are assigned by the storage backend.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct NewPost {
    pub text: String,
    pub author_id: UserId,
}

#[cfg(test)]
mod tests {
    use crate::model::post::{Post, UserId};
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn post_json_field_names() {
        let post = Post {
            id: 42.into(),
            text: "hello".to_owned(),
            author_id: UserId::from("u1"),
            created_at: datetime!(2026-02-03 10:00 UTC),
            last_modified_at: datetime!(2026-02-03 10:05 UTC),
        };

        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "42",
                "text": "hello",
                "authorId": "u1",
                "createdAt": "2026-02-03T10:00:00Z",
                "lastModifiedAt": "2026-02-03T10:05:00Z",
            })
        );

        let round_tripped: Post = serde_json::from_value(value).unwrap();
        assert_eq!(round_tripped, post);
    }
}
