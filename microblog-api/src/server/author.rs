use crate::server::ServerError;
use axum::{extract::FromRequestParts, http::request::Parts};
use microblog_common::model::post::UserId;

/// Header carrying the pre-authenticated caller's user id. Authentication
/// itself happens upstream; the service only requires the id to be present.
pub const USER_ID_HEADER: &str = "system-design-user-id";

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct Author(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for Author {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .ok_or(ServerError::MissingUserId)?;

        Ok(Self(UserId::from(user_id)))
    }
}
