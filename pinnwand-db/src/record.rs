//! Row types and their conversions into model types.

use pinnwand_common::model::{
    ModelValidationError,
    auth::Authentication,
    comment::{Comment, CommentId, CommentText},
    engagement::{EngagementEntry, EngagementKind},
    user::{User, UserHandle},
};
use sqlx::FromRow;
use thiserror::Error;
use time::{Duration, PrimitiveDateTime, UtcDateTime};

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Unknown engagement kind in database: {0:?}")]
pub struct UnknownEngagementKindError(String);

pub(crate) fn engagement_kind_to_str(kind: EngagementKind) -> &'static str {
    match kind {
        EngagementKind::Liked => "liked",
        EngagementKind::Unliked => "unliked",
    }
}

pub(crate) fn to_primitive(time: UtcDateTime) -> PrimitiveDateTime {
    PrimitiveDateTime::new(time.date(), time.time())
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub handle: String,
    pub avatar: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub post_snowflake: i64,
    pub author_snowflake: i64,
    pub body: String,
    pub created_at: PrimitiveDateTime,
    pub next_comment_id: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_id: i64,
    pub author_snowflake: i64,
    pub author_handle: String,
    pub author_avatar: Option<String>,
    pub content: String,
    pub created_at: PrimitiveDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct EngagementRecord {
    pub user_snowflake: i64,
    pub kind: String,
    pub created_at: PrimitiveDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_snowflake: i64,
    pub token_hash: Vec<u8>,
    pub created_at: PrimitiveDateTime,
    pub expires_after_seconds: Option<i64>,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_snowflake.cast_unsigned().into(),
            handle: UserHandle::new(value.handle)?,
            avatar: value.avatar,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CommentId::new(value.comment_id.cast_unsigned()),
            author: value.author_snowflake.cast_unsigned().into(),
            author_handle: UserHandle::new(value.author_handle)?,
            author_avatar: value.author_avatar,
            text: CommentText::new(value.content)?,
            created_at: value.created_at.as_utc(),
        })
    }
}

impl TryFrom<EngagementRecord> for EngagementEntry {
    type Error = UnknownEngagementKindError;

    fn try_from(value: EngagementRecord) -> Result<Self, Self::Error> {
        let kind = match value.kind.as_str() {
            "liked" => EngagementKind::Liked,
            "unliked" => EngagementKind::Unliked,
            _ => return Err(UnknownEngagementKindError(value.kind)),
        };

        Ok(Self {
            user: value.user_snowflake.cast_unsigned().into(),
            kind,
            created_at: value.created_at.as_utc(),
        })
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user_snowflake.cast_unsigned().into(),
            token_hash: value.token_hash.into_boxed_slice().try_into()?,
            created_at: value.created_at.as_utc(),
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        })
    }
}
