//! The post aggregate. This is the only entry point for engagement and
//! comment operations; the ledger and the comment store are not reachable
//! from outside the aggregate.

use crate::model::{
    Id,
    comment::{Comment, CommentError, CommentId, CommentStore, CommentText},
    engagement::{Engagement, EngagementLedger, EngagementState},
    guard::{Authored, NotOwnerError, ensure_owner},
    user::{User, UserMarker},
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::UtcDateTime;

pub const POST_BODY_MAX_LEN: usize = 50_000;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

/// Non-empty post text, validated at construction.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct PostBody(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The post body is invalid: {0:?}")]
pub struct InvalidPostBodyError(String);

impl PostBody {
    pub fn new(body: String) -> Result<Self, InvalidPostBodyError> {
        let char_count = body.chars().count();
        if char_count > 0 && char_count <= POST_BODY_MAX_LEN {
            Ok(PostBody(body))
        } else {
            Err(InvalidPostBodyError(body))
        }
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

impl<'de> Deserialize<'de> for PostBody {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        PostBody::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"PostBody"))
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author: Id<UserMarker>,
    pub body: PostBody,
    pub created_at: UtcDateTime,
    engagement: EngagementLedger,
    comments: CommentStore,
}

/// Input for creating a post; the id is assigned by the persistence layer.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub author: Id<UserMarker>,
    pub body: PostBody,
}

impl Authored for Post {
    fn author_id(&self) -> Id<UserMarker> {
        self.author
    }
}

impl Post {
    #[must_use]
    pub fn new(
        id: Id<PostMarker>,
        author: Id<UserMarker>,
        body: PostBody,
        created_at: UtcDateTime,
    ) -> Self {
        Self {
            id,
            author,
            body,
            created_at,
            engagement: EngagementLedger::new(),
            comments: CommentStore::new(),
        }
    }

    /// Reassembles an aggregate from persisted parts.
    #[must_use]
    pub fn from_parts(
        id: Id<PostMarker>,
        author: Id<UserMarker>,
        body: PostBody,
        created_at: UtcDateTime,
        engagement: EngagementLedger,
        comments: CommentStore,
    ) -> Self {
        Self {
            id,
            author,
            body,
            created_at,
            engagement,
            comments,
        }
    }

    #[must_use]
    pub fn engagement(&self) -> &EngagementLedger {
        &self.engagement
    }

    #[must_use]
    pub fn comments(&self) -> &CommentStore {
        &self.comments
    }

    #[must_use]
    pub fn engagement_state_for(&self, user: Id<UserMarker>) -> EngagementState {
        self.engagement.state_for(user)
    }

    /// Deleting a post is reserved for its author. The persistence layer
    /// performs the actual removal after this check passes.
    pub fn authorize_delete(&self, requester: Id<UserMarker>) -> Result<(), NotOwnerError> {
        ensure_owner(self, requester)
    }

    /// Replaces the post's text. Editing is reserved for the author;
    /// engagement and comments are untouched.
    pub fn edit_body(
        &mut self,
        requester: Id<UserMarker>,
        body: PostBody,
    ) -> Result<(), NotOwnerError> {
        ensure_owner(self, requester)?;
        self.body = body;
        Ok(())
    }

    pub fn like_at(&mut self, user: Id<UserMarker>, time: UtcDateTime) -> Vec<Engagement> {
        self.engagement.apply_like_at(user, time)
    }

    pub fn like(&mut self, user: Id<UserMarker>) -> Vec<Engagement> {
        self.engagement.apply_like(user)
    }

    pub fn unlike_at(&mut self, user: Id<UserMarker>, time: UtcDateTime) -> Vec<Engagement> {
        self.engagement.apply_unlike_at(user, time)
    }

    pub fn unlike(&mut self, user: Id<UserMarker>) -> Vec<Engagement> {
        self.engagement.apply_unlike(user)
    }

    pub fn add_comment_at(
        &mut self,
        author: &User,
        text: CommentText,
        time: UtcDateTime,
    ) -> CommentId {
        self.comments.add_at(author, text, time)
    }

    pub fn add_comment(&mut self, author: &User, text: CommentText) -> CommentId {
        self.comments.add(author, text)
    }

    pub fn edit_comment(
        &mut self,
        id: CommentId,
        requester: Id<UserMarker>,
        text: CommentText,
    ) -> Result<(), CommentError> {
        self.comments.edit(id, requester, text)
    }

    pub fn delete_comment(
        &mut self,
        id: CommentId,
        requester: Id<UserMarker>,
    ) -> Result<(), CommentError> {
        self.comments.delete(id, requester)
    }

    #[must_use]
    pub fn comment(&self, id: CommentId) -> Option<&Comment> {
        self.comments.get(id)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        comment::{CommentError, CommentText},
        engagement::EngagementState,
        guard::NotOwnerError,
        post::{Post, PostBody},
        user::{User, UserHandle, UserMarker},
    };
    use time::macros::utc_datetime;

    const TIME: time::UtcDateTime = utc_datetime!(2025-11-03 12:00);

    fn post_by(author: Id<UserMarker>) -> Post {
        Post::new(
            Id::from(100_u64),
            author,
            PostBody::new("a post".to_owned()).unwrap(),
            TIME,
        )
    }

    fn user(id: u64, handle: &str) -> User {
        User {
            id: Id::from(id),
            handle: UserHandle::new(handle.to_owned()).unwrap(),
            avatar: None,
        }
    }

    #[test]
    fn like_unlike_like_round_trip() {
        let anna = user(1, "anna");
        let bea = user(2, "bea");
        let mut post = post_by(anna.id);

        let likes = post.like_at(bea.id, TIME);
        assert_eq!(likes.len(), 1);
        assert_eq!(likes[0].user, bea.id);

        let unlikes = post.unlike_at(bea.id, TIME);
        assert!(post.engagement().likes().is_empty());
        assert_eq!(unlikes[0].user, bea.id);

        let likes = post.like_at(bea.id, TIME);
        assert_eq!(likes[0].user, bea.id);
        assert!(post.engagement().unlikes().is_empty());
        assert_eq!(post.engagement_state_for(bea.id), EngagementState::Liked);
    }

    #[test]
    fn non_author_cannot_edit_comment() {
        let anna = user(1, "anna");
        let bea = user(2, "bea");
        let carl = user(3, "carl");
        let mut post = post_by(anna.id);

        let id = post.add_comment_at(&bea, CommentText::new("hello".to_owned()).unwrap(), TIME);

        let result = post.edit_comment(id, carl.id, CommentText::new("hi".to_owned()).unwrap());
        assert_eq!(result, Err(CommentError::NotOwner(NotOwnerError)));
        assert_eq!(post.comment(id).unwrap().text.get(), "hello");
    }

    #[test]
    fn post_author_cannot_delete_others_comments() {
        let anna = user(1, "anna");
        let bea = user(2, "bea");
        let mut post = post_by(anna.id);

        let id = post.add_comment_at(&bea, CommentText::new("hello".to_owned()).unwrap(), TIME);

        // Owning the post grants no rights over the comment.
        assert_eq!(
            post.delete_comment(id, anna.id),
            Err(CommentError::NotOwner(NotOwnerError))
        );
        assert_eq!(post.delete_comment(id, bea.id), Ok(()));
    }

    #[test]
    fn only_author_may_edit_body() {
        let anna = user(1, "anna");
        let bea = user(2, "bea");
        let mut post = post_by(anna.id);

        post.like_at(bea.id, TIME);

        let result = post.edit_body(bea.id, PostBody::new("hijacked".to_owned()).unwrap());
        assert_eq!(result, Err(NotOwnerError));
        assert_eq!(post.body.get(), "a post");

        post.edit_body(anna.id, PostBody::new("a post, revised".to_owned()).unwrap())
            .unwrap();
        assert_eq!(post.body.get(), "a post, revised");
        // Engagement survives a body edit.
        assert_eq!(post.engagement().likes().len(), 1);
    }

    #[test]
    fn only_author_may_delete_post() {
        let anna = user(1, "anna");
        let bea = user(2, "bea");
        let post = post_by(anna.id);

        assert_eq!(post.authorize_delete(bea.id), Err(NotOwnerError));
        assert_eq!(post.authorize_delete(anna.id), Ok(()));
    }

    #[test]
    fn body_validation() {
        assert!(PostBody::new(String::new()).is_err());
        assert!(PostBody::new("hi".to_owned()).is_ok());
    }
}
