//! The comment sub-collection of a post.

use crate::model::{
    Id,
    guard::{Authored, NotOwnerError, ensure_owner},
    user::{User, UserHandle, UserMarker},
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::Display;
use thiserror::Error;
use time::UtcDateTime;

pub const COMMENT_TEXT_MAX_LEN: usize = 5_000;

/// Identifier of a comment, unique within its post only. Allocated from a
/// per-post counter that never decreases, so deleted identifiers are never
/// handed out again.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CommentId(u64);

impl CommentId {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for CommentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Non-empty comment text. Constructing this type is the validation; the
/// store never re-checks.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct CommentText(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The comment text is invalid: {0:?}")]
pub struct InvalidCommentTextError(String);

impl CommentText {
    pub fn new(text: String) -> Result<Self, InvalidCommentTextError> {
        let char_count = text.chars().count();
        if char_count > 0 && char_count <= COMMENT_TEXT_MAX_LEN {
            Ok(CommentText(text))
        } else {
            Err(InvalidCommentTextError(text))
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

impl<'de> Deserialize<'de> for CommentText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        CommentText::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"CommentText"))
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub author: Id<UserMarker>,
    /// Display data copied from the author at creation time. Deliberately
    /// never refreshed when the author later changes handle or avatar.
    pub author_handle: UserHandle,
    pub author_avatar: Option<String>,
    pub text: CommentText,
    pub created_at: UtcDateTime,
}

impl Authored for Comment {
    fn author_id(&self) -> Id<UserMarker> {
        self.author
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum CommentError {
    #[error("Comment with id {0} does not exist on this post")]
    NotFound(CommentId),
    #[error(transparent)]
    NotOwner(#[from] NotOwnerError),
}

/// Comments of one post, most recent first.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct CommentStore {
    next_id: CommentId,
    comments: Vec<Comment>,
}

impl CommentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from persisted state. `next_id` must be larger than
    /// every id in `comments` for the no-reuse guarantee to carry over.
    #[must_use]
    pub fn from_parts(next_id: CommentId, comments: Vec<Comment>) -> Self {
        Self { next_id, comments }
    }

    #[must_use]
    pub fn next_id(&self) -> CommentId {
        self.next_id
    }

    #[must_use]
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    #[must_use]
    pub fn get(&self, id: CommentId) -> Option<&Comment> {
        self.comments.iter().find(|comment| comment.id == id)
    }

    /// Inserts a new comment at the front, snapshotting the author's display
    /// data. Returns the new comment's id.
    pub fn add_at(&mut self, author: &User, text: CommentText, time: UtcDateTime) -> CommentId {
        let id = self.next_id;
        self.next_id = self.next_id.next();

        self.comments.insert(
            0,
            Comment {
                id,
                author: author.id,
                author_handle: author.handle.clone(),
                author_avatar: author.avatar.clone(),
                text,
                created_at: time,
            },
        );

        id
    }

    pub fn add(&mut self, author: &User, text: CommentText) -> CommentId {
        self.add_at(author, text, UtcDateTime::now())
    }

    /// Replaces the text of an existing comment in place. Only the comment's
    /// author may edit; the position in the sequence does not change.
    pub fn edit(
        &mut self,
        id: CommentId,
        requester: Id<UserMarker>,
        text: CommentText,
    ) -> Result<(), CommentError> {
        let comment = self
            .comments
            .iter_mut()
            .find(|comment| comment.id == id)
            .ok_or(CommentError::NotFound(id))?;

        ensure_owner(&*comment, requester)?;

        comment.text = text;
        Ok(())
    }

    /// Removes a comment, preserving the order of the remaining ones. Only
    /// the comment's author may delete, the post's author gets no special
    /// rights here.
    pub fn delete(&mut self, id: CommentId, requester: Id<UserMarker>) -> Result<(), CommentError> {
        let position = self
            .comments
            .iter()
            .position(|comment| comment.id == id)
            .ok_or(CommentError::NotFound(id))?;

        ensure_owner(&self.comments[position], requester)?;

        self.comments.remove(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        comment::{CommentError, CommentId, CommentStore, CommentText},
        guard::NotOwnerError,
        user::{User, UserHandle},
    };
    use time::macros::utc_datetime;

    const TIME: time::UtcDateTime = utc_datetime!(2025-11-03 12:00);

    fn user(id: u64, handle: &str) -> User {
        User {
            id: Id::from(id),
            handle: UserHandle::new(handle.to_owned()).unwrap(),
            avatar: None,
        }
    }

    fn text(s: &str) -> CommentText {
        CommentText::new(s.to_owned()).unwrap()
    }

    #[test]
    fn add_inserts_at_front_with_snapshot() {
        let mut store = CommentStore::new();
        let bea = user(2, "bea");

        store.add_at(&bea, text("first"), TIME);
        store.add_at(&bea, text("second"), TIME);

        let comments = store.comments();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].text.get(), "second");
        assert_eq!(comments[1].text.get(), "first");
        assert_eq!(comments[1].author, bea.id);
        assert_eq!(comments[1].author_handle, bea.handle);
    }

    #[test]
    fn edit_by_author_replaces_text_in_place() {
        let mut store = CommentStore::new();
        let bea = user(2, "bea");

        let first = store.add_at(&bea, text("hello"), TIME);
        store.add_at(&bea, text("newer"), TIME);

        store.edit(first, bea.id, text("hello, edited")).unwrap();

        assert_eq!(store.get(first).unwrap().text.get(), "hello, edited");
        // Position unchanged: the edited comment is still the older one.
        assert_eq!(store.comments()[1].id, first);
    }

    #[test]
    fn edit_by_non_author_is_forbidden() {
        let mut store = CommentStore::new();
        let bea = user(2, "bea");
        let carl = user(3, "carl");

        let id = store.add_at(&bea, text("hello"), TIME);

        let result = store.edit(id, carl.id, text("hi"));
        assert_eq!(result, Err(CommentError::NotOwner(NotOwnerError)));
        assert_eq!(store.get(id).unwrap().text.get(), "hello");
    }

    #[test]
    fn delete_by_non_author_is_forbidden() {
        let mut store = CommentStore::new();
        let bea = user(2, "bea");
        let carl = user(3, "carl");

        let id = store.add_at(&bea, text("hello"), TIME);

        let result = store.delete(id, carl.id);
        assert_eq!(result, Err(CommentError::NotOwner(NotOwnerError)));
        assert_eq!(store.comments().len(), 1);
    }

    #[test]
    fn missing_comment_is_not_found() {
        let mut store = CommentStore::new();
        let bea = user(2, "bea");

        let missing = CommentId::new(42);
        assert_eq!(
            store.edit(missing, bea.id, text("hi")),
            Err(CommentError::NotFound(missing))
        );
        assert_eq!(
            store.delete(missing, bea.id),
            Err(CommentError::NotFound(missing))
        );
    }

    #[test]
    fn delete_preserves_remaining_order() {
        let mut store = CommentStore::new();
        let bea = user(2, "bea");

        let a = store.add_at(&bea, text("a"), TIME);
        let b = store.add_at(&bea, text("b"), TIME);
        let c = store.add_at(&bea, text("c"), TIME);

        store.delete(b, bea.id).unwrap();

        let order: Vec<_> = store.comments().iter().map(|comment| comment.id).collect();
        assert_eq!(order, vec![c, a]);
    }

    #[test]
    fn ids_are_never_reused() {
        let mut store = CommentStore::new();
        let bea = user(2, "bea");

        let mut seen = Vec::new();
        for round in 0..5 {
            let id = store.add_at(&bea, text("x"), TIME);
            assert!(!seen.contains(&id), "id reused in round {round}");
            seen.push(id);
            store.delete(id, bea.id).unwrap();
        }
    }

    #[test]
    fn text_validation() {
        assert!(CommentText::new(String::new()).is_err());
        assert!(CommentText::new("ok".to_owned()).is_ok());
        assert!(CommentText::new("x".repeat(5_001)).is_err());
    }
}
