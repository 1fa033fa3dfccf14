use crate::record::{
    AuthenticationRecord, CommentRecord, EngagementRecord, PostRecord, UnknownEngagementKindError,
    UserRecord, engagement_kind_to_str, to_primitive,
};
use pinnwand_common::model::{
    Id, ModelValidationError, PinnwandSnowflake, PinnwandSnowflakeGenerator,
    auth::{AuthTokenHash, Authentication},
    comment::{Comment, CommentId, CommentStore},
    engagement::{EngagementEntry, EngagementLedger},
    post::{CreatePost, Post, PostBody, PostMarker},
    user::{CreateUser, User, UserMarker},
};
use pinnwand_common::snowflake::{ProcessId, WorkerId};
use sqlx::{PgConnection, PgPool, query, query_as};
use std::{convert::Infallible, sync::Mutex};
use thiserror::Error;
use time::UtcDateTime;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    EngagementKind(#[from] UnknownEngagementKindError),
    #[error("The user handle is already taken")]
    HandleTaken,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug)]
pub struct DbClient {
    pool: PgPool,
    snowflake_generator: Mutex<PinnwandSnowflakeGenerator>,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId, process_id: ProcessId) -> Self {
        let snowflake_generator =
            Mutex::new(PinnwandSnowflakeGenerator::new(worker_id, process_id));

        Self {
            pool,
            snowflake_generator,
        }
    }

    fn generate_snowflake(&self) -> PinnwandSnowflake {
        self.snowflake_generator
            .lock()
            .expect("Snowflake generator lock was poisoned.")
            .generate()
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT user_snowflake, handle, avatar
            FROM users
            WHERE user_snowflake = $1
            ",
        )
        .bind(user_id.snowflake().get().cast_signed())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let user_snowflake = self.generate_snowflake();

        let result = query(
            "
            INSERT INTO users (user_snowflake, handle, avatar)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(user_snowflake.get().cast_signed())
        .bind(user.handle.get())
        .bind(user.avatar.as_deref())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(User {
                id: user_snowflake.into(),
                handle: user.handle.clone(),
                avatar: user.avatar.clone(),
            }),
            Err(sqlx::Error::Database(db_error)) if db_error.is_unique_violation() => {
                Err(DbError::HandleTaken)
            }
            Err(other) => Err(other.into()),
        }
    }

    pub async fn store_auth(&self, authentication: &Authentication) -> Result<()> {
        query(
            "
            INSERT INTO auth_tokens
                (token_hash, user_snowflake, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&authentication.token_hash.0[..])
        .bind(authentication.user.snowflake().get().cast_signed())
        .bind(to_primitive(authentication.created_at))
        .bind(
            authentication
                .expires_after
                .map(|duration| duration.get().whole_seconds()),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT user_snowflake, token_hash, created_at, expires_after_seconds
            FROM auth_tokens
            WHERE token_hash = $1
            ",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    pub async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let post_snowflake = self.generate_snowflake();
        let created_at = UtcDateTime::now();

        query(
            "
            INSERT INTO posts
                (post_snowflake, author_snowflake, body, created_at, next_comment_id)
            VALUES ($1, $2, $3, $4, 0)
            ",
        )
        .bind(post_snowflake.get().cast_signed())
        .bind(post.author.snowflake().get().cast_signed())
        .bind(post.body.get())
        .bind(to_primitive(created_at))
        .execute(&self.pool)
        .await?;

        Ok(Post::new(
            post_snowflake.into(),
            post.author,
            post.body.clone(),
            created_at,
        ))
    }

    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let mut conn = self.pool.acquire().await?;

        let record = query_as::<_, PostRecord>(
            "
            SELECT post_snowflake, author_snowflake, body, created_at, next_comment_id
            FROM posts
            WHERE post_snowflake = $1
            ",
        )
        .bind(post_id.snowflake().get().cast_signed())
        .fetch_optional(&mut *conn)
        .await?;

        match record {
            Some(record) => Ok(Some(assemble_post(&mut conn, record).await?)),
            None => Ok(None),
        }
    }

    /// All posts, most recent first.
    pub async fn fetch_posts(&self) -> Result<Vec<Post>> {
        let mut conn = self.pool.acquire().await?;

        let records = query_as::<_, PostRecord>(
            "
            SELECT post_snowflake, author_snowflake, body, created_at, next_comment_id
            FROM posts
            ORDER BY post_snowflake DESC
            ",
        )
        .fetch_all(&mut *conn)
        .await?;

        let mut posts = Vec::with_capacity(records.len());
        for record in records {
            posts.push(assemble_post(&mut conn, record).await?);
        }
        Ok(posts)
    }

    /// Posts by one user, most recent first. `None` when the user does not
    /// exist.
    pub async fn fetch_user_posts(&self, user_id: Id<UserMarker>) -> Result<Option<Vec<Post>>> {
        if self.fetch_user(user_id).await?.is_none() {
            return Ok(None);
        }

        let mut conn = self.pool.acquire().await?;

        let records = query_as::<_, PostRecord>(
            "
            SELECT post_snowflake, author_snowflake, body, created_at, next_comment_id
            FROM posts
            WHERE author_snowflake = $1
            ORDER BY post_snowflake DESC
            ",
        )
        .bind(user_id.snowflake().get().cast_signed())
        .fetch_all(&mut *conn)
        .await?;

        let mut posts = Vec::with_capacity(records.len());
        for record in records {
            posts.push(assemble_post(&mut conn, record).await?);
        }
        Ok(Some(posts))
    }

    /// Load-modify-store cycle for one post inside a single transaction. The
    /// post row is taken `FOR UPDATE`, so concurrent cycles on the same post
    /// serialize instead of losing updates. Returns `None` when the post does
    /// not exist; when the operation itself fails, the transaction is rolled
    /// back and the error is handed through untouched.
    pub async fn try_update_post<T, E>(
        &self,
        post_id: Id<PostMarker>,
        operation: impl FnOnce(&mut Post) -> Result<T, E>,
    ) -> Result<Option<Result<T, E>>> {
        let mut tx = self.pool.begin().await?;

        let record = query_as::<_, PostRecord>(
            "
            SELECT post_snowflake, author_snowflake, body, created_at, next_comment_id
            FROM posts
            WHERE post_snowflake = $1
            FOR UPDATE
            ",
        )
        .bind(post_id.snowflake().get().cast_signed())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(record) = record else {
            return Ok(None);
        };

        let mut post = assemble_post(&mut tx, record).await?;
        let output = operation(&mut post);

        if output.is_ok() {
            save_post(&mut tx, &post).await?;
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }

        Ok(Some(output))
    }

    /// [`Self::try_update_post`] for operations that cannot fail.
    pub async fn update_post<T>(
        &self,
        post_id: Id<PostMarker>,
        operation: impl FnOnce(&mut Post) -> T,
    ) -> Result<Option<T>> {
        let updated = self
            .try_update_post(post_id, |post| Ok::<_, Infallible>(operation(post)))
            .await?;

        Ok(updated.map(|output| match output {
            Ok(value) => value,
            Err(never) => match never {},
        }))
    }

    pub async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<()> {
        query("DELETE FROM posts WHERE post_snowflake = $1")
            .bind(post_id.snowflake().get().cast_signed())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

async fn assemble_post(conn: &mut PgConnection, record: PostRecord) -> Result<Post> {
    let post_id = record.post_snowflake;

    let comment_records = query_as::<_, CommentRecord>(
        "
        SELECT comment_id, author_snowflake, author_handle, author_avatar, content, created_at
        FROM comments
        WHERE post_snowflake = $1
        ORDER BY ordinal
        ",
    )
    .bind(post_id)
    .fetch_all(&mut *conn)
    .await?;

    let engagement_records = query_as::<_, EngagementRecord>(
        "
        SELECT user_snowflake, kind, created_at
        FROM engagements
        WHERE post_snowflake = $1
        ORDER BY ordinal
        ",
    )
    .bind(post_id)
    .fetch_all(&mut *conn)
    .await?;

    let comments = comment_records
        .into_iter()
        .map(Comment::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    let entries = engagement_records
        .into_iter()
        .map(EngagementEntry::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Post::from_parts(
        record.post_snowflake.cast_unsigned().into(),
        record.author_snowflake.cast_unsigned().into(),
        PostBody::new(record.body).map_err(ModelValidationError::from)?,
        record.created_at.as_utc(),
        EngagementLedger::from_entries(entries),
        CommentStore::from_parts(CommentId::new(record.next_comment_id.cast_unsigned()), comments),
    ))
}

async fn save_post(conn: &mut PgConnection, post: &Post) -> Result<()> {
    let post_id = post.id.snowflake().get().cast_signed();

    query("UPDATE posts SET body = $2, next_comment_id = $3 WHERE post_snowflake = $1")
        .bind(post_id)
        .bind(post.body.get())
        .bind(post.comments().next_id().get().cast_signed())
        .execute(&mut *conn)
        .await?;

    query("DELETE FROM comments WHERE post_snowflake = $1")
        .bind(post_id)
        .execute(&mut *conn)
        .await?;

    for (ordinal, comment) in (0_i64..).zip(post.comments().comments()) {
        query(
            "
            INSERT INTO comments
                (post_snowflake, comment_id, author_snowflake, author_handle,
                author_avatar, content, created_at, ordinal)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(post_id)
        .bind(comment.id.get().cast_signed())
        .bind(comment.author.snowflake().get().cast_signed())
        .bind(comment.author_handle.get())
        .bind(comment.author_avatar.as_deref())
        .bind(comment.text.get())
        .bind(to_primitive(comment.created_at))
        .bind(ordinal)
        .execute(&mut *conn)
        .await?;
    }

    query("DELETE FROM engagements WHERE post_snowflake = $1")
        .bind(post_id)
        .execute(&mut *conn)
        .await?;

    for (ordinal, entry) in (0_i64..).zip(post.engagement().entries()) {
        query(
            "
            INSERT INTO engagements
                (post_snowflake, user_snowflake, kind, created_at, ordinal)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(post_id)
        .bind(entry.user.snowflake().get().cast_signed())
        .bind(engagement_kind_to_str(entry.kind))
        .bind(to_primitive(entry.created_at))
        .bind(ordinal)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
