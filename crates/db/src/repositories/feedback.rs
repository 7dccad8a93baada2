use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use reviewdesk_core::domain::feedback::{
    FeedbackItem, ItemId, ItemKind, ItemQuery, NewQuestion, NewReview, Question, Rating,
    ReplyTarget, ResponseFilter, Review, SortOrder,
};
use reviewdesk_core::domain::user::{AdminLevel, FeedbackUser, UserId};

use super::{FeedbackRepository, RepositoryError};
use crate::DbPool;

const REVIEW_COLUMNS: &str =
    "id, user_id, username, rating, review_text, admin_response, created_at";
const QUESTION_COLUMNS: &str = "id, user_id, username, question_text, admin_response, created_at";
const USER_COLUMNS: &str = "id, username, admin_level, is_banned, ban_reason";

pub struct SqlFeedbackRepository {
    pool: DbPool,
}

impl SqlFeedbackRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn ensure_user(
        &self,
        conn: &mut sqlx::SqliteConnection,
        id: UserId,
        username: Option<&str>,
        now: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO feedback_user (id, username, created_at, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(id.0)
        .bind(username)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl FeedbackRepository for SqlFeedbackRepository {
    async fn find_user(&self, id: UserId) -> Result<Option<FeedbackUser>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM feedback_user WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(user_from_row).transpose()
    }

    async fn register_user(
        &self,
        id: UserId,
        username: Option<&str>,
    ) -> Result<FeedbackUser, RepositoryError> {
        let now = timestamp(Utc::now());
        sqlx::query(
            "INSERT INTO feedback_user (id, username, created_at, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                username = excluded.username,
                updated_at = excluded.updated_at",
        )
        .bind(id.0)
        .bind(username)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.find_user(id)
            .await?
            .ok_or_else(|| RepositoryError::Decode(format!("user {id} missing after upsert")))
    }

    async fn set_admin_level(&self, id: UserId, level: AdminLevel) -> Result<(), RepositoryError> {
        let now = timestamp(Utc::now());
        sqlx::query(
            "INSERT INTO feedback_user (id, admin_level, created_at, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                admin_level = excluded.admin_level,
                updated_at = excluded.updated_at",
        )
        .bind(id.0)
        .bind(i64::from(level.value()))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ban_user(&self, id: UserId, reason: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE feedback_user SET is_banned = 1, ban_reason = ?, updated_at = ? WHERE id = ?",
        )
        .bind(reason)
        .bind(timestamp(Utc::now()))
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn unban_user(&self, id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE feedback_user SET is_banned = 0, ban_reason = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(timestamp(Utc::now()))
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_admins(&self) -> Result<Vec<UserId>, RepositoryError> {
        let rows = sqlx::query("SELECT id FROM feedback_user WHERE admin_level > 0 ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| -> Result<UserId, RepositoryError> { Ok(UserId(row.try_get("id")?)) })
            .collect()
    }

    async fn create_review(&self, review: NewReview) -> Result<Review, RepositoryError> {
        let created_at = Utc::now();
        let now = timestamp(created_at);
        let mut tx = self.pool.begin().await?;
        self.ensure_user(&mut tx, review.user_id, review.username.as_deref(), &now).await?;

        let id = sqlx::query(
            "INSERT INTO review (user_id, username, rating, review_text, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(review.user_id.0)
        .bind(review.username.as_deref())
        .bind(i64::from(review.rating.stars()))
        .bind(review.text.as_deref())
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        tx.commit().await?;

        Ok(Review {
            id: ItemId(id),
            user_id: review.user_id,
            username: review.username,
            rating: review.rating,
            text: review.text,
            admin_response: None,
            created_at: parse_timestamp("created_at", now)?,
        })
    }

    async fn create_question(&self, question: NewQuestion) -> Result<Question, RepositoryError> {
        let created_at = Utc::now();
        let now = timestamp(created_at);
        let mut tx = self.pool.begin().await?;
        self.ensure_user(&mut tx, question.user_id, question.username.as_deref(), &now).await?;

        let id = sqlx::query(
            "INSERT INTO question (user_id, username, question_text, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(question.user_id.0)
        .bind(question.username.as_deref())
        .bind(&question.text)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        tx.commit().await?;

        Ok(Question {
            id: ItemId(id),
            user_id: question.user_id,
            username: question.username,
            text: question.text,
            admin_response: None,
            created_at: parse_timestamp("created_at", now)?,
        })
    }

    async fn count_reviews_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<u32, RepositoryError> {
        let count: i64 = sqlx::query(
            "SELECT COUNT(*) AS count FROM review WHERE user_id = ? AND created_at >= ?",
        )
        .bind(user.0)
        .bind(timestamp(since))
        .fetch_one(&self.pool)
        .await?
        .try_get("count")?;

        u32::try_from(count)
            .map_err(|_| RepositoryError::Decode(format!("invalid review count {count}")))
    }

    async fn list_items(&self, query: ItemQuery) -> Result<Vec<FeedbackItem>, RepositoryError> {
        let filter = match query.filter {
            ResponseFilter::All => "1 = 1",
            ResponseFilter::Answered => "admin_response IS NOT NULL",
            ResponseFilter::Unanswered => "admin_response IS NULL",
        };
        let order = match query.sort {
            SortOrder::Newest => "created_at DESC, id DESC",
            SortOrder::Oldest => "created_at ASC, id ASC",
        };
        let (columns, table) = source(query.kind);
        let sql = format!(
            "SELECT {columns} FROM {table}
             WHERE (? IS NULL OR user_id = ?) AND {filter}
             ORDER BY {order}"
        );
        let author = query.author.map(|user| user.0);

        let rows =
            sqlx::query(&sql).bind(author).bind(author).fetch_all(&self.pool).await?;

        rows.into_iter().map(|row| item_from_row(query.kind, row)).collect()
    }

    async fn has_answered(&self, user: UserId, kind: ItemKind) -> Result<bool, RepositoryError> {
        let (_, table) = source(kind);
        let found: i64 = sqlx::query(&format!(
            "SELECT EXISTS(
                SELECT 1 FROM {table} WHERE user_id = ? AND admin_response IS NOT NULL
             ) AS found"
        ))
        .bind(user.0)
        .fetch_one(&self.pool)
        .await?
        .try_get("found")?;

        Ok(found != 0)
    }

    async fn find_item(
        &self,
        target: ReplyTarget,
    ) -> Result<Option<FeedbackItem>, RepositoryError> {
        let (columns, table) = source(target.kind);
        let row = sqlx::query(&format!("SELECT {columns} FROM {table} WHERE id = ?"))
            .bind(target.id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| item_from_row(target.kind, row)).transpose()
    }

    async fn record_response(
        &self,
        target: ReplyTarget,
        response: &str,
    ) -> Result<bool, RepositoryError> {
        let (_, table) = source(target.kind);
        let result = sqlx::query(&format!(
            "UPDATE {table} SET admin_response = ?, responded_at = ?
             WHERE id = ? AND admin_response IS NULL"
        ))
        .bind(response)
        .bind(timestamp(Utc::now()))
        .bind(target.id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

fn source(kind: ItemKind) -> (&'static str, &'static str) {
    match kind {
        ItemKind::Review => (REVIEW_COLUMNS, "review"),
        ItemKind::Question => (QUESTION_COLUMNS, "question"),
    }
}

fn item_from_row(kind: ItemKind, row: SqliteRow) -> Result<FeedbackItem, RepositoryError> {
    match kind {
        ItemKind::Review => review_from_row(row).map(FeedbackItem::Review),
        ItemKind::Question => question_from_row(row).map(FeedbackItem::Question),
    }
}

fn user_from_row(row: SqliteRow) -> Result<FeedbackUser, RepositoryError> {
    let level_raw = row.try_get::<i64, _>("admin_level")?;
    let admin_level = u8::try_from(level_raw)
        .ok()
        .and_then(|level| AdminLevel::new(level).ok())
        .ok_or_else(|| RepositoryError::Decode(format!("invalid admin_level {level_raw}")))?;

    Ok(FeedbackUser {
        id: UserId(row.try_get("id")?),
        username: row.try_get("username")?,
        admin_level,
        is_banned: row.try_get::<i64, _>("is_banned")? != 0,
        ban_reason: row.try_get("ban_reason")?,
    })
}

fn review_from_row(row: SqliteRow) -> Result<Review, RepositoryError> {
    let rating_raw = row.try_get::<i64, _>("rating")?;
    let rating = u8::try_from(rating_raw)
        .ok()
        .and_then(|stars| Rating::new(stars).ok())
        .ok_or_else(|| RepositoryError::Decode(format!("invalid rating {rating_raw}")))?;

    Ok(Review {
        id: ItemId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        username: row.try_get("username")?,
        rating,
        text: row.try_get("review_text")?,
        admin_response: row.try_get("admin_response")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn question_from_row(row: SqliteRow) -> Result<Question, RepositoryError> {
    Ok(Question {
        id: ItemId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        username: row.try_get("username")?,
        text: row.try_get("question_text")?,
        admin_response: row.try_get("admin_response")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

/// Fixed-width UTC form so text comparison orders like time.
fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use reviewdesk_core::domain::feedback::{
        FeedbackItem, ItemId, ItemKind, ItemQuery, NewQuestion, NewReview, Rating, ReplyTarget,
        ResponseFilter, SortOrder,
    };
    use reviewdesk_core::domain::user::{AdminLevel, UserId};

    use super::SqlFeedbackRepository;
    use crate::migrations::run_pending;
    use crate::repositories::FeedbackRepository;
    use crate::connect_with_settings;

    async fn repository() -> SqlFeedbackRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrations");
        SqlFeedbackRepository::new(pool)
    }

    fn review(user: i64, stars: u8, text: Option<&str>) -> NewReview {
        NewReview {
            user_id: UserId(user),
            username: Some(format!("user{user}")),
            rating: Rating::new(stars).expect("valid rating"),
            text: text.map(str::to_owned),
        }
    }

    fn query(author: Option<i64>, kind: ItemKind, filter: ResponseFilter, sort: SortOrder) -> ItemQuery {
        ItemQuery { author: author.map(UserId), kind, filter, sort }
    }

    #[tokio::test]
    async fn register_user_creates_then_refreshes_username() {
        let repo = repository().await;

        let created = repo.register_user(UserId(10), Some("old")).await.expect("register");
        assert_eq!(created.admin_level, AdminLevel::USER);
        assert!(!created.is_banned);

        let updated = repo.register_user(UserId(10), Some("new")).await.expect("re-register");
        assert_eq!(updated.username.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn create_review_registers_unknown_author() {
        let repo = repository().await;

        let stored = repo.create_review(review(5, 4, Some("nice"))).await.expect("create");

        assert_eq!(stored.rating.stars(), 4);
        let user = repo.find_user(UserId(5)).await.expect("find").expect("author exists");
        assert_eq!(user.username.as_deref(), Some("user5"));
    }

    #[tokio::test]
    async fn list_items_orders_and_filters() {
        let repo = repository().await;
        let first = repo.create_review(review(1, 5, Some("first"))).await.expect("first");
        repo.create_review(review(1, 3, None)).await.expect("second");
        let third = repo.create_review(review(1, 1, Some("third"))).await.expect("third");
        repo.create_review(review(2, 2, Some("other user"))).await.expect("other");

        let newest = repo
            .list_items(query(Some(1), ItemKind::Review, ResponseFilter::All, SortOrder::Newest))
            .await
            .expect("newest");
        assert_eq!(newest.len(), 3);
        assert_eq!(newest.first().map(FeedbackItem::id), Some(third.id));

        let oldest = repo
            .list_items(query(Some(1), ItemKind::Review, ResponseFilter::All, SortOrder::Oldest))
            .await
            .expect("oldest");
        assert_eq!(oldest.first().map(FeedbackItem::id), Some(first.id));

        let everyone = repo
            .list_items(query(None, ItemKind::Review, ResponseFilter::All, SortOrder::Newest))
            .await
            .expect("everyone");
        assert_eq!(everyone.len(), 4);

        let target = ReplyTarget { kind: ItemKind::Review, id: first.id };
        assert!(repo.record_response(target, "thanks").await.expect("respond"));

        let answered = repo
            .list_items(query(Some(1), ItemKind::Review, ResponseFilter::Answered, SortOrder::Newest))
            .await
            .expect("answered");
        assert_eq!(answered.len(), 1);
        assert_eq!(answered[0].admin_response(), Some("thanks"));

        let unanswered = repo
            .list_items(query(None, ItemKind::Review, ResponseFilter::Unanswered, SortOrder::Newest))
            .await
            .expect("unanswered");
        assert_eq!(unanswered.len(), 3);
    }

    #[tokio::test]
    async fn record_response_only_succeeds_once() {
        let repo = repository().await;
        let question = repo
            .create_question(NewQuestion {
                user_id: UserId(3),
                username: None,
                text: "open late?".to_owned(),
            })
            .await
            .expect("create question");
        let target = ReplyTarget { kind: ItemKind::Question, id: question.id };

        assert!(repo.record_response(target, "until nine").await.expect("first reply"));
        assert!(!repo.record_response(target, "until ten").await.expect("second reply"));
        assert!(repo.has_answered(UserId(3), ItemKind::Question).await.expect("answered"));
        assert!(!repo.has_answered(UserId(3), ItemKind::Review).await.expect("no reviews"));

        let stored = repo.find_item(target).await.expect("find").expect("exists");
        assert_eq!(stored.admin_response(), Some("until nine"));
    }

    #[tokio::test]
    async fn missing_items_are_reported_as_absent() {
        let repo = repository().await;
        let target = ReplyTarget { kind: ItemKind::Review, id: ItemId(404) };

        assert_eq!(repo.find_item(target).await.expect("find"), None);
        assert!(!repo.record_response(target, "hello").await.expect("respond"));
    }

    #[tokio::test]
    async fn count_reviews_since_respects_the_window() {
        let repo = repository().await;
        repo.create_review(review(7, 5, None)).await.expect("create");

        let past = Utc::now() - Duration::hours(1);
        let future = Utc::now() + Duration::hours(1);
        assert_eq!(repo.count_reviews_since(UserId(7), past).await.expect("count"), 1);
        assert_eq!(repo.count_reviews_since(UserId(7), future).await.expect("count"), 0);
        assert_eq!(repo.count_reviews_since(UserId(8), past).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn ban_and_admin_levels_round_trip() {
        let repo = repository().await;
        assert!(!repo.ban_user(UserId(9), "spam").await.expect("ban unknown"));

        repo.register_user(UserId(9), None).await.expect("register");
        assert!(repo.ban_user(UserId(9), "spam").await.expect("ban"));
        let banned = repo.find_user(UserId(9)).await.expect("find").expect("exists");
        assert!(banned.is_banned);
        assert_eq!(banned.ban_reason.as_deref(), Some("spam"));

        assert!(repo.unban_user(UserId(9)).await.expect("unban"));
        let cleared = repo.find_user(UserId(9)).await.expect("find").expect("exists");
        assert!(!cleared.is_banned);
        assert_eq!(cleared.ban_reason, None);

        repo.set_admin_level(UserId(9), AdminLevel::RESPONDER).await.expect("promote");
        repo.set_admin_level(UserId(1), AdminLevel::SUPER_ADMIN).await.expect("create admin");
        assert_eq!(repo.list_admins().await.expect("admins"), vec![UserId(1), UserId(9)]);
    }
}
