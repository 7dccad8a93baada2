use reviewdesk_core::domain::feedback::{
    FeedbackItem, ItemKind, ItemQuery, NewQuestion, NewReview, Rating, ReplyTarget,
    ResponseFilter, SortOrder,
};
use reviewdesk_core::domain::user::UserId;
use reviewdesk_db::migrations::run_pending;
use reviewdesk_db::{
    connect_with_settings, FeedbackRepository, InMemoryFeedbackRepository, SqlFeedbackRepository,
};

async fn sql_repository() -> SqlFeedbackRepository {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    run_pending(&pool).await.expect("migrations");
    SqlFeedbackRepository::new(pool)
}

/// Behaviour both stores must agree on.
async fn exercise(repo: &dyn FeedbackRepository) {
    let author = UserId(42);
    let mut ids = Vec::new();
    for stars in [5, 4, 3] {
        let review = repo
            .create_review(NewReview {
                user_id: author,
                username: Some("ivy".to_owned()),
                rating: Rating::new(stars).expect("rating"),
                text: Some(format!("{stars} stars")),
            })
            .await
            .expect("create review");
        ids.push(review.id);
    }
    repo.create_question(NewQuestion {
        user_id: UserId(7),
        username: None,
        text: "hours?".to_owned(),
    })
    .await
    .expect("create question");

    let own_newest = ItemQuery {
        author: Some(author),
        kind: ItemKind::Review,
        filter: ResponseFilter::All,
        sort: SortOrder::Newest,
    };
    let listed: Vec<_> =
        repo.list_items(own_newest).await.expect("list").iter().map(FeedbackItem::id).collect();
    assert_eq!(listed, ids.iter().rev().copied().collect::<Vec<_>>());

    let target = ReplyTarget { kind: ItemKind::Review, id: ids[1] };
    assert!(!repo.has_answered(author, ItemKind::Review).await.expect("has answered"));
    assert!(repo.record_response(target, "thank you").await.expect("reply"));
    assert!(!repo.record_response(target, "again").await.expect("second reply"));
    assert!(repo.has_answered(author, ItemKind::Review).await.expect("has answered"));

    let answered = ItemQuery { filter: ResponseFilter::Answered, ..own_newest };
    let listed = repo.list_items(answered).await.expect("answered");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].admin_response(), Some("thank you"));

    let all_questions = ItemQuery {
        author: None,
        kind: ItemKind::Question,
        filter: ResponseFilter::Unanswered,
        sort: SortOrder::Oldest,
    };
    assert_eq!(repo.list_items(all_questions).await.expect("questions").len(), 1);

    let user = repo.find_user(author).await.expect("find").expect("registered by review");
    assert_eq!(user.username.as_deref(), Some("ivy"));
}

#[tokio::test]
async fn sql_repository_honours_contract() {
    let repo = sql_repository().await;
    exercise(&repo).await;
}

#[tokio::test]
async fn in_memory_repository_honours_contract() {
    let repo = InMemoryFeedbackRepository::new();
    exercise(&repo).await;
}
