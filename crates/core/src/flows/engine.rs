use thiserror::Error;

use crate::domain::user::AdminLevel;
use crate::flows::states::{
    BrowseScope, NavAction, NavContext, NavEvent, ReplyTargetState, Stage, TransitionOutcome,
};

pub trait FlowDefinition {
    fn initial_stage(&self) -> Stage;
    fn transition(
        &self,
        current: Stage,
        event: &NavEvent,
        context: &NavContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// The feedback bot's dialogue: leave a review, ask a question, browse
/// history, and the administrator's browse and reply loop.
#[derive(Clone, Debug, Default)]
pub struct FeedbackFlow;

impl FlowDefinition for FeedbackFlow {
    fn initial_stage(&self) -> Stage {
        Stage::Root
    }

    fn transition(
        &self,
        current: Stage,
        event: &NavEvent,
        context: &NavContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_feedback(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_stage(&self) -> Stage {
        self.flow.initial_stage()
    }

    pub fn apply(
        &self,
        current: Stage,
        event: &NavEvent,
        context: &NavContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }
}

impl Default for FlowEngine<FeedbackFlow> {
    fn default() -> Self {
        Self::new(FeedbackFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {stage:?} using event {event:?}")]
    InvalidTransition { stage: Stage, event: NavEvent },
    #[error("free text is not expected in {stage:?}")]
    UnexpectedText { stage: Stage },
    #[error("user is banned")]
    Banned,
    #[error("daily review limit reached")]
    DailyLimitReached,
    #[error("admin level {actual} is below the required {required}")]
    InsufficientRights { required: AdminLevel, actual: AdminLevel },
    #[error("reply target no longer exists")]
    ReplyTargetMissing,
    #[error("reply target already has an admin response")]
    ReplyTargetAnswered,
}

fn transition_feedback(
    current: Stage,
    event: &NavEvent,
    context: &NavContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use NavAction::{
        ClearCorrelation, LoadItems, NotifyAdmins, RegisterUser, StorePendingRating,
        StoreReplyTarget, SubmitQuestion, SubmitReply, SubmitReview,
    };
    use NavEvent::{
        AskQuestion, BackToFilter, BackToRoot, FilterChosen, HistoryTypeChosen, LeaveReview,
        OpenHistory, PageRequested, RatingChosen, ReplyCancelled, ReplyRequested, SkipText,
        SortChosen, Start, TextSubmitted,
    };
    use Stage::{
        AwaitingAdminReplyText, AwaitingFilterType, AwaitingHistoryType, AwaitingQuestionText,
        AwaitingRatingChoice, AwaitingReviewText, AwaitingSortType, Root, ViewingPage,
    };

    let browsing = current.is_browsing();

    let (to, actions) = match (current, event) {
        (_, Start) => (Root, vec![RegisterUser, ClearCorrelation]),
        (_, BackToRoot) => (Root, vec![ClearCorrelation]),

        (Root | AwaitingRatingChoice, LeaveReview) => {
            ensure_may_review(context)?;
            (AwaitingRatingChoice, Vec::new())
        }
        (Root | AwaitingRatingChoice | AwaitingReviewText, RatingChosen(rating)) => {
            ensure_may_review(context)?;
            (AwaitingReviewText, vec![StorePendingRating(*rating)])
        }
        (AwaitingReviewText, SkipText) => {
            ensure_may_review(context)?;
            (Root, vec![SubmitReview { with_text: false }, NotifyAdmins])
        }
        (AwaitingReviewText, TextSubmitted) => {
            ensure_may_review(context)?;
            (Root, vec![SubmitReview { with_text: true }, NotifyAdmins])
        }

        (Root, AskQuestion) => {
            ensure_not_banned(context)?;
            (AwaitingQuestionText, Vec::new())
        }
        (AwaitingQuestionText, TextSubmitted) => {
            ensure_not_banned(context)?;
            (Root, vec![SubmitQuestion, NotifyAdmins])
        }

        (Root, OpenHistory) => (AwaitingHistoryType, Vec::new()),
        (_, OpenHistory) if browsing => (AwaitingHistoryType, Vec::new()),
        (Root, HistoryTypeChosen { scope: BrowseScope::All, .. }) => {
            ensure_scope(BrowseScope::All, context)?;
            (AwaitingFilterType, Vec::new())
        }
        (_, HistoryTypeChosen { scope, .. }) if browsing => {
            ensure_scope(*scope, context)?;
            (AwaitingFilterType, Vec::new())
        }
        (_, FilterChosen { scope, .. }) if browsing => {
            ensure_scope(*scope, context)?;
            (AwaitingSortType, Vec::new())
        }
        (_, SortChosen(key)) if browsing => {
            ensure_scope(key.scope, context)?;
            (ViewingPage, vec![LoadItems])
        }
        (_, PageRequested { key, .. }) if browsing => {
            ensure_scope(key.scope, context)?;
            (ViewingPage, vec![LoadItems])
        }
        (_, BackToFilter(_)) if browsing => (AwaitingFilterType, Vec::new()),

        (ViewingPage | AwaitingAdminReplyText, ReplyRequested(target)) => {
            ensure_level(AdminLevel::RESPONDER, context)?;
            match context.reply_target {
                Some(ReplyTargetState::Open) => {}
                Some(ReplyTargetState::Answered) => {
                    return Err(FlowTransitionError::ReplyTargetAnswered)
                }
                Some(ReplyTargetState::Missing) | None => {
                    return Err(FlowTransitionError::ReplyTargetMissing)
                }
            }
            (AwaitingAdminReplyText, vec![StoreReplyTarget(*target)])
        }
        (AwaitingAdminReplyText, TextSubmitted) => (Root, vec![SubmitReply]),
        (AwaitingAdminReplyText, ReplyCancelled) => (Root, vec![ClearCorrelation]),

        (stage, TextSubmitted) => return Err(FlowTransitionError::UnexpectedText { stage }),
        _ => {
            return Err(FlowTransitionError::InvalidTransition {
                stage: current,
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: current, to, event: event.clone(), actions })
}

fn ensure_not_banned(context: &NavContext) -> Result<(), FlowTransitionError> {
    if context.banned {
        return Err(FlowTransitionError::Banned);
    }
    Ok(())
}

fn ensure_may_review(context: &NavContext) -> Result<(), FlowTransitionError> {
    ensure_not_banned(context)?;
    if context.review_quota_exhausted {
        return Err(FlowTransitionError::DailyLimitReached);
    }
    Ok(())
}

fn ensure_scope(scope: BrowseScope, context: &NavContext) -> Result<(), FlowTransitionError> {
    match scope {
        BrowseScope::Own => Ok(()),
        BrowseScope::All => ensure_level(AdminLevel::VIEWER, context),
    }
}

fn ensure_level(required: AdminLevel, context: &NavContext) -> Result<(), FlowTransitionError> {
    if context.admin_level.allows(required) {
        Ok(())
    } else {
        Err(FlowTransitionError::InsufficientRights { required, actual: context.admin_level })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::feedback::{
        FeedbackItem, ItemId, ItemKind, Question, Rating, ReplyTarget, ResponseFilter, SortOrder,
    };
    use crate::domain::user::{AdminLevel, UserId};
    use crate::flows::engine::{FeedbackFlow, FlowEngine, FlowTransitionError};
    use crate::flows::states::{
        BrowseKey, BrowseScope, NavAction, NavContext, NavEvent, ReplyTargetState, Session,
        Stage,
    };

    const ALL_STAGES: [Stage; 9] = [
        Stage::Root,
        Stage::AwaitingRatingChoice,
        Stage::AwaitingReviewText,
        Stage::AwaitingQuestionText,
        Stage::AwaitingHistoryType,
        Stage::AwaitingFilterType,
        Stage::AwaitingSortType,
        Stage::ViewingPage,
        Stage::AwaitingAdminReplyText,
    ];

    fn rating(stars: u8) -> Rating {
        Rating::new(stars).expect("valid rating")
    }

    fn own_key(sort: SortOrder) -> BrowseKey {
        BrowseKey {
            scope: BrowseScope::Own,
            kind: ItemKind::Review,
            filter: ResponseFilter::All,
            sort,
        }
    }

    fn admin(level: AdminLevel) -> NavContext {
        NavContext { admin_level: level, ..NavContext::default() }
    }

    fn drive(session: &mut Session, event: NavEvent, context: &NavContext) -> Vec<NavAction> {
        let engine = FlowEngine::new(FeedbackFlow);
        let outcome = engine
            .apply(session.stage, &event, context)
            .unwrap_or_else(|err| panic!("{event:?} should be accepted: {err}"));
        session.advance(&outcome);
        outcome.actions
    }

    fn cached_question() -> FeedbackItem {
        FeedbackItem::Question(Question {
            id: ItemId(1),
            user_id: UserId(1),
            username: None,
            text: "hello?".to_owned(),
            admin_response: None,
            created_at: Utc::now(),
        })
    }

    #[test]
    fn review_with_text_happy_path() {
        let context = NavContext::default();
        let mut session = Session::new(UserId(1));

        drive(&mut session, NavEvent::LeaveReview, &context);
        assert_eq!(session.stage, Stage::AwaitingRatingChoice);

        let actions = drive(&mut session, NavEvent::RatingChosen(rating(5)), &context);
        assert_eq!(session.stage, Stage::AwaitingReviewText);
        assert_eq!(actions, vec![NavAction::StorePendingRating(rating(5))]);

        let actions = drive(&mut session, NavEvent::TextSubmitted, &context);
        assert_eq!(session.stage, Stage::Root);
        assert_eq!(
            actions,
            vec![NavAction::SubmitReview { with_text: true }, NavAction::NotifyAdmins]
        );
    }

    #[test]
    fn rating_is_accepted_straight_from_root_and_can_be_changed() {
        let context = NavContext::default();
        let mut session = Session::new(UserId(1));

        drive(&mut session, NavEvent::RatingChosen(rating(2)), &context);
        let actions = drive(&mut session, NavEvent::RatingChosen(rating(4)), &context);

        assert_eq!(session.stage, Stage::AwaitingReviewText);
        assert_eq!(actions, vec![NavAction::StorePendingRating(rating(4))]);
    }

    #[test]
    fn skip_text_submits_rating_only_review() {
        let context = NavContext::default();
        let mut session = Session::new(UserId(1));
        drive(&mut session, NavEvent::RatingChosen(rating(3)), &context);

        let actions = drive(&mut session, NavEvent::SkipText, &context);

        assert_eq!(session.stage, Stage::Root);
        assert_eq!(
            actions,
            vec![NavAction::SubmitReview { with_text: false }, NavAction::NotifyAdmins]
        );
    }

    #[test]
    fn banned_users_cannot_review_or_ask() {
        let engine = FlowEngine::new(FeedbackFlow);
        let context = NavContext { banned: true, ..NavContext::default() };

        for (stage, event) in [
            (Stage::Root, NavEvent::LeaveReview),
            (Stage::Root, NavEvent::RatingChosen(rating(5))),
            (Stage::AwaitingReviewText, NavEvent::TextSubmitted),
            (Stage::AwaitingReviewText, NavEvent::SkipText),
            (Stage::Root, NavEvent::AskQuestion),
            (Stage::AwaitingQuestionText, NavEvent::TextSubmitted),
        ] {
            assert_eq!(
                engine.apply(stage, &event, &context),
                Err(FlowTransitionError::Banned),
                "{event:?} from {stage:?}"
            );
        }
    }

    #[test]
    fn daily_limit_blocks_reviews_but_not_questions() {
        let engine = FlowEngine::new(FeedbackFlow);
        let context = NavContext { review_quota_exhausted: true, ..NavContext::default() };

        assert_eq!(
            engine.apply(Stage::Root, &NavEvent::LeaveReview, &context),
            Err(FlowTransitionError::DailyLimitReached)
        );
        assert_eq!(
            engine.apply(Stage::AwaitingReviewText, &NavEvent::TextSubmitted, &context),
            Err(FlowTransitionError::DailyLimitReached)
        );
        let outcome = engine
            .apply(Stage::Root, &NavEvent::AskQuestion, &context)
            .expect("questions are not limited");
        assert_eq!(outcome.to, Stage::AwaitingQuestionText);
    }

    #[test]
    fn history_wizard_walks_to_viewing_page() {
        let context = NavContext::default();
        let mut session = Session::new(UserId(1));

        drive(&mut session, NavEvent::OpenHistory, &context);
        drive(
            &mut session,
            NavEvent::HistoryTypeChosen { scope: BrowseScope::Own, kind: ItemKind::Review },
            &context,
        );
        assert_eq!(session.stage, Stage::AwaitingFilterType);
        drive(
            &mut session,
            NavEvent::FilterChosen {
                scope: BrowseScope::Own,
                kind: ItemKind::Review,
                filter: ResponseFilter::All,
            },
            &context,
        );
        assert_eq!(session.stage, Stage::AwaitingSortType);
        let actions =
            drive(&mut session, NavEvent::SortChosen(own_key(SortOrder::Newest)), &context);

        assert_eq!(session.stage, Stage::ViewingPage);
        assert_eq!(actions, vec![NavAction::LoadItems]);
        assert_eq!(session.selections.browse_key(), Some(own_key(SortOrder::Newest)));
        assert_eq!(session.selections.current_page_index, Some(0));
    }

    #[test]
    fn page_flip_keeps_cache_for_same_selection() {
        let context = NavContext::default();
        let mut session = Session::new(UserId(1));
        drive(&mut session, NavEvent::OpenHistory, &context);
        drive(&mut session, NavEvent::SortChosen(own_key(SortOrder::Newest)), &context);
        session.cached_items = vec![cached_question()];

        drive(
            &mut session,
            NavEvent::PageRequested { key: own_key(SortOrder::Newest), index: 1 },
            &context,
        );
        assert_eq!(session.cached_items.len(), 1, "same selection reuses the cache");
        assert_eq!(session.selections.current_page_index, Some(1));

        drive(
            &mut session,
            NavEvent::PageRequested { key: own_key(SortOrder::Oldest), index: 0 },
            &context,
        );
        assert!(session.cached_items.is_empty(), "changed sort drops the cache");
    }

    #[test]
    fn leaving_viewing_page_drops_cache() {
        let context = NavContext::default();
        let mut session = Session::new(UserId(1));
        drive(&mut session, NavEvent::OpenHistory, &context);
        drive(&mut session, NavEvent::SortChosen(own_key(SortOrder::Newest)), &context);
        session.cached_items = vec![cached_question()];

        drive(&mut session, NavEvent::BackToFilter(ItemKind::Review), &context);

        assert_eq!(session.stage, Stage::AwaitingFilterType);
        assert!(session.cached_items.is_empty());
        assert_eq!(session.selections.sort_type, None);
        assert_eq!(session.selections.history_type, Some(ItemKind::Review));
    }

    #[test]
    fn back_to_root_twice_from_every_stage_ends_empty() {
        let engine = FlowEngine::new(FeedbackFlow);
        for stage in ALL_STAGES {
            let mut session = Session::new(UserId(5));
            session.stage = stage;
            session.selections.history_type = Some(ItemKind::Question);
            session.selections.current_page_index = Some(3);

            for _ in 0..2 {
                let outcome = engine
                    .apply(session.stage, &NavEvent::BackToRoot, &NavContext::default())
                    .expect("back-to-root is always accepted");
                assert_eq!(outcome.actions, vec![NavAction::ClearCorrelation]);
                session.advance(&outcome);
                assert_eq!(session.stage, Stage::Root);
                assert!(session.selections.is_empty());
            }
        }
    }

    #[test]
    fn text_outside_text_stages_is_unexpected() {
        let engine = FlowEngine::new(FeedbackFlow);
        for stage in ALL_STAGES.into_iter().filter(|stage| !stage.expects_text()) {
            assert_eq!(
                engine.apply(stage, &NavEvent::TextSubmitted, &NavContext::default()),
                Err(FlowTransitionError::UnexpectedText { stage })
            );
        }
    }

    #[test]
    fn skip_text_outside_review_text_is_invalid() {
        let engine = FlowEngine::new(FeedbackFlow);
        let result = engine.apply(Stage::Root, &NavEvent::SkipText, &NavContext::default());

        assert!(matches!(result, Err(FlowTransitionError::InvalidTransition { .. })));
    }

    #[test]
    fn browse_tokens_are_not_accepted_mid_review() {
        let engine = FlowEngine::new(FeedbackFlow);
        let result = engine.apply(
            Stage::AwaitingReviewText,
            &NavEvent::SortChosen(own_key(SortOrder::Newest)),
            &NavContext::default(),
        );

        assert!(matches!(result, Err(FlowTransitionError::InvalidTransition { .. })));
    }

    #[test]
    fn admin_scope_requires_viewer_level() {
        let engine = FlowEngine::new(FeedbackFlow);
        let event = NavEvent::HistoryTypeChosen { scope: BrowseScope::All, kind: ItemKind::Review };

        assert_eq!(
            engine.apply(Stage::Root, &event, &admin(AdminLevel::USER)),
            Err(FlowTransitionError::InsufficientRights {
                required: AdminLevel::VIEWER,
                actual: AdminLevel::USER,
            })
        );
        let outcome = engine
            .apply(Stage::Root, &event, &admin(AdminLevel::VIEWER))
            .expect("viewer may browse everything");
        assert_eq!(outcome.to, Stage::AwaitingFilterType);
    }

    #[test]
    fn reply_requires_responder_and_open_target() {
        let engine = FlowEngine::new(FeedbackFlow);
        let target = ReplyTarget { kind: ItemKind::Review, id: ItemId(42) };
        let event = NavEvent::ReplyRequested(target);

        let viewer =
            NavContext { reply_target: Some(ReplyTargetState::Open), ..admin(AdminLevel::VIEWER) };
        assert!(matches!(
            engine.apply(Stage::ViewingPage, &event, &viewer),
            Err(FlowTransitionError::InsufficientRights { .. })
        ));

        let answered = NavContext {
            reply_target: Some(ReplyTargetState::Answered),
            ..admin(AdminLevel::RESPONDER)
        };
        assert_eq!(
            engine.apply(Stage::ViewingPage, &event, &answered),
            Err(FlowTransitionError::ReplyTargetAnswered)
        );

        let missing = NavContext {
            reply_target: Some(ReplyTargetState::Missing),
            ..admin(AdminLevel::RESPONDER)
        };
        assert_eq!(
            engine.apply(Stage::ViewingPage, &event, &missing),
            Err(FlowTransitionError::ReplyTargetMissing)
        );

        let open = NavContext {
            reply_target: Some(ReplyTargetState::Open),
            ..admin(AdminLevel::RESPONDER)
        };
        let outcome = engine.apply(Stage::ViewingPage, &event, &open).expect("open target");
        assert_eq!(outcome.to, Stage::AwaitingAdminReplyText);
        assert_eq!(outcome.actions, vec![NavAction::StoreReplyTarget(target)]);
    }

    #[test]
    fn admin_reply_text_and_cancel_return_to_root() {
        let engine = FlowEngine::new(FeedbackFlow);
        let context = admin(AdminLevel::RESPONDER);

        let submitted = engine
            .apply(Stage::AwaitingAdminReplyText, &NavEvent::TextSubmitted, &context)
            .expect("reply text accepted");
        assert_eq!(submitted.actions, vec![NavAction::SubmitReply]);

        let cancelled = engine
            .apply(Stage::AwaitingAdminReplyText, &NavEvent::ReplyCancelled, &context)
            .expect("cancel accepted");
        assert_eq!(cancelled.to, Stage::Root);
        assert_eq!(cancelled.actions, vec![NavAction::ClearCorrelation]);

        assert!(engine.apply(Stage::Root, &NavEvent::ReplyCancelled, &context).is_err());
    }

    #[test]
    fn start_registers_from_any_stage() {
        let engine = FlowEngine::new(FeedbackFlow);
        assert_eq!(engine.initial_stage(), Stage::Root);
        for stage in ALL_STAGES {
            let outcome = engine
                .apply(stage, &NavEvent::Start, &NavContext::default())
                .expect("start is always accepted");
            assert_eq!(outcome.to, Stage::Root);
            assert_eq!(outcome.actions, vec![NavAction::RegisterUser, NavAction::ClearCorrelation]);
        }
    }
}
