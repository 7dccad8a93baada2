use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Offset, Timelike, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use reviewdesk_core::config::AppConfig;
use reviewdesk_core::domain::feedback::{
    FeedbackItem, ItemQuery, NewQuestion, NewReview, ReplyTarget, ResponseFilter,
};
use reviewdesk_core::domain::user::{AdminLevel, FeedbackUser, UserId};
use reviewdesk_core::flows::{
    BrowseScope, FeedbackFlow, FlowEngine, FlowTransitionError, NavAction, NavContext, NavEvent,
    ReplyTargetState, Session, Stage, TransitionOutcome,
};
use reviewdesk_core::navigation::{paginate, ActionToken, CorrelationStore, PageLimits};
use reviewdesk_db::{FeedbackRepository, RepositoryError};

use crate::keyboard::Screen;
use crate::screens;
use crate::session::SessionRegistry;

/// The chat user behind an update, as reported by the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatUser {
    pub id: UserId,
    pub username: Option<String>,
}

impl ChatUser {
    pub fn new(id: i64, username: Option<&str>) -> Self {
        Self { id: UserId(id), username: username.map(str::to_owned) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Render(Screen),
    /// Short popup answer to an action; the current message stays as is.
    Alert(String),
    /// Remove the message the action came from.
    Dismiss,
    Silent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminNotice {
    pub admin: UserId,
    pub screen: Screen,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub reply: Reply,
    pub notices: Vec<AdminNotice>,
}

impl Outcome {
    pub fn reply(reply: Reply) -> Self {
        Self { reply, notices: Vec::new() }
    }

    pub fn silent() -> Self {
        Self::reply(Reply::Silent)
    }

    pub fn screen(&self) -> Option<&Screen> {
        match &self.reply {
            Reply::Render(screen) => Some(screen),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("feedback store unavailable: {0}")]
    Store(#[from] RepositoryError),
}

#[derive(Clone, Debug)]
pub struct NavigationSettings {
    /// Page bounds for a user's own history.
    pub list_limits: PageLimits,
    /// Page bounds for the administrator's detail view. A Reply button is
    /// only offered on pages holding a single record.
    pub detail_limits: PageLimits,
    pub reviews_per_day: u32,
    pub utc_offset: FixedOffset,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            list_limits: PageLimits::LIST,
            detail_limits: PageLimits::DETAIL,
            reviews_per_day: 1,
            utc_offset: FixedOffset::east_opt(5 * 3600).unwrap_or_else(|| Utc.fix()),
        }
    }
}

impl NavigationSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            list_limits: config.paging.list_limits(),
            detail_limits: PageLimits::DETAIL,
            reviews_per_day: config.feedback.reviews_per_day,
            utc_offset: config.feedback.utc_offset(),
        }
    }
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Results of running a transition's actions, consumed by rendering.
#[derive(Default)]
struct Effects {
    saved: Option<FeedbackItem>,
    notices: Vec<AdminNotice>,
    stale: bool,
    reply_lost: bool,
}

pub struct NavigationController<R> {
    repository: Arc<R>,
    sessions: Arc<SessionRegistry>,
    correlations: CorrelationStore,
    engine: FlowEngine<FeedbackFlow>,
    settings: NavigationSettings,
    clock: Clock,
}

impl<R> NavigationController<R>
where
    R: FeedbackRepository,
{
    pub fn new(repository: Arc<R>, settings: NavigationSettings) -> Self {
        Self {
            repository,
            sessions: Arc::new(SessionRegistry::new()),
            correlations: CorrelationStore::new(),
            engine: FlowEngine::new(FeedbackFlow),
            settings,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn sessions(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.sessions)
    }

    pub fn correlations(&self) -> &CorrelationStore {
        &self.correlations
    }

    /// Copy of the user's current session, if one exists.
    pub async fn session_snapshot(&self, user: UserId) -> Option<Session> {
        let handle = self.sessions.get(user)?;
        let session = handle.lock().await;
        Some(session.clone())
    }

    pub async fn handle_start(&self, user: &ChatUser) -> Result<Outcome, NavigationError> {
        self.drive(user, NavEvent::Start, None).await
    }

    pub async fn handle_action(
        &self,
        user: &ChatUser,
        wire: &str,
    ) -> Result<Outcome, NavigationError> {
        let token = match ActionToken::decode(wire) {
            Ok(token) => token,
            Err(error) => {
                debug!(
                    event_name = "navigation.token.rejected",
                    user_id = %user.id,
                    wire,
                    error = %error,
                    "ignoring undecodable action token"
                );
                return Ok(Outcome::silent());
            }
        };

        if token == ActionToken::Dismiss {
            return Ok(Outcome::reply(Reply::Dismiss));
        }
        let Some(event) = NavEvent::from_token(&token) else {
            return Ok(Outcome::silent());
        };

        self.drive(user, event, None).await
    }

    pub async fn handle_text(
        &self,
        user: &ChatUser,
        text: &str,
    ) -> Result<Outcome, NavigationError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Outcome::silent());
        }
        self.drive(user, NavEvent::TextSubmitted, Some(text)).await
    }

    async fn drive(
        &self,
        user: &ChatUser,
        event: NavEvent,
        text: Option<&str>,
    ) -> Result<Outcome, NavigationError> {
        let handle = self.sessions.entry(user.id);
        let mut session = handle.lock().await;

        let record = self.repository.find_user(user.id).await?;
        let (context, reply_item) = self.context(user, session.stage, &event, record.as_ref()).await?;

        let outcome = match self.engine.apply(session.stage, &event, &context) {
            Ok(outcome) => outcome,
            Err(error) => return Ok(self.rejected(user, &mut session, record.as_ref(), error)),
        };

        debug!(
            event_name = "navigation.transition.applied",
            user_id = %user.id,
            from = ?outcome.from,
            to = ?outcome.to,
            actions = outcome.actions.len(),
            "applying navigation transition"
        );

        let mut next = session.clone();
        next.advance(&outcome);
        let (record, effects) = self.execute(user, &outcome, &mut next, record, text).await?;
        let reply = self.render(user, &outcome, &mut next, record.as_ref(), reply_item, &effects).await?;

        *session = next;
        Ok(Outcome { reply, notices: effects.notices })
    }

    async fn context(
        &self,
        user: &ChatUser,
        stage: Stage,
        event: &NavEvent,
        record: Option<&FeedbackUser>,
    ) -> Result<(NavContext, Option<FeedbackItem>), RepositoryError> {
        let mut context = NavContext {
            admin_level: record.map(|record| record.admin_level).unwrap_or_default(),
            banned: record.is_some_and(|record| record.is_banned),
            ..NavContext::default()
        };

        let reviewing = matches!(
            event,
            NavEvent::LeaveReview | NavEvent::RatingChosen(_) | NavEvent::SkipText
        ) || (*event == NavEvent::TextSubmitted && stage == Stage::AwaitingReviewText);
        if reviewing && self.settings.reviews_per_day > 0 {
            let since = self.start_of_local_day();
            let today = self.repository.count_reviews_since(user.id, since).await?;
            context.review_quota_exhausted = today >= self.settings.reviews_per_day;
        }

        let mut reply_item = None;
        if let NavEvent::ReplyRequested(target) = event {
            reply_item = self.repository.find_item(*target).await?;
            context.reply_target = Some(match &reply_item {
                None => ReplyTargetState::Missing,
                Some(item) if item.is_answered() => ReplyTargetState::Answered,
                Some(_) => ReplyTargetState::Open,
            });
        }

        Ok((context, reply_item))
    }

    fn rejected(
        &self,
        user: &ChatUser,
        session: &mut Session,
        record: Option<&FeedbackUser>,
        error: FlowTransitionError,
    ) -> Outcome {
        match error {
            FlowTransitionError::Banned => {
                info!(event_name = "navigation.guard.banned", user_id = %user.id, "banned user blocked");
                session.reset();
                self.correlations.clear(user.id);
                let reason = record.and_then(|record| record.ban_reason.as_deref());
                Outcome::reply(Reply::Render(screens::banned(reason)))
            }
            FlowTransitionError::DailyLimitReached => {
                session.reset();
                self.correlations.clear(user.id);
                Outcome::reply(Reply::Render(screens::daily_limit()))
            }
            FlowTransitionError::InsufficientRights { .. } => {
                Outcome::reply(Reply::Alert(screens::insufficient_rights().to_owned()))
            }
            FlowTransitionError::ReplyTargetMissing => {
                Outcome::reply(Reply::Alert(screens::reply_target_missing().to_owned()))
            }
            FlowTransitionError::ReplyTargetAnswered => {
                Outcome::reply(Reply::Alert(screens::reply_target_answered().to_owned()))
            }
            FlowTransitionError::InvalidTransition { .. }
            | FlowTransitionError::UnexpectedText { .. } => {
                debug!(
                    event_name = "navigation.transition.ignored",
                    user_id = %user.id,
                    error = %error,
                    "ignoring out-of-sequence interaction"
                );
                Outcome::silent()
            }
        }
    }

    async fn execute(
        &self,
        user: &ChatUser,
        outcome: &TransitionOutcome,
        next: &mut Session,
        mut record: Option<FeedbackUser>,
        text: Option<&str>,
    ) -> Result<(Option<FeedbackUser>, Effects), NavigationError> {
        let mut effects = Effects::default();

        for action in &outcome.actions {
            match action {
                NavAction::RegisterUser => {
                    let registered = self
                        .repository
                        .register_user(user.id, user.username.as_deref())
                        .await?;
                    record = Some(registered);
                }
                NavAction::StorePendingRating(rating) => {
                    self.correlations.set_pending_rating(user.id, *rating);
                }
                NavAction::SubmitReview { with_text } => {
                    let Some(rating) = self.correlations.take_pending_rating(user.id) else {
                        effects.stale = true;
                        break;
                    };
                    let review = NewReview {
                        user_id: user.id,
                        username: user.username.clone(),
                        rating,
                        text: if *with_text { text.map(str::to_owned) } else { None },
                    };
                    match self.repository.create_review(review).await {
                        Ok(review) => {
                            info!(
                                event_name = "feedback.review.created",
                                user_id = %user.id,
                                review_id = %review.id,
                                rating = review.rating.stars(),
                                "review stored"
                            );
                            effects.saved = Some(FeedbackItem::Review(review));
                        }
                        Err(error) => {
                            self.correlations.restore_pending_rating(user.id, rating);
                            return Err(error.into());
                        }
                    }
                }
                NavAction::SubmitQuestion => {
                    let question = NewQuestion {
                        user_id: user.id,
                        username: user.username.clone(),
                        text: text.unwrap_or_default().to_owned(),
                    };
                    let question = self.repository.create_question(question).await?;
                    info!(
                        event_name = "feedback.question.created",
                        user_id = %user.id,
                        question_id = %question.id,
                        "question stored"
                    );
                    effects.saved = Some(FeedbackItem::Question(question));
                }
                NavAction::NotifyAdmins => {
                    if let Some(item) = &effects.saved {
                        effects.notices = self.notices_for(item).await;
                    }
                }
                NavAction::LoadItems => {
                    if next.cached_items.is_empty() {
                        self.load_items(user.id, next).await?;
                    }
                }
                NavAction::StoreReplyTarget(target) => {
                    self.correlations.set_pending_reply_target(user.id, *target);
                }
                NavAction::SubmitReply => {
                    let Some(target) = self.correlations.take_pending_reply_target(user.id) else {
                        effects.stale = true;
                        break;
                    };
                    let response = text.unwrap_or_default();
                    match self.repository.record_response(target, response).await {
                        Ok(true) => {
                            info!(
                                event_name = "feedback.response.recorded",
                                user_id = %user.id,
                                item_id = %target.id,
                                kind = target.kind.as_str(),
                                "admin response stored"
                            );
                        }
                        Ok(false) => effects.reply_lost = true,
                        Err(error) => {
                            self.correlations.set_pending_reply_target(user.id, target);
                            return Err(error.into());
                        }
                    }
                }
                NavAction::ClearCorrelation => self.correlations.clear(user.id),
            }
        }

        if effects.stale {
            next.reset();
        }
        Ok((record, effects))
    }

    /// Fetches the current browse selection into the session cache. A user
    /// asking for answered items while none exist gets the full set instead.
    async fn load_items(&self, user: UserId, next: &mut Session) -> Result<(), RepositoryError> {
        let Some(key) = next.selections.browse_key() else {
            return Ok(());
        };
        let author = match key.scope {
            BrowseScope::Own => Some(user),
            BrowseScope::All => None,
        };
        let query = ItemQuery { author, kind: key.kind, filter: key.filter, sort: key.sort };

        let mut items = self.repository.list_items(query).await?;
        if items.is_empty() && key.scope == BrowseScope::Own && key.filter == ResponseFilter::Answered
        {
            debug!(
                event_name = "navigation.filter.fallback",
                user_id = %user,
                kind = key.kind.as_str(),
                "no answered items; showing all"
            );
            items = self.repository.list_items(ItemQuery { filter: ResponseFilter::All, ..query }).await?;
            next.selections.filter_type = Some(ResponseFilter::All);
        }

        next.cached_items = items;
        Ok(())
    }

    async fn notices_for(&self, item: &FeedbackItem) -> Vec<AdminNotice> {
        match self.repository.list_admins().await {
            Ok(admins) => admins
                .into_iter()
                .map(|admin| AdminNotice {
                    admin,
                    screen: screens::notice(item, self.settings.utc_offset),
                })
                .collect(),
            Err(error) => {
                warn!(
                    event_name = "feedback.notify.failed",
                    item_id = %item.id(),
                    error = %error,
                    "could not list admins; skipping notification"
                );
                Vec::new()
            }
        }
    }

    async fn render(
        &self,
        user: &ChatUser,
        outcome: &TransitionOutcome,
        next: &mut Session,
        record: Option<&FeedbackUser>,
        reply_item: Option<FeedbackItem>,
        effects: &Effects,
    ) -> Result<Reply, NavigationError> {
        let level = record.map(|record| record.admin_level).unwrap_or_default();
        if effects.stale {
            return Ok(Reply::Render(screens::session_expired(level)));
        }
        if effects.reply_lost {
            return Ok(Reply::Render(screens::already_answered(level)));
        }

        let screen = match &outcome.event {
            NavEvent::Start | NavEvent::BackToRoot => {
                let fallback;
                let record = match record {
                    Some(record) => record,
                    None => {
                        fallback = FeedbackUser::new(user.id, user.username.clone());
                        &fallback
                    }
                };
                screens::root(record, self.local_hour())
            }
            NavEvent::LeaveReview => screens::rating_keyboard(),
            NavEvent::RatingChosen(rating) => screens::review_text_prompt(*rating),
            NavEvent::SkipText => screens::review_saved(level),
            NavEvent::TextSubmitted => match outcome.from {
                Stage::AwaitingQuestionText => screens::question_saved(level),
                Stage::AwaitingAdminReplyText => screens::reply_saved(level),
                _ => screens::review_saved(level),
            },
            NavEvent::AskQuestion => screens::question_prompt(),
            NavEvent::OpenHistory => screens::history_types(),
            NavEvent::HistoryTypeChosen { scope: BrowseScope::All, kind } => {
                screens::admin_filters(*kind)
            }
            NavEvent::HistoryTypeChosen { scope: BrowseScope::Own, kind }
            | NavEvent::BackToFilter(kind) => {
                let has_answered = self.repository.has_answered(user.id, *kind).await?;
                screens::own_filters(*kind, has_answered)
            }
            NavEvent::FilterChosen { scope, kind, filter } => {
                screens::sort_keyboard(*scope, *kind, *filter)
            }
            NavEvent::SortChosen(_) | NavEvent::PageRequested { .. } => self.page(next, level),
            NavEvent::ReplyRequested(_) => match &reply_item {
                Some(item) => screens::reply_prompt(item, self.settings.utc_offset),
                None => screens::session_expired(level),
            },
            NavEvent::ReplyCancelled => screens::reply_cancelled(level),
        };

        Ok(Reply::Render(screen))
    }

    /// Paginates the cached items and pins the clamped page index.
    fn page(&self, next: &mut Session, level: AdminLevel) -> Screen {
        let Some(key) = next.selections.browse_key() else {
            return screens::history_types();
        };
        let offset = self.settings.utc_offset;
        let pages = match key.scope {
            BrowseScope::Own => paginate(
                &next.cached_items,
                |item| screens::list_entry(item, offset),
                self.settings.list_limits,
            ),
            BrowseScope::All => paginate(
                &next.cached_items,
                |item| screens::detail_entry(item, offset),
                self.settings.detail_limits,
            ),
        };

        let requested = next.selections.current_page_index.unwrap_or(0);
        let Some(view) = pages.view(requested) else {
            next.selections.current_page_index = Some(0);
            return screens::empty_list(key);
        };
        next.selections.current_page_index = Some(view.index);

        let reply = match key.scope {
            BrowseScope::All if level.allows(AdminLevel::RESPONDER) && view.items.len() == 1 => next
                .cached_items
                .get(view.first)
                .filter(|item| !item.is_answered())
                .map(|item| ReplyTarget { kind: item.kind(), id: item.id() }),
            _ => None,
        };

        screens::list_page(key, &view, reply)
    }

    fn local_hour(&self) -> u32 {
        (self.clock)().with_timezone(&self.settings.utc_offset).hour()
    }

    fn start_of_local_day(&self) -> DateTime<Utc> {
        let now = (self.clock)();
        let local = now.with_timezone(&self.settings.utc_offset);
        now - Duration::seconds(i64::from(local.num_seconds_from_midnight()))
            - Duration::nanoseconds(i64::from(local.nanosecond()))
    }
}
