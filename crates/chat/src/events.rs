use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use reviewdesk_db::{FeedbackRepository, InMemoryFeedbackRepository};

use crate::controller::{
    ChatUser, NavigationController, NavigationError, NavigationSettings, Outcome, Reply,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatUpdate {
    pub update_id: i64,
    pub event: ChatEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    Command(CommandEvent),
    Text(TextEvent),
    Action(ActionEvent),
    Unsupported { kind: String },
}

impl ChatEvent {
    pub fn event_type(&self) -> ChatEventType {
        match self {
            Self::Command(_) => ChatEventType::Command,
            Self::Text(_) => ChatEventType::Text,
            Self::Action(_) => ChatEventType::Action,
            Self::Unsupported { .. } => ChatEventType::Unsupported,
        }
    }

    pub fn user(&self) -> Option<&ChatUser> {
        match self {
            Self::Command(event) => Some(&event.user),
            Self::Text(event) => Some(&event.user),
            Self::Action(event) => Some(&event.user),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChatEventType {
    Command,
    Text,
    Action,
    Unsupported,
}

/// Location of a message the bot sent earlier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEvent {
    pub user: ChatUser,
    /// Command name as typed, e.g. `/start` or `/start@reviewdesk_bot`.
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextEvent {
    pub user: ChatUser,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionEvent {
    /// Platform id used to answer the button press.
    pub action_id: String,
    pub user: ChatUser,
    pub message: MessageRef,
    /// Encoded action token attached to the pressed button.
    pub data: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Outcome),
    Processed,
    Ignored,
}

impl HandlerResult {
    fn from_outcome(outcome: Outcome) -> Self {
        if outcome.reply == Reply::Silent && outcome.notices.is_empty() {
            Self::Processed
        } else {
            Self::Responded(outcome)
        }
    }
}

#[derive(Debug, Error)]
pub enum EventHandlerError {
    #[error(transparent)]
    Navigation(#[from] NavigationError),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> ChatEventType;
    async fn handle(
        &self,
        update: &ChatUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<ChatEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        update: &ChatUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&update.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(update, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Wires the command, text and action handlers to one controller.
pub fn navigation_dispatcher<R>(controller: Arc<NavigationController<R>>) -> EventDispatcher
where
    R: FeedbackRepository + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(StartCommandHandler::new(Arc::clone(&controller)));
    dispatcher.register(TextHandler::new(Arc::clone(&controller)));
    dispatcher.register(ActionHandler::new(controller));
    dispatcher
}

pub fn default_dispatcher() -> EventDispatcher {
    let repository = Arc::new(InMemoryFeedbackRepository::new());
    navigation_dispatcher(Arc::new(NavigationController::new(
        repository,
        NavigationSettings::default(),
    )))
}

/// Strips the leading slash and any `@botname` suffix.
pub fn normalize_command(name: &str) -> String {
    let name = name.trim().trim_start_matches('/');
    let name = name.split('@').next().unwrap_or_default();
    name.to_ascii_lowercase()
}

pub struct StartCommandHandler<R> {
    controller: Arc<NavigationController<R>>,
}

impl<R> StartCommandHandler<R> {
    pub fn new(controller: Arc<NavigationController<R>>) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl<R> EventHandler for StartCommandHandler<R>
where
    R: FeedbackRepository + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Command
    }

    async fn handle(
        &self,
        update: &ChatUpdate,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Command(command) = &update.event else {
            return Ok(HandlerResult::Ignored);
        };
        if normalize_command(&command.name) != "start" {
            return Ok(HandlerResult::Ignored);
        }

        let outcome = self.controller.handle_start(&command.user).await?;
        Ok(HandlerResult::from_outcome(outcome))
    }
}

pub struct TextHandler<R> {
    controller: Arc<NavigationController<R>>,
}

impl<R> TextHandler<R> {
    pub fn new(controller: Arc<NavigationController<R>>) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl<R> EventHandler for TextHandler<R>
where
    R: FeedbackRepository + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Text
    }

    async fn handle(
        &self,
        update: &ChatUpdate,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Text(event) = &update.event else {
            return Ok(HandlerResult::Ignored);
        };

        let outcome = self.controller.handle_text(&event.user, &event.text).await?;
        Ok(HandlerResult::from_outcome(outcome))
    }
}

pub struct ActionHandler<R> {
    controller: Arc<NavigationController<R>>,
}

impl<R> ActionHandler<R> {
    pub fn new(controller: Arc<NavigationController<R>>) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl<R> EventHandler for ActionHandler<R>
where
    R: FeedbackRepository + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Action
    }

    async fn handle(
        &self,
        update: &ChatUpdate,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Action(event) = &update.event else {
            return Ok(HandlerResult::Ignored);
        };

        let outcome = self.controller.handle_action(&event.user, &event.data).await?;
        // Button presses always need an answer, even a silent one.
        Ok(HandlerResult::Responded(outcome))
    }
}
