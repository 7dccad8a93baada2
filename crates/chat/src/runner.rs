use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use reviewdesk_core::domain::user::UserId;
use reviewdesk_core::errors::ApplicationError;

use crate::controller::{Outcome, Reply};
use crate::events::{
    default_dispatcher, ChatEvent, ChatUpdate, DispatchError, EventContext, EventDispatcher,
    HandlerResult, MessageRef,
};
use crate::keyboard::Screen;
use crate::session::SessionRegistry;

/// Idle sessions are swept after this many handled updates.
const PRUNE_EVERY: u64 = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
    /// The edit would not change the message; harmless after a double tap.
    #[error("message is not modified")]
    NotModified,
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Incoming side of the chat platform.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `None` means the stream ended cleanly.
    async fn next_update(&self) -> Result<Option<ChatUpdate>, TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Outgoing side of the chat platform.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_screen(&self, chat: UserId, screen: &Screen) -> Result<MessageRef, TransportError>;
    async fn edit_screen(&self, message: &MessageRef, screen: &Screen) -> Result<(), TransportError>;
    async fn delete_message(&self, message: &MessageRef) -> Result<(), TransportError>;
    async fn answer_action(&self, action_id: &str, alert: Option<&str>) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopUpdateSource;

#[async_trait]
impl UpdateSource for NoopUpdateSource {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_update(&self) -> Result<Option<ChatUpdate>, TransportError> {
        Ok(None)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct NoopChatTransport;

#[async_trait]
impl ChatTransport for NoopChatTransport {
    async fn send_screen(&self, chat: UserId, _screen: &Screen) -> Result<MessageRef, TransportError> {
        Ok(MessageRef { chat_id: chat.0, message_id: 0 })
    }

    async fn edit_screen(&self, _message: &MessageRef, _screen: &Screen) -> Result<(), TransportError> {
        Ok(())
    }

    async fn delete_message(&self, _message: &MessageRef) -> Result<(), TransportError> {
        Ok(())
    }

    async fn answer_action(&self, _action_id: &str, _alert: Option<&str>) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct BotRunner {
    source: Arc<dyn UpdateSource>,
    worker: UpdateWorker,
    reconnect_policy: ReconnectPolicy,
    sessions: Option<Arc<SessionRegistry>>,
}

impl Default for BotRunner {
    fn default() -> Self {
        Self::new(
            Arc::new(NoopUpdateSource),
            Arc::new(NoopChatTransport),
            default_dispatcher(),
            ReconnectPolicy::default(),
        )
    }
}

impl BotRunner {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        transport: Arc<dyn ChatTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self {
            source,
            worker: UpdateWorker { dispatcher: Arc::new(dispatcher), transport },
            reconnect_policy,
            sessions: None,
        }
    }

    /// Lets the runner sweep idle sessions out of the registry.
    pub fn with_session_registry(mut self, sessions: Arc<SessionRegistry>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "chat update source failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "chat update retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    /// Reads updates and hands each one to its own task. Updates from
    /// different users run concurrently; a user's updates are chained so
    /// they are handled in arrival order.
    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening chat update source");
        self.source.connect().await?;
        info!(attempt, "chat update source connected");

        let mut in_flight = JoinSet::new();
        let mut lanes: HashMap<i64, oneshot::Receiver<()>> = HashMap::new();
        let mut handled: u64 = 0;

        let pumped = loop {
            let update = match self.source.next_update().await {
                Ok(Some(update)) => update,
                Ok(None) => break Ok(()),
                Err(error) => break Err(error),
            };

            let context = EventContext { correlation_id: format!("update-{}", update.update_id) };
            let user_id = update.event.user().map(|user| user.id.0);
            info!(
                event_name = "ingress.chat.update_received",
                update_id = update.update_id,
                event_type = ?update.event.event_type(),
                correlation_id = %context.correlation_id,
                user_id = user_id.unwrap_or_default(),
                "received chat update"
            );

            let (finished, lane) = oneshot::channel::<()>();
            let previous = user_id.and_then(|id| lanes.insert(id, lane));
            let worker = self.worker.clone();
            in_flight.spawn(async move {
                let _finished = finished;
                if let Some(previous) = previous {
                    // Resolves once the user's earlier update is done, even if it panicked.
                    let _ = previous.await;
                }
                worker.handle(update, context).await;
            });

            while let Some(joined) = in_flight.try_join_next() {
                report_join(joined);
            }
            lanes.retain(|_, lane| matches!(lane.try_recv(), Err(TryRecvError::Empty)));

            handled += 1;
            if handled % PRUNE_EVERY == 0 {
                if let Some(sessions) = &self.sessions {
                    let pruned = sessions.prune_idle();
                    debug!(pruned, remaining = sessions.len(), "pruned idle sessions");
                }
            }
        };

        let pending = in_flight.len();
        if pending > 0 {
            debug!(attempt, pending, "waiting for in-flight updates");
        }
        while let Some(joined) = in_flight.join_next().await {
            report_join(joined);
        }

        pumped?;
        info!(attempt, "chat update stream closed");
        self.source.disconnect().await
    }
}

/// Everything a spawned update task needs.
#[derive(Clone)]
struct UpdateWorker {
    dispatcher: Arc<EventDispatcher>,
    transport: Arc<dyn ChatTransport>,
}

impl UpdateWorker {
    async fn handle(&self, update: ChatUpdate, context: EventContext) {
        match self.dispatcher.dispatch(&update, &context).await {
            Ok(HandlerResult::Responded(outcome)) => {
                self.deliver(&update, outcome, &context).await;
            }
            Ok(HandlerResult::Processed | HandlerResult::Ignored) => {}
            Err(error) => {
                warn!(
                    event_name = "ingress.chat.dispatch_failed",
                    correlation_id = %context.correlation_id,
                    user_id = update.event.user().map(|user| user.id.0).unwrap_or_default(),
                    error = %error,
                    "event dispatch failed; continuing update loop"
                );
                let outcome = failure_outcome(&update, &error, &context);
                self.deliver(&update, outcome, &context).await;
            }
        }
    }

    async fn deliver(&self, update: &ChatUpdate, outcome: Outcome, ctx: &EventContext) {
        let Outcome { reply, notices } = outcome;

        match &update.event {
            ChatEvent::Action(action) => match reply {
                Reply::Render(screen) => {
                    let edited = self.transport.edit_screen(&action.message, &screen).await;
                    report("edit_screen", edited, ctx);
                    let answered = self.transport.answer_action(&action.action_id, None).await;
                    report("answer_action", answered, ctx);
                }
                Reply::Alert(text) => {
                    let answered =
                        self.transport.answer_action(&action.action_id, Some(&text)).await;
                    report("answer_action", answered, ctx);
                }
                Reply::Dismiss => {
                    let deleted = self.transport.delete_message(&action.message).await;
                    report("delete_message", deleted, ctx);
                    let answered = self.transport.answer_action(&action.action_id, None).await;
                    report("answer_action", answered, ctx);
                }
                Reply::Silent => {
                    let answered = self.transport.answer_action(&action.action_id, None).await;
                    report("answer_action", answered, ctx);
                }
            },
            ChatEvent::Command(event) => self.send_reply(event.user.id, reply, ctx).await,
            ChatEvent::Text(event) => self.send_reply(event.user.id, reply, ctx).await,
            ChatEvent::Unsupported { .. } => {}
        }

        for notice in notices {
            let sent = self.transport.send_screen(notice.admin, &notice.screen).await;
            if let Err(error) = sent {
                warn!(
                    event_name = "egress.chat.notice_failed",
                    correlation_id = %ctx.correlation_id,
                    admin_id = notice.admin.0,
                    error = %error,
                    "failed to notify admin"
                );
            }
        }
    }

    async fn send_reply(&self, chat: UserId, reply: Reply, ctx: &EventContext) {
        let screen = match reply {
            Reply::Render(screen) => screen,
            Reply::Alert(text) => Screen::text_only(text),
            Reply::Dismiss | Reply::Silent => return,
        };
        let sent = self.transport.send_screen(chat, &screen).await;
        report("send_screen", sent.map(|_| ()), ctx);
    }
}

fn report_join(joined: Result<(), JoinError>) {
    if let Err(error) = joined {
        warn!(
            event_name = "ingress.chat.update_task_failed",
            error = %error,
            "update task ended abnormally"
        );
    }
}

fn report(step: &'static str, result: Result<(), TransportError>, ctx: &EventContext) {
    match result {
        Ok(()) => {}
        Err(TransportError::NotModified) => {
            debug!(
                event_name = "egress.chat.not_modified",
                correlation_id = %ctx.correlation_id,
                step,
                "message unchanged; skipping edit"
            );
        }
        Err(error) => {
            warn!(
                event_name = "egress.chat.delivery_failed",
                correlation_id = %ctx.correlation_id,
                step,
                error = %error,
                "failed to deliver reply"
            );
        }
    }
}

/// A transient failure becomes an alert for button presses and a plain
/// message otherwise, carrying the correlation id for support.
fn failure_outcome(update: &ChatUpdate, error: &DispatchError, ctx: &EventContext) -> Outcome {
    let interface =
        ApplicationError::Persistence(error.to_string()).into_interface(ctx.correlation_id.clone());
    let message = format!("{} (ref {})", interface.user_message(), interface.correlation_id());

    match update.event {
        ChatEvent::Action(_) => Outcome::reply(Reply::Alert(message)),
        _ => Outcome::reply(Reply::Render(Screen::text_only(message))),
    }
}
