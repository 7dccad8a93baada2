//! Chat interface for reviewdesk.
//!
//! - `controller`: turns start commands, button presses and free text into
//!   the next screen, driving the per-user flow and the feedback store
//! - `screens` / `keyboard`: render instructions (text plus inline keyboard)
//! - `session`: per-user session registry
//! - `events`: typed chat updates routed to handlers
//! - `runner`: reconnecting update loop and delivery through the transport
//!
//! ```text
//! UpdateSource → BotRunner → EventDispatcher → NavigationController → FeedbackRepository
//!                    ↓
//!              ChatTransport ← Outcome (screen, alert, notices)
//! ```

pub mod controller;
pub mod events;
pub mod keyboard;
pub mod runner;
pub mod screens;
pub mod session;

pub use controller::{
    AdminNotice, ChatUser, NavigationController, NavigationError, NavigationSettings, Outcome,
    Reply,
};
pub use events::{default_dispatcher, navigation_dispatcher, ChatEvent, ChatUpdate, EventDispatcher};
pub use keyboard::{Button, Screen};
pub use runner::{BotRunner, ChatTransport, ReconnectPolicy, TransportError, UpdateSource};
pub use session::SessionRegistry;
