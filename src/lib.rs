//! GPT-4o chat with web search and image generation tools.
//!
//! The library holds everything below the user interface: the credential
//! gate, the session and its conversation, the request orchestrator with its
//! two tool invokers, and the axum server that exposes them to the browser.

pub mod chat;
pub mod config;
pub mod constants;
pub mod conversation;
pub mod credential;
pub mod error;
pub mod image;
pub mod orchestrator;
pub mod provider;
pub mod search;
pub mod session;
pub mod web_server;

pub use config::Settings;
pub use conversation::{ChatTurn, Conversation, Reply, Role, ToolOutcome};
pub use credential::{Credential, CredentialGate, CredentialStore};
pub use error::ChatError;
pub use orchestrator::{ChatMode, Orchestrator};
pub use session::Session;
