//! Slack bot for the transaction dashboard.
//!
//! - **Signatures** (`signature`) - `v0` HMAC request verification
//! - **Block Kit** (`blocks`) - message builders and the dashboard card
//! - **Commands** (`commands`) - summary providers and the DM-ing command router
//! - **Interactions** (`interactions`) - button callbacks
//! - **Web API** (`client`) - `chat.postMessage`
//!
//! HTTP routing lives in `banklens-server`; handlers there acknowledge within Slack's
//! three-second window and hand the work to [`commands::CommandRouter`] on a spawned task.

pub mod blocks;
pub mod client;
pub mod commands;
pub mod interactions;
pub mod signature;

pub use blocks::{dashboard_message, MessageTemplate};
pub use client::{MessagePoster, SlackApiError, SlackWebClient};
pub use commands::{
    AnalyticsSummaries, CommandRouter, EphemeralReply, SlashCommandPayload, SummaryError,
    SummaryProvider,
};
pub use interactions::{parse_interaction, InteractionError, InteractionKind};
pub use signature::{SignatureError, SignatureVerifier, Verification};
