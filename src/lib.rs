//! # img2any
//!
//! Conversational image-format conversion: a user sends an image in one
//! encoding, the service offers target encodings as inline choices, and on
//! selection transcodes the file and sends it back.
//!
//! The interesting part is not the pixel pushing — the `image` crate does
//! that — but the **conversion session orchestration**: correlating an upload
//! with a format selection that arrives asynchronously later, transcoding the
//! right temporary artifact exactly once per selection even under double-taps
//! and transport retries, and guaranteeing that scratch storage is released
//! on every exit path while many chats convert concurrently.
//!
//! ## Session Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Router    validate declared format, persist source artifact
//!  ├─ 2. Registry  create job (AwaitingSelection), prompt with choices
//!  ├─ 3. Selection callback payload decoded, job claimed atomically
//!  ├─ 4. Codec     re-encode (spawn_blocking), downgrades surfaced
//!  ├─ 5. Delivery  converted document back to the chat
//!  └─ 6. Cleanup   terminal state + artifact release — on every path
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use img2any::{BotConfig, BotService};
//! use std::sync::Arc;
//!
//! # async fn run(my_source: impl img2any::UpdateSource, my_sink: Arc<dyn img2any::DeliverySink>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = BotConfig::default();
//! let service = BotService::new(config, my_sink)?;
//! service.run(my_source).await;
//! # Ok(())
//! # }
//! ```
//!
//! The transport is pluggable: implement [`UpdateSource`] and
//! [`DeliverySink`] for your chat platform and hand them to the service.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `img2any` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod codec;
pub mod config;
pub mod error;
pub mod fetch;
pub mod format;
mod orchestrator;
pub mod payload;
pub mod registry;
pub mod router;
pub mod service;
pub mod store;
pub mod transport;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use codec::{convert, ConvertedImage};
pub use config::{BotConfig, BotConfigBuilder};
pub use error::Img2AnyError;
pub use format::{ImageFormat, TargetFormat};
pub use payload::FormatSelection;
pub use registry::{ConversionJob, JobId, JobOutcome, JobState, SessionRegistry};
pub use router::Router;
pub use service::BotService;
pub use store::{ArtifactStore, Role};
pub use transport::{
    ChatRef, DeliverySink, DocumentPayload, InboundEvent, StreamSource, UpdateSource,
};
