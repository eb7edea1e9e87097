//! Update router: classify inbound events and drive the per-chat state
//! machine.
//!
//! Each chat is in one of two states: `Idle`, or `AwaitingFormatChoice` for
//! exactly one pending job. The transitions are deliberately few:
//!
//! * `Idle → AwaitingFormatChoice` — a validated upload created a job and the
//!   choice prompt went out.
//! * `AwaitingFormatChoice → Idle` — the job reached any terminal state
//!   (delivered, failed, expired, cancelled) or a newer upload superseded it.
//!
//! Unrelated text never resets state; it is answered informationally with no
//! side effects. Selections are not state transitions here at all — they are
//! correlated by job id through the callback payload and handed to the
//! orchestrator, which serialises them via the session registry.

use crate::config::BotConfig;
use crate::error::Img2AnyError;
use crate::fetch;
use crate::format::{ImageFormat, TargetFormat};
use crate::orchestrator;
use crate::payload;
use crate::registry::{JobId, SessionRegistry};
use crate::store::{ArtifactStore, Role};
use crate::transport::{ChatRef, DeliverySink, DocumentPayload, InboundEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const HELP_TEXT: &str = "Send me an image (PNG, JPEG, GIF, or BMP) and I'll offer \
target formats to convert it to.\nCommands: /help — this message, /cancel — drop a pending upload.";

/// Per-chat conversation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatState {
    Idle,
    AwaitingFormatChoice(JobId),
}

/// Tracks which chats are waiting on a format choice.
///
/// Same locking discipline as the registry: short critical sections, never
/// held across an await.
#[derive(Debug, Default)]
pub(crate) struct ChatDirectory {
    states: Mutex<HashMap<ChatRef, ChatState>>,
}

impl ChatDirectory {
    /// The job this chat is waiting on, if any.
    fn pending_job(&self, chat: &ChatRef) -> Option<JobId> {
        match self.states.lock().expect("chat directory poisoned").get(chat) {
            Some(ChatState::AwaitingFormatChoice(id)) => Some(*id),
            _ => None,
        }
    }

    fn set_awaiting(&self, chat: ChatRef, job_id: JobId) {
        self.states
            .lock()
            .expect("chat directory poisoned")
            .insert(chat, ChatState::AwaitingFormatChoice(job_id));
    }

    /// Return the chat to `Idle`, but only if it still points at `job_id`.
    ///
    /// A job finishing late must not clobber the state installed by a newer
    /// upload from the same chat.
    pub(crate) fn clear_if(&self, chat: &ChatRef, job_id: JobId) {
        let mut states = self.states.lock().expect("chat directory poisoned");
        if states.get(chat) == Some(&ChatState::AwaitingFormatChoice(job_id)) {
            states.insert(chat.clone(), ChatState::Idle);
        }
    }
}

/// Classifies inbound events and dispatches them to the right handler.
///
/// Holds the full component set; the service spawns one `dispatch` call per
/// event so a slow download or conversion in one chat never stalls another.
pub struct Router {
    pub(crate) config: BotConfig,
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) store: Arc<ArtifactStore>,
    pub(crate) sink: Arc<dyn DeliverySink>,
    pub(crate) chats: ChatDirectory,
}

impl Router {
    pub fn new(
        config: BotConfig,
        registry: Arc<SessionRegistry>,
        store: Arc<ArtifactStore>,
        sink: Arc<dyn DeliverySink>,
    ) -> Self {
        Self {
            config,
            registry,
            store,
            sink,
            chats: ChatDirectory::default(),
        }
    }

    /// The session registry, for embedders and tests.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// The artifact store, for embedders and tests.
    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    /// Handle one inbound event to completion.
    pub async fn dispatch(&self, event: InboundEvent) {
        match event {
            InboundEvent::DocumentUploaded {
                chat,
                payload,
                declared_mime,
                file_id,
            } => self.handle_document(chat, payload, &declared_mime, &file_id).await,
            InboundEvent::SelectionMade { chat, payload } => {
                orchestrator::handle_selection(self, &chat, &payload).await
            }
            InboundEvent::TextReceived { chat, text } => self.handle_text(chat, &text).await,
        }
    }

    /// Intake: validate, persist, register, prompt.
    async fn handle_document(
        &self,
        chat: ChatRef,
        document: DocumentPayload,
        declared_mime: &str,
        file_id: &str,
    ) {
        info!(%chat, file_id, mime = declared_mime, "document uploaded");

        // Format is declared and validated at intake, never sniffed.
        let source_format = match ImageFormat::from_mime(declared_mime) {
            Some(f) => f,
            None => {
                let err = Img2AnyError::UnsupportedSource {
                    mime: declared_mime.to_string(),
                };
                self.reply(&chat, &err.to_string()).await;
                return;
            }
        };

        let bytes = match fetch::resolve_payload(document, &self.config).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%chat, error = %err, "intake failed");
                let msg = if err.is_user_facing() {
                    err.to_string()
                } else {
                    "Couldn't fetch your upload from the transport. Please try again.".to_string()
                };
                self.reply(&chat, &msg).await;
                return;
            }
        };

        // A newer upload supersedes any job still waiting on this chat.
        if let Some(old) = self.chats.pending_job(&chat) {
            if let Some(job) = self.registry.cancel_awaiting(old) {
                info!(%chat, job_id = %job.id, "pending job superseded by new upload");
                self.store.release_all(job.id).await;
            }
        }

        // Store first, register second: the source artifact exists before the
        // job is visible to any selection event.
        let job_id = JobId::new();
        let source_path = match self.store.put(job_id, Role::Source, &bytes).await {
            Ok(path) => path,
            Err(err) => {
                warn!(%chat, error = %err, "failed to persist upload");
                self.store.release_all(job_id).await;
                self.reply(&chat, "Something went wrong storing your upload. Please try again.")
                    .await;
                return;
            }
        };
        self.registry
            .create_with_id(job_id, chat.clone(), source_format, source_path);
        self.chats.set_awaiting(chat.clone(), job_id);

        let choices: Vec<(String, String)> = TargetFormat::ALL
            .iter()
            .map(|t| (t.label().to_string(), payload::encode(job_id, *t)))
            .collect();

        if let Err(err) = self
            .sink
            .send_choices(&chat, "Choose a target format:", &choices)
            .await
        {
            // Prompt never reached the user: the job can't be selected, so
            // roll it back instead of waiting for the expiry sweep.
            warn!(%chat, job_id = %job_id, error = %err, "choice prompt failed, rolling back job");
            if self.registry.cancel_awaiting(job_id).is_some() {
                self.store.release_all(job_id).await;
            }
            self.chats.clear_if(&chat, job_id);
            return;
        }

        debug!(%chat, job_id = %job_id, "awaiting format choice");
    }

    /// Text and commands: informational only, except `/cancel`.
    async fn handle_text(&self, chat: ChatRef, text: &str) {
        match text.trim() {
            "/cancel" => {
                let Some(job_id) = self.chats.pending_job(&chat) else {
                    self.reply(&chat, "Nothing to cancel. Send me an image to start.").await;
                    return;
                };
                if let Some(job) = self.registry.cancel_awaiting(job_id) {
                    self.store.release_all(job.id).await;
                }
                self.chats.clear_if(&chat, job_id);
                info!(%chat, job_id = %job_id, "job cancelled by user");
                self.reply(&chat, "Cancelled. Send another image whenever you like.")
                    .await;
            }
            "/start" | "/help" => self.reply(&chat, HELP_TEXT).await,
            _ => {
                // Unrelated text never resets the state machine.
                let msg = if self.chats.pending_job(&chat).is_some() {
                    "You have an image waiting — pick a format with the buttons above, or /cancel."
                } else {
                    "Send me an image to convert, or /help for details."
                };
                self.reply(&chat, msg).await;
            }
        }
    }

    /// Fire-and-log text reply. A failed informational send is logged, never
    /// escalated: the session state must not depend on it.
    pub(crate) async fn reply(&self, chat: &ChatRef, text: &str) {
        if let Err(err) = self.sink.send_text(chat, text).await {
            warn!(%chat, error = %err, "text reply failed");
        }
    }

    /// Expire unattended jobs and release their storage.
    ///
    /// Invoked periodically by the service's sweep task.
    pub async fn sweep_expired(&self) {
        let expired = self.registry.expire_older_than(self.config.expiry);
        for job in expired {
            self.store.release_all(job.id).await;
            self.chats.clear_if(&job.chat, job.id);
            if self.config.notify_on_expiry {
                self.reply(
                    &job.chat,
                    "Your upload expired before a format was chosen. Send it again to convert.",
                )
                .await;
            }
        }
    }
}
