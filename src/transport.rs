//! External transport seams: where events come from and where results go.
//!
//! The core is transport-agnostic. A Telegram adapter, a Matrix adapter, and
//! the in-memory harness used by the integration tests all implement the same
//! two traits:
//!
//! * [`UpdateSource`] — yields inbound events. Whether they arrive by webhook
//!   push or long-poll pull is the adapter's business; the core only assumes
//!   per-chat ordering.
//! * [`DeliverySink`] — sends text, documents, and the inline-choice prompt.
//!
//! Both are consumed as `dyn` objects so the service can be wired at runtime
//! without generics spreading through every component.

use crate::error::Img2AnyError;
use async_trait::async_trait;
use std::fmt;

/// Opaque handle identifying where to deliver results.
///
/// The core never interprets the contents; it is a map key and a log field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatRef(pub String);

impl ChatRef {
    pub fn new(id: impl Into<String>) -> Self {
        ChatRef(id.into())
    }
}

impl fmt::Display for ChatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The uploaded document's bytes, either inline or behind a transport URL.
///
/// Chat transports commonly hand over a short-lived file URL rather than the
/// bytes themselves; intake downloads `Remote` payloads with a configured
/// timeout before anything else happens.
#[derive(Debug, Clone)]
pub enum DocumentPayload {
    Bytes(Vec<u8>),
    Remote(String),
}

/// An inbound event from the transport, classified by the router.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// A document was uploaded to a chat.
    DocumentUploaded {
        chat: ChatRef,
        payload: DocumentPayload,
        declared_mime: String,
        /// Transport-provided file identifier, used only for logging.
        file_id: String,
    },
    /// An inline choice was tapped; `payload` is the opaque callback string
    /// that round-tripped through the transport.
    SelectionMade { chat: ChatRef, payload: String },
    /// Free text or a command.
    TextReceived { chat: ChatRef, text: String },
}

impl InboundEvent {
    /// The chat this event belongs to.
    pub fn chat(&self) -> &ChatRef {
        match self {
            InboundEvent::DocumentUploaded { chat, .. } => chat,
            InboundEvent::SelectionMade { chat, .. } => chat,
            InboundEvent::TextReceived { chat, .. } => chat,
        }
    }
}

/// Source of inbound events. Implemented by transport adapters.
#[async_trait]
pub trait UpdateSource: Send {
    /// Yield the next event, or `None` when the source is exhausted
    /// (shutdown). Events for one chat must arrive in order.
    async fn next_event(&mut self) -> Option<InboundEvent>;
}

/// Adapter: any `Stream` of inbound events is an [`UpdateSource`].
///
/// Lets webhook adapters expose their event pipeline as a plain stream
/// (`tokio_stream::wrappers::UnboundedReceiverStream`, a mapped socket
/// stream, …) without hand-writing the trait impl.
pub struct StreamSource<S>(pub S);

#[async_trait]
impl<S> UpdateSource for StreamSource<S>
where
    S: futures::Stream<Item = InboundEvent> + Unpin + Send,
{
    async fn next_event(&mut self) -> Option<InboundEvent> {
        use tokio_stream::StreamExt;
        self.0.next().await
    }
}

/// Outbound delivery channel. Implemented by transport adapters.
///
/// Calls are independent of each other; the orchestrator imposes no ordering
/// across chats and may invoke the sink concurrently from many jobs.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Deliver a converted document.
    async fn send_document(
        &self,
        chat: &ChatRef,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<(), Img2AnyError>;

    /// Send a plain text message.
    async fn send_text(&self, chat: &ChatRef, text: &str) -> Result<(), Img2AnyError>;

    /// Send a prompt with inline choices. Each choice is a
    /// `(label, callback_payload)` pair; the transport returns the payload
    /// verbatim in a later [`InboundEvent::SelectionMade`].
    async fn send_choices(
        &self,
        chat: &ChatRef,
        text: &str,
        choices: &[(String, String)],
    ) -> Result<(), Img2AnyError>;
}
