//! # Chime Core
//!
//! Core types shared by every layer of the Chime rule-dispatch engine.
//!
//! - **Messages**: the raw [`InboundMessage`] and the per-turn [`Message`]
//!   handle that rules match against and handlers mutate
//! - **Replies**: the [`Reply`] value and the [`IntoReply`] conversion for
//!   handler return values
//! - **Sessions**: per-conversation [`Session`] state with its embedded
//!   [`WaitState`]
//! - **Stores**: the [`SessionStore`] persistence boundary and the
//!   in-memory [`MemoryStore`]
//!
//! Matching, execution and dispatch live in `chime-framework`.

pub mod error;
pub mod message;
pub mod reply;
pub mod session;
pub mod store;

pub use error::{HandlerError, HandlerResult, ReplyError, StoreError, StoreResult};
pub use message::{InboundMessage, Message, MessageKind, Params};
pub use reply::{IntoReply, Reply};
pub use session::{Session, WaitState};
pub use store::{MemoryStore, SessionStore};

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        HandlerError, InboundMessage, IntoReply, Message, MessageKind, Reply, Session,
        SessionStore,
    };
}
