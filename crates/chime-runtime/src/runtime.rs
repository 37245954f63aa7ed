//! Session-backed turn driver.
//!
//! [`ChimeRuntime`] glues a [`Dispatcher`] to a [`SessionStore`]: it loads
//! the session for the conversation, runs the turn and persists whatever
//! the turn left behind.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use chime_runtime::ChimeRuntime;
//!
//! let runtime = ChimeRuntime::new();
//! runtime.dispatcher().set(("hello", "world"))?;
//!
//! let outcome = runtime.handle(InboundMessage::text("u1", "hello")).await;
//! assert_eq!(outcome.reply_text().as_deref(), Some("world"));
//! ```
//!
//! From configuration:
//!
//! ```rust,ignore
//! let config = load_config()?;
//! let runtime = ChimeRuntime::from_config(&config)?;
//! ```

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use serde_json::Value;
use tower::Service;
use tracing::{debug, error, info};

use crate::config::{ChimeConfig, load_config};
use crate::error::RuntimeResult;
use chime_core::{InboundMessage, MemoryStore, Session, SessionStore};
use chime_framework::{Dispatcher, Outcome};

/// A dispatcher bound to a session store.
///
/// Cloning is cheap; clones share the dispatcher and the store.
#[derive(Clone)]
pub struct ChimeRuntime {
    dispatcher: Arc<Dispatcher>,
    store: Arc<dyn SessionStore>,
}

impl Default for ChimeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChimeRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChimeRuntime")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl ChimeRuntime {
    /// Creates a runtime with a default dispatcher and an in-memory store.
    pub fn new() -> Self {
        Self::with_store(Dispatcher::new(), MemoryStore::new())
    }

    /// Creates a runtime from a dispatcher and a store.
    pub fn with_store(dispatcher: impl Into<Arc<Dispatcher>>, store: impl SessionStore) -> Self {
        Self {
            dispatcher: dispatcher.into(),
            store: Arc::new(store),
        }
    }

    /// Creates a runtime sharing an existing store.
    pub fn with_shared_store(
        dispatcher: impl Into<Arc<Dispatcher>>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            dispatcher: dispatcher.into(),
            store,
        }
    }

    /// Creates a runtime from a loaded configuration.
    ///
    /// Applies the engine settings and loads every dialog file in order.
    pub fn from_config(config: &ChimeConfig) -> RuntimeResult<Self> {
        let dispatcher = Dispatcher::with_config(config.engine.to_dispatcher_config());
        for path in &config.dialogs {
            let count = dispatcher.dialog_file(path)?;
            info!(path = %path.display(), rules = count, "Dialog file loaded");
        }
        Ok(Self::with_store(dispatcher, MemoryStore::new()))
    }

    /// Loads the configuration from the default locations and builds a
    /// runtime from it.
    pub fn load() -> RuntimeResult<Self> {
        let config = load_config()?;
        Self::from_config(&config)
    }

    /// Returns the dispatcher, for registering rules.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Returns an owned handle to the dispatcher.
    ///
    /// Handlers that need the engine mid-turn hold a [`Weak`](std::sync::Weak)
    /// downgraded from this handle, since the dispatcher owns them.
    pub fn shared_dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Returns the session store.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Runs one turn for `inbound`.
    ///
    /// Store failures never fail the turn. A session that cannot be loaded
    /// is replaced by an empty one and is not written back, so stored state
    /// is left untouched.
    pub async fn handle(&self, inbound: InboundMessage) -> Outcome {
        let uid = inbound.uid.clone();
        let (session, loaded) = match self.store.get(&uid).await {
            Ok(session) => (session, true),
            Err(e) => {
                error!(uid = %uid, error = %e, "Failed to load session, using an empty one");
                (Session::new(), false)
            }
        };

        let outcome = self.dispatcher.reply(inbound, session).await;

        if loaded {
            if let Err(e) = self.store.set(&uid, &outcome.session()).await {
                error!(uid = %uid, error = %e, "Failed to save session");
            }
        } else {
            debug!(uid = %uid, "Skipping save of unloaded session");
        }

        outcome
    }

    /// Parses a raw JSON payload and runs one turn for it.
    pub async fn handle_json(&self, payload: Value) -> RuntimeResult<Outcome> {
        let inbound: InboundMessage = serde_json::from_value(payload)?;
        Ok(self.handle(inbound).await)
    }

    /// Removes all stored state for conversation `uid`.
    pub async fn destroy_session(&self, uid: &str) -> RuntimeResult<()> {
        self.store.destroy(uid).await?;
        debug!(uid = %uid, "Session destroyed");
        Ok(())
    }
}

impl Service<InboundMessage> for ChimeRuntime {
    type Response = Outcome;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Outcome, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, inbound: InboundMessage) -> Self::Future {
        let runtime = self.clone();
        Box::pin(async move { Ok(runtime.handle(inbound).await) })
    }
}
