//! Remote call channel and the per-client call queue.
//!
//! Transport, serialization and reconnects live behind [`RemoteChannel`].
//! The [`CallQueue`] in front of it keeps exactly one call in flight and
//! replays a call once after re-authentication.

use crate::error::{RpcError, RpcErrorKind};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// A backend reachable through named remote calls.
#[async_trait]
pub trait RemoteChannel: Send + Sync {
    /// Invokes `method` with positional `args`.
    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RpcError>;
}

/// Restores an authenticated session after an authorization failure.
#[async_trait]
pub trait Reauthenticator: Send + Sync {
    async fn reauthenticate(&self) -> Result<(), RpcError>;
}

/// Serializes every outbound call of one client.
pub struct CallQueue {
    channel: Arc<dyn RemoteChannel>,
    reauthenticator: Option<Arc<dyn Reauthenticator>>,
    in_flight: Mutex<()>,
}

impl std::fmt::Debug for CallQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallQueue")
            .field("reauthenticates", &self.reauthenticator.is_some())
            .finish()
    }
}

impl CallQueue {
    pub fn new(channel: Arc<dyn RemoteChannel>) -> Self {
        Self {
            channel,
            reauthenticator: None,
            in_flight: Mutex::new(()),
        }
    }

    pub fn with_reauthenticator(mut self, reauthenticator: Arc<dyn Reauthenticator>) -> Self {
        self.reauthenticator = Some(reauthenticator);
        self
    }

    /// Waits for the queue, then performs the call.
    ///
    /// An authorization failure triggers one re-authentication and one
    /// replay of the same call; any other failure is returned as is.
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        let _slot = self.in_flight.lock().await;
        debug!(method, "remote call");

        let err = match self.channel.call(method, args.clone()).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        match (&self.reauthenticator, err.kind()) {
            (Some(reauthenticator), RpcErrorKind::Authorization) => {
                warn!(method, "authorization failed; re-authenticating and replaying");
                reauthenticator.reauthenticate().await?;
                self.channel.call(method, args).await
            }
            _ => {
                debug!(method, code = %err.code, "remote call failed");
                Err(err)
            }
        }
    }
}

/// A scripted channel for testing.
pub mod mock {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// One recorded call.
    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedCall {
        pub method: String,
        pub args: Vec<Value>,
    }

    /// Answers calls from per-method scripts and records every call.
    ///
    /// One-shot responses are consumed first, then the sticky response for
    /// the method, then `null`.
    #[derive(Debug, Default)]
    pub struct MockChannel {
        once: Mutex<HashMap<String, VecDeque<Result<Value, RpcError>>>>,
        sticky: Mutex<HashMap<String, Result<Value, RpcError>>>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl MockChannel {
        pub fn new() -> Self {
            Self::default()
        }

        /// Always answers `method` with `value`.
        pub fn respond(&self, method: &str, value: Value) {
            self.sticky.lock().unwrap().insert(method.to_string(), Ok(value));
        }

        /// Always fails `method` with `error`.
        pub fn fail(&self, method: &str, error: RpcError) {
            self.sticky.lock().unwrap().insert(method.to_string(), Err(error));
        }

        /// Answers the next call to `method` with `value`.
        pub fn respond_once(&self, method: &str, value: Value) {
            self.push_once(method, Ok(value));
        }

        /// Fails the next call to `method` with `error`.
        pub fn fail_once(&self, method: &str, error: RpcError) {
            self.push_once(method, Err(error));
        }

        fn push_once(&self, method: &str, response: Result<Value, RpcError>) {
            self.once
                .lock()
                .unwrap()
                .entry(method.to_string())
                .or_default()
                .push_back(response);
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Argument lists of every call to `method`.
        pub fn calls_to(&self, method: &str) -> Vec<Vec<Value>> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.method == method)
                .map(|c| c.args.clone())
                .collect()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn clear_calls(&self) {
            self.calls.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl RemoteChannel for MockChannel {
        async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RpcError> {
            self.calls.lock().unwrap().push(RecordedCall {
                method: method.to_string(),
                args,
            });
            if let Some(response) = self
                .once
                .lock()
                .unwrap()
                .get_mut(method)
                .and_then(VecDeque::pop_front)
            {
                return response;
            }
            self.sticky
                .lock()
                .unwrap()
                .get(method)
                .cloned()
                .unwrap_or(Ok(Value::Null))
        }
    }

    /// Counts re-authentications and always succeeds.
    #[derive(Debug, Default)]
    pub struct MockReauthenticator {
        count: Mutex<usize>,
    }

    impl MockReauthenticator {
        pub fn count(&self) -> usize {
            *self.count.lock().unwrap()
        }
    }

    #[async_trait]
    impl Reauthenticator for MockReauthenticator {
        async fn reauthenticate(&self) -> Result<(), RpcError> {
            *self.count.lock().unwrap() += 1;
            Ok(())
        }
    }
}
