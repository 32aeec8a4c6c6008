//! Server-side lazy sequences served under opaque tokens.
//!
//! A handler returning [`Reply::Stream`](crate::rpc::Reply::Stream) gets its
//! enumerator parked here; the document then pulls one value at a time with
//! `$/enumerator/next/<token>` until `finished: true`.

use crate::error::RpcError;

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use futures_util::stream::{self, BoxStream};
use futures_util::{FutureExt, Stream, StreamExt};
use log::{debug, warn};
use serde_json::{Value, json};
use tokio::sync::Mutex;

/// A finite, non-restartable sequence of values.
pub trait Enumerator: Send {
    /// Next value, or `None` once exhausted.
    fn move_next(&mut self) -> BoxFuture<'_, Result<Option<Value>, RpcError>>;

    /// Release resources. Called exactly once when the sequence finishes or
    /// is aborted.
    fn dispose(&mut self) -> BoxFuture<'_, Result<(), RpcError>> {
        async { Ok(()) }.boxed()
    }
}

type DisposeHook = Box<dyn FnOnce() -> Result<(), RpcError> + Send>;

/// Adapts any `Stream` of values into an [`Enumerator`].
pub struct StreamEnumerator {
    stream: BoxStream<'static, Result<Value, RpcError>>,
    on_dispose: Option<DisposeHook>,
}

impl StreamEnumerator {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Value, RpcError>> + Send + 'static,
    {
        Self {
            stream: stream.boxed(),
            on_dispose: None,
        }
    }

    /// Enumerate an in-memory sequence of serializable items.
    pub fn from_values<I, T>(items: I) -> Result<Self, RpcError>
    where
        I: IntoIterator<Item = T>,
        T: serde::Serialize,
    {
        let values = items
            .into_iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(stream::iter(values.into_iter().map(Ok))))
    }

    /// Run `hook` when the sequence is disposed.
    pub fn on_dispose<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() -> Result<(), RpcError> + Send + 'static,
    {
        self.on_dispose = Some(Box::new(hook));
        self
    }
}

impl Enumerator for StreamEnumerator {
    fn move_next(&mut self) -> BoxFuture<'_, Result<Option<Value>, RpcError>> {
        async move { self.stream.next().await.transpose() }.boxed()
    }

    fn dispose(&mut self) -> BoxFuture<'_, Result<(), RpcError>> {
        async move {
            self.stream = stream::empty().boxed();
            match self.on_dispose.take() {
                Some(hook) => hook(),
                None => Ok(()),
            }
        }
        .boxed()
    }
}

type SharedEnumerator = Arc<Mutex<Box<dyn Enumerator>>>;

/// Active enumerators keyed by token.
#[derive(Default)]
pub struct EnumeratorRegistry {
    active: DashMap<String, SharedEnumerator>,
}

impl EnumeratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `enumerator` and return its token.
    pub fn register(&self, enumerator: Box<dyn Enumerator>) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        self.active
            .insert(token.clone(), Arc::new(Mutex::new(enumerator)));
        debug!("Enumerator {} registered", token);
        token
    }

    /// Pull one value: `{"values": [v] | [], "finished": bool}`.
    ///
    /// Exhaustion disposes and removes the entry. Unknown tokens answer
    /// `finished: true`. A failing `move_next` disposes the entry and
    /// surfaces the error to the caller.
    pub async fn next(&self, token: &str) -> Result<Value, RpcError> {
        // Clone out of the map so no shard lock is held across the await.
        let Some(enumerator) = self.active.get(token).map(|e| Arc::clone(e.value())) else {
            return Ok(finished());
        };

        let step = enumerator.lock().await.move_next().await;
        match step {
            Ok(Some(value)) => Ok(json!({ "values": [value], "finished": false })),
            Ok(None) => {
                self.dispose(token).await;
                Ok(finished())
            }
            Err(error) => {
                self.dispose(token).await;
                Err(error)
            }
        }
    }

    /// Dispose early. Unknown tokens are ignored.
    pub async fn abort(&self, token: &str) {
        debug!("Enumerator {} aborted", token);
        self.dispose(token).await;
    }

    pub async fn abort_all(&self) {
        let tokens: Vec<String> = self.active.iter().map(|e| e.key().clone()).collect();
        for token in tokens {
            self.dispose(&token).await;
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.active.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    async fn dispose(&self, token: &str) {
        // Removal decides who disposes, so dispose runs at most once.
        let Some((_, enumerator)) = self.active.remove(token) else {
            return;
        };
        if let Err(error) = enumerator.lock().await.dispose().await {
            warn!("Failed to dispose enumerator {}: {}", token, error);
        }
    }
}

fn finished() -> Value {
    json!({ "values": [], "finished": true })
}
