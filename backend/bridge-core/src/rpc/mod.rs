//! JSON-RPC 2.0 over a string channel between the host and a web document.
//!
//! - [`envelope`]: wire format and classification of inbound items
//! - [`engine`]: correlation of outbound calls, dispatch of inbound ones, batches
//! - [`cancellation`]: `$/cancelRequest` support for in-flight handlers
//! - [`enumerator`]: `$/enumerator/next/<token>` streaming
//! - [`channel`]: the [`DocumentChannel`] seam transports implement
//! - [`document`]: the runtime script the document needs

pub mod cancellation;
pub mod channel;
pub mod document;
pub mod engine;
pub mod enumerator;
pub mod envelope;
pub mod handler;

pub use channel::{DocumentChannel, OutboundMessage};
pub use engine::{DEFAULT_CALL_TIMEOUT, RpcEngine, WeakRpcEngine};
pub use enumerator::{Enumerator, StreamEnumerator};
pub use envelope::{Envelope, RequestId};
pub use handler::{CallContext, Handler, HandlerTarget, Reply, handler};
