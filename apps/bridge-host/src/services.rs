//! Services the host exposes to the document.
//!
//! `HostInfo` covers each call shape: value, streamed, cancellable, and one event.

use bridge_core::RpcError;
use bridge_core::bridge::{
    BridgeContract, BridgeEvent, ContractInfo, EventDescriptor, EventSource, MethodDescriptor,
    ParamDescriptor, ReturnShape, ServiceDescriptor,
};
use bridge_core::rpc::{Reply, StreamEnumerator};

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use log::debug;
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Upper bound for `countTo`, so one call cannot park an unbounded sequence.
pub const MAX_COUNT: u32 = 10_000;

/// Upper bound for `delayedEcho`.
pub const MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostStatus {
    pub name: &'static str,
    pub version: &'static str,
    pub uptime_ms: u64,
}

pub trait HostInfo: Send + Sync {
    fn ping(&self) -> &'static str;

    fn status(&self) -> HostStatus;

    fn echo(&self, message: String) -> String;

    /// `1..=limit`, served lazily to the document.
    fn count_to(&self, limit: u32) -> Result<Vec<u32>, RpcError>;

    /// Echo after `delay`, or fail with Cancelled when the document gives up first.
    fn delayed_echo(
        &self,
        message: String,
        delay: Duration,
        cancellation: CancellationToken,
    ) -> BoxFuture<'_, Result<String, RpcError>>;

    /// Raised with the uptime in seconds.
    fn heartbeat(&self) -> &BridgeEvent<u64>;
}

fn heartbeat_event<'a>(service: &'a (dyn HostInfo + 'static)) -> &'a dyn EventSource {
    service.heartbeat()
}

impl BridgeContract for dyn HostInfo {
    fn contract() -> ContractInfo {
        ContractInfo::exported("IHostInfo")
    }

    fn descriptor() -> Option<ServiceDescriptor<Self>> {
        let ping = MethodDescriptor::new(
            "ping",
            ReturnShape::Value,
            |service: Arc<dyn HostInfo>, _args, _| async move { Reply::value(service.ping()) },
        );

        let status = MethodDescriptor::new(
            "status",
            ReturnShape::Value,
            |service: Arc<dyn HostInfo>, _args, _| async move { Reply::value(service.status()) },
        );

        let echo = MethodDescriptor::new(
            "echo",
            ReturnShape::Value,
            |service: Arc<dyn HostInfo>, args, _| async move {
                let message: String = args.get(0)?;
                Reply::value(service.echo(message))
            },
        )
        .param(ParamDescriptor::of::<String>("message"));

        let count_to = MethodDescriptor::new(
            "count_to",
            ReturnShape::Stream,
            |service: Arc<dyn HostInfo>, args, _| async move {
                let limit: u32 = args.get(0)?;
                let values = service.count_to(limit)?;
                Ok(Reply::stream(StreamEnumerator::from_values(values)?))
            },
        )
        .param(ParamDescriptor::of::<u32>("limit").with_default(json!(10)));

        let delayed_echo = MethodDescriptor::new(
            "delayed_echo",
            ReturnShape::Value,
            |service: Arc<dyn HostInfo>, args, cancellation| async move {
                let message: String = args.get(0)?;
                let delay_ms: u64 = args.get(1)?;
                let echoed = service
                    .delayed_echo(message, Duration::from_millis(delay_ms), cancellation)
                    .await?;
                Reply::value(echoed)
            },
        )
        .param(ParamDescriptor::of::<String>("message"))
        .param(ParamDescriptor::of::<u64>("delay_ms").with_default(json!(1000)))
        .param(ParamDescriptor::cancellation("cancellation"));

        Some(
            ServiceDescriptor::new()
                .method(ping)
                .method(status)
                .method(echo)
                .method(count_to)
                .method(delayed_echo)
                .event(EventDescriptor::new("heartbeat", heartbeat_event)),
        )
    }
}

/// The host's own [`HostInfo`].
pub struct LocalHostInfo {
    started: Instant,
    heartbeat: BridgeEvent<u64>,
}

impl LocalHostInfo {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            heartbeat: BridgeEvent::new(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for LocalHostInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl HostInfo for LocalHostInfo {
    fn ping(&self) -> &'static str {
        "pong"
    }

    fn status(&self) -> HostStatus {
        HostStatus {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            uptime_ms: u64::try_from(self.uptime().as_millis()).unwrap_or(u64::MAX),
        }
    }

    fn echo(&self, message: String) -> String {
        message
    }

    fn count_to(&self, limit: u32) -> Result<Vec<u32>, RpcError> {
        if limit > MAX_COUNT {
            return Err(RpcError::invalid_request(format!(
                "limit {limit} exceeds {MAX_COUNT}"
            )));
        }
        Ok((1..=limit).collect())
    }

    fn delayed_echo(
        &self,
        message: String,
        delay: Duration,
        cancellation: CancellationToken,
    ) -> BoxFuture<'_, Result<String, RpcError>> {
        async move {
            let delay = delay.min(MAX_DELAY);
            tokio::select! {
                _ = tokio::time::sleep(delay) => Ok(message),
                _ = cancellation.cancelled() => {
                    debug!("delayedEcho cancelled before {:?} elapsed", delay);
                    Err(RpcError::cancelled())
                }
            }
        }
        .boxed()
    }

    fn heartbeat(&self) -> &BridgeEvent<u64> {
        &self.heartbeat
    }
}
