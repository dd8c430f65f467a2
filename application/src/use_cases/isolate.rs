//! Error Isolator
//!
//! Wraps one channel's backend call so that whatever happens inside it
//! (gateway error, decode failure, timeout, even a panic) reaches the
//! coordinator as exactly one terminal event for that channel and nothing
//! else. Sibling channels never observe it.

use super::dispatch::{ChannelEvent, EventSink};
use crate::ports::backend_gateway::GatewayError;
use crate::streaming::ChannelEnd;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use thinking_domain::{ChannelErrorKind, ChannelId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Map a gateway failure to the per-channel error taxonomy.
pub fn classify(error: &GatewayError) -> ChannelErrorKind {
    match error {
        GatewayError::CredentialMissing(_) => ChannelErrorKind::CredentialMissing,
        GatewayError::Http { .. } | GatewayError::Connection(_) | GatewayError::Timeout => {
            ChannelErrorKind::NetworkFailure
        }
        GatewayError::InvalidResponse(_) | GatewayError::Other(_) => ChannelErrorKind::Backend,
    }
}

pub fn failure(error: &GatewayError) -> ChannelEnd {
    ChannelEnd::Failed {
        kind: classify(error),
        message: error.to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "channel task panicked".to_string()
    }
}

/// Run `call` to completion and report how it ended.
///
/// If `cancel` fires first the call is dropped and nothing is reported.
pub async fn isolate<F>(channel: ChannelId, sink: EventSink, cancel: CancellationToken, call: F)
where
    F: Future<Output = Result<ChannelEnd, GatewayError>> + Send,
{
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(channel = %channel, "Channel call abandoned by cancellation");
            return;
        }
        result = AssertUnwindSafe(call).catch_unwind() => result,
    };

    let end = match result {
        Ok(Ok(end)) => end,
        Ok(Err(e)) => {
            warn!(channel = %channel, error = %e, "Channel failed");
            failure(&e)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(channel = %channel, %message, "Channel task panicked");
            ChannelEnd::Failed {
                kind: ChannelErrorKind::Internal,
                message,
            }
        }
    };
    sink.send(ChannelEvent::end(channel, end));
}
