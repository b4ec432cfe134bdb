//! Agent stdout reader task.
//!
//! Drives a [`FramedRead`] over the agent's stdout with [`WireDecoder`] and
//! publishes what it decodes on the [`EventBus`]:
//!
//! | Decoded item            | Published on          |
//! |-------------------------|-----------------------|
//! | [`Inbound::Event`]      | [`Channel::Response`] |
//! | [`Inbound::Rejected`]   | [`Channel::Error`], as a synthetic `error` event |
//!
//! Invalid JSON never reaches the bus; the decoder logs and drops it.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bus::{Channel, EventBus};
use crate::protocol::Event;
use crate::wire::codec::{Inbound, WireDecoder};

/// Read `stdout` until EOF, an I/O error, or cancellation.
///
/// Events are published in the order their bytes were read.
pub async fn run_stdout_reader<R>(stdout: R, bus: Arc<EventBus>, cancel: CancellationToken)
where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(stdout, WireDecoder::new());

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("stdout reader: cancellation received, stopping");
                break;
            }

            item = framed.next() => {
                match item {
                    None => {
                        debug!("stdout reader: EOF detected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "stdout reader: IO error, stopping");
                        break;
                    }
                    Some(Ok(Inbound::Event(event))) => {
                        debug!(id = %event.id, kind = %event.kind(), "agent event");
                        bus.publish(Channel::Response, &event);
                    }
                    Some(Ok(Inbound::Rejected { raw, reason })) => {
                        warn!(%reason, %raw, "stdout reader: protocol violation");
                        bus.publish(
                            Channel::Error,
                            &Event::synthetic_error(format!("{reason}: {raw}")),
                        );
                    }
                }
            }
        }
    }
}
