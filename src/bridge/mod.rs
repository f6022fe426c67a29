//! Event Stream Bridge
//!
//! Converts the event stream of one run into the ordered frame sequence
//! delivered to the client:
//!
//! - non-empty partial text becomes a `{mime_type, data}` frame, immediately
//!   and in order
//! - an error becomes `{error, turn_complete: true}` and ends the stream
//! - otherwise the stream ends with `{turn_complete: true, interrupted: false}`
//!
//! Exactly one terminal frame is produced per run. The next event is only
//! pulled once the previous frame has been taken by the consumer.

pub mod frame;
pub mod request;

pub use frame::{Frame, TEXT_PLAIN};
pub use request::{ClientRequest, ProtocolError};

use crate::orchestration::Event;
use async_stream::stream;
use futures_util::{Stream, StreamExt};
use std::pin::Pin;

/// Type alias for the client frame stream
pub type FrameStream = Pin<Box<dyn Stream<Item = Frame> + Send>>;

/// Bridge a run's events into client frames
pub fn frames<S>(events: S) -> FrameStream
where
    S: Stream<Item = Event> + Send + 'static,
{
    Box::pin(stream! {
        let mut events = Box::pin(events);
        let mut failed = false;

        while let Some(event) = events.next().await {
            if let Some(frame) = Frame::from_event(&event) {
                let terminal = frame.is_terminal();
                yield frame;
                if terminal {
                    failed = true;
                    break;
                }
            }
        }

        if !failed {
            yield Frame::turn_complete();
        }
    })
}
