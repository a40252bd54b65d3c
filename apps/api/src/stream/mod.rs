//! Stream transport shared by the server producer and the client consumer.

pub mod events;

use bytes::Bytes;
use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures::{future, stream, Stream, StreamExt};

pub use events::StreamEvent;

/// Parses a `text/event-stream` body into SSE events.
///
/// The body is closed with a blank line so a last event without its trailing
/// separator is still dispatched when the connection ends. Events with no data
/// are dropped.
pub fn sse_events<S, E>(body: S) -> impl Stream<Item = Result<Event, EventStreamError<E>>>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    body.chain(stream::once(future::ready(Ok(Bytes::from_static(b"\n\n")))))
        .eventsource()
        .filter(|event| future::ready(!matches!(event, Ok(event) if event.data.is_empty())))
}

/// Turns a raw `text/event-stream` body into ordered [`StreamEvent`]s.
///
/// Frames whose payload is not an event object are skipped. The first error
/// is passed through and ends the stream.
pub fn decode_events<S, E>(
    body: S,
) -> impl Stream<Item = Result<StreamEvent, EventStreamError<E>>>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    async_stream::stream! {
        let events = sse_events(body);
        futures::pin_mut!(events);

        while let Some(event) = events.next().await {
            match event {
                Ok(event) => match StreamEvent::from_frame_payload(&event.data) {
                    Some(event) => yield Ok(event),
                    None => tracing::debug!("Skipping non-event frame: {}", event.data),
                },
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
    }
}
