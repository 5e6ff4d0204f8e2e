//! Server-sent event stream for a session's push channel.
//!
//! The first frame is a `: ping` comment. After it the stream carries
//! pushed messages and a `: heartbeat` comment every interval. It ends when
//! the session's transport closes or the stream is replaced; dropping it
//! (client disconnect) drops the heartbeat timer with it.

use axum::response::sse::{Event, Sse};
use futures_util::stream::{self, Stream};
use serde_json::Value;
use std::convert::Infallible;
use std::time::Duration;
use tokio::time::{self, Interval, MissedTickBehavior};

use crate::sessions::PushStream;

struct StreamState {
    push: PushStream,
    heartbeat: Interval,
    greeted: bool,
}

/// Build the SSE response body for an attached push stream.
pub fn event_stream(
    push: PushStream,
    heartbeat_interval: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut heartbeat = time::interval_at(time::Instant::now() + heartbeat_interval, heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let state = StreamState {
        push,
        heartbeat,
        greeted: false,
    };

    Sse::new(stream::unfold(state, |mut state| async move {
        if !state.greeted {
            state.greeted = true;
            return Some((Ok(Event::default().comment("ping")), state));
        }
        if *state.push.closed.borrow() {
            return None;
        }

        let next = tokio::select! {
            message = state.push.messages.recv() => message.map(message_event),
            _ = state.heartbeat.tick() => Some(Event::default().comment("heartbeat")),
            _ = state.push.closed.changed() => None,
        };
        match next {
            Some(event) => Some((Ok(event), state)),
            None => {
                tracing::debug!("Push stream ended");
                None
            }
        }
    }))
}

fn message_event(message: Value) -> Event {
    Event::default().event("message").data(message.to_string())
}
