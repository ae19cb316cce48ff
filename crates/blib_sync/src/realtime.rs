//! Websocket transport for the live change stream.
//!
//! One worker task per subscription: connect, join the channel, forward
//! change events, heartbeat, and reconnect with jittered exponential backoff
//! until the subscription is released.

use crate::{
    config::SyncConfig,
    protocol::{ChannelEvent, PhoenixMessage},
    store::{PushEvent, Status, Subscription},
};
use blib_common::{sanitizer::sanitize, OwnerId};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

/// Exponential backoff with up to 50% random jitter
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            current: min,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = (self.current * 2).min(self.max);
        let jitter_ms = base.as_millis() as u64 / 2;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        base + Duration::from_millis(jitter)
    }

    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

/// Why a connection ended
enum ConnectionEnd {
    /// Released by the subscriber
    Stopped,
    /// Lost; worth reconnecting
    Dropped(String),
}

struct RealtimeWorker {
    url: Url,
    topic: String,
    table: String,
    owner: OwnerId,
    access_token: String,
    heartbeat: Duration,
    backoff: Backoff,
    events: mpsc::Sender<PushEvent>,
    next_ref: u64,
}

/// Start a worker for `owner` and hand back its subscription
pub fn subscribe(config: &SyncConfig, owner: &OwnerId) -> crate::Result<Subscription> {
    if !config.realtime_enabled {
        tracing::info!("Realtime disabled, live updates off");
        return Ok(Subscription::idle(Status::Disconnected));
    }

    let (events, rx) = mpsc::channel(config.event_buffer.max(1));
    let (stop_tx, stop_rx) = oneshot::channel();

    let worker = RealtimeWorker {
        url: config.realtime_endpoint()?,
        topic: format!("realtime:{}", config.channel),
        table: config.table.clone(),
        owner: owner.clone(),
        access_token: config.bearer().to_string(),
        heartbeat: config.heartbeat_interval,
        backoff: Backoff::new(config.reconnect_min, config.reconnect_max),
        events,
        next_ref: 0,
    };
    tokio::spawn(worker.run(stop_rx));

    Ok(Subscription::new(rx, move || {
        let _ = stop_tx.send(());
    }))
}

impl RealtimeWorker {
    fn next_ref(&mut self) -> String {
        self.next_ref += 1;
        self.next_ref.to_string()
    }

    /// Forward an event; false once nobody is listening
    async fn emit(&self, event: PushEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    async fn run(mut self, mut stop: oneshot::Receiver<()>) {
        loop {
            if !self.emit(PushEvent::Status(Status::Connecting)).await {
                return;
            }

            let reason = match self.connection(&mut stop).await {
                Ok(ConnectionEnd::Stopped) => {
                    tracing::debug!(topic = %self.topic, "Realtime subscription released");
                    return;
                }
                Ok(ConnectionEnd::Dropped(reason)) => reason,
                Err(e) => e.to_string(),
            };

            tracing::warn!(reason = %sanitize(&reason), "Realtime connection lost");
            if !self.emit(PushEvent::Status(Status::Disconnected)).await {
                return;
            }

            let delay = self.backoff.next_delay();
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Reconnecting");
            tokio::select! {
                _ = &mut stop => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn connection(&mut self, stop: &mut oneshot::Receiver<()>) -> crate::Result<ConnectionEnd> {
        tracing::info!(url = %sanitize(self.url.as_str()), "Connecting to realtime");
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;
        let (mut sink, mut stream) = ws_stream.split();

        let join_ref = self.next_ref();
        let join = PhoenixMessage::join(
            &self.topic,
            &self.table,
            &self.owner,
            &self.access_token,
            &join_ref,
        );
        sink.send(Message::Text(join.to_text()?)).await?;

        let mut heartbeat = tokio::time::interval(self.heartbeat);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = &mut *stop => {
                    let leave_ref = self.next_ref();
                    let leave = PhoenixMessage::leave(&self.topic, &leave_ref);
                    let _ = sink.send(Message::Text(leave.to_text()?)).await;
                    let _ = sink.close().await;
                    return Ok(ConnectionEnd::Stopped);
                }
                _ = heartbeat.tick() => {
                    let beat = PhoenixMessage::heartbeat(&self.next_ref());
                    sink.send(Message::Text(beat.to_text()?)).await?;
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(end) = self.handle_frame(&text, &join_ref).await {
                            return Ok(end);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return Ok(ConnectionEnd::Dropped("socket closed".to_string()));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                }
            }
        }
    }

    /// Returns `Some` when the connection should end
    async fn handle_frame(&mut self, text: &str, join_ref: &str) -> Option<ConnectionEnd> {
        let event = match PhoenixMessage::from_text(text).and_then(|m| m.classify(join_ref)) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed realtime frame");
                return None;
            }
        };

        match event {
            ChannelEvent::JoinOk => {
                tracing::info!(topic = %self.topic, "Realtime channel joined");
                self.backoff.reset();
                if !self.emit(PushEvent::Status(Status::Connected)).await {
                    return Some(ConnectionEnd::Stopped);
                }
            }
            ChannelEvent::Push(push) => {
                if !self.emit(push).await {
                    return Some(ConnectionEnd::Stopped);
                }
            }
            ChannelEvent::JoinError(reason) | ChannelEvent::Closed(reason) => {
                return Some(ConnectionEnd::Dropped(reason));
            }
            ChannelEvent::Ignored => {}
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(400));

        let first = backoff.next_delay();
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(150));

        let second = backoff.next_delay();
        assert!(second >= Duration::from_millis(200) && second <= Duration::from_millis(300));

        backoff.next_delay();
        let capped = backoff.next_delay();
        assert!(capped >= Duration::from_millis(400) && capped <= Duration::from_millis(600));

        backoff.reset();
        assert!(backoff.next_delay() <= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_disabled_realtime_is_idle() {
        let config = SyncConfig {
            realtime_enabled: false,
            ..Default::default()
        };
        let mut subscription = subscribe(&config, &OwnerId::new("u1")).unwrap();
        assert_eq!(
            subscription.next().await,
            Some(PushEvent::Status(Status::Disconnected))
        );
    }
}
