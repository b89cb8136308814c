//! Redis pub/sub as a [`MessageSource`].
//!
//! The connection is opened lazily in [`MessageSource::subscribe`] so that an
//! unreachable server shows up as a subscription failure of the ingest loop
//! rather than a startup error. A dedicated client is used because a RESP2
//! connection in subscribe mode cannot run other commands.

use fred::prelude::*;
use fred::types::Message;
use fred::types::config::Server;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use traffic_core::{MessageSource, SourceError};

use crate::error::DbError;

/// Subscriber for a single Redis pub/sub channel.
pub struct RedisSource {
    url: String,
    channel: String,
    subscription: Option<Subscription>,
}

/// A confirmed subscription and the receivers it is read through.
struct Subscription {
    // Owns the connection task.
    _client: Client,
    messages: Receiver<Message>,
    errors: Receiver<(fred::error::Error, Option<Server>)>,
}

impl RedisSource {
    /// Prepare a subscriber for `channel` on the server at `url`.
    ///
    /// Nothing is connected until [`MessageSource::subscribe`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    pub fn new(url: &str, channel: &str) -> Result<Self, DbError> {
        crate::redis_config(url)?;
        Ok(Self {
            url: url.to_owned(),
            channel: channel.to_owned(),
            subscription: None,
        })
    }

    /// True once the subscription has been confirmed and not yet lost.
    pub const fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    fn subscribe_error(&self, e: &DbError) -> SourceError {
        SourceError::Subscribe {
            channel: self.channel.clone(),
            message: e.to_string(),
        }
    }
}

impl MessageSource for RedisSource {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn subscribe(&mut self) -> Result<(), SourceError> {
        let client = crate::connect(&self.url)
            .await
            .map_err(|e| self.subscribe_error(&e))?;

        // Take the receivers before subscribing so no early message is missed.
        let messages = client.message_rx();
        let errors = client.error_rx();
        let subscribed: Result<(), fred::error::Error> =
            client.subscribe(self.channel.as_str()).await;
        subscribed.map_err(|e| self.subscribe_error(&DbError::Redis(e)))?;

        self.subscription = Some(Subscription {
            _client: client,
            messages,
            errors,
        });
        Ok(())
    }

    /// The next payload on the channel.
    ///
    /// Returns `None` once the connection is lost. The client has no
    /// reconnect policy, so a lost connection ends the subscription.
    async fn next_message(&mut self) -> Option<String> {
        let subscription = self.subscription.as_mut()?;

        let reason = loop {
            tokio::select! {
                biased;
                received = subscription.messages.recv() => match received {
                    Ok(message) => {
                        if &*message.channel != self.channel.as_str() {
                            continue;
                        }
                        match message.value.as_string() {
                            Some(payload) => return Some(payload),
                            None => debug!(channel = self.channel, "Skipping non-text payload"),
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            channel = self.channel,
                            skipped,
                            "Subscriber lagged, messages dropped"
                        );
                    }
                    Err(RecvError::Closed) => break String::from("message stream closed"),
                },
                failure = subscription.errors.recv() => match failure {
                    Ok((error, _)) => break error.to_string(),
                    Err(RecvError::Lagged(_)) => break String::from("connection errors dropped"),
                    Err(RecvError::Closed) => break String::from("error stream closed"),
                },
            }
        };

        warn!(channel = self.channel, reason, "Subscription lost");
        self.subscription = None;
        None
    }
}
