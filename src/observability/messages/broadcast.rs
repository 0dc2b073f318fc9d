// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the broadcast channel and the TCP publisher.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use tracing::Span;

/// The TCP publisher is accepting subscribers.
///
/// # Log Level
/// `info!` - Important operational event
pub struct PublisherListening<'a> {
    pub topic: &'a str,
    pub address: SocketAddr,
}

impl Display for PublisherListening<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Publishing '{}' on tcp://{}", self.topic, self.address)
    }
}

impl StructuredLog for PublisherListening<'_> {
    fn log(&self) {
        tracing::info!(topic = self.topic, address = %self.address, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("publisher", span_name = name, topic = self.topic, address = %self.address)
    }
}

/// A subscriber attached to the channel.
///
/// # Log Level
/// `info!` - Important operational event
pub struct SubscriberConnected<'a> {
    pub topic: &'a str,
    pub subscriber: u64,
    pub peer: Option<SocketAddr>,
}

impl Display for SubscriberConnected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.peer {
            Some(peer) => write!(f, "Subscriber #{} ({}) connected to '{}'", self.subscriber, peer, self.topic),
            None => write!(f, "Subscriber #{} connected to '{}'", self.subscriber, self.topic),
        }
    }
}

impl StructuredLog for SubscriberConnected<'_> {
    fn log(&self) {
        tracing::info!(
            topic = self.topic,
            subscriber = self.subscriber,
            peer = ?self.peer,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("subscriber", span_name = name, subscriber = self.subscriber)
    }
}

/// A subscriber went away.
///
/// # Log Level
/// `info!` - Important operational event
pub struct SubscriberDisconnected<'a> {
    pub topic: &'a str,
    pub subscriber: u64,
    pub dropped: u64,
}

impl Display for SubscriberDisconnected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Subscriber #{} left '{}' ({} messages dropped while connected)",
            self.subscriber, self.topic, self.dropped
        )
    }
}

impl StructuredLog for SubscriberDisconnected<'_> {
    fn log(&self) {
        tracing::info!(
            topic = self.topic,
            subscriber = self.subscriber,
            dropped = self.dropped,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("subscriber", span_name = name, subscriber = self.subscriber)
    }
}

/// A slow subscriber is losing messages.
///
/// # Log Level
/// `warn!` - Emitted on the first drop and then every 100 drops per subscriber
///
/// # Example
/// ```
/// use xtal_monitor::observability::messages::broadcast::MessagesDropped;
///
/// let msg = MessagesDropped {
///     topic: "view:omdata",
///     subscriber: 2,
///     dropped: 100,
/// };
///
/// assert_eq!(msg.to_string(), "Subscriber #2 on 'view:omdata' is too slow: 100 messages dropped");
/// ```
pub struct MessagesDropped<'a> {
    pub topic: &'a str,
    pub subscriber: u64,
    pub dropped: u64,
}

impl Display for MessagesDropped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Subscriber #{} on '{}' is too slow: {} messages dropped",
            self.subscriber, self.topic, self.dropped
        )
    }
}

impl StructuredLog for MessagesDropped<'_> {
    fn log(&self) {
        tracing::warn!(
            topic = self.topic,
            subscriber = self.subscriber,
            dropped = self.dropped,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("subscriber", span_name = name, subscriber = self.subscriber)
    }
}
