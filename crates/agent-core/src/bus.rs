// Copyright (c) 2024-2026 The Agent Loop Contributors
//
// SPDX-License-Identifier: Apache-2.0
use tokio::sync::mpsc;

use crate::events::AgentEvent;

const DEFAULT_EVENT_CAPACITY: usize = 256;
const DEFAULT_INPUT_CAPACITY: usize = 32;

/// A response to a previously-issued `ApprovalRequested` event.
#[derive(Debug, Clone)]
pub struct ApprovalResponse {
    pub approval_id: String,
    pub approved: bool,
}

/// A request from the host to cancel a specific in-flight tool execution.
#[derive(Debug, Clone)]
pub struct CancellationRequest {
    pub call_id: String,
}

/// The single-producer, single-consumer channel the loop publishes
/// [`AgentEvent`]s on, plus the four host-to-loop input channels (user
/// input, approval responses, cancellation requests, shutdown).
///
/// The event channel has bounded capacity: [`EventBus::publish`] awaits
/// the send, so a host that falls behind genuinely applies back-pressure
/// to the loop instead of silently dropping events. The one exception is
/// [`EventPublisher`], a cloneable handle used from contexts (a
/// synchronous per-line callback) that cannot `.await`; it sends
/// best-effort via `try_send` and drops the event if the channel is full.
pub struct EventBus {
    events_tx: mpsc::Sender<AgentEvent>,
    events_rx: Option<mpsc::Receiver<AgentEvent>>,
    user_input_tx: mpsc::Sender<String>,
    user_input_rx: mpsc::Receiver<String>,
    approval_tx: mpsc::Sender<ApprovalResponse>,
    approval_rx: mpsc::Receiver<ApprovalResponse>,
    cancel_tx: mpsc::Sender<CancellationRequest>,
    cancel_rx: mpsc::Receiver<CancellationRequest>,
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY, DEFAULT_INPUT_CAPACITY)
    }

    pub fn with_capacity(event_capacity: usize, input_capacity: usize) -> Self {
        let (events_tx, events_rx) = mpsc::channel(event_capacity);
        let (user_input_tx, user_input_rx) = mpsc::channel(input_capacity);
        let (approval_tx, approval_rx) = mpsc::channel(input_capacity);
        let (cancel_tx, cancel_rx) = mpsc::channel(input_capacity);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        Self {
            events_tx,
            events_rx: Some(events_rx),
            user_input_tx,
            user_input_rx,
            approval_tx,
            approval_rx,
            cancel_tx,
            cancel_rx,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Publish an event, awaiting room in the channel if the consumer is
    /// behind. Returns `false` if the consumer has been dropped (the host
    /// is gone) rather than erroring — a loop mid-turn has no one left to
    /// report to, but should still be able to finish its own bookkeeping.
    pub async fn publish(&self, event: AgentEvent) -> bool {
        self.events_tx.send(event).await.is_ok()
    }

    /// Drain the next published event. Panics if the receiver has already
    /// been handed off via [`EventBus::take_event_receiver`] — a bus only
    /// has one consumer at a time.
    pub async fn next_event(&mut self) -> Option<AgentEvent> {
        self.events_rx
            .as_mut()
            .expect("event receiver already taken via take_event_receiver")
            .recv()
            .await
    }

    /// Take ownership of the event receiver. Used when the bus itself must
    /// be moved into the task driving the loop (e.g. a spawned turn) while
    /// something else needs to keep draining events concurrently.
    pub fn take_event_receiver(&mut self) -> mpsc::Receiver<AgentEvent> {
        self.events_rx
            .take()
            .expect("event receiver already taken")
    }

    /// A cheap, cloneable, publish-only handle. Used where a closure needs
    /// to emit events (e.g. a streaming tool's per-line callback) without
    /// borrowing the whole bus, which would conflict with the bus's own
    /// `&mut self` input methods being polled concurrently in the same
    /// `select!`, and without requiring an `.await` the closure can't make.
    pub fn publisher(&self) -> EventPublisher {
        EventPublisher {
            tx: self.events_tx.clone(),
        }
    }

    /// A clone of the raw event sender, for a host that wants genuine
    /// blocking back-pressure (an `.await`-capable context) rather than
    /// [`EventPublisher`]'s best-effort `try_send`.
    pub fn event_sender(&self) -> mpsc::Sender<AgentEvent> {
        self.events_tx.clone()
    }

    /// Handle used by a host to send user input (e.g. a `converse` reply).
    pub fn user_input_sender(&self) -> mpsc::Sender<String> {
        self.user_input_tx.clone()
    }

    /// Handle used by a host to answer a pending approval request.
    pub fn approval_sender(&self) -> mpsc::Sender<ApprovalResponse> {
        self.approval_tx.clone()
    }

    /// Handle used by a host to cancel an in-flight streaming tool.
    pub fn cancellation_sender(&self) -> mpsc::Sender<CancellationRequest> {
        self.cancel_tx.clone()
    }

    /// Handle used by a host to request the loop shut down at the next
    /// safe point.
    pub fn shutdown_sender(&self) -> mpsc::Sender<()> {
        self.shutdown_tx.clone()
    }

    pub async fn next_user_input(&mut self) -> Option<String> {
        self.user_input_rx.recv().await
    }

    pub async fn next_approval_response(&mut self) -> Option<ApprovalResponse> {
        self.approval_rx.recv().await
    }

    pub async fn next_cancellation_request(&mut self) -> Option<CancellationRequest> {
        self.cancel_rx.recv().await
    }

    /// Non-blocking check for a pending shutdown request, polled by the
    /// Iteration Controller between iterations.
    pub fn shutdown_requested(&mut self) -> bool {
        self.shutdown_rx.try_recv().is_ok()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A cloneable, publish-only view onto an [`EventBus`]'s event channel.
#[derive(Clone)]
pub struct EventPublisher {
    tx: mpsc::Sender<AgentEvent>,
}

impl EventPublisher {
    /// Best-effort, non-blocking publish. Used from synchronous contexts
    /// that cannot await channel capacity; drops the event rather than
    /// blocking if the channel is currently full.
    pub fn publish(&self, event: AgentEvent) -> bool {
        self.tx.try_send(event).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn consumer_receives_published_events() {
        let mut bus = EventBus::new();
        bus.publish(AgentEvent::TurnStarted { iteration: 1 }).await;
        let event = bus.next_event().await.unwrap();
        assert!(matches!(event, AgentEvent::TurnStarted { iteration: 1 }));
    }

    #[tokio::test]
    async fn producer_blocks_until_the_consumer_makes_room() {
        let mut bus = EventBus::with_capacity(1, DEFAULT_INPUT_CAPACITY);
        bus.publish(AgentEvent::TurnStarted { iteration: 1 }).await;

        let tx = bus.event_sender();
        let send_task = tokio::spawn(async move {
            // The channel is already full (capacity 1); this send only
            // completes once the consumer below drains the first event.
            tx.send(AgentEvent::TurnStarted { iteration: 2 }).await.unwrap();
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!send_task.is_finished());

        let first = bus.next_event().await.unwrap();
        assert!(matches!(first, AgentEvent::TurnStarted { iteration: 1 }));

        send_task.await.unwrap();
        let second = bus.next_event().await.unwrap();
        assert!(matches!(second, AgentEvent::TurnStarted { iteration: 2 }));
    }

    #[tokio::test]
    async fn publish_returns_false_once_the_consumer_is_dropped() {
        let mut bus = EventBus::new();
        bus.take_event_receiver();
        assert!(!bus.publish(AgentEvent::TurnStarted { iteration: 1 }).await);
    }

    #[tokio::test]
    async fn user_input_round_trips_through_sender_and_receiver() {
        let mut bus = EventBus::new();
        let tx = bus.user_input_sender();
        tx.send("hello".to_string()).await.unwrap();
        assert_eq!(bus.next_user_input().await, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn approval_response_round_trips() {
        let mut bus = EventBus::new();
        let tx = bus.approval_sender();
        tx.send(ApprovalResponse {
            approval_id: "a1".into(),
            approved: true,
        })
        .await
        .unwrap();
        let resp = bus.next_approval_response().await.unwrap();
        assert_eq!(resp.approval_id, "a1");
        assert!(resp.approved);
    }

    #[tokio::test]
    async fn publisher_handle_reaches_the_consumer() {
        let mut bus = EventBus::new();
        let publisher = bus.publisher();
        publisher.publish(AgentEvent::TurnStarted { iteration: 2 });
        let event = bus.next_event().await.unwrap();
        assert!(matches!(event, AgentEvent::TurnStarted { iteration: 2 }));
    }

    #[tokio::test]
    async fn cancellation_request_round_trips() {
        let mut bus = EventBus::new();
        let tx = bus.cancellation_sender();
        tx.send(CancellationRequest {
            call_id: "c1".into(),
        })
        .await
        .unwrap();
        let req = bus.next_cancellation_request().await.unwrap();
        assert_eq!(req.call_id, "c1");
    }

    #[tokio::test]
    async fn shutdown_request_is_observed_by_shutdown_requested() {
        let mut bus = EventBus::new();
        assert!(!bus.shutdown_requested());
        let tx = bus.shutdown_sender();
        tx.send(()).await.unwrap();
        assert!(bus.shutdown_requested());
    }
}
