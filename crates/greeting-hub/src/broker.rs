//! Request broker: the pending-request queue.
//!
//! Holds requests between publication and promotion, ordered by priority
//! descending then submission time ascending. Applies same-source
//! replacement, staleness discard and the retry cap.

use std::time::Duration;

use tokio::time::Instant;

use crate::types::{ArbiterState, PriorityLevel, QueuedRequest};

pub struct RequestBroker {
    queue: Vec<QueuedRequest>,
    max_queue_age: Duration,
    max_retries: u32,
}

impl RequestBroker {
    pub fn new(max_queue_age: Duration, max_retries: u32) -> Self {
        Self {
            queue: Vec::new(),
            max_queue_age,
            max_retries,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Next source id in line, without dequeuing.
    pub fn peek_source(&self) -> Option<&str> {
        self.queue.first().map(|q| q.source_id())
    }

    /// Add or update a pending request. A source with an entry already
    /// queued has that entry replaced by the newer one.
    pub fn add(&mut self, request: QueuedRequest) {
        let source_id = request.source_id().to_string();
        if let Some(existing) = self
            .queue
            .iter_mut()
            .find(|q| q.source_id() == source_id)
        {
            tracing::debug!(source_id, "Replacing pending request from same source");
            *existing = request;
        } else {
            self.queue.push(request);
        }
        self.sort();
        tracing::debug!(
            queue_len = self.queue.len(),
            next = self.peek_source().unwrap_or("none"),
            "Request queued"
        );
    }

    /// Dequeue the next valid request. Scans from the front, discarding
    /// entries older than the max queued age, and while in `Cooldown`
    /// skipping (not discarding) non-critical entries.
    pub fn next_valid(&mut self, state: ArbiterState, now: Instant) -> Option<QueuedRequest> {
        let mut index = 0;
        while index < self.queue.len() {
            let entry = &self.queue[index];

            if now.duration_since(entry.submitted_at()) > self.max_queue_age {
                tracing::debug!(source_id = entry.source_id(), "Discarding stale request");
                self.queue.remove(index);
                continue;
            }

            if state == ArbiterState::Cooldown && entry.priority() < PriorityLevel::Critical {
                index += 1;
                continue;
            }

            return Some(self.queue.remove(index));
        }
        None
    }

    /// Put a request that lost contention back at the front, incrementing
    /// its retry count. Discards it permanently once the cap is reached.
    /// Same-source replacement applies here too: a newer attempt from the
    /// same source supersedes any entry it still has queued.
    pub fn requeue(&mut self, mut request: QueuedRequest) {
        request.retry_count += 1;
        if request.retry_count >= self.max_retries {
            tracing::debug!(
                source_id = request.source_id(),
                "Discarding request after max retries"
            );
            return;
        }
        self.queue.retain(|q| q.source_id() != request.source_id());
        tracing::debug!(
            source_id = request.source_id(),
            attempt = request.retry_count,
            "Re-queueing contended request"
        );
        self.queue.insert(0, request);
    }

    /// Source ids currently queued, in dequeue order.
    pub fn source_ids(&self) -> Vec<String> {
        self.queue.iter().map(|q| q.source_id().to_string()).collect()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    fn sort(&mut self) {
        self.queue.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then(a.submitted_at().cmp(&b.submitted_at()))
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::source::EventSource;
    use crate::types::{
        ContentSpec, DisplayRequest, Outcome, PriorityLevel, ScreenPosition, SizeClass,
    };

    struct NullSource(&'static str);

    impl EventSource for NullSource {
        fn id(&self) -> &str {
            self.0
        }
        fn can_trigger(&self) -> bool {
            true
        }
        fn priority(&self) -> PriorityLevel {
            PriorityLevel::Low
        }
        fn content(&self) -> ContentSpec {
            ContentSpec {
                image_url: String::new(),
                text_body: "x".into(),
                screen_position: ScreenPosition::BottomRight,
                size_class: SizeClass::Medium,
            }
        }
        fn on_resolved(&self, _outcome: Outcome) {}
    }

    fn request(source_id: &'static str, priority: PriorityLevel, at: Instant) -> QueuedRequest {
        QueuedRequest::new(DisplayRequest {
            source_id: source_id.to_string(),
            priority,
            content: NullSource(source_id)
                .content()
                .into_payload(format!("{source_id}_test")),
            submitted_at: at,
            source: Arc::new(NullSource(source_id)),
        })
    }

    fn broker() -> RequestBroker {
        RequestBroker::new(Duration::from_secs(120), 3)
    }

    #[test]
    fn orders_by_priority_then_submission() {
        let mut broker = broker();
        let t0 = Instant::now();

        broker.add(request("a", PriorityLevel::Low, t0));
        broker.add(request("b", PriorityLevel::High, t0 + Duration::from_millis(10)));
        broker.add(request("c", PriorityLevel::High, t0 + Duration::from_millis(5)));

        assert_eq!(broker.peek_source(), Some("c"));
        let first = broker.next_valid(ArbiterState::Throttling, t0).unwrap();
        assert_eq!(first.source_id(), "c");
        let second = broker.next_valid(ArbiterState::Throttling, t0).unwrap();
        assert_eq!(second.source_id(), "b");
        let third = broker.next_valid(ArbiterState::Throttling, t0).unwrap();
        assert_eq!(third.source_id(), "a");
    }

    #[test]
    fn fifo_within_priority_band() {
        let mut broker = broker();
        let t0 = Instant::now();

        for (name, offset) in [("first", 0u64), ("second", 1), ("third", 2)] {
            broker.add(request(
                name,
                PriorityLevel::Medium,
                t0 + Duration::from_millis(offset),
            ));
        }

        let order: Vec<String> = std::iter::from_fn(|| {
            broker
                .next_valid(ArbiterState::Throttling, t0 + Duration::from_secs(1))
                .map(|q| q.source_id().to_string())
        })
        .collect();
        assert_eq!(order, ["first", "second", "third"]);
    }

    #[test]
    fn same_source_replaced_keeping_latest_content() {
        let mut broker = broker();
        let t0 = Instant::now();

        broker.add(request("tip", PriorityLevel::Low, t0));
        let mut newer = request("tip", PriorityLevel::Low, t0 + Duration::from_millis(50));
        newer.request.content.text_body = "newer".into();
        broker.add(newer);

        assert_eq!(broker.len(), 1);
        let entry = broker.next_valid(ArbiterState::Throttling, t0).unwrap();
        assert_eq!(entry.request.content.text_body, "newer");
    }

    #[test]
    fn stale_entry_never_dequeued_even_if_only_entry() {
        let mut broker = broker();
        let t0 = Instant::now();

        broker.add(request("old", PriorityLevel::High, t0));
        let later = t0 + Duration::from_secs(121);
        assert!(broker.next_valid(ArbiterState::Throttling, later).is_none());
        assert!(broker.is_empty());
    }

    #[test]
    fn cooldown_skips_but_keeps_non_critical() {
        let mut broker = broker();
        let t0 = Instant::now();

        broker.add(request("high", PriorityLevel::High, t0));
        broker.add(request("crit", PriorityLevel::Critical, t0 + Duration::from_millis(1)));

        let got = broker.next_valid(ArbiterState::Cooldown, t0).unwrap();
        assert_eq!(got.source_id(), "crit");
        // The high entry was skipped, not discarded.
        assert_eq!(broker.len(), 1);
        assert!(broker.next_valid(ArbiterState::Cooldown, t0).is_none());
        assert_eq!(broker.len(), 1);
    }

    #[test]
    fn requeue_discards_at_retry_cap() {
        let mut broker = broker();
        let t0 = Instant::now();
        let entry = request("contender", PriorityLevel::High, t0);

        let mut entry = {
            broker.requeue(entry);
            broker.next_valid(ArbiterState::Throttling, t0).unwrap()
        };
        assert_eq!(entry.retry_count, 1);

        broker.requeue(entry.clone());
        entry = broker.next_valid(ArbiterState::Throttling, t0).unwrap();
        assert_eq!(entry.retry_count, 2);

        // Third loss reaches the cap of 3 and the entry disappears.
        broker.requeue(entry);
        assert!(broker.is_empty());
    }

    #[test]
    fn requeue_replaces_same_source_entry() {
        let mut broker = broker();
        let t0 = Instant::now();

        broker.requeue(request("contender", PriorityLevel::High, t0));
        let mut newer = request(
            "contender",
            PriorityLevel::High,
            t0 + Duration::from_millis(5),
        );
        newer.request.content.text_body = "newer".into();
        broker.requeue(newer);

        assert_eq!(broker.len(), 1);
        let entry = broker.next_valid(ArbiterState::Throttling, t0).unwrap();
        assert_eq!(entry.request.content.text_body, "newer");
    }

    #[test]
    fn requeued_entry_goes_to_the_front() {
        let mut broker = broker();
        let t0 = Instant::now();

        broker.add(request("waiting", PriorityLevel::High, t0));
        broker.requeue(request("loser", PriorityLevel::High, t0 + Duration::from_millis(5)));

        assert_eq!(broker.peek_source(), Some("loser"));
    }
}
