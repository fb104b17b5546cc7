#![forbid(unsafe_code)]

//! A [`Fetch`] that replays scripted results.
//!
//! Each endpoint path has its own queue of steps; a fetch pops the next one,
//! or falls back to the default step when the queue is empty. A step may be
//! delayed, which is how tests model slow servers under paused time.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use prb_core::{BlockerRecord, Endpoint, Fetch, FetchError, Veto};

#[derive(Debug, Clone)]
struct Step {
    result: Result<BlockerRecord, FetchError>,
    delay: Duration,
}

#[derive(Debug)]
pub struct ScriptedFetch {
    scripts: RefCell<HashMap<String, VecDeque<Step>>>,
    fallback: RefCell<Step>,
    calls: RefCell<Vec<String>>,
    in_flight: Cell<usize>,
    peak_in_flight: Cell<usize>,
}

impl Default for ScriptedFetch {
    fn default() -> Self {
        Self {
            scripts: RefCell::new(HashMap::new()),
            fallback: RefCell::new(Step {
                result: Ok(BlockerRecord::clear()),
                delay: Duration::ZERO,
            }),
            calls: RefCell::new(Vec::new()),
            in_flight: Cell::new(0),
            peak_in_flight: Cell::new(0),
        }
    }
}

impl ScriptedFetch {
    /// Every endpoint answers "no blockers" until scripted otherwise.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Queue `result` for the next unanswered fetch of `path`.
    pub fn respond(&self, path: &str, result: Result<BlockerRecord, FetchError>) {
        self.respond_after(path, Duration::ZERO, result);
    }

    pub fn respond_after(
        &self,
        path: &str,
        delay: Duration,
        result: Result<BlockerRecord, FetchError>,
    ) {
        self.scripts
            .borrow_mut()
            .entry(path.to_string())
            .or_default()
            .push_back(Step { result, delay });
    }

    /// Queue a raw HTTP response, decoded the way the HTTP fetcher does.
    pub fn respond_json(&self, path: &str, status: u16, body: &str) {
        self.respond(path, prb_web::decode_response(status, body.as_bytes()));
    }

    /// Answer for paths with an empty queue.
    pub fn set_fallback(&self, delay: Duration, result: Result<BlockerRecord, FetchError>) {
        *self.fallback.borrow_mut() = Step { result, delay };
    }

    /// Paths fetched so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    #[must_use]
    pub fn calls_for(&self, path: &str) -> usize {
        self.calls.borrow().iter().filter(|p| *p == path).count()
    }

    /// Most fetches that were pending at the same time.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.get()
    }

    fn next_step(&self, path: &str) -> Step {
        let scripted = self
            .scripts
            .borrow_mut()
            .get_mut(path)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| self.fallback.borrow().clone())
    }
}

#[async_trait(?Send)]
impl Fetch for ScriptedFetch {
    async fn fetch_blockers(&self, endpoint: &Endpoint) -> Result<BlockerRecord, FetchError> {
        let path = endpoint.path().to_string();
        self.calls.borrow_mut().push(path.clone());
        let step = self.next_step(&path);

        let in_flight = self.in_flight.get() + 1;
        self.in_flight.set(in_flight);
        self.peak_in_flight.set(self.peak_in_flight.get().max(in_flight));
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        self.in_flight.set(self.in_flight.get() - 1);
        step.result
    }
}

/// A successful record with one veto per message.
#[must_use]
pub fn vetoes(messages: &[&str]) -> Result<BlockerRecord, FetchError> {
    Ok(BlockerRecord::new(
        messages.iter().map(|m| Veto::new(*m)).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(path: &str) -> Endpoint {
        Endpoint::from_path(path)
    }

    #[tokio::test]
    async fn scripted_steps_are_consumed_in_order_then_fallback() {
        let fetch = ScriptedFetch::new();
        fetch.respond("/a", vetoes(&["one", "two"]));
        fetch.respond("/a", Err(FetchError::transport("reset")));

        assert_eq!(fetch.fetch_blockers(&endpoint("/a")).await.unwrap().count(), 2);
        assert!(fetch.fetch_blockers(&endpoint("/a")).await.is_err());
        assert_eq!(fetch.fetch_blockers(&endpoint("/a")).await.unwrap().count(), 0);
        assert_eq!(fetch.calls_for("/a"), 3);
        assert_eq!(fetch.call_count(), 3);
    }

    #[tokio::test]
    async fn json_responses_go_through_the_http_decoder() {
        let fetch = ScriptedFetch::new();
        fetch.respond_json("/b", 200, r#"{"errors":[{"message":"boom"}]}"#);
        let err = fetch.fetch_blockers(&endpoint("/b")).await.unwrap_err();
        assert_eq!(err.causes(), vec!["boom".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_step_waits() {
        let fetch = ScriptedFetch::new();
        fetch.respond_after("/c", Duration::from_secs(3), vetoes(&["slow"]));
        let start = tokio::time::Instant::now();
        let record = fetch.fetch_blockers(&endpoint("/c")).await.unwrap();
        assert_eq!(record.count(), 1);
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert_eq!(fetch.peak_in_flight(), 1);
    }
}
