//! # Event History
//!
//! Capacity-bounded ring buffer of call / result / error events.

use std::collections::VecDeque;

use amp_types::{Event, EventType};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;

/// 事件历史 (环形缓冲)
#[derive(Debug)]
pub struct EventHistory {
    capacity: usize,
    events: Mutex<VecDeque<Event>>,
}

impl EventHistory {
    /// A capacity of 0 keeps nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an event, evicting the oldest beyond capacity.
    pub fn record(&self, event: Event) {
        if self.capacity == 0 {
            return;
        }
        let mut events = self.events.lock();
        while events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Record a call and return its event id
    pub fn record_call(&self, method: &str, params: Value) -> String {
        let event = new_event(EventType::Call, Some(method), Some(params), None, None);
        let id = event.id.clone();
        self.record(event);
        id
    }

    pub fn record_result(&self, call_id: &str, method: &str, result: Value) {
        self.record(new_event(
            EventType::Result,
            Some(method),
            None,
            Some(result),
            Some(call_id),
        ));
    }

    pub fn record_error(&self, call_id: &str, method: &str, error: &str) {
        self.record(new_event(
            EventType::Error,
            Some(method),
            None,
            Some(Value::String(error.to_string())),
            Some(call_id),
        ));
    }

    /// Oldest first
    pub fn snapshot(&self) -> Vec<Event> {
        self.events.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

fn new_event(
    event_type: EventType,
    method: Option<&str>,
    params: Option<Value>,
    result: Option<Value>,
    related_id: Option<&str>,
) -> Event {
    Event {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        event_type,
        method: method.map(String::from),
        params,
        result,
        related_id: related_id.map(String::from),
    }
}
