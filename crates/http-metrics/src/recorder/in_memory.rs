use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use opentelemetry::KeyValue;

use super::Recorder;

/// One call received by an [InMemoryRecorder].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    InFlight { quantity: i64, attributes: Vec<KeyValue> },
    Requests { quantity: u64, attributes: Vec<KeyValue> },
    Duration { elapsed: Duration, attributes: Vec<KeyValue> },
    RequestSize { bytes: i64, attributes: Vec<KeyValue> },
    ResponseSize { bytes: i64, attributes: Vec<KeyValue> },
}

impl RecordedCall {
    pub fn attributes(&self) -> &[KeyValue] {
        match self {
            RecordedCall::InFlight { attributes, .. }
            | RecordedCall::Requests { attributes, .. }
            | RecordedCall::Duration { attributes, .. }
            | RecordedCall::RequestSize { attributes, .. }
            | RecordedCall::ResponseSize { attributes, .. } => attributes,
        }
    }
}

/// `in_flight(+1) {http.method=GET}`, durations are left out as they vary between runs.
impl fmt::Display for RecordedCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordedCall::InFlight { quantity, .. } => write!(f, "in_flight({quantity:+})")?,
            RecordedCall::Requests { quantity, .. } => write!(f, "requests({quantity})")?,
            RecordedCall::Duration { .. } => write!(f, "duration")?,
            RecordedCall::RequestSize { bytes, .. } => write!(f, "request_size({bytes})")?,
            RecordedCall::ResponseSize { bytes, .. } => write!(f, "response_size({bytes})")?,
        }

        let attributes = self
            .attributes()
            .iter()
            .map(|kv| format!("{}={}", kv.key.as_str(), kv.value.as_str()))
            .collect::<Vec<_>>();

        write!(f, " {{{}}}", attributes.join(", "))
    }
}

/// [Recorder] keeping every call in memory, in the order they were made. Clones share the same
/// calls.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecorder {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl InMemoryRecorder {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Sum of all the in-flight adjustments.
    pub fn in_flight(&self) -> i64 {
        self.lock()
            .iter()
            .map(|call| match call {
                RecordedCall::InFlight { quantity, .. } => *quantity,
                _ => 0,
            })
            .sum()
    }

    /// One line per call, see [RecordedCall]'s `Display`.
    pub fn render(&self) -> String {
        self.lock()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn push(&self, call: RecordedCall) {
        self.lock().push(call);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Recorder for InMemoryRecorder {
    fn add_in_flight(&self, quantity: i64, attributes: &[KeyValue]) {
        self.push(RecordedCall::InFlight {
            quantity,
            attributes: attributes.to_vec(),
        });
    }

    fn add_requests(&self, quantity: u64, attributes: &[KeyValue]) {
        self.push(RecordedCall::Requests {
            quantity,
            attributes: attributes.to_vec(),
        });
    }

    fn record_duration(&self, elapsed: Duration, attributes: &[KeyValue]) {
        self.push(RecordedCall::Duration {
            elapsed,
            attributes: attributes.to_vec(),
        });
    }

    fn record_request_size(&self, bytes: i64, attributes: &[KeyValue]) {
        self.push(RecordedCall::RequestSize {
            bytes,
            attributes: attributes.to_vec(),
        });
    }

    fn record_response_size(&self, bytes: i64, attributes: &[KeyValue]) {
        self.push(RecordedCall::ResponseSize {
            bytes,
            attributes: attributes.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_calls_in_order() {
        let recorder = InMemoryRecorder::default();
        let attributes = [KeyValue::new("http.method", "GET")];

        recorder.add_in_flight(1, &attributes);
        recorder.add_requests(1, &attributes);
        recorder.record_response_size(-1, &attributes);
        recorder.add_in_flight(-1, &attributes);

        insta::assert_snapshot!(recorder.render(), @r###"
        in_flight(+1) {http.method=GET}
        requests(1) {http.method=GET}
        response_size(-1) {http.method=GET}
        in_flight(-1) {http.method=GET}
        "###);
        assert_eq!(recorder.in_flight(), 0);
    }

    #[test]
    fn clones_share_calls() {
        let recorder = InMemoryRecorder::default();
        recorder.clone().add_requests(1, &[]);

        assert_eq!(
            recorder.calls(),
            [RecordedCall::Requests {
                quantity: 1,
                attributes: Vec::new()
            }]
        );

        recorder.clear();
        assert!(recorder.is_empty());
    }

    #[test]
    fn concurrent_calls_are_not_lost() {
        let recorder = InMemoryRecorder::default();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let recorder = recorder.clone();
                scope.spawn(move || {
                    for _ in 0..100 {
                        recorder.add_in_flight(1, &[]);
                        recorder.add_in_flight(-1, &[]);
                    }
                });
            }
        });

        assert_eq!(recorder.calls().len(), 1600);
        assert_eq!(recorder.in_flight(), 0);
    }
}
