use std::collections::HashMap;
use std::sync::Arc;

use common::counter::TopFive;
use common::timestamps::format_rfc3339_nanos;
use time::OffsetDateTime;
use tokio::sync::RwLock;

const TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    pub service: String,
    pub word: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionCounterKey {
    pub session: String,
    pub service: String,
    pub word: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterValue {
    pub count: i64,
    pub last_used: OffsetDateTime,
}

impl CounterValue {
    fn first(at: OffsetDateTime) -> Self {
        Self {
            count: 1,
            last_used: at,
        }
    }

    /// Timestamps may arrive out of order from concurrent writers, so
    /// `last_used` only ever moves forward.
    fn bump(&mut self, at: OffsetDateTime) {
        self.count += 1;
        if at > self.last_used {
            self.last_used = at;
        }
    }
}

#[derive(Default)]
struct Counters {
    global: HashMap<CounterKey, CounterValue>,
    sessions: HashMap<SessionCounterKey, CounterValue>,
}

struct Row {
    service: String,
    word: String,
    value: CounterValue,
}

/// Usage counters per `(service, word)` and per `(session, service, word)`.
///
/// Counters are created on first increment and never removed. Readers copy
/// matching rows under the read lock and rank them after releasing it. When
/// two rows tie on both count and `last_used`, their relative order is
/// unspecified.
#[derive(Clone, Default)]
pub struct CounterStore {
    counters: Arc<RwLock<Counters>>,
}

impl CounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The only mutator. Updates the global and the session counter in one
    /// critical section.
    pub async fn increment(&self, session: &str, service: &str, word: &str, at: OffsetDateTime) {
        let mut counters = self.counters.write().await;

        counters
            .global
            .entry(CounterKey {
                service: service.to_string(),
                word: word.to_string(),
            })
            .and_modify(|value| value.bump(at))
            .or_insert_with(|| CounterValue::first(at));

        counters
            .sessions
            .entry(SessionCounterKey {
                session: session.to_string(),
                service: service.to_string(),
                word: word.to_string(),
            })
            .and_modify(|value| value.bump(at))
            .or_insert_with(|| CounterValue::first(at));
    }

    pub async fn get(&self, service: &str, word: &str) -> Option<CounterValue> {
        let counters = self.counters.read().await;
        counters
            .global
            .get(&CounterKey {
                service: service.to_string(),
                word: word.to_string(),
            })
            .copied()
    }

    pub async fn top_five_global(&self) -> Vec<TopFive> {
        let rows = {
            let counters = self.counters.read().await;
            counters
                .global
                .iter()
                .map(|(key, value)| Row {
                    service: key.service.clone(),
                    word: key.word.clone(),
                    value: *value,
                })
                .collect()
        };
        rank(rows)
    }

    pub async fn top_five_by_service(&self, service: &str) -> Vec<TopFive> {
        let rows = {
            let counters = self.counters.read().await;
            counters
                .global
                .iter()
                .filter(|(key, _)| key.service == service)
                .map(|(key, value)| Row {
                    service: key.service.clone(),
                    word: key.word.clone(),
                    value: *value,
                })
                .collect()
        };
        rank(rows)
    }

    pub async fn top_five_for_session(&self, session: &str) -> Vec<TopFive> {
        let rows = {
            let counters = self.counters.read().await;
            counters
                .sessions
                .iter()
                .filter(|(key, _)| key.session == session)
                .map(|(key, value)| Row {
                    service: key.service.clone(),
                    word: key.word.clone(),
                    value: *value,
                })
                .collect()
        };
        rank(rows)
    }
}

/// Count descending, then most recently used first; at most five rows.
fn rank(mut rows: Vec<Row>) -> Vec<TopFive> {
    rows.sort_unstable_by(|a, b| {
        b.value
            .count
            .cmp(&a.value.count)
            .then_with(|| b.value.last_used.cmp(&a.value.last_used))
    });

    rows.into_iter()
        .take(TOP_N)
        .map(|row| TopFive {
            service_name: row.service,
            word: row.word,
            last_used: format_rfc3339_nanos(row.value.last_used),
            count: row.value.count,
        })
        .collect()
}
