//! An in-memory topic event bus.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An event travelling from an [`Emitter`] topic to stream subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum StreamEvent {
    /// A payload, sent to the client as one JSON encoded line.
    Data(Value),
    /// A heartbeat without payload, sent as an empty line.
    Ping,
    /// Ends every stream subscribed to the topic and removes the topic's subscribers.
    Close,
}

impl StreamEvent {
    pub fn data<T: Serialize>(data: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(data).map(Self::Data)
    }
}

type Callback = Arc<dyn Fn(&StreamEvent) + Send + Sync>;

#[derive(Default)]
struct Topics {
    next_id: AtomicU64,
    // `BTreeMap` so fan-out happens in subscription order.
    topics: Mutex<HashMap<String, BTreeMap<u64, Callback>>>,
}

/// A publish/subscribe bus keyed by topic name.
///
/// Cloning an [`Emitter`] is cheap and every clone shares the same topics.
/// Callbacks are invoked synchronously by [`Emitter::emit`] after the lock has been released, so they are free to subscribe or emit themselves.
#[derive(Clone, Default)]
pub struct Emitter(Arc<Topics>);

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        topic: impl Into<String>,
        callback: impl Fn(&StreamEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let topic = topic.into();
        let id = self.0.next_id.fetch_add(1, Ordering::Relaxed);
        self.0
            .topics
            .lock()
            .entry(topic.clone())
            .or_default()
            .insert(id, Arc::new(callback));

        Subscription {
            topics: Arc::downgrade(&self.0),
            topic,
            id,
        }
    }

    /// Deliver `event` to every current subscriber of `topic`.
    ///
    /// The subscribers are snapshotted up front. For [`StreamEvent::Close`] the topic is removed in the same critical section, so anyone subscribing during the fan-out joins a fresh set and never sees this close.
    pub fn emit(&self, topic: &str, event: StreamEvent) {
        let callbacks = {
            let mut topics = self.0.topics.lock();
            let callbacks = match &event {
                StreamEvent::Close => topics.remove(topic),
                _ => topics.get(topic).cloned(),
            };
            callbacks.map(|c| c.into_values().collect::<Vec<_>>())
        };

        let Some(callbacks) = callbacks else {
            return;
        };

        #[cfg(feature = "tracing")]
        if matches!(event, StreamEvent::Close) {
            tracing::trace!("closing topic '{}' with {} subscribers", topic, callbacks.len());
        }

        for callback in callbacks {
            callback(&event);
        }
    }

    /// Serialize `data` and emit it as a [`StreamEvent::Data`].
    pub fn publish<T: Serialize>(&self, topic: &str, data: &T) -> Result<(), serde_json::Error> {
        self.emit(topic, StreamEvent::data(data)?);
        Ok(())
    }

    pub fn close(&self, topic: &str) {
        self.emit(topic, StreamEvent::Close);
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.0.topics.lock().get(topic).map_or(0, BTreeMap::len)
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics = self.0.topics.lock();
        f.debug_map()
            .entries(topics.iter().map(|(topic, subs)| (topic, subs.len())))
            .finish()
    }
}

/// A handle to a single subscriber registered with [`Emitter::subscribe`].
///
/// Dropping it does not unsubscribe, call [`Subscription::unsubscribe`] for that.
#[derive(Debug)]
pub struct Subscription {
    topics: Weak<Topics>,
    topic: String,
    id: u64,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove this subscriber. Calling it again, or after the topic was closed, does nothing.
    pub fn unsubscribe(&self) {
        let Some(topics) = self.topics.upgrade() else {
            return;
        };

        let mut topics = topics.topics.lock();
        if let Some(subs) = topics.get_mut(&self.topic) {
            subs.remove(&self.id);
            if subs.is_empty() {
                topics.remove(&self.topic);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn recorder() -> (
        Arc<Mutex<Vec<(&'static str, StreamEvent)>>>,
        impl Fn(&'static str) -> Box<dyn Fn(&StreamEvent) + Send + Sync>,
    ) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = log.clone();
            move |name: &'static str| {
                let log = log.clone();
                Box::new(move |event: &StreamEvent| log.lock().push((name, event.clone())))
                    as Box<dyn Fn(&StreamEvent) + Send + Sync>
            }
        };
        (log, make)
    }

    #[test]
    fn fan_out_in_subscription_order() {
        let emitter = Emitter::new();
        let (log, make) = recorder();

        emitter.subscribe("t", make("first"));
        emitter.subscribe("t", make("second"));
        emitter.subscribe("other", make("other"));
        emitter.publish("t", &json!(1)).unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                ("first", StreamEvent::Data(json!(1))),
                ("second", StreamEvent::Data(json!(1))),
            ]
        );
    }

    #[test]
    fn close_clears_topic() {
        let emitter = Emitter::new();
        let (log, make) = recorder();

        emitter.subscribe("t", make("old"));
        emitter.subscribe("t", make("old"));
        assert_eq!(emitter.subscriber_count("t"), 2);

        emitter.close("t");
        assert_eq!(emitter.subscriber_count("t"), 0);

        emitter.subscribe("t", make("new"));
        emitter.emit("t", StreamEvent::Ping);
        assert_eq!(
            *log.lock(),
            vec![
                ("old", StreamEvent::Close),
                ("old", StreamEvent::Close),
                ("new", StreamEvent::Ping),
            ]
        );
    }

    #[test]
    fn subscribers_added_during_close_do_not_see_it() {
        let emitter = Emitter::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        emitter.subscribe("t", {
            let emitter = emitter.clone();
            let seen = seen.clone();
            move |_| {
                let seen = seen.clone();
                emitter.subscribe("t", move |event| seen.lock().push(event.clone()));
            }
        });
        emitter.close("t");

        assert!(seen.lock().is_empty());
        assert_eq!(emitter.subscriber_count("t"), 1);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let emitter = Emitter::new();
        let a = emitter.subscribe("t", |_| {});
        let b = emitter.subscribe("t", |_| {});
        assert_ne!(a.id(), b.id());

        a.unsubscribe();
        a.unsubscribe();
        assert_eq!(emitter.subscriber_count("t"), 1);

        b.unsubscribe();
        assert_eq!(emitter.subscriber_count("t"), 0);
        assert!(format!("{emitter:?}") == "{}");

        drop(emitter);
        b.unsubscribe();
    }
}
