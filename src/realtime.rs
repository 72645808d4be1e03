//! Realtime change feed and keyed-list synchronization.
//!
//! Screens that show a live list (pending activities, sales orders, accounts) all do the
//! same thing: load the list once, then apply insert/update/delete events for their owner
//! as they arrive. [`KeyedList::apply`] is that reducer, written once; [`ChangeFeed`] is the
//! in-process event source; [`ListSynchronizer`] ties the two together.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use tokio::sync::broadcast;

/// Records that carry a stable identity.
pub trait Keyed {
    type Id: Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Field holding the id in serialized payloads
    const ID_FIELD: &'static str = "id";

    fn id(&self) -> Self::Id;

    /// Owner key used for subscription filtering.
    fn owner(&self) -> Option<&str> {
        None
    }
}

/// A single change to a keyed collection
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<T: Keyed> {
    Insert(T),
    Update(T),
    Delete(T::Id),
}

/// Wire shape of a change, as delivered by the database feed and re-emitted to clients
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangePayload {
    #[serde(rename = "eventType")]
    pub event_type: String,
    #[serde(default)]
    pub new: Value,
    #[serde(default)]
    pub old: Value,
}

impl<T> ChangeEvent<T>
where
    T: Keyed + Serialize + DeserializeOwned,
{
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Insert(_) => "INSERT",
            ChangeEvent::Update(_) => "UPDATE",
            ChangeEvent::Delete(_) => "DELETE",
        }
    }

    /// Decode a feed payload
    ///
    /// # Returns
    /// * `None` - Unknown event type, or a record that does not deserialize
    pub fn from_payload(payload: &ChangePayload) -> Option<Self> {
        match payload.event_type.as_str() {
            "INSERT" => serde_json::from_value(payload.new.clone()).ok().map(ChangeEvent::Insert),
            "UPDATE" => serde_json::from_value(payload.new.clone()).ok().map(ChangeEvent::Update),
            "DELETE" => {
                let id = payload.old.get(T::ID_FIELD)?.clone();
                serde_json::from_value(id).ok().map(ChangeEvent::Delete)
            }
            _ => None,
        }
    }

    pub fn to_payload(&self) -> ChangePayload {
        let (new, old) = match self {
            ChangeEvent::Insert(record) | ChangeEvent::Update(record) => {
                (serde_json::to_value(record).unwrap_or_default(), Value::Object(Default::default()))
            }
            ChangeEvent::Delete(id) => {
                let mut old = serde_json::Map::new();
                old.insert(T::ID_FIELD.to_string(), serde_json::to_value(id).unwrap_or_default());
                (Value::Object(Default::default()), Value::Object(old))
            }
        };
        ChangePayload {
            event_type: self.kind().to_string(),
            new,
            old,
        }
    }
}

/// Arrival-ordered collection with at most one record per id
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedList<T> {
    items: Vec<T>,
}

impl<T> Default for KeyedList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Keyed> KeyedList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.items.iter().any(|item| &item.id() == id)
    }

    /// Apply one change
    ///
    /// * Insert appends the record unless one with the same id is already present
    /// * Update replaces the record with the same id; unknown ids are ignored
    /// * Delete removes the record with the id
    ///
    /// # Returns
    /// * `bool` - Whether the list changed
    pub fn apply(&mut self, event: ChangeEvent<T>) -> bool {
        match event {
            ChangeEvent::Insert(record) => {
                if self.contains(&record.id()) {
                    return false;
                }
                self.items.push(record);
                true
            }
            ChangeEvent::Update(record) => {
                let id = record.id();
                match self.items.iter_mut().find(|item| item.id() == id) {
                    Some(slot) => {
                        *slot = record;
                        true
                    }
                    None => false,
                }
            }
            ChangeEvent::Delete(id) => {
                let before = self.items.len();
                self.items.retain(|item| item.id() != id);
                self.items.len() != before
            }
        }
    }
}

impl<T: Keyed> From<Vec<T>> for KeyedList<T> {
    /// Later duplicates of an id are dropped.
    fn from(records: Vec<T>) -> Self {
        let mut list = Self::new();
        for record in records {
            list.apply(ChangeEvent::Insert(record));
        }
        list
    }
}

/// Event as carried on the feed, tagged with the owner of the changed record
#[derive(Debug, Clone)]
pub struct FeedMessage<T: Keyed> {
    pub owner: Option<String>,
    pub event: ChangeEvent<T>,
}

/// Broadcast hub for changes to one table
#[derive(Debug)]
pub struct ChangeFeed<T: Keyed> {
    sender: broadcast::Sender<FeedMessage<T>>,
}

impl<T: Keyed> Clone for ChangeFeed<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> ChangeFeed<T>
where
    T: Keyed + Clone + Send + 'static,
{
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a change; having no subscribers is not an error.
    pub fn publish(&self, owner: Option<String>, event: ChangeEvent<T>) {
        let _ = self.sender.send(FeedMessage { owner, event });
    }

    /// Subscribe to changes for one owner.
    pub fn subscribe(&self, owner: impl Into<String>) -> Subscription<T> {
        Subscription {
            receiver: self.sender.subscribe(),
            owner: owner.into(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Owner-filtered view of a [`ChangeFeed`]; dropping it unsubscribes
pub struct Subscription<T: Keyed> {
    receiver: broadcast::Receiver<FeedMessage<T>>,
    owner: String,
}

impl<T> Subscription<T>
where
    T: Keyed + Clone + Send + 'static,
{
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Wait for the next event for this owner
    ///
    /// # Returns
    /// * `None` - The feed has been closed
    pub async fn recv(&mut self) -> Option<ChangeEvent<T>> {
        loop {
            match self.receiver.recv().await {
                Ok(message) if message.owner.as_deref() == Some(self.owner.as_str()) => {
                    return Some(message.event);
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Subscription for {} lagged, {} event(s) dropped", self.owner, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Keeps a [`KeyedList`] current from a subscription
pub struct ListSynchronizer<T: Keyed> {
    list: KeyedList<T>,
    subscription: Subscription<T>,
}

impl<T> ListSynchronizer<T>
where
    T: Keyed + Clone + Send + 'static,
{
    /// Start from an initial snapshot, usually the result of a fetch.
    pub fn new(initial: Vec<T>, subscription: Subscription<T>) -> Self {
        Self {
            list: KeyedList::from(initial),
            subscription,
        }
    }

    pub fn list(&self) -> &KeyedList<T> {
        &self.list
    }

    /// Wait for the next change and apply it
    ///
    /// # Returns
    /// * `Some(changed)` - An event was applied; `changed` tells whether the list moved
    /// * `None` - The feed closed
    pub async fn next_change(&mut self) -> Option<bool> {
        let event = self.subscription.recv().await?;
        Some(self.list.apply(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: u64,
        owner: String,
        status: String,
    }

    impl Keyed for Row {
        type Id = u64;

        fn id(&self) -> u64 {
            self.id
        }

        fn owner(&self) -> Option<&str> {
            Some(&self.owner)
        }
    }

    fn row(id: u64, status: &str) -> Row {
        Row {
            id,
            owner: "TSA-1".into(),
            status: status.into(),
        }
    }

    #[test]
    fn insert_skips_existing_id() {
        let mut list = KeyedList::new();
        assert!(list.apply(ChangeEvent::Insert(row(1, "a"))));
        assert!(!list.apply(ChangeEvent::Insert(row(1, "b"))));
        assert_eq!(list.items(), &[row(1, "a")]);
    }

    #[test]
    fn update_replaces_in_place() {
        let mut list = KeyedList::from(vec![row(1, "a"), row(2, "b"), row(3, "c")]);
        assert!(list.apply(ChangeEvent::Update(row(2, "done"))));
        assert_eq!(list.items()[1], row(2, "done"));
        assert!(!list.apply(ChangeEvent::Update(row(9, "x"))));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn delete_removes_by_id() {
        let mut list = KeyedList::from(vec![row(1, "a"), row(2, "b")]);
        assert!(list.apply(ChangeEvent::Delete(1)));
        assert!(!list.apply(ChangeEvent::Delete(1)));
        assert_eq!(list.items(), &[row(2, "b")]);
    }

    #[test]
    fn decodes_feed_payloads_and_ignores_unknown_tags() {
        let insert = ChangePayload {
            event_type: "INSERT".into(),
            new: json!({"id": 5, "owner": "TSA-1", "status": "open"}),
            old: json!({}),
        };
        assert_eq!(ChangeEvent::<Row>::from_payload(&insert), Some(ChangeEvent::Insert(row(5, "open"))));

        let delete = ChangePayload {
            event_type: "DELETE".into(),
            new: json!({}),
            old: json!({"id": 5}),
        };
        assert_eq!(ChangeEvent::<Row>::from_payload(&delete), Some(ChangeEvent::Delete(5)));

        let truncate = ChangePayload {
            event_type: "TRUNCATE".into(),
            ..Default::default()
        };
        assert_eq!(ChangeEvent::<Row>::from_payload(&truncate), None);
    }

    #[test]
    fn payload_round_trips_through_wire_shape() {
        let event = ChangeEvent::Update(row(3, "won"));
        let payload = event.to_payload();
        assert_eq!(payload.event_type, "UPDATE");
        assert_eq!(ChangeEvent::<Row>::from_payload(&payload), Some(event));
    }

    #[tokio::test]
    async fn subscription_only_sees_its_owner() {
        let feed = ChangeFeed::<Row>::new(16);
        let mut sync = ListSynchronizer::new(vec![row(1, "a")], feed.subscribe("TSA-1"));

        feed.publish(Some("TSA-2".into()), ChangeEvent::Insert(row(7, "other")));
        feed.publish(Some("TSA-1".into()), ChangeEvent::Insert(row(2, "b")));
        feed.publish(Some("TSA-1".into()), ChangeEvent::Delete(1));

        assert_eq!(sync.next_change().await, Some(true));
        assert_eq!(sync.next_change().await, Some(true));
        assert_eq!(sync.list().items(), &[row(2, "b")]);
    }

    #[tokio::test]
    async fn closed_feed_ends_subscription() {
        let feed = ChangeFeed::<Row>::new(4);
        let mut sub = feed.subscribe("TSA-1");
        assert_eq!(feed.subscriber_count(), 1);
        drop(feed);
        assert!(sub.recv().await.is_none());
    }
}
