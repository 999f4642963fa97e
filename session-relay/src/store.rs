use async_trait::async_trait;
use messaging::types::SessionSid;
use shared::party::PhoneNumber;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// The pair of real numbers registered against one proxy session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionPair {
    pub client: PhoneNumber,
    pub content_producer: PhoneNumber,
}

impl SessionPair {
    /// The other member of the pair, when `number` is one of them.
    pub fn counterpart(&self, number: &PhoneNumber) -> Option<&PhoneNumber> {
        if *number == self.client {
            Some(&self.content_producer)
        } else if *number == self.content_producer {
            Some(&self.client)
        } else {
            None
        }
    }

    pub fn contains(&self, number: &PhoneNumber) -> bool {
        self.counterpart(number).is_some()
    }
}

/// Index of live proxy sessions, keyed by platform session sid.
///
/// Handlers only see this interface; the in-memory map below is the current
/// backing and a durable store can replace it without touching them. Lookups
/// are read-only and deterministic for a given store state.
#[async_trait]
pub trait SessionIndex: Send + Sync {
    async fn insert(&self, sid: SessionSid, pair: SessionPair);

    async fn lookup(&self, sid: &SessionSid) -> Option<SessionPair>;

    /// Scans for the session whose pair contains `number`.
    async fn find_by_member(&self, number: &PhoneNumber) -> Option<(SessionSid, SessionPair)>;

    async fn remove(&self, sid: &SessionSid) -> Option<SessionPair>;
}

/// Volatile in-memory index; contents are lost on restart.
#[derive(Default)]
pub struct InMemorySessionIndex {
    entries: RwLock<HashMap<SessionSid, SessionPair>>,
}

impl InMemorySessionIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionIndex for InMemorySessionIndex {
    async fn insert(&self, sid: SessionSid, pair: SessionPair) {
        self.entries.write().await.insert(sid, pair);
    }

    async fn lookup(&self, sid: &SessionSid) -> Option<SessionPair> {
        self.entries.read().await.get(sid).cloned()
    }

    async fn find_by_member(&self, number: &PhoneNumber) -> Option<(SessionSid, SessionPair)> {
        self.entries
            .read()
            .await
            .iter()
            .find(|(_, pair)| pair.contains(number))
            .map(|(sid, pair)| (sid.clone(), pair.clone()))
    }

    async fn remove(&self, sid: &SessionSid) -> Option<SessionPair> {
        self.entries.write().await.remove(sid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> SessionPair {
        SessionPair {
            client: "+15550000002".parse().unwrap(),
            content_producer: "+15550000001".parse().unwrap(),
        }
    }

    #[test]
    fn counterpart_resolves_both_directions() {
        let pair = pair();
        assert_eq!(
            pair.counterpart(&pair.client),
            Some(&pair.content_producer)
        );
        assert_eq!(pair.counterpart(&pair.content_producer), Some(&pair.client));
        assert_eq!(pair.counterpart(&"+15559990000".parse().unwrap()), None);
    }

    #[tokio::test]
    async fn insert_lookup_remove_round_trip() {
        let index = InMemorySessionIndex::new();
        let sid = SessionSid::new("KC0001");

        assert_eq!(index.lookup(&sid).await, None);

        index.insert(sid.clone(), pair()).await;
        assert_eq!(index.lookup(&sid).await, Some(pair()));
        // Lookups do not consume the entry
        assert_eq!(index.lookup(&sid).await, Some(pair()));

        assert_eq!(index.remove(&sid).await, Some(pair()));
        assert_eq!(index.lookup(&sid).await, None);
    }

    #[tokio::test]
    async fn find_by_member_matches_either_side() {
        let index = InMemorySessionIndex::new();
        let sid = SessionSid::new("KC0001");
        index.insert(sid.clone(), pair()).await;

        let (found, _) = index
            .find_by_member(&"+15550000001".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(found, sid);

        assert!(
            index
                .find_by_member(&"+15553334444".parse().unwrap())
                .await
                .is_none()
        );
    }
}
