//! Bus d'évènements partagé entre le moteur de lecture et les sessions SSE.

use crate::event::Event;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

/// Intervalle entre deux `ping` serveur envoyés à chaque session.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

struct Inner {
    sender: broadcast::Sender<Event>,
    latest_buffer_header: RwLock<Option<Bytes>>,
    last_pong: Mutex<HashMap<Uuid, Instant>>,
}

/// Bus de diffusion des évènements `trackChanged` / `progress` / `stream` /
/// `bufferHeader`, plus le suivi de vivacité (ping/pong) de chaque session
/// abonnée.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                sender,
                latest_buffer_header: RwLock::new(None),
                last_pong: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Diffuse un évènement à tous les abonnés actuels. Met aussi à jour le
    /// dernier `bufferHeader` connu, pour que les abonnés qui rejoignent le
    /// flux plus tard en reçoivent un dès la connexion.
    pub fn publish(&self, event: Event) {
        if let Event::BufferHeader(bytes) = &event {
            *self.inner.latest_buffer_header.write().unwrap() = Some(bytes.clone());
        }
        // Aucun abonné actif : un canal broadcast sans récepteur renvoie une
        // erreur de `send`, ce qui est normal et ne doit pas remonter.
        let _ = self.inner.sender.send(event);
    }

    /// Dernier `bufferHeader` connu, à envoyer immédiatement à tout nouvel
    /// abonné qui rejoint un flux déjà démarré.
    pub fn latest_buffer_header(&self) -> Option<Bytes> {
        self.inner.latest_buffer_header.read().unwrap().clone()
    }

    /// Ouvre une nouvelle session abonnée, enregistrée dans le registre de
    /// vivacité dès sa création.
    pub fn subscribe(&self) -> EventSubscription {
        let id = Uuid::new_v4();
        self.inner
            .last_pong
            .lock()
            .unwrap()
            .insert(id, Instant::now());

        EventSubscription {
            id,
            receiver: self.inner.sender.subscribe(),
            bus: self.clone(),
        }
    }

    /// Enregistre un `pong` reçu du client pour la session donnée.
    pub fn record_pong(&self, session_id: Uuid) {
        if let Some(last) = self.inner.last_pong.lock().unwrap().get_mut(&session_id) {
            *last = Instant::now();
        }
    }

    /// Vrai si la session n'a pas répondu depuis plus de `max_silence`
    /// (ou si elle est inconnue : déjà nettoyée, ou jamais vue).
    pub fn is_alive(&self, session_id: Uuid, max_silence: Duration) -> bool {
        self.inner
            .last_pong
            .lock()
            .unwrap()
            .get(&session_id)
            .map(|last| last.elapsed() <= max_silence)
            .unwrap_or(false)
    }

    fn forget(&self, session_id: Uuid) {
        self.inner.last_pong.lock().unwrap().remove(&session_id);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Session SSE abonnée au bus. Son entrée dans le registre de vivacité est
/// retirée automatiquement à la déconnexion.
pub struct EventSubscription {
    pub id: Uuid,
    pub receiver: broadcast::Receiver<Event>,
    bus: EventBus,
}

impl EventSubscription {
    pub fn is_alive(&self, max_silence: Duration) -> bool {
        self.bus.is_alive(self.id, max_silence)
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.bus.forget(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_subscriber_is_alive_immediately() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        assert!(sub.is_alive(HEARTBEAT_INTERVAL));
    }

    #[test]
    fn pong_refreshes_liveness() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        bus.record_pong(sub.id);
        assert!(sub.is_alive(Duration::from_secs(1)));
    }

    #[test]
    fn unknown_session_is_not_alive() {
        let bus = EventBus::new();
        assert!(!bus.is_alive(Uuid::new_v4(), HEARTBEAT_INTERVAL));
    }

    #[test]
    fn dropping_subscription_forgets_session() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        let id = sub.id;
        drop(sub);
        assert!(!bus.is_alive(id, HEARTBEAT_INTERVAL));
    }

    #[tokio::test]
    async fn late_subscriber_receives_latest_buffer_header() {
        let bus = EventBus::new();
        bus.publish(Event::BufferHeader(Bytes::from_static(b"id3header")));

        let sub = bus.subscribe();
        assert_eq!(
            bus.latest_buffer_header(),
            Some(Bytes::from_static(b"id3header"))
        );
        drop(sub);
    }

    #[tokio::test]
    async fn published_event_reaches_subscriber() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();

        bus.publish(Event::TrackChanged(crate::event::TrackChanged {
            title: "Song".to_string(),
            duration: 180,
            requested_by: "anonymous".to_string(),
        }));

        let received = sub.receiver.recv().await.unwrap();
        assert!(matches!(received, Event::TrackChanged(_)));
    }
}
