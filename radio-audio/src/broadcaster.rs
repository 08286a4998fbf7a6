//! Broadcaster - fan-out d'un flux d'octets encodés vers plusieurs abonnés
//!
//! Le flux produit par `ffmpeg` (un chunk MP3 à la fois) doit atteindre
//! simultanément l'IcecastSink et un nombre variable de clients HTTP/SSE en
//! attente de bufferHeader/stream. Chaque abonné avance à son propre rythme ;
//! un abonné lent ne doit jamais ralentir ni bloquer les autres.
//!
//! [`tokio::sync::broadcast`] fournit exactement cette sémantique : le canal
//! a une capacité bornée et, lorsqu'elle est dépassée, ce sont les valeurs
//! les **plus anciennes** du ring buffer qui sont écrasées - un abonné qui
//! prend du retard reçoit `Lagged(n)` puis reprend à la valeur la plus
//! ancienne encore disponible, jamais une perte silencieuse du chunk le plus
//! récent. C'est l'inverse du `try_send` d'un `mpsc::Sender`, qui abandonne
//! le nouveau chunk quand le buffer du destinataire est plein.

use bytes::Bytes;
use tokio::sync::broadcast;

/// Fan-out broadcaster pour des chunks de flux encodé.
pub struct Broadcaster {
    tx: broadcast::Sender<Bytes>,
}

impl Broadcaster {
    /// Crée un broadcaster dont chaque abonné dispose d'un ring buffer de
    /// `capacity` chunks avant que les plus anciens ne soient écrasés.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Abonne un nouveau récepteur. Il ne voit que les chunks publiés après
    /// son inscription.
    pub fn subscribe(&self) -> Subscriber {
        Subscriber {
            rx: self.tx.subscribe(),
        }
    }

    /// Nombre d'abonnés actuellement enregistrés.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publie un chunk à tous les abonnés. Ne bloque jamais : un canal sans
    /// abonné retourne simplement une erreur ignorée par l'appelant.
    pub fn publish(&self, chunk: Bytes) {
        // SendError signifie qu'il n'y a aucun abonné ; ce n'est pas une
        // erreur pour un broadcaster, juste un flux qui tombe dans le vide.
        let _ = self.tx.send(chunk);
    }
}

/// Abonné à un [`Broadcaster`].
pub struct Subscriber {
    rx: broadcast::Receiver<Bytes>,
}

/// Ce qu'un abonné a reçu à l'appel de [`Subscriber::recv`].
#[derive(Debug)]
pub enum Received {
    /// Chunk reçu normalement.
    Chunk(Bytes),
    /// L'abonné a pris du retard : `skipped` chunks les plus anciens ont été
    /// écrasés avant qu'il ne les consomme. Le prochain appel à `recv`
    /// renverra le chunk le plus ancien encore disponible.
    Lagged { skipped: u64 },
    /// Le broadcaster a été abandonné, plus aucun chunk ne viendra.
    Closed,
}

impl Subscriber {
    pub async fn recv(&mut self) -> Received {
        match self.rx.recv().await {
            Ok(chunk) => Received::Chunk(chunk),
            Err(broadcast::error::RecvError::Lagged(skipped)) => Received::Lagged { skipped },
            Err(broadcast::error::RecvError::Closed) => Received::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fans_out_to_every_subscriber() {
        let broadcaster = Broadcaster::new(8);
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();

        broadcaster.publish(Bytes::from_static(b"chunk-1"));

        assert!(matches!(a.recv().await, Received::Chunk(c) if c == Bytes::from_static(b"chunk-1")));
        assert!(matches!(b.recv().await, Received::Chunk(c) if c == Bytes::from_static(b"chunk-1")));
    }

    #[tokio::test]
    async fn slow_subscriber_drops_oldest_not_newest() {
        let broadcaster = Broadcaster::new(2);
        let mut slow = broadcaster.subscribe();

        broadcaster.publish(Bytes::from_static(b"1"));
        broadcaster.publish(Bytes::from_static(b"2"));
        broadcaster.publish(Bytes::from_static(b"3"));

        // capacity 2: chunk "1" was overwritten, "2" and "3" survive.
        match slow.recv().await {
            Received::Lagged { skipped } => assert_eq!(skipped, 1),
            other => panic!("expected Lagged, got {other:?}"),
        }
        assert!(matches!(slow.recv().await, Received::Chunk(c) if c == Bytes::from_static(b"2")));
        assert!(matches!(slow.recv().await, Received::Chunk(c) if c == Bytes::from_static(b"3")));
    }

    #[tokio::test]
    async fn late_subscriber_only_sees_future_chunks() {
        let broadcaster = Broadcaster::new(8);
        broadcaster.publish(Bytes::from_static(b"before"));

        let mut late = broadcaster.subscribe();
        broadcaster.publish(Bytes::from_static(b"after"));

        assert!(matches!(late.recv().await, Received::Chunk(c) if c == Bytes::from_static(b"after")));
    }
}
