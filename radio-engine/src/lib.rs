#![doc = r#"
radio-engine - le moteur de lecture

Orchestre `NextTrackFetcher`, le transcodage temps réel, la diffusion
(`Broadcaster`/`IcecastSink`) et les évènements SSE (`EventBus`) en une
boucle de lecture unique : la piste courante, sa précédente, et la file de
pistes déjà matérialisées en avance (`MIN_QUEUE_SIZE`).

# Architecture

```text
NextTrackFetcher ──▶ on-deck buffer ──▶ PlaybackEngine loop ──▶ pipeline(Track) ──▶ Broadcaster
                                                                                        │
                                                                           ┌────────────┴────────────┐
                                                                      IcecastSink             abonnés HTTP/SSE
```

`IcecastSink` est un abonné longue durée du `Broadcaster`, construit une
seule fois pour la durée du moteur : il n'appartient pas à l'arbre de
pipeline d'une piste et n'est donc jamais recréé ni annulé par une
transition de piste.

Toutes les mutations d'état (lecture, skip, previous, seek) passent par la
boucle de lecture, seule propriétaire de [`state::EngineState`] : c'est elle
qui garantit qu'aucune transition ne chevauche une autre (§5).
"#]

mod bitrate;
mod error;
mod silence;
mod source;
mod state;

pub use error::{EngineError, Result};
pub use silence::{SilenceConfig, SilenceGenerator};
pub use state::EngineState;

use radio_audio::pipeline::{AudioPipelineNode, Node};
use radio_audio::icecast_sink::{IcecastSink, IcecastSinkConfig};
use radio_audio::Broadcaster;
use radio_events::{Event, EventBus, TrackChanged};
use radio_fetcher::NextTrackFetcher;
use radio_store::Track;
use silence::SilenceSourceLogic;
use source::TrackSourceLogic;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

/// Intervalle entre deux évènements `progress` (§4.8).
const PROGRESS_TICK: std::time::Duration = std::time::Duration::from_secs(5);
/// Capacité du broadcaster, en nombre de chunks de 4 KiB - approxime le
/// tampon de 1 MiB par défaut prescrit pour les sessions d'écoute (§4.6).
const BROADCASTER_CAPACITY: usize = 256;

enum Command {
    Skip,
    Previous,
    Seek(i64),
}

enum Outcome {
    Advance,
    Skip,
    Previous,
}

/// Moteur de lecture : possède la boucle de lecture et expose les
/// opérations externes (`start`, `skip`, `previous`, `seek`, lectures
/// d'état) décrites par §4.8.
pub struct PlaybackEngine {
    fetcher: Arc<NextTrackFetcher>,
    broadcaster: Arc<Broadcaster>,
    events: EventBus,
    // Kept alive for the lifetime of the engine: subscribed to `broadcaster`
    // once in `new`, independent of track pipelines.
    _icecast_sink: Option<Arc<IcecastSink>>,
    min_queue_size: usize,
    state: Arc<StdMutex<EngineState>>,
    on_deck: Arc<AsyncMutex<VecDeque<Track>>>,
    prefetching: Arc<AtomicBool>,
    transitioning: Arc<AtomicBool>,
    cmd_tx: AsyncMutex<Option<mpsc::Sender<(Command, oneshot::Sender<()>)>>>,
}

impl PlaybackEngine {
    pub fn new(
        fetcher: Arc<NextTrackFetcher>,
        events: EventBus,
        icecast_config: Option<IcecastSinkConfig>,
        min_queue_size: usize,
    ) -> Self {
        let broadcaster = Arc::new(Broadcaster::new(BROADCASTER_CAPACITY));

        let icecast_sink = icecast_config.map(|config| {
            let sink = IcecastSink::new("icecast", config);
            sink.clone().start(broadcaster.clone());
            sink
        });

        Self {
            fetcher,
            broadcaster,
            events,
            _icecast_sink: icecast_sink,
            min_queue_size,
            state: Arc::new(StdMutex::new(EngineState::default())),
            on_deck: Arc::new(AsyncMutex::new(VecDeque::new())),
            prefetching: Arc::new(AtomicBool::new(false)),
            transitioning: Arc::new(AtomicBool::new(false)),
            cmd_tx: AsyncMutex::new(None),
        }
    }

    /// Construit le moteur à partir de la configuration process-wide
    /// (Icecast, `MIN_QUEUE_SIZE`).
    pub fn new_configured(fetcher: Arc<NextTrackFetcher>, events: EventBus) -> Self {
        let config = radio_config::get_config();
        let icecast = config.get_icecast_config();

        let icecast_config = icecast.enabled.then(|| IcecastSinkConfig {
            host: icecast.host,
            port: icecast.port,
            mount: icecast.mount,
            user: "source".to_string(),
            password: icecast.password,
            name: icecast.name,
            description: icecast.description,
            genre: icecast.genre,
            bitrate: icecast.bitrate,
            ..Default::default()
        });

        Self::new(fetcher, events, icecast_config, config.get_min_queue_size())
    }

    pub fn broadcaster(&self) -> Arc<Broadcaster> {
        self.broadcaster.clone()
    }

    /// Démarre la boucle de lecture en tâche de fond. Idempotent : un appel
    /// alors que la boucle tourne déjà est ignoré.
    pub async fn start(self: Arc<Self>) {
        let mut guard = self.cmd_tx.lock().await;
        if guard.is_some() {
            return;
        }

        let (tx, rx) = mpsc::channel(1);
        *guard = Some(tx);
        drop(guard);

        tokio::spawn(async move { self.run(rx).await });
    }

    pub fn get_current(&self) -> EngineState {
        self.state.lock().unwrap().clone()
    }

    pub async fn get_upcoming(&self) -> Vec<Track> {
        self.on_deck.lock().await.iter().cloned().collect()
    }

    pub async fn skip(&self) -> Result<()> {
        self.send_command(Command::Skip).await
    }

    pub async fn previous(&self) -> Result<()> {
        self.send_command(Command::Previous).await
    }

    pub async fn seek(&self, seconds: i64) -> Result<()> {
        if seconds < 0 {
            return Err(EngineError::InvalidSeekOffset(seconds));
        }
        self.send_command(Command::Seek(seconds)).await
    }

    async fn send_command(&self, cmd: Command) -> Result<()> {
        if self.transitioning.swap(true, Ordering::SeqCst) {
            return Err(EngineError::TransitionInProgress);
        }

        let result = async {
            let guard = self.cmd_tx.lock().await;
            let tx = guard.as_ref().ok_or(EngineError::NoTrackAvailable)?.clone();
            drop(guard);

            let (ack_tx, ack_rx) = oneshot::channel();
            tx.send((cmd, ack_tx))
                .await
                .map_err(|_| EngineError::NoTrackAvailable)?;
            let _ = ack_rx.await;
            Ok(())
        }
        .await;

        self.transitioning.store(false, Ordering::SeqCst);
        result
    }

    /// Maintient le tampon "sur le pont" à `min_queue_size` éléments, en
    /// appelant `NextTrackFetcher` à la demande. Idempotent et exclusif : un
    /// seul préchargement à la fois (`prefetching`).
    async fn ensure_prefetched(&self) {
        if self.prefetching.swap(true, Ordering::SeqCst) {
            return;
        }

        loop {
            let needs_more = self.on_deck.lock().await.len() < self.min_queue_size;
            if !needs_more {
                break;
            }

            match self.fetcher.next_track().await {
                Ok(track) => self.on_deck.lock().await.push_back(track),
                Err(err) => {
                    tracing::warn!(%err, "failed to pre-fetch next track");
                    break;
                }
            }
        }

        self.prefetching.store(false, Ordering::SeqCst);
    }

    async fn pop_next(&self) -> Option<Track> {
        self.on_deck.lock().await.pop_front()
    }

    async fn push_front(&self, track: Track) {
        self.on_deck.lock().await.push_front(track);
    }

    /// Boucle de lecture (§4.8). Seule tâche habilitée à muter `state`.
    async fn run(self: Arc<Self>, mut cmd_rx: mpsc::Receiver<(Command, oneshot::Sender<()>)>) {
        loop {
            self.ensure_prefetched().await;

            match self.pop_next().await {
                Some(track) => {
                    let outcome = self.run_track(track.clone(), 0, &mut cmd_rx).await;
                    self.handle_outcome(outcome, track).await;
                }
                None => {
                    self.run_silence(&mut cmd_rx).await;
                }
            }
        }
    }

    async fn handle_outcome(&self, outcome: Outcome, track: Track) {
        match outcome {
            Outcome::Advance | Outcome::Skip => {}
            Outcome::Previous => {
                let previous = self.state.lock().unwrap().previous.clone();
                match previous {
                    Some(prev) if track_file_exists(&prev).await => {
                        self.push_front(track).await;
                        self.push_front(prev).await;
                    }
                    _ => {
                        // No cached previous track: no-op, replay current.
                        self.push_front(track).await;
                    }
                }
            }
        }
    }

    /// Diffuse le silence (§4.8 étape 1) jusqu'à ce qu'une piste devienne
    /// disponible, qu'une commande arrive, ou que le pipeline lui-même
    /// s'arrête de façon inattendue.
    async fn run_silence(&self, cmd_rx: &mut mpsc::Receiver<(Command, oneshot::Sender<()>)>) {
        self.state.lock().unwrap().silence_mode = true;
        tracing::info!("no track available, entering silence mode");

        let node = Node::new_source(SilenceSourceLogic::new(SilenceConfig::default()));
        let pipeline = Box::new(node).start();
        let cancel_token = pipeline.cancellation_token();

        let mut pipeline_task: JoinHandle<radio_audio::Result<()>> =
            tokio::spawn(async move { pipeline.wait().await });

        let mut poll = tokio::time::interval(std::time::Duration::from_secs(1));

        loop {
            tokio::select! {
                maybe_cmd = cmd_rx.recv() => {
                    if let Some((_cmd, ack)) = maybe_cmd {
                        let _ = ack.send(());
                    }
                    break;
                }
                result = &mut pipeline_task => {
                    if let Ok(Err(err)) = result {
                        tracing::warn!(%err, "silence pipeline ended with an error");
                    }
                    self.state.lock().unwrap().silence_mode = false;
                    return;
                }
                _ = poll.tick() => {
                    if self.has_upcoming().await {
                        break;
                    }
                }
            }
        }

        cancel_token.cancel();
        let _ = pipeline_task.await;
        self.state.lock().unwrap().silence_mode = false;
    }

    async fn has_upcoming(&self) -> bool {
        !self.on_deck.lock().await.is_empty()
    }

    /// Joue `track` en boucle locale tant que `Seek` redémarre la même
    /// piste. Retourne dès que la piste se termine naturellement ou que
    /// `Skip`/`Previous` est reçu.
    async fn run_track(
        &self,
        mut track: Track,
        mut seek_offset: i64,
        cmd_rx: &mut mpsc::Receiver<(Command, oneshot::Sender<()>)>,
    ) -> Outcome {
        if track.bitrate == 0 {
            track.bitrate = bitrate::probe_bitrate(&track.url).await;
        }

        loop {
            {
                let mut state = self.state.lock().unwrap();
                let previous = state.current.take();
                state.previous = previous;
                state.current = Some(track.clone());
                state.started_at = Some(chrono::Utc::now() - chrono::Duration::seconds(seek_offset));
                state.silence_mode = false;
            }

            self.events.publish(Event::TrackChanged(TrackChanged {
                title: track.title.clone(),
                duration: track.duration,
                requested_by: track.requested_by.clone(),
            }));

            let source_node: Box<dyn AudioPipelineNode> = Box::new(Node::new_source(
                TrackSourceLogic::new(
                    track.url.clone(),
                    track.bitrate,
                    self.broadcaster.clone(),
                    self.events.clone(),
                ),
            ));

            let pipeline = source_node.start();
            let cancel_token = pipeline.cancellation_token();
            let mut pipeline_task: JoinHandle<radio_audio::Result<()>> =
                tokio::spawn(async move { pipeline.wait().await });

            let ticker_state = self.state.clone();
            let ticker_events = self.events.clone();
            let ticker_token = cancel_token.clone();
            let ticker_track_title = track.title.clone();
            let ticker: JoinHandle<()> = tokio::spawn(async move {
                let mut interval = tokio::time::interval(PROGRESS_TICK);
                loop {
                    tokio::select! {
                        _ = ticker_token.cancelled() => break,
                        _ = interval.tick() => {
                            let elapsed = ticker_state.lock().unwrap().elapsed_seconds();
                            ticker_events.publish(Event::Progress(radio_events::Progress {
                                title: ticker_track_title.clone(),
                                elapsed,
                            }));
                        }
                    }
                }
            });

            let command = tokio::select! {
                maybe_cmd = cmd_rx.recv() => maybe_cmd,
                result = &mut pipeline_task => {
                    cancel_token.cancel();
                    ticker.abort();
                    if let Ok(Err(err)) = result {
                        tracing::warn!(%err, title = %track.title, "track pipeline ended with an error");
                    }
                    return Outcome::Advance;
                }
            };

            cancel_token.cancel();
            ticker.abort();
            let _ = pipeline_task.await;

            match command {
                Some((Command::Skip, ack)) => {
                    let _ = ack.send(());
                    return Outcome::Skip;
                }
                Some((Command::Previous, ack)) => {
                    let _ = ack.send(());
                    return Outcome::Previous;
                }
                Some((Command::Seek(seconds), ack)) => {
                    let _ = ack.send(());
                    seek_offset = seconds;
                    continue;
                }
                None => return Outcome::Advance,
            }
        }
    }
}

async fn track_file_exists(track: &Track) -> bool {
    tokio::fs::try_exists(&track.url).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_state_starts_empty() {
        let state = EngineState::default();
        assert!(state.current.is_none());
        assert!(state.previous.is_none());
        assert_eq!(state.elapsed_seconds(), 0.0);
    }
}
