//! TrackSourceLogic - transcode une piste en temps réel et diffuse chaque
//! chunk dans l'ordre vers Broadcaster, les enfants du pipeline (IcecastSink)
//! et l'EventBus (§4.8 étape 3, §5 garantie d'ordre par section critique
//! unique par chunk).

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use radio_audio::pipeline::{NodeLogic, StopReason};
use radio_audio::{AudioError, Broadcaster};
use radio_events::{Event, EventBus};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Taille de lecture fixe sur stdout du transcodeur (§4.8 étape 3).
const CHUNK_SIZE: usize = 4096;
/// Délai de grâce avant SIGKILL une fois stdin fermé (§4.8 étape "Transitions").
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Logique de source qui transcode un fichier local en MP3 via `ffmpeg -re`
/// et publie chaque chunk lu sur stdout vers les trois destinations citées
/// par §4.8 étape 3, dans l'ordre Broadcaster → enfants du pipeline → EventBus.
pub struct TrackSourceLogic {
    path: String,
    bitrate_bps: u32,
    broadcaster: Arc<Broadcaster>,
    events: EventBus,
    child: Option<Child>,
}

impl TrackSourceLogic {
    pub fn new(
        path: impl Into<String>,
        bitrate_bps: u32,
        broadcaster: Arc<Broadcaster>,
        events: EventBus,
    ) -> Self {
        Self {
            path: path.into(),
            bitrate_bps,
            broadcaster,
            events,
            child: None,
        }
    }

    fn bitrate_kbps_arg(&self) -> String {
        let kbps = (self.bitrate_bps / 1000).max(1);
        format!("{kbps}k")
    }

    async fn spawn_ffmpeg(&self) -> std::io::Result<Child> {
        Command::new("ffmpeg")
            .args([
                "-re",
                "-i",
                &self.path,
                "-f",
                "mp3",
                "-ab",
                &self.bitrate_kbps_arg(),
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
    }

    /// Ferme proprement le transcodeur actif : EOF sur stdin (aucun stdin ici
    /// car le flux d'entrée est un fichier, donc directement le délai de
    /// grâce), puis SIGKILL s'il n'a pas quitté à temps.
    async fn terminate(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        match tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
        }
    }
}

#[async_trait]
impl NodeLogic for TrackSourceLogic {
    async fn process(
        &mut self,
        _input: Option<mpsc::Receiver<Bytes>>,
        output: Vec<mpsc::Sender<Bytes>>,
        stop_token: CancellationToken,
    ) -> Result<(), AudioError> {
        let mut child = self
            .spawn_ffmpeg()
            .await
            .map_err(|e| AudioError::Processing(format!("failed to spawn transcoder: {e}")))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| AudioError::Processing("transcoder stdout unavailable".to_string()))?;

        let mut first_chunk = true;

        loop {
            let mut buf = BytesMut::zeroed(CHUNK_SIZE);

            let read = tokio::select! {
                _ = stop_token.cancelled() => {
                    self.child = Some(child);
                    break;
                }
                read = stdout.read(&mut buf) => read,
            };

            match read {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = buf.split_to(n).freeze();

                    self.broadcaster.publish(chunk.clone());

                    for tx in &output {
                        let _ = tx.send(chunk.clone()).await;
                    }

                    if first_chunk {
                        self.events.publish(Event::BufferHeader(chunk.clone()));
                        first_chunk = false;
                    }
                    self.events.publish(Event::Stream(chunk));
                }
                Err(err) => {
                    tracing::warn!(path = %self.path, %err, "transcoder stdout read failed, treating as EOF");
                    break;
                }
            }
        }

        if self.child.is_none() {
            self.child = Some(child);
        }

        Ok(())
    }

    async fn cleanup(&mut self, _reason: StopReason) -> Result<(), AudioError> {
        self.terminate().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitrate_arg_rounds_down_to_whole_kbps() {
        let logic = TrackSourceLogic::new(
            "track.mp3",
            128_500,
            Arc::new(Broadcaster::new(8)),
            EventBus::new(),
        );
        assert_eq!(logic.bitrate_kbps_arg(), "128k");
    }

    #[test]
    fn zero_bitrate_clamps_to_one_kbps_to_keep_ffmpeg_happy() {
        let logic = TrackSourceLogic::new(
            "track.mp3",
            0,
            Arc::new(Broadcaster::new(8)),
            EventBus::new(),
        );
        assert_eq!(logic.bitrate_kbps_arg(), "1k");
    }
}
