//! SilenceGenerator - remplit l'antenne quand aucune piste n'est disponible
//!
//! §4.5 fixe le format de sortie au niveau trame MP3 (en-tête `FF FB 90 00`,
//! taille de trame dérivée du débit/fréquence d'échantillonnage, corps à
//! zéro) : on génère donc directement ces trames plutôt que de faire
//! transcoder du silence PCM par un process `ffmpeg` dédié, ce qui
//! économise un sous-processus pour produire un flux dont le contenu est
//! entièrement déterministe et déjà spécifié octet par octet.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use radio_audio::pipeline::{NodeLogic, StopReason};
use radio_audio::AudioError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x00];

/// Paramètres de la trame MP3 silencieuse.
#[derive(Debug, Clone, Copy)]
pub struct SilenceConfig {
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            bitrate_kbps: 128,
            sample_rate: 44100,
        }
    }
}

impl SilenceConfig {
    /// Taille d'une trame MPEG-1 Layer III pour ce débit/fréquence.
    pub fn frame_size(&self) -> usize {
        (144 * self.bitrate_kbps as u64 * 1000 / self.sample_rate as u64) as usize
    }
}

/// Générateur de trames MP3 silencieuses, consommées au rythme du décodeur
/// en aval (pas de pacing interne : c'est à l'appelant de cadencer `next_frame`).
pub struct SilenceGenerator {
    config: SilenceConfig,
}

impl SilenceGenerator {
    pub fn new(config: SilenceConfig) -> Self {
        Self { config }
    }

    pub fn next_frame(&self) -> Bytes {
        let size = self.config.frame_size();
        let mut frame = BytesMut::with_capacity(size);
        frame.extend_from_slice(&FRAME_HEADER);
        frame.resize(size, 0);
        frame.freeze()
    }
}

/// Intervalle réel entre deux trames, pour caler l'émission sur le débit
/// nominal plutôt que de pousser les trames aussi vite que possible.
fn frame_interval(config: &SilenceConfig) -> std::time::Duration {
    let bytes_per_second = (config.bitrate_kbps as f64 * 1000.0) / 8.0;
    let seconds = config.frame_size() as f64 / bytes_per_second;
    std::time::Duration::from_secs_f64(seconds)
}

/// Source de pipeline (`NodeLogic`) émettant le silence ad infinitum vers
/// `Broadcaster`/`IcecastSink` via le canal `output`, jusqu'à annulation.
pub struct SilenceSourceLogic {
    config: SilenceConfig,
}

impl SilenceSourceLogic {
    pub fn new(config: SilenceConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl NodeLogic for SilenceSourceLogic {
    async fn process(
        &mut self,
        _input: Option<mpsc::Receiver<Bytes>>,
        output: Vec<mpsc::Sender<Bytes>>,
        stop_token: CancellationToken,
    ) -> Result<(), AudioError> {
        let generator = SilenceGenerator::new(self.config);
        let interval = frame_interval(&self.config);
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = stop_token.cancelled() => break,
                _ = ticker.tick() => {
                    let frame = generator.next_frame();
                    for tx in &output {
                        let _ = tx.send(frame.clone()).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn cleanup(&mut self, _reason: StopReason) -> Result<(), AudioError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_size_matches_default_128kbps_44100hz() {
        let config = SilenceConfig::default();
        assert_eq!(config.frame_size(), 417);
    }

    #[test]
    fn frame_starts_with_mp3_header_and_is_zero_padded() {
        let generator = SilenceGenerator::new(SilenceConfig::default());
        let frame = generator.next_frame();
        assert_eq!(&frame[0..4], &FRAME_HEADER);
        assert!(frame[4..].iter().all(|&b| b == 0));
        assert_eq!(frame.len(), 417);
    }

    #[test]
    fn lower_bitrate_yields_smaller_frame() {
        let config = SilenceConfig {
            bitrate_kbps: 64,
            sample_rate: 44100,
        };
        assert_eq!(config.frame_size(), 208);
    }
}
