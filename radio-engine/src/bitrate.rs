//! Sondage paresseux du débit binaire d'une piste (§4.8)
//!
//! `ffmpeg -i <file> -f null -` n'écrit rien sur stdout mais décrit le flux
//! d'entrée sur stderr, dont une ligne `Stream #0:0: Audio: mp3, 44100 Hz,
//! stereo, fltp, 128 kb/s` porte le débit. On évite ainsi d'ajouter une
//! dépendance dédiée au parsing d'en-têtes MP3 : ffmpeg est déjà une
//! dépendance d'exécution incontournable pour le transcodage.

use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Débit par défaut utilisé quand la sonde échoue ou que le fichier est
/// introuvable.
pub const DEFAULT_BITRATE: u32 = 128_000;

/// Sonde le débit binaire (en bit/s) d'un fichier audio local.
pub async fn probe_bitrate(path: &str) -> u32 {
    match run_probe(path).await {
        Ok(Some(bitrate)) => bitrate,
        Ok(None) => {
            tracing::warn!(path, "could not parse bitrate from ffmpeg stderr, defaulting");
            DEFAULT_BITRATE
        }
        Err(err) => {
            tracing::warn!(path, %err, "bitrate probe failed, defaulting");
            DEFAULT_BITRATE
        }
    }
}

async fn run_probe(path: &str) -> std::io::Result<Option<u32>> {
    let mut child = Command::new("ffmpeg")
        .args(["-i", path, "-f", "null", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let mut stderr = String::new();
    if let Some(mut pipe) = child.stderr.take() {
        pipe.read_to_string(&mut stderr).await?;
    }
    let _ = child.wait().await;

    Ok(parse_bitrate_kbps(&stderr).map(|kbps| kbps * 1000))
}

/// Cherche la première occurrence `<n> kb/s` dans une ligne `Audio: ...`.
fn parse_bitrate_kbps(stderr: &str) -> Option<u32> {
    for line in stderr.lines() {
        let Some(audio_pos) = line.find("Audio:") else {
            continue;
        };
        let rest = &line[audio_pos..];
        if let Some(kbps) = extract_kbps(rest) {
            return Some(kbps);
        }
    }
    None
}

fn extract_kbps(text: &str) -> Option<u32> {
    let idx = text.find("kb/s")?;
    let before = &text[..idx];
    let digits: String = before
        .chars()
        .rev()
        .skip_while(|c| c.is_whitespace())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.chars().rev().collect::<String>().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bitrate_from_typical_ffmpeg_stderr() {
        let stderr = "Input #0, mp3, from 'track.mp3':\n  Duration: 00:03:21.45, start: 0.000000, bitrate: 128 kb/s\n    Stream #0:0: Audio: mp3, 44100 Hz, stereo, fltp, 128 kb/s\n";
        assert_eq!(parse_bitrate_kbps(stderr), Some(128));
    }

    #[test]
    fn returns_none_when_no_audio_line_present() {
        let stderr = "ffmpeg version 6.0\nsome unrelated output\n";
        assert_eq!(parse_bitrate_kbps(stderr), None);
    }

    #[test]
    fn picks_first_audio_stream_when_multiple_present() {
        let stderr = "Stream #0:0: Audio: aac, 48000 Hz, stereo, fltp, 192 kb/s\nStream #0:1: Video: h264\n";
        assert_eq!(parse_bitrate_kbps(stderr), Some(192));
    }
}
