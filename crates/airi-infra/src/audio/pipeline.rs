//! Chained synthesizer/player subprocess pair.
//!
//! `piper --model <voice> --output-raw` produces raw PCM on stdout, piped
//! directly into `aplay -q -r <rate> -f S16_LE -c 1 -`. One pipeline lives
//! for a whole chat session; sentences are written one line at a time to
//! the synthesizer's stdin.

use std::io::Write;
use std::process::{Child, ChildStdin, Command, Stdio};

use tracing::debug;

use airi_types::config::VoiceConfig;
use airi_types::error::AudioError;

/// A running synthesizer + player pair.
///
/// Owning this struct is the write permit: only one writer may exist for
/// the synthesizer pipe at a time.
pub struct SpeechPipeline {
    synthesizer: Child,
    player: Child,
    stdin: ChildStdin,
}

impl SpeechPipeline {
    /// Spawn both processes and wire synthesizer stdout into player stdin.
    pub fn spawn(voice: &VoiceConfig) -> Result<Self, AudioError> {
        let mut synthesizer = Command::new(&voice.synthesizer)
            .arg("--model")
            .arg(&voice.model)
            .arg("--output-raw")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| spawn_error(&voice.synthesizer, e))?;

        let synth_out = synthesizer
            .stdout
            .take()
            .ok_or_else(|| AudioError::SpawnFailed("synthesizer stdout unavailable".to_string()))?;
        let stdin = synthesizer
            .stdin
            .take()
            .ok_or_else(|| AudioError::SpawnFailed("synthesizer stdin unavailable".to_string()))?;

        let player = Command::new(&voice.player)
            .args(["-q", "-r", &voice.sample_rate.to_string(), "-f", "S16_LE", "-c", "1", "-"])
            .stdin(Stdio::from(synth_out))
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                let _ = synthesizer.kill();
                let _ = synthesizer.wait();
                spawn_error(&voice.player, e)
            })?;

        debug!(
            synthesizer = %voice.synthesizer,
            player = %voice.player,
            rate = voice.sample_rate,
            "speech pipeline started"
        );

        Ok(Self {
            synthesizer,
            player,
            stdin,
        })
    }

    /// Write one sentence to the synthesizer.
    pub fn speak_line(&mut self, text: &str) -> Result<(), AudioError> {
        self.stdin
            .write_all(text.as_bytes())
            .and_then(|_| self.stdin.write_all(b"\n"))
            .and_then(|_| self.stdin.flush())
            .map_err(|e| AudioError::PipeClosed(e.to_string()))
    }

    /// Close the input pipe and wait for both processes to drain.
    pub fn close(self) {
        let Self {
            mut synthesizer,
            mut player,
            stdin,
        } = self;
        drop(stdin);
        let _ = synthesizer.wait();
        let _ = player.wait();
    }
}

fn spawn_error(program: &str, err: std::io::Error) -> AudioError {
    if err.kind() == std::io::ErrorKind::NotFound {
        AudioError::ToolMissing(program.to_string())
    } else {
        AudioError::SpawnFailed(format!("{program}: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_synthesizer_reports_tool() {
        let voice = VoiceConfig {
            synthesizer: "airi-test-no-such-synth".to_string(),
            ..VoiceConfig::default()
        };
        let err = SpeechPipeline::spawn(&voice)
            .err()
            .expect("spawn should fail for a missing synthesizer");
        match err {
            AudioError::ToolMissing(tool) => assert_eq!(tool, "airi-test-no-such-synth"),
            other => panic!("expected ToolMissing, got {other:?}"),
        }
    }
}
