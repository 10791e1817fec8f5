//! Dedicated speech worker.
//!
//! A single always-alive background task owns the speech pipeline and is
//! the only writer to its input pipe. Sentences arrive on a bounded queue
//! in generation order; an explicit shutdown job drains the pipeline and
//! ends the task after the final segment.
//!
//! A missing synthesizer or player disables audio for the session with a
//! warning; the worker then swallows jobs so chat continues silently.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use airi_core::speech::script::speech_script;
use airi_types::config::VoiceConfig;

use super::pipeline::SpeechPipeline;

/// Queue capacity; generation outpacing playback blocks the sender
/// instead of growing without bound.
const QUEUE_CAPACITY: usize = 64;

/// Work items for the speech worker.
enum SpeechJob {
    Sentence(String),
    Shutdown,
}

/// Handle to the background speech worker.
pub struct SpeechWorker {
    sender: mpsc::Sender<SpeechJob>,
    handle: JoinHandle<()>,
}

impl SpeechWorker {
    /// Start the worker. The pipeline is spawned inside the worker so a
    /// missing tool never fails the chat session.
    pub fn spawn(voice: VoiceConfig) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let handle = tokio::task::spawn_blocking(move || run(voice, receiver));
        Self { sender, handle }
    }

    /// Queue one sentence for playback.
    pub async fn speak(&self, sentence: String) {
        if self.sender.send(SpeechJob::Sentence(sentence)).await.is_err() {
            warn!("speech worker is gone; dropping sentence");
        }
    }

    /// Signal shutdown and wait for the pipeline to drain.
    pub async fn shutdown(self) {
        let _ = self.sender.send(SpeechJob::Shutdown).await;
        let _ = self.handle.await;
    }
}

fn run(voice: VoiceConfig, mut receiver: mpsc::Receiver<SpeechJob>) {
    let mut pipeline = match SpeechPipeline::spawn(&voice) {
        Ok(pipeline) => Some(pipeline),
        Err(e) => {
            warn!(error = %e, "audio disabled for this session");
            None
        }
    };

    while let Some(job) = receiver.blocking_recv() {
        match job {
            SpeechJob::Sentence(sentence) => {
                let script = speech_script(&sentence);
                if script.is_empty() {
                    continue;
                }
                if let Some(p) = pipeline.as_mut() {
                    if let Err(e) = p.speak_line(&script) {
                        warn!(error = %e, "speech pipeline failed; audio disabled");
                        if let Some(dead) = pipeline.take() {
                            dead.close();
                        }
                    }
                }
            }
            SpeechJob::Shutdown => break,
        }
    }

    if let Some(p) = pipeline.take() {
        p.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_worker_survives_missing_tools() {
        let voice = VoiceConfig {
            synthesizer: "airi-test-no-such-synth".to_string(),
            player: "airi-test-no-such-player".to_string(),
            ..VoiceConfig::default()
        };

        let worker = SpeechWorker::spawn(voice);
        worker.speak("Hello there.".to_string()).await;
        worker.speak("Second sentence.".to_string()).await;
        // Shutdown must complete even though no pipeline ever existed.
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_without_jobs() {
        let voice = VoiceConfig {
            synthesizer: "airi-test-no-such-synth".to_string(),
            ..VoiceConfig::default()
        };
        SpeechWorker::spawn(voice).shutdown().await;
    }
}
