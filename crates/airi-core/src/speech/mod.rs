//! Sentence segmentation and speech-text preparation for the TTS relay.

pub mod script;
pub mod segmenter;
