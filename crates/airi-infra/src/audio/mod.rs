//! Speech playback: the synthesizer/player process pair and the
//! single-writer worker that feeds it.

pub mod pipeline;
pub mod worker;
