//! Interactive chat surfaces: local terminal chat and the speaking
//! client that relays a remote service through text-to-speech.

pub mod input;
pub mod loop_runner;
pub mod speak_runner;
