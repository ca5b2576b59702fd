//! Streaming speech-to-text client.

pub mod recognizer;

pub use recognizer::{
    MockRecognizer, Recognizer, RecognizerStream, StreamBackend, StreamOptions, encode_pcm16_le,
};
