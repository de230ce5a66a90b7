//! Speech-to-text providers: a remote Whisper endpoint and a local
//! whisper.cpp binary, behind one trait.

pub mod stt;

pub use stt::{
    AudioFormat, Segment, SttProvider, TranscribeRequest, Transcript, local::LocalWhisperStt,
    whisper::WhisperStt,
};
