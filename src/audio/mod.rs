pub mod analyser;
pub mod backend;
pub mod device;
pub mod pcm;
pub mod playback;

pub use analyser::Analyser;
pub use backend::{
    AudioBackendFactory, CaptureBackend, CaptureBlock, CaptureConfig, CaptureConstraints,
    CaptureError,
};
pub use device::CpalAudio;
pub use pcm::{AudioBlob, DecodeError};
pub use playback::{
    decode_audio_data, PlaybackBuffer, PlaybackError, PlaybackScheduler, PlaybackSink, SourceId,
};
