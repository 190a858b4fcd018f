pub mod decoder;
pub mod handler;
pub mod memory;
pub mod pcm;
pub mod stream_info;

pub use decoder::{
    AudioDecoder, DecodeError, EncodedFrame, MediaHandler, MediaParser, PcmChunk, SoundDecoder,
    SoundOutput, StreamProvider, VideoDecoder, VideoFrame,
};
pub use handler::DefaultMediaHandler;
pub use memory::MemoryParser;
pub use pcm::PcmDecoder;
pub use stream_info::{AudioCodec, AudioInfo, SoundInfo, StreamKind, VideoInfo};
