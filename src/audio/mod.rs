pub mod alert;
pub mod file;
pub mod frame;
pub mod loudness;

pub use alert::AlertTone;
pub use file::{write_wav, AudioFile};
pub use frame::{AudioFrame, DISCORD_CHANNELS, DISCORD_SAMPLE_RATE};
pub use loudness::{rms, LoudnessMeter};
