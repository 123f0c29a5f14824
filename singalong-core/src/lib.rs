// singalong-core/src/lib.rs

//! The core of the sing-along pitch trainer.
//! This crate turns blocks of audio into pitch estimates, note names and
//! singer-versus-reference feedback. It is headless: audio capture helpers
//! live in `audio`, but nothing here draws or plays anything.

pub mod audio;
pub mod compare;
pub mod config;
pub mod error;
pub mod fft;
pub mod filter;
pub mod gate;
pub mod pitch;
pub mod session;
pub mod timeline;
pub mod tuning;

pub use audio::AudioBlock;
pub use compare::{Adjust, Comparator, Comparison, MatchResult, MatchTier};
pub use config::{EngineConfig, SourceConfig, VocalBand, VocalPreset};
pub use error::{Error, Result};
pub use gate::{SignalGate, SignalLevel};
pub use pitch::{Algorithm, Detection, PitchDetector};
pub use session::{FrameReport, Monitor, MonitorState, SourceFrame, SourcePipeline};
pub use timeline::{PitchTimeline, TimelinePoint};
pub use tuning::{NoteResult, PitchClass, frequency_to_note};
