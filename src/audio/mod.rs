// Module audio - anchor buffer, decoding, resampling and cpal playback

pub mod anchor;
pub mod decode;
pub mod playback;
pub mod resample;

pub use anchor::{AnchorPlayer, AudioAnchor, SharedAnchor};
pub use decode::load_anchor;
pub use playback::CpalAnchorPlayer;
pub use resample::resample_anchor;
