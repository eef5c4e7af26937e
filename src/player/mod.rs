pub mod lazy;
pub mod mpv;

pub use lazy::LazyMpv;
pub use mpv::{MpvOptions, MpvPlayer};
