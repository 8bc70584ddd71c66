//! Stem pair loading
//!
//! - [`AssetLoader`] does the work synchronously: joint fetch, joint decode,
//!   duration validation.
//! - [`BackgroundLoader`] runs it on a named thread so the control loop keeps
//!   answering while a pair downloads; results come back on a channel.

mod assets;
mod background;

pub use assets::{AssetLoader, LoadError, LoadedStems, LOAD_FAILED_MESSAGE};
pub use background::{BackgroundLoader, LoadResult};
