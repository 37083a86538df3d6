//! Frame source boundary.
//!
//! The stack never encodes video. A [`SourceFactory`] opens a
//! [`FrameSource`] for a mount path, and the delivery loop pulls encoded
//! frames from it until it returns `None`.

use std::sync::Arc;

use crate::error::Result;

/// A stream of encoded frames.
pub trait FrameSource: Send {
    /// Next encoded frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Vec<u8>>>;

    /// Release the underlying resource. Called once when the session
    /// unbinds or tears down.
    fn close(&mut self) {}
}

/// Opens frame sources for a mount.
pub trait SourceFactory: Send + Sync {
    fn open(&self, path: &str) -> Result<Box<dyn FrameSource>>;
}

impl<F> SourceFactory for F
where
    F: Fn(&str) -> Result<Box<dyn FrameSource>> + Send + Sync,
{
    fn open(&self, path: &str) -> Result<Box<dyn FrameSource>> {
        self(path)
    }
}

/// Serves a fixed list of frames, then ends.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    frames: std::collections::VecDeque<Vec<u8>>,
}

impl VecSource {
    pub fn new(frames: Vec<Vec<u8>>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    /// Factory handing every opener its own copy of `frames`.
    pub fn factory(frames: Vec<Vec<u8>>) -> Arc<dyn SourceFactory> {
        Arc::new(move |_: &str| -> Result<Box<dyn FrameSource>> {
            Ok(Box::new(VecSource::new(frames.clone())))
        })
    }
}

impl FrameSource for VecSource {
    fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.frames.pop_front())
    }
}
