use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rtsp::{FrameSource, Result, RtspError, SourceFactory};

/// Width of the ASCII length prefix in front of every frame.
const PREFIX_LEN: usize = 5;

/// Frames stored as `<5 decimal digits><frame bytes>` back to back.
pub struct LengthPrefixedFile {
    reader: Option<BufReader<File>>,
    path: PathBuf,
    frame_number: u64,
}

impl LengthPrefixedFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| RtspError::SourceUnavailable(format!("{}: {e}", path.display())))?;
        Ok(Self {
            reader: Some(BufReader::new(file)),
            path: path.to_path_buf(),
            frame_number: 0,
        })
    }

    /// Factory opening `path` for every session, whatever mount it was
    /// requested through.
    pub fn factory(path: PathBuf) -> Arc<dyn SourceFactory> {
        Arc::new(move |_: &str| -> Result<Box<dyn FrameSource>> {
            Ok(Box::new(LengthPrefixedFile::open(&path)?))
        })
    }

    fn corrupt(&self, what: &str) -> RtspError {
        RtspError::SourceUnavailable(format!(
            "{}: frame {}: {what}",
            self.path.display(),
            self.frame_number
        ))
    }
}

impl FrameSource for LengthPrefixedFile {
    fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        let mut prefix = [0u8; PREFIX_LEN];
        let filled = read_full(reader, &mut prefix)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < PREFIX_LEN {
            return Err(self.corrupt("truncated length prefix"));
        }

        let Some(len) = std::str::from_utf8(&prefix)
            .ok()
            .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse::<usize>().ok())
        else {
            return Err(self.corrupt("length prefix is not decimal"));
        };

        let mut frame = vec![0u8; len];
        if read_full(reader, &mut frame)? < len {
            return Err(self.corrupt("truncated frame"));
        }
        self.frame_number += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            tracing::debug!(path = %self.path.display(), frames = self.frame_number, "file source closed");
        }
    }
}

/// Fill `buf` as far as the reader allows. Returns the bytes read.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
