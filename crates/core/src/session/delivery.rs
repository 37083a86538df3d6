use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::Result;
use crate::media::Packetizer;
use crate::source::FrameSource;
use crate::transport::interleaved;

/// Timing and framing for one delivery loop.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryConfig {
    /// Interleaved channel carrying RTP.
    pub channel: u8,
    /// How often the cancellation flag is checked. Clamped to the frame
    /// interval.
    pub poll_interval: Duration,
    pub frame_interval: Duration,
    pub timestamp_increment: u32,
}

enum Step {
    Continue,
    EndOfStream,
    Lost,
}

/// Handle to a running RTP delivery thread.
///
/// The thread pulls frames from the bound source, packetizes them and
/// writes `$`-framed RTP to the shared connection writer until the
/// cancellation flag is raised, the source ends, or a write fails.
pub struct Delivery {
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<Box<dyn Packetizer>>>,
}

impl Delivery {
    /// Spawn the delivery thread. A write failure raises `lost`.
    pub fn start<W>(
        source: Arc<Mutex<Box<dyn FrameSource>>>,
        packetizer: Box<dyn Packetizer>,
        writer: Arc<Mutex<W>>,
        config: DeliveryConfig,
        lost: Arc<AtomicBool>,
    ) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        let handle = thread::Builder::new()
            .name("rtp-delivery".into())
            .spawn(move || run(source, packetizer, writer, config, flag, lost))?;
        Ok(Self {
            cancel,
            handle: Some(handle),
        })
    }

    /// Whether the thread is still delivering.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Raise the cancellation flag and wait for the thread to acknowledge
    /// by exiting. Returns the packetizer so sequence numbers continue on
    /// the next PLAY.
    pub fn stop(mut self) -> Option<Box<dyn Packetizer>> {
        self.cancel_and_join()
    }

    fn cancel_and_join(&mut self) -> Option<Box<dyn Packetizer>> {
        self.cancel.store(true, Ordering::SeqCst);
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(packetizer) => Some(packetizer),
            Err(_) => {
                tracing::error!("delivery thread panicked");
                None
            }
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        self.cancel_and_join();
    }
}

fn run<W: Write>(
    source: Arc<Mutex<Box<dyn FrameSource>>>,
    mut packetizer: Box<dyn Packetizer>,
    writer: Arc<Mutex<W>>,
    config: DeliveryConfig,
    cancel: Arc<AtomicBool>,
    lost: Arc<AtomicBool>,
) -> Box<dyn Packetizer> {
    let poll = config
        .poll_interval
        .min(config.frame_interval)
        .max(Duration::from_millis(1));
    let mut next_due = Instant::now();
    let mut frames = 0u64;

    tracing::debug!(channel = config.channel, ?poll, frame_interval = ?config.frame_interval, "delivery started");

    while !cancel.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now < next_due {
            thread::sleep(poll.min(next_due - now));
            continue;
        }
        next_due += config.frame_interval;
        if next_due < now {
            next_due = now + config.frame_interval;
        }

        match step(&source, packetizer.as_mut(), &writer, &config) {
            Step::Continue => frames += 1,
            Step::EndOfStream => break,
            Step::Lost => {
                lost.store(true, Ordering::SeqCst);
                break;
            }
        }
    }

    tracing::debug!(frames, cancelled = cancel.load(Ordering::SeqCst), "delivery stopped");
    packetizer
}

fn step<W: Write>(
    source: &Mutex<Box<dyn FrameSource>>,
    packetizer: &mut dyn Packetizer,
    writer: &Mutex<W>,
    config: &DeliveryConfig,
) -> Step {
    let frame = match source.lock().next_frame() {
        Ok(Some(frame)) => frame,
        Ok(None) => {
            tracing::info!("end of stream");
            return Step::EndOfStream;
        }
        Err(e) => {
            tracing::warn!(error = %e, "frame source failed");
            return Step::EndOfStream;
        }
    };

    let packets = match packetizer.packetize(&frame, config.timestamp_increment) {
        Ok(packets) => packets,
        Err(e) => {
            tracing::warn!(error = %e, frame_len = frame.len(), "packetization failed");
            return Step::EndOfStream;
        }
    };

    let mut writer = writer.lock();
    for packet in &packets {
        let written = interleaved::encode_block(config.channel, packet)
            .and_then(|block| writer.write_all(&block).map_err(Into::into));
        if let Err(e) = written {
            tracing::warn!(error = %e, "RTP write failed, session lost");
            return Step::Lost;
        }
    }
    if let Err(e) = writer.flush() {
        tracing::warn!(error = %e, "RTP flush failed, session lost");
        return Step::Lost;
    }
    tracing::trace!(packets = packets.len(), "frame sent");
    Step::Continue
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::media::FramePacketizer;
    use crate::media::rtp::{RtpPacket, RtpSequencer};
    use crate::source::VecSource;

    struct Endless;

    impl FrameSource for Endless {
        fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
            Ok(Some(vec![0x55; 32]))
        }
    }

    /// Every write fails with the given kind.
    struct FailingWriter(io::ErrorKind);

    impl Write for FailingWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(self.0.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn config(frame_ms: u64) -> DeliveryConfig {
        DeliveryConfig {
            channel: 0,
            poll_interval: Duration::from_millis(20),
            frame_interval: Duration::from_millis(frame_ms),
            timestamp_increment: 4500,
        }
    }

    fn packetizer() -> Box<dyn Packetizer> {
        Box::new(FramePacketizer::with_sequencer(RtpSequencer::new(26, 0xCAFE), 90000))
    }

    fn wait_finished(delivery: &Delivery) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while delivery.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn decode_all(mut buf: &[u8]) -> Vec<(u8, RtpPacket)> {
        let mut out = Vec::new();
        while !buf.is_empty() {
            let (channel, data) = interleaved::read_block(&mut buf).unwrap();
            out.push((channel, RtpPacket::decode(&data).unwrap()));
        }
        out
    }

    #[test]
    fn delivers_every_frame_then_stops() {
        let source: Box<dyn FrameSource> =
            Box::new(VecSource::new(vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]));
        let writer = Arc::new(Mutex::new(Vec::new()));
        let lost = Arc::new(AtomicBool::new(false));

        let delivery = Delivery::start(
            Arc::new(Mutex::new(source)),
            packetizer(),
            writer.clone(),
            config(1),
            lost.clone(),
        )
        .unwrap();
        wait_finished(&delivery);
        let packetizer = delivery.stop().unwrap();

        let packets = decode_all(&writer.lock());
        assert_eq!(packets.len(), 3);
        assert!(packets.iter().all(|(channel, _)| *channel == 0));
        assert_eq!(packets[1].1.payload, b"two");
        assert_eq!(packets[2].1.header.sequence, 2);
        assert_eq!(packets[2].1.header.timestamp, 9000);
        assert_eq!(packetizer.next_sequence(), 3);
        assert!(!lost.load(Ordering::SeqCst));
    }

    #[test]
    fn stop_cancels_and_joins() {
        let source: Box<dyn FrameSource> = Box::new(Endless);
        let writer = Arc::new(Mutex::new(Vec::new()));
        let delivery = Delivery::start(
            Arc::new(Mutex::new(source)),
            packetizer(),
            writer.clone(),
            config(5),
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(60));
        assert!(delivery.is_running());
        assert!(delivery.stop().is_some());

        let len = writer.lock().len();
        assert!(len > 0);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(writer.lock().len(), len, "no writes after stop returns");
    }

    fn assert_failure_marks_lost(kind: io::ErrorKind) {
        let source: Box<dyn FrameSource> = Box::new(Endless);
        let lost = Arc::new(AtomicBool::new(false));
        let delivery = Delivery::start(
            Arc::new(Mutex::new(source)),
            packetizer(),
            Arc::new(Mutex::new(FailingWriter(kind))),
            config(1),
            lost.clone(),
        )
        .unwrap();

        wait_finished(&delivery);
        assert!(!delivery.is_running(), "{kind:?}");
        assert!(lost.load(Ordering::SeqCst), "{kind:?}");
    }

    #[test]
    fn write_failure_marks_lost() {
        assert_failure_marks_lost(io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn write_timeout_marks_lost() {
        // a socket write timeout surfaces as WouldBlock or TimedOut
        assert_failure_marks_lost(io::ErrorKind::WouldBlock);
        assert_failure_marks_lost(io::ErrorKind::TimedOut);
    }
}
