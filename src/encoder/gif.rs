//! GIF animation encoding on a background worker

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, Rgba, RgbaImage};
use log::{debug, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::{AnimatedEncoder, AnimatedSession, EncodeError, EncoderConfig};

/// Looping GIF encoder.
///
/// Not ready until [`GifEncoderService::init`] has run once; `init` performs a
/// one-frame probe encode so a broken codec shows up at startup rather than
/// halfway through an export.
#[derive(Debug, Default)]
pub struct GifEncoderService {
    ready: AtomicBool,
}

impl GifEncoderService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and initialize in one step
    pub fn initialized() -> Result<Self, EncodeError> {
        let service = Self::new();
        service.init()?;
        Ok(service)
    }

    /// Probe the codec and mark the service ready. Safe to call more than once.
    pub fn init(&self) -> Result<(), EncodeError> {
        if self.ready.load(Ordering::Acquire) {
            return Ok(());
        }
        let mut probe = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut probe);
            let frame = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0]));
            encoder.encode_frame(Frame::new(frame))?;
        }
        debug!("GIF encoder ready (probe {} bytes)", probe.len());
        self.ready.store(true, Ordering::Release);
        Ok(())
    }
}

impl AnimatedEncoder for GifEncoderService {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn configure(&self, config: EncoderConfig) -> Result<Box<dyn AnimatedSession>, EncodeError> {
        if !self.is_ready() {
            return Err(EncodeError::NotReady);
        }
        Ok(Box::new(GifSession::spawn(config)?))
    }
}

type QueuedFrame = (RgbaImage, Duration);

/// Frames are handed to the worker through a bounded channel so at most
/// `concurrency` buffers are alive at once.
struct GifSession {
    config: EncoderConfig,
    sender: Option<SyncSender<QueuedFrame>>,
    worker: Option<JoinHandle<Result<Vec<u8>, EncodeError>>>,
}

impl GifSession {
    fn spawn(config: EncoderConfig) -> Result<Self, EncodeError> {
        let (sender, receiver) = sync_channel(config.concurrency.max(1));
        let quality = config.quality.clamp(1, 30);
        let worker = thread::Builder::new()
            .name("sslice-gif".to_string())
            .spawn(move || encode_worker(receiver, quality))?;
        Ok(Self { config, sender: Some(sender), worker: Some(worker) })
    }

    fn join_worker(&mut self) -> Result<Vec<u8>, EncodeError> {
        self.sender = None;
        match self.worker.take() {
            Some(handle) => handle.join().map_err(|_| EncodeError::WorkerLost)?,
            None => Err(EncodeError::WorkerLost),
        }
    }
}

impl AnimatedSession for GifSession {
    fn add_frame(&mut self, frame: RgbaImage, delay: Duration) -> Result<(), EncodeError> {
        if frame.dimensions() != (self.config.width, self.config.height) {
            return Err(EncodeError::FrameSize {
                expected_w: self.config.width,
                expected_h: self.config.height,
                actual_w: frame.width(),
                actual_h: frame.height(),
            });
        }
        let sender = self.sender.as_ref().ok_or(EncodeError::WorkerLost)?;
        if sender.send((frame, delay)).is_err() {
            // Worker bailed out early; surface its error instead of a generic one
            return match self.join_worker() {
                Err(e) => Err(e),
                Ok(_) => Err(EncodeError::WorkerLost),
            };
        }
        Ok(())
    }

    fn render(mut self: Box<Self>) -> Result<Vec<u8>, EncodeError> {
        self.join_worker()
    }
}

fn encode_worker(frames: Receiver<QueuedFrame>, quality: i32) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::new();
    let mut count = 0usize;
    {
        let mut encoder = GifEncoder::new_with_speed(&mut bytes, quality);
        encoder.set_repeat(Repeat::Infinite)?;

        for (image, delay) in frames {
            let frame = Frame::from_parts(image, 0, 0, gif_delay(delay));
            encoder.encode_frame(frame)?;
            count += 1;
            trace!("GIF worker encoded frame {}", count);
        }
    }
    debug!("GIF worker finished: {} frames, {} bytes", count, bytes.len());
    Ok(bytes)
}

/// GIF stores delays in centiseconds; round to the nearest one, minimum 1.
fn gif_delay(delay: Duration) -> Delay {
    let ms = delay.as_millis().min(u32::MAX as u128) as u32;
    let centis = ((ms + 5) / 10).max(1);
    Delay::from_numer_denom_ms(centis * 10, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifDecoder;
    use image::AnimationDecoder;
    use std::io::Cursor;

    fn config(width: u32, height: u32) -> EncoderConfig {
        EncoderConfig { width, height, quality: 10, concurrency: 2 }
    }

    fn solid(width: u32, height: u32, color: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_pixel(width, height, color)
    }

    #[test]
    fn test_not_ready_before_init() {
        let service = GifEncoderService::new();
        assert!(!service.is_ready());
        assert!(matches!(service.configure(config(2, 2)), Err(EncodeError::NotReady)));
        service.init().unwrap();
        assert!(service.is_ready());
    }

    #[test]
    fn test_encodes_frames_in_order() {
        let service = GifEncoderService::initialized().unwrap();
        let mut session = service.configure(config(2, 2)).unwrap();
        let colors = [Rgba([255, 0, 0, 255]), Rgba([0, 255, 0, 255]), Rgba([0, 0, 255, 255])];
        for color in colors {
            session.add_frame(solid(2, 2, color), Duration::from_millis(100)).unwrap();
        }
        let bytes = session.render().unwrap();
        assert_eq!(&bytes[..6], b"GIF89a");

        let decoded = GifDecoder::new(Cursor::new(bytes)).unwrap().into_frames();
        let frames: Vec<_> = decoded.collect_frames().unwrap();
        assert_eq!(frames.len(), 3);
        for (frame, color) in frames.iter().zip(colors) {
            assert_eq!(*frame.buffer().get_pixel(0, 0), color);
            assert_eq!(frame.delay().numer_denom_ms(), (100, 1));
        }
    }

    #[test]
    fn test_rejects_wrong_frame_size() {
        let service = GifEncoderService::initialized().unwrap();
        let mut session = service.configure(config(4, 4)).unwrap();
        let err = session.add_frame(solid(2, 2, Rgba([0, 0, 0, 255])), Duration::from_millis(50));
        assert!(matches!(err, Err(EncodeError::FrameSize { expected_w: 4, actual_w: 2, .. })));
    }

    #[test]
    fn test_gif_delay_rounding() {
        assert_eq!(gif_delay(Duration::from_millis(100)).numer_denom_ms(), (100, 1));
        // 60 fps -> 16ms rounds to 2 centiseconds
        assert_eq!(gif_delay(Duration::from_micros(16_666)).numer_denom_ms(), (20, 1));
        assert_eq!(gif_delay(Duration::from_millis(1)).numer_denom_ms(), (10, 1));
    }
}
