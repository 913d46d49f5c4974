// Adaptive decoder using ffmpeg-next
// Requires FFmpeg libraries: libavcodec, libavformat, libavutil, libswscale
//
// To install FFmpeg development libraries:
// - Ubuntu/Debian: sudo apt install libavcodec-dev libavformat-dev libavutil-dev libswscale-dev libavdevice-dev
// - Fedora: sudo dnf install ffmpeg-devel
// - macOS: brew install ffmpeg
// - Windows: Download from https://ffmpeg.org and set FFMPEG_DIR environment variable

#[cfg(feature = "internal-player")]
mod backend_impl {
    use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    extern crate ffmpeg_next as ffmpeg;
    use ffmpeg::format::Pixel;
    use ffmpeg::media::Type;
    use ffmpeg::software::scaling::{context::Context as ScalingContext, flag::Flags};
    use ffmpeg::util::frame::video::Video as VideoFrame;
    use tracing::{debug, warn};

    use crate::config::DecoderConfig;
    use crate::error::PlaybackError;
    use crate::player::{AdaptiveDecoder, DecodedFrame, DecoderBackend, DecoderEvent};

    // Frames larger than this are scaled down before they reach the sink
    const MAX_WIDTH: u32 = 1280;
    const MAX_HEIGHT: u32 = 720;

    #[derive(Debug, Default, Clone, Copy)]
    pub struct FfmpegBackend;

    impl FfmpegBackend {
        pub fn new() -> Self {
            Self
        }
    }

    impl DecoderBackend for FfmpegBackend {
        fn is_supported(&self) -> bool {
            match ffmpeg::init() {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "FFmpeg unavailable");
                    false
                }
            }
        }

        fn create(&self, config: &DecoderConfig) -> Result<Box<dyn AdaptiveDecoder>, PlaybackError> {
            Ok(Box::new(FfmpegDecoder {
                config: config.clone(),
                url: None,
                stop: None,
                events: None,
                current_frame: Arc::new(Mutex::new(None)),
            }))
        }
    }

    pub struct FfmpegDecoder {
        config: DecoderConfig,
        url: Option<String>,
        stop: Option<Sender<()>>,
        events: Option<Receiver<DecoderEvent>>,
        current_frame: Arc<Mutex<Option<DecodedFrame>>>,
    }

    impl AdaptiveDecoder for FfmpegDecoder {
        fn load_source(&mut self, url: &str) {
            self.url = Some(url.to_string());
        }

        fn attach_media(&mut self) {
            let Some(url) = self.url.clone() else {
                return;
            };
            let (stop_tx, stop_rx) = channel();
            let (event_tx, event_rx) = channel();
            self.stop = Some(stop_tx);
            self.events = Some(event_rx);

            let config = self.config.clone();
            let current_frame = Arc::clone(&self.current_frame);
            thread::spawn(move || {
                decode_thread(url, config, current_frame, stop_rx, event_tx);
            });
        }

        fn poll_events(&mut self) -> Vec<DecoderEvent> {
            let mut events = Vec::new();
            if let Some(ref receiver) = self.events {
                loop {
                    match receiver.try_recv() {
                        Ok(event) => events.push(event),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            self.events = None;
                            break;
                        }
                    }
                }
            }
            events
        }

        fn take_frame(&mut self) -> Option<DecodedFrame> {
            self.current_frame
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take()
        }

        fn detach_media(&mut self) {
            if let Some(stop) = self.stop.take() {
                let _ = stop.send(());
            }
            self.events = None;
            *self.current_frame.lock().unwrap_or_else(|e| e.into_inner()) = None;
        }

        fn destroy(mut self: Box<Self>) {
            self.detach_media();
            self.url = None;
        }
    }

    fn fatal(events: &Sender<DecoderEvent>, details: String) {
        let _ = events.send(DecoderEvent::Error {
            fatal: true,
            details,
        });
    }

    fn decode_thread(
        url: String,
        config: DecoderConfig,
        current_frame: Arc<Mutex<Option<DecodedFrame>>>,
        stop: Receiver<()>,
        events: Sender<DecoderEvent>,
    ) {
        // Set options for network streams
        let mut options = ffmpeg::Dictionary::new();
        if !config.user_agent.is_empty() {
            options.set("user_agent", &config.user_agent);
        }
        options.set("reconnect", "1");
        options.set("reconnect_streamed", "1");
        options.set("reconnect_delay_max", "5");
        options.set("timeout", "5000000"); // 5 second timeout
        if config.low_latency {
            options.set("fflags", "nobuffer");
        }

        let mut ictx = match ffmpeg::format::input_with_dictionary(&url, options) {
            Ok(ctx) => ctx,
            Err(e) => return fatal(&events, format!("Failed to open stream: {}", e)),
        };

        let (video_stream_index, parameters) = match ictx.streams().best(Type::Video) {
            Some(stream) => (stream.index(), stream.parameters()),
            None => return fatal(&events, "No video stream found".to_string()),
        };

        let mut context_decoder = match ffmpeg::codec::context::Context::from_parameters(parameters) {
            Ok(ctx) => ctx,
            Err(e) => return fatal(&events, format!("Bad codec parameters: {}", e)),
        };
        if !config.enable_worker {
            context_decoder.set_threading(ffmpeg::threading::Config::count(1));
        }

        let mut decoder = match context_decoder.decoder().video() {
            Ok(d) => d,
            Err(e) => return fatal(&events, format!("Failed to create decoder: {}", e)),
        };

        let width = decoder.width();
        let height = decoder.height();
        let (target_width, target_height) = if width > MAX_WIDTH || height > MAX_HEIGHT {
            let scale = f64::min(
                MAX_WIDTH as f64 / width as f64,
                MAX_HEIGHT as f64 / height as f64,
            );
            ((width as f64 * scale) as u32, (height as f64 * scale) as u32)
        } else {
            (width, height)
        };

        // Create scaler to convert to RGB24
        let mut scaler = match ScalingContext::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            target_width,
            target_height,
            Flags::BILINEAR,
        ) {
            Ok(s) => s,
            Err(e) => return fatal(&events, format!("Failed to create scaler: {}", e)),
        };

        let _ = events.send(DecoderEvent::ManifestParsed);
        debug!(width, height, target_width, target_height, "Stream opened");

        let frame_duration = Duration::from_secs_f64(1.0 / 30.0); // Target 30fps display
        let mut last_frame_time = Instant::now();
        let mut first_frame = true;

        for (stream, packet) in ictx.packets() {
            // Stop requested, or the decoder handle is gone
            if !matches!(stop.try_recv(), Err(TryRecvError::Empty)) {
                return;
            }
            if stream.index() != video_stream_index {
                continue;
            }

            if let Err(e) = decoder.send_packet(&packet) {
                let _ = events.send(DecoderEvent::Error {
                    fatal: false,
                    details: e.to_string(),
                });
                continue;
            }

            let mut decoded = VideoFrame::empty();
            while decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb_frame = VideoFrame::empty();
                if scaler.run(&decoded, &mut rgb_frame).is_err() {
                    continue;
                }
                let data = rgb_frame.data(0);
                let stride = rgb_frame.stride(0);

                // Copy frame data (handling stride)
                let row_len = target_width as usize * 3;
                let mut frame_data = Vec::with_capacity(row_len * target_height as usize);
                for y in 0..target_height as usize {
                    let row_start = y * stride;
                    frame_data.extend_from_slice(&data[row_start..row_start + row_len]);
                }

                *current_frame.lock().unwrap_or_else(|e| e.into_inner()) = Some(DecodedFrame {
                    width: target_width,
                    height: target_height,
                    data: frame_data,
                    pts: decoded.pts().unwrap_or(0),
                });
                if first_frame {
                    first_frame = false;
                    let _ = events.send(DecoderEvent::FragmentLoaded);
                }

                // Rate limiting to avoid overwhelming the sink
                let elapsed = last_frame_time.elapsed();
                if elapsed < frame_duration {
                    thread::sleep(frame_duration - elapsed);
                }
                last_frame_time = Instant::now();
            }
        }

        debug!("Stream ended");
    }
}

// Stub implementation when internal-player feature is disabled
#[cfg(not(feature = "internal-player"))]
mod backend_impl {
    use crate::config::DecoderConfig;
    use crate::error::PlaybackError;
    use crate::player::{AdaptiveDecoder, DecoderBackend};

    #[derive(Debug, Default, Clone, Copy)]
    pub struct FfmpegBackend;

    impl FfmpegBackend {
        pub fn new() -> Self {
            Self
        }
    }

    impl DecoderBackend for FfmpegBackend {
        fn is_supported(&self) -> bool {
            false
        }

        fn create(&self, _config: &DecoderConfig) -> Result<Box<dyn AdaptiveDecoder>, PlaybackError> {
            Err(PlaybackError::UnsupportedFormat)
        }
    }
}

pub use backend_impl::*;
