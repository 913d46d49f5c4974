//! Playback controller
//!
//! A session goes `Idle -> Loading -> {Ready | Error}` and back to `Idle` on close.
//! Sources are played through an adaptive decoder when the backend supports it,
//! otherwise handed straight to the sink if it can play HLS itself. The controller
//! owns at most one decoder at a time: opening a new source tears the previous
//! session down before anything else happens.

pub mod ffmpeg;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{AppConfig, DecoderConfig};
use crate::error::PlaybackError;

pub use ffmpeg::FfmpegBackend;

/// MIME type a sink must report to play HLS without a decoder
pub const HLS_MIME: &str = "application/vnd.apple.mpegurl";

pub type SessionId = u64;
pub type ListenerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    Loading,
    Ready,
    Error,
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Loading => "loading",
            PlaybackStatus::Ready => "ready",
            PlaybackStatus::Error => "error",
        })
    }
}

/// Decoded video frame for rendering
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGB24 data
    pub pts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderEvent {
    ManifestParsed,
    FragmentLoaded,
    Error { fatal: bool, details: String },
}

/// Streaming decoder bound to one source for its whole life
pub trait AdaptiveDecoder {
    fn load_source(&mut self, url: &str);
    /// Start feeding the media sink
    fn attach_media(&mut self);
    /// Events raised since the last call
    fn poll_events(&mut self) -> Vec<DecoderEvent>;
    /// Latest frame, if the decoder renders frames itself
    fn take_frame(&mut self) -> Option<DecodedFrame> {
        None
    }
    fn detach_media(&mut self);
    fn destroy(self: Box<Self>);
}

pub trait DecoderBackend {
    fn is_supported(&self) -> bool;
    fn create(&self, config: &DecoderConfig) -> Result<Box<dyn AdaptiveDecoder>, PlaybackError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkEventKind {
    LoadedMetadata,
    Playing,
    Waiting,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkEvent {
    pub listener: ListenerId,
    pub kind: SinkEventKind,
    pub detail: Option<String>,
}

/// Rendering surface supplied by the UI layer
pub trait MediaSink {
    fn can_play_type(&self, mime: &str) -> bool;
    /// `None` detaches whatever source is set
    fn set_source(&mut self, url: Option<&str>);
    fn play(&mut self);
    fn add_listener(&mut self, kind: SinkEventKind) -> ListenerId;
    fn remove_listener(&mut self, id: ListenerId);
    fn poll_events(&mut self) -> Vec<SinkEvent>;
    fn present(&mut self, _frame: DecodedFrame) {}
}

/// Sink for headless use: no native playback, frames are dropped
#[derive(Debug, Default)]
pub struct NullSink {
    next_listener: ListenerId,
    frames: u64,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames received so far
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl MediaSink for NullSink {
    fn can_play_type(&self, _mime: &str) -> bool {
        false
    }

    fn set_source(&mut self, _url: Option<&str>) {}

    fn play(&mut self) {}

    fn add_listener(&mut self, _kind: SinkEventKind) -> ListenerId {
        self.next_listener += 1;
        self.next_listener
    }

    fn remove_listener(&mut self, _id: ListenerId) {}

    fn poll_events(&mut self) -> Vec<SinkEvent> {
        Vec::new()
    }

    fn present(&mut self, _frame: DecodedFrame) {
        self.frames += 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackOptions {
    pub decoder: DecoderConfig,
    /// Fail a session still loading after this long
    pub load_timeout: Option<Duration>,
    /// Fail a session after this many recoverable decoder errors
    pub max_recoverable_errors: Option<u32>,
}

impl From<&AppConfig> for PlaybackOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            decoder: config.decoder_config(),
            load_timeout: config.load_timeout(),
            max_recoverable_errors: config.max_recoverable_errors,
        }
    }
}

/// Public view of the active session
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    pub id: SessionId,
    pub source_url: String,
    pub status: PlaybackStatus,
    pub error: Option<PlaybackError>,
    pub buffering: bool,
    pub recoverable_errors: u32,
}

struct ActiveSession {
    info: PlaybackSession,
    decoder: Option<Box<dyn AdaptiveDecoder>>,
    listeners: Vec<ListenerId>,
    load_deadline: Option<Instant>,
}

impl ActiveSession {
    fn set_ready(&mut self) -> bool {
        if self.info.status != PlaybackStatus::Loading {
            return false;
        }
        self.info.status = PlaybackStatus::Ready;
        self.load_deadline = None;
        true
    }

    fn fail(&mut self, error: PlaybackError) -> bool {
        if self.info.status == PlaybackStatus::Error {
            return false;
        }
        warn!(session = self.info.id, error = %error, "Playback failed");
        self.info.status = PlaybackStatus::Error;
        self.info.error = Some(error);
        self.load_deadline = None;
        true
    }
}

pub struct PlaybackController {
    backend: Box<dyn DecoderBackend>,
    sink: Box<dyn MediaSink>,
    clock: Arc<dyn Clock>,
    options: PlaybackOptions,
    session: Option<ActiveSession>,
    next_id: SessionId,
}

impl PlaybackController {
    pub fn new(
        backend: Box<dyn DecoderBackend>,
        sink: Box<dyn MediaSink>,
        clock: Arc<dyn Clock>,
        options: PlaybackOptions,
    ) -> Self {
        Self {
            backend,
            sink,
            clock,
            options,
            session: None,
            next_id: 0,
        }
    }

    /// Start playing `url`, closing whatever was playing first
    pub fn open(&mut self, url: &str) -> SessionId {
        self.close();

        self.next_id += 1;
        let id = self.next_id;
        let mut session = ActiveSession {
            info: PlaybackSession {
                id,
                source_url: url.to_string(),
                status: PlaybackStatus::Loading,
                error: None,
                buffering: false,
                recoverable_errors: 0,
            },
            decoder: None,
            listeners: Vec::new(),
            load_deadline: None,
        };

        if self.backend.is_supported() {
            match self.backend.create(&self.options.decoder) {
                Ok(mut decoder) => {
                    decoder.load_source(url);
                    decoder.attach_media();
                    session.decoder = Some(decoder);
                    for kind in [SinkEventKind::Playing, SinkEventKind::Waiting] {
                        session.listeners.push(self.sink.add_listener(kind));
                    }
                    debug!(session = id, "Playing through adaptive decoder");
                }
                Err(e) => {
                    session.fail(e);
                }
            }
        } else if self.sink.can_play_type(HLS_MIME) {
            self.sink.set_source(Some(url));
            for kind in [
                SinkEventKind::LoadedMetadata,
                SinkEventKind::Playing,
                SinkEventKind::Error,
            ] {
                session.listeners.push(self.sink.add_listener(kind));
            }
            debug!(session = id, "Playing through native sink");
        } else {
            session.fail(PlaybackError::UnsupportedFormat);
        }

        if session.info.status == PlaybackStatus::Loading {
            session.load_deadline = self.options.load_timeout.map(|t| self.clock.now() + t);
            info!(session = id, "Playback loading");
        }
        self.session = Some(session);
        id
    }

    /// Drain decoder and sink events. Returns the new status if it changed.
    pub fn poll(&mut self) -> Option<PlaybackStatus> {
        let Self {
            sink,
            clock,
            options,
            session,
            ..
        } = self;
        let active = session.as_mut()?;
        let before = active.info.status;

        let mut decoder_events = Vec::new();
        let mut frame = None;
        if let Some(decoder) = active.decoder.as_mut() {
            decoder_events = decoder.poll_events();
            frame = decoder.take_frame();
        }

        for event in decoder_events {
            match event {
                DecoderEvent::ManifestParsed => sink.play(),
                DecoderEvent::FragmentLoaded => {
                    active.set_ready();
                }
                DecoderEvent::Error { fatal: true, details } => {
                    active.fail(PlaybackError::Fatal(details));
                }
                DecoderEvent::Error { fatal: false, details } => {
                    active.info.recoverable_errors += 1;
                    debug!(
                        session = active.info.id,
                        count = active.info.recoverable_errors,
                        details = %details,
                        "Recoverable decoder error"
                    );
                    if let Some(limit) = options.max_recoverable_errors {
                        if active.info.recoverable_errors >= limit {
                            active.fail(PlaybackError::Stalled(active.info.recoverable_errors));
                        }
                    }
                }
            }
        }

        if let Some(frame) = frame {
            sink.present(frame);
        }

        for event in sink.poll_events() {
            if !active.listeners.contains(&event.listener) {
                debug!(listener = event.listener, "Ignoring event from released listener");
                continue;
            }
            match event.kind {
                SinkEventKind::LoadedMetadata => sink.play(),
                SinkEventKind::Playing => {
                    active.info.buffering = false;
                    active.set_ready();
                }
                SinkEventKind::Waiting => active.info.buffering = true,
                SinkEventKind::Error => {
                    let detail = event.detail.unwrap_or_else(|| "media error".to_string());
                    active.fail(PlaybackError::Sink(detail));
                }
            }
        }

        if let Some(deadline) = active.load_deadline {
            if active.info.status == PlaybackStatus::Loading && clock.now() >= deadline {
                let waited = options.load_timeout.unwrap_or_default();
                active.fail(PlaybackError::Timeout(waited));
            }
        }

        let after = active.info.status;
        if after != before {
            info!(session = active.info.id, status = %after, "Playback status changed");
            Some(after)
        } else {
            None
        }
    }

    /// Release the active session: decoder, listeners, timers and the sink source
    pub fn close(&mut self) {
        let Some(mut active) = self.session.take() else {
            return;
        };
        if let Some(mut decoder) = active.decoder.take() {
            decoder.detach_media();
            decoder.destroy();
        }
        for listener in active.listeners.drain(..) {
            self.sink.remove_listener(listener);
        }
        self.sink.set_source(None);
        info!(session = active.info.id, "Playback closed");
    }

    pub fn status(&self) -> PlaybackStatus {
        self.session
            .as_ref()
            .map_or(PlaybackStatus::Idle, |s| s.info.status)
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref().map(|s| &s.info)
    }

    pub fn sink(&self) -> &dyn MediaSink {
        self.sink.as_ref()
    }

    pub fn sink_mut(&mut self) -> &mut dyn MediaSink {
        self.sink.as_mut()
    }

    pub fn options(&self) -> &PlaybackOptions {
        &self.options
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[path = "player_tests.rs"]
mod tests;
