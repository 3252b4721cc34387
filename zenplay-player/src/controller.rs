/*!
    Playback controller (C12).

    Opens media, owns the state machine, and reacts to pause/resume/seek,
    splitting those responsibilities across four long-lived worker
    threads (demux, video decode, audio decode, seek) that communicate
    purely through the bounded queues and the shared [`StateManager`]/
    [`SyncController`].
*/

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use zenplay_decode::{AudioDecoder, AudioDecoderConfig, PoolSizeInputs, VideoDecoder, VideoDecoderConfig};
use zenplay_render::{select_render_path, shared_gpu_device, WindowHandle};
use zenplay_source::{Demuxer, SourceConfig};
use zenplay_sync::{StateManager, SyncController, SyncMode};
use zenplay_transform::{AudioTransform, AudioTransformConfig};
use zenplay_types::{Error, PlayerState, Result};

use crate::audio::{AudioPlayer, AudioPlayerConfig};
use crate::config::PlayerConfig;
use crate::video::{VideoPlayer, VideoPlayerConfig};

/// Consecutive decode failures tolerated before giving up on a stream
/// (§7): the first two are logged and skipped, the third is fatal.
const MAX_CONSECUTIVE_DECODE_FAILURES: u32 = 3;

/// Detail captured alongside an `Error` transition, since
/// `StateManager::add_listener` only carries the new `PlayerState`.
#[derive(Clone, Debug)]
pub struct ErrorInfo {
    pub kind: &'static str,
    pub detail: String,
    pub stage: &'static str,
}

struct SeekRequest {
    pending: Mutex<Option<i64>>,
    condvar: Condvar,
}

impl SeekRequest {
    fn new() -> Self {
        Self {
            pending: Mutex::new(None),
            condvar: Condvar::new(),
        }
    }

    /// Newer requests overwrite whatever is pending; a seek handler
    /// mid-flight on an older target picks up the latest one once it
    /// comes back around, rather than queuing every request in order.
    fn submit(&self, target_ms: i64) {
        *self.pending.lock() = Some(target_ms);
        self.condvar.notify_one();
    }

    fn wait_next(&self, should_stop: impl Fn() -> bool) -> Option<i64> {
        let mut pending = self.pending.lock();
        while pending.is_none() && !should_stop() {
            self.condvar.wait_for(&mut pending, Duration::from_millis(100));
        }
        pending.take()
    }
}

struct Handles {
    demux: Option<JoinHandle<()>>,
    video_decode: Option<JoinHandle<()>>,
    audio_decode: Option<JoinHandle<()>>,
    seek: Option<JoinHandle<()>>,
}

/// Owns the whole pipeline for a single opened media location. One
/// `PlaybackController` corresponds to one `open()`/`stop()` lifetime;
/// open a new one for the next file rather than reusing this across
/// locations.
pub struct PlaybackController {
    config: PlayerConfig,
    state: Arc<StateManager>,
    sync: Arc<SyncController>,
    demuxer: Arc<Mutex<Demuxer>>,
    /// Kept alive for as long as the renderer holds its shared GPU device
    /// handle; the renderer only ever sees a raw pointer into this context.
    _video_hw_context: Option<zenplay_decode::HwDeviceContext>,
    video_decoder: Option<Arc<Mutex<VideoDecoder>>>,
    audio_decoder: Option<Arc<Mutex<AudioDecoder>>>,
    audio_transform: Option<Arc<Mutex<AudioTransform>>>,
    video_packet_queue: Arc<zenplay_types::BlockingQueue<zenplay_types::Packet>>,
    audio_packet_queue: Arc<zenplay_types::BlockingQueue<zenplay_types::Packet>>,
    video_player: Option<Arc<VideoPlayer>>,
    audio_player: Option<Arc<AudioPlayer>>,
    seek_request: Arc<SeekRequest>,
    error_count: Arc<AtomicU32>,
    last_error: Arc<Mutex<Option<ErrorInfo>>>,
    handles: Mutex<Handles>,
}

impl PlaybackController {
    /// Opens `location`, probes its streams, picks a render path and sync
    /// mode, and builds every decoder/player the media calls for. Leaves
    /// the state machine in `Ready`; call `start()` to begin playback.
    pub fn open<P: AsRef<Path>>(location: P, config: PlayerConfig, window: WindowHandle) -> Result<Self> {
        let state = Arc::new(StateManager::new());
        state.transition(PlayerState::Opening);

        let mut demuxer = Demuxer::open(location, SourceConfig::default(), config.prefetch_config())?;

        let has_video = demuxer.has_video();
        let has_audio = demuxer.has_audio();
        let mode = SyncMode::select(has_audio, has_video)?;
        let sync = Arc::new(SyncController::new(mode, config.sync_config()));

        let mut video_decoder = None;
        let mut video_player = None;
        let mut video_hw_context = None;
        if has_video {
            let video_info = demuxer
                .media_info()
                .video
                .clone()
                .ok_or_else(|| Error::invalid_state("media reports video but has no video stream info"))?;
            let video_codec_config = demuxer
                .take_video_codec_config()
                .ok_or_else(|| Error::invalid_state("video stream has no codec config"))?;
            let video_time_base = demuxer
                .video_time_base()
                .ok_or_else(|| Error::invalid_state("video stream has no time base"))?;

            let pool_inputs = PoolSizeInputs {
                base: 4,
                b_frames: 2,
                thread_count: 1,
                downstream_queue_capacity: config.queues.video_frame_capacity as u32,
            };

            let selection = select_render_path(
                video_info.codec_id,
                video_info.width,
                video_info.height,
                config.render_path_config(),
                pool_inputs,
            )?;

            let shared_device = selection.hw_context.as_ref().and_then(shared_gpu_device);
            let mut renderer = selection.renderer;
            renderer.init(&window, video_info.width, video_info.height, shared_device)?;

            let mut decoder_config = VideoDecoderConfig::default().with_pool_inputs(pool_inputs);
            if let Some(backend) = selection.backend {
                decoder_config = decoder_config.with_hw_accel(Some(backend));
            }
            let decoder = VideoDecoder::new(video_codec_config, video_time_base, decoder_config)?;

            video_hw_context = selection.hw_context;
            video_decoder = Some(Arc::new(Mutex::new(decoder)));
            video_player = Some(Arc::new(VideoPlayer::new(
                Arc::clone(&state),
                Arc::clone(&sync),
                renderer,
                VideoPlayerConfig {
                    queue_capacity: config.queues.video_frame_capacity,
                    thresholds: config.video_thresholds(),
                },
            )));
        }

        let mut audio_decoder = None;
        let mut audio_transform = None;
        let mut audio_player = None;
        if has_audio {
            let audio_codec_config = demuxer
                .take_audio_codec_config()
                .ok_or_else(|| Error::invalid_state("audio stream has no codec config"))?;
            let audio_time_base = demuxer
                .audio_time_base()
                .ok_or_else(|| Error::invalid_state("audio stream has no time base"))?;

            let decoder = AudioDecoder::new(audio_codec_config, audio_time_base, AudioDecoderConfig::default())?;
            audio_decoder = Some(Arc::new(Mutex::new(decoder)));

            let spec = config.audio_output_spec();
            audio_transform = Some(Arc::new(Mutex::new(AudioTransform::new(
                AudioTransformConfig::output_spec(spec.sample_rate),
            ))));

            let mut player = AudioPlayer::new(
                Arc::clone(&sync),
                AudioPlayerConfig {
                    output: spec,
                    queue_capacity: config.queues.audio_frame_capacity,
                    drop_oldest_when_full: true,
                },
            );
            player.init()?;
            audio_player = Some(Arc::new(player));
        }

        let video_packet_queue = Arc::new(zenplay_types::BlockingQueue::new(config.queues.video_packet_capacity));
        let audio_packet_queue = Arc::new(zenplay_types::BlockingQueue::new(config.queues.audio_packet_capacity));

        state.transition(PlayerState::Ready);

        Ok(Self {
            config,
            state,
            sync,
            demuxer: Arc::new(Mutex::new(demuxer)),
            _video_hw_context: video_hw_context,
            video_decoder,
            audio_decoder,
            audio_transform,
            video_packet_queue,
            audio_packet_queue,
            video_player,
            audio_player,
            seek_request: Arc::new(SeekRequest::new()),
            error_count: Arc::new(AtomicU32::new(0)),
            last_error: Arc::new(Mutex::new(None)),
            handles: Mutex::new(Handles {
                demux: None,
                video_decode: None,
                audio_decode: None,
                seek: None,
            }),
        })
    }

    pub fn state(&self) -> PlayerState {
        self.state.state()
    }

    /// Registers a listener invoked synchronously on every state
    /// transition (must not block, per `StateManager`'s contract).
    pub fn add_state_listener<F>(&self, listener: F)
    where
        F: Fn(PlayerState) + Send + Sync + 'static,
    {
        self.state.add_listener(listener);
    }

    /// Detail captured the moment the controller last entered `Error`.
    pub fn last_error(&self) -> Option<ErrorInfo> {
        self.last_error.lock().clone()
    }

    pub fn has_video(&self) -> bool {
        self.video_player.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio_player.is_some()
    }

    /// Spawns the four workers and begins playback. Must be called from
    /// `Ready`.
    pub fn start(&self) -> Result<()> {
        if self.state() != PlayerState::Ready {
            return Err(Error::already_running("controller is already started"));
        }
        self.state.transition(PlayerState::Playing);

        if let Some(video_player) = &self.video_player {
            video_player.start();
        }
        if let Some(audio_player) = &self.audio_player {
            audio_player.start();
        }

        let mut handles = self.handles.lock();
        handles.demux = Some(self.spawn_demux_worker());
        if self.video_decoder.is_some() {
            handles.video_decode = Some(self.spawn_video_decode_worker());
        }
        if self.audio_decoder.is_some() {
            handles.audio_decode = Some(self.spawn_audio_decode_worker());
        }
        handles.seek = Some(self.spawn_seek_worker());

        Ok(())
    }

    /// §4.12 pause ordering: audio, then the shared state (which is what
    /// the video render thread and decode workers block on), then sync.
    pub fn pause(&self) {
        if let Some(audio_player) = &self.audio_player {
            audio_player.pause();
        }
        self.state.transition(PlayerState::Paused);
        self.sync.pause();
    }

    /// §4.12 resume ordering: sync first so the master clock's reference
    /// point is correct before anything starts consuming it again.
    pub fn resume(&self) {
        self.sync.resume();
        if let Some(audio_player) = &self.audio_player {
            audio_player.resume();
        }
        self.state.transition(PlayerState::Playing);
    }

    /// Submits a seek request to the dedicated seek worker and returns
    /// immediately; the worker performs the actual pause/clear/seek/
    /// resume sequence. A later call before the worker picks this one up
    /// simply replaces the pending target.
    pub fn seek(&self, target_ms: i64) {
        self.seek_request.submit(target_ms);
    }

    /// Stops every worker and player, joining their threads, and leaves
    /// the state machine in `Stopped`.
    pub fn stop(&self) {
        if matches!(self.state(), PlayerState::Stopped) {
            return;
        }
        self.state.transition(PlayerState::Stopping);

        self.video_packet_queue.stop();
        self.audio_packet_queue.stop();
        self.seek_request.condvar.notify_all();

        if let Some(video_player) = &self.video_player {
            video_player.stop();
        }
        if let Some(audio_player) = &self.audio_player {
            audio_player.stop();
        }

        let mut handles = self.handles.lock();
        if let Some(h) = handles.demux.take() {
            let _ = h.join();
        }
        if let Some(h) = handles.video_decode.take() {
            let _ = h.join();
        }
        if let Some(h) = handles.audio_decode.take() {
            let _ = h.join();
        }
        if let Some(h) = handles.seek.take() {
            let _ = h.join();
        }

        self.state.transition(PlayerState::Stopped);
    }

    /// Blocks until the demux and decode workers have drained the media
    /// (end of stream) or the controller has otherwise stopped, then
    /// tears everything down. Intended for a CLI-style driver that has no
    /// other reason to keep the calling thread alive.
    pub fn wait_until_finished(&self) {
        {
            let mut handles = self.handles.lock();
            if let Some(h) = handles.demux.take() {
                let _ = h.join();
            }
            if let Some(h) = handles.video_decode.take() {
                let _ = h.join();
            }
            if let Some(h) = handles.audio_decode.take() {
                let _ = h.join();
            }
        }
        self.stop();
    }

    fn spawn_demux_worker(&self) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let demuxer = Arc::clone(&self.demuxer);
        let video_queue = Arc::clone(&self.video_packet_queue);
        let audio_queue = Arc::clone(&self.audio_packet_queue);
        let has_video = self.video_decoder.is_some();
        let has_audio = self.audio_decoder.is_some();
        let last_error = Arc::clone(&self.last_error);

        thread::spawn(move || {
            loop {
                if state.should_stop() {
                    break;
                }
                state.wait_for_resume();
                if state.should_stop() {
                    break;
                }

                let packet = { demuxer.lock().read_packet() };
                match packet {
                    Ok(Some(packet)) => match packet.stream_type {
                        zenplay_types::StreamType::Video if has_video => {
                            if !video_queue.push(packet) {
                                break;
                            }
                        }
                        zenplay_types::StreamType::Audio if has_audio => {
                            if !audio_queue.push(packet) {
                                break;
                            }
                        }
                        _ => {}
                    },
                    Ok(None) => {
                        video_queue.stop();
                        audio_queue.stop();
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "demux read failed");
                        *last_error.lock() = Some(ErrorInfo {
                            kind: "demux",
                            detail: e.to_string(),
                            stage: "read_packet",
                        });
                        state.transition(PlayerState::Error);
                        video_queue.stop();
                        audio_queue.stop();
                        break;
                    }
                }
            }
        })
    }

    fn spawn_video_decode_worker(&self) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let queue = Arc::clone(&self.video_packet_queue);
        let decoder = Arc::clone(self.video_decoder.as_ref().unwrap());
        let player = Arc::clone(self.video_player.as_ref().unwrap());
        let error_count = Arc::clone(&self.error_count);
        let last_error = Arc::clone(&self.last_error);

        thread::spawn(move || {
            loop {
                if state.should_stop() {
                    break;
                }
                state.wait_for_resume();
                if state.should_stop() {
                    break;
                }

                let Some(packet) = queue.pop() else {
                    break;
                };

                match decoder.lock().decode(&packet) {
                    Ok(frames) => {
                        error_count.store(0, Ordering::Relaxed);
                        for frame in frames {
                            let ts = frame.pts_ms().unwrap_or(0);
                            if !player.push_frame_blocking(frame, ts, 0) {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        if !handle_decode_error(&state, &error_count, &last_error, "video", &e) {
                            break;
                        }
                    }
                }
            }

            if let Ok(frames) = decoder.lock().flush() {
                for frame in frames {
                    let ts = frame.pts_ms().unwrap_or(0);
                    player.push_frame_blocking(frame, ts, 0);
                }
            }
        })
    }

    fn spawn_audio_decode_worker(&self) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let queue = Arc::clone(&self.audio_packet_queue);
        let decoder = Arc::clone(self.audio_decoder.as_ref().unwrap());
        let transform = Arc::clone(self.audio_transform.as_ref().unwrap());
        let player = Arc::clone(self.audio_player.as_ref().unwrap());
        let error_count = Arc::clone(&self.error_count);
        let last_error = Arc::clone(&self.last_error);

        thread::spawn(move || {
            loop {
                if state.should_stop() {
                    break;
                }
                state.wait_for_resume();
                if state.should_stop() {
                    break;
                }

                let Some(packet) = queue.pop() else {
                    break;
                };

                match decoder.lock().decode(&packet) {
                    Ok(frames) => {
                        error_count.store(0, Ordering::Relaxed);
                        for frame in frames {
                            match transform.lock().transform_resampled(&frame) {
                                Ok(resampled) => {
                                    player.push_frame(resampled);
                                }
                                Err(e) => {
                                    tracing::warn!(error = %e, "audio resample failed, dropping frame");
                                }
                            }
                        }
                    }
                    Err(e) => {
                        if !handle_decode_error(&state, &error_count, &last_error, "audio", &e) {
                            break;
                        }
                    }
                }
            }

            if let Ok(frames) = decoder.lock().flush() {
                for frame in frames {
                    if let Ok(resampled) = transform.lock().transform_resampled(&frame) {
                        player.push_frame(resampled);
                    }
                }
            }
            if let Ok(Some(frame)) = transform.lock().flush() {
                let resampled = zenplay_types::ResampledAudioFrame::new(
                    frame.data,
                    frame.samples,
                    frame.pts_ms(),
                );
                player.push_frame(resampled);
            }
        })
    }

    fn spawn_seek_worker(&self) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let sync = Arc::clone(&self.sync);
        let demuxer = Arc::clone(&self.demuxer);
        let video_queue = Arc::clone(&self.video_packet_queue);
        let audio_queue = Arc::clone(&self.audio_packet_queue);
        let video_player = self.video_player.clone();
        let audio_player = self.audio_player.clone();
        let video_decoder = self.video_decoder.clone();
        let audio_decoder = self.audio_decoder.clone();
        let audio_transform = self.audio_transform.clone();
        let seek_request = Arc::clone(&self.seek_request);
        let last_error = Arc::clone(&self.last_error);

        thread::spawn(move || {
            loop {
                let should_stop = || state.should_stop();
                let Some(target_ms) = seek_request.wait_next(should_stop) else {
                    if state.should_stop() {
                        break;
                    }
                    continue;
                };

                let prior_state = state.state();
                state.transition(PlayerState::Seeking);

                if let Some(audio_player) = &audio_player {
                    audio_player.pause();
                }
                if let Some(video_player) = &video_player {
                    video_player.pre_seek();
                }
                video_queue.clear(|_| {});
                audio_queue.clear(|_| {});
                if let Some(audio_player) = &audio_player {
                    audio_player.clear_frames();
                }

                let target = Duration::from_millis(target_ms.max(0) as u64);
                match demuxer.lock().seek(target) {
                    Ok(actual) => {
                        sync.reset_for_seek(actual.as_millis() as i64);
                        if let Some(decoder) = &video_decoder {
                            decoder.lock().reset();
                        }
                        if let Some(decoder) = &audio_decoder {
                            decoder.lock().reset();
                        }
                        if let Some(transform) = &audio_transform {
                            transform.lock().reset();
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, target_ms, "seek failed");
                        *last_error.lock() = Some(ErrorInfo {
                            kind: "seek",
                            detail: e.to_string(),
                            stage: "demuxer.seek",
                        });
                    }
                }

                let resume_to = if prior_state == PlayerState::Paused {
                    PlayerState::Paused
                } else {
                    PlayerState::Playing
                };
                if resume_to == PlayerState::Playing {
                    if let Some(audio_player) = &audio_player {
                        audio_player.resume();
                    }
                }
                state.transition(resume_to);

                if state.should_stop() {
                    break;
                }
            }
        })
    }
}

/// Applies the controller's 3-consecutive-failures rule (§7). Returns
/// `false` once the worker should give up entirely.
fn handle_decode_error(
    state: &StateManager,
    error_count: &AtomicU32,
    last_error: &Mutex<Option<ErrorInfo>>,
    stage: &'static str,
    error: &Error,
) -> bool {
    if !error.counts_as_decode_failure() {
        tracing::error!(error = %error, stage, "unrecoverable pipeline error");
        *last_error.lock() = Some(ErrorInfo {
            kind: stage,
            detail: error.to_string(),
            stage: "decode",
        });
        state.transition(PlayerState::Error);
        return false;
    }

    let count = error_count.fetch_add(1, Ordering::Relaxed) + 1;
    tracing::warn!(error = %error, stage, count, "decode error, tolerating up to 3 consecutive");
    if count >= MAX_CONSECUTIVE_DECODE_FAILURES {
        *last_error.lock() = Some(ErrorInfo {
            kind: stage,
            detail: error.to_string(),
            stage: "decode",
        });
        state.transition(PlayerState::Error);
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_request_latest_wins() {
        let req = SeekRequest::new();
        req.submit(1_000);
        req.submit(2_000);
        assert_eq!(req.wait_next(|| true), Some(2_000));
    }

    #[test]
    fn seek_request_wait_next_stops_when_asked() {
        let req = SeekRequest::new();
        assert_eq!(req.wait_next(|| true), None);
    }

    #[test]
    fn handle_decode_error_tolerates_up_to_three() {
        let state = StateManager::new();
        state.transition(PlayerState::Playing);
        let count = AtomicU32::new(0);
        let last_error = Mutex::new(None);
        let err = Error::decode("invalid nal unit");

        assert!(handle_decode_error(&state, &count, &last_error, "video", &err));
        assert!(handle_decode_error(&state, &count, &last_error, "video", &err));
        assert_eq!(state.state(), PlayerState::Playing);
        assert!(!handle_decode_error(&state, &count, &last_error, "video", &err));
        assert_eq!(state.state(), PlayerState::Error);
    }

    #[test]
    fn handle_decode_error_non_decode_error_is_immediately_fatal() {
        let state = StateManager::new();
        state.transition(PlayerState::Playing);
        let count = AtomicU32::new(0);
        let last_error = Mutex::new(None);
        let err = Error::audio_device("device disconnected");

        assert!(!handle_decode_error(&state, &count, &last_error, "audio", &err));
        assert_eq!(state.state(), PlayerState::Error);
    }
}
