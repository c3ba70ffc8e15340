//! Streaming controller: drives the capture → transmit → apply cycle at
//! display-refresh rate while keeping at most one inference request in
//! flight. A tick never waits for the network; it only starts a new cycle
//! when the previous one has settled, so the effective request rate is
//! bounded by the server's turnaround time.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::time::MissedTickBehavior;

use crate::protocol::{HighlightMarker, InferenceRequest};
use crate::smoother::MarkerSmoother;
use crate::transport::InferenceBackend;
use crate::ui::UiSink;

/// Scheduler-facing view of the capture surface: burn the given markers
/// into the current frame and return it as a data-URI snapshot.
pub trait FrameSource: Send + 'static {
    /// 現在のフレームサイズ（ピクセル）
    fn dimensions(&self) -> (u32, u32);
    fn snapshot(&mut self, markers: &[HighlightMarker]) -> Result<String>;
}

/// Exclusive in-flight guard. Acquired before a cycle is spawned and
/// released on drop, so a failed request can never stall the loop.
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self(Arc::clone(flag)))
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct StreamController<B: InferenceBackend, S: FrameSource> {
    backend: Arc<B>,
    source: Arc<Mutex<S>>,
    smoother: Arc<Mutex<MarkerSmoother>>,
    ui: Arc<Mutex<dyn UiSink + Send>>,
    session_id: String,
    refresh_hz: u32,
    in_flight: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    fps: Arc<AtomicU32>,
    tick_count: u32,
    window_start: Instant,
}

impl<B: InferenceBackend, S: FrameSource> StreamController<B, S> {
    pub fn new(
        backend: Arc<B>,
        source: S,
        smoother: MarkerSmoother,
        ui: Arc<Mutex<dyn UiSink + Send>>,
        session_id: String,
        refresh_hz: u32,
    ) -> Self {
        Self {
            backend,
            source: Arc::new(Mutex::new(source)),
            smoother: Arc::new(Mutex::new(smoother)),
            ui,
            session_id,
            refresh_hz: refresh_hz.max(1),
            in_flight: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(true)),
            fps: Arc::new(AtomicU32::new(0)),
            tick_count: 0,
            window_start: Instant::now(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// 直近の完了した1秒ウィンドウのフレーム数
    pub fn fps(&self) -> u32 {
        self.fps.load(Ordering::Relaxed)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// 安定化済みマーカー状態への共有ハンドル（プレビュー描画用）
    pub fn smoother_handle(&self) -> Arc<Mutex<MarkerSmoother>> {
        Arc::clone(&self.smoother)
    }

    /// Clone of the stop signal; flipping it ends `run`. An in-flight
    /// request is not cancelled, but its completion handler re-checks the
    /// flag before touching shared state.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// One display-refresh tick: fps bookkeeping, then start a cycle if
    /// nothing is in flight. Never blocks on the network.
    pub fn tick(&mut self) {
        self.tick_fps(Instant::now());
        self.try_start_cycle();
    }

    /// 粗い整数fps: 1秒ウィンドウが満了するたびにカウントを確定
    fn tick_fps(&mut self, now: Instant) {
        self.tick_count += 1;
        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            self.fps.store(self.tick_count, Ordering::Relaxed);
            self.tick_count = 0;
            self.window_start = now;
        }
    }

    fn try_start_cycle(&self) {
        let Some(guard) = InFlightGuard::try_acquire(&self.in_flight) else {
            // 前のサイクルがまだ完了していない。次のティックで再試行
            return;
        };

        let backend = Arc::clone(&self.backend);
        let source = Arc::clone(&self.source);
        let smoother = Arc::clone(&self.smoother);
        let ui = Arc::clone(&self.ui);
        let running = Arc::clone(&self.running);
        let session_id = self.session_id.clone();
        let fps = self.fps.load(Ordering::Relaxed);

        tokio::spawn(async move {
            // Guard lives for the whole cycle; dropped on every exit path.
            let _guard = guard;
            run_cycle(backend, source, smoother, ui, running, session_id, fps).await;
        });
    }

    /// Run the tick loop until the stop signal flips. This is the loop's
    /// only continuation mechanism.
    pub async fn run(&mut self) {
        let period = Duration::from_secs_f64(1.0 / self.refresh_hz as f64);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while self.running.load(Ordering::Relaxed) {
            interval.tick().await;
            self.tick();
        }
    }
}

/// One capture cycle: render markers, snapshot, exchange, apply. Every
/// failure is terminal to this cycle alone.
async fn run_cycle<B: InferenceBackend, S: FrameSource>(
    backend: Arc<B>,
    source: Arc<Mutex<S>>,
    smoother: Arc<Mutex<MarkerSmoother>>,
    ui: Arc<Mutex<dyn UiSink + Send>>,
    running: Arc<AtomicBool>,
    session_id: String,
    fps: u32,
) {
    // 1-2. 安定化済みマーカーをフレームに焼き込んでスナップショット
    let (image, width, height) = {
        let markers = smoother.lock().unwrap().markers().to_vec();
        let mut src = source.lock().unwrap();
        let (w, h) = src.dimensions();
        match src.snapshot(&markers) {
            Ok(image) => (image, w, h),
            Err(e) => {
                ui.lock().unwrap().show_error(&format!("capture failed: {e:#}"));
                return;
            }
        }
    };

    // 3. 送信（常に1リクエストのみ）
    let request = InferenceRequest {
        image,
        session_id,
        fps,
    };
    let result = backend.infer(request).await;

    // セッション停止後に完了したリクエストは捨てる
    if !running.load(Ordering::Relaxed) {
        return;
    }

    match result {
        Ok(response) => {
            if let Some(err) = response.error.as_deref() {
                // Service-reported error: status only, smoothing state untouched.
                ui.lock().unwrap().show_error(err);
                return;
            }
            smoother
                .lock()
                .unwrap()
                .update(&response.highlight_joints, width, height);
            ui.lock().unwrap().show_result(&response);
        }
        Err(e) => {
            ui.lock().unwrap().show_error(&format!("{e:#}"));
        }
    }
}
