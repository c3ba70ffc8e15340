//! Kamae Coach: streams camera frames to a pose-inference server and
//! shows corrective feedback on a live preview.
//!
//! Main thread owns the preview window; the streaming controller runs on
//! a tokio runtime; camera capture runs on its own thread.

use std::io::Write;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};

use kamae_coach::camera::CameraFeed;
use kamae_coach::config::Config;
use kamae_coach::overlay::CameraSurface;
use kamae_coach::render::PreviewWindow;
use kamae_coach::scheduler::StreamController;
use kamae_coach::smoother::MarkerSmoother;
use kamae_coach::transport::{new_session_id, HttpInferenceClient};
use kamae_coach::ui::{self, ConsolePresenter, UiSink};

const CONFIG_PATH: &str = "kamae_coach.toml";

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

type LogFile = Arc<Mutex<std::io::BufWriter<std::fs::File>>>;

fn open_log_file() -> Result<LogFile> {
    std::fs::create_dir_all("logs")?;
    let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = format!("logs/coach_{}.log", ts);
    let file = std::fs::File::create(&path)?;
    eprintln!("Log: {}", path);
    Ok(Arc::new(Mutex::new(std::io::BufWriter::new(file))))
}

macro_rules! log {
    ($logfile:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        eprintln!("{}", msg);
        if let Ok(mut f) = $logfile.lock() {
            let _ = writeln!(f, "{}", msg);
            let _ = f.flush();
        }
    }};
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let config = Config::load_or_default(CONFIG_PATH);
    let logfile = open_log_file()?;
    log!(logfile, "Kamae Coach ({})", env!("GIT_VERSION"));
    log!(
        logfile,
        "[config] server={} camera={} {}x{} quality={} refresh={}Hz",
        config.server.base_url,
        config.camera.index,
        config.camera.width,
        config.camera.height,
        config.stream.jpeg_quality,
        config.stream.refresh_hz
    );

    let runtime = tokio::runtime::Runtime::new()?;

    // カメラ取得失敗はセッション開始に対して致命的
    let feed = Arc::new(CameraFeed::start(&config.camera).context("camera unavailable")?);
    let (width, height) = feed.resolution();
    log!(logfile, "[camera] opened at {}x{}", width, height);

    let client = Arc::new(HttpInferenceClient::from_config(&config.server)?);
    let session_id = new_session_id();
    log!(logfile, "[session] {}", session_id);

    runtime
        .block_on(client.start_session(&session_id))
        .context("failed to start session")?;

    let surface = CameraSurface::new(Arc::clone(&feed), &config.stream, &config.overlay);
    let smoother = MarkerSmoother::from_config(&config.overlay);
    let presenter: Arc<Mutex<dyn UiSink + Send>> = Arc::new(Mutex::new(ConsolePresenter::new()));

    let mut controller = StreamController::new(
        Arc::clone(&client),
        surface,
        smoother,
        presenter,
        session_id.clone(),
        config.stream.refresh_hz,
    );
    let running = controller.stop_handle();
    let smoother_handle = controller.smoother_handle();

    // コンソール入力スレッド: 'q' + Enter で終了
    {
        let running = Arc::clone(&running);
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                if stdin.read_line(&mut line).is_ok() && line.trim() == "q" {
                    running.store(false, Ordering::Relaxed);
                    break;
                }
            }
        });
    }

    // ストリーミングループはランタイム上で回す
    let stream_task = runtime.spawn(async move {
        controller.run().await;
    });

    println!("streaming... (Esc / close window / 'q' + Enter で終了)");

    // メインスレッド: ライブプレビュー
    let mut window = PreviewWindow::new("Kamae Coach", width as usize, height as usize)?;
    let frame_interval = Duration::from_millis(1000 / config.stream.refresh_hz.max(1) as u64);
    while window.is_open() && running.load(Ordering::Relaxed) {
        if let Some(frame) = feed.latest_frame() {
            window.draw_frame(&frame)?;
            let markers = smoother_handle.lock().unwrap().markers().to_vec();
            window.draw_markers(&markers, config.overlay.marker_radius_px);
        }
        window.update()?;
        std::thread::sleep(frame_interval);
    }

    // 停止: ティック登録を解除し、カメラを解放
    running.store(false, Ordering::Relaxed);
    let _ = runtime.block_on(stream_task);
    feed.stop();

    match runtime.block_on(client.stop_session(&session_id)) {
        Ok(summary) => ui::print_summary(&summary),
        Err(e) => log!(logfile, "[session] stop failed: {e:#}"),
    }

    log!(logfile, "[session] closed");
    Ok(())
}
