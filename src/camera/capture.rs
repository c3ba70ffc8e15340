use anyhow::{Context, Result};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs, VideoCaptureTrait},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::config::CameraConfig;

/// OpenCVを使用したカメラキャプチャ
struct OpenCvCamera {
    capture: VideoCapture,
    width: u32,
    height: u32,
}

impl OpenCvCamera {
    /// カメラを開く。失敗はセッション開始に対して致命的
    fn open(config: &CameraConfig) -> Result<Self> {
        let mut capture = VideoCapture::new(config.index, VideoCaptureAPIs::CAP_ANY as i32)
            .with_context(|| format!("failed to open camera {}", config.index))?;

        if !capture.is_opened()? {
            anyhow::bail!("camera {} is not available", config.index);
        }

        capture.set(videoio::CAP_PROP_FRAME_WIDTH, config.width as f64)?;
        capture.set(videoio::CAP_PROP_FRAME_HEIGHT, config.height as f64)?;
        capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;

        // 実際に適用された解像度を記録
        let actual_width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let actual_height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;

        Ok(Self {
            capture,
            width: actual_width,
            height: actual_height,
        })
    }

    /// フレームを読み込む（BGR形式）
    fn read_frame(&mut self) -> Result<Mat> {
        let mut frame = Mat::default();
        self.capture
            .read(&mut frame)
            .context("failed to read frame")?;

        if frame.empty() {
            anyhow::bail!("empty frame received");
        }

        Ok(frame)
    }
}

/// 別スレッドでキャプチャを回し、常に最新フレームを提供する。
/// スケジューラのティックがカメラI/Oでブロックしないようにするため。
pub struct CameraFeed {
    latest: Arc<Mutex<Option<Mat>>>,
    running: Arc<AtomicBool>,
    width: u32,
    height: u32,
    _handle: thread::JoinHandle<()>,
}

impl CameraFeed {
    pub fn start(config: &CameraConfig) -> Result<Self> {
        // 失敗を即座に報告するため、カメラは呼び出し元スレッドで開く
        let mut camera = OpenCvCamera::open(config)?;
        let (width, height) = (camera.width, camera.height);

        let latest = Arc::new(Mutex::new(None::<Mat>));
        let running = Arc::new(AtomicBool::new(true));
        let latest_ref = Arc::clone(&latest);
        let running_ref = Arc::clone(&running);

        let handle = thread::spawn(move || {
            while running_ref.load(Ordering::Relaxed) {
                match camera.read_frame() {
                    Ok(frame) => {
                        *latest_ref.lock().unwrap() = Some(frame);
                    }
                    Err(_) => {
                        // 一時的な読み取り失敗。少し待って継続
                        thread::sleep(Duration::from_millis(100));
                    }
                }
            }
        });

        Ok(Self {
            latest,
            running,
            width,
            height,
            _handle: handle,
        })
    }

    /// 実際の解像度
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// 最新フレームのコピーを取得。初回フレーム到着前のみNone。
    pub fn latest_frame(&self) -> Option<Mat> {
        let guard = self.latest.lock().unwrap();
        guard.as_ref().map(|m| m.clone())
    }

    /// キャプチャスレッドを止める
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

impl Drop for CameraFeed {
    fn drop(&mut self) {
        self.stop();
    }
}
