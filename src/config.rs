use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    /// カメラインデックス (デフォルトカメラ: 0)
    #[serde(default = "default_camera_index")]
    pub index: i32,
    /// 要求解像度（横）
    #[serde(default = "default_camera_width")]
    pub width: u32,
    /// 要求解像度（縦）
    #[serde(default = "default_camera_height")]
    pub height: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// 推論サーバーのベースURL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// リクエストタイムアウト（ミリ秒）
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    /// JPEG品質 (0-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: i32,
    /// ティックレート（ディスプレイリフレッシュ相当）
    #[serde(default = "default_refresh_hz")]
    pub refresh_hz: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OverlayConfig {
    /// スナップ半径（ピクセル）。この距離未満の動きはノイズとして無視
    #[serde(default = "default_snap_radius_px")]
    pub snap_radius_px: f32,
    /// EMA平滑化係数（新しい位置の重み）
    #[serde(default = "default_smoothing_alpha")]
    pub smoothing_alpha: f32,
    /// マーカー描画半径（ピクセル）
    #[serde(default = "default_marker_radius_px")]
    pub marker_radius_px: i32,
}

fn default_camera_index() -> i32 { 0 }
fn default_camera_width() -> u32 { 1280 }
fn default_camera_height() -> u32 { 720 }
fn default_base_url() -> String { "http://127.0.0.1:8000".to_string() }
fn default_timeout_ms() -> u64 { 10_000 }
fn default_jpeg_quality() -> i32 { 70 }
fn default_refresh_hz() -> u32 { 60 }
fn default_snap_radius_px() -> f32 { 25.0 }
fn default_smoothing_alpha() -> f32 { 0.3 }
fn default_marker_radius_px() -> i32 { 12 }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: default_camera_index(),
            width: default_camera_width(),
            height: default_camera_height(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
            refresh_hz: default_refresh_hz(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            snap_radius_px: default_snap_radius_px(),
            smoothing_alpha: default_smoothing_alpha(),
            marker_radius_px: default_marker_radius_px(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// 設定ファイルがなければデフォルト値で起動
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(config) => config,
            Err(_) => {
                eprintln!(
                    "config not found at {}, using defaults",
                    path.as_ref().display()
                );
                Config::default()
            }
        }
    }
}
