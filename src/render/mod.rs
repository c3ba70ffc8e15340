pub mod window;

pub use window::PreviewWindow;

/// マーカー塗りつぶし色 (RGB)
pub const MARKER_FILL_COLOR: u32 = 0xFF8C00; // オレンジ

/// マーカー外周リング色 (RGB)
pub const MARKER_RING_COLOR: u32 = 0xFFFFFF; // 白
