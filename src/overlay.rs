//! Capture surface: the latest camera frame with the stabilized
//! correction markers burned in, JPEG-encoded as a data URI. The markers
//! are part of the transmitted image, not only of the live preview.

use std::sync::Arc;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use opencv::core::{Mat, Point, Scalar, Vector};
use opencv::prelude::*;
use opencv::{imgcodecs, imgproc};

use crate::camera::CameraFeed;
use crate::config::{OverlayConfig, StreamConfig};
use crate::protocol::HighlightMarker;
use crate::scheduler::FrameSource;

/// マーカー塗りつぶし色 (BGR: オレンジ)
const MARKER_FILL: (f64, f64, f64) = (0.0, 140.0, 255.0);
/// マーカー外周リング色 (BGR: 白)
const MARKER_RING: (f64, f64, f64) = (255.0, 255.0, 255.0);

/// マーカーを焼き込んでJPEGデータURIにエンコード
pub fn annotate_and_encode(
    frame: &mut Mat,
    markers: &[HighlightMarker],
    jpeg_quality: i32,
    marker_radius: i32,
) -> Result<String> {
    let width = frame.cols() as u32;
    let height = frame.rows() as u32;

    let fill = Scalar::new(MARKER_FILL.0, MARKER_FILL.1, MARKER_FILL.2, 0.0);
    let ring = Scalar::new(MARKER_RING.0, MARKER_RING.1, MARKER_RING.2, 0.0);

    for marker in markers {
        let (px, py) = marker.to_pixel(width, height);
        let center = Point::new(px, py);
        imgproc::circle(frame, center, marker_radius, fill, imgproc::FILLED, imgproc::LINE_AA, 0)?;
        imgproc::circle(frame, center, marker_radius, ring, 2, imgproc::LINE_AA, 0)?;
    }

    // imencode は BGR 8UC3 を要求。BGRAなら変換
    let mat = if frame.channels() == 4 {
        let mut bgr = Mat::default();
        imgproc::cvt_color_def(frame, &mut bgr, imgproc::COLOR_BGRA2BGR)?;
        bgr
    } else {
        frame.clone()
    };

    let params = Vector::from_iter([imgcodecs::IMWRITE_JPEG_QUALITY, jpeg_quality]);
    let mut buf: Vector<u8> = Vector::new();
    imgcodecs::imencode(".jpg", &mat, &mut buf, &params).context("jpeg encode failed")?;

    Ok(format!(
        "data:image/jpeg;base64,{}",
        BASE64.encode(buf.as_slice())
    ))
}

/// スケジューラに渡すキャプチャ面。カメラフィードを共有参照で持つ
pub struct CameraSurface {
    feed: Arc<CameraFeed>,
    jpeg_quality: i32,
    marker_radius: i32,
}

impl CameraSurface {
    pub fn new(feed: Arc<CameraFeed>, stream: &StreamConfig, overlay: &OverlayConfig) -> Self {
        Self {
            feed,
            jpeg_quality: stream.jpeg_quality,
            marker_radius: overlay.marker_radius_px,
        }
    }
}

impl FrameSource for CameraSurface {
    fn dimensions(&self) -> (u32, u32) {
        self.feed.resolution()
    }

    fn snapshot(&mut self, markers: &[HighlightMarker]) -> Result<String> {
        let mut frame = self
            .feed
            .latest_frame()
            .context("no camera frame available yet")?;
        annotate_and_encode(&mut frame, markers, self.jpeg_quality, self.marker_radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::CV_8UC3;

    fn test_frame(width: i32, height: i32) -> Mat {
        Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(32.0)).unwrap()
    }

    #[test]
    fn test_encode_produces_data_uri() {
        let mut frame = test_frame(64, 48);
        let uri = annotate_and_encode(&mut frame, &[], 70, 12).unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,"), "uri={}", &uri[..32]);
        assert!(uri.len() > "data:image/jpeg;base64,".len());
    }

    #[test]
    fn test_markers_modify_frame() {
        let mut plain = test_frame(64, 48);
        let mut marked = test_frame(64, 48);
        let plain_uri = annotate_and_encode(&mut plain, &[], 70, 6).unwrap();
        let marked_uri = annotate_and_encode(
            &mut marked,
            &[HighlightMarker::new("left_knee", 0.5, 0.5)],
            70,
            6,
        )
        .unwrap();
        assert_ne!(plain_uri, marked_uri);
    }

    #[test]
    fn test_offscreen_marker_is_harmless() {
        // 範囲外座標でもエンコードは失敗しない（opencvがクリップする）
        let mut frame = test_frame(64, 48);
        let markers = [HighlightMarker::new("nose", 1.5, -0.2)];
        assert!(annotate_and_encode(&mut frame, &markers, 70, 6).is_ok());
    }
}
