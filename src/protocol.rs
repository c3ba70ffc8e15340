//! JSON wire contract for client ↔ inference-server communication.
//!
//! Self-contained: no imports from other kamae_coach modules.
//!
//! Response decoding is deliberately lenient: every optional field has a
//! safe default so a partial or malformed payload degrades to "no pose,
//! no markers" instead of failing the cycle.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One frame request. `image` is a `data:image/jpeg;base64,...` URI.
#[derive(Debug, Clone, Serialize)]
pub struct InferenceRequest {
    pub image: String,
    pub session_id: String,
    /// 直近1秒間の観測フレーム数
    pub fps: u32,
}

/// 補正対象のランドマーク。座標はフレームサイズに対する正規化値 (0.0〜1.0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightMarker {
    pub name: String,
    pub x: f32,
    pub y: f32,
}

impl HighlightMarker {
    pub fn new(name: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            name: name.into(),
            x,
            y,
        }
    }

    /// ピクセル座標に変換
    pub fn to_pixel(&self, width: u32, height: u32) -> (i32, i32) {
        let px = (self.x * width as f32) as i32;
        let py = (self.y * height as f32) as i32;
        (px, py)
    }
}

/// Decoded response to one frame request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InferenceResponse {
    #[serde(default)]
    pub pose_text: String,
    /// 0.0 または欠落は「ポーズなし」
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub feedback_text: Option<String>,
    #[serde(default)]
    pub has_pose: bool,
    /// 角度名 → 角度（度）
    #[serde(default)]
    pub angles: HashMap<String, f32>,
    /// 角度名 → 可視性スコア (0.0〜1.0)
    #[serde(default)]
    pub visibility: HashMap<String, f32>,
    #[serde(default)]
    pub highlight_joints: Vec<HighlightMarker>,
    /// 存在すればこのサイクルは失敗扱い
    #[serde(default)]
    pub error: Option<String>,
}

// --- Session lifecycle (boundary contract only) ---

#[derive(Debug, Clone, Serialize)]
pub struct SessionRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackEntry {
    pub message: String,
}

/// Returned by the stop call; rendered by the presenter, never stored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionSummary {
    #[serde(default)]
    pub duration_seconds: f64,
    #[serde(default)]
    pub pose_counts: HashMap<String, u64>,
    #[serde(default)]
    pub feedback_summary: HashMap<String, Vec<FeedbackEntry>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_to_pixel() {
        let m = HighlightMarker::new("left_knee", 0.5, 0.25);
        let (px, py) = m.to_pixel(640, 480);
        assert_eq!(px, 320);
        assert_eq!(py, 120);
    }

    #[test]
    fn test_decode_full_response() {
        let json = r#"{
            "pose_text": "Warrior II",
            "confidence": 0.92,
            "feedback_text": "Good form!",
            "has_pose": true,
            "angles": {"left_knee": 93.5},
            "visibility": {"left_knee": 0.88},
            "highlight_joints": [{"name": "left_knee", "x": 0.4, "y": 0.6}]
        }"#;
        let resp: InferenceResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.pose_text, "Warrior II");
        assert!((resp.confidence - 0.92).abs() < 1e-6);
        assert!(resp.has_pose);
        assert_eq!(resp.angles["left_knee"], 93.5);
        assert_eq!(resp.highlight_joints.len(), 1);
        assert_eq!(resp.highlight_joints[0].name, "left_knee");
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_decode_minimal_response_defaults() {
        // 欠落フィールドはすべて安全なデフォルトに落ちる
        let resp: InferenceResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(resp.pose_text, "");
        assert_eq!(resp.confidence, 0.0);
        assert!(!resp.has_pose);
        assert!(resp.angles.is_empty());
        assert!(resp.visibility.is_empty());
        assert!(resp.highlight_joints.is_empty());
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_decode_error_response() {
        let resp: InferenceResponse =
            serde_json::from_str(r#"{"error": "model failure"}"#).unwrap();
        assert_eq!(resp.error.as_deref(), Some("model failure"));
    }

    #[test]
    fn test_request_serializes_expected_fields() {
        let req = InferenceRequest {
            image: "data:image/jpeg;base64,AAAA".to_string(),
            session_id: "sess_1".to_string(),
            fps: 27,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["image"], "data:image/jpeg;base64,AAAA");
        assert_eq!(json["session_id"], "sess_1");
        assert_eq!(json["fps"], 27);
    }

    #[test]
    fn test_decode_session_summary() {
        let json = r#"{
            "duration_seconds": 61.4,
            "pose_counts": {"Warrior II": 3},
            "feedback_summary": {"Warrior II": [{"message": "Bend the front knee"}]}
        }"#;
        let summary: SessionSummary = serde_json::from_str(json).unwrap();
        assert!((summary.duration_seconds - 61.4).abs() < 1e-9);
        assert_eq!(summary.pose_counts["Warrior II"], 3);
        assert_eq!(
            summary.feedback_summary["Warrior II"][0].message,
            "Bend the front knee"
        );
    }
}
