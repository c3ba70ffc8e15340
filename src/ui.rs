//! Console presentation of inference results and the session summary.

use std::io::Write;

use crate::protocol::{InferenceResponse, SessionSummary};

/// 可視性スコアがこの値未満の角度は低信頼として表示
pub const LOW_VISIBILITY_THRESHOLD: f32 = 0.7;

/// Consumer of per-cycle outcomes. One call per settled capture cycle.
pub trait UiSink: Send {
    fn show_result(&mut self, response: &InferenceResponse);
    fn show_error(&mut self, message: &str);
}

/// 1サイクル分のステータス行を組み立てる
pub fn format_status(response: &InferenceResponse) -> String {
    let mut line = if response.has_pose && response.confidence > 0.0 {
        format!(
            "{} ({:.0}%)",
            response.pose_text,
            response.confidence * 100.0
        )
    } else {
        "ポーズ未検出".to_string()
    };

    if let Some(feedback) = response.feedback_text.as_deref() {
        // "Good" を含むフィードバックはポジティブ表示
        if feedback.contains("Good") {
            line.push_str(&format!(" | ✓ {feedback}"));
        } else {
            line.push_str(&format!(" | {feedback}"));
        }
    }

    if response.has_pose && !response.angles.is_empty() {
        let mut names: Vec<&String> = response.angles.keys().collect();
        names.sort();
        let angles: Vec<String> = names
            .iter()
            .map(|name| {
                let value = response.angles[*name];
                let low = response
                    .visibility
                    .get(*name)
                    .is_some_and(|v| *v < LOW_VISIBILITY_THRESHOLD);
                if low {
                    format!("{name}={value:.0}°?")
                } else {
                    format!("{name}={value:.0}°")
                }
            })
            .collect();
        line.push_str(&format!(" | {}", angles.join(" ")));
    }

    line
}

/// ステータス行を同じ行に上書き表示するプレゼンター
pub struct ConsolePresenter {
    last_len: usize,
}

impl ConsolePresenter {
    pub fn new() -> Self {
        Self { last_len: 0 }
    }

    fn print_line(&mut self, line: &str) {
        // 前の行より短い場合の残骸を消す
        let pad = self.last_len.saturating_sub(line.chars().count());
        print!("\r{line}{}", " ".repeat(pad));
        let _ = std::io::stdout().flush();
        self.last_len = line.chars().count();
    }
}

impl Default for ConsolePresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl UiSink for ConsolePresenter {
    fn show_result(&mut self, response: &InferenceResponse) {
        let line = format_status(response);
        self.print_line(&line);
    }

    fn show_error(&mut self, message: &str) {
        self.print_line(&format!("エラー: {message}"));
    }
}

/// 終了時サマリーの表示
pub fn print_summary(summary: &SessionSummary) {
    println!();
    println!("=== セッションサマリー ===");
    println!("時間: {:.1}秒", summary.duration_seconds);

    let mut poses: Vec<&String> = summary.pose_counts.keys().collect();
    poses.sort();
    for pose in poses {
        println!("  {}: {}回", pose, summary.pose_counts[pose]);
        if let Some(entries) = summary.feedback_summary.get(pose) {
            for entry in entries {
                println!("    - {}", entry.message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::HighlightMarker;

    fn response() -> InferenceResponse {
        InferenceResponse {
            pose_text: "Warrior II".to_string(),
            confidence: 0.92,
            feedback_text: None,
            has_pose: true,
            angles: Default::default(),
            visibility: Default::default(),
            highlight_joints: Vec::<HighlightMarker>::new(),
            error: None,
        }
    }

    #[test]
    fn test_status_with_pose() {
        let line = format_status(&response());
        assert_eq!(line, "Warrior II (92%)");
    }

    #[test]
    fn test_status_no_pose() {
        let mut resp = response();
        resp.has_pose = false;
        resp.confidence = 0.0;
        assert_eq!(format_status(&resp), "ポーズ未検出");
    }

    #[test]
    fn test_zero_confidence_means_no_pose() {
        let mut resp = response();
        resp.confidence = 0.0;
        assert_eq!(format_status(&resp), "ポーズ未検出");
    }

    #[test]
    fn test_positive_feedback_marked() {
        let mut resp = response();
        resp.feedback_text = Some("Good form!".to_string());
        let line = format_status(&resp);
        assert!(line.contains("✓ Good form!"), "line={line}");
    }

    #[test]
    fn test_corrective_feedback_unmarked() {
        let mut resp = response();
        resp.feedback_text = Some("Straighten your back".to_string());
        let line = format_status(&resp);
        assert!(line.contains("| Straighten your back"));
        assert!(!line.contains('✓'));
    }

    #[test]
    fn test_low_visibility_angle_flagged() {
        let mut resp = response();
        resp.angles.insert("left_knee".to_string(), 93.4);
        resp.angles.insert("right_knee".to_string(), 171.0);
        resp.visibility.insert("left_knee".to_string(), 0.4);
        resp.visibility.insert("right_knee".to_string(), 0.95);
        let line = format_status(&resp);
        assert!(line.contains("left_knee=93°?"), "line={line}");
        assert!(line.contains("right_knee=171°"), "line={line}");
        assert!(!line.contains("right_knee=171°?"), "line={line}");
    }

    #[test]
    fn test_angles_hidden_without_pose() {
        let mut resp = response();
        resp.has_pose = false;
        resp.angles.insert("left_knee".to_string(), 93.4);
        assert_eq!(format_status(&resp), "ポーズ未検出");
    }
}
