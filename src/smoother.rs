use crate::config::OverlayConfig;
use crate::protocol::HighlightMarker;

/// ハイライトマーカーの時間的平滑化フィルタ
///
/// スナップ半径未満の動き: 前回位置を維持（デッドバンド）
/// スナップ半径以上の動き: EMAブレンド
///
/// Distances are measured in pixel space with the surface dimensions
/// passed to `update`; stored coordinates stay normalized.
pub struct MarkerSmoother {
    snap_radius_px: f32,
    alpha: f32,
    markers: Vec<HighlightMarker>,
}

impl MarkerSmoother {
    pub fn new(snap_radius_px: f32, alpha: f32) -> Self {
        Self {
            snap_radius_px,
            alpha,
            markers: Vec::new(),
        }
    }

    pub fn from_config(config: &OverlayConfig) -> Self {
        Self::new(config.snap_radius_px, config.smoothing_alpha)
    }

    /// 現在表示すべき安定化済みマーカー
    pub fn markers(&self) -> &[HighlightMarker] {
        &self.markers
    }

    /// Fold one frame's markers into the persisted state.
    ///
    /// An empty input clears the state immediately; markers absent from
    /// the input are dropped without decay.
    pub fn update(&mut self, incoming: &[HighlightMarker], width: u32, height: u32) {
        if incoming.is_empty() {
            self.markers.clear();
            return;
        }

        let mut next: Vec<HighlightMarker> = Vec::with_capacity(incoming.len());
        for m in incoming {
            // 同名の重複は最初の出現が勝つ
            if next.iter().any(|n| n.name == m.name) {
                continue;
            }

            match self.markers.iter().find(|p| p.name == m.name) {
                // 新しいランドマーク: そのまま採用
                None => next.push(m.clone()),
                Some(prev) => {
                    let dx = (m.x - prev.x) * width as f32;
                    let dy = (m.y - prev.y) * height as f32;
                    let dist = (dx * dx + dy * dy).sqrt();

                    if dist < self.snap_radius_px {
                        // Sub-threshold motion is detector noise; stay anchored.
                        next.push(prev.clone());
                    } else {
                        let a = self.alpha;
                        next.push(HighlightMarker::new(
                            m.name.clone(),
                            a * m.x + (1.0 - a) * prev.x,
                            a * m.y + (1.0 - a) * prev.y,
                        ));
                    }
                }
            }
        }
        self.markers = next;
    }

    pub fn reset(&mut self) {
        self.markers.clear();
    }
}
