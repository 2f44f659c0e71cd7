//! Content-bounds detection from paragraph geometry.
//!
//! The detector samples rendered text blocks, keeps the ones that look like
//! body text and estimates the reading column from the median left and right
//! edges. It only reads layout through [`LayoutSource`] and never touches
//! settings, so the same snapshot always yields the same answer.

use crate::config::*;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Viewport size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Rendered geometry of one candidate block, relative to the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextBlock {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    /// Length of the trimmed text content, in characters.
    pub text_len: usize,
}

impl TextBlock {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    /// Whether this block plausibly holds body text.
    fn is_body_text(&self, viewport: Viewport) -> bool {
        self.text_len > MIN_TEXT_CHARS
            && self.width > MIN_BLOCK_WIDTH_PX
            && self.width < viewport.width * MAX_BLOCK_WIDTH_RATIO
            && self.height > MIN_BLOCK_HEIGHT_PX
            && self.top < viewport.height * MAX_VIEWPORTS_DOWN
            && self.left >= 0.0
            && self.right() <= viewport.width
    }
}

/// Read-only view of the page layout.
pub trait LayoutSource {
    fn viewport(&self) -> Viewport;
    /// Geometry of every element matching a CSS selector, in document order.
    fn select(&self, selector: &str) -> Vec<TextBlock>;
}

/// Estimated reading column, as percentages from each viewport edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub left_percent: f64,
    pub right_percent: f64,
    /// Self-reported reliability, 0-100. Not needed to compare layouts.
    #[serde(default)]
    pub confidence: f64,
}

/// Middle value of the sorted input; mean of the two middles for even counts.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Blend edge consistency (70%) with sample size (30%) into a 0-100 score.
///
/// An average standard deviation of 100px or more contributes nothing;
/// ten or more samples earn the full sample score.
pub fn confidence(left_edges: &[f64], right_edges: &[f64], sample_count: usize) -> f64 {
    let spread = (std_dev(left_edges) + std_dev(right_edges)) / 2.0;
    let deviation_score = (100.0 - spread).max(0.0);
    let sample_score = (sample_count as f64 / 10.0 * 100.0).min(100.0);
    deviation_score * 0.7 + sample_score * 0.3
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Walk the selectors from most to least specific and return the first
/// sample with enough candidates, or the last selector's full result.
fn candidate_blocks(layout: &dyn LayoutSource) -> Vec<TextBlock> {
    let mut blocks = Vec::new();
    for selector in DETECT_SELECTORS {
        blocks = layout.select(selector);
        if blocks.len() >= PREFERRED_SAMPLE {
            debug!("Auto-detect: using selector {:?} ({} blocks)", selector, blocks.len());
            break;
        }
    }
    blocks
}

/// Estimate the page's reading column, or `None` when the layout gives no
/// trustworthy answer.
pub fn detect_content_bounds(layout: &dyn LayoutSource) -> Option<DetectionResult> {
    let viewport = layout.viewport();
    if viewport.width <= 0.0 || viewport.height <= 0.0 {
        info!("Auto-detect: viewport has no area");
        return None;
    }

    let candidates = candidate_blocks(layout);
    if candidates.is_empty() {
        info!("Auto-detect: no paragraphs found");
        return None;
    }

    let valid: Vec<TextBlock> = candidates
        .into_iter()
        .filter(|b| b.is_body_text(viewport))
        .collect();

    if valid.len() < MIN_VALID_BLOCKS {
        info!("Auto-detect: not enough valid paragraphs ({})", valid.len());
        return None;
    }

    let left_edges: Vec<f64> = valid.iter().map(|b| b.left).collect();
    let right_edges: Vec<f64> = valid.iter().map(|b| b.right()).collect();

    let median_left = median(&left_edges);
    let median_right = median(&right_edges);

    let left_percent = ((median_left - EDGE_PADDING_PX) / viewport.width * 100.0).max(0.0);
    let right_percent =
        ((viewport.width - median_right - EDGE_PADDING_PX) / viewport.width * 100.0).max(0.0);

    let content_width = 100.0 - left_percent - right_percent;
    let (min_width, max_width) = CONTENT_WIDTH_RANGE;
    if !(min_width..=max_width).contains(&content_width) {
        info!("Auto-detect: content width {:.1}% looks unreasonable", content_width);
        return None;
    }

    let score = confidence(&left_edges, &right_edges, valid.len());
    info!(
        "Auto-detect: {} paragraphs, left {:.1}%, right {:.1}%, width {:.1}%, confidence {:.0}%",
        valid.len(),
        left_percent,
        right_percent,
        content_width,
        score
    );

    if score < MIN_CONFIDENCE {
        info!("Auto-detect: confidence too low, keeping current margins");
        return None;
    }

    Some(DetectionResult {
        left_percent: round_one_decimal(left_percent),
        right_percent: round_one_decimal(right_percent),
        confidence: score,
    })
}

/// Re-run detection and report whether either margin moved by more than
/// [`LAYOUT_CHANGE_THRESHOLD`] points since `previous`.
///
/// No previous result counts as a change; a failed re-detection does not.
pub fn has_layout_changed(layout: &dyn LayoutSource, previous: Option<&DetectionResult>) -> bool {
    let Some(previous) = previous else {
        return true;
    };
    let Some(current) = detect_content_bounds(layout) else {
        return false;
    };
    let left_diff = (current.left_percent - previous.left_percent).abs();
    let right_diff = (current.right_percent - previous.right_percent).abs();
    left_diff > LAYOUT_CHANGE_THRESHOLD || right_diff > LAYOUT_CHANGE_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeLayout;

    fn para(left: f64, top: f64, width: f64) -> TextBlock {
        TextBlock {
            left,
            top,
            width,
            height: 48.0,
            text_len: 400,
        }
    }

    /// Ten aligned paragraphs from x=200 to x=800 in a 1000px viewport.
    fn article_page() -> FakeLayout {
        let blocks = (0..10).map(|i| para(200.0, 100.0 + 60.0 * i as f64, 600.0)).collect();
        FakeLayout::new(1000.0, 800.0).with("article p", blocks)
    }

    #[test]
    fn median_of_even_and_odd_counts() {
        assert_eq!(median(&[10.0, 20.0, 30.0, 40.0]), 25.0);
        assert_eq!(median(&[10.0, 20.0, 30.0]), 20.0);
        assert_eq!(median(&[30.0, 10.0, 20.0]), 20.0);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn std_dev_is_population_deviation() {
        assert_eq!(std_dev(&[5.0, 5.0, 5.0]), 0.0);
        assert_eq!(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.0);
    }

    #[test]
    fn confidence_never_rises_with_spread() {
        let mut previous = f64::INFINITY;
        for spread in [0.0, 5.0, 20.0, 60.0, 150.0, 400.0] {
            let left = [100.0 - spread, 100.0, 100.0 + spread];
            let right = [800.0 - spread, 800.0, 800.0 + spread];
            let score = confidence(&left, &right, 3);
            assert!(score <= previous, "spread {spread} raised confidence");
            previous = score;
        }
    }

    #[test]
    fn confidence_weights_samples() {
        let edges = [100.0; 10];
        assert_eq!(confidence(&edges, &edges, 10), 100.0);
        assert_eq!(confidence(&edges[..3], &edges[..3], 3), 70.0 + 9.0);
    }

    #[test]
    fn detects_aligned_article_column() {
        let result = detect_content_bounds(&article_page()).expect("column detected");
        // (200 - 25) / 1000 and (1000 - 800 - 25) / 1000
        assert_eq!(result.left_percent, 17.5);
        assert_eq!(result.right_percent, 17.5);
        assert_eq!(result.confidence, 100.0);
    }

    #[test]
    fn detection_is_deterministic() {
        let page = article_page();
        let first = detect_content_bounds(&page);
        for _ in 0..5 {
            assert_eq!(detect_content_bounds(&page), first);
        }
    }

    #[test]
    fn rejects_fewer_than_three_valid_blocks() {
        let page = FakeLayout::new(1000.0, 800.0).with(
            "p",
            vec![para(200.0, 100.0, 600.0), para(200.0, 200.0, 600.0)],
        );
        assert_eq!(detect_content_bounds(&page), None);
    }

    #[test]
    fn filters_out_non_body_blocks() {
        let mut blocks = vec![
            para(200.0, 100.0, 600.0),
            para(200.0, 200.0, 600.0),
            // Too short
            TextBlock { text_len: 40, ..para(200.0, 300.0, 600.0) },
            // Too narrow
            para(200.0, 400.0, 150.0),
            // Nearly full width
            para(10.0, 500.0, 950.0),
            // Off-screen right
            para(600.0, 600.0, 500.0),
            // Too far down
            para(200.0, 2500.0, 600.0),
        ];
        blocks.push(TextBlock { height: 12.0, ..para(200.0, 700.0, 600.0) });
        let page = FakeLayout::new(1000.0, 800.0).with("p", blocks);
        assert_eq!(detect_content_bounds(&page), None);
    }

    #[test]
    fn falls_back_to_weakest_selector() {
        let page = FakeLayout::new(1000.0, 800.0)
            .with("article p", vec![para(200.0, 100.0, 600.0)])
            .with(
                "p",
                (0..4).map(|i| para(200.0, 100.0 * i as f64, 600.0)).collect(),
            );
        let result = detect_content_bounds(&page).expect("fallback sample used");
        assert_eq!(result.left_percent, 17.5);
    }

    #[test]
    fn stops_at_first_selector_with_enough_blocks() {
        let page = article_page().with(
            "p",
            (0..10).map(|i| para(50.0, 100.0 * i as f64, 300.0)).collect(),
        );
        let result = detect_content_bounds(&page).unwrap();
        assert_eq!(result.left_percent, 17.5);
    }

    #[test]
    fn rejects_unreasonable_content_width() {
        // Column of ~25% of the viewport
        let blocks = (0..6).map(|i| para(375.0, 100.0 * i as f64, 210.0)).collect();
        let page = FakeLayout::new(1000.0, 800.0).with("p", blocks);
        assert_eq!(detect_content_bounds(&page), None);
    }

    #[test]
    fn rejects_low_confidence() {
        // Ragged edges: std dev well above 100px on both sides
        let blocks = vec![
            para(0.0, 0.0, 300.0),
            para(350.0, 100.0, 300.0),
            para(20.0, 200.0, 880.0),
        ];
        let page = FakeLayout::new(1000.0, 800.0).with("p", blocks);
        assert_eq!(detect_content_bounds(&page), None);
    }

    #[test]
    fn rounds_to_one_decimal() {
        let blocks = (0..10).map(|i| para(213.37, 60.0 * i as f64, 571.0)).collect();
        let page = FakeLayout::new(1000.0, 800.0).with("p", blocks);
        let result = detect_content_bounds(&page).unwrap();
        assert_eq!(result.left_percent, 18.8);
        assert_eq!(result.right_percent, 19.1);
    }

    #[test]
    fn layout_change_threshold() {
        let page = article_page();
        let near = DetectionResult {
            left_percent: 14.0,
            right_percent: 20.0,
            confidence: 90.0,
        };
        let far = DetectionResult {
            left_percent: 5.0,
            ..near
        };
        assert!(has_layout_changed(&page, None));
        assert!(!has_layout_changed(&page, Some(&near)));
        assert!(has_layout_changed(&page, Some(&far)));

        let empty = FakeLayout::new(1000.0, 800.0);
        assert!(!has_layout_changed(&empty, Some(&far)));
    }

    #[test]
    fn previous_result_without_confidence_still_compares() {
        let previous: DetectionResult = serde_json::from_value(serde_json::json!({
            "leftPercent": 14.0,
            "rightPercent": 20.0,
        }))
        .unwrap();
        assert_eq!(previous.confidence, 0.0);
        assert!(!has_layout_changed(&article_page(), Some(&previous)));
    }
}
