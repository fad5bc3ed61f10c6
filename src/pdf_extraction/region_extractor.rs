// Region text extraction from a positioned text layer
use super::text_layout::{PageLayout, TextRun};
use crate::types::Rect;
use std::cmp::Ordering;

/// Fraction of `run` that lies inside `region`, in [0, 1].
pub fn overlap_fraction(run: &Rect, region: &Rect) -> f64 {
    let run_area = run.area();
    if run_area <= 0.0 {
        // Degenerate boxes (zero-width glyphs) count as inside when their corner is
        let inside = run.x0 >= region.x0 && run.x0 <= region.x1 && run.y0 >= region.y0 && run.y0 <= region.y1;
        return if inside { 1.0 } else { 0.0 };
    }
    run.intersection(region).map(|i| i.area() / run_area).unwrap_or(0.0)
}

fn is_hit(run: &Rect, region: &Rect, threshold: f64) -> bool {
    let fraction = overlap_fraction(run, region);
    if threshold <= 0.0 {
        fraction > 0.0
    } else {
        fraction >= threshold
    }
}

/// Text of the runs falling inside `region`, in reading order.
///
/// Runs are grouped into lines by vertical centre, lines are emitted
/// top-to-bottom joined by `\n`, and words within a line left-to-right
/// joined by a single space. Returns an empty string when nothing hits.
pub fn extract_text(layout: &PageLayout, region: &Rect, overlap_threshold: f64) -> String {
    let mut hits: Vec<&TextRun> = layout
        .runs
        .iter()
        .filter(|run| is_hit(&run.bbox, region, overlap_threshold))
        .collect();

    if hits.is_empty() {
        return String::new();
    }

    hits.sort_by(|a, b| {
        center_y(&a.bbox)
            .partial_cmp(&center_y(&b.bbox))
            .unwrap_or(Ordering::Equal)
            .then(a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap_or(Ordering::Equal))
    });

    let mut lines: Vec<Vec<&TextRun>> = Vec::new();
    for run in hits {
        match lines.last_mut() {
            Some(line) if same_line(line.as_slice(), run) => line.push(run),
            _ => lines.push(vec![run]),
        }
    }

    lines
        .into_iter()
        .map(|mut line| {
            line.sort_by(|a, b| a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap_or(Ordering::Equal));
            line.iter().map(|run| run.text.trim()).collect::<Vec<_>>().join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn center_y(r: &Rect) -> f64 {
    (r.y0 + r.y1) / 2.0
}

fn same_line(line: &[&TextRun], run: &TextRun) -> bool {
    let n = line.len() as f64;
    let line_center = line.iter().map(|r| center_y(&r.bbox)).sum::<f64>() / n;
    let line_height = line.iter().map(|r| r.bbox.height()).sum::<f64>() / n;
    let tolerance = (line_height.min(run.bbox.height()) / 2.0).max(1.0);
    (center_y(&run.bbox) - line_center).abs() <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn layout(runs: &[(&str, [f64; 4])]) -> PageLayout {
        PageLayout {
            runs: runs.iter().map(|(t, b)| TextRun::new(*t, Rect::from(*b))).collect(),
        }
    }

    fn invoice_page() -> PageLayout {
        layout(&[
            ("#42", [159.0, 120.0, 196.0, 147.0]),
            ("Invoice", [72.0, 120.0, 152.0, 147.0]),
            ("Total:", [72.0, 400.0, 110.0, 412.0]),
            ("99.00", [120.0, 401.0, 150.0, 413.0]),
            ("EUR", [155.0, 400.5, 175.0, 412.0]),
            ("Footer", [72.0, 760.0, 120.0, 772.0]),
        ])
    }

    #[test]
    fn extracts_words_inside_region_in_reading_order() {
        let text = extract_text(&invoice_page(), &Rect::new(60.0, 110.0, 300.0, 160.0), 0.0);
        assert_eq!(text, "Invoice #42");
    }

    #[test]
    fn groups_lines_top_to_bottom() {
        let text = extract_text(&invoice_page(), &Rect::new(60.0, 100.0, 300.0, 420.0), 0.0);
        assert_eq!(text, "Invoice #42\nTotal: 99.00 EUR");
    }

    #[test]
    fn empty_when_no_run_intersects() {
        assert_eq!(extract_text(&invoice_page(), &Rect::new(300.0, 300.0, 400.0, 350.0), 0.0), "");
        assert_eq!(extract_text(&PageLayout::default(), &Rect::new(0.0, 0.0, 600.0, 800.0), 0.0), "");
    }

    #[rstest]
    #[case([72.0, 120.0, 162.0, 147.0], 0.0, "Invoice #42")]
    #[case([72.0, 120.0, 162.0, 147.0], 0.5, "Invoice")]
    #[case([80.0, 120.0, 162.0, 147.0], 1.0, "")]
    fn overlap_threshold_filters_partial_hits(
        #[case] region: [f64; 4],
        #[case] threshold: f64,
        #[case] expected: &str,
    ) {
        // Each region clips a sliver of "#42"; the last one also trims the start of "Invoice"
        let page = layout(&[
            ("Invoice", [72.0, 120.0, 152.0, 147.0]),
            ("#42", [159.0, 120.0, 196.0, 147.0]),
        ]);
        assert_eq!(extract_text(&page, &Rect::from(region), threshold), expected);
    }

    #[test]
    fn overlap_fraction_is_relative_to_run() {
        let run = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(overlap_fraction(&run, &Rect::new(5.0, 0.0, 100.0, 100.0)), 0.5);
        assert_eq!(overlap_fraction(&run, &Rect::new(-5.0, -5.0, 100.0, 100.0)), 1.0);
        assert_eq!(overlap_fraction(&run, &Rect::new(20.0, 20.0, 30.0, 30.0)), 0.0);
    }
}
