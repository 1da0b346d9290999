use std::path::PathBuf;

use anyhow::{Context, Result};

use songsight_core::RadarChart;
use songsight_service::Service;

use super::{format_value, print_json};

// ---------------------------------------------------------------------------
// Radar chart rendering
// ---------------------------------------------------------------------------

const SIZE: f64 = 520.0;
const RADIUS: f64 = 180.0;
const CENTER: f64 = SIZE / 2.0;
const COLOUR_A: &str = "#1f77b4";
const COLOUR_B: &str = "#ff7f0e";

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Point at `fraction` of the radius along an axis. Angles run clockwise
/// from twelve o'clock.
fn point(angle: f64, fraction: f64) -> (f64, f64) {
    (
        CENTER + RADIUS * fraction * angle.sin(),
        CENTER - RADIUS * fraction * angle.cos(),
    )
}

fn polygon_points(points: impl Iterator<Item = (f64, f64)>) -> String {
    points
        .map(|(x, y)| format!("{x:.1},{y:.1}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn line(svg: &mut String, text: &str) {
    svg.push_str(text);
    svg.push('\n');
}

/// Render a two-series radar chart as a standalone SVG document.
pub fn render_svg(chart: &RadarChart) -> String {
    let mut svg = String::new();
    line(
        &mut svg,
        &format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{SIZE}" height="{SIZE}" viewBox="0 0 {SIZE} {SIZE}" font-family="sans-serif" font-size="12">"#
        ),
    );
    line(&mut svg, r#"<rect width="100%" height="100%" fill="white"/>"#);

    for ring in [0.25, 0.5, 0.75, 1.0] {
        let points = polygon_points(chart.axes.iter().map(|axis| point(axis.angle, ring)));
        line(
            &mut svg,
            &format!(r##"<polygon class="grid" points="{points}" fill="none" stroke="#cccccc"/>"##),
        );
    }

    for axis in &chart.axes {
        let (x, y) = point(axis.angle, 1.0);
        let (lx, ly) = point(axis.angle, 1.15);
        line(
            &mut svg,
            &format!(r##"<line x1="{CENTER}" y1="{CENTER}" x2="{x:.1}" y2="{y:.1}" stroke="#999999"/>"##),
        );
        line(
            &mut svg,
            &format!(
                r#"<text x="{lx:.1}" y="{ly:.1}" text-anchor="middle" dominant-baseline="middle">{}</text>"#,
                escape(&axis.feature)
            ),
        );
    }

    let series = [
        ("a", COLOUR_A, &chart.label_a, chart.axes.iter().map(|a| point(a.angle, a.a)).collect::<Vec<_>>()),
        ("b", COLOUR_B, &chart.label_b, chart.axes.iter().map(|a| point(a.angle, a.b)).collect::<Vec<_>>()),
    ];

    for (i, (class, colour, label, points)) in series.iter().enumerate() {
        let points = polygon_points(points.iter().copied());
        line(
            &mut svg,
            &format!(
                r#"<polygon class="series-{class}" points="{points}" fill="{colour}" fill-opacity="0.3" stroke="{colour}" stroke-width="2"/>"#
            ),
        );

        // Legend
        let y = 20.0 + 18.0 * i as f64;
        line(
            &mut svg,
            &format!(
                r#"<rect x="12" y="{y:.1}" width="12" height="12" fill="{colour}"/><text x="30" y="{y:.1}" dominant-baseline="hanging">{}</text>"#,
                escape(label)
            ),
        );
    }

    svg.push_str("</svg>\n");
    svg
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// Compare two tracks and optionally write a radar chart.
pub fn run_compare(
    service: &Service,
    a: &str,
    b: &str,
    label_a: Option<String>,
    label_b: Option<String>,
    svg: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let comparison = service.compare(a, b, label_a, label_b)?;

    if json {
        print_json(&comparison)?;
    } else {
        println!("A: {}", comparison.label_a);
        println!("B: {}\n", comparison.label_b);
        println!("  {:<18} {:>12} {:>12} {:>12}", "feature", "A", "B", "B - A");
        for entry in &comparison.entries {
            println!(
                "  {:<18} {:>12} {:>12} {:>12}",
                entry.feature,
                format_value(entry.a),
                format_value(entry.b),
                format_value(entry.difference())
            );
        }
    }

    if let Some(path) = svg {
        let chart = service.radar(&comparison)?;
        std::fs::write(&path, render_svg(&chart))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !json {
            println!("\n✓ Wrote radar chart to {}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use songsight_core::compare::RadarAxis;
    use std::f64::consts::PI;

    fn chart() -> RadarChart {
        RadarChart {
            label_a: "Ann & Co - Alpha".to_string(),
            label_b: "Bob - <Bravo>".to_string(),
            axes: ["energy", "valence", "danceability", "liveness"]
                .iter()
                .enumerate()
                .map(|(i, name)| RadarAxis {
                    feature: (*name).to_string(),
                    angle: i as f64 / 4.0 * 2.0 * PI,
                    a: 0.5,
                    b: 1.0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_point_orientation() {
        let (x, y) = point(0.0, 1.0);
        assert!((x - CENTER).abs() < 1e-9);
        assert!((y - (CENTER - RADIUS)).abs() < 1e-9);

        let (x, y) = point(PI / 2.0, 0.5);
        assert!((x - (CENTER + RADIUS / 2.0)).abs() < 1e-9);
        assert!((y - CENTER).abs() < 1e-9);
    }

    #[test]
    fn test_render_svg() {
        let svg = render_svg(&chart());
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(svg.matches("class=\"grid\"").count(), 4);
        assert_eq!(svg.matches("class=\"series-a\"").count(), 1);
        assert_eq!(svg.matches("class=\"series-b\"").count(), 1);
        assert!(svg.contains(">danceability<"));
        assert!(svg.contains("Ann &amp; Co - Alpha"));
        assert!(svg.contains("Bob - &lt;Bravo&gt;"));

        // Series B sits on the outer ring at the top axis.
        let top = format!("{:.1},{:.1}", CENTER, CENTER - RADIUS);
        assert!(svg.contains(&top));
    }
}
