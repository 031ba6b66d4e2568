//! Horizontal bar chart comparing the throughput of every recorded server.
use crate::error::PersistError;
use crate::persist::ResultRow;
use std::borrow::Cow;
use std::fmt;

pub const DEFAULT_CHART_FILE: &str = "benchmark_chart.svg";

const WIDTH: u32 = 800;
const BAR_HEIGHT: u32 = 40;
const GAP: u32 = 20;
const MARGIN_TOP: u32 = 60;
const MARGIN_LEFT: u32 = 200;
const MARGIN_RIGHT: u32 = 50;
const MARGIN_BOTTOM: u32 = 50;
const MIN_BAR_WIDTH: u32 = 10;
const INLINE_LABEL_MIN_WIDTH: u32 = 60;

const STYLE: &str = r#"<style>
    .bar { fill: #4CAF50; }
    .bar:hover { fill: #66BB6A; }
    .text { font-family: Arial, sans-serif; font-size: 14px; fill: #333; }
    .title { font-family: Arial, sans-serif; font-size: 20px; font-weight: bold; fill: #333; }
    .qps { font-weight: bold; fill: #fff; }
</style>"#;

/// Latest QPS per server name, highest first. A later row for the same name replaces the earlier
/// one.
pub fn latest_qps(rows: &[ResultRow]) -> Vec<(String, f64)> {
    let mut entries: Vec<(String, f64)> = vec![];
    for row in rows {
        let latest = entries.iter_mut().find(|e| e.0 == row.server_name);
        match latest {
            Some(entry) => entry.1 = row.qps,
            None => entries.push((row.server_name.clone(), row.qps)),
        }
    }
    entries.sort_by(|a, b| b.1.total_cmp(&a.1));
    entries
}

pub fn render_svg(entries: &[(String, f64)]) -> Result<String, PersistError> {
    if entries.is_empty() {
        return Err(PersistError::NoData);
    }
    Ok(Chart(entries).to_string())
}

struct Chart<'a>(&'a [(String, f64)]);

impl Chart<'_> {
    fn height(&self) -> u32 {
        MARGIN_TOP + self.0.len() as u32 * (BAR_HEIGHT + GAP) + MARGIN_BOTTOM
    }

    fn bar_width(qps: f64, max_qps: f64) -> u32 {
        if max_qps <= 0. {
            return MIN_BAR_WIDTH;
        }
        let span = (WIDTH - MARGIN_LEFT - MARGIN_RIGHT) as f64;
        ((qps / max_qps * span) as u32).max(MIN_BAR_WIDTH)
    }
}

impl fmt::Display for Chart<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            r#"<svg width="{WIDTH}" height="{}" xmlns="http://www.w3.org/2000/svg">"#,
            self.height()
        )?;
        writeln!(f, "{STYLE}")?;
        writeln!(f, r##"<rect width="100%" height="100%" fill="#f9f9f9"/>"##)?;
        writeln!(
            f,
            r#"<text x="{}" y="40" class="title" text-anchor="middle">Server Performance Comparison (QPS)</text>"#,
            WIDTH / 2
        )?;

        let max_qps = self.0.iter().map(|(_, qps)| *qps).fold(0., f64::max);
        let mut y = MARGIN_TOP;
        for (name, qps) in self.0 {
            let bar_width = Self::bar_width(*qps, max_qps);
            let mid = y + BAR_HEIGHT / 2;

            writeln!(
                f,
                r#"<text x="{}" y="{mid}" class="text" text-anchor="end" alignment-baseline="middle">{}</text>"#,
                MARGIN_LEFT - 10,
                xml_escape(name)
            )?;
            writeln!(
                f,
                r#"<rect x="{MARGIN_LEFT}" y="{y}" width="{bar_width}" height="{BAR_HEIGHT}" class="bar" rx="4" ry="4"/>"#
            )?;
            if bar_width > INLINE_LABEL_MIN_WIDTH {
                writeln!(
                    f,
                    r#"<text x="{}" y="{mid}" class="text qps" text-anchor="end" alignment-baseline="middle">{qps:.0}</text>"#,
                    MARGIN_LEFT + bar_width - 10
                )?;
            } else {
                writeln!(
                    f,
                    r#"<text x="{}" y="{mid}" class="text" text-anchor="start" alignment-baseline="middle">{qps:.0}</text>"#,
                    MARGIN_LEFT + bar_width + 10
                )?;
            }

            y += BAR_HEIGHT + GAP;
        }

        write!(f, "</svg>")
    }
}

fn xml_escape(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(value);
    }
    let mut escaped = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}
