//! Scan files read by `pathscan run` and the REPL's `/load`.
//!
//! Two formats are accepted:
//!
//! - `*.json` – a serialized [`PointSet`], header included.
//! - anything else – plain text, one point per line as `x y z` or
//!   `x y z r g b`.  Blank lines and `#` comments are skipped.  The header
//!   is stamped with the read time and the configured frame.

use std::fs;
use std::path::Path;

use pathscan_types::{Header, Point, PointSet, Rgb, ScanError};
use tracing::debug;

/// Read the scan stored at `path`.
pub fn read_scan(path: &Path, frame_id: &str) -> Result<PointSet, ScanError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| ScanError::Io(format!("failed to read scan {}: {e}", path.display())))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let scan = if is_json {
        serde_json::from_str(&raw)
            .map_err(|e| ScanError::Parse(format!("{}: {e}", path.display())))?
    } else {
        parse_text(&raw, Header::new(chrono::Utc::now(), frame_id))
            .map_err(|e| match e {
                ScanError::Parse(msg) => ScanError::Parse(format!("{}: {msg}", path.display())),
                other => other,
            })?
    };

    debug!(path = %path.display(), points = scan.len(), "scan file read");
    Ok(scan)
}

/// Parse the plain-text scan format.
pub fn parse_text(raw: &str, header: Header) -> Result<PointSet, ScanError> {
    let mut points = Vec::new();
    for (n, line) in raw.lines().enumerate() {
        let content = line.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }
        points.push(parse_point(content).map_err(|msg| {
            ScanError::Parse(format!("line {}: {msg}", n + 1))
        })?);
    }
    Ok(PointSet::new(header, points))
}

fn parse_point(content: &str) -> Result<Point, String> {
    let fields: Vec<&str> = content.split_whitespace().collect();
    if fields.len() != 3 && fields.len() != 6 {
        return Err(format!("expected 3 or 6 fields, found {}", fields.len()));
    }

    let coord = |i: usize| {
        fields[i]
            .parse::<f32>()
            .map_err(|e| format!("bad coordinate '{}': {e}", fields[i]))
    };
    let point = Point::new(coord(0)?, coord(1)?, coord(2)?);
    if fields.len() == 3 {
        return Ok(point);
    }

    let channel = |i: usize| {
        fields[i]
            .parse::<u8>()
            .map_err(|e| format!("bad color channel '{}': {e}", fields[i]))
    };
    Ok(point.with_color(Rgb::new(channel(3)?, channel(4)?, channel(5)?)))
}
