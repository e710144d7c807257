use crate::error::LoadError;
use log::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Point { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// One agent's routing requirement as declared in a waypoint scenario file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointScenarioEntry {
    pub bucket: i64,
    pub map_name: String,
    pub width: u32,
    pub height: u32,
    pub start: Point,
    pub goal: Point,
    /// Reference length from the source benchmark. Not used for solving.
    pub optimal_length: f64,
    /// Count declared in the file. The coordinate payload is what gets used.
    pub num_waypoints: usize,
    pub waypoints: Vec<Point>,
}

/// `[start] + waypoints + [goal]`, always at least two points.
pub type AgentRoute = Vec<Point>;

impl WaypointScenarioEntry {
    pub fn route(&self) -> AgentRoute {
        velcro::vec![self.start, ..self.waypoints.iter().copied(), self.goal]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineRejection {
    /// 1-based line number in the scenario file.
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ParsedScenario {
    pub entries: Vec<WaypointScenarioEntry>,
    pub rejected: Vec<LineRejection>,
}

const MIN_FIELDS: usize = 10;

fn field<T: std::str::FromStr>(parts: &[&str], idx: usize, name: &str) -> Result<T, String> {
    parts[idx]
        .trim()
        .parse()
        .map_err(|_| format!("could not parse {} from {:?}", name, parts[idx]))
}

/// Parses one tab-separated scenario line. Coordinates are passed through
/// without checking them against the map dimensions.
pub fn parse_line(line: &str) -> Result<WaypointScenarioEntry, String> {
    let parts = line.split('\t').collect::<Vec<_>>();
    if parts.len() < MIN_FIELDS {
        return Err(format!(
            "expected at least {} tab-separated fields, found {}",
            MIN_FIELDS,
            parts.len()
        ));
    }

    let width: u32 = field(&parts, 2, "width")?;
    let height: u32 = field(&parts, 3, "height")?;
    if width == 0 || height == 0 {
        return Err(format!("map dimensions must be positive, got {}x{}", width, height));
    }

    let mut waypoints = Vec::new();
    if let Some(payload) = parts.get(10) {
        let coords = payload
            .split_whitespace()
            .map(|c| {
                c.parse::<i64>()
                    .map_err(|_| format!("could not parse waypoint coordinate {:?}", c))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if coords.len() % 2 != 0 {
            trace!("Dropping unpaired trailing waypoint coordinate");
        }
        waypoints.extend(coords.chunks_exact(2).map(|c| Point::new(c[0], c[1])));
    }

    Ok(WaypointScenarioEntry {
        bucket: field(&parts, 0, "bucket")?,
        map_name: parts[1].to_string(),
        width,
        height,
        start: Point::new(field(&parts, 4, "start x")?, field(&parts, 5, "start y")?),
        goal: Point::new(field(&parts, 6, "goal x")?, field(&parts, 7, "goal y")?),
        optimal_length: field(&parts, 8, "optimal length")?,
        num_waypoints: field(&parts, 9, "waypoint count")?,
        waypoints,
    })
}

/// Parses a whole scenario file. The first line is the version marker.
/// Malformed lines are reported and skipped.
pub fn parse_scenario(contents: &str) -> ParsedScenario {
    let mut parsed = ParsedScenario::default();
    for (line_idx, line) in contents.lines().enumerate().skip(1) {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Ok(entry) => parsed.entries.push(entry),
            Err(reason) => {
                let rejection = LineRejection {
                    line: line_idx + 1,
                    reason,
                };
                warn!("Skipping scenario line {}: {}", rejection.line, rejection.reason);
                parsed.rejected.push(rejection);
            }
        }
    }
    parsed
}

pub fn load_scenario(path: &Path) -> Result<ParsedScenario, LoadError> {
    trace!("Loading scenario file {}", path.display());
    let contents = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed = parse_scenario(&contents);
    debug!(
        "Loaded {} scenario entries ({} lines rejected) from {}",
        parsed.entries.len(),
        parsed.rejected.len(),
        path.display()
    );
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = "version 1\n\
        0\tempty-8-8.map\t8\t8\t0\t0\t4\t4\t5.6\t1\t2 2\n\
        1\tempty-8-8.map\t8\t8\t1\t1\t3\t3\t2.8\t0\n\
        2\tempty-8-8.map\t8\t8\t1\t1\n\
        3\tempty-8-8.map\t8\teight\t1\t1\t3\t3\t2.8\t0\n\
        \n\
        4\tempty-8-8.map\t8\t8\t5\t5\t6\t6\t1.4\t2\t1 2 3 4 7\n";

    #[test]
    fn parses_entries_and_skips_malformed_lines() {
        let parsed = parse_scenario(SCENARIO);
        assert_eq!(parsed.entries.len(), 3);
        assert_eq!(
            parsed.rejected.iter().map(|r| r.line).collect::<Vec<_>>(),
            vec![4, 5]
        );

        let first = &parsed.entries[0];
        assert_eq!(first.bucket, 0);
        assert_eq!(first.map_name, "empty-8-8.map");
        assert_eq!((first.width, first.height), (8, 8));
        assert_eq!(first.start, Point::new(0, 0));
        assert_eq!(first.goal, Point::new(4, 4));
        assert_eq!(first.waypoints, vec![Point::new(2, 2)]);

        assert!(parsed.entries[1].waypoints.is_empty());
    }

    #[test]
    fn odd_trailing_coordinate_is_dropped() {
        let parsed = parse_scenario(SCENARIO);
        let last = &parsed.entries[2];
        assert_eq!(last.waypoints, vec![Point::new(1, 2), Point::new(3, 4)]);
    }

    #[test]
    fn route_keeps_waypoint_order() {
        let entry = parse_line("0\tm.map\t8\t8\t0\t0\t7\t7\t0\t3\t5 5 1 1 3 3").unwrap();
        assert_eq!(
            entry.route(),
            vec![
                Point::new(0, 0),
                Point::new(5, 5),
                Point::new(1, 1),
                Point::new(3, 3),
                Point::new(7, 7)
            ]
        );
    }

    #[test]
    fn out_of_map_waypoints_pass_through() {
        let entry = parse_line("0\tm.map\t8\t8\t0\t0\t7\t7\t0\t1\t40 -3").unwrap();
        assert_eq!(entry.waypoints, vec![Point::new(40, -3)]);
    }

    #[test]
    fn zero_sized_map_is_rejected() {
        assert!(parse_line("0\tm.map\t0\t8\t0\t0\t7\t7\t0\t0").is_err());
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_scenario(&dir.path().join("nope.scen")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
