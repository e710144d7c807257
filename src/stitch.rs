use crate::scenario::Point;
use crate::segment::Segment;
use log::*;

/// Accumulates solved segments into one path per agent.
///
/// Each segment after the first adds its path without the first point, which
/// repeats the end of the previous segment. A stationary segment still adds
/// its single point, so agents that are waiting at their goal keep up with
/// the others step for step.
#[derive(Debug, Clone)]
pub struct PathStitcher {
    paths: Vec<Vec<Point>>,
    total_cost: f64,
    segments: usize,
}

impl PathStitcher {
    pub fn new(num_agents: usize) -> Self {
        PathStitcher {
            paths: vec![Vec::new(); num_agents],
            total_cost: 0.0,
            segments: 0,
        }
    }

    pub fn extend(&mut self, segment: &Segment, paths: &[Vec<Point>], cost: Option<f64>) {
        assert_eq!(segment.num_agents(), self.paths.len());
        assert_eq!(
            segment.index, self.segments,
            "segments must be stitched in index order"
        );

        for (agent, assembled) in self.paths.iter_mut().enumerate() {
            let (from, to) = segment.pairs[agent];
            let path = paths.get(agent).map(|p| p.as_slice()).unwrap_or(&[]);

            if segment.index == 0 {
                if path.is_empty() {
                    warn!("Segment 0: agent {} has no path, holding it at {}", agent, from);
                    assembled.push(from);
                } else {
                    assembled.extend_from_slice(path);
                }
                continue;
            }

            if let (Some(last), Some(first)) = (assembled.last(), path.first()) {
                if last != first {
                    warn!(
                        "Segment {}: agent {} path starts at {} but previous segment ended at {}",
                        segment.index, agent, first, last
                    );
                }
            }

            match path {
                [] => {
                    warn!(
                        "Segment {}: agent {} has no path, appending its target {}",
                        segment.index, agent, to
                    );
                    assembled.push(to);
                }
                [single] => assembled.push(*single),
                [_, rest @ ..] => assembled.extend_from_slice(rest),
            }
        }

        self.total_cost += cost.unwrap_or(0.0);
        self.segments += 1;
    }

    pub fn paths(&self) -> &[Vec<Point>] {
        &self.paths
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    pub fn segments_stitched(&self) -> usize {
        self.segments
    }

    pub fn into_parts(self) -> (Vec<Vec<Point>>, f64) {
        (self.paths, self.total_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i64, y: i64) -> Point {
        Point::new(x, y)
    }

    fn seg(index: usize, pairs: Vec<(Point, Point)>) -> Segment {
        Segment { index, pairs }
    }

    #[test]
    fn first_segment_is_taken_verbatim() {
        let mut stitcher = PathStitcher::new(2);
        stitcher.extend(
            &seg(0, vec![(p(0, 0), p(2, 0)), (p(1, 1), p(1, 1))]),
            &[vec![p(0, 0), p(1, 0), p(2, 0)], vec![p(1, 1)]],
            Some(2.0),
        );
        assert_eq!(stitcher.paths()[0], vec![p(0, 0), p(1, 0), p(2, 0)]);
        assert_eq!(stitcher.paths()[1], vec![p(1, 1)]);
        assert_eq!(stitcher.total_cost(), 2.0);
    }

    #[test]
    fn later_segments_drop_the_shared_boundary() {
        let mut stitcher = PathStitcher::new(2);
        stitcher.extend(
            &seg(0, vec![(p(0, 0), p(2, 2)), (p(1, 1), p(3, 3))]),
            &[
                vec![p(0, 0), p(1, 0), p(2, 0), p(2, 1), p(2, 2)],
                vec![p(1, 1), p(2, 1), p(3, 1), p(3, 2), p(3, 3)],
            ],
            Some(8.0),
        );
        stitcher.extend(
            &seg(1, vec![(p(2, 2), p(4, 4)), (p(3, 3), p(3, 3))]),
            &[vec![p(2, 2), p(3, 2), p(4, 2), p(4, 3), p(4, 4)], vec![p(3, 3)]],
            None,
        );

        assert_eq!(
            stitcher.paths()[0],
            vec![
                p(0, 0),
                p(1, 0),
                p(2, 0),
                p(2, 1),
                p(2, 2),
                p(3, 2),
                p(4, 2),
                p(4, 3),
                p(4, 4)
            ]
        );
        // Stationary segment contributes exactly one point.
        assert_eq!(stitcher.paths()[1].len(), 6);
        assert_eq!(stitcher.paths()[1].last(), Some(&p(3, 3)));
        assert_eq!(stitcher.total_cost(), 8.0);
        assert_eq!(stitcher.segments_stitched(), 2);
    }

    #[test]
    fn missing_paths_fall_back_to_segment_endpoints() {
        let mut stitcher = PathStitcher::new(2);
        stitcher.extend(
            &seg(0, vec![(p(0, 0), p(1, 0)), (p(5, 5), p(6, 5))]),
            &[vec![p(0, 0), p(1, 0)], vec![]],
            Some(1.0),
        );
        assert_eq!(stitcher.paths()[1], vec![p(5, 5)]);

        stitcher.extend(
            &seg(1, vec![(p(1, 0), p(2, 0)), (p(6, 5), p(7, 5))]),
            &[vec![p(1, 0), p(2, 0)]],
            Some(1.0),
        );
        assert_eq!(stitcher.paths()[1], vec![p(5, 5), p(7, 5)]);
        assert_eq!(stitcher.paths()[0], vec![p(0, 0), p(1, 0), p(2, 0)]);
    }

    #[test]
    #[should_panic]
    fn out_of_order_segments_are_rejected() {
        let mut stitcher = PathStitcher::new(1);
        stitcher.extend(&seg(1, vec![(p(0, 0), p(0, 0))]), &[vec![p(0, 0)]], None);
    }
}
