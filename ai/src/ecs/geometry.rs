//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
//! Zone geometry: line of sight and path finding
//!
//! The AI engine only needs two questions answered about a zone's layout:
//! whether a straight line is blocked, and how to get around whatever
//! blocks it. [`SegmentGeometry`] answers both for zones described as a
//! set of wall segments.

use crate::ecs::components::{Line, Point};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Distance path nodes are kept away from wall ends
const CLEARANCE: f32 = 1.0;

/// Collision and path finding queries against a zone's static layout
#[cfg_attr(test, mockall::automock)]
pub trait Geometry: Send + Sync {
    /// First point along `line` (from `line.a`) that hits a wall
    fn collides(&self, line: &Line) -> Option<Point>;

    /// Waypoints leading from `from` to `to`, excluding `from`
    ///
    /// The last waypoint is `to`. Returns `None` if no route exists.
    fn shortest_path(&self, from: Point, to: Point) -> Option<Vec<Point>>;
}

/// Geometry for an open zone with no obstacles
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGeometry;

impl Geometry for OpenGeometry {
    fn collides(&self, _line: &Line) -> Option<Point> {
        None
    }

    fn shortest_path(&self, _from: Point, to: Point) -> Option<Vec<Point>> {
        Some(vec![to])
    }
}

/// Zone layout made of impassable wall segments
///
/// Paths are found over a visibility graph whose nodes sit just outside
/// every wall end, so routes hug corners without touching them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentGeometry {
    walls: Vec<Line>,
}

impl SegmentGeometry {
    pub fn new(walls: impl IntoIterator<Item = Line>) -> Self {
        Self {
            walls: walls.into_iter().collect(),
        }
    }

    pub fn walls(&self) -> &[Line] {
        &self.walls
    }

    fn is_clear(&self, a: Point, b: Point) -> bool {
        self.collides(&Line::new(a, b)).is_none()
    }

    /// Candidate corner nodes around every wall end
    fn corner_nodes(&self) -> Vec<Point> {
        let mut nodes = Vec::with_capacity(self.walls.len() * 4);
        for wall in &self.walls {
            let len = wall.length();
            if len <= f32::EPSILON {
                continue;
            }
            for (end, other) in [(wall.a, wall.b), (wall.b, wall.a)] {
                let dx = (end.x - other.x) / len;
                let dy = (end.y - other.y) / len;
                let past = Point::new(end.x + dx * CLEARANCE, end.y + dy * CLEARANCE);
                nodes.push(Point::new(past.x - dy * CLEARANCE, past.y + dx * CLEARANCE));
                nodes.push(Point::new(past.x + dy * CLEARANCE, past.y - dx * CLEARANCE));
            }
        }
        nodes
    }
}

#[derive(Debug, PartialEq)]
struct Visit {
    cost: f32,
    node: usize,
}

impl Eq for Visit {}

impl Ord for Visit {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for Visit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Geometry for SegmentGeometry {
    fn collides(&self, line: &Line) -> Option<Point> {
        self.walls
            .iter()
            .filter_map(|wall| line.intersect(wall))
            .min_by(|p, q| {
                line.a
                    .distance(*p)
                    .partial_cmp(&line.a.distance(*q))
                    .unwrap_or(Ordering::Equal)
            })
    }

    fn shortest_path(&self, from: Point, to: Point) -> Option<Vec<Point>> {
        if self.is_clear(from, to) {
            return Some(vec![to]);
        }

        // Node 0 is the start, node 1 the goal, the rest are corners
        let mut nodes = vec![from, to];
        nodes.extend(self.corner_nodes());

        let mut best = vec![f32::INFINITY; nodes.len()];
        let mut previous: Vec<Option<usize>> = vec![None; nodes.len()];
        let mut heap = BinaryHeap::new();
        best[0] = 0.0;
        heap.push(Visit { cost: 0.0, node: 0 });

        while let Some(Visit { cost, node }) = heap.pop() {
            if node == 1 {
                break;
            }
            if cost > best[node] {
                continue;
            }
            for next in 1..nodes.len() {
                if next == node || !self.is_clear(nodes[node], nodes[next]) {
                    continue;
                }
                let candidate = cost + nodes[node].distance(nodes[next]);
                if candidate < best[next] {
                    best[next] = candidate;
                    previous[next] = Some(node);
                    heap.push(Visit {
                        cost: candidate,
                        node: next,
                    });
                }
            }
        }

        previous[1]?;

        let mut path = Vec::new();
        let mut current = 1;
        while current != 0 {
            path.push(nodes[current]);
            current = previous[current]?;
        }
        path.reverse();
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall() -> SegmentGeometry {
        // Vertical wall between the start and the goal
        SegmentGeometry::new([Line::new(Point::new(50.0, -100.0), Point::new(50.0, 100.0))])
    }

    #[test]
    fn test_collides_reports_nearest_hit() {
        let geometry = SegmentGeometry::new([
            Line::new(Point::new(80.0, -10.0), Point::new(80.0, 10.0)),
            Line::new(Point::new(40.0, -10.0), Point::new(40.0, 10.0)),
        ]);

        let hit = geometry.collides(&Line::new(Point::new(0.0, 0.0), Point::new(100.0, 0.0)));
        assert_eq!(hit, Some(Point::new(40.0, 0.0)));
        assert!(
            geometry
                .collides(&Line::new(Point::new(0.0, 50.0), Point::new(100.0, 50.0)))
                .is_none()
        );
    }

    #[test]
    fn test_direct_path_when_clear() {
        let geometry = SegmentGeometry::default();
        let path = geometry.shortest_path(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        assert_eq!(path, Some(vec![Point::new(10.0, 10.0)]));
    }

    #[test]
    fn test_path_around_wall() {
        let geometry = wall();
        let from = Point::new(0.0, 0.0);
        let to = Point::new(100.0, 0.0);

        let path = geometry.shortest_path(from, to).unwrap();
        assert!(path.len() >= 2);
        assert_eq!(path.last(), Some(&to));

        // Every leg of the route is unobstructed
        let mut previous = from;
        for point in &path {
            assert!(geometry.collides(&Line::new(previous, *point)).is_none());
            previous = *point;
        }
    }

    #[test]
    fn test_no_path_when_enclosed() {
        let geometry = SegmentGeometry::new([
            Line::new(Point::new(-10.0, -10.0), Point::new(10.0, -10.0)),
            Line::new(Point::new(10.0, -10.0), Point::new(10.0, 10.0)),
            Line::new(Point::new(10.0, 10.0), Point::new(-10.0, 10.0)),
            Line::new(Point::new(-10.0, 10.0), Point::new(-10.0, -10.0)),
        ]);

        assert!(
            geometry
                .shortest_path(Point::new(0.0, 0.0), Point::new(100.0, 0.0))
                .is_none()
        );
    }
}
