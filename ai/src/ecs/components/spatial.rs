//
// Copyright 2025 Hans W. Uhlig. All Rights Reserved.
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

//! Spatial components for positioning, motion and spawn regions

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Microseconds per second of server time
pub const MICROS_PER_SECOND: u64 = 1_000_000;

/// Time it takes an entity to finish a rotation
const ROTATION_DURATION: u64 = 500_000;

/// Simple X, Y coordinate point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Distance between this point and another
    pub fn distance(&self, other: Point) -> f32 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }

    /// Point `dist` units along the line from this point toward `dest`
    ///
    /// A negative distance moves away from `dest` instead. If both points
    /// are the same there is no direction to move in and this point is
    /// returned unchanged.
    pub fn towards(&self, dest: Point, dist: f32) -> Point {
        let total = self.distance(dest);
        if total == 0.0 {
            return *self;
        }

        Point {
            x: self.x + (dest.x - self.x) / total * dist,
            y: self.y + (dest.y - self.y) / total * dist,
        }
    }

    /// Point `dist` units from this point directly away from `threat`
    pub fn away_from(&self, threat: Point, dist: f32) -> Point {
        self.towards(threat, -dist)
    }

    /// Rotate this point around `origin` by `radians`
    pub fn rotate_around(&self, origin: Point, radians: f32) -> Point {
        let (sin, cos) = radians.sin_cos();
        let dx = self.x - origin.x;
        let dy = self.y - origin.y;
        Point {
            x: origin.x + dx * cos - dy * sin,
            y: origin.y + dx * sin + dy * cos,
        }
    }

    /// Facing angle (radians) from this point to another
    pub fn angle_to(&self, other: Point) -> f32 {
        (other.y - self.y).atan2(other.x - self.x)
    }
}

/// Pair of points representing a line segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub a: Point,
    pub b: Point,
}

impl Line {
    pub fn new(a: Point, b: Point) -> Self {
        Self { a, b }
    }

    pub fn length(&self) -> f32 {
        self.a.distance(self.b)
    }

    /// Intersection point of two segments, if they cross
    pub fn intersect(&self, other: &Line) -> Option<Point> {
        let r = Point::new(self.b.x - self.a.x, self.b.y - self.a.y);
        let s = Point::new(other.b.x - other.a.x, other.b.y - other.a.y);
        let denom = r.x * s.y - r.y * s.x;
        if denom.abs() < f32::EPSILON {
            // Parallel or collinear
            return None;
        }

        let qp = Point::new(other.a.x - self.a.x, other.a.y - self.a.y);
        let t = (qp.x * s.y - qp.y * s.x) / denom;
        let u = (qp.x * r.y - qp.y * r.x) / denom;
        if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
            Some(Point::new(self.a.x + t * r.x, self.a.y + t * r.y))
        } else {
            None
        }
    }
}

/// Normalize an angle to [-PI, PI]
pub fn normalize_angle(radians: f32) -> f32 {
    let mut angle = radians % (2.0 * PI);
    if angle > PI {
        angle -= 2.0 * PI;
    } else if angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Motion state of an active entity
///
/// Movement is expressed as an origin and a destination stamped with server
/// times; the current position is interpolated between them whenever the
/// entity is refreshed. Observers receive the origin/destination pair, so a
/// move is only "observable" on the tick it starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Motion {
    pub origin: Point,
    pub origin_rotation: f32,
    pub origin_ticks: u64,
    pub destination: Point,
    pub destination_rotation: f32,
    pub destination_ticks: u64,
    pub current: Point,
    pub rotation: f32,
    /// Movement speed in units per second
    pub run_speed: f32,
}

impl Motion {
    /// Create a stationary motion state
    pub fn new(position: Point, rotation: f32, run_speed: f32) -> Self {
        Self {
            origin: position,
            origin_rotation: rotation,
            origin_ticks: 0,
            destination: position,
            destination_rotation: rotation,
            destination_ticks: 0,
            current: position,
            rotation,
            run_speed,
        }
    }

    /// Recalculate the current position and rotation for `now`
    pub fn refresh(&mut self, now: u64) {
        if now >= self.destination_ticks || self.destination_ticks <= self.origin_ticks {
            self.current = self.destination;
            self.rotation = self.destination_rotation;
            return;
        }

        let elapsed = now.saturating_sub(self.origin_ticks) as f32;
        let total = (self.destination_ticks - self.origin_ticks) as f32;
        let progress = elapsed / total;

        self.current = Point::new(
            self.origin.x + (self.destination.x - self.origin.x) * progress,
            self.origin.y + (self.destination.y - self.origin.y) * progress,
        );

        let turn = normalize_angle(self.destination_rotation - self.origin_rotation);
        self.rotation = normalize_angle(self.origin_rotation + turn * progress);
    }

    pub fn is_moving(&self) -> bool {
        self.current != self.destination
    }

    pub fn is_rotating(&self) -> bool {
        self.rotation != self.destination_rotation
    }

    /// Begin moving toward `dest`, facing it immediately
    ///
    /// Returns false if the entity has no speed to move with.
    pub fn move_to(&mut self, dest: Point, now: u64) -> bool {
        if self.run_speed <= 0.0 {
            return false;
        }

        let dist = self.current.distance(dest);
        let travel = ((dist / self.run_speed) * MICROS_PER_SECOND as f32) as u64;
        let facing = if dist > 0.0 {
            self.current.angle_to(dest)
        } else {
            self.rotation
        };

        self.origin = self.current;
        self.origin_ticks = now;
        self.destination = dest;
        self.destination_ticks = now + travel.max(1);
        self.rotation = facing;
        self.origin_rotation = facing;
        self.destination_rotation = facing;
        true
    }

    /// Begin turning in place
    pub fn rotate(&mut self, rotation: f32, now: u64) {
        self.origin = self.current;
        self.destination = self.current;
        self.origin_rotation = self.rotation;
        self.destination_rotation = normalize_angle(rotation);
        self.origin_ticks = now;
        self.destination_ticks = now + ROTATION_DURATION;
    }

    /// Stop wherever the entity currently is
    pub fn stop(&mut self, now: u64) {
        self.origin = self.current;
        self.destination = self.current;
        self.origin_rotation = self.rotation;
        self.destination_rotation = self.rotation;
        self.origin_ticks = now;
        self.destination_ticks = now;
    }

    /// Instantly relocate
    pub fn warp(&mut self, position: Point, rotation: f32, now: u64) {
        self.origin = position;
        self.destination = position;
        self.current = position;
        self.origin_rotation = rotation;
        self.destination_rotation = rotation;
        self.rotation = rotation;
        self.origin_ticks = now;
        self.destination_ticks = now;
    }
}

/// A region of a zone an entity can spawn in, wander in or return to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum SpawnRegion {
    /// Closed polygon
    Polygon { points: Vec<Point> },
    /// Axis aligned rectangle around a spot
    Spot {
        center: Point,
        width: f32,
        height: f32,
    },
}

impl SpawnRegion {
    /// Check if a point lies inside the region
    pub fn contains(&self, p: Point) -> bool {
        match self {
            SpawnRegion::Polygon { points } => {
                // Ray casting
                let mut inside = false;
                let count = points.len();
                if count < 3 {
                    return false;
                }
                let mut j = count - 1;
                for i in 0..count {
                    let (pi, pj) = (points[i], points[j]);
                    if (pi.y > p.y) != (pj.y > p.y)
                        && p.x < (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x
                    {
                        inside = !inside;
                    }
                    j = i;
                }
                inside
            }
            SpawnRegion::Spot {
                center,
                width,
                height,
            } => (p.x - center.x).abs() <= width / 2.0 && (p.y - center.y).abs() <= height / 2.0,
        }
    }

    /// Geometric center of the region
    pub fn center(&self) -> Point {
        match self {
            SpawnRegion::Polygon { points } => {
                if points.is_empty() {
                    return Point::default();
                }
                let n = points.len() as f32;
                let (sx, sy) = points
                    .iter()
                    .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
                Point::new(sx / n, sy / n)
            }
            SpawnRegion::Spot { center, .. } => *center,
        }
    }

    /// Top left-most and bottom right-most corners
    pub fn bounds(&self) -> (Point, Point) {
        match self {
            SpawnRegion::Polygon { points } => {
                let mut min = Point::new(f32::MAX, f32::MAX);
                let mut max = Point::new(f32::MIN, f32::MIN);
                for p in points {
                    min.x = min.x.min(p.x);
                    min.y = min.y.min(p.y);
                    max.x = max.x.max(p.x);
                    max.y = max.y.max(p.y);
                }
                (min, max)
            }
            SpawnRegion::Spot {
                center,
                width,
                height,
            } => (
                Point::new(center.x - width / 2.0, center.y - height / 2.0),
                Point::new(center.x + width / 2.0, center.y + height / 2.0),
            ),
        }
    }
}

/// Where an AI controlled entity came from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpawnOrigin {
    /// Polygon the entity wanders in
    pub area: Option<SpawnRegion>,
    /// Spot the entity wanders around
    pub spot: Option<SpawnRegion>,
    /// Region the entity heads back to while a despawn is pending
    pub home: Option<SpawnRegion>,
}

impl SpawnOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_area(mut self, area: SpawnRegion) -> Self {
        self.area = Some(area);
        self
    }

    pub fn with_spot(mut self, spot: SpawnRegion) -> Self {
        self.spot = Some(spot);
        self
    }

    pub fn with_home(mut self, home: SpawnRegion) -> Self {
        self.home = Some(home);
        self
    }

    /// Check if the entity has somewhere to wander
    pub fn has_spawn_area(&self) -> bool {
        self.area.is_some() || self.spot.is_some()
    }
}
