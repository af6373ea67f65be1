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
//! Movement planning for AI controlled entities
//!
//! Every plan is checked against the zone's geometry before it is turned
//! into a move command. Long legs are split into pieces roughly one second
//! of travel apart so observers see continuous movement.

use crate::ecs::components::{AiCommand, AiState, EntityId, Line, Point, SpawnRegion};
use crate::ecs::zone::Zone;
use crate::random::RandomSource;
use std::f32::consts::PI;

/// Angle circling moves sweep per waypoint
pub const CIRCLE_STEP: f32 = PI / 6.0;

/// Seconds of travel a single wander may cover
pub const WANDER_TRAVEL_SECONDS: f32 = 2.0;

/// Seconds of travel between subdivided waypoints
pub const SEGMENT_SECONDS: f32 = 1.0;

/// Slack allowed on either side of a chase band
pub const BAND_TOLERANCE: f32 = 0.5;

/// Plans chase, circle, retreat and wander moves
#[derive(Debug, Clone)]
pub struct PathingSystem {
    lazy_pathing: bool,
}

impl PathingSystem {
    pub fn new(lazy_pathing: bool) -> Self {
        Self { lazy_pathing }
    }

    pub fn lazy_pathing(&self) -> bool {
        self.lazy_pathing
    }

    /// Split every leg longer than `max_leg` into equal pieces
    pub fn subdivide(from: Point, path: &[Point], max_leg: f32) -> Vec<Point> {
        if max_leg <= 0.0 {
            return path.to_vec();
        }

        let mut result = Vec::with_capacity(path.len());
        let mut previous = from;
        for point in path {
            let leg = previous.distance(*point);
            let pieces = (leg / max_leg).ceil() as usize;
            for step in 1..pieces {
                result.push(previous.towards(*point, max_leg * step as f32));
            }
            result.push(*point);
            previous = *point;
        }
        result
    }

    /// Cut a path short once `max_length` of travel is used up
    pub fn truncate(from: Point, path: &[Point], max_length: f32) -> Vec<Point> {
        let mut result = Vec::with_capacity(path.len());
        let mut previous = from;
        let mut remaining = max_length;
        for point in path {
            let leg = previous.distance(*point);
            if leg <= remaining {
                result.push(*point);
                remaining -= leg;
                previous = *point;
            } else {
                if remaining > 0.0 {
                    result.push(previous.towards(*point, remaining));
                }
                break;
            }
        }
        result
    }

    /// Route between two points, straight when allowed and unobstructed
    fn plan(&self, zone: &Zone, from: Point, to: Point, allow_direct: bool) -> Option<Vec<Point>> {
        if allow_direct && !zone.has_line_of_sight_collision(&Line::new(from, to)) {
            return Some(vec![to]);
        }
        zone.shortest_path(from, to)
    }

    fn move_command(from: Point, path: &[Point], run_speed: f32) -> Option<AiCommand> {
        let path = Self::subdivide(from, path, run_speed * SEGMENT_SECONDS);
        if path.is_empty() {
            return None;
        }
        Some(AiCommand::move_path(path))
    }

    /// Move straight to a point, going around walls if needed
    pub fn move_to_point(&self, zone: &Zone, id: EntityId, dest: Point) -> Option<AiCommand> {
        let motion = zone.motion(id)?;
        let path = self.plan(zone, motion.current, dest, true)?;
        Self::move_command(motion.current, &path, motion.run_speed)
    }

    /// Whether `dist` lies within `[min_dist, max_dist]`, give or take
    /// [`BAND_TOLERANCE`]
    pub fn in_band(dist: f32, min_dist: f32, max_dist: f32) -> bool {
        dist >= min_dist - BAND_TOLERANCE && dist <= max_dist + BAND_TOLERANCE
    }

    /// Close in on a target until within `[min_dist, max_dist]` of it
    ///
    /// Returns `None` if the entity is already within the band or no route
    /// to the target exists.
    pub fn chase(
        &self,
        zone: &Zone,
        id: EntityId,
        target: EntityId,
        min_dist: f32,
        max_dist: f32,
    ) -> Option<AiCommand> {
        let motion = zone.motion(id)?;
        let source = motion.current;
        let dest = zone.position(target)?;

        let dist = source.distance(dest);
        if Self::in_band(dist, min_dist, max_dist) {
            return None;
        }

        // Stop in the middle of the band so rounding cannot push the end out
        let point = source.towards(dest, dist - (min_dist + max_dist) / 2.0);
        let path = self.plan(zone, source, point, self.lazy_pathing)?;
        Self::move_command(source, &path, motion.run_speed)
            .map(|command| command.with_target(target, min_dist, max_dist))
    }

    fn circle_path(
        zone: &Zone,
        source: Point,
        pivot: Point,
        start: Point,
        sign: f32,
    ) -> Option<Vec<Point>> {
        let blocked = |a: Point, b: Point| zone.has_line_of_sight_collision(&Line::new(a, b));

        let mut path = Vec::new();
        let mut previous = source;
        if start != source {
            if blocked(source, start) {
                return None;
            }
            path.push(start);
            previous = start;
        }

        let first = start.rotate_around(pivot, sign * CIRCLE_STEP);
        if blocked(previous, first) {
            return None;
        }
        path.push(first);

        let second = first.rotate_around(pivot, sign * CIRCLE_STEP);
        if !blocked(first, second) {
            path.push(second);
        }
        Some(path)
    }

    /// Move sideways around a pivot at `distance` from it
    pub fn circle(
        &self,
        zone: &Zone,
        id: EntityId,
        pivot: EntityId,
        distance: f32,
        rng: &mut dyn RandomSource,
    ) -> Option<AiCommand> {
        let motion = zone.motion(id)?;
        let source = motion.current;
        let center = zone.position(pivot)?;
        if source == center {
            return None;
        }

        let start = center.towards(source, distance);
        let sign = rng.sign();
        [sign, -sign]
            .into_iter()
            .find_map(|sign| Self::circle_path(zone, source, center, start, sign))
            .and_then(|path| Self::move_command(source, &path, motion.run_speed))
    }

    /// Back away from a threat
    ///
    /// Only plans the move if it ends farther from the threat and nothing
    /// is in the way.
    pub fn retreat(
        &self,
        zone: &Zone,
        id: EntityId,
        threat: Point,
        distance: f32,
    ) -> Option<AiCommand> {
        let motion = zone.motion(id)?;
        let source = motion.current;
        let point = source.away_from(threat, distance);

        if point.distance(threat) <= source.distance(threat) {
            return None;
        }
        if zone.has_line_of_sight_collision(&Line::new(source, point)) {
            return None;
        }
        Self::move_command(source, &[point], motion.run_speed)
    }

    fn wander_destination(
        zone: &Zone,
        source: Point,
        rotation: f32,
        area: Option<&SpawnRegion>,
        spot: Option<&SpawnRegion>,
        wander_distance: f32,
        rng: &mut dyn RandomSource,
    ) -> Option<Point> {
        if let Some(area) = area {
            return Some(zone.random_point_in_region(area, rng));
        }
        if let Some(spot) = spot {
            return Some(zone.random_point_in_region(spot, rng));
        }
        if wander_distance <= 0.0 {
            return None;
        }

        let forward = Point::new(
            source.x + rotation.cos() * wander_distance,
            source.y + rotation.sin() * wander_distance,
        );
        let angle = (rng.unit() * 2.0 - 1.0) * PI;
        Some(forward.rotate_around(source, angle))
    }

    /// Pick somewhere to wander to
    ///
    /// Entities with a despawn pending head back toward their home region
    /// instead. Travel is capped at a couple of seconds worth of movement.
    pub fn wander(
        &self,
        zone: &Zone,
        id: EntityId,
        ai: &AiState,
        rng: &mut dyn RandomSource,
    ) -> Option<AiCommand> {
        let motion = zone.motion(id)?;
        let source = motion.current;
        let cap = motion.run_speed * WANDER_TRAVEL_SECONDS;
        if cap <= 0.0 {
            return None;
        }
        let origin = zone.spawn_origin(id).unwrap_or_default();

        if ai.despawn_timeout().is_some() {
            if let Some(home) = &origin.home {
                if !home.contains(source) {
                    let path = zone.shortest_path(source, home.center())?;
                    let path = Self::truncate(source, &path, cap);
                    tracing::trace!("{} heading home before despawn", id);
                    return Self::move_command(source, &path, motion.run_speed);
                }
            }
        }

        let dest = Self::wander_destination(
            zone,
            source,
            motion.rotation,
            origin.area.as_ref(),
            origin.spot.as_ref(),
            ai.logic_group().wander_distance,
            rng,
        )?;
        let path = self.plan(zone, source, dest, true)?;
        let path = Self::truncate(source, &path, cap);
        Self::move_command(source, &path, motion.run_speed)
    }
}
