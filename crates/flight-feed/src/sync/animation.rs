// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Linear position smoothing between polls.
//!
//! Polls land every few seconds, so a marker that jumped straight to each new
//! position would stutter across the map. Each update instead starts a
//! [`PositionAnimation`] from the marker's displayed position to the reported
//! one, finishing just before the next poll is due. Animations only touch the
//! displayed position; the stored flight record is never interpolated.

use std::time::{Duration, Instant};

use super::{LatLng, MapSurface};

/// Time a marker takes to glide to its new position.
///
/// Kept just under the poll interval so motion completes before the next
/// snapshot arrives.
pub const ANIMATION_DURATION: Duration = Duration::from_millis(4900);

/// Interval between displayed-position updates (about 30 per second).
pub const ANIMATION_TICK: Duration = Duration::from_millis(33);

/// One marker moving from `from` to `to` over `duration`.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionAnimation<H> {
    pub handle: H,
    pub from: LatLng,
    pub to: LatLng,
    pub started: Instant,
    pub duration: Duration,
}

impl<H> PositionAnimation<H> {
    /// Fraction of the animation elapsed at `now`, clamped to `[0, 1]`.
    #[must_use]
    pub fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        (elapsed / self.duration.as_secs_f64()).min(1.0)
    }

    /// Displayed position at `progress`; exactly `to` once complete.
    #[must_use]
    pub fn position_at(&self, progress: f64) -> LatLng {
        if progress >= 1.0 {
            self.to
        } else {
            self.from.lerp(self.to, progress.max(0.0))
        }
    }
}

/// Running animations, in the order they were started.
///
/// Starting a new animation for a marker that is still moving does not stop
/// the old one. Both are applied on every tick in start order, so the newest
/// one determines what is displayed, and it begins at the marker's current
/// displayed position, so nothing snaps.
#[derive(Debug)]
pub struct Animator<H> {
    active: Vec<PositionAnimation<H>>,
    duration: Duration,
}

impl<H: PartialEq> Animator<H> {
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self {
            active: Vec::new(),
            duration,
        }
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Start moving `handle` and apply its first frame immediately.
    pub fn start<S>(&mut self, surface: &mut S, handle: H, from: LatLng, to: LatLng, now: Instant)
    where
        S: MapSurface<Handle = H>,
    {
        let animation = PositionAnimation {
            handle,
            from,
            to,
            started: now,
            duration: self.duration,
        };
        let progress = animation.progress(now);
        surface.set_marker_position(&animation.handle, animation.position_at(progress));
        if progress < 1.0 {
            self.active.push(animation);
        }
    }

    /// Advance every animation to `now`, retiring the finished ones.
    ///
    /// Returns the number still running.
    pub fn tick<S>(&mut self, surface: &mut S, now: Instant) -> usize
    where
        S: MapSurface<Handle = H>,
    {
        self.active.retain(|animation| {
            let progress = animation.progress(now);
            surface.set_marker_position(&animation.handle, animation.position_at(progress));
            progress < 1.0
        });
        self.active.len()
    }

    /// Drop every animation bound to `handle`.
    pub fn forget(&mut self, handle: &H) {
        self.active.retain(|animation| &animation.handle != handle);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.active.is_empty()
    }
}
