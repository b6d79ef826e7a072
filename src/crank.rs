//! Crank gesture tracking: pointer positions to signed angular deltas.

use glam::Vec2;

use crate::params::CrankConfig;

/// Normalize a raw angle difference into `(-180, 180]` degrees.
///
/// Consecutive `atan2` angles jump by up to a full turn at the ±180° seam;
/// the true rotation between two samples is always the congruent value in
/// this range.
pub fn wrap_degrees(delta_deg: f32) -> f32 {
    if delta_deg > 180.0 {
        delta_deg - 360.0
    } else if delta_deg <= -180.0 {
        delta_deg + 360.0
    } else {
        delta_deg
    }
}

/// Tracks one crank-drag session and emits per-sample angular deltas.
///
/// The tracker holds only the reference center, the last valid angle, and
/// whether a drag is in progress. Direction is encoded in the delta sign.
pub struct CrankTracker {
    config: CrankConfig,
    center: Vec2,
    last_angle_deg: Option<f32>,
    engaged: bool,
}

impl CrankTracker {
    /// Create a new tracker; the pivot starts at the origin until the host
    /// reports the control's actual center.
    pub fn new(config: CrankConfig) -> Self {
        Self {
            config,
            center: Vec2::ZERO,
            last_angle_deg: None,
            engaged: false,
        }
    }

    /// Update the pivot point (the crank's screen-space center). Must remain
    /// valid for the duration of a gesture; the host re-reports it on layout
    /// changes.
    pub fn set_center(&mut self, center: Vec2) {
        self.center = center;
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    /// Whether a drag session is in progress.
    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    /// Start a drag session at `pos`, capturing the reference angle.
    ///
    /// If the press lands inside the dead zone the session still starts; the
    /// reference angle is taken from the first sample far enough out.
    pub fn begin(&mut self, pos: Vec2) {
        self.engaged = true;
        self.last_angle_deg = self.angle_of(pos);
    }

    /// Feed one motion sample; returns the wrap-normalized delta in degrees.
    ///
    /// Returns `None` when no session is active, when the sample falls inside
    /// the dead zone (held over against the last valid angle), or when this is
    /// the first valid sample of the session (it only establishes the
    /// reference).
    pub fn sample(&mut self, pos: Vec2) -> Option<f32> {
        if !self.engaged {
            return None;
        }
        let angle = self.angle_of(pos)?;
        match self.last_angle_deg.replace(angle) {
            Some(last) => Some(wrap_degrees(angle - last)),
            None => None,
        }
    }

    /// End the drag session.
    pub fn end(&mut self) {
        self.engaged = false;
        self.last_angle_deg = None;
    }

    /// Signed angular position of `pos` around the pivot, in degrees.
    ///
    /// `None` inside the minimum radius, where the geometry is too degenerate
    /// to yield a stable angle.
    fn angle_of(&self, pos: Vec2) -> Option<f32> {
        let offset = pos - self.center;
        if offset.length() < self.config.min_radius_px {
            return None;
        }
        Some(offset.y.atan2(offset.x).to_degrees())
    }
}
