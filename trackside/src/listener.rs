use crate::error::Result;
use crate::events::EntityTelemetry;
use crate::math::{heading_to_forward_vector, lfs_to_meters, telemetry_to_render_axes};
use crate::session::RenderingSession;
use std::time::Duration;

/// Moves the positional session's listener to follow the viewed car.
///
/// Each update ramps position and forward vector linearly over the
/// interpolation window so that telemetry arriving at a fixed interval does
/// not produce audible steps.
#[derive(Debug, Clone)]
pub struct ListenerStateUpdater {
    interpolation_window: Duration,
}

impl ListenerStateUpdater {
    pub fn new(interpolation_window: Duration) -> Self {
        Self {
            interpolation_window,
        }
    }

    pub fn interpolation_window(&self) -> Duration {
        self.interpolation_window
    }

    /// Applies one telemetry sample. Does nothing and returns `false` while
    /// the session is suspended.
    pub fn update(&self, session: &mut RenderingSession, sample: &EntityTelemetry) -> Result<bool> {
        if !session.is_running() {
            return Ok(false);
        }

        let position = telemetry_to_render_axes(
            lfs_to_meters(sample.x),
            lfs_to_meters(sample.y),
            lfs_to_meters(sample.z),
        );
        let forward = heading_to_forward_vector(sample.heading);

        let context = session.context_mut();
        let end_time = context.current_time() + self.interpolation_window.as_secs_f64();
        context.ramp_listener(position, forward, end_time)?;

        log::debug!(
            "Listener -> [{:.2}, {:.2}, {:.2}] facing [{:.2}, {:.2}, {:.2}] at {:.3}s",
            position.x,
            position.y,
            position.z,
            forward.x,
            forward.y,
            forward.z,
            end_time
        );

        Ok(true)
    }
}

impl Default for ListenerStateUpdater {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{ListenerPose, Vec3};
    use crate::render::{GraphContext, SessionKind};

    fn session() -> RenderingSession {
        RenderingSession::new(Box::new(GraphContext::offline(SessionKind::Positional, 1000)))
    }

    fn sample(x: i32, y: i32, z: i32, heading: u16) -> EntityTelemetry {
        EntityTelemetry {
            entity_id: 1,
            x,
            y,
            z,
            heading,
        }
    }

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn test_ramp_reaches_target_after_window() {
        let mut session = session();
        let updater = ListenerStateUpdater::default();

        let applied = updater
            .update(&mut session, &sample(65536 * 10, 65536 * 20, 65536 * 2, 16384))
            .unwrap();
        assert!(applied);

        let context = session.context();
        assert_eq!(context.listener_at(0.0).position, Vec3::ZERO);

        let halfway = context.listener_at(0.025);
        assert!(approx(halfway.position, Vec3::new(5.0, 1.0, 10.0)));

        let arrived = context.listener_at(0.05);
        assert!(approx(arrived.position, Vec3::new(10.0, 2.0, 20.0)));
        assert!(approx(arrived.forward, Vec3::X));
        assert_eq!(arrived.up, Vec3::Y);
    }

    #[test]
    fn test_ramp_starts_from_current_context_time() {
        let updater = ListenerStateUpdater::new(Duration::from_millis(100));

        let context = GraphContext::offline(SessionKind::Positional, 1000);
        context.render_offline(1000).unwrap();
        let mut session = RenderingSession::new(Box::new(context));

        updater.update(&mut session, &sample(65536, 0, 0, 0)).unwrap();

        let context = session.context();
        assert_eq!(context.current_time(), 1.0);
        assert_eq!(context.listener_at(1.0).position, Vec3::ZERO);
        assert!(approx(context.listener_at(1.1).position, Vec3::X));
        assert!(approx(context.listener_at(1.1).forward, Vec3::NEG_Z));
    }

    #[test]
    fn test_suspended_session_is_left_alone() {
        let mut session = session();
        session.suspend().unwrap();

        let applied = ListenerStateUpdater::default()
            .update(&mut session, &sample(65536, 65536, 65536, 100))
            .unwrap();

        assert!(!applied);
        assert_eq!(session.context().listener_at(10.0), ListenerPose::identity());
    }
}
