//! Narrow interface to the external rigid-body engine.
//!
//! The gameplay core never simulates; it reads the ball's position and
//! velocity, applies impulses and forces, and listens for cup contacts.

use std::sync::{Arc, Mutex};

use glam::DVec3;

/// The ball as exposed by the physics engine.
pub trait PhysicsBody {
    fn position(&self) -> DVec3;
    fn velocity(&self) -> DVec3;
    fn set_position(&mut self, position: DVec3);
    fn set_velocity(&mut self, velocity: DVec3);
    fn set_angular_velocity(&mut self, angular: DVec3);
    /// Instantaneous velocity change at a world-space point.
    fn apply_impulse(&mut self, impulse: DVec3, point: DVec3);
    /// Force applied over the next step.
    fn apply_force(&mut self, force: DVec3);
    /// Wake a sleeping body. Engines without sleep states ignore this.
    fn wake_up(&mut self) {}
}

/// What the ball touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactTarget {
    Cup,
}

/// A collision notification from the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub target: ContactTarget,
    pub position: DVec3,
    pub velocity: DVec3,
}

pub type ContactObserver = Box<dyn FnMut(Contact) + Send>;

/// An engine that can report collisions through registered observers.
pub trait ContactSource {
    fn register_contact_observer(&mut self, observer: ContactObserver);
}

/// Buffer between engine callbacks and the state machine's tick.
///
/// Observers only enqueue; the state machine drains inside its own tick, so
/// ball state is never mutated re-entrantly from a callback.
#[derive(Debug, Clone, Default)]
pub struct ContactQueue {
    inner: Arc<Mutex<Vec<Contact>>>,
}

impl ContactQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// An observer that pushes into this queue.
    pub fn observer(&self) -> ContactObserver {
        let inner = Arc::clone(&self.inner);
        Box::new(move |contact| {
            inner
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(contact);
        })
    }

    pub fn drain(&self) -> Vec<Contact> {
        std::mem::take(&mut *self.inner.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records every call; no integration.
    #[derive(Debug, Default)]
    pub struct StubBody {
        pub position: DVec3,
        pub velocity: DVec3,
        pub angular: DVec3,
        pub impulses: Vec<(DVec3, DVec3)>,
        pub forces: Vec<DVec3>,
        pub wakes: usize,
        /// Velocity seen at the moment of each impulse.
        pub velocity_at_impulse: Vec<DVec3>,
    }

    impl StubBody {
        pub fn at(position: DVec3) -> Self {
            Self {
                position,
                ..Default::default()
            }
        }
    }

    impl PhysicsBody for StubBody {
        fn position(&self) -> DVec3 {
            self.position
        }
        fn velocity(&self) -> DVec3 {
            self.velocity
        }
        fn set_position(&mut self, position: DVec3) {
            self.position = position;
        }
        fn set_velocity(&mut self, velocity: DVec3) {
            self.velocity = velocity;
        }
        fn set_angular_velocity(&mut self, angular: DVec3) {
            self.angular = angular;
        }
        fn apply_impulse(&mut self, impulse: DVec3, point: DVec3) {
            self.velocity_at_impulse.push(self.velocity);
            self.impulses.push((impulse, point));
            self.velocity += impulse;
        }
        fn apply_force(&mut self, force: DVec3) {
            self.forces.push(force);
        }
        fn wake_up(&mut self) {
            self.wakes += 1;
        }
    }

    #[derive(Default)]
    pub struct StubContacts {
        pub observers: Vec<ContactObserver>,
    }

    impl StubContacts {
        pub fn fire(&mut self, contact: Contact) {
            for obs in &mut self.observers {
                obs(contact);
            }
        }
    }

    impl ContactSource for StubContacts {
        fn register_contact_observer(&mut self, observer: ContactObserver) {
            self.observers.push(observer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_collects_from_observer() {
        let q = ContactQueue::new();
        let mut obs = q.observer();
        let c = Contact {
            target: ContactTarget::Cup,
            position: DVec3::ZERO,
            velocity: DVec3::X,
        };
        obs(c);
        obs(c);
        assert_eq!(q.drain().len(), 2);
        assert!(q.drain().is_empty());
    }
}
