//! Particle and rigid-body physics for `no_std` targets.
//!
//! The crate advances point masses and rigid bodies in small fixed time
//! steps, detects overlap between spheres, boxes and planes, and resolves
//! the resulting contacts (collisions, cables, rods) with impulses and
//! position corrections.
//!
//! All storage is fixed-capacity ([`heapless`]) and nothing allocates.
//! Bodies and particles live in caller-owned slices (or in a world) and are
//! referred to by index: [`ParticleId`] and [`BodyId`].
//!
//! # Modules
//! - [`math`] - vectors, quaternions, 3x3 and 3x4 matrices on [`nalgebra`]
//! - [`particle`], [`body`] - state and integration
//! - [`force`] - force generators and their registry
//! - [`collide`] - narrow-phase collision detection
//! - [`pcontact`], [`contact`], [`resolver`] - contacts and the iterative resolver
//! - [`links`] - cables, rods and ground contacts for particles
//! - [`world`] - [`ParticleWorld`] and [`PhysicsWorld`]
//!
//! # Example
//! ```
//! use embedded_physics3d::{CollisionPlane, CollisionPrimitive, PhysicsWorld, RigidBody, Vector3};
//!
//! let mut world = PhysicsWorld::<4, 4, 1>::new();
//! world.set_gravity(Vector3::new(0.0, -10.0, 0.0));
//!
//! let ball = world
//!     .add_body(RigidBody::new(1.0).with_position(Vector3::new(0.0, 3.0, 0.0)).with_inertia_sphere(1.0))
//!     .unwrap();
//! world.add_primitive(CollisionPrimitive::sphere(ball, 1.0)).unwrap();
//! world.add_plane(CollisionPlane::ground()).unwrap();
//!
//! for _ in 0..300 {
//!     world.step::<8>(0.01);
//! }
//! assert!(world.body(ball).unwrap().position().y > 0.9);
//! ```

#![no_std]

#[cfg(feature = "std")]
extern crate std;

pub mod body;
pub mod collide;
pub mod contact;
pub mod force;
pub mod links;
pub mod math;
pub mod particle;
pub mod pcontact;
pub mod resolver;
pub mod world;

pub use body::{BodyId, RigidBody};
pub use collide::{CollisionData, CollisionPlane, CollisionPrimitive, Shape};
pub use contact::{Contact, ContactResolver};
pub use force::{ForceGenerator, ForceRegistry};
pub use links::{GroundContacts, ParticleCable, ParticleContactGenerator, ParticleLink, ParticleRod};
pub use math::{Matrix3, Quaternion, Real, Transform, Vector3};
pub use particle::{Particle, ParticleId};
pub use pcontact::{ParticleContact, ParticleContactResolver};
pub use world::{ParticleWorld, PhysicsWorld};
