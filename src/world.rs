//! Worlds: fixed-capacity containers that run a whole simulation step.
//!
//! [`ParticleWorld`] drives particles, their force generators and their
//! links. [`PhysicsWorld`] drives rigid bodies, the collision primitives
//! attached to them and static planes. Both own their resolver and reuse it
//! every step.

use crate::body::{BodyId, RigidBody};
use crate::collide::{self, CollisionData, CollisionPlane, CollisionPrimitive};
use crate::contact::ContactResolver;
use crate::force::{ForceGenerator, ForceRegistry};
use crate::links::{GroundContacts, ParticleContactGenerator, ParticleLink};
use crate::math::{Real, Vector3};
use crate::particle::{Particle, ParticleId};
use crate::pcontact::{ParticleContact, ParticleContactResolver};
use log::{debug, warn};

/// A particle simulation with compile-time capacities.
///
/// # Type Parameters
/// * `P` - Maximum number of particles.
/// * `L` - Maximum number of links (cables and rods).
/// * `C` - Maximum number of contacts generated per step.
/// * `F` - Maximum number of force registrations.
///
/// # Example
/// ```
/// use embedded_physics3d::links::{GroundContacts, ParticleCable};
/// use embedded_physics3d::math::Vector3;
/// use embedded_physics3d::particle::Particle;
/// use embedded_physics3d::world::ParticleWorld;
///
/// let mut world = ParticleWorld::<4, 2, 8, 4>::new(0).with_ground(GroundContacts::new(0.0));
/// let anchor = world.add_particle(Particle::new_immovable().with_position(Vector3::new(0.0, 5.0, 0.0))).unwrap();
/// let ball = world
///     .add_particle(Particle::new(1.0).with_position(Vector3::new(2.0, 5.0, 0.0)).with_acceleration(Vector3::new(0.0, -10.0, 0.0)))
///     .unwrap();
/// world.add_link(ParticleCable::new(anchor, ball, 2.0)).unwrap();
///
/// world.start_frame();
/// world.run_physics(1.0 / 60.0);
/// ```
#[derive(Debug, Clone)]
pub struct ParticleWorld<const P: usize, const L: usize, const C: usize, const F: usize> {
    particles: heapless::Vec<Particle, P>,
    links: heapless::Vec<ParticleLink, L>,
    ground: Option<GroundContacts>,
    registry: ForceRegistry<F>,
    contacts: [ParticleContact; C],
    contact_count: usize,
    resolver: ParticleContactResolver,
    calculate_iterations: bool,
}

impl<const P: usize, const L: usize, const C: usize, const F: usize> ParticleWorld<P, L, C, F> {
    /// Create an empty world. An `iterations` of 0 lets the world give the
    /// resolver twice the number of contacts found each step.
    pub fn new(iterations: u32) -> Self {
        Self {
            particles: heapless::Vec::new(),
            links: heapless::Vec::new(),
            ground: None,
            registry: ForceRegistry::new(),
            contacts: [ParticleContact::default(); C],
            contact_count: 0,
            resolver: ParticleContactResolver::new(iterations),
            calculate_iterations: iterations == 0,
        }
    }

    /// Builder: keep movable particles above a horizontal ground.
    pub fn with_ground(mut self, ground: GroundContacts) -> Self {
        self.ground = Some(ground);
        self
    }

    pub fn set_ground(&mut self, ground: Option<GroundContacts>) {
        self.ground = ground;
    }

    /// Add a particle. Returns its [`ParticleId`], or `None` if at capacity.
    pub fn add_particle(&mut self, particle: Particle) -> Option<ParticleId> {
        let id = ParticleId(self.particles.len());
        if self.particles.push(particle).is_err() {
            warn!("ParticleWorld: particle capacity exceeded (max {})", P);
            return None;
        }
        Some(id)
    }

    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.particles.get(id.0)
    }

    pub fn particle_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        self.particles.get_mut(id.0)
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// Add a cable or rod. Returns its index, or `None` if at capacity.
    pub fn add_link(&mut self, link: impl Into<ParticleLink>) -> Option<usize> {
        let index = self.links.len();
        if self.links.push(link.into()).is_err() {
            warn!("ParticleWorld: link capacity exceeded (max {})", L);
            return None;
        }
        Some(index)
    }

    pub fn links(&self) -> &[ParticleLink] {
        &self.links
    }

    /// Register a force generator on a particle. Returns `false` if the
    /// registry is full.
    pub fn add_force(&mut self, id: ParticleId, generator: ForceGenerator) -> bool {
        self.registry.add(id.0, generator)
    }

    pub fn force_registry(&self) -> &ForceRegistry<F> {
        &self.registry
    }

    pub fn force_registry_mut(&mut self) -> &mut ForceRegistry<F> {
        &mut self.registry
    }

    pub fn resolver(&self) -> &ParticleContactResolver {
        &self.resolver
    }

    /// Contacts generated by the last [`ParticleWorld::generate_contacts`].
    pub fn contacts(&self) -> &[ParticleContact] {
        &self.contacts[..self.contact_count]
    }

    /// Clear every particle's force accumulator.
    pub fn start_frame(&mut self) {
        for particle in self.particles.iter_mut() {
            particle.clear_accumulator();
        }
    }

    pub fn integrate(&mut self, duration: Real) {
        for particle in self.particles.iter_mut() {
            particle.integrate(duration);
        }
    }

    /// Run every link, then the ground, into the contact buffer. Returns
    /// the number of contacts written.
    pub fn generate_contacts(&mut self) -> usize {
        let mut used = 0;
        for link in self.links.iter() {
            if used == C {
                break;
            }
            used += link.add_contact(&self.particles, &mut self.contacts[used..]);
        }
        if let Some(ground) = &self.ground {
            used += ground.add_contact(&self.particles, &mut self.contacts[used..]);
        }
        if C > 0 && used == C {
            debug!("ParticleWorld: contact buffer full (max {})", C);
        }
        self.contact_count = used;
        used
    }

    /// One full step: forces, integration, contact generation and
    /// resolution.
    pub fn run_physics(&mut self, duration: Real) {
        self.registry.update_forces(&mut self.particles, duration);
        self.integrate(duration);

        let used = self.generate_contacts();
        if used == 0 {
            return;
        }
        if self.calculate_iterations {
            self.resolver.set_iterations(used as u32 * 2);
        }
        self.resolver
            .resolve_contacts(&mut self.contacts[..used], &mut self.particles, duration);
    }
}

/// A rigid-body simulation with compile-time capacities.
///
/// # Type Parameters
/// * `N` - Maximum number of bodies.
/// * `S` - Maximum number of collision primitives.
/// * `P` - Maximum number of static planes.
///
/// Every pair of primitives is tested each step (no broad phase).
///
/// # Example
/// ```
/// use embedded_physics3d::body::RigidBody;
/// use embedded_physics3d::collide::{CollisionPlane, CollisionPrimitive};
/// use embedded_physics3d::math::Vector3;
/// use embedded_physics3d::world::PhysicsWorld;
///
/// let mut world = PhysicsWorld::<8, 8, 2>::new();
/// world.set_gravity(Vector3::new(0.0, -9.81, 0.0));
///
/// let ball = world
///     .add_body(RigidBody::new(1.0).with_position(Vector3::new(0.0, 5.0, 0.0)).with_inertia_sphere(0.5))
///     .unwrap();
/// world.add_primitive(CollisionPrimitive::sphere(ball, 0.5)).unwrap();
/// world.add_plane(CollisionPlane::ground()).unwrap();
///
/// // The const generic sets the max number of contacts per step.
/// world.step::<16>(1.0 / 60.0);
/// ```
#[derive(Debug, Clone)]
pub struct PhysicsWorld<const N: usize, const S: usize, const P: usize> {
    bodies: heapless::Vec<RigidBody, N>,
    primitives: heapless::Vec<CollisionPrimitive, S>,
    planes: heapless::Vec<CollisionPlane, P>,
    gravity: Vector3,
    /// Friction stamped on every detected contact.
    pub friction: Real,
    /// Restitution stamped on every detected contact.
    pub restitution: Real,
    resolver: ContactResolver,
    calculate_iterations: bool,
    contact_count: usize,
}

impl<const N: usize, const S: usize, const P: usize> Default for PhysicsWorld<N, S, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, const S: usize, const P: usize> PhysicsWorld<N, S, P> {
    /// Create an empty world with no gravity. The resolver gets twice the
    /// number of contacts found each step as its iteration budget.
    pub fn new() -> Self {
        Self {
            bodies: heapless::Vec::new(),
            primitives: heapless::Vec::new(),
            planes: heapless::Vec::new(),
            gravity: Vector3::zeros(),
            friction: collide::DEFAULT_FRICTION,
            restitution: collide::DEFAULT_RESTITUTION,
            resolver: ContactResolver::new(0),
            calculate_iterations: true,
            contact_count: 0,
        }
    }

    /// Builder: fixed resolver iteration budget; 0 restores the automatic
    /// budget.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.resolver.set_iterations(iterations);
        self.calculate_iterations = iterations == 0;
        self
    }

    /// Builder: resolver epsilons, see [`ContactResolver::with_epsilons`].
    pub fn with_epsilons(mut self, velocity: Real, position: Real) -> Self {
        self.resolver.set_epsilons(velocity, position);
        self
    }

    /// Set the gravity vector (e.g., `Vector3::new(0.0, -9.81, 0.0)`).
    pub fn set_gravity(&mut self, gravity: Vector3) {
        self.gravity = gravity;
    }

    pub fn gravity(&self) -> Vector3 {
        self.gravity
    }

    /// Add a body to the world. Returns its [`BodyId`], or `None` if at capacity.
    pub fn add_body(&mut self, body: RigidBody) -> Option<BodyId> {
        let id = BodyId(self.bodies.len());
        if self.bodies.push(body).is_err() {
            warn!("PhysicsWorld: body capacity exceeded (max {})", N);
            return None;
        }
        Some(id)
    }

    pub fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.bodies.get(id.0)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        self.bodies.get_mut(id.0)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Iterate over all bodies immutably.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &RigidBody)> {
        self.bodies.iter().enumerate().map(|(i, b)| (BodyId(i), b))
    }

    /// Iterate over all bodies mutably.
    pub fn bodies_mut(&mut self) -> impl Iterator<Item = (BodyId, &mut RigidBody)> {
        self.bodies.iter_mut().enumerate().map(|(i, b)| (BodyId(i), b))
    }

    /// Attach a collision primitive. Returns its index, or `None` if at
    /// capacity or if the primitive refers to an unknown body.
    pub fn add_primitive(&mut self, primitive: CollisionPrimitive) -> Option<usize> {
        if primitive.body.0 >= self.bodies.len() {
            warn!("PhysicsWorld: primitive refers to unknown body {}", primitive.body.0);
            return None;
        }
        let index = self.primitives.len();
        if self.primitives.push(primitive).is_err() {
            warn!("PhysicsWorld: primitive capacity exceeded (max {})", S);
            return None;
        }
        Some(index)
    }

    pub fn primitives(&self) -> &[CollisionPrimitive] {
        &self.primitives
    }

    /// Add a static half-space. Returns its index, or `None` if at capacity.
    pub fn add_plane(&mut self, plane: CollisionPlane) -> Option<usize> {
        let index = self.planes.len();
        if self.planes.push(plane).is_err() {
            warn!("PhysicsWorld: plane capacity exceeded (max {})", P);
            return None;
        }
        Some(index)
    }

    pub fn planes(&self) -> &[CollisionPlane] {
        &self.planes
    }

    pub fn resolver(&self) -> &ContactResolver {
        &self.resolver
    }

    /// Number of contacts detected by the last step.
    pub fn contact_count(&self) -> usize {
        self.contact_count
    }

    /// Clear every body's force and torque accumulators.
    pub fn start_frame(&mut self) {
        for body in self.bodies.iter_mut() {
            body.clear_accumulators();
        }
    }

    /// Let every registration of `registry` push on the bodies.
    pub fn apply_forces<const F: usize>(&mut self, registry: &ForceRegistry<F>, duration: Real) {
        registry.update_forces(&mut self.bodies, duration);
    }

    /// Integrate every body and refresh the primitives' world transforms.
    pub fn integrate(&mut self, duration: Real) {
        let gravity = self.gravity;
        for body in self.bodies.iter_mut() {
            if body.has_finite_mass() {
                let weight = gravity * body.mass();
                body.add_force(&weight);
            }
            body.integrate(duration);
        }
        for primitive in self.primitives.iter_mut() {
            primitive.calculate_internals(&self.bodies);
        }
    }

    /// Test every primitive against every plane and every other primitive.
    /// Pairs on the same body or on two immovable bodies are skipped.
    /// Stops as soon as `data` is full.
    pub fn generate_contacts<const C: usize>(&self, data: &mut CollisionData<C>) -> usize {
        let start = data.contact_count();
        'primitives: for (i, primitive) in self.primitives.iter().enumerate() {
            let movable = self.bodies[primitive.body.0].has_finite_mass();
            if movable {
                for plane in self.planes.iter() {
                    if !data.has_more_contacts() {
                        break 'primitives;
                    }
                    collide::collide_with_half_space(primitive, plane, data);
                }
            }
            for other in self.primitives.iter().skip(i + 1) {
                if !data.has_more_contacts() {
                    break 'primitives;
                }
                if other.body == primitive.body {
                    continue;
                }
                if !movable && !self.bodies[other.body.0].has_finite_mass() {
                    continue;
                }
                collide::collide_primitives(primitive, other, data);
            }
        }
        data.contact_count() - start
    }

    /// Advance the simulation: integrate, detect, resolve.
    ///
    /// The `C` const generic sets the maximum number of contacts per step.
    pub fn step<const C: usize>(&mut self, duration: Real) {
        self.integrate(duration);

        let mut data = CollisionData::<C>::new()
            .with_friction(self.friction)
            .with_restitution(self.restitution);
        let used = self.generate_contacts(&mut data);
        self.contact_count = used;
        if used == 0 {
            return;
        }

        if self.calculate_iterations {
            self.resolver.set_iterations(used as u32 * 2);
        }
        self.resolver
            .resolve_contacts(data.contacts_mut(), &mut self.bodies, duration);
    }
}
