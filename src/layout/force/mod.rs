mod forces;
mod quadtree;

use std::sync::atomic::{AtomicBool, Ordering};

use eframe::egui::Vec2;

use crate::config::ForceConfig;
use crate::graph::Body;

use super::{LayoutError, LayoutProgress};
use forces::{ChargeParams, CollisionParams, accumulate_charge, apply_collisions, apply_links};
use quadtree::{Quadtree, ROOT};

const COLLISION_STRENGTH: f32 = 0.7;
const MAX_SPEED: f32 = 120.0;
const PROGRESS_EVERY: usize = 10;

#[derive(Default)]
struct SimScratch {
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    radii: Vec<f32>,
    degrees: Vec<usize>,
}

/// Velocity-Verlet style simulation with alpha cooling: charge (Barnes-Hut), springs,
/// collision and centering.
pub struct ForceSimulation {
    config: ForceConfig,
    alpha: f32,
    alpha_target: f32,
    scratch: SimScratch,
}

impl ForceSimulation {
    pub fn new(config: ForceConfig) -> Self {
        Self {
            config,
            alpha: 1.0,
            alpha_target: 0.0,
            scratch: SimScratch::default(),
        }
    }

    pub fn config(&self) -> &ForceConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ForceConfig) {
        self.config = config;
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn alpha_target(&self) -> f32 {
        self.alpha_target
    }

    /// Keeps the simulation warm while a node is dragged.
    pub fn reheat(&mut self) {
        self.alpha_target = self.config.reheat_alpha_target;
        self.alpha = self.alpha.max(self.alpha_target);
    }

    /// Lets the simulation cool down to rest again.
    pub fn cool(&mut self) {
        self.alpha_target = 0.0;
    }

    pub fn stop(&mut self) {
        self.alpha = 0.0;
        self.alpha_target = 0.0;
    }

    pub fn is_settled(&self) -> bool {
        self.alpha < self.config.alpha_min && self.alpha_target < self.config.alpha_min
    }

    /// Advances one step. Returns true if any free body moved.
    pub fn tick(&mut self, bodies: &mut [Body], links: &[(usize, usize)], center: Vec2) -> bool {
        let node_count = bodies.len();
        if node_count == 0 {
            return false;
        }

        self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;
        let alpha = self.alpha;

        let scratch = &mut self.scratch;
        scratch.positions.clear();
        scratch.velocities.clear();
        scratch.radii.clear();
        scratch.degrees.clear();
        scratch.degrees.resize(node_count, 0);
        for body in bodies.iter() {
            scratch.positions.push(body.fixed.unwrap_or(body.pos));
            scratch.velocities.push(body.velocity);
            scratch.radii.push(self.config.collision_radius * 0.5);
        }
        for &(source, target) in links {
            if source < node_count && target < node_count && source != target {
                scratch.degrees[source] += 1;
                scratch.degrees[target] += 1;
            }
        }

        apply_links(
            links,
            &scratch.degrees,
            &scratch.positions,
            &mut scratch.velocities,
            self.config.link_distance.max(0.0),
            self.config.link_strength.clamp(0.0, 1.0) * alpha,
        );

        if node_count > 1
            && let Some(tree) = Quadtree::build(&scratch.positions)
        {
            let charge = ChargeParams {
                strength: self.config.charge_strength * alpha,
                theta: self.config.theta.max(0.0),
            };
            for (index, velocity) in scratch.velocities.iter_mut().enumerate() {
                accumulate_charge(&tree, ROOT, index, &scratch.positions, charge, velocity);
            }

            let max_distance = self.config.collision_radius;
            if max_distance > 0.0 {
                apply_collisions(
                    &tree,
                    &scratch.positions,
                    &scratch.radii,
                    CollisionParams {
                        strength: COLLISION_STRENGTH,
                        max_distance_sq: max_distance * max_distance,
                    },
                    &mut scratch.velocities,
                );
            }
        }

        let keep = 1.0 - self.config.velocity_decay.clamp(0.0, 1.0);
        let mut any_motion = false;
        for (index, body) in bodies.iter_mut().enumerate() {
            if let Some(fixed) = body.fixed {
                body.pos = fixed;
                body.velocity = Vec2::ZERO;
                continue;
            }

            let mut velocity = scratch.velocities[index] * keep;
            let speed = velocity.length();
            if !speed.is_finite() {
                velocity = Vec2::ZERO;
            } else if speed > MAX_SPEED {
                velocity *= MAX_SPEED / speed;
            }
            body.velocity = velocity;
            body.pos += velocity;
            if velocity.length_sq() > 1e-6 {
                any_motion = true;
            }
        }

        let strength = self.config.center_strength.clamp(0.0, 1.0);
        if strength > 0.0 {
            let mut centroid = Vec2::ZERO;
            let mut free = 0usize;
            for body in bodies.iter().filter(|body| body.fixed.is_none()) {
                centroid += body.pos;
                free += 1;
            }
            if free > 0 {
                let shift = (centroid / free as f32 - center) * strength;
                for body in bodies.iter_mut().filter(|body| body.fixed.is_none()) {
                    body.pos -= shift;
                }
            }
        }

        any_motion
    }

    /// Runs until alpha drops below `alpha_min` or the iteration budget is spent.
    pub fn run(
        &mut self,
        bodies: &mut [Body],
        links: &[(usize, usize)],
        center: Vec2,
        cancel: &AtomicBool,
        mut progress: impl FnMut(LayoutProgress),
    ) -> Result<usize, LayoutError> {
        self.alpha = 1.0;
        self.alpha_target = 0.0;

        let budget = self.config.cooldown_iterations;
        let mut iteration = 0;
        while iteration < budget && self.alpha >= self.config.alpha_min {
            if cancel.load(Ordering::Relaxed) {
                return Err(LayoutError::Cancelled);
            }

            self.tick(bodies, links, center);
            iteration += 1;

            if iteration % PROGRESS_EVERY == 0 {
                progress(LayoutProgress {
                    iteration,
                    total: budget,
                    alpha: self.alpha,
                });
            }
        }

        if bodies
            .iter()
            .any(|body| !body.pos.x.is_finite() || !body.pos.y.is_finite())
        {
            return Err(LayoutError::Failed(
                "force simulation diverged to non-finite positions".to_owned(),
            ));
        }

        Ok(iteration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::vec2;

    fn bodies(count: usize) -> Vec<Body> {
        (0..count)
            .map(|index| Body::at(vec2(index as f32 * 0.5, (index % 3) as f32 * 0.5)))
            .collect()
    }

    #[test]
    fn charge_spreads_clustered_nodes() {
        let mut bodies = bodies(30);
        let mut simulation = ForceSimulation::new(ForceConfig::default());
        let cancel = AtomicBool::new(false);
        simulation
            .run(&mut bodies, &[], vec2(0.0, 0.0), &cancel, |_| {})
            .expect("layout converges");

        let mut min_distance = f32::INFINITY;
        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                min_distance = min_distance.min((bodies[i].pos - bodies[j].pos).length());
            }
        }
        assert!(min_distance > 2.0, "nodes still overlap: {min_distance}");
    }

    #[test]
    fn run_stops_at_iteration_budget() {
        let config = ForceConfig {
            cooldown_iterations: 25,
            ..ForceConfig::default()
        };
        let mut simulation = ForceSimulation::new(config);
        let mut bodies = bodies(5);
        let cancel = AtomicBool::new(false);
        let iterations = simulation
            .run(&mut bodies, &[(0, 1)], Vec2::ZERO, &cancel, |_| {})
            .expect("layout converges");
        assert_eq!(iterations, 25);
    }

    #[test]
    fn fast_decay_stops_on_alpha_min() {
        let config = ForceConfig {
            alpha_decay: 0.5,
            ..ForceConfig::default()
        };
        let mut simulation = ForceSimulation::new(config);
        let mut bodies = bodies(4);
        let cancel = AtomicBool::new(false);
        let iterations = simulation
            .run(&mut bodies, &[], Vec2::ZERO, &cancel, |_| {})
            .expect("layout converges");
        assert!(iterations < 20);
        assert!(simulation.is_settled());
    }

    #[test]
    fn fixed_bodies_do_not_move() {
        let mut bodies = bodies(6);
        bodies[2].pin(vec2(40.0, 40.0));
        let mut simulation = ForceSimulation::new(ForceConfig::default());
        for _ in 0..20 {
            simulation.tick(&mut bodies, &[(1, 2), (2, 3)], Vec2::ZERO);
        }
        assert_eq!(bodies[2].pos, vec2(40.0, 40.0));
    }

    #[test]
    fn springs_pull_toward_rest_length() {
        let mut bodies = vec![Body::at(vec2(-300.0, 0.0)), Body::at(vec2(300.0, 0.0))];
        let config = ForceConfig {
            charge_strength: 0.0,
            ..ForceConfig::default()
        };
        let mut simulation = ForceSimulation::new(config);
        let cancel = AtomicBool::new(false);
        simulation
            .run(&mut bodies, &[(0, 1)], Vec2::ZERO, &cancel, |_| {})
            .expect("layout converges");
        let distance = (bodies[0].pos - bodies[1].pos).length();
        assert!(distance < 300.0, "spring did not contract: {distance}");
    }

    #[test]
    fn cancellation_is_observed() {
        let mut simulation = ForceSimulation::new(ForceConfig::default());
        let mut bodies = bodies(3);
        let cancel = AtomicBool::new(true);
        let result = simulation.run(&mut bodies, &[], Vec2::ZERO, &cancel, |_| {});
        assert!(matches!(result, Err(LayoutError::Cancelled)));
    }

    #[test]
    fn reheat_raises_target_and_cool_releases_it() {
        let mut simulation = ForceSimulation::new(ForceConfig::default());
        simulation.stop();
        assert!(simulation.is_settled());
        simulation.reheat();
        assert!(!simulation.is_settled());
        assert_eq!(simulation.alpha_target(), ForceConfig::default().reheat_alpha_target);
        simulation.cool();
        assert_eq!(simulation.alpha_target(), 0.0);
    }
}
