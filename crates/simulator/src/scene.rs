//! SceneGenerator - simulated fluorescent particle scene
//!
//! Implements `ImageGenerator`: particles diffuse (Brownian steps) and are
//! rendered as Gaussian spots in a field of view centred on the stage.
//! One stage unit maps to one pixel.

use contracts::{ContractError, Image, ImageGenerator, SceneConfig, SnapParams, StagePoint};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::{debug, trace};

/// Detected counts per millisecond of exposure for an in-focus particle
const COUNTS_PER_MS: f64 = 40.0;

/// Peak 8-bit value of an in-focus particle in RGB composites
const RGB_PEAK: f64 = 200.0;

#[derive(Debug, Clone, Copy)]
struct Particle {
    x: f64,
    y: f64,
    z: f64,
    channel: usize,
    brightness: f64,
}

/// Simulated particle scene
pub struct SceneGenerator {
    config: SceneConfig,
    particles: Vec<Particle>,
    rng: StdRng,
    steps: u64,
}

impl SceneGenerator {
    /// Scene with `n_particles` and default settings
    pub fn new(n_particles: usize) -> Self {
        Self::with_config(SceneConfig {
            n_particles,
            ..SceneConfig::default()
        })
    }

    /// Scene from full configuration
    pub fn with_config(config: SceneConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let half = config.field_size / 2.0;
        let channels = config.channels.max(1);
        let particles = (0..config.n_particles)
            .map(|i| Particle {
                x: rng.random_range(-half..=half),
                y: rng.random_range(-half..=half),
                z: rng.sample::<f64, _>(StandardNormal) * config.focal_depth,
                channel: i % channels,
                brightness: rng.random_range(0.5..1.5),
            })
            .collect();

        debug!(
            n_particles = config.n_particles,
            width = config.width,
            height = config.height,
            seed = ?config.seed,
            "scene generator created"
        );

        Self {
            config,
            particles,
            rng,
            steps: 0,
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Number of `step_positions` calls so far
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Mean particle position (x, y), used to observe drift of the scene
    pub fn centroid(&self) -> (f64, f64) {
        if self.particles.is_empty() {
            return (0.0, 0.0);
        }
        let n = self.particles.len() as f64;
        let (sx, sy) = self
            .particles
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        (sx / n, sy / n)
    }

    fn check_dimensions(&self) -> Result<(), ContractError> {
        if self.config.width == 0 || self.config.height == 0 {
            return Err(ContractError::generator(format!(
                "invalid image size {}x{}",
                self.config.width, self.config.height
            )));
        }
        Ok(())
    }

    /// Splat every particle accepted by `weight` into a float plane.
    fn render_plane<F>(&self, center: StagePoint, weight: F) -> Vec<f64>
    where
        F: Fn(&Particle) -> Option<f64>,
    {
        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let sigma = self.config.spot_sigma_px.max(0.1);
        let radius = (3.0 * sigma).ceil() as i64;
        let two_sigma_sq = 2.0 * sigma * sigma;

        let origin_x = center.x - width as f64 / 2.0;
        let origin_y = center.y - height as f64 / 2.0;

        let mut plane = vec![0.0; width * height];
        for particle in &self.particles {
            let px = particle.x - origin_x;
            let py = particle.y - origin_y;
            if px < -(radius as f64)
                || py < -(radius as f64)
                || px >= (width as i64 + radius) as f64
                || py >= (height as i64 + radius) as f64
            {
                continue;
            }
            let Some(amplitude) = weight(particle) else {
                continue;
            };

            let cx = px.round() as i64;
            let cy = py.round() as i64;
            for y in (cy - radius).max(0)..=(cy + radius).min(height as i64 - 1) {
                for x in (cx - radius).max(0)..=(cx + radius).min(width as i64 - 1) {
                    let dx = x as f64 - px;
                    let dy = y as f64 - py;
                    plane[y as usize * width + x as usize] +=
                        amplitude * (-(dx * dx + dy * dy) / two_sigma_sq).exp();
                }
            }
        }
        plane
    }

    fn defocus(&self, dz: f64) -> f64 {
        let depth = self.config.focal_depth;
        if depth <= 0.0 {
            return if dz == 0.0 { 1.0 } else { 0.0 };
        }
        (-(dz * dz) / (2.0 * depth * depth)).exp()
    }
}

impl Default for SceneGenerator {
    fn default() -> Self {
        Self::with_config(SceneConfig::default())
    }
}

impl ImageGenerator for SceneGenerator {
    fn step_positions(&mut self) {
        let sigma = self.config.step_sigma;
        for particle in &mut self.particles {
            particle.x += self.rng.sample::<f64, _>(StandardNormal) * sigma;
            particle.y += self.rng.sample::<f64, _>(StandardNormal) * sigma;
        }
        self.steps += 1;
        metrics::counter!("mda_scene_steps_total").increment(1);
        trace!(steps = self.steps, "scene stepped");
    }

    fn snap_img(
        &mut self,
        position: StagePoint,
        params: SnapParams,
    ) -> Result<Image, ContractError> {
        self.check_dimensions()?;

        let channel = params.channel % self.config.channels.max(1);
        let exposure = params.exposure_ms.max(0.0);
        let plane = self.render_plane(position, |p| {
            (p.channel == channel)
                .then(|| p.brightness * exposure * COUNTS_PER_MS * self.defocus(p.z - params.z))
        });

        let background = self.config.background as f64;
        let pixels: Vec<u16> = plane
            .into_iter()
            .map(|v| (v + background).round().clamp(0.0, u16::MAX as f64) as u16)
            .collect();

        trace!(x = position.x, y = position.y, channel, exposure, "snap_img");
        Ok(Image::mono16(self.config.width, self.config.height, &pixels))
    }

    fn snap_rgb(&mut self, position: StagePoint) -> Result<Image, ContractError> {
        self.check_dimensions()?;

        let background = (self.config.background as f64 / 256.0).min(255.0);
        let mut rgb = vec![0u8; self.config.width as usize * self.config.height as usize * 3];
        for plane_index in 0..3 {
            let plane = self.render_plane(position, |p| {
                (p.channel % 3 == plane_index).then(|| p.brightness * RGB_PEAK * self.defocus(p.z))
            });
            for (pixel, value) in plane.into_iter().enumerate() {
                rgb[pixel * 3 + plane_index] = (value + background).round().clamp(0.0, 255.0) as u8;
            }
        }

        trace!(x = position.x, y = position.y, "snap_rgb");
        Ok(Image::rgb8(self.config.width, self.config.height, rgb))
    }
}
