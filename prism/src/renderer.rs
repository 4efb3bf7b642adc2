use glam::{uvec2, UVec2, Vec3};
use image::Rgb32FImage;
use log::debug;
use rayon::prelude::*;

use crate::{gpu, utils, CubeMap, GemMaterial, Geometry};

/// Evaluates the per-pixel refraction algorithm on the CPU.
///
/// Pixels are processed in 2x2 quads, the same way a GPU runs fragment
/// shaders, so that screen-space derivatives (and thus the environment's
/// level of detail) behave the same.
#[derive(Clone, Debug)]
pub struct Renderer {
    background: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Self { background: true }
    }

    /// Whether pixels not covered by the gem show the environment (default)
    /// or stay black.
    pub fn with_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    /// Renders the gem, refracting the material's environment, as seen by the
    /// camera passed to the latest [`GemMaterial::prepare_frame()`].
    pub fn render(&self, material: &GemMaterial) -> Rgb32FImage {
        let frame = Frame::new(material);
        let size = frame.camera.screen_size();
        let mut image = Rgb32FImage::new(size.x, size.y);

        if size.x == 0 || size.y == 0 {
            return image;
        }

        debug!("Rendering {}x{}", size.x, size.y);

        let row_len = (size.x as usize) * 3;

        utils::measure("renderer::render", || {
            image.par_chunks_mut(2 * row_len).enumerate().for_each(
                |(quad_y, rows)| {
                    let mut stack = gpu::bvh_stack();

                    for quad_x in 0..size.x.div_ceil(2) {
                        let quad = uvec2(quad_x, quad_y as u32);
                        let traces =
                            self.trace_quad(&frame, quad, &mut stack);

                        for trace in traces {
                            let UVec2 { x, y } = trace.pixel;

                            if x >= size.x {
                                continue;
                            }

                            let offset = ((y % 2) as usize) * row_len
                                + (x as usize) * 3;

                            let color = trace.color.to_array();

                            if let Some(pixel) =
                                rows.get_mut(offset..offset + 3)
                            {
                                pixel.copy_from_slice(&color);
                            }
                        }
                    }
                },
            );
        });

        image
    }

    /// Traces a single pixel, exposing the algorithm's intermediate state.
    pub fn trace_pixel(
        &self,
        material: &GemMaterial,
        pixel: UVec2,
    ) -> PixelTrace {
        let frame = Frame::new(material);
        let quad = pixel / 2;
        let lane = (pixel.y % 2) * 2 + (pixel.x % 2);

        let traces = self.trace_quad(&frame, quad, &mut gpu::bvh_stack());

        traces[lane as usize]
    }

    fn trace_quad(
        &self,
        frame: &Frame,
        quad: UVec2,
        stack: &mut gpu::BvhStack,
    ) -> [PixelTrace; 4] {
        let environment = frame.environment;

        // Lanes are ordered top-left, top-right, bottom-left, bottom-right;
        // lanes falling outside of the viewport are still evaluated, since
        // their neighbours need them for derivatives
        let lanes = [uvec2(0, 0), uvec2(1, 0), uvec2(0, 1), uvec2(1, 1)]
            .map(|offset| frame.trace(quad * 2 + offset, stack));

        let source = |lane: usize| lanes[lane].derivative_source;
        let ddx = [source(1) - source(0), source(3) - source(2)];
        let ddy = [source(2) - source(0), source(3) - source(1)];

        let mut traces = lanes;

        for (lane, trace) in traces.iter_mut().enumerate() {
            trace.gradient = gpu::Gradient::new(ddx[lane / 2], ddy[lane % 2]);

            trace.color = if let Some(exits) = &trace.exits {
                gpu::shade(environment, &frame.material, exits, trace.gradient)
            } else if self.background {
                gpu::Environment::sample_grad(
                    environment,
                    trace.view_direction,
                    trace.gradient,
                )
            } else {
                Vec3::ZERO
            };
        }

        traces
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the algorithm computed for a single pixel.
#[derive(Clone, Copy, Debug)]
pub struct PixelTrace {
    pub pixel: UVec2,

    /// Undistorted direction from the camera through this pixel
    pub view_direction: Vec3,

    /// Point on the gem's surface this pixel covers, if any
    pub surface: Option<gpu::Surface>,

    /// Exit directions; `None` for pixels not covered by the gem
    pub exits: Option<gpu::ExitDirections>,

    /// Direction whose screen-space derivatives drove the mip selection
    pub derivative_source: Vec3,

    pub gradient: gpu::Gradient,
    pub color: Vec3,
}

/// Per-frame state shared by all pixels.
struct Frame<'a> {
    geometry: &'a Geometry,
    environment: &'a CubeMap,
    material: gpu::Material,
    camera: gpu::Camera,
}

impl<'a> Frame<'a> {
    fn new(material: &'a GemMaterial) -> Self {
        Self {
            geometry: material.geometry(),
            environment: material.environment(),
            material: material.serialize(),
            camera: *material.camera(),
        }
    }

    /// Runs everything that doesn't depend on the neighbouring pixels.
    fn trace(&self, pixel: UVec2, stack: &mut gpu::BvhStack) -> PixelTrace {
        let ray = self.camera.ray(self.camera.pixel_center(pixel));
        let surface = self.cover(ray, stack);

        let exits = surface.map(|surface| {
            let serialized = self.geometry.serialized();

            gpu::Refraction::new(
                serialized.triangles_view(),
                serialized.bvh_view(),
                &self.material,
            )
            .trace_channels(ray.origin(), surface, stack)
        });

        let derivative_source = match &exits {
            Some(exits) => gpu::derivative_source(
                &self.material,
                ray.direction(),
                exits,
            ),
            None => ray.direction(),
        };

        PixelTrace {
            pixel,
            view_direction: ray.direction(),
            surface,
            exits,
            derivative_source,
            gradient: Default::default(),
            color: Default::default(),
        }
    }

    /// Finds the front-facing point of the gem the ray lands on, i.e. does
    /// what the rasterizer would do.
    fn cover(
        &self,
        ray: gpu::Ray,
        stack: &mut gpu::BvhStack,
    ) -> Option<gpu::Surface> {
        let serialized = self.geometry.serialized();
        let local_ray = ray.transform(self.material.world_to_local());

        let hit = local_ray.trace_nearest(
            serialized.triangles_view(),
            serialized.bvh_view(),
            stack,
        );

        if hit.is_none() || !hit.front_face {
            return None;
        }

        Some(gpu::Surface {
            point: self.material.local_to_world().transform_point3(hit.point),
            normal: self.material.normal_to_world(hit.normal),
        })
    }
}
