use std::path::Path;
use std::sync::Arc;

use glam::{vec3, Vec2, Vec3};
use image::Rgb32FImage;
use log::{debug, info};

use crate::{gpu, utils, Bindable, Error, Result};

/// Cube map the gem reflects and refracts; faces are ordered +X, -X, +Y, -Y,
/// +Z, -Z.
///
/// Each face is square, in linear RGB, with `v` growing downwards (the same
/// convention as OpenGL's cube maps).
#[derive(Clone, Debug)]
pub struct CubeMap {
    levels: Vec<CubeLevel>,
}

impl CubeMap {
    /// Creates a cube map out of six faces, generating the mip chain.
    pub fn from_faces(faces: [Rgb32FImage; 6]) -> Result<Self> {
        let size = faces[0].width();

        if size == 0 {
            return Err(Error::InvalidEnvironment("faces are empty".into()));
        }

        for (face, image) in CubeFace::all().zip(&faces) {
            if image.width() != image.height() {
                return Err(Error::InvalidEnvironment(format!(
                    "face {face:?} is not square ({}x{})",
                    image.width(),
                    image.height(),
                )));
            }

            if image.width() != size {
                return Err(Error::InvalidEnvironment(format!(
                    "face {face:?} has size {}, expected {size}",
                    image.width(),
                )));
            }
        }

        let faces = faces.map(|image| {
            image
                .pixels()
                .map(|pixel| Vec3::from_array(pixel.0))
                .collect::<Vec<_>>()
        });

        Ok(Self::from_level(CubeLevel { size, faces }))
    }

    /// Loads a cube map from six image files (anything the `image` crate can
    /// decode, e.g. PNG or Radiance HDR).
    pub fn open<P>(paths: [P; 6]) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let mut faces = Vec::with_capacity(6);

        for path in &paths {
            let path = path.as_ref();

            debug!("Loading environment face: {}", path.display());

            let image = image::open(path).map_err(|source| {
                Error::EnvironmentUnavailable {
                    path: path.to_owned(),
                    source,
                }
            })?;

            faces.push(image.into_rgb32f());
        }

        let faces: [Rgb32FImage; 6] = faces
            .try_into()
            .map_err(|_| Error::InvalidEnvironment("expected 6 faces".into()))?;

        Self::from_faces(faces)
    }

    /// Creates a cube map by evaluating `f` for each texel's direction.
    pub fn from_fn(size: u32, f: impl Fn(Vec3) -> Vec3) -> Self {
        let size = size.max(1);

        let faces = CubeFace::ALL.map(|face| {
            let mut texels = Vec::with_capacity((size * size) as usize);

            for y in 0..size {
                for x in 0..size {
                    let uv =
                        (Vec2::new(x as f32, y as f32) + 0.5) / (size as f32);

                    texels.push(f(face.direction(uv)));
                }
            }

            texels
        });

        Self::from_level(CubeLevel { size, faces })
    }

    /// Creates a single-texel cube map of given color.
    pub fn uniform(color: Vec3) -> Self {
        Self::from_fn(1, |_| color)
    }

    fn from_level(level: CubeLevel) -> Self {
        let levels = utils::measure("environment::mips", || {
            let mut levels = vec![level];

            while let Some(next) = levels.last().and_then(CubeLevel::downsample)
            {
                levels.push(next);
            }

            levels
        });

        info!(
            "Environment ready; size={}, mips={}",
            levels[0].size,
            levels.len(),
        );

        Self { levels }
    }

    /// Returns the size of the most detailed level, in texels.
    pub fn size(&self) -> u32 {
        self.levels[0].size
    }

    pub fn mip_count(&self) -> usize {
        self.levels.len()
    }

    /// Returns the level of detail for a pixel spanning `footprint` radians.
    pub fn lod(&self, footprint: f32) -> f32 {
        let lod = (footprint * (self.size() as f32) / 2.0).log2();
        let max = (self.levels.len() - 1) as f32;

        if lod.is_nan() {
            0.0
        } else {
            lod.clamp(0.0, max)
        }
    }

    /// Samples the map in given direction with an explicit level of detail,
    /// blending between the two nearest levels.
    pub fn sample_lod(&self, direction: Vec3, lod: f32) -> Vec3 {
        let (face, uv) = CubeFace::project(direction);
        let lod = lod.clamp(0.0, (self.levels.len() - 1) as f32);
        let lo = lod.floor() as usize;
        let hi = (lo + 1).min(self.levels.len() - 1);
        let t = lod - lo as f32;

        let lo_color = self.levels[lo].sample(face, uv);

        if t == 0.0 || lo == hi {
            lo_color
        } else {
            lo_color.lerp(self.levels[hi].sample(face, uv), t)
        }
    }
}

impl gpu::Environment for CubeMap {
    fn sample_grad(&self, direction: Vec3, gradient: gpu::Gradient) -> Vec3 {
        self.sample_lod(direction, self.lod(gradient.footprint()))
    }
}

/// [`CubeMap`] uploaded into VRAM, as a cube texture with the whole mip
/// chain.
///
/// Dropping this object releases the texture.
#[derive(Debug)]
pub struct GpuEnvironment {
    source: Arc<CubeMap>,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl GpuEnvironment {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        environment: &Arc<CubeMap>,
    ) -> Self {
        let size = environment.size();

        info!(
            "Uploading environment; size={size}, mips={}",
            environment.mip_count(),
        );

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("prism_environment_tex"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 6,
            },
            mip_level_count: environment.mip_count() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (mip_level, level) in environment.levels.iter().enumerate() {
            let texels: Vec<[f32; 4]> = level
                .faces
                .iter()
                .flatten()
                .map(|texel| texel.extend(1.0).to_array())
                .collect();

            queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture,
                    mip_level: mip_level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                bytemuck::cast_slice(&texels),
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(level.size * 16),
                    rows_per_image: Some(level.size),
                },
                wgpu::Extent3d {
                    width: level.size,
                    height: level.size,
                    depth_or_array_layers: 6,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("prism_environment_view"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("prism_environment_sampler"),
            ..Default::default()
        });

        Self {
            source: Arc::clone(environment),
            texture,
            view,
            sampler,
        }
    }

    /// Returns whether this upload mirrors given environment.
    pub fn is_for(&self, environment: &Arc<CubeMap>) -> bool {
        Arc::ptr_eq(&self.source, environment)
    }
}

impl Bindable for GpuEnvironment {
    /// Binds the texture at `binding` and its sampler at `binding + 1`.
    fn bind(
        &self,
        binding: u32,
    ) -> Vec<(wgpu::BindGroupLayoutEntry, wgpu::BindingResource)> {
        let tex_layout = wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT
                | wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::Cube,
                sample_type: wgpu::TextureSampleType::Float {
                    filterable: false,
                },
            },
            count: None,
        };

        let sampler_layout = wgpu::BindGroupLayoutEntry {
            binding: binding + 1,
            visibility: wgpu::ShaderStages::FRAGMENT
                | wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Sampler(
                wgpu::SamplerBindingType::NonFiltering,
            ),
            count: None,
        };

        vec![
            (tex_layout, wgpu::BindingResource::TextureView(&self.view)),
            (sampler_layout, wgpu::BindingResource::Sampler(&self.sampler)),
        ]
    }
}

impl Drop for GpuEnvironment {
    fn drop(&mut self) {
        debug!("Releasing environment");

        self.texture.destroy();
    }
}

#[derive(Clone, Debug)]
struct CubeLevel {
    size: u32,
    faces: [Vec<Vec3>; 6],
}

impl CubeLevel {
    fn texel(&self, face: CubeFace, x: u32, y: u32) -> Vec3 {
        let x = x.min(self.size - 1);
        let y = y.min(self.size - 1);

        self.faces[face as usize][(y * self.size + x) as usize]
    }

    /// Samples given face bilinearly, clamping at its edges.
    fn sample(&self, face: CubeFace, uv: Vec2) -> Vec3 {
        let pos = uv * (self.size as f32) - 0.5;
        let pos = pos.clamp(Vec2::ZERO, Vec2::splat((self.size - 1) as f32));
        let base = pos.floor();
        let t = pos - base;
        let (x, y) = (base.x as u32, base.y as u32);

        let top = self
            .texel(face, x, y)
            .lerp(self.texel(face, x + 1, y), t.x);

        let bottom = self
            .texel(face, x, y + 1)
            .lerp(self.texel(face, x + 1, y + 1), t.x);

        top.lerp(bottom, t.y)
    }

    /// Box-filters this level into one half its size; returns `None` once
    /// there's nothing left to shrink.
    ///
    /// Odd-sized levels get filtered with fractional footprints, so that
    /// every source texel contributes the same total weight.
    fn downsample(&self) -> Option<Self> {
        if self.size <= 1 {
            return None;
        }

        let size = self.size / 2;

        let footprints: Vec<_> = (0..size)
            .map(|dst| footprint(dst, self.size, size))
            .collect();

        let faces = CubeFace::ALL.map(|face| {
            let mut texels = Vec::with_capacity((size * size) as usize);

            for fy in &footprints {
                for fx in &footprints {
                    let mut sum = Vec3::ZERO;

                    for &(y, wy) in fy {
                        for &(x, wx) in fx {
                            sum += self.texel(face, x, y) * (wx * wy);
                        }
                    }

                    texels.push(sum);
                }
            }

            texels
        });

        Some(Self { size, faces })
    }
}

/// Returns source texels (with their weights) covered by texel `dst` when
/// shrinking a row of `src_size` texels into `dst_size` ones.
fn footprint(dst: u32, src_size: u32, dst_size: u32) -> Vec<(u32, f32)> {
    let ratio = src_size as f32 / dst_size as f32;
    let start = dst as f32 * ratio;
    let end = start + ratio;

    (start.floor() as u32..(end.ceil() as u32).min(src_size))
        .filter_map(|src| {
            let lo = (src as f32).max(start);
            let hi = ((src + 1) as f32).min(end);

            (hi > lo).then(|| (src, (hi - lo) / ratio))
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CubeFace {
    PosX = 0,
    NegX = 1,
    PosY = 2,
    NegY = 3,
    PosZ = 4,
    NegZ = 5,
}

impl CubeFace {
    pub const ALL: [Self; 6] = [
        Self::PosX,
        Self::NegX,
        Self::PosY,
        Self::NegY,
        Self::PosZ,
        Self::NegZ,
    ];

    pub fn all() -> impl Iterator<Item = Self> {
        Self::ALL.into_iter()
    }

    /// Returns the face given direction points at, together with the
    /// coordinates on that face (`0..1`).
    pub fn project(direction: Vec3) -> (Self, Vec2) {
        let abs = direction.abs();

        let (face, ma, sc, tc) = if abs.x >= abs.y && abs.x >= abs.z {
            if direction.x >= 0.0 {
                (Self::PosX, abs.x, -direction.z, -direction.y)
            } else {
                (Self::NegX, abs.x, direction.z, -direction.y)
            }
        } else if abs.y >= abs.z {
            if direction.y >= 0.0 {
                (Self::PosY, abs.y, direction.x, direction.z)
            } else {
                (Self::NegY, abs.y, direction.x, -direction.z)
            }
        } else if direction.z >= 0.0 {
            (Self::PosZ, abs.z, direction.x, -direction.y)
        } else {
            (Self::NegZ, abs.z, -direction.x, -direction.y)
        };

        if ma <= 0.0 {
            return (face, Vec2::splat(0.5));
        }

        (face, (Vec2::new(sc, tc) / ma + 1.0) / 2.0)
    }

    /// Returns the (normalized) direction pointing at given coordinates of
    /// this face; inverse of [`Self::project()`].
    pub fn direction(self, uv: Vec2) -> Vec3 {
        let st = uv * 2.0 - 1.0;
        let (s, t) = (st.x, st.y);

        let direction = match self {
            Self::PosX => vec3(1.0, -t, -s),
            Self::NegX => vec3(-1.0, -t, s),
            Self::PosY => vec3(s, 1.0, t),
            Self::NegY => vec3(s, -1.0, -t),
            Self::PosZ => vec3(s, -t, 1.0),
            Self::NegZ => vec3(-s, -t, -1.0),
        };

        direction.normalize()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::vec2;
    use image::Rgb;

    use super::*;

    fn face(size: u32, color: [f32; 3]) -> Rgb32FImage {
        Rgb32FImage::from_pixel(size, size, Rgb(color))
    }

    fn faces(size: u32) -> [Rgb32FImage; 6] {
        [
            face(size, [1.0, 0.0, 0.0]),
            face(size, [0.0, 1.0, 0.0]),
            face(size, [0.0, 0.0, 1.0]),
            face(size, [1.0, 1.0, 0.0]),
            face(size, [0.0, 1.0, 1.0]),
            face(size, [1.0, 0.0, 1.0]),
        ]
    }

    /// Checkerboard with single-texel squares on each face.
    fn checkerboard(size: u32) -> CubeMap {
        let faces = CubeFace::ALL.map(|_| {
            Rgb32FImage::from_fn(size, size, |x, y| {
                if (x + y) % 2 == 0 {
                    Rgb([1.0; 3])
                } else {
                    Rgb([0.0; 3])
                }
            })
        });

        CubeMap::from_faces(faces).unwrap()
    }

    /// Returns direction pointing at the center of given texel of the +Z face.
    fn texel_center(size: u32, x: u32, y: u32) -> Vec3 {
        let uv = (vec2(x as f32, y as f32) + 0.5) / (size as f32);

        CubeFace::PosZ.direction(uv)
    }

    #[test]
    fn project_and_direction_are_inverse() {
        for face in CubeFace::all() {
            for uv in [vec2(0.5, 0.5), vec2(0.1, 0.8), vec2(0.9, 0.3)] {
                let (actual_face, actual_uv) =
                    CubeFace::project(face.direction(uv));

                assert_eq!(face, actual_face);
                assert_relative_eq!(actual_uv.x, uv.x, epsilon = 1e-5);
                assert_relative_eq!(actual_uv.y, uv.y, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn face_orientation() {
        assert_eq!(CubeFace::PosX, CubeFace::project(Vec3::X).0);
        assert_eq!(CubeFace::NegX, CubeFace::project(-Vec3::X).0);
        assert_eq!(CubeFace::PosY, CubeFace::project(Vec3::Y).0);
        assert_eq!(CubeFace::NegY, CubeFace::project(-Vec3::Y).0);
        assert_eq!(CubeFace::PosZ, CubeFace::project(Vec3::Z).0);
        assert_eq!(CubeFace::NegZ, CubeFace::project(-Vec3::Z).0);

        // Top row of the side faces looks up
        let (_, uv) = CubeFace::project(vec3(0.0, 0.9, 1.0));

        assert!(uv.y < 0.5);
    }

    #[test]
    fn from_faces() {
        let target = CubeMap::from_faces(faces(4)).unwrap();

        assert_eq!(4, target.size());
        assert_eq!(3, target.mip_count());

        assert_eq!(vec3(1.0, 0.0, 0.0), target.sample_lod(Vec3::X, 0.0));
        assert_eq!(vec3(0.0, 1.0, 0.0), target.sample_lod(-Vec3::X, 0.0));
        assert_eq!(vec3(0.0, 0.0, 1.0), target.sample_lod(Vec3::Y, 0.0));
        assert_eq!(vec3(1.0, 1.0, 0.0), target.sample_lod(-Vec3::Y, 0.0));
        assert_eq!(vec3(0.0, 1.0, 1.0), target.sample_lod(Vec3::Z, 2.0));
        assert_eq!(vec3(1.0, 0.0, 1.0), target.sample_lod(-Vec3::Z, 1.5));
    }

    #[test]
    fn from_faces_rejects_invalid_faces() {
        let mut invalid = faces(4);

        invalid[3] = Rgb32FImage::new(4, 2);

        assert!(matches!(
            CubeMap::from_faces(invalid),
            Err(Error::InvalidEnvironment(_))
        ));

        let mut invalid = faces(4);

        invalid[5] = face(8, [0.0; 3]);

        assert!(matches!(
            CubeMap::from_faces(invalid),
            Err(Error::InvalidEnvironment(_))
        ));

        assert!(matches!(
            CubeMap::from_faces(faces(0)),
            Err(Error::InvalidEnvironment(_))
        ));
    }

    #[test]
    fn open_reports_missing_files() {
        let result = CubeMap::open(["does-not-exist.png"; 6]);

        assert!(matches!(
            result,
            Err(Error::EnvironmentUnavailable { .. })
        ));
    }

    #[test]
    fn from_fn() {
        let target = CubeMap::from_fn(16, |dir| dir.max(Vec3::ZERO));

        let color = target.sample_lod(Vec3::X, 0.0);

        assert!(color.x > 0.9);
        assert!(color.y < 0.1);

        let color = target.sample_lod(Vec3::Y, 0.0);

        assert!(color.y > 0.9);
    }

    #[test]
    fn lod() {
        let target = CubeMap::uniform(Vec3::ONE);

        assert_eq!(0.0, target.lod(0.0));
        assert_eq!(0.0, target.lod(1.0));

        let target = checkerboard(64);

        // One texel spans 2/64 radians near the center of a face
        assert_relative_eq!(target.lod(2.0 / 64.0), 0.0);
        assert_relative_eq!(target.lod(4.0 / 64.0), 1.0);
        assert_relative_eq!(target.lod(8.0 / 64.0), 2.0);
        assert_relative_eq!(target.lod(100.0), 6.0);
    }

    #[test]
    fn mips_average_fine_detail() {
        let target = checkerboard(64);

        // Finest level resolves the checkerboard...
        let a = target.sample_lod(texel_center(64, 32, 32), 0.0);
        let b = target.sample_lod(texel_center(64, 33, 32), 0.0);

        assert_relative_eq!(a.x, 1.0, epsilon = 1e-3);
        assert_relative_eq!(b.x, 0.0, epsilon = 1e-3);

        // ... while coarser ones blur it into gray
        for lod in [1.0, 2.5, 6.0] {
            let color = target.sample_lod(Vec3::Z, lod);

            assert_relative_eq!(color.x, 0.5, epsilon = 1e-3);
        }
    }

    #[test]
    fn footprint() {
        assert_eq!(vec![(4, 0.5), (5, 0.5)], super::footprint(2, 8, 4));

        let weights = super::footprint(0, 3, 1);

        assert_eq!(3, weights.len());

        for (_, weight) in weights {
            assert_relative_eq!(weight, 1.0 / 3.0, epsilon = 1e-6);
        }

        // 5 -> 2: the middle texel gets split between both halves
        assert_eq!(
            vec![(0, 0.4), (1, 0.4), (2, 0.2)],
            super::footprint(0, 5, 2),
        );

        assert_eq!(
            vec![(2, 0.2), (3, 0.4), (4, 0.4)],
            super::footprint(1, 5, 2),
        );
    }

    #[test]
    fn mips_of_odd_sized_faces_keep_every_texel() {
        let faces = CubeFace::ALL.map(|_| {
            Rgb32FImage::from_fn(3, 3, |x, y| {
                if (x, y) == (2, 2) {
                    Rgb([9.0; 3])
                } else {
                    Rgb([0.0; 3])
                }
            })
        });

        let target = CubeMap::from_faces(faces).unwrap();

        assert_eq!(2, target.mip_count());

        let color = target.sample_lod(Vec3::Z, 1.0);

        assert_relative_eq!(color.x, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn sample_grad() {
        use gpu::Environment;

        let target = checkerboard(64);

        let direction = texel_center(64, 32, 32);

        let sharp = target.sample_grad(
            direction,
            gpu::Gradient::new(Vec3::ZERO, Vec3::ZERO),
        );

        let blurry = target.sample_grad(
            direction,
            gpu::Gradient::new(Vec3::splat(0.5), Vec3::ZERO),
        );

        assert_relative_eq!(sharp.x, 1.0, epsilon = 1e-3);
        assert_relative_eq!(blurry.x, 0.5, epsilon = 1e-3);
    }
}
