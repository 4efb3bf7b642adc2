use std::path::Path;
use std::sync::Arc;

use derivative::Derivative;
use glam::{Mat4, Vec3};
use log::{debug, info, trace};

use crate::{
    gpu, Bindable, Camera, Collider, CubeMap, Error, Geometry, GpuEnvironment,
    GpuGeometry, MappedUniformBuffer, Mesh, Result, MAX_BOUNCES,
};

/// Refractive material of a single gem.
///
/// Owns the gem's geometry and environment (both shared with clones), its
/// refraction parameters and the per-frame camera state.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct GemMaterial {
    geometry: Arc<Geometry>,
    environment: Arc<CubeMap>,
    ior: f32,
    bounces: u32,
    aberration_strength: f32,
    chromatic_aberration: bool,
    dispersion: gpu::Dispersion,
    correct_mips: bool,
    color: Vec3,
    transform: Mat4,
    collider: bool,
    camera: gpu::Camera,

    #[derivative(Debug = "ignore")]
    gpu_geometry: Option<Arc<GpuGeometry>>,

    #[derivative(Debug = "ignore")]
    gpu_environment: Option<Arc<GpuEnvironment>>,

    #[derivative(Debug = "ignore")]
    uniforms: Option<GemUniforms>,
}

impl GemMaterial {
    /// Index of refraction of a diamond.
    pub const DEFAULT_IOR: f32 = 2.4;
    pub const DEFAULT_BOUNCES: u32 = 3;
    pub const DEFAULT_ABERRATION_STRENGTH: f32 = 0.01;

    /// Builds the BVH over given mesh and creates a material around it,
    /// refracting given environment.
    pub fn new(mesh: Mesh, environment: Arc<CubeMap>) -> Result<Self> {
        info!("Creating gem material ({} triangles)", mesh.len());

        let geometry = Arc::new(Geometry::new(mesh)?);

        Ok(Self::from_geometry(geometry, environment))
    }

    /// Loads the environment from six cube faces (see [`CubeMap::open()`])
    /// and creates a material around given mesh.
    pub fn open<P>(mesh: Mesh, faces: [P; 6]) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let environment = Arc::new(CubeMap::open(faces)?);

        Self::new(mesh, environment)
    }

    pub fn from_geometry(
        geometry: Arc<Geometry>,
        environment: Arc<CubeMap>,
    ) -> Self {
        Self {
            geometry,
            environment,
            ior: Self::DEFAULT_IOR,
            bounces: Self::DEFAULT_BOUNCES,
            aberration_strength: Self::DEFAULT_ABERRATION_STRENGTH,
            chromatic_aberration: true,
            dispersion: Default::default(),
            correct_mips: true,
            color: Vec3::ONE,
            transform: Mat4::IDENTITY,
            collider: false,
            camera: Default::default(),
            gpu_geometry: None,
            gpu_environment: None,
            uniforms: None,
        }
    }

    pub fn with_ior(mut self, ior: f32) -> Result<Self> {
        self.set_ior(ior)?;
        Ok(self)
    }

    pub fn with_bounces(mut self, bounces: u32) -> Result<Self> {
        self.set_bounces(bounces)?;
        Ok(self)
    }

    pub fn with_aberration_strength(mut self, strength: f32) -> Result<Self> {
        self.set_aberration_strength(strength)?;
        Ok(self)
    }

    pub fn with_chromatic_aberration(mut self, enabled: bool) -> Self {
        self.chromatic_aberration = enabled;
        self
    }

    pub fn with_dispersion(mut self, dispersion: gpu::Dispersion) -> Self {
        self.dispersion = dispersion;
        self
    }

    pub fn with_correct_mips(mut self, enabled: bool) -> Self {
        self.correct_mips = enabled;
        self
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_environment(mut self, environment: Arc<CubeMap>) -> Self {
        self.set_environment(environment);
        self
    }

    /// Enables the collision proxy (see [`Self::collider()`]).
    pub fn with_collider(mut self, enabled: bool) -> Self {
        self.collider = enabled;
        self
    }

    /// Sets the index of refraction.
    ///
    /// Any positive value is accepted, but values below `1.0` get clamped to
    /// `1.0` when tracing.
    pub fn set_ior(&mut self, ior: f32) -> Result<()> {
        if !ior.is_finite() || ior <= 0.0 {
            return Err(Error::InvalidIor(ior));
        }

        self.ior = ior;

        Ok(())
    }

    pub fn set_bounces(&mut self, bounces: u32) -> Result<()> {
        if bounces > MAX_BOUNCES {
            return Err(Error::InvalidBounces(bounces));
        }

        self.bounces = bounces;

        Ok(())
    }

    /// Sets how far apart the color channels get spread; `0.0` disables
    /// dispersion.
    pub fn set_aberration_strength(&mut self, strength: f32) -> Result<()> {
        if !strength.is_finite() || strength < 0.0 {
            return Err(Error::InvalidAberration(strength));
        }

        self.aberration_strength = strength;

        Ok(())
    }

    pub fn set_chromatic_aberration(&mut self, enabled: bool) {
        self.chromatic_aberration = enabled;
    }

    pub fn set_dispersion(&mut self, dispersion: gpu::Dispersion) {
        self.dispersion = dispersion;
    }

    pub fn set_correct_mips(&mut self, enabled: bool) {
        self.correct_mips = enabled;
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    /// Replaces the environment; it gets uploaded on the next
    /// [`Self::upload()`].
    pub fn set_environment(&mut self, environment: Arc<CubeMap>) {
        self.environment = environment;
    }

    pub fn ior(&self) -> f32 {
        self.ior
    }

    pub fn bounces(&self) -> u32 {
        self.bounces
    }

    pub fn aberration_strength(&self) -> f32 {
        self.aberration_strength
    }

    pub fn chromatic_aberration(&self) -> bool {
        self.chromatic_aberration
    }

    pub fn dispersion(&self) -> gpu::Dispersion {
        self.dispersion
    }

    pub fn correct_mips(&self) -> bool {
        self.correct_mips
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn geometry(&self) -> &Arc<Geometry> {
        &self.geometry
    }

    pub fn environment(&self) -> &Arc<CubeMap> {
        &self.environment
    }

    /// Returns the camera state as of the latest [`Self::prepare_frame()`].
    pub fn camera(&self) -> &gpu::Camera {
        &self.camera
    }

    /// Returns the collision proxy, if it's been enabled through
    /// [`Self::with_collider()`].
    pub fn collider(&self) -> Option<Collider> {
        self.collider.then(|| {
            Collider::new(Arc::clone(&self.geometry), self.transform)
        })
    }

    /// Replaces the geometry with one built for `mesh`.
    ///
    /// On failure the material keeps its current geometry. Clones made before
    /// this call keep the old geometry, which is released once the last of
    /// them is gone.
    pub fn rebuild(&mut self, mesh: Mesh) -> Result<()> {
        info!("Rebuilding gem material ({} triangles)", mesh.len());

        let geometry = Geometry::new(mesh)?;

        self.geometry = Arc::new(geometry);
        self.gpu_geometry = None;

        Ok(())
    }

    /// Refreshes camera-dependent state; must be called once per frame,
    /// before rendering.
    pub fn prepare_frame(&mut self, camera: &Camera) {
        trace!("Preparing frame for camera: {}", camera.describe());

        self.camera = camera.serialize();
    }

    pub fn serialize(&self) -> gpu::Material {
        let mut flags = 0;

        if self.chromatic_aberration {
            flags |= gpu::Material::FLAG_CHROMATIC_ABERRATION;
        }

        if self.correct_mips {
            flags |= gpu::Material::FLAG_CORRECT_MIPS;
        }

        if let gpu::Dispersion::Accurate = self.dispersion {
            flags |= gpu::Material::FLAG_ACCURATE_DISPERSION;
        }

        gpu::Material {
            transform: self.transform,
            transform_inverse: self.transform.inverse(),
            color: self.color.extend(1.0),
            ior: self.ior,
            bounces: self.bounces,
            aberration_strength: self.aberration_strength,
            flags,
            scale: self.geometry.scale(),
            ..Default::default()
        }
    }

    /// Creates (or refreshes) this material's GPU buffers.
    ///
    /// Geometry and environment get uploaded only once, even across clones;
    /// uniforms are written only when they've changed.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if !self.is_geometry_uploaded() {
            let gpu_geometry = GpuGeometry::new(device, queue, &self.geometry);

            self.gpu_geometry = Some(Arc::new(gpu_geometry));
        }

        if !self.is_environment_uploaded() {
            let gpu_environment =
                GpuEnvironment::new(device, queue, &self.environment);

            self.gpu_environment = Some(Arc::new(gpu_environment));
        }

        let material = self.serialize();
        let camera = self.camera;

        let uniforms = self
            .uniforms
            .get_or_insert_with(|| GemUniforms::new(device, material, camera));

        if *uniforms.material != material {
            *uniforms.material = material;
        }

        if *uniforms.camera != camera {
            *uniforms.camera = camera;
        }

        if uniforms.flush(queue) {
            debug!("Uniforms flushed");
        }
    }

    /// Returns whether [`Self::upload()`] has been called for the current
    /// geometry and environment.
    pub fn is_uploaded(&self) -> bool {
        self.uniforms.is_some()
            && self.is_geometry_uploaded()
            && self.is_environment_uploaded()
    }

    fn is_geometry_uploaded(&self) -> bool {
        self.gpu_geometry
            .as_ref()
            .is_some_and(|gpu| gpu.is_for(&self.geometry))
    }

    fn is_environment_uploaded(&self) -> bool {
        self.gpu_environment
            .as_ref()
            .is_some_and(|gpu| gpu.is_for(&self.environment))
    }
}

impl Clone for GemMaterial {
    /// Clones the parameters, sharing the geometry and the environment (both
    /// on the host and on the GPU); uniforms are allocated separately on the
    /// clone's first upload.
    fn clone(&self) -> Self {
        Self {
            geometry: Arc::clone(&self.geometry),
            environment: Arc::clone(&self.environment),
            ior: self.ior,
            bounces: self.bounces,
            aberration_strength: self.aberration_strength,
            chromatic_aberration: self.chromatic_aberration,
            dispersion: self.dispersion,
            correct_mips: self.correct_mips,
            color: self.color,
            transform: self.transform,
            collider: self.collider,
            camera: self.camera,
            gpu_geometry: self.gpu_geometry.clone(),
            gpu_environment: self.gpu_environment.clone(),
            uniforms: None,
        }
    }
}

impl Bindable for GemMaterial {
    /// Binds, starting at `binding`: the material, the camera, the BVH nodes,
    /// the triangles, the environment texture and its sampler.
    ///
    /// # Panics
    ///
    /// Panics if the material hasn't been uploaded yet.
    fn bind(
        &self,
        binding: u32,
    ) -> Vec<(wgpu::BindGroupLayoutEntry, wgpu::BindingResource)> {
        assert!(
            self.is_uploaded(),
            "material must be uploaded before it's bound",
        );

        let mut entries = Vec::new();

        if let Some(uniforms) = &self.uniforms {
            entries.extend(uniforms.material.bind(binding));
            entries.extend(uniforms.camera.bind(binding + 1));
        }

        if let Some(gpu_geometry) = &self.gpu_geometry {
            entries.extend(gpu_geometry.bind(binding + 2));
        }

        if let Some(gpu_environment) = &self.gpu_environment {
            entries.extend(gpu_environment.bind(binding + 4));
        }

        entries
    }
}

#[derive(Debug)]
struct GemUniforms {
    material: MappedUniformBuffer<gpu::Material>,
    camera: MappedUniformBuffer<gpu::Camera>,
}

impl GemUniforms {
    fn new(
        device: &wgpu::Device,
        material: gpu::Material,
        camera: gpu::Camera,
    ) -> Self {
        Self {
            material: MappedUniformBuffer::new(
                device,
                "prism_material",
                material,
            ),
            camera: MappedUniformBuffer::new(device, "prism_camera", camera),
        }
    }

    fn flush(&mut self, queue: &wgpu::Queue) -> bool {
        let material = self.material.flush(queue);
        let camera = self.camera.flush(queue);

        material || camera
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{uvec2, vec3};

    use super::*;

    fn material() -> GemMaterial {
        GemMaterial::new(Mesh::icosphere(1), sky()).unwrap()
    }

    fn sky() -> Arc<CubeMap> {
        Arc::new(CubeMap::uniform(Vec3::ONE))
    }

    #[test]
    fn defaults() {
        let target = material();

        assert_eq!(2.4, target.ior());
        assert_eq!(3, target.bounces());
        assert_eq!(0.01, target.aberration_strength());
        assert!(target.chromatic_aberration());
        assert!(target.correct_mips());
        assert_eq!(gpu::Dispersion::Fast, target.dispersion());
        assert_eq!(Vec3::ONE, target.color());
        assert!(target.collider().is_none());
        assert!(!target.is_uploaded());
    }

    #[test]
    fn new_rejects_empty_mesh() {
        let result = GemMaterial::new(Mesh::default(), sky());

        assert!(matches!(result, Err(Error::EmptyMesh)));
    }

    #[test]
    fn open_rejects_missing_environment() {
        let result =
            GemMaterial::open(Mesh::icosphere(1), ["does-not-exist.hdr"; 6]);

        assert!(matches!(
            result,
            Err(Error::EnvironmentUnavailable { .. })
        ));
    }

    #[test]
    fn set_ior() {
        let mut target = material();

        target.set_ior(1.5).unwrap();
        assert_eq!(1.5, target.ior());

        // Accepted, but clamped when tracing
        target.set_ior(0.5).unwrap();
        assert_eq!(0.5, target.ior());

        assert!(matches!(target.set_ior(0.0), Err(Error::InvalidIor(_))));
        assert!(matches!(target.set_ior(-1.0), Err(Error::InvalidIor(_))));

        assert!(matches!(
            target.set_ior(f32::NAN),
            Err(Error::InvalidIor(_))
        ));

        assert_eq!(0.5, target.ior());
    }

    #[test]
    fn set_bounces() {
        let mut target = material();

        target.set_bounces(0).unwrap();
        target.set_bounces(MAX_BOUNCES).unwrap();

        assert!(matches!(
            target.set_bounces(MAX_BOUNCES + 1),
            Err(Error::InvalidBounces(_))
        ));

        assert_eq!(MAX_BOUNCES, target.bounces());
    }

    #[test]
    fn set_aberration_strength() {
        let mut target = material();

        target.set_aberration_strength(0.0).unwrap();
        target.set_aberration_strength(0.2).unwrap();

        assert!(matches!(
            target.set_aberration_strength(-0.1),
            Err(Error::InvalidAberration(_))
        ));

        assert!(matches!(
            target.set_aberration_strength(f32::INFINITY),
            Err(Error::InvalidAberration(_))
        ));

        assert_eq!(0.2, target.aberration_strength());
    }

    #[test]
    fn serialize() {
        let transform = Mat4::from_translation(vec3(1.0, 2.0, 3.0));

        let target = material()
            .with_ior(1.8)
            .unwrap()
            .with_bounces(5)
            .unwrap()
            .with_dispersion(gpu::Dispersion::Accurate)
            .with_correct_mips(false)
            .with_color(vec3(1.0, 0.5, 0.25))
            .with_transform(transform)
            .serialize();

        assert_eq!(1.8, target.ior);
        assert_eq!(5, target.bounces);
        assert_eq!(0.01, target.aberration_strength);
        assert!(target.chromatic_aberration());
        assert!(!target.correct_mips());
        assert_eq!(gpu::Dispersion::Accurate, target.dispersion());
        assert_eq!(vec3(1.0, 0.5, 0.25).extend(1.0), target.color);
        assert_eq!(transform, target.transform);
        assert_eq!(transform.inverse(), target.transform_inverse);
        assert_relative_eq!(target.scale, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn prepare_frame() {
        let mut target = material();
        let fingerprint = target.geometry().fingerprint();

        let camera = Camera::looking_at(
            vec3(0.0, 0.0, 5.0),
            Vec3::ZERO,
            1.0,
            uvec2(32, 16),
        );

        target.prepare_frame(&camera);

        assert_eq!(camera.serialize(), *target.camera());
        assert_eq!(fingerprint, target.geometry().fingerprint());
    }

    #[test]
    fn clone_shares_geometry() {
        let a = material().with_color(Vec3::X);
        let mut b = a.clone();

        assert!(Arc::ptr_eq(a.geometry(), b.geometry()));
        assert!(Arc::ptr_eq(a.environment(), b.environment()));

        b.set_color(Vec3::Y);
        b.set_ior(1.3).unwrap();

        assert_eq!(Vec3::X, a.color());
        assert_eq!(2.4, a.ior());
        assert_eq!(Vec3::Y, b.color());
    }

    #[test]
    fn rebuild() {
        let a = material();
        let mut b = a.clone();

        b.rebuild(Mesh::icosphere(2)).unwrap();

        assert!(!Arc::ptr_eq(a.geometry(), b.geometry()));
        assert_eq!(80, a.geometry().mesh().len());
        assert_eq!(320, b.geometry().mesh().len());

        // Failed rebuild keeps the current geometry
        assert!(b.rebuild(Mesh::default()).is_err());
        assert_eq!(320, b.geometry().mesh().len());
    }

    #[test]
    fn set_environment() {
        let a = material();
        let mut b = a.clone();
        let environment = Arc::new(CubeMap::uniform(Vec3::X));

        b.set_environment(Arc::clone(&environment));

        assert!(Arc::ptr_eq(&environment, b.environment()));
        assert!(!Arc::ptr_eq(a.environment(), b.environment()));
        assert_eq!(Vec3::ONE, a.environment().sample_lod(Vec3::Z, 0.0));
    }

    #[test]
    fn collider() {
        let target = material().with_collider(true);

        assert!(target.collider().is_some());
    }
}
