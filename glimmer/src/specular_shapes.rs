use derivative::Derivative;
use fxhash::FxHashSet;
use log::{debug, warn};

use crate::{gpu, Backend, GeometryKind, GrowableBuffer, Result, Scene};

/// Registry of caustic-capable geometry that manifolds get solved through.
///
/// The registry only ever grows: rescanning a scene appends instances that
/// haven't been seen before and keeps the ones already registered.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct SpecularShapes<B>
where
    B: Backend,
{
    shapes: Vec<gpu::SpecularShape>,
    known: FxHashSet<u32>,
    buffer: GrowableBuffer<B>,
    dirty: bool,
}

impl<B> SpecularShapes<B>
where
    B: Backend,
{
    pub fn new() -> Self {
        Self {
            shapes: Default::default(),
            known: Default::default(),
            buffer: GrowableBuffer::of::<gpu::SpecularShape>(
                "glimmer_specular_shapes",
            ),
            dirty: false,
        }
    }

    /// Registers specular shapes of given scene, returning how many new ones
    /// got found.
    pub fn scan(&mut self, scene: &dyn Scene) -> usize {
        let mut found = 0;

        for instance in scene.geometry_instances() {
            if self.known.contains(&instance.id) {
                continue;
            }

            if instance.kind != GeometryKind::TriangleMesh {
                warn!(
                    "Instance {} is not a triangle mesh ({:?}); it won't \
                     take part in manifold sampling",
                    instance.id, instance.kind
                );

                self.known.insert(instance.id);
                continue;
            }

            let Some(material) = instance.material else {
                continue;
            };

            if !material.is_caustic_bouncer {
                continue;
            }

            self.shapes.push(gpu::SpecularShape::new(
                material.id,
                instance.bounds.min(),
                instance.bounds.max(),
                material.is_uv_space_sampling,
            ));

            self.known.insert(instance.id);
            found += 1;
        }

        if found > 0 {
            debug!(
                "Found {} new specular shape(s); total={}",
                found,
                self.shapes.len()
            );

            self.dirty = true;
        }

        found
    }

    /// Uploads the registry, growing the device buffer if needed; nothing
    /// gets allocated while the registry is empty.
    pub fn prepare(&mut self, backend: &mut B) -> Result<()> {
        if self.shapes.is_empty() {
            return Ok(());
        }

        let reallocated = self.buffer.ensure(backend, self.shapes.len())?;

        if self.dirty || reallocated {
            self.buffer.write(backend, 0, &self.shapes)?;
            self.dirty = false;
        }

        Ok(())
    }

    /// Returns the registry as seen by kernels, or `None` if it's empty (or
    /// hasn't been prepared yet).
    pub fn view(&self) -> Option<SpecularShapesView<'_, B>> {
        if self.shapes.is_empty() || self.dirty {
            return None;
        }

        let buffer = self.buffer.get().ok()?;

        Some(SpecularShapesView {
            buffer,
            count: self.shapes.len() as u32,
        })
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn shapes(&self) -> &[gpu::SpecularShape] {
        &self.shapes
    }
}

impl<B> Default for SpecularShapes<B>
where
    B: Backend,
{
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Derivative)]
#[derivative(Clone(bound = ""), Copy(bound = ""), Debug(bound = ""))]
pub struct SpecularShapesView<'a, B>
where
    B: Backend,
{
    pub buffer: &'a B::Buffer,
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use glam::vec3;

    use super::*;
    use crate::testing::FakeScene;
    use crate::{BoundingBox, HostBackend};

    #[test]
    fn scan() {
        let mut scene = FakeScene::default();

        scene.push_mesh(1, Some((10, true, false)));
        scene.push_mesh(2, Some((11, false, false)));
        scene.push_mesh(3, None);
        scene.push(4, GeometryKind::Curve, Some((12, true, false)));
        scene.push_mesh(5, Some((13, true, true)));

        let mut target = SpecularShapes::<HostBackend>::new();

        assert_eq!(2, target.scan(&scene));

        let ids: Vec<_> =
            target.shapes().iter().map(|shape| shape.material_id).collect();

        assert_eq!(vec![10, 13], ids);
        assert!(!target.shapes()[0].uses_uv_space_sampling());
        assert!(target.shapes()[1].uses_uv_space_sampling());

        // Rescanning doesn't duplicate anything, but picks up new instances
        assert_eq!(0, target.scan(&scene));

        scene.push_mesh(6, Some((14, true, false)));

        assert_eq!(1, target.scan(&scene));
        assert_eq!(3, target.len());
    }

    #[test]
    fn prepare() {
        let mut backend = HostBackend::new();
        let mut scene = FakeScene::default();
        let mut target = SpecularShapes::<HostBackend>::new();

        target.scan(&scene);
        target.prepare(&mut backend).unwrap();

        assert!(target.is_empty());
        assert!(target.view().is_none());
        assert_eq!(0, backend.allocated_buffers());

        scene.push_mesh(1, Some((10, true, false)));

        scene.instances[0].bounds =
            BoundingBox::new(vec3(-1.0, 0.0, 0.0), vec3(1.0, 2.0, 0.0));

        target.scan(&scene);

        assert!(target.view().is_none());

        target.prepare(&mut backend).unwrap();

        let view = target.view().unwrap();
        let shape: gpu::SpecularShape = view.buffer.read(0).unwrap();

        assert_eq!(1, view.count);
        assert_eq!(10, shape.material_id);
        assert_eq!(vec3(-1.0, 0.0, 0.0), shape.aabb_min);
        assert_eq!(vec3(1.0, 2.0, 0.0), shape.aabb_max);

        // Preparing again doesn't allocate anything new
        target.prepare(&mut backend).unwrap();

        assert_eq!(1, backend.allocated_buffers());
    }
}
