use crate::device::{Backend, BufferDesc, BufferUsage, ResourceCreationError, ResourceId};
use crate::mesh::Vertex;

/// A vertex buffer sized for one mesh, plus how to bind it.
#[derive(Debug)]
pub struct GeometryBuffer {
    buffer: Option<ResourceId>,
    vertex_count: u32,
    byte_width: u64,
}

impl GeometryBuffer {
    /// Creates a buffer large enough for `vertices`. Contents are undefined
    /// until [`upload`](Self::upload).
    pub fn create<B: Backend>(
        backend: &mut B,
        vertices: &[Vertex],
        usage: BufferUsage,
    ) -> Result<Self, ResourceCreationError> {
        let Ok(vertex_count) = u32::try_from(vertices.len()) else {
            return Err(ResourceCreationError::Buffer(format!(
                "{} vertices exceed a single draw",
                vertices.len()
            )));
        };
        if vertex_count == 0 {
            return Err(ResourceCreationError::Buffer("mesh has no vertices".into()));
        }
        let byte_width = u64::from(vertex_count) * u64::from(Vertex::STRIDE);
        let buffer = backend.create_buffer(&BufferDesc {
            label: "vertex buffer",
            byte_width,
            usage,
        })?;
        Ok(Self {
            buffer: Some(buffer),
            vertex_count,
            byte_width,
        })
    }

    /// Replaces the buffer contents with `vertices` through a discard map.
    pub fn upload<B: Backend>(
        &mut self,
        backend: &mut B,
        context: ResourceId,
        vertices: &[Vertex],
    ) -> Result<(), ResourceCreationError> {
        let Some(buffer) = self.buffer else {
            return Err(ResourceCreationError::Buffer("buffer was released".into()));
        };
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        if bytes.len() as u64 > self.byte_width {
            return Err(ResourceCreationError::Buffer(format!(
                "{} bytes do not fit into {} bytes",
                bytes.len(),
                self.byte_width
            )));
        }

        let copied = {
            let mapped = backend.map_discard(context, buffer)?;
            match mapped.get_mut(..bytes.len()) {
                Some(dst) => {
                    dst.copy_from_slice(bytes);
                    true
                }
                None => false,
            }
        };
        backend.unmap(context, buffer);

        if !copied {
            return Err(ResourceCreationError::Map {
                id: buffer,
                reason: "mapping is smaller than the buffer".into(),
            });
        }
        self.vertex_count = bytes.len() as u32 / Vertex::STRIDE;
        log::debug!("uploaded {} vertices into {buffer}", self.vertex_count);
        Ok(())
    }

    /// Binds the buffer to input slot 0 at stride 28, offset 0.
    pub fn bind<B: Backend>(&self, backend: &mut B, context: ResourceId) {
        if let Some(buffer) = self.buffer {
            backend.set_vertex_buffer(context, 0, buffer, Vertex::STRIDE, 0);
        }
    }

    pub fn buffer(&self) -> Option<ResourceId> {
        self.buffer
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn release<B: Backend>(&mut self, backend: &mut B) {
        if let Some(buffer) = self.buffer.take() {
            backend.release(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{
        Command, DeviceConfig, DeviceHandles, FailPoint, HeadlessBackend, HeadlessWindow,
    };
    use crate::mesh::TRIANGLE;

    fn setup() -> (HeadlessBackend, DeviceHandles) {
        let mut backend = HeadlessBackend::new();
        let handles = backend
            .create_device(HeadlessWindow::default(), &DeviceConfig::default())
            .unwrap();
        (backend, handles)
    }

    #[test]
    fn triangle_buffer_is_three_strides() {
        let (mut backend, handles) = setup();
        let mut geometry =
            GeometryBuffer::create(&mut backend, &TRIANGLE, BufferUsage::DynamicWrite).unwrap();
        geometry
            .upload(&mut backend, handles.context, &TRIANGLE)
            .unwrap();
        let buffer = geometry.buffer().unwrap();
        let contents = backend.buffer_contents(buffer).unwrap();
        assert_eq!(contents.len(), 84);
        assert_eq!(contents, bytemuck::cast_slice::<Vertex, u8>(&TRIANGLE));
        assert_eq!(geometry.vertex_count(), 3);
    }

    #[test]
    fn upload_maps_and_unmaps() {
        let (mut backend, handles) = setup();
        let mut geometry =
            GeometryBuffer::create(&mut backend, &TRIANGLE, BufferUsage::DynamicWrite).unwrap();
        backend.clear_commands();
        geometry
            .upload(&mut backend, handles.context, &TRIANGLE)
            .unwrap();
        let buffer = geometry.buffer().unwrap();
        assert_eq!(
            backend.commands(),
            &[Command::Map(buffer), Command::Unmap(buffer)]
        );
    }

    #[test]
    fn empty_mesh_is_rejected() {
        let (mut backend, _) = setup();
        assert!(GeometryBuffer::create(&mut backend, &[], BufferUsage::DynamicWrite).is_err());
    }

    #[test]
    fn oversized_upload_is_rejected() {
        let (mut backend, handles) = setup();
        let mut geometry =
            GeometryBuffer::create(&mut backend, &TRIANGLE[..1], BufferUsage::DynamicWrite)
                .unwrap();
        assert!(geometry
            .upload(&mut backend, handles.context, &TRIANGLE)
            .is_err());
    }

    #[test]
    fn failed_map_reports_map_error() {
        let (mut backend, handles) = setup();
        let mut geometry =
            GeometryBuffer::create(&mut backend, &TRIANGLE, BufferUsage::DynamicWrite).unwrap();
        backend.fail_at(FailPoint::Map);
        assert!(matches!(
            geometry.upload(&mut backend, handles.context, &TRIANGLE),
            Err(ResourceCreationError::Map { .. })
        ));
    }

    #[test]
    fn bind_uses_vertex_stride() {
        let (mut backend, handles) = setup();
        let geometry =
            GeometryBuffer::create(&mut backend, &TRIANGLE, BufferUsage::DynamicWrite).unwrap();
        geometry.bind(&mut backend, handles.context);
        assert_eq!(
            backend.commands().last(),
            Some(&Command::SetVertexBuffer {
                slot: 0,
                buffer: geometry.buffer().unwrap(),
                stride: 28,
                offset: 0
            })
        );
    }

    #[test]
    fn release_twice_is_harmless() {
        let (mut backend, _) = setup();
        let mut geometry =
            GeometryBuffer::create(&mut backend, &TRIANGLE, BufferUsage::DynamicWrite).unwrap();
        geometry.release(&mut backend);
        geometry.release(&mut backend);
        assert_eq!(backend.stray_releases(), 0);
    }
}
