use crate::error::{EngineError, Result};
use crate::gfx::device::{GpuDevice, ProgramHandle, Topology, VertexArrayHandle};
use crate::gfx::geometry::{Geometry, POSITION};
use crate::gfx::material::Material;

/// Something the renderer can draw.
pub trait Drawable {
    fn geometry(&self) -> &Geometry;
    fn material(&self) -> &Material;
    fn material_mut(&mut self) -> &mut Material;
    fn vertex_array(&self) -> Option<VertexArrayHandle>;

    fn topology(&self) -> Topology {
        self.material().topology()
    }

    fn vertex_count(&self) -> u32 {
        self.geometry().vertex_count() as u32
    }
}

/// A geometry drawn with a material. Owns both, plus the vertex-array
/// bindings that connect them.
#[derive(Debug)]
pub struct Mesh {
    geometry: Geometry,
    material: Material,
    vertex_array: Option<VertexArrayHandle>,
    shadow_vertex_array: Option<(ProgramHandle, VertexArrayHandle)>,
    /// Drawn into the shadow map when true.
    pub casts_shadow: bool,
}

impl Mesh {
    /// Binds every geometry attribute to the same-named program input.
    /// Attributes the program does not declare are skipped.
    pub fn new(device: &mut dyn GpuDevice, geometry: Geometry, material: Material) -> Result<Self> {
        if !geometry.has_attribute(POSITION) {
            return Err(EngineError::MissingAttribute(POSITION.to_string()));
        }
        let mut mesh = Self {
            geometry,
            material,
            vertex_array: None,
            shadow_vertex_array: None,
            casts_shadow: true,
        };
        mesh.rebind(device);
        Ok(mesh)
    }

    /// Rebuilds the vertex-array bindings, e.g. after attributes were added.
    pub fn rebind(&mut self, device: &mut dyn GpuDevice) {
        self.release_bindings(device);
        let program = self.material.program();
        let vertex_array = device.create_vertex_array(program);
        let mut bound = 0;
        for (name, attribute) in self.geometry.attributes() {
            if attribute.bind_to_shader_input(device, vertex_array, program, name) {
                bound += 1;
            }
        }
        log::trace!(
            "bound {bound} of {} attributes for a {} mesh",
            self.geometry.attribute_names().len(),
            self.material.kind()
        );
        self.vertex_array = Some(vertex_array);
    }

    /// Vertex array feeding `position` into the shadow depth program, created
    /// on first use.
    pub fn shadow_vertex_array(
        &mut self,
        device: &mut dyn GpuDevice,
        depth_program: ProgramHandle,
    ) -> VertexArrayHandle {
        match self.shadow_vertex_array {
            Some((program, vertex_array)) if program == depth_program => vertex_array,
            stale => {
                if let Some((_, vertex_array)) = stale {
                    device.release_vertex_array(vertex_array);
                }
                let vertex_array = device.create_vertex_array(depth_program);
                if let Some(position) = self.geometry.attribute(POSITION) {
                    position.bind_to_shader_input(device, vertex_array, depth_program, POSITION);
                }
                self.shadow_vertex_array = Some((depth_program, vertex_array));
                vertex_array
            }
        }
    }

    pub fn geometry_mut(&mut self) -> &mut Geometry {
        &mut self.geometry
    }

    fn release_bindings(&mut self, device: &mut dyn GpuDevice) {
        if let Some(vertex_array) = self.vertex_array.take() {
            device.release_vertex_array(vertex_array);
        }
        if let Some((_, vertex_array)) = self.shadow_vertex_array.take() {
            device.release_vertex_array(vertex_array);
        }
    }

    /// Frees bindings, geometry buffers and a material-owned program.
    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        self.release_bindings(device);
        self.geometry.release(device);
        self.material.release(device);
    }
}

impl Drawable for Mesh {
    fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    fn material(&self) -> &Material {
        &self.material
    }

    fn material_mut(&mut self) -> &mut Material {
        &mut self.material
    }

    fn vertex_array(&self) -> Option<VertexArrayHandle> {
        self.vertex_array
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::device::HeadlessDevice;
    use crate::gfx::geometry::{box_geometry, COLOR, UV};
    use crate::gfx::material::MaterialKind;
    use crate::gfx::shaders;

    #[test]
    fn test_geometry_without_position_is_rejected() {
        let mut device = HeadlessDevice::default();
        let mut geometry = Geometry::new();
        geometry.add_attribute(&mut device, COLOR, vec![[1.0f32; 3]].into());
        let material = Material::new(&mut device, MaterialKind::Surface).unwrap();

        let err = Mesh::new(&mut device, geometry, material).unwrap_err();
        assert_eq!(err, EngineError::MissingAttribute("position".into()));
    }

    #[test]
    fn test_attributes_bind_by_name() {
        let mut device = HeadlessDevice::default();
        let geometry = box_geometry(1.0, 1.0, 1.0).build(&mut device);
        let material = Material::new(&mut device, MaterialKind::Surface).unwrap();
        let mut mesh = Mesh::new(&mut device, geometry, material).unwrap();

        let vertex_array = mesh.vertex_array().unwrap();
        let bindings = device.vertex_array_bindings(vertex_array);
        // The basic program reads position, color and uv; normals are ignored.
        let basic = shaders::basic_program();
        let program = device.vertex_array_program(vertex_array).unwrap();
        assert_eq!(program, mesh.material().program());
        assert_eq!(device.program_label(program), Some(basic.label.as_ref()));
        assert_eq!(bindings.len(), 3);
        for name in [POSITION, COLOR, UV] {
            let location = basic.input(name).unwrap().location;
            assert!(bindings.iter().any(|(l, _, _)| *l == location));
        }
        assert_eq!(mesh.vertex_count(), 36);
        assert_eq!(mesh.topology(), Topology::Triangles);

        mesh.release(&mut device);
        assert_eq!(device.live_resources().total(), 0);
    }

    #[test]
    fn test_shadow_binding_is_created_once() {
        let mut device = HeadlessDevice::default();
        let geometry = box_geometry(1.0, 1.0, 1.0).build(&mut device);
        let material = Material::new(&mut device, MaterialKind::Lambert).unwrap();
        let mut mesh = Mesh::new(&mut device, geometry, material).unwrap();
        let depth = device.create_program(&shaders::depth_program()).unwrap();

        let first = mesh.shadow_vertex_array(&mut device, depth);
        let second = mesh.shadow_vertex_array(&mut device, depth);
        assert_eq!(first, second);
        assert_eq!(device.vertex_array_bindings(first).len(), 1);

        mesh.release(&mut device);
        device.release_program(depth);
        assert_eq!(device.live_resources().total(), 0);
    }
}
