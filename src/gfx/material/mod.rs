//! Material system
//!
//! A [`Material`] pairs a shader program with the render state and uniform
//! values it draws with. Settings are addressed by name (or [`SettingKey`]);
//! each [`MaterialKind`] accepts a fixed subset of them.
//!
//! ```no_run
//! use lumen::gfx::device::HeadlessDevice;
//! use lumen::gfx::material::{LineType, Material, MaterialKind};
//!
//! let mut device = HeadlessDevice::default();
//! let mut lines = Material::new(&mut device, MaterialKind::Line).unwrap();
//! lines.set_setting("line_type", LineType::Segments.into()).unwrap();
//! lines.set_setting("use_vertex_colors", true.into()).unwrap();
//! assert!(lines.set_setting("shininess", 8.0f32.into()).is_err());
//! ```

mod settings;

pub use settings::{LineType, MaterialKind, SettingKey, SettingValue};

use crate::error::{EngineError, Result};
use crate::gfx::device::{
    BlendMode, DrawUniforms, GpuDevice, ProgramHandle, RenderState, TextureHandle, Topology,
    MAX_LIGHTS,
};
use crate::gfx::shaders;

/// Shader program plus draw settings.
#[derive(Debug)]
pub struct Material {
    kind: MaterialKind,
    program: ProgramHandle,
    owns_program: bool,
    texture: Option<TextureHandle>,
    active: bool,

    base_color: [f32; 3],
    use_vertex_colors: bool,
    point_size: f32,
    rounded_points: bool,
    line_width: f32,
    line_type: LineType,
    double_sided: bool,
    wireframe: bool,
    repeat_uv: [f32; 2],
    offset_uv: [f32; 2],
    light_sources: u32,
    use_shadow: bool,
    specular_strength: f32,
    shininess: f32,
}

impl Material {
    /// Compiles the built-in program for `kind`. The material owns it and
    /// frees it in [`release`](Self::release).
    pub fn new(device: &mut dyn GpuDevice, kind: MaterialKind) -> Result<Self> {
        let source = if kind.is_lit() {
            shaders::lit_program()
        } else {
            shaders::basic_program()
        };
        let program = device.create_program(&source)?;
        let mut material = Self::with_program(kind, program);
        material.owns_program = true;
        Ok(material)
    }

    /// Uses an externally compiled program, which the caller keeps owning.
    pub fn with_program(kind: MaterialKind, program: ProgramHandle) -> Self {
        Self {
            kind,
            program,
            owns_program: false,
            texture: None,
            active: false,
            base_color: [1.0, 1.0, 1.0],
            use_vertex_colors: false,
            point_size: 8.0,
            rounded_points: false,
            line_width: 1.0,
            line_type: LineType::Strip,
            double_sided: false,
            wireframe: false,
            repeat_uv: [1.0, 1.0],
            offset_uv: [0.0, 0.0],
            light_sources: if kind.is_lit() { 1 } else { 0 },
            use_shadow: false,
            specular_strength: 1.0,
            shininess: 32.0,
        }
    }

    /// Applies each `(name, value)` in order, stopping at the first failure.
    pub fn with_settings(mut self, settings: &[(&str, SettingValue)]) -> Result<Self> {
        for (name, value) in settings {
            self.set_setting(name, *value)?;
        }
        Ok(self)
    }

    pub fn kind(&self) -> MaterialKind {
        self.kind
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Sets a setting by name. Unknown names, or names outside this kind's
    /// table, fail with `UnknownSetting`.
    pub fn set_setting(&mut self, name: &str, value: SettingValue) -> Result<()> {
        let key = name
            .parse::<SettingKey>()
            .map_err(|_| self.unknown(name))?;
        self.set(key, value)
    }

    pub fn set(&mut self, key: SettingKey, value: SettingValue) -> Result<()> {
        if !self.kind.accepts(key) {
            return Err(self.unknown(key.name()));
        }
        match (key, value) {
            (SettingKey::BaseColor, SettingValue::Color(c)) => self.base_color = c,
            (SettingKey::UseVertexColors, SettingValue::Bool(b)) => self.use_vertex_colors = b,
            (SettingKey::PointSize, SettingValue::Float(v)) => {
                self.point_size = positive(key, v)?;
            }
            (SettingKey::RoundedPoints, SettingValue::Bool(b)) => self.rounded_points = b,
            (SettingKey::LineWidth, SettingValue::Float(v)) => {
                self.line_width = positive(key, v)?;
            }
            (SettingKey::LineType, SettingValue::LineType(t)) => self.line_type = t,
            (SettingKey::DoubleSided, SettingValue::Bool(b)) => self.double_sided = b,
            (SettingKey::Wireframe, SettingValue::Bool(b)) => self.wireframe = b,
            (SettingKey::RepeatUv, SettingValue::Vec2(v)) => self.repeat_uv = v,
            (SettingKey::OffsetUv, SettingValue::Vec2(v)) => self.offset_uv = v,
            (SettingKey::NumberOfLightSources, SettingValue::Int(n)) => {
                if n as usize > MAX_LIGHTS {
                    return Err(invalid(key, format!("at most {MAX_LIGHTS} lights, got {n}")));
                }
                self.light_sources = n;
            }
            (SettingKey::UseShadow, SettingValue::Bool(b)) => self.use_shadow = b,
            (SettingKey::SpecularStrength, SettingValue::Float(v)) => {
                if !(v >= 0.0 && v.is_finite()) {
                    return Err(invalid(key, format!("must be non-negative, got {v}")));
                }
                self.specular_strength = v;
            }
            (SettingKey::Shininess, SettingValue::Float(v)) => {
                self.shininess = positive(key, v)?;
            }
            (key, value) => {
                return Err(invalid(
                    key,
                    format!("{} is not {}", value.describe(), expected_type(key)),
                ));
            }
        }
        Ok(())
    }

    /// Current value of `key`, or `None` when this kind has no such setting.
    pub fn setting(&self, key: SettingKey) -> Option<SettingValue> {
        if !self.kind.accepts(key) {
            return None;
        }
        Some(match key {
            SettingKey::BaseColor => self.base_color.into(),
            SettingKey::UseVertexColors => self.use_vertex_colors.into(),
            SettingKey::PointSize => self.point_size.into(),
            SettingKey::RoundedPoints => self.rounded_points.into(),
            SettingKey::LineWidth => self.line_width.into(),
            SettingKey::LineType => self.line_type.into(),
            SettingKey::DoubleSided => self.double_sided.into(),
            SettingKey::Wireframe => self.wireframe.into(),
            SettingKey::RepeatUv => self.repeat_uv.into(),
            SettingKey::OffsetUv => self.offset_uv.into(),
            SettingKey::NumberOfLightSources => self.light_sources.into(),
            SettingKey::UseShadow => self.use_shadow.into(),
            SettingKey::SpecularStrength => self.specular_strength.into(),
            SettingKey::Shininess => self.shininess.into(),
        })
    }

    fn unknown(&self, key: &str) -> EngineError {
        EngineError::UnknownSetting {
            material: self.kind.name().to_string(),
            key: key.to_string(),
        }
    }

    /// Texture sampled by texture, lambert and phong materials.
    pub fn set_texture(&mut self, texture: Option<TextureHandle>) -> Result<()> {
        if !self.kind.samples_texture() {
            return Err(self.unknown("texture"));
        }
        self.texture = texture;
        Ok(())
    }

    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    /// Points for point materials, the chosen line family for line
    /// materials, triangles otherwise.
    pub fn topology(&self) -> Topology {
        match self.kind {
            MaterialKind::Point => Topology::Points,
            MaterialKind::Line => match self.line_type {
                LineType::Strip => Topology::LineStrip,
                LineType::Loop => Topology::LineLoop,
                LineType::Segments => Topology::Lines,
            },
            _ => Topology::Triangles,
        }
    }

    /// Lights this material consumes; zero for unlit kinds.
    pub fn light_source_count(&self) -> usize {
        if self.kind.is_lit() {
            self.light_sources as usize
        } else {
            0
        }
    }

    pub fn uses_shadow(&self) -> bool {
        self.kind.is_lit() && self.use_shadow
    }

    pub fn render_state(&self) -> RenderState {
        RenderState {
            topology: self.topology(),
            line_width: self.line_width,
            point_size: self.point_size,
            double_sided: self.double_sided,
            wireframe: self.wireframe,
            blend: BlendMode::Alpha,
            depth_test: true,
            depth_write: true,
        }
    }

    /// Binds the program and pushes this material's render state. Pair with
    /// [`deactivate`](Self::deactivate).
    pub fn activate(&mut self, device: &mut dyn GpuDevice) {
        if self.active {
            log::warn!("{} material activated twice without deactivation", self.kind);
        }
        device.use_program(Some(self.program));
        device.set_render_state(&self.render_state());
        device.bind_texture(if self.kind.samples_texture() {
            self.texture
        } else {
            None
        });
        self.active = true;
    }

    pub fn deactivate(&mut self, device: &mut dyn GpuDevice) {
        device.bind_texture(None);
        device.use_program(None);
        self.active = false;
    }

    /// Writes color, shading and UV parameters. Lights, matrices and the
    /// light count are filled in by the renderer.
    pub fn apply_uniforms(&self, uniforms: &mut DrawUniforms) {
        let [r, g, b] = self.base_color;
        uniforms.base_color = [r, g, b, 1.0];
        let shading_model = match self.kind {
            MaterialKind::Lambert => 1.0,
            MaterialKind::Phong => 2.0,
            _ => 0.0,
        };
        uniforms.material = [
            self.specular_strength,
            self.shininess,
            self.point_size,
            shading_model,
        ];
        let use_texture = self.kind.samples_texture() && self.texture.is_some();
        uniforms.flags[0] = u32::from(self.use_vertex_colors && self.kind.accepts(SettingKey::UseVertexColors));
        uniforms.flags[1] = u32::from(use_texture);
        uniforms.flags[2] = u32::from(self.uses_shadow());
        uniforms.uv_transform = [
            self.repeat_uv[0],
            self.repeat_uv[1],
            self.offset_uv[0],
            self.offset_uv[1],
        ];
    }

    /// Frees the program if this material compiled it.
    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        if self.owns_program {
            device.release_program(self.program);
            self.owns_program = false;
        }
    }
}

fn positive(key: SettingKey, v: f32) -> Result<f32> {
    if v > 0.0 && v.is_finite() {
        Ok(v)
    } else {
        Err(invalid(key, format!("must be positive, got {v}")))
    }
}

fn invalid(key: SettingKey, reason: String) -> EngineError {
    EngineError::InvalidSettingValue {
        key: key.name().to_string(),
        reason,
    }
}

fn expected_type(key: SettingKey) -> &'static str {
    match key {
        SettingKey::BaseColor => "a color",
        SettingKey::PointSize
        | SettingKey::LineWidth
        | SettingKey::SpecularStrength
        | SettingKey::Shininess => "a float",
        SettingKey::LineType => "a line type",
        SettingKey::RepeatUv | SettingKey::OffsetUv => "a vec2",
        SettingKey::NumberOfLightSources => "an integer",
        SettingKey::UseVertexColors
        | SettingKey::RoundedPoints
        | SettingKey::DoubleSided
        | SettingKey::Wireframe
        | SettingKey::UseShadow => "a bool",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::device::HeadlessDevice;

    #[test]
    fn test_unknown_setting_is_rejected() {
        let mut device = HeadlessDevice::default();
        let mut surface = Material::new(&mut device, MaterialKind::Surface).unwrap();

        let err = surface.set_setting("shininess", 4.0f32.into()).unwrap_err();
        assert_eq!(
            err,
            EngineError::UnknownSetting {
                material: "surface".into(),
                key: "shininess".into()
            }
        );
        assert!(surface.set_setting("glossiness", 4.0f32.into()).is_err());
        assert!(surface.set_setting("double_sided", true.into()).is_ok());
        surface.release(&mut device);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut device = HeadlessDevice::default();
        let mut phong = Material::new(&mut device, MaterialKind::Phong).unwrap();

        for (name, value) in [
            ("number_of_light_sources", SettingValue::Int(MAX_LIGHTS as u32 + 1)),
            ("shininess", SettingValue::Float(0.0)),
            ("line_width", SettingValue::Float(-1.0)),
            ("use_shadow", SettingValue::Float(1.0)),
        ] {
            let err = phong.set_setting(name, value).unwrap_err();
            assert!(
                matches!(err, EngineError::InvalidSettingValue { ref key, .. } if key == name),
                "{name}: {err:?}"
            );
        }
        assert_eq!(phong.light_source_count(), 1);
        phong.release(&mut device);
    }

    #[test]
    fn test_line_type_selects_topology() {
        let mut device = HeadlessDevice::default();
        let mut line = Material::new(&mut device, MaterialKind::Line).unwrap();
        assert_eq!(line.topology(), Topology::LineStrip);
        line.set(SettingKey::LineType, LineType::Loop.into()).unwrap();
        assert_eq!(line.topology(), Topology::LineLoop);
        line.set(SettingKey::LineType, LineType::Segments.into()).unwrap();
        assert_eq!(line.render_state().topology, Topology::Lines);
        line.release(&mut device);
    }

    #[test]
    fn test_activate_pushes_state_and_deactivate_unbinds() {
        let mut device = HeadlessDevice::default();
        let mut material = Material::new(&mut device, MaterialKind::Surface)
            .unwrap()
            .with_settings(&[("wireframe", true.into()), ("double_sided", true.into())])
            .unwrap();

        material.activate(&mut device);
        assert!(material.is_active());
        material.deactivate(&mut device);
        assert!(!material.is_active());

        let state = material.render_state();
        assert!(state.wireframe && state.double_sided);
        assert_eq!(state.topology, Topology::Triangles);
        material.release(&mut device);
        assert_eq!(device.live_resources().programs, 0);
    }

    #[test]
    fn test_lit_uniforms() {
        let mut device = HeadlessDevice::default();
        let mut phong = Material::new(&mut device, MaterialKind::Phong)
            .unwrap()
            .with_settings(&[
                ("base_color", [0.5f32, 0.25, 1.0].into()),
                ("use_shadow", true.into()),
                ("shininess", 8.0f32.into()),
                ("repeat_uv", [2.0f32, 3.0].into()),
            ])
            .unwrap();

        let mut uniforms = DrawUniforms::default();
        phong.apply_uniforms(&mut uniforms);
        assert_eq!(uniforms.base_color, [0.5, 0.25, 1.0, 1.0]);
        assert_eq!(uniforms.material, [1.0, 8.0, 8.0, 2.0]);
        assert_eq!(uniforms.flags[..3], [0, 0, 1]);
        assert_eq!(uniforms.uv_transform, [2.0, 3.0, 0.0, 0.0]);
        phong.release(&mut device);
    }

    #[test]
    fn test_external_program_is_not_released() {
        let mut device = HeadlessDevice::default();
        let program = device.create_program(&shaders::basic_program()).unwrap();
        let mut material = Material::with_program(MaterialKind::Point, program);
        material.release(&mut device);
        assert_eq!(device.live_resources().programs, 1);
    }
}
