//! Material kinds and the setting keys each one accepts

use std::fmt;
use std::str::FromStr;

/// Closed set of material families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    Point,
    Line,
    Surface,
    Texture,
    Lambert,
    Phong,
}

impl MaterialKind {
    pub fn name(self) -> &'static str {
        match self {
            MaterialKind::Point => "point",
            MaterialKind::Line => "line",
            MaterialKind::Surface => "surface",
            MaterialKind::Texture => "texture",
            MaterialKind::Lambert => "lambert",
            MaterialKind::Phong => "phong",
        }
    }

    /// Lambert and Phong receive lights and shadows.
    pub fn is_lit(self) -> bool {
        matches!(self, MaterialKind::Lambert | MaterialKind::Phong)
    }

    pub fn samples_texture(self) -> bool {
        matches!(
            self,
            MaterialKind::Texture | MaterialKind::Lambert | MaterialKind::Phong
        )
    }

    /// Whether `key` belongs to this kind's setting table.
    pub fn accepts(self, key: SettingKey) -> bool {
        use MaterialKind as K;
        match key {
            SettingKey::BaseColor => true,
            SettingKey::UseVertexColors => matches!(self, K::Point | K::Line | K::Surface),
            SettingKey::PointSize | SettingKey::RoundedPoints => self == K::Point,
            SettingKey::LineWidth => matches!(self, K::Line | K::Surface | K::Lambert | K::Phong),
            SettingKey::LineType => self == K::Line,
            SettingKey::DoubleSided | SettingKey::Wireframe => {
                matches!(self, K::Surface | K::Texture | K::Lambert | K::Phong)
            }
            SettingKey::RepeatUv | SettingKey::OffsetUv => self.samples_texture(),
            SettingKey::NumberOfLightSources | SettingKey::UseShadow => self.is_lit(),
            SettingKey::SpecularStrength | SettingKey::Shininess => self == K::Phong,
        }
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    BaseColor,
    UseVertexColors,
    PointSize,
    RoundedPoints,
    LineWidth,
    LineType,
    DoubleSided,
    Wireframe,
    RepeatUv,
    OffsetUv,
    NumberOfLightSources,
    UseShadow,
    SpecularStrength,
    Shininess,
}

impl SettingKey {
    pub const ALL: [SettingKey; 14] = [
        SettingKey::BaseColor,
        SettingKey::UseVertexColors,
        SettingKey::PointSize,
        SettingKey::RoundedPoints,
        SettingKey::LineWidth,
        SettingKey::LineType,
        SettingKey::DoubleSided,
        SettingKey::Wireframe,
        SettingKey::RepeatUv,
        SettingKey::OffsetUv,
        SettingKey::NumberOfLightSources,
        SettingKey::UseShadow,
        SettingKey::SpecularStrength,
        SettingKey::Shininess,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SettingKey::BaseColor => "base_color",
            SettingKey::UseVertexColors => "use_vertex_colors",
            SettingKey::PointSize => "point_size",
            SettingKey::RoundedPoints => "rounded_points",
            SettingKey::LineWidth => "line_width",
            SettingKey::LineType => "line_type",
            SettingKey::DoubleSided => "double_sided",
            SettingKey::Wireframe => "wireframe",
            SettingKey::RepeatUv => "repeat_uv",
            SettingKey::OffsetUv => "offset_uv",
            SettingKey::NumberOfLightSources => "number_of_light_sources",
            SettingKey::UseShadow => "use_shadow",
            SettingKey::SpecularStrength => "specular_strength",
            SettingKey::Shininess => "shininess",
        }
    }
}

impl FromStr for SettingKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingKey::ALL
            .into_iter()
            .find(|key| key.name() == s)
            .ok_or(())
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a line material connects its vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineType {
    /// Each vertex joins the next.
    #[default]
    Strip,
    /// Like `Strip`, closed back to the first vertex.
    Loop,
    /// Vertex pairs form separate segments.
    Segments,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Float(f32),
    Int(u32),
    Color([f32; 3]),
    Vec2([f32; 2]),
    LineType(LineType),
}

impl SettingValue {
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            SettingValue::Bool(_) => "a bool",
            SettingValue::Float(_) => "a float",
            SettingValue::Int(_) => "an integer",
            SettingValue::Color(_) => "a color",
            SettingValue::Vec2(_) => "a vec2",
            SettingValue::LineType(_) => "a line type",
        }
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        SettingValue::Bool(v)
    }
}

impl From<f32> for SettingValue {
    fn from(v: f32) -> Self {
        SettingValue::Float(v)
    }
}

impl From<u32> for SettingValue {
    fn from(v: u32) -> Self {
        SettingValue::Int(v)
    }
}

impl From<[f32; 3]> for SettingValue {
    fn from(v: [f32; 3]) -> Self {
        SettingValue::Color(v)
    }
}

impl From<[f32; 2]> for SettingValue {
    fn from(v: [f32; 2]) -> Self {
        SettingValue::Vec2(v)
    }
}

impl From<LineType> for SettingValue {
    fn from(v: LineType) -> Self {
        SettingValue::LineType(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names_parse_back() {
        for key in SettingKey::ALL {
            assert_eq!(key.name().parse::<SettingKey>(), Ok(key));
        }
        assert!("lineWidth".parse::<SettingKey>().is_err());
    }

    #[test]
    fn test_setting_tables() {
        assert!(MaterialKind::Line.accepts(SettingKey::LineType));
        assert!(!MaterialKind::Surface.accepts(SettingKey::LineType));
        assert!(!MaterialKind::Lambert.accepts(SettingKey::Shininess));
        assert!(MaterialKind::Phong.accepts(SettingKey::UseShadow));
        assert!(!MaterialKind::Texture.accepts(SettingKey::UseVertexColors));
        for kind in [MaterialKind::Point, MaterialKind::Phong] {
            assert!(kind.accepts(SettingKey::BaseColor));
        }
    }
}
