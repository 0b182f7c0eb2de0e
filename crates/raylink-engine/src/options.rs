//! Render configuration document.
//!
//! Produced once before the first frame and handed to the module as a serialized JSON string; the
//! module reads it through the `render_options_*` imports. The host never mutates it afterwards.
//! When `do_objects_spin` is set the module animates the scene on its own between frames.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("failed to read render options {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed render options: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid render options: {0}")]
    Invalid(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

pub type Colour = [f32; 3];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub camera: Vec3,
    pub rotation: Vec3,
    pub fov: f64,
    pub width: u32,
    pub height: u32,
    pub scene: Scene,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub lights: Vec<Light>,
    pub background_colour: Colour,
    pub ambient_light: Colour,
    pub reflection_limit: u32,
    pub do_objects_spin: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    pub material: Material,
    pub geometry: Geometry,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub colour: Colour,
    pub specular: f64,
    pub metallic: f64,
}

/// Externally tagged: `{"Sphere": {...}}` / `{"Plane": {...}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Sphere { center: Vec3, radius: f64 },
    Plane { center: Vec3, normal: Vec3, size: f64 },
}

/// Externally tagged: `{"Direction": {...}}` / `{"Point": {...}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Light {
    Direction { intensity: Colour, direction: Vec3 },
    Point { intensity: Colour, position: Vec3 },
}

impl RenderOptions {
    pub fn from_json(raw: &str) -> Result<Self, OptionsError> {
        let options: Self = serde_json::from_str(raw)?;
        options.validate()?;
        Ok(options)
    }

    pub fn load(path: &Path) -> Result<Self, OptionsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| OptionsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn to_json(&self) -> Result<String, OptionsError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.width == 0 || self.height == 0 {
            return Err(OptionsError::Invalid(format!(
                "output size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !(self.fov > 0.0 && self.fov < 180.0) {
            return Err(OptionsError::Invalid(format!(
                "fov must be within (0, 180) degrees, got {}",
                self.fov
            )));
        }
        if !self.camera.is_finite() || !self.rotation.is_finite() {
            return Err(OptionsError::Invalid("camera pose must be finite".into()));
        }

        for object in &self.scene.objects {
            let ok = match &object.geometry {
                Geometry::Sphere { center, radius } => center.is_finite() && *radius >= 0.0,
                Geometry::Plane {
                    center,
                    normal,
                    size,
                } => center.is_finite() && normal.is_finite() && *size >= 0.0,
            };
            if !ok {
                return Err(OptionsError::Invalid(format!(
                    "object `{}` has non-finite or negative geometry",
                    object.name
                )));
            }
        }
        for light in &self.scene.lights {
            let v = match light {
                Light::Direction { direction, .. } => direction,
                Light::Point { position, .. } => position,
            };
            if !v.is_finite() {
                return Err(OptionsError::Invalid("light vectors must be finite".into()));
            }
        }
        Ok(())
    }

    /// Demo scene: three spheres over a plane, lit by a directional and a point light.
    pub fn demo(width: u32, height: u32) -> Self {
        let sphere = |colour: Colour, specular, metallic, center| SceneObject {
            name: "sphere".into(),
            material: Material {
                colour,
                specular,
                metallic,
            },
            geometry: Geometry::Sphere {
                center,
                radius: 1.0,
            },
        };

        Self {
            camera: Vec3::new(5.0, 5.0, 5.0),
            rotation: Vec3::new(0.7, -std::f64::consts::FRAC_PI_4, 0.0),
            fov: 70.0,
            width,
            height,
            scene: Scene {
                objects: vec![
                    sphere([1.0, 0.521_205_4, 0.0], 5.0, 1.0, Vec3::new(1.5, 0.0, 0.0)),
                    sphere([1.0, 0.348_660_7, 0.0], 800.0, 0.2, Vec3::new(3.1, 0.0, 2.1)),
                    sphere([0.0, 0.644_530_8, 1.0], 80.0, 0.0, Vec3::new(-8.3, 0.0, 0.0)),
                    SceneObject {
                        name: "plane".into(),
                        material: Material {
                            colour: [0.8, 0.8, 1.0],
                            specular: 50.0,
                            metallic: 0.2,
                        },
                        geometry: Geometry::Plane {
                            center: Vec3::new(0.0, -1.5, 0.0),
                            normal: Vec3::new(0.0, 1.0, 0.0),
                            size: 5.0,
                        },
                    },
                ],
                lights: vec![
                    Light::Direction {
                        intensity: [0.4, 0.4, 0.4],
                        direction: Vec3::new(
                            -0.534_522_483_824_848_8,
                            -0.801_783_725_737_273_2,
                            -0.267_261_241_912_424_4,
                        ),
                    },
                    Light::Point {
                        intensity: [0.4, 0.4, 0.4],
                        position: Vec3::new(0.0, 2.0, 0.0),
                    },
                ],
                background_colour: [0.5, 0.8, 1.0],
                ambient_light: [0.2, 0.2, 0.2],
                reflection_limit: 4,
                do_objects_spin: false,
            },
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::demo(400, 300)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "camera": { "x": 5.0, "y": 5.0, "z": 5.0 },
        "rotation": { "x": 0.7, "y": -0.785, "z": 0.0 },
        "fov": 70.0,
        "width": 400,
        "height": 300,
        "scene": {
            "objects": [
                {
                    "name": "sphere",
                    "material": { "colour": [1.0, 0.5, 0.0], "specular": 5.0, "metallic": 1.0 },
                    "geometry": { "Sphere": { "center": { "x": 1.5, "y": 0.0, "z": 0.0 }, "radius": 1.0 } }
                },
                {
                    "name": "plane",
                    "material": { "colour": [0.8, 0.8, 1.0], "specular": 50.0, "metallic": 0.2 },
                    "geometry": { "Plane": {
                        "center": { "x": 0.0, "y": -1.5, "z": 0.0 },
                        "normal": { "x": 0.0, "y": 1.0, "z": 0.0 },
                        "size": 5.0
                    } }
                }
            ],
            "lights": [
                { "Direction": { "intensity": [0.4, 0.4, 0.4], "direction": { "x": -0.5, "y": -0.8, "z": -0.3 } } },
                { "Point": { "intensity": [0.4, 0.4, 0.4], "position": { "x": 0.0, "y": 2.0, "z": 0.0 } } }
            ],
            "background_colour": [0.5, 0.8, 1.0],
            "ambient_light": [0.2, 0.2, 0.2],
            "reflection_limit": 4,
            "do_objects_spin": false
        }
    }"#;

    #[test]
    fn parses_tagged_geometry_and_lights() {
        let options = RenderOptions::from_json(DOCUMENT).unwrap();
        assert_eq!(options.width, 400);
        assert_eq!(options.scene.objects.len(), 2);
        assert!(matches!(
            options.scene.objects[0].geometry,
            Geometry::Sphere { radius, .. } if radius == 1.0
        ));
        assert!(matches!(
            options.scene.objects[1].geometry,
            Geometry::Plane { size, .. } if size == 5.0
        ));
        assert!(matches!(options.scene.lights[0], Light::Direction { .. }));
        assert!(matches!(options.scene.lights[1], Light::Point { .. }));
    }

    #[test]
    fn serialized_form_keeps_external_tags() {
        let json = RenderOptions::demo(10, 10).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["scene"]["objects"][0]["geometry"]["Sphere"].is_object());
        assert!(value["scene"]["objects"][3]["geometry"]["Plane"].is_object());
        assert!(value["scene"]["lights"][0]["Direction"].is_object());
        assert!(value["scene"]["lights"][1]["Point"].is_object());
    }

    #[test]
    fn demo_scene_is_valid() {
        RenderOptions::default().validate().unwrap();
    }

    #[test]
    fn rejects_zero_sized_output() {
        let mut options = RenderOptions::demo(400, 300);
        options.height = 0;
        assert!(matches!(options.validate(), Err(OptionsError::Invalid(_))));
    }

    #[test]
    fn rejects_out_of_range_fov() {
        let mut options = RenderOptions::demo(400, 300);
        options.fov = 180.0;
        assert!(matches!(options.validate(), Err(OptionsError::Invalid(_))));
    }

    #[test]
    fn rejects_negative_radius() {
        let mut options = RenderOptions::demo(400, 300);
        options.scene.objects[0].geometry = Geometry::Sphere {
            center: Vec3::new(0.0, 0.0, 0.0),
            radius: -1.0,
        };
        assert!(matches!(options.validate(), Err(OptionsError::Invalid(_))));
    }

    #[test]
    fn rejects_unknown_geometry_tag() {
        let raw = DOCUMENT.replace("\"Sphere\"", "\"Cube\"");
        assert!(matches!(
            RenderOptions::from_json(&raw),
            Err(OptionsError::Parse(_))
        ));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, DOCUMENT).unwrap();
        assert_eq!(RenderOptions::load(&path).unwrap().height, 300);

        assert!(matches!(
            RenderOptions::load(&dir.path().join("missing.json")),
            Err(OptionsError::Read { .. })
        ));
    }
}
