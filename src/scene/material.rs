use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::renderer::backend::{GpuBackend, ShaderSource};
use crate::scene::parameters::{Parameter, ParameterNamespace};

/// Uniform on the `MAIN_PASS` variant that marks a material as transparent.
pub const TRANSPARENCY_UNIFORM: &str = "Settings.Transparency";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    Mesh,
    Screen,
    Light,
}

impl MaterialKind {
    /// Resolves the kind from a `name.mesh.wgsl`, `name.screen.wgsl` or
    /// `name.light.wgsl` style file name.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .and_then(|stem| Path::new(stem).extension())
            .and_then(|ext| ext.to_str());

        match stem {
            Some("mesh") => Ok(MaterialKind::Mesh),
            Some("screen") => Ok(MaterialKind::Screen),
            Some("light") => Ok(MaterialKind::Light),
            _ => Err(PipelineError::UnknownMaterialType(
                path.display().to_string(),
            )),
        }
    }

    pub fn passes(self) -> &'static [PassName] {
        match self {
            MaterialKind::Mesh => &[PassName::PrePass, PassName::MainPass, PassName::ShadowPass],
            MaterialKind::Screen | MaterialKind::Light => &[PassName::Shader],
        }
    }

    pub fn define(self) -> &'static str {
        match self {
            MaterialKind::Mesh => "IS_MESH_SHADER",
            MaterialKind::Screen => "IS_SCREEN_SHADER",
            MaterialKind::Light => "IS_LIGHT_SHADER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PassName {
    PrePass,
    MainPass,
    ShadowPass,
    /// The single variant of screen and light materials.
    Shader,
}

impl PassName {
    pub fn as_str(self) -> &'static str {
        match self {
            PassName::PrePass => "PRE_PASS",
            PassName::MainPass => "MAIN_PASS",
            PassName::ShadowPass => "SHADOW_PASS",
            PassName::Shader => "SHADER",
        }
    }
}

impl fmt::Display for PassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled variant plus the uniform values the material sets on it.
pub struct CompiledShader<B: GpuBackend> {
    pub handle: B::Shader,
    pub uniforms: ParameterNamespace,
}

impl<B: GpuBackend> CompiledShader<B> {
    pub fn new(handle: B::Shader) -> Self {
        Self {
            handle,
            uniforms: ParameterNamespace::new(),
        }
    }
}

pub struct MaterialShaders<B: GpuBackend> {
    variants: BTreeMap<PassName, CompiledShader<B>>,
}

impl<B: GpuBackend> Default for MaterialShaders<B> {
    fn default() -> Self {
        Self {
            variants: BTreeMap::new(),
        }
    }
}

impl<B: GpuBackend> MaterialShaders<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pass: PassName, handle: B::Shader) {
        self.variants.insert(pass, CompiledShader::new(handle));
    }

    pub fn get(&self, pass: PassName) -> Option<&CompiledShader<B>> {
        self.variants.get(&pass)
    }

    pub fn handle(&self, pass: PassName) -> Option<&B::Shader> {
        self.variants.get(&pass).map(|variant| &variant.handle)
    }

    pub fn contains(&self, pass: PassName) -> bool {
        self.variants.contains_key(&pass)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Sets a uniform on one variant. Returns `false` when the variant does
    /// not exist.
    pub fn set_uniform(&mut self, pass: PassName, name: &str, value: Parameter) -> bool {
        match self.variants.get_mut(&pass) {
            Some(variant) => {
                variant.uniforms.set(name, value);
                true
            }
            None => false,
        }
    }
}

/// Compiles every variant `kind` requires from one source.
pub fn compile_material<B: GpuBackend>(
    gpu: &mut B,
    kind: MaterialKind,
    source: &ShaderSource,
) -> Result<MaterialShaders<B>> {
    let mut shaders = MaterialShaders::new();
    for &pass in kind.passes() {
        let defines: Vec<&str> = match pass {
            PassName::Shader => vec![kind.define()],
            _ => vec![kind.define(), pass.as_str()],
        };
        let handle = gpu.compile_shader(source, &defines)?;
        shaders.insert(pass, handle);
    }
    log::debug!(
        "Compiled {:?} material `{}` ({} variants)",
        kind,
        source.label,
        shaders.len()
    );
    Ok(shaders)
}

pub struct Material<B: GpuBackend> {
    pub name: String,
    pub kind: MaterialKind,
    pub shader: Option<MaterialShaders<B>>,
}

impl<B: GpuBackend> Material<B> {
    pub fn new(name: impl Into<String>, kind: MaterialKind, shader: MaterialShaders<B>) -> Self {
        Self {
            name: name.into(),
            kind,
            shader: Some(shader),
        }
    }

    /// A material whose shader failed to load or was never assigned.
    pub fn without_shader(name: impl Into<String>, kind: MaterialKind) -> Self {
        Self {
            name: name.into(),
            kind,
            shader: None,
        }
    }

    pub fn compile(
        gpu: &mut B,
        name: impl Into<String>,
        kind: MaterialKind,
        source: &ShaderSource,
    ) -> Result<Self> {
        let shader = compile_material(gpu, kind, source)?;
        Ok(Self::new(name, kind, shader))
    }

    /// Reads and compiles a material file. The kind comes from the file's
    /// double extension and the name from what precedes it.
    pub fn load(gpu: &mut B, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let kind = MaterialKind::from_path(path)?;
        let code = std::fs::read_to_string(path)?;
        let label = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("material")
            .to_owned();
        let name = label.split('.').next().unwrap_or("material").to_owned();

        log::info!("Loading {:?} material {:?}", kind, path);
        Self::compile(gpu, name, kind, &ShaderSource::new(label, code))
    }

    pub fn variant(&self, pass: PassName) -> Option<&B::Shader> {
        self.shader.as_ref().and_then(|shader| shader.handle(pass))
    }

    pub fn require_variant(&self, pass: PassName) -> Result<&B::Shader> {
        self.variant(pass)
            .ok_or_else(|| PipelineError::MissingShaderVariant {
                material: self.name.clone(),
                pass,
            })
    }

    pub fn is_transparent(&self) -> bool {
        self.shader
            .as_ref()
            .and_then(|shader| shader.get(PassName::MainPass))
            .and_then(|main| main.uniforms.get(TRANSPARENCY_UNIFORM))
            .is_some_and(Parameter::as_bool)
    }

    pub fn set_transparency(&mut self, transparent: bool) -> bool {
        match self.shader.as_mut() {
            Some(shader) => shader.set_uniform(
                PassName::MainPass,
                TRANSPARENCY_UNIFORM,
                Parameter::Bool(transparent),
            ),
            None => false,
        }
    }
}
