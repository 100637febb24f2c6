use std::borrow::Cow;

use preview::CompileError;
use wgpu::naga::front::glsl;
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};
use wgpu::naga::ShaderStage;

/// Fragment shown to a new document: a colour-cycling gradient.
pub const DEFAULT_FRAGMENT_SHADER: &str = r"precision mediump float;
uniform float time;
uniform vec2 resolution;

void main() {
  vec2 uv = gl_FragCoord.xy / resolution.xy;

  // Colour shifts with time.
  vec3 color = vec3(0.5) + vec3(0.5) * cos(vec3(time) + uv.xyx + vec3(0.0, 2.0, 4.0));

  gl_FragColor = vec4(color, 1.0);
}
";

/// Full-screen triangle that exposes `vUv` to the fragment stage.
pub const DEFAULT_VERTEX_SHADER: &str = r"#version 450
layout(location = 0) out vec2 vUv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    vUv = pos * 0.5 + vec2(0.5, 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

/// GLSL prologue injected ahead of every user fragment shader.
///
/// The uniform block layout must match `PreviewUniforms` in `gpu/uniforms.rs`.
const HEADER: &str = r"#version 450
layout(location = 0) in vec2 vUv;
layout(location = 0) out vec4 vjmix_outColor;

layout(std140, set = 0, binding = 0) uniform PreviewParams {
    vec2 _resolution;
    float _time;
    float _dim;
    int _frame;
    float _padding0;
    float _padding1;
    float _padding2;
} params;

#define resolution params._resolution
#define time params._time

vec4 vjmix_FragColor;
vec4 vjmix_FragCoord;
#define gl_FragColor vjmix_FragColor
#define gl_FragCoord vjmix_FragCoord
#define main vjmix_user_main
";

/// GLSL epilogue: remaps `gl_FragCoord` to a bottom-left origin, runs the
/// user's `main`, and applies the overlay dimming.
const FOOTER: &str = r"
#undef main
#undef gl_FragCoord
void main() {
    vjmix_FragCoord = vec4(gl_FragCoord.x, resolution.y - gl_FragCoord.y, gl_FragCoord.z, gl_FragCoord.w);
    vjmix_FragColor = vec4(0.0, 0.0, 0.0, 1.0);
    vjmix_user_main();
    vjmix_outColor = vec4(vjmix_FragColor.rgb * params._dim, vjmix_FragColor.a);
}
";

/// Lines the header occupies before `#line 1`, used to map naga spans back to
/// the user's line numbers.
fn header_line_count() -> usize {
    HEADER.lines().count() + 1
}

const INJECTED_UNIFORMS: [&str; 2] = ["time", "resolution"];
const PRECISION_QUALIFIERS: [&str; 3] = ["lowp", "mediump", "highp"];

/// Editor text wrapped into a complete GLSL 450 fragment shader.
#[derive(Debug, Clone)]
pub(crate) struct WrappedFragment {
    pub source: String,
    user_lines: usize,
}

impl WrappedFragment {
    /// Validates the wrapped shader, reporting errors against editor lines.
    pub(crate) fn validate(&self) -> Result<(), CompileError> {
        let lines = LineMap {
            offset: header_line_count(),
            user_lines: Some(self.user_lines),
        };
        validate_module(&self.source, ShaderStage::Fragment, lines)
    }
}

/// Produces a self-contained GLSL 450 fragment shader from editor text.
///
/// Steps performed:
///
/// 1. Strip `#version`, `precision` statements, `varying` declarations, and
///    user declarations of the injected uniforms.
/// 2. Prepend [`HEADER`] which declares the uniform block and macro aliases.
/// 3. Append [`FOOTER`] which calls the user's `main` and writes the output.
pub(crate) fn wrap_fragment(source: &str) -> WrappedFragment {
    let mut sanitized = String::with_capacity(source.len());
    let mut user_lines = 0;
    for line in source.lines() {
        user_lines += 1;
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') {
            if !trimmed.starts_with("#version") {
                sanitized.push_str(line);
            }
        } else {
            for statement in line.split_inclusive(';') {
                sanitized.push_str(&sanitize_statement(statement));
            }
        }
        // Removed statements still leave their line behind.
        sanitized.push('\n');
    }

    WrappedFragment {
        source: format!("{HEADER}#line 1\n{sanitized}{FOOTER}"),
        user_lines,
    }
}

fn sanitize_statement(statement: &str) -> Cow<'_, str> {
    let trimmed = statement.trim_start();
    if trimmed.starts_with("precision ") || trimmed.starts_with("varying ") {
        return Cow::Borrowed("");
    }
    match without_injected_uniforms(statement) {
        Some(rewritten) => Cow::Owned(rewritten),
        None => Cow::Borrowed(statement),
    }
}

/// Rewrites a `uniform [precision] <type> <names>;` statement without the
/// injected names. `None` leaves the statement as written.
fn without_injected_uniforms(statement: &str) -> Option<String> {
    let body = statement.trim().strip_suffix(';')?;
    let rest = body.strip_prefix("uniform")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let (mut ty, mut names) = split_token(rest)?;
    let mut qualifier = None;
    if PRECISION_QUALIFIERS.contains(&ty) {
        qualifier = Some(ty);
        (ty, names) = split_token(names)?;
    }

    let names: Vec<&str> = names.split(',').map(str::trim).collect();
    if names.iter().any(|name| name.is_empty())
        || !names.iter().any(|name| INJECTED_UNIFORMS.contains(name))
    {
        return None;
    }

    let kept: Vec<&str> = names
        .into_iter()
        .filter(|name| !INJECTED_UNIFORMS.contains(name))
        .collect();
    if kept.is_empty() {
        return Some(String::new());
    }
    let indent = &statement[..statement.len() - statement.trim_start().len()];
    let qualifier = qualifier.map(|q| format!("{q} ")).unwrap_or_default();
    Some(format!("{indent}uniform {qualifier}{ty} {};", kept.join(", ")))
}

/// First whitespace-separated token and the text after it.
fn split_token(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    let end = text.find(char::is_whitespace)?;
    Some((&text[..end], text[end..].trim_start()))
}

/// Fragment used when no program has ever bound: a flat warning colour.
pub(crate) fn fallback_fragment(color: [f32; 3]) -> String {
    format!(
        "{HEADER}#undef main\nvoid main() {{\n    vjmix_outColor = vec4(vec3({r:.4}, {g:.4}, {b:.4}) * params._dim, 1.0);\n}}\n",
        r = color[0],
        g = color[1],
        b = color[2],
    )
}

/// Where user text sits inside a validated source.
#[derive(Debug, Clone, Copy)]
struct LineMap {
    offset: usize,
    /// Lines of user text; anything past them is wrapper code.
    user_lines: Option<usize>,
}

impl LineMap {
    fn describe(&self, stage_name: &str, wrapped_line: Option<usize>, message: &str) -> String {
        let Some(line) = wrapped_line else {
            return format!("{stage_name}: {message}");
        };
        let Some(line) = line.checked_sub(self.offset).filter(|&line| line > 0) else {
            return format!("{stage_name}: {message}");
        };
        match self.user_lines {
            Some(user_lines) if line > user_lines => {
                if message.contains("vjmix_user_main") {
                    format!("{stage_name}: missing `void main()`")
                } else {
                    format!("{stage_name}: {message} (in generated wrapper code)")
                }
            }
            _ => format!("{stage_name}:{line}: {message}"),
        }
    }
}

/// Parses and validates standalone GLSL (e.g. the vertex stage) on the CPU
/// so broken text never reaches the GPU.
pub(crate) fn validate_glsl(source: &str, stage: ShaderStage) -> Result<(), CompileError> {
    let lines = LineMap {
        offset: 0,
        user_lines: None,
    };
    validate_module(source, stage, lines)
}

fn validate_module(source: &str, stage: ShaderStage, lines: LineMap) -> Result<(), CompileError> {
    let stage_name = stage_name(stage);

    let mut frontend = glsl::Frontend::default();
    let module = frontend
        .parse(&glsl::Options::from(stage), source)
        .map_err(|errors| {
            let messages: Vec<String> = errors
                .errors
                .iter()
                .map(|error| {
                    let wrapped_line = error
                        .meta
                        .is_defined()
                        .then(|| error.meta.location(source).line_number as usize);
                    lines.describe(stage_name, wrapped_line, &error.kind.to_string())
                })
                .collect();
            CompileError::new(messages.join("\n"))
        })?;

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|err| CompileError::new(format!("{stage_name}: {}", err.as_inner())))?;
    Ok(())
}

pub(crate) fn shader_module(
    device: &wgpu::Device,
    label: &str,
    source: String,
    stage: ShaderStage,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source),
            stage,
            defines: &[],
        },
    })
}

fn stage_name(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => "vertex",
        ShaderStage::Fragment => "fragment",
        _ => "compute",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_strips_injected_declarations() {
        let wrapped = wrap_fragment(DEFAULT_FRAGMENT_SHADER).source;
        assert!(!wrapped.contains("uniform float time"));
        assert!(!wrapped.contains("uniform vec2 resolution"));
        assert!(!wrapped.contains("precision mediump"));
        assert!(wrapped.contains("#define main vjmix_user_main"));
        assert_eq!(wrapped.matches("#version").count(), 1);
    }

    #[test]
    fn keeps_unrelated_uniform_names() {
        let wrapped = wrap_fragment("uniform float runtime_scale;\nvoid main() {}\n").source;
        assert!(wrapped.contains("uniform float runtime_scale;"));
        assert_eq!(without_injected_uniforms("vec2 resolution;"), None);
        assert_eq!(without_injected_uniforms("uniform float timescale;"), None);
    }

    #[test]
    fn wrap_preserves_user_line_count() {
        let source = "#version 300 es\nvoid main() {\n  gl_FragColor = vec4(1.0);\n}\n";
        let wrapped = wrap_fragment(source).source;
        let body = wrapped
            .split("#line 1\n")
            .nth(1)
            .and_then(|rest| rest.split("\n#undef main").next())
            .unwrap();
        assert_eq!(body.lines().count(), source.lines().count());
    }

    #[test]
    fn default_shaders_validate() {
        wrap_fragment(DEFAULT_FRAGMENT_SHADER)
            .validate()
            .expect("default fragment");
        validate_glsl(DEFAULT_VERTEX_SHADER, ShaderStage::Vertex).expect("default vertex");
    }

    #[test]
    fn fallback_shader_validates() {
        validate_glsl(&fallback_fragment([1.0, 0.0, 0.0]), ShaderStage::Fragment)
            .expect("fallback fragment");
    }

    #[test]
    fn syntax_error_is_reported_not_panicked() {
        let err = wrap_fragment("invalid{").validate().unwrap_err();
        assert!(!err.message().is_empty());
        assert!(err.message().starts_with("fragment:"));
    }

    #[test]
    fn undeclared_identifier_is_rejected() {
        let source = "void main() {\n  gl_FragColor = vec4(undefined_thing, 1.0);\n}\n";
        let err = wrap_fragment(source).validate().unwrap_err();
        assert!(err.message().contains("fragment:"));
    }

    #[test]
    fn strips_uniforms_with_precision_qualifiers() {
        let source = "uniform highp float time;\nuniform mediump vec2 resolution;\nvoid main() { gl_FragColor = vec4(time / resolution.x); }\n";
        let wrapped = wrap_fragment(source);
        assert!(!wrapped.source.contains("highp"));
        wrapped.validate().expect("qualified uniforms");
    }

    #[test]
    fn strips_several_uniforms_on_one_line() {
        let source = "precision mediump float;uniform float time;uniform vec2 resolution;\nvoid main() { gl_FragColor = vec4(time / resolution.x); }\n";
        let wrapped = wrap_fragment(source);
        assert!(!wrapped.source.contains("uniform float time"));
        assert!(!wrapped.source.contains("uniform vec2 resolution"));
        wrapped.validate().expect("one-line uniforms");
    }

    #[test]
    fn keeps_other_names_in_a_shared_declaration() {
        assert_eq!(
            without_injected_uniforms("  uniform lowp float time, speed;").as_deref(),
            Some("  uniform lowp float speed;")
        );
        assert_eq!(
            without_injected_uniforms("uniform float time;").as_deref(),
            Some("")
        );
        let line = "void main() { gl_FragColor = vec4(1.0); }";
        let rebuilt: String = line.split_inclusive(';').map(sanitize_statement).collect();
        assert_eq!(rebuilt, line);
    }

    #[test]
    fn empty_source_reports_missing_main() {
        let err = wrap_fragment("").validate().unwrap_err();
        assert!(
            err.message().contains("fragment: missing `void main()`"),
            "{}",
            err.message()
        );
        assert!(!err.message().contains("fragment:7"));
    }

    #[test]
    fn errors_point_at_user_lines() {
        let source = "void main() {\n  float x = 1.0;\n  gl_FragColor = vec4(undefined_thing);\n}\n";
        let err = wrap_fragment(source).validate().unwrap_err();
        assert!(err.message().contains("fragment:3: "), "{}", err.message());
    }

    #[test]
    fn lines_outside_user_text_carry_no_number() {
        let lines = LineMap {
            offset: 10,
            user_lines: Some(2),
        };
        assert_eq!(lines.describe("fragment", None, "bad"), "fragment: bad");
        assert_eq!(lines.describe("fragment", Some(4), "bad"), "fragment: bad");
        assert_eq!(lines.describe("fragment", Some(12), "bad"), "fragment:2: bad");
        assert_eq!(
            lines.describe("fragment", Some(13), "bad"),
            "fragment: bad (in generated wrapper code)"
        );
    }
}
