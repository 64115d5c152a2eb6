/// Uniform block shared by both pipelines; laid out like `GpuMvp`.
macro_rules! mvp_block {
    () => {
        r#"
struct Mvp {
    model: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
};
@group(0) @binding(0) var<uniform> mvp: Mvp;
"#
    };
}

/// WGSL shader for scene meshes: one directional light plus edge highlight.
pub const MESH_SHADER: &str = concat!(
    mvp_block!(),
    r#"
struct MeshIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) barycentric: vec3<f32>,
    @location(3) bone_indices: vec4<i32>,
    @location(4) bone_weights: vec4<f32>,
};

struct MeshOut {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
    @location(1) barycentric: vec3<f32>,
};

@vertex
fn vs_mesh(vertex: MeshIn) -> MeshOut {
    let world_pos = mvp.model * vec4<f32>(vertex.position, 1.0);

    var out: MeshOut;
    out.clip_position = mvp.projection * mvp.view * world_pos;
    out.world_normal = (mvp.model * vec4<f32>(vertex.normal, 0.0)).xyz;
    out.barycentric = vertex.barycentric;
    return out;
}

@fragment
fn fs_mesh(in: MeshOut) -> @location(0) vec4<f32> {
    let light_dir = normalize(vec3<f32>(0.5, 1.0, 0.5));
    let brightness = max(dot(normalize(in.world_normal), light_dir), 0.2);

    // Distance to the nearest edge in barycentric space, widened by the
    // screen-space derivative so lines keep a constant pixel width.
    let d = fwidth(in.barycentric);
    let edge = smoothstep(vec3<f32>(0.0), d * 1.5, in.barycentric);
    let on_edge = 1.0 - min(min(edge.x, edge.y), edge.z);

    let shade = mix(vec3<f32>(brightness), vec3<f32>(0.05), on_edge * 0.8);
    return vec4<f32>(shade, 1.0);
}
"#
);

/// WGSL shader for the reference grid. Lines carry their own color.
pub const GRID_SHADER: &str = concat!(
    mvp_block!(),
    r#"
struct LineIn {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
};

struct LineOut {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_line(line: LineIn) -> LineOut {
    let clip = mvp.projection * mvp.view * mvp.model * vec4<f32>(line.position, 1.0);
    return LineOut(clip, line.color);
}

@fragment
fn fs_line(in: LineOut) -> @location(0) vec4<f32> {
    return in.color;
}
"#
);
