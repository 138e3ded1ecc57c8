//! Row-vector 4x4 matrices (`v' = v * M`, translation in row 3).
//!
//! Rows upload unchanged as WGSL column vectors, so shaders compute `M * v`.

pub type Mat4 = [[f32; 4]; 4];

pub const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// `a` applied first, then `b`.
pub fn multiply(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [[0.0; 4]; 4];
    for (r, row) in out.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = (0..4).map(|k| a[r][k] * b[k][c]).sum();
        }
    }
    out
}

pub fn translation(x: f32, y: f32, z: f32) -> Mat4 {
    let mut m = IDENTITY;
    m[3] = [x, y, z, 1.0];
    m
}

pub fn scaling(x: f32, y: f32, z: f32) -> Mat4 {
    let mut m = IDENTITY;
    m[0][0] = x;
    m[1][1] = y;
    m[2][2] = z;
    m
}

/// Orthographic projection producing depth in `[0, 1]`.
pub fn ortho(l: f32, r: f32, b: f32, t: f32, zn: f32, zf: f32) -> Mat4 {
    let gl = [
        [2.0 / (r - l), 0.0, 0.0, 0.0],
        [0.0, 2.0 / (t - b), 0.0, 0.0],
        [0.0, 0.0, -2.0 / (zf - zn), 0.0],
        [
            -(r + l) / (r - l),
            -(t + b) / (t - b),
            -(zf + zn) / (zf - zn),
            1.0,
        ],
    ];
    let half_z = multiply(&scaling(1.0, 1.0, 0.5), &translation(0.0, 0.0, 0.5));
    multiply(&gl, &half_z)
}

/// Applies `m` to a point.
pub fn transform_point(m: &Mat4, p: [f32; 3]) -> [f32; 4] {
    let v = [p[0], p[1], p[2], 1.0];
    let mut out = [0.0; 4];
    for (c, o) in out.iter_mut().enumerate() {
        *o = (0..4).map(|k| v[k] * m[k][c]).sum();
    }
    out
}

/// Clears the 2D translation of a texture matrix.
pub fn without_texture_translation(m: &Mat4) -> Mat4 {
    let mut out = *m;
    out[3][0] = 0.0;
    out[3][1] = 0.0;
    out
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
