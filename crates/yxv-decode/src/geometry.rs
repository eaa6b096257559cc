//! Mesh decoding for the two geometry encodings.
//!
//! `GEOA` carries whitespace-separated text, `GEOB` carries packed
//! little-endian arrays. Both produce the same in-memory [`Geometry`]: vertex
//! positions, one texture coordinate per vertex and triangle index triples.
//! Texture `v` is flipped (`1 - v`) on load in both encodings.
//!
//! Binary geometry negates X unconditionally and negates Y for every format
//! version other than 0. The Y convention is recorded on the geometry so it
//! can be re-applied if the version becomes known only after decoding.

use glam::{Vec2, Vec3};

use crate::error::{DecodeError, DecodeResult};
use crate::reader::ChunkReader;

/// Which wire encoding a geometry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometrySource {
    /// `GEOA` text encoding.
    Ascii,
    /// `GEOB` binary encoding.
    Binary,
}

/// A decoded triangle mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    /// Vertex positions.
    pub positions: Vec<Vec3>,
    /// Texture coordinates, indexed by vertex index.
    pub tex_coords: Vec<Vec2>,
    /// Triangles as vertex index triples.
    pub triangles: Vec<[u32; 3]>,
    source: GeometrySource,
    y_negated: bool,
}

impl Geometry {
    /// The encoding this geometry was decoded from.
    #[must_use]
    pub fn source(&self) -> GeometrySource {
        self.source
    }

    /// Whether the wire Y coordinate has been negated.
    #[must_use]
    pub fn y_negated(&self) -> bool {
        self.y_negated
    }

    /// Bring binary geometry in line with the given format version.
    ///
    /// Returns `true` if positions changed. Text geometry is never adjusted.
    pub fn apply_version(&mut self, version: i32) -> bool {
        let want = self.source == GeometrySource::Binary && version != 0;
        if self.source != GeometrySource::Binary || want == self.y_negated {
            return false;
        }
        for p in &mut self.positions {
            p.y = -p.y;
        }
        self.y_negated = want;
        true
    }

    /// Texture coordinates expanded to one entry per triangle corner.
    ///
    /// Corners referencing a vertex with no texture coordinate get `(0, 0)`.
    #[must_use]
    pub fn corner_tex_coords(&self) -> Vec<[Vec2; 3]> {
        let uv = |i: u32| {
            self.tex_coords
                .get(i as usize)
                .copied()
                .unwrap_or(Vec2::ZERO)
        };
        self.triangles
            .iter()
            .map(|t| [uv(t[0]), uv(t[1]), uv(t[2])])
            .collect()
    }

    /// Axis-aligned bounds of the positions, or `None` when empty.
    #[must_use]
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p))),
        )
    }

    fn validate(&self, context: &'static str) -> DecodeResult<()> {
        let len = self.positions.len();
        for index in self.triangles.iter().flatten() {
            if *index as usize >= len {
                return Err(DecodeError::InvalidFormat {
                    context,
                    detail: format!("face index {index} out of bounds for {len} vertices"),
                });
            }
        }
        Ok(())
    }
}

fn face_index(value: i32, context: &'static str) -> DecodeResult<u32> {
    u32::try_from(value).map_err(|_| DecodeError::InvalidFormat {
        context,
        detail: format!("negative face index {value}"),
    })
}

/// Decode a `GEOB` payload (everything after the object id).
///
/// # Arguments
///
/// * `payload` - Packed vertex, texture coordinate and triangle arrays
/// * `version` - Format version from the `VERS` chunk, or 0 if none was seen
pub fn decode_binary_geometry(payload: &[u8], version: i32) -> DecodeResult<Geometry> {
    const CONTEXT: &str = "GEOB";
    let mut reader = ChunkReader::new(payload, CONTEXT);

    let num_vert = reader.read_count()?;
    let y_negated = version != 0;
    let positions = reader
        .read_f32s(num_vert * 3)?
        .chunks_exact(3)
        .map(|v| Vec3::new(-v[0], if y_negated { -v[1] } else { v[1] }, v[2]))
        .collect();

    let num_tex_vert = reader.read_count()?;
    let tex_coords = reader
        .read_f32s(num_tex_vert * 2)?
        .chunks_exact(2)
        .map(|t| Vec2::new(t[0], 1.0 - t[1]))
        .collect();

    let num_tris = reader.read_count()?;
    let triangles = reader
        .read_i32s(num_tris * 3)?
        .chunks_exact(3)
        .map(|t| {
            Ok([
                face_index(t[0], CONTEXT)?,
                face_index(t[1], CONTEXT)?,
                face_index(t[2], CONTEXT)?,
            ])
        })
        .collect::<DecodeResult<_>>()?;

    let geometry = Geometry {
        positions,
        tex_coords,
        triangles,
        source: GeometrySource::Binary,
        y_negated,
    };
    geometry.validate(CONTEXT)?;
    Ok(geometry)
}

// Counts in text geometry are untrusted until the tokens are actually read.
const MAX_PREALLOC: usize = 1 << 16;

struct Tokens<'a> {
    inner: std::str::SplitAsciiWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn take(&mut self, what: &str) -> DecodeResult<&'a str> {
        self.inner.next().ok_or_else(|| DecodeError::InvalidFormat {
            context: "GEOA",
            detail: format!("missing {what}"),
        })
    }

    fn parse<T: std::str::FromStr>(&mut self, what: &str) -> DecodeResult<T> {
        let token = self.take(what)?;
        token.parse().map_err(|_| DecodeError::InvalidFormat {
            context: "GEOA",
            detail: format!("bad {what} {token:?}"),
        })
    }
}

/// Decode a `GEOA` payload (everything after the object id).
///
/// The text holds a vertex count and `x y z` lines, a texture coordinate
/// count and `u v` lines, then a face count and 0-based `i j k` lines. Any
/// ASCII whitespace separates tokens, so `\r\n` line endings are accepted.
pub fn decode_ascii_geometry(payload: &[u8]) -> DecodeResult<Geometry> {
    let text = std::str::from_utf8(payload).map_err(|e| DecodeError::InvalidFormat {
        context: "GEOA",
        detail: e.to_string(),
    })?;
    // Payloads may be padded with trailing NULs.
    let text = text.trim_end_matches('\0');
    let mut tokens = Tokens {
        inner: text.split_ascii_whitespace(),
    };

    let num_vert: usize = tokens.parse("vertex count")?;
    let mut positions = Vec::with_capacity(num_vert.min(MAX_PREALLOC));
    for _ in 0..num_vert {
        positions.push(Vec3::new(
            tokens.parse("vertex")?,
            tokens.parse("vertex")?,
            tokens.parse("vertex")?,
        ));
    }

    let num_tex_vert: usize = tokens.parse("texcoord count")?;
    let mut tex_coords = Vec::with_capacity(num_tex_vert.min(MAX_PREALLOC));
    for _ in 0..num_tex_vert {
        let u: f32 = tokens.parse("texcoord")?;
        let v: f32 = tokens.parse("texcoord")?;
        tex_coords.push(Vec2::new(u, 1.0 - v));
    }

    let num_faces: usize = tokens.parse("face count")?;
    let mut triangles = Vec::with_capacity(num_faces.min(MAX_PREALLOC));
    for _ in 0..num_faces {
        triangles.push([
            tokens.parse("face index")?,
            tokens.parse("face index")?,
            tokens.parse("face index")?,
        ]);
    }

    let geometry = Geometry {
        positions,
        tex_coords,
        triangles,
        source: GeometrySource::Ascii,
        y_negated: false,
    };
    geometry.validate("GEOA")?;
    Ok(geometry)
}
