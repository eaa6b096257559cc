//! Incremental parser for the chunked YXV container.
//!
//! The parser is fed a growing buffer. Each call resumes at an internal
//! cursor, dispatches every complete chunk to its registered handler and
//! stops at the first chunk whose payload has not fully arrived. The cursor
//! is the only stream state carried between calls, so feeding the whole file
//! at once and feeding it in arbitrary slices produce the same objects.
//!
//! Handlers are plain functions keyed by [`Tag`]. Unknown tags are skipped
//! using their declared length. Any handler failure is fatal: the parser
//! reports the failing tag and refuses further input.

use std::collections::{BTreeMap, HashMap};

use glam::Vec3;
use yxv_decode::lut::{bytes_to_signed, green_channel_row};
use yxv_decode::{
    CHUNK_HEADER_LEN, ChunkReader, DecodeError, DecodeResult, FILE_HEADER_LEN, FileHeader, Tag,
    decode_ascii_geometry, decode_binary_geometry, decode_jpeg_to_rgba, read_chunk_header,
    read_file_header, split_jpeg_segments,
};

use crate::atlas::{DEFAULT_MAX_TEXTURE_SIZE, IMAGES_PER_GROUP, group_count};
use crate::error::{Error, Result};
use crate::object::PcaObject;
use crate::types::{BasisDesc, ImageBlob, LutDesc, LutRange, StaticTexture};

/// Upper bound on the basis images a single channel may declare.
pub const MAX_BASIS_PER_CHANNEL: usize = 4096;

/// Upper bound on the samples in one LUT row.
pub const MAX_LUT_SAMPLES: usize = 1 << 16;

/// Upper bound on the width and height of a basis image.
pub const MAX_BASIS_DIMENSION: u32 = DEFAULT_MAX_TEXTURE_SIZE;

/// Upper bound on the atlas bytes one object's basis images may need.
pub const MAX_OBJECT_ATLAS_BYTES: usize = 1 << 28;

/// Upper bound on the LUT samples one object may hold, over all channels
/// and rows.
pub const MAX_OBJECT_LUT_SAMPLES: usize = 1 << 24;

/// Outcome of a successful [`ContainerParser::parse`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// A header or chunk is incomplete; call again with more bytes.
    NeedMoreData,
    /// Every byte supplied so far has been consumed.
    Done,
}

/// A state change produced by a chunk handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkEvent {
    ObjectCreated(u32),
    Version(i32),
    LutRange(u32),
    Lut { id: u32, channel: usize },
    StaticTexture(u32),
    Basis { id: u32, channel: usize },
    Transform(u32),
    Geometry(u32),
}

/// A chunk handler. Receives the parser and the chunk payload.
pub type Handler = fn(&mut ContainerParser, Tag, &[u8]) -> Result<()>;

trait InChunk<T> {
    fn in_chunk(self, tag: Tag) -> Result<T>;
}

impl<T> InChunk<T> for DecodeResult<T> {
    fn in_chunk(self, tag: Tag) -> Result<T> {
        self.map_err(|source| Error::Chunk { tag, source })
    }
}

/// Streaming parser that builds [`PcaObject`]s from container bytes.
pub struct ContainerParser {
    handlers: HashMap<Tag, Handler>,
    header: Option<FileHeader>,
    offset: usize,
    version: i32,
    objects: BTreeMap<u32, PcaObject>,
    events: Vec<ChunkEvent>,
    poisoned: bool,
}

impl Default for ContainerParser {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContainerParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerParser")
            .field("header", &self.header)
            .field("offset", &self.offset)
            .field("version", &self.version)
            .field("objects", &self.objects.len())
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

impl ContainerParser {
    /// Create a parser with handlers for every known tag.
    #[must_use]
    pub fn new() -> Self {
        let mut parser = Self {
            handlers: HashMap::new(),
            header: None,
            offset: 0,
            version: 0,
            objects: BTreeMap::new(),
            events: Vec::new(),
            poisoned: false,
        };
        parser.register(Tag::POBJ, handle_pobj);
        parser.register(Tag::VERS, handle_vers);
        parser.register(Tag::LUTR, handle_lutr);
        parser.register(Tag::LUTB, handle_lutb);
        parser.register(Tag::LUTJ, handle_lutj);
        parser.register(Tag::STAJ, handle_staj);
        parser.register(Tag::BASJ, handle_basj);
        parser.register(Tag::POS, handle_pos);
        parser.register(Tag::ROT, handle_rot);
        parser.register(Tag::SCA, handle_sca);
        parser.register(Tag::EUA, handle_eua);
        parser.register(Tag::GEOA, handle_geoa);
        parser.register(Tag::GEOB, handle_geob);
        parser
    }

    /// Register (or replace) the handler for a tag.
    pub fn register(&mut self, tag: Tag, handler: Handler) {
        self.handlers.insert(tag, handler);
    }

    /// Parse as many complete chunks of `buffer` as possible.
    ///
    /// `buffer` must start with the same bytes as every earlier call; only
    /// the part past the internal cursor is examined.
    ///
    /// # Errors
    ///
    /// Returns a fatal error for a bad file header, a failing chunk handler,
    /// a buffer shorter than what was already consumed, or any call after a
    /// previous fatal error.
    pub fn parse(&mut self, buffer: &[u8]) -> Result<ParseStatus> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }
        let result = self.parse_inner(buffer);
        if let Err(error) = &result {
            tracing::error!(%error, offset = self.offset, "parse failed");
            self.poisoned = true;
        }
        result
    }

    fn parse_inner(&mut self, buffer: &[u8]) -> Result<ParseStatus> {
        if buffer.len() < self.offset {
            return Err(Error::BufferShrunk {
                offset: self.offset,
                buffer_len: buffer.len(),
            });
        }

        if self.header.is_none() {
            if buffer.len() < FILE_HEADER_LEN {
                return Ok(ParseStatus::NeedMoreData);
            }
            let header = read_file_header(buffer).in_chunk(Tag::FILE_MAGIC)?;
            if !header.is_valid() {
                return Err(Error::InvalidHeader {
                    tag: header.tag,
                    length: header.length,
                    buffer_len: buffer.len(),
                });
            }
            tracing::info!(
                length = header.length,
                objects = header.object_count,
                "read file header"
            );
            self.header = Some(header);
            self.offset = FILE_HEADER_LEN;
        }

        loop {
            let remaining = buffer.len() - self.offset;
            if remaining == 0 {
                return Ok(ParseStatus::Done);
            }
            if remaining < CHUNK_HEADER_LEN {
                return Ok(ParseStatus::NeedMoreData);
            }
            let chunk = read_chunk_header(buffer, self.offset).in_chunk(Tag::FILE_MAGIC)?;
            if remaining < chunk.total_len() {
                return Ok(ParseStatus::NeedMoreData);
            }

            let start = self.offset + CHUNK_HEADER_LEN;
            let payload = &buffer[start..start + chunk.length as usize];
            match self.handlers.get(&chunk.tag).copied() {
                Some(handler) => {
                    tracing::debug!(tag = %chunk.tag, length = chunk.length, offset = self.offset, "chunk");
                    handler(self, chunk.tag, payload)?;
                }
                None => {
                    tracing::warn!(tag = %chunk.tag, length = chunk.length, offset = self.offset, "skipping unknown chunk");
                }
            }
            self.offset += chunk.total_len();
        }
    }

    /// Parse the final buffer once the byte source has no more data.
    ///
    /// # Errors
    ///
    /// In addition to the [`parse`](Self::parse) errors, returns
    /// [`Error::Truncated`] if the file ends inside a header or chunk.
    pub fn finish(&mut self, buffer: &[u8]) -> Result<()> {
        if self.parse(buffer)? == ParseStatus::Done {
            return Ok(());
        }

        let available = buffer.len() - self.offset;
        let needed = if self.header.is_none() {
            FILE_HEADER_LEN
        } else if available < CHUNK_HEADER_LEN {
            CHUNK_HEADER_LEN
        } else {
            read_chunk_header(buffer, self.offset)
                .in_chunk(Tag::FILE_MAGIC)?
                .total_len()
        };
        let error = Error::Truncated {
            offset: self.offset,
            needed,
            available,
        };
        tracing::error!(%error, "file ended early");
        self.poisoned = true;
        Err(error)
    }

    /// Objects created so far, ordered by id.
    #[must_use]
    pub fn objects(&self) -> &BTreeMap<u32, PcaObject> {
        &self.objects
    }

    #[must_use]
    pub fn object(&self, id: u32) -> Option<&PcaObject> {
        self.objects.get(&id)
    }

    pub fn object_mut(&mut self, id: u32) -> Option<&mut PcaObject> {
        self.objects.get_mut(&id)
    }

    /// Drain the events produced since the last call.
    pub fn take_events(&mut self) -> Vec<ChunkEvent> {
        std::mem::take(&mut self.events)
    }

    /// Format version from the last `VERS` chunk, 0 until one is seen.
    #[must_use]
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Object count from the file header. Informational only.
    #[must_use]
    pub fn declared_object_count(&self) -> Option<u32> {
        self.header.map(|h| h.object_count)
    }

    /// Total length from the file header.
    #[must_use]
    pub fn declared_length(&self) -> Option<u32> {
        self.header.map(|h| h.length)
    }

    /// Number of bytes consumed so far.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn target(&mut self, tag: Tag, id: u32) -> Result<&mut PcaObject> {
        self.objects
            .get_mut(&id)
            .ok_or(Error::UnknownObject { tag, id })
    }
}

/// Bytes of RGBA atlas storage needed to pack every basis image of a channel.
fn atlas_len(desc: &BasisDesc) -> usize {
    (group_count(desc.max_basis) * IMAGES_PER_GROUP)
        .saturating_mul(desc.width as usize)
        .saturating_mul(desc.height as usize)
}

fn invalid(tag: Tag, detail: String) -> Error {
    Error::Chunk {
        tag,
        source: DecodeError::InvalidFormat {
            context: "chunk payload",
            detail,
        },
    }
}

/// The `id, channel, basis start, basis count` prefix shared by the LUT and
/// basis chunks.
struct BasisRange {
    id: u32,
    channel: usize,
    start: usize,
    count: usize,
}

fn read_basis_range(reader: &mut ChunkReader<'_>, tag: Tag) -> Result<BasisRange> {
    Ok(BasisRange {
        id: reader.read_u32().in_chunk(tag)?,
        channel: reader.read_count().in_chunk(tag)?,
        start: reader.read_count().in_chunk(tag)?,
        count: reader.read_count().in_chunk(tag)?,
    })
}

fn handle_pobj(parser: &mut ContainerParser, tag: Tag, payload: &[u8]) -> Result<()> {
    let mut reader = ChunkReader::new(payload, "POBJ");
    let id = reader.read_u32().in_chunk(tag)?;
    let channels = reader.read_count().in_chunk(tag)?;

    let mut basis_desc = Vec::new();
    let mut atlas_bytes = 0usize;
    for _ in 0..channels {
        let width = reader.read_u32().in_chunk(tag)?;
        let height = reader.read_u32().in_chunk(tag)?;
        let max_basis = reader.read_count().in_chunk(tag)?;
        if max_basis > MAX_BASIS_PER_CHANNEL {
            return Err(invalid(tag, format!("{max_basis} basis images declared")));
        }
        if width > MAX_BASIS_DIMENSION || height > MAX_BASIS_DIMENSION {
            return Err(invalid(tag, format!("{width}x{height} basis images")));
        }
        let desc = BasisDesc {
            width,
            height,
            max_basis,
        };
        atlas_bytes = atlas_bytes.saturating_add(atlas_len(&desc));
        if atlas_bytes > MAX_OBJECT_ATLAS_BYTES {
            return Err(invalid(tag, format!("basis atlases of {atlas_bytes} bytes")));
        }
        basis_desc.push(desc);
    }
    let mut lut_desc = Vec::new();
    let mut lut_samples = 0usize;
    for basis in &basis_desc {
        let desc = LutDesc {
            width: reader.read_u32().in_chunk(tag)?,
            height: reader.read_u32().in_chunk(tag)?,
        };
        if desc.len() > MAX_LUT_SAMPLES {
            return Err(invalid(tag, format!("LUT of {} samples", desc.len())));
        }
        lut_samples = lut_samples.saturating_add(desc.len().saturating_mul(basis.max_basis + 1));
        if lut_samples > MAX_OBJECT_LUT_SAMPLES {
            return Err(invalid(tag, format!("LUTs of {lut_samples} samples")));
        }
        lut_desc.push(desc);
    }

    if parser.objects.contains_key(&id) {
        return Err(Error::DuplicateObject { id });
    }
    tracing::info!(id, channels, "created object");
    parser
        .objects
        .insert(id, PcaObject::new(id, basis_desc, lut_desc));
    parser.events.push(ChunkEvent::ObjectCreated(id));
    Ok(())
}

fn handle_vers(parser: &mut ContainerParser, tag: Tag, payload: &[u8]) -> Result<()> {
    let version = ChunkReader::new(payload, "VERS").read_i32().in_chunk(tag)?;
    parser.version = version;
    for object in parser.objects.values_mut() {
        if let Some(geometry) = object.geometry_mut()
            && geometry.apply_version(version)
        {
            tracing::debug!(id = object.id(), version, "re-applied geometry version");
        }
    }
    parser.events.push(ChunkEvent::Version(version));
    Ok(())
}

fn handle_lutr(parser: &mut ContainerParser, tag: Tag, payload: &[u8]) -> Result<()> {
    let mut reader = ChunkReader::new(payload, "LUTR");
    let id = reader.read_u32().in_chunk(tag)?;
    let len = reader.read_count().in_chunk(tag)?;
    if len != 3 {
        return Err(invalid(tag, format!("range length {len}, expected 3")));
    }
    let range = LutRange {
        mean: reader.read_vec3().in_chunk(tag)?,
        min: reader.read_vec3().in_chunk(tag)?,
        max: reader.read_vec3().in_chunk(tag)?,
    };
    parser.target(tag, id)?.set_lut_range(range);
    parser.events.push(ChunkEvent::LutRange(id));
    Ok(())
}

fn channel_lut_desc(
    parser: &mut ContainerParser,
    tag: Tag,
    range: &BasisRange,
) -> Result<LutDesc> {
    let object = parser.target(tag, range.id)?;
    object
        .lut_desc()
        .get(range.channel)
        .copied()
        .ok_or(Error::InvalidChannel {
            id: range.id,
            channel: range.channel,
            channels: object.num_channels(),
        })
}

fn handle_lutb(parser: &mut ContainerParser, tag: Tag, payload: &[u8]) -> Result<()> {
    let mut reader = ChunkReader::new(payload, "LUTB");
    let range = read_basis_range(&mut reader, tag)?;
    let desc = channel_lut_desc(parser, tag, &range)?;
    let bytes = reader
        .read_bytes(range.count * desc.len())
        .in_chunk(tag)?;

    parser.target(tag, range.id)?.set_lookup_table(
        range.channel,
        range.start,
        range.count,
        &bytes_to_signed(bytes),
    )?;
    parser.events.push(ChunkEvent::Lut {
        id: range.id,
        channel: range.channel,
    });
    Ok(())
}

fn handle_lutj(parser: &mut ContainerParser, tag: Tag, payload: &[u8]) -> Result<()> {
    let mut reader = ChunkReader::new(payload, "LUTJ");
    let range = read_basis_range(&mut reader, tag)?;
    let desc = channel_lut_desc(parser, tag, &range)?;
    let segments = split_jpeg_segments(reader.read_rest(), range.count, "LUTJ").in_chunk(tag)?;

    let mut rows = Vec::with_capacity(segments.len());
    for segment in segments {
        let texture = decode_jpeg_to_rgba(segment).in_chunk(tag)?;
        rows.push(green_channel_row(&texture, desc.width, desc.height).in_chunk(tag)?);
    }

    let object = parser.target(tag, range.id)?;
    for (i, row) in rows.iter().enumerate() {
        object.set_lookup_table(range.channel, range.start + i, 1, row)?;
    }
    parser.events.push(ChunkEvent::Lut {
        id: range.id,
        channel: range.channel,
    });
    Ok(())
}

fn handle_staj(parser: &mut ContainerParser, tag: Tag, payload: &[u8]) -> Result<()> {
    let mut reader = ChunkReader::new(payload, "STAJ");
    let id = reader.read_u32().in_chunk(tag)?;
    let width_hint = reader.read_u32().in_chunk(tag)?;
    let height_hint = reader.read_u32().in_chunk(tag)?;
    let blob = ImageBlob::new(reader.read_rest());

    parser.target(tag, id)?.set_static_texture(StaticTexture {
        blob,
        width_hint,
        height_hint,
    });
    parser.events.push(ChunkEvent::StaticTexture(id));
    Ok(())
}

fn handle_basj(parser: &mut ContainerParser, tag: Tag, payload: &[u8]) -> Result<()> {
    let mut reader = ChunkReader::new(payload, "BASJ");
    let range = read_basis_range(&mut reader, tag)?;
    let blobs = split_jpeg_segments(reader.read_rest(), range.count, "BASJ")
        .in_chunk(tag)?
        .into_iter()
        .map(ImageBlob::new)
        .collect();

    parser
        .target(tag, range.id)?
        .set_basis(range.channel, range.start, blobs)?;
    parser.events.push(ChunkEvent::Basis {
        id: range.id,
        channel: range.channel,
    });
    Ok(())
}

fn handle_pos(parser: &mut ContainerParser, tag: Tag, payload: &[u8]) -> Result<()> {
    let mut reader = ChunkReader::new(payload, "POS ");
    let id = reader.read_u32().in_chunk(tag)?;
    let position = reader.read_vec3().in_chunk(tag)?;
    parser.target(tag, id)?.set_position(position);
    parser.events.push(ChunkEvent::Transform(id));
    Ok(())
}

fn handle_rot(parser: &mut ContainerParser, tag: Tag, payload: &[u8]) -> Result<()> {
    let mut reader = ChunkReader::new(payload, "ROT ");
    let id = reader.read_u32().in_chunk(tag)?;
    let angles = reader.read_dvec3().in_chunk(tag)?;
    parser.target(tag, id)?.set_euler_angles(angles);
    parser.events.push(ChunkEvent::Transform(id));
    Ok(())
}

fn handle_sca(parser: &mut ContainerParser, tag: Tag, payload: &[u8]) -> Result<()> {
    let mut reader = ChunkReader::new(payload, "SCA ");
    let id = reader.read_u32().in_chunk(tag)?;
    let scale = match reader.remaining() {
        4 => Vec3::splat(reader.read_f32().in_chunk(tag)?),
        12 => reader.read_vec3().in_chunk(tag)?,
        n => return Err(invalid(tag, format!("{n} scale bytes, expected 4 or 12"))),
    };
    parser.target(tag, id)?.set_scale(scale);
    parser.events.push(ChunkEvent::Transform(id));
    Ok(())
}

fn handle_eua(parser: &mut ContainerParser, tag: Tag, payload: &[u8]) -> Result<()> {
    let mut reader = ChunkReader::new(payload, "EUA ");
    let id = reader.read_u32().in_chunk(tag)?;
    let rows = [
        reader.read_vec3().in_chunk(tag)?,
        reader.read_vec3().in_chunk(tag)?,
        reader.read_vec3().in_chunk(tag)?,
    ];
    parser.target(tag, id)?.set_euler_matrix(rows);
    parser.events.push(ChunkEvent::Transform(id));
    Ok(())
}

fn handle_geoa(parser: &mut ContainerParser, tag: Tag, payload: &[u8]) -> Result<()> {
    let mut reader = ChunkReader::new(payload, "GEOA");
    let id = reader.read_u32().in_chunk(tag)?;
    let geometry = decode_ascii_geometry(reader.read_rest()).in_chunk(tag)?;
    tracing::debug!(
        id,
        vertices = geometry.positions.len(),
        triangles = geometry.triangles.len(),
        "decoded text geometry"
    );
    parser.target(tag, id)?.set_geometry(geometry);
    parser.events.push(ChunkEvent::Geometry(id));
    Ok(())
}

fn handle_geob(parser: &mut ContainerParser, tag: Tag, payload: &[u8]) -> Result<()> {
    let mut reader = ChunkReader::new(payload, "GEOB");
    let id = reader.read_u32().in_chunk(tag)?;
    let geometry = decode_binary_geometry(reader.read_rest(), parser.version).in_chunk(tag)?;
    tracing::debug!(
        id,
        vertices = geometry.positions.len(),
        triangles = geometry.triangles.len(),
        "decoded binary geometry"
    );
    parser.target(tag, id)?.set_geometry(geometry);
    parser.events.push(ChunkEvent::Geometry(id));
    Ok(())
}
