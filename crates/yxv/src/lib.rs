//! Loading of YXV relightable models.
//!
//! A YXV file is a chunked binary container holding one or more PCA objects:
//! per-channel stacks of basis images, lookup tables mapping a viewing angle
//! to basis coefficients, geometry and a transform. This crate turns the
//! container into renderer-ready data:
//!
//! - [`ContainerParser`] consumes a growing byte buffer and builds
//!   [`PcaObject`]s chunk by chunk
//! - [`interpolate`] evaluates an object's coefficients at an angle
//! - [`atlas`] packs decoded basis images into RGBA textures in one of two
//!   layouts
//! - [`LoadSession`] drives all of the above for a host, reporting progress
//!   through a [`LoadObserver`]
//!
//! Decoding of the raw chunk payloads lives in `yxv-decode`.

pub mod atlas;
pub mod coefficients;
pub mod config;
pub mod error;
pub mod events;
pub mod loader;
pub mod object;
pub mod parser;
pub mod resources;
pub mod session;
pub mod types;

pub use atlas::{
    Atlas, AtlasPacker, MultiAtlasPacker, PackJob, PackStep, PackStrategy, PackedChannel,
    StackedAtlasPacker, pack_all,
};
pub use coefficients::{Coefficients, LutSample, interpolate, lut_sample};
pub use config::{GpuLimitError, GpuLimits, ViewerConfig};
pub use error::{Error, Result};
pub use events::{LoadEvent, LoadObserver, NoopObserver, RecordingObserver};
pub use loader::{BasisLoader, DecodeCompletion, DecodeRequest, ImageDecoder, JpegImageDecoder};
pub use object::{PcaObject, lut_angle};
pub use parser::{ChunkEvent, ContainerParser, Handler, ParseStatus};
pub use resources::{LoadSummary, MemorySource, ResourceLoader, ResourceSource};
pub use session::LoadSession;
pub use types::{
    BasisDesc, ImageBlob, LutDesc, LutRange, Orientation, StaticTexture, Transform, YUV_TO_RGB,
};

// Re-export decode types used in the public API.
pub use yxv_decode::{DecodedTexture, Geometry, GeometrySource, Tag};
