//! A model load from first byte to packed atlases.
//!
//! [`LoadSession`] ties the pieces together for a host. The host feeds bytes
//! as they arrive, decodes the requested basis images (inline or on its own
//! workers), and calls [`pump`](LoadSession::pump) once per frame. Each pump
//! drains decode completions and packs at most one group of basis images per
//! object, reporting progress through a [`LoadObserver`].
//!
//! All mutation goes through `&mut self`, so a chunk cannot arrive while a
//! pack step for the same object is running.

use std::collections::BTreeMap;

use crate::atlas::{AtlasPacker, PackJob, PackStep, PackedChannel};
use crate::config::ViewerConfig;
use crate::error::{Error, Result};
use crate::events::{LoadObserver, NoopObserver};
use crate::loader::{BasisLoader, DecodeCompletion, DecodeRequest, ImageDecoder};
use crate::object::{PcaObject, lut_angle};
use crate::parser::{ChunkEvent, ContainerParser, ParseStatus};

/// Per-object load state.
#[derive(Debug)]
struct ObjectLoad {
    loader: BasisLoader,
    packer: Box<dyn AtlasPacker>,
    job: Option<PackJob>,
    ready: bool,
}

/// Drives parsing, basis decoding and atlas packing for one file.
#[derive(Debug)]
pub struct LoadSession<O: LoadObserver = NoopObserver> {
    config: ViewerConfig,
    parser: ContainerParser,
    loads: BTreeMap<u32, ObjectLoad>,
    observer: O,
    started: bool,
    download_complete: bool,
    failed: bool,
}

impl LoadSession<NoopObserver> {
    #[must_use]
    pub fn with_config(config: ViewerConfig) -> Self {
        Self::new(config, NoopObserver)
    }
}

impl<O: LoadObserver> LoadSession<O> {
    #[must_use]
    pub fn new(config: ViewerConfig, observer: O) -> Self {
        Self {
            config,
            parser: ContainerParser::new(),
            loads: BTreeMap::new(),
            observer,
            started: false,
            download_complete: false,
            failed: false,
        }
    }

    /// Feed the bytes received so far.
    ///
    /// # Errors
    ///
    /// Returns the parser's fatal error, which is also reported through
    /// [`LoadObserver::fatal_error`] the first time it happens.
    pub fn on_bytes(&mut self, buffer: &[u8]) -> Result<ParseStatus> {
        if self.failed {
            return Err(Error::Poisoned);
        }
        if !self.started {
            self.started = true;
            self.observer.download_started();
        }
        let status = match self.parser.parse(buffer) {
            Ok(status) => status,
            Err(error) => return Err(self.fail(error)),
        };
        let total = self.parser.declared_length().map(|l| l as usize);
        self.observer.download_progress(buffer.len(), total);
        self.handle_events();
        Ok(status)
    }

    /// The byte source has delivered everything.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Truncated`] if the file ended inside a chunk, or any
    /// fatal parse error in the final bytes.
    pub fn on_download_complete(&mut self, buffer: &[u8]) -> Result<()> {
        if self.failed {
            return Err(Error::Poisoned);
        }
        if let Err(error) = self.parser.finish(buffer) {
            return Err(self.fail(error));
        }
        self.handle_events();
        self.download_complete = true;
        self.observer.download_completed();
        Ok(())
    }

    fn fail(&mut self, error: Error) -> Error {
        self.failed = true;
        self.observer.fatal_error(&error.to_string());
        error
    }

    fn handle_events(&mut self) {
        for event in self.parser.take_events() {
            if let ChunkEvent::ObjectCreated(id) = event
                && let Some(object) = self.parser.object_mut(id)
            {
                object.set_basis_percent(self.config.basis_percent);
                let packer = self
                    .config
                    .pack_strategy
                    .packer(self.config.max_texture_size);
                // Coefficients never address more basis images than the
                // layout can store.
                let limits: Vec<usize> = object
                    .basis_desc()
                    .iter()
                    .map(|desc| packer.usable_basis(desc))
                    .collect();
                for (channel, limit) in limits.into_iter().enumerate() {
                    object.set_basis_limit(channel, limit);
                }
                self.loads.insert(
                    id,
                    ObjectLoad {
                        loader: BasisLoader::new(object),
                        packer,
                        job: None,
                        ready: false,
                    },
                );
                tracing::info!(id, strategy = ?self.config.pack_strategy, "tracking object");
            }
        }
    }

    /// Basis images that arrived since the last call, across all objects.
    ///
    /// Deliver each result through [`completion_sender`](Self::completion_sender).
    pub fn decode_requests(&mut self) -> Vec<DecodeRequest> {
        let mut requests = Vec::new();
        for (id, load) in &mut self.loads {
            if let Some(object) = self.parser.object(*id) {
                requests.extend(load.loader.request(object));
            }
        }
        requests
    }

    /// Sender for completions of `id`'s decode requests.
    #[must_use]
    pub fn completion_sender(&self, id: u32) -> Option<async_channel::Sender<DecodeCompletion>> {
        self.loads.get(&id).map(|load| load.loader.sender())
    }

    /// Decode every new basis image inline with `decoder`.
    pub fn decode_pending(&mut self, decoder: &dyn ImageDecoder) {
        for (id, load) in &mut self.loads {
            if let Some(object) = self.parser.object(*id) {
                let requests = load.loader.request(object);
                load.loader.decode_with(decoder, &requests);
            }
        }
    }

    /// Do one unit of work per object.
    ///
    /// Returns `true` if anything was packed, so hosts can keep pumping
    /// until it returns `false`.
    pub fn pump(&mut self) -> bool {
        let mut progressed = false;
        for (&id, load) in &mut self.loads {
            for error in load.loader.poll() {
                self.observer.load_error(&error.to_string());
            }
            let Some(object) = self.parser.object(id) else {
                continue;
            };

            if load.job.is_none() && load.loader.is_idle() {
                load.job = PackJob::begin(
                    id,
                    load.packer.as_mut(),
                    object.basis_desc(),
                    &load.loader.decoded_counts(),
                );
                if load.job.is_none() && self.download_complete && !load.ready {
                    load.ready = true;
                    self.observer.object_ready(id);
                }
            }

            let Some(job) = &mut load.job else { continue };
            let observer = &mut self.observer;
            let step = job.step(
                load.packer.as_mut(),
                load.loader.images(),
                &mut |fraction, message| observer.texture_progress(fraction, message),
            );
            match step {
                Ok(PackStep::Continue) => progressed = true,
                Ok(PackStep::Done) => {
                    load.job = None;
                    progressed = true;
                    if !load.ready {
                        load.ready = true;
                        self.observer.object_ready(id);
                    }
                }
                Err(error) => {
                    tracing::warn!(id, %error, "pack abandoned");
                    load.job = None;
                    self.observer.load_error(&error.to_string());
                }
            }
        }
        progressed
    }

    /// Pump until no object has packing work left.
    pub fn run_until_idle(&mut self) {
        while self.pump() {}
    }

    /// Recompute `id`'s coefficients for a rotation about the vertical axis.
    ///
    /// Returns `true` if they changed (the object exists and is not frozen).
    pub fn update_coefficients(&mut self, id: u32, rotation_y: f32) -> bool {
        let Some(object) = self.parser.object_mut(id) else {
            return false;
        };
        let updated = object.update_coefficients(lut_angle(rotation_y));
        if updated {
            self.observer.coefficients_changed(id);
        }
        updated
    }

    /// Change the basis budget of every current and future object.
    pub fn set_basis_percent(&mut self, percent: Option<f32>) {
        self.config.basis_percent = percent;
        for &id in self.loads.keys() {
            if let Some(object) = self.parser.object_mut(id) {
                object.set_basis_percent(percent);
            }
        }
    }

    /// Freeze or resume coefficient updates of every object.
    pub fn set_freeze(&mut self, frozen: bool) {
        for &id in self.loads.keys() {
            if let Some(object) = self.parser.object_mut(id) {
                object.set_freeze(frozen);
            }
        }
    }

    #[must_use]
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    #[must_use]
    pub fn parser(&self) -> &ContainerParser {
        &self.parser
    }

    #[must_use]
    pub fn object(&self, id: u32) -> Option<&PcaObject> {
        self.parser.object(id)
    }

    /// Packed atlases of `id`, one entry per channel.
    #[must_use]
    pub fn packed(&self, id: u32) -> Option<&[PackedChannel]> {
        self.loads.get(&id).map(|load| load.packer.channels())
    }

    #[must_use]
    pub fn is_ready(&self, id: u32) -> bool {
        self.loads.get(&id).is_some_and(|load| load.ready)
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Decode requests not yet completed, across all objects.
    #[must_use]
    pub fn outstanding_decodes(&self) -> usize {
        self.loads.values().map(|load| load.loader.outstanding()).sum()
    }

    #[must_use]
    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    #[must_use]
    pub fn into_observer(self) -> O {
        self.observer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::PackStrategy;
    use crate::events::{LoadEvent, RecordingObserver};
    use crate::loader::JpegImageDecoder;

    const GRAY_200: &[u8] = include_bytes!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../fixtures/gray_200.jpg"
    ));

    fn ints(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = tag.to_vec();
        out.extend_from_slice(&u32::try_from(payload.len()).unwrap().to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn file(chunks: &[Vec<u8>]) -> Vec<u8> {
        let body = chunks.concat();
        let mut out = b"PCAO".to_vec();
        out.extend_from_slice(&u32::try_from(body.len() + 12).unwrap().to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    /// One channel, 2x2 basis images, four basis images and a 4x1 LUT.
    fn model() -> Vec<u8> {
        let mut basj = ints(&[0, 0, 0, 4]);
        basj.extend(GRAY_200.repeat(4));
        let mut lutb = ints(&[0, 0, 0, 1]);
        lutb.extend([64u8, 64, 64, 64]);
        file(&[
            chunk(b"POBJ", &ints(&[0, 1, 2, 2, 4, 4, 1])),
            chunk(b"LUTB", &lutb),
            chunk(b"BASJ", &basj),
        ])
    }

    #[test]
    fn test_full_load_reports_progress_and_ready() {
        let data = model();
        let mut session = LoadSession::new(ViewerConfig::default(), RecordingObserver::new());
        let split = data.len() / 2;
        assert_eq!(
            session.on_bytes(&data[..split]).unwrap(),
            ParseStatus::NeedMoreData
        );
        assert_eq!(session.on_bytes(&data).unwrap(), ParseStatus::Done);
        session.on_download_complete(&data).unwrap();

        session.decode_pending(&JpegImageDecoder);
        session.run_until_idle();
        assert!(session.is_ready(0));
        assert!(!session.pump());

        let packed = session.packed(0).unwrap();
        assert_eq!(packed[0].packed_basis, 4);
        assert!(
            packed[0].atlases[0]
                .data
                .iter()
                .all(|&v| v.abs_diff(200) <= 2)
        );

        assert!(session.update_coefficients(0, 0.0));
        let coefficients = session.object(0).unwrap().coefficients().unwrap();
        let expected = [1.0, 0.5, 0.0, 0.0];
        assert_eq!(coefficients.channel(0).len(), expected.len());
        for (got, want) in coefficients.channel(0).iter().zip(expected) {
            assert!((got - want).abs() < 1e-5);
        }

        let events = &session.observer().events;
        assert_eq!(events[0], LoadEvent::DownloadStarted);
        assert!(events.contains(&LoadEvent::DownloadProgress {
            loaded: split,
            total: Some(data.len())
        }));
        assert!(events.contains(&LoadEvent::TextureProgress {
            fraction: 0.0,
            message: "Loaded texture channel:0 basis:0".into()
        }));
        let observer = session.observer();
        assert_eq!(
            observer.count(|e| matches!(e, LoadEvent::ObjectReady(0))),
            1
        );
        assert_eq!(
            observer.count(|e| matches!(e, LoadEvent::CoefficientsChanged(0))),
            1
        );
    }

    #[test]
    fn test_coefficients_follow_stacked_clamp() {
        // 2x2 basis images with room for two bands of height 2 in a 4 texel
        // texture, so only 8 of the 12 loaded images can be packed.
        let mut basj = ints(&[0, 0, 0, 12]);
        basj.extend(GRAY_200.repeat(12));
        let data = file(&[
            chunk(b"POBJ", &ints(&[0, 1, 2, 2, 12, 4, 1])),
            chunk(b"BASJ", &basj),
        ]);
        let config = ViewerConfig {
            pack_strategy: PackStrategy::Stacked,
            max_texture_size: 4,
            ..ViewerConfig::default()
        };
        let mut session = LoadSession::with_config(config);
        session.on_download_complete(&data).unwrap();
        session.decode_pending(&JpegImageDecoder);
        session.run_until_idle();

        let packed = &session.packed(0).unwrap()[0];
        assert_eq!(packed.capacity, 8);
        let packed_basis = packed.packed_basis;
        assert_eq!(packed_basis, 8);
        assert_eq!(session.object(0).unwrap().loaded_basis_count(0), 12);

        assert!(session.update_coefficients(0, 0.0));
        let coefficients = session.object(0).unwrap().coefficients().unwrap();
        assert_eq!(coefficients.channel(0).len(), packed_basis);
    }

    #[test]
    fn test_oversized_object_fails_without_packing() {
        let data = file(&[chunk(b"POBJ", &ints(&[0, 1, 50_000, 50_000, 4, 1, 1]))]);
        let mut session = LoadSession::new(ViewerConfig::default(), RecordingObserver::new());
        assert!(matches!(
            session.on_download_complete(&data),
            Err(Error::Chunk {
                tag: yxv_decode::Tag::POBJ,
                ..
            })
        ));
        assert!(!session.pump());
        assert!(session.packed(0).is_none());
        assert_eq!(
            session
                .observer()
                .count(|e| matches!(e, LoadEvent::FatalError(_))),
            1
        );
    }

    #[test]
    fn test_fatal_error_is_reported_once() {
        let mut data = model();
        data[..4].copy_from_slice(b"NOPE");
        let mut session = LoadSession::new(ViewerConfig::default(), RecordingObserver::new());
        assert!(matches!(
            session.on_bytes(&data),
            Err(Error::InvalidHeader { .. })
        ));
        assert!(matches!(session.on_bytes(&data), Err(Error::Poisoned)));
        assert!(session.is_failed());
        assert_eq!(
            session
                .observer()
                .count(|e| matches!(e, LoadEvent::FatalError(_))),
            1
        );
    }

    #[test]
    fn test_truncated_download_is_fatal() {
        let data = model();
        let mut session = LoadSession::new(ViewerConfig::default(), RecordingObserver::new());
        let short = &data[..data.len() - 1];
        session.on_bytes(short).unwrap();
        assert!(matches!(
            session.on_download_complete(short),
            Err(Error::Truncated { .. })
        ));
        assert!(
            session
                .observer()
                .events
                .iter()
                .any(|e| matches!(e, LoadEvent::FatalError(m) if m.contains("truncated")))
        );
    }

    #[test]
    fn test_bad_image_is_a_load_error() {
        // A JFIF preamble with no frame behind it.
        let mut basj = ints(&[0, 0, 0, 1]);
        basj.extend(&GRAY_200[..11]);
        basj.extend([0u8; 20]);
        let data = file(&[chunk(b"POBJ", &ints(&[0, 1, 2, 2, 4, 4, 1])), chunk(b"BASJ", &basj)]);

        let mut session = LoadSession::new(ViewerConfig::default(), RecordingObserver::new());
        session.on_download_complete(&data).unwrap();
        let requests = session.decode_requests();
        assert_eq!(requests.len(), 1);
        let sender = session.completion_sender(0).unwrap();
        sender
            .try_send(requests[0].decode(&JpegImageDecoder))
            .unwrap();
        assert_eq!(session.outstanding_decodes(), 1);
        session.run_until_idle();
        assert_eq!(session.outstanding_decodes(), 0);

        // The object is still usable without its basis images.
        assert!(session.is_ready(0));
        assert_eq!(session.object(0).unwrap().loaded_basis_count(0), 1);
        assert!(session.packed(0).unwrap()[0].packed_basis == 0);
        let observer = session.observer();
        assert_eq!(
            observer.count(|e| matches!(e, LoadEvent::LoadError(_))),
            1
        );
        assert_eq!(
            observer.count(|e| matches!(e, LoadEvent::FatalError(_))),
            0
        );
    }

    #[test]
    fn test_freeze_and_basis_percent() {
        let data = model();
        let mut session = LoadSession::with_config(ViewerConfig::default());
        session.on_download_complete(&data).unwrap();

        session.set_freeze(true);
        assert!(!session.update_coefficients(0, 0.0));
        assert!(session.object(0).unwrap().coefficients().is_none());

        session.set_freeze(false);
        session.set_basis_percent(Some(10.0));
        assert!(session.update_coefficients(0, 0.0));
        assert_eq!(session.config().basis_percent, Some(10.0));
        assert_eq!(session.object(0).unwrap().effective_basis_count(0), 4);
        assert!(!session.update_coefficients(7, 0.0));
    }
}
