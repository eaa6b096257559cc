//! Basis image decoding with out-of-order completion.
//!
//! The parser stores basis images as encoded blobs. A [`BasisLoader`] hands
//! out one [`DecodeRequest`] per blob it has not seen yet. Whoever decodes
//! them (a worker pool, a browser, or [`BasisLoader::decode_with`] inline)
//! sends a [`DecodeCompletion`] back through the loader's channel in any
//! order. The loader counts completions and reports a batch as finished only
//! when every outstanding request has come back.
//!
//! Uses platform-agnostic `async_channel` so completions can be sent from
//! threads or async tasks alike.

use yxv_decode::{DecodeResult, DecodedTexture, decode_jpeg_to_rgba};

use crate::error::Error;
use crate::object::PcaObject;
use crate::types::ImageBlob;

/// A basis image waiting to be decoded.
#[derive(Debug, Clone)]
pub struct DecodeRequest {
    pub id: u32,
    pub channel: usize,
    pub index: usize,
    pub blob: ImageBlob,
}

impl DecodeRequest {
    /// Decode the blob and wrap the result as a completion.
    #[must_use]
    pub fn decode(&self, decoder: &dyn ImageDecoder) -> DecodeCompletion {
        DecodeCompletion {
            channel: self.channel,
            index: self.index,
            result: decoder.decode(self.blob.as_bytes()),
        }
    }
}

/// The outcome of one [`DecodeRequest`].
#[derive(Debug, Clone)]
pub struct DecodeCompletion {
    pub channel: usize,
    pub index: usize,
    pub result: DecodeResult<DecodedTexture>,
}

/// Turns an encoded image into RGBA pixels.
pub trait ImageDecoder: Send + Sync {
    /// Decode `blob`.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob is not a decodable image.
    fn decode(&self, blob: &[u8]) -> DecodeResult<DecodedTexture>;
}

/// Decodes baseline JFIF blobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegImageDecoder;

impl ImageDecoder for JpegImageDecoder {
    fn decode(&self, blob: &[u8]) -> DecodeResult<DecodedTexture> {
        decode_jpeg_to_rgba(blob)
    }
}

/// Decoded basis images of one object.
#[derive(Debug)]
pub struct BasisLoader {
    id: u32,
    /// Decoded images, `[channel][index]`.
    images: Vec<Vec<Option<DecodedTexture>>>,
    /// Number of leading blobs already requested per channel.
    requested: Vec<usize>,
    outstanding: usize,
    failures: usize,
    completion_tx: async_channel::Sender<DecodeCompletion>,
    completion_rx: async_channel::Receiver<DecodeCompletion>,
}

impl BasisLoader {
    #[must_use]
    pub fn new(object: &PcaObject) -> Self {
        let (completion_tx, completion_rx) = async_channel::unbounded();
        let images = object
            .basis_desc()
            .iter()
            .map(|desc| vec![None; desc.max_basis])
            .collect();
        Self {
            id: object.id(),
            images,
            requested: vec![0; object.num_channels()],
            outstanding: 0,
            failures: 0,
            completion_tx,
            completion_rx,
        }
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Sender for delivering completions from another thread or task.
    #[must_use]
    pub fn sender(&self) -> async_channel::Sender<DecodeCompletion> {
        self.completion_tx.clone()
    }

    /// List blobs that arrived since the last call.
    ///
    /// Only the gap-free prefix of each channel is requested. Calling again
    /// without new blobs returns nothing.
    pub fn request(&mut self, object: &PcaObject) -> Vec<DecodeRequest> {
        let mut requests = Vec::new();
        for (channel, requested) in self.requested.iter_mut().enumerate() {
            let loaded = object.loaded_basis_count(channel);
            for index in *requested..loaded {
                if let Some(blob) = &object.basis(channel)[index] {
                    requests.push(DecodeRequest {
                        id: self.id,
                        channel,
                        index,
                        blob: blob.clone(),
                    });
                }
            }
            *requested = (*requested).max(loaded);
        }
        self.outstanding += requests.len();
        if !requests.is_empty() {
            tracing::debug!(id = self.id, count = requests.len(), "requested basis decodes");
        }
        requests
    }

    /// Decode `requests` inline and queue their completions.
    pub fn decode_with(&self, decoder: &dyn ImageDecoder, requests: &[DecodeRequest]) {
        for request in requests {
            // The loader holds the receiver, so the channel cannot be closed.
            let _ = self.completion_tx.try_send(request.decode(decoder));
        }
    }

    /// Drain delivered completions.
    ///
    /// Returns the decode failures among them. Failed images stay missing and
    /// end the channel's usable prefix.
    pub fn poll(&mut self) -> Vec<Error> {
        let mut errors = Vec::new();
        while let Ok(completion) = self.completion_rx.try_recv() {
            self.outstanding = self.outstanding.saturating_sub(1);
            let DecodeCompletion {
                channel,
                index,
                result,
            } = completion;
            let Some(slot) = self.images.get_mut(channel).and_then(|c| c.get_mut(index)) else {
                tracing::warn!(id = self.id, channel, index, "completion for unknown basis image");
                continue;
            };
            match result {
                Ok(texture) => *slot = Some(texture),
                Err(source) => {
                    self.failures += 1;
                    tracing::warn!(id = self.id, channel, index, %source, "basis decode failed");
                    errors.push(Error::Image {
                        id: self.id,
                        channel,
                        index,
                        source,
                    });
                }
            }
        }
        errors
    }

    /// Whether every requested decode has completed.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.outstanding == 0
    }

    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    #[must_use]
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Decoded images, `[channel][index]`.
    #[must_use]
    pub fn images(&self) -> &[Vec<Option<DecodedTexture>>] {
        &self.images
    }

    /// Longest gap-free run of decoded images per channel.
    #[must_use]
    pub fn decoded_counts(&self) -> Vec<usize> {
        self.images
            .iter()
            .map(|c| c.iter().take_while(|i| i.is_some()).count())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use yxv_decode::DecodeError;

    use super::*;
    use crate::types::{BasisDesc, LutDesc};

    const GRAY_100: &[u8] = include_bytes!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../fixtures/gray_100.jpg"
    ));

    fn object(max_basis: usize) -> PcaObject {
        PcaObject::new(
            5,
            vec![BasisDesc {
                width: 2,
                height: 2,
                max_basis,
            }],
            vec![LutDesc {
                width: 4,
                height: 1,
            }],
        )
    }

    fn completion(index: usize, ok: bool) -> DecodeCompletion {
        DecodeCompletion {
            channel: 0,
            index,
            result: if ok {
                Ok(DecodedTexture::new(vec![0; 16], 2, 2))
            } else {
                Err(DecodeError::Image {
                    context: "jpeg",
                    detail: "bad".into(),
                })
            },
        }
    }

    #[test]
    fn test_request_only_new_prefix() {
        let mut object = object(6);
        let mut loader = BasisLoader::new(&object);
        assert!(loader.request(&object).is_empty());

        object.set_basis(0, 0, vec![ImageBlob::new(&[1]); 2]).unwrap();
        object.set_basis(0, 3, vec![ImageBlob::new(&[3])]).unwrap();
        let first = loader.request(&object);
        assert_eq!(first.iter().map(|r| r.index).collect::<Vec<_>>(), [0, 1]);
        assert!(loader.request(&object).is_empty());

        object.set_basis(0, 2, vec![ImageBlob::new(&[2])]).unwrap();
        let second = loader.request(&object);
        assert_eq!(second.iter().map(|r| r.index).collect::<Vec<_>>(), [2, 3]);
        assert_eq!(loader.outstanding(), 4);
    }

    #[test]
    fn test_out_of_order_completions() {
        let mut object = object(3);
        object.set_basis(0, 0, vec![ImageBlob::new(&[1]); 3]).unwrap();
        let mut loader = BasisLoader::new(&object);
        loader.request(&object);

        let sender = loader.sender();
        sender.try_send(completion(2, true)).unwrap();
        sender.try_send(completion(0, true)).unwrap();
        assert!(loader.poll().is_empty());
        assert!(!loader.is_idle());
        assert_eq!(loader.decoded_counts(), [1]);

        sender.try_send(completion(1, true)).unwrap();
        assert!(loader.poll().is_empty());
        assert!(loader.is_idle());
        assert_eq!(loader.decoded_counts(), [3]);
    }

    #[test]
    fn test_failed_decode_counts_as_completion() {
        let mut object = object(2);
        object.set_basis(0, 0, vec![ImageBlob::new(&[1]); 2]).unwrap();
        let mut loader = BasisLoader::new(&object);
        loader.request(&object);

        let sender = loader.sender();
        sender.try_send(completion(0, false)).unwrap();
        sender.try_send(completion(1, true)).unwrap();
        let errors = loader.poll();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], Error::Image { id: 5, index: 0, .. }));
        assert!(!errors[0].is_fatal());
        assert!(loader.is_idle());
        assert_eq!(loader.failures(), 1);
        assert_eq!(loader.decoded_counts(), [0]);
    }

    #[test]
    fn test_decode_with_jpeg() {
        let mut object = object(2);
        object
            .set_basis(0, 0, vec![ImageBlob::new(GRAY_100), ImageBlob::new(b"nope")])
            .unwrap();
        let mut loader = BasisLoader::new(&object);
        let requests = loader.request(&object);
        loader.decode_with(&JpegImageDecoder, &requests);

        let errors = loader.poll();
        assert_eq!(errors.len(), 1);
        assert!(loader.is_idle());
        let image = loader.images()[0][0].as_ref().unwrap();
        assert_eq!((image.width, image.height), (2, 2));
        assert!(image.data.chunks(4).all(|p| p[0].abs_diff(100) <= 2));
    }
}
