use std::sync::Arc;

use flate2::Compress;
use flate2::Compression;
use flate2::Decompress;
use flate2::FlushCompress;
use flate2::FlushDecompress;
use flate2::Status;
use once_cell::sync::Lazy;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::debug;

use super::PayloadCodec;
use crate::CodecConfig;
use crate::CodecError;

static SHARED: Lazy<Arc<DeflateCodec>> =
    Lazy::new(|| Arc::new(DeflateCodec::new(CodecConfig::default())));

/// Raw deflate codec owning one encoder and one decoder.
///
/// Both are built on first use, exactly once even under concurrent callers,
/// then reset and reused for every subsequent call.
pub struct DeflateCodec {
    config: CodecConfig,
    encoder: OnceCell<Mutex<Compress>>,
    decoder: OnceCell<Mutex<Decompress>>,
}

impl std::fmt::Debug for DeflateCodec {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DeflateCodec")
            .field("config", &self.config)
            .field("encoder_ready", &self.encoder.get().is_some())
            .field("decoder_ready", &self.decoder.get().is_some())
            .finish()
    }
}

impl DeflateCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self {
            config,
            encoder: OnceCell::new(),
            decoder: OnceCell::new(),
        }
    }

    /// Process-wide codec with default settings.
    pub fn shared() -> Arc<DeflateCodec> {
        SHARED.clone()
    }

    /// Shared instance when `config` is the default, a dedicated one otherwise.
    pub fn for_config(config: CodecConfig) -> Arc<DeflateCodec> {
        if config == CodecConfig::default() {
            Self::shared()
        } else {
            Arc::new(Self::new(config))
        }
    }

    pub fn is_encoder_initialized(&self) -> bool {
        self.encoder.get().is_some()
    }

    pub fn is_decoder_initialized(&self) -> bool {
        self.decoder.get().is_some()
    }

    fn encoder(&self) -> Result<&Mutex<Compress>, CodecError> {
        self.encoder.get_or_try_init(|| {
            let level = self.config.compression_level;
            if level > 9 {
                return Err(CodecError::Unavailable(format!(
                    "invalid deflate level {level}"
                )));
            }
            debug!(level, "initializing shared deflate encoder");
            Ok(Mutex::new(Compress::new(Compression::new(level), false)))
        })
    }

    fn decoder(&self) -> &Mutex<Decompress> {
        self.decoder.get_or_init(|| {
            debug!("initializing shared deflate decoder");
            Mutex::new(Decompress::new(false))
        })
    }
}

impl PayloadCodec for DeflateCodec {
    fn compress(
        &self,
        raw: &[u8],
    ) -> Result<Vec<u8>, CodecError> {
        let mut encoder = self.encoder()?.lock();
        encoder.reset();

        let mut out = Vec::with_capacity(raw.len() / 4 + 64);
        loop {
            let consumed = encoder.total_in() as usize;
            let status = encoder
                .compress_vec(&raw[consumed..], &mut out, FlushCompress::Finish)
                .map_err(|e| CodecError::Unavailable(e.to_string()))?;

            match status {
                Status::StreamEnd => return Ok(out),
                Status::Ok | Status::BufError => out.reserve(out.capacity().max(64)),
            }
        }
    }

    fn decompress(
        &self,
        data: &[u8],
    ) -> Result<Vec<u8>, CodecError> {
        let limit = self.config.max_decompressed_bytes;
        let mut decoder = self.decoder().lock();
        decoder.reset(false);

        let mut out = Vec::with_capacity(data.len().saturating_mul(4).clamp(64, limit.max(64)));
        loop {
            let consumed = decoder.total_in() as usize;
            let produced = decoder.total_out();
            let status = decoder
                .decompress_vec(&data[consumed..], &mut out, FlushDecompress::Finish)
                .map_err(|e| CodecError::Corrupt(e.to_string()))?;

            if out.len() > limit {
                return Err(CodecError::TooLarge { limit });
            }

            match status {
                Status::StreamEnd => return Ok(out),
                Status::Ok | Status::BufError => {
                    if out.len() == out.capacity() {
                        // Room for at most one byte past the limit.
                        let room = out.capacity().min((limit - out.len()).saturating_add(1));
                        out.reserve_exact(room);
                        continue;
                    }
                    let progressed =
                        decoder.total_in() as usize != consumed || decoder.total_out() != produced;
                    if !progressed {
                        return Err(CodecError::Corrupt("truncated deflate stream".into()));
                    }
                }
            }
        }
    }
}
