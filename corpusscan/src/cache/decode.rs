use encoding_rs::{DecoderResult, Encoding};
use std::path::Path;
use tracing::debug;

use crate::config::{resolve_encoding, EncodingMode};
use crate::errors::{ScanError, ScanResult};

/// Decodes corpus bytes in a fixed legacy encoding and splits them into lines
#[derive(Debug, Clone, Copy)]
pub struct TextDecoder {
    encoding: &'static Encoding,
    mode: EncodingMode,
}

impl TextDecoder {
    pub fn new(encoding: &'static Encoding, mode: EncodingMode) -> Self {
        Self { encoding, mode }
    }

    pub fn for_label(label: &str, mode: EncodingMode) -> ScanResult<Self> {
        Ok(Self::new(resolve_encoding(label)?, mode))
    }

    /// Decodes `bytes`. Malformed sequences are skipped in lossy mode and
    /// rejected in fail-fast mode.
    pub fn decode(&self, bytes: &[u8], path: &Path) -> ScanResult<String> {
        let mut decoder = self.encoding.new_decoder_with_bom_removal();
        let capacity = decoder
            .max_utf8_buffer_length_without_replacement(bytes.len())
            .unwrap_or(bytes.len());
        let mut text = String::with_capacity(capacity);
        let mut src = bytes;
        let mut dropped = 0usize;

        loop {
            let (result, read) = decoder.decode_to_string_without_replacement(src, &mut text, true);
            src = &src[read..];
            match result {
                DecoderResult::InputEmpty => break,
                DecoderResult::OutputFull => {
                    let extra = decoder
                        .max_utf8_buffer_length_without_replacement(src.len())
                        .unwrap_or(src.len())
                        .max(16);
                    text.reserve(extra);
                }
                DecoderResult::Malformed(..) => {
                    if self.mode == EncodingMode::FailFast {
                        return Err(ScanError::encoding_error(path, self.encoding.name()));
                    }
                    dropped += 1;
                }
            }
        }

        if dropped > 0 {
            debug!(
                "Dropped {} malformed {} sequences in {}",
                dropped,
                self.encoding.name(),
                path.display()
            );
        }
        Ok(text)
    }

    /// Decodes `bytes` and splits on line terminators (`\n` or `\r\n`)
    pub fn decode_lines(&self, bytes: &[u8], path: &Path) -> ScanResult<Vec<String>> {
        let text = self.decode(bytes, path)?;
        Ok(text.lines().map(str::to_owned).collect())
    }
}
