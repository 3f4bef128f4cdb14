//! Page image encoding: raw page bytes → base64 payload for the vision APIs.
//!
//! Both backends accept images as base64 embedded in the JSON request body.
//! PNG is the canonical upload format because it is lossless — text
//! crispness matters far more than file size for extraction accuracy —
//! so JPEG pages are decoded and re-encoded as PNG before upload.

use crate::error::PageError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use std::io::Cursor;
use tracing::debug;

/// One rasterized page as delivered by the PDF/file-handling collaborator.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
    /// Format tag for `bytes`.
    pub format: PageFormat,
}

impl PageImage {
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            format: PageFormat::Png,
        }
    }

    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            format: PageFormat::Jpeg,
        }
    }
}

/// Supported page image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFormat {
    Png,
    Jpeg,
}

/// A page ready for upload: base64 data plus its media type.
#[derive(Debug, Clone)]
pub struct EncodedPage {
    /// Base64 (standard alphabet, padded) image data.
    pub data: String,
    /// Always `image/png` after normalization.
    pub mime_type: &'static str,
}

/// Encode a page for the provider request body.
///
/// PNG input is passed through untouched after a magic-byte check; JPEG is
/// re-encoded to PNG. Undecodable bytes are a page-level failure — the
/// document continues without this page.
pub fn encode_page(page: &PageImage, page_num: usize) -> Result<EncodedPage, PageError> {
    let png_bytes = match page.format {
        PageFormat::Png => {
            const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
            if page.bytes.len() < 8 || page.bytes[..8] != PNG_MAGIC {
                return Err(PageError::ImageInvalid {
                    page: page_num,
                    detail: "bytes tagged PNG lack the PNG signature".to_string(),
                });
            }
            page.bytes.clone()
        }
        PageFormat::Jpeg => {
            let img = image::load_from_memory_with_format(&page.bytes, ImageFormat::Jpeg)
                .map_err(|e| PageError::ImageInvalid {
                    page: page_num,
                    detail: format!("JPEG decode failed: {e}"),
                })?;
            let mut buf = Vec::new();
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .map_err(|e| PageError::ImageInvalid {
                    page: page_num,
                    detail: format!("PNG re-encode failed: {e}"),
                })?;
            buf
        }
    };

    let data = STANDARD.encode(&png_bytes);
    debug!("Encoded page {} → {} bytes base64", page_num, data.len());

    Ok(EncodedPage {
        data,
        mime_type: "image/png",
    })
}
