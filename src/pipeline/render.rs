//! PDF rasterisation: PDF bytes → ordered RGB page bitmaps.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and does CPU-heavy work. [`PdfiumRasterizer`] therefore runs on
//! Tokio's blocking pool so request handlers keep making progress while a
//! large document is rendered.
//!
//! ## Why a fixed scale instead of DPI?
//!
//! Vision models read small print much better when the page is enlarged. A
//! 2× linear factor over pdfium's default 72-DPI page size gives ~144 DPI,
//! which keeps resume-sized text crisp without blowing up the request body.

use crate::error::RagError;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One rasterised page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 0-based page index, in document order.
    pub page_index: usize,
    /// RGB8 bitmap.
    pub image: DynamicImage,
}

/// Turns a PDF byte stream into page bitmaps.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Render every page in document order.
    ///
    /// Fails with [`RagError::DocumentParse`] when the bytes are not a readable PDF.
    async fn rasterize(&self, filename: &str, bytes: &[u8]) -> Result<Vec<RenderedPage>, RagError>;
}

/// Reject byte streams that cannot possibly be a PDF before handing them to pdfium.
pub fn check_pdf_magic(filename: &str, bytes: &[u8]) -> Result<(), RagError> {
    if bytes.len() < 4 {
        return Err(RagError::DocumentParse {
            filename: filename.to_string(),
            detail: format!("only {} bytes, too short to be a PDF", bytes.len()),
        });
    }
    if &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(RagError::DocumentParse {
            filename: filename.to_string(),
            detail: format!("missing %PDF header, first bytes: {:?}", magic),
        });
    }
    Ok(())
}

/// pdfium-backed rasterizer.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    scale: f32,
    library: Option<PathBuf>,
}

impl PdfiumRasterizer {
    /// `library` is an explicit libpdfium path; `None` tries `PDFIUM_LIB_PATH`,
    /// then the system library.
    pub fn new(scale: f32, library: Option<PathBuf>) -> Self {
        Self { scale, library }
    }
}

#[async_trait]
impl PageRasterizer for PdfiumRasterizer {
    async fn rasterize(&self, filename: &str, bytes: &[u8]) -> Result<Vec<RenderedPage>, RagError> {
        check_pdf_magic(filename, bytes)?;

        let name = filename.to_string();
        let data = bytes.to_vec();
        let scale = self.scale;
        let library = self.library.clone();

        tokio::task::spawn_blocking(move || {
            render_pages_blocking(&name, &data, scale, library.as_deref())
        })
        .await
        .map_err(|e| RagError::Internal(format!("Render task panicked: {}", e)))?
    }
}

/// Bind to pdfium: explicit path, then `PDFIUM_LIB_PATH`, then the system library.
fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, RagError> {
    let env_path = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from);

    let bindings = match library.map(Path::to_path_buf).or(env_path) {
        Some(path) => Pdfium::bind_to_library(&path)
            .map_err(|e| RagError::PdfiumBindingFailed(format!("{}: {:?}", path.display(), e)))?,
        None => Pdfium::bind_to_system_library()
            .map_err(|e| RagError::PdfiumBindingFailed(format!("{:?}", e)))?,
    };

    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of page rendering.
fn render_pages_blocking(
    filename: &str,
    bytes: &[u8],
    scale: f32,
    library: Option<&Path>,
) -> Result<Vec<RenderedPage>, RagError> {
    let pdfium = bind_pdfium(library)?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| RagError::DocumentParse {
            filename: filename.to_string(),
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let total_pages = pages.len();
    info!("PDF '{}' loaded: {} pages", filename, total_pages);

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

    let mut results = Vec::with_capacity(total_pages as usize);

    for idx in 0..total_pages {
        let page = pages.get(idx).map_err(|e| RagError::DocumentParse {
            filename: filename.to_string(),
            detail: format!("page {}: {:?}", idx, e),
        })?;

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| RagError::DocumentParse {
                filename: filename.to_string(),
                detail: format!("rendering page {}: {:?}", idx, e),
            })?;

        let image = DynamicImage::ImageRgb8(bitmap.as_image().to_rgb8());
        debug!(
            "Rendered '{}' page {} → {}x{} px",
            filename,
            idx,
            image.width(),
            image.height()
        );

        results.push(RenderedPage {
            page_index: idx as usize,
            image,
        });
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_check_accepts_pdf_header() {
        assert!(check_pdf_magic("a.pdf", b"%PDF-1.7\n...").is_ok());
    }

    #[test]
    fn magic_check_rejects_other_bytes() {
        let err = check_pdf_magic("a.pdf", b"PK\x03\x04zip").unwrap_err();
        match err {
            RagError::DocumentParse { filename, detail } => {
                assert_eq!(filename, "a.pdf");
                assert!(detail.contains("%PDF"), "got: {detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn magic_check_rejects_short_input() {
        assert!(check_pdf_magic("a.pdf", b"").unwrap_err().is_client_error());
        assert!(check_pdf_magic("a.pdf", b"%PD").is_err());
    }

    #[tokio::test]
    async fn pdfium_rasterizer_rejects_garbage_before_binding() {
        // The magic check runs first, so no pdfium library is needed here.
        let r = PdfiumRasterizer::new(2.0, Some(PathBuf::from("/nonexistent/libpdfium.so")));
        let err = r.rasterize("junk.pdf", b"not a pdf at all").await.unwrap_err();
        assert!(matches!(err, RagError::DocumentParse { .. }));
    }
}
