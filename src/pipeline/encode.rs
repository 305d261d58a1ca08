//! Image encoding: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! PNG is lossless, which matters far more than file size for OCR accuracy:
//! JPEG artefacts around glyph edges confuse vision models.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Local;
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Encode a rasterised page as a base64 PNG ready for the vision request.
///
/// `detail: "high"` asks tiling providers to keep fine print; Ollama ignores it.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// File name for a persisted page: `page_{index}_{timestamp}.png`.
///
/// The microsecond timestamp keeps repeated uploads of the same document
/// from overwriting each other's images.
pub fn page_image_name(page_index: usize) -> String {
    format!(
        "page_{}_{}.png",
        page_index,
        Local::now().format("%Y%m%d%H%M%S%6f")
    )
}

/// Write a rendered page into `dir` as PNG and return its path.
pub fn persist_page_image(
    dir: &Path,
    page_index: usize,
    img: &DynamicImage,
) -> Result<PathBuf, image::ImageError> {
    std::fs::create_dir_all(dir).map_err(image::ImageError::IoError)?;
    let path = dir.join(page_image_name(page_index));
    img.save_with_format(&path, image::ImageFormat::Png)?;
    debug!("Saved page {} image → {}", page_index, path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn red_square() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([255, 0, 0])))
    }

    #[test]
    fn encode_small_image() {
        let data = encode_page(&red_square()).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }

    #[test]
    fn page_image_name_shape() {
        let name = page_image_name(3);
        assert!(name.starts_with("page_3_"), "got: {name}");
        assert!(name.ends_with(".png"), "got: {name}");
        // %Y%m%d%H%M%S%6f → 14 + 6 digits
        let stamp = &name["page_3_".len()..name.len() - ".png".len()];
        assert_eq!(stamp.len(), 20);
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn persist_writes_png_into_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("static");
        let path = persist_page_image(&dir, 0, &red_square()).unwrap();
        assert!(path.starts_with(&dir));
        let reloaded = image::open(&path).unwrap();
        assert_eq!(reloaded.width(), 10);
    }
}
