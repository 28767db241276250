use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Tesseract works best at roughly 300 DPI; larger scans are shrunk to fit.
const MAX_OCR_SIDE: u32 = 2800;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Could not read image {path}: {source}")]
    Load {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// A decoded source image together with the path it came from.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    path: PathBuf,
    image: DynamicImage,
}

impl LoadedImage {
    pub fn open(path: &Path) -> Result<Self, PreprocessError> {
        let image = image::open(path).map_err(|source| PreprocessError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { path: path.to_path_buf(), image })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

pub fn load_image(path: &Path) -> Result<LoadedImage, PreprocessError> {
    LoadedImage::open(path)
}

/// Normalize an image for OCR and return PNG bytes.
pub fn prepare_for_ocr(img: &DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    encode_as_png(normalize(img))
}

/// Factor by which [`prepare_for_ocr`] scales `img` (1.0 when it fits).
pub fn ocr_scale(img: &DynamicImage) -> f64 {
    let longest = img.width().max(img.height());
    if longest > MAX_OCR_SIDE {
        MAX_OCR_SIDE as f64 / longest as f64
    } else {
        1.0
    }
}

/// Downscale + grayscale + contrast stretch.
fn normalize(img: &DynamicImage) -> DynamicImage {
    let gray: GrayImage = if img.width() > MAX_OCR_SIDE || img.height() > MAX_OCR_SIDE {
        img.resize(MAX_OCR_SIDE, MAX_OCR_SIDE, image::imageops::FilterType::Lanczos3)
            .to_luma8()
    } else {
        img.to_luma8()
    };

    let (min_px, max_px) = gray
        .pixels()
        .fold((255u8, 0u8), |(mn, mx), p| (mn.min(p[0]), mx.max(p[0])));

    if max_px <= min_px {
        return DynamicImage::ImageLuma8(gray);
    }

    let range = (max_px - min_px) as u32;
    let stretched: GrayImage = ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0];
        Luma([((p - min_px) as u32 * 255 / range) as u8])
    });

    DynamicImage::ImageLuma8(stretched)
}

fn encode_as_png(img: DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
