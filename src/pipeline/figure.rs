//! First-figure extraction via pdfium.
//!
//! Only the first image of the first page that has any image is considered.
//! Overview figures tend to be wide, so that image is kept only when its
//! aspect ratio is at least 4:3; otherwise the paper has no figure. pdfium is
//! not async-safe, so the scan runs inside `spawn_blocking`.

use crate::config::DigestConfig;
use crate::error::DigestError;
use crate::pipeline::input::{download_pdf, pdf_basename};
use image::{DynamicImage, ImageFormat};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn, Instrument, Span};

/// Smallest accepted width / height.
pub const MIN_ASPECT_RATIO: f64 = 4.0 / 3.0;

/// Whether a `width × height` image is wide enough to be kept.
pub fn passes_aspect_gate(width: u32, height: u32) -> bool {
    height > 0 && f64::from(width) / f64::from(height) >= MIN_ASPECT_RATIO
}

/// First item of the first non-empty page, consuming pages lazily.
pub fn first_image<P, T>(pages: P) -> Option<T>
where
    P: IntoIterator,
    P::Item: IntoIterator<Item = T>,
{
    pages.into_iter().find_map(|page| page.into_iter().next())
}

/// Where the figure of `pdf_url` is stored.
pub fn figure_path(images_dir: &Path, pdf_url: &str, ext: &str) -> PathBuf {
    images_dir.join(format!("{}.{}", pdf_basename(pdf_url), ext))
}

/// A decoded embedded image and the extension matching its PDF encoding.
#[derive(Debug, Clone)]
pub struct Figure {
    pub image: DynamicImage,
    /// `jpeg` for DCT-encoded images, `png` otherwise.
    pub ext: &'static str,
}

/// Bind to the pdfium library.
///
/// `PDFIUM_LIB_PATH` may name the library file or its directory; otherwise the
/// working directory and then the system library path are tried.
pub fn bind_pdfium() -> Result<Pdfium, DigestError> {
    let bindings = match std::env::var_os("PDFIUM_LIB_PATH") {
        Some(dir) => {
            let dir = PathBuf::from(dir);
            if dir.is_file() {
                Pdfium::bind_to_library(&dir)
            } else {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
            }
        }
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| DigestError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

fn first_image_on(page: &PdfPage) -> Option<Result<Figure, String>> {
    let objects = page.objects();
    let object = objects.iter().find(|o| o.as_image_object().is_some())?;
    let image_object = object.as_image_object()?;

    let is_jpeg = image_object
        .filters()
        .iter()
        .any(|f| f.name() == "DCTDecode");
    Some(
        image_object
            .get_raw_image()
            .map(|image| Figure {
                image,
                ext: if is_jpeg { "jpeg" } else { "png" },
            })
            .map_err(|e| format!("{e:?}")),
    )
}

/// Scan a local PDF. Parse and decode problems yield `Ok(None)`.
fn find_first_figure(pdf_path: &Path) -> Result<Option<Figure>, DigestError> {
    let pdfium = bind_pdfium()?;
    let document = match pdfium.load_pdf_from_file(pdf_path, None) {
        Ok(d) => d,
        Err(e) => {
            warn!("Could not open {}: {:?}", pdf_path.display(), e);
            return Ok(None);
        }
    };

    let pages = document.pages();
    debug!("PDF loaded: {} pages", pages.len());
    match first_image(pages.iter().map(|page| first_image_on(&page))) {
        None => {
            info!("Found no image in {}", pdf_path.display());
            Ok(None)
        }
        Some(Err(detail)) => {
            warn!("Failed to extract an image from {}: {}", pdf_path.display(), detail);
            Ok(None)
        }
        Some(Ok(figure)) => {
            let (w, h) = (figure.image.width(), figure.image.height());
            if passes_aspect_gate(w, h) {
                Ok(Some(figure))
            } else {
                info!("First image is {}x{}, narrower than 4:3; no figure", w, h);
                Ok(None)
            }
        }
    }
}

/// Write `figure` to `path` via a sibling temp file and rename.
pub fn save_figure(figure: &Figure, path: &Path) -> Result<(), DigestError> {
    let write_err = |source: std::io::Error| DigestError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }

    let tmp = path.with_extension(format!("{}.tmp", figure.ext));
    let result = if figure.ext == "jpeg" {
        DynamicImage::ImageRgb8(figure.image.to_rgb8()).save_with_format(&tmp, ImageFormat::Jpeg)
    } else {
        figure.image.save_with_format(&tmp, ImageFormat::Png)
    };
    result.map_err(|e| write_err(std::io::Error::other(e.to_string())))?;
    std::fs::rename(&tmp, path).map_err(write_err)
}

/// Downloads PDFs and saves their first figure under `images_dir`.
#[derive(Debug, Clone)]
pub struct FigureExtractor {
    images_dir: PathBuf,
    download_timeout_secs: u64,
    span: Span,
}

impl FigureExtractor {
    pub fn new(images_dir: impl Into<PathBuf>, download_timeout_secs: u64) -> Self {
        Self {
            images_dir: images_dir.into(),
            download_timeout_secs,
            span: tracing::info_span!("figure"),
        }
    }

    pub fn from_config(config: &DigestConfig) -> Self {
        Self::new(config.images_dir(), config.download_timeout_secs)
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Path of the saved figure, or `None` when the paper has no usable one.
    ///
    /// Download errors are returned; the temporary PDF is removed either way.
    pub async fn extract_first_figure(&self, pdf_url: &str) -> Result<Option<PathBuf>, DigestError> {
        async {
            let pdf = download_pdf(pdf_url, self.download_timeout_secs).await?;
            let pdf_path = pdf.path().to_path_buf();
            let images_dir = self.images_dir.clone();
            let url = pdf_url.to_string();

            let saved = tokio::task::spawn_blocking(move || {
                let Some(figure) = find_first_figure(&pdf_path)? else {
                    return Ok(None);
                };
                let path = figure_path(&images_dir, &url, figure.ext);
                save_figure(&figure, &path)?;
                Ok(Some(path))
            })
            .await
            .map_err(|e| DigestError::Internal(format!("Figure task panicked: {}", e)))?;

            drop(pdf);
            if let Ok(Some(path)) = &saved {
                info!("Saved first figure of {} at {}", pdf_url, path.display());
            }
            saved
        }
        .instrument(self.span.clone())
        .await
    }
}
