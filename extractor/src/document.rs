use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};
use slide_deck_common::frame::EncodedSlide;
use std::path::Path;
use tracing::{debug, info};

const PDF_VERSION: &str = "1.5";
const IMAGE_NAME: &str = "Im0";

/// One page of the deck. Its size is the slide's pixel size and its image
/// is the slide's stored JPEG.
#[derive(Debug, Clone, Copy)]
pub struct Page<'a> {
    pub seq: u32,
    pub width: u32,
    pub height: u32,
    pub jpeg: &'a [u8],
}

/// Ordered pages borrowed from the kept slides. Always has at least one page.
#[derive(Debug)]
pub struct Document<'a> {
    pages: Vec<Page<'a>>,
}

impl<'a> Document<'a> {
    /// Lay out one page per slide in sequence order.
    ///
    /// Returns `None` for an empty deck: there is no zero-page document.
    pub fn assemble(slides: &'a [EncodedSlide]) -> Option<Self> {
        if slides.is_empty() {
            return None;
        }

        let mut ordered: Vec<&EncodedSlide> = slides.iter().collect();
        ordered.sort_by_key(|s| s.seq);

        let pages = ordered
            .into_iter()
            .map(|slide| Page {
                seq: slide.seq,
                width: slide.width,
                height: slide.height,
                jpeg: &slide.jpeg,
            })
            .collect();
        Some(Self { pages })
    }

    #[cfg(test)]
    pub fn pages(&self) -> &[Page<'a>] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Serialize as a PDF with one point per pixel, each slide's JPEG
    /// embedded unchanged and drawn over its whole page.
    pub fn to_pdf(&self) -> Result<Vec<u8>, DocumentError> {
        let mut doc = lopdf::Document::with_version(PDF_VERSION);
        let pages_id = doc.new_object_id();
        let mut kids = Vec::with_capacity(self.pages.len());

        for page in &self.pages {
            let width = i64::from(page.width);
            let height = i64::from(page.height);

            let image_stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width,
                    "Height" => height,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8_i64,
                    "Filter" => "DCTDecode",
                },
                page.jpeg.to_vec(),
            )
            .with_compression(false);
            let image_id = doc.add_object(image_stream);

            let content = Content {
                operations: vec![
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![
                            width.into(),
                            0_i64.into(),
                            0_i64.into(),
                            height.into(),
                            0_i64.into(),
                            0_i64.into(),
                        ],
                    ),
                    Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                    Operation::new("Q", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().map_err(|e| DocumentError::Content(e.to_string()))?,
            ));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0_i64.into(), 0_i64.into(), width.into(), height.into()],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "XObject" => dictionary! {
                        IMAGE_NAME => image_id,
                    },
                },
            });
            debug!(seq = page.seq, width, height, "placed page");
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out)
            .map_err(|e| DocumentError::Serialize(e.to_string()))?;
        Ok(out)
    }

    /// Build the whole PDF in memory, then write it to `path` in one go.
    pub fn write_pdf(&self, path: &Path) -> Result<(), DocumentError> {
        let bytes = self.to_pdf()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| DocumentError::Write(parent.display().to_string(), e))?;
        }
        std::fs::write(path, &bytes)
            .map_err(|e| DocumentError::Write(path.display().to_string(), e))?;
        info!(
            path = %path.display(),
            pages = self.pages.len(),
            bytes = bytes.len(),
            "document written"
        );
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to encode page content: {0}")]
    Content(String),
    #[error("failed to serialize document: {0}")]
    Serialize(String),
    #[error("failed to write document {0}: {1}")]
    Write(String, std::io::Error),
}
