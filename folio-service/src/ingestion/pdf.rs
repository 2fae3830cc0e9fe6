//! Embedded picture extraction from PDF documents.
//!
//! Pictures are the image XObjects referenced from each page's resources,
//! including those nested inside form XObjects. They are yielded lazily in
//! document order: page ascending, then position within the page.
//!
//! - JPEG and JPEG 2000 streams are passed through untouched
//! - Unfiltered, Flate or LZW 8-bit samples are re-encoded as PNG
//! - JBIG2 streams are skipped; the description service cannot read them
//!
//! A picture that cannot be decoded is skipped without ending the sequence.

use std::collections::HashSet;
use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document as PdfDocument, Object, ObjectId, Stream};
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};

/// Form XObjects nest; deeper chains are ignored
const MAX_FORM_DEPTH: usize = 4;

/// Encoding of extracted picture bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureEncoding {
    Jpeg,
    Jpeg2000,
    Png,
}

impl PictureEncoding {
    pub fn extension(&self) -> &'static str {
        match self {
            PictureEncoding::Jpeg => "jpg",
            PictureEncoding::Jpeg2000 => "jpx",
            PictureEncoding::Png => "png",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            PictureEncoding::Jpeg => "image/jpeg",
            PictureEncoding::Jpeg2000 => "image/jpx",
            PictureEncoding::Png => "image/png",
        }
    }
}

/// One picture pulled out of a document
#[derive(Debug, Clone)]
pub struct ExtractedPicture {
    /// 1-based page number
    pub page_number: u32,
    /// 1-based position among the page's images, counting skipped ones
    pub image_index: u32,
    pub data: Vec<u8>,
    pub encoding: PictureEncoding,
}

/// A parsed PDF ready for picture extraction
pub struct PdfSource {
    doc: PdfDocument,
}

impl PdfSource {
    /// Parse the whole document, failing with `MalformedDocument` when it is unreadable
    pub fn parse(content: &[u8]) -> ServiceResult<Self> {
        let doc = PdfDocument::load_mem(content).map_err(|e| ServiceError::MalformedDocument {
            message: e.to_string(),
        })?;

        Ok(Self { doc })
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Start a fresh pass over the document's pictures
    pub fn pictures(&self) -> Pictures<'_> {
        Pictures {
            doc: &self.doc,
            pages: self.doc.get_pages().into_iter(),
            page_number: 0,
            pending: Vec::new().into_iter(),
        }
    }
}

/// Lazy iterator over a document's pictures; see [`PdfSource::pictures`]
pub struct Pictures<'a> {
    doc: &'a PdfDocument,
    pages: std::collections::btree_map::IntoIter<u32, ObjectId>,
    page_number: u32,
    pending: std::vec::IntoIter<(u32, ObjectId)>,
}

impl Iterator for Pictures<'_> {
    type Item = ExtractedPicture;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((image_index, object_id)) = self.pending.next() {
                match decode_image(self.doc, object_id) {
                    Ok((data, encoding)) => {
                        return Some(ExtractedPicture {
                            page_number: self.page_number,
                            image_index,
                            data,
                            encoding,
                        });
                    }
                    Err(reason) => {
                        debug!(
                            page = self.page_number,
                            image_index = image_index,
                            object = ?object_id,
                            reason = %reason,
                            "Skipping embedded image"
                        );
                        continue;
                    }
                }
            }

            let (page_number, page_id) = self.pages.next()?;
            self.page_number = page_number;
            self.pending = page_image_ids(self.doc, page_id)
                .into_iter()
                .zip(1u32..)
                .map(|(id, index)| (index, id))
                .collect::<Vec<_>>()
                .into_iter();
        }
    }
}

/// Why a single embedded image was not yielded
#[derive(Debug)]
enum SkipReason {
    Jbig2,
    Unsupported(String),
    Corrupt(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Jbig2 => write!(f, "JBIG2 bitmap"),
            SkipReason::Unsupported(what) => write!(f, "unsupported {}", what),
            SkipReason::Corrupt(what) => write!(f, "corrupt image: {}", what),
        }
    }
}

fn resolve<'a>(doc: &'a PdfDocument, object: &'a Object) -> Option<&'a Object> {
    doc.dereference(object).ok().map(|(_, resolved)| resolved)
}

fn resolve_dict<'a>(doc: &'a PdfDocument, object: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, object).and_then(|o| o.as_dict().ok())
}

/// Resources of a page, following inheritance through the page tree
fn page_resources(doc: &PdfDocument, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;

    // Page trees are shallow; the bound guards against Parent cycles
    for _ in 0..32 {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        node = resolve_dict(doc, node.get(b"Parent").ok()?)?;
    }

    None
}

/// Image XObjects of a page in resource order, without duplicates
fn page_image_ids(doc: &PdfDocument, page_id: ObjectId) -> Vec<ObjectId> {
    let mut ids = Vec::new();
    let mut seen = HashSet::new();

    if let Some(resources) = page_resources(doc, page_id) {
        collect_images(doc, resources, 0, &mut seen, &mut ids);
    }

    ids
}

fn collect_images(
    doc: &PdfDocument,
    resources: &Dictionary,
    depth: usize,
    seen: &mut HashSet<ObjectId>,
    ids: &mut Vec<ObjectId>,
) {
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|o| resolve_dict(doc, o))
    else {
        return;
    };

    for (_, entry) in xobjects.iter() {
        // XObjects are always indirect
        let Ok(id) = entry.as_reference() else {
            continue;
        };
        if !seen.insert(id) {
            continue;
        }
        let Ok(stream) = doc.get_object(id).and_then(Object::as_stream) else {
            continue;
        };

        match name_of(&stream.dict, b"Subtype") {
            Some(b"Image") => ids.push(id),
            Some(b"Form") if depth < MAX_FORM_DEPTH => {
                if let Some(nested) = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|o| resolve_dict(doc, o))
                {
                    collect_images(doc, nested, depth + 1, seen, ids);
                }
            }
            _ => {}
        }
    }
}

fn name_of<'a>(dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    dict.get(key).ok().and_then(|o| o.as_name().ok())
}

/// Filter names of a stream, whether given as a single name or an array
fn filters_of(doc: &PdfDocument, dict: &Dictionary) -> Vec<Vec<u8>> {
    let Some(filter) = dict.get(b"Filter").ok().and_then(|o| resolve(doc, o)) else {
        return Vec::new();
    };

    match filter {
        Object::Name(name) => vec![name.clone()],
        Object::Array(items) => items
            .iter()
            .filter_map(|item| item.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

fn decode_image(
    doc: &PdfDocument,
    object_id: ObjectId,
) -> Result<(Vec<u8>, PictureEncoding), SkipReason> {
    let stream = doc
        .get_object(object_id)
        .and_then(Object::as_stream)
        .map_err(|e| SkipReason::Corrupt(e.to_string()))?;

    let filters = filters_of(doc, &stream.dict);
    let filter_names: Vec<&[u8]> = filters.iter().map(Vec::as_slice).collect();

    match filter_names.as_slice() {
        [b"DCTDecode"] => Ok((stream.content.clone(), PictureEncoding::Jpeg)),
        [b"JPXDecode"] => Ok((stream.content.clone(), PictureEncoding::Jpeg2000)),
        [b"JBIG2Decode"] => Err(SkipReason::Jbig2),
        [] => encode_samples(doc, stream, stream.content.clone()),
        [b"FlateDecode"] | [b"LZWDecode"] => {
            let samples = stream
                .decompressed_content()
                .map_err(|e| SkipReason::Corrupt(e.to_string()))?;
            encode_samples(doc, stream, samples)
        }
        other => Err(SkipReason::Unsupported(format!(
            "filter chain {:?}",
            other
                .iter()
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .collect::<Vec<_>>()
        ))),
    }
}

/// Colour layout of raw image samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Samples {
    Gray,
    Rgb,
    Cmyk,
}

impl Samples {
    fn components(&self) -> usize {
        match self {
            Samples::Gray => 1,
            Samples::Rgb => 3,
            Samples::Cmyk => 4,
        }
    }
}

fn color_space_of(doc: &PdfDocument, dict: &Dictionary) -> Result<Samples, SkipReason> {
    let object = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| resolve(doc, o))
        .ok_or_else(|| SkipReason::Unsupported("missing colour space".to_string()))?;

    match object {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" => Ok(Samples::Gray),
            b"DeviceRGB" | b"CalRGB" => Ok(Samples::Rgb),
            b"DeviceCMYK" => Ok(Samples::Cmyk),
            other => Err(SkipReason::Unsupported(format!(
                "colour space {}",
                String::from_utf8_lossy(other)
            ))),
        },
        // [/ICCBased stream]: the profile's /N gives the component count
        Object::Array(items) if items.first().and_then(|o| o.as_name().ok()) == Some(&b"ICCBased"[..]) => {
            let components = items
                .get(1)
                .and_then(|o| resolve(doc, o))
                .and_then(|o| o.as_stream().ok())
                .and_then(|profile| profile.dict.get(b"N").ok())
                .and_then(|n| n.as_i64().ok());

            match components {
                Some(1) => Ok(Samples::Gray),
                Some(3) => Ok(Samples::Rgb),
                Some(4) => Ok(Samples::Cmyk),
                _ => Err(SkipReason::Unsupported("ICC profile".to_string())),
            }
        }
        _ => Err(SkipReason::Unsupported("colour space".to_string())),
    }
}

fn dimension(dict: &Dictionary, key: &[u8]) -> Result<u32, SkipReason> {
    dict.get(key)
        .ok()
        .and_then(|o| o.as_i64().ok())
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v > 0)
        .ok_or_else(|| SkipReason::Corrupt(format!("bad {}", String::from_utf8_lossy(key))))
}

/// Re-encode raw 8-bit samples as PNG
fn encode_samples(
    doc: &PdfDocument,
    stream: &Stream,
    mut samples: Vec<u8>,
) -> Result<(Vec<u8>, PictureEncoding), SkipReason> {
    let dict = &stream.dict;

    if matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true))) {
        return Err(SkipReason::Unsupported("stencil mask".to_string()));
    }

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok());
    if bits != Some(8) {
        return Err(SkipReason::Unsupported(format!(
            "bits per component {:?}",
            bits
        )));
    }

    let width = dimension(dict, b"Width")?;
    let height = dimension(dict, b"Height")?;
    let layout = color_space_of(doc, dict)?;

    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(layout.components()))
        .ok_or_else(|| SkipReason::Corrupt(format!("dimensions {}x{} too large", width, height)))?;
    if samples.len() < expected {
        return Err(SkipReason::Corrupt(format!(
            "{} sample bytes, expected {}",
            samples.len(),
            expected
        )));
    }
    samples.truncate(expected);

    let image = match layout {
        Samples::Gray => GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8),
        Samples::Rgb => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
        Samples::Cmyk => {
            RgbImage::from_raw(width, height, cmyk_to_rgb(&samples)).map(DynamicImage::ImageRgb8)
        }
    }
    .ok_or_else(|| SkipReason::Corrupt("sample buffer size".to_string()))?;

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| SkipReason::Corrupt(e.to_string()))?;

    Ok((png, PictureEncoding::Png))
}

/// Naive CMYK to RGB; colour accuracy is irrelevant for describing content
fn cmyk_to_rgb(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - u16::from(px[3]);
            let channel = |c: u8| ((255 - u16::from(c)) * k / 255) as u8;
            [channel(px[0]), channel(px[1]), channel(px[2])]
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Builds small PDFs with chosen embedded images.

    use lopdf::{Dictionary, Document, Object, Stream, dictionary};

    /// An image to embed
    #[derive(Clone)]
    pub enum TestImage {
        /// Opaque bytes stored as a DCTDecode stream
        Jpeg(Vec<u8>),
        Jbig2,
        /// Unfiltered DeviceRGB samples
        RawRgb { width: i64, height: i64, samples: Vec<u8> },
    }

    impl TestImage {
        fn into_stream(self) -> Stream {
            match self {
                TestImage::Jpeg(bytes) => Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => 1,
                        "Height" => 1,
                        "ColorSpace" => "DeviceRGB",
                        "BitsPerComponent" => 8,
                        "Filter" => "DCTDecode",
                    },
                    bytes,
                ),
                TestImage::Jbig2 => Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => 8,
                        "Height" => 8,
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => 1,
                        "Filter" => "JBIG2Decode",
                    },
                    vec![0u8; 16],
                ),
                TestImage::RawRgb {
                    width,
                    height,
                    samples,
                } => Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => width,
                        "Height" => height,
                        "ColorSpace" => "DeviceRGB",
                        "BitsPerComponent" => 8,
                    },
                    samples,
                ),
            }
        }
    }

    /// Build a PDF with one page per entry, each holding the given images.
    /// When `inherit_resources` is set, the resources live on the page tree
    /// root instead of the (single) page.
    pub fn build_pdf_with(pages: Vec<Vec<TestImage>>, inherit_resources: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();
        let mut shared_resources = None;

        for images in pages {
            let mut xobjects = Dictionary::new();
            for (i, image) in images.into_iter().enumerate() {
                let id = doc.add_object(image.into_stream());
                xobjects.set(format!("Im{}", i + 1), id);
            }
            let resources = dictionary! { "XObject" => xobjects };

            let content_id = doc.add_object(Stream::new(dictionary! {}, b"q Q".to_vec()));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
            };
            if inherit_resources {
                shared_resources = Some(resources);
            } else {
                page.set("Resources", resources);
            }
            kids.push(doc.add_object(page).into());
        }

        let count = kids.len() as i64;
        let mut pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        };
        if let Some(resources) = shared_resources {
            pages_dict.set("Resources", resources);
        }
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    pub fn build_pdf(pages: Vec<Vec<TestImage>>) -> Vec<u8> {
        build_pdf_with(pages, false)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{TestImage, build_pdf, build_pdf_with};
    use super::*;

    fn positions(source: &PdfSource) -> Vec<(u32, u32, PictureEncoding)> {
        source
            .pictures()
            .map(|p| (p.page_number, p.image_index, p.encoding))
            .collect()
    }

    #[test]
    fn test_document_order_and_jbig2_skip() {
        let pdf = build_pdf(vec![
            vec![
                TestImage::Jpeg(b"first".to_vec()),
                TestImage::Jbig2,
                TestImage::Jpeg(b"third".to_vec()),
            ],
            vec![],
            vec![TestImage::Jpeg(b"page three".to_vec())],
        ]);
        let source = PdfSource::parse(&pdf).unwrap();

        assert_eq!(source.page_count(), 3);
        assert_eq!(
            positions(&source),
            vec![
                (1, 1, PictureEncoding::Jpeg),
                (1, 3, PictureEncoding::Jpeg),
                (3, 1, PictureEncoding::Jpeg),
            ]
        );

        let first = source.pictures().next().unwrap();
        assert_eq!(first.data, b"first".to_vec());
    }

    #[test]
    fn test_sequence_is_restartable() {
        let pdf = build_pdf(vec![vec![
            TestImage::Jpeg(b"a".to_vec()),
            TestImage::Jpeg(b"b".to_vec()),
        ]]);
        let source = PdfSource::parse(&pdf).unwrap();

        assert_eq!(source.pictures().count(), 2);
        assert_eq!(positions(&source), positions(&source));
    }

    #[test]
    fn test_raw_samples_become_png() {
        let pdf = build_pdf(vec![vec![TestImage::RawRgb {
            width: 2,
            height: 2,
            samples: vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255],
        }]]);
        let source = PdfSource::parse(&pdf).unwrap();

        let picture = source.pictures().next().unwrap();
        assert_eq!(picture.encoding, PictureEncoding::Png);
        assert_eq!(&picture.data[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&picture.data).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (2, 2));
        assert_eq!(decoded.get_pixel(1, 0).0, [0, 255, 0]);
    }

    #[test]
    fn test_truncated_samples_are_skipped() {
        let pdf = build_pdf(vec![vec![
            TestImage::RawRgb {
                width: 4,
                height: 4,
                samples: vec![0; 5],
            },
            TestImage::Jpeg(b"ok".to_vec()),
        ]]);
        let source = PdfSource::parse(&pdf).unwrap();

        assert_eq!(positions(&source), vec![(1, 2, PictureEncoding::Jpeg)]);
    }

    #[test]
    fn test_oversized_dimensions_are_skipped() {
        let pdf = build_pdf(vec![vec![
            TestImage::RawRgb {
                width: i64::from(u32::MAX),
                height: i64::from(u32::MAX),
                samples: vec![0; 12],
            },
            TestImage::Jpeg(b"after".to_vec()),
        ]]);
        let source = PdfSource::parse(&pdf).unwrap();

        let pictures: Vec<_> = source.pictures().collect();
        assert_eq!(pictures.len(), 1);
        assert_eq!(pictures[0].image_index, 2);
        assert_eq!(pictures[0].data, b"after".to_vec());
    }

    #[test]
    fn test_inherited_resources() {
        let pdf = build_pdf_with(vec![vec![TestImage::Jpeg(b"shared".to_vec())]], true);
        let source = PdfSource::parse(&pdf).unwrap();

        assert_eq!(positions(&source), vec![(1, 1, PictureEncoding::Jpeg)]);
    }

    #[test]
    fn test_zero_images() {
        let pdf = build_pdf(vec![vec![], vec![]]);
        let source = PdfSource::parse(&pdf).unwrap();
        assert_eq!(source.pictures().count(), 0);
    }

    #[test]
    fn test_malformed_document() {
        let result = PdfSource::parse(b"plain text, not a document");
        assert!(matches!(result, Err(ServiceError::MalformedDocument { .. })));
    }

    #[test]
    fn test_cmyk_conversion() {
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 0]), vec![255, 255, 255]);
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 255]), vec![0, 0, 0]);
        assert_eq!(cmyk_to_rgb(&[255, 0, 0, 0]), vec![0, 255, 255]);
    }
}
