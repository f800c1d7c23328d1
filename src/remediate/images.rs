//! Embedded raster image extraction for alt-text generation.
//!
//! Walks each page's `/Resources /XObject` map and decodes the image streams
//! the `image` crate can reconstruct without a full PDF renderer:
//!
//! * `DCTDecode` streams are JPEG files and are decoded directly.
//! * Unfiltered or `FlateDecode` streams with 8-bit `DeviceRGB` or
//!   `DeviceGray` samples are assembled from their raw bytes.
//!
//! Anything else (CCITT, JBIG2, JPX, indexed or ICC colour spaces) is skipped.
//! Resources inherited from the page tree are not consulted.

use crate::error::RemediationError;
use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ExtractedImage {
    /// `img-<object number>`; stable across extractions of the same file.
    pub id: String,
    /// First page (1-based) on which the image appears.
    pub page: u32,
    pub image: DynamicImage,
}

pub fn image_id(object: ObjectId) -> String {
    format!("img-{}", object.0)
}

/// Decode every supported image in page order, each object at most once.
pub fn extract_images(pdf: &[u8]) -> Result<Vec<ExtractedImage>, RemediationError> {
    let doc = Document::load_mem(pdf)?;
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for (page_num, page_id) in doc.get_pages() {
        let Some(xobjects) = page_resource(&doc, page_id, b"XObject") else {
            continue;
        };
        for (_, obj) in xobjects.iter() {
            let Ok(id) = obj.as_reference() else {
                continue;
            };
            if !seen.insert(id) {
                continue;
            }
            let Ok(stream) = doc.get_object(id).and_then(Object::as_stream) else {
                continue;
            };
            if !is_image(&stream.dict) {
                continue;
            }
            match decode_image(stream) {
                Some(image) => images.push(ExtractedImage {
                    id: image_id(id),
                    page: page_num,
                    image,
                }),
                None => debug!("Skipping unsupported image {} on page {}", id.0, page_num),
            }
        }
    }

    debug!("Extracted {} images", images.len());
    Ok(images)
}

pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// A named sub-dictionary (`XObject`, `Properties`, ...) of a page's own
/// `/Resources`.
pub(crate) fn page_resource<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Dictionary> {
    let page = doc.get_object(page_id).and_then(Object::as_dict).ok()?;
    let resources = resolve(doc, page.get(b"Resources").ok()?).as_dict().ok()?;
    resolve(doc, resources.get(key).ok()?).as_dict().ok()
}

/// Object id of the image XObject registered under `name` on a page.
pub(crate) fn page_image(doc: &Document, page_id: ObjectId, name: &[u8]) -> Option<ObjectId> {
    let id = page_resource(doc, page_id, b"XObject")?
        .get(name)
        .and_then(Object::as_reference)
        .ok()?;
    let stream = doc.get_object(id).and_then(Object::as_stream).ok()?;
    is_image(&stream.dict).then_some(id)
}

fn is_image(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(n)) if n.as_slice() == b"Image")
}

fn filters(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![n.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|i| i.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

fn dimension(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    dict.get(key)
        .and_then(Object::as_i64)
        .ok()
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v > 0)
}

fn decode_image(stream: &Stream) -> Option<DynamicImage> {
    let filters = filters(&stream.dict);
    match filters.as_slice() {
        [f] if f.as_slice() == b"DCTDecode" => image::load_from_memory(&stream.content).ok(),
        [] => decode_raw(&stream.dict, &stream.content),
        [f] if f.as_slice() == b"FlateDecode" => {
            let data = stream.decompressed_content().ok()?;
            decode_raw(&stream.dict, &data)
        }
        _ => None,
    }
}

fn decode_raw(dict: &Dictionary, data: &[u8]) -> Option<DynamicImage> {
    let width = dimension(dict, b"Width")?;
    let height = dimension(dict, b"Height")?;
    if dimension(dict, b"BitsPerComponent")? != 8 {
        return None;
    }
    let channels = match dict.get(b"ColorSpace") {
        Ok(Object::Name(n)) if n.as_slice() == b"DeviceRGB" => 3,
        Ok(Object::Name(n)) if n.as_slice() == b"DeviceGray" => 1,
        _ => return None,
    };
    let len = (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(channels)?;
    let samples = data.get(..len)?.to_vec();

    if channels == 3 {
        RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8)
    } else {
        GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8)
    }
}
