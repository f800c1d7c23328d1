//! Small in-memory PDFs for unit tests.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::Cursor;

/// How a test figure element points at page content.
pub enum FigureLink {
    /// Marked-content ids on a page (0-based page index).
    Mcid { page: usize, mcids: Vec<i64> },
    /// An `OBJR` to the n-th image of a page.
    Object { page: usize, image: usize },
    /// No content at all.
    Unlinked,
}

struct FigureSpec {
    link: FigureLink,
    alt: Option<String>,
}

pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    /// Page id and its image XObject ids, in resource order.
    pages: Vec<(ObjectId, Vec<ObjectId>)>,
    figures: Option<Vec<FigureSpec>>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            pages: Vec::new(),
            figures: None,
        }
    }

    /// Add a page that paints each of `images` inside its own marked-content
    /// sequence; image `i` is `/Im<i>` with MCID `i`.
    pub fn page(mut self, images: Vec<Stream>) -> Self {
        let mut xobjects = Dictionary::new();
        let mut image_ids = Vec::new();
        let mut operations = Vec::new();
        for (i, stream) in images.into_iter().enumerate() {
            let id = self.doc.add_object(stream);
            let name = format!("Im{i}");
            xobjects.set(name.clone(), Object::Reference(id));
            image_ids.push(id);
            operations.extend([
                Operation::new(
                    "BDC",
                    vec![
                        Object::Name(b"Figure".to_vec()),
                        Object::Dictionary(dictionary! { "MCID" => Object::Integer(i as i64) }),
                    ],
                ),
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    [100, 0, 0, 100, 0, 0].into_iter().map(Object::Integer).collect(),
                ),
                Operation::new("Do", vec![Object::Name(name.into_bytes())]),
                Operation::new("Q", vec![]),
                Operation::new("EMC", vec![]),
            ]);
        }
        let content = Content { operations }.encode().unwrap();
        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), content));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(self.pages_id),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! { "XObject" => xobjects },
        });
        self.pages.push((page_id, image_ids));
        self
    }

    /// Add a structure tree with no figures yet.
    pub fn tagged(mut self) -> Self {
        self.figures.get_or_insert_with(Vec::new);
        self
    }

    /// Add a figure element. The first figure sits directly under the
    /// structure root; later ones are nested in a `Sect`.
    pub fn figure(mut self, link: FigureLink, alt: Option<&str>) -> Self {
        self.figures.get_or_insert_with(Vec::new).push(FigureSpec {
            link,
            alt: alt.map(str::to_string),
        });
        self
    }

    /// One figure per image added so far, linked by MCID, in page order.
    pub fn with_figures(mut self) -> Self {
        let links: Vec<FigureLink> = self
            .pages
            .iter()
            .enumerate()
            .flat_map(|(page, (_, images))| {
                (0..images.len()).map(move |i| FigureLink::Mcid {
                    page,
                    mcids: vec![i as i64],
                })
            })
            .collect();
        self = self.tagged();
        for link in links {
            self = self.figure(link, None);
        }
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        let kids: Vec<Object> = self.pages.iter().map(|(id, _)| Object::Reference(*id)).collect();
        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(count),
            }),
        );

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(self.pages_id),
        };
        if let Some(figures) = self.figures.take() {
            let root = self.struct_tree(figures);
            catalog.set("StructTreeRoot", Object::Reference(root));
        }
        let catalog_id = self.doc.add_object(catalog);
        self.doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut out = Vec::new();
        self.doc.save_to(&mut out).unwrap();
        out
    }

    fn struct_tree(&mut self, figures: Vec<FigureSpec>) -> ObjectId {
        let mut elems = Vec::new();
        for spec in figures {
            let mut elem = dictionary! { "Type" => "StructElem", "S" => "Figure" };
            match spec.link {
                FigureLink::Mcid { page, mcids } => {
                    elem.set("Pg", Object::Reference(self.pages[page].0));
                    let kids: Vec<Object> = mcids.into_iter().map(Object::Integer).collect();
                    elem.set("K", kids);
                }
                FigureLink::Object { page, image } => {
                    let (page_id, images) = &self.pages[page];
                    elem.set(
                        "K",
                        dictionary! {
                            "Type" => "OBJR",
                            "Pg" => Object::Reference(*page_id),
                            "Obj" => Object::Reference(images[image]),
                        },
                    );
                }
                FigureLink::Unlinked => {}
            }
            if let Some(alt) = spec.alt {
                elem.set("Alt", Object::string_literal(alt));
            }
            elems.push(Object::Reference(self.doc.add_object(elem)));
        }

        let mut kids = Vec::new();
        if !elems.is_empty() {
            kids.push(elems.remove(0));
        }
        if !elems.is_empty() {
            let sect = self.doc.add_object(dictionary! {
                "Type" => "StructElem",
                "S" => "Sect",
                "K" => elems,
            });
            kids.push(Object::Reference(sect));
        }
        self.doc.add_object(dictionary! {
            "Type" => "StructTreeRoot",
            "K" => kids,
        })
    }
}

/// Uncompressed 8-bit DeviceRGB image XObject.
pub fn raw_rgb_image(width: u32, height: u32, rgb: [u8; 3]) -> Stream {
    let data: Vec<u8> = (0..width * height).flat_map(|_| rgb).collect();
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(width as i64),
            "Height" => Object::Integer(height as i64),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => Object::Integer(8),
        },
        data,
    )
}

/// DCT-encoded (JPEG) image XObject.
pub fn jpeg_image(width: u32, height: u32) -> Stream {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([20, 120, 220])));
    let mut jpeg = Vec::new();
    img.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg).unwrap();
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(width as i64),
            "Height" => Object::Integer(height as i64),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => Object::Integer(8),
            "Filter" => "DCTDecode",
        },
        jpeg,
    )
}

/// An image with a filter the extractor does not decode.
pub fn fax_image() -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(8),
            "Height" => Object::Integer(8),
            "BitsPerComponent" => Object::Integer(1),
            "Filter" => "CCITTFaxDecode",
        },
        vec![0u8; 8],
    )
}

/// Text of a PDF string object, decoding UTF-16BE when it carries a BOM.
pub fn text_of(obj: &Object) -> String {
    match obj {
        Object::String(bytes, _) if bytes.starts_with(&[0xFE, 0xFF]) => {
            let units: Vec<u16> = bytes[2..]
                .chunks(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        Object::String(bytes, _) => String::from_utf8_lossy(bytes).into_owned(),
        other => panic!("not a string: {other:?}"),
    }
}
