// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF canvas — builds the output document object by object with `lopdf`.
//
// Each page collects its content operations, image XObjects, link annotations
// and the named destinations that point at it. `new_page` seals the page into
// the document; `save` seals any trailing page, writes the page tree, the
// catalog with its `/Dests` name tree, and the `/Info` dictionary, then
// persists the file atomically next to its final path.

use std::collections::BTreeMap;
use std::path::Path;

use image::ImageFormat;
use kurbo::{BezPath, PathEl, Point, QuadBez};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

use kindling_core::error::{KindlingError, Result};
use kindling_core::types::{Position, Rect};

use crate::canvas::DocumentCanvas;
use crate::glyphs::GlyphRunDrawing;

/// Content gathered for the page currently being drawn.
#[derive(Default)]
struct PageBuffer {
    operations: Vec<Operation>,
    xobjects: Dictionary,
    annotations: Vec<Object>,
    has_destinations: bool,
}

impl PageBuffer {
    fn is_blank(&self) -> bool {
        self.operations.is_empty() && self.annotations.is_empty() && !self.has_destinations
    }
}

/// A [`DocumentCanvas`] that produces a PDF file.
pub struct PdfCanvas {
    page_size: (f64, f64),
    title: Option<String>,
    doc: Document,
    pages_id: ObjectId,
    /// Id reserved for the page currently being drawn.
    current_id: ObjectId,
    current: PageBuffer,
    page_ids: Vec<ObjectId>,
    /// Destination name -> page object.
    destinations: BTreeMap<String, ObjectId>,
    image_count: usize,
}

impl PdfCanvas {
    /// Create an empty canvas whose pages measure `page_size` points.
    pub fn new(page_size: (f64, f64)) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let current_id = doc.new_object_id();
        Self {
            page_size,
            title: None,
            doc,
            pages_id,
            current_id,
            current: PageBuffer::default(),
            page_ids: Vec::new(),
            destinations: BTreeMap::new(),
            image_count: 0,
        }
    }

    /// Number of pages sealed so far.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn seal_page(&mut self) -> Result<()> {
        let buffer = std::mem::take(&mut self.current);
        let content = Content {
            operations: buffer.operations,
        }
        .encode()
        .map_err(|err| KindlingError::PdfError(format!("failed to encode page content: {err}")))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));

        let (width, height) = self.page_size;
        let page = dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), real(width), real(height)],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => buffer.xobjects,
            },
            "Annots" => buffer.annotations,
        };
        self.doc.objects.insert(self.current_id, Object::Dictionary(page));
        self.page_ids.push(self.current_id);
        self.current_id = self.doc.new_object_id();
        Ok(())
    }

    /// Write the page tree, catalog and info dictionary.
    fn finish(&mut self) -> Result<()> {
        if !self.current.is_blank() || self.page_ids.is_empty() {
            self.seal_page()?;
        }

        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::Reference(*id)).collect();
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => self.page_ids.len() as i64,
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        // Name-tree leaves must be sorted by key; BTreeMap iteration already is.
        let mut names = Vec::with_capacity(self.destinations.len() * 2);
        for (name, page_id) in &self.destinations {
            names.push(Object::string_literal(name.as_str()));
            names.push(Object::Array(vec![
                Object::Reference(*page_id),
                Object::Name(b"Fit".to_vec()),
            ]));
        }
        let dests_id = self.doc.add_object(dictionary! { "Names" => names });

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
            "Names" => dictionary! { "Dests" => dests_id },
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut info = dictionary! {
            "Producer" => Object::string_literal("Kindling"),
        };
        if let Some(title) = &self.title {
            info.set("Title", Object::string_literal(title.as_str()));
        }
        let info_id = self.doc.add_object(info);
        self.doc.trailer.set("Info", info_id);
        Ok(())
    }

    /// Embed `bytes` as an image XObject and return its resource name.
    fn add_image(&mut self, bytes: &[u8]) -> Result<String> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|err| KindlingError::ImageError(format!("failed to decode image: {err}")))?;
        let (width, height) = (i64::from(decoded.width()), i64::from(decoded.height()));
        let channels = decoded.color().channel_count();

        let is_jpeg = matches!(image::guess_format(bytes), Ok(ImageFormat::Jpeg));
        let stream = if is_jpeg && (channels == 1 || channels == 3) {
            // JPEG data is embedded untouched.
            let color_space = if channels == 1 { "DeviceGray" } else { "DeviceRGB" };
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width,
                    "Height" => height,
                    "ColorSpace" => color_space,
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                bytes.to_vec(),
            )
        } else {
            let rgb = decoded.to_rgb8();
            let mut stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width,
                    "Height" => height,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                },
                rgb.into_raw(),
            );
            stream.compress().map_err(|err| {
                KindlingError::PdfError(format!("failed to compress image stream: {err}"))
            })?;
            stream
        };

        let image_id = self.doc.add_object(stream);
        self.image_count += 1;
        let name = format!("Im{}", self.image_count);
        self.current.xobjects.set(name.as_bytes().to_vec(), image_id);
        Ok(name)
    }
}

impl DocumentCanvas for PdfCanvas {
    fn page_size(&self) -> (f64, f64) {
        self.page_size
    }

    fn set_title(&mut self, title: &str) {
        self.title = Some(title.to_owned());
    }

    fn bookmark_page(&mut self, position: Position) {
        self.destinations
            .entry(position.to_string())
            .or_insert(self.current_id);
        self.current.has_destinations = true;
    }

    #[instrument(skip(self, image), fields(bytes = image.len()))]
    fn draw_image(&mut self, image: &[u8], rect: Rect) -> Result<()> {
        let name = self.add_image(image)?;
        let ops = &mut self.current.operations;
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            vec![
                real(rect.width),
                real(0.0),
                real(0.0),
                real(rect.height),
                real(rect.x),
                real(rect.y),
            ],
        ));
        ops.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
        ops.push(Operation::new("Q", vec![]));
        Ok(())
    }

    fn draw_glyph_run(&mut self, drawing: &GlyphRunDrawing, x: f64, y: f64) -> Result<()> {
        // Build everything first so a bad outline leaves the page untouched.
        let mut ops = vec![
            Operation::new("q", vec![]),
            Operation::new("cm", matrix(&[1.0, 0.0, 0.0, -1.0, x, y])),
            Operation::new("cm", matrix(&drawing.matrix)),
            Operation::new("rg", color(drawing)),
            Operation::new("RG", color(drawing)),
        ];
        for glyph in &drawing.glyphs {
            ops.push(Operation::new("q", vec![]));
            ops.push(Operation::new(
                "cm",
                matrix(&[1.0, 0.0, 0.0, 1.0, glyph.offset_x, 0.0]),
            ));
            ops.push(Operation::new(
                "cm",
                matrix(&[glyph.scale, 0.0, 0.0, glyph.scale, 0.0, 0.0]),
            ));
            path_operations(&glyph.path, &mut ops)?;
            ops.push(Operation::new("B", vec![]));
            ops.push(Operation::new("Q", vec![]));
        }
        ops.push(Operation::new("Q", vec![]));

        self.current.operations.extend(ops);
        Ok(())
    }

    fn link_rect(&mut self, destination: Position, rect: Rect) {
        let annotation = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => rect.corners().iter().map(|v| real(*v)).collect::<Vec<_>>(),
            "Border" => vec![0.into(), 0.into(), 0.into()],
            "Dest" => Object::string_literal(destination.to_string()),
        };
        let id = self.doc.add_object(annotation);
        self.current.annotations.push(Object::Reference(id));
    }

    fn new_page(&mut self) -> Result<()> {
        self.seal_page()?;
        debug!(pages = self.page_ids.len(), "page sealed");
        Ok(())
    }

    #[instrument(skip(self, path), fields(path = %path.display()))]
    fn save(&mut self, path: &Path) -> Result<()> {
        self.finish()?;

        let parent = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(parent)?;
        self.doc
            .save_to(&mut file)
            .map_err(|err| KindlingError::PdfError(format!("failed to serialise PDF: {err}")))?;
        file.persist(path).map_err(|err| KindlingError::Io(err.error))?;

        info!(
            pages = self.page_ids.len(),
            destinations = self.destinations.len(),
            "Wrote PDF to {}",
            path.display()
        );
        Ok(())
    }
}

// -- Operand helpers ----------------------------------------------------------

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn matrix(values: &[f64; 6]) -> Vec<Object> {
    values.iter().map(|v| real(*v)).collect()
}

fn color(drawing: &GlyphRunDrawing) -> Vec<Object> {
    vec![
        real(drawing.color.r),
        real(drawing.color.g),
        real(drawing.color.b),
    ]
}

/// Translate SVG path data into PDF path-construction operators.
///
/// Quadratic segments are raised to cubics since PDF has no quadratic curve.
fn path_operations(data: &str, ops: &mut Vec<Operation>) -> Result<()> {
    let data = data.trim_start();
    let path = if data.starts_with(['M', 'm']) {
        BezPath::from_svg(data)
    } else {
        BezPath::from_svg(&format!("M0 0 {data}"))
    }
    .map_err(|err| KindlingError::PathData(format!("{err}: {data}")))?;

    let point = |p: Point| vec![real(p.x), real(p.y)];
    let mut start = Point::ZERO;
    let mut last = Point::ZERO;
    for element in path.elements() {
        match *element {
            PathEl::MoveTo(p) => {
                ops.push(Operation::new("m", point(p)));
                start = p;
                last = p;
            }
            PathEl::LineTo(p) => {
                ops.push(Operation::new("l", point(p)));
                last = p;
            }
            PathEl::QuadTo(q, p) => {
                let cubic = QuadBez::new(last, q, p).raise();
                let mut operands = point(cubic.p1);
                operands.extend(point(cubic.p2));
                operands.extend(point(cubic.p3));
                ops.push(Operation::new("c", operands));
                last = p;
            }
            PathEl::CurveTo(c1, c2, p) => {
                let mut operands = point(c1);
                operands.extend(point(c2));
                operands.extend(point(p));
                ops.push(Operation::new("c", operands));
                last = p;
            }
            PathEl::ClosePath => {
                ops.push(Operation::new("h", vec![]));
                last = start;
            }
        }
    }
    Ok(())
}
