//! PDFium-backed engine: page text, embedded images and document info.
//!
//! ## Binding
//!
//! `load` binds the PDFium shared library once to prove it is present, so a
//! missing library surfaces at startup instead of on the first request. Each
//! conversion binds again on its own blocking thread; `pdfium-render` keeps
//! the library itself loaded process-wide and serialises calls into it
//! (`thread_safe` feature), so pages are always processed by one worker.
//!
//! ## Output
//!
//! Each selected page contributes its tidied text followed by one
//! `![](_page_{p}_Picture_{n})` reference per embedded image. The same page
//! structure can be rendered as HTML or JSON instead of markdown.

use crate::config::{ConversionOptions, OutputFormat};
use crate::engine::{DocumentEngine, RawConversionResult};
use crate::error::EngineError;
use crate::pipeline::postprocess::tidy_page_text;
use pdfium_render::prelude::*;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Width of the dashed rule separating paginated output.
const PAGE_RULE_WIDTH: usize = 48;

/// Engine backed by the PDFium library.
#[derive(Debug)]
pub struct PdfiumEngine {
    lib_dir: Option<PathBuf>,
}

impl PdfiumEngine {
    /// Bind PDFium from `lib_dir` (or the system search path) and return a
    /// ready engine.
    pub fn load(lib_dir: Option<&Path>) -> Result<Self, EngineError> {
        let engine = Self {
            lib_dir: lib_dir.map(Path::to_path_buf),
        };
        engine.bind()?;
        match &engine.lib_dir {
            Some(dir) => info!("PDFium bound from {}", dir.display()),
            None => info!("PDFium bound from system library path"),
        }
        Ok(engine)
    }

    fn bind(&self) -> Result<Pdfium, EngineError> {
        let bindings = match &self.lib_dir {
            Some(dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| EngineError::LoadFailed(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

impl DocumentEngine for PdfiumEngine {
    fn name(&self) -> &str {
        "pdfium"
    }

    fn convert(
        &self,
        path: &Path,
        options: &ConversionOptions,
    ) -> Result<RawConversionResult, EngineError> {
        if options.force_ocr {
            return Err(EngineError::Unsupported(
                "force_ocr: the PDFium engine extracts embedded text only".into(),
            ));
        }

        let pdfium = self.bind()?;
        let document = pdfium.load_pdf_from_file(path, None).map_err(|e| {
            let detail = format!("{:?}", e);
            if detail.contains("Password") || detail.contains("password") {
                EngineError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            } else {
                EngineError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail,
                }
            }
        })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        let selected: Vec<usize> = match &options.page_range {
            Some(range) => {
                let indices = range.to_indices(total_pages);
                if indices.is_empty() {
                    return Err(EngineError::EmptySelection {
                        range: range.to_string(),
                        total: total_pages,
                    });
                }
                indices
            }
            None => (0..total_pages).collect(),
        };

        let mut extracted = Vec::with_capacity(selected.len());
        let mut images = BTreeMap::new();

        for (idx, page) in pages.iter().enumerate() {
            if selected.binary_search(&idx).is_err() {
                continue;
            }

            let text = page
                .text()
                .map_err(|e| EngineError::PageFailed {
                    page: idx,
                    detail: format!("{:?}", e),
                })?
                .all();

            let mut image_keys = Vec::new();
            for object in page.objects().iter() {
                let Some(image_object) = object.as_image_object() else {
                    continue;
                };
                match image_object.get_raw_image() {
                    Ok(img) => {
                        let key = image_key(idx, image_keys.len());
                        images.insert(key.clone(), img);
                        image_keys.push(key);
                    }
                    Err(e) => warn!("Skipping unreadable image on page {}: {:?}", idx, e),
                }
            }

            debug!(
                "Extracted page {} → {} chars, {} images",
                idx,
                text.len(),
                image_keys.len()
            );

            extracted.push(ExtractedPage {
                index: idx,
                text: tidy_page_text(&text),
                image_keys,
            });
        }

        let text = match options.output_format {
            OutputFormat::Markdown => render_markdown(&extracted, options.paginate_output),
            OutputFormat::Html => render_html(&extracted),
            OutputFormat::Json => render_json(&extracted)?,
        };

        let mut metadata = document_info(&document);
        metadata.insert("page_count".into(), json!(total_pages));
        if let Some(languages) = &options.languages {
            metadata.insert("languages".into(), json!(languages));
        }
        metadata.insert("page_stats".into(), page_stats(&extracted));

        Ok(RawConversionResult {
            text,
            images,
            metadata,
        })
    }

    fn unload(&self) {
        debug!("PDFium engine released");
    }
}

/// Text and image keys extracted from one page.
#[derive(Debug, Clone, PartialEq)]
struct ExtractedPage {
    index: usize,
    text: String,
    image_keys: Vec<String>,
}

fn image_key(page: usize, n: usize) -> String {
    format!("_page_{page}_Picture_{n}")
}

fn page_separator(page: usize) -> String {
    format!("\n\n{{{page}}}{}\n\n", "-".repeat(PAGE_RULE_WIDTH))
}

fn render_markdown(pages: &[ExtractedPage], paginate: bool) -> String {
    let mut out = String::new();
    for (i, page) in pages.iter().enumerate() {
        if paginate {
            out.push_str(&page_separator(page.index));
        } else if i > 0 {
            out.push_str("\n\n");
        }
        out.push_str(page.text.trim_end());
        for key in &page.image_keys {
            out.push_str(&format!("\n\n![]({key})"));
        }
    }
    out.trim_start_matches('\n').to_string()
}

fn render_html(pages: &[ExtractedPage]) -> String {
    let mut out = String::new();
    for page in pages {
        out.push_str(&format!("<div class=\"page\" data-page-id=\"{}\">\n", page.index));
        for block in page.text.split("\n\n").filter(|b| !b.trim().is_empty()) {
            out.push_str(&format!("<p>{}</p>\n", escape_html(block.trim())));
        }
        for key in &page.image_keys {
            out.push_str(&format!("<img src=\"{}\"/>\n", escape_html(key)));
        }
        out.push_str("</div>\n");
    }
    out
}

fn render_json(pages: &[ExtractedPage]) -> Result<String, EngineError> {
    let doc = json!({
        "pages": pages
            .iter()
            .map(|p| json!({
                "page_id": p.index,
                "text": p.text,
                "images": p.image_keys,
            }))
            .collect::<Vec<_>>(),
    });
    serde_json::to_string_pretty(&doc).map_err(|e| EngineError::Render(e.to_string()))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn page_stats(pages: &[ExtractedPage]) -> Value {
    Value::Array(
        pages
            .iter()
            .map(|p| {
                json!({
                    "page_id": p.index,
                    "text_chars": p.text.chars().count(),
                    "image_count": p.image_keys.len(),
                })
            })
            .collect(),
    )
}

fn document_info(document: &PdfDocument) -> Map<String, Value> {
    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    let mut info = Map::new();
    for (name, tag) in [
        ("title", PdfDocumentMetadataTagType::Title),
        ("author", PdfDocumentMetadataTagType::Author),
        ("subject", PdfDocumentMetadataTagType::Subject),
        ("creator", PdfDocumentMetadataTagType::Creator),
        ("producer", PdfDocumentMetadataTagType::Producer),
        ("creation_date", PdfDocumentMetadataTagType::CreationDate),
        ("modification_date", PdfDocumentMetadataTagType::ModificationDate),
    ] {
        if let Some(value) = get_meta(tag) {
            info.insert(name.into(), Value::String(value));
        }
    }
    info.insert(
        "pdf_version".into(),
        Value::String(format!("{:?}", document.version())),
    );
    info
}
