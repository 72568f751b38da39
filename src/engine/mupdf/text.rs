//! Structured text and outline extraction

use mupdf::{Document, TextPageOptions};

use crate::engine::{Bookmark, EngineResult, PageSize, PageText, TextLine};

/// Text lines of one page with positions in page points
pub fn page_text(doc: &Document, page_index: usize, size: PageSize) -> EngineResult<PageText> {
    let page = doc.load_page(page_index as i32)?;
    let text_page = page.to_text_page(TextPageOptions::PRESERVE_WHITESPACE)?;

    let mut lines = Vec::new();
    for block in text_page.blocks() {
        for line in block.lines() {
            let mut text = String::new();
            let mut bounds = LineBounds::default();
            let mut font_size = 0.0f32;

            for ch in line.chars() {
                let Some(c) = ch.char() else {
                    continue;
                };

                // MuPDF quads are already top-left origin
                let quad = ch.quad();
                bounds.include(quad.ul.x.min(quad.ll.x), quad.ul.y.min(quad.ur.y));
                bounds.include(quad.ur.x.max(quad.lr.x), quad.ll.y.max(quad.lr.y));
                font_size = font_size.max(ch.size());
                text.push(c);
            }

            if text.trim().is_empty() {
                continue;
            }

            lines.push(TextLine {
                text,
                x: bounds.min_x,
                y: bounds.min_y,
                width: (bounds.max_x - bounds.min_x).max(0.0),
                height: (bounds.max_y - bounds.min_y).max(0.0),
                font_size,
            });
        }
    }

    Ok(PageText {
        page_index,
        width: size.width,
        height: size.height,
        text: join_lines(&lines),
        lines,
    })
}

struct LineBounds {
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
}

impl Default for LineBounds {
    fn default() -> Self {
        Self {
            min_x: f32::MAX,
            min_y: f32::MAX,
            max_x: f32::MIN,
            max_y: f32::MIN,
        }
    }
}

impl LineBounds {
    fn include(&mut self, x: f32, y: f32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }
}

fn join_lines(lines: &[TextLine]) -> String {
    lines
        .iter()
        .map(|line| line.text.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn bookmarks(doc: &Document) -> EngineResult<Vec<Bookmark>> {
    let outlines = doc.outlines()?;
    Ok(convert_outlines(&outlines))
}

fn convert_outlines(outlines: &[mupdf::Outline]) -> Vec<Bookmark> {
    outlines
        .iter()
        .map(|outline| Bookmark {
            title: if outline.title.trim().is_empty() {
                "Untitled".to_string()
            } else {
                outline.title.clone()
            },
            page_index: outline.page.map(|p| p as usize),
            children: convert_outlines(&outline.down),
        })
        .collect()
}
