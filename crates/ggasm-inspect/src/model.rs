use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use ggasm::image::HEADER_SIZE;
use ggasm::GlulxImage;

#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub name: &'static str,
    pub start: u32,
    pub end: u32,
    pub perms: &'static str, // e.g., "r--"
}

pub fn load_image(path: &Path) -> Result<GlulxImage> {
    let bytes = std::fs::read(path)?;
    Ok(GlulxImage::from_bytes(bytes)?)
}

/// Header, ROM and RAM ranges as laid out by the header fields.
pub fn sections(img: &GlulxImage) -> Vec<Section> {
    let h = img.header();
    let len = img.bytes().len() as u32;
    let ram_end = h.ext_start.min(len);
    let mut out = vec![Section { name: "header", start: 0, end: HEADER_SIZE as u32, perms: "r--" }];
    if h.ram_start > HEADER_SIZE as u32 {
        out.push(Section { name: "rom", start: HEADER_SIZE as u32, end: h.ram_start.min(len), perms: "r-x" });
    }
    out.push(Section { name: "ram", start: h.ram_start.min(ram_end), end: ram_end, perms: "rwx" });
    if h.end_mem > ram_end {
        out.push(Section { name: "ext", start: ram_end, end: h.end_mem, perms: "rw-" });
    }
    out
}
