//! Value rendering.
//!
//! Snapshots store rendered text, never live values. Function and module
//! values render to nothing and are omitted from snapshots; image-like
//! values (H x W x 3 nested byte lists) become inline HTML markup. Rendering
//! never fails - anything the image encoder cannot handle degrades to a
//! tagged fallback text.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::engine::Value;
use crate::errors::RuntimeFault;

/// Render a value for the timeline, or nothing if the value has no useful
/// rendering (functions and builtins).
pub fn render(value: &Value) -> Option<String> {
    match value {
        Value::Function(_) | Value::Builtin(_) => None,
        other => {
            if let Some(pixels) = as_image(other) {
                Some(html_fence(&image_markup(&pixels)))
            } else {
                Some(other.repr())
            }
        }
    }
}

/// Render a captured fault as the red inline marker attached to return
/// locations.
pub fn render_fault(fault: &RuntimeFault) -> String {
    html_fence(&format!(
        "<div style='color:red;'>{}: {}</div>",
        fault.kind, fault.message
    ))
}

fn html_fence(html: &str) -> String {
    format!("```html\n{html}\n```")
}

/// Interpret a value as an H x W x 3 image of channel bytes, if it is one.
fn as_image(value: &Value) -> Option<Vec<Vec<[u8; 3]>>> {
    let rows = match value {
        Value::List(rows) if !rows.is_empty() => rows,
        _ => return None,
    };
    let mut pixels = Vec::with_capacity(rows.len());
    let mut width = None;
    for row in rows {
        let cols = match row {
            Value::List(cols) if !cols.is_empty() => cols,
            _ => return None,
        };
        match width {
            None => width = Some(cols.len()),
            Some(w) if w != cols.len() => return None,
            _ => {}
        }
        let mut out_row = Vec::with_capacity(cols.len());
        for px in cols {
            let channels = match px {
                Value::List(c) if c.len() == 3 => c,
                _ => return None,
            };
            let mut rgb = [0u8; 3];
            for (slot, ch) in rgb.iter_mut().zip(channels) {
                match ch {
                    Value::Int(n) if (0..=255).contains(n) => *slot = *n as u8,
                    _ => return None,
                }
            }
            out_row.push(rgb);
        }
        pixels.push(out_row);
    }
    Some(pixels)
}

fn image_markup(pixels: &[Vec<[u8; 3]>]) -> String {
    match encode_bmp(pixels) {
        Some(bytes) => format!(
            "<img src=\"data:image/bmp;base64,{}\">",
            STANDARD.encode(bytes)
        ),
        None => "<render error: image too large>".to_string(),
    }
}

/// Minimal 24-bit BMP encoding: rows bottom-up, BGR, 4-byte row padding.
fn encode_bmp(pixels: &[Vec<[u8; 3]>]) -> Option<Vec<u8>> {
    let height = u32::try_from(pixels.len()).ok()?;
    let width = u32::try_from(pixels.first()?.len()).ok()?;
    let row_bytes = width.checked_mul(3)?;
    let padding = (4 - (row_bytes % 4) % 4) % 4;
    let data_size = (row_bytes + padding).checked_mul(height)?;
    let file_size = 54u32.checked_add(data_size)?;

    let mut out = Vec::with_capacity(file_size as usize);
    // File header
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&file_size.to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&54u32.to_le_bytes());
    // Info header
    out.extend_from_slice(&40u32.to_le_bytes());
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&24u16.to_le_bytes());
    out.extend_from_slice(&[0; 24]);

    for row in pixels.iter().rev() {
        for [r, g, b] in row {
            out.extend_from_slice(&[*b, *g, *r]);
        }
        out.extend(std::iter::repeat(0u8).take(padding as usize));
    }
    Some(out)
}
