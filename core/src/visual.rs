//! Marker visual descriptors.
//!
//! [`marker_visual`] is a pure function of a dive and a selected flag, so a
//! marker can be restyled on selection change without keeping any per-marker
//! styling closure around.

use crate::config::MarkerStyle;
use crate::models::DiveRecord;

/// Stacking order for markers; selected markers draw above the rest.
const Z_INDEX_NORMAL: i32 = 1;
const Z_INDEX_SELECTED: i32 = 1000;

/// Badge diameter relative to the marker size.
const BADGE_RATIO: f64 = 0.4;

#[derive(Clone, Debug, PartialEq, uniffi::Enum)]
pub enum MarkerContent {
    /// Circular thumbnail of the dive's first photo.
    Thumbnail {
        url: String,
        /// Total photo count, shown only when the dive has more than one photo.
        photo_count_badge: Option<u32>,
    },
    /// Iconised badge for dives without photos.
    DefaultBadge { glyph: String, fill_color: String },
}

#[derive(Clone, Debug, PartialEq, uniffi::Record)]
pub struct HighlightRing {
    pub color: String,
    pub width_px: u32,
}

#[derive(Clone, Debug, PartialEq, uniffi::Record)]
pub struct MarkerVisual {
    pub content: MarkerContent,
    pub size_px: u32,
    pub border_color: String,
    pub border_width_px: u32,
    pub ring: Option<HighlightRing>,
    pub badge_color: String,
    pub z_index: i32,
    pub selected: bool,
}

/// Build the visual for a dive's marker in the requested state.
pub fn marker_visual(record: &DiveRecord, selected: bool, style: &MarkerStyle) -> MarkerVisual {
    let content = match record.photos.first() {
        Some(first) => {
            let count = record.photos.len();
            MarkerContent::Thumbnail {
                url: first.url.clone(),
                photo_count_badge: (count > 1)
                    .then(|| u32::try_from(count).unwrap_or(u32::MAX)),
            }
        }
        None => MarkerContent::DefaultBadge {
            glyph: style.default_glyph.clone(),
            fill_color: style.default_fill_color.clone(),
        },
    };

    if selected {
        MarkerVisual {
            content,
            size_px: style.selected_size_px,
            border_color: style.selected_border_color.clone(),
            border_width_px: style.selected_border_width_px,
            ring: Some(HighlightRing {
                color: style.ring_color.clone(),
                width_px: style.ring_width_px,
            }),
            badge_color: style.badge_color.clone(),
            z_index: Z_INDEX_SELECTED,
            selected: true,
        }
    } else {
        MarkerVisual {
            content,
            size_px: style.size_px,
            border_color: style.border_color.clone(),
            border_width_px: style.border_width_px,
            ring: None,
            badge_color: style.badge_color.clone(),
            z_index: Z_INDEX_NORMAL,
            selected: false,
        }
    }
}

/// Render a visual as an HTML element for SDKs that take HTML marker content.
pub fn render_marker_html(visual: &MarkerVisual) -> String {
    let mut class = String::from("dive-marker");
    if visual.selected {
        class.push_str(" dive-marker--selected");
    }
    let shadow = match &visual.ring {
        Some(ring) => format!("0 0 0 {}px {}", ring.width_px, escape_html(&ring.color)),
        None => "0 2px 6px rgba(0, 0, 0, 0.3)".to_string(),
    };

    let mut html = format!(
        "<div class=\"{class}\" style=\"position:relative;width:{size}px;height:{size}px;\
         border-radius:50%;border:{bw}px solid {bc};box-shadow:{shadow};\
         box-sizing:border-box;cursor:pointer;z-index:{z};\">",
        size = visual.size_px,
        bw = visual.border_width_px,
        bc = escape_html(&visual.border_color),
        z = visual.z_index,
    );

    match &visual.content {
        MarkerContent::Thumbnail {
            url,
            photo_count_badge,
        } => {
            html.push_str(&format!(
                "<img src=\"{}\" alt=\"\" style=\"width:100%;height:100%;border-radius:50%;object-fit:cover;\"/>",
                escape_html(url)
            ));
            if let Some(count) = photo_count_badge {
                let badge = (f64::from(visual.size_px) * BADGE_RATIO).round();
                html.push_str(&format!(
                    "<span class=\"dive-marker__count\" style=\"position:absolute;top:-4px;right:-4px;\
                     min-width:{badge}px;height:{badge}px;border-radius:50%;background:{bg};\
                     color:#ffffff;font-size:11px;font-weight:600;display:flex;\
                     align-items:center;justify-content:center;\">{count}</span>",
                    bg = escape_html(&visual.badge_color),
                ));
            }
        }
        MarkerContent::DefaultBadge { glyph, fill_color } => {
            html.push_str(&format!(
                "<span class=\"dive-marker__icon\" style=\"width:100%;height:100%;border-radius:50%;\
                 background:{};display:flex;align-items:center;justify-content:center;\">{}</span>",
                escape_html(fill_color),
                escape_html(glyph)
            ));
        }
    }

    html.push_str("</div>");
    html
}

/// Escape text for use in HTML content and double-quoted attributes.
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
