//! Info overlay content shown when a dive marker is opened.

use chrono::DateTime;

use crate::models::DiveRecord;
use crate::visual::escape_html;

/// Display format for the dive date, e.g. `Jan 5, 2024`.
const DATE_FORMAT: &str = "%b %-d, %Y";

pub fn format_dive_date(unix: i64) -> String {
    DateTime::from_timestamp(unix, 0)
        .map(|dt| dt.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| "Unknown date".to_string())
}

/// Build the HTML shown in the map info overlay for a dive.
pub fn info_overlay_html(record: &DiveRecord) -> String {
    let mut html = String::from("<div class=\"dive-info\">");

    if let Some(photo) = record.photos.first() {
        html.push_str(&format!(
            "<img class=\"dive-info__photo\" src=\"{}\" alt=\"{}\"/>",
            escape_html(&photo.url),
            escape_html(photo.caption.as_deref().unwrap_or(&record.location.name))
        ));
    }

    html.push_str(&format!(
        "<h3 class=\"dive-info__title\">{}</h3>",
        escape_html(&record.location.name)
    ));
    html.push_str(&format!(
        "<p class=\"dive-info__date\">{}</p>",
        format_dive_date(record.dive_time_unix)
    ));
    if let Some(address) = &record.location.address {
        html.push_str(&format!(
            "<p class=\"dive-info__address\">{}</p>",
            escape_html(address)
        ));
    }

    let mut stats = Vec::new();
    if let Some(depth) = record.max_depth_m {
        stats.push(format!("Depth {depth} m"));
    }
    if let Some(duration) = record.duration_min {
        stats.push(format!("Duration {duration} min"));
    }
    if let Some(visibility) = record.visibility_m {
        stats.push(format!("Visibility {visibility} m"));
    }
    if let Some(temp) = record.water_temp_c {
        stats.push(format!("Water {temp} °C"));
    }
    if !stats.is_empty() {
        html.push_str("<ul class=\"dive-info__stats\">");
        for stat in stats {
            html.push_str(&format!("<li>{stat}</li>"));
        }
        html.push_str("</ul>");
    }

    match record.photos.len() {
        0 => {}
        1 => html.push_str("<p class=\"dive-info__photos\">1 photo</p>"),
        n => html.push_str(&format!("<p class=\"dive-info__photos\">{n} photos</p>")),
    }

    html.push_str("</div>");
    html
}
