//! KML document export.

use std::fmt::Write as _;

use chrono::SecondsFormat;
use geosurvey_core::Form;

use crate::GeoRow;

/// Escape text for XML element content and HTML table cells.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn description(form: &Form, row: &GeoRow<'_>) -> String {
    let mut table = String::from("<table>");
    for field in &form.fields {
        let _ = write!(
            table,
            "<tr><th>{}</th><td>{}</td></tr>",
            escape(field.display_label()),
            escape(&row.response.text(&field.name)),
        );
    }
    table.push_str("</table>");
    // A literal "]]>" would close the CDATA section early.
    table.replace("]]>", "]]&gt;")
}

/// Encode located rows as a KML document with one `Placemark` per row.
#[must_use]
pub fn encode(form: &Form, rows: &[GeoRow<'_>]) -> Vec<u8> {
    let mut doc = String::from(concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
        "<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n",
        "<Document>\n",
    ));
    let _ = writeln!(doc, "<name>{}</name>", escape(&form.public_code));
    for row in rows {
        let response = row.response;
        let _ = write!(
            doc,
            concat!(
                "<Placemark>\n",
                "<name>#{id}</name>\n",
                "<description><![CDATA[{description}]]></description>\n",
                "<TimeStamp><when>{when}</when></TimeStamp>\n",
                "<Point><coordinates>{lon},{lat},0</coordinates></Point>\n",
                "</Placemark>\n",
            ),
            id = response.unique_display_id,
            description = description(form, row),
            when = response.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            lon = row.point.x(),
            lat = row.point.y(),
        );
    }
    doc.push_str("</Document>\n</kml>\n");
    doc.into_bytes()
}
