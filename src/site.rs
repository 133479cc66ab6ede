use std::collections::BTreeMap;
use std::fmt::Write;

use crate::domain::Geometry;
use crate::error::DysonError;
use crate::store::{DataStore, Manifest, MaterializedRecord, write_bytes_atomic};

const STYLE: &str = r#"
html, body { margin: 0 auto; padding: 0; background: #111111; color: #fff; font-family: sans-serif; max-width: 900px; }
ul, li { margin: 0; padding: 0; list-style-type: none; }
ul { display: flex; flex-wrap: wrap; justify-content: space-between; }
section { padding: 1em; }
figure { margin: 0; position: relative; display: inline-block; }
img { border: 1px solid #fff; box-shadow: 2px 2px #ebebeb; }
h2 { font-size: 1.2em; font-weight: normal; }
p { margin: 0; font-size: 0.8em; }
li { width: 150px; margin-bottom: 2em; }
figcaption { position: absolute; right: 0; top: 0; padding: 1em; font-size: 0.6em; font-family: monospace; }
"#;

/// Records grouped by category; both levels sorted.
pub fn group_by_category(manifest: &Manifest) -> BTreeMap<&str, Vec<&MaterializedRecord>> {
    let mut groups: BTreeMap<&str, Vec<&MaterializedRecord>> = BTreeMap::new();
    for record in manifest.values() {
        groups.entry(record.category.as_str()).or_default().push(record);
    }
    groups
}

pub fn render(manifest: &Manifest) -> String {
    let mut body = String::new();
    for (category, records) in group_by_category(manifest) {
        let _ = write!(
            body,
            "\n<section>\n    <h2>{}</h2>\n    <ul>",
            escape_html(category)
        );
        for record in records {
            let coords = coordinate_lines(&record.geometry)
                .iter()
                .map(|line| escape_html(line))
                .collect::<Vec<_>>()
                .join("<br />");
            let desc = record
                .properties
                .description
                .iter()
                .map(|line| escape_html(line))
                .collect::<Vec<_>>()
                .join("<br />");
            let _ = write!(
                body,
                "\n<li>\n    <figure>\n        <img src=\"{}\">\n        <figcaption>{coords}</figcaption>\n    </figure>\n    <p>{desc}</p>\n</li>",
                escape_html(&record.img)
            );
        }
        body.push_str("</ul>\n</section>\n");
    }

    format!(
        "<!doctype html>\n<html lang=\"en\">\n    <head>\n        <meta charset=\"utf-8\">\n        <meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">\n        <title>dyson</title>\n        <style>{STYLE}</style>\n    </head>\n    <body>{body}</body>\n</html>\n"
    )
}

/// Writes `index.html` next to the manifest; returns the number of sections.
pub fn write_site(store: &DataStore, manifest: &Manifest) -> Result<usize, DysonError> {
    let html = render(manifest);
    write_bytes_atomic(&store.site_path(), html.as_bytes())?;
    Ok(group_by_category(manifest).len())
}

fn coordinate_lines(geometry: &Geometry) -> Vec<String> {
    match geometry {
        Geometry::Point([lng, lat]) => vec![lng.to_string(), lat.to_string()],
        Geometry::LineString(line) => line.iter().map(format_position).collect(),
        Geometry::Polygon(rings) => rings
            .first()
            .map(|ring| ring.iter().map(format_position).collect())
            .unwrap_or_default(),
    }
}

fn format_position(position: &[f64; 2]) -> String {
    format!("{}, {}", position[0], position[1])
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
