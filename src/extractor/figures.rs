//! Sidecar JSON produced by the extractor

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Path segment under which rendered figures are served
pub const RESOURCE_MOUNT: &str = "resources";

/// Rectangle in PDF points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// One detected figure or table.
///
/// Known pdffigures2 fields are typed; anything else the extractor emits is
/// kept in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Figure {
    /// Location of the rendered image
    #[serde(rename = "renderURL", default, skip_serializing_if = "Option::is_none")]
    pub render_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_boundary: Option<Boundary>,
    /// Figure or table label, e.g. "1" or "IV"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Zero-based page index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// "Figure" or "Table"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fig_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption_boundary: Option<Boundary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_text: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_dpi: Option<serde_json::Number>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Figure {
    /// File name of the rendered image, whatever form `renderURL` is in
    pub fn image_file_name(&self) -> Option<&str> {
        self.render_url
            .as_deref()
            .and_then(|url| url.rsplit(['/', '\\']).next())
            .filter(|name| !name.is_empty())
    }
}

/// Parse sidecar JSON. A single object is accepted as a one-element list.
pub fn parse_sidecar(data: &[u8]) -> Result<Vec<Figure>> {
    let value: serde_json::Value = serde_json::from_slice(data)?;
    match value {
        serde_json::Value::Array(_) => Ok(serde_json::from_value(value)?),
        serde_json::Value::Object(_) => Ok(vec![serde_json::from_value(value)?]),
        other => Err(Error::OutputCorrupt {
            reason: format!("expected a JSON array of figures, got {}", json_kind(&other)),
        }),
    }
}

/// Read and parse the sidecar file at `path`
pub async fn read_sidecar(path: &Path) -> Result<Vec<Figure>> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::OutputMissing {
                path: path.display().to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };
    parse_sidecar(&data).map_err(|e| match e {
        Error::Serialization(e) => Error::OutputCorrupt {
            reason: e.to_string(),
        },
        other => other,
    })
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Null => "null",
    }
}

/// Public URL of a rendered file: `<base>/resources/<job>/<file>`
pub fn resource_url(base: &Url, job_id: &str, file_name: &str) -> Url {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .push(RESOURCE_MOUNT)
            .push(job_id)
            .push(file_name);
    }
    url
}

/// Replace every local `renderURL` with its public URL
pub fn rewrite_render_urls(figures: &mut [Figure], base: &Url, job_id: &str) {
    for figure in figures.iter_mut() {
        let Some(file_name) = figure.image_file_name().map(str::to_string) else {
            continue;
        };
        figure.render_url = Some(resource_url(base, job_id, &file_name).to_string());
    }
}

/// Find the figure whose `renderURL` points at `file_name`
pub fn find_figure_by_image<'a>(figures: &'a [Figure], file_name: &str) -> Option<&'a Figure> {
    let base_name = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let suffix = format!("/{}", base_name);
    figures.iter().find(|figure| {
        figure
            .render_url
            .as_deref()
            .is_some_and(|url| url.ends_with(&suffix))
    })
}
