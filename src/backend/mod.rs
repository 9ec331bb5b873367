//! Backend service protocol
//!
//! Typed requests and replies for the validation/tracing server, plus the
//! reply parsers. The server is Python-backed and may emit bare `NaN` or
//! `Infinity` tokens, which are read as `null` before JSON parsing.

pub mod http;

pub use http::HttpTransport;

use crate::document::{parse_patch, Path, PatchOp};
use glam::Vec3;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Something to ask the server
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Validate a document, tagged with the revision it was taken at
    Document { revision: u64, document: Value },
    /// Fetch the server's current document
    FetchDocument,
    /// Generate a mesh for a geometry spec
    Mesh { key: String, spec: Value },
    /// Trace `rays` rays through the last accepted document
    Trace { revision: u64, rays: usize },
    /// Footprint of the element at `path`
    Footprint { path: Path },
}

/// A server answer, matched to its request
#[derive(Debug, Clone)]
pub enum Reply {
    /// Empty patch list means accepted
    Document { revision: u64, result: Result<Vec<PatchOp>, String> },
    FetchedDocument(Result<Value, String>),
    Mesh { key: String, result: Result<Option<MeshData>, String> },
    Trace { revision: u64, result: Result<TraceSet, String> },
    Footprint { path: Path, result: Result<Footprint, String> },
}

/// Sends requests and hands back replies as they arrive
pub trait Transport {
    fn send(&self, request: Request);

    /// Replies that arrived since the last poll
    fn poll(&self) -> Vec<Reply>;
}

/// Triangle mesh from the mesh service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MeshData {
    #[serde(rename = "verts")]
    pub vertices: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
}

impl MeshData {
    /// Faces whose indices all point at existing vertices
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.faces.iter().filter_map(|face| {
            Some([
                *self.vertices.get(face[0] as usize)?,
                *self.vertices.get(face[1] as usize)?,
                *self.vertices.get(face[2] as usize)?,
            ])
        })
    }
}

/// Traced rays of one source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceTraces {
    pub succeeded: Vec<Vec<Vec3>>,
    pub failed: Vec<Vec<Vec3>>,
}

/// Result of a trace request, keyed by source name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceSet {
    pub sources: BTreeMap<String, SourceTraces>,
    /// Server-side trace time in seconds
    pub time: Option<f64>,
}

/// One footprint sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootprintPoint {
    pub x: f64,
    pub y: f64,
    pub wavelength: Option<f64>,
}

/// Footprint samples, one series per source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Footprint {
    pub series: Vec<Vec<FootprintPoint>>,
}

/// Replace bare `NaN`, `Infinity` and `-Infinity` tokens outside strings with `null`
pub fn sanitize_non_finite(text: &str) -> String {
    const TOKENS: [&str; 3] = ["-Infinity", "Infinity", "NaN"];
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if let Some(token) = TOKENS.iter().find(|token| rest.starts_with(*token)) {
            out.push_str("null");
            rest = &rest[token.len()..];
            continue;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

fn parse_json(text: &str) -> Result<Value, String> {
    serde_json::from_str(&sanitize_non_finite(text)).map_err(|e| format!("Failed to parse server reply: {}", e))
}

/// Validator reply: a (possibly empty) corrective patch
pub fn parse_document_reply(text: &str) -> Result<Vec<PatchOp>, String> {
    parse_patch(&sanitize_non_finite(text))
}

pub fn parse_fetched_document(text: &str) -> Result<Value, String> {
    parse_json(text)
}

/// Mesh reply: `{"verts": …, "faces": …}` or `null`
pub fn parse_mesh_reply(text: &str) -> Result<Option<MeshData>, String> {
    match parse_json(text)? {
        Value::Null => Ok(None),
        value => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| format!("Failed to parse mesh: {}", e)),
    }
}

fn coordinate(value: &Value) -> f32 {
    value.as_f64().map(|v| v as f32).unwrap_or(f32::NAN)
}

fn point(value: &Value) -> Vec3 {
    match value.as_array() {
        Some(coords) => Vec3::new(
            coords.first().map(coordinate).unwrap_or(f32::NAN),
            coords.get(1).map(coordinate).unwrap_or(f32::NAN),
            coords.get(2).map(coordinate).unwrap_or(f32::NAN),
        ),
        None => Vec3::NAN,
    }
}

fn rays(value: Option<&Value>) -> Vec<Vec<Vec3>> {
    value
        .and_then(Value::as_array)
        .map(|rays| {
            rays.iter()
                .map(|ray| ray.as_array().map(|points| points.iter().map(point).collect()).unwrap_or_default())
                .collect()
        })
        .unwrap_or_default()
}

/// Trace reply: `{"traces": {source: {"succeeded": […], "failed": […]}}, "time": s}`.
/// Missing coordinates become NaN.
pub fn parse_trace_reply(text: &str) -> Result<TraceSet, String> {
    let value = parse_json(text)?;
    let traces = value
        .get("traces")
        .and_then(Value::as_object)
        .ok_or_else(|| "Trace reply has no traces".to_string())?;
    let sources = traces
        .iter()
        .map(|(name, source)| {
            let source = SourceTraces {
                succeeded: rays(source.get("succeeded")),
                failed: rays(source.get("failed")),
            };
            (name.clone(), source)
        })
        .collect();
    Ok(TraceSet {
        sources,
        time: value.get("time").and_then(Value::as_f64),
    })
}

/// Footprint reply: `{"footprint": [[[x, y(, wavelength)]…]…]}`. Samples without finite x/y are dropped.
pub fn parse_footprint_reply(text: &str) -> Result<Footprint, String> {
    let value = parse_json(text)?;
    let series = value
        .get("footprint")
        .and_then(Value::as_array)
        .ok_or_else(|| "Footprint reply has no footprint".to_string())?;
    let series = series
        .iter()
        .map(|samples| {
            samples
                .as_array()
                .map(|samples| {
                    samples
                        .iter()
                        .filter_map(|sample| {
                            let x = sample.get(0)?.as_f64()?;
                            let y = sample.get(1)?.as_f64()?;
                            Some(FootprintPoint {
                                x,
                                y,
                                wavelength: sample.get(2).and_then(Value::as_f64),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect();
    Ok(Footprint { series })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_non_finite() {
        assert_eq!(sanitize_non_finite("[NaN, 1.0, -Infinity, Infinity]"), "[null, 1.0, null, null]");
        assert_eq!(sanitize_non_finite(r#"{"name": "NaN \"NaN\""}"#), r#"{"name": "NaN \"NaN\""}"#);
    }

    #[test]
    fn test_document_reply() {
        assert!(parse_document_reply("[]").unwrap().is_empty());
        let ops = parse_document_reply(r#"[{"op": "replace", "path": "/args/x", "value": NaN}]"#).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].name(), "replace");
    }

    #[test]
    fn test_mesh_reply() {
        assert_eq!(parse_mesh_reply("null").unwrap(), None);
        let mesh = parse_mesh_reply(r#"{"verts": [[0,0,0],[1,0,0],[0,1,0]], "faces": [[0,1,2],[0,1,7]]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.triangles().count(), 1);
        assert!(parse_mesh_reply(r#"{"verts": 3}"#).is_err());
    }

    #[test]
    fn test_trace_reply_with_nan() {
        let text = r#"{"traces": {"src": {"succeeded": [[[0,0,0],[1,1,1],[NaN,NaN,NaN]]], "failed": [[[0,0,0]]]}}, "time": 0.5}"#;
        let set = parse_trace_reply(text).unwrap();
        let src = &set.sources["src"];
        assert_eq!(src.succeeded[0].len(), 3);
        assert!(src.succeeded[0][2].x.is_nan());
        assert_eq!(src.failed.len(), 1);
        assert_eq!(set.time, Some(0.5));
        assert!(parse_trace_reply("{}").is_err());
    }

    #[test]
    fn test_footprint_reply() {
        let fp = parse_footprint_reply(r#"{"footprint": [[[0,1,500],[2,3],[NaN,1]], [[4,5]]]}"#).unwrap();
        assert_eq!(fp.series.len(), 2);
        assert_eq!(fp.series[0].len(), 2);
        assert_eq!(fp.series[0][0].wavelength, Some(500.0));
        assert_eq!(fp.series[0][1].wavelength, None);
    }
}
