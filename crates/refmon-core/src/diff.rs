//! Artifact comparison: structured-document diff and graph image diff.
//!
//! Both operate on files already written by the computation service. The
//! document diff is pure JSON work; the graph diff shells out to
//! ImageMagick after a cheap byte-identity check on the vector images.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{Map, Value};
use tokio::process::Command;

/// Properties that change on every run and carry no signal.
const VOLATILE_PROPS: &[&str] = &["proctm", "thumburl", "graphurl", "svgurl"];

/// Fuzz tolerance passed to ImageMagick `compare`. Absorbs antialiasing
/// jitter between renders.
const GRAPH_FUZZ: &str = "1%";

/// Width of the header line introducing each changed property.
const HEADER_WIDTH: usize = 72;

fn document_path(slug: &str, dir: &Path) -> PathBuf {
    dir.join(format!("{slug}.json"))
}

fn load_props(path: &Path) -> anyhow::Result<Map<String, Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    match serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", path.display()))?
    {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("{} does not hold a JSON object", path.display()),
    }
}

/// Compare the fresh document for `slug` against its reference, property by
/// property. Volatile properties are skipped; a property missing from the
/// output is recorded but does not abort the comparison.
///
/// Returns `None` when nothing differs.
pub fn document_diff(slug: &str, out_dir: &Path, ref_dir: &Path) -> anyhow::Result<Option<String>> {
    let output = load_props(&document_path(slug, out_dir))?;
    let reference = load_props(&document_path(slug, ref_dir))?;

    let mut text = String::new();
    for (prop, ref_value) in &reference {
        if VOLATILE_PROPS.contains(&prop.as_str()) {
            continue;
        }
        match output.get(prop) {
            None => {
                let _ = writeln!(text, "*** property {prop} is missing from the output");
            }
            Some(out_value) if out_value != ref_value => {
                let header = format!("{prop} (OLD -> NEW) ");
                let rule = "-".repeat(HEADER_WIDTH.saturating_sub(header.len()));
                let _ = writeln!(text, "{header}{rule}");
                let _ = writeln!(text, "{ref_value}");
                let _ = writeln!(text, "{out_value}");
            }
            Some(_) => {}
        }
    }

    Ok(if text.is_empty() { None } else { Some(text) })
}

/// Dump every non-volatile property of the fresh output for `slug`.
///
/// Used when no reference exists: not a comparison, just what was produced.
pub fn document_dump(slug: &str, out_dir: &Path) -> anyhow::Result<String> {
    let output = load_props(&document_path(slug, out_dir))?;
    let mut text = String::new();
    for (prop, value) in &output {
        if VOLATILE_PROPS.contains(&prop.as_str()) {
            continue;
        }
        let _ = writeln!(text, "{prop} = {value}");
    }
    Ok(text)
}

/// Outcome of one graph comparison.
#[derive(Debug, Default)]
pub struct GraphDiff {
    /// Absolute-error pixel count; zero means the graphs match
    pub pixels: u64,
    /// Composite diff/reference/output image, present when pixels > 0
    pub diff_image: Option<PathBuf>,
    /// Tool invocation failure, reported instead of a count
    pub error: Option<String>,
}

impl GraphDiff {
    fn failed(message: String) -> Self {
        Self {
            error: Some(message),
            ..Self::default()
        }
    }
}

/// Compare the generated graph for `slug` against the reference graph.
///
/// Byte-identical vector images short-circuit to a clean result without
/// touching the raster tool. Otherwise ImageMagick `compare` reports an
/// absolute-error pixel count; a nonzero count leaves a stacked
/// diff/reference/output composite next to the fresh output.
pub async fn graph_diff(slug: &str, out_dir: &Path, ref_dir: &Path) -> GraphDiff {
    let diff_image = out_dir.join(format!("{slug}-diff.png"));

    // Cheap path: identical SVGs mean identical graphs.
    if let (Ok(out_svg), Ok(ref_svg)) = (
        std::fs::read(out_dir.join(format!("{slug}.svg"))),
        std::fs::read(ref_dir.join(format!("{slug}.svg"))),
    ) {
        if out_svg == ref_svg {
            let _ = std::fs::remove_file(&diff_image);
            return GraphDiff::default();
        }
    }

    let out_png = out_dir.join(format!("{slug}.png"));
    let ref_png = ref_dir.join(format!("{slug}.png"));

    let compare = Command::new("compare")
        .args(["-metric", "AE", "-fuzz", GRAPH_FUZZ])
        .arg(&ref_png)
        .arg(&out_png)
        .args(["-compose", "src"])
        .arg(&diff_image)
        .output()
        .await;

    let pixels = match compare {
        Err(e) => {
            return GraphDiff::failed(format!(
                "could not execute 'compare' (is ImageMagick installed?): {e}"
            ));
        }
        // Exit 0: images identical within the fuzz tolerance.
        Ok(out) if out.status.success() => 0,
        // Exit 1: comparison ran, stderr carries the pixel count.
        Ok(out) if out.status.code() == Some(1) => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            match stderr.split_whitespace().next().and_then(|n| n.parse().ok()) {
                Some(count) => count,
                None => {
                    return GraphDiff::failed(format!(
                        "unexpected 'compare' output for {slug}: {}",
                        stderr.trim()
                    ));
                }
            }
        }
        Ok(out) => {
            return GraphDiff::failed(format!(
                "'compare' failed for {slug} with status {:?}:\n{}",
                out.status.code(),
                String::from_utf8_lossy(&out.stderr).trim()
            ));
        }
    };

    if pixels == 0 {
        let _ = std::fs::remove_file(&diff_image);
        return GraphDiff::default();
    }

    // Stack diff, reference and fresh output for visual inspection.
    let convert = Command::new("convert")
        .arg("-append")
        .arg(&diff_image)
        .arg(&ref_png)
        .arg(&out_png)
        .arg(&diff_image)
        .output()
        .await;

    match convert {
        Err(e) => GraphDiff {
            pixels,
            diff_image: None,
            error: Some(format!(
                "could not execute 'convert' (is ImageMagick installed?): {e}"
            )),
        },
        Ok(out) if !out.status.success() => GraphDiff {
            pixels,
            diff_image: Some(diff_image),
            error: Some(format!(
                "'convert' failed for {slug}:\n{}",
                String::from_utf8_lossy(&out.stderr).trim()
            )),
        },
        Ok(_) => GraphDiff {
            pixels,
            diff_image: Some(diff_image),
            error: None,
        },
    }
}
