use super::documents::is_housekeeping_file;
use super::file_formats::FileKind;
use crate::models::File;
use std::collections::BTreeMap;

/// The files making up one part of a product.
#[derive(Debug, Clone, PartialEq)]
pub struct PartFiles {
    /// The part name: the source file's name without its extension.
    pub name: String,

    /// Path of the part's files without extension, lower-cased.
    pub key: String,
    pub source: File,
    pub export: Vec<File>,
    pub image: Option<File>,
}

/// Infer parts from a flat list of files.
///
/// Files are grouped by their path with the extension stripped and case
/// folded, so `part.FCStd`, `part.stl` and `Part.png` land in one bucket. A
/// bucket becomes a part if it holds a CAD or PCB source file, or failing that
/// at least one export file, whose first entry then stands in as the source.
/// Later source files in a bucket are treated as exports, and only the first
/// image is kept. Buckets are returned in key order.
#[must_use]
pub fn bucket_parts(files: &[File]) -> Vec<PartFiles> {
    let mut buckets: BTreeMap<String, Vec<&File>> = BTreeMap::new();
    for file in files.iter().filter(|f| !is_housekeeping_file(f)) {
        buckets.entry(bucket_key(file)).or_default().push(file);
    }

    buckets.into_iter().filter_map(|(key, files)| into_part(key, &files)).collect()
}

/// The file's path with the extension of its last segment removed, lower-cased.
fn bucket_key(file: &File) -> String {
    let path = file.path.trim_start_matches('/');
    let segment_start = path.rfind('/').map_or(0, |slash| slash + 1);
    let without_extension = match path.rfind('.') {
        Some(dot) if dot > segment_start => &path[..dot],
        _ => path,
    };
    without_extension.to_lowercase()
}

fn into_part(key: String, files: &[&File]) -> Option<PartFiles> {
    let mut source: Option<File> = None;
    let mut export = Vec::new();
    let mut image = None;

    for &file in files {
        let Some(kind) = file.extension().and_then(FileKind::from_extension) else {
            continue;
        };

        if kind.is_source() && source.is_none() {
            source = Some(file.clone());
        } else if kind.is_source() || kind.is_export() {
            export.push(file.clone());
        } else if image.is_none() {
            image = Some(file.clone());
        }
    }

    let source = match source {
        Some(source) => source,
        None if !export.is_empty() => export.remove(0),
        None => return None,
    };

    Some(PartFiles {
        name: source.stem().to_owned(),
        key,
        source,
        export,
        image,
    })
}
