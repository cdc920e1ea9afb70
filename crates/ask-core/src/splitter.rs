//! Heuristic code splitting
//!
//! Lines are scanned for boundary markers (function declarations, arrow or
//! lambda bindings, class declarations). Each marker starts a chunk that runs
//! until the next marker. Oversized chunks are cut into overlapping line
//! windows; undersized ones are dropped.

use std::sync::LazyLock;

use regex::Regex;

use crate::chunk::{chunk_id, ChunkKind, CodeChunk};
use crate::loader::LoadedFile;
use crate::{MAX_CHUNK_SIZE, MIN_CHUNK_SIZE, WINDOW_LINES, WINDOW_OVERLAP};

static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:export\s+)?(?:default\s+)?(?:async\s+)?function(?:\s*\*\s*|\s+)([A-Za-z_$][\w$]*)|^(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+(\w+)|^(?:async\s+)?def\s+(\w+)",
    )
    .unwrap()
});

static ARROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s*)?(?:\(|[A-Za-z_$][\w$]*\s*=>|function\b)",
    )
    .unwrap()
});

static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)").unwrap()
});

/// A detected chunk boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    /// 0-indexed line where the chunk starts
    pub line: usize,
    pub kind: ChunkKind,
    pub name: String,
}

/// Test one line against the boundary patterns.
///
/// This is the only place that knows what a boundary looks like; everything
/// else works on the returned `(kind, name)`.
pub fn detect_marker(line: &str) -> Option<(ChunkKind, String)> {
    let trimmed = line.trim();

    if let Some(name) = first_capture(&FUNCTION_RE, trimmed) {
        return Some((ChunkKind::Function, name));
    }
    if let Some(name) = first_capture(&ARROW_RE, trimmed) {
        return Some((ChunkKind::Function, name));
    }
    if let Some(name) = first_capture(&CLASS_RE, trimmed) {
        return Some((ChunkKind::Class, name));
    }
    None
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    let caps = re.captures(text)?;
    caps.iter()
        .skip(1)
        .flatten()
        .next()
        .map(|m| m.as_str().to_string())
}

/// Find all markers in a file, in line order.
pub fn find_markers(lines: &[&str]) -> Vec<Marker> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(line, text)| {
            detect_marker(text).map(|(kind, name)| Marker { line, kind, name })
        })
        .collect()
}

/// Split all files into chunks, preserving file order.
pub fn split_files(files: &[LoadedFile]) -> Vec<CodeChunk> {
    let chunks: Vec<CodeChunk> = files.iter().flat_map(split_file).collect();
    tracing::info!("Split {} files into {} chunks", files.len(), chunks.len());
    chunks
}

/// Split a single file into chunks.
pub fn split_file(file: &LoadedFile) -> Vec<CodeChunk> {
    let lines: Vec<&str> = file.content.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let markers = find_markers(&lines);
    let mut chunks = Vec::new();
    let path = file.relative_path.as_str();

    let Some(first) = markers.first() else {
        push_region(&mut chunks, path, &lines, 0, lines.len(), ChunkKind::Other, None);
        return chunks;
    };

    // Header material (imports, module docs) before the first boundary
    if first.line > 0 {
        push_region(&mut chunks, path, &lines, 0, first.line, ChunkKind::Other, None);
    }

    for (i, marker) in markers.iter().enumerate() {
        let end = markers.get(i + 1).map_or(lines.len(), |next| next.line);
        push_region(
            &mut chunks,
            path,
            &lines,
            marker.line,
            end,
            marker.kind,
            Some(&marker.name),
        );
    }

    chunks
}

/// `lines[start..end]` without its leading and trailing blank lines, or
/// `None` when every line is blank.
fn non_blank_span(lines: &[&str], start: usize, end: usize) -> Option<(usize, usize)> {
    let first = (start..end).find(|&i| !lines[i].trim().is_empty())?;
    let last = (first..end).rev().find(|&i| !lines[i].trim().is_empty())?;
    Some((first, last + 1))
}

/// Emit the region `lines[start..end]` as one chunk, or as windows when oversized.
///
/// Line numbers cover the trimmed content, so blank edge lines are not counted.
fn push_region(
    chunks: &mut Vec<CodeChunk>,
    path: &str,
    lines: &[&str],
    start: usize,
    end: usize,
    kind: ChunkKind,
    name: Option<&str>,
) {
    let Some((first, last)) = non_blank_span(lines, start, end) else {
        return;
    };
    let content = lines[first..last].join("\n");
    let content = content.trim();

    if content.len() < MIN_CHUNK_SIZE {
        return;
    }

    if content.len() <= MAX_CHUNK_SIZE {
        chunks.push(CodeChunk {
            id: chunk_id(path, first + 1),
            file_path: path.to_string(),
            content: content.to_string(),
            start_line: first + 1,
            end_line: last,
            kind,
            name: name.map(str::to_string),
        });
        return;
    }

    push_windows(chunks, path, lines, start, end, kind, name);
}

/// Cut `lines[start..end]` into `WINDOW_LINES`-line windows sharing `WINDOW_OVERLAP` lines.
fn push_windows(
    chunks: &mut Vec<CodeChunk>,
    path: &str,
    lines: &[&str],
    start: usize,
    end: usize,
    kind: ChunkKind,
    name: Option<&str>,
) {
    let step = WINDOW_LINES - WINDOW_OVERLAP;
    let mut window_start = start;
    let mut part = 1;

    loop {
        let window_end = (window_start + WINDOW_LINES).min(end);
        let next_start = window_start + step;

        if let Some((first, last)) = non_blank_span(lines, window_start, window_end) {
            let content = lines[first..last].join("\n");
            let content = content.trim();

            // Text starting inside the overlap belongs to the next window
            let covered_by_next = window_end < end && first >= next_start;

            if content.len() >= MIN_CHUNK_SIZE && !covered_by_next {
                chunks.push(CodeChunk {
                    id: chunk_id(path, first + 1),
                    file_path: path.to_string(),
                    content: content.to_string(),
                    start_line: first + 1,
                    end_line: last,
                    kind,
                    name: name.map(|n| format!("{} (part {})", n, part)),
                });
            }
        }

        if window_end >= end {
            break;
        }
        window_start = next_start;
        part += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, content: &str) -> LoadedFile {
        LoadedFile {
            relative_path: path.to_string(),
            content: content.to_string(),
        }
    }

    /// A function of `body_lines` lines, each ~30 chars.
    fn function_source(name: &str, body_lines: usize) -> String {
        let mut source = format!("function {}(input: number) {{\n", name);
        for i in 0..body_lines {
            source.push_str(&format!("    const value{:03} = input * {};\n", i, i));
        }
        source.push_str("}\n");
        source
    }

    #[test]
    fn test_detect_marker_patterns() {
        assert_eq!(
            detect_marker("export async function loadFiles(root) {"),
            Some((ChunkKind::Function, "loadFiles".to_string()))
        );
        assert_eq!(
            detect_marker("  export const retrieve = async (query) => {"),
            Some((ChunkKind::Function, "retrieve".to_string()))
        );
        assert_eq!(
            detect_marker("let handler: Handler = (event) => {"),
            Some((ChunkKind::Function, "handler".to_string()))
        );
        assert_eq!(
            detect_marker("export abstract class Store {"),
            Some((ChunkKind::Class, "Store".to_string()))
        );
        assert_eq!(
            detect_marker("pub async fn embed(&self) -> Result<()> {"),
            Some((ChunkKind::Function, "embed".to_string()))
        );
        assert_eq!(
            detect_marker("def split_file(file):"),
            Some((ChunkKind::Function, "split_file".to_string()))
        );
        assert_eq!(detect_marker("const LIMIT = 10;"), None);
        assert_eq!(detect_marker("// function in a comment"), None);
        assert_eq!(detect_marker("return classify(x);"), None);
        assert_eq!(detect_marker("functionName(arg);"), None);
    }

    #[test]
    fn test_empty_file() {
        assert!(split_file(&file("empty.ts", "")).is_empty());
    }

    #[test]
    fn test_boilerplate_below_minimum() {
        let chunks = split_file(&file("tiny.ts", "import x from 'y';\n\nexport { x };\n"));
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_no_markers_single_chunk() {
        let content = "// configuration values\n".repeat(10);
        let chunks = split_file(&file("config.ts", &content));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Other);
        assert_eq!(chunks[0].name, None);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 10);
        assert_eq!(chunks[0].content, content.trim());
    }

    #[test]
    fn test_marker_count_with_header() {
        let mut source = String::new();
        source.push_str("import { readFileSync } from 'fs';\n");
        source.push_str("import { join, relative, resolve } from 'path';\n");
        source.push_str("import type { LoadedFile } from './loader.js';\n");
        source.push_str(&function_source("first", 5));
        source.push_str(&function_source("second", 5));
        source.push_str("export class Third {\n");
        source.push_str(&"    private readonly field: string = 'value';\n".repeat(4));
        source.push_str("}\n");

        let chunks = split_file(&file("src/mod.ts", &source));

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].kind, ChunkKind::Other);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 3));
        assert_eq!(chunks[1].name.as_deref(), Some("first"));
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (4, 10));
        assert_eq!(chunks[2].name.as_deref(), Some("second"));
        assert_eq!(chunks[2].start_line, 11);
        assert_eq!(chunks[3].kind, ChunkKind::Class);
        assert_eq!(chunks[3].name.as_deref(), Some("Third"));
        assert_eq!(chunks[3].end_line, source.lines().count());
    }

    #[test]
    fn test_trivial_header_is_dropped() {
        let source = format!("'use strict';\n{}", function_source("only", 5));
        let chunks = split_file(&file("a.js", &source));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].name.as_deref(), Some("only"));
        assert_eq!(chunks[0].start_line, 2);
    }

    #[test]
    fn test_oversized_function_is_windowed() {
        let source = function_source("foo", 120);
        let total_lines = source.lines().count();
        let chunks = split_file(&file("src/foo.ts", &source));

        // 122 lines -> windows start at 0, 45, 90
        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.kind, ChunkKind::Function);
            assert_eq!(chunk.name, Some(format!("foo (part {})", i + 1)));
            assert!(chunk.content.len() <= MAX_CHUNK_SIZE);
            assert!(chunk.content.len() >= MIN_CHUNK_SIZE);
        }
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 50));
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (46, 95));
        assert_eq!((chunks[2].start_line, chunks[2].end_line), (91, total_lines));

        let ids: std::collections::HashSet<_> = chunks.iter().map(|c| &c.id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_line_numbers_skip_blank_edges() {
        let content = format!("\n\n{}\n\n", "// configuration values\n".repeat(10));
        let chunks = split_file(&file("config.ts", &content));

        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (3, 12));
    }

    #[test]
    fn test_window_line_numbers_match_content() {
        let mut lines: Vec<String> = function_source("foo", 120).lines().map(String::from).collect();
        // Second window (from line 46) opens with two blank lines
        lines[45].clear();
        lines[46].clear();
        let source = lines.join("\n");

        let chunks = split_file(&file("src/foo.ts", &source));

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].start_line, 48);
        assert_eq!(chunks[1].id, chunk_id("src/foo.ts", 48));
        for chunk in &chunks {
            let body: Vec<&str> = chunk.content.lines().collect();
            assert_eq!(body.len(), chunk.end_line - chunk.start_line + 1);
            assert_eq!(body[0], lines[chunk.start_line - 1].trim());
            assert_eq!(body[body.len() - 1], lines[chunk.end_line - 1].trim_end());
        }
    }

    #[test]
    fn test_chunk_size_bounds() {
        let mut source = String::new();
        for i in 0..6 {
            source.push_str(&function_source(&format!("f{}", i), 20 + i * 30));
        }
        source.push_str("const small = () => 1;\n");

        for chunk in split_file(&file("many.ts", &source)) {
            assert!(chunk.content.len() >= MIN_CHUNK_SIZE);
            assert!(chunk.content.len() <= MAX_CHUNK_SIZE);
            assert!(chunk.start_line <= chunk.end_line);
        }
    }

    #[test]
    fn test_split_is_deterministic() {
        let mut source = "import a from 'a';\n".repeat(8);
        source.push_str(&function_source("alpha", 70));
        source.push_str(&function_source("beta", 10));
        let files = vec![file("src/x.ts", &source), file("src/y.ts", &source)];

        let first = split_files(&files);
        let second = split_files(&files);

        assert_eq!(first, second);
        assert_ne!(first[0].id, split_files(&files[1..])[0].id);
    }

    #[test]
    fn test_two_file_scenario() {
        let mut plain = String::new();
        for i in 0..80 {
            plain.push_str(&format!("// note {:02}: plain text\n", i));
        }
        let files = vec![
            file("src/foo.ts", &function_source("foo", 120)),
            file("notes/plain.ts", &plain),
        ];

        let chunks = split_files(&files);

        assert!(chunks.len() >= 2);
        let other: Vec<_> = chunks
            .iter()
            .filter(|c| c.file_path == "notes/plain.ts")
            .collect();
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].kind, ChunkKind::Other);

        let foo: Vec<_> = chunks.iter().filter(|c| c.file_path == "src/foo.ts").collect();
        assert!(!foo.is_empty());
        for chunk in foo {
            assert_eq!(chunk.kind, ChunkKind::Function);
            assert!(chunk.name.as_deref().unwrap().starts_with("foo"));
        }
    }
}
