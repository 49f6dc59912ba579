//! Line-oriented `.kubeka` file parser.
//!
//! Each line is one of: a `[type]` node header, a `KEY = value` assignment,
//! a `KEY += value` append, a `# comment` (or trailing comment), or blank.
//! Anything else is a warning, not a hard error, so a stray typo does not
//! stop the rest of the file from loading.

use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Diagnostics, KubekaError};
use crate::node::{NodeType, SourceNode};

/// 1 MiB per line, matching the original's fixed line buffer.
const MAX_LINE_LEN: usize = 1024 * 1024;

/// Reads one `.kubeka` file, appending every parsed node to `dst`.
/// Errors and warnings are recorded on `diags`; this function never returns
/// `Err` for recoverable per-line problems, only propagates I/O failures
/// opening the file itself.
///
/// Lines are read as raw bytes via `read_until(b'\n', ..)` rather than
/// `BufRead::lines()`, because `lines()` strips a trailing `\r` along with
/// the `\n` before handing the string back — which would make a CRLF file
/// look identical to an LF one by the time the carriage-return check runs.
pub fn read_file(dst: &mut Vec<SourceNode>, path: &Path, diags: &Diagnostics) -> std::io::Result<()> {
    let file = std::fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let fname = path.display().to_string();

    let mut current: Option<SourceNode> = None;
    let mut buf: Vec<u8> = Vec::new();
    let mut lineno = 0usize;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        lineno += 1;

        if buf.len() > MAX_LINE_LEN {
            diags.error(KubekaError::parse(&fname, lineno, "line exceeds 1 MiB cap"));
            continue;
        }
        if buf.contains(&b'\r') {
            diags.error(KubekaError::parse(&fname, lineno, "carriage return not permitted"));
            continue;
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }

        let raw = match std::str::from_utf8(&buf) {
            Ok(s) => s,
            Err(e) => {
                diags.error(KubekaError::parse(&fname, lineno, format!("invalid UTF-8: {e}")));
                continue;
            }
        };

        let stripped = match raw.find('#') {
            Some(i) => &raw[..i],
            None => raw,
        };
        let line = stripped.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            match NodeType::parse(header.trim()) {
                Some(ty) => {
                    if let Some(prev) = current.take() {
                        dst.push(prev);
                    }
                    current = Some(SourceNode::new(ty, &fname, lineno));
                }
                None => {
                    diags.error(KubekaError::parse(&fname, lineno, format!("unknown node type '{header}'")));
                }
            }
            continue;
        }

        if let Some((key, value)) = line.split_once("+=") {
            let key = key.trim();
            let value = value.trim();
            match current.as_mut() {
                Some(node) => {
                    if let Err(e) = node.symtab.append(key, value, false) {
                        diags.error(KubekaError::parse(&fname, lineno, e.to_string()));
                    }
                }
                None => diags.error(KubekaError::parse(
                    &fname,
                    lineno,
                    format!("'{key} += ...' outside any node"),
                )),
            }
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim();
            match current.as_mut() {
                Some(node) => {
                    if let Err(e) = node.symtab.set(key, value, false) {
                        diags.error(KubekaError::parse(&fname, lineno, e.to_string()));
                    }
                }
                None => diags.error(KubekaError::parse(
                    &fname,
                    lineno,
                    format!("'{key} = ...' outside any node"),
                )),
            }
            continue;
        }

        diags.warn(KubekaError::warning(format!(
            "{fname}:{lineno}: unrecognized pattern '{line}'"
        )));
    }

    if let Some(last) = current.take() {
        dst.push(last);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parses_single_node() {
        let f = write_tmp("[job]\nID = a\nMESSAGE = hello\nEXEC = echo hi\n");
        let diags = Diagnostics::new(false);
        let mut nodes = Vec::new();
        read_file(&mut nodes, f.path(), &diags).unwrap();
        assert_eq!(diags.nerrors(), 0);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id(), "a");
        assert_eq!(nodes[0].message(), "hello");
    }

    #[test]
    fn append_accumulates_array() {
        let f = write_tmp("[entrypoint]\nID = a\nMESSAGE = hi\nJOBS += x\nJOBS += y\n");
        let diags = Diagnostics::new(false);
        let mut nodes = Vec::new();
        read_file(&mut nodes, f.path(), &diags).unwrap();
        assert_eq!(
            nodes[0].symtab.get("JOBS").unwrap(),
            &["x".to_string(), "y".to_string()]
        );
    }

    #[test]
    fn comment_and_blank_lines_skipped() {
        let f = write_tmp("# a comment\n\n[job]\nID = a # trailing comment\nMESSAGE = m\nEXEC = echo\n");
        let diags = Diagnostics::new(false);
        let mut nodes = Vec::new();
        read_file(&mut nodes, f.path(), &diags).unwrap();
        assert_eq!(diags.nerrors(), 0);
        assert_eq!(nodes[0].id(), "a");
    }

    #[test]
    fn unknown_type_is_error_but_iteration_continues() {
        let f = write_tmp("[bogus]\nID = a\n[job]\nID = b\nMESSAGE = m\nEXEC = echo\n");
        let diags = Diagnostics::new(false);
        let mut nodes = Vec::new();
        read_file(&mut nodes, f.path(), &diags).unwrap();
        assert!(diags.nerrors() >= 1);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id(), "b");
    }

    #[test]
    fn unrecognized_pattern_is_a_warning_not_an_error() {
        let f = write_tmp("[job]\nID = a\nMESSAGE = m\nEXEC = echo\njust some words\n");
        let diags = Diagnostics::new(false);
        let mut nodes = Vec::new();
        read_file(&mut nodes, f.path(), &diags).unwrap();
        assert_eq!(diags.nerrors(), 0);
        assert_eq!(diags.nwarnings(), 1);
    }

    #[test]
    fn crlf_line_endings_are_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"[job]\r\nID = a\r\nMESSAGE = m\r\nEXEC = echo\r\n")
            .unwrap();
        let diags = Diagnostics::new(false);
        let mut nodes = Vec::new();
        read_file(&mut nodes, f.path(), &diags).unwrap();
        assert!(diags.nerrors() > 0);
    }
}
