//! Streaming N-Triples reader.
//!
//! Gzip-aware, `\uXXXX`/`\UXXXXXXXX` escape-decoding, strict `<s> <p> <o> .`
//! line grammar. Malformed lines are silently skipped; I/O errors propagate.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use thiserror::Error;

use crate::triple::Triple;

#[derive(Error, Debug)]
pub enum NtReaderError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Decode `\uXXXX` and `\UXXXXXXXX` escapes to their Unicode code points.
///
/// `\U` (8 hex digits) is decoded before `\u` (4 hex digits) so a `\U`
/// escape's trailing hex digits are never mistaken for a second `\u` escape.
pub fn decode_unicode_escapes(s: &str) -> String {
    let after_big = decode_escape(s, "\\U", 8);
    decode_escape(&after_big, "\\u", 4)
}

fn decode_escape(s: &str, marker: &str, digits: usize) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find(marker) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + marker.len()..];
        if after.len() >= digits {
            let (hex, tail) = after.split_at(digits);
            if let Ok(code) = u32::from_str_radix(hex, 16) {
                if let Some(ch) = char::from_u32(code) {
                    out.push(ch);
                    rest = tail;
                    continue;
                }
            }
        }
        // Not a valid escape — keep the marker text and resume scanning just past it.
        out.push_str(marker);
        rest = after;
    }
    out.push_str(rest);
    out
}

/// Parse one N-Triples line into a `Triple`, or `None` if malformed.
///
/// A valid line ends with ` .` (after trimming the trailing newline/CR);
/// subject and predicate must be `<...>`-wrapped. Blank-node subjects are
/// rejected here (see the "blank-node resolution" gap in the module docs).
fn parse_line(line: &str, origin: &str) -> Option<Triple> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let body = line.trim_end();
    let body = body.strip_suffix(" .")?;

    let mut parts = body.splitn(3, ' ');
    let subject = parts.next()?;
    let predicate = parts.next()?;
    let object = parts.next()?;

    if Triple::is_blank(subject) {
        return None;
    }
    if !Triple::is_iri(subject) || !Triple::is_iri(predicate) {
        return None;
    }

    let subject = decode_unicode_escapes(subject);
    let predicate = decode_unicode_escapes(predicate);
    let object = decode_unicode_escapes(object);

    Some(Triple::new(subject, predicate, object, origin))
}

/// Lazily reads well-formed triples from a single `.nt` or `.nt.gz` file.
pub struct NtFileReader {
    lines: Box<dyn Iterator<Item = std::io::Result<String>>>,
    origin: String,
    skipped: usize,
}

impl NtFileReader {
    pub fn open(path: &Path) -> Result<Self, NtReaderError> {
        let file = File::open(path).map_err(|source| NtReaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let origin = path.display().to_string();

        let lines: Box<dyn Iterator<Item = std::io::Result<String>>> =
            if path.extension().and_then(|e| e.to_str()) == Some("gz")
                || origin.ends_with(".nt.gz")
            {
                let decoder: Box<dyn Read> = Box::new(GzDecoder::new(file));
                Box::new(BufReader::new(decoder).lines())
            } else {
                Box::new(BufReader::new(file).lines())
            };

        Ok(Self {
            lines,
            origin,
            skipped: 0,
        })
    }

    /// Number of lines skipped as malformed so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for NtFileReader {
    type Item = Result<Triple, NtReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(l) => l,
                Err(source) => {
                    return Some(Err(NtReaderError::Io {
                        path: PathBuf::from(&self.origin),
                        source,
                    }))
                }
            };
            match parse_line(&line, &self.origin) {
                Some(triple) => return Some(Ok(triple)),
                None => {
                    self.skipped += 1;
                    tracing::trace!(origin = %self.origin, "skipping malformed NT line");
                    continue;
                }
            }
        }
    }
}

/// Read every well-formed triple from a list of files, in order.
pub fn read_triples(paths: &[PathBuf]) -> impl Iterator<Item = Result<Triple, NtReaderError>> + '_ {
    paths.iter().flat_map(|path| {
        match NtFileReader::open(path) {
            Ok(reader) => Box::new(reader) as Box<dyn Iterator<Item = Result<Triple, NtReaderError>>>,
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn decodes_small_unicode_escape() {
        assert_eq!(decode_unicode_escapes("caf\\u00e9"), "café");
    }

    #[test]
    fn decodes_big_unicode_escape_before_small() {
        // \U0001F600 is an emoji; must not be partially consumed by the \u pass.
        let decoded = decode_unicode_escapes("\\U0001F600smile");
        assert!(decoded.ends_with("smile"));
        assert_eq!(decoded.chars().next().unwrap() as u32, 0x1F600);
    }

    #[test]
    fn parses_well_formed_line() {
        let t = parse_line(
            "<http://ex/s> <http://ex/p> \"hello\" .",
            "fixture.nt",
        )
        .unwrap();
        assert_eq!(t.subject, "<http://ex/s>");
        assert_eq!(t.predicate, "<http://ex/p>");
        assert_eq!(t.object, "\"hello\"");
    }

    #[test]
    fn rejects_missing_trailing_dot() {
        assert!(parse_line("<http://ex/s> <http://ex/p> \"hello\"", "f").is_none());
    }

    #[test]
    fn rejects_blank_subject() {
        assert!(parse_line("_:b0 <http://ex/p> \"hello\" .", "f").is_none());
    }

    #[test]
    fn rejects_unbracketed_predicate() {
        assert!(parse_line("<http://ex/s> p \"hello\" .", "f").is_none());
    }

    #[test]
    fn streams_file_skipping_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.nt");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "<http://ex/s1> <http://ex/p> \"a\" .").unwrap();
        writeln!(f, "this line is garbage").unwrap();
        writeln!(f, "<http://ex/s2> <http://ex/p> \"b\" .").unwrap();
        drop(f);

        let mut reader = NtFileReader::open(&path).unwrap();
        let first = reader.next().unwrap().unwrap();
        assert_eq!(first.subject, "<http://ex/s1>");
        let second = reader.next().unwrap().unwrap();
        assert_eq!(second.subject, "<http://ex/s2>");
        assert!(reader.next().is_none());
        assert_eq!(reader.skipped(), 1);
    }

    #[test]
    fn streams_gzipped_file() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.nt.gz");
        let f = File::create(&path).unwrap();
        let mut enc = GzEncoder::new(f, Compression::default());
        writeln!(enc, "<http://ex/s1> <http://ex/p> \"a\" .").unwrap();
        enc.finish().unwrap();

        let mut reader = NtFileReader::open(&path).unwrap();
        let first = reader.next().unwrap().unwrap();
        assert_eq!(first.subject, "<http://ex/s1>");
    }
}
