use std::collections::HashMap;

use regex::Regex;
use thiserror::Error;

use crate::hex::{self, MalformedHexWord};
use crate::resolve::Bound;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    MalformedHexWord(#[from] MalformedHexWord),
    #[error("line {line_no}: expected file:line after frame line, got {text:?}")]
    MalformedLocation { line_no: usize, text: String },
}

#[derive(Debug)]
pub struct Trace {
    pub lines: Vec<String>,
    pub frames: Vec<FrameRecord>,
    pub load_patterns: Vec<String>,
}

/// One distinct qualified function path seen in the trace, with every call
/// occurrence that referenced it. File and line come from the first
/// occurrence.
#[derive(Debug)]
pub struct FrameRecord {
    pub path: String,
    pub pkg_name: String,
    pub func_name: String,
    pub file: String,
    pub line: u32,
    pub calls: Vec<Call>,
    pub bound: Option<Bound>,
}

#[derive(Debug)]
pub struct Call {
    pub line_idx: usize,
    pub arg_bytes: Vec<u8>,
    pub truncated: bool,
}

pub fn scan_trace(input: &str) -> Result<Trace, ScanError> {
    let frame_re = Regex::new(r"^.+\..+\(.*\)$").unwrap();

    let lines: Vec<String> = input.split('\n').map(str::to_string).collect();
    let mut frames: Vec<FrameRecord> = Vec::new();
    let mut by_path: HashMap<String, usize> = HashMap::new();
    let mut load_patterns: Vec<String> = Vec::new();

    // The last line never starts a frame: a frame line always has its
    // location line as a neighbour.
    let mut i = 0;
    while i + 1 < lines.len() {
        if !frame_re.is_match(&lines[i]) {
            i += 1;
            continue;
        }
        let frame_line = &lines[i];
        let location_line = &lines[i + 1];

        let open = frame_line.rfind('(').unwrap();
        let close = frame_line.rfind(')').unwrap();
        let path = &frame_line[..open];
        let (arg_bytes, truncated) = hex::decode_words(&frame_line[open + 1..close])?;

        let (file, line) =
            parse_location(location_line).ok_or_else(|| ScanError::MalformedLocation {
                line_no: i + 2,
                text: location_line.clone(),
            })?;

        let call = Call {
            line_idx: i,
            arg_bytes,
            truncated,
        };
        if let Some(&idx) = by_path.get(path) {
            frames[idx].calls.push(call);
        } else {
            let first_dot = path.find('.').unwrap();
            let last_dot = path.rfind('.').unwrap();

            let pattern = format!("file={file}");
            if !load_patterns.contains(&pattern) {
                load_patterns.push(pattern);
            }

            by_path.insert(path.to_string(), frames.len());
            frames.push(FrameRecord {
                path: path.to_string(),
                pkg_name: path[..first_dot].to_string(),
                func_name: path[last_dot + 1..].to_string(),
                file,
                line,
                calls: vec![call],
                bound: None,
            });
        }
        i += 2;
    }

    Ok(Trace {
        lines,
        frames,
        load_patterns,
    })
}

fn parse_location(line: &str) -> Option<(String, u32)> {
    let (file, rest) = line.split_once(':')?;
    let digits = rest.split(' ').next().unwrap_or(rest);
    let number = digits.parse::<u32>().ok()?;
    Some((file.trim().to_string(), number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex::{word_to_addr, WORD};

    #[test]
    fn frame_and_location_are_extracted() {
        let trace = scan_trace("main.Add(0x7, 0x5)\n\t/tmp/a.go:10 +0x25\n").unwrap();
        assert_eq!(trace.frames.len(), 1);
        let f = &trace.frames[0];
        assert_eq!(f.path, "main.Add");
        assert_eq!(f.pkg_name, "main");
        assert_eq!(f.func_name, "Add");
        assert_eq!(f.file, "/tmp/a.go");
        assert_eq!(f.line, 10);
        assert_eq!(f.calls.len(), 1);
        assert_eq!(f.calls[0].line_idx, 0);
        assert_eq!(f.calls[0].arg_bytes.len(), 2 * WORD);
        assert_eq!(word_to_addr(&f.calls[0].arg_bytes), 7);
        assert_eq!(trace.load_patterns, ["file=/tmp/a.go"]);
    }

    #[test]
    fn method_paths_split_on_first_and_last_dot() {
        let trace = scan_trace("main.(*T).Method(0x1)\n\t/tmp/a.go:20\n").unwrap();
        let f = &trace.frames[0];
        assert_eq!(f.pkg_name, "main");
        assert_eq!(f.func_name, "Method");
        assert_eq!(f.path, "main.(*T).Method");
    }

    #[test]
    fn repeated_frames_share_one_record() {
        let input = "\
goroutine 1 [running]:
main.Add(0x1, 0x2)
\t/tmp/a.go:10 +0x25
main.Add(0x3, 0x4, ...)
\t/tmp/a.go:10 +0x25
";
        let trace = scan_trace(input).unwrap();
        assert_eq!(trace.frames.len(), 1);
        let f = &trace.frames[0];
        assert_eq!(f.calls.len(), 2);
        assert_eq!(f.calls[0].line_idx, 1);
        assert_eq!(f.calls[1].line_idx, 3);
        assert!(!f.calls[0].truncated);
        assert!(f.calls[1].truncated);
        // one load pattern even though the file was referenced twice
        assert_eq!(trace.load_patterns, ["file=/tmp/a.go"]);
    }

    #[test]
    fn non_frame_lines_are_kept_verbatim() {
        let input = "panic: boom\n\ngoroutine 1 [running]:\nmain.Go(0x1)\n\t/tmp/a.go:3\nexit status 2";
        let trace = scan_trace(input).unwrap();
        assert_eq!(trace.frames.len(), 1);
        assert_eq!(trace.lines[0], "panic: boom");
        assert_eq!(trace.lines[1], "");
        assert_eq!(trace.lines[2], "goroutine 1 [running]:");
        assert_eq!(trace.lines[4], "\t/tmp/a.go:3");
        assert_eq!(trace.lines[5], "exit status 2");
    }

    #[test]
    fn frame_on_final_line_has_no_neighbour() {
        let trace = scan_trace("main.Add(0x1)").unwrap();
        assert!(trace.frames.is_empty());
    }

    #[test]
    fn missing_colon_is_malformed_location() {
        let err = scan_trace("main.Add(0x1)\n\t/tmp/a.go\n").unwrap_err();
        assert!(matches!(
            err,
            ScanError::MalformedLocation { line_no: 2, .. }
        ));
    }

    #[test]
    fn non_numeric_line_is_malformed_location() {
        let err = scan_trace("main.Add(0x1)\n\t/tmp/a.go:ten\n").unwrap_err();
        assert!(matches!(err, ScanError::MalformedLocation { .. }));
    }

    #[test]
    fn repeated_occurrences_are_still_validated() {
        let input = "main.Add(0x1)\n\t/tmp/a.go:10\nmain.Add(0x2)\nnot a location\n";
        let err = scan_trace(input).unwrap_err();
        assert!(matches!(
            err,
            ScanError::MalformedLocation { line_no: 4, .. }
        ));
    }

    #[test]
    fn bad_hex_in_frame_is_fatal() {
        let err = scan_trace("main.Add(0xqq)\n\t/tmp/a.go:10\n").unwrap_err();
        assert!(matches!(err, ScanError::MalformedHexWord(_)));
    }

    #[test]
    fn location_extra_text_is_tolerated() {
        let trace = scan_trace("main.Add(0x1)\n  a.go:7 +0x19 fp=0xc00004\n").unwrap();
        assert_eq!(trace.frames[0].file, "a.go");
        assert_eq!(trace.frames[0].line, 7);
    }
}
