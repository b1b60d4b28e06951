use thiserror::Error;

pub mod frontend;
pub mod hex;
pub mod render;
pub mod resolve;
pub mod scan;

use frontend::SourceLoader;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("could not parse stack trace")]
    Scan(#[from] scan::ScanError),
    #[error("could not load referenced source files")]
    Load(#[from] frontend::LoadError),
    #[error("could not decode frame arguments")]
    Render(#[from] render::RenderError),
}

#[derive(Debug)]
pub struct EnrichedTrace {
    // every input line in order, frame lines replaced by their typed form
    pub lines: Vec<String>,
    // qualified paths that matched no declaration; their lines are untouched
    pub unbound: Vec<String>,
}

/// Runs the whole pipeline over one trace: scan the lines, load the
/// referenced sources in a single batch, bind each frame to its declared
/// signature, and rewrite every call occurrence in place.
pub fn enrich_trace<L: SourceLoader>(
    input: &str,
    loader: &mut L,
) -> Result<EnrichedTrace, TraceError> {
    let mut trace = scan::scan_trace(input)?;
    let mut unbound = Vec::new();

    if !trace.frames.is_empty() {
        let packages = loader.load(&trace.load_patterns)?;
        resolve::bind_frames(&mut trace.frames, &packages);

        for frame in &trace.frames {
            let Some(bound) = &frame.bound else {
                unbound.push(frame.path.clone());
                continue;
            };
            let pkg = &packages[bound.pkg];
            for call in &frame.calls {
                trace.lines[call.line_idx] = render::render_call(frame, bound, pkg, call)?;
            }
        }
    }

    Ok(EnrichedTrace {
        lines: trace.lines,
        unbound,
    })
}
