use std::collections::BTreeMap;

use crate::frontend::{walk_file, Field, Flow, Package};
use crate::scan::FrameRecord;

/// A frame's resolved signature: the owning package plus the declaration's
/// field lists, cloned out of the syntax tree at binding time.
#[derive(Debug, Clone)]
pub struct Bound {
    pub pkg: usize,
    pub recv: Option<Vec<Field>>,
    pub params: Vec<Field>,
    pub results: Vec<Field>,
}

/// Binds frames to the function types found in the loaded package graph.
/// Named declarations bind by bare name; anonymous literals bind every
/// still-unbound frame whose recorded line falls inside their span. Frames
/// that match nothing stay unbound and are left alone by the renderer.
pub fn bind_frames(frames: &mut [FrameRecord], packages: &[Package]) {
    // package name -> file -> frame indices
    let mut wanted: BTreeMap<String, BTreeMap<String, Vec<usize>>> = BTreeMap::new();
    for (idx, frame) in frames.iter().enumerate() {
        wanted
            .entry(frame.pkg_name.clone())
            .or_default()
            .entry(frame.file.clone())
            .or_default()
            .push(idx);
    }

    // The graph may cover more packages than the trace referenced; anything
    // not in the wanted map is skipped without a second look.
    for (pkg_idx, pkg) in packages.iter().enumerate() {
        let Some(files) = wanted.get(pkg.name.as_str()) else {
            continue;
        };
        for file in &pkg.files {
            let Some(frame_ids) = files.get(file.path.as_str()) else {
                continue;
            };
            let mut by_name: BTreeMap<String, usize> = BTreeMap::new();
            for &fi in frame_ids {
                if frames[fi].bound.is_none() {
                    by_name.insert(frames[fi].func_name.clone(), fi);
                }
            }
            if by_name.is_empty() {
                continue;
            }

            walk_file(file, &mut |node| {
                match &node.name {
                    Some(name) => {
                        if let Some(fi) = by_name.remove(name) {
                            frames[fi].bound = Some(Bound {
                                pkg: pkg_idx,
                                recv: node.recv.clone(),
                                params: node.params.clone(),
                                results: node.results.clone(),
                            });
                        }
                    }
                    None => {
                        let hits: Vec<String> = by_name
                            .iter()
                            .filter(|(_, &fi)| {
                                let line = frames[fi].line;
                                node.start_line <= line && line <= node.end_line
                            })
                            .map(|(name, _)| name.clone())
                            .collect();
                        for name in hits {
                            let fi = by_name.remove(&name).unwrap();
                            // literals carry no receiver
                            frames[fi].bound = Some(Bound {
                                pkg: pkg_idx,
                                recv: None,
                                params: node.params.clone(),
                                results: node.results.clone(),
                            });
                        }
                    }
                }
                if by_name.is_empty() {
                    Flow::Stop
                } else {
                    Flow::Descend
                }
            });
        }
    }
}
