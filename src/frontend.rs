use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not run source front-end {command:?}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("source front-end {command:?} failed ({status}): {stderr}")]
    Failed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("could not decode front-end package graph")]
    Decode(#[from] serde_json::Error),
}

pub trait SourceLoader {
    // One batch request covering every referenced file, as `file=PATH`
    // patterns. The returned graph may cover more packages than asked for.
    fn load(&mut self, patterns: &[String]) -> Result<Vec<Package>, LoadError>;
}

pub const FRONTEND_ENV: &str = "TRACEARGS_FRONTEND";

const DEFAULT_FRONTEND: &str = "traceargs-frontend";

/// Production loader: spawns the front-end executable with the patterns as
/// arguments and reads the package graph as JSON from its stdout.
#[derive(Debug)]
pub struct CmdLoader {
    command: String,
}

impl CmdLoader {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var(FRONTEND_ENV).unwrap_or_else(|_| DEFAULT_FRONTEND.to_string()))
    }
}

impl SourceLoader for CmdLoader {
    fn load(&mut self, patterns: &[String]) -> Result<Vec<Package>, LoadError> {
        let output = Command::new(&self.command)
            .args(patterns)
            .output()
            .map_err(|source| LoadError::Spawn {
                command: self.command.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(LoadError::Failed {
                command: self.command.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let graph: PackageGraph = serde_json::from_slice(&output.stdout)?;
        Ok(graph.packages)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageGraph {
    pub packages: Vec<Package>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    // import path, stripped from type names defined in this package
    pub path: String,
    #[serde(default)]
    pub files: Vec<SourceFile>,
    #[serde(default)]
    pub types: Vec<TypeDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    #[serde(default)]
    pub funcs: Vec<FuncNode>,
}

/// One function declaration or literal, with the literals it encloses.
/// Literals have no name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuncNode {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub recv: Option<Vec<Field>>,
    #[serde(default)]
    pub params: Vec<Field>,
    #[serde(default)]
    pub results: Vec<Field>,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(default)]
    pub nested: Vec<FuncNode>,
}

// One signature entry: a type shared by zero or more names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(rename = "type")]
    pub type_id: TypeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub u32);

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDef {
    // fully qualified display name, e.g. `*example.com/app.T`
    pub name: String,
    pub size: u64,
    #[serde(flatten)]
    pub kind: TypeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeKind {
    Basic { basic: BasicKind },
    Struct { members: Vec<Member> },
    Array { elem: TypeId, len: u64 },
    Slice,
    Map,
    Chan,
    Pointer,
    Func,
    Interface,
    // Kinds this build does not understand survive deserialization but are
    // a fatal error if a value of the type must be decoded.
    #[serde(other)]
    Opaque,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    UnsafePointer,
    #[serde(other)]
    Unknown,
}

// Record field with its front-end-computed byte offset. Offsets are
// consulted, never recomputed, so layout matches the compiler that produced
// the trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    #[serde(rename = "type")]
    pub type_id: TypeId,
    pub offset: u64,
}

pub enum Flow {
    Descend,
    SkipChildren,
    Stop,
}

/// Pre-order walk over a file's function skeleton. Returns false if the
/// visitor stopped the walk.
pub fn walk_file<F>(file: &SourceFile, visit: &mut F) -> bool
where
    F: FnMut(&FuncNode) -> Flow,
{
    for node in &file.funcs {
        if !walk_node(node, visit) {
            return false;
        }
    }
    true
}

fn walk_node<F>(node: &FuncNode, visit: &mut F) -> bool
where
    F: FnMut(&FuncNode) -> Flow,
{
    match visit(node) {
        Flow::Stop => false,
        Flow::SkipChildren => true,
        Flow::Descend => {
            for child in &node.nested {
                if !walk_node(child, visit) {
                    return false;
                }
            }
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_graph_round_trips_through_json() {
        let graph = r#"{
            "packages": [{
                "name": "main",
                "path": "example.com/app",
                "files": [{
                    "path": "/tmp/a.go",
                    "funcs": [{
                        "name": "Add",
                        "params": [{"names": ["x", "y"], "type": 0}],
                        "results": [{"names": [], "type": 0}],
                        "start_line": 10,
                        "end_line": 12
                    }]
                }],
                "types": [
                    {"name": "int", "size": 8, "kind": "basic", "basic": "int"},
                    {"name": "example.com/app.P", "size": 8, "kind": "struct",
                     "members": [{"name": "a", "type": 0, "offset": 0}]}
                ]
            }]
        }"#;
        let graph: PackageGraph = serde_json::from_str(graph).unwrap();
        let pkg = &graph.packages[0];
        assert_eq!(pkg.name, "main");
        assert_eq!(pkg.files[0].funcs[0].name.as_deref(), Some("Add"));
        assert_eq!(pkg.files[0].funcs[0].params[0].names, ["x", "y"]);
        assert!(matches!(
            pkg.types[0].kind,
            TypeKind::Basic {
                basic: BasicKind::Int
            }
        ));
        assert!(matches!(&pkg.types[1].kind, TypeKind::Struct { members } if members.len() == 1));
    }

    #[test]
    fn missing_front_end_is_a_spawn_error() {
        let mut loader = CmdLoader::new("traceargs-no-such-frontend");
        let err = loader.load(&["file=/tmp/a.go".to_string()]).unwrap_err();
        assert!(matches!(err, LoadError::Spawn { .. }));
    }

    #[test]
    fn unknown_kinds_become_opaque() {
        let def = r#"{"name": "weird", "size": 8, "kind": "quaternion"}"#;
        let def: TypeDef = serde_json::from_str(def).unwrap();
        assert!(matches!(def.kind, TypeKind::Opaque));

        let def = r#"{"name": "int128", "size": 16, "kind": "basic", "basic": "int128"}"#;
        let def: TypeDef = serde_json::from_str(def).unwrap();
        assert!(matches!(
            def.kind,
            TypeKind::Basic {
                basic: BasicKind::Unknown
            }
        ));
    }

    fn lit(start: u32, end: u32, nested: Vec<FuncNode>) -> FuncNode {
        FuncNode {
            name: None,
            recv: None,
            params: vec![],
            results: vec![],
            start_line: start,
            end_line: end,
            nested,
        }
    }

    #[test]
    fn walk_is_preorder_and_stoppable() {
        let file = SourceFile {
            path: "a.go".into(),
            funcs: vec![
                FuncNode {
                    name: Some("Outer".into()),
                    nested: vec![lit(5, 9, vec![lit(6, 7, vec![])])],
                    ..lit(1, 10, vec![])
                },
                lit(20, 30, vec![]),
            ],
        };

        let mut spans = vec![];
        walk_file(&file, &mut |node| {
            spans.push((node.start_line, node.end_line));
            Flow::Descend
        });
        assert_eq!(spans, [(1, 10), (5, 9), (6, 7), (20, 30)]);

        let mut visited = 0;
        let done = walk_file(&file, &mut |_| {
            visited += 1;
            Flow::Stop
        });
        assert!(!done);
        assert_eq!(visited, 1);

        let mut visited = 0;
        walk_file(&file, &mut |_| {
            visited += 1;
            Flow::SkipChildren
        });
        assert_eq!(visited, 2);
    }
}
