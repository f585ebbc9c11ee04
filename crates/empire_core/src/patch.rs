//! Applies JSON Patch (RFC 6902) files to a configuration document.
//!
//! Files apply in the order given. Each file is atomic: its operations run
//! against a scratch copy of the configuration, which replaces the current
//! one only if every operation succeeds and the result still indexes as a
//! valid configuration. A failing file is skipped and reported; later files
//! still run.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::core_api::{CoreError, CoreErrorCode, PatchReport, SkippedPatch};
use crate::document::{ConfigDocument, escape_token};

pub const PATCH_FILE_EXTENSION: &str = "json";

/// Whether this build/runtime may apply patches. Resolved once when the
/// engine is configured; when unavailable the engine passes configurations
/// through untouched and says so in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PatchCapability {
    #[default]
    Available,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchFile {
    name: String,
    contents: Vec<u8>,
}

impl PatchFile {
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }
}

/// Reads every `*.json` file in `dir`, ordered by file name. A missing
/// directory means there are no patches.
pub fn read_patch_dir(dir: &Path) -> Result<Vec<PatchFile>, CoreError> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "no patch directory");
        return Ok(Vec::new());
    }

    let io_error = |e: std::io::Error| {
        CoreError::new(
            CoreErrorCode::Io,
            format!("failed to read patch directory {}: {e}", dir.display()),
        )
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(PATCH_FILE_EXTENSION))
        {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    paths
        .into_iter()
        .map(|path| {
            let contents = fs::read(&path).map_err(|e| {
                CoreError::new(
                    CoreErrorCode::Io,
                    format!("failed to read patch {}: {e}", path.display()),
                )
            })?;
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(PatchFile::new(name, contents))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PatchEngine {
    capability: PatchCapability,
}

impl PatchEngine {
    pub fn new(capability: PatchCapability) -> Self {
        Self { capability }
    }

    pub fn capability(&self) -> PatchCapability {
        self.capability
    }

    pub fn apply(
        &self,
        config: ConfigDocument,
        patches: &[PatchFile],
    ) -> (ConfigDocument, PatchReport) {
        let mut report = PatchReport::new(self.capability);

        if self.capability == PatchCapability::Unavailable {
            if !patches.is_empty() {
                warn!(
                    count = patches.len(),
                    "patch support unavailable; configuration loaded unpatched"
                );
            }
            report.not_applied = patches.iter().map(|p| p.name().to_string()).collect();
            return (config, report);
        }

        let mut current = config;
        for patch in patches {
            match apply_file(&current, patch) {
                Ok(next) => {
                    info!(patch = patch.name(), "patch applied");
                    current = next;
                    report.applied.push(patch.name().to_string());
                }
                Err(failure) => {
                    warn!(patch = patch.name(), %failure, "patch skipped");
                    report.skipped.push(failure.into_skipped(patch.name()));
                }
            }
        }

        (current, report)
    }
}

fn apply_file(config: &ConfigDocument, patch: &PatchFile) -> Result<ConfigDocument, Failure> {
    let value: Value = serde_json::from_slice(patch.contents())
        .map_err(|e| Failure::file(format!("patch is not valid JSON: {e}")))?;
    let operations = parse_operations(&value)?;

    let mut root = config.to_value();
    apply_operations(&mut root, &operations)?;

    ConfigDocument::from_value(root).map_err(|e| Failure {
        operation: None,
        path: e.subject.clone(),
        reason: format!("patched configuration is invalid: {}", e.message),
    })
}

#[derive(Debug, Clone, PartialEq)]
struct Failure {
    operation: Option<usize>,
    path: Option<String>,
    reason: String,
}

impl Failure {
    fn file(reason: impl Into<String>) -> Self {
        Self {
            operation: None,
            path: None,
            reason: reason.into(),
        }
    }

    fn into_skipped(self, file: &str) -> SkippedPatch {
        let message = match self.operation {
            Some(index) => format!("{file}: operation {index}: {}", self.reason),
            None => format!("{file}: {}", self.reason),
        };
        let mut error = CoreError::new(CoreErrorCode::PatchApplicationFailure, message);
        if let Some(path) = &self.path {
            error = error.with_subject(path.clone());
        }
        SkippedPatch {
            file: file.to_string(),
            operation: self.operation,
            path: self.path,
            error,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(index) = self.operation {
            write!(f, "operation {index}: ")?;
        }
        f.write_str(&self.reason)?;
        if let Some(path) = &self.path {
            write!(f, " ({path})")?;
        }
        Ok(())
    }
}

/// RFC 6901 JSON Pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Pointer {
    tokens: Vec<String>,
}

impl Pointer {
    fn parse(raw: &str) -> Result<Self, String> {
        if raw.is_empty() {
            return Ok(Self { tokens: Vec::new() });
        }
        let Some(rest) = raw.strip_prefix('/') else {
            return Err(format!("pointer \"{raw}\" must start with '/'"));
        };

        let tokens = rest
            .split('/')
            .map(|token| unescape_token(token).ok_or_else(|| format!("bad escape in \"{raw}\"")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tokens })
    }

    fn is_prefix_of(&self, other: &Pointer) -> bool {
        other.tokens.len() > self.tokens.len() && other.tokens.starts_with(&self.tokens)
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            write!(f, "/{}", escape_token(token))?;
        }
        Ok(())
    }
}

fn unescape_token(token: &str) -> Option<String> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => return None,
        }
    }
    Some(out)
}

#[derive(Debug, Clone, PartialEq)]
enum Operation {
    Add { path: Pointer, value: Value },
    Remove { path: Pointer },
    Replace { path: Pointer, value: Value },
    Move { from: Pointer, path: Pointer },
    Copy { from: Pointer, path: Pointer },
    Test { path: Pointer, value: Value },
}

impl Operation {
    fn path(&self) -> &Pointer {
        match self {
            Self::Add { path, .. }
            | Self::Remove { path }
            | Self::Replace { path, .. }
            | Self::Move { path, .. }
            | Self::Copy { path, .. }
            | Self::Test { path, .. } => path,
        }
    }
}

fn parse_operations(value: &Value) -> Result<Vec<Operation>, Failure> {
    let Some(operations) = value.as_array() else {
        return Err(Failure::file("patch must be an array of operations"));
    };

    operations
        .iter()
        .enumerate()
        .map(|(index, operation)| {
            parse_operation(operation).map_err(|reason| Failure {
                operation: Some(index),
                path: operation
                    .get("path")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                reason,
            })
        })
        .collect()
}

fn parse_operation(operation: &Value) -> Result<Operation, String> {
    let fields = operation
        .as_object()
        .ok_or_else(|| "operation must be an object".to_string())?;
    let name = fields
        .get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| "operation has no \"op\"".to_string())?;
    let path = pointer_field(fields, "path")?;

    match name {
        "add" => Ok(Operation::Add {
            path,
            value: value_field(fields)?,
        }),
        "remove" => Ok(Operation::Remove { path }),
        "replace" => Ok(Operation::Replace {
            path,
            value: value_field(fields)?,
        }),
        "move" => Ok(Operation::Move {
            from: pointer_field(fields, "from")?,
            path,
        }),
        "copy" => Ok(Operation::Copy {
            from: pointer_field(fields, "from")?,
            path,
        }),
        "test" => Ok(Operation::Test {
            path,
            value: value_field(fields)?,
        }),
        other => Err(format!("unsupported operation \"{other}\"")),
    }
}

fn pointer_field(fields: &Map<String, Value>, name: &str) -> Result<Pointer, String> {
    let raw = fields
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("operation has no \"{name}\""))?;
    Pointer::parse(raw)
}

fn value_field(fields: &Map<String, Value>) -> Result<Value, String> {
    fields
        .get("value")
        .cloned()
        .ok_or_else(|| "operation has no \"value\"".to_string())
}

fn apply_operations(doc: &mut Value, operations: &[Operation]) -> Result<(), Failure> {
    for (index, operation) in operations.iter().enumerate() {
        apply_operation(doc, operation).map_err(|reason| Failure {
            operation: Some(index),
            path: Some(operation.path().to_string()),
            reason,
        })?;
    }
    Ok(())
}

fn apply_operation(doc: &mut Value, operation: &Operation) -> Result<(), String> {
    match operation {
        Operation::Add { path, value } => add(doc, path, value.clone()),
        Operation::Remove { path } => remove(doc, path).map(drop),
        Operation::Replace { path, value } => {
            let target = get_mut(doc, &path.tokens)
                .ok_or_else(|| format!("replace target {path} does not exist"))?;
            *target = value.clone();
            Ok(())
        }
        Operation::Move { from, path } => {
            if from == path {
                return Ok(());
            }
            if from.is_prefix_of(path) {
                return Err(format!("cannot move {from} into its own child {path}"));
            }
            let value = remove(doc, from)?;
            add(doc, path, value)
        }
        Operation::Copy { from, path } => {
            let value = get(doc, &from.tokens)
                .cloned()
                .ok_or_else(|| format!("copy source {from} does not exist"))?;
            add(doc, path, value)
        }
        Operation::Test { path, value } => {
            let current =
                get(doc, &path.tokens).ok_or_else(|| format!("test target {path} does not exist"))?;
            if json_equal(current, value) {
                Ok(())
            } else {
                Err(format!("test failed: {path} is {current}, expected {value}"))
            }
        }
    }
}

/// Inserts into objects (overwriting) and arrays (shifting). Never creates
/// intermediate containers.
fn add(doc: &mut Value, path: &Pointer, value: Value) -> Result<(), String> {
    let Some((last, parent_tokens)) = path.tokens.split_last() else {
        *doc = value;
        return Ok(());
    };
    let parent = get_mut(doc, parent_tokens)
        .ok_or_else(|| format!("parent of {path} does not exist"))?;

    match parent {
        Value::Object(fields) => {
            fields.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            if last == "-" {
                items.push(value);
                return Ok(());
            }
            let index = parse_index(last)
                .filter(|&index| index <= items.len())
                .ok_or_else(|| format!("array index {last} out of bounds in {path}"))?;
            items.insert(index, value);
            Ok(())
        }
        _ => Err(format!("parent of {path} is not a container")),
    }
}

fn remove(doc: &mut Value, path: &Pointer) -> Result<Value, String> {
    let Some((last, parent_tokens)) = path.tokens.split_last() else {
        return Err("cannot remove the document root".to_string());
    };
    let parent = get_mut(doc, parent_tokens)
        .ok_or_else(|| format!("remove target {path} does not exist"))?;

    let removed = match parent {
        Value::Object(fields) => fields.shift_remove(last),
        Value::Array(items) => parse_index(last)
            .filter(|&index| index < items.len())
            .map(|index| items.remove(index)),
        _ => None,
    };
    removed.ok_or_else(|| format!("remove target {path} does not exist"))
}

fn get<'a>(doc: &'a Value, tokens: &[String]) -> Option<&'a Value> {
    tokens.iter().try_fold(doc, |node, token| match node {
        Value::Object(fields) => fields.get(token),
        Value::Array(items) => parse_index(token).and_then(|index| items.get(index)),
        _ => None,
    })
}

fn get_mut<'a>(doc: &'a mut Value, tokens: &[String]) -> Option<&'a mut Value> {
    tokens.iter().try_fold(doc, |node, token| match node {
        Value::Object(fields) => fields.get_mut(token),
        Value::Array(items) => parse_index(token).and_then(move |index| items.get_mut(index)),
        _ => None,
    })
}

fn parse_index(token: &str) -> Option<usize> {
    let canonical = token == "0" || (!token.starts_with('0') && !token.is_empty());
    if !canonical || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// Structural equality with numbers compared by value, so `1` equals `1.0`.
fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (x.as_u64(), y.as_u64()) {
                (Some(x), Some(y)) => x == y,
                _ => x.as_f64() == y.as_f64(),
            },
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| json_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(key, x)| y.get(key).is_some_and(|y| json_equal(x, y)))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ops(value: Value) -> Vec<Operation> {
        parse_operations(&value).expect("valid operations")
    }

    #[test]
    fn pointer_unescapes_tokens() {
        let pointer = Pointer::parse("/a~1b/c~0d").expect("valid pointer");
        assert_eq!(pointer.tokens, vec!["a/b", "c~d"]);
        assert_eq!(pointer.to_string(), "/a~1b/c~0d");
        assert!(Pointer::parse("a/b").is_err());
        assert!(Pointer::parse("/a~2").is_err());
    }

    #[test]
    fn add_does_not_create_intermediate_containers() {
        let mut doc = json!({"a": {}});
        let operations = ops(json!([{"op": "add", "path": "/b/c", "value": 1}]));
        let err = apply_operations(&mut doc, &operations).expect_err("missing parent");
        assert_eq!(err.operation, Some(0));
        assert_eq!(err.path.as_deref(), Some("/b/c"));
    }

    #[test]
    fn array_add_inserts_and_appends() {
        let mut doc = json!({"list": [1, 3]});
        apply_operations(
            &mut doc,
            &ops(json!([
                {"op": "add", "path": "/list/1", "value": 2},
                {"op": "add", "path": "/list/-", "value": 4}
            ])),
        )
        .expect("valid adds");
        assert_eq!(doc, json!({"list": [1, 2, 3, 4]}));
    }

    #[test]
    fn remove_keeps_remaining_key_order() {
        let mut doc = json!({"a": 1, "b": 2, "c": 3});
        apply_operations(&mut doc, &ops(json!([{"op": "remove", "path": "/a"}])))
            .expect("existing key");
        let keys: Vec<&str> = doc
            .as_object()
            .expect("object")
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn move_and_copy() {
        let mut doc = json!({"a": {"x": 1}, "b": {}});
        apply_operations(
            &mut doc,
            &ops(json!([
                {"op": "copy", "from": "/a/x", "path": "/b/y"},
                {"op": "move", "from": "/a", "path": "/c"}
            ])),
        )
        .expect("valid move and copy");
        assert_eq!(doc, json!({"b": {"y": 1}, "c": {"x": 1}}));
    }

    #[test]
    fn move_into_own_child_is_rejected() {
        let mut doc = json!({"a": {"b": {}}});
        assert!(
            apply_operations(
                &mut doc,
                &ops(json!([{"op": "move", "from": "/a", "path": "/a/b/c"}]))
            )
            .is_err()
        );
    }

    #[test]
    fn test_compares_numbers_by_value() {
        assert!(json_equal(&json!(1), &json!(1.0)));
        assert!(json_equal(&json!({"a": [1, 2]}), &json!({"a": [1.0, 2]})));
        assert!(!json_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
    }

    #[test]
    fn leading_zero_indexes_are_rejected() {
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("12"), Some(12));
        assert_eq!(parse_index("01"), None);
        assert_eq!(parse_index("-"), None);
        assert_eq!(parse_index(""), None);
    }

    #[test]
    fn unknown_operations_fail_to_parse() {
        let err = parse_operations(&json!([{"op": "merge", "path": "/a"}]))
            .expect_err("merge is not an RFC 6902 operation");
        assert_eq!(err.operation, Some(0));
    }
}
