//! Recorded edits against a state snapshot
//!
//! A [`Draft`](crate::Draft) records, for every write, the [`Patch`] that
//! undoes it. Applying those inverse patches to the committed value yields a
//! value equal to the one the edit session started from.

use crate::{Error, Path, Result, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A single edit, addressed relative to the value it is applied to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Patch {
    /// Overwrite an existing entry
    Replace {
        /// Location of the entry
        path: Path,
        /// The value to store
        value: Value,
    },
    /// Insert a map key, or insert into a list at the given index
    Add {
        /// Location of the new entry
        path: Path,
        /// The value to store
        value: Value,
    },
    /// Remove a map key or list element
    Remove {
        /// Location of the entry
        path: Path,
    },
}

impl Patch {
    /// The location this patch targets
    pub fn path(&self) -> &Path {
        match self {
            Patch::Replace { path, .. } | Patch::Add { path, .. } | Patch::Remove { path } => path,
        }
    }
}

/// Apply patches in order, returning the edited value.
///
/// The input is not modified; untouched subtrees remain shared with it.
pub fn apply_patches(value: &Value, patches: &[Patch]) -> Result<Value> {
    let mut result = value.clone();
    for patch in patches {
        apply_patch(&mut result, patch)?;
    }
    Ok(result)
}

fn apply_patch(target: &mut Value, patch: &Patch) -> Result<()> {
    let path = patch.path();
    let Some(parent_path) = path.parent() else {
        // Root-level patch: only a wholesale replacement makes sense
        return match patch {
            Patch::Replace { value, .. } | Patch::Add { value, .. } => {
                *target = value.clone();
                Ok(())
            }
            Patch::Remove { .. } => {
                *target = Value::Null;
                Ok(())
            }
        };
    };
    let key = path.last().unwrap_or_default();
    let parent = target
        .get_path_mut(&parent_path)
        .ok_or_else(|| Error::PathNotFound(parent_path.to_string()))?;

    match parent {
        Value::Map(map) => {
            let map = Arc::make_mut(map);
            match patch {
                Patch::Replace { value, .. } | Patch::Add { value, .. } => {
                    map.insert(key.to_string(), value.clone());
                }
                Patch::Remove { .. } => {
                    map.shift_remove(key)
                        .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
                }
            }
            Ok(())
        }
        Value::List(list) => {
            let index = key
                .parse::<usize>()
                .map_err(|_| Error::PathNotFound(path.to_string()))?;
            let list = Arc::make_mut(list);
            match patch {
                Patch::Replace { value, .. } => {
                    let slot = list
                        .get_mut(index)
                        .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
                    *slot = value.clone();
                }
                Patch::Add { value, .. } => {
                    if index > list.len() {
                        return Err(Error::PathNotFound(path.to_string()));
                    }
                    list.insert(index, value.clone());
                }
                Patch::Remove { .. } => {
                    if index >= list.len() {
                        return Err(Error::PathNotFound(path.to_string()));
                    }
                    list.remove(index);
                }
            }
            Ok(())
        }
        other => Err(Error::TypeError {
            expected: "map or list".to_string(),
            got: other.type_name().to_string(),
        }),
    }
}
