//! Copy-on-write edit session over a state snapshot
//!
//! Mutators receive a `&mut Draft` that looks like in-place editing. Every
//! write copies only the containers along its path and records the patch
//! that undoes it, so [`Draft::finish`] yields both the new snapshot and its
//! inverse patches.

use crate::{Error, Patch, Path, Result, Value};
use std::sync::Arc;

/// A writable view over a state snapshot
#[derive(Debug)]
pub struct Draft {
    /// The snapshot the session started from
    base: Value,
    /// The snapshot with all writes so far
    current: Value,
    /// Undo patches, in recording order
    inverse: Vec<Patch>,
}

impl Draft {
    /// Begin an edit session against `base`
    pub fn new(base: Value) -> Self {
        Self {
            current: base.clone(),
            base,
            inverse: Vec::new(),
        }
    }

    /// The value as edited so far
    pub fn current(&self) -> &Value {
        &self.current
    }

    /// Read the value at `path`
    pub fn get(&self, path: impl Into<Path>) -> Option<&Value> {
        self.current.get_path(&path.into())
    }

    /// Read an integer, failing if missing or of another type
    pub fn get_int(&self, path: impl Into<Path>) -> Result<i64> {
        let path = path.into();
        let value = self
            .current
            .get_path(&path)
            .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
        value.as_int().ok_or_else(|| Error::TypeError {
            expected: "int".to_string(),
            got: value.type_name().to_string(),
        })
    }

    /// Read a string, failing if missing or of another type
    pub fn get_str(&self, path: impl Into<Path>) -> Result<&str> {
        let path = path.into();
        let value = self
            .current
            .get_path(&path)
            .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
        value.as_str().ok_or_else(|| Error::TypeError {
            expected: "string".to_string(),
            got: value.type_name().to_string(),
        })
    }

    /// Write `value` at `path`, creating the map key if absent.
    ///
    /// On a list, the index may equal the length to append.
    pub fn set(&mut self, path: impl Into<Path>, value: impl Into<Value>) -> Result<()> {
        let path = path.into();
        let value = value.into();
        // Writing back the identical value is not an edit
        if self
            .current
            .get_path(&path)
            .is_some_and(|old| old.same(&value))
        {
            return Ok(());
        }
        let Some(parent_path) = path.parent() else {
            let old = std::mem::replace(&mut self.current, value);
            self.inverse.push(Patch::Replace { path, value: old });
            return Ok(());
        };
        let key = path.last().unwrap_or_default().to_string();
        let parent = self.container_mut(&parent_path)?;

        let undo = match parent {
            Value::Map(map) => match Arc::make_mut(map).insert(key, value) {
                Some(old) => Patch::Replace {
                    path: path.clone(),
                    value: old,
                },
                None => Patch::Remove { path: path.clone() },
            },
            Value::List(list) => {
                let list = Arc::make_mut(list);
                let index = parse_index(&key, &path)?;
                if index < list.len() {
                    let old = std::mem::replace(&mut list[index], value);
                    Patch::Replace {
                        path: path.clone(),
                        value: old,
                    }
                } else if index == list.len() {
                    list.push(value);
                    Patch::Remove { path: path.clone() }
                } else {
                    return Err(Error::PathNotFound(path.to_string()));
                }
            }
            _ => unreachable!("container_mut only returns maps and lists"),
        };
        self.inverse.push(undo);
        Ok(())
    }

    /// Edit the value at `path` in place. A patch is recorded only if the
    /// closure actually changed the value.
    pub fn update<F>(&mut self, path: impl Into<Path>, f: F) -> Result<()>
    where
        F: FnOnce(&mut Value),
    {
        let path = path.into();
        let old = self
            .current
            .get_path(&path)
            .cloned()
            .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
        let target = self
            .current
            .get_path_mut(&path)
            .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
        f(target);
        if !target.same(&old) {
            self.inverse.push(Patch::Replace { path, value: old });
        }
        Ok(())
    }

    /// Remove a map key or list element, returning the removed value
    pub fn remove(&mut self, path: impl Into<Path>) -> Result<Value> {
        let path = path.into();
        let parent_path = path
            .parent()
            .ok_or_else(|| Error::PathNotFound("<root>".to_string()))?;
        let key = path.last().unwrap_or_default().to_string();
        let parent = self.container_mut(&parent_path)?;

        let removed = match parent {
            Value::Map(map) => Arc::make_mut(map)
                .shift_remove(&key)
                .ok_or_else(|| Error::PathNotFound(path.to_string()))?,
            Value::List(list) => {
                let index = parse_index(&key, &path)?;
                if index >= list.len() {
                    return Err(Error::PathNotFound(path.to_string()));
                }
                Arc::make_mut(list).remove(index)
            }
            _ => unreachable!("container_mut only returns maps and lists"),
        };
        self.inverse.push(Patch::Add {
            path,
            value: removed.clone(),
        });
        Ok(removed)
    }

    /// Append to the list at `path`
    pub fn push(&mut self, path: impl Into<Path>, value: impl Into<Value>) -> Result<()> {
        let path = path.into();
        let target = self
            .current
            .get_path_mut(&path)
            .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
        match target {
            Value::List(list) => {
                let list = Arc::make_mut(list);
                list.push(value.into());
                let index = list.len() - 1;
                self.inverse.push(Patch::Remove {
                    path: path.child(index.to_string()),
                });
                Ok(())
            }
            other => Err(Error::TypeError {
                expected: "list".to_string(),
                got: other.type_name().to_string(),
            }),
        }
    }

    /// Number of writes recorded so far
    pub fn patch_count(&self) -> usize {
        self.inverse.len()
    }

    /// Close the session.
    ///
    /// Returns the new snapshot and the patches that restore the base,
    /// ordered for [`apply_patches`](crate::apply_patches). Without any write
    /// the base itself is returned.
    pub fn finish(self) -> (Value, Vec<Patch>) {
        if self.inverse.is_empty() {
            return (self.base, Vec::new());
        }
        let mut inverse = self.inverse;
        inverse.reverse();
        (self.current, inverse)
    }

    fn container_mut(&mut self, path: &Path) -> Result<&mut Value> {
        let target = self
            .current
            .get_path_mut(path)
            .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
        if matches!(target, Value::Map(_) | Value::List(_)) {
            Ok(target)
        } else {
            Err(Error::TypeError {
                expected: "map or list".to_string(),
                got: target.type_name().to_string(),
            })
        }
    }
}

fn parse_index(key: &str, path: &Path) -> Result<usize> {
    key.parse::<usize>()
        .map_err(|_| Error::PathNotFound(path.to_string()))
}
