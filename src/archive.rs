// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::Error;

/// Access to the named parts of an XPS package.
///
/// Part names are package-absolute and never start with a `/`,
/// e.g. `Documents/1/Pages/1.fpage`.
pub trait Archive {
    /// Reads the whole part.
    fn read(&self, name: &str) -> Result<Vec<u8>, Error>;

    /// Checks that the part exists.
    fn contains(&self, name: &str) -> bool;
}

/// An unpacked package stored in a directory.
#[derive(Clone, Debug)]
pub struct DirArchive {
    root: PathBuf,
}

impl DirArchive {
    /// Creates a new archive rooted at `root`.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        DirArchive { root: root.into() }
    }

    fn part_path(&self, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in name.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }
}

impl Archive for DirArchive {
    fn read(&self, name: &str) -> Result<Vec<u8>, Error> {
        if !self.contains(name) {
            return Err(Error::EntryNotFound(name.to_string()));
        }

        Ok(std::fs::read(self.part_path(name))?)
    }

    fn contains(&self, name: &str) -> bool {
        self.part_path(name).is_file()
    }
}

/// A package held in memory.
///
/// Mostly useful for tests and for packages extracted by the caller.
#[derive(Clone, Default, Debug)]
pub struct MemoryArchive {
    parts: HashMap<String, Vec<u8>>,
}

impl MemoryArchive {
    /// Creates an empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a part.
    pub fn insert<S: Into<Vec<u8>>>(&mut self, name: &str, data: S) {
        self.parts.insert(normalize(name), data.into());
    }

    /// Builder-style [`MemoryArchive::insert`].
    pub fn with<S: Into<Vec<u8>>>(mut self, name: &str, data: S) -> Self {
        self.insert(name, data);
        self
    }
}

impl Archive for MemoryArchive {
    fn read(&self, name: &str) -> Result<Vec<u8>, Error> {
        self.parts
            .get(&normalize(name))
            .cloned()
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))
    }

    fn contains(&self, name: &str) -> bool {
        self.parts.contains_key(&normalize(name))
    }
}

fn normalize(name: &str) -> String {
    name.trim_start_matches('/').to_string()
}

/// Resolves a part reference found inside the part `base`.
///
/// Absolute references (starting with `/`) are relative to the package root,
/// everything else is relative to the directory of `base`.
/// `.` and `..` segments are collapsed. A fragment (`#...`) is dropped.
pub fn resolve_part_name(base: &str, reference: &str) -> String {
    let reference = match reference.find('#') {
        Some(idx) => &reference[..idx],
        None => reference,
    };

    let mut segments: Vec<&str> = Vec::new();
    if !reference.starts_with('/') {
        segments.extend(base.split('/').filter(|s| !s.is_empty()));
        // Drop the file name of the base part.
        segments.pop();
    }

    for segment in reference.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    segments.join("/")
}

/// Returns the file name of a part without any extensions.
///
/// `/Resources/0A1B.odttf` -> `0A1B`.
pub(crate) fn base_name(name: &str) -> &str {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    match file_name.find('.') {
        Some(idx) => &file_name[..idx],
        None => file_name,
    }
}
