// Copyright 2026 The Cadence Project
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

/// Where the YAML comes from. Injected so tests never touch the
/// filesystem.
pub trait ConfigSource {
    fn load(&self) -> Result<String, std::io::Error>;
}

pub struct FileSource {
    pub path: PathBuf,
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<String, std::io::Error> {
        std::fs::read_to_string(&self.path)
    }
}

pub struct StringSource {
    pub content: String,
}

impl ConfigSource for StringSource {
    fn load(&self) -> Result<String, std::io::Error> {
        Ok(self.content.clone())
    }
}
