// Copyright (c) 2022 Huawei Technologies Co.,Ltd. All rights reserved.
//
// sysMaster is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan
// PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//         http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY
// KIND, EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO
// NON-INFRINGEMENT, MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! This crate provides common functions for unit tests
use std::{
    env,
    io::{self, ErrorKind},
    path::PathBuf,
};

/// get the workspace root path, the first ancestor of the current
/// directory that holds the workspace manifest
pub fn get_project_root() -> io::Result<PathBuf> {
    let path = env::current_dir()?;
    let mut current_path = Some(path.as_path());

    while let Some(p) = current_path {
        let manifest = p.join("Cargo.toml");
        if manifest.is_file() {
            let content = std::fs::read_to_string(&manifest)?;
            if content.lines().any(|l| l.trim() == "[workspace]") {
                return Ok(p.into());
            }
        }

        current_path = p.parent();
    }

    Err(io::Error::new(ErrorKind::NotFound, "NotFound"))
}

/// get the root path of a workspace member, e.g. "core/svcmaster"
pub fn get_crate_root(member: &str) -> io::Result<PathBuf> {
    let root = get_project_root()?.join(member);
    if !root.join("Cargo.toml").is_file() {
        return Err(io::Error::new(ErrorKind::NotFound, "NotFound"));
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use crate::{get_crate_root, get_project_root};

    #[test]
    fn test_get_project_root() {
        let mut file_path = get_project_root().unwrap();
        file_path.push("Cargo.toml");

        assert!(file_path.is_file());
    }

    #[test]
    fn test_get_crate_root() {
        let file_path = get_crate_root("libs/libtests").unwrap();
        assert!(file_path.join("src/lib.rs").is_file());
        assert!(get_crate_root("libs/missing").is_err());
    }
}
