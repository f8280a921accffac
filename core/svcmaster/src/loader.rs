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

//! Loads `*.conf` service definitions into the registry.
use std::{
    fs,
    path::{Path, PathBuf},
};
use svcore::{error::*, registry::Registry, service::ServiceKind};

/// One service definition file.
#[derive(Debug, Default, PartialEq)]
pub struct ServiceDef {
    pub name: String,
    pub exec: String,
    pub kind: Option<ServiceKind>,
    pub restart: bool,
    pub args: Vec<String>,
    pub depends: Vec<String>,
    pub socket: Option<String>,
    pub max_restarts: Option<u32>,
}

impl ServiceDef {
    fn parse_config_line(line: &str) -> Option<(String, String)> {
        let mut iter = line.splitn(2, '=');
        let key = iter.next()?.trim();
        let value = iter.next()?.trim();

        Some((key.to_string(), value.to_string()))
    }

    /// Parse the content of a definition file, `origin` only names it in
    /// the log.
    pub fn parse(content: &str, origin: &str) -> Result<Self> {
        let mut def = ServiceDef::default();
        for (no, line) in content.lines().enumerate() {
            let trimmed_line = line.trim();
            if trimmed_line.is_empty() || trimmed_line.starts_with('#') {
                continue;
            }
            match ServiceDef::parse_config_line(trimmed_line) {
                Some((key, value)) => {
                    if value.is_empty() {
                        log::warn!("{}:{}: no value for {}", origin, no + 1, key);
                        continue;
                    }
                    def.parse_value(key.as_str(), value, origin)?;
                }
                None => log::warn!("{}:{}: not a key = value line", origin, no + 1),
            }
        }

        if def.name.is_empty() || def.exec.is_empty() {
            log::error!("{}: name and exec are required", origin);
            return Err(Error::Invalid {
                what: format!("{}: missing name or exec", origin),
            });
        }
        Ok(def)
    }

    fn parse_value(&mut self, key: &str, value: String, origin: &str) -> Result<()> {
        match key {
            "name" => self.name = value,
            "exec" => self.exec = value,
            "type" => self.kind = Some(value.parse::<ServiceKind>()?),
            "restart" => self.restart = value == "yes" || value == "1",
            "args" => self.args.push(value),
            "depends" => self.depends.push(value),
            "socket" => self.socket = Some(value),
            "max_restarts" => match value.parse::<u32>() {
                Ok(v) => self.max_restarts = Some(v),
                Err(e) => {
                    log::warn!("{}: parse max_restarts failed: {}, use default", origin, e);
                }
            },
            _ => log::warn!("{}: unknown key {}, ignoring", origin, key),
        }
        Ok(())
    }

    /// Register the definition and everything it declares. Only a failed
    /// registration is an error, a rejected argument, dependency, socket or
    /// restart budget is logged and the rest still applies.
    pub fn register(&self, registry: &mut Registry) -> Result<()> {
        registry.register(
            &self.name,
            &self.exec,
            self.kind.unwrap_or(ServiceKind::Simple),
            self.restart,
        )?;
        for arg in self.args.iter() {
            if let Err(e) = registry.add_argument(&self.name, arg) {
                log::warn!("{}: argument '{}' rejected: {}", self.name, arg, e);
            }
        }
        for dep in self.depends.iter() {
            if let Err(e) = registry.add_dependency(&self.name, dep) {
                log::warn!("{}: dependency {} rejected: {}", self.name, dep, e);
            }
        }
        if let Some(socket) = &self.socket {
            if let Err(e) = registry.set_socket_path(&self.name, socket) {
                log::warn!("{}: socket {} rejected: {}", self.name, socket, e);
            }
        }
        if let Some(max) = self.max_restarts {
            if let Err(e) = registry.set_max_restarts(&self.name, max) {
                log::warn!("{}: max_restarts {} rejected: {}", self.name, max, e);
            }
        }
        Ok(())
    }
}

/// Register every `*.conf` file of `dir` in file name order. Broken
/// definitions are logged and skipped. Returns the number registered.
pub fn load_dir(registry: &mut Registry, dir: &Path) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("Failed to read service dir {}: {}", dir.display(), e);
            return 0;
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().map_or(false, |e| e == "conf"))
        .collect();
    files.sort();

    let mut loaded = 0;
    for path in files {
        let origin = path.display().to_string();
        let content = match fs::read_to_string(&path) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Failed to read {}: {}", origin, e);
                continue;
            }
        };
        match ServiceDef::parse(&content, &origin).and_then(|def| def.register(registry)) {
            Ok(()) => loaded += 1,
            Err(e) => log::error!("Skipping {}: {}", origin, e),
        }
    }
    log::info!("Loaded {} service definitions from {}.", loaded, dir.display());
    loaded
}
