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
//
#![allow(non_snake_case)]

use crate::registry::DEFAULT_MAX_RESTARTS;
use confique::{Config, FileFormat, Partial};
use std::time::Duration;

pub const SYSTEM_CONFIG: &str = "/etc/svcmaster/system.conf";
const SERVICE_DIR_DEFAULT: &str = "/etc/svcmaster/services";

#[derive(Config, Debug)]
pub struct ManagerConfig {
    #[config(default = "info")]
    pub LogLevel: String,
    #[config(default = "console")]
    pub LogTarget: String,

    #[config(default = "/etc/svcmaster/services")] // SERVICE_DIR_DEFAULT
    pub ServiceDir: String,

    #[config(default = 5)]
    pub DefaultMaxRestarts: u32,
    #[config(default = 3)]
    pub ShutdownGraceSec: u64,
    #[config(default = 1000)]
    pub PollTimeoutMSec: i32,
    #[config(default = 8)]
    pub ListenBacklog: usize,
}

impl ManagerConfig {
    pub fn new(file: Option<&str>) -> ManagerConfig {
        type ConfigPartial = <ManagerConfig as Config>::Partial;
        let mut partial: ConfigPartial = match Partial::from_env() {
            Err(_) => return ManagerConfig::default(),
            Ok(v) => v,
        };
        partial = match confique::File::with_format(file.unwrap_or(SYSTEM_CONFIG), FileFormat::Toml)
            .load()
        {
            Err(_) => return ManagerConfig::default(),
            Ok(v) => partial.with_fallback(v),
        };
        partial = partial.with_fallback(ConfigPartial::default_values());
        match ManagerConfig::from_partial(partial) {
            Ok(v) => v,
            Err(_) => ManagerConfig::default(),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.ShutdownGraceSec)
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            LogLevel: "info".to_string(),
            LogTarget: "console".to_string(),
            ServiceDir: SERVICE_DIR_DEFAULT.to_string(),
            DefaultMaxRestarts: DEFAULT_MAX_RESTARTS,
            ShutdownGraceSec: 3,
            PollTimeoutMSec: 1000,
            ListenBacklog: 8,
        }
    }
}

#[cfg(test)]
mod test {
    use libtests::get_crate_root;
    use std::io::Write;
    use std::path::PathBuf;

    use super::*;
    #[test]
    fn load() {
        let mut file: PathBuf = get_crate_root("core/svcmaster").unwrap();
        file.push("config/system.conf");
        let config = ManagerConfig::new(file.to_str());
        assert_eq!(config.LogLevel, "info");
        assert_eq!(config.ServiceDir, "/etc/svcmaster/services");
        assert_eq!(config.DefaultMaxRestarts, 5);
        assert_eq!(config.shutdown_grace(), Duration::from_secs(3));
    }

    #[test]
    fn load_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "LogLevel = \"debug\"").unwrap();
        writeln!(file, "PollTimeoutMSec = 250").unwrap();
        let config = ManagerConfig::new(file.path().to_str());
        assert_eq!(config.LogLevel, "debug");
        assert_eq!(config.PollTimeoutMSec, 250);
        assert_eq!(config.LogTarget, "console");
        assert_eq!(config.ListenBacklog, 8);
    }

    #[test]
    fn load_fallback() {
        let config = ManagerConfig::new(Some("/nonexistent/svcmaster/system.conf"));
        assert_eq!(config.LogTarget, "console");
        assert_eq!(config.PollTimeoutMSec, 1000);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "DefaultMaxRestarts = \"many\"").unwrap();
        let config = ManagerConfig::new(file.path().to_str());
        assert_eq!(config.DefaultMaxRestarts, 5);
    }
}
