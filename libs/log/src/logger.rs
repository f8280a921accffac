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

//!
use log::Log;
use std::{
    fs::{File, OpenOptions},
    io::Write,
    sync::Mutex,
};

pub use log::Level;

const KMSG_PATH: &str = "/dev/kmsg";

/// Logger instance should implement `ReInit` too.
pub trait ReInit: Log {
    /// Define how logger instance reinitializes.
    fn reinit(&self) {}
}

fn write_msg_common(writer: &mut impl Write, module: &str, msg: String) {
    let time: libc::time_t = unsafe { libc::time(std::ptr::null_mut()) };
    let mut tm: libc::tm = unsafe { std::mem::zeroed() };
    unsafe { libc::localtime_r(&time, &mut tm) };
    let now_str = format!(
        "{:0>4}-{:0>2}-{:0>2} {:0>2}:{:0>2}:{:0>2} ",
        tm.tm_year + 1900, /* tm_year is years since 1900 */
        tm.tm_mon + 1,     /* tm_mon is months since Jan: [0, 11] */
        tm.tm_mday,
        tm.tm_hour,
        tm.tm_min,
        tm.tm_sec
    );

    let line = now_str + module + " " + &msg + "\n";
    if let Err(e) = writer.write_all(line.as_bytes()) {
        eprintln!("Failed to log message: {}", e);
    }
}

/// syslog priority of a log level, as expected by /dev/kmsg
fn kmsg_priority(level: Level) -> u8 {
    match level {
        Level::Error => 3,
        Level::Warn => 4,
        Level::Info => 6,
        Level::Debug | Level::Trace => 7,
    }
}

struct ConsoleLogger;

impl ReInit for ConsoleLogger {}

impl log::Log for ConsoleLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let mut stdout = std::io::stdout();
        let module_path = match record.module_path() {
            None => "unknown",
            Some(v) => v,
        };
        write_msg_common(&mut stdout, module_path, record.args().to_string());
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
    }
}

/// Writes `<prio>name[pid]: msg` records into the kernel ring buffer, the
/// only log sink that exists before any filesystem is writable.
struct KmsgLogger {
    name: String,
    kmsg: Mutex<Option<File>>,
}

impl KmsgLogger {
    fn new(name: &str) -> Result<Self, std::io::Error> {
        let file = Self::open()?;
        Ok(Self {
            name: name.to_string(),
            kmsg: Mutex::new(Some(file)),
        })
    }

    fn open() -> Result<File, std::io::Error> {
        OpenOptions::new().write(true).open(KMSG_PATH)
    }
}

impl ReInit for KmsgLogger {
    fn reinit(&self) {
        let file = match Self::open() {
            Ok(f) => Some(f),
            Err(e) => {
                eprintln!("Failed to reopen {}: {}", KMSG_PATH, e);
                None
            }
        };
        if let Ok(mut kmsg) = self.kmsg.lock() {
            *kmsg = file;
        }
    }
}

impl log::Log for KmsgLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let msg = format!(
            "<{}>{}[{}]: {}\n",
            kmsg_priority(record.level()),
            self.name,
            std::process::id(),
            record.args()
        );

        let mut kmsg = match self.kmsg.lock() {
            Err(_) => return,
            Ok(v) => v,
        };
        if let Some(file) = kmsg.as_mut() {
            /* The kernel rejects records longer than a page, nothing sane to do about it. */
            let _ = file.write_all(msg.as_bytes());
        }
    }

    fn flush(&self) {}
}

/// Collect different kinds of loggers together that implements `ReInit` trait.
///
/// Include: ConsoleLogger, KmsgLogger
struct CombinedLogger {
    loggers: Vec<Box<dyn ReInit>>,
}

impl ReInit for CombinedLogger {
    fn reinit(&self) {
        for logger in self.loggers.iter() {
            logger.as_ref().reinit()
        }
    }
}

impl Log for CombinedLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        for logger in &self.loggers {
            logger.log(record);
        }
    }

    fn flush(&self) {
        for logger in &self.loggers {
            logger.flush();
        }
    }
}

impl CombinedLogger {
    fn new() -> Self {
        Self {
            loggers: Vec::new(),
        }
    }

    fn push(&mut self, logger: Box<dyn ReInit>) {
        self.loggers.push(logger)
    }

    fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}

/// Initialize the global static logger instance.
/// Available log `targets` include `console` and `kmsg`.
///
/// Repeated targets take effect only once.
///
/// # Arguments
///
/// * `name` - The application name that initializes the logger, used as the kmsg identifier.
/// * `level` - Log message level.
/// * `targets` - A set of log targets.
pub fn init_log(name: &str, level: Level, targets: Vec<&str>) {
    log::set_max_level(level.to_level_filter());

    let mut seen: Vec<&str> = Vec::new();
    let mut combined_loggers = CombinedLogger::new();
    for target in targets {
        if seen.contains(&target) {
            continue;
        }
        seen.push(target);

        let logger = match target {
            "console" => Box::new(ConsoleLogger) as Box<dyn ReInit>,
            "kmsg" => match KmsgLogger::new(name) {
                Ok(logger) => Box::new(logger) as Box<dyn ReInit>,
                Err(e) => {
                    eprintln!("{} failed to open {}: {}", name, KMSG_PATH, e);
                    continue;
                }
            },
            _ => {
                eprintln!("{}: log target '{}' is strange, ignoring.", name, target);
                continue;
            }
        };
        combined_loggers.push(logger);
    }

    if combined_loggers.is_empty() {
        eprintln!("{}: no available log targets.", name);
    }

    crate::inner::set_boxed_logger(Box::new(combined_loggers));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_msg_common() {
        let mut buf: Vec<u8> = Vec::new();
        write_msg_common(&mut buf, "svcore::supervisor", "hello".to_string());
        let line = String::from_utf8(buf).unwrap();
        assert!(line.ends_with(" svcore::supervisor hello\n"));
        /* "YYYY-MM-DD HH:MM:SS " prefix */
        assert_eq!(line.as_bytes()[4], b'-');
        assert_eq!(line.as_bytes()[13], b':');
    }

    #[test]
    fn test_kmsg_priority() {
        assert_eq!(kmsg_priority(Level::Error), 3);
        assert_eq!(kmsg_priority(Level::Warn), 4);
        assert_eq!(kmsg_priority(Level::Info), 6);
        assert_eq!(kmsg_priority(Level::Trace), 7);
    }
}
