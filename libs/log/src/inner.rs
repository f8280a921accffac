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

//! The global logger slot and the logging macros.
use std::{fmt, sync::RwLock};

use crate::logger::ReInit;
use log::Record;

static LOGGER: RwLock<Option<Box<dyn ReInit>>> = RwLock::new(None);

/// Set the global logger, replacing the previous one.
pub fn set_boxed_logger(logger: Box<dyn ReInit>) {
    match LOGGER.write() {
        Ok(mut slot) => *slot = Some(logger),
        Err(poisoned) => *poisoned.into_inner() = Some(logger),
    }
}

/// Reinit the global logger, e.g. after descriptors were closed.
pub(crate) fn reinit() {
    if let Ok(slot) = LOGGER.read() {
        if let Some(logger) = slot.as_ref() {
            logger.reinit();
        }
    }
}

///
#[macro_export]
macro_rules! __log_format_args {
    ($($args:tt)*) => {
        format_args!($($args)*)
    };
}

///
#[macro_export]
macro_rules! __log_module_path {
    () => {
        module_path!()
    };
}

///
#[macro_export]
macro_rules! __log_file {
    () => {
        file!()
    };
}

///
#[macro_export]
macro_rules! __log_line {
    () => {
        line!()
    };
}

///
#[macro_export(local_inner_macros)]
macro_rules! log {
    (target: $target:expr, $lvl:expr, $($arg:tt)+) => ({
        let lvl = $lvl;
        if lvl <= $crate::max_level() {
            $crate::inner::__private_api_log(
                __log_format_args!($($arg)+),
                lvl,
                &($target, __log_module_path!(), __log_file!(), __log_line!()),
            );
        }
    });
    ($lvl:expr, $($arg:tt)+) => (log!(target: __log_module_path!(), $lvl, $($arg)+))
}

///
#[macro_export(local_inner_macros)]
macro_rules! error {
    (target: $target:expr, $($arg:tt)+) => (
        log!(target: $target, $crate::Level::Error, $($arg)+)
    );
    ($($arg:tt)+) => (
        log!($crate::Level::Error, $($arg)+)
    )
}

///
#[macro_export(local_inner_macros)]
macro_rules! warn {
    (target: $target:expr, $($arg:tt)+) => (
        log!(target: $target, $crate::Level::Warn, $($arg)+)
    );
    ($($arg:tt)+) => (
        log!($crate::Level::Warn, $($arg)+)
    )
}

///
#[macro_export(local_inner_macros)]
macro_rules! info {
    (target: $target:expr, $($arg:tt)+) => (
        log!(target: $target, $crate::Level::Info, $($arg)+)
    );
    ($($arg:tt)+) => (
        log!($crate::Level::Info, $($arg)+)
    )
}

///
#[macro_export(local_inner_macros)]
macro_rules! debug {
    (target: $target:expr, $($arg:tt)+) => (
        log!(target: $target, $crate::Level::Debug, $($arg)+)
    );
    ($($arg:tt)+) => (
        log!($crate::Level::Debug, $($arg)+)
    )
}

///
#[macro_export(local_inner_macros)]
macro_rules! trace {
    (target: $target:expr, $($arg:tt)+) => (
        log!(target: $target, $crate::Level::Trace, $($arg)+)
    );
    ($($arg:tt)+) => (
        log!($crate::Level::Trace, $($arg)+)
    )
}

/// flush output stream
#[macro_export(local_inner_macros)]
macro_rules! flush {
    () => {
        $crate::inner::__private_api_flush();
    };
}

/* Private, shouldn't be used out of this crate's macros. */
#[doc(hidden)]
pub fn __private_api_log(
    args: fmt::Arguments,
    level: crate::Level,
    &(target, module_path, file, line): &(&str, &'static str, &'static str, u32),
) {
    let slot = match LOGGER.read() {
        Ok(v) => v,
        Err(_) => return,
    };
    if let Some(logger) = slot.as_ref() {
        logger.log(
            &Record::builder()
                .args(args)
                .level(level)
                .target(target)
                .module_path_static(Some(module_path))
                .file_static(Some(file))
                .line(Some(line))
                .build(),
        );
    }
}

#[doc(hidden)]
pub fn __private_api_flush() {
    if let Ok(slot) = LOGGER.read() {
        if let Some(logger) = slot.as_ref() {
            logger.flush();
        }
    }
}

pub use crate::debug;
pub use crate::error;
pub use crate::info;
pub use crate::trace;
pub use crate::warn;
