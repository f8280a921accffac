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
//! Boot ordering over the dependency graph (Kahn's algorithm).
//!
//! The order only depends on the declared edges, never on whether an
//! attempted start succeeded: a dependency gates when a service is tried,
//! whether it then actually runs is decided by the supervisor.
use crate::registry::Registry;
use std::collections::VecDeque;

/// A service that never became ready to be attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    /// service name
    pub name: String,
    /// dependencies that were never processed
    pub pending: usize,
}

/// The start order computed from the registry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Plan {
    /// registry indices in the order they are attempted
    pub order: Vec<usize>,
    /// services left out because of cycles or unknown dependencies
    pub unresolved: Vec<Unresolved>,
}

/// Outcome of a boot start pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StartReport {
    /// services known to the registry
    pub total: usize,
    /// services that were attempted
    pub processed: usize,
    /// attempts that launched the service or found it already active
    pub started: usize,
    /// services that were never attempted
    pub unresolved: Vec<Unresolved>,
}

impl StartReport {
    /// every service was at least attempted
    pub fn is_complete(&self) -> bool {
        self.processed == self.total
    }
}

/// Compute the start order.
///
/// Every service starts with a pending count equal to its dependency
/// count. Ready services are queued in registration order, each processed
/// service decrements the pending count of every service naming it, and
/// whoever reaches zero is queued behind. A dependency on a name that is
/// not registered is never processed, so its dependent stays unresolved.
pub fn plan(registry: &Registry) -> Plan {
    let mut pending: Vec<usize> = registry.iter().map(|s| s.dependencies().len()).collect();
    let mut queue: VecDeque<usize> = pending
        .iter()
        .enumerate()
        .filter(|(_, p)| **p == 0)
        .map(|(i, _)| i)
        .collect();

    let mut order = Vec::with_capacity(registry.len());
    while let Some(idx) = queue.pop_front() {
        order.push(idx);

        let name = match registry.get(idx) {
            Some(s) => s.name(),
            None => continue,
        };
        for (i, svc) in registry.iter().enumerate() {
            let hits = svc.dependencies().iter().filter(|d| *d == name).count();
            if hits == 0 || pending[i] == 0 {
                continue;
            }
            pending[i] = pending[i].saturating_sub(hits);
            if pending[i] == 0 {
                queue.push_back(i);
            }
        }
    }

    let unresolved = registry
        .iter()
        .enumerate()
        .filter(|(i, _)| pending[*i] > 0)
        .map(|(i, s)| Unresolved {
            name: s.name().to_string(),
            pending: pending[i],
        })
        .collect();

    Plan { order, unresolved }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceKind;

    fn registry(edges: &[(&str, &[&str])]) -> Registry {
        let mut reg = Registry::new();
        for (name, _) in edges {
            reg.register(name, "/bin/true", ServiceKind::Simple, false)
                .unwrap();
        }
        for (name, deps) in edges {
            for dep in deps.iter() {
                reg.add_dependency(name, dep).unwrap();
            }
        }
        reg
    }

    fn names(reg: &Registry, order: &[usize]) -> Vec<String> {
        order
            .iter()
            .map(|i| reg.get(*i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_registration_order_ties() {
        let reg = registry(&[("c", &[]), ("a", &[]), ("b", &[])]);
        let plan = plan(&reg);
        assert_eq!(names(&reg, &plan.order), vec!["c", "a", "b"]);
        assert!(plan.unresolved.is_empty());
    }

    #[test]
    fn test_dependencies_come_first() {
        let reg = registry(&[
            ("web", &["network", "syslog"]),
            ("network", &["syslog"]),
            ("syslog", &[]),
            ("cron", &[]),
        ]);
        let plan = plan(&reg);
        assert_eq!(
            names(&reg, &plan.order),
            vec!["syslog", "cron", "network", "web"]
        );
    }

    #[test]
    fn test_every_edge_respected() {
        let reg = registry(&[
            ("e", &["d", "b"]),
            ("d", &["c"]),
            ("c", &["a"]),
            ("b", &["a"]),
            ("a", &[]),
            ("f", &["e", "a"]),
        ]);
        let plan = plan(&reg);
        assert_eq!(plan.order.len(), reg.len());
        let pos = |n: &str| {
            let idx = reg.index_of(n).unwrap();
            plan.order.iter().position(|i| *i == idx).unwrap()
        };
        for svc in reg.iter() {
            for dep in svc.dependencies() {
                assert!(pos(dep) < pos(svc.name()), "{} before {}", dep, svc.name());
            }
        }
    }

    #[test]
    fn test_two_cycle() {
        let reg = registry(&[("a", &["b"]), ("b", &["a"])]);
        let plan = plan(&reg);
        assert!(plan.order.is_empty());
        assert_eq!(
            plan.unresolved,
            vec![
                Unresolved {
                    name: "a".to_string(),
                    pending: 1
                },
                Unresolved {
                    name: "b".to_string(),
                    pending: 1
                },
            ]
        );
    }

    #[test]
    fn test_cycle_leaves_rest_alone() {
        let reg = registry(&[
            ("base", &[]),
            ("x", &["z", "base"]),
            ("y", &["x"]),
            ("z", &["y"]),
            ("free", &["base"]),
        ]);
        let plan = plan(&reg);
        assert_eq!(names(&reg, &plan.order), vec!["base", "free"]);
        assert_eq!(plan.unresolved.len(), 3);
        assert!(plan.unresolved.iter().all(|u| u.pending > 0));
        /* "base" was processed, only the cycle edge is left on x */
        assert_eq!(plan.unresolved[0].name, "x");
        assert_eq!(plan.unresolved[0].pending, 1);
    }

    #[test]
    fn test_unknown_dependency() {
        let reg = registry(&[("app", &["missing"]), ("other", &[])]);
        let plan = plan(&reg);
        assert_eq!(names(&reg, &plan.order), vec!["other"]);
        assert_eq!(plan.unresolved[0].name, "app");
        assert_eq!(plan.unresolved[0].pending, 1);
    }

    #[test]
    fn test_report_complete() {
        let report = StartReport {
            total: 2,
            processed: 2,
            started: 1,
            unresolved: vec![],
        };
        assert!(report.is_complete());
        assert!(!StartReport {
            total: 2,
            processed: 0,
            ..Default::default()
        }
        .is_complete());
    }
}
