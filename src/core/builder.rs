//! # Binding configuration into the task forest.
//!
//! [`build_forest`] walks the `[[task]]` list in order, constructing one
//! [`Task`] per entry and wiring relationships by name:
//!
//! - pre-runs and parents must be defined **before** the task that
//!   references them (top-down config order);
//! - the `ready` monitor becomes the readiness probe, every other
//!   monitor a behavior monitor;
//! - a task referenced as somebody's pre-run runs under its owner and is
//!   excluded from the root set.
//!
//! All resolution failures are fatal: no task is started if any entry is
//! broken.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::{Config, TaskConfig};
use crate::error::BuildError;
use crate::probes::{ImmediateOk, ProbeRef};
use crate::tasks::{BehaviorSpec, StdioTarget, Task, TaskSettings};

/// The bound configuration: prologue probes plus the root tasks.
pub(crate) struct Forest {
    pub prologue: Vec<ProbeRef>,
    pub roots: Vec<Arc<Task>>,
}

pub(crate) fn build_forest(config: &Config) -> Result<Forest, BuildError> {
    let prologue = config
        .prologue
        .iter()
        .map(|spec| spec.build())
        .collect::<Result<Vec<_>, _>>()?;

    let mut by_name: HashMap<String, Arc<Task>> = HashMap::new();
    let mut order: Vec<Arc<Task>> = Vec::new();
    let mut children: HashMap<String, Vec<Arc<Task>>> = HashMap::new();
    let mut prerun_owned: HashSet<String> = HashSet::new();
    let mut parented: HashSet<String> = HashSet::new();

    for entry in &config.task {
        if by_name.contains_key(&entry.name) {
            return Err(BuildError::DuplicateTask(entry.name.clone()));
        }

        let mut preruns = Vec::with_capacity(entry.prerun.len());
        for name in &entry.prerun {
            let prerun = by_name.get(name).ok_or_else(|| BuildError::UnknownPrerun {
                task: entry.name.clone(),
                prerun: name.clone(),
            })?;
            prerun_owned.insert(name.clone());
            preruns.push(Arc::clone(prerun));
        }

        let task = build_task(entry, config, preruns)?;

        if let Some(parent) = entry.parent.as_deref().filter(|p| !p.is_empty()) {
            if !by_name.contains_key(parent) {
                return Err(BuildError::UnknownParent {
                    task: entry.name.clone(),
                    parent: parent.to_string(),
                });
            }
            children
                .entry(parent.to_string())
                .or_default()
                .push(Arc::clone(&task));
            parented.insert(entry.name.clone());
        }

        by_name.insert(entry.name.clone(), Arc::clone(&task));
        order.push(task);
    }

    for (parent, dependents) in children {
        by_name[&parent].set_dependents(dependents);
    }

    let roots = order
        .into_iter()
        .filter(|task| !parented.contains(task.name()) && !prerun_owned.contains(task.name()))
        .collect();

    Ok(Forest { prologue, roots })
}

fn build_task(
    entry: &TaskConfig,
    config: &Config,
    preruns: Vec<Arc<Task>>,
) -> Result<Arc<Task>, BuildError> {
    let mut ready: ProbeRef = Arc::new(ImmediateOk);
    let mut behaviors = Vec::new();
    for monitor in &entry.monitors {
        if monitor.is_ready() {
            ready = monitor.probe.build()?;
        } else {
            behaviors.push(BehaviorSpec {
                probe: monitor.probe.build()?,
                period: monitor.period,
                retries: monitor.retries,
            });
        }
    }

    let restart_delay = entry
        .restart_delay
        .unwrap_or(config.defaults.restart_delay);
    if restart_delay.is_zero() || config.defaults.restart_delay.is_zero() {
        return Err(BuildError::ZeroRestartDelay(entry.name.clone()));
    }

    Ok(Task::new(TaskSettings {
        name: entry.name.clone(),
        path: entry.path.clone(),
        args: entry.args.clone(),
        env: config.env.clone(),
        stdout: StdioTarget::from_config(entry.stdout.as_deref()),
        stderr: StdioTarget::from_config(entry.stderr.as_deref()),
        onetime: entry.onetime,
        max_startup: entry.max_startup,
        max_shutdown: entry.max_shutdown,
        restart_delay,
        default_delay: config.defaults.restart_delay,
        jitter: config.defaults.jitter,
        ready,
        behaviors,
        preruns,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn forest(raw: &str) -> Result<Forest, BuildError> {
        build_forest(&Config::from_toml(raw).unwrap())
    }

    #[test]
    fn roots_exclude_parented_and_prerun_tasks() {
        let out = forest(
            r#"
            [[task]]
            name = "prep"
            path = "/bin/true"
            onetime = true

            [[task]]
            name = "api"
            path = "/usr/local/bin/api"
            prerun = ["prep"]

            [[task]]
            name = "worker"
            path = "/usr/local/bin/worker"
            parent = "api"
        "#,
        )
        .unwrap();

        let names: Vec<_> = out.roots.iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, vec!["api"]);
        assert_eq!(out.roots[0].dependents().len(), 1);
        assert_eq!(out.roots[0].dependents()[0].name(), "worker");
    }

    #[test]
    fn duplicate_names_are_fatal() {
        let out = forest(
            r#"
            [[task]]
            name = "api"
            [[task]]
            name = "api"
        "#,
        );
        assert!(matches!(out, Err(BuildError::DuplicateTask(name)) if name == "api"));
    }

    #[test]
    fn unknown_prerun_is_fatal() {
        let out = forest(
            r#"
            [[task]]
            name = "api"
            prerun = ["nope"]
        "#,
        );
        assert!(matches!(
            out,
            Err(BuildError::UnknownPrerun { task, prerun }) if task == "api" && prerun == "nope"
        ));
    }

    #[test]
    fn prerun_must_be_defined_first() {
        let out = forest(
            r#"
            [[task]]
            name = "api"
            prerun = ["prep"]

            [[task]]
            name = "prep"
            path = "/bin/true"
        "#,
        );
        assert!(matches!(out, Err(BuildError::UnknownPrerun { .. })));
    }

    #[test]
    fn unknown_parent_is_fatal() {
        let out = forest(
            r#"
            [[task]]
            name = "worker"
            parent = "ghost"
        "#,
        );
        assert!(matches!(
            out,
            Err(BuildError::UnknownParent { task, parent }) if task == "worker" && parent == "ghost"
        ));
    }

    #[test]
    fn a_task_cannot_parent_itself() {
        let out = forest(
            r#"
            [[task]]
            name = "ouroboros"
            parent = "ouroboros"
        "#,
        );
        assert!(matches!(out, Err(BuildError::UnknownParent { .. })));
    }

    #[test]
    fn zero_restart_delay_is_fatal() {
        let out = forest(
            r#"
            [[task]]
            name = "api"
            restart_delay = "0s"
        "#,
        );
        assert!(matches!(out, Err(BuildError::ZeroRestartDelay(_))));
    }

    #[test]
    fn prologue_probes_are_built() {
        let out = forest(
            r#"
            [[prologue]]
            type = "portavailable"
            port = 1234

            [[task]]
            name = "api"
        "#,
        )
        .unwrap();
        assert_eq!(out.prologue.len(), 1);
    }
}
