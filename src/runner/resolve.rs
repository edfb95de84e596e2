//! Binding a task invocation to values
//!
//! Resolving a task binds its positional args, evaluates the global options
//! it needs, evaluates its own args and options, substitutes `${name}` across
//! its steps, and expands every sub-task call into its own bound copy of the
//! callee. The shared templates in the [`Registry`] are never mutated.

use crate::config::parse_config;
use crate::error::{ResolveError, ResolveResult, Result};
use crate::runner::{find_all_options, Context, Interpolate, Registry, SubTask, Task, TaskOption, Vars};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Option values passed by name
pub type Flags = HashMap<String, String>;

/// Resolves tasks of one registry
///
/// Global option values are computed at most once per resolver and shared by
/// every task it expands.
pub struct Resolver<'a> {
    registry: &'a Registry,
    ctx: &'a Context,
    globals: Vec<TaskOption>,
    global_vars: Vars,
    stack: Vec<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a Registry, ctx: &'a Context) -> Self {
        Resolver {
            registry,
            ctx,
            globals: registry.options.clone(),
            global_vars: Vars::new(),
            stack: Vec::new(),
        }
    }

    /// Resolve a top-level invocation
    ///
    /// `flags` may name the task's own options or any global option.
    pub fn resolve(&mut self, task_name: &str, args: &[String], flags: &Flags) -> ResolveResult<Task> {
        let registry = self.registry;
        let template = registry
            .task(task_name)
            .ok_or_else(|| ResolveError::TaskNotFound(task_name.to_string()))?;

        for name in flags.keys() {
            if !template.has_option(name) && registry.option(name).is_none() {
                return Err(ResolveError::UnknownOption {
                    task: task_name.to_string(),
                    option: name.clone(),
                });
            }
        }

        for option in &mut self.globals {
            if let Some(value) = flags.get(option.name()) {
                option.base.passed = value.clone();
            }
        }

        self.stack.push(task_name.to_string());
        let task = self.bind(template.clone(), args, flags);
        self.stack.pop();
        task
    }

    /// Bind one copy of a task to its args and passed options
    fn bind(&mut self, mut task: Task, args: &[String], passed: &Flags) -> ResolveResult<Task> {
        if args.len() != task.args.len() {
            return Err(ResolveError::ArgCount {
                task: task.name.clone(),
                expected: task.args.len(),
                got: args.len(),
            });
        }

        self.evaluate_globals(&task)?;

        let mut vars = self.global_vars.clone();

        for (arg, value) in task.args.iter_mut().zip(args) {
            arg.base.passed = value.clone();
            let value = arg.evaluate()?;
            vars.insert(arg.name().to_string(), value);
        }

        for option in &mut task.options {
            if let Some(value) = passed.get(option.name()) {
                option.base.passed = value.clone();
            }
            option.interpolate(&vars);
            let value = option.evaluate(self.ctx, &vars)?;
            vars.insert(option.name().to_string(), value);
        }

        task.run.interpolate(&vars);
        task.finally.interpolate(&vars);
        task.source.interpolate(&vars);
        task.target.interpolate(&vars);

        for run in task.run.iter_mut().chain(task.finally.iter_mut()) {
            run.tasks = run
                .subtasks
                .iter()
                .map(|call| self.expand(call))
                .collect::<ResolveResult<_>>()?;
        }

        trace!(task = %task.name, vars = vars.len(), "bound");
        task.vars = vars;
        Ok(task)
    }

    /// Evaluate the globals `task` needs, in declaration order
    fn evaluate_globals(&mut self, task: &Task) -> ResolveResult<()> {
        let needed: Vec<String> = find_all_options(task, &self.globals)?
            .into_iter()
            .map(|option| option.name().to_string())
            .collect();

        for option in &mut self.globals {
            if option.is_computed() || !needed.iter().any(|name| name == option.name()) {
                continue;
            }

            option.interpolate(&self.global_vars);
            let value = option.evaluate(self.ctx, &self.global_vars)?;
            debug!(option = %option.name(), %value, "evaluated global option");
            self.global_vars.insert(option.name().to_string(), value);
        }

        Ok(())
    }

    /// Expand one sub-task call into a bound copy of the callee
    fn expand(&mut self, call: &SubTask) -> ResolveResult<Task> {
        if self.stack.iter().any(|name| name == &call.name) {
            let mut chain = self.stack.clone();
            chain.push(call.name.clone());
            return Err(ResolveError::Cycle(chain.join(" -> ")));
        }

        let registry = self.registry;
        let callee = registry
            .task(&call.name)
            .ok_or_else(|| ResolveError::SubTaskNotFound(call.name.clone()))?;

        for name in call.options.keys() {
            if !callee.has_option(name) {
                return Err(ResolveError::UnknownOption {
                    task: call.name.clone(),
                    option: name.clone(),
                });
            }
        }

        let passed: Flags = call
            .options
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        self.stack.push(call.name.clone());
        let task = self.bind(callee.clone(), &call.args, &passed);
        self.stack.pop();
        task
    }
}

/// A parsed registry together with one resolved task
#[derive(Debug, Clone)]
pub struct Resolved {
    pub registry: Registry,
    pub task: Task,
}

/// Parse `config_text` and resolve `task_name` in a default context
pub fn resolve(config_text: &str, task_name: &str, args: &[String], flags: &Flags) -> Result<Resolved> {
    let registry = Registry::from_config(parse_config(config_text, None)?)?;

    let mut ctx = Context::new();
    if let Some(interpreter) = &registry.interpreter {
        ctx = ctx.with_interpreter(interpreter.clone());
    }

    let task = Resolver::new(&registry, &ctx).resolve(task_name, args, flags)?;
    Ok(Resolved { registry, task })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrandError;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn flags(pairs: &[(&str, &str)]) -> Flags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn first_command(task: &Task) -> &str {
        &task.run[0].commands[0].exec
    }

    fn resolve_err(yaml: &str, name: &str, a: &[&str], f: &[(&str, &str)]) -> ResolveError {
        match resolve(yaml, name, &args(a), &flags(f)) {
            Err(ErrandError::Resolve(e)) => e,
            other => panic!("expected resolve error, got {:?}", other.map(|r| r.task.name)),
        }
    }

    #[test]
    fn test_global_default() {
        let yaml = r#"
options:
  foo: {default: bar}
tasks:
  t:
    run: echo ${foo}
"#;
        let resolved = resolve(yaml, "t", &[], &Flags::new()).unwrap();
        assert_eq!(resolved.task.run.len(), 1);
        assert_eq!(first_command(&resolved.task), "echo bar");
    }

    #[test]
    fn test_positional_arg() {
        let yaml = r#"
tasks:
  t:
    args:
      foo: {}
    run: echo ${foo}
"#;
        let resolved = resolve(yaml, "t", &args(&["x"]), &Flags::new()).unwrap();
        assert_eq!(first_command(&resolved.task), "echo x");

        let err = resolve_err(yaml, "t", &[], &[]);
        assert!(matches!(err, ResolveError::ArgCount { expected: 1, got: 0, .. }));
    }

    #[test]
    fn test_flag_overrides_default() {
        let yaml = r#"
options:
  foo: {default: bar}
tasks:
  t:
    options:
      level: {default: low}
    run: echo ${foo} ${level}
"#;
        let resolved = resolve(yaml, "t", &[], &flags(&[("foo", "baz"), ("level", "high")])).unwrap();
        assert_eq!(first_command(&resolved.task), "echo baz high");
    }

    #[test]
    fn test_unknown_flag() {
        let yaml = "tasks:\n  t:\n    run: echo hi\n";
        let err = resolve_err(yaml, "t", &[], &[("nope", "1")]);
        assert!(matches!(err, ResolveError::UnknownOption { option, .. } if option == "nope"));
    }

    #[test]
    fn test_unknown_task() {
        let yaml = "tasks:\n  t:\n    run: echo hi\n";
        assert!(matches!(resolve_err(yaml, "x", &[], &[]), ResolveError::TaskNotFound(_)));
    }

    #[test]
    fn test_global_option_sees_earlier_global() {
        let yaml = r#"
options:
  root: {default: /srv}
  app:
    default: ${root}/app
tasks:
  t:
    run: ls ${app}
"#;
        let resolved = resolve(yaml, "t", &[], &Flags::new()).unwrap();
        assert_eq!(first_command(&resolved.task), "ls /srv/app");
    }

    #[test]
    fn test_option_default_sees_sibling_arg() {
        let yaml = r#"
tasks:
  t:
    args:
      name: {}
    options:
      greeting:
        default: hello ${name}
    run: echo ${greeting}
"#;
        let resolved = resolve(yaml, "t", &args(&["ann"]), &Flags::new()).unwrap();
        assert_eq!(first_command(&resolved.task), "echo hello ann");
    }

    #[test]
    fn test_escaped_reference_stays_literal() {
        let yaml = r#"
options:
  foo: {default: bar}
tasks:
  t:
    run: echo $${foo} ${foo}
"#;
        let resolved = resolve(yaml, "t", &[], &Flags::new()).unwrap();
        assert_eq!(first_command(&resolved.task), "echo ${foo} bar");
    }

    #[test]
    fn test_conditional_default_with_bool_flag() {
        let yaml = r#"
options:
  prod: {type: bool}
  target:
    default:
      - when: prod
        value: production
      - development
tasks:
  t:
    run: deploy ${target}
"#;
        let resolved = resolve(yaml, "t", &[], &Flags::new()).unwrap();
        assert_eq!(first_command(&resolved.task), "deploy development");

        let resolved = resolve(yaml, "t", &[], &flags(&[("prod", "true")])).unwrap();
        assert_eq!(first_command(&resolved.task), "deploy production");
    }

    #[test]
    fn test_invalid_value_is_rejected() {
        let yaml = r#"
tasks:
  t:
    options:
      level:
        values: [low, high]
    run: echo ${level}
"#;
        let err = resolve_err(yaml, "t", &[], &[("level", "medium")]);
        assert!(matches!(err, ResolveError::NotAllowed { .. }));
    }

    #[test]
    fn test_subtask_invocations_do_not_share_bindings() {
        let yaml = r#"
tasks:
  greet:
    args:
      who: {}
    options:
      punct: {default: "."}
    run: echo hi ${who}${punct}
  t:
    run:
      task:
        - {name: greet, args: [a]}
        - {name: greet, args: [b], options: {punct: "!"}}
"#;
        let resolved = resolve(yaml, "t", &[], &Flags::new()).unwrap();
        let expanded = &resolved.task.run[0].tasks;
        assert_eq!(expanded.len(), 2);
        assert_eq!(first_command(&expanded[0]), "echo hi a.");
        assert_eq!(first_command(&expanded[1]), "echo hi b!");

        let template = resolved.registry.task("greet").unwrap();
        assert_eq!(first_command(template), "echo hi ${who}${punct}");
    }

    #[test]
    fn test_subtask_args_see_parent_vars() {
        let yaml = r#"
options:
  env: {default: dev}
tasks:
  deploy:
    args:
      to: {}
    run: echo deploying ${to}
  t:
    run:
      task: {name: deploy, args: ["${env}"]}
"#;
        let resolved = resolve(yaml, "t", &[], &Flags::new()).unwrap();
        assert_eq!(first_command(&resolved.task.run[0].tasks[0]), "echo deploying dev");
    }

    #[test]
    fn test_subtask_errors() {
        let missing = r#"
tasks:
  t:
    run:
      task: nope
"#;
        assert!(matches!(resolve_err(missing, "t", &[], &[]), ResolveError::SubTaskNotFound(_)));

        let bad_option = r#"
tasks:
  child: {run: "true"}
  t:
    run:
      task: {name: child, options: {x: "1"}}
"#;
        assert!(matches!(
            resolve_err(bad_option, "t", &[], &[]),
            ResolveError::UnknownOption { task, .. } if task == "child"
        ));

        let bad_arity = r#"
tasks:
  child:
    args:
      a: {}
    run: "true"
  t:
    run:
      task: child
"#;
        assert!(matches!(resolve_err(bad_arity, "t", &[], &[]), ResolveError::ArgCount { .. }));
    }

    #[test]
    fn test_subtask_cycle_is_detected() {
        let yaml = r#"
tasks:
  a:
    run:
      task: b
  b:
    run:
      task: a
"#;
        match resolve_err(yaml, "a", &[], &[]) {
            ResolveError::Cycle(chain) => assert_eq!(chain, "a -> b -> a"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_finally_is_interpolated_and_expanded() {
        let yaml = r#"
options:
  name: {default: world}
tasks:
  cleanup: {run: "true"}
  t:
    run: "true"
    finally:
      - echo bye ${name}
      - task: cleanup
"#;
        let resolved = resolve(yaml, "t", &[], &Flags::new()).unwrap();
        assert_eq!(resolved.task.finally[0].commands[0].exec, "echo bye world");
        assert_eq!(resolved.task.finally[1].tasks[0].name, "cleanup");
    }

    #[test]
    fn test_global_evaluated_once_per_resolution() {
        let yaml = r#"
options:
  stamp:
    default:
      command: echo computed
tasks:
  child:
    run: echo ${stamp}
  t:
    run:
      - echo ${stamp}
      - task: [child, child]
"#;
        let resolved = resolve(yaml, "t", &[], &Flags::new()).unwrap();
        assert_eq!(first_command(&resolved.task), "echo computed");
        for child in &resolved.task.run[1].tasks {
            assert_eq!(first_command(child), "echo computed");
        }
    }

    #[test]
    fn test_private_option_ignores_flag_value() {
        let yaml = r#"
tasks:
  t:
    options:
      secret:
        private: true
        default: internal
    run: echo ${secret}
"#;
        let resolved = resolve(yaml, "t", &[], &flags(&[("secret", "external")])).unwrap();
        assert_eq!(first_command(&resolved.task), "echo internal");
    }

    #[test]
    fn test_required_option_missing() {
        let yaml = r#"
options:
  token: {required: true}
tasks:
  t:
    run: echo ${token}
"#;
        assert!(matches!(resolve_err(yaml, "t", &[], &[]), ResolveError::MissingOption(_)));
    }

    #[test]
    fn test_task_vars_are_recorded() {
        let yaml = r#"
options:
  foo: {default: bar}
tasks:
  t:
    args:
      a: {}
    run: echo ${foo} ${a}
"#;
        let resolved = resolve(yaml, "t", &args(&["x"]), &Flags::new()).unwrap();
        assert_eq!(resolved.task.vars.get("foo").map(String::as_str), Some("bar"));
        assert_eq!(resolved.task.vars.get("a").map(String::as_str), Some("x"));
    }
}
