//! Integration tests for resolving and executing tasks

mod common;

use common::{create_test_config, create_test_config_in_subdir, read, run_task};
use errand::error::{ExecutionError, ResolveError};
use errand::ErrandError;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_args_and_options_reach_commands() {
    let (temp_dir, config_path) = create_test_config(
        r#"
tasks:
  greet:
    args:
      person: {}
    options:
      greeting:
        short: g
        default: Hello
    run: echo "${greeting}, ${person}!" > out
"#,
    );

    let (result, _) = run_task(&config_path, "greet", &["World"], &[], None);
    result.unwrap();
    assert_eq!(read(temp_dir.path(), "out"), "Hello, World!\n");

    let (result, _) = run_task(&config_path, "greet", &["Ann"], &[("greeting", "Hi")], None);
    result.unwrap();
    assert_eq!(read(temp_dir.path(), "out"), "Hi, Ann!\n");
}

#[test]
fn test_global_options_and_conditional_defaults() {
    let (temp_dir, config_path) = create_test_config(
        r#"
options:
  prod:
    type: bool
  target:
    default:
      - when: prod
        value: production
      - development
tasks:
  deploy:
    run: echo ${target} > out
"#,
    );

    let (result, _) = run_task(&config_path, "deploy", &[], &[], None);
    result.unwrap();
    assert_eq!(read(temp_dir.path(), "out"), "development\n");

    let (result, _) = run_task(&config_path, "deploy", &[], &[("prod", "true")], None);
    result.unwrap();
    assert_eq!(read(temp_dir.path(), "out"), "production\n");
}

#[test]
fn test_default_from_command() {
    let (temp_dir, config_path) = create_test_config(
        r#"
tasks:
  stamp:
    options:
      version:
        default:
          command: printf ' 1.2.3 \n'
    run: echo "v${version}" > out
"#,
    );

    let (result, _) = run_task(&config_path, "stamp", &[], &[], None);
    result.unwrap();
    assert_eq!(read(temp_dir.path(), "out"), "v1.2.3\n");
}

#[test]
fn test_option_reads_environment_when_not_passed() {
    std::env::set_var("ERRAND_IT_REGION", "eu-west");
    let (temp_dir, config_path) = create_test_config(
        r#"
tasks:
  show:
    options:
      region:
        environment: ERRAND_IT_REGION
        default: us-east
    run: echo ${region} > out
"#,
    );

    let (result, _) = run_task(&config_path, "show", &[], &[], None);
    result.unwrap();
    assert_eq!(read(temp_dir.path(), "out"), "eu-west\n");

    let (result, _) = run_task(&config_path, "show", &[], &[("region", "ap-south")], None);
    result.unwrap();
    assert_eq!(read(temp_dir.path(), "out"), "ap-south\n");
}

#[test]
fn test_finally_runs_even_on_failure() {
    let (temp_dir, config_path) = create_test_config(
        r#"
tasks:
  fail_with_finally:
    run:
      - echo started >> log
      - exit 3
      - echo unreachable >> log
    finally:
      - echo cleanup >> log
"#,
    );

    let (result, _) = run_task(&config_path, "fail_with_finally", &[], &[], None);
    assert!(matches!(
        result,
        Err(ErrandError::Execution(ExecutionError::CommandFailed(Some(3))))
    ));
    assert_eq!(read(temp_dir.path(), "log"), "started\ncleanup\n");
}

#[test]
fn test_subtasks_receive_their_own_values() {
    let (temp_dir, config_path) = create_test_config(
        r#"
tasks:
  write:
    args:
      file: {}
    options:
      text:
        default: default
    run: echo ${text} >> ${file}
  all:
    run:
      - task:
          name: write
          args: a.txt
      - task:
          name: write
          args: [b.txt]
          options: {text: custom}
"#,
    );

    let (result, log) = run_task(&config_path, "all", &[], &[], None);
    result.unwrap();
    assert_eq!(read(temp_dir.path(), "a.txt"), "default\n");
    assert_eq!(read(temp_dir.path(), "b.txt"), "custom\n");
    assert!(log.contains("all > write"));
}

#[test]
fn test_when_conditions() {
    let (temp_dir, config_path) = create_test_config(
        r#"
options:
  verbose:
    type: bool
tasks:
  check:
    run:
      - when:
          exists: present.txt
        command: echo exists >> log
      - when:
          not-exists: present.txt
        command: echo missing >> log
      - when:
          command: "false"
        command: echo never >> log
      - when: verbose
        command: echo verbose >> log
      - when:
          os: [linux, darwin, windows]
        command: echo known-os >> log
"#,
    );
    fs::write(temp_dir.path().join("present.txt"), "").unwrap();

    let (result, log) = run_task(&config_path, "check", &[], &[], None);
    result.unwrap();
    assert_eq!(read(temp_dir.path(), "log"), "exists\nknown-os\n");
    assert!(log.contains("skipping"));
}

#[test]
fn test_set_environment_affects_later_steps() {
    let (temp_dir, config_path) = create_test_config(
        r#"
tasks:
  env:
    run:
      - set-environment:
          ERRAND_IT_STAGE: build
      - echo "$ERRAND_IT_STAGE" >> log
      - set-environment:
          ERRAND_IT_STAGE: null
      - echo "[$ERRAND_IT_STAGE]" >> log
"#,
    );

    let (result, _) = run_task(&config_path, "env", &[], &[], None);
    result.unwrap();
    assert_eq!(read(temp_dir.path(), "log"), "build\n[]\n");
    assert!(std::env::var("ERRAND_IT_STAGE").is_err());
}

#[test]
fn test_command_dir_is_relative_to_working_dir() {
    let (_temp_dir, config_path, sub_dir) = create_test_config_in_subdir(
        r#"
tasks:
  where:
    run:
      command:
        exec: pwd > here
        dir: subdir
"#,
    );

    let (result, _) = run_task(&config_path, "where", &[], &[], None);
    result.unwrap();
    let here = read(&sub_dir, "here");
    assert!(here.trim_end().ends_with("subdir"));
}

#[test]
fn test_custom_interpreter() {
    let (temp_dir, config_path) = create_test_config(
        r#"
interpreter: sh -c
tasks:
  t:
    run: echo "$0" > out
"#,
    );

    let (result, _) = run_task(&config_path, "t", &[], &[], None);
    result.unwrap();
    assert_eq!(read(temp_dir.path(), "out"), "sh\n");
}

#[test]
fn test_included_task_runs() {
    let (temp_dir, config_path) = create_test_config(
        r#"
tasks:
  included:
    include: tasks/included.yml
"#,
    );
    fs::create_dir(temp_dir.path().join("tasks")).unwrap();
    fs::write(
        temp_dir.path().join("tasks/included.yml"),
        "args:\n  word: {}\nrun: echo ${word} > out\n",
    )
    .unwrap();

    let (result, _) = run_task(&config_path, "included", &["from-include"], &[], None);
    result.unwrap();
    assert_eq!(read(temp_dir.path(), "out"), "from-include\n");
}

#[test]
fn test_source_target_cache() {
    let cache_dir = TempDir::new().unwrap();
    let (temp_dir, config_path) = create_test_config(
        r#"
tasks:
  build:
    source: src/*.txt
    target: out.txt
    run: cat src/*.txt > out.txt && echo built >> runs
"#,
    );
    fs::create_dir(temp_dir.path().join("src")).unwrap();
    fs::write(temp_dir.path().join("src/a.txt"), "a").unwrap();

    let cache = Some(cache_dir.path());
    run_task(&config_path, "build", &[], &[], cache).0.unwrap();
    let (result, log) = run_task(&config_path, "build", &[], &[], cache);
    result.unwrap();
    assert_eq!(read(temp_dir.path(), "runs"), "built\n");
    assert!(log.contains("up to date"));

    fs::write(temp_dir.path().join("src/b.txt"), "b").unwrap();
    run_task(&config_path, "build", &[], &[], cache).0.unwrap();
    assert_eq!(read(temp_dir.path(), "runs"), "built\nbuilt\n");
    assert_eq!(read(temp_dir.path(), "out.txt"), "ab");
}

#[test]
fn test_cache_is_ignored_without_a_cache_dir() {
    let (temp_dir, config_path) = create_test_config(
        r#"
tasks:
  build:
    source: in.txt
    target: out.txt
    run: cp in.txt out.txt && echo built >> runs
"#,
    );
    fs::write(temp_dir.path().join("in.txt"), "in").unwrap();

    run_task(&config_path, "build", &[], &[], None).0.unwrap();
    run_task(&config_path, "build", &[], &[], None).0.unwrap();
    assert_eq!(read(temp_dir.path(), "runs"), "built\nbuilt\n");
}

#[test]
fn test_resolution_errors() {
    let (_temp_dir, config_path) = create_test_config(
        r#"
tasks:
  a:
    run:
      task: b
  b:
    run:
      task: a
  pick:
    options:
      color:
        values: [red, green]
    run: echo ${color}
  needs:
    options:
      token:
        required: true
    run: echo ${token}
"#,
    );

    let (result, _) = run_task(&config_path, "a", &[], &[], None);
    assert!(matches!(
        result,
        Err(ErrandError::Resolve(ResolveError::Cycle(path))) if path == "a -> b -> a"
    ));

    let (result, _) = run_task(&config_path, "pick", &[], &[("color", "blue")], None);
    assert!(matches!(result, Err(ErrandError::Resolve(ResolveError::NotAllowed { .. }))));

    let (result, _) = run_task(&config_path, "needs", &[], &[], None);
    assert!(matches!(
        result,
        Err(ErrandError::Resolve(ResolveError::MissingOption(name))) if name == "token"
    ));

    let (result, _) = run_task(&config_path, "pick", &["extra"], &[], None);
    assert!(matches!(result, Err(ErrandError::Resolve(ResolveError::ArgCount { .. }))));

    let (result, _) = run_task(&config_path, "missing", &[], &[], None);
    assert!(matches!(result, Err(ErrandError::Resolve(ResolveError::TaskNotFound(_)))));
}
