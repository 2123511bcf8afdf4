//! Integration tests for YAML parsing

mod common;

use common::{create_test_config, create_test_config_in_subdir, load};
use drover::config::{
    find_config_file_from, parse_config, validate_config, DefaultSource, OptionType,
};
use drover::error::ConfigError;
use std::fs;

#[test]
fn test_parse_complete_config() {
    let yaml = r#"
name: my-app
usage: My test application
env-file:
  - path: local.env
    required: false

options:
  profile:
    usage: Build profile
    default: dev
    environment: APP_PROFILE

tasks:
  clean:
    run: rm -rf dist

  build:
    usage: Build the project
    description: Compiles everything into dist
    args:
      target:
        usage: Build target
        values: [debug, release]
    options:
      jobs:
        type: int
        short: j
        default: 4
      out:
        default:
          - when:
              equal: {left: "${target}", right: release}
            value: dist/release
          - command: echo dist/${target}
    when:
      not-exists: dist/.lock
    pre: clean
    run:
      - cargo build -j ${jobs}
      - do: cp -r target ${out}
        print: copy artifacts
        dir: ${drover.dir}
    post:
      - name: notify
        options: {message: "built ${target}"}

  notify:
    private: true
    options:
      message: {default: done}
    run: echo ${message}
"#;

    let config = parse_config(yaml, None).unwrap();
    validate_config(&config).unwrap();

    assert_eq!(config.name.as_deref(), Some("my-app"));
    assert_eq!(config.env_files().len(), 1);
    assert!(!config.env_files()[0].required);

    let names: Vec<&str> = config.tasks.names().collect();
    assert_eq!(names, vec!["clean", "build", "notify"]);

    let build = config.tasks.get("build").unwrap();
    assert_eq!(build.args.get("target").unwrap().values, vec!["debug", "release"]);
    assert_eq!(build.options.get("jobs").unwrap().option_type, OptionType::Int);
    assert_eq!(build.options.get("jobs").unwrap().short.as_deref(), Some("j"));

    let out = build.options.get("out").unwrap();
    assert_eq!(out.default.0.len(), 2);
    assert_eq!(
        out.default.0[1].source,
        DefaultSource::Command("echo dist/${target}".to_string())
    );

    assert_eq!(build.run.len(), 2);
    assert_eq!(build.run.0[1].print, "copy artifacts");
    assert_eq!(build.pre.0[0].name, "clean");
    assert_eq!(build.post.0[0].options["message"], "built ${target}");

    assert!(config.tasks.get("notify").unwrap().private);
}

#[test]
fn test_option_order_is_preserved() {
    let yaml = r#"
tasks:
  t:
    options:
      zulu: {}
      alpha: {}
      mike: {}
"#;
    let config = parse_config(yaml, None).unwrap();
    let names: Vec<&str> = config.tasks.get("t").unwrap().options.names().collect();
    assert_eq!(names, vec!["zulu", "alpha", "mike"]);
}

#[test]
fn test_duplicate_task_name_is_rejected() {
    let yaml = "tasks:\n  a:\n    run: x\n  a:\n    run: y\n";
    assert!(parse_config(yaml, None).is_err());
}

#[test]
fn test_non_string_key_is_rejected() {
    let yaml = "tasks:\n  t:\n    options:\n      ? [a, b]\n      : {}\n";
    let err = parse_config(yaml, None).unwrap_err();
    assert!(
        err.to_string().contains("is not a valid key name"),
        "{}",
        err
    );
}

#[test]
fn test_unknown_task_field_is_rejected() {
    let yaml = "tasks:\n  t:\n    finally: echo done\n";
    assert!(matches!(
        parse_config(yaml, None),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_empty_task_and_empty_run() {
    let yaml = "tasks:\n  nothing:\n  empty:\n    run: []\n";
    let config = parse_config(yaml, None).unwrap();
    validate_config(&config).unwrap();
    assert!(config.tasks.get("nothing").unwrap().run.is_empty());
    assert!(config.tasks.get("empty").unwrap().run.is_empty());
}

#[test]
fn test_parse_config_file_with_include() {
    let (temp_dir, config_path) =
        create_test_config("tasks:\n  lint:\n    include: lint.yml\n");
    fs::write(temp_dir.path().join("lint.yml"), "usage: Lint\nrun: echo lint\n").unwrap();

    let config = load(&config_path);
    validate_config(&config).unwrap();
    assert_eq!(config.tasks.get("lint").unwrap().usage.as_deref(), Some("Lint"));
}

#[test]
fn test_find_config_from_subdir() {
    let (_temp_dir, config_path, sub_dir) =
        create_test_config_in_subdir("tasks:\n  t:\n    run: echo t\n");
    assert_eq!(find_config_file_from(sub_dir).unwrap(), config_path);
}

#[test]
fn test_validation_errors_name_the_declaration() {
    let cases = [
        (
            "tasks:\n  a:\n    pre: b\n  b:\n    pre: a\n",
            "a -> b -> a",
        ),
        (
            "tasks:\n  t:\n    options:\n      o: {default: \"${o}\"}\n",
            "Option 'o' in task 't' cannot reference itself",
        ),
        (
            "tasks:\n  t:\n    run: echo ${missing}\n",
            "${missing}",
        ),
        (
            "tasks:\n  t:\n    pre: ghost\n",
            "Unknown task 'ghost'",
        ),
    ];

    for (yaml, expected) in cases {
        let config = parse_config(yaml, None).unwrap();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains(expected), "{} should contain {}", err, expected);
    }
}
