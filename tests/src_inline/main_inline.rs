use super::*;
use crate::input::fixtures::make_temp_dir;

fn parse(args: &[&str]) -> Cli {
    let mut argv = vec!["lt-plots"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

#[test]
fn test_no_flags_reproduces_default_run() {
    let cli = parse(&[]);
    let config = resolve_config(&cli).unwrap();
    assert_eq!(config, PlotConfig::default());
    assert!(cli.summary.is_none());
}

#[test]
fn test_flags_override_defaults() {
    let cli = parse(&[
        "--root",
        "/tmp/run",
        "--dpi",
        "300",
        "--prune-iterations",
        "20",
        "--arch",
        "fc1,conv2",
        "--dataset",
        "mnist",
        "--dataset",
        "cifar10",
    ]);
    let config = resolve_config(&cli).unwrap();
    assert_eq!(config.root, PathBuf::from("/tmp/run"));
    assert_eq!(config.dpi, 300);
    assert_eq!(config.prune_iterations, 20);
    assert_eq!(config.arch_types, vec!["fc1", "conv2"]);
    assert_eq!(config.datasets, vec!["mnist", "cifar10"]);
}

#[test]
fn test_flags_override_config_file() {
    let dir = make_temp_dir("main_config");
    let path = dir.join("plots.json");
    std::fs::write(&path, r#"{ "dpi": 150, "datasets": ["cifar10"] }"#).unwrap();

    let path_arg = path.to_string_lossy().into_owned();
    let cli = parse(&["--config", &path_arg, "--dpi", "600"]);
    let config = resolve_config(&cli).unwrap();
    assert_eq!(config.dpi, 600);
    assert_eq!(config.datasets, vec!["cifar10"]);
    assert_eq!(config.arch_types, vec!["fc1"]);
}

#[test]
fn test_invalid_values_fail_validation() {
    let cli = parse(&["--dpi", "0"]);
    assert!(matches!(
        resolve_config(&cli),
        Err(ConfigError::Invalid(_))
    ));
    assert!(Cli::try_parse_from(["lt-plots", "--dpi", "high"]).is_err());
}

#[test]
fn test_verbosity_flags() {
    let cli = parse(&["-v"]);
    assert!(cli.verbose);
    let cli = parse(&["--quiet"]);
    assert!(cli.quiet);
}
