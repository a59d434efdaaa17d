use super::*;
use crate::input::fixtures::make_temp_dir;

#[test]
fn test_defaults_match_stock_layout() {
    let config = PlotConfig::default();
    assert_eq!(config.dpi, 1200);
    assert_eq!(config.prune_iterations, 15);
    assert_eq!(config.arch_types, vec!["fc1"]);
    assert_eq!(config.datasets, vec!["mnist"]);
    assert!(config.validate().is_ok());

    assert_eq!(
        config.dump_dir("fc1", "mnist"),
        PathBuf::from("./dumps/lt/fc1/mnist")
    );
    assert_eq!(
        config.output_path("fc1", "mnist"),
        PathBuf::from("./plots/lt/combined_plots/combined_fc1_mnist.png")
    );
    assert_eq!(config.pixel_size(), (7680, 5760));
}

#[test]
fn test_pairs_are_architecture_major() {
    let config = PlotConfig {
        arch_types: vec!["fc1".to_string(), "lenet5".to_string()],
        datasets: vec!["mnist".to_string(), "cifar10".to_string()],
        ..PlotConfig::default()
    };
    let pairs: Vec<_> = config.pairs().collect();
    assert_eq!(
        pairs,
        vec![
            ("fc1", "mnist"),
            ("fc1", "cifar10"),
            ("lenet5", "mnist"),
            ("lenet5", "cifar10"),
        ]
    );
    assert_eq!(config.pair_count(), 4);
}

#[test]
fn test_validation_rejects_bad_values() {
    let cases = [
        PlotConfig {
            dpi: 0,
            ..PlotConfig::default()
        },
        PlotConfig {
            prune_iterations: 0,
            ..PlotConfig::default()
        },
        PlotConfig {
            arch_types: Vec::new(),
            ..PlotConfig::default()
        },
        PlotConfig {
            datasets: vec!["../etc".to_string()],
            ..PlotConfig::default()
        },
        PlotConfig {
            datasets: vec!["a/b".to_string()],
            ..PlotConfig::default()
        },
        PlotConfig {
            arch_types: vec![" ".to_string()],
            ..PlotConfig::default()
        },
        PlotConfig {
            figure_size: [0.0, 4.8],
            ..PlotConfig::default()
        },
        PlotConfig {
            figure_size: [f64::NAN, 4.8],
            ..PlotConfig::default()
        },
        PlotConfig {
            dpi: 10_000,
            ..PlotConfig::default()
        },
    ];
    for config in cases {
        assert!(
            matches!(config.validate(), Err(ConfigError::Invalid(_))),
            "accepted {config:?}"
        );
    }
}

#[test]
fn test_json_file_fills_missing_fields_with_defaults() {
    let dir = make_temp_dir("config_json");
    let path = dir.join("plots.json");
    std::fs::write(
        &path,
        r#"{ "dpi": 300, "arch_types": ["fc1", "conv2"], "datasets": ["fashionmnist"] }"#,
    )
    .unwrap();

    let config = PlotConfig::from_json_file(&path).unwrap();
    assert_eq!(config.dpi, 300);
    assert_eq!(config.arch_types, vec!["fc1", "conv2"]);
    assert_eq!(config.datasets, vec!["fashionmnist"]);
    assert_eq!(config.prune_iterations, DEFAULT_PRUNE_ITERATIONS);
    assert_eq!(config.plots_dir, PathBuf::from("plots/lt/combined_plots"));
}

#[test]
fn test_json_errors() {
    let dir = make_temp_dir("config_json_err");
    let path = dir.join("bad.json");
    std::fs::write(&path, r#"{ "dpii": 300 }"#).unwrap();
    assert!(matches!(
        PlotConfig::from_json_file(&path),
        Err(ConfigError::Parse { .. })
    ));

    assert!(matches!(
        PlotConfig::from_json_file(&dir.join("absent.json")),
        Err(ConfigError::Io { .. })
    ));
}
