use bundlecrab_core::manifest::{
    is_plain_filename, part_path, ArtifactFile, ModelSpec, ReplacePolicy, SizeClass, SourceAddress,
    AUXILIARY_MIN_BYTES, WEIGHTS_MIN_BYTES,
};
use bundlecrab_core::{ErrorKind, InstallError};

#[test]
fn test_part_names_are_one_based_and_unpadded() {
    assert_eq!(part_path("model.bin", 1), "model.bin.part1");
    assert_eq!(part_path("models/model.bin", 10), "models/model.bin.part10");
}

#[test]
fn test_asset_scheme_is_required() {
    let parsed = SourceAddress::parse_asset("asset://models/model.bin").unwrap();
    assert_eq!(parsed.path, "models/model.bin");
    assert_eq!(parsed.to_string(), "asset://models/model.bin");

    // scheme matching is case-insensitive
    assert!(SourceAddress::parse_asset("ASSET://models/model.bin").is_ok());

    for bad in [
        "https://example.com/model.bin",
        "file:///sdcard/model.bin",
        "models/model.bin",
        "asset://",
        "://models/model.bin",
    ] {
        let err = SourceAddress::parse_asset(bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{} should be rejected", bad);
    }
}

#[test]
fn test_size_class_from_extension() {
    assert_eq!(SizeClass::from_filename("tokenizer.json"), SizeClass::Auxiliary);
    assert_eq!(SizeClass::from_filename("tokenizer.MODEL"), SizeClass::Auxiliary);
    assert_eq!(SizeClass::from_filename("gemma.task"), SizeClass::Weights);
    assert_eq!(SizeClass::from_filename("weights"), SizeClass::Weights);

    let aux = ArtifactFile::new("asset://t.json", "t.json");
    assert_eq!(aux.min_plausible_bytes(), AUXILIARY_MIN_BYTES);
    let forced = aux.with_size_class(SizeClass::Weights);
    assert_eq!(forced.min_plausible_bytes(), WEIGHTS_MIN_BYTES);
    assert_eq!(WEIGHTS_MIN_BYTES, 1_048_576);
}

#[test]
fn test_validate_returns_sources_in_file_order() {
    let spec = ModelSpec::new(
        "gemma",
        vec![
            ArtifactFile::new("asset://models/model.bin", "model.bin"),
            ArtifactFile::new("asset://models/tokenizer.json", "tokenizer.json"),
        ],
    );
    let sources = spec.validate().unwrap();
    let paths: Vec<_> = sources.iter().map(|s| s.path.as_str()).collect();
    assert_eq!(paths, vec!["models/model.bin", "models/tokenizer.json"]);
}

#[test]
fn test_validate_rejects_unsafe_specs() {
    let one = |filename: &str| {
        ModelSpec::new(
            "m",
            vec![ArtifactFile::new("asset://models/x.bin", filename)],
        )
    };

    for filename in ["../escape.bin", "nested/model.bin", "/abs.bin", ""] {
        let err = one(filename).validate().unwrap_err();
        assert!(matches!(err, InstallError::Validation { .. }), "{:?}", filename);
    }

    let empty = ModelSpec::new("m", vec![]);
    assert_eq!(empty.validate().unwrap_err().kind(), ErrorKind::Validation);

    let twice = ModelSpec::new(
        "m",
        vec![
            ArtifactFile::new("asset://a.bin", "model.bin"),
            ArtifactFile::new("asset://b.bin", "model.bin"),
        ],
    );
    assert!(twice.validate().is_err());
}

#[test]
fn test_spec_round_trips_through_toml() {
    let spec = ModelSpec::new(
        "gemma",
        vec![ArtifactFile::new("asset://models/model.bin", "model.bin").with_sha256("ABCDEF")],
    )
    .with_replace(ReplacePolicy::AlwaysReplace);

    let text = toml::to_string(&spec).unwrap();
    assert!(text.contains("replace = \"always-replace\""));
    assert!(text.contains("sha256 = \"abcdef\""));
    assert!(!text.contains("size_class"));

    let back: ModelSpec = toml::from_str(&text).unwrap();
    assert_eq!(back, spec);
}

#[test]
fn test_replace_defaults_to_keep_existing() {
    let json = r#"{"name":"m","files":[{"source":"asset://m.bin","filename":"m.bin"}]}"#;
    let spec: ModelSpec = serde_json::from_str(json).unwrap();
    assert_eq!(spec.replace, ReplacePolicy::KeepExisting);
    assert_eq!(spec.files[0].size_class, None);
}

#[test]
fn test_plain_filenames_stay_in_their_directory() {
    assert!(is_plain_filename("model.bin"));
    assert!(is_plain_filename("tokenizer.json"));
    for name in ["", ".", "..", "../installed.toml", "/tmp/user-data.db", "a/b.bin"] {
        assert!(!is_plain_filename(name), "{:?}", name);
    }
}
