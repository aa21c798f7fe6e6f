//! End-to-end builds over an in-memory project.

mod helpers;

use std::sync::Arc;

use bale_bundler::{
    Bundler, ChunkStrategy, CompileError, Error, PathType, PluginRegistry, ResolveError,
};
use helpers::*;
use tempfile::TempDir;

#[tokio::test]
async fn single_chunk_registers_every_module_and_requires_the_entry() {
    let store = store(&[
        ("src/index.js", "const util = require('./util')\nutil()"),
        ("src/util.js", "module.exports = function() {}"),
    ]);
    let bundler = bundler(config(&["src/index.js"]), &store);

    let output = bundler.build().await.unwrap();

    assert_eq!(output.len(), 1);
    let bundle = output.entry_bundle().unwrap();
    assert_eq!(bundle.output_name, "0.js");
    assert!(bundle.contents.starts_with(";(function() {\n"));
    assert_bundle_contains(bundle, "__bale.registerModule(\"$root/src/index.js\", function(__filename, __dirname, require, module, exports) {\nconst util = require('./util')\nutil()\n});");
    assert_bundle_contains(bundle, "__bale.registerModule(\"$root/src/util.js\"");
    assert_bundle_contains(bundle, "\"$root/src/util.js\":\"$app/src/util.js\"");
    assert_bundle_not_contains(bundle, "__bale.ensure(");
    assert!(
        bundle
            .contents
            .ends_with("__bale.require(\"$root/src/index.js\")\n})();\n"),
        "{}",
        bundle.contents
    );
    assert!(bundle.source_map.is_none());
    assert_eq!(bundle.files.len(), 2);
}

#[tokio::test]
async fn unresolvable_import_fails_the_build() {
    let store = store(&[("index.js", "require('./missing')")]);
    let bundler = bundler(config(&["index.js"]), &store);

    let err = bundler.build().await.unwrap_err();

    match err {
        Error::Compile(CompileError::Resolve(ResolveError::NotFound { request, .. })) => {
            assert_eq!(request, "./missing");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn per_entry_chunks_duplicate_shared_modules_without_commons() {
    let store = store(&[
        ("a.js", "require('./shared')"),
        ("b.js", "require('./shared')"),
        ("shared.js", "module.exports = 1"),
    ]);
    let mut cfg = config(&["a.js", "b.js"]);
    cfg.chunking.strategy = ChunkStrategy::PerEntry;
    let bundler = bundler(cfg, &store);

    let output = bundler.build().await.unwrap();

    assert_eq!(output.len(), 2);
    for bundle in &output.bundles {
        assert_bundle_contains(bundle, "\"$root/shared.js\"");
    }
    assert_bundle_contains(&output.bundles[0], "__bale.require(\"$root/a.js\")");
    assert_bundle_contains(&output.bundles[1], "__bale.require(\"$root/b.js\")");
}

#[tokio::test]
async fn number_paths_are_stable_across_generations() {
    let store = store(&[("a.js", "require('./b')"), ("b.js", "")]);
    let mut cfg = config(&["a.js"]);
    cfg.generator.path_type = PathType::Number;
    let bundler = bundler(cfg, &store);

    let first = bundler.build().await.unwrap();
    let bundle = first.entry_bundle().unwrap();
    assert_bundle_contains(bundle, "__bale.registerModule(\"0\"");
    assert_bundle_contains(bundle, "__bale.registerModule(\"1\"");
    assert_bundle_contains(bundle, "\"0\":\"$app/a.js\"");
    assert_bundle_contains(bundle, "__bale.require(\"0\")");

    let second = bundler.generate().await.unwrap();
    assert_eq!(second[0].contents, bundle.contents);
}

#[tokio::test]
async fn generate_bundle_ignores_the_chunking_strategy() {
    let store = store(&[("a.js", ""), ("b.js", "")]);
    let mut cfg = config(&["a.js", "b.js"]);
    cfg.chunking.strategy = ChunkStrategy::PerEntry;
    let bundler = bundler(cfg, &store);
    bundler.compile().await.unwrap();

    let bundle = bundler.generate_bundle().await.unwrap();

    assert_bundle_contains(&bundle, "__bale.require(\"$root/a.js\")\n__bale.require(\"$root/b.js\")");
    assert!(bundle.source_map.is_none());
}

#[tokio::test]
async fn generate_source_map_forces_maps_on() {
    let store = store(&[("a.js", "let a = 1\nlet b = 2")]);
    let bundler = bundler(config(&["a.js"]), &store);
    bundler.compile().await.unwrap();

    let json = bundler.generate_source_map(false).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["sources"][0], "bale:///$app/a.js");
    assert_eq!(parsed["sourcesContent"][0], "let a = 1\nlet b = 2");

    let comment = bundler.generate_source_map(true).await.unwrap();
    assert!(comment.starts_with("//# sourceMappingURL=data:application/json"));
}

#[tokio::test]
async fn custom_wrapper_is_read_from_the_store() {
    let store = store(&[
        ("index.js", "module.exports = 1"),
        ("runtime/loader.js", "var __bale = window.myLoader"),
    ]);
    let mut cfg = config(&["index.js"]);
    cfg.generator.wrapper = "runtime/loader.js".into();
    let bundler = bundler(cfg, &store);

    let output = bundler.build().await.unwrap();

    assert!(
        output.bundles[0]
            .contents
            .starts_with(";(function() {\nvar __bale = window.myLoader\n__bale.registerModule(")
    );
}

#[tokio::test]
async fn missing_custom_wrapper_is_a_generate_error() {
    let store = store(&[("index.js", "")]);
    let mut cfg = config(&["index.js"]);
    cfg.generator.wrapper = "nope.js".into();
    let bundler = bundler(cfg, &store);

    let err = bundler.build().await.unwrap_err();
    assert!(matches!(err, Error::Generate(ref msg) if msg.contains("nope.js")));
}

#[test]
fn unknown_plugins_are_rejected_at_configuration_time() {
    let mut cfg = config(&["index.js"]);
    cfg.plugins.push("babel".into());

    let err = Bundler::with_store(cfg, &PluginRegistry::default(), Arc::new(store(&[])))
        .unwrap_err();

    assert!(matches!(err, Error::InvalidConfig(ref msg) if msg.contains("babel")));
}

#[test]
fn configuration_without_entries_is_rejected() {
    let err = Bundler::with_store(config(&[]), &PluginRegistry::default(), Arc::new(store(&[])))
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn recompiling_after_an_edit_changes_the_next_build() {
    let store = store(&[("index.js", "module.exports = 'one'")]);
    let bundler = bundler(config(&["index.js"]), &store);
    bundler.build().await.unwrap();

    store.insert("index.js", "module.exports = 'two'");
    bundler.graph().read("/project/index.js").await.unwrap();
    let output = bundler.generate().await.unwrap();

    assert_bundle_contains(&output[0], "module.exports = 'two'");
    assert_bundle_not_contains(&output[0], "'one'");
}

#[tokio::test]
async fn packages_resolved_through_main_load_at_runtime() {
    let dir = TempDir::new().unwrap();
    write_project(
        dir.path(),
        &[
            (
                "index.js",
                "var pad = require('left-pad')\nif (pad('7') !== '007') throw new Error('bad pad')\nconsole.log('ok')",
            ),
            ("node_modules/left-pad/package.json", r#"{"main": "lib/pad"}"#),
            (
                "node_modules/left-pad/lib/pad.js",
                "module.exports = function(s) { return ('000' + s).slice(-3) }",
            ),
        ],
    );
    let bundler = native_bundler(dir.path(), &["index.js"]);

    let output = bundler.build().await.unwrap();

    let bundle = output.entry_bundle().unwrap();
    assert_bundle_contains(
        bundle,
        r#"{"$root/index.js":{"left-pad":"$root/node_modules/left-pad/lib/pad.js"}})"#,
    );

    if !node_available() {
        eprintln!("node not found, skipping runtime check");
        return;
    }
    bundler.write(&output, false).unwrap();
    let run = std::process::Command::new("node")
        .arg(dir.path().join("dist/0.js"))
        .output()
        .unwrap();
    assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));
    assert_eq!(String::from_utf8_lossy(&run.stdout).trim(), "ok");
}
