//! Generator output layout and source-map line accounting.

mod helpers;

use std::sync::Arc;

use async_trait::async_trait;
use bale_bundler::{
    BaleConfig, Bundler, Chunk, ChunkBuilder, DefaultGenerator, Error, GenerateContext,
    Generator, GeneratorConfig, ImportRequest, PluginRegistry, PublicPaths, SourceFile,
    SourceMapPath, TransformOutput, TransformResult, Transformer, line_count,
};
use helpers::*;
use oxc_sourcemap::SourceMapBuilder;

fn with_maps(entries: &[&str]) -> BaleConfig {
    let mut cfg = config(entries);
    cfg.generator.source_map = true;
    cfg
}

#[tokio::test]
async fn second_module_maps_right_after_the_first_block() {
    let a_contents = "var b = require('./b')\n\nb.run()\n";
    let store = store(&[("a.js", a_contents), ("b.js", "exports.run = function() {}\n// end")]);
    let bundler = bundler(with_maps(&["a.js"]), &store);

    let output = bundler.build().await.unwrap();
    let bundle = &output.bundles[0];
    let map = bundle.source_map.as_ref().unwrap();

    let a_block = line_of(&bundle.contents, "registerModule(\"$root/a.js\"");
    let b_block = line_of(&bundle.contents, "registerModule(\"$root/b.js\"");

    // a's contents start below its registerModule line
    let a_lines = mapped_lines(map, "bale:///$app/a.js");
    assert_eq!(a_lines.first(), Some(&(a_block + 1)));

    // the block is header + contents + footer
    assert_eq!(b_block, a_block + line_count(a_contents) + 2);

    let b_lines = mapped_lines(map, "bale:///$app/b.js");
    assert_eq!(b_lines, vec![b_block + 1, b_block + 2]);
    assert_eq!(
        bundle.contents.lines().nth(b_lines[0] as usize),
        Some("exports.run = function() {}")
    );
}

#[tokio::test]
async fn prologue_length_seeds_the_offset() {
    let store = store(&[
        ("index.js", "module.exports = 1"),
        ("runtime.js", "// line one\n// line two\n// line three"),
    ]);
    let mut cfg = with_maps(&["index.js"]);
    cfg.generator.wrapper = "runtime.js".into();
    let bundler = bundler(cfg, &store);

    let output = bundler.build().await.unwrap();
    let map = output.bundles[0].source_map.as_ref().unwrap();

    // ";(function() {" + 3 wrapper lines + registerModule line
    assert_eq!(mapped_lines(map, "bale:///$app/index.js"), vec![5]);
}

/// Prefixes every file with a banner line and emits a map that accounts for it.
struct Banner;

#[async_trait]
impl Transformer for Banner {
    fn name(&self) -> &str {
        "banner"
    }

    async fn transform(&self, file: SourceFile<'_>) -> TransformResult {
        let mut builder = SourceMapBuilder::default();
        let source = builder.add_source_and_content(&file.path.to_string_lossy(), file.contents);
        for line in 0..line_count(file.contents) {
            builder.add_token(line + 1, 0, line, 0, Some(source), None);
        }
        Ok(Some(TransformOutput {
            contents: format!("'use strict'\n{}", file.contents),
            source_map: Some(builder.into_sourcemap().to_json_string()),
            imports: Vec::new(),
        }))
    }
}

#[tokio::test]
async fn transformer_maps_are_shifted_into_bundle_coordinates() {
    let mut registry = PluginRegistry::default();
    registry.register_transformer("banner", |_| Arc::new(Banner));
    let store = store(&[("a.js", "one\ntwo")]);
    let mut cfg = with_maps(&["a.js"]);
    cfg.plugins = vec!["banner".into()];
    let bundler = Bundler::with_store(cfg, &registry, Arc::new(store.clone())).unwrap();

    let output = bundler.build().await.unwrap();
    let bundle = &output.bundles[0];
    let map = bundle.source_map.as_ref().unwrap();

    let block = line_of(&bundle.contents, "registerModule(\"$root/a.js\"");
    assert_eq!(line_of(&bundle.contents, "'use strict'"), block + 1);
    assert_eq!(mapped_lines(map, "bale:///$app/a.js"), vec![block + 2, block + 3]);
    let sources: Vec<u32> = map.get_tokens().map(|t| t.get_src_line()).collect();
    assert_eq!(sources, vec![0, 1]);
}

#[tokio::test]
async fn inline_maps_are_appended_and_still_returned() {
    let store = store(&[("a.js", "1")]);
    let mut cfg = with_maps(&["a.js"]);
    cfg.generator.source_map_path = SourceMapPath::Inline;
    let bundler = bundler(cfg, &store);

    let output = bundler.build().await.unwrap();
    let bundle = &output.bundles[0];

    let last = bundle.contents.lines().last().unwrap();
    assert!(last.starts_with("//# sourceMappingURL=data:application/json"));
    assert!(bundle.contents.contains("})();\n\n//# sourceMappingURL="));
    assert!(bundle.source_map.is_some());
}

#[tokio::test]
async fn unresolved_entry_aborts_generation() {
    let store = store(&[]);
    let bundler = bundler(config(&["a.js"]), &store);
    let builder = ChunkBuilder::new();
    let chunk = builder.chunk(vec![ImportRequest::new("./a")], []);
    let gen_config = GeneratorConfig::default();
    let public_paths = PublicPaths::default();
    let context = GenerateContext {
        paths: bundler.graph().paths(),
        store: &store,
        config: &gen_config,
        public_paths: &public_paths,
    };

    let err = DefaultGenerator.generate(&chunk, &context).await.unwrap_err();

    assert!(matches!(err, Error::Consistency { ref request } if request == "./a"));
}

#[tokio::test]
async fn cross_chunk_entries_are_wrapped_in_ensure() {
    let store = store(&[("a.js", "require('./shared')"), ("shared.js", "")]);
    let bundler = bundler(config(&["a.js"]), &store);
    bundler.compile().await.unwrap();
    let graph = bundler.graph();
    let a = graph.paths().to_id("a.js").unwrap();

    let builder = ChunkBuilder::new();
    let mut chunks: Vec<Chunk> = vec![
        builder.chunk(
            vec![ImportRequest::resolved("$root/a.js", a.clone())],
            [graph.get(&graph.paths().to_id("shared.js").unwrap()).unwrap()],
        ),
        builder.chunk(vec![], [graph.get(&a).unwrap()]),
    ];
    bale_bundler::chunking::compute_mappings(&mut chunks);

    let gen_config = GeneratorConfig::default();
    let public_paths = PublicPaths::default();
    let context = GenerateContext {
        paths: graph.paths(),
        store: &store,
        config: &gen_config,
        public_paths: &public_paths,
    };
    let bundle = DefaultGenerator.generate(&chunks[0], &context).await.unwrap();

    assert_bundle_contains(
        &bundle,
        "__bale.ensure([\"1\"], '$root', function() {\n__bale.require(\"$root/a.js\")\n})\n})();\n",
    );
    assert_eq!(bundle.files, vec![graph.paths().to_id("shared.js").unwrap()]);
}

#[test]
fn generator_config_follows_options() {
    let mut cfg = BaleConfig::default();
    cfg.generator.wrapper = "loader.js".into();
    let gen_config = GeneratorConfig::from(&cfg.generator);
    assert_eq!(
        gen_config.wrapper,
        bale_bundler::Wrapper::Custom("loader.js".into())
    );
    assert_eq!(GeneratorConfig::default().wrapper, bale_bundler::Wrapper::Normal);
}
