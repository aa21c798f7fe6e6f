//! Merging per-module source maps into one chunk map.

use oxc_sourcemap::{SourceMap, SourceMapBuilder};

/// Number of lines in `text` once it is written out; an empty string is one line.
pub fn line_count(text: &str) -> u32 {
    text.bytes().filter(|byte| *byte == b'\n').count() as u32 + 1
}

/// Accumulates module maps at the line where each module's contents start.
pub(crate) struct SourceMapMerger {
    builder: SourceMapBuilder,
}

impl SourceMapMerger {
    pub fn new(file: &str) -> Self {
        let mut builder = SourceMapBuilder::default();
        builder.set_file(file);
        Self { builder }
    }

    /// Add one module whose compiled `contents` begin on `line_offset`.
    ///
    /// Tokens of `map` are shifted down by `line_offset` and attributed to
    /// `source_name`, with `sources` embedded as its content. Without a map,
    /// each line of `contents` maps to the same line of the source.
    pub fn add_module(
        &mut self,
        source_name: &str,
        sources: &str,
        map: Option<&SourceMap>,
        contents: &str,
        line_offset: u32,
    ) {
        let source_id = self.builder.add_source_and_content(source_name, sources);

        let Some(map) = map else {
            for line in 0..line_count(contents) {
                self.builder
                    .add_token(line_offset + line, 0, line, 0, Some(source_id), None);
            }
            return;
        };

        for token in map.get_tokens() {
            if token.get_source_id().is_none() {
                continue;
            }
            let name_id = token
                .get_name_id()
                .and_then(|id| map.get_name(id).map(|name| name.to_string()))
                .map(|name| self.builder.add_name(&name));
            self.builder.add_token(
                token.get_dst_line() + line_offset,
                token.get_dst_col(),
                token.get_src_line(),
                token.get_src_col(),
                Some(source_id),
                name_id,
            );
        }
    }

    pub fn finish(self) -> SourceMap {
        self.builder.into_sourcemap()
    }
}
