//! One conversion run: extracted text → segmented blocks.
//!
//! Document parsing is an external concern behind [`DocumentExtractor`];
//! a failed extraction aborts before any block exists.

use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::segment::{BlockStatus, Segmenter, SegmenterConfig, TextBlock};

/// Turns a document file into plain text.
pub trait DocumentExtractor {
    fn extract(&self, path: &Path) -> anyhow::Result<String>;
}

/// Reads UTF-8 text files as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl DocumentExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> anyhow::Result<String> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        String::from_utf8(bytes).with_context(|| format!("{} is not UTF-8 text", path.display()))
    }
}

/// Block counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub pending: usize,
    pub processing: usize,
    pub success: usize,
    pub error: usize,
}

/// The blocks of one run.
#[derive(Debug, Clone, Default)]
pub struct Session {
    blocks: Vec<TextBlock>,
}

impl Session {
    pub fn from_text(text: &str, config: &SegmenterConfig) -> Self {
        let blocks = Segmenter::new(config).segment(text);
        log::info!("Segmented {} chars into {} block(s)", text.chars().count(), blocks.len());
        Self { blocks }
    }

    /// Extract `path` and segment the result.
    pub fn from_document(
        extractor: &dyn DocumentExtractor,
        path: &Path,
        config: &SegmenterConfig,
    ) -> Result<Self> {
        let text = extractor
            .extract(path)
            .map_err(|e| Error::Extraction(format!("{:#}", e)))?;
        Ok(Self::from_text(&text, config))
    }

    pub fn blocks(&self) -> &[TextBlock] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut [TextBlock] {
        &mut self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Drop every block.
    pub fn reset(&mut self) {
        self.blocks.clear();
    }

    /// Ids of the blocks in `error`, in document order.
    pub fn failed_ids(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .filter(|b| b.status == BlockStatus::Error)
            .map(|b| b.id.as_str())
            .collect()
    }

    pub fn summary(&self) -> StatusSummary {
        let mut summary = StatusSummary::default();
        for block in &self.blocks {
            match block.status {
                BlockStatus::Pending => summary.pending += 1,
                BlockStatus::Processing => summary.processing += 1,
                BlockStatus::Success => summary.success += 1,
                BlockStatus::Error => summary.error += 1,
            }
        }
        summary
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
