//! Memory budget for layout analysis.

use sysinfo::System;

use crate::error::{Error, Result};

/// Estimated memory above which a run is logged.
const LARGE_RUN_MB: f64 = 1024.0;
/// Largest layout batch regardless of memory.
const MAX_LAYOUT_BATCH: usize = 10;

/// Source of the currently available system memory.
pub trait MemoryProbe: Send + Sync {
    /// Available memory in MB, or `None` when it cannot be read.
    fn available_mb(&self) -> Option<f64>;
}

/// Reads available memory from the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMemory;

impl MemoryProbe for SystemMemory {
    fn available_mb(&self) -> Option<f64> {
        let mut system = System::new();
        system.refresh_memory();
        let bytes = system.available_memory();
        (bytes > 0).then(|| bytes as f64 / (1024.0 * 1024.0))
    }
}

/// A fixed amount of memory, for tests and constrained hosts.
#[derive(Debug, Clone, Copy)]
pub struct FixedMemory(pub f64);

impl MemoryProbe for FixedMemory {
    fn available_mb(&self) -> Option<f64> {
        Some(self.0)
    }
}

/// Memory needed to render `pages` pages at `dpi` for the layout model.
///
/// Scales with the pixel count, so quadratically with the resolution.
pub fn estimate_memory_mb(pages: usize, dpi: u32, base_mb_per_page: f64) -> f64 {
    let scale = dpi as f64 / 300.0;
    pages as f64 * base_mb_per_page * scale * scale
}

/// Inputs of the batch size decision.
#[derive(Debug, Clone, Copy)]
pub struct MemoryBudget {
    pub dpi: u32,
    pub base_mb_per_page: f64,
    pub safety_ratio: f64,
    pub default_batch: usize,
}

impl MemoryBudget {
    /// Pages per layout-model call that fit the available memory.
    ///
    /// The result lies between 1 and the smallest of twice the default,
    /// ten and the page count. Unknown available memory keeps the default.
    /// When not even one page fits, the layout stage cannot run.
    pub fn batch_size(&self, probe: &dyn MemoryProbe, pages: usize) -> Result<usize> {
        let upper = (self.default_batch * 2).min(MAX_LAYOUT_BATCH).min(pages).max(1);
        let Some(available) = probe.available_mb() else {
            log::debug!("Available memory unknown, using batch size {}", self.default_batch);
            return Ok(self.default_batch.clamp(1, upper));
        };

        let per_page = estimate_memory_mb(1, self.dpi, self.base_mb_per_page);
        let usable = available * self.safety_ratio;
        if per_page > usable {
            return Err(Error::ResourceExhausted {
                required_mb: per_page,
                available_mb: usable,
            });
        }

        let fitting = (usable / per_page).floor() as usize;
        let size = fitting.clamp(1, upper);
        if size != self.default_batch {
            log::info!(
                "Layout batch size {} (default {}, {:.0}MB available, {:.1}MB per page)",
                size,
                self.default_batch,
                available,
                per_page
            );
        }
        let total = estimate_memory_mb(pages, self.dpi, self.base_mb_per_page);
        if total > LARGE_RUN_MB {
            log::info!(
                "Layout analysis of {} pages needs ~{:.0}MB in total at {} DPI",
                pages,
                total,
                self.dpi
            );
        }
        Ok(size)
    }
}
