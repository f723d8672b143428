//! Per-thread renderer context
//!
//! All scratch memory of a single render (edge store, active edges, coverage line,
//! alpha band) lives in a [`RendererContext`]. Each thread keeps one context in a
//! pool, so repeated renders on the same thread do not reallocate.
use crate::{
    arena::BlockCache,
    config::{config, Config},
    coverage::{AlphaBand, CoverageLine},
    edges::EdgeStore,
    sweep::ActiveEdges,
};
use std::cell::RefCell;

thread_local! {
    static POOL: RefCell<Option<Box<RendererContext>>> = const { RefCell::new(None) };
}

/// Rasterization parameters derived from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterParams {
    pub subpixel_lg_x: u32,
    pub subpixel_lg_y: u32,
    pub tile_lg: u32,
}

impl RasterParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            subpixel_lg_x: config.subpixel_lg_x,
            subpixel_lg_y: config.subpixel_lg_y,
            tile_lg: config.tile_lg,
        }
    }

    pub fn positions_x(&self) -> u32 {
        1 << self.subpixel_lg_x
    }

    pub fn positions_y(&self) -> u32 {
        1 << self.subpixel_lg_y
    }

    pub fn tile_size(&self) -> usize {
        1 << self.tile_lg
    }
}

impl Default for RasterParams {
    fn default() -> Self {
        Self::from_config(config())
    }
}

/// Scratch state of a single render
pub struct RendererContext {
    params: RasterParams,
    pub(crate) cache: BlockCache,
    pub(crate) edges: EdgeStore,
    pub(crate) active: ActiveEdges,
    pub(crate) line: CoverageLine,
    pub(crate) band: AlphaBand,
    renders: usize,
}

impl RendererContext {
    pub fn new(params: RasterParams) -> Box<Self> {
        let mut cache = BlockCache::new();
        let edges = EdgeStore::new(&mut cache);
        let active = ActiveEdges::new(&mut cache);
        let line = CoverageLine::new(params.subpixel_lg_x, params.subpixel_lg_y, &mut cache);
        let band = AlphaBand::new(params.tile_lg, &mut cache);
        tracing::debug!("[context] new {:?}", params);
        Box::new(Self {
            params,
            cache,
            edges,
            active,
            line,
            band,
            renders: 0,
        })
    }

    /// Take context of the current thread from the pool, or create a new one
    pub fn acquire() -> Box<Self> {
        Self::acquire_with(RasterParams::default())
    }

    /// Take pooled context if it was created with the same parameters
    pub fn acquire_with(params: RasterParams) -> Box<Self> {
        let pooled = POOL.with(|pool| pool.borrow_mut().take());
        match pooled {
            Some(ctx) if ctx.params == params => ctx,
            _ => Self::new(params),
        }
    }

    /// Reset context and put it back into the pool of the current thread
    pub fn release(mut self: Box<Self>) {
        self.reset();
        // thread local might be already destroyed if called from a destructor on exit
        let _ = POOL.try_with(|pool| {
            pool.borrow_mut().replace(self);
        });
    }

    /// Drop all per-render state and shrink buffers grown by the last render
    pub fn reset(&mut self) {
        self.edges.reset(&mut self.cache);
        self.active.reset(&mut self.cache);
        self.line.reset(&mut self.cache);
        self.band.reset(&mut self.cache);
    }

    pub fn params(&self) -> RasterParams {
        self.params
    }

    /// Number of renders this context was used for
    pub fn renders(&self) -> usize {
        self.renders
    }

    pub(crate) fn start_render(&mut self) {
        self.renders += 1;
    }

    pub fn cache(&self) -> &BlockCache {
        &self.cache
    }
}

impl std::fmt::Debug for RendererContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererContext")
            .field("params", &self.params)
            .field("renders", &self.renders)
            .field("cache", &self.cache)
            .finish()
    }
}
