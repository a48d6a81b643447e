//! Concurrency tests for the context pool and the batch operator.
//!
//! These run without a GPU: rasterizers are mocks that detect being driven by
//! two callers at once.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use glint_engine::op::{RasterizeOp, RasterizeOpConfig};
use glint_engine::pool::{PooledResource, ResourcePool};
use glint_engine::raster::Rasterizer;
use glint_engine::tensor::Tensor;
use glint_engine::RasterError;

const THREADS: usize = 8;
const CALLS_PER_THREAD: usize = 25;

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Fails the test if two callers are ever inside `render` at the same time.
struct ExclusiveRasterizer {
    busy: AtomicBool,
    overlaps: Arc<AtomicUsize>,
}

impl ExclusiveRasterizer {
    fn enter(&self) {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn leave(&self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

impl PooledResource for ExclusiveRasterizer {}

impl Rasterizer for ExclusiveRasterizer {
    fn width(&self) -> u32 {
        2
    }

    fn height(&self) -> u32 {
        2
    }

    fn set_uniform_matrix(
        &mut self,
        _name: &str,
        _cols: usize,
        _rows: usize,
        _transpose: bool,
        _data: &[f32],
    ) -> Result<(), RasterError> {
        Ok(())
    }

    fn set_shader_storage_buffer(&mut self, _name: &str, data: &[f32]) -> Result<(), RasterError> {
        self.enter();
        thread::sleep(Duration::from_micros(50));
        self.leave();
        if data.is_empty() {
            return Err(RasterError::Binding("empty".into()));
        }
        Ok(())
    }

    fn render(&mut self, _num_points: u32, image: &mut [f32]) -> Result<(), RasterError> {
        self.enter();
        thread::sleep(Duration::from_micros(50));
        image.fill(1.0);
        self.leave();
        Ok(())
    }
}

fn exclusive_op(overlaps: Arc<AtomicUsize>) -> RasterizeOp<ExclusiveRasterizer> {
    let config = RasterizeOpConfig::with_resolution(2, 2).variable("verts", "buffer");
    RasterizeOp::with_factory(&config, move || {
        Ok(ExclusiveRasterizer {
            busy: AtomicBool::new(false),
            overlaps: overlaps.clone(),
        })
    })
    .unwrap()
}

struct Token(usize);

impl PooledResource for Token {}

// ============================================================================
// POOL TESTS
// ============================================================================

#[test]
fn test_pool_never_hands_out_a_resource_twice() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    let pool: ResourcePool<Token, RasterError> =
        ResourcePool::new(move || Ok(Token(counter.fetch_add(1, Ordering::SeqCst))));

    let holders: Vec<AtomicBool> = (0..THREADS).map(|_| AtomicBool::new(false)).collect();
    let double_holds = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..CALLS_PER_THREAD {
                    let token = pool.acquire().unwrap();
                    if holders[token.0].swap(true, Ordering::SeqCst) {
                        double_holds.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::yield_now();
                    holders[token.0].store(false, Ordering::SeqCst);
                }
            });
        }
    });

    assert_eq!(double_holds.load(Ordering::SeqCst), 0);
    let stats = pool.stats();
    assert!(stats.created <= THREADS, "created {}", stats.created);
    assert_eq!(stats.created, created.load(Ordering::SeqCst));
    assert_eq!(stats.idle, stats.created);
}

#[test]
fn test_pool_grows_to_peak_concurrency() {
    let pool: ResourcePool<Token, RasterError> = ResourcePool::new(|| Ok(Token(0)));
    let barrier = Barrier::new(THREADS);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let _token = pool.acquire().unwrap();
                // Everyone holds a resource at once.
                barrier.wait();
            });
        }
    });

    let stats = pool.stats();
    assert_eq!(stats.created, THREADS);
    assert_eq!(stats.idle, THREADS);
}

#[test]
fn test_pool_sequential_use_builds_one_resource() {
    let pool: ResourcePool<Token, RasterError> = ResourcePool::new(|| Ok(Token(0)));
    for _ in 0..10 {
        let _token = pool.acquire().unwrap();
    }
    assert_eq!(pool.stats().created, 1);
}

// ============================================================================
// OPERATOR TESTS
// ============================================================================

#[test]
fn test_concurrent_compute_keeps_rasterizers_exclusive() {
    let overlaps = Arc::new(AtomicUsize::new(0));
    let op = exclusive_op(overlaps.clone());
    let values = vec![Tensor::from_f32(vec![3, 4], vec![0.5; 12]).unwrap()];

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..CALLS_PER_THREAD / 5 {
                    let out = op.compute(3, &values).unwrap();
                    assert_eq!(out.shape().dims(), &[3, 2, 2, 4]);
                    assert!(out.as_f32().unwrap().iter().all(|&v| v == 1.0));
                }
            });
        }
    });

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    let stats = op.pool_stats();
    assert!(stats.created >= 1 && stats.created <= THREADS);
    assert_eq!(stats.idle, stats.created);
}

#[test]
fn test_sequential_compute_reuses_one_rasterizer() {
    let op = exclusive_op(Arc::new(AtomicUsize::new(0)));
    let values = vec![Tensor::from_f32(vec![2, 4], vec![0.5; 8]).unwrap()];
    for _ in 0..5 {
        op.compute(3, &values).unwrap();
    }
    assert_eq!(op.pool_stats().created, 1);
}
