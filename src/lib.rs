pub use cv_core as core;
pub use cv_imgproc as imgproc;
pub use cv_rgbd as rgbd;

pub use cv_rgbd::{NormalsConfig, NormalsMethod, RgbdNormals};

/// Size the global Rayon pool shared by every CPU-parallel routine.
///
/// Call it at startup, before the first frame. `num_threads` takes priority
/// over the `RUSTCV_CPU_THREADS` variable. Returns the pool's worker count;
/// repeated calls return the first outcome.
pub fn init_thread_pool(num_threads: Option<usize>) -> cv_core::Result<usize> {
    cv_core::init_global_thread_pool(num_threads)
}
