/// Settings for the [`NodeModel`](super::NodeModel).
///
/// Create new settings using [`NodeModelSettingsBuilder`] or use the default implementation;
#[derive(PartialEq, Debug, Copy, Clone)]
pub struct NodeModelSettings {
    max_iterations: usize,
    tolerance: f64,
    parallel: bool,
    threads: usize,
}

// Default implementation is a convenience that defers to the builder.
impl Default for NodeModelSettings {
    fn default() -> Self {
        NodeModelSettingsBuilder::default().build()
    }
}

impl NodeModelSettings {
    /// Create a new builder for the settings
    pub fn builder() -> NodeModelSettingsBuilder {
        NodeModelSettingsBuilder::default()
    }

    /// Upper bound on the number of iterations of a single node solve.
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Absolute flow tolerance (pcu/h) used when comparing demand against supply.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Solve batches of nodes in parallel.
    pub fn parallel(&self) -> bool {
        self.parallel
    }

    /// Number of threads for parallel batches. Zero uses the global thread pool.
    pub fn threads(&self) -> usize {
        self.threads
    }
}

pub const DEFAULT_MAX_ITERATIONS: usize = 1000;
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// Builder for [`NodeModelSettings`].
///
/// # Examples
///
/// ```
/// use traflow_core::node_model::NodeModelSettingsBuilder;
/// // Settings with parallel enabled and 4 threads.
/// let settings = NodeModelSettingsBuilder::default().parallel().threads(4).build();
///
/// let mut builder = NodeModelSettingsBuilder::default();
///
/// builder = builder.max_iterations(10);
/// let settings = builder.build();
///
/// ```
pub struct NodeModelSettingsBuilder {
    max_iterations: usize,
    tolerance: f64,
    parallel: bool,
    threads: usize,
}

impl Default for NodeModelSettingsBuilder {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            parallel: false,
            threads: 0,
        }
    }
}

impl NodeModelSettingsBuilder {
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Construct a [`NodeModelSettings`] from the builder.
    pub fn build(self) -> NodeModelSettings {
        NodeModelSettings {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance.abs(),
            parallel: self.parallel,
            threads: self.threads,
        }
    }
}
