pub mod driver;
pub mod fnnls;
pub mod gram;
pub mod pivot;
mod utils;

pub use driver::Algorithm;
pub use driver::NnlsSolver;
pub use driver::NnlsSolverBuilder;
pub use fnnls::fnnls;
pub use gram::GramSolve;
pub use pivot::pivot;
pub use utils::default_tolerance;
pub use utils::FloatOps;
pub use utils::SolverOptions;
