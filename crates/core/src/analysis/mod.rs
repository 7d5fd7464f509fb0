pub mod bundle;
pub mod dcf;
pub mod sec;
pub mod technical;

pub use bundle::{render_findings, BundleBuilder, BundleOptions};
