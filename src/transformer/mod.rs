//! Transformer seam for staged source files
//!
//! A [`Transformer`] rewrites one staged file into the destination format.
//! The importer never looks inside the file: each task gets its own
//! transformer, built by a [`TransformerFactory`] and bound to the task's
//! staging directory.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

mod passthrough;

pub use passthrough::{PassthroughTransformer, PassthroughTransformerFactory};

/// Rewrites a staged file into the destination storage format
///
/// # Examples
///
/// ```no_run
/// use somatic_etl::transformer::{PassthroughTransformer, Transformer};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transformer = PassthroughTransformer::new("/staging/brca_uk");
/// let message = transformer
///     .transform(Path::new("/staging/brca_uk/ssm.tsv.gz"))
///     .await?;
/// println!("{}", message);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Transform the staged file
    ///
    /// # Returns
    ///
    /// A human-readable status message that ends up in the run's success list.
    ///
    /// # Errors
    ///
    /// Any error fails the task at the transform stage. Siblings are unaffected.
    async fn transform(&self, staged_file: &Path) -> crate::Result<String>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Builds a [`Transformer`] bound to a study's staging directory
pub trait TransformerFactory: Send + Sync {
    /// Build the transformer for one task
    fn build(&self, staging_path: &Path) -> Arc<dyn Transformer>;
}

/// [`TransformerFactory`] backed by a closure
///
/// # Examples
///
/// ```
/// use somatic_etl::transformer::{
///     FnTransformerFactory, PassthroughTransformer, Transformer, TransformerFactory,
/// };
/// use std::path::Path;
/// use std::sync::Arc;
///
/// let factory = FnTransformerFactory::new(|staging: &Path| {
///     Arc::new(PassthroughTransformer::new(staging)) as Arc<dyn Transformer>
/// });
/// let transformer = factory.build(Path::new("/staging/brca_uk"));
/// assert_eq!(transformer.name(), "passthrough");
/// ```
pub struct FnTransformerFactory<F> {
    build_fn: F,
}

impl<F> FnTransformerFactory<F>
where
    F: Fn(&Path) -> Arc<dyn Transformer> + Send + Sync,
{
    /// Wrap a closure
    pub fn new(build_fn: F) -> Self {
        Self { build_fn }
    }
}

impl<F> TransformerFactory for FnTransformerFactory<F>
where
    F: Fn(&Path) -> Arc<dyn Transformer> + Send + Sync,
{
    fn build(&self, staging_path: &Path) -> Arc<dyn Transformer> {
        (self.build_fn)(staging_path)
    }
}
