//! Equal-weighted factor combination.

use cadiz_traits::Result;
use ndarray::Array1;

use crate::combiner::{CombineContext, Combiner, equal_weights};

/// Combiner that averages all factors.
///
/// This is the simplest combination strategy: the composite is the
/// arithmetic mean of the exposures, independent of history.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualWeightCombiner;

impl Combiner for EqualWeightCombiner {
    fn weights(&self, ctx: &CombineContext<'_>) -> Result<Array1<f64>> {
        Ok(equal_weights(ctx.n_factors()))
    }

    fn name(&self) -> &str {
        "equal"
    }
}
