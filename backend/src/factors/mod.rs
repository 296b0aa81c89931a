// =============================================================================
// Factor Book — one locked FactorModel per named factor set
// =============================================================================
//
// Readings for a symbol are applied under the set's write guard, which is
// then downgraded so the prediction sees exactly the values just written.
// Guards are never held across an `.await`.
// =============================================================================

pub mod model;
pub mod presets;
pub mod readings;

pub use model::{Factor, FactorModel, FundamentalPrediction};
pub use presets::FactorSet;

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::error::{EngineError, EngineResult};

pub struct FactorBook {
    currency: RwLock<FactorModel>,
    gold: RwLock<FactorModel>,
    economic: RwLock<FactorModel>,
}

impl FactorBook {
    pub fn new() -> EngineResult<Self> {
        Ok(Self {
            currency: RwLock::new(FactorModel::new(FactorSet::Currency.weights())?),
            gold: RwLock::new(FactorModel::new(FactorSet::Gold.weights())?),
            economic: RwLock::new(FactorModel::new(FactorSet::Economic.weights())?),
        })
    }

    fn get(&self, set: FactorSet) -> &RwLock<FactorModel> {
        match set {
            FactorSet::Currency => &self.currency,
            FactorSet::Gold => &self.gold,
            FactorSet::Economic => &self.economic,
        }
    }

    /// Apply `updates` atomically and predict from the result.
    ///
    /// Every name is checked before anything is written, so an unknown
    /// factor leaves the set untouched.
    pub fn apply_and_predict(
        &self,
        set: FactorSet,
        updates: &[(&str, f64)],
    ) -> EngineResult<FundamentalPrediction> {
        self.apply_then(set, updates, FactorModel::predict_bias)
    }

    /// Like [`apply_and_predict`](Self::apply_and_predict), but predicts the
    /// direction of `base`/`quote` rather than the basket as a whole.
    pub fn apply_and_predict_pair(
        &self,
        set: FactorSet,
        updates: &[(&str, f64)],
        base: &str,
        quote: &str,
    ) -> EngineResult<FundamentalPrediction> {
        self.apply_then(set, updates, |model| model.predict_pair(base, quote))
    }

    fn apply_then(
        &self,
        set: FactorSet,
        updates: &[(&str, f64)],
        predict: impl FnOnce(&FactorModel) -> FundamentalPrediction,
    ) -> EngineResult<FundamentalPrediction> {
        let mut model = self.get(set).write();
        if let Some((name, _)) = updates.iter().find(|(name, _)| !model.contains(name)) {
            return Err(EngineError::UnknownFactor(name.to_string()));
        }
        for (name, value) in updates {
            model.set_factor_value(name, *value)?;
        }
        let model = RwLockWriteGuard::downgrade(model);
        Ok(predict(&*model))
    }

    /// Set a single factor by hand. Returns the updated snapshot.
    pub fn set_value(&self, set: FactorSet, name: &str, value: f64) -> EngineResult<Vec<Factor>> {
        let mut model = self.get(set).write();
        model.set_factor_value(name, value)?;
        Ok(model.snapshot())
    }

    pub fn predict(&self, set: FactorSet) -> FundamentalPrediction {
        self.get(set).read().predict_bias()
    }

    pub fn snapshot(&self, set: FactorSet) -> Vec<Factor> {
        self.get(set).read().snapshot()
    }
}
