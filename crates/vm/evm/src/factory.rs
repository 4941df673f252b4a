//! Selects and constructs the VM implementation to run a given call frame.

use std::sync::Arc;

use ethereum_types::U256;
use vm::{ActionParams, Exec, Schedule};

use interpreter::{Interpreter, SharedCache};
use vmtype::VMType;

/// Builds boxed `vm::Exec` instances, picking the cheapest gas-counter
/// representation (`u64` vs `U256`) the call's starting gas fits in.
#[derive(Clone)]
pub struct Factory {
    evm: VMType,
    cache: Arc<SharedCache>,
}

impl Factory {
    /// `cache_size` bounds the number of distinct code hashes whose
    /// `JUMPDEST` analysis is kept around between calls.
    pub fn new(evm: VMType, cache_size: usize) -> Self {
        Factory {
            evm,
            cache: Arc::new(SharedCache::new(cache_size)),
        }
    }

    pub fn create(&self, params: ActionParams, schedule: &Schedule, depth: usize) -> Box<dyn Exec> {
        match self.evm {
            VMType::Interpreter => {
                if Self::can_fit_in_u64(params.gas) {
                    Box::new(Interpreter::<u64>::new(
                        params,
                        self.cache.clone(),
                        schedule,
                        depth,
                    ))
                } else {
                    Box::new(Interpreter::<U256>::new(
                        params,
                        self.cache.clone(),
                        schedule,
                        depth,
                    ))
                }
            }
        }
    }

    fn can_fit_in_u64(gas: U256) -> bool {
        gas <= U256::from(u64::MAX)
    }
}

impl Default for Factory {
    fn default() -> Self {
        Factory::new(VMType::Interpreter, 4096)
    }
}

#[cfg(test)]
mod tests {
    use super::Factory;
    use vm::Schedule;
    use vmtype::VMType;

    #[test]
    fn can_be_created_with_default_settings() {
        let _factory = Factory::default();
    }

    #[test]
    fn picks_interpreter() {
        let factory = Factory::new(VMType::Interpreter, 1);
        let params = ::vm::tests::test_action_params();
        let schedule = Schedule::new_cancun();
        let _exec = factory.create(params, &schedule, 0);
    }
}
