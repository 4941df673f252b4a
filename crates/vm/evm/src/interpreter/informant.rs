//! Per-instruction execution tracing, compiled out entirely unless the
//! `evm-debug` feature is enabled.

/// Runs `$e` only when built with the `evm-debug` feature.
#[cfg(feature = "evm-debug")]
macro_rules! evm_debug {
    ($e: expr) => {
        $e
    };
}

#[cfg(not(feature = "evm-debug"))]
macro_rules! evm_debug {
    ($e: expr) => {};
}

#[cfg(feature = "evm-debug")]
mod enabled {
    use ethereum_types::U256;
    use evm::CostType;
    use instructions::{Instruction, InstructionInfo};
    use interpreter::stack::Stack;

    /// Call-depth-indented `log::trace!` dump of the interpreter's progress.
    pub struct EvmInformant {
        depth: usize,
    }

    impl EvmInformant {
        pub fn new(depth: usize) -> Self {
            EvmInformant { depth }
        }

        fn indent(&self) -> String {
            "  ".repeat(self.depth)
        }

        pub fn before_instruction<Cost: CostType>(
            &mut self,
            position: usize,
            instruction: Instruction,
            info: &InstructionInfo,
            current_gas: &Cost,
            stack: &dyn Stack<U256>,
        ) {
            trace!(target: "evm", "{}[{:04}] {:<14} gas: {:?} stack: {:?}",
                self.indent(), position, info.name, current_gas, stack.peek_top(stack.size()));
            let _ = instruction;
        }

        pub fn after_instruction(&mut self, instruction: Instruction) {
            trace!(target: "evm", "{}-> {:?}", self.indent(), instruction);
        }

        pub fn done(&mut self) {
            trace!(target: "evm", "{}done", self.indent());
        }
    }
}

#[cfg(not(feature = "evm-debug"))]
mod disabled {
    /// No-op in release builds; instruction tracing costs nothing.
    pub struct EvmInformant;

    impl EvmInformant {
        pub fn new(_depth: usize) -> Self {
            EvmInformant
        }
        pub fn done(&mut self) {}
    }
}

#[cfg(feature = "evm-debug")]
pub use self::enabled::EvmInformant;
#[cfg(not(feature = "evm-debug"))]
pub use self::disabled::EvmInformant;
