use std::fmt;

/// Type of EVM to use.
#[derive(Debug, PartialEq, Clone, Default)]
pub enum VMType {
    /// RUST EVM
    #[default]
    Interpreter,
}

impl fmt::Display for VMType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match *self {
                VMType::Interpreter => "INT",
            }
        )
    }
}

impl VMType {
    /// Return all possible VMs (Interpreter)
    pub fn all() -> Vec<VMType> {
        vec![VMType::Interpreter]
    }
}
