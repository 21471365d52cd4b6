use std::fmt;

/// Where in the hardware a fault was raised.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultLocation {
    Alloc,
    Divide,
    ThreadFork,
    ThreadKill,
    Math,
    Stack,
    Label,
}

impl FaultLocation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            FaultLocation::Alloc => "alloc",
            FaultLocation::Divide => "divide",
            FaultLocation::ThreadFork => "thread-fork",
            FaultLocation::ThreadKill => "thread-kill",
            FaultLocation::Math => "math",
            FaultLocation::Stack => "stack",
            FaultLocation::Label => "label",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultKind {
    Error,
    Warning,
}

/// Recoverable misbehaviour of an organism, reported and then ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fault {
    pub location: FaultLocation,
    pub kind: FaultKind,
    pub description: String,
}

impl Fault {
    pub fn error(location: FaultLocation, description: impl Into<String>) -> Self {
        Self {
            location,
            kind: FaultKind::Error,
            description: description.into(),
        }
    }

    pub fn warning(location: FaultLocation, description: impl Into<String>) -> Self {
        Self {
            location,
            kind: FaultKind::Warning,
            description: description.into(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            FaultKind::Error => "error",
            FaultKind::Warning => "warning",
        };
        write!(f, "{} {}: {}", self.location.as_str(), kind, self.description)
    }
}
