use std::fmt;
use std::str::FromStr;

/// Registration/activation workflow variants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Workflow {
    /// Stored profile with a random activation key. `default` is accepted as an alias.
    #[default]
    Model,
    /// Signed, timestamped username as the activation key; nothing extra is stored.
    Hmac,
    /// Accounts are active immediately; no activation step.
    Simple,
}

impl Workflow {
    pub const NAMES: [&'static str; 4] = ["model", "default", "hmac", "simple"];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Hmac => "hmac",
            Self::Simple => "simple",
        }
    }

    /// Whether new accounts start inactive and need an emailed activation link.
    #[must_use]
    pub const fn requires_activation(self) -> bool {
        !matches!(self, Self::Simple)
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Workflow {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "model" | "default" => Ok(Self::Model),
            "hmac" => Ok(Self::Hmac),
            "simple" => Ok(Self::Simple),
            other => Err(format!(
                "unknown workflow: {other} (expected one of: {})",
                Self::NAMES.join(", ")
            )),
        }
    }
}
