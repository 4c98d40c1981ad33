use std::fmt::Display;

/// One named, typed argument of a command.
///
/// Purely descriptive: the type is advisory and nothing checks arguments against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    name: String,
    kind: String,
    required: bool,
}

impl ParamSpec {
    /// A parameter the command needs.
    pub fn required(name: &str, kind: &str) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            required: true,
        }
    }

    /// A parameter the command can do without.
    pub fn optional(name: &str, kind: &str) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            required: false,
        }
    }

    /// The parameter's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The advisory type.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Is the parameter required?
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// `<name: type>` if required, `[name: type]` if optional.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl Display for ParamSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.required {
            write!(f, "<{}: {}>", self.name, self.kind)
        } else {
            write!(f, "[{}: {}]", self.name, self.kind)
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn required_uses_angle_brackets() {
        assert_eq!(
            ParamSpec::required("device", "string").render(),
            "<device: string>"
        );
    }

    #[test]
    fn optional_uses_square_brackets() {
        assert_eq!(
            ParamSpec::optional("command", "string").render(),
            "[command: string]"
        );
    }
}
