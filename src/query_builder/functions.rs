/// A function wrapped around a rendered field or value expression.
///
/// Rendering rules:
/// - no parameters: `name(expr)`
/// - `CAST`: `CAST(expr AS p0)`
/// - `#>`: `expr #> '{p0,p1,...}'`
/// - otherwise: `name(p0,p1,...)` with every `self` in the parameters replaced by `expr`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFunction {
    name: String,
    parameters: Vec<String>,
}

const SELF_TOKEN: &str = "self";

impl FieldFunction {
    pub fn new(name: impl Into<String>, parameters: Vec<String>) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }

    /// A function applied directly to the expression, e.g. `count(expr)`
    pub fn call(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn cast(target_type: impl Into<String>) -> Self {
        Self::new("CAST", vec![target_type.into()])
    }

    /// JSON path extraction, `expr #> '{a,b}'`
    pub fn json_path<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new("#>", segments.into_iter().map(Into::into).collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, expr: &str) -> String {
        if self.parameters.is_empty() {
            return format!("{}({})", self.name, expr);
        }

        let joined = self.parameters.join(",").replace(SELF_TOKEN, expr);
        match self.name.as_str() {
            "#>" => format!("{expr} #> '{{{joined}}}'"),
            "CAST" => format!("CAST({} AS {})", expr, self.parameters[0]),
            _ => format!("{}({})", self.name, joined),
        }
    }
}

/// Apply a function chain in declaration order
pub(crate) fn apply_all(functions: &[FieldFunction], expr: String) -> String {
    functions.iter().fold(expr, |inner, function| function.apply(&inner))
}
