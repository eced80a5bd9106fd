//! Variable naming policies.

use std::collections::BTreeMap;

use symir_ir::VarMode;

use crate::error::RenderError;

/// Whether `name` is a logic variable: a leading capital or underscore, then
/// ASCII letters, digits and underscores.
pub fn is_valid_variable(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() || c == '_' => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

fn mode_name(mode: VarMode) -> &'static str {
    match mode {
        VarMode::Error => "error",
        VarMode::Sanitize => "sanitize",
        VarMode::Prefix => "prefix",
        VarMode::Capitalize => "capitalize",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarNamer {
    mode: VarMode,
    prefix: String,
}

impl VarNamer {
    pub fn new(mode: VarMode, prefix: impl Into<String>) -> Self {
        Self {
            mode,
            prefix: prefix.into(),
        }
    }

    pub fn render(&self, name: &str) -> Result<String, RenderError> {
        let rendered = match self.mode {
            VarMode::Error => name.to_string(),
            VarMode::Sanitize => sanitize(name),
            VarMode::Prefix => format!("{}{name}", self.prefix),
            VarMode::Capitalize => capitalize(name),
        };
        if is_valid_variable(&rendered) {
            Ok(rendered)
        } else {
            Err(RenderError::InvalidVariable {
                name: name.to_string(),
                mode: mode_name(self.mode),
            })
        }
    }

    /// Render every name of one clause. Returns rendered -> source name, and
    /// fails when two distinct source names render to the same variable.
    pub fn render_all<'n>(
        &self,
        names: impl IntoIterator<Item = &'n str>,
    ) -> Result<BTreeMap<String, &'n str>, RenderError> {
        let mut seen: BTreeMap<String, &'n str> = BTreeMap::new();
        for name in names {
            let rendered = self.render(name)?;
            match seen.get(&rendered) {
                Some(first) if *first != name => {
                    return Err(RenderError::VariableCollision {
                        first: first.to_string(),
                        second: name.to_string(),
                        rendered,
                        mode: mode_name(self.mode),
                    });
                }
                Some(_) => {}
                None => {
                    seen.insert(rendered, name);
                }
            }
        }
        Ok(seen)
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    match cleaned.chars().next() {
        None => "V".to_string(),
        Some(c) if c.is_ascii_digit() => format!("V_{cleaned}"),
        Some(_) => capitalize(&cleaned),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_repairs_names() {
        let namer = VarNamer::new(VarMode::Sanitize, "V_");
        assert_eq!(namer.render("x").unwrap(), "X");
        assert_eq!(namer.render("Name").unwrap(), "Name");
        assert_eq!(namer.render("sub_Name").unwrap(), "Sub_Name");
        assert_eq!(namer.render("first name").unwrap(), "First_name");
        assert_eq!(namer.render("2nd").unwrap(), "V_2nd");
        assert_eq!(namer.render("_tmp").unwrap(), "_tmp");
        assert_eq!(namer.render("").unwrap(), "V");
    }

    #[test]
    fn error_mode_rejects_invalid_names() {
        let namer = VarNamer::new(VarMode::Error, "V_");
        assert_eq!(namer.render("Name").unwrap(), "Name");
        assert!(matches!(
            namer.render("x"),
            Err(RenderError::InvalidVariable { mode: "error", .. })
        ));
    }

    #[test]
    fn prefix_and_capitalize() {
        assert_eq!(VarNamer::new(VarMode::Prefix, "VAR_").render("x").unwrap(), "VAR_x");
        assert!(VarNamer::new(VarMode::Prefix, "v").render("x").is_err());
        let cap = VarNamer::new(VarMode::Capitalize, "");
        assert_eq!(cap.render("age").unwrap(), "Age");
        assert!(cap.render("first name").is_err());
    }

    #[test]
    fn distinct_names_may_not_merge() {
        let namer = VarNamer::new(VarMode::Sanitize, "V_");
        match namer.render_all(["x", "Y", "X"]) {
            Err(RenderError::VariableCollision {
                first, second, rendered, ..
            }) => {
                assert_eq!((first.as_str(), second.as_str(), rendered.as_str()), ("x", "X", "X"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(namer.render_all(["first name", "first_name"]).is_err());

        let vars = namer.render_all(["x", "y", "x"]).unwrap();
        assert_eq!(vars.keys().map(String::as_str).collect::<Vec<_>>(), vec!["X", "Y"]);
        assert!(VarNamer::new(VarMode::Prefix, "V_").render_all(["x", "X"]).is_ok());
    }
}
