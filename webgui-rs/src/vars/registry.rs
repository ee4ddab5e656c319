//! Variable lookup tables

use log::{debug, info, warn};

use super::TypedVariable;

/// Ordered collection of variables: built-ins first, then one application
/// table.
///
/// Lookup is a linear scan by exact alias. Built-ins win over application
/// variables with the same alias.
pub struct VariableRegistry<C> {
    builtin: Vec<TypedVariable<C>>,
    app: Option<Vec<TypedVariable<C>>>,
}

impl<C> VariableRegistry<C> {
    /// Create a registry with the given built-in table
    pub fn new(builtin: Vec<TypedVariable<C>>) -> Self {
        warn_duplicates("built-in", &builtin);
        Self { builtin, app: None }
    }

    /// Create a registry with no built-ins
    pub fn empty() -> Self {
        Self {
            builtin: Vec::new(),
            app: None,
        }
    }

    /// Register the application variable table.
    ///
    /// There is a single application slot: this replaces any previously
    /// registered table rather than adding to it.
    pub fn register_app_variables(&mut self, vars: Vec<TypedVariable<C>>) {
        warn_duplicates("application", &vars);
        for var in &vars {
            if self.builtin.iter().any(|b| b.alias() == var.alias()) {
                warn!("Application variable '{}' is shadowed by a built-in", var.alias());
            }
        }
        if self.app.is_some() {
            debug!("Replacing application variable table");
        }
        info!("Registered {} application variables", vars.len());
        self.app = Some(vars);
    }

    /// Remove the application variable table
    pub fn clear_app_variables(&mut self) {
        self.app = None;
    }

    /// Find a variable by alias
    pub fn find(&self, alias: &str) -> Option<&TypedVariable<C>> {
        self.builtin
            .iter()
            .find(|v| v.alias() == alias)
            .or_else(|| self.app.as_ref()?.iter().find(|v| v.alias() == alias))
    }

    /// All variables in lookup order
    pub fn iter(&self) -> impl Iterator<Item = &TypedVariable<C>> {
        self.builtin.iter().chain(self.app.iter().flatten())
    }

    pub fn len(&self) -> usize {
        self.builtin.len() + self.app.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn warn_duplicates<C>(table: &str, vars: &[TypedVariable<C>]) {
    for (i, var) in vars.iter().enumerate() {
        if vars[..i].iter().any(|v| v.alias() == var.alias()) {
            warn!("Duplicate {} variable '{}', first entry wins", table, var.alias());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::VarType;

    struct Ctx {
        a: i64,
        b: bool,
    }

    fn int_a(alias: &'static str) -> TypedVariable<Ctx> {
        TypedVariable::int(alias, 0, 100, |c: &Ctx| c.a, |c: &mut Ctx, v| c.a = v)
    }

    fn bool_b(alias: &'static str) -> TypedVariable<Ctx> {
        TypedVariable::boolean(alias, |c: &Ctx| c.b, |c: &mut Ctx, v| c.b = v)
    }

    #[test]
    fn test_find_builtin() {
        let reg = VariableRegistry::new(vec![int_a("a"), bool_b("b")]);
        assert_eq!(reg.find("a").map(|v| v.vartype()), Some(VarType::Int));
        assert_eq!(reg.find("b").map(|v| v.vartype()), Some(VarType::Bool));
        assert!(reg.find("c").is_none());
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_builtin_wins_over_app() {
        let mut reg = VariableRegistry::new(vec![int_a("x")]);
        reg.register_app_variables(vec![bool_b("x"), bool_b("y")]);
        assert_eq!(reg.find("x").map(|v| v.vartype()), Some(VarType::Int));
        assert_eq!(reg.find("y").map(|v| v.vartype()), Some(VarType::Bool));
    }

    #[test]
    fn test_app_registration_replaces() {
        let mut reg: VariableRegistry<Ctx> = VariableRegistry::empty();
        reg.register_app_variables(vec![int_a("first")]);
        reg.register_app_variables(vec![int_a("second")]);
        assert!(reg.find("first").is_none());
        assert!(reg.find("second").is_some());
        assert_eq!(reg.len(), 1);

        reg.clear_app_variables();
        assert!(reg.is_empty());
    }

    #[test]
    fn test_iter_order() {
        let mut reg = VariableRegistry::new(vec![int_a("a")]);
        reg.register_app_variables(vec![bool_b("b")]);
        let aliases: Vec<&str> = reg.iter().map(|v| v.alias()).collect();
        assert_eq!(aliases, vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_first_wins() {
        let reg = VariableRegistry::new(vec![int_a("d"), bool_b("d")]);
        assert_eq!(reg.find("d").map(|v| v.vartype()), Some(VarType::Int));
    }
}
