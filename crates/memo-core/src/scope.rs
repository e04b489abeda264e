//! The authenticated caller, threaded through every repository call.

use uuid::Uuid;

/// Owner predicate for every query: rows outside this scope behave as if
/// they do not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserScope(Uuid);

impl UserScope {
    pub fn new(user_id: Uuid) -> Self {
        Self(user_id)
    }

    pub fn user_id(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for UserScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_exposes_user_id() {
        let id = Uuid::new_v4();
        let scope = UserScope::new(id);
        assert_eq!(scope.user_id(), id);
        assert_eq!(scope.to_string(), id.to_string());
    }
}
