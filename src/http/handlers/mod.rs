pub mod actions;
pub mod allow;
pub mod assignments;
pub mod relationships;
pub mod role_bindings;
pub mod roles;
