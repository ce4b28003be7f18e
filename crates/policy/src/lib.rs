pub mod access;
pub mod visibility;

pub use access::{
    Action, Actor, Decision, DenyReason, ProjectFacts, Resource, TaskFacts, decide,
};
