use db::types::{ProjectScope, TaskScope};

use crate::access::Actor;

/// Projects the actor may list, given the ids they are a member or manager of.
pub fn project_scope(actor: &Actor, own_project_ids: Vec<i64>) -> ProjectScope {
    if actor.is_pm() {
        ProjectScope::Unrestricted
    } else if own_project_ids.is_empty() {
        ProjectScope::Nothing
    } else {
        ProjectScope::Projects(own_project_ids)
    }
}

/// Tasks the actor may list: everything for a PM, otherwise tasks in their
/// projects plus tasks assigned to them.
pub fn task_scope(actor: &Actor, own_project_ids: Vec<i64>) -> TaskScope {
    if actor.is_pm() {
        TaskScope::Unrestricted
    } else {
        TaskScope::Restricted {
            project_ids: own_project_ids,
            assignee: actor.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use db::types::Role;

    use super::*;

    #[test]
    fn pm_is_unrestricted() {
        let pm = Actor::new(1, Role::Pm);
        assert_eq!(project_scope(&pm, Vec::new()), ProjectScope::Unrestricted);
        assert_eq!(task_scope(&pm, vec![3]), TaskScope::Unrestricted);
    }

    #[test]
    fn member_without_projects_sees_nothing() {
        let member = Actor::new(9, Role::Member);
        assert_eq!(project_scope(&member, Vec::new()), ProjectScope::Nothing);
        assert_eq!(
            task_scope(&member, Vec::new()),
            TaskScope::Restricted {
                project_ids: Vec::new(),
                assignee: 9
            }
        );
    }

    #[test]
    fn member_sees_own_projects() {
        let member = Actor::new(9, Role::Member);
        assert_eq!(
            project_scope(&member, vec![4, 7]),
            ProjectScope::Projects(vec![4, 7])
        );
    }
}
