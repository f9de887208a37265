//! Department tree

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::collections::{BTreeSet, HashMap};

use crate::entity::department::{self, DepartmentTree};
use crate::entity::{project, user_assignment};
use crate::error::{AppError, AppResult, OptionExt};
use crate::permission::authorize;
use crate::state::AppState;
use crate::validation;

pub async fn list<C: ConnectionTrait>(db: &C) -> AppResult<Vec<department::Model>> {
    Ok(department::Entity::find()
        .order_by_asc(department::Column::Id)
        .all(db)
        .await?)
}

/// Departments nested under their parents; orphans are treated as roots
pub fn build_tree(departments: Vec<department::Model>) -> Vec<DepartmentTree> {
    let known: BTreeSet<i64> = departments.iter().map(|d| d.id).collect();
    let mut children: HashMap<Option<i64>, Vec<department::Model>> = HashMap::new();
    for d in departments {
        let parent = d.parent_id.filter(|p| known.contains(p) && *p != d.id);
        children.entry(parent).or_default().push(d);
    }

    fn attach(
        parent: Option<i64>,
        children: &mut HashMap<Option<i64>, Vec<department::Model>>,
    ) -> Vec<DepartmentTree> {
        let Some(nodes) = children.remove(&parent) else {
            return Vec::new();
        };
        nodes
            .into_iter()
            .map(|d| {
                let id = d.id;
                let mut node = DepartmentTree::from(d);
                node.children = attach(Some(id), children);
                node
            })
            .collect()
    }

    let mut roots = attach(None, &mut children);

    // Members of a stored cycle never hang below a root; surface each loop
    // from its lowest id.
    while let Some(id) = children.values().flatten().map(|d| d.id).min() {
        let mut taken = None;
        for nodes in children.values_mut() {
            if let Some(pos) = nodes.iter().position(|d| d.id == id) {
                taken = Some(nodes.remove(pos));
                break;
            }
        }
        children.retain(|_, nodes| !nodes.is_empty());
        if let Some(d) = taken {
            let mut node = DepartmentTree::from(d);
            node.children = attach(Some(id), &mut children);
            roots.push(node);
        }
    }
    roots
}

pub async fn tree<C: ConnectionTrait>(db: &C) -> AppResult<Vec<DepartmentTree>> {
    Ok(build_tree(list(db).await?))
}

async fn find<C: ConnectionTrait>(db: &C, id: i64) -> AppResult<department::Model> {
    department::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_not_found(format!("department {}", id))
}

pub async fn create(
    state: &AppState,
    actor_id: i64,
    name: &str,
    parent_id: Option<i64>,
) -> AppResult<department::Model> {
    let name = validation::text("name", name, 1, 128)?;
    let db = &state.db;
    authorize(db, actor_id, state.policy().department_level).await?;
    if let Some(parent_id) = parent_id {
        find(db, parent_id).await?;
    }

    let created = department::ActiveModel {
        name: Set(name),
        parent_id: Set(parent_id),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(department_id = created.id, actor_id, "Department created");
    Ok(created)
}

/// Rename or move a department.
///
/// The new parent may not be the department itself or one of its descendants.
pub async fn update(
    state: &AppState,
    actor_id: i64,
    id: i64,
    name: &str,
    parent_id: Option<i64>,
) -> AppResult<department::Model> {
    let name = validation::text("name", name, 1, 128)?;
    let db = &state.db;
    authorize(db, actor_id, state.policy().department_level).await?;

    let txn = db.begin().await?;
    let existing = find(&txn, id).await?;
    if let Some(parent_id) = parent_id {
        find(&txn, parent_id).await?;
        if creates_cycle(&txn, id, parent_id).await? {
            return Err(AppError::Validation(format!(
                "department {} cannot be moved under its own subtree",
                id
            )));
        }
    }

    let mut model: department::ActiveModel = existing.into();
    model.name = Set(name);
    model.parent_id = Set(parent_id);
    let updated = model.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(department_id = id, actor_id, "Department updated");
    Ok(updated)
}

/// Whether `id` is `new_parent` or one of its ancestors
async fn creates_cycle<C: ConnectionTrait>(db: &C, id: i64, new_parent: i64) -> AppResult<bool> {
    let mut seen = BTreeSet::new();
    let mut cursor = Some(new_parent);
    while let Some(current) = cursor {
        if current == id {
            return Ok(true);
        }
        // A cycle already stored above us must not spin forever.
        if !seen.insert(current) {
            return Ok(false);
        }
        cursor = department::Entity::find_by_id(current)
            .one(db)
            .await?
            .and_then(|d| d.parent_id);
    }
    Ok(false)
}

/// Delete an empty department
pub async fn delete(state: &AppState, actor_id: i64, id: i64) -> AppResult<()> {
    let db = &state.db;
    authorize(db, actor_id, state.policy().department_level).await?;

    let txn = db.begin().await?;
    find(&txn, id).await?;

    let children = department::Entity::find()
        .filter(department::Column::ParentId.eq(id))
        .count(&txn)
        .await?;
    if children > 0 {
        return Err(AppError::Conflict(format!(
            "department {} still has {} sub-departments",
            id, children
        )));
    }
    let projects = project::Entity::find()
        .filter(project::Column::DepartmentId.eq(id))
        .count(&txn)
        .await?;
    if projects > 0 {
        return Err(AppError::Conflict(format!(
            "department {} still owns {} projects",
            id, projects
        )));
    }
    let members = user_assignment::Entity::find()
        .filter(user_assignment::Column::DepartmentId.eq(id))
        .count(&txn)
        .await?;
    if members > 0 {
        return Err(AppError::Conflict(format!(
            "department {} still has {} role assignments",
            id, members
        )));
    }

    department::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(department_id = id, actor_id, "Department deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dept(id: i64, parent_id: Option<i64>) -> department::Model {
        department::Model {
            id,
            name: format!("d{}", id),
            parent_id,
        }
    }

    #[test]
    fn test_build_tree() {
        let tree = build_tree(vec![
            dept(1, None),
            dept(2, Some(1)),
            dept(3, Some(2)),
            dept(4, None),
            dept(5, Some(99)),
        ]);
        let roots: Vec<i64> = tree.iter().map(|n| n.id).collect();
        assert_eq!(roots, vec![1, 4, 5]);
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].id, 2);
        assert_eq!(tree[0].children[0].children[0].id, 3);
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn test_build_tree_keeps_stored_cycles() {
        let tree = build_tree(vec![
            dept(1, None),
            dept(6, Some(7)),
            dept(7, Some(6)),
            dept(8, Some(7)),
        ]);
        let roots: Vec<i64> = tree.iter().map(|n| n.id).collect();
        assert_eq!(roots, vec![1, 6]);
        assert_eq!(tree[1].children.len(), 1);
        assert_eq!(tree[1].children[0].id, 7);
        assert_eq!(tree[1].children[0].children[0].id, 8);
    }
}
