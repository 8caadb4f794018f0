//! Parent-link reconciliation.
//!
//! Strings reference their parent by stable `parent_uuid`; the resolved
//! `parent_id` foreign key is filled in by this explicit, idempotent batch
//! rather than by an implicit post-save hook. Callers insert strings in
//! parent-before-child order where they can and run this batch for the
//! remaining out-of-order cases (e.g. external imports).

use taxon_storage::{StorageError, TaxonStorage};

/// Resolve `parent_id` for every string in a workspace whose parent row now
/// exists. Returns the number of links resolved. Strings whose parent uuid
/// still matches nothing are left for a later run.
pub async fn reconcile_parent_links<S: TaxonStorage>(
    storage: &S,
    workspace_id: i64,
) -> Result<usize, StorageError> {
    let unresolved = storage.list_unresolved_parent_links(workspace_id).await?;
    if unresolved.is_empty() {
        return Ok(0);
    }

    let mut snapshot = storage.begin_snapshot().await?;
    let mut resolved = 0usize;
    for child in &unresolved {
        let Some(parent_uuid) = child.parent_uuid.as_deref() else {
            continue;
        };
        match storage.get_string_by_uuid(workspace_id, parent_uuid).await {
            Ok(parent) => {
                storage
                    .update_parent_link(&mut snapshot, child.id, parent.id)
                    .await?;
                resolved += 1;
            }
            Err(StorageError::StringUuidNotFound { .. }) => continue,
            Err(e) => {
                storage.abort_snapshot(snapshot).await?;
                return Err(e);
            }
        }
    }
    storage.commit_snapshot(snapshot).await?;

    tracing::debug!(workspace_id, resolved, "parent links reconciled");
    Ok(resolved)
}
