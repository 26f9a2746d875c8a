//! Reconciliation of local migration history against the database's view.
//!
//! Pure and synchronous: given the ordered local and remote histories this
//! computes the pending-apply subset, enforcing two invariants first. The
//! remote history must never be longer than the local one, and wherever both
//! histories have an entry at the same position the IDs must be identical
//! (lockstep). Violations are fatal and never auto-recovered.

use crate::engine::RemoteMigration;
use crate::error::Error;
use crate::store::Migration;

/// Outcome of reconciling local against remote history.
#[derive(Debug)]
pub struct Reconciliation<'a> {
    /// Local migrations not yet applied remotely, in local order.
    pub pending: &'a [Migration],
    /// Index into the local history of the newest applied migration, or
    /// `None` when nothing has been applied yet. This is the baseline for
    /// datamodel diffing.
    pub last_applied: Option<usize>,
}

/// Compute the migrations that still need to be applied.
///
/// `limit` truncates the pending list to its first `limit` entries; ordering
/// is always preserved, applies are earliest-first.
pub fn reconcile<'a>(
    local: &'a [Migration],
    remote: &[RemoteMigration],
    limit: Option<usize>,
) -> Result<Reconciliation<'a>, Error> {
    if remote.len() > local.len() {
        return Err(Error::SurplusMigrations {
            local: local.len(),
            remote: remote.len(),
        });
    }

    for (index, (local_migration, remote_migration)) in local.iter().zip(remote).enumerate() {
        if local_migration.id != remote_migration.id {
            return Err(Error::LockstepViolation {
                index,
                local_id: local_migration.id.clone(),
                remote_id: remote_migration.id.clone(),
            });
        }
    }

    // Lockstep holds, so everything up to the remote length is applied and
    // everything beyond it is pending.
    let mut pending = &local[remote.len()..];
    if let Some(limit) = limit {
        pending = &pending[..pending.len().min(limit)];
    }

    Ok(Reconciliation {
        pending,
        last_applied: remote.len().checked_sub(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(ids: &[&str]) -> Vec<Migration> {
        ids.iter()
            .map(|id| Migration {
                id: id.to_string(),
                steps: Vec::new(),
                datamodel: format!("model {id} {{}}"),
            })
            .collect()
    }

    fn remote(ids: &[&str]) -> Vec<RemoteMigration> {
        ids.iter()
            .map(|id| RemoteMigration { id: id.to_string() })
            .collect()
    }

    fn pending_ids<'a>(recon: &'a Reconciliation<'a>) -> Vec<&'a str> {
        recon.pending.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn test_remote_prefix_yields_tail_as_pending() {
        let l = local(&["a", "b", "c"]);
        let r = remote(&["a"]);

        let recon = reconcile(&l, &r, None).unwrap();
        assert_eq!(pending_ids(&recon), vec!["b", "c"]);
        assert_eq!(recon.last_applied, Some(0));
    }

    #[test]
    fn test_empty_remote_means_everything_pending() {
        let l = local(&["a", "b"]);

        let recon = reconcile(&l, &[], None).unwrap();
        assert_eq!(pending_ids(&recon), vec!["a", "b"]);
        assert_eq!(recon.last_applied, None);
    }

    #[test]
    fn test_fully_applied_means_nothing_pending() {
        let l = local(&["a", "b"]);
        let r = remote(&["a", "b"]);

        let recon = reconcile(&l, &r, None).unwrap();
        assert!(recon.pending.is_empty());
        assert_eq!(recon.last_applied, Some(1));
    }

    #[test]
    fn test_remote_surplus_is_fatal() {
        let l = local(&["a"]);
        let r = remote(&["a", "b"]);

        let err = reconcile(&l, &r, None).unwrap_err();
        assert!(matches!(err, Error::SurplusMigrations { local: 1, remote: 2 }));
    }

    #[test]
    fn test_lockstep_violation_cites_index_and_both_ids() {
        let l = local(&["a", "b"]);
        let r = remote(&["a", "x"]);

        let err = reconcile(&l, &r, None).unwrap_err();
        match err {
            Error::LockstepViolation {
                index,
                local_id,
                remote_id,
            } => {
                assert_eq!(index, 1);
                assert_eq!(local_id, "b");
                assert_eq!(remote_id, "x");
            }
            other => panic!("expected lockstep violation, got {other}"),
        }
    }

    #[test]
    fn test_divergence_at_first_index() {
        let l = local(&["a", "b"]);
        let r = remote(&["x"]);

        let err = reconcile(&l, &r, None).unwrap_err();
        assert!(matches!(err, Error::LockstepViolation { index: 0, .. }));
    }

    #[test]
    fn test_limit_truncates_earliest_first() {
        let l = local(&["a", "b", "c", "d"]);
        let r = remote(&["a"]);

        let recon = reconcile(&l, &r, Some(2)).unwrap();
        assert_eq!(pending_ids(&recon), vec!["b", "c"]);
    }

    #[test]
    fn test_limit_larger_than_pending_is_a_no_op() {
        let l = local(&["a", "b"]);

        let recon = reconcile(&l, &[], Some(10)).unwrap();
        assert_eq!(pending_ids(&recon), vec!["a", "b"]);
    }

    #[test]
    fn test_limit_zero_leaves_everything_for_later() {
        let l = local(&["a", "b"]);

        let recon = reconcile(&l, &[], Some(0)).unwrap();
        assert!(recon.pending.is_empty());
        assert_eq!(recon.last_applied, None);
    }

    #[test]
    fn test_pending_is_always_a_prefix_of_the_full_pending_list() {
        let l = local(&["a", "b", "c", "d", "e"]);
        let r = remote(&["a", "b"]);

        let full = reconcile(&l, &r, None).unwrap();
        for n in 0..=4 {
            let capped = reconcile(&l, &r, Some(n)).unwrap();
            assert_eq!(capped.pending.len(), n.min(full.pending.len()));
            assert_eq!(capped.pending, &full.pending[..capped.pending.len()]);
        }
    }

    #[test]
    fn test_both_empty() {
        let recon = reconcile(&[], &[], None).unwrap();
        assert!(recon.pending.is_empty());
        assert_eq!(recon.last_applied, None);
    }
}
