//! Opaque identifier allocation.
//!
//! Every entity row is keyed by a short random alphanumeric string
//! rather than a sequential integer. Candidates are collision-checked
//! against the store before use; the regenerate loop is bounded so a
//! broken store cannot spin forever.

use rand::{distributions::Alphanumeric, Rng};
use sea_orm::{ConnectionTrait, DbErr, EntityTrait, PrimaryKeyTrait};

pub const IDENT_LEN: usize = 12;
pub const RETRY_CAP: usize = 8;

/// Returns a random identifier candidate. Use [`allocate`] when the
/// value must be unique within a table.
pub fn generate() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(IDENT_LEN)
        .map(char::from)
        .collect()
}

/// Allocates an identifier proven unused in `E`'s table at the time of
/// the check. Run inside the transaction that inserts the row so the
/// check and the insert are one atomic unit.
pub async fn allocate<E, C>(conn: &C) -> Result<String, DbErr>
where
    E: EntityTrait,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<String>,
    C: ConnectionTrait,
{
    for _ in 0..RETRY_CAP {
        let candidate = generate();
        let key = <E::PrimaryKey as PrimaryKeyTrait>::ValueType::from(candidate.clone());
        if E::find_by_id(key).one(conn).await?.is_none() {
            return Ok(candidate);
        }
    }

    Err(DbErr::Custom(format!(
        "identifier allocation exhausted {} attempts",
        RETRY_CAP
    )))
}
