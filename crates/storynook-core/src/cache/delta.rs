//! Optimistic local mutations.

/// Entities addressable inside a cached collection.
pub trait Keyed {
    /// Stable identity used to match updates and removals. Ids are minted
    /// on the client, so a key never changes between the optimistic apply
    /// and the remote confirmation.
    fn key(&self) -> &str;
}

/// One local change, applied ahead of its remote confirmation.
///
/// `Remove` carries the whole entity rather than a bare key so the remote
/// call can echo what was deleted and a rollback needs no lookup.
#[derive(Debug, Clone)]
pub enum Delta<T> {
    /// Add an entity at the front (collections are newest-first). If the
    /// key is already present the entity is replaced in place instead, so
    /// a double-tap on "save" cannot duplicate a row.
    Insert(T),
    /// Replace the entity with the same key.
    Update(T),
    /// Remove the entity with the same key.
    Remove(T),
}

impl<T: Keyed> Delta<T> {
    /// Key of the entity this delta touches.
    pub fn key(&self) -> &str {
        match self {
            Delta::Insert(item) | Delta::Update(item) | Delta::Remove(item) => item.key(),
        }
    }

    /// Short label for log lines.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Delta::Insert(_) => "insert",
            Delta::Update(_) => "update",
            Delta::Remove(_) => "remove",
        }
    }
}

impl<T: Keyed + Clone> Delta<T> {
    /// Apply to `items` in place. Returns the entity as it now stands in
    /// the collection, or `None` when the target of an update or remove is
    /// not present.
    pub(crate) fn apply(&self, items: &mut Vec<T>) -> Option<T> {
        match self {
            Delta::Insert(item) => {
                match items.iter_mut().find(|existing| existing.key() == item.key()) {
                    Some(slot) => *slot = item.clone(),
                    None => items.insert(0, item.clone()),
                }
                Some(item.clone())
            }
            Delta::Update(item) => {
                let slot = items.iter_mut().find(|existing| existing.key() == item.key())?;
                *slot = item.clone();
                Some(item.clone())
            }
            Delta::Remove(item) => {
                let index = items.iter().position(|existing| existing.key() == item.key())?;
                Some(items.remove(index))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: String,
        body: String,
    }

    impl Keyed for Note {
        fn key(&self) -> &str {
            &self.id
        }
    }

    fn note(id: &str, body: &str) -> Note {
        Note {
            id: id.to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_insert_goes_to_front() {
        let mut items = vec![note("a", "old")];
        let applied = Delta::Insert(note("b", "new")).apply(&mut items);
        assert_eq!(applied, Some(note("b", "new")));
        assert_eq!(items[0].id, "b");
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_insert_existing_key_replaces_in_place() {
        let mut items = vec![note("a", "one"), note("b", "two")];
        Delta::Insert(note("b", "revised")).apply(&mut items);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1], note("b", "revised"));
    }

    #[test]
    fn test_update_replaces_matching_entity() {
        let mut items = vec![note("a", "one"), note("b", "two")];
        let applied = Delta::Update(note("a", "revised")).apply(&mut items);
        assert_eq!(applied, Some(note("a", "revised")));
        assert_eq!(items[0].body, "revised");
    }

    #[test]
    fn test_update_missing_entity_is_none() {
        let mut items = vec![note("a", "one")];
        assert_eq!(Delta::Update(note("zz", "x")).apply(&mut items), None);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_remove_returns_removed_entity() {
        let mut items = vec![note("a", "one"), note("b", "two")];
        let applied = Delta::Remove(note("b", "")).apply(&mut items);
        assert_eq!(applied, Some(note("b", "two")));
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_remove_missing_entity_is_none() {
        let mut items = vec![note("a", "one")];
        assert_eq!(Delta::Remove(note("zz", "")).apply(&mut items), None);
        assert_eq!(items.len(), 1);
    }
}
