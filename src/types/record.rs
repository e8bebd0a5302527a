use crate::types::{Id, ROOT};

/// One record parsed from an untagged fetch response.
///
/// The protocol core only interprets the identifying fields it needs for
/// correlation and for the non-overlapping-roots resolution: the record's own
/// identifier, its parent reference, and (when the server was asked for them)
/// the full ancestor chain. Everything else (the display name and the
/// backend's remote identifier) is carried through untouched for the caller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchRecord {
    pub(crate) id: Id,
    pub(crate) parent: Id,
    pub(crate) name: Option<String>,
    pub(crate) remote_id: Option<String>,
    pub(crate) ancestors: Vec<Id>,
}

impl FetchRecord {
    /// Create a record with just the identifying fields set.
    pub fn new(id: Id, parent: Id) -> FetchRecord {
        FetchRecord {
            id,
            parent,
            name: None,
            remote_id: None,
            ancestors: Vec::new(),
        }
    }

    /// The server-assigned identifier of this record.
    pub fn id(&self) -> Id {
        self.id
    }

    /// The identifier of this record's parent collection, or [`ROOT`] for a
    /// top-level collection.
    pub fn parent(&self) -> Id {
        self.parent
    }

    /// The display name, if the response carried one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The backend's remote identifier, if the response carried one.
    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    /// The chain of parent identifiers from this record's parent up to, but
    /// excluding, the universal root.
    ///
    /// Only populated when the fetch asked the server for full-ancestor
    /// retrieval (the probe step of a multi-root recursive fetch); empty
    /// otherwise.
    pub fn ancestors(&self) -> &[Id] {
        &self.ancestors
    }

    /// Whether this record sits directly below the universal root.
    pub fn is_top_level(&self) -> bool {
        self.parent == ROOT
    }
}
