//! Field-level comparison of two versions of an aggregate.

use crate::error::{SyncError, SyncResult};
use notesync_core::{Aggregate, Existence, Folder, FolderEvent, Note, NoteEvent, Path};
use std::collections::BTreeSet;

/// One field that differs between two versions of an aggregate.
///
/// Differences are directional: `from` is the value on the left side of the
/// comparison and `to` the value on the right side.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Difference {
    /// The existence state differs.
    Existence {
        /// Left value.
        from: Existence,
        /// Right value.
        to: Existence,
    },
    /// The location differs.
    Path {
        /// Left value.
        from: Path,
        /// Right value.
        to: Path,
    },
    /// The title differs.
    Title {
        /// Left value.
        from: String,
        /// Right value.
        to: String,
    },
    /// The content differs.
    Content {
        /// Left value.
        from: String,
        /// Right value.
        to: String,
    },
    /// An attachment is present on one side only, or differs in content.
    Attachment {
        /// Attachment name.
        name: String,
        /// Left bytes, `None` if absent.
        from: Option<Vec<u8>>,
        /// Right bytes, `None` if absent.
        to: Option<Vec<u8>>,
    },
}

impl Difference {
    /// Returns the same difference seen from the other side.
    #[must_use]
    pub fn reversed(&self) -> Difference {
        match self {
            Difference::Existence { from, to } => Difference::Existence {
                from: *to,
                to: *from,
            },
            Difference::Path { from, to } => Difference::Path {
                from: to.clone(),
                to: from.clone(),
            },
            Difference::Title { from, to } => Difference::Title {
                from: to.clone(),
                to: from.clone(),
            },
            Difference::Content { from, to } => Difference::Content {
                from: to.clone(),
                to: from.clone(),
            },
            Difference::Attachment { name, from, to } => Difference::Attachment {
                name: name.clone(),
                from: to.clone(),
                to: from.clone(),
            },
        }
    }
}

/// Aggregates that can be compared and brought into line with each other.
pub trait Reconcilable: Aggregate {
    /// Whether a conflicting version may be kept as a copy under a new id.
    const DUPLICABLE: bool;

    /// Lists the fields that differ from `self` to `other`.
    fn differences(&self, other: &Self) -> BTreeSet<Difference>;

    /// Returns the transitions that move an aggregate from the `from` side
    /// of every difference to its `to` side, in application order.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Compensation`] for differences this kind of
    /// aggregate cannot have.
    fn compensating_payloads(
        agg_id: &str,
        differences: &BTreeSet<Difference>,
    ) -> SyncResult<Vec<Self::Event>>;
}

/// Compares aggregate versions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DifferenceAnalyzer;

impl DifferenceAnalyzer {
    /// Returns what differs from `left` to `right`. Identical versions have
    /// no differences.
    pub fn compare<A: Reconcilable>(left: &A, right: &A) -> BTreeSet<Difference> {
        left.differences(right)
    }
}

impl Reconcilable for Note {
    const DUPLICABLE: bool = true;

    fn differences(&self, other: &Self) -> BTreeSet<Difference> {
        let mut differences = BTreeSet::new();
        if self.existence() != other.existence() {
            differences.insert(Difference::Existence {
                from: self.existence(),
                to: other.existence(),
            });
        }
        if self.path() != other.path() {
            differences.insert(Difference::Path {
                from: self.path().clone(),
                to: other.path().clone(),
            });
        }
        if self.title() != other.title() {
            differences.insert(Difference::Title {
                from: self.title().to_string(),
                to: other.title().to_string(),
            });
        }
        if self.content() != other.content() {
            differences.insert(Difference::Content {
                from: self.content().to_string(),
                to: other.content().to_string(),
            });
        }
        for name in self.attachments().keys().chain(other.attachments().keys()) {
            let from = self.attachment(name);
            let to = other.attachment(name);
            if from != to {
                differences.insert(Difference::Attachment {
                    name: name.clone(),
                    from: from.map(<[u8]>::to_vec),
                    to: to.map(<[u8]>::to_vec),
                });
            }
        }
        differences
    }

    fn compensating_payloads(
        _agg_id: &str,
        differences: &BTreeSet<Difference>,
    ) -> SyncResult<Vec<NoteEvent>> {
        let mut existence = None;
        let mut path = None;
        let mut title = None;
        let mut content = None;
        let mut added = Vec::new();
        let mut removed = Vec::new();

        for difference in differences {
            match difference {
                Difference::Existence { from, to } => existence = Some((*from, *to)),
                Difference::Path { to, .. } => path = Some(to.clone()),
                Difference::Title { to, .. } => title = Some(to.clone()),
                Difference::Content { to, .. } => content = Some(to.clone()),
                Difference::Attachment { name, to, .. } => match to {
                    Some(bytes) => added.push((name.clone(), bytes.clone())),
                    None => removed.push(name.clone()),
                },
            }
        }

        let mut events = Vec::new();
        match existence {
            // an aggregate cannot be un-created
            Some((from, Existence::NotYetCreated)) => {
                if from == Existence::Exists {
                    events.push(NoteEvent::Deleted);
                }
                return Ok(events);
            }
            Some((Existence::NotYetCreated, _)) => {
                events.push(NoteEvent::Created {
                    path: path.take().unwrap_or_default(),
                    title: title.take().unwrap_or_default(),
                    content: content.take().unwrap_or_default(),
                });
            }
            Some((Existence::Deleted, Existence::Exists)) => events.push(NoteEvent::Undeleted),
            Some(_) | None => {}
        }

        if let Some(path) = path {
            events.push(NoteEvent::Moved { path });
        }
        if let Some(title) = title {
            events.push(NoteEvent::TitleChanged { title });
        }
        if let Some(content) = content {
            events.push(NoteEvent::ContentChanged { content });
        }
        events.extend(
            removed
                .into_iter()
                .map(|name| NoteEvent::AttachmentDeleted { name }),
        );
        events.extend(
            added
                .into_iter()
                .map(|(name, content)| NoteEvent::AttachmentAdded { name, content }),
        );
        if matches!(existence, Some((_, Existence::Deleted))) {
            events.push(NoteEvent::Deleted);
        }
        Ok(events)
    }
}

impl Reconcilable for Folder {
    const DUPLICABLE: bool = false;

    fn differences(&self, other: &Self) -> BTreeSet<Difference> {
        let mut differences = BTreeSet::new();
        if self.existence() != other.existence() {
            differences.insert(Difference::Existence {
                from: self.existence(),
                to: other.existence(),
            });
        }
        if self.path() != other.path() {
            differences.insert(Difference::Path {
                from: self.path().clone(),
                to: other.path().clone(),
            });
        }
        differences
    }

    fn compensating_payloads(
        agg_id: &str,
        differences: &BTreeSet<Difference>,
    ) -> SyncResult<Vec<FolderEvent>> {
        let mut existence = None;
        for difference in differences {
            match difference {
                Difference::Existence { from, to } => existence = Some((*from, *to)),
                // the location follows from the id
                Difference::Path { .. } => {}
                other => {
                    return Err(SyncError::compensation(
                        agg_id,
                        format!("folders cannot differ by {other:?}"),
                    ));
                }
            }
        }

        let Some((from, to)) = existence else {
            return Ok(Vec::new());
        };
        let path = Folder::path_of(agg_id)?;
        let created = FolderEvent::Created { path: path.clone() };
        let deleted = FolderEvent::Deleted { path };

        Ok(match (from, to) {
            (Existence::NotYetCreated | Existence::Deleted, Existence::Exists) => vec![created],
            (Existence::NotYetCreated, Existence::Deleted) => vec![created, deleted],
            (Existence::Exists, Existence::Deleted | Existence::NotYetCreated) => vec![deleted],
            _ => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notesync_core::{replay, Event};

    fn note(events: &[NoteEvent]) -> Note {
        let list: Vec<Event> = events
            .iter()
            .enumerate()
            .map(|(i, e)| Event::new("note-1", i as u64 + 1, e.clone()))
            .collect();
        replay(Note::empty("note-1"), &list).unwrap()
    }

    fn created(path: Path, title: &str, content: &str) -> NoteEvent {
        NoteEvent::Created {
            path,
            title: title.into(),
            content: content.into(),
        }
    }

    #[test]
    fn identical_versions_have_no_differences() {
        let a = note(&[created(Path::root(), "T", "c")]);
        assert!(DifferenceAnalyzer::compare(&a, &a.clone()).is_empty());
    }

    #[test]
    fn created_versus_never_created() {
        let never = Note::empty("note-1");

        let at_root = note(&[created(Path::root(), "T", "c")]);
        let differences = DifferenceAnalyzer::compare(&at_root, &never);
        assert_eq!(
            differences,
            BTreeSet::from([
                Difference::Existence {
                    from: Existence::Exists,
                    to: Existence::NotYetCreated,
                },
                Difference::Title {
                    from: "T".into(),
                    to: String::new(),
                },
                Difference::Content {
                    from: "c".into(),
                    to: String::new(),
                },
            ])
        );

        let nested = note(&[created(Path::new(["inbox"]).unwrap(), "T", "c")]);
        assert_eq!(DifferenceAnalyzer::compare(&nested, &never).len(), 4);
    }

    #[test]
    fn attachments_compared_by_name() {
        let base = created(Path::root(), "T", "");
        let left = note(&[
            base.clone(),
            NoteEvent::AttachmentAdded {
                name: "a".into(),
                content: vec![1],
            },
            NoteEvent::AttachmentAdded {
                name: "b".into(),
                content: vec![2],
            },
        ]);
        let right = note(&[
            base,
            NoteEvent::AttachmentAdded {
                name: "b".into(),
                content: vec![3],
            },
        ]);

        let differences = DifferenceAnalyzer::compare(&left, &right);
        assert_eq!(
            differences,
            BTreeSet::from([
                Difference::Attachment {
                    name: "a".into(),
                    from: Some(vec![1]),
                    to: None,
                },
                Difference::Attachment {
                    name: "b".into(),
                    from: Some(vec![2]),
                    to: Some(vec![3]),
                },
            ])
        );
    }

    #[test]
    fn reversed_swaps_sides() {
        let difference = Difference::Title {
            from: "a".into(),
            to: "b".into(),
        };
        assert_eq!(
            difference.reversed(),
            Difference::Title {
                from: "b".into(),
                to: "a".into(),
            }
        );
        assert_eq!(difference.reversed().reversed(), difference);
    }

    #[test]
    fn note_payload_order() {
        let differences = BTreeSet::from([
            Difference::Existence {
                from: Existence::Deleted,
                to: Existence::Exists,
            },
            Difference::Title {
                from: "a".into(),
                to: "b".into(),
            },
            Difference::Path {
                from: Path::root(),
                to: Path::new(["x"]).unwrap(),
            },
        ]);
        let payloads = Note::compensating_payloads("note-1", &differences).unwrap();
        let names: Vec<_> = payloads.iter().map(NoteEvent::name).collect();
        assert_eq!(names, vec!["NoteUndeleted", "NoteMoved", "TitleChanged"]);
    }

    #[test]
    fn note_creation_folds_fields() {
        let differences = BTreeSet::from([
            Difference::Existence {
                from: Existence::NotYetCreated,
                to: Existence::Deleted,
            },
            Difference::Title {
                from: String::new(),
                to: "T".into(),
            },
        ]);
        let payloads = Note::compensating_payloads("note-1", &differences).unwrap();
        assert_eq!(
            payloads,
            vec![created(Path::root(), "T", ""), NoteEvent::Deleted]
        );
    }

    #[test]
    fn uncreating_becomes_deletion() {
        let differences = BTreeSet::from([
            Difference::Existence {
                from: Existence::Exists,
                to: Existence::NotYetCreated,
            },
            Difference::Title {
                from: "T".into(),
                to: String::new(),
            },
        ]);
        assert_eq!(
            Note::compensating_payloads("note-1", &differences).unwrap(),
            vec![NoteEvent::Deleted]
        );
    }

    #[test]
    fn folder_payloads() {
        let path = Path::new(["work"]).unwrap();
        let agg_id = Folder::agg_id_for(&path);
        let differences = BTreeSet::from([
            Difference::Existence {
                from: Existence::NotYetCreated,
                to: Existence::Exists,
            },
            Difference::Path {
                from: Path::root(),
                to: path.clone(),
            },
        ]);
        assert_eq!(
            Folder::compensating_payloads(&agg_id, &differences).unwrap(),
            vec![FolderEvent::Created { path }]
        );

        let bad = BTreeSet::from([Difference::Title {
            from: String::new(),
            to: "x".into(),
        }]);
        assert!(matches!(
            Folder::compensating_payloads(&agg_id, &bad),
            Err(SyncError::Compensation { .. })
        ));
    }
}
