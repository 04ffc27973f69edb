use epskill::CompetitorId;
use rustc_hash::FxHashMap;

/// Lookup from competitor names to ids. The first occurrence of a name
/// wins.
#[derive(Default)]
pub struct PlayerIds {
    inner: FxHashMap<Box<str>, CompetitorId>,
}

impl PlayerIds {
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> PlayerIds {
        let mut ids = PlayerIds::default();
        for (id, name) in names.iter().enumerate() {
            ids.inner
                .entry(name.as_ref().into())
                .or_insert(CompetitorId(id));
        }
        ids
    }

    pub fn get(&self, name: &str) -> Option<CompetitorId> {
        self.inner.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
