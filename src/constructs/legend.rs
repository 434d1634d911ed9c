use crate::GroupId;

/// Maps group identifiers to display names.
///
/// Identifiers are dense and handed out in push order, so the legend built
/// by the ordered commit of a reference pass lines up with the stream
/// position of each reference record.
///
/// ```rust
/// use shark::Legend;
///
/// let mut legend = Legend::default();
/// assert_eq!(legend.push("ENSG01"), 0);
/// assert_eq!(legend.push("ENSG02"), 1);
/// assert_eq!(legend.name(1), Some("ENSG02"));
/// assert_eq!(legend.name(2), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Legend {
    names: Vec<String>,
}

impl Legend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a name and return the identifier it was given.
    pub fn push<S: Into<String>>(&mut self, name: S) -> GroupId {
        let id = self.names.len() as GroupId;
        self.names.push(name.into());
        id
    }

    pub fn name(&self, id: GroupId) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = (GroupId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(id, name)| (id as GroupId, name.as_str()))
    }
}

impl<S: Into<String>> FromIterator<S> for Legend {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}
