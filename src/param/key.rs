use dicom_core::Tag;

/// One attribute of a query identifier.
///
/// Without values it is a returning key (the attribute is requested in the
/// responses); with values it is a matching key constraining the search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeKey {
    tag: Tag,
    values: Option<Vec<String>>,
}

impl AttributeKey {
    /// Returning key for `tag`
    pub const fn returning(tag: Tag) -> Self {
        Self { tag, values: None }
    }

    /// Matching key for `tag` with the given values, order preserved
    pub fn matching<I, S>(tag: Tag, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tag,
            values: Some(values.into_iter().map(Into::into).collect()),
        }
    }

    /// Same attribute, constrained to `values`
    pub fn with_values<I, S>(&self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::matching(self.tag, values)
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Values of a matching key, empty for a returning key
    pub fn values(&self) -> &[String] {
        self.values.as_deref().unwrap_or(&[])
    }

    pub fn is_returning_key(&self) -> bool {
        self.values().is_empty()
    }
}
