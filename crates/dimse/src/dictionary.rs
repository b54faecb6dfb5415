//! Data dictionary lookups used when building identifiers

use dicom_core::dictionary::{DataDictionary, DataDictionaryEntry};
use dicom_core::{Tag, VR};
use dicom_dictionary_std::StandardDataDictionary;

/// Value representation of `tag`.
///
/// Private attributes (odd groups) are only known by their creator; the
/// standard dictionary carries none, so they resolve to `UN` like any
/// unknown tag.
pub fn vr_of(tag: Tag, private_creator: Option<&str>) -> VR {
    if is_private(tag) {
        if let Some(creator) = private_creator {
            tracing::trace!("No private dictionary for creator '{}', tag {}", creator, tag);
        }
        return VR::UN;
    }

    StandardDataDictionary
        .by_tag(tag)
        .map(|entry| entry.vr().relaxed())
        .unwrap_or(VR::UN)
}

/// Odd group numbers are reserved for private attributes
pub fn is_private(tag: Tag) -> bool {
    tag.group() & 1 == 1
}

/// Tag of the private creator element reserving the block of `tag`,
/// `None` for standard tags and for the creator elements themselves
pub fn private_creator_tag(tag: Tag) -> Option<Tag> {
    if !is_private(tag) || tag.element() < 0x1000 {
        return None;
    }
    Some(Tag(tag.group(), tag.element() >> 8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_dictionary_std::tags;

    #[test]
    fn test_standard_vrs() {
        assert_eq!(vr_of(tags::PATIENT_NAME, None), VR::PN);
        assert_eq!(vr_of(tags::PATIENT_ID, None), VR::LO);
        assert_eq!(vr_of(tags::STUDY_INSTANCE_UID, None), VR::UI);
        assert_eq!(vr_of(Tag(0x0008, 0x1110), None), VR::SQ);
    }

    #[test]
    fn test_private_tags_are_unknown() {
        assert_eq!(vr_of(Tag(0x0009, 0x1001), Some("ACME 1.0")), VR::UN);
        assert_eq!(private_creator_tag(Tag(0x0009, 0x1001)), Some(Tag(0x0009, 0x0010)));
        assert_eq!(private_creator_tag(Tag(0x0009, 0x0010)), None);
        assert_eq!(private_creator_tag(tags::PATIENT_ID), None);
    }
}
