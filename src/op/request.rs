//! Translation of attribute keys into the C-FIND identifier

use dicom_core::value::{DataSetSequence, Value};
use dicom_core::{DataElement, Length, PrimitiveValue, Tag, VR};
use dicom_object::InMemDicomObject;
use dimse::dictionary;

use crate::param::AttributeKey;

/// Add `key` to the identifier.
///
/// A returning key becomes an empty element, or a sequence holding one
/// empty item when the attribute is a sequence. A matching key carries its
/// values in order. Unknown or malformed tags are passed through as `UN`
/// and left for the peer to reject.
pub fn add_attributes(attrs: &mut InMemDicomObject, key: &AttributeKey) {
    let tag = key.tag();
    let creator = private_creator(attrs, tag);
    let vr = dictionary::vr_of(tag, creator.as_deref());

    if key.is_returning_key() {
        if vr == VR::SQ {
            let items = vec![InMemDicomObject::new_empty()];
            attrs.put(DataElement::new(
                tag,
                VR::SQ,
                Value::Sequence(DataSetSequence::new(items, Length::UNDEFINED)),
            ));
        } else {
            attrs.put(DataElement::empty(tag, vr));
        }
    } else {
        attrs.put(DataElement::new(
            tag,
            vr,
            PrimitiveValue::Strs(key.values().iter().cloned().collect()),
        ));
    }
}

fn private_creator(attrs: &InMemDicomObject, tag: Tag) -> Option<String> {
    let creator_tag = dictionary::private_creator_tag(tag)?;
    let elem = attrs.element(creator_tag).ok()?;
    elem.to_str().ok().map(|s| s.trim().to_string())
}
