use crate::domain::entry::FragmentRef;

/// Sorts fragments by the integer value of their sequence name. The sort is stable
/// and unparsable names count as `0`, so they keep their relative order at the front.
pub fn order(mut fragments: Vec<FragmentRef>) -> Vec<FragmentRef> {
    fragments.sort_by_key(FragmentRef::sequence_number);
    fragments
}
