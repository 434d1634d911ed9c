use smallvec::SmallVec;

use crate::GroupId;

/// Groups held without allocating.
pub const INLINE_CAPACITY: usize = 3;

/// The groups tied for the best score of a read.
///
/// Almost every read ties on one or two groups, so the first
/// [`INLINE_CAPACITY`] identifiers live inline and only larger ties spill to
/// the heap.
///
/// ```rust
/// use shark::GroupList;
///
/// let mut groups = GroupList::new();
/// groups.extend([4, 9, 2]);
/// assert!(!groups.spilled());
/// groups.push(7);
/// assert!(groups.spilled());
/// assert_eq!(groups.as_slice(), &[4, 9, 2, 7]);
/// ```
pub type GroupList = SmallVec<[GroupId; INLINE_CAPACITY]>;
