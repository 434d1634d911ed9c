mod group_list;
mod legend;
mod record;

pub use group_list::{GroupList, INLINE_CAPACITY};
pub use legend::Legend;
pub use record::{Fragment, SeqRecord, PHRED_OFFSET};
