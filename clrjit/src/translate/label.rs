//! Label table: a flat, address-sorted `Vec` of (bytecode offset, IR block)
//! pairs, built by pass one and binary-searched by pass two (spec.md §4.3's
//! "Label" record and its note that labels "are naturally produced and
//! consumed in increasing address order").

/// Index 0 always refers to bytecode offset 0, the method's logical start;
/// pass one creates it unconditionally, before processing any instruction,
/// so pass two can skip straight to index 1 without a special case for the
/// entry block (spec.md §4.3 pass two: "label_idx = 1, skipping the
/// entry-label sentinel").
pub struct LabelTable<Block> {
	labels: Vec<(u32, Block)>,
}

impl<Block: Copy> LabelTable<Block> {
	pub fn new(entry_block: Block) -> Self {
		Self { labels: vec![(0, entry_block)] }
	}

	/// Returns the block already labeling `address`, or creates one via
	/// `make_block` and inserts it in sorted position.
	pub fn get_or_create(&mut self, address: u32, make_block: impl FnOnce() -> Block) -> Block {
		match self.labels.binary_search_by_key(&address, |(a, _)| *a) {
			Ok(idx) => self.labels[idx].1,
			Err(idx) => {
				let block = make_block();
				self.labels.insert(idx, (address, block));
				block
			}
		}
	}

	pub fn get(&self, address: u32) -> Option<Block> {
		self.labels.binary_search_by_key(&address, |(a, _)| *a).ok().map(|idx| self.labels[idx].1)
	}

	/// Repoints the sentinel at offset 0 to the real entry block pass one
	/// creates once it discovers at least one spilled argument (spec.md
	/// §4.3 Preamble).
	pub fn retarget_entry(&mut self, block: Block) {
		self.labels[0].1 = block;
	}

	pub fn len(&self) -> usize {
		self.labels.len()
	}

	pub fn at(&self, idx: usize) -> (u32, Block) {
		self.labels[idx]
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lookups_stay_sorted_regardless_of_insertion_order() {
		let mut table: LabelTable<u32> = LabelTable::new(100);
		table.get_or_create(40, || 1);
		table.get_or_create(10, || 2);
		table.get_or_create(25, || 3);
		let addresses: Vec<u32> = (0..table.len()).map(|i| table.at(i).0).collect();
		assert_eq!(addresses, vec![0, 10, 25, 40]);
		assert_eq!(table.get(25), Some(3));
		assert_eq!(table.get(26), None);
	}

	#[test]
	fn repeated_get_or_create_at_same_address_does_not_duplicate() {
		let mut table: LabelTable<u32> = LabelTable::new(100);
		let a = table.get_or_create(12, || 7);
		let b = table.get_or_create(12, || 99);
		assert_eq!(a, b);
		assert_eq!(table.len(), 2);
	}

	#[test]
	fn retarget_entry_replaces_the_sentinel_block() {
		let mut table: LabelTable<u32> = LabelTable::new(100);
		table.retarget_entry(200);
		assert_eq!(table.get(0), Some(200));
	}
}
